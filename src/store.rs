//! The reactive, persistent state store.
//!
//! A [`StateStore`] owns the current [`StoredValue`] record, writes it to a
//! [`Storage`] backend on every change and synchronously notifies its
//! subscribers with the resolved [`LogoState`]. Each store has its own
//! subscriber list; there is no global instance.
//!
//! ```text
//! set(patch) ──► merge ──► save ──► resolve ──► listener 1, 2, ... (in order)
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::error::StorageError;
use crate::state::{LogoState, StoredValue};

/// Key the logo record is stored under.
pub const STORAGE_KEY: &str = "value";

// ============================================================================
// Storage backends
// ============================================================================

/// A durable string key-value store.
pub trait Storage {
    /// Returns `Ok(None)` when nothing is stored under `key`.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Process-local storage, lost when dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with `value` under `key`.
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut storage = Self::new();
        storage.entries.insert(key.into(), value.into());
        storage
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key (`<dir>/<key>.json`).
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let staging = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&staging, value)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

type Listener = Rc<dyn Fn(&LogoState)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

impl Listeners {
    fn add(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Handle to a registered listener; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<RefCell<Listeners>>,
}

impl Subscription {
    /// Removes the listener. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.borrow_mut().remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ============================================================================
// StateStore
// ============================================================================

/// Holds the current logo record, persists it and broadcasts changes.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use logo_renderer::{StateStore, StoredValue};
///
/// let store = StateStore::in_memory();
/// let seen = Rc::new(Cell::new(0.0));
///
/// let sink = Rc::clone(&seen);
/// let _subscription = store.subscribe(move |state| sink.set(state.icon.size));
///
/// store.set(StoredValue { icon_size: Some(120.0), ..Default::default() });
/// assert_eq!(seen.get(), 120.0);
/// assert_eq!(store.get().icon.size, 120.0);
/// ```
pub struct StateStore {
    storage: RefCell<Box<dyn Storage>>,
    record: RefCell<StoredValue>,
    listeners: Rc<RefCell<Listeners>>,
    /// Snapshots waiting to be delivered, oldest first.
    pending: RefCell<VecDeque<LogoState>>,
    notifying: Cell<bool>,
}

/// Clears the notifying flag when the outermost delivery loop exits.
struct NotifyGuard<'a>(&'a Cell<bool>);

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl StateStore {
    /// Opens a store over `storage`, loading the record under [`STORAGE_KEY`].
    ///
    /// A missing record starts empty (all defaults). A record that cannot be
    /// read or parsed is logged and replaced by defaults.
    pub fn open(storage: impl Storage + 'static) -> Self {
        let record = match storage.load(STORAGE_KEY) {
            Ok(Some(json)) => StoredValue::from_json(&json).unwrap_or_else(|err| {
                log::warn!("stored logo record is corrupt, using defaults: {err}");
                StoredValue::new()
            }),
            Ok(None) => {
                log::debug!("no stored logo record, using defaults");
                StoredValue::new()
            }
            Err(err) => {
                log::warn!("stored logo record could not be read, using defaults: {err}");
                StoredValue::new()
            }
        };

        Self {
            storage: RefCell::new(Box::new(storage)),
            record: RefCell::new(record),
            listeners: Rc::new(RefCell::new(Listeners::default())),
            pending: RefCell::new(VecDeque::new()),
            notifying: Cell::new(false),
        }
    }

    /// A store backed by [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::open(MemoryStorage::new())
    }

    /// The current resolved state.
    pub fn get(&self) -> LogoState {
        self.record.borrow().resolve()
    }

    /// The current persisted record, including unknown keys.
    pub fn record(&self) -> StoredValue {
        self.record.borrow().clone()
    }

    /// Merges `patch` into the record, persists it and notifies subscribers.
    ///
    /// A storage failure is logged; the in-memory record is still updated and
    /// subscribers are still notified.
    ///
    /// A `set` issued from inside a listener is queued and delivered after
    /// the current snapshot has reached every subscriber, so all listeners
    /// see snapshots in write order and end on the newest one.
    pub fn set(&self, patch: StoredValue) {
        let snapshot = {
            let mut record = self.record.borrow_mut();
            record.merge(patch);
            record.clone()
        };

        match snapshot.to_json() {
            Ok(json) => {
                if let Err(err) = self.storage.borrow_mut().save(STORAGE_KEY, &json) {
                    log::error!("failed to persist logo record, keeping it in memory: {err}");
                }
            }
            Err(err) => log::error!("failed to serialize logo record: {err}"),
        }

        self.pending.borrow_mut().push_back(snapshot.resolve());
        if self.notifying.replace(true) {
            return;
        }
        let _guard = NotifyGuard(&self.notifying);

        loop {
            let Some(state) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            let listeners: Vec<Listener> = self
                .listeners
                .borrow()
                .entries
                .iter()
                .map(|(_, listener)| Rc::clone(listener))
                .collect();
            for listener in listeners {
                listener(&state);
            }
        }
    }

    /// Registers `listener`; it runs synchronously after every [`set`](Self::set).
    pub fn subscribe(&self, listener: impl Fn(&LogoState) + 'static) -> Subscription {
        let id = self.listeners.borrow_mut().add(Rc::new(listener));
        Subscription {
            id,
            listeners: Rc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("record", &self.record.borrow())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::state::defaults;

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }

        fn save(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    fn patch(json: &str) -> StoredValue {
        StoredValue::from_json(json).unwrap()
    }

    #[test]
    fn corrupt_record_falls_back_to_defaults() {
        let store = StateStore::open(MemoryStorage::with_entry(STORAGE_KEY, "{not json"));
        assert_eq!(store.get(), LogoState::default());
    }

    #[test]
    fn unreadable_storage_keeps_working_in_memory() {
        let store = StateStore::open(BrokenStorage);
        assert_eq!(store.get(), LogoState::default());

        let notified = Rc::new(Cell::new(false));
        let flag = Rc::clone(&notified);
        let _sub = store.subscribe(move |_| flag.set(true));

        store.set(patch(r#"{"text": "Offline"}"#));
        assert_eq!(store.get().text.content, "Offline");
        assert!(notified.get());
    }

    #[test]
    fn set_merges_additively() {
        let store = StateStore::in_memory();
        store.set(patch(r#"{"icon": "Rocket", "iconSize": 200}"#));
        store.set(patch(r#"{"textSize": 42}"#));

        let state = store.get();
        assert_eq!(state.icon.name, "Rocket");
        assert_eq!(state.icon.size, 200.0);
        assert_eq!(state.text.size, 42.0);
        assert_eq!(state.text.content, defaults::TEXT);
    }

    #[test]
    fn set_with_current_value_is_idempotent() {
        let store = StateStore::in_memory();
        store.set(patch(r##"{"bgColor": "#102030", "bgRounded": 0}"##));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = store.subscribe(move |state| sink.borrow_mut().push(state.clone()));

        store.set(store.record());
        store.set(store.record());

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[0].background.corner_radius, 0.0);
    }

    #[test]
    fn listeners_run_in_subscription_order_and_can_unsubscribe() {
        let store = StateStore::in_memory();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let first = {
            let calls = Rc::clone(&calls);
            store.subscribe(move |state| calls.borrow_mut().push(("first", state.icon.size)))
        };
        let _second = {
            let calls = Rc::clone(&calls);
            store.subscribe(move |state| calls.borrow_mut().push(("second", state.icon.size)))
        };
        assert_eq!(store.subscriber_count(), 2);

        store.set(patch(r#"{"iconSize": 10}"#));
        first.unsubscribe();
        store.set(patch(r#"{"iconSize": 20}"#));

        assert_eq!(store.subscriber_count(), 1);
        assert_eq!(
            *calls.borrow(),
            vec![("first", 10.0), ("second", 10.0), ("second", 20.0)]
        );
    }

    #[test]
    fn listener_may_read_the_store() {
        let store = Rc::new(StateStore::in_memory());
        let observed = Rc::new(Cell::new(0.0));

        let reader = Rc::downgrade(&store);
        let sink = Rc::clone(&observed);
        let _sub = store.subscribe(move |_| {
            if let Some(store) = reader.upgrade() {
                sink.set(store.get().text.size);
            }
        });

        store.set(patch(r#"{"textSize": 33}"#));
        assert_eq!(observed.get(), 33.0);
    }

    #[test]
    fn nested_set_notifies_in_write_order() {
        let store = Rc::new(StateStore::in_memory());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let writer = Rc::downgrade(&store);
        let _first = store.subscribe(move |state| {
            if state.text.size == 10.0 {
                if let Some(store) = writer.upgrade() {
                    store.set(patch(r#"{"textSize": 20}"#));
                }
            }
        });
        let sink = Rc::clone(&seen);
        let _second = store.subscribe(move |state| sink.borrow_mut().push(state.text.size));

        store.set(patch(r#"{"textSize": 10}"#));

        assert_eq!(*seen.borrow(), vec![10.0, 20.0]);
        assert_eq!(store.get().text.size, 20.0);

        // The flag is released once the queue drains.
        store.set(patch(r#"{"textSize": 30}"#));
        assert_eq!(*seen.borrow(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn file_storage_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = StateStore::open(FileStorage::new(dir.path()));
        store.set(patch(r#"{"iconPositionY": 0, "hideIcon": true, "iconFillOpacity": 40}"#));
        let before = store.get();
        drop(store);

        let path = FileStorage::new(dir.path()).path_for(STORAGE_KEY);
        assert!(path.ends_with("value.json"));
        assert!(fs::read_to_string(&path).unwrap().contains("iconFillOpacity"));

        let reopened = StateStore::open(FileStorage::new(dir.path()));
        assert_eq!(reopened.get(), before);
        assert_eq!(reopened.get().icon.position_y, 0.0);
    }

    #[test]
    fn missing_file_is_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));
        assert!(storage.load(STORAGE_KEY).unwrap().is_none());
        assert_eq!(StateStore::open(storage).record(), StoredValue::new());
    }
}
