//! The live preview: a store subscriber that keeps rendered markup current.
//!
//! [`LivePreview`] is what raster exports capture. It re-renders on every
//! store notification, so a capture always sees the latest `set`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::export::{PreviewHost, VectorSerializer};
use crate::icon::IconResolver;
use crate::scene::SceneBuilder;
use crate::state::LogoState;
use crate::store::{StateStore, Subscription};

struct Renderer {
    resolver: Rc<dyn IconResolver>,
    builder: SceneBuilder,
    serializer: VectorSerializer,
    display_size: u32,
}

impl Renderer {
    fn render(&self, state: &LogoState) -> Option<String> {
        let scene = self.builder.build_with(state, self.resolver.as_ref());
        match self
            .serializer
            .serialize(&scene, self.display_size, self.display_size)
        {
            Ok(markup) => Some(markup),
            Err(err) => {
                log::warn!("preview render failed: {err}");
                None
            }
        }
    }
}

/// A mounted preview bound to one store.
pub struct LivePreview {
    markup: Rc<RefCell<Option<String>>>,
    subscription: RefCell<Option<Subscription>>,
}

impl LivePreview {
    /// Mounts a preview displayed at the builder's canvas size.
    pub fn attach(store: &StateStore, resolver: Rc<dyn IconResolver>, builder: SceneBuilder) -> Self {
        let display_size = builder.canvas().width;
        Self::attach_at(store, resolver, builder, display_size)
    }

    /// Mounts a preview displayed at `display_size` pixels square.
    ///
    /// The display size only changes the markup's `width`/`height`; layout
    /// is always resolved on the builder's canvas.
    pub fn attach_at(
        store: &StateStore,
        resolver: Rc<dyn IconResolver>,
        builder: SceneBuilder,
        display_size: u32,
    ) -> Self {
        let renderer = Renderer {
            resolver,
            builder,
            serializer: VectorSerializer::new(),
            display_size,
        };
        let markup = Rc::new(RefCell::new(renderer.render(&store.get())));

        let target = Rc::clone(&markup);
        let subscription = store.subscribe(move |state| {
            *target.borrow_mut() = renderer.render(state);
        });

        Self {
            markup,
            subscription: RefCell::new(Some(subscription)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    /// Removes the preview; later captures find nothing to clone.
    pub fn unmount(&self) {
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        self.markup.borrow_mut().take();
        log::debug!("preview unmounted");
    }
}

impl PreviewHost for LivePreview {
    fn capture_markup(&self) -> Option<String> {
        self.markup.borrow().clone()
    }
}

impl std::fmt::Debug for LivePreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivePreview")
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::IconCatalog;
    use crate::state::StoredValue;

    fn preview(store: &StateStore) -> LivePreview {
        LivePreview::attach(store, Rc::new(IconCatalog::builtin()), SceneBuilder::default())
    }

    #[test]
    fn follows_store_updates() {
        let store = StateStore::in_memory();
        let preview = preview(&store);
        assert!(preview.capture_markup().unwrap().contains(">SimpleLogo</text>"));

        store.set(StoredValue {
            text: Some("Updated".to_string()),
            ..Default::default()
        });
        assert!(preview.capture_markup().unwrap().contains(">Updated</text>"));
    }

    #[test]
    fn display_size_only_changes_outer_dimensions() {
        let store = StateStore::in_memory();
        let preview = LivePreview::attach_at(
            &store,
            Rc::new(IconCatalog::builtin()),
            SceneBuilder::default(),
            240,
        );
        let markup = preview.capture_markup().unwrap();
        assert!(markup.contains(r#"width="240" height="240" viewBox="0 0 600 600""#));
    }

    #[test]
    fn unmount_detaches_from_store() {
        let store = StateStore::in_memory();
        let preview = preview(&store);
        assert_eq!(store.subscriber_count(), 1);

        preview.unmount();
        assert!(!preview.is_mounted());
        assert!(preview.capture_markup().is_none());
        assert_eq!(store.subscriber_count(), 0);

        store.set(StoredValue::new());
        assert!(preview.capture_markup().is_none());
    }
}
