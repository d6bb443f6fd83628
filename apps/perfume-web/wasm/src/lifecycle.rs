//! Page visibility and unload notifications

use perfume_core::{LifecycleEvent, LifecycleListener, PageLifecycle};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, EventTarget, Window};

/// `visibilitychange` on the document plus `beforeunload` on the window
pub struct DocumentLifecycle {
    window: Window,
    document: Document,
}

impl DocumentLifecycle {
    /// `None` outside a browsing context
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self { window, document })
    }

    fn listen(
        target: &EventTarget,
        event: &str,
        handler: impl FnMut() + 'static,
    ) -> Result<(), JsValue> {
        let mut handler = handler;
        let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| handler())
            as Box<dyn FnMut(web_sys::Event)>);
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        // Listeners stay registered for the page's lifetime.
        closure.forget();
        Ok(())
    }
}

impl PageLifecycle for DocumentLifecycle {
    fn subscribe(&self, listener: LifecycleListener) -> bool {
        let listener = Rc::new(RefCell::new(listener));

        let on_visibility = {
            let listener = Rc::clone(&listener);
            let document = self.document.clone();
            move || {
                let event = if document.hidden() {
                    LifecycleEvent::Hidden
                } else {
                    LifecycleEvent::Visible
                };
                (*listener.borrow_mut())(event);
            }
        };
        if let Err(e) = Self::listen(&self.document, "visibilitychange", on_visibility) {
            debug!("visibilitychange listener failed: {:?}", e);
            return false;
        }

        let on_unload = move || (*listener.borrow_mut())(LifecycleEvent::Unloading);
        if let Err(e) = Self::listen(&self.window, "beforeunload", on_unload) {
            debug!("beforeunload listener failed: {:?}", e);
        }
        true
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use std::cell::Cell;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_visibilitychange_reaches_listener() {
        let lifecycle = DocumentLifecycle::new().unwrap();
        let seen = Rc::new(Cell::new(None));
        let sink = seen.clone();
        assert!(lifecycle.subscribe(Box::new(move |event| sink.set(Some(event)))));

        let event = web_sys::Event::new("visibilitychange").unwrap();
        lifecycle.document.dispatch_event(&event).unwrap();

        let expected = if lifecycle.document.hidden() {
            LifecycleEvent::Hidden
        } else {
            LifecycleEvent::Visible
        };
        assert_eq!(seen.get(), Some(expected));
    }
}
