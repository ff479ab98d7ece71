//! Bridges one-shot DOM events to Rust futures.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, EventTarget};

type Slot = Rc<RefCell<Option<oneshot::Sender<(&'static str, Event)>>>>;

/// Resolves with whichever of the watched events fires first on a target.
///
/// Listeners are attached on construction, so create this before starting the operation that
/// fires the events. They are detached when the future is consumed or dropped.
pub(crate) struct EventFuture {
    target: EventTarget,
    rx: oneshot::Receiver<(&'static str, Event)>,
    listeners: Vec<(&'static str, Closure<dyn FnMut(Event)>)>,
}

impl EventFuture {
    pub(crate) fn new(target: &EventTarget, events: &[&'static str]) -> Result<Self, JsValue> {
        let (tx, rx) = oneshot::channel();
        let slot: Slot = Rc::new(RefCell::new(Some(tx)));

        let mut future = Self {
            target: target.clone(),
            rx,
            listeners: Vec::with_capacity(events.len()),
        };
        for &name in events {
            let slot = slot.clone();
            let listener = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
                if let Some(tx) = slot.borrow_mut().take() {
                    // The receiver may already be gone; nobody is waiting then.
                    let _ = tx.send((name, event));
                }
            });
            target.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())?;
            future.listeners.push((name, listener));
        }
        Ok(future)
    }

    /// Waits for the first watched event and returns its name with the event.
    pub(crate) async fn wait(mut self) -> Result<(&'static str, Event), oneshot::Canceled> {
        (&mut self.rx).await
    }
}

impl Drop for EventFuture {
    fn drop(&mut self) {
        for (name, listener) in &self.listeners {
            let _ = self
                .target
                .remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref());
        }
    }
}
