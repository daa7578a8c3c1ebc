//! Form binding contract
//!
//! A host form owns each selector through [`FormControl`]: it writes values
//! in, listens for changes and touches, and asks for validation.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{FieldError, SelectorResult};

/// Listener for value changes
pub type ChangeCallback<V> = Arc<dyn Fn(&V) + Send + Sync>;

/// Listener for user interaction
pub type TouchedCallback = Arc<dyn Fn() + Send + Sync>;

/// A selector bound into a host form
#[async_trait]
pub trait FormControl: Send + Sync {
    /// External value type
    type Value: Clone + Send + Sync;

    /// Current external value
    fn value(&self) -> Self::Value;

    /// Host-initiated write
    ///
    /// Does not invoke change listeners.
    async fn set_value(&self, value: Self::Value) -> SelectorResult<()>;

    /// Register a change listener, called after each user-driven change
    fn on_change(&self, callback: ChangeCallback<Self::Value>);

    /// Register a touch listener
    fn on_touched(&self, callback: TouchedCallback);

    /// Current validation state, `None` when valid
    fn validate(&self) -> Option<FieldError>;

    /// Disabled controls ignore user input
    fn set_disabled(&self, disabled: bool);
}

/// Registered listeners for one control
///
/// Listeners are cloned out before being invoked so a listener may call back
/// into the control.
pub(crate) struct Listeners<V> {
    change: Mutex<Vec<ChangeCallback<V>>>,
    touched: Mutex<Vec<TouchedCallback>>,
}

impl<V> Default for Listeners<V> {
    fn default() -> Self {
        Self {
            change: Mutex::new(Vec::new()),
            touched: Mutex::new(Vec::new()),
        }
    }
}

impl<V> Listeners<V> {
    pub(crate) fn add_change(&self, callback: ChangeCallback<V>) {
        self.change.lock().push(callback);
    }

    pub(crate) fn add_touched(&self, callback: TouchedCallback) {
        self.touched.lock().push(callback);
    }

    pub(crate) fn emit_change(&self, value: &V) {
        let listeners = self.change.lock().clone();
        for listener in listeners {
            listener(value);
        }
    }

    pub(crate) fn emit_touched(&self) {
        let listeners = self.touched.lock().clone();
        for listener in listeners {
            listener();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_listeners_fire_in_order() {
        let listeners: Listeners<u32> = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..2 {
            let seen = seen.clone();
            listeners.add_change(Arc::new(move |v: &u32| seen.lock().push((tag, *v))));
        }
        listeners.emit_change(&7);

        assert_eq!(*seen.lock(), vec![(0, 7), (1, 7)]);
    }

    #[test]
    fn test_touched_listener() {
        let listeners: Listeners<()> = Listeners::default();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        listeners.add_touched(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.emit_touched();
        listeners.emit_touched();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
