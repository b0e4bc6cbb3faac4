use std::cell::{Cell, RefCell};

/// Receives control when execution reaches an enabled stop point.
pub trait StopHandler {
    /// Blocks until the operator lets execution resume.
    fn stop(&self, level: u32, label: &str);
}

/// Named stop points gated by a configurable level. Without a handler every
/// stop is a no-op, which is the non-interactive case.
pub struct Breakpoint {
    stop_level: Cell<u32>,
    handler: RefCell<Option<Box<dyn StopHandler>>>,
}

impl Default for Breakpoint {
    fn default() -> Self {
        Self {
            stop_level: Cell::new(0),
            handler: RefCell::new(None),
        }
    }
}

impl Breakpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(handler: Box<dyn StopHandler>) -> Self {
        let bp = Self::default();
        bp.set_handler(Some(handler));
        bp
    }

    pub fn set_handler(&self, handler: Option<Box<dyn StopHandler>>) {
        *self.handler.borrow_mut() = handler;
    }

    pub fn set_stop_level(&self, level: u32) {
        self.stop_level.set(level);
    }

    pub fn stop_level(&self) -> u32 {
        self.stop_level.get()
    }

    /// Returns true when the handler was actually invoked.
    pub fn stop(&self, level: u32, label: &str) -> bool {
        if level > self.stop_level.get() {
            return false;
        }
        match self.handler.borrow().as_ref() {
            Some(handler) => {
                log::info!("Breakpoint (level {}): {}", level, label);
                handler.stop(level, label);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl StopHandler for Recorder {
        fn stop(&self, level: u32, label: &str) {
            self.0.borrow_mut().push(format!("{}:{}", level, label));
        }
    }

    #[test]
    fn stops_only_at_or_below_the_stop_level() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let bp = Breakpoint::with_handler(Box::new(Recorder(seen.clone())));

        assert!(!bp.stop(1, "muted"));
        bp.set_stop_level(1);
        assert!(bp.stop(1, "first"));
        assert!(!bp.stop(2, "too deep"));

        assert_eq!(*seen.borrow(), vec!["1:first".to_string()]);
    }

    #[test]
    fn no_handler_means_no_pause() {
        let bp = Breakpoint::new();
        bp.set_stop_level(99);
        assert!(!bp.stop(1, "anything"));
    }
}
