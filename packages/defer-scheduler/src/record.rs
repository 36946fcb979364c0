use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub type Thunk = Box<dyn FnOnce()>;

/// One queued unit of deferred work.
///
/// `executed` only ever goes from false to true, and the thunk is taken out
/// when it does, so a record can never run twice.
pub struct Record {
    executed: Cell<bool>,
    thunk: RefCell<Option<Thunk>>,
}

impl Record {
    pub fn new(thunk: impl FnOnce() + 'static) -> Rc<Self> {
        Rc::new(Self {
            executed: Cell::new(false),
            thunk: RefCell::new(Some(Box::new(thunk))),
        })
    }

    pub fn is_executed(&self) -> bool {
        self.executed.get()
    }

    /// Returns false if the record had already run.
    pub fn run_once(&self) -> bool {
        if self.executed.replace(true) {
            return false;
        }
        // Taken before running so the thunk may re-enter the queue freely.
        let thunk = self.thunk.borrow_mut().take();
        if let Some(thunk) = thunk {
            thunk();
        }
        true
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("executed", &self.executed.get())
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_exactly_once() {
        let hits = Rc::new(Cell::new(0));
        let record = Record::new({
            let hits = hits.clone();
            move || hits.set(hits.get() + 1)
        });

        assert!(!record.is_executed());
        assert!(record.run_once());
        assert!(!record.run_once());
        assert!(record.is_executed());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn extracts_panic_messages() {
        let payload = std::panic::catch_unwind(|| panic!("static str")).unwrap_err();
        assert_eq!(panic_message(payload), "static str");

        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload), "formatted 7");
    }
}
