//! Compute-once deferred values.
//!
//! Pipeline steps with side effects (checkouts, file reads) are wrapped in a
//! [`Lazy`] so that building the pipeline performs nothing. A step that depends
//! on another holds an `Rc<Lazy<_>>` to it and forces it first; the order of
//! side effects is thus fixed by these edges, not by construction order.

use std::cell::{Cell, OnceCell};
use std::fmt::{self, Debug, Formatter};

pub struct Lazy<T> {
    value: OnceCell<T>,
    init: Cell<Option<Box<dyn FnOnce() -> T>>>,
}

impl<T> Lazy<T> {
    pub fn new(init: impl FnOnce() -> T + 'static) -> Self {
        Self {
            value: OnceCell::new(),
            init: Cell::new(Some(Box::new(init))),
        }
    }

    /// Already evaluated value.
    pub fn ready(value: T) -> Self {
        Self {
            value: OnceCell::from(value),
            init: Cell::new(None),
        }
    }

    /// Forces the computation on first call; later calls return the cached value.
    ///
    /// # Panics
    ///
    /// Panics if the computation re-enters `get` on the same value.
    pub fn get(&self) -> &T {
        self.value.get_or_init(|| match self.init.take() {
            Some(init) => init(),
            None => panic!("Lazy value forced recursively"),
        })
    }

    pub fn is_evaluated(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: Debug> Debug for Lazy<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.write_str("Lazy(<pending>)"),
        }
    }
}
