//! Attribute targets
//!
//! A timer can drive external state directly instead of calling a function:
//! each time it fires, its value is written onto named attributes of one or
//! more targets.

use rustc_hash::FxHashMap;
use std::cell::RefCell;

/// Something a timer can write numeric attributes onto
pub trait AttributeTarget {
    fn set_attribute(&self, name: &str, value: f64);
}

/// A plain in-memory attribute store
#[derive(Debug, Default)]
pub struct AttributeBag {
    values: RefCell<FxHashMap<String, f64>>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.borrow().get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl AttributeTarget for AttributeBag {
    fn set_attribute(&self, name: &str, value: f64) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }
}
