//! Option bags
//!
//! Units are configured with a bag of named options. Keys follow the
//! camelCase names callers already know (`useAutoStart`, `beforeDelay`,
//! `loop`, ...). Keys that begin with `on` and hold a handler are event
//! subscriptions: `onComplete` attaches to the `complete` event.

use crate::error::{Result, TimerError};
use crate::events::{EventHandler, EventKind};
use rustc_hash::FxHashMap;
use std::fmt;

/// Well-known option keys
pub mod keys {
    pub const USE_AUTO_START: &str = "useAutoStart";
    pub const SET: &str = "set";
    pub const BEFORE_DELAY: &str = "beforeDelay";
    pub const LOOP: &str = "loop";
    pub const USE_REAL_TIME: &str = "useRealTime";
    pub const FROM: &str = "from";
    pub const TO: &str = "to";
    pub const STEP: &str = "step";
    pub const VALUES: &str = "values";
    pub const EASING: &str = "easing";
}

/// A single option value
#[derive(Clone)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
    TextList(Vec<String>),
    NumberList(Vec<f64>),
    Handler(EventHandler),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            OptionValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            OptionValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// A single text is treated as a one-element list
    pub fn to_text_list(&self) -> Option<Vec<String>> {
        match self {
            OptionValue::Text(s) => Some(vec![s.clone()]),
            OptionValue::TextList(list) => Some(list.clone()),
            _ => None,
        }
    }

    /// A single number is treated as a one-element list
    pub fn to_number_list(&self) -> Option<Vec<f64>> {
        match self {
            OptionValue::Number(n) => Some(vec![*n]),
            OptionValue::NumberList(list) => Some(list.clone()),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            OptionValue::Handler(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "Bool({b})"),
            OptionValue::Number(n) => write!(f, "Number({n})"),
            OptionValue::Text(s) => write!(f, "Text({s:?})"),
            OptionValue::TextList(list) => write!(f, "TextList({list:?})"),
            OptionValue::NumberList(list) => write!(f, "NumberList({list:?})"),
            OptionValue::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        OptionValue::Number(value as f64)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Number(value as f64)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(value: Vec<&str>) -> Self {
        OptionValue::TextList(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::TextList(value)
    }
}

impl From<Vec<f64>> for OptionValue {
    fn from(value: Vec<f64>) -> Self {
        OptionValue::NumberList(value)
    }
}

impl From<EventHandler> for OptionValue {
    fn from(value: EventHandler) -> Self {
        OptionValue::Handler(value)
    }
}

/// A mapping of option name to value
#[derive(Clone, Debug, Default)]
pub struct OptionBag {
    entries: FxHashMap<String, OptionValue>,
}

impl OptionBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set an option
    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) {
        self.entries.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into this bag, overwriting per key
    pub fn merge(&mut self, other: OptionBag) {
        self.entries.extend(other.entries);
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(OptionValue::as_bool).unwrap_or(default)
    }

    pub fn number_or(&self, name: &str, default: f64) -> f64 {
        self.get(name)
            .and_then(OptionValue::as_number)
            .unwrap_or(default)
    }

    /// Read a non-negative integer option, truncating fractions
    pub fn count_or(&self, name: &str, default: u32) -> u32 {
        let value = self.number_or(name, default as f64);
        if value.is_finite() && value > 0.0 {
            value.trunc().min(u32::MAX as f64) as u32
        } else {
            0
        }
    }

    /// Read a required list of numbers
    pub fn numbers(&self, name: &str) -> Result<Option<Vec<f64>>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .to_number_list()
                .map(Some)
                .ok_or_else(|| TimerError::InvalidOption {
                    name: name.to_string(),
                    expected: "a number or list of numbers",
                }),
        }
    }

    pub fn texts(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).and_then(OptionValue::to_text_list)
    }

    /// Event subscriptions declared as `on*` keys.
    ///
    /// The remainder of each key, case-folded, names the event. Keys that
    /// begin with `on` but do not hold a handler are ordinary options.
    pub fn handlers(&self) -> Vec<(EventKind, EventHandler)> {
        let mut handlers: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(key, value)| {
                let event = key.strip_prefix("on").filter(|rest| !rest.is_empty())?;
                let handler = value.as_handler()?;
                Some((key.as_str(), EventKind::from_name(event), handler.clone()))
            })
            .collect();
        // Hash order is arbitrary; attach in key order so wiring is stable
        handlers.sort_by(|a, b| a.0.cmp(b.0));
        handlers
            .into_iter()
            .map(|(_, kind, handler)| (kind, handler))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::handler;

    #[test]
    fn test_merge_overwrites_per_key() {
        let mut bag = OptionBag::new()
            .with(keys::USE_AUTO_START, true)
            .with(keys::LOOP, 3);
        bag.merge(OptionBag::new().with(keys::LOOP, 5));

        assert!(bag.bool_or(keys::USE_AUTO_START, false));
        assert_eq!(bag.count_or(keys::LOOP, 0), 5);
    }

    #[test]
    fn test_count_truncates_and_floors_at_zero() {
        let bag = OptionBag::new()
            .with("a", 2.9)
            .with("b", -4.0)
            .with("c", f64::NAN);
        assert_eq!(bag.count_or("a", 0), 2);
        assert_eq!(bag.count_or("b", 7), 0);
        assert_eq!(bag.count_or("c", 7), 0);
        assert_eq!(bag.count_or("missing", 7), 7);
    }

    #[test]
    fn test_handlers_from_on_keys() {
        let bag = OptionBag::new()
            .with("onComplete", handler(|_| {}))
            .with("onStart", handler(|_| {}))
            .with("online", true)
            .with("on", handler(|_| {}));

        let kinds: Vec<_> = bag.handlers().into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec![EventKind::Complete, EventKind::Start]);
    }

    #[test]
    fn test_numbers_accepts_scalar_or_list() {
        let bag = OptionBag::new()
            .with(keys::FROM, 1.0)
            .with(keys::TO, vec![2.0, 3.0])
            .with(keys::SET, "x");

        assert_eq!(bag.numbers(keys::FROM).unwrap(), Some(vec![1.0]));
        assert_eq!(bag.numbers(keys::TO).unwrap(), Some(vec![2.0, 3.0]));
        assert_eq!(bag.numbers("missing").unwrap(), None);
        assert!(bag.numbers(keys::SET).is_err());
        assert_eq!(bag.texts(keys::SET), Some(vec!["x".to_string()]));
    }
}
