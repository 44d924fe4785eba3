use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Raw value remembered for one field of one port.
///
/// The store never interprets values; readers decide whether a value is an
/// option index or a check state. Check states written as integers follow the
/// Qt convention (0 unchecked, 1 partially checked, 2 checked) so values kept
/// by earlier editor sessions still read back.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum StoreValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

const CHECK_STATE_CHECKED: i64 = 2;
const CHECK_STATE_PARTIAL: i64 = 1;
const CHECK_STATE_UNCHECKED: i64 = 0;

/// A stored value could not be read as the requested kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("stored value '{value}' is not a valid {expected}")]
pub struct ValueError {
    pub value: String,
    pub expected: &'static str,
}

impl StoreValue {
    fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError {
            value: self.to_string(),
            expected,
        }
    }

    /// Interpret the value as a select option index.
    pub fn as_index(&self) -> Result<usize, ValueError> {
        match self {
            StoreValue::Int(value) => {
                usize::try_from(*value).map_err(|_| self.mismatch("option index"))
            }
            StoreValue::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| self.mismatch("option index")),
            StoreValue::Bool(_) => Err(self.mismatch("option index")),
        }
    }

    /// Interpret the value as a check state, collapsing "partially checked"
    /// to unchecked.
    pub fn as_checked(&self) -> Result<bool, ValueError> {
        let from_state = |state: i64| match state {
            CHECK_STATE_CHECKED => Ok(true),
            CHECK_STATE_PARTIAL | CHECK_STATE_UNCHECKED => Ok(false),
            _ => Err(self.mismatch("check state")),
        };
        match self {
            StoreValue::Bool(checked) => Ok(*checked),
            StoreValue::Int(state) => from_state(*state),
            StoreValue::Text(text) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    let state = text.parse().map_err(|_| self.mismatch("check state"))?;
                    from_state(state)
                }
            }
        }
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Bool(value) => write!(f, "{value}"),
            StoreValue::Int(value) => write!(f, "{value}"),
            StoreValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for StoreValue {
    fn from(value: bool) -> Self {
        StoreValue::Bool(value)
    }
}

impl From<i64> for StoreValue {
    fn from(value: i64) -> Self {
        StoreValue::Int(value)
    }
}

impl From<usize> for StoreValue {
    fn from(value: usize) -> Self {
        i64::try_from(value)
            .map(StoreValue::Int)
            .unwrap_or_else(|_| StoreValue::Text(value.to_string()))
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        StoreValue::Text(value)
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        StoreValue::Text(value.to_string())
    }
}

/// Last-known field values keyed by `(stable field name, port index)`.
///
/// The port index is the position of the port in the currently enumerated
/// port list. Entries for ports that no longer exist are kept and simply
/// never asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityStore {
    fields: BTreeMap<String, BTreeMap<usize, StoreValue>>,
}

impl CapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value.
    pub fn set(&mut self, field: &str, port: usize, value: impl Into<StoreValue>) {
        let value = value.into();
        debug!(field, port, %value, "store capability value");
        self.fields
            .entry(field.to_string())
            .or_default()
            .insert(port, value);
    }

    /// `None` when the field was never set for that port.
    pub fn get(&self, field: &str, port: usize) -> Option<&StoreValue> {
        self.fields.get(field).and_then(|ports| ports.get(&port))
    }

    pub fn len(&self) -> usize {
        self.fields.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries ordered by field name, then port index.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize, &StoreValue)> {
        self.fields.iter().flat_map(|(field, ports)| {
            ports
                .iter()
                .map(move |(port, value)| (field.as_str(), *port, value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_get_is_per_port() {
        let mut store = CapabilityStore::new();
        store.set("port_capability", 0, 2usize);
        store.set("port_capability", 1, 1usize);
        store.set("port_capability", 0, 3usize);
        assert_eq!(store.get("port_capability", 0), Some(&StoreValue::Int(3)));
        assert_eq!(store.get("port_capability", 1), Some(&StoreValue::Int(1)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unknown_fields_and_ports_are_absent() {
        let mut store = CapabilityStore::new();
        assert!(store.is_empty());
        store.set("flag", 0, true);
        assert_eq!(store.get("flag", 7), None);
        assert_eq!(store.get("other", 0), None);
    }

    #[test]
    fn iter_is_ordered() {
        let mut store = CapabilityStore::new();
        store.set("b", 1, true);
        store.set("a", 2, "x");
        store.set("b", 0, false);
        let entries: Vec<(&str, usize)> = store.iter().map(|(f, p, _)| (f, p)).collect();
        assert_eq!(entries, [("a", 2), ("b", 0), ("b", 1)]);
    }

    #[test]
    fn index_interpretation() {
        assert_eq!(StoreValue::Int(3).as_index(), Ok(3));
        assert_eq!(StoreValue::from(" 2 ").as_index(), Ok(2));
        assert!(StoreValue::Int(-1).as_index().is_err());
        assert!(StoreValue::from("two").as_index().is_err());
        assert!(StoreValue::Bool(true).as_index().is_err());
    }

    #[test]
    fn check_state_interpretation() {
        assert_eq!(StoreValue::Bool(true).as_checked(), Ok(true));
        assert_eq!(StoreValue::Int(2).as_checked(), Ok(true));
        assert_eq!(StoreValue::Int(1).as_checked(), Ok(false));
        assert_eq!(StoreValue::Int(0).as_checked(), Ok(false));
        assert_eq!(StoreValue::from("TRUE").as_checked(), Ok(true));
        assert_eq!(StoreValue::from("2").as_checked(), Ok(true));
        let err = StoreValue::Int(5).as_checked().unwrap_err();
        assert_eq!(err.expected, "check state");
        assert!(StoreValue::from("maybe").as_checked().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn values_serialize_untagged() {
        let values = vec![
            StoreValue::Bool(true),
            StoreValue::Int(2),
            StoreValue::Text("x".into()),
        ];
        let json = serde_json::to_string(&values).expect("serialize");
        assert_eq!(json, r#"[true,2,"x"]"#);
        let back: Vec<StoreValue> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, values);
    }
}
