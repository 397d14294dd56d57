use std::collections::HashMap;

use crate::error::Error;
use crate::value::Value;
use crate::variable::VariableId;

/// C4. A typed `VariableId -> Value` map with the invariant that every
/// stored value is a legal value of its key's format. No ordering
/// guarantees over the map's contents.
#[derive(Default)]
pub struct VariableStore {
    values: HashMap<VariableId, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        VariableStore { values: HashMap::new() }
    }

    /// Returns the prior value, or `None` meaning "absent". Rejects values
    /// that are not a legal value of `vid.format` (checked structurally via
    /// `Format::accepts`, not by inferring one `Format` for the value and
    /// comparing formats — an empty array has no element to infer a format
    /// from, but is a legal value of every array format).
    pub fn put(&mut self, vid: VariableId, value: Value) -> Result<Option<Value>, Error> {
        if !vid.format.accepts(&value) {
            return Err(Error::InvariantViolation {
                message: format!("value {value:?} is not a legal value of format {}", vid.format),
            });
        }
        Ok(self.values.insert(vid, value))
    }

    pub fn get(&self, vid: &VariableId) -> Option<&Value> {
        self.values.get(vid)
    }

    pub fn contains(&self, vid: &VariableId) -> bool {
        self.values.contains_key(vid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::scope::ScopeInstanceId;

    fn vid(name: &str, format: Format) -> VariableId {
        VariableId::new(ScopeInstanceId(0), name, format)
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut store = VariableStore::new();
        assert!(!store.contains(&vid("hp", Format::Integer)));
        store.put(vid("hp", Format::Integer), Value::Integer(10)).unwrap();
        assert_eq!(store.get(&vid("hp", Format::Integer)), Some(&Value::Integer(10)));
    }

    #[test]
    fn put_accepts_a_widening_subformat() {
        let mut store = VariableStore::new();
        let v = vid("ratio", Format::Real);
        store.put(v.clone(), Value::Integer(1)).unwrap();
        assert_eq!(store.get(&v), Some(&Value::Integer(1)));
    }

    #[test]
    fn put_rejects_a_mismatched_format() {
        let mut store = VariableStore::new();
        let err = store.put(vid("hp", Format::Integer), Value::String("nope".into())).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
    }

    #[test]
    fn put_accepts_an_empty_array_for_any_array_format() {
        let mut store = VariableStore::new();
        let v = vid("tags", Format::array_of(Format::String));
        store.put(v.clone(), Value::Array(vec![])).unwrap();
        assert_eq!(store.get(&v), Some(&Value::Array(vec![])));
    }
}
