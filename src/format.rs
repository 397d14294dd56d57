use std::collections::HashMap;

use crate::error::Error;
use crate::value::Value;

/// A type handle classifying the values a variable or expression may hold.
///
/// Implemented as a closed tagged union rather than a dynamically
/// registered open set, per the design note about a "tagged-union over the
/// closed set of built-in formats" being an acceptable alternative when
/// formats are not dynamically extensible — this grammar only ever
/// produces these five shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Format {
    Integer,
    Real,
    Boolean,
    String,
    Array(Box<Format>),
}

impl Format {
    pub fn array_of(inner: Format) -> Format {
        Format::Array(Box::new(inner))
    }

    /// `subformat(A, B)` iff every value of A is also a valid value of B.
    /// An integer is a subformat of real (widening); everything else is
    /// only a subformat of itself, structurally for arrays.
    pub fn is_subformat_of(&self, other: &Format) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (Format::Integer, Format::Real) => true,
            (Format::Array(a), Format::Array(b)) => a.is_subformat_of(b),
            _ => false,
        }
    }

    /// Whether `value` is a legal value of this format. Unlike going
    /// through `Format::type_of` + `is_subformat_of`, this checks an
    /// array's elements individually rather than inferring one element
    /// format for the whole array — so an empty array matches every array
    /// format (there is no element to disagree with), and `[1, 2.5]`
    /// matches `array_of(Real)` even though `type_of` alone would call it
    /// `array_of(Integer)` off its first element.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Format::Integer, Value::Integer(_)) => true,
            (Format::Real, Value::Integer(_)) | (Format::Real, Value::Real(_)) => true,
            (Format::Boolean, Value::Boolean(_)) => true,
            (Format::String, Value::String(_)) => true,
            (Format::Array(inner), Value::Array(items)) => items.iter().all(|item| inner.accepts(item)),
            _ => false,
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            Format::Integer => Value::Integer(0),
            Format::Real => Value::Real(0.0),
            Format::Boolean => Value::Boolean(false),
            Format::String => Value::String(String::new()),
            Format::Array(_) => Value::Array(Vec::new()),
        }
    }

    pub fn type_of(value: &Value) -> Format {
        match value {
            Value::Integer(_) => Format::Integer,
            Value::Real(_) => Format::Real,
            Value::Boolean(_) => Format::Boolean,
            Value::String(_) => Format::String,
            Value::Array(items) => {
                let inner = items.first().map(Format::type_of).unwrap_or(Format::Integer);
                Format::array_of(inner)
            }
        }
    }

    pub fn parse(&self, text: &str) -> Result<Value, Error> {
        match self {
            Format::Integer => text.trim().parse::<i64>().map(Value::Integer).map_err(|_| Error::BadFormula {
                message: format!("{text:?} is not a valid integer"),
                span: None,
            }),
            Format::Real => text.trim().parse::<f64>().map(Value::Real).map_err(|_| Error::BadFormula {
                message: format!("{text:?} is not a valid real"),
                span: None,
            }),
            Format::Boolean => match text.trim() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                other => Err(Error::BadFormula {
                    message: format!("{other:?} is not a valid boolean"),
                    span: None,
                }),
            },
            Format::String => Ok(Value::String(text.to_string())),
            Format::Array(_) => Err(Error::BadFormula {
                message: "array formats are not parsed from bare text".to_string(),
                span: None,
            }),
        }
    }

    pub fn unparse(&self, value: &Value) -> String {
        value.to_string()
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Integer => write!(f, "integer"),
            Format::Real => write!(f, "real"),
            Format::Boolean => write!(f, "boolean"),
            Format::String => write!(f, "string"),
            Format::Array(inner) => write!(f, "array-of-{inner}"),
        }
    }
}

/// C1. Maps a format name to the primitive `Format` it denotes and answers
/// the default-value / subformat / parse questions the rest of the engine
/// needs without caring whether a given format is primitive or composite.
pub struct FormatRegistry {
    primitives: HashMap<&'static str, Format>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        let mut primitives = HashMap::new();
        primitives.insert("integer", Format::Integer);
        primitives.insert("real", Format::Real);
        primitives.insert("boolean", Format::Boolean);
        primitives.insert("string", Format::String);
        FormatRegistry { primitives }
    }

    pub fn lookup(&self, name: &str) -> Option<Format> {
        self.primitives.get(name).cloned()
    }

    pub fn default_for(&self, format: &Format) -> Option<Value> {
        Some(format.default_value())
    }

    pub fn is_subformat_of(&self, a: &Format, b: &Format) -> bool {
        a.is_subformat_of(b)
    }

    pub fn parse(&self, format: &Format, text: &str) -> Result<Value, Error> {
        format.parse(text)
    }

    pub fn array_of(&self, inner: Format) -> Format {
        Format::array_of(inner)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widens_to_real_but_not_the_reverse() {
        assert!(Format::Integer.is_subformat_of(&Format::Real));
        assert!(!Format::Real.is_subformat_of(&Format::Integer));
    }

    #[test]
    fn array_subformat_is_structural_on_the_element_type() {
        let ints = Format::array_of(Format::Integer);
        let reals = Format::array_of(Format::Real);
        assert!(ints.is_subformat_of(&reals));
        assert!(!reals.is_subformat_of(&ints));
        assert!(!ints.is_subformat_of(&Format::array_of(Format::Boolean)));
    }

    #[test]
    fn default_values_match_each_primitive() {
        assert_eq!(Format::Integer.default_value(), Value::Integer(0));
        assert_eq!(Format::Boolean.default_value(), Value::Boolean(false));
        assert_eq!(Format::array_of(Format::String).default_value(), Value::Array(vec![]));
    }

    #[test]
    fn parse_rejects_malformed_text() {
        assert!(Format::Integer.parse("3.5").is_err());
        assert!(Format::Boolean.parse("maybe").is_err());
        assert_eq!(Format::Integer.parse(" 42 ").unwrap(), Value::Integer(42));
    }

    #[test]
    fn empty_array_is_accepted_by_any_array_format() {
        let empty = Value::Array(vec![]);
        assert!(Format::array_of(Format::String).accepts(&empty));
        assert!(Format::array_of(Format::Boolean).accepts(&empty));
    }

    #[test]
    fn array_accepts_checks_elements_individually_rather_than_inferring_one_format() {
        let mixed = Value::Array(vec![Value::Integer(1), Value::Real(2.5)]);
        assert!(Format::array_of(Format::Real).accepts(&mixed));
        assert!(!Format::array_of(Format::Integer).accepts(&mixed));
    }

    #[test]
    fn registry_resolves_primitive_names() {
        let registry = FormatRegistry::new();
        assert_eq!(registry.lookup("real"), Some(Format::Real));
        assert_eq!(registry.lookup("nonexistent"), None);
    }
}
