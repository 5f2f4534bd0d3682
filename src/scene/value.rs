//! Attribuutwaarden en -schema's zoals de scene ze opslaat.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Beschikbare waardetypes voor attributen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Een enkele numerieke waarde (double).
    Number(f64),
    /// Een booleaanse waarde.
    Boolean(bool),
    /// Een geheel getal, ook gebruikt als enum-index.
    Integer(i64),
    /// Vrije tekst.
    Text(String),
}

impl Value {
    /// Geeft de variantnaam terug. Wordt gebruikt in foutmeldingen.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Number(_) => ValueKind::Number,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Scalaire lezing zoals een expressie of verbinding die ziet:
    /// booleans worden 0/1, tekst is geen scalar.
    pub fn as_scalar(&self) -> Result<f64, ValueError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Integer(value) => Ok(*value as f64),
            Self::Boolean(value) => Ok(if *value { 1.0 } else { 0.0 }),
            Self::Text(_) => Err(ValueError::type_mismatch("scalar", self.kind())),
        }
    }

    /// Zet de waarde om naar het gevraagde attribuuttype.
    pub fn coerce_to(&self, ty: &AttrType) -> Result<Self, ValueError> {
        match ty {
            AttrType::Text => match self {
                Self::Text(text) => Ok(Self::Text(text.clone())),
                other => Err(ValueError::type_mismatch("Text", other.kind())),
            },
            AttrType::Double => self.as_scalar().map(Self::Number),
            AttrType::Bool => self.as_scalar().map(|v| Self::Boolean(v != 0.0)),
            #[allow(clippy::cast_possible_truncation)]
            AttrType::Integer | AttrType::Enum(_) => self.as_scalar().map(|v| Self::Integer(v.round() as i64)),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "\"{v}\""),
        }
    }
}

/// Beschrijft het type van een [`Value`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Boolean,
    Integer,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::Text => "Text",
        };
        f.write_str(name)
    }
}

/// Fouten bij het interpreteren van waarden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    TypeMismatch { expected: &'static str, found: ValueKind },
}

impl ValueError {
    #[must_use]
    pub fn type_mismatch(expected: &'static str, found: ValueKind) -> Self {
        Self::TypeMismatch { expected, found }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "verwachtte type {expected}, maar kreeg {found}")
            }
        }
    }
}

impl std::error::Error for ValueError {}

/// Type van een attribuut. `Enum` draagt de labels mee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    Double,
    Bool,
    Integer,
    Enum(Vec<String>),
    Text,
}

/// Declaratie van een attribuut: naam, type, standaardwaarde en grenzen.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name: String,
    pub ty: AttrType,
    pub default: Value,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub keyable: bool,
}

impl AttributeSpec {
    #[must_use]
    pub fn double(name: impl Into<String>, default: f64) -> Self {
        Self {
            name: name.into(),
            ty: AttrType::Double,
            default: Value::Number(default),
            min: None,
            max: None,
            keyable: true,
        }
    }

    #[must_use]
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            ty: AttrType::Bool,
            default: Value::Boolean(default),
            min: None,
            max: None,
            keyable: true,
        }
    }

    #[must_use]
    pub fn integer(name: impl Into<String>, default: i64) -> Self {
        Self {
            name: name.into(),
            ty: AttrType::Integer,
            default: Value::Integer(default),
            min: None,
            max: None,
            keyable: false,
        }
    }

    /// Enum zonder functie, alleen als kopje in de channel box.
    #[must_use]
    pub fn separator(name: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            name: name.into(),
            ty: AttrType::Enum(labels.iter().map(|label| (*label).to_owned()).collect()),
            default: Value::Integer(0),
            min: None,
            max: None,
            keyable: true,
        }
    }

    #[must_use]
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn is_separator(&self) -> bool {
        matches!(self.ty, AttrType::Enum(_))
    }

    /// Valideert en normaliseert een nieuwe waarde tegen deze declaratie.
    pub fn accept(&self, value: &Value) -> Result<Value, AttributeError> {
        let coerced = value.coerce_to(&self.ty).map_err(AttributeError::Value)?;
        if let Value::Number(v) = coerced {
            if !v.is_finite() {
                return Err(AttributeError::NonFinite);
            }
            let below = self.min.is_some_and(|min| v < min);
            let above = self.max.is_some_and(|max| v > max);
            if below || above {
                return Err(AttributeError::OutOfRange {
                    value: v,
                    min: self.min,
                    max: self.max,
                });
            }
        }
        if let (AttrType::Enum(labels), Value::Integer(index)) = (&self.ty, &coerced) {
            if usize::try_from(*index).map_or(true, |i| i >= labels.len()) {
                return Err(AttributeError::OutOfRange {
                    value: *index as f64,
                    min: Some(0.0),
                    max: Some(labels.len().saturating_sub(1) as f64),
                });
            }
        }
        Ok(coerced)
    }
}

/// Redenen waarom een attribuutwaarde geweigerd wordt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeError {
    Value(ValueError),
    NonFinite,
    OutOfRange { value: f64, min: Option<f64>, max: Option<f64> },
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(err) => err.fmt(f),
            Self::NonFinite => f.write_str("waarde moet een eindig getal zijn"),
            Self::OutOfRange { value, min, max } => {
                write!(f, "waarde {value} valt buiten bereik [{min:?}, {max:?}]")
            }
        }
    }
}

impl std::error::Error for AttributeError {}

/// Een attribuut op een node: declaratie, huidige waarde en lock-status.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub spec: AttributeSpec,
    pub value: Value,
    pub locked: bool,
}

impl Attribute {
    #[must_use]
    pub fn new(spec: AttributeSpec) -> Self {
        let value = spec.default.clone();
        Self {
            spec,
            value,
            locked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_number_to_bool() {
        assert_eq!(Value::Number(0.0).coerce_to(&AttrType::Bool), Ok(Value::Boolean(false)));
        assert_eq!(Value::Number(2.5).coerce_to(&AttrType::Bool), Ok(Value::Boolean(true)));
    }

    #[test]
    fn text_is_not_a_scalar() {
        let err = Value::Text("x".into()).as_scalar().unwrap_err();
        assert_eq!(err, ValueError::type_mismatch("scalar", ValueKind::Text));
    }

    #[test]
    fn range_is_enforced() {
        let spec = AttributeSpec::double("falloff_X", 0.0).with_range(0.0, 10.0);
        assert_eq!(spec.accept(&Value::Number(4.0)), Ok(Value::Number(4.0)));
        assert!(matches!(
            spec.accept(&Value::Number(11.0)),
            Err(AttributeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn separator_only_accepts_known_labels() {
        let spec = AttributeSpec::separator("parameter_X", &["X"]);
        assert!(spec.is_separator());
        assert!(spec.accept(&Value::Integer(0)).is_ok());
        assert!(spec.accept(&Value::Integer(1)).is_err());
    }
}
