//! Property values and field-type coercion.
//!
//! # Responsibility
//! - Define the heterogeneous value carried by record properties.
//! - Validate/convert raw input against a declared `FieldType`.
//!
//! # Invariants
//! - `PropertyValue::Number` is always finite after coercion.
//! - Coercion never mutates anything; it either returns a value or fails.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TEXT_MAX_CHARS: usize = 255;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Value held by one property or grid cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    YesNo(bool),
    ListRef(String),
}

impl PropertyValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) | Self::ListRef(value) => Some(value),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::YesNo(_) => "yes_no",
            Self::ListRef(_) => "list_ref",
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("<null>"),
            Self::Text(value) | Self::ListRef(value) => f.write_str(value),
            Self::Number(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{}", value.format(DATE_FORMAT)),
            Self::YesNo(true) => f.write_str("Y"),
            Self::YesNo(false) => f.write_str("N"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::YesNo(value)
    }
}

impl From<NaiveDate> for PropertyValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Declared type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    LongText,
    Number,
    Date,
    YesNo,
    List,
}

/// Value rejected by a field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },
    Unparseable {
        field: String,
        expected: FieldType,
        input: String,
    },
    NotFinite {
        field: String,
    },
    TooLong {
        field: String,
        max_chars: usize,
    },
    Mandatory {
        field: String,
    },
    NotAllowed {
        field: String,
        value: String,
    },
    ReadOnly {
        field: String,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch {
                field,
                expected,
                actual,
            } => write!(f, "field `{field}` expects {expected:?}, got {actual}"),
            Self::Unparseable {
                field,
                expected,
                input,
            } => write!(f, "field `{field}` cannot read `{input}` as {expected:?}"),
            Self::NotFinite { field } => write!(f, "field `{field}` requires a finite number"),
            Self::TooLong { field, max_chars } => {
                write!(f, "field `{field}` is limited to {max_chars} characters")
            }
            Self::Mandatory { field } => write!(f, "field `{field}` is mandatory"),
            Self::NotAllowed { field, value } => {
                write!(f, "`{value}` is not an allowed value for field `{field}`")
            }
            Self::ReadOnly { field } => write!(f, "field `{field}` is read-only"),
        }
    }
}

impl Error for ValidationError {}

/// Coercion options derived from a field declaration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoercionRules<'a> {
    pub mandatory: bool,
    pub allowed_values: &'a [String],
}

impl FieldType {
    /// Validates and converts `raw` into this type's canonical value.
    ///
    /// # Errors
    /// Returns `ValidationError` naming `field` when the input cannot be
    /// represented by this type.
    pub fn coerce(
        self,
        field: &str,
        raw: PropertyValue,
        rules: CoercionRules<'_>,
    ) -> Result<PropertyValue, ValidationError> {
        if raw.is_null() {
            if rules.mandatory {
                return Err(ValidationError::Mandatory {
                    field: field.to_string(),
                });
            }
            return Ok(PropertyValue::Null);
        }

        match self {
            Self::Text | Self::LongText => {
                let text = match raw {
                    PropertyValue::Text(value) | PropertyValue::ListRef(value) => value,
                    other => other.to_string(),
                };
                if self == Self::Text && text.chars().count() > TEXT_MAX_CHARS {
                    return Err(ValidationError::TooLong {
                        field: field.to_string(),
                        max_chars: TEXT_MAX_CHARS,
                    });
                }
                Ok(PropertyValue::Text(text))
            }
            Self::Number => {
                let number = match raw {
                    PropertyValue::Number(value) => value,
                    PropertyValue::Text(input) => input.trim().parse::<f64>().map_err(|_| {
                        ValidationError::Unparseable {
                            field: field.to_string(),
                            expected: self,
                            input,
                        }
                    })?,
                    other => return Err(mismatch(field, self, &other)),
                };
                if !number.is_finite() {
                    return Err(ValidationError::NotFinite {
                        field: field.to_string(),
                    });
                }
                Ok(PropertyValue::Number(number))
            }
            Self::Date => match raw {
                PropertyValue::Date(value) => Ok(PropertyValue::Date(value)),
                PropertyValue::Text(input) => NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
                    .map(PropertyValue::Date)
                    .map_err(|_| ValidationError::Unparseable {
                        field: field.to_string(),
                        expected: self,
                        input,
                    }),
                other => Err(mismatch(field, self, &other)),
            },
            Self::YesNo => match raw {
                PropertyValue::YesNo(value) => Ok(PropertyValue::YesNo(value)),
                PropertyValue::Text(input) => match input.trim().to_ascii_lowercase().as_str() {
                    "y" | "true" => Ok(PropertyValue::YesNo(true)),
                    "n" | "false" => Ok(PropertyValue::YesNo(false)),
                    _ => Err(ValidationError::Unparseable {
                        field: field.to_string(),
                        expected: self,
                        input,
                    }),
                },
                other => Err(mismatch(field, self, &other)),
            },
            Self::List => {
                let reference = match raw {
                    PropertyValue::ListRef(value) | PropertyValue::Text(value) => value,
                    other => return Err(mismatch(field, self, &other)),
                };
                let reference = reference.trim().to_string();
                if reference.is_empty() {
                    if rules.mandatory {
                        return Err(ValidationError::Mandatory {
                            field: field.to_string(),
                        });
                    }
                    return Ok(PropertyValue::Null);
                }
                if !rules.allowed_values.is_empty()
                    && !rules.allowed_values.iter().any(|allowed| *allowed == reference)
                {
                    return Err(ValidationError::NotAllowed {
                        field: field.to_string(),
                        value: reference,
                    });
                }
                Ok(PropertyValue::ListRef(reference))
            }
        }
    }
}

fn mismatch(field: &str, expected: FieldType, actual: &PropertyValue) -> ValidationError {
    ValidationError::TypeMismatch {
        field: field.to_string(),
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::{CoercionRules, FieldType, PropertyValue, ValidationError};
    use chrono::NaiveDate;

    fn coerce(kind: FieldType, raw: PropertyValue) -> Result<PropertyValue, ValidationError> {
        kind.coerce("f", raw, CoercionRules::default())
    }

    #[test]
    fn number_accepts_numeric_text_and_rejects_nan() {
        assert_eq!(
            coerce(FieldType::Number, PropertyValue::text(" 12.5 ")).unwrap(),
            PropertyValue::Number(12.5)
        );
        assert!(matches!(
            coerce(FieldType::Number, PropertyValue::Number(f64::NAN)).unwrap_err(),
            ValidationError::NotFinite { .. }
        ));
        assert!(matches!(
            coerce(FieldType::Number, PropertyValue::YesNo(true)).unwrap_err(),
            ValidationError::TypeMismatch { actual: "yes_no", .. }
        ));
    }

    #[test]
    fn date_and_yes_no_parse_text() {
        assert_eq!(
            coerce(FieldType::Date, PropertyValue::text("2016-03-01")).unwrap(),
            PropertyValue::Date(NaiveDate::from_ymd_opt(2016, 3, 1).unwrap())
        );
        assert!(coerce(FieldType::Date, PropertyValue::text("01.03.2016")).is_err());
        assert_eq!(
            coerce(FieldType::YesNo, PropertyValue::text("Y")).unwrap(),
            PropertyValue::YesNo(true)
        );
    }

    #[test]
    fn text_is_capped_but_long_text_is_not() {
        let long = "x".repeat(300);
        assert!(matches!(
            coerce(FieldType::Text, PropertyValue::text(long.clone())).unwrap_err(),
            ValidationError::TooLong { max_chars: 255, .. }
        ));
        assert!(coerce(FieldType::LongText, PropertyValue::text(long)).is_ok());
    }

    #[test]
    fn list_enforces_allowed_values_and_mandatory() {
        let allowed = vec!["EUR".to_string(), "CHF".to_string()];
        let rules = CoercionRules {
            mandatory: true,
            allowed_values: &allowed,
        };
        assert_eq!(
            FieldType::List
                .coerce("currency", PropertyValue::text("CHF"), rules)
                .unwrap(),
            PropertyValue::ListRef("CHF".to_string())
        );
        assert!(matches!(
            FieldType::List
                .coerce("currency", PropertyValue::text("USD"), rules)
                .unwrap_err(),
            ValidationError::NotAllowed { .. }
        ));
        assert!(matches!(
            FieldType::List
                .coerce("currency", PropertyValue::Null, rules)
                .unwrap_err(),
            ValidationError::Mandatory { .. }
        ));
    }

    #[test]
    fn values_serialize_as_tagged_objects() {
        let json = serde_json::to_value(PropertyValue::Number(3.0)).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["value"], 3.0);
    }
}
