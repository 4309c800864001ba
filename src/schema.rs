//! Structural contracts for tool arguments.
//!
//! A [`Schema`] is an explicit, tagged description of the fields a tool
//! accepts, consumed by a generic validator. Validation is total: every
//! field error is collected in one pass so the model gets a complete
//! diagnostic, and unknown fields are always rejected.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The type tag of a schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// A string, optionally restricted to a fixed set of values.
    String { one_of: Option<Vec<String>> },
    /// An integer with optional inclusive bounds.
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    /// A number with optional inclusive bounds.
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    /// A homogeneous array of the given element type.
    Array(Box<FieldType>),
    /// A nested object with its own contract.
    Object(Schema),
    /// An object with arbitrary keys; values pass through unchecked.
    Map,
    /// Any JSON value; passes through unchecked.
    Any,
}

impl FieldType {
    pub fn string() -> Self {
        FieldType::String { one_of: None }
    }

    /// A string restricted to the given values.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldType::String {
            one_of: Some(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn integer() -> Self {
        FieldType::Integer {
            minimum: None,
            maximum: None,
        }
    }

    /// An integer within the given inclusive bounds.
    pub fn integer_in(minimum: i64, maximum: i64) -> Self {
        FieldType::Integer {
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    pub fn number() -> Self {
        FieldType::Number {
            minimum: None,
            maximum: None,
        }
    }

    /// A number within the given inclusive bounds.
    pub fn number_in(minimum: f64, maximum: f64) -> Self {
        FieldType::Number {
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldType::String { .. } => "string",
            FieldType::Integer { .. } => "integer",
            FieldType::Number { .. } => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array(_) => "array",
            FieldType::Object(_) | FieldType::Map => "object",
            FieldType::Any => "any",
        }
    }

    fn to_json_schema(&self, description: &str) -> Value {
        let mut rendered = match self {
            FieldType::String { one_of: Some(values) } => json!({
                "type": "string",
                "enum": values,
            }),
            FieldType::String { one_of: None } | FieldType::Boolean => {
                json!({ "type": self.name() })
            }
            FieldType::Integer { minimum, maximum } => {
                let mut obj = json!({ "type": "integer" });
                if let Some(min) = minimum {
                    obj["minimum"] = json!(min);
                }
                if let Some(max) = maximum {
                    obj["maximum"] = json!(max);
                }
                obj
            }
            FieldType::Number { minimum, maximum } => {
                let mut obj = json!({ "type": "number" });
                if let Some(min) = minimum {
                    obj["minimum"] = json!(min);
                }
                if let Some(max) = maximum {
                    obj["maximum"] = json!(max);
                }
                obj
            }
            FieldType::Array(element) => json!({
                "type": "array",
                "items": element.to_json_schema(""),
            }),
            FieldType::Object(schema) => schema.to_json_schema(),
            FieldType::Map => json!({ "type": "object" }),
            FieldType::Any => json!({}),
        };
        if !description.is_empty() {
            rendered["description"] = json!(description);
        }
        rendered
    }
}

/// A single named field in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
    /// Filled into the validated output when an optional field is absent.
    pub default: Option<Value>,
}

/// An ordered set of named, typed fields describing a tool's input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field.
    pub fn field<N, D>(mut self, name: N, field_type: FieldType, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            description: description.into(),
            required: true,
            default: None,
        });
        self
    }

    /// Add an optional field.
    pub fn optional<N, D>(mut self, name: N, field_type: FieldType, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            description: description.into(),
            required: false,
            default: None,
        });
        self
    }

    /// Add an optional field with a default used when the model omits it.
    pub fn optional_with_default<N, D>(
        mut self,
        name: N,
        field_type: FieldType,
        description: D,
        default: Value,
    ) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            description: description.into(),
            required: false,
            default: Some(default),
        });
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate a raw argument mapping against this schema.
    ///
    /// On success returns the coerced object with defaults filled in. On
    /// failure returns every field error found, not just the first.
    pub fn validate(&self, raw: &Value) -> Result<Value, ValidationError> {
        let mut errors = Vec::new();
        let validated = match raw.as_object() {
            Some(map) => self.validate_object("", map, &mut errors),
            None => {
                errors.push(FieldError {
                    field: String::new(),
                    kind: FieldErrorKind::TypeMismatch {
                        expected: "object".into(),
                        found: json_type_name(raw).into(),
                    },
                });
                Value::Null
            }
        };
        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(ValidationError { errors })
        }
    }

    fn validate_object(
        &self,
        path: &str,
        raw: &Map<String, Value>,
        errors: &mut Vec<FieldError>,
    ) -> Value {
        let mut out = Map::new();
        for spec in &self.fields {
            let field_path = join_path(path, &spec.name);
            match raw.get(&spec.name) {
                Some(Value::Null) if !spec.required => {}
                Some(value) => {
                    if let Some(coerced) = check_type(&field_path, &spec.field_type, value, errors)
                    {
                        out.insert(spec.name.clone(), coerced);
                    }
                }
                None if spec.required => errors.push(FieldError {
                    field: field_path,
                    kind: FieldErrorKind::Missing,
                }),
                None => {
                    if let Some(default) = &spec.default {
                        out.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }
        // Strict mode: a hallucinated parameter name is an error, not noise.
        for key in raw.keys() {
            if !self.fields.iter().any(|spec| spec.name == *key) {
                errors.push(FieldError {
                    field: join_path(path, key),
                    kind: FieldErrorKind::Unknown,
                });
            }
        }
        Value::Object(out)
    }

    /// Render the contract as a JSON-Schema object for the endpoint's
    /// `tools` parameter.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.fields {
            properties.insert(
                spec.name.clone(),
                spec.field_type.to_json_schema(&spec.description),
            );
            if spec.required {
                required.push(Value::String(spec.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_type(
    path: &str,
    field_type: &FieldType,
    value: &Value,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    match field_type {
        FieldType::String { one_of } => match value.as_str() {
            Some(s) => {
                if let Some(allowed) = one_of {
                    if !allowed.iter().any(|a| a == s) {
                        errors.push(FieldError {
                            field: path.to_string(),
                            kind: FieldErrorKind::NotAllowed {
                                allowed: allowed.clone(),
                            },
                        });
                        return None;
                    }
                }
                Some(Value::String(s.to_string()))
            }
            None => {
                push_mismatch(path, "string", value, errors);
                None
            }
        },
        FieldType::Integer { minimum, maximum } => match value.as_i64() {
            Some(n) => {
                if minimum.is_some_and(|min| n < min) || maximum.is_some_and(|max| n > max) {
                    errors.push(FieldError {
                        field: path.to_string(),
                        kind: FieldErrorKind::OutOfRange {
                            message: range_message(*minimum, *maximum),
                        },
                    });
                    return None;
                }
                Some(json!(n))
            }
            None => {
                push_mismatch(path, "integer", value, errors);
                None
            }
        },
        FieldType::Number { minimum, maximum } => match value.as_f64() {
            Some(n) => {
                if minimum.is_some_and(|min| n < min) || maximum.is_some_and(|max| n > max) {
                    errors.push(FieldError {
                        field: path.to_string(),
                        kind: FieldErrorKind::OutOfRange {
                            message: range_message(*minimum, *maximum),
                        },
                    });
                    return None;
                }
                Some(value.clone())
            }
            None => {
                push_mismatch(path, "number", value, errors);
                None
            }
        },
        FieldType::Boolean => match value.as_bool() {
            Some(b) => Some(Value::Bool(b)),
            None => {
                push_mismatch(path, "boolean", value, errors);
                None
            }
        },
        FieldType::Array(element) => match value.as_array() {
            Some(items) => {
                let before = errors.len();
                let coerced: Vec<Value> = items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, item)| {
                        check_type(&format!("{path}[{i}]"), element, item, errors)
                    })
                    .collect();
                (errors.len() == before).then_some(Value::Array(coerced))
            }
            None => {
                push_mismatch(path, "array", value, errors);
                None
            }
        },
        FieldType::Object(schema) => match value.as_object() {
            Some(map) => {
                let before = errors.len();
                let coerced = schema.validate_object(path, map, errors);
                (errors.len() == before).then_some(coerced)
            }
            None => {
                push_mismatch(path, "object", value, errors);
                None
            }
        },
        FieldType::Map => match value.as_object() {
            Some(_) => Some(value.clone()),
            None => {
                push_mismatch(path, "object", value, errors);
                None
            }
        },
        FieldType::Any => Some(value.clone()),
    }
}

fn push_mismatch(path: &str, expected: &str, value: &Value, errors: &mut Vec<FieldError>) {
    errors.push(FieldError {
        field: path.to_string(),
        kind: FieldErrorKind::TypeMismatch {
            expected: expected.to_string(),
            found: json_type_name(value).to_string(),
        },
    });
}

fn range_message(minimum: Option<impl fmt::Display>, maximum: Option<impl fmt::Display>) -> String {
    match (minimum, maximum) {
        (Some(min), Some(max)) => format!("must be between {min} and {max}"),
        (Some(min), None) => format!("must be at least {min}"),
        (None, Some(max)) => format!("must be at most {max}"),
        (None, None) => "out of range".to_string(),
    }
}

/// The reason a single field failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldErrorKind {
    Missing,
    Unknown,
    TypeMismatch { expected: String, found: String },
    OutOfRange { message: String },
    NotAllowed { allowed: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = if self.field.is_empty() {
            "arguments"
        } else {
            &self.field
        };
        match &self.kind {
            FieldErrorKind::Missing => write!(f, "`{field}` is required"),
            FieldErrorKind::Unknown => write!(f, "`{field}` is not a known field"),
            FieldErrorKind::TypeMismatch { expected, found } => {
                write!(f, "`{field}` expected {expected}, found {found}")
            }
            FieldErrorKind::OutOfRange { message } => write!(f, "`{field}` {message}"),
            FieldErrorKind::NotAllowed { allowed } => {
                write!(f, "`{field}` must be one of: {}", allowed.join(", "))
            }
        }
    }
}

/// Complete per-field diagnostics for one failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.errors.iter().map(FieldError::to_string).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

impl std::error::Error for ValidationError {}
