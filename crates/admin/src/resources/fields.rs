//! Form field definitions for resource edit pages.
//!
//! Browsers post every field as text. [`parse_form`] turns the submitted
//! pairs into the JSON shape the resource's input type deserializes from, and
//! [`form_values`] goes the other way for pre-filling an edit form from a
//! stored record.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

/// `datetime-local` input format.
const DATETIME_LOCAL: &str = "%Y-%m-%dT%H:%M";

/// How a field is entered and encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Url,
    Password,
    Textarea,
    /// Whole number.
    Integer,
    /// Money or other exact decimal, sent on as a string.
    Decimal,
    Checkbox,
    /// One of a fixed set of `(value, label)` pairs.
    Select(Vec<(&'static str, &'static str)>),
    /// Comma-separated list of strings.
    List,
    /// UTC timestamp entered with a `datetime-local` input.
    DateTime,
    Date,
    /// Raw JSON (objects and arrays).
    Json,
    /// Reference to another record by numeric ID.
    Reference,
}

impl FieldKind {
    /// Build a select from a status enum's `(as_str, label)` pairs.
    pub fn select<T: Copy>(
        variants: &[T],
        value: impl Fn(T) -> &'static str,
        label: impl Fn(T) -> &'static str,
    ) -> Self {
        Self::Select(variants.iter().map(|&v| (value(v), label(v))).collect())
    }

    /// The HTML input type or element name for templates.
    #[must_use]
    pub const fn input(&self) -> &'static str {
        match self {
            Self::Text | Self::List => "text",
            Self::Email => "email",
            Self::Url => "url",
            Self::Password => "password",
            Self::Textarea | Self::Json => "textarea",
            Self::Integer | Self::Decimal | Self::Reference => "number",
            Self::Checkbox => "checkbox",
            Self::Select(_) => "select",
            Self::DateTime => "datetime-local",
            Self::Date => "date",
        }
    }

    /// `step` attribute for number inputs.
    #[must_use]
    pub const fn step(&self) -> Option<&'static str> {
        match self {
            Self::Decimal => Some("0.01"),
            Self::Integer | Self::Reference => Some("1"),
            _ => None,
        }
    }
}

/// One input on a resource form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub help: Option<&'static str>,
}

impl Field {
    #[must_use]
    pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            help: None,
        }
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

/// A field ready for rendering.
#[derive(Debug, Clone)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub input: &'static str,
    pub step: Option<&'static str>,
    pub required: bool,
    pub help: Option<&'static str>,
    pub value: String,
    pub checked: bool,
    /// `(value, label, selected)` for selects.
    pub options: Vec<(&'static str, &'static str, bool)>,
}

impl FormField {
    /// Render `field` with its current text value.
    #[must_use]
    pub fn new(field: &Field, value: Option<&str>) -> Self {
        let value = value.unwrap_or_default().to_string();
        let options = match &field.kind {
            FieldKind::Select(options) => options
                .iter()
                .map(|&(v, label)| (v, label, v == value))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            name: field.name,
            label: field.label,
            input: field.kind.input(),
            step: field.kind.step(),
            required: field.required,
            help: field.help,
            checked: field.kind == FieldKind::Checkbox && is_checked(&value),
            value,
            options,
        }
    }

    #[must_use]
    pub fn is_textarea(&self) -> bool {
        self.input == "textarea"
    }

    #[must_use]
    pub fn is_select(&self) -> bool {
        self.input == "select"
    }

    #[must_use]
    pub fn is_checkbox(&self) -> bool {
        self.input == "checkbox"
    }
}

/// A submitted field that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{label}: {message}")]
pub struct FieldError {
    pub label: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &Field, message: impl Into<String>) -> Self {
        Self {
            label: field.label,
            message: message.into(),
        }
    }
}

fn is_checked(value: &str) -> bool {
    matches!(value, "on" | "true" | "1" | "yes")
}

/// Collapse repeated keys; the last value wins.
#[must_use]
pub fn pair_map(pairs: &[(String, String)]) -> HashMap<&str, &str> {
    pairs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

/// Convert submitted form pairs into a JSON object for `fields`.
///
/// Blank optional fields are left out so the input type's serde defaults
/// apply. Unchecked checkboxes are absent from the form and become `false`.
///
/// # Errors
///
/// Returns the first [`FieldError`] for a missing required value or a value
/// that does not parse for its kind.
pub fn parse_form(fields: &[Field], pairs: &[(String, String)]) -> Result<Value, FieldError> {
    let submitted = pair_map(pairs);
    let mut object = Map::new();

    for field in fields {
        let raw = submitted.get(field.name).map_or("", |v| v.trim());

        if field.kind == FieldKind::Checkbox {
            object.insert(field.name.to_string(), Value::Bool(is_checked(raw)));
            continue;
        }
        if raw.is_empty() {
            if field.required {
                return Err(FieldError::new(field, "is required"));
            }
            continue;
        }
        object.insert(field.name.to_string(), parse_value(field, raw)?);
    }

    Ok(Value::Object(object))
}

fn parse_value(field: &Field, raw: &str) -> Result<Value, FieldError> {
    let value = match &field.kind {
        FieldKind::Text
        | FieldKind::Email
        | FieldKind::Url
        | FieldKind::Password
        | FieldKind::Textarea => Value::String(raw.to_string()),
        FieldKind::Integer | FieldKind::Reference => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| FieldError::new(field, "must be a whole number"))?,
        FieldKind::Decimal => raw
            .parse::<Decimal>()
            .map(|d| Value::String(d.to_string()))
            .map_err(|_| FieldError::new(field, "must be a number"))?,
        FieldKind::Select(options) => {
            if !options.iter().any(|&(v, _)| v == raw) {
                return Err(FieldError::new(field, format!("unknown option {raw}")));
            }
            Value::String(raw.to_string())
        }
        FieldKind::List => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        FieldKind::DateTime => {
            let parsed = NaiveDateTime::parse_from_str(raw, DATETIME_LOCAL)
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
                .map_err(|_| FieldError::new(field, "must be a date and time"))?;
            Value::String(parsed.and_utc().to_rfc3339())
        }
        FieldKind::Date => {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| FieldError::new(field, "must be a date (YYYY-MM-DD)"))?;
            Value::String(raw.to_string())
        }
        FieldKind::Json => serde_json::from_str(raw)
            .map_err(|e| FieldError::new(field, format!("invalid JSON: {e}")))?,
        FieldKind::Checkbox => Value::Bool(is_checked(raw)),
    };
    Ok(value)
}

/// Text values for pre-filling `fields` from a serialized record.
#[must_use]
pub fn form_values(fields: &[Field], record: &Value) -> HashMap<&'static str, String> {
    fields
        .iter()
        .filter(|field| field.kind != FieldKind::Password)
        .filter_map(|field| {
            let value = record.get(field.name)?;
            Some((field.name, display_value(&field.kind, value)))
        })
        .collect()
}

fn display_value(kind: &FieldKind, value: &Value) -> String {
    match (kind, value) {
        (_, Value::Null) => String::new(),
        (FieldKind::Checkbox, Value::Bool(b)) => (if *b { "on" } else { "" }).to_string(),
        (FieldKind::List, Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        (FieldKind::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc).format(DATETIME_LOCAL).to_string())
            .unwrap_or_else(|_| s.clone()),
        (FieldKind::Json, other) => {
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
        }
        (_, Value::String(s)) => s.clone(),
        (_, other) => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fields() -> Vec<Field> {
        vec![
            Field::new("name", "Name", FieldKind::Text).required(),
            Field::new("description", "Description", FieldKind::Textarea),
            Field::new("price", "Price", FieldKind::Decimal).required(),
            Field::new("warranty_months", "Warranty", FieldKind::Integer),
            Field::new("is_active", "Active", FieldKind::Checkbox),
            Field::new("status", "Status", FieldKind::Select(vec![("draft", "Draft"), ("active", "Active")])),
            Field::new("options", "Options", FieldKind::List),
            Field::new("starts_at", "Starts", FieldKind::DateTime),
            Field::new("attributes", "Attributes", FieldKind::Json),
        ]
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_parse_form_encodes_each_kind() {
        let json = parse_form(
            &fields(),
            &pairs(&[
                ("name", " Lamp "),
                ("description", ""),
                ("price", "19.90"),
                ("warranty_months", "12"),
                ("status", "active"),
                ("options", "red, green,,blue"),
                ("starts_at", "2026-03-01T09:30"),
                ("attributes", r#"{"material": "oak"}"#),
            ]),
        )
        .unwrap();

        assert_eq!(json["name"], "Lamp");
        assert!(json.get("description").is_none());
        assert_eq!(json["price"], "19.90");
        assert_eq!(json["warranty_months"], 12);
        assert_eq!(json["is_active"], false);
        assert_eq!(json["options"], serde_json::json!(["red", "green", "blue"]));
        assert_eq!(json["starts_at"], "2026-03-01T09:30:00+00:00");
        assert_eq!(json["attributes"]["material"], "oak");
    }

    #[test]
    fn test_required_field_missing() {
        let err = parse_form(&fields(), &pairs(&[("name", "Lamp")])).unwrap_err();
        assert_eq!(err.to_string(), "Price: is required");
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let err = parse_form(&fields(), &pairs(&[("name", "x"), ("price", "cheap")])).unwrap_err();
        assert_eq!(err.label, "Price");

        let err = parse_form(
            &fields(),
            &pairs(&[("name", "x"), ("price", "1"), ("status", "deleted")]),
        )
        .unwrap_err();
        assert_eq!(err.message, "unknown option deleted");
    }

    #[test]
    fn test_checkbox_on() {
        let json = parse_form(
            &fields(),
            &pairs(&[("name", "x"), ("price", "1"), ("is_active", "on")]),
        )
        .unwrap();
        assert_eq!(json["is_active"], true);
    }

    #[test]
    fn test_form_values_from_record() {
        let record = serde_json::json!({
            "name": "Lamp",
            "price": "19.90",
            "warranty_months": 12,
            "is_active": true,
            "options": ["red", "blue"],
            "starts_at": "2026-03-01T09:30:00Z",
            "description": null,
        });
        let values = form_values(&fields(), &record);
        assert_eq!(values["price"], "19.90");
        assert_eq!(values["warranty_months"], "12");
        assert_eq!(values["is_active"], "on");
        assert_eq!(values["options"], "red, blue");
        assert_eq!(values["starts_at"], "2026-03-01T09:30");
        assert_eq!(values["description"], "");
    }

    #[test]
    fn test_form_field_marks_selected_option() {
        let field = Field::new("status", "Status", FieldKind::Select(vec![("draft", "Draft"), ("active", "Active")]));
        let form_field = FormField::new(&field, Some("active"));
        assert!(form_field.is_select());
        assert_eq!(form_field.options[1], ("active", "Active", true));
        assert!(!form_field.options[0].2);
    }
}
