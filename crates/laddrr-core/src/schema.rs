//! Declared shapes for flow inputs and outputs.
//!
//! A [`Schema`] is an ordered set of named fields. It validates a JSON value
//! (collecting every violation rather than stopping at the first) and can be
//! rendered as a JSON Schema document for the completion backend.
//!
//! Validation is strict: fields the schema does not declare are violations,
//! and `null` is treated the same as an absent field.

use serde_json::{json, Map, Value};

use crate::error::Violation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String {
        non_empty: bool,
        one_of: Vec<String>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Boolean,
    Array {
        items: Box<FieldSchema>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    Object(Schema),
}

impl FieldType {
    fn json_type(&self) -> &'static str {
        match self {
            FieldType::String { .. } => "string",
            FieldType::Number { .. } => "number",
            FieldType::Integer { .. } => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array { .. } => "array",
            FieldType::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub ty: FieldType,
    pub required: bool,
    pub description: Option<String>,
}

impl FieldSchema {
    fn of(ty: FieldType) -> Self {
        Self {
            ty,
            required: true,
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String {
            non_empty: false,
            one_of: Vec::new(),
        })
    }

    pub fn number() -> Self {
        Self::of(FieldType::Number {
            min: None,
            max: None,
        })
    }

    pub fn integer() -> Self {
        Self::of(FieldType::Integer {
            min: None,
            max: None,
        })
    }

    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    pub fn array(items: FieldSchema) -> Self {
        Self::of(FieldType::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        })
    }

    pub fn object(schema: Schema) -> Self {
        Self::of(FieldType::Object(schema))
    }

    /// Reject empty or whitespace-only strings.
    pub fn non_empty(mut self) -> Self {
        if let FieldType::String { non_empty, .. } = &mut self.ty {
            *non_empty = true;
        }
        self
    }

    /// Restrict a string field to a fixed set of values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let FieldType::String { one_of, .. } = &mut self.ty {
            *one_of = values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Inclusive bounds for number and integer fields.
    pub fn range(mut self, lo: f64, hi: f64) -> Self {
        match &mut self.ty {
            FieldType::Number { min, max } => {
                *min = Some(lo);
                *max = Some(hi);
            }
            FieldType::Integer { min, max } => {
                *min = Some(lo as i64);
                *max = Some(hi as i64);
            }
            _ => {}
        }
        self
    }

    /// Inclusive element-count bounds for array fields.
    pub fn items(mut self, lo: Option<usize>, hi: Option<usize>) -> Self {
        if let FieldType::Array {
            min_items,
            max_items,
            ..
        } = &mut self.ty
        {
            *min_items = lo;
            *max_items = hi;
        }
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), json!(self.ty.json_type()));
        if let Some(d) = &self.description {
            out.insert("description".into(), json!(d));
        }
        match &self.ty {
            FieldType::String { non_empty, one_of } => {
                if *non_empty {
                    out.insert("minLength".into(), json!(1));
                }
                if !one_of.is_empty() {
                    out.insert("enum".into(), json!(one_of));
                }
            }
            FieldType::Number { min, max } => {
                if let Some(m) = min {
                    out.insert("minimum".into(), json!(m));
                }
                if let Some(m) = max {
                    out.insert("maximum".into(), json!(m));
                }
            }
            FieldType::Integer { min, max } => {
                if let Some(m) = min {
                    out.insert("minimum".into(), json!(m));
                }
                if let Some(m) = max {
                    out.insert("maximum".into(), json!(m));
                }
            }
            FieldType::Boolean => {}
            FieldType::Array {
                items,
                min_items,
                max_items,
            } => {
                out.insert("items".into(), items.to_json_schema());
                if let Some(m) = min_items {
                    out.insert("minItems".into(), json!(m));
                }
                if let Some(m) = max_items {
                    out.insert("maxItems".into(), json!(m));
                }
            }
            FieldType::Object(schema) => {
                if let Value::Object(inner) = schema.to_json_schema() {
                    out.extend(inner);
                }
            }
        }
        Value::Object(out)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, FieldSchema)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, schema: FieldSchema) -> Self {
        self.fields.push((name.into(), schema));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.fields.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Validate `value` against this schema, returning every violation found.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<Violation>> {
        let mut out = Vec::new();
        self.validate_at(value, "", &mut out);
        if out.is_empty() {
            Ok(())
        } else {
            Err(out)
        }
    }

    fn validate_at(&self, value: &Value, path: &str, out: &mut Vec<Violation>) {
        let Some(obj) = value.as_object() else {
            out.push(violation(path, format!("expected an object, found {}", kind(value))));
            return;
        };

        for (name, field) in &self.fields {
            let field_path = child_path(path, name);
            match obj.get(name) {
                None | Some(Value::Null) => {
                    if field.required {
                        out.push(violation(&field_path, "is required"));
                    }
                }
                Some(v) => validate_field(&field.ty, v, &field_path, out),
            }
        }

        for key in obj.keys() {
            if !self.has_field(key) {
                out.push(violation(&child_path(path, key), "unknown field"));
            }
        }
    }

    /// Render as a JSON Schema object with `additionalProperties: false`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, field) in &self.fields {
            properties.insert(name.clone(), field.to_json_schema());
            if field.required {
                required.push(json!(name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

fn validate_field(ty: &FieldType, value: &Value, path: &str, out: &mut Vec<Violation>) {
    match ty {
        FieldType::String { non_empty, one_of } => {
            let Some(s) = value.as_str() else {
                out.push(type_mismatch(path, "a string", value));
                return;
            };
            if *non_empty && s.trim().is_empty() {
                out.push(violation(path, "must not be empty"));
            }
            if !one_of.is_empty() && !one_of.iter().any(|o| o == s) {
                out.push(violation(
                    path,
                    format!("must be one of: {}", one_of.join(", ")),
                ));
            }
        }
        FieldType::Number { min, max } => {
            let Some(n) = value.as_f64() else {
                out.push(type_mismatch(path, "a number", value));
                return;
            };
            check_bounds(path, n, *min, *max, out);
        }
        FieldType::Integer { min, max } => {
            let Some(n) = value.as_i64() else {
                out.push(type_mismatch(path, "an integer", value));
                return;
            };
            check_bounds(path, n, *min, *max, out);
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                out.push(type_mismatch(path, "a boolean", value));
            }
        }
        FieldType::Array {
            items,
            min_items,
            max_items,
        } => {
            let Some(arr) = value.as_array() else {
                out.push(type_mismatch(path, "an array", value));
                return;
            };
            if let Some(lo) = min_items {
                if arr.len() < *lo {
                    out.push(violation(
                        path,
                        format!("must have at least {lo} item(s), found {}", arr.len()),
                    ));
                }
            }
            if let Some(hi) = max_items {
                if arr.len() > *hi {
                    out.push(violation(
                        path,
                        format!("must have at most {hi} item(s), found {}", arr.len()),
                    ));
                }
            }
            for (i, item) in arr.iter().enumerate() {
                validate_field(&items.ty, item, &format!("{path}[{i}]"), out);
            }
        }
        FieldType::Object(schema) => schema.validate_at(value, path, out),
    }
}

fn check_bounds<T>(path: &str, n: T, min: Option<T>, max: Option<T>, out: &mut Vec<Violation>)
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if let Some(lo) = min {
        if n < lo {
            out.push(violation(path, format!("must be >= {lo}")));
        }
    }
    if let Some(hi) = max {
        if n > hi {
            out.push(violation(path, format!("must be <= {hi}")));
        }
    }
}

fn violation(path: &str, reason: impl Into<String>) -> Violation {
    Violation {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn type_mismatch(path: &str, expected: &str, found: &Value) -> Violation {
    violation(path, format!("expected {expected}, found {}", kind(found)))
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn question_schema() -> Schema {
        Schema::new()
            .field("questionText", FieldSchema::string().non_empty())
            .field("reasoning", FieldSchema::string().non_empty())
            .field("isCustom", FieldSchema::boolean().optional())
    }

    fn survey_output() -> Schema {
        Schema::new().field(
            "questions",
            FieldSchema::array(FieldSchema::object(question_schema())).items(Some(1), Some(3)),
        )
    }

    fn paths(errs: &[Violation]) -> Vec<&str> {
        errs.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn accepts_conforming_value() {
        let v = json!({
            "questions": [{ "questionText": "How are you?", "reasoning": "Baseline." }]
        });
        assert!(survey_output().validate(&v).is_ok());
    }

    #[test]
    fn reports_nested_paths() {
        let v = json!({
            "questions": [
                { "questionText": "Q1", "reasoning": "R1" },
                { "questionText": "  ", "reasoning": 3 }
            ]
        });
        let errs = survey_output().validate(&v).unwrap_err();
        assert_eq!(
            paths(&errs),
            vec!["questions[1].questionText", "questions[1].reasoning"]
        );
        assert!(errs[1].reason.contains("expected a string, found number"));
    }

    #[test]
    fn missing_required_and_unknown_fields_are_violations() {
        let v = json!({ "extra": true });
        let errs = survey_output().validate(&v).unwrap_err();
        assert_eq!(paths(&errs), vec!["questions", "extra"]);
        assert_eq!(errs[0].reason, "is required");
        assert_eq!(errs[1].reason, "unknown field");
    }

    #[test]
    fn null_counts_as_absent_for_optional_fields() {
        let v = json!({ "questionText": "Q", "reasoning": "R", "isCustom": null });
        assert!(question_schema().validate(&v).is_ok());
    }

    #[test]
    fn enforces_item_bounds() {
        let q = json!({ "questionText": "Q", "reasoning": "R" });
        let too_many = json!({ "questions": [q.clone(), q.clone(), q.clone(), q] });
        let errs = survey_output().validate(&too_many).unwrap_err();
        assert!(errs[0].reason.contains("at most 3"));

        let empty = json!({ "questions": [] });
        let errs = survey_output().validate(&empty).unwrap_err();
        assert!(errs[0].reason.contains("at least 1"));
    }

    #[test]
    fn enum_membership() {
        let s = Schema::new().field(
            "criticality",
            FieldSchema::string().one_of(["Low", "Medium", "High", "Critical"]),
        );
        assert!(s.validate(&json!({ "criticality": "High" })).is_ok());
        let errs = s.validate(&json!({ "criticality": "Severe" })).unwrap_err();
        assert_eq!(errs[0].reason, "must be one of: Low, Medium, High, Critical");
    }

    #[test]
    fn numeric_ranges() {
        let s = Schema::new()
            .field("score", FieldSchema::number().range(1.0, 10.0))
            .field("count", FieldSchema::integer().range(0.0, 5.0));
        assert!(s.validate(&json!({ "score": 7.5, "count": 2 })).is_ok());
        let errs = s.validate(&json!({ "score": 11, "count": 2.5 })).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].reason, "must be <= 10");
        assert!(errs[1].reason.contains("expected an integer"));
    }

    #[test]
    fn rejects_non_object_root() {
        let errs = survey_output().validate(&json!("hello")).unwrap_err();
        assert_eq!(errs[0].path, "");
        assert!(errs[0].reason.contains("expected an object"));
    }

    #[test]
    fn json_schema_rendering() {
        let s = Schema::new()
            .field("tip", FieldSchema::string().non_empty().describe("Tip of the day"))
            .field("tags", FieldSchema::array(FieldSchema::string()).optional());
        let js = s.to_json_schema();
        assert_eq!(js["type"], "object");
        assert_eq!(js["additionalProperties"], false);
        assert_eq!(js["required"], json!(["tip"]));
        assert_eq!(js["properties"]["tip"]["minLength"], 1);
        assert_eq!(js["properties"]["tip"]["description"], "Tip of the day");
        assert_eq!(js["properties"]["tags"]["items"]["type"], "string");
    }
}
