//! crates/review_core/src/validation.rs
//!
//! A small schema-driven validator. A schema is a static list of fields, each
//! with an ordered list of rules; `validate` walks a JSON value against it and
//! collects every violation instead of stopping at the first bad field.
//!
//! Within one field, rules run in order and the first failure wins, so an empty
//! email reports "should not be empty" and not also "must be an email".

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use uuid::Uuid;

/// One constraint applied to a field value.
pub enum Rule {
    NotEmpty,
    /// Not empty once surrounding whitespace is removed.
    NotBlank,
    Email,
    Uuid,
    OneOf(&'static [&'static str]),
    /// A field-local predicate.
    Check {
        test: fn(&str) -> bool,
        message: &'static str,
    },
    /// A predicate over this field and a sibling field of the same object.
    Relation {
        other: &'static str,
        test: fn(&str, &str) -> bool,
        message: &'static str,
    },
    /// The field is an array of objects, each validated against `items`.
    Array(&'static [Field]),
}

pub struct Field {
    pub name: &'static str,
    pub rules: &'static [Rule],
}

pub type Schema = &'static [Field];

/// Validates `value` against `schema`, returning all violation messages.
pub fn validate(schema: &[Field], value: &Value) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();
    match value.as_object() {
        Some(object) => validate_object(schema, object, "", &mut violations),
        None => violations.push("body must be an object".to_string()),
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn validate_object(schema: &[Field], object: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for field in schema {
        let path = format!("{}{}", prefix, field.name);
        let value = object.get(field.name).unwrap_or(&Value::Null);

        if let Some(Rule::Array(items)) = field.rules.first() {
            validate_array(items, value, &path, out);
            continue;
        }

        let text = match value {
            Value::String(s) => s.as_str(),
            Value::Null => "",
            _ => {
                out.push(format!("{} must be a string", path));
                continue;
            }
        };

        if let Some(message) = field.rules.iter().find_map(|rule| check(rule, text, object, &path)) {
            out.push(message);
        }
    }
}

fn validate_array(items: &[Field], value: &Value, path: &str, out: &mut Vec<String>) {
    let Some(elements) = value.as_array() else {
        out.push(format!("{} must be an array", path));
        return;
    };
    for (index, element) in elements.iter().enumerate() {
        let element_path = format!("{}[{}]", path, index);
        match element.as_object() {
            Some(object) => validate_object(items, object, &format!("{}.", element_path), out),
            None => out.push(format!("{} must be an object", element_path)),
        }
    }
}

fn check(rule: &Rule, text: &str, object: &Map<String, Value>, path: &str) -> Option<String> {
    let ok = match rule {
        Rule::NotEmpty => !text.is_empty(),
        Rule::NotBlank => !text.trim().is_empty(),
        Rule::Email => email_pattern().is_match(text),
        Rule::Uuid => Uuid::parse_str(text).is_ok(),
        Rule::OneOf(allowed) => allowed.contains(&text),
        Rule::Check { test, .. } => test(text),
        Rule::Relation { other, test, .. } => {
            let other_value = object.get(*other).and_then(Value::as_str).unwrap_or("");
            test(text, other_value)
        }
        Rule::Array(_) => true,
    };
    if ok {
        return None;
    }

    let message = match rule {
        Rule::NotEmpty | Rule::NotBlank => format!("{} should not be empty", path),
        Rule::Email => format!("{} must be an email", path),
        Rule::Uuid => format!("{} must be a UUID", path),
        Rule::OneOf(allowed) => format!(
            "{} must be one of the following values: {}",
            path,
            allowed.join(", ")
        ),
        Rule::Check { message, .. } | Rule::Relation { message, .. } => format!("{} {}", path, message),
        Rule::Array(_) => return None,
    };
    Some(message)
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("email pattern is a valid regex")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn differs(a: &str, b: &str) -> bool {
        a != b
    }

    const ITEM: &[Field] = &[
        Field {
            name: "id",
            rules: &[Rule::Uuid],
        },
        Field {
            name: "kind",
            rules: &[Rule::OneOf(&["A", "B"])],
        },
    ];

    const SCHEMA: &[Field] = &[
        Field {
            name: "from",
            rules: &[
                Rule::NotEmpty,
                Rule::Email,
                Rule::Relation {
                    other: "to",
                    test: differs,
                    message: "should not be the same as to",
                },
            ],
        },
        Field {
            name: "to",
            rules: &[Rule::NotEmpty, Rule::Email],
        },
        Field {
            name: "title",
            rules: &[Rule::NotBlank],
        },
        Field {
            name: "items",
            rules: &[Rule::Array(ITEM)],
        },
    ];

    #[test]
    fn valid_document_passes() {
        let value = json!({
            "from": "a@example.com",
            "to": "b@example.com",
            "title": "Q3 contract",
            "items": [{"id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "kind": "A"}],
        });
        assert!(validate(SCHEMA, &value).is_ok());
    }

    #[test]
    fn every_field_violation_is_collected() {
        let value = json!({
            "from": "not-an-email",
            "to": "",
            "title": "   ",
            "items": [{"id": "nope", "kind": "C"}, 7],
        });
        let errors = validate(SCHEMA, &value).unwrap_err();
        assert_eq!(
            errors,
            vec![
                "from must be an email",
                "to should not be empty",
                "title should not be empty",
                "items[0].id must be a UUID",
                "items[0].kind must be one of the following values: A, B",
                "items[1] must be an object",
            ]
        );
    }

    #[test]
    fn relation_rule_sees_sibling_value() {
        let value = json!({
            "from": "same@example.com",
            "to": "same@example.com",
            "title": "t",
            "items": [],
        });
        let errors = validate(SCHEMA, &value).unwrap_err();
        assert_eq!(errors, vec!["from should not be the same as to"]);
    }

    #[test]
    fn wrong_json_types_are_reported() {
        let value = json!({"from": 1, "to": "b@example.com", "title": "t", "items": {}});
        let errors = validate(SCHEMA, &value).unwrap_err();
        assert_eq!(errors, vec!["from must be a string", "items must be an array"]);
        assert!(validate(SCHEMA, &json!([])).is_err());
    }

    #[test]
    fn email_rule_requires_a_dotted_domain() {
        assert!(email_pattern().is_match("first.last+tag@mail.example.org"));
        assert!(!email_pattern().is_match("user@localhost"));
        assert!(!email_pattern().is_match("two@@example.com"));
    }
}
