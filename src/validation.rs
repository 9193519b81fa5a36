use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use validator::ValidateEmail;

/// A single constraint on one field of a data bag.
///
/// Every rule except `Required` and `Boolean` is skipped when the value is
/// blank (missing, `null` or `""`).
#[derive(Debug)]
pub enum Rule {
    Required,
    String,
    Email,
    /// JSON `true`/`false` only; `""` is not considered blank
    Boolean,
    /// A nested block. MailChimp sends an empty block as `""`, which passes.
    Object,
    OneOf(&'static [&'static str]),
    /// Exact length in characters
    Size(usize),
    /// Unanchored match
    Pattern(&'static Lazy<Regex>),
    /// Two-digit month and day, `MM/DD`
    MonthDay,
}

/// Declarative rules for a resource kind: `(dotted path, rules)`.
///
/// Rules on a nested path (`contact.city`) only apply when the parent block
/// is present; a missing parent is reported by the parent's own rules.
pub type RuleSet = [(&'static str, &'static [Rule])];

/// Field-level errors, keyed by dotted path, in path order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(
        &mut self,
        field: &str,
        message: String,
    ) {
        self.0.entry(field.to_string()).or_default().push(message);
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn get(
        &self,
        field: &str,
    ) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> { self.0.keys().map(String::as_str) }
}

/// Check `data` against every entry of `rules`.
pub fn validate(
    data: &Map<String, Value>,
    rules: &RuleSet,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    for (path, field_rules) in rules {
        if !parent_present(data, path) {
            continue;
        }
        let value = lookup(data, path);
        let label = path.replace('_', " ");

        for rule in field_rules.iter() {
            let blank = is_blank(value) && !matches!(rule, Rule::Boolean);
            if blank && !matches!(rule, Rule::Required) {
                continue;
            }
            if let Some(message) = check(rule, value, &label) {
                errors.add(path, message);
            }
        }
    }

    match errors.is_empty() {
        true => Ok(()),
        false => Err(errors),
    }
}

/// `None` when the rule holds.
fn check(
    rule: &Rule,
    value: Option<&Value>,
    label: &str,
) -> Option<String> {
    let ok = match (rule, value) {
        (Rule::Required, v) => !is_blank(v),
        (_, None) | (_, Some(Value::Null)) => match rule {
            Rule::Boolean => true,
            _ => false,
        },
        (Rule::String, Some(v)) => v.is_string(),
        (Rule::Email, Some(v)) => v
            .as_str()
            .map(|s| ValidateEmail::validate_email(&s.to_string()))
            .unwrap_or(false),
        (Rule::Boolean, Some(v)) => v.is_boolean(),
        (Rule::Object, Some(v)) => v.is_object() || v.as_str() == Some(""),
        (Rule::OneOf(allowed), Some(v)) => {
            v.as_str().map(|s| allowed.iter().any(|a| *a == s)).unwrap_or(false)
        }
        (Rule::Size(n), Some(v)) => v.as_str().map(|s| s.chars().count() == *n).unwrap_or(true),
        (Rule::Pattern(re), Some(v)) => v.as_str().map(|s| re.is_match(s)).unwrap_or(false),
        (Rule::MonthDay, Some(v)) => v.as_str().map(is_month_day).unwrap_or(false),
    };
    if ok {
        return None;
    }

    let message = match rule {
        Rule::Required => format!("The {label} field is required."),
        Rule::String => format!("The {label} must be a string."),
        Rule::Email => format!("The {label} must be a valid email address."),
        Rule::Boolean => format!("The {label} field must be true or false."),
        Rule::Object => format!("The {label} must be an object."),
        Rule::OneOf(_) => format!("The selected {label} is invalid."),
        Rule::Size(n) => format!("The {label} must be {n} characters."),
        Rule::Pattern(_) => format!("The {label} format is invalid."),
        Rule::MonthDay => format!("The {label} does not match the format MM/DD."),
    };
    Some(message)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn is_month_day(s: &str) -> bool {
    // leap year, so that 02/29 is accepted
    s.len() == 5 && NaiveDate::parse_from_str(&format!("2000/{s}"), "%Y/%m/%d").is_ok()
}

fn lookup<'a>(
    data: &'a Map<String, Value>,
    path: &str,
) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    segments.try_fold(data.get(first)?, |value, key| value.as_object()?.get(key))
}

fn parent_present(
    data: &Map<String, Value>,
    path: &str,
) -> bool {
    match path.rsplit_once('.') {
        None => true,
        Some((parent, _)) => lookup(data, parent).map(Value::is_object).unwrap_or(false),
    }
}
