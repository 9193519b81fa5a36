mod list;
mod member;

pub use list::CampaignDefaults;
pub use list::Contact;
pub use list::ListAttributes;
pub use list::MailChimpList;
pub use member::subscriber_hash;
pub use member::MailChimpMember;
pub use member::MemberAttributes;
pub use member::MemberStatus;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;

use crate::validation::validate;
use crate::validation::FieldErrors;
use crate::validation::RuleSet;

/// Overlay the `fillable` keys of `data` onto `projection`; unknown keys are
/// ignored and `null` clears a key. Blocks are replaced, not merged.
fn fill(
    mut projection: Map<String, Value>,
    data: &Map<String, Value>,
    fillable: &[&str],
) -> Map<String, Value> {
    for key in fillable {
        match data.get(*key) {
            None => {}
            Some(Value::Null) => {
                projection.remove(*key);
            }
            Some(value) => {
                projection.insert(key.to_string(), value.clone());
            }
        }
    }
    projection
}

/// Validate a remote projection and parse it into typed attributes.
fn parse_projection<T: DeserializeOwned>(
    projection: Map<String, Value>,
    rules: &RuleSet,
) -> Result<T, FieldErrors> {
    validate(&projection, rules)?;
    // every typed field carries a type rule, so this only fails if the rules
    // and the attribute struct drift apart
    serde_json::from_value(Value::Object(projection)).map_err(|e| {
        let mut errors = FieldErrors::default();
        errors.add("data", e.to_string());
        errors
    })
}
