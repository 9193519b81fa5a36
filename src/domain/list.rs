use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use uuid::Uuid;

use super::fill;
use super::parse_projection;
use crate::validation::FieldErrors;
use crate::validation::Rule;
use crate::validation::RuleSet;

const FILLABLE: &[&str] = &[
    "name",
    "permission_reminder",
    "email_type_option",
    "contact",
    "campaign_defaults",
    "visibility",
    "use_archive_bar",
    "notify_on_subscribe",
    "notify_on_unsubscribe",
];

static RULES: &RuleSet = &[
    ("name", &[Rule::Required, Rule::String]),
    ("permission_reminder", &[Rule::Required, Rule::String]),
    ("email_type_option", &[Rule::Required, Rule::Boolean]),
    ("contact", &[Rule::Required, Rule::Object]),
    ("contact.company", &[Rule::Required, Rule::String]),
    ("contact.address1", &[Rule::Required, Rule::String]),
    ("contact.address2", &[Rule::String]),
    ("contact.city", &[Rule::Required, Rule::String]),
    ("contact.state", &[Rule::Required, Rule::String]),
    ("contact.zip", &[Rule::Required, Rule::String]),
    ("contact.country", &[Rule::Required, Rule::String, Rule::Size(2)]),
    ("contact.phone", &[Rule::String]),
    ("campaign_defaults", &[Rule::Required, Rule::Object]),
    ("campaign_defaults.from_name", &[Rule::Required, Rule::String]),
    ("campaign_defaults.from_email", &[Rule::Required, Rule::Email]),
    ("campaign_defaults.subject", &[Rule::Required, Rule::String]),
    ("campaign_defaults.language", &[Rule::Required, Rule::String]),
    ("visibility", &[Rule::OneOf(&["pub", "prv"])]),
    ("use_archive_bar", &[Rule::Boolean]),
    ("notify_on_subscribe", &[Rule::Email]),
    ("notify_on_unsubscribe", &[Rule::Email]),
];

/// Content required by CAN-SPAM: who is sending, and from where
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub company: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDefaults {
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub language: String,
}

/// Everything about a list that MailChimp knows about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListAttributes {
    pub name: String,
    pub permission_reminder: String,
    pub email_type_option: bool,
    pub contact: Contact,
    pub campaign_defaults: CampaignDefaults,
    /// `pub` or `prv`
    pub visibility: Option<String>,
    pub use_archive_bar: Option<bool>,
    pub notify_on_subscribe: Option<String>,
    pub notify_on_unsubscribe: Option<String>,
}

/// A MailChimp audience, mirrored locally.
///
/// `mail_chimp_id` is `None` until MailChimp has accepted the list; it is
/// assigned by MailChimp and never computed locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailChimpList {
    pub list_id: Uuid,
    pub mail_chimp_id: Option<String>,
    #[serde(flatten)]
    pub attributes: ListAttributes,
}

impl MailChimpList {
    /// Build a new (not yet persisted) list from an inbound data bag. Keys
    /// other than the list attributes are ignored.
    pub fn new(data: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let projection = fill(Map::new(), data, FILLABLE);
        Ok(Self {
            list_id: Uuid::new_v4(),
            mail_chimp_id: None,
            attributes: parse_projection(projection, RULES)?,
        })
    }

    /// Build a list from a (normalized) `GET lists/{id}` payload
    pub fn from_mail_chimp_response(payload: &Map<String, Value>) -> Result<Self, FieldErrors> {
        let mail_chimp_id = match payload.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let mut errors = FieldErrors::default();
                errors.add("id", "The id field is required.".to_string());
                return Err(errors);
            }
        };
        let mut list = Self::new(payload)?;
        list.mail_chimp_id = Some(mail_chimp_id);
        Ok(list)
    }

    /// Apply `data` on top of the current attributes. Ids are kept.
    pub fn fill(
        &self,
        data: &Map<String, Value>,
    ) -> Result<Self, FieldErrors> {
        let projection = fill(self.to_mail_chimp_projection(), data, FILLABLE);
        Ok(Self {
            list_id: self.list_id,
            mail_chimp_id: self.mail_chimp_id.clone(),
            attributes: parse_projection(projection, RULES)?,
        })
    }

    pub fn set_mail_chimp_id(
        &mut self,
        mail_chimp_id: String,
    ) {
        self.mail_chimp_id = Some(mail_chimp_id);
    }

    /// The body sent to MailChimp on create and update. Local ids are not
    /// part of it; unset optional fields are omitted.
    pub fn to_mail_chimp_projection(&self) -> Map<String, Value> {
        let a = &self.attributes;
        let mut map = Map::new();
        map.insert("name".into(), a.name.clone().into());
        map.insert(
            "permission_reminder".into(),
            a.permission_reminder.clone().into(),
        );
        map.insert("email_type_option".into(), a.email_type_option.into());
        map.insert("contact".into(), contact_projection(&a.contact).into());
        map.insert(
            "campaign_defaults".into(),
            campaign_defaults_projection(&a.campaign_defaults).into(),
        );
        insert_some(&mut map, "visibility", a.visibility.clone());
        insert_some(&mut map, "use_archive_bar", a.use_archive_bar);
        insert_some(
            &mut map,
            "notify_on_subscribe",
            a.notify_on_subscribe.clone(),
        );
        insert_some(
            &mut map,
            "notify_on_unsubscribe",
            a.notify_on_unsubscribe.clone(),
        );
        map
    }
}

fn contact_projection(contact: &Contact) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("company".into(), contact.company.clone().into());
    map.insert("address1".into(), contact.address1.clone().into());
    insert_some(&mut map, "address2", contact.address2.clone());
    map.insert("city".into(), contact.city.clone().into());
    map.insert("state".into(), contact.state.clone().into());
    map.insert("zip".into(), contact.zip.clone().into());
    map.insert("country".into(), contact.country.clone().into());
    insert_some(&mut map, "phone", contact.phone.clone());
    map
}

fn campaign_defaults_projection(defaults: &CampaignDefaults) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("from_name".into(), defaults.from_name.clone().into());
    map.insert("from_email".into(), defaults.from_email.clone().into());
    map.insert("subject".into(), defaults.subject.clone().into());
    map.insert("language".into(), defaults.language.clone().into());
    map
}

fn insert_some<T: Into<Value>>(
    map: &mut Map<String, Value>,
    key: &str,
    value: Option<T>,
) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}
