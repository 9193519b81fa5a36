use md5::Digest;
use md5::Md5;
use once_cell::sync::Lazy;
use regex::Regex;
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
    "email_address",
    "status",
    "merge_fields",
    "language",
    "vip",
];

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+[0-9]{11}").expect("phone pattern must compile"));

static RULES: &RuleSet = &[
    ("email_address", &[Rule::Required, Rule::Email]),
    (
        "status",
        &[Rule::Required, Rule::String, Rule::OneOf(MemberStatus::ALL)],
    ),
    ("merge_fields", &[Rule::Object]),
    ("merge_fields.FNAME", &[Rule::String]),
    ("merge_fields.LNAME", &[Rule::String]),
    ("merge_fields.PHONE", &[Rule::Pattern(&PHONE)]),
    ("merge_fields.ADDRESS", &[Rule::Object]),
    ("merge_fields.ADDRESS.zip", &[Rule::Required, Rule::String]),
    ("merge_fields.ADDRESS.city", &[Rule::Required, Rule::String]),
    ("merge_fields.ADDRESS.addr1", &[Rule::Required, Rule::String]),
    ("merge_fields.ADDRESS.addr2", &[Rule::String]),
    ("merge_fields.ADDRESS.state", &[Rule::Required, Rule::String]),
    (
        "merge_fields.ADDRESS.country",
        &[Rule::String, Rule::Size(2)],
    ),
    ("merge_fields.BIRTHDAY", &[Rule::MonthDay]),
    ("language", &[Rule::String, Rule::Size(2)]),
    ("vip", &[Rule::Boolean]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Subscribed,
    Unsubscribed,
    Cleaned,
    Pending,
    Transactional,
}

impl MemberStatus {
    pub const ALL: &'static [&'static str] = &[
        "subscribed",
        "unsubscribed",
        "cleaned",
        "pending",
        "transactional",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
            Self::Cleaned => "cleaned",
            Self::Pending => "pending",
            Self::Transactional => "transactional",
        }
    }
}

impl TryFrom<&str> for MemberStatus {
    type Error = String;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "subscribed" => Ok(Self::Subscribed),
            "unsubscribed" => Ok(Self::Unsubscribed),
            "cleaned" => Ok(Self::Cleaned),
            "pending" => Ok(Self::Pending),
            "transactional" => Ok(Self::Transactional),
            other => Err(format!("Invalid member status: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAttributes {
    pub email_address: String,
    pub status: MemberStatus,
    /// `FNAME`, `LNAME`, `PHONE`, `ADDRESS`, `BIRTHDAY`, plus whatever custom
    /// merge tags the list defines
    pub merge_fields: Option<Map<String, Value>>,
    pub language: Option<String>,
    #[serde(default)]
    pub vip: bool,
}

/// A subscriber of a MailChimp list, mirrored locally.
///
/// There is no stored remote id: MailChimp addresses members by the MD5 hash
/// of their lowercased email (see `subscriber_hash`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailChimpMember {
    pub member_id: Uuid,
    /// MailChimp id of the owning list
    pub list_id: String,
    #[serde(flatten)]
    pub attributes: MemberAttributes,
}

/// MailChimp's "subscriber hash": lowercase hex MD5 of the email. Stored
/// emails are already lowercase; a lookup key from a request path must be
/// lowercased by the caller.
pub fn subscriber_hash(email: &str) -> String { hex::encode(Md5::digest(email.as_bytes())) }

impl MailChimpMember {
    /// Build a new (not yet persisted) member of `list_id`. A `list_id` in
    /// `data` is ignored.
    pub fn new(
        list_id: &str,
        data: &Map<String, Value>,
    ) -> Result<Self, FieldErrors> {
        Ok(Self {
            member_id: Uuid::new_v4(),
            list_id: list_id.to_string(),
            attributes: parse(fill(Map::new(), data, FILLABLE))?,
        })
    }

    /// Build a member from a (normalized) entry of
    /// `GET lists/{list_id}/members[/{hash}]`
    pub fn from_mail_chimp_response(
        list_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<Self, FieldErrors> {
        Self::new(list_id, payload)
    }

    /// Apply `data` on top of the current attributes. Ids and list are kept.
    pub fn fill(
        &self,
        data: &Map<String, Value>,
    ) -> Result<Self, FieldErrors> {
        let projection = fill(self.to_mail_chimp_projection(), data, FILLABLE);
        Ok(Self {
            member_id: self.member_id,
            list_id: self.list_id.clone(),
            attributes: parse(projection)?,
        })
    }

    pub fn email_address(&self) -> &str { &self.attributes.email_address }

    /// Derived, never assigned
    pub fn mail_chimp_id(&self) -> String { subscriber_hash(&self.attributes.email_address) }

    /// The body sent to MailChimp on create and update
    pub fn to_mail_chimp_projection(&self) -> Map<String, Value> {
        let a = &self.attributes;
        let mut map = Map::new();
        map.insert("email_address".into(), a.email_address.clone().into());
        map.insert("status".into(), a.status.as_str().into());
        if let Some(merge_fields) = &a.merge_fields {
            map.insert("merge_fields".into(), merge_fields.clone().into());
        }
        if let Some(language) = &a.language {
            map.insert("language".into(), language.clone().into());
        }
        map.insert("vip".into(), a.vip.into());
        map
    }
}

fn parse(mut projection: Map<String, Value>) -> Result<MemberAttributes, FieldErrors> {
    // MailChimp sends a member without merge fields as `""`
    if projection.get("merge_fields").and_then(Value::as_str) == Some("") {
        projection.remove("merge_fields");
    }
    // MailChimp compares emails case-insensitively
    if let Some(Value::String(email)) = projection.get_mut("email_address") {
        *email = email.to_lowercase();
    }
    parse_projection(projection, RULES)
}
