use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::Transaction;
use uuid::Uuid;

use super::Store;
use super::StoreError;
use super::StoreTransaction;
use crate::domain::CampaignDefaults;
use crate::domain::Contact;
use crate::domain::ListAttributes;
use crate::domain::MailChimpList;
use crate::domain::MailChimpMember;
use crate::domain::MemberAttributes;
use crate::domain::MemberStatus;

/// `Store` backed by Postgres. Queries are checked at runtime, so building
/// the crate does not need a live database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Apply everything under `migrations/`
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ListRow {
    id: Uuid,
    mail_chimp_id: Option<String>,
    name: String,
    permission_reminder: String,
    email_type_option: bool,
    contact: Json<Contact>,
    campaign_defaults: Json<CampaignDefaults>,
    visibility: Option<String>,
    use_archive_bar: Option<bool>,
    notify_on_subscribe: Option<String>,
    notify_on_unsubscribe: Option<String>,
}

impl From<ListRow> for MailChimpList {
    fn from(row: ListRow) -> Self {
        Self {
            list_id: row.id,
            mail_chimp_id: row.mail_chimp_id,
            attributes: ListAttributes {
                name: row.name,
                permission_reminder: row.permission_reminder,
                email_type_option: row.email_type_option,
                contact: row.contact.0,
                campaign_defaults: row.campaign_defaults.0,
                visibility: row.visibility,
                use_archive_bar: row.use_archive_bar,
                notify_on_subscribe: row.notify_on_subscribe,
                notify_on_unsubscribe: row.notify_on_unsubscribe,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    list_id: String,
    email_address: String,
    status: String,
    merge_fields: Option<Json<Map<String, Value>>>,
    language: Option<String>,
    vip: bool,
}

impl TryFrom<MemberRow> for MailChimpMember {
    type Error = StoreError;
    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let status = MemberStatus::try_from(row.status.as_str()).map_err(StoreError::Corrupt)?;
        Ok(Self {
            member_id: row.id,
            list_id: row.list_id,
            attributes: MemberAttributes {
                email_address: row.email_address,
                status,
                merge_fields: row.merge_fields.map(|m| m.0),
                language: row.language,
                vip: row.vip,
            },
        })
    }
}

const LIST_COLUMNS: &str = r#"
    id, mail_chimp_id, name, permission_reminder, email_type_option, contact,
    campaign_defaults, visibility, use_archive_bar, notify_on_subscribe,
    notify_on_unsubscribe
"#;

const MEMBER_COLUMNS: &str = "id, list_id, email_address, status, merge_fields, language, vip";

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(name = "Fetching list by id", skip(self))]
    async fn find_list(
        &self,
        list_id: Uuid,
    ) -> Result<Option<MailChimpList>, StoreError> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            "SELECT {LIST_COLUMNS} FROM mail_chimp_lists WHERE id = $1"
        ))
        .bind(list_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MailChimpList::from))
    }

    #[tracing::instrument(name = "Fetching list by MailChimp id", skip(self))]
    async fn find_list_by_mail_chimp_id(
        &self,
        mail_chimp_id: &str,
    ) -> Result<Option<MailChimpList>, StoreError> {
        let row = sqlx::query_as::<_, ListRow>(&format!(
            "SELECT {LIST_COLUMNS} FROM mail_chimp_lists WHERE mail_chimp_id = $1"
        ))
        .bind(mail_chimp_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MailChimpList::from))
    }

    #[tracing::instrument(name = "Fetching members of list", skip(self))]
    async fn find_members_by_list(
        &self,
        list_id: &str,
    ) -> Result<Vec<MailChimpMember>, StoreError> {
        sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM mail_chimp_members WHERE list_id = $1 \
             ORDER BY created_at, email_address"
        ))
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(MailChimpMember::try_from)
        .collect()
    }

    #[tracing::instrument(name = "Fetching member", skip(self))]
    async fn find_member(
        &self,
        list_id: &str,
        email_address: &str,
    ) -> Result<Option<MailChimpMember>, StoreError> {
        sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM mail_chimp_members \
             WHERE list_id = $1 AND lower(email_address) = lower($2)"
        ))
        .bind(list_id)
        .bind(email_address)
        .fetch_optional(&self.pool)
        .await?
        .map(MailChimpMember::try_from)
        .transpose()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let transaction = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { transaction }))
    }
}

pub struct PgTransaction {
    transaction: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    #[tracing::instrument(name = "Saving list", skip(self, list), fields(list_id = %list.list_id))]
    async fn save_list(
        &mut self,
        list: &MailChimpList,
    ) -> Result<(), StoreError> {
        let a = &list.attributes;
        sqlx::query(
            r#"
            INSERT INTO mail_chimp_lists (
                id, mail_chimp_id, name, permission_reminder, email_type_option,
                contact, campaign_defaults, visibility, use_archive_bar,
                notify_on_subscribe, notify_on_unsubscribe
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                mail_chimp_id = EXCLUDED.mail_chimp_id,
                name = EXCLUDED.name,
                permission_reminder = EXCLUDED.permission_reminder,
                email_type_option = EXCLUDED.email_type_option,
                contact = EXCLUDED.contact,
                campaign_defaults = EXCLUDED.campaign_defaults,
                visibility = EXCLUDED.visibility,
                use_archive_bar = EXCLUDED.use_archive_bar,
                notify_on_subscribe = EXCLUDED.notify_on_subscribe,
                notify_on_unsubscribe = EXCLUDED.notify_on_unsubscribe
            "#,
        )
        .bind(list.list_id)
        .bind(&list.mail_chimp_id)
        .bind(&a.name)
        .bind(&a.permission_reminder)
        .bind(a.email_type_option)
        .bind(Json(&a.contact))
        .bind(Json(&a.campaign_defaults))
        .bind(&a.visibility)
        .bind(a.use_archive_bar)
        .bind(&a.notify_on_subscribe)
        .bind(&a.notify_on_unsubscribe)
        .execute(&mut *self.transaction)
        .await
        .map_err(|e| conflict(e, "mail_chimp_id"))?;
        Ok(())
    }

    #[tracing::instrument(name = "Removing list", skip(self))]
    async fn remove_list(
        &mut self,
        list_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM mail_chimp_lists WHERE id = $1")
            .bind(list_id)
            .execute(&mut *self.transaction)
            .await?;
        Ok(())
    }

    #[tracing::instrument(
        name = "Saving member",
        skip(self, member),
        fields(member_id = %member.member_id, list_id = %member.list_id)
    )]
    async fn save_member(
        &mut self,
        member: &MailChimpMember,
    ) -> Result<(), StoreError> {
        let a = &member.attributes;
        sqlx::query(
            r#"
            INSERT INTO mail_chimp_members (
                id, list_id, email_address, status, merge_fields, language, vip
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                list_id = EXCLUDED.list_id,
                email_address = EXCLUDED.email_address,
                status = EXCLUDED.status,
                merge_fields = EXCLUDED.merge_fields,
                language = EXCLUDED.language,
                vip = EXCLUDED.vip
            "#,
        )
        .bind(member.member_id)
        .bind(&member.list_id)
        .bind(&a.email_address)
        .bind(a.status.as_str())
        .bind(a.merge_fields.as_ref().map(Json))
        .bind(&a.language)
        .bind(a.vip)
        .execute(&mut *self.transaction)
        .await
        .map_err(|e| conflict(e, "email_address"))?;
        Ok(())
    }

    #[tracing::instrument(name = "Removing member", skip(self))]
    async fn remove_member(
        &mut self,
        member_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM mail_chimp_members WHERE id = $1")
            .bind(member_id)
            .execute(&mut *self.transaction)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.transaction.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.transaction.rollback().await?;
        Ok(())
    }
}

fn conflict(
    e: sqlx::Error,
    field: &str,
) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("The {} has already been taken.", field.replace('_', " ")))
        }
        _ => StoreError::Database(e),
    }
}
