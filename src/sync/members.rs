use serde_json::Map;
use serde_json::Value;

use super::commit_or_rollback;
use super::SyncError;
use crate::domain::subscriber_hash;
use crate::domain::MailChimpMember;
use crate::mailchimp_client::MailChimpClient;
use crate::normalize::normalize_payload;
use crate::persistence::Store;
use crate::persistence::StoreTransaction;

/// Create, read (through), update and remove members of a MailChimp list.
///
/// Members are addressed by list id and email address; MailChimp itself
/// addresses them by `subscriber_hash(email)`.
pub struct MemberSync<'a> {
    store: &'a dyn Store,
    mailchimp: &'a MailChimpClient,
}

fn not_found(
    list_id: &str,
    email: &str,
) -> SyncError {
    SyncError::NotFound(format!(
        "MailChimpMember[{email}] not found in list {list_id}"
    ))
}

fn members_path(list_id: &str) -> String { format!("lists/{list_id}/members") }

fn member_path(
    list_id: &str,
    email: &str,
) -> String {
    format!(
        "lists/{list_id}/members/{}",
        subscriber_hash(&email.to_lowercase())
    )
}

impl<'a> MemberSync<'a> {
    pub fn new(
        store: &'a dyn Store,
        mailchimp: &'a MailChimpClient,
    ) -> Self {
        Self { store, mailchimp }
    }

    /// All members of a list. When none are stored locally, the whole page
    /// returned by MailChimp is stored, or nothing is.
    #[tracing::instrument(name = "Listing members", skip(self))]
    pub async fn list(
        &self,
        list_id: &str,
    ) -> Result<Vec<MailChimpMember>, SyncError> {
        let local = self.store.find_members_by_list(list_id).await?;
        if !local.is_empty() {
            return Ok(local);
        }

        let payload = self
            .mailchimp
            .get(&members_path(list_id))
            .await
            .map_err(|e| {
                tracing::warn!(error.cause_chain = ?e, "list not found in MailChimp");
                SyncError::NotFound(format!("MailChimpList[{list_id}] not found"))
            })?;
        let payload = normalize_payload(payload);
        let members = match payload.get("members") {
            Some(Value::Array(entries)) => entries
                .iter()
                .map(|entry| {
                    let entry = entry.as_object().cloned().unwrap_or_default();
                    MailChimpMember::from_mail_chimp_response(list_id, &entry)
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(SyncError::invalid_remote)?,
            _ => Vec::new(),
        };
        if members.is_empty() {
            return Ok(members);
        }

        let mut transaction = self.store.begin().await?;
        let outcome = save_all(transaction.as_mut(), &members).await;
        commit_or_rollback(transaction, outcome).await?;
        tracing::info!(count = members.len(), "members fetched from MailChimp");
        Ok(members)
    }

    #[tracing::instrument(name = "Showing member", skip(self))]
    pub async fn show(
        &self,
        list_id: &str,
        email: &str,
    ) -> Result<MailChimpMember, SyncError> {
        if let Some(member) = self.store.find_member(list_id, email).await? {
            return Ok(member);
        }

        let payload = self
            .mailchimp
            .get(&member_path(list_id, email))
            .await
            .map_err(|e| {
                tracing::warn!(error.cause_chain = ?e, "member not found in MailChimp");
                not_found(list_id, email)
            })?;
        let member =
            MailChimpMember::from_mail_chimp_response(list_id, &normalize_payload(payload))
                .map_err(SyncError::invalid_remote)?;

        let mut transaction = self.store.begin().await?;
        let outcome = transaction
            .save_member(&member)
            .await
            .map_err(anyhow::Error::from);
        commit_or_rollback(transaction, outcome).await?;
        Ok(member)
    }

    /// `list_id` always comes from the caller, never from `data`.
    #[tracing::instrument(name = "Creating member", skip(self, data))]
    pub async fn create(
        &self,
        list_id: &str,
        data: &Map<String, Value>,
    ) -> Result<MailChimpMember, SyncError> {
        let member = MailChimpMember::new(list_id, data).map_err(SyncError::invalid)?;

        let mut transaction = self.store.begin().await?;
        let outcome = self.push_new(transaction.as_mut(), &member).await;
        commit_or_rollback(transaction, outcome).await?;
        Ok(member)
    }

    /// MailChimp is addressed with the hash of the email the member had
    /// before this update.
    #[tracing::instrument(name = "Updating member", skip(self, data))]
    pub async fn update(
        &self,
        list_id: &str,
        email: &str,
        data: &Map<String, Value>,
    ) -> Result<MailChimpMember, SyncError> {
        let member = self.show(list_id, email).await?;
        let updated = member.fill(data).map_err(SyncError::invalid)?;

        let mut transaction = self.store.begin().await?;
        let outcome = self
            .push_update(transaction.as_mut(), member.email_address(), &updated)
            .await;
        commit_or_rollback(transaction, outcome).await?;
        Ok(updated)
    }

    #[tracing::instrument(name = "Removing member", skip(self))]
    pub async fn remove(
        &self,
        list_id: &str,
        email: &str,
    ) -> Result<(), SyncError> {
        let member = self
            .store
            .find_member(list_id, email)
            .await?
            .ok_or_else(|| not_found(list_id, email))?;

        let mut transaction = self.store.begin().await?;
        let outcome = self.push_removal(transaction.as_mut(), &member).await;
        commit_or_rollback(transaction, outcome).await
    }

    async fn push_new(
        &self,
        transaction: &mut dyn StoreTransaction,
        member: &MailChimpMember,
    ) -> Result<(), anyhow::Error> {
        transaction.save_member(member).await?;
        self.mailchimp
            .post(
                &members_path(&member.list_id),
                &member.to_mail_chimp_projection(),
            )
            .await?;
        Ok(())
    }

    async fn push_update(
        &self,
        transaction: &mut dyn StoreTransaction,
        previous_email: &str,
        member: &MailChimpMember,
    ) -> Result<(), anyhow::Error> {
        transaction.save_member(member).await?;
        self.mailchimp
            .patch(
                &member_path(&member.list_id, previous_email),
                &member.to_mail_chimp_projection(),
            )
            .await?;
        Ok(())
    }

    async fn push_removal(
        &self,
        transaction: &mut dyn StoreTransaction,
        member: &MailChimpMember,
    ) -> Result<(), anyhow::Error> {
        transaction.remove_member(member.member_id).await?;
        self.mailchimp
            .delete(&member_path(&member.list_id, member.email_address()))
            .await?;
        Ok(())
    }
}

async fn save_all(
    transaction: &mut dyn StoreTransaction,
    members: &[MailChimpMember],
) -> Result<(), anyhow::Error> {
    for member in members {
        transaction.save_member(member).await?;
    }
    Ok(())
}
