use anyhow::Context;
use serde_json::Map;
use serde_json::Value;
use uuid::Uuid;

use super::commit_or_rollback;
use super::SyncError;
use crate::domain::MailChimpList;
use crate::mailchimp_client::MailChimpClient;
use crate::normalize::normalize_payload;
use crate::persistence::Store;
use crate::persistence::StoreError;
use crate::persistence::StoreTransaction;

/// Create, read (through), update and remove MailChimp lists.
///
/// A list is addressed either by its local id or by its MailChimp id.
pub struct ListSync<'a> {
    store: &'a dyn Store,
    mailchimp: &'a MailChimpClient,
}

fn not_found(list_id: &str) -> SyncError { SyncError::NotFound(format!("MailChimpList[{list_id}] not found")) }

impl<'a> ListSync<'a> {
    pub fn new(
        store: &'a dyn Store,
        mailchimp: &'a MailChimpClient,
    ) -> Self {
        Self { store, mailchimp }
    }

    #[tracing::instrument(name = "Creating list", skip(self, data))]
    pub async fn create(
        &self,
        data: &Map<String, Value>,
    ) -> Result<MailChimpList, SyncError> {
        let mut list = MailChimpList::new(data).map_err(SyncError::invalid)?;

        let mut transaction = self.store.begin().await?;
        let outcome = self.push_new(transaction.as_mut(), &mut list).await;
        commit_or_rollback(transaction, outcome).await?;

        tracing::info!(list_id = %list.list_id, mail_chimp_id = ?list.mail_chimp_id, "list created");
        Ok(list)
    }

    /// Local hit first; on a miss the list is fetched from MailChimp and
    /// stored.
    #[tracing::instrument(name = "Showing list", skip(self))]
    pub async fn show(
        &self,
        list_id: &str,
    ) -> Result<MailChimpList, SyncError> {
        match self.find(list_id).await? {
            Some(list) => Ok(list),
            None => self.read_through(list_id).await,
        }
    }

    /// Blocks in `data` replace the stored blocks wholesale.
    #[tracing::instrument(name = "Updating list", skip(self, data))]
    pub async fn update(
        &self,
        list_id: &str,
        data: &Map<String, Value>,
    ) -> Result<MailChimpList, SyncError> {
        let list = self.show(list_id).await?;
        let updated = list.fill(data).map_err(SyncError::invalid)?;

        let mut transaction = self.store.begin().await?;
        let outcome = self.push_update(transaction.as_mut(), &updated).await;
        commit_or_rollback(transaction, outcome).await?;
        Ok(updated)
    }

    /// Only lists known locally can be removed.
    #[tracing::instrument(name = "Removing list", skip(self))]
    pub async fn remove(
        &self,
        list_id: &str,
    ) -> Result<(), SyncError> {
        let list = self
            .find(list_id)
            .await?
            .ok_or_else(|| not_found(list_id))?;

        let mut transaction = self.store.begin().await?;
        let outcome = self.push_removal(transaction.as_mut(), &list).await;
        commit_or_rollback(transaction, outcome).await
    }

    async fn find(
        &self,
        list_id: &str,
    ) -> Result<Option<MailChimpList>, StoreError> {
        if let Ok(id) = Uuid::parse_str(list_id) {
            if let Some(list) = self.store.find_list(id).await? {
                return Ok(Some(list));
            }
        }
        self.store.find_list_by_mail_chimp_id(list_id).await
    }

    async fn read_through(
        &self,
        list_id: &str,
    ) -> Result<MailChimpList, SyncError> {
        let payload = self
            .mailchimp
            .get(&format!("lists/{list_id}"))
            .await
            .map_err(|e| {
                tracing::warn!(error.cause_chain = ?e, "list not found in MailChimp");
                not_found(list_id)
            })?;
        let list = MailChimpList::from_mail_chimp_response(&normalize_payload(payload))
            .map_err(SyncError::invalid)?;

        let mut transaction = self.store.begin().await?;
        let outcome = transaction.save_list(&list).await.map_err(anyhow::Error::from);
        commit_or_rollback(transaction, outcome).await?;
        Ok(list)
    }

    async fn push_new(
        &self,
        transaction: &mut dyn StoreTransaction,
        list: &mut MailChimpList,
    ) -> Result<(), anyhow::Error> {
        transaction.save_list(list).await?;
        let response = self
            .mailchimp
            .post("lists", &list.to_mail_chimp_projection())
            .await?;
        let mail_chimp_id = response
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .context("MailChimp did not return a list id")?;
        list.set_mail_chimp_id(mail_chimp_id.to_string());
        transaction.save_list(list).await?;
        Ok(())
    }

    async fn push_update(
        &self,
        transaction: &mut dyn StoreTransaction,
        list: &MailChimpList,
    ) -> Result<(), anyhow::Error> {
        transaction.save_list(list).await?;
        let mail_chimp_id = list
            .mail_chimp_id
            .as_deref()
            .context("List has not been created in MailChimp")?;
        self.mailchimp
            .patch(
                &format!("lists/{mail_chimp_id}"),
                &list.to_mail_chimp_projection(),
            )
            .await?;
        Ok(())
    }

    async fn push_removal(
        &self,
        transaction: &mut dyn StoreTransaction,
        list: &MailChimpList,
    ) -> Result<(), anyhow::Error> {
        transaction.remove_list(list.list_id).await?;
        match &list.mail_chimp_id {
            Some(mail_chimp_id) => {
                self.mailchimp
                    .delete(&format!("lists/{mail_chimp_id}"))
                    .await?;
            }
            None => tracing::warn!(
                list_id = %list.list_id,
                "list was never created in MailChimp; removing it locally only"
            ),
        }
        Ok(())
    }
}
