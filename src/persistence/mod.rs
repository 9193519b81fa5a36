//! Local mirror of MailChimp lists and members.
//!
//! Reads go straight through a `Store`; every write happens inside a
//! `StoreTransaction`, so that a failed MailChimp call can undo the local
//! change.

mod memory;
mod postgres;

use async_trait::async_trait;
pub use memory::MemoryStore;
pub use postgres::PgStore;
use uuid::Uuid;

use crate::domain::MailChimpList;
use crate::domain::MailChimpMember;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("in-memory store lock was poisoned")]
    Poisoned,
    /// A unique key is already taken by another record
    #[error("{0}")]
    Conflict(String),
    /// A stored row no longer parses into a record
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_list(
        &self,
        list_id: Uuid,
    ) -> Result<Option<MailChimpList>, StoreError>;

    async fn find_list_by_mail_chimp_id(
        &self,
        mail_chimp_id: &str,
    ) -> Result<Option<MailChimpList>, StoreError>;

    /// Members of the list with MailChimp id `list_id`, oldest first
    async fn find_members_by_list(
        &self,
        list_id: &str,
    ) -> Result<Vec<MailChimpMember>, StoreError>;

    /// Emails are matched case-insensitively, like MailChimp does
    async fn find_member(
        &self,
        list_id: &str,
        email_address: &str,
    ) -> Result<Option<MailChimpMember>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// Nothing is visible to other readers until `commit`. Dropping a transaction
/// without committing discards it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert or replace, keyed by `list_id`
    async fn save_list(
        &mut self,
        list: &MailChimpList,
    ) -> Result<(), StoreError>;

    async fn remove_list(
        &mut self,
        list_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Insert or replace, keyed by `member_id`
    async fn save_member(
        &mut self,
        member: &MailChimpMember,
    ) -> Result<(), StoreError>;

    async fn remove_member(
        &mut self,
        member_id: Uuid,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
