use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use async_trait::async_trait;
use uuid::Uuid;

use super::Store;
use super::StoreError;
use super::StoreTransaction;
use crate::domain::MailChimpList;
use crate::domain::MailChimpMember;

/// `Store` that keeps everything in process memory. Cloning shares the same
/// tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Clone, Default)]
struct Tables {
    lists: Vec<MailChimpList>,
    /// insertion order
    members: Vec<MailChimpMember>,
}

enum Change {
    SaveList(MailChimpList),
    RemoveList(Uuid),
    SaveMember(MailChimpMember),
    RemoveMember(Uuid),
}

impl Tables {
    /// Unique keys are checked the same way the Postgres schema does
    fn apply(
        &mut self,
        change: &Change,
    ) -> Result<(), StoreError> {
        match change {
            Change::SaveList(list) => {
                let taken = list.mail_chimp_id.is_some()
                    && self.lists.iter().any(|l| {
                        l.list_id != list.list_id && l.mail_chimp_id == list.mail_chimp_id
                    });
                if taken {
                    return Err(StoreError::Conflict(
                        "The mail chimp id has already been taken.".to_string(),
                    ));
                }
                match self.lists.iter_mut().find(|l| l.list_id == list.list_id) {
                    Some(existing) => *existing = list.clone(),
                    None => self.lists.push(list.clone()),
                }
            }
            Change::RemoveList(list_id) => self.lists.retain(|l| l.list_id != *list_id),
            Change::SaveMember(member) => {
                let taken = self.members.iter().any(|m| {
                    m.member_id != member.member_id
                        && m.list_id == member.list_id
                        && same_email(m.email_address(), member.email_address())
                });
                if taken {
                    return Err(StoreError::Conflict(
                        "The email address has already been taken.".to_string(),
                    ));
                }
                match self
                    .members
                    .iter_mut()
                    .find(|m| m.member_id == member.member_id)
                {
                    Some(existing) => *existing = member.clone(),
                    None => self.members.push(member.clone()),
                }
            }
            Change::RemoveMember(member_id) => self.members.retain(|m| m.member_id != *member_id),
        }
        Ok(())
    }
}

fn same_email(
    a: &str,
    b: &str,
) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    fn snapshot(&self) -> Tables {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Committed lists, for inspection
    pub fn lists(&self) -> Vec<MailChimpList> { self.snapshot().lists }

    /// Committed members, for inspection
    pub fn members(&self) -> Vec<MailChimpMember> { self.snapshot().members }

    pub fn list_count(&self) -> usize { self.lists().len() }

    pub fn member_count(&self) -> usize { self.members().len() }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_list(
        &self,
        list_id: Uuid,
    ) -> Result<Option<MailChimpList>, StoreError> {
        Ok(self
            .tables()?
            .lists
            .iter()
            .find(|l| l.list_id == list_id)
            .cloned())
    }

    async fn find_list_by_mail_chimp_id(
        &self,
        mail_chimp_id: &str,
    ) -> Result<Option<MailChimpList>, StoreError> {
        Ok(self
            .tables()?
            .lists
            .iter()
            .find(|l| l.mail_chimp_id.as_deref() == Some(mail_chimp_id))
            .cloned())
    }

    async fn find_members_by_list(
        &self,
        list_id: &str,
    ) -> Result<Vec<MailChimpMember>, StoreError> {
        Ok(self
            .tables()?
            .members
            .iter()
            .filter(|m| m.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn find_member(
        &self,
        list_id: &str,
        email_address: &str,
    ) -> Result<Option<MailChimpMember>, StoreError> {
        Ok(self
            .tables()?
            .members
            .iter()
            .find(|m| m.list_id == list_id && same_email(m.email_address(), email_address))
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            tables: self.tables.clone(),
            changes: Vec::new(),
        }))
    }
}

/// Buffers changes; nothing touches the shared tables before `commit`.
pub struct MemoryTransaction {
    tables: Arc<Mutex<Tables>>,
    changes: Vec<Change>,
}

impl MemoryTransaction {
    /// The committed tables with this transaction's changes applied
    fn staged(
        &self,
        next: Option<&Change>,
    ) -> Result<Tables, StoreError> {
        let mut staged = self
            .tables
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .clone();
        for change in self.changes.iter().chain(next) {
            staged.apply(change)?;
        }
        Ok(staged)
    }

    fn push(
        &mut self,
        change: Change,
    ) -> Result<(), StoreError> {
        self.staged(Some(&change))?;
        self.changes.push(change);
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn save_list(
        &mut self,
        list: &MailChimpList,
    ) -> Result<(), StoreError> {
        self.push(Change::SaveList(list.clone()))
    }

    async fn remove_list(
        &mut self,
        list_id: Uuid,
    ) -> Result<(), StoreError> {
        self.push(Change::RemoveList(list_id))
    }

    async fn save_member(
        &mut self,
        member: &MailChimpMember,
    ) -> Result<(), StoreError> {
        self.push(Change::SaveMember(member.clone()))
    }

    async fn remove_member(
        &mut self,
        member_id: Uuid,
    ) -> Result<(), StoreError> {
        self.push(Change::RemoveMember(member_id))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        let mut staged = tables.clone();
        for change in &self.changes {
            staged.apply(change)?;
        }
        *tables = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> { Ok(()) }
}
