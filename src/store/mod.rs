//! Persistence for users, expenses and groups.
//!
//! Handlers only ever see [`Store`]; production runs on [`MongoStore`], tests
//! on the in-memory implementation.

use async_trait::async_trait;
use bson::oid::ObjectId;

use crate::schemas::{Expense, ExpenseChanges, Group, GroupChanges, User, UserId};

#[cfg(test)]
mod memory;
mod mongo;

#[cfg(test)]
pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    /// A unique index rejected the write; `field` names the clashing key.
    #[error("duplicate {field}")]
    Duplicate { field: &'static str },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document store for the three record kinds.
///
/// No method is transactional; concurrent writers race and the last one wins.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Users for the given ids, in no particular order. Unknown ids are skipped.
    async fn find_users_by_ids(&self, ids: &[UserId]) -> StoreResult<Vec<User>>;
    /// Users whose email or username appears in `identifiers`.
    async fn find_users_matching(&self, identifiers: &[String]) -> StoreResult<Vec<User>>;

    async fn insert_expense(&self, expense: &Expense) -> StoreResult<()>;
    async fn find_expenses_by_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<Expense>>;
    async fn find_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
    ) -> StoreResult<Option<Expense>>;
    async fn find_expenses_by_owner(&self, owner: &UserId) -> StoreResult<Vec<Expense>>;
    async fn find_all_expenses(&self) -> StoreResult<Vec<Expense>>;
    async fn update_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
        changes: &ExpenseChanges,
    ) -> StoreResult<Option<Expense>>;
    async fn delete_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
    ) -> StoreResult<Option<Expense>>;

    async fn insert_group(&self, group: &Group) -> StoreResult<()>;
    async fn find_group(&self, id: &ObjectId) -> StoreResult<Option<Group>>;
    async fn find_groups_for_member(&self, member: &UserId) -> StoreResult<Vec<Group>>;
    async fn update_group(
        &self,
        id: &ObjectId,
        changes: &GroupChanges,
    ) -> StoreResult<Option<Group>>;
    async fn delete_group(&self, id: &ObjectId) -> StoreResult<Option<Group>>;
    async fn push_group_expense(&self, group: &ObjectId, expense: &ObjectId) -> StoreResult<()>;
}
