use std::sync::RwLock;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};

use super::{Store, StoreError, StoreResult};
use crate::schemas::{Expense, ExpenseChanges, Group, GroupChanges, User, UserId};

/// Insertion-ordered in-memory store used by handler tests.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    expenses: RwLock<Vec<Expense>>,
    groups: RwLock<Vec<Group>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// Mirrors the `$set` documents built by the Mongo store.
fn apply_expense_changes(expense: &mut Expense, changes: &ExpenseChanges, now: DateTime<Utc>) {
    if let Some(amount) = changes.amount {
        expense.amount = amount;
    }
    if let Some(category) = &changes.category {
        expense.category = category.clone();
    }
    if let Some(date) = changes.date {
        expense.date = date;
    }
    if let Some(description) = &changes.description {
        expense.description = Some(description.clone());
    }
    expense.updated_at = now;
}

fn apply_group_changes(group: &mut Group, changes: &GroupChanges, now: DateTime<Utc>) {
    if let Some(name) = &changes.name {
        group.name = name.clone();
    }
    if let Some(description) = &changes.description {
        group.description = Some(description.clone());
    }
    group.updated_at = now;
}

#[async_trait]
impl Store for MemoryStore {
    // Same unique keys as the Mongo indexes.
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate { field: "email" });
        }
        if users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate { field: "username" });
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().unwrap().iter().find(|u| &u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_users_matching(&self, identifiers: &[String]) -> StoreResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .filter(|u| identifiers.contains(&u.email) || identifiers.contains(&u.username))
            .cloned()
            .collect())
    }

    async fn insert_expense(&self, expense: &Expense) -> StoreResult<()> {
        self.expenses.write().unwrap().push(expense.clone());
        Ok(())
    }

    async fn find_expenses_by_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<Expense>> {
        Ok(self
            .expenses
            .read()
            .unwrap()
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn find_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
    ) -> StoreResult<Option<Expense>> {
        Ok(self
            .expenses
            .read()
            .unwrap()
            .iter()
            .find(|e| &e.id == id && &e.user_id == owner)
            .cloned())
    }

    async fn find_expenses_by_owner(&self, owner: &UserId) -> StoreResult<Vec<Expense>> {
        Ok(self
            .expenses
            .read()
            .unwrap()
            .iter()
            .filter(|e| &e.user_id == owner)
            .cloned()
            .collect())
    }

    async fn find_all_expenses(&self) -> StoreResult<Vec<Expense>> {
        Ok(self.expenses.read().unwrap().clone())
    }

    async fn update_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
        changes: &ExpenseChanges,
    ) -> StoreResult<Option<Expense>> {
        let mut expenses = self.expenses.write().unwrap();
        Ok(expenses
            .iter_mut()
            .find(|e| &e.id == id && &e.user_id == owner)
            .map(|expense| {
                apply_expense_changes(expense, changes, Utc::now());
                expense.clone()
            }))
    }

    async fn delete_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
    ) -> StoreResult<Option<Expense>> {
        let mut expenses = self.expenses.write().unwrap();
        Ok(expenses
            .iter()
            .position(|e| &e.id == id && &e.user_id == owner)
            .map(|index| expenses.remove(index)))
    }

    async fn insert_group(&self, group: &Group) -> StoreResult<()> {
        self.groups.write().unwrap().push(group.clone());
        Ok(())
    }

    async fn find_group(&self, id: &ObjectId) -> StoreResult<Option<Group>> {
        Ok(self.groups.read().unwrap().iter().find(|g| &g.id == id).cloned())
    }

    async fn find_groups_for_member(&self, member: &UserId) -> StoreResult<Vec<Group>> {
        Ok(self
            .groups
            .read()
            .unwrap()
            .iter()
            .filter(|g| g.is_member(member))
            .cloned()
            .collect())
    }

    async fn update_group(
        &self,
        id: &ObjectId,
        changes: &GroupChanges,
    ) -> StoreResult<Option<Group>> {
        let mut groups = self.groups.write().unwrap();
        Ok(groups.iter_mut().find(|g| &g.id == id).map(|group| {
            apply_group_changes(group, changes, Utc::now());
            group.clone()
        }))
    }

    async fn delete_group(&self, id: &ObjectId) -> StoreResult<Option<Group>> {
        let mut groups = self.groups.write().unwrap();
        Ok(groups
            .iter()
            .position(|g| &g.id == id)
            .map(|index| groups.remove(index)))
    }

    async fn push_group_expense(&self, group: &ObjectId, expense: &ObjectId) -> StoreResult<()> {
        let mut groups = self.groups.write().unwrap();
        if let Some(group) = groups.iter_mut().find(|g| &g.id == group) {
            group.expenses.push(*expense);
            group.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, email: &str) -> User {
        User {
            id: ObjectId::new(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn user_keys_stay_unique() {
        let store = MemoryStore::new();
        store.insert_user(&user("ann", "ann@example.com")).await.unwrap();

        let err = store
            .insert_user(&user("annie", "ann@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "email" }));

        let err = store
            .insert_user(&user("ann", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "username" }));
        assert_eq!(store.users.read().unwrap().len(), 1);
    }
}
