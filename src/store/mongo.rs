use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};

use super::{Store, StoreError, StoreResult};
use crate::schemas::{Expense, ExpenseChanges, Group, GroupChanges, User, UserId};

const USERS: &str = "users";
const EXPENSES: &str = "expenses";
const GROUPS: &str = "groups";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let store = MongoStore {
            database: client.database(database),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.groups()
            .create_index(IndexModel::builder().keys(doc! { "created_by": 1 }).build(), None)
            .await?;
        tracing::debug!(database = %self.database.name(), "indexes in place");
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.database.collection(USERS)
    }

    fn expenses(&self) -> Collection<Expense> {
        self.database.collection(EXPENSES)
    }

    fn groups(&self) -> Collection<Group> {
        self.database.collection(GROUPS)
    }
}

/// Names the user field whose unique index rejected a write, if that is what failed.
fn duplicate_user_field(err: &mongodb::error::Error) -> Option<&'static str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            Some(duplicate_field_in(&write.message))
        }
        _ => None,
    }
}

// E11000 messages read "... index: username_1 dup key: { ... }".
fn duplicate_field_in(message: &str) -> &'static str {
    if message.contains("index: username") {
        "username"
    } else {
        "email"
    }
}

fn after_update() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

fn expense_update(changes: &ExpenseChanges) -> Document {
    let mut set = doc! { "updated_at": bson::DateTime::from_chrono(Utc::now()) };
    if let Some(amount) = changes.amount {
        set.insert("amount", amount);
    }
    if let Some(category) = &changes.category {
        set.insert("category", category.as_str());
    }
    if let Some(date) = changes.date {
        set.insert("date", bson::DateTime::from_chrono(date));
    }
    if let Some(description) = &changes.description {
        set.insert("description", description.as_str());
    }
    doc! { "$set": set }
}

fn group_update(changes: &GroupChanges) -> Document {
    let mut set = doc! { "updated_at": bson::DateTime::from_chrono(Utc::now()) };
    if let Some(name) = &changes.name {
        set.insert("name", name.as_str());
    }
    if let Some(description) = &changes.description {
        set.insert("description", description.as_str());
    }
    doc! { "$set": set }
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        match self.users().insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(err) => match duplicate_user_field(&err) {
                Some(field) => Err(StoreError::Duplicate { field }),
                None => Err(err.into()),
            },
        }
    }

    async fn find_user_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": *id }, None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users()
            .find_one(doc! { "username": username }, None)
            .await?)
    }

    async fn find_users_by_ids(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        let cursor = self
            .users()
            .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_users_matching(&self, identifiers: &[String]) -> StoreResult<Vec<User>> {
        let filter = doc! {
            "$or": [
                { "email": { "$in": identifiers.to_vec() } },
                { "username": { "$in": identifiers.to_vec() } },
            ]
        };
        let cursor = self.users().find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_expense(&self, expense: &Expense) -> StoreResult<()> {
        self.expenses().insert_one(expense, None).await?;
        Ok(())
    }

    async fn find_expenses_by_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<Expense>> {
        let cursor = self
            .expenses()
            .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
    ) -> StoreResult<Option<Expense>> {
        Ok(self
            .expenses()
            .find_one(doc! { "_id": *id, "user_id": *owner }, None)
            .await?)
    }

    async fn find_expenses_by_owner(&self, owner: &UserId) -> StoreResult<Vec<Expense>> {
        let cursor = self
            .expenses()
            .find(doc! { "user_id": *owner }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_all_expenses(&self) -> StoreResult<Vec<Expense>> {
        let cursor = self.expenses().find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
        changes: &ExpenseChanges,
    ) -> StoreResult<Option<Expense>> {
        Ok(self
            .expenses()
            .find_one_and_update(
                doc! { "_id": *id, "user_id": *owner },
                expense_update(changes),
                after_update(),
            )
            .await?)
    }

    async fn delete_owned_expense(
        &self,
        id: &ObjectId,
        owner: &UserId,
    ) -> StoreResult<Option<Expense>> {
        Ok(self
            .expenses()
            .find_one_and_delete(doc! { "_id": *id, "user_id": *owner }, None)
            .await?)
    }

    async fn insert_group(&self, group: &Group) -> StoreResult<()> {
        self.groups().insert_one(group, None).await?;
        Ok(())
    }

    async fn find_group(&self, id: &ObjectId) -> StoreResult<Option<Group>> {
        Ok(self.groups().find_one(doc! { "_id": *id }, None).await?)
    }

    async fn find_groups_for_member(&self, member: &UserId) -> StoreResult<Vec<Group>> {
        let cursor = self.groups().find(doc! { "members": *member }, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_group(
        &self,
        id: &ObjectId,
        changes: &GroupChanges,
    ) -> StoreResult<Option<Group>> {
        Ok(self
            .groups()
            .find_one_and_update(doc! { "_id": *id }, group_update(changes), after_update())
            .await?)
    }

    async fn delete_group(&self, id: &ObjectId) -> StoreResult<Option<Group>> {
        Ok(self
            .groups()
            .find_one_and_delete(doc! { "_id": *id }, None)
            .await?)
    }

    async fn push_group_expense(&self, group: &ObjectId, expense: &ObjectId) -> StoreResult<()> {
        self.groups()
            .update_one(
                doc! { "_id": *group },
                doc! {
                    "$push": { "expenses": *expense },
                    "$set": { "updated_at": bson::DateTime::from_chrono(Utc::now()) },
                },
                None,
            )
            .await?;
        Ok(())
    }
}
