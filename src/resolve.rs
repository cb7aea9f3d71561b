//! Turns the id references stored on a group into the records they point at.

use std::collections::HashMap;

use bson::oid::ObjectId;

use crate::schemas::{Expense, Group, User, UserId};
use crate::store::{Store, StoreResult};

#[derive(Clone, Debug, PartialEq)]
pub struct MemberRef {
    pub id: UserId,
    pub username: String,
}

impl From<&User> for MemberRef {
    fn from(user: &User) -> Self {
        MemberRef {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedExpense {
    pub id: ObjectId,
    pub amount: f64,
    pub description: Option<String>,
    /// `None` once the paying user no longer exists.
    pub payer: Option<MemberRef>,
}

/// A group's current members and its expenses, both in stored order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedGroup {
    pub members: Vec<MemberRef>,
    pub expenses: Vec<ResolvedExpense>,
}

/// Full records behind a group, for handlers that render more than the split.
#[derive(Clone, Debug)]
pub struct GroupRecords {
    pub members: Vec<User>,
    pub expenses: Vec<(Expense, Option<User>)>,
}

impl GroupRecords {
    pub fn to_resolved(&self) -> ResolvedGroup {
        ResolvedGroup {
            members: self.members.iter().map(MemberRef::from).collect(),
            expenses: self
                .expenses
                .iter()
                .map(|(expense, payer)| ResolvedExpense {
                    id: expense.id,
                    amount: expense.amount,
                    description: expense.description.clone(),
                    payer: payer.as_ref().map(MemberRef::from),
                })
                .collect(),
        }
    }
}

fn in_order<T, K: std::hash::Hash + Eq>(
    order: &[K],
    records: Vec<T>,
    key: impl Fn(&T) -> K,
) -> Vec<T> {
    let mut by_key: HashMap<K, T> = records.into_iter().map(|r| (key(&r), r)).collect();
    order.iter().filter_map(|k| by_key.remove(k)).collect()
}

pub async fn load_group_records(store: &dyn Store, group: &Group) -> StoreResult<GroupRecords> {
    let members = in_order(
        &group.members,
        store.find_users_by_ids(&group.members).await?,
        |user| user.id,
    );
    let expenses = in_order(
        &group.expenses,
        store.find_expenses_by_ids(&group.expenses).await?,
        |expense| expense.id,
    );

    let mut payer_ids: Vec<UserId> = expenses.iter().map(|e| e.user_id).collect();
    payer_ids.sort();
    payer_ids.dedup();
    let payers: HashMap<UserId, User> = store
        .find_users_by_ids(&payer_ids)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let expenses = expenses
        .into_iter()
        .map(|expense| {
            let payer = payers.get(&expense.user_id).cloned();
            (expense, payer)
        })
        .collect();

    Ok(GroupRecords { members, expenses })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn user(name: &str) -> User {
        User {
            id: ObjectId::new(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    fn expense(owner: &User, amount: f64) -> Expense {
        let now = Utc::now();
        Expense {
            id: ObjectId::new(),
            user_id: owner.id,
            group_id: None,
            amount,
            category: "food".to_string(),
            date: now,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_web::test]
    async fn members_and_expenses_follow_group_order() {
        let store = MemoryStore::new();
        let (alice, bob) = (user("alice"), user("bob"));
        store.insert_user(&alice).await.unwrap();
        store.insert_user(&bob).await.unwrap();
        let first = expense(&alice, 10.0);
        let second = expense(&bob, 20.0);
        store.insert_expense(&first).await.unwrap();
        store.insert_expense(&second).await.unwrap();

        let now = Utc::now();
        let group = Group {
            id: ObjectId::new(),
            name: "trip".to_string(),
            description: None,
            created_by: bob.id,
            members: vec![bob.id, alice.id],
            expenses: vec![second.id, first.id],
            created_at: now,
            updated_at: now,
        };

        let resolved = load_group_records(&store, &group).await.unwrap().to_resolved();
        let names: Vec<_> = resolved.members.iter().map(|m| m.username.as_str()).collect();
        assert_eq!(names, ["bob", "alice"]);
        assert_eq!(resolved.expenses[0].id, second.id);
        assert_eq!(resolved.expenses[0].payer.as_ref().unwrap().username, "bob");
        assert_eq!(resolved.expenses[1].payer.as_ref().unwrap().username, "alice");
    }

    #[actix_web::test]
    async fn dangling_references_are_skipped() {
        let store = MemoryStore::new();
        let alice = user("alice");
        let gone = user("gone");
        store.insert_user(&alice).await.unwrap();
        let orphan = expense(&gone, 5.0);
        store.insert_expense(&orphan).await.unwrap();

        let now = Utc::now();
        let group = Group {
            id: ObjectId::new(),
            name: "trip".to_string(),
            description: None,
            created_by: alice.id,
            members: vec![alice.id, gone.id],
            expenses: vec![ObjectId::new(), orphan.id],
            created_at: now,
            updated_at: now,
        };

        let resolved = load_group_records(&store, &group).await.unwrap().to_resolved();
        assert_eq!(resolved.members.len(), 1);
        assert_eq!(resolved.expenses.len(), 1);
        assert_eq!(resolved.expenses[0].payer, None);
    }
}
