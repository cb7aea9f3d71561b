use std::collections::HashMap;

use actix_web::{delete, get, post, put, web, HttpResponse};
use bson::oid::ObjectId;
use chrono::Utc;

use super::{created, message, ok, parse_id};
use crate::auth::Caller;
use crate::dto::{ExpenseBody, ExpenseFields, ExpenseView, OwnedExpenseView, UserView};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{Expense, User, UserId};
use crate::store::Store;

const NOT_FOUND: &str = "Expense not found";

pub(super) fn new_expense(owner: UserId, group: Option<ObjectId>, fields: ExpenseFields) -> Expense {
    let now = Utc::now();
    Expense {
        id: ObjectId::new(),
        user_id: owner,
        group_id: group,
        amount: fields.amount,
        category: fields.category,
        date: fields.date,
        description: fields.description,
        created_at: now,
        updated_at: now,
    }
}

#[post("")]
pub async fn add_expense(
    caller: Caller,
    store: web::Data<dyn Store>,
    body: web::Json<ExpenseBody>,
) -> ApiResult<HttpResponse> {
    let expense = new_expense(caller.id, None, body.into_inner().into_fields()?);
    store.insert_expense(&expense).await?;
    tracing::debug!(expense = %expense.id, user = %caller.id, "personal expense added");
    Ok(created(ExpenseView::from(&expense)))
}

#[get("")]
pub async fn list_expenses(caller: Caller, store: web::Data<dyn Store>) -> ApiResult<HttpResponse> {
    let expenses = store.find_expenses_by_owner(&caller.id).await?;
    Ok(ok(expenses.iter().map(ExpenseView::from).collect::<Vec<_>>()))
}

#[get("/admin/all")]
pub async fn list_all_expenses(
    _caller: Caller,
    store: web::Data<dyn Store>,
) -> ApiResult<HttpResponse> {
    let expenses = store.find_all_expenses().await?;
    if expenses.is_empty() {
        return Err(ApiError::not_found("No expenses found"));
    }

    let mut owner_ids: Vec<UserId> = expenses.iter().map(|e| e.user_id).collect();
    owner_ids.sort();
    owner_ids.dedup();
    let owners: HashMap<UserId, User> = store
        .find_users_by_ids(&owner_ids)
        .await?
        .into_iter()
        .map(|user| (user.id, user))
        .collect();

    let views: Vec<_> = expenses
        .iter()
        .map(|expense| OwnedExpenseView {
            expense: ExpenseView::from(expense),
            owner: owners.get(&expense.user_id).map(UserView::summary),
        })
        .collect();
    Ok(ok(views))
}

#[get("/{id}")]
pub async fn get_expense(
    caller: Caller,
    store: web::Data<dyn Store>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&id, NOT_FOUND)?;
    let expense = store
        .find_owned_expense(&id, &caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ok(ExpenseView::from(&expense)))
}

#[put("/{id}")]
pub async fn update_expense(
    caller: Caller,
    store: web::Data<dyn Store>,
    id: web::Path<String>,
    body: web::Json<ExpenseBody>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&id, NOT_FOUND)?;
    let changes = body.into_inner().into_changes()?;
    let expense = store
        .update_owned_expense(&id, &caller.id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ok(ExpenseView::from(&expense)))
}

#[delete("/{id}")]
pub async fn delete_expense(
    caller: Caller,
    store: web::Data<dyn Store>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let id = parse_id(&id, NOT_FOUND)?;
    store
        .delete_owned_expense(&id, &caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(message("Expense deleted successfully"))
}
