use actix_web::{delete, get, post, put, web, HttpResponse};
use bson::oid::ObjectId;
use chrono::Utc;

use super::expenses::new_expense;
use super::{created, message, ok, parse_id};
use crate::auth::Caller;
use crate::dto::{
    ExpenseBody, ExpenseView, GroupBody, GroupDetailView, GroupUpdateBody, GroupView, MemberView,
    PaidExpenseView,
};
use crate::error::{ApiError, ApiResult};
use crate::resolve::{load_group_records, GroupRecords};
use crate::schemas::{Group, UserId};
use crate::split::split_group_expenses;
use crate::store::Store;

const NOT_FOUND: &str = "Group not found";

async fn find_group(store: &dyn Store, raw_id: &str) -> ApiResult<Group> {
    let id = parse_id(raw_id, NOT_FOUND)?;
    store
        .find_group(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))
}

async fn member_group(store: &dyn Store, raw_id: &str, caller: &Caller) -> ApiResult<Group> {
    let group = find_group(store, raw_id).await?;
    if !group.is_member(&caller.id) {
        return Err(ApiError::forbidden("Unauthorized"));
    }
    Ok(group)
}

async fn owned_group(store: &dyn Store, raw_id: &str, caller: &Caller) -> ApiResult<Group> {
    let group = find_group(store, raw_id).await?;
    if group.created_by != caller.id {
        return Err(ApiError::forbidden("Unauthorized action"));
    }
    Ok(group)
}

fn paid_expenses(records: &GroupRecords) -> Vec<PaidExpenseView> {
    records
        .expenses
        .iter()
        .map(|(expense, payer)| PaidExpenseView {
            expense: ExpenseView::from(expense),
            payer: payer.as_ref().map(MemberView::from),
        })
        .collect()
}

fn detail_view(group: &Group, records: &GroupRecords) -> GroupDetailView {
    GroupDetailView {
        id: group.id.to_hex(),
        name: group.name.clone(),
        description: group.description.clone(),
        created_by: group.created_by.to_hex(),
        members: records.members.iter().map(MemberView::from).collect(),
        expenses: paid_expenses(records),
        created_at: group.created_at,
        updated_at: group.updated_at,
    }
}

#[post("")]
pub async fn create_group(
    caller: Caller,
    store: web::Data<dyn Store>,
    body: web::Json<GroupBody>,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let name = body.validated_name()?;

    let identifiers: Vec<String> = body
        .members
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    let found = if identifiers.is_empty() {
        Vec::new()
    } else {
        store.find_users_matching(&identifiers).await?
    };

    // Creator first, then whoever the identifiers matched, without repeats.
    let mut members: Vec<UserId> = vec![caller.id];
    for user in found {
        if !members.contains(&user.id) {
            members.push(user.id);
        }
    }

    let now = Utc::now();
    let group = Group {
        id: ObjectId::new(),
        name,
        description: body
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        created_by: caller.id,
        members,
        expenses: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    store.insert_group(&group).await?;
    tracing::info!(group = %group.id, members = group.members.len(), "group created");

    Ok(created(GroupView::from(&group)))
}

// Only the caller's groups, never every group in the database.
#[get("")]
pub async fn list_groups(caller: Caller, store: web::Data<dyn Store>) -> ApiResult<HttpResponse> {
    let groups = store.find_groups_for_member(&caller.id).await?;
    let mut views = Vec::with_capacity(groups.len());
    for group in &groups {
        let records = load_group_records(store.get_ref(), group).await?;
        views.push(detail_view(group, &records));
    }
    Ok(ok(views))
}

#[get("/{group_id}")]
pub async fn get_group(
    caller: Caller,
    store: web::Data<dyn Store>,
    group_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let group = member_group(store.get_ref(), &group_id, &caller).await?;
    let records = load_group_records(store.get_ref(), &group).await?;
    Ok(ok(detail_view(&group, &records)))
}

#[put("/{group_id}")]
pub async fn update_group(
    caller: Caller,
    store: web::Data<dyn Store>,
    group_id: web::Path<String>,
    body: web::Json<GroupUpdateBody>,
) -> ApiResult<HttpResponse> {
    let group = owned_group(store.get_ref(), &group_id, &caller).await?;
    let changes = body.into_inner().into_changes()?;
    let group = store
        .update_group(&group.id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    Ok(ok(GroupView::from(&group)))
}

#[delete("/{group_id}")]
pub async fn delete_group(
    caller: Caller,
    store: web::Data<dyn Store>,
    group_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let group = owned_group(store.get_ref(), &group_id, &caller).await?;
    store
        .delete_group(&group.id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
    tracing::info!(group = %group.id, "group deleted");
    Ok(message("Group deleted successfully"))
}

#[post("/{group_id}/expenses")]
pub async fn add_group_expense(
    caller: Caller,
    store: web::Data<dyn Store>,
    group_id: web::Path<String>,
    body: web::Json<ExpenseBody>,
) -> ApiResult<HttpResponse> {
    let group = member_group(store.get_ref(), &group_id, &caller).await?;
    let fields = body.into_inner().into_fields()?;

    let expense = new_expense(caller.id, Some(group.id), fields);
    store.insert_expense(&expense).await?;
    store.push_group_expense(&group.id, &expense.id).await?;
    tracing::debug!(group = %group.id, expense = %expense.id, "group expense added");

    Ok(created(ExpenseView::from(&expense)))
}

#[get("/{group_id}/expenses")]
pub async fn list_group_expenses(
    caller: Caller,
    store: web::Data<dyn Store>,
    group_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let group = member_group(store.get_ref(), &group_id, &caller).await?;
    let records = load_group_records(store.get_ref(), &group).await?;
    Ok(ok(paid_expenses(&records)))
}

#[get("/{group_id}/split")]
pub async fn group_split(
    caller: Caller,
    store: web::Data<dyn Store>,
    group_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let group = member_group(store.get_ref(), &group_id, &caller).await?;
    let records = load_group_records(store.get_ref(), &group).await?;
    Ok(ok(split_group_expenses(&records.to_resolved())))
}
