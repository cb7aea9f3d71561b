//! Request bodies and the JSON shapes handed back to clients.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::schemas::{Expense, ExpenseChanges, Group, GroupChanges, User};

pub const GROUP_NAME_MAX_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Amounts arrive either as JSON numbers or as numeric strings.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn parse(&self) -> ApiResult<f64> {
        let value = match self {
            AmountInput::Number(n) => Some(*n),
            AmountInput::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| ApiError::bad_request("Amount must be a positive number"))
    }
}

pub fn parse_date(raw: &str) -> ApiResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ApiError::bad_request("Invalid date"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseBody {
    pub amount: Option<AmountInput>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
}

/// Validated fields of a new expense.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpenseFields {
    pub amount: f64,
    pub category: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
}

impl ExpenseBody {
    pub fn into_fields(self) -> ApiResult<ExpenseFields> {
        let (Some(amount), Some(category), Some(date)) = (
            self.amount,
            non_empty(self.category),
            non_empty(self.date),
        ) else {
            return Err(ApiError::bad_request("Missing fields"));
        };
        Ok(ExpenseFields {
            amount: amount.parse()?,
            category,
            date: parse_date(&date)?,
            description: non_empty(self.description),
        })
    }

    pub fn into_changes(self) -> ApiResult<ExpenseChanges> {
        Ok(ExpenseChanges {
            amount: self.amount.as_ref().map(AmountInput::parse).transpose()?,
            category: non_empty(self.category),
            date: non_empty(self.date).as_deref().map(parse_date).transpose()?,
            description: non_empty(self.description),
        })
    }
}

fn check_group_name(name: &str) -> ApiResult<()> {
    if name.chars().count() > GROUP_NAME_MAX_LEN {
        return Err(ApiError::bad_request(format!(
            "Group name must be at most {GROUP_NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct GroupBody {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Emails or usernames of the people to add.
    #[serde(default)]
    pub members: Vec<String>,
}

impl GroupBody {
    pub fn validated_name(&self) -> ApiResult<String> {
        let name = non_empty(self.name.clone())
            .ok_or_else(|| ApiError::bad_request("Group name required"))?;
        check_group_name(&name)?;
        Ok(name)
    }
}

#[derive(Debug, Deserialize)]
pub struct GroupUpdateBody {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl GroupUpdateBody {
    pub fn into_changes(self) -> ApiResult<GroupChanges> {
        let name = match self.name {
            Some(raw) => {
                let name = non_empty(Some(raw))
                    .ok_or_else(|| ApiError::bad_request("Group name required"))?;
                check_group_name(&name)?;
                Some(name)
            }
            None => None,
        };
        Ok(GroupChanges {
            name,
            description: non_empty(self.description),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserView {
    pub fn summary(user: &User) -> Self {
        UserView {
            id: user.id.to_hex(),
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: None,
        }
    }

    pub fn profile(user: &User) -> Self {
        UserView {
            created_at: Some(user.created_at),
            ..Self::summary(user)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemberView {
    pub id: String,
    pub username: String,
}

impl From<&User> for MemberView {
    fn from(user: &User) -> Self {
        MemberView {
            id: user.id.to_hex(),
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseView {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub amount: f64,
    pub category: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Expense> for ExpenseView {
    fn from(expense: &Expense) -> Self {
        ExpenseView {
            id: expense.id.to_hex(),
            user_id: expense.user_id.to_hex(),
            group_id: expense.group_id.map(|id| id.to_hex()),
            amount: expense.amount,
            category: expense.category.clone(),
            date: expense.date,
            description: expense.description.clone(),
            created_at: expense.created_at,
            updated_at: expense.updated_at,
        }
    }
}

/// An expense with its owner's contact details, for the all-expenses listing.
#[derive(Debug, Serialize)]
pub struct OwnedExpenseView {
    #[serde(flatten)]
    pub expense: ExpenseView,
    pub owner: Option<UserView>,
}

/// A group expense with the member who paid it.
#[derive(Debug, Serialize)]
pub struct PaidExpenseView {
    #[serde(flatten)]
    pub expense: ExpenseView,
    pub payer: Option<MemberView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: String,
    pub members: Vec<String>,
    pub expenses: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Group> for GroupView {
    fn from(group: &Group) -> Self {
        GroupView {
            id: group.id.to_hex(),
            name: group.name.clone(),
            description: group.description.clone(),
            created_by: group.created_by.to_hex(),
            members: group.members.iter().map(|id| id.to_hex()).collect(),
            expenses: group.expenses.iter().map(|id| id.to_hex()).collect(),
            created_at: group.created_at,
            updated_at: group.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetailView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: String,
    pub members: Vec<MemberView>,
    pub expenses: Vec<PaidExpenseView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn body(value: serde_json::Value) -> ExpenseBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn amount_accepts_numbers_and_numeric_strings() {
        let fields = body(json!({ "amount": "12.5", "category": "food", "date": "2024-05-01" }))
            .into_fields()
            .unwrap();
        assert_eq!(fields.amount, 12.5);
        assert_eq!(fields.date, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());

        let fields = body(json!({ "amount": 7, "category": "food", "date": "2024-05-01T10:00:00Z" }))
            .into_fields()
            .unwrap();
        assert_eq!(fields.amount, 7.0);
    }

    #[test]
    fn malformed_amounts_are_rejected() {
        for amount in [json!("abc"), json!(-3), json!(0), json!("")] {
            let err = body(json!({ "amount": amount, "category": "c", "date": "2024-05-01" }))
                .into_fields()
                .unwrap_err();
            assert_eq!(err.to_string(), "Amount must be a positive number");
        }
    }

    #[test]
    fn missing_required_fields() {
        let err = body(json!({ "amount": 3, "date": "2024-05-01" }))
            .into_fields()
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing fields");
    }

    #[test]
    fn bad_date_is_rejected() {
        let err = body(json!({ "amount": 3, "category": "c", "date": "yesterday" }))
            .into_fields()
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid date");
    }

    #[test]
    fn changes_only_carry_supplied_fields() {
        let changes = body(json!({ "category": "rent", "description": "  " }))
            .into_changes()
            .unwrap();
        assert_eq!(
            changes,
            ExpenseChanges {
                category: Some("rent".to_string()),
                ..ExpenseChanges::default()
            }
        );
    }

    #[test]
    fn blank_rename_is_rejected() {
        let blank = GroupUpdateBody {
            name: Some(" ".to_string()),
            description: None,
        };
        assert_eq!(
            blank.into_changes().unwrap_err().to_string(),
            "Group name required"
        );

        let untouched = GroupUpdateBody {
            name: None,
            description: Some("notes".to_string()),
        };
        assert_eq!(untouched.into_changes().unwrap().name, None);
    }

    #[test]
    fn group_names_are_bounded() {
        let long = GroupBody {
            name: Some("x".repeat(51)),
            description: None,
            members: vec![],
        };
        assert!(long.validated_name().is_err());
        let missing = GroupBody {
            name: Some("   ".to_string()),
            description: None,
            members: vec![],
        };
        assert_eq!(
            missing.validated_name().unwrap_err().to_string(),
            "Group name required"
        );
    }
}
