use serde::Serialize;

use crate::resolve::ResolvedGroup;

const NO_DESCRIPTION: &str = "No description";
const UNKNOWN_PAYER: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Debt {
    pub username: String,
    pub owes: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSplit {
    pub expense_id: String,
    pub description: String,
    pub payer: String,
    pub total_amount: f64,
    pub debts: Vec<Debt>,
}

// Every current member carries an equal share of each expense, whether or not
// they were a member when it was incurred. The payer's own share is dropped.
pub fn split_group_expenses(group: &ResolvedGroup) -> Vec<ExpenseSplit> {
    let member_count = group.members.len();
    group
        .expenses
        .iter()
        .map(|expense| {
            let payer_id = expense.payer.as_ref().map(|payer| payer.id);
            let debts = if member_count == 0 {
                Vec::new()
            } else {
                let share = expense.amount / member_count as f64;
                group
                    .members
                    .iter()
                    .filter(|member| Some(member.id) != payer_id)
                    .map(|member| Debt {
                        username: member.username.clone(),
                        owes: share,
                    })
                    .collect()
            };
            ExpenseSplit {
                expense_id: expense.id.to_hex(),
                description: expense
                    .description
                    .clone()
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
                payer: expense
                    .payer
                    .as_ref()
                    .map(|payer| payer.username.clone())
                    .unwrap_or_else(|| UNKNOWN_PAYER.to_string()),
                total_amount: expense.amount,
                debts,
            }
        })
        .collect()
}
