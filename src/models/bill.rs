use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub profile_id: String,
    pub name: String,      // e.g. "Conta de Luz"
    pub recipient: String, // e.g. "Neoenergia"
    pub amount: f64,
    pub due_date: String, // YYYY-MM-DD
    pub is_paid: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub debt_id: Option<String>,
    #[serde(default)]
    pub recurring_id: Option<String>,
}

/// Outcome of paying a bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidBill {
    pub bill: Bill,
    pub paid_on: String,
    pub transaction_id: Option<String>,
    pub remaining_debt_balance: Option<f64>,
}
