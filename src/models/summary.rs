use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub profile_id: String,
    pub month: String, // YYYY-MM
    pub income: f64,
    pub expense: f64,
    pub net: f64,
    pub bills_due: usize,
    pub bills_paid: usize,
    pub unpaid_total: f64,
    pub overdue_count: usize,
    pub total_debt: f64,
    pub available_funds: f64,
}
