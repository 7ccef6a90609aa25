use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtPayment {
    pub date: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: String,
    pub profile_id: String,
    pub name: String,   // e.g. "Cartão de Crédito"
    pub lender: String, // e.g. "Itaú"
    pub total_balance: f64,
    pub interest_rate: Option<f64>, // APR, percent
    pub priority: i64,
    pub category: String,
    #[serde(default)]
    pub installment_count: Option<u32>,
    #[serde(default)]
    pub installment_amount: Option<f64>,
    #[serde(default)]
    pub first_due_date: Option<String>,
    #[serde(default)]
    pub payments: Vec<DebtPayment>,
}

/// The schedule-relevant part of a debt.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentPlan {
    pub count: u32,
    pub amount: Option<f64>,
    pub first_due_date: String,
}

impl Debt {
    pub fn installment_plan(&self) -> Option<InstallmentPlan> {
        let count = self.installment_count.filter(|count| *count > 0)?;
        let first_due_date = self.first_due_date.clone()?;
        Some(InstallmentPlan {
            count,
            amount: self.installment_amount,
            first_due_date,
        })
    }

    pub fn total_paid(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }
}
