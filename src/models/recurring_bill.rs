use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Yearly => "yearly",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "weekly" => Some(Recurrence::Weekly),
            "monthly" => Some(Recurrence::Monthly),
            "yearly" => Some(Recurrence::Yearly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringBill {
    pub id: String,
    pub profile_id: String,
    pub name: String,
    pub recipient: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    pub frequency: Recurrence,
    pub due_day: u32, // day of month; ISO weekday (Mon = 1) for weekly
    #[serde(default)]
    pub due_month: Option<u32>, // yearly only
    pub is_active: bool,
}
