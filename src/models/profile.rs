use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String, // UUID for local profiles
    pub email: Option<String>,
    pub created_at: String, // RFC 3339
    pub cash_balance: Option<f64>,
    pub pix_balance: Option<f64>,
}

impl UserProfile {
    pub fn new_local(email: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            created_at: chrono::Utc::now().to_rfc3339(),
            cash_balance: None,
            pix_balance: None,
        }
    }

    /// Cash plus pix, treating missing balances as zero.
    pub fn available_funds(&self) -> f64 {
        self.cash_balance.unwrap_or(0.0) + self.pix_balance.unwrap_or(0.0)
    }
}

/// The profile the front end is currently working as.
#[derive(Debug, Default)]
pub struct ActiveProfile {
    pub profile: Option<UserProfile>,
}
