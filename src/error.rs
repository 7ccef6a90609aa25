use thiserror::Error;

#[derive(Debug, Error)]
pub enum VidaError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("debt {0} has no installment plan")]
    NoInstallmentPlan(String),

    #[error("bill {0} is already paid")]
    AlreadyPaid(String),

    #[error("invalid asset pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl VidaError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        VidaError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        VidaError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VidaError>;
