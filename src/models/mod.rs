pub mod bill;
pub mod debt;
pub mod profile;
pub mod recurring_bill;
pub mod summary;
pub mod transaction;
