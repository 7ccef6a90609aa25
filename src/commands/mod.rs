pub mod assets;
pub mod bills;
pub mod db;
pub mod debts;
pub mod profiles;
pub mod recurring;
pub mod settings;
pub mod summary;
pub mod transactions;
