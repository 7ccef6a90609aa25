pub mod cache;
pub mod manifest;
