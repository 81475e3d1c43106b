pub mod error;
pub mod sources;
pub mod types;
