//! Common module - shared types, errors and collaborator contracts

pub mod clock;
pub mod errors;
pub mod timeout;
pub mod traits;
pub mod types;
