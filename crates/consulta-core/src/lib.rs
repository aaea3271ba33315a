//! Consulta Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Consulta settlement core. It includes:
//!
//! - Domain models (Call, Settlement, Referral, WithdrawalRequest, ...)
//! - The per-minute rate and revenue split policy
//! - Repository traits implemented by the storage layer
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod pricing;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;
pub use pricing::{RevenueSplit, Tariff};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
