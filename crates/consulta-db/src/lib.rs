//! Consulta Database Layer
//!
//! This crate provides PostgreSQL access and repository implementations
//! for the Consulta settlement core. It includes:
//!
//! - Connection pool management and embedded migrations
//! - Repository implementations for every storage trait in consulta-core
//! - The balance mutation module, the only code that writes user balances
//! - A retry policy for transient storage failures
//! - An in-memory backend with the same atomicity, for tests and local runs

pub mod balance;
pub mod error;
pub mod memory;
pub mod pool;
pub mod repositories;
pub mod retry;

pub use memory::MemoryStore;
pub use pool::{create_pool, run_migrations};
pub use repositories::*;
pub use retry::RetryPolicy;

// Re-export commonly used types
pub use consulta_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};

use consulta_core::traits::Repositories;
use std::sync::Arc;

/// Build the PostgreSQL-backed repository bundle
pub fn pg_repositories(pool: &PgPool) -> Repositories {
    Repositories {
        calls: Arc::new(PgCallRepository::new(pool.clone())),
        ledger: Arc::new(PgSettlementRepository::new(pool.clone())),
        balances: Arc::new(PgBalanceRepository::new(pool.clone())),
        withdrawals: Arc::new(PgWithdrawalRepository::new(pool.clone())),
        payments: Arc::new(PgPaymentRepository::new(pool.clone())),
        referrals: Arc::new(PgReferralRepository::new(pool.clone())),
        audit: Arc::new(PgAuditLogRepository::new(pool.clone())),
    }
}
