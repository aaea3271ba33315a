//! Repository implementations
//!
//! This module contains concrete implementations of all repository traits
//! defined in consulta-core, using sqlx for PostgreSQL access.

pub mod audit_repo;
pub mod balance_repo;
pub mod call_repo;
pub mod payment_repo;
pub mod referral_repo;
pub mod settlement_repo;
pub mod withdrawal_repo;

pub use audit_repo::PgAuditLogRepository;
pub use balance_repo::PgBalanceRepository;
pub use call_repo::PgCallRepository;
pub use payment_repo::PgPaymentRepository;
pub use referral_repo::PgReferralRepository;
pub use settlement_repo::PgSettlementRepository;
pub use withdrawal_repo::PgWithdrawalRepository;
