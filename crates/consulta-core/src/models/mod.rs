//! Domain models for Consulta
//!
//! This module contains all the core domain models used throughout the application.

pub mod audit;
pub mod balance;
pub mod call;
pub mod payment;
pub mod referral;
pub mod settlement;
pub mod user;
pub mod withdrawal;

pub use audit::{AuditLog, AuditLogBuilder, AuditLogData};
pub use balance::{BalanceChange, BalanceKind, BalanceOutcome, BalanceTransaction};
pub use call::{Call, CallClosing, CallStatus};
pub use payment::{PaymentOutcome, PaymentRecord, PaymentStatus};
pub use referral::{Referral, ReferralStatus, REFERRAL_CODE_LEN};
pub use settlement::{
    NewSettlement, ReferralEarnings, Settlement, SettlementFilter, SettlementSummary,
    SettlementType,
};
pub use user::{AdminRole, Permission};
pub use withdrawal::{
    CompletionMode, WithdrawalApproval, WithdrawalRejection, WithdrawalRequest, WithdrawalStatus,
};
