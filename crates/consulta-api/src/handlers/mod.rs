//! HTTP request handlers

pub mod balance;
pub mod call;
pub mod earnings;
pub mod health;
pub mod matching;
pub mod payment;
pub mod referral;
pub mod withdrawal;
