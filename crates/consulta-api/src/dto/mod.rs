//! Data Transfer Objects (DTOs) for API requests and responses

pub mod balance;
pub mod call;
pub mod common;
pub mod earnings;
pub mod matching;
pub mod payment;
pub mod referral;
pub mod withdrawal;

pub use balance::*;
pub use call::*;
pub use common::*;
pub use earnings::*;
pub use matching::*;
pub use payment::*;
pub use referral::*;
pub use withdrawal::*;
