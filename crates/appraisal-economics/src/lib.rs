pub mod accounts;
pub mod exchange;
pub mod payout;
pub mod treasury;
pub mod types;

pub use accounts::{AccountBook, AccountInfo};
pub use payout::{LedgerGateway, PayoutGateway};
pub use treasury::{Treasury, TreasuryStats, TreasuryVault};
pub use types::{AccountAddress, Amount, TransferEvent, TransferReason, BASE_UNIT, BPS_DENOMINATOR};
