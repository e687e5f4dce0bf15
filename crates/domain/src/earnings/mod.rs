//! Vendor earnings: gross, platform fee and net over settled sales.

mod ledger;
mod service;

pub use ledger::{
    DEFAULT_PAGE_SIZE, EarningsSummary, EarningsTransaction, MonthlyEarnings, summarize,
};
pub use service::EarningsService;
