mod account;
pub mod balance;
mod ledger;
mod money;
pub mod period;
mod transaction;

pub use account::*;
pub use balance::{BalanceOverflow, Totals};
pub use ledger::*;
pub use money::*;
pub use period::{period_start, summarize, PeriodSummary, SALARY_DAY_RANGE};
pub use transaction::*;
