pub use accounts::Account;
pub use currency::Currency;
pub use entries::Entry;
pub use error::LedgerError;
pub use ops::{Ledger, LedgerBuilder};
pub use transfers::{Transfer, TransferOutcome};

mod accounts;
mod currency;
mod entries;
mod error;
mod ops;
mod transfers;

type ResultLedger<T> = Result<T, LedgerError>;
