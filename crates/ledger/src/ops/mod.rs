use std::future::Future;
use std::pin::Pin;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::{LedgerError, ResultLedger};

mod accounts;
mod entries;
mod transfers;

/// Future returned by a unit of work passed to [`Ledger::with_tx`].
pub(crate) type TxFuture<'t, T> = Pin<Box<dyn Future<Output = ResultLedger<T>> + Send + 't>>;

#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    forbid_overdraft: bool,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    /// Run a unit of work inside a store transaction, committing on success
    /// and rolling back on error.
    ///
    /// The transaction handle passed to `op` is only valid for the duration
    /// of that call; every exit path ends in commit or rollback. Dropping the
    /// returned future mid-flight drops the handle, which also rolls the
    /// transaction back. If the unit of work fails and the rollback fails
    /// too, both causes are kept in [`LedgerError::RollbackFailed`].
    pub(crate) async fn with_tx<T, F>(&self, op: F) -> ResultLedger<T>
    where
        F: for<'t> FnOnce(&'t Ledger, &'t DatabaseTransaction) -> TxFuture<'t, T>,
    {
        let db_tx = self
            .database
            .begin()
            .await
            .map_err(LedgerError::TransactionStart)?;

        let result = op(self, &db_tx).await;
        match result {
            Ok(value) => {
                db_tx.commit().await?;
                Ok(value)
            }
            Err(err) => match db_tx.rollback().await {
                Ok(()) => {
                    tracing::debug!(error = %err, "transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    tracing::warn!(error = %err, rollback_error = %rollback, "rollback failed");
                    Err(LedgerError::RollbackFailed {
                        source: Box::new(err),
                        rollback,
                    })
                }
            },
        }
    }
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
    forbid_overdraft: bool,
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Reject transfers that would leave the source account negative.
    ///
    /// Off by default: accounts may overdraw and the caller settles the
    /// policy elsewhere.
    pub fn forbid_overdraft(mut self, forbid: bool) -> LedgerBuilder {
        self.forbid_overdraft = forbid;
        self
    }

    /// Construct `Ledger`
    pub async fn build(self) -> ResultLedger<Ledger> {
        Ok(Ledger {
            database: self.database,
            forbid_overdraft: self.forbid_overdraft,
        })
    }
}
