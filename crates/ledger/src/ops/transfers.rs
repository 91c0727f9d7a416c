use chrono::Utc;

use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*,
};

use crate::{LedgerError, ResultLedger, Transfer, TransferOutcome, accounts, transfers};

use super::Ledger;

impl Ledger {
    /// Move `amount_minor` from one account to another as a single
    /// all-or-nothing unit.
    ///
    /// One call writes five rows: the transfer record, a `-amount` entry for
    /// the source, a `+amount` entry for the destination, and the two balance
    /// updates. Any step failing rolls the whole transaction back, so no
    /// partial transfer is ever observable.
    pub async fn transfer(
        &self,
        from_account_id: i64,
        to_account_id: i64,
        amount_minor: i64,
    ) -> ResultLedger<TransferOutcome> {
        if amount_minor <= 0 {
            return Err(LedgerError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        if from_account_id == to_account_id {
            return Err(LedgerError::InvalidAmount(
                "from_account_id and to_account_id must differ".to_string(),
            ));
        }

        let outcome = self
            .with_tx(|ledger, db_tx| {
                Box::pin(async move {
                    let transfer = ledger
                        .create_transfer_row(db_tx, from_account_id, to_account_id, amount_minor)
                        .await?;

                    let from_entry = ledger
                        .create_entry(db_tx, from_account_id, -amount_minor)
                        .await?;
                    let to_entry = ledger
                        .create_entry(db_tx, to_account_id, amount_minor)
                        .await?;

                    // Row locks for the two balance updates are always taken
                    // in ascending account id order, regardless of transfer
                    // direction. Opposite-direction transfers on the same
                    // pair therefore never lock in opposite orders.
                    let (from_account, to_account) = if from_account_id < to_account_id {
                        let from = ledger
                            .adjust_account_balance(db_tx, from_account_id, -amount_minor)
                            .await?;
                        let to = ledger
                            .adjust_account_balance(db_tx, to_account_id, amount_minor)
                            .await?;
                        (from, to)
                    } else {
                        let to = ledger
                            .adjust_account_balance(db_tx, to_account_id, amount_minor)
                            .await?;
                        let from = ledger
                            .adjust_account_balance(db_tx, from_account_id, -amount_minor)
                            .await?;
                        (from, to)
                    };

                    if ledger.forbid_overdraft && from_account.balance_minor < 0 {
                        return Err(LedgerError::InsufficientFunds(
                            from_account_id.to_string(),
                        ));
                    }

                    Ok(TransferOutcome {
                        transfer,
                        from_entry,
                        to_entry,
                        from_account,
                        to_account,
                    })
                })
            })
            .await?;

        tracing::debug!(
            transfer_id = outcome.transfer.id,
            from_account_id,
            to_account_id,
            amount_minor,
            "transfer applied"
        );
        Ok(outcome)
    }

    pub(crate) async fn create_transfer_row(
        &self,
        db_tx: &DatabaseTransaction,
        from_account_id: i64,
        to_account_id: i64,
        amount_minor: i64,
    ) -> ResultLedger<Transfer> {
        // Ensure both accounts exist before anything is written.
        for account_id in [from_account_id, to_account_id] {
            accounts::Entity::find_by_id(account_id)
                .one(db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound("account not exists".to_string()))?;
        }

        let model = transfers::ActiveModel {
            from_account_id: ActiveValue::Set(from_account_id),
            to_account_id: ActiveValue::Set(to_account_id),
            amount_minor: ActiveValue::Set(amount_minor),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(db_tx)
        .await?;

        Ok(Transfer::from(model))
    }

    /// Return a single transfer record.
    pub async fn transfer_record(&self, transfer_id: i64) -> ResultLedger<Transfer> {
        let model = transfers::Entity::find_by_id(transfer_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::NotFound("transfer not exists".to_string()))?;

        Ok(Transfer::from(model))
    }

    /// List the transfers touching an account on either side, oldest first.
    pub async fn list_transfers(
        &self,
        account_id: i64,
        limit: u64,
        offset: u64,
    ) -> ResultLedger<Vec<Transfer>> {
        let models = transfers::Entity::find()
            .filter(
                Condition::any()
                    .add(transfers::Column::FromAccountId.eq(account_id))
                    .add(transfers::Column::ToAccountId.eq(account_id)),
            )
            .order_by_asc(transfers::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.database)
            .await?;

        Ok(models.into_iter().map(Transfer::from).collect())
    }
}
