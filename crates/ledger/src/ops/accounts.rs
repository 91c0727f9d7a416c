use chrono::Utc;

use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Statement, prelude::*,
};

use crate::{Account, Currency, LedgerError, ResultLedger, accounts};

use super::Ledger;

impl Ledger {
    /// Open a new account with an opening balance in minor units.
    pub async fn create_account(
        &self,
        owner: &str,
        currency: Currency,
        opening_balance_minor: i64,
    ) -> ResultLedger<Account> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(LedgerError::InvalidAmount(
                "owner must not be empty".to_string(),
            ));
        }
        if opening_balance_minor < 0 {
            return Err(LedgerError::InvalidAmount(
                "opening balance must be >= 0".to_string(),
            ));
        }

        let model = accounts::ActiveModel {
            owner: ActiveValue::Set(owner.to_string()),
            balance_minor: ActiveValue::Set(opening_balance_minor),
            currency: ActiveValue::Set(currency.code().to_string()),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.database)
        .await?;

        Account::try_from(model)
    }

    /// Return an account snapshot from DB.
    pub async fn account(&self, account_id: i64) -> ResultLedger<Account> {
        let model = accounts::Entity::find_by_id(account_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::NotFound("account not exists".to_string()))?;

        Account::try_from(model)
    }

    /// List an owner's accounts, oldest first.
    pub async fn list_accounts(
        &self,
        owner: &str,
        limit: u64,
        offset: u64,
    ) -> ResultLedger<Vec<Account>> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::Owner.eq(owner))
            .order_by_asc(accounts::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.database)
            .await?;

        models.into_iter().map(Account::try_from).collect()
    }

    /// Apply a signed delta to an account balance and return the post-update
    /// snapshot.
    ///
    /// The read-modify-write happens in a single `UPDATE ... RETURNING`
    /// statement so the store performs it under the row lock; concurrent
    /// deltas on the same account cannot lose updates.
    pub(crate) async fn adjust_account_balance(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: i64,
        delta_minor: i64,
    ) -> ResultLedger<Account> {
        let backend = db_tx.get_database_backend();
        let row = db_tx
            .query_one(Statement::from_sql_and_values(
                backend,
                "UPDATE accounts SET balance_minor = balance_minor + ? \
                 WHERE id = ? \
                 RETURNING id, owner, balance_minor, currency, created_at",
                [delta_minor.into(), account_id.into()],
            ))
            .await?
            .ok_or_else(|| LedgerError::NotFound("account not exists".to_string()))?;

        let model = accounts::Model::from_query_result(&row, "")?;
        Account::try_from(model)
    }
}
