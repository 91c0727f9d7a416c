use chrono::Utc;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*,
};

use crate::{Entry, LedgerError, ResultLedger, accounts, entries};

use super::Ledger;

impl Ledger {
    /// Record a signed balance change against an account.
    ///
    /// Runs inside the caller's transaction; the row becomes visible only if
    /// that transaction commits.
    pub(crate) async fn create_entry(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: i64,
        amount_minor: i64,
    ) -> ResultLedger<Entry> {
        accounts::Entity::find_by_id(account_id)
            .one(db_tx)
            .await?
            .ok_or_else(|| LedgerError::NotFound("account not exists".to_string()))?;

        let model = entries::ActiveModel {
            account_id: ActiveValue::Set(account_id),
            amount_minor: ActiveValue::Set(amount_minor),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(db_tx)
        .await?;

        Ok(Entry::from(model))
    }

    /// Return a single ledger entry.
    pub async fn entry(&self, entry_id: i64) -> ResultLedger<Entry> {
        let model = entries::Entity::find_by_id(entry_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| LedgerError::NotFound("entry not exists".to_string()))?;

        Ok(Entry::from(model))
    }

    /// List the entries recorded against an account, oldest first.
    pub async fn list_entries(
        &self,
        account_id: i64,
        limit: u64,
        offset: u64,
    ) -> ResultLedger<Vec<Entry>> {
        let models = entries::Entity::find()
            .filter(entries::Column::AccountId.eq(account_id))
            .order_by_asc(entries::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.database)
            .await?;

        Ok(models.into_iter().map(Entry::from).collect())
    }
}
