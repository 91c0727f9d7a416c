use std::sync::Arc;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

use ledger::{Currency, Ledger, LedgerError};
use migration::MigratorTrait;
use uuid::Uuid;

async fn ledger_with_db() -> (Ledger, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder().database(db.clone()).build().await.unwrap();
    (ledger, db)
}

async fn ledger_with_file_db() -> (Ledger, DatabaseConnection, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    // One pooled connection: SQLite has a single writer, so concurrent
    // transactions queue on the pool instead of failing busy.
    let mut options = ConnectOptions::new(url);
    options.max_connections(1);
    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder().database(db.clone()).build().await.unwrap();

    (ledger, db, path)
}

async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS cnt FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "cnt").unwrap()
}

#[tokio::test]
async fn transfer_moves_money_and_records_ledger() {
    let (ledger, _db) = ledger_with_db().await;
    let from = ledger.create_account("alice", Currency::Usd, 100).await.unwrap();
    let to = ledger.create_account("bob", Currency::Usd, 50).await.unwrap();

    let outcome = ledger.transfer(from.id, to.id, 30).await.unwrap();

    assert_eq!(outcome.transfer.from_account_id, from.id);
    assert_eq!(outcome.transfer.to_account_id, to.id);
    assert_eq!(outcome.transfer.amount_minor, 30);
    assert_eq!(outcome.from_entry.account_id, from.id);
    assert_eq!(outcome.from_entry.amount_minor, -30);
    assert_eq!(outcome.to_entry.account_id, to.id);
    assert_eq!(outcome.to_entry.amount_minor, 30);
    assert_eq!(outcome.from_account.balance_minor, 70);
    assert_eq!(outcome.to_account.balance_minor, 80);

    // The committed state matches the snapshots in the outcome.
    let from_after = ledger.account(from.id).await.unwrap();
    let to_after = ledger.account(to.id).await.unwrap();
    assert_eq!(from_after.balance_minor, 70);
    assert_eq!(to_after.balance_minor, 80);
    assert_eq!(from_after.balance_minor + to_after.balance_minor, 150);

    let recorded = ledger.transfer_record(outcome.transfer.id).await.unwrap();
    assert_eq!(recorded, outcome.transfer);
}

#[tokio::test]
async fn transfer_entries_sum_to_zero() {
    let (ledger, _db) = ledger_with_db().await;
    let from = ledger.create_account("alice", Currency::Usd, 500).await.unwrap();
    let to = ledger.create_account("bob", Currency::Usd, 500).await.unwrap();

    ledger.transfer(from.id, to.id, 120).await.unwrap();

    let from_entries = ledger.list_entries(from.id, 50, 0).await.unwrap();
    let to_entries = ledger.list_entries(to.id, 50, 0).await.unwrap();
    assert_eq!(from_entries.len(), 1);
    assert_eq!(to_entries.len(), 1);
    assert_eq!(from_entries[0].amount_minor, -120);
    assert_eq!(to_entries[0].amount_minor, 120);
    assert_eq!(
        from_entries[0].amount_minor + to_entries[0].amount_minor,
        0
    );
}

#[tokio::test]
async fn transfer_rejects_bad_arguments_before_touching_the_store() {
    let (ledger, db) = ledger_with_db().await;
    let from = ledger.create_account("alice", Currency::Usd, 100).await.unwrap();
    let to = ledger.create_account("bob", Currency::Usd, 100).await.unwrap();

    let err = ledger.transfer(from.id, to.id, 0).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InvalidAmount("amount_minor must be > 0".to_string())
    );

    let err = ledger.transfer(from.id, to.id, -5).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InvalidAmount("amount_minor must be > 0".to_string())
    );

    let err = ledger.transfer(from.id, from.id, 10).await.unwrap_err();
    assert_eq!(
        err,
        LedgerError::InvalidAmount("from_account_id and to_account_id must differ".to_string())
    );

    assert_eq!(count_rows(&db, "transfers").await, 0);
    assert_eq!(count_rows(&db, "entries").await, 0);
    assert_eq!(ledger.account(from.id).await.unwrap().balance_minor, 100);
    assert_eq!(ledger.account(to.id).await.unwrap().balance_minor, 100);
}

#[tokio::test]
async fn transfer_to_missing_account_rolls_back() {
    let (ledger, db) = ledger_with_db().await;
    let from = ledger.create_account("alice", Currency::Usd, 100).await.unwrap();

    let err = ledger.transfer(from.id, from.id + 999, 30).await.unwrap_err();
    assert_eq!(err, LedgerError::NotFound("account not exists".to_string()));

    assert_eq!(ledger.account(from.id).await.unwrap().balance_minor, 100);
    assert_eq!(count_rows(&db, "transfers").await, 0);
    assert_eq!(count_rows(&db, "entries").await, 0);
}

#[tokio::test]
async fn store_failure_mid_transfer_leaves_no_partial_writes() {
    let (ledger, db) = ledger_with_db().await;
    let from = ledger.create_account("alice", Currency::Usd, 100).await.unwrap();
    let to = ledger.create_account("bob", Currency::Usd, 50).await.unwrap();

    // Break the entry step only: the transfer row insert still succeeds,
    // so a rollback failure would leave it behind.
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, "DROP TABLE entries".to_string()))
        .await
        .unwrap();

    let err = ledger.transfer(from.id, to.id, 30).await.unwrap_err();
    assert!(matches!(err, LedgerError::Database(_)));

    assert_eq!(count_rows(&db, "transfers").await, 0);
    assert_eq!(ledger.account(from.id).await.unwrap().balance_minor, 100);
    assert_eq!(ledger.account(to.id).await.unwrap().balance_minor, 50);
}

#[tokio::test]
async fn forbid_overdraft_rejects_insufficient_funds() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let strict = Ledger::builder()
        .database(db.clone())
        .forbid_overdraft(true)
        .build()
        .await
        .unwrap();

    let from = strict.create_account("alice", Currency::Usd, 20).await.unwrap();
    let to = strict.create_account("bob", Currency::Usd, 0).await.unwrap();

    let err = strict.transfer(from.id, to.id, 30).await.unwrap_err();
    assert_eq!(err, LedgerError::InsufficientFunds(from.id.to_string()));

    assert_eq!(strict.account(from.id).await.unwrap().balance_minor, 20);
    assert_eq!(strict.account(to.id).await.unwrap().balance_minor, 0);
    assert_eq!(count_rows(&db, "transfers").await, 0);
    assert_eq!(count_rows(&db, "entries").await, 0);

    // The default policy lets the same transfer overdraw.
    let relaxed = Ledger::builder().database(db.clone()).build().await.unwrap();
    let outcome = relaxed.transfer(from.id, to.id, 30).await.unwrap();
    assert_eq!(outcome.from_account.balance_minor, -10);
    assert_eq!(outcome.to_account.balance_minor, 30);
}

#[tokio::test]
async fn opposite_direction_transfers_all_complete() {
    let (ledger, db, path) = ledger_with_file_db().await;
    let a = ledger.create_account("alice", Currency::Usd, 1000).await.unwrap();
    let b = ledger.create_account("bob", Currency::Usd, 1000).await.unwrap();

    let ledger = Arc::new(ledger);
    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = Arc::clone(&ledger);
        let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
        handles.push(tokio::spawn(
            async move { ledger.transfer(from, to, 10).await },
        ));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Five transfers each way: both balances end where they started and the
    // total is conserved.
    let a_after = ledger.account(a.id).await.unwrap();
    let b_after = ledger.account(b.id).await.unwrap();
    assert_eq!(a_after.balance_minor, 1000);
    assert_eq!(b_after.balance_minor, 1000);
    assert_eq!(count_rows(&db, "transfers").await, 10);
    assert_eq!(count_rows(&db, "entries").await, 20);

    drop(ledger);
    drop(db);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn repeated_transfers_accumulate() {
    let (ledger, _db) = ledger_with_db().await;
    let from = ledger.create_account("alice", Currency::Usd, 100).await.unwrap();
    let to = ledger.create_account("bob", Currency::Usd, 0).await.unwrap();

    for _ in 0..5 {
        ledger.transfer(from.id, to.id, 10).await.unwrap();
    }

    assert_eq!(ledger.account(from.id).await.unwrap().balance_minor, 50);
    assert_eq!(ledger.account(to.id).await.unwrap().balance_minor, 50);

    let entries = ledger.list_entries(to.id, 50, 0).await.unwrap();
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e.amount_minor == 10));

    let transfers = ledger.list_transfers(from.id, 50, 0).await.unwrap();
    assert_eq!(transfers.len(), 5);
}
