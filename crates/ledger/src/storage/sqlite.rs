//! SQLite-backed storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::traits::LedgerStore;
use crate::models::{Category, MailAccount, SyncStage, SyncStatus, Transaction, TxnType};

/// Database migrations
///
/// Applied in order; the user_version pragma tracks what has run.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        r#"
        -- Linked mailbox accounts
        CREATE TABLE accounts (
            user_id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            address TEXT NOT NULL,
            access_token TEXT,
            refresh_token TEXT,
            connected_at TEXT NOT NULL
        );

        -- Extracted transactions; the primary key is the dedup invariant
        CREATE TABLE transactions (
            user_id TEXT NOT NULL,
            email_id TEXT NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            txn_type TEXT NOT NULL,
            category TEXT NOT NULL,
            merchant TEXT NOT NULL,
            description TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            confidence REAL NOT NULL,
            raw_subject TEXT NOT NULL,
            raw_body TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, email_id)
        );

        CREATE INDEX idx_transactions_user_date
            ON transactions(user_id, date DESC);

        -- One live progress record per user
        CREATE TABLE sync_status (
            user_id TEXT PRIMARY KEY,
            sync_in_progress INTEGER NOT NULL DEFAULT 0,
            sync_phase TEXT NOT NULL,
            progress_percentage INTEGER NOT NULL DEFAULT 0,
            total_emails_found INTEGER NOT NULL DEFAULT 0,
            emails_processed INTEGER NOT NULL DEFAULT 0,
            transactions_found INTEGER NOT NULL DEFAULT 0,
            phase_1_complete INTEGER NOT NULL DEFAULT 0,
            phase_2_complete INTEGER NOT NULL DEFAULT 0,
            phase_3_complete INTEGER NOT NULL DEFAULT 0,
            phase_4_complete INTEGER NOT NULL DEFAULT 0,
            estimated_completion_time TEXT,
            error_message TEXT,
            current_status TEXT NOT NULL,
            last_sync_at TEXT
        );
        "#,
    )])
}

/// SQLite-based ledger storage
pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

impl SqliteLedgerStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL keeps readers unblocked during the per-batch status writes;
        // NORMAL sync is safe with WAL.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_ts(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let date: String = row.get(3)?;
    let txn_type: String = row.get(4)?;
    let category: String = row.get(5)?;
    Ok(Transaction {
        user_id: row.get(0)?,
        email_id: row.get(1)?,
        amount: row.get(2)?,
        date: parse_ts(3, &date)?,
        txn_type: TxnType::parse(&txn_type).unwrap_or(TxnType::Debit),
        category: Category::parse(&category).unwrap_or(Category::Other),
        merchant: row.get(6)?,
        description: row.get(7)?,
        payment_method: row.get(8)?,
        confidence: row.get(9)?,
        raw_subject: row.get(10)?,
        raw_body: row.get(11)?,
    })
}

const TXN_COLUMNS: &str = "user_id, email_id, amount, date, txn_type, category, merchant, \
     description, payment_method, confidence, raw_subject, raw_body";

impl LedgerStore for SqliteLedgerStore {
    fn upsert_account(&self, account: MailAccount) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO accounts (user_id, provider, address, access_token, refresh_token, connected_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                provider = excluded.provider,
                address = excluded.address,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token
            "#,
            params![
                account.user_id,
                account.provider,
                account.address,
                account.access_token,
                account.refresh_token,
                account.connected_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_account(&self, user_id: &str) -> Result<Option<MailAccount>> {
        let conn = self.conn.lock().unwrap();
        let account = conn
            .query_row(
                "SELECT user_id, provider, address, access_token, refresh_token, connected_at
                 FROM accounts WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let connected_at: String = row.get(5)?;
                    Ok(MailAccount {
                        user_id: row.get(0)?,
                        provider: row.get(1)?,
                        address: row.get(2)?,
                        access_token: row.get(3)?,
                        refresh_token: row.get(4)?,
                        connected_at: parse_ts(5, &connected_at)?,
                    })
                },
            )
            .optional()?;
        Ok(account)
    }

    fn update_access_token(&self, user_id: &str, access_token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE accounts SET access_token = ?2 WHERE user_id = ?1",
            params![user_id, access_token],
        )?;
        anyhow::ensure!(updated > 0, "No account for user {}", user_id);
        Ok(())
    }

    fn insert_transaction(&self, txn: &Transaction) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        // The primary key carries the dedup invariant; re-processing a
        // message is a no-op rather than an error.
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO transactions ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                TXN_COLUMNS
            ),
            params![
                txn.user_id,
                txn.email_id,
                txn.amount,
                txn.date.to_rfc3339(),
                txn.txn_type.as_str(),
                txn.category.as_str(),
                txn.merchant,
                txn.description,
                txn.payment_method,
                txn.confidence,
                txn.raw_subject,
                txn.raw_body,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn has_transaction(&self, user_id: &str, email_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?1 AND email_id = ?2",
            params![user_id, email_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list_transactions(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions
             WHERE user_id = ?1 ORDER BY date DESC LIMIT ?2 OFFSET ?3",
            TXN_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![user_id, limit as i64, offset as i64],
            row_to_transaction,
        )?;
        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row?);
        }
        Ok(transactions)
    }

    fn count_transactions(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn get_sync_status(&self, user_id: &str) -> Result<Option<SyncStatus>> {
        let conn = self.conn.lock().unwrap();
        let status = conn
            .query_row(
                "SELECT user_id, sync_in_progress, sync_phase, progress_percentage,
                        total_emails_found, emails_processed, transactions_found,
                        phase_1_complete, phase_2_complete, phase_3_complete, phase_4_complete,
                        estimated_completion_time, error_message, current_status, last_sync_at
                 FROM sync_status WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let phase: String = row.get(2)?;
                    let eta: Option<String> = row.get(11)?;
                    let last_sync: Option<String> = row.get(14)?;
                    Ok(SyncStatus {
                        user_id: row.get(0)?,
                        sync_in_progress: row.get(1)?,
                        sync_phase: SyncStage::parse(&phase).unwrap_or(SyncStage::Phase1),
                        progress_percentage: row.get::<_, i64>(3)?.clamp(0, 100) as u8,
                        total_emails_found: row.get::<_, i64>(4)? as u64,
                        emails_processed: row.get::<_, i64>(5)? as u64,
                        transactions_found: row.get::<_, i64>(6)? as u64,
                        phase_1_complete: row.get(7)?,
                        phase_2_complete: row.get(8)?,
                        phase_3_complete: row.get(9)?,
                        phase_4_complete: row.get(10)?,
                        estimated_completion_time: eta
                            .as_deref()
                            .map(|s| parse_ts(11, s))
                            .transpose()?,
                        error_message: row.get(12)?,
                        current_status: row.get(13)?,
                        last_sync_at: last_sync
                            .as_deref()
                            .map(|s| parse_ts(14, s))
                            .transpose()?,
                    })
                },
            )
            .optional()?;
        Ok(status)
    }

    fn save_sync_status(&self, status: &SyncStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO sync_status (
                user_id, sync_in_progress, sync_phase, progress_percentage,
                total_emails_found, emails_processed, transactions_found,
                phase_1_complete, phase_2_complete, phase_3_complete, phase_4_complete,
                estimated_completion_time, error_message, current_status, last_sync_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(user_id) DO UPDATE SET
                sync_in_progress = excluded.sync_in_progress,
                sync_phase = excluded.sync_phase,
                progress_percentage = excluded.progress_percentage,
                total_emails_found = excluded.total_emails_found,
                emails_processed = excluded.emails_processed,
                transactions_found = excluded.transactions_found,
                phase_1_complete = excluded.phase_1_complete,
                phase_2_complete = excluded.phase_2_complete,
                phase_3_complete = excluded.phase_3_complete,
                phase_4_complete = excluded.phase_4_complete,
                estimated_completion_time = excluded.estimated_completion_time,
                error_message = excluded.error_message,
                current_status = excluded.current_status,
                last_sync_at = excluded.last_sync_at
            "#,
            params![
                status.user_id,
                status.sync_in_progress,
                status.sync_phase.as_str(),
                status.progress_percentage as i64,
                status.total_emails_found as i64,
                status.emails_processed as i64,
                status.transactions_found as i64,
                status.phase_1_complete,
                status.phase_2_complete,
                status.phase_3_complete,
                status.phase_4_complete,
                status.estimated_completion_time.map(|t| t.to_rfc3339()),
                status.error_message,
                status.current_status,
                status.last_sync_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "DELETE FROM transactions; DELETE FROM sync_status; DELETE FROM accounts;",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SqliteLedgerStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteLedgerStore::new(dir.path().join("ledger.db")).unwrap();
        (dir, store)
    }

    fn make_txn(user_id: &str, email_id: &str) -> Transaction {
        Transaction {
            user_id: user_id.to_string(),
            email_id: email_id.to_string(),
            amount: 1250.50,
            date: Utc::now(),
            txn_type: TxnType::Debit,
            category: Category::Groceries,
            merchant: "Big Bazaar".to_string(),
            description: "Weekly shop".to_string(),
            payment_method: "UPI-P2M".to_string(),
            confidence: 0.87,
            raw_subject: "Payment alert".to_string(),
            raw_body: "Rs.1250.50 debited".to_string(),
        }
    }

    #[test]
    fn test_insert_and_dedup() {
        let (_dir, store) = open_store();
        assert!(store.insert_transaction(&make_txn("u1", "m1")).unwrap());
        assert!(!store.insert_transaction(&make_txn("u1", "m1")).unwrap());
        assert!(store.insert_transaction(&make_txn("u1", "m2")).unwrap());
        assert_eq!(store.count_transactions("u1").unwrap(), 2);
        assert!(store.has_transaction("u1", "m1").unwrap());
        assert!(!store.has_transaction("u2", "m1").unwrap());
    }

    #[test]
    fn test_transaction_round_trip() {
        let (_dir, store) = open_store();
        let txn = make_txn("u1", "m1");
        store.insert_transaction(&txn).unwrap();

        let listed = store.list_transactions("u1", 10, 0).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount, txn.amount);
        assert_eq!(listed[0].category, Category::Groceries);
        assert_eq!(listed[0].txn_type, TxnType::Debit);
        assert_eq!(listed[0].payment_method, "UPI-P2M");
    }

    #[test]
    fn test_status_round_trip() {
        let (_dir, store) = open_store();
        let mut status = SyncStatus::started("u1", None);
        status.total_emails_found = 40;
        status.emails_processed = 25;
        status.phase_1_complete = true;
        status.recompute_progress();
        store.save_sync_status(&status).unwrap();

        let loaded = store.get_sync_status("u1").unwrap().unwrap();
        assert_eq!(loaded, status);

        status.mark_complete();
        store.save_sync_status(&status).unwrap();
        let loaded = store.get_sync_status("u1").unwrap().unwrap();
        assert!(!loaded.sync_in_progress);
        assert_eq!(loaded.progress_percentage, 100);
        assert!(loaded.last_sync_at.is_some());
    }

    #[test]
    fn test_account_token_update() {
        let (_dir, store) = open_store();
        let account = MailAccount::gmail("u1", "user@gmail.com")
            .with_tokens("old", Some("refresh".to_string()));
        store.upsert_account(account).unwrap();

        store.update_access_token("u1", "new").unwrap();
        let loaded = store.get_account("u1").unwrap().unwrap();
        assert_eq!(loaded.access_token.as_deref(), Some("new"));
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));

        assert!(store.update_access_token("ghost", "x").is_err());
    }
}
