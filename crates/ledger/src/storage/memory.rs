//! In-memory storage for tests

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::traits::LedgerStore;
use crate::models::{MailAccount, SyncStatus, Transaction};

/// HashMap-backed store mirroring the SQLite semantics
#[derive(Default)]
pub struct InMemoryLedgerStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, MailAccount>,
    transactions: Vec<Transaction>,
    seen: HashSet<(String, String)>,
    status: HashMap<String, SyncStatus>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn upsert_account(&self, account: MailAccount) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.accounts.insert(account.user_id.clone(), account);
        Ok(())
    }

    fn get_account(&self, user_id: &str) -> Result<Option<MailAccount>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.accounts.get(user_id).cloned())
    }

    fn update_access_token(&self, user_id: &str, access_token: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let account = inner
            .accounts
            .get_mut(user_id)
            .with_context(|| format!("No account for user {}", user_id))?;
        account.access_token = Some(access_token.to_string());
        Ok(())
    }

    fn insert_transaction(&self, txn: &Transaction) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let key = (txn.user_id.clone(), txn.email_id.clone());
        if !inner.seen.insert(key) {
            return Ok(false);
        }
        inner.transactions.push(txn.clone());
        Ok(true)
    }

    fn has_transaction(&self, user_id: &str, email_id: &str) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .seen
            .contains(&(user_id.to_string(), email_id.to_string())))
    }

    fn list_transactions(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<Transaction> = inner
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    fn count_transactions(&self, user_id: &str) -> Result<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .count())
    }

    fn get_sync_status(&self, user_id: &str) -> Result<Option<SyncStatus>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.status.get(user_id).cloned())
    }

    fn save_sync_status(&self, status: &SyncStatus) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.status.insert(status.user_id.clone(), status.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        *inner = Inner::default();
        Ok(())
    }
}
