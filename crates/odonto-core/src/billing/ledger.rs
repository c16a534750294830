//! Hash-chained balance ledger.
//!
//! Every change to a patient's balance appends an entry whose hash covers the
//! previous entry's hash, so edits or gaps in the history are detectable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::{quote, to_fields, CollectionStore, DbResult, ListQuery};

pub const LEDGER_COLLECTION: &str = "balance_ledger";

/// `prev_hash` of a patient's first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Balances closer than half a cent are equal.
pub const BALANCE_TOLERANCE: f64 = 0.005;

/// Hash data using SHA-256.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Why the balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    BudgetAccepted,
    BudgetRejected,
    Payment,
    Reconciliation,
}

impl LedgerEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryKind::BudgetAccepted => "budget_accepted",
            LedgerEntryKind::BudgetRejected => "budget_rejected",
            LedgerEntryKind::Payment => "payment",
            LedgerEntryKind::Reconciliation => "reconciliation",
        }
    }
}

/// One balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub patient: String,
    /// 1-based position in the patient's chain
    pub seq: u64,
    #[serde(default)]
    pub budget: Option<String>,
    pub kind: LedgerEntryKind,
    /// Signed change applied to the balance
    pub amount: f64,
    pub balance_before: f64,
    pub balance_after: f64,
    pub recorded_at: String,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl LedgerEntry {
    /// Hash of the entry contents chained to `prev_hash`.
    pub fn compute_hash(&self) -> String {
        let content = format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.prev_hash,
            self.patient,
            self.seq,
            self.budget.as_deref().unwrap_or(""),
            self.kind.as_str(),
            self.amount,
            self.balance_before,
            self.balance_after,
            self.recorded_at,
        );
        hash_data(content.as_bytes())
    }

    /// Check the stored hash against the contents.
    pub fn verify(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }
}

/// A balance change to append.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceChange<'a> {
    pub patient: &'a str,
    pub budget: Option<&'a str>,
    pub kind: LedgerEntryKind,
    pub balance_before: f64,
    pub balance_after: f64,
}

/// Ledger over a collection store.
pub struct BalanceLedger<'s, S: CollectionStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: CollectionStore + ?Sized> BalanceLedger<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// A patient's entries in chain order.
    pub fn entries(&self, patient_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let records = self.store.list(
            LEDGER_COLLECTION,
            &ListQuery::new()
                .filter(format!("patient = {}", quote(patient_id)))
                .sort("seq"),
        )?;
        records.iter().map(|r| r.decode()).collect()
    }

    pub fn last_entry(&self, patient_id: &str) -> DbResult<Option<LedgerEntry>> {
        self.store
            .first(
                LEDGER_COLLECTION,
                &format!("patient = {}", quote(patient_id)),
                "-seq",
            )?
            .map(|record| record.decode())
            .transpose()
    }

    /// Append an entry to the patient's chain.
    pub fn append(&self, change: BalanceChange<'_>) -> DbResult<LedgerEntry> {
        let last = self.last_entry(change.patient)?;
        let (seq, prev_hash) = match last {
            Some(entry) => (entry.seq + 1, entry.entry_hash),
            None => (1, GENESIS_HASH.to_string()),
        };

        let mut entry = LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            patient: change.patient.to_string(),
            seq,
            budget: change.budget.map(str::to_string),
            kind: change.kind,
            amount: change.balance_after - change.balance_before,
            balance_before: change.balance_before,
            balance_after: change.balance_after,
            recorded_at: chrono::Utc::now().to_rfc3339(),
            prev_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();

        self.store.create(LEDGER_COLLECTION, to_fields(&entry)?)?;
        Ok(entry)
    }

    /// Sequence number of the first entry that breaks the chain, if any.
    pub fn first_broken(&self, patient_id: &str) -> DbResult<Option<u64>> {
        let mut expected_prev = GENESIS_HASH.to_string();
        for (index, entry) in self.entries(patient_id)?.iter().enumerate() {
            let in_sequence = entry.seq == index as u64 + 1;
            if !in_sequence || entry.prev_hash != expected_prev || !entry.verify() {
                return Ok(Some(entry.seq));
            }
            expected_prev = entry.entry_hash.clone();
        }
        Ok(None)
    }
}
