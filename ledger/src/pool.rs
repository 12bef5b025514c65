//! Transaction pool.
//!
//! Holds admitted, unconfirmed vote transactions. Admission verifies
//! the voter signature and dedupes by content fingerprint; entries
//! leave the pool only when a block settles them.

use std::collections::{BTreeMap, HashMap};

use crate::error::LedgerError;
use crate::types::{Hash256, Transaction, TxId};

/// Pool of admitted, unconfirmed transactions.
///
/// Each entry gets a local sequence id `(node_id, seq)`; the parallel
/// fingerprint index makes re-submission idempotent (same id back,
/// nothing stored twice, no duplicate broadcast).
pub struct TransactionPool {
    node_id: String,
    next_seq: u64,
    txs: BTreeMap<TxId, Transaction>,
    by_fingerprint: HashMap<Hash256, TxId>,
}

/// Result of admitting a transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Admission {
    /// Pool id of the transaction (existing id on re-submission).
    pub id: TxId,
    /// `false` if the transaction was already pooled (dedup hit).
    pub is_new: bool,
}

impl TransactionPool {
    /// Creates an empty pool issuing ids under `node_id`.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            next_seq: 1,
            txs: BTreeMap::new(),
            by_fingerprint: HashMap::new(),
        }
    }

    /// Admits a transaction after verifying its signature.
    ///
    /// Fails with [`LedgerError::InvalidSignature`] if the signature
    /// does not verify over the vote under the voter's public key. A
    /// transaction whose fingerprint is already pooled is *not* stored
    /// again; the existing id is returned with `is_new == false`.
    pub fn admit(&mut self, tx: Transaction) -> Result<Admission, LedgerError> {
        if !tx.verify() {
            return Err(LedgerError::InvalidSignature);
        }

        let fp = tx.fingerprint();
        if let Some(existing) = self.by_fingerprint.get(&fp) {
            return Ok(Admission {
                id: existing.clone(),
                is_new: false,
            });
        }

        let id = TxId::new(&self.node_id, self.next_seq);
        self.next_seq += 1;
        self.by_fingerprint.insert(fp, id.clone());
        self.txs.insert(id.clone(), tx);

        Ok(Admission { id, is_new: true })
    }

    /// Evicts the given ids, typically because a committed block now
    /// settles them. Unknown ids are ignored.
    pub fn remove<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a TxId>,
    {
        for id in ids {
            if let Some(tx) = self.txs.remove(id) {
                self.by_fingerprint.remove(&tx.fingerprint());
            }
        }
    }

    /// Evicts every pooled entry whose fingerprint matches one of the
    /// given settled transactions, regardless of local id.
    ///
    /// The same vote admitted independently on two nodes carries two
    /// different ids but one fingerprint, so settlement by a peer's
    /// block must match on content, not on id.
    pub fn settle<'a, I>(&mut self, txs: I)
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        for tx in txs {
            if let Some(id) = self.by_fingerprint.remove(&tx.fingerprint()) {
                self.txs.remove(&id);
            }
        }
    }

    /// Returns a copy of the current pool contents for block assembly.
    ///
    /// The pool is *not* cleared; eviction happens via [`remove`](Self::remove)
    /// only after a block commits.
    pub fn snapshot(&self) -> BTreeMap<TxId, Transaction> {
        self.txs.clone()
    }

    /// True if the given id is currently pooled.
    pub fn contains(&self, id: &TxId) -> bool {
        self.txs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Inserts a transaction without the admission signature check.
    /// Exists so tests can model a pool entry that was corrupted (or
    /// admitted under different rules) after the fact.
    #[cfg(test)]
    pub(crate) fn insert_unchecked(&mut self, tx: Transaction) -> TxId {
        let id = TxId::new(&self.node_id, self.next_seq);
        self.next_seq += 1;
        self.by_fingerprint.insert(tx.fingerprint(), id.clone());
        self.txs.insert(id.clone(), tx);
        id
    }
}
