//! Abstract record store.
//!
//! Persistence mechanics are external; the core needs only insert, update,
//! query-by-predicate, delete, and a scoped transaction. The transaction is
//! the serialization point for the matching race: whichever trigger enters it
//! first claims the candidate, the loser observes it no longer Unmatched.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

use crate::model::{Waybill, WeighingRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("{entity} already exists: {id}")]
    Duplicate { entity: &'static str, id: Uuid },
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Scoped view inside a transaction. All reads and writes observe and affect
/// the same consistent snapshot; the transaction commits when the closure
/// returns `Ok` and is the atomic unit for concurrent match attempts.
pub trait StoreTxn {
    fn insert_record(&mut self, record: WeighingRecord) -> StoreResult<()>;
    fn update_record(&mut self, record: &WeighingRecord) -> StoreResult<()>;
    fn get_record(&self, id: Uuid) -> Option<WeighingRecord>;
    fn records_where(&self, pred: &dyn Fn(&WeighingRecord) -> bool) -> Vec<WeighingRecord>;
    fn delete_record(&mut self, id: Uuid) -> StoreResult<()>;

    fn insert_waybill(&mut self, waybill: Waybill) -> StoreResult<()>;
    fn update_waybill(&mut self, waybill: &Waybill) -> StoreResult<()>;
    fn get_waybill(&self, id: Uuid) -> Option<Waybill>;
    fn waybills_where(&self, pred: &dyn Fn(&Waybill) -> bool) -> Vec<Waybill>;
    fn delete_waybill(&mut self, id: Uuid) -> StoreResult<()>;
}

/// Record store seam. Implementations must serialize transactions with
/// respect to each other and to the convenience single-op calls.
pub trait RecordStore: Send + Sync {
    fn with_txn<T>(
        &self,
        f: impl FnOnce(&mut dyn StoreTxn) -> StoreResult<T>,
    ) -> StoreResult<T>
    where
        Self: Sized;

    fn insert_record(&self, record: WeighingRecord) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.with_txn(|t| t.insert_record(record))
    }

    fn update_record(&self, record: &WeighingRecord) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.with_txn(|t| t.update_record(record))
    }

    fn get_record(&self, id: Uuid) -> StoreResult<Option<WeighingRecord>>
    where
        Self: Sized,
    {
        self.with_txn(|t| Ok(t.get_record(id)))
    }

    fn records_where(
        &self,
        pred: impl Fn(&WeighingRecord) -> bool,
    ) -> StoreResult<Vec<WeighingRecord>>
    where
        Self: Sized,
    {
        self.with_txn(|t| Ok(t.records_where(&pred)))
    }

    fn insert_waybill(&self, waybill: Waybill) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.with_txn(|t| t.insert_waybill(waybill))
    }

    fn get_waybill(&self, id: Uuid) -> StoreResult<Option<Waybill>>
    where
        Self: Sized,
    {
        self.with_txn(|t| Ok(t.get_waybill(id)))
    }

    fn waybills_where(&self, pred: impl Fn(&Waybill) -> bool) -> StoreResult<Vec<Waybill>>
    where
        Self: Sized,
    {
        self.with_txn(|t| Ok(t.waybills_where(&pred)))
    }
}

#[derive(Default)]
struct Tables {
    records: HashMap<Uuid, WeighingRecord>,
    waybills: HashMap<Uuid, Waybill>,
}

/// In-memory store for tests and hardware-free demos. A single mutex
/// serializes transactions; the closure performs no I/O, so the lock is
/// short-held.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreTxn for Tables {
    fn insert_record(&mut self, record: WeighingRecord) -> StoreResult<()> {
        if self.records.contains_key(&record.id) {
            return Err(StoreError::Duplicate {
                entity: "weighing record",
                id: record.id,
            });
        }
        self.records.insert(record.id, record);
        Ok(())
    }

    fn update_record(&mut self, record: &WeighingRecord) -> StoreResult<()> {
        match self.records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "weighing record",
                id: record.id,
            }),
        }
    }

    fn get_record(&self, id: Uuid) -> Option<WeighingRecord> {
        self.records.get(&id).cloned()
    }

    fn records_where(&self, pred: &dyn Fn(&WeighingRecord) -> bool) -> Vec<WeighingRecord> {
        self.records.values().filter(|r| pred(r)).cloned().collect()
    }

    fn delete_record(&mut self, id: Uuid) -> StoreResult<()> {
        self.records.remove(&id).map(|_| ()).ok_or(StoreError::NotFound {
            entity: "weighing record",
            id,
        })
    }

    fn insert_waybill(&mut self, waybill: Waybill) -> StoreResult<()> {
        if self.waybills.contains_key(&waybill.id) {
            return Err(StoreError::Duplicate {
                entity: "waybill",
                id: waybill.id,
            });
        }
        self.waybills.insert(waybill.id, waybill);
        Ok(())
    }

    fn update_waybill(&mut self, waybill: &Waybill) -> StoreResult<()> {
        match self.waybills.get_mut(&waybill.id) {
            Some(slot) => {
                *slot = waybill.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "waybill",
                id: waybill.id,
            }),
        }
    }

    fn get_waybill(&self, id: Uuid) -> Option<Waybill> {
        self.waybills.get(&id).cloned()
    }

    fn waybills_where(&self, pred: &dyn Fn(&Waybill) -> bool) -> Vec<Waybill> {
        self.waybills.values().filter(|w| pred(w)).cloned().collect()
    }

    fn delete_waybill(&mut self, id: Uuid) -> StoreResult<()> {
        self.waybills.remove(&id).map(|_| ()).ok_or(StoreError::NotFound {
            entity: "waybill",
            id,
        })
    }
}

impl RecordStore for MemoryStore {
    fn with_txn<T>(&self, f: impl FnOnce(&mut dyn StoreTxn) -> StoreResult<T>) -> StoreResult<T> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut *tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn insert_get_update_delete() {
        let store = MemoryStore::new();
        let mut r = WeighingRecord::new(100, None, vec![], Utc::now());
        store.insert_record(r.clone()).unwrap();
        assert_eq!(store.get_record(r.id).unwrap().unwrap().weight_centi, 100);

        r.plate_number = Some("京A12345".into());
        store.update_record(&r).unwrap();
        assert_eq!(
            store.get_record(r.id).unwrap().unwrap().plate_number.as_deref(),
            Some("京A12345")
        );

        store.with_txn(|t| t.delete_record(r.id)).unwrap();
        assert!(store.get_record(r.id).unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = MemoryStore::new();
        let r = WeighingRecord::new(100, None, vec![], Utc::now());
        store.insert_record(r.clone()).unwrap();
        assert!(matches!(
            store.insert_record(r),
            Err(StoreError::Duplicate { .. })
        ));
    }

    #[test]
    fn txn_sees_own_writes() {
        let store = MemoryStore::new();
        let r = WeighingRecord::new(55, None, vec![], Utc::now());
        let id = r.id;
        store
            .with_txn(|t| {
                t.insert_record(r)?;
                assert!(t.get_record(id).is_some());
                Ok(())
            })
            .unwrap();
    }
}
