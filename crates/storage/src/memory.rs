//! In-memory reference backend.
//!
//! Each snapshot takes a per-entity async lock the first time it touches an
//! entity and holds it until commit, abort or drop. Transitions on one
//! entity therefore serialize, and a loser re-reads the winner's state,
//! while different entities never wait on each other. Writes are staged in
//! the snapshot and applied to the committed maps in one step at commit.
//! Lock entries live only while some snapshot holds or awaits them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as EntityLock, OwnedMutexGuard};

use crate::error::StorageError;
use crate::record::{now_rfc3339, AuditRecord, EntityStateRecord, NewAuditRecord};
use crate::traits::WorkflowStorage;

type EntityKey = (String, String);
type LockRegistry = Mutex<HashMap<EntityKey, Arc<EntityLock<()>>>>;

fn key(entity_type: &str, entity_id: &str) -> EntityKey {
    (entity_type.to_string(), entity_id.to_string())
}

#[derive(Debug, Default)]
struct Committed {
    entities: BTreeMap<EntityKey, EntityStateRecord>,
    ledger: BTreeMap<EntityKey, Vec<AuditRecord>>,
}

/// Entity locks held by one snapshot.
#[derive(Debug)]
struct HeldLocks {
    registry: Arc<LockRegistry>,
    guards: BTreeMap<EntityKey, OwnedMutexGuard<()>>,
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        let guards = std::mem::take(&mut self.guards);
        if guards.is_empty() {
            return;
        }
        let keys: Vec<EntityKey> = guards.keys().cloned().collect();
        drop(guards);
        // Clones are only taken under the registry mutex, so a count of one
        // means no snapshot holds or awaits the lock.
        let mut registry = self.registry.lock();
        for key in keys {
            if registry
                .get(&key)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                registry.remove(&key);
            }
        }
    }
}

/// An in-progress transaction against [`MemoryStorage`].
#[derive(Debug)]
pub struct MemorySnapshot {
    locks: HeldLocks,
    entities: BTreeMap<EntityKey, EntityStateRecord>,
    ledger: BTreeMap<EntityKey, Vec<AuditRecord>>,
    /// State of each entity before this snapshot first updated it.
    origins: BTreeMap<EntityKey, String>,
}

/// A [`WorkflowStorage`] held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    committed: RwLock<Committed>,
    locks: Arc<LockRegistry>,
    next_audit_id: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the entity's lock for this snapshot, unless it already holds it.
    async fn lock_entity(&self, snapshot: &mut MemorySnapshot, key: &EntityKey) {
        if snapshot.locks.guards.contains_key(key) {
            return;
        }
        let lock = self.locks.lock().entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;
        snapshot.locks.guards.insert(key.clone(), guard);
    }

    /// The entity as this snapshot sees it: staged first, then committed.
    fn current(
        &self,
        snapshot: &MemorySnapshot,
        key: &EntityKey,
    ) -> Result<EntityStateRecord, StorageError> {
        if let Some(staged) = snapshot.entities.get(key) {
            return Ok(staged.clone());
        }
        self.committed
            .read()
            .entities
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::EntityNotFound {
                entity_type: key.0.clone(),
                entity_id: key.1.clone(),
            })
    }

    /// Last ledger entry and ledger length as this snapshot sees them.
    fn ledger_tail(&self, snapshot: &MemorySnapshot, key: &EntityKey) -> (Option<String>, i64) {
        let committed = self.committed.read();
        let stored = committed.ledger.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let staged = snapshot.ledger.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let tail = staged
            .last()
            .or_else(|| stored.last())
            .map(|r| r.new_state.clone());
        (tail, (stored.len() + staged.len()) as i64)
    }
}

#[async_trait]
impl WorkflowStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot {
            locks: HeldLocks {
                registry: Arc::clone(&self.locks),
                guards: BTreeMap::new(),
            },
            entities: BTreeMap::new(),
            ledger: BTreeMap::new(),
            origins: BTreeMap::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let MemorySnapshot {
            locks,
            entities,
            ledger,
            origins: _,
        } = snapshot;
        {
            let mut committed = self.committed.write();
            committed.entities.extend(entities);
            for (key, records) in ledger {
                committed.ledger.entry(key).or_default().extend(records);
            }
        }
        // Entity locks are released only once the writes are visible.
        drop(locks);
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn initialize_entity(
        &self,
        snapshot: &mut MemorySnapshot,
        entity_type: &str,
        entity_id: &str,
        owner_id: &str,
        initial_state: &str,
    ) -> Result<(), StorageError> {
        let key = key(entity_type, entity_id);
        self.lock_entity(snapshot, &key).await;
        if self.current(snapshot, &key).is_ok() {
            return Err(StorageError::AlreadyInitialized {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
            });
        }
        snapshot.entities.insert(
            key,
            EntityStateRecord {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                owner_id: owner_id.to_string(),
                state: initial_state.to_string(),
                version: 0,
                updated_at: now_rfc3339(),
                last_action: None,
            },
        );
        Ok(())
    }

    async fn get_entity_state_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<EntityStateRecord, StorageError> {
        let key = key(entity_type, entity_id);
        self.lock_entity(snapshot, &key).await;
        self.current(snapshot, &key)
    }

    async fn update_entity_state(
        &self,
        snapshot: &mut MemorySnapshot,
        entity_type: &str,
        entity_id: &str,
        expected_version: i64,
        new_state: &str,
        action: &str,
    ) -> Result<i64, StorageError> {
        let key = key(entity_type, entity_id);
        self.lock_entity(snapshot, &key).await;
        let mut record = self.current(snapshot, &key)?;
        if record.version != expected_version {
            return Err(StorageError::ConcurrentConflict {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                expected_version,
            });
        }
        snapshot
            .origins
            .entry(key.clone())
            .or_insert_with(|| record.state.clone());
        record.state = new_state.to_string();
        record.version += 1;
        record.updated_at = now_rfc3339();
        record.last_action = Some(action.to_string());
        let version = record.version;
        snapshot.entities.insert(key, record);
        Ok(version)
    }

    async fn append_audit_record(
        &self,
        snapshot: &mut MemorySnapshot,
        record: NewAuditRecord,
    ) -> Result<AuditRecord, StorageError> {
        let key = key(&record.entity_type, &record.entity_id);
        self.lock_entity(snapshot, &key).await;
        let entity = self.current(snapshot, &key)?;
        let mismatch = |expected: &str, found: &str| StorageError::LedgerMismatch {
            entity_type: record.entity_type.clone(),
            entity_id: record.entity_id.clone(),
            expected: expected.to_string(),
            found: found.to_string(),
        };

        if record.new_state != entity.state {
            return Err(mismatch(&entity.state, &record.new_state));
        }
        let (tail, len) = self.ledger_tail(snapshot, &key);
        let previous = record.previous_state.as_deref();
        match tail {
            Some(tail) if previous != Some(tail.as_str()) => {
                return Err(mismatch(&tail, previous.unwrap_or("none")));
            }
            Some(_) => {}
            // First record: chains on the state before this snapshot's update.
            None => {
                let origin = snapshot.origins.get(&key).unwrap_or(&entity.state);
                if let Some(found) = previous.filter(|p| *p != origin.as_str()) {
                    return Err(mismatch(origin, found));
                }
            }
        }

        let id = format!(
            "audit-{}",
            self.next_audit_id.fetch_add(1, Ordering::Relaxed) + 1
        );
        let stored = AuditRecord::stamp(record, id, len + 1, now_rfc3339());
        snapshot
            .ledger
            .entry(key)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn get_entity_state(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<EntityStateRecord, StorageError> {
        self.committed
            .read()
            .entities
            .get(&key(entity_type, entity_id))
            .cloned()
            .ok_or_else(|| StorageError::EntityNotFound {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
            })
    }

    async fn list_entity_states(
        &self,
        entity_type: &str,
        state_filter: Option<&str>,
    ) -> Result<Vec<EntityStateRecord>, StorageError> {
        Ok(self
            .committed
            .read()
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .filter(|e| state_filter.map_or(true, |s| e.state == s))
            .cloned()
            .collect())
    }

    async fn list_audit_records(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>, StorageError> {
        Ok(self
            .committed
            .read()
            .ledger
            .get(&key(entity_type, entity_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit(prev: Option<&str>, new: &str) -> NewAuditRecord {
        NewAuditRecord {
            entity_type: "expense_reimbursement".into(),
            entity_id: "e-1".into(),
            previous_state: prev.map(str::to_string),
            new_state: new.into(),
            actor_role: "responsabile".into(),
            action: "approve_manager".into(),
            note: None,
        }
    }

    #[tokio::test]
    async fn dropped_snapshot_rolls_back_and_releases_lock() {
        let s = MemoryStorage::new();
        {
            let mut snap = s.begin_snapshot().await.unwrap();
            s.initialize_entity(&mut snap, "expense_reimbursement", "e-1", "u-1", "INVIATO")
                .await
                .unwrap();
            // dropped here
        }
        assert!(s
            .get_entity_state("expense_reimbursement", "e-1")
            .await
            .is_err());

        // The lock was released, so a new snapshot can proceed.
        let mut snap = s.begin_snapshot().await.unwrap();
        s.initialize_entity(&mut snap, "expense_reimbursement", "e-1", "u-1", "INVIATO")
            .await
            .unwrap();
        s.commit_snapshot(snap).await.unwrap();
    }

    #[tokio::test]
    async fn lock_entries_pruned_once_released() {
        let s = MemoryStorage::new();

        // Unknown ids leave no lock behind.
        for id in ["ghost-1", "ghost-2", "ghost-3"] {
            let mut snap = s.begin_snapshot().await.unwrap();
            let err = s
                .get_entity_state_for_update(&mut snap, "expense_reimbursement", id)
                .await
                .unwrap_err();
            assert!(matches!(err, StorageError::EntityNotFound { .. }));
            drop(snap);
        }
        assert!(s.locks.lock().is_empty());

        let mut snap = s.begin_snapshot().await.unwrap();
        s.initialize_entity(&mut snap, "expense_reimbursement", "e-1", "u-1", "INVIATO")
            .await
            .unwrap();
        assert_eq!(s.locks.lock().len(), 1);
        s.commit_snapshot(snap).await.unwrap();
        assert!(s.locks.lock().is_empty());

        let mut snap = s.begin_snapshot().await.unwrap();
        s.get_entity_state_for_update(&mut snap, "expense_reimbursement", "e-1")
            .await
            .unwrap();
        s.abort_snapshot(snap).await.unwrap();
        assert!(s.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn lock_entry_kept_while_another_snapshot_waits() {
        let s = Arc::new(MemoryStorage::new());
        let mut first = s.begin_snapshot().await.unwrap();
        s.initialize_entity(&mut first, "expense_reimbursement", "e-1", "u-1", "INVIATO")
            .await
            .unwrap();

        let waiter = {
            let s = Arc::clone(&s);
            tokio::spawn(async move {
                let mut snap = s.begin_snapshot().await.unwrap();
                let state = s
                    .get_entity_state_for_update(&mut snap, "expense_reimbursement", "e-1")
                    .await
                    .unwrap();
                s.commit_snapshot(snap).await.unwrap();
                state.state
            })
        };
        // Let the waiter register on the lock.
        while Arc::strong_count(s.locks.lock().values().next().unwrap()) < 3 {
            tokio::task::yield_now().await;
        }
        s.commit_snapshot(first).await.unwrap();

        assert_eq!(waiter.await.unwrap(), "INVIATO");
        assert!(s.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn first_record_of_fresh_entity_chains_on_initial_state() {
        let s = MemoryStorage::new();
        let mut snap = s.begin_snapshot().await.unwrap();
        s.initialize_entity(&mut snap, "expense_reimbursement", "e-1", "u-1", "INVIATO")
            .await
            .unwrap();
        s.update_entity_state(
            &mut snap,
            "expense_reimbursement",
            "e-1",
            0,
            "PRE_APPROVATO_RESP",
            "approve_manager",
        )
        .await
        .unwrap();
        let err = s
            .append_audit_record(&mut snap, audit(Some("PAGATO"), "PRE_APPROVATO_RESP"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::LedgerMismatch { ref expected, ref found, .. }
                if expected == "INVIATO" && found == "PAGATO"
        ));
        let first = s
            .append_audit_record(&mut snap, audit(Some("INVIATO"), "PRE_APPROVATO_RESP"))
            .await
            .unwrap();
        assert_eq!(first.sequence, 1);
    }

    #[tokio::test]
    async fn staged_ledger_extends_tail_within_one_snapshot() {
        let s = MemoryStorage::new();
        let mut snap = s.begin_snapshot().await.unwrap();
        s.initialize_entity(&mut snap, "expense_reimbursement", "e-1", "u-1", "INVIATO")
            .await
            .unwrap();
        s.update_entity_state(
            &mut snap,
            "expense_reimbursement",
            "e-1",
            0,
            "PRE_APPROVATO_RESP",
            "approve_manager",
        )
        .await
        .unwrap();
        let first = s
            .append_audit_record(&mut snap, audit(Some("INVIATO"), "PRE_APPROVATO_RESP"))
            .await
            .unwrap();
        assert_eq!(first.sequence, 1);

        s.update_entity_state(
            &mut snap,
            "expense_reimbursement",
            "e-1",
            1,
            "APPROVATO_ADMIN",
            "approve_admin",
        )
        .await
        .unwrap();
        // Chaining is checked against the staged tail.
        let err = s
            .append_audit_record(&mut snap, audit(Some("INVIATO"), "APPROVATO_ADMIN"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::LedgerMismatch { .. }));
        let second = s
            .append_audit_record(
                &mut snap,
                audit(Some("PRE_APPROVATO_RESP"), "APPROVATO_ADMIN"),
            )
            .await
            .unwrap();
        assert_eq!(second.sequence, 2);
        s.commit_snapshot(snap).await.unwrap();

        let ledger = s
            .list_audit_records("expense_reimbursement", "e-1")
            .await
            .unwrap();
        assert_eq!(ledger.len(), 2);
        assert_ne!(ledger[0].id, ledger[1].id);
    }
}
