//! In-process reference store.
//!
//! Tables are persistent maps, so a partition read is a cheap snapshot and an
//! atomic batch is one swap under the write lock. One-shot fault hooks let
//! tests script every outcome class, including "timed out but applied".

use super::{Consistency, Partition, RowMutation, RowStore, StoreError, TableSpec};
use crate::model::ContributionRow;
use compact_str::CompactString;
use im::OrdMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

type PartitionMap = OrdMap<CompactString, ContributionRow>;
type Table = OrdMap<CompactString, PartitionMap>;

#[derive(Debug, Default)]
struct FaultPlan {
    reject_next_write: Option<String>,
    /// `Some(apply)`: the next write/batch times out; when `apply` is true
    /// the mutation still lands, modeling a lost acknowledgement.
    timeout_next_write: Option<bool>,
    unavailable_next_read: Option<String>,
    fragment_next_read: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    faults: Mutex<FaultPlan>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_next_write(&self, reason: impl Into<String>) {
        self.faults.lock().reject_next_write = Some(reason.into());
    }

    pub fn timeout_next_write(&self, apply: bool) {
        self.faults.lock().timeout_next_write = Some(apply);
    }

    pub fn unavailable_next_read(&self, reason: impl Into<String>) {
        self.faults.lock().unavailable_next_read = Some(reason.into());
    }

    pub fn fragment_next_read(&self) {
        self.faults.lock().fragment_next_read = true;
    }

    /// Consumes the pending write fault, if any. Returns the error to report
    /// and whether the mutation should still be applied first.
    fn next_write_fault(&self) -> Option<(StoreError, bool)> {
        let mut faults = self.faults.lock();
        if let Some(reason) = faults.reject_next_write.take() {
            return Some((StoreError::Rejected(reason), false));
        }
        if let Some(apply) = faults.timeout_next_write.take() {
            return Some((StoreError::Timeout, apply));
        }
        None
    }

    fn apply_batch(
        partition: &mut PartitionMap,
        counter_id: &str,
        mutations: Vec<RowMutation>,
    ) -> Result<(), StoreError> {
        for mutation in mutations {
            match mutation {
                RowMutation::Upsert(row) => {
                    if row.counter_id != counter_id {
                        return Err(StoreError::Rejected(format!(
                            "batch for partition '{counter_id}' may not touch '{}'",
                            row.counter_id
                        )));
                    }
                    partition.insert(row.token.clone(), row);
                }
                RowMutation::Delete { token } => {
                    partition.remove(&token);
                }
                RowMutation::MarkDeleted { token } => {
                    if let Some(row) = partition.get_mut(&token) {
                        row.deleted = true;
                    }
                }
            }
        }
        Ok(())
    }
}

impl RowStore for MemoryStore {
    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
        if spec.name.is_empty() {
            return Err(StoreError::Rejected("table name must not be empty".into()));
        }
        self.tables
            .write()
            .entry(spec.name.clone())
            .or_insert_with(Table::new);
        Ok(())
    }

    async fn read_partition(
        &self,
        table: &str,
        counter_id: &str,
        _consistency: Consistency,
    ) -> Result<Partition, StoreError> {
        let fragmented = {
            let mut faults = self.faults.lock();
            if let Some(reason) = faults.unavailable_next_read.take() {
                return Err(StoreError::Unavailable(reason));
            }
            std::mem::take(&mut faults.fragment_next_read)
        };

        let tables = self.tables.read();
        let table = tables
            .get(table)
            .ok_or_else(|| StoreError::Rejected(format!("unknown table '{table}'")))?;
        let rows = table
            .get(counter_id)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default();
        Ok(Partition { rows, fragmented })
    }

    async fn write(
        &self,
        table: &str,
        row: ContributionRow,
        _consistency: Consistency,
    ) -> Result<(), StoreError> {
        let fault = self.next_write_fault();
        if let Some((err, false)) = &fault {
            return Err(err.clone());
        }

        {
            let mut tables = self.tables.write();
            let table = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::Rejected(format!("unknown table '{table}'")))?;
            table
                .entry(row.counter_id.clone())
                .or_insert_with(PartitionMap::new)
                .insert(row.token.clone(), row);
        }

        match fault {
            Some((err, true)) => Err(err),
            _ => Ok(()),
        }
    }

    async fn atomic_batch(
        &self,
        table: &str,
        counter_id: &str,
        mutations: Vec<RowMutation>,
        _consistency: Consistency,
    ) -> Result<(), StoreError> {
        let fault = self.next_write_fault();
        if let Some((err, false)) = &fault {
            return Err(err.clone());
        }

        {
            let mut tables = self.tables.write();
            let table = tables
                .get_mut(table)
                .ok_or_else(|| StoreError::Rejected(format!("unknown table '{table}'")))?;

            // Stage against a copy so a rejected batch leaves nothing behind.
            let mut staged = table.get(counter_id).cloned().unwrap_or_default();
            Self::apply_batch(&mut staged, counter_id, mutations)?;
            table.insert(CompactString::from(counter_id), staged);
        }

        match fault {
            Some((err, true)) => Err(err),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompactionStrategy;
    use crate::model::{op_token, ContributionRow};

    const TABLE: &str = "t";

    fn spec() -> TableSpec {
        TableSpec {
            name: TABLE.into(),
            replication_factor: 1,
            compaction: CompactionStrategy::SizeTiered,
        }
    }

    fn row(counter: &str, token: CompactString, value: i64) -> ContributionRow {
        ContributionRow::contribution(counter, token, value, vec![])
    }

    #[tokio::test]
    async fn create_table_tolerates_repeated_calls() {
        let store = MemoryStore::new();
        store.create_table(&spec()).await.expect("first");
        store
            .write(TABLE, row("c", op_token("w", 1), 7), Consistency::Quorum)
            .await
            .expect("write");
        store.create_table(&spec()).await.expect("second");

        let partition = store
            .read_partition(TABLE, "c", Consistency::Quorum)
            .await
            .expect("read");
        assert_eq!(partition.rows.len(), 1, "re-creation must not wipe rows");
    }

    #[tokio::test]
    async fn writes_to_unknown_tables_are_rejected() {
        let store = MemoryStore::new();
        let err = store
            .write("missing", row("c", op_token("w", 1), 1), Consistency::One)
            .await
            .expect_err("unknown table");
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(!err.is_indeterminate());
    }

    #[tokio::test]
    async fn rejected_batch_applies_nothing() {
        let store = MemoryStore::new();
        store.create_table(&spec()).await.expect("create");
        store
            .write(TABLE, row("c", op_token("w", 1), 1), Consistency::Quorum)
            .await
            .expect("seed");

        let err = store
            .atomic_batch(
                TABLE,
                "c",
                vec![
                    RowMutation::Delete {
                        token: op_token("w", 1),
                    },
                    RowMutation::Upsert(row("other", op_token("w", 2), 2)),
                ],
                Consistency::Quorum,
            )
            .await
            .expect_err("cross-partition batch");
        assert!(matches!(err, StoreError::Rejected(_)));

        let partition = store
            .read_partition(TABLE, "c", Consistency::Quorum)
            .await
            .expect("read");
        assert_eq!(partition.rows.len(), 1, "delete must not have applied");
        assert_eq!(partition.rows[0].value, 1);
    }

    #[tokio::test]
    async fn mark_deleted_keeps_value_in_place() {
        let store = MemoryStore::new();
        store.create_table(&spec()).await.expect("create");
        store
            .write(TABLE, row("c", op_token("w", 1), 9), Consistency::Quorum)
            .await
            .expect("seed");

        store
            .atomic_batch(
                TABLE,
                "c",
                vec![RowMutation::MarkDeleted {
                    token: op_token("w", 1),
                }],
                Consistency::Quorum,
            )
            .await
            .expect("batch");

        let partition = store
            .read_partition(TABLE, "c", Consistency::Quorum)
            .await
            .expect("read");
        assert_eq!(partition.rows.len(), 1);
        assert!(partition.rows[0].deleted);
        assert_eq!(partition.rows[0].value, 9);
    }

    #[tokio::test]
    async fn write_faults_fire_once() {
        let store = MemoryStore::new();
        store.create_table(&spec()).await.expect("create");

        store.timeout_next_write(true);
        let err = store
            .write(TABLE, row("c", op_token("w", 1), 3), Consistency::Quorum)
            .await
            .expect_err("timeout");
        assert!(err.is_indeterminate());

        // The ack was lost, not the write.
        let partition = store
            .read_partition(TABLE, "c", Consistency::Quorum)
            .await
            .expect("read");
        assert_eq!(partition.rows.len(), 1);

        store
            .write(TABLE, row("c", op_token("w", 2), 4), Consistency::Quorum)
            .await
            .expect("fault must not persist");
    }

    #[tokio::test]
    async fn fragmented_read_flag_fires_once() {
        let store = MemoryStore::new();
        store.create_table(&spec()).await.expect("create");
        store.fragment_next_read();

        let first = store
            .read_partition(TABLE, "c", Consistency::Quorum)
            .await
            .expect("read");
        assert!(first.fragmented);

        let second = store
            .read_partition(TABLE, "c", Consistency::Quorum)
            .await
            .expect("read");
        assert!(!second.fragmented);
    }
}
