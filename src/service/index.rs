use chrono::NaiveDate;
use std::collections::HashMap;

use crate::models::{ShipmentRecord, ShipmentStatus};

/// Read-only, per-supplier view over the open shipment-record pool for one
/// run. Built once from the ledger snapshot; consumption bookkeeping lives
/// with the optimizer, never here.
pub struct CandidateIndex {
    records: Vec<ShipmentRecord>,
    by_supplier: HashMap<String, Vec<usize>>,
    by_id: HashMap<String, usize>,
}

impl CandidateIndex {
    pub fn new(pool: Vec<ShipmentRecord>) -> Self {
        let skipped = pool
            .iter()
            .filter(|r| r.status != ShipmentStatus::Open)
            .count();
        if skipped > 0 {
            tracing::debug!("index: skipping {} non-open shipment records", skipped);
        }

        let mut records: Vec<ShipmentRecord> =
            pool.into_iter().filter(ShipmentRecord::is_open).collect();
        // Deterministic base ordering for everything downstream.
        records.sort_by(|a, b| a.record_id.cmp(&b.record_id));

        let mut by_supplier: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::new();
        for (idx, rec) in records.iter().enumerate() {
            by_supplier
                .entry(rec.supplier_id.clone())
                .or_default()
                .push(idx);
            by_id.insert(rec.record_id.clone(), idx);
        }

        Self {
            records,
            by_supplier,
            by_id,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Open records for one supplier within +/- `window_days` of `date`,
    /// ordered by record id.
    pub fn window(&self, supplier: &str, date: NaiveDate, window_days: i64) -> Vec<&ShipmentRecord> {
        let Some(indices) = self.by_supplier.get(supplier) else {
            return Vec::new();
        };
        indices
            .iter()
            .map(|&i| &self.records[i])
            .filter(|r| (r.date - date).num_days().abs() <= window_days)
            .collect()
    }

    /// Exact id lookup restricted to the invoice's own supplier.
    pub fn lookup(&self, supplier: &str, record_id: &str) -> Option<&ShipmentRecord> {
        self.by_id
            .get(record_id)
            .map(|&i| &self.records[i])
            .filter(|r| r.supplier_id == supplier)
    }
}
