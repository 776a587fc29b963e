use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::LineItem;

/// Ledger status of a shipment record. The engine only reads Open records;
/// the Open -> Consolidated transition is performed by the ledger repository
/// after the run, never by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Open,
    Consolidated,
}

/// Goods-receipt entry from the external ledger, awaiting reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub record_id: String,
    pub supplier_id: String,
    pub date: NaiveDate,
    pub total: BigDecimal,
    pub status: ShipmentStatus,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl ShipmentRecord {
    pub fn is_open(&self) -> bool {
        self.status == ShipmentStatus::Open
    }
}
