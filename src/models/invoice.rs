use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One product line on an invoice or shipment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_amount: BigDecimal,
}

/// Electronic invoice as delivered by the document source.
/// Immutable once received; the engine never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Tax-authority fiscal identifier (UUID of the stamped document).
    pub uuid: String,
    pub supplier_tax_id: String,
    pub issue_date: NaiveDate,
    pub total: BigDecimal,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Shipment-record number the supplier printed on the invoice, if any.
    #[serde(default)]
    pub noted_record_id: Option<String>,
    /// Record ids extracted from a companion document by an external collaborator.
    #[serde(default)]
    pub extracted_refs: Vec<String>,
}
