use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// How a candidate was produced. Ordering is trust order: explicit references
/// outrank a record number noted on the invoice, which outranks heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchMethod {
    Heuristic,
    DirectNumber,
    ExplicitReference,
}

/// One or more shipment records proposed together to satisfy a single invoice.
/// Member ids are kept sorted so equal groups compare and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateGroup {
    pub member_ids: Vec<String>,
    pub total: BigDecimal,
}

impl CandidateGroup {
    pub fn new(mut member_ids: Vec<String>, total: BigDecimal) -> Self {
        member_ids.sort();
        Self { member_ids, total }
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// Scored pairing of one invoice with one candidate group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub invoice_uuid: String,
    pub group: CandidateGroup,
    /// Composite score in [0, 100].
    pub score: f64,
    pub method: MatchMethod,
    /// Exact signed-magnitude difference |invoice.total - group.total|.
    /// Reported even at score 100 so the validator can gate auto-consolidation
    /// on difference == 0 without recomputation.
    pub amount_difference: BigDecimal,
    /// Days between the invoice issue date and the nearest member date.
    pub days_offset: i64,
}

/// Resolved invoice -> group mapping. Within one run no shipment record id
/// appears in more than one assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub group: CandidateGroup,
    pub score: f64,
    pub method: MatchMethod,
    pub amount_difference: BigDecimal,
    /// Ids the ledger repository must mark consolidated for this invoice.
    pub consumed_record_ids: Vec<String>,
}

/// Why an invoice ended the run without an assignment. These are outcomes,
/// not errors: one invoice's bad data never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum UnmatchedReason {
    /// Required invoice fields malformed or missing (zero total, blank supplier).
    InvalidData(String),
    /// No open shipment record for the supplier inside the date window.
    NoCandidates,
    /// Records existed in the window but no grouping came within the amount
    /// tolerance.
    OutsideTolerance,
    /// Candidates existed but every one scored below the heuristic floor.
    BelowMinScore,
    /// Every viable group lost its records to higher-scoring invoices.
    RecordsClaimed,
    /// The supplied reference list could not be fully resolved; the invoice
    /// fell through to scoring and found nothing.
    ReferenceUnresolved,
}

impl UnmatchedReason {
    pub fn label(&self) -> &'static str {
        match self {
            UnmatchedReason::InvalidData(_) => "DATA_ERROR",
            UnmatchedReason::NoCandidates => "NO_CANDIDATES",
            UnmatchedReason::OutsideTolerance => "OUTSIDE_TOLERANCE",
            UnmatchedReason::BelowMinScore => "BELOW_MIN_SCORE",
            UnmatchedReason::RecordsClaimed => "RECORDS_CLAIMED",
            UnmatchedReason::ReferenceUnresolved => "REFERENCE_UNRESOLVED",
        }
    }
}

/// Final per-invoice outcome. The engine emits exactly one of these for every
/// input invoice, matched or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub invoice_uuid: String,
    pub supplier_tax_id: String,
    pub assignment: Option<Assignment>,
    pub unmatched_reason: Option<UnmatchedReason>,
    /// Structured facts for the validator / alert registry (tolerance misses,
    /// date drift, degradation notices). Never rendered here.
    #[serde(default)]
    pub notes: Vec<String>,
    /// Set when combination search fell back to size-1-only enumeration.
    #[serde(default)]
    pub degraded: bool,
}

impl MatchResult {
    pub fn unmatched(invoice_uuid: &str, supplier_tax_id: &str, reason: UnmatchedReason) -> Self {
        Self {
            invoice_uuid: invoice_uuid.to_string(),
            supplier_tax_id: supplier_tax_id.to_string(),
            assignment: None,
            unmatched_reason: Some(reason),
            notes: Vec::new(),
            degraded: false,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.assignment.is_some()
    }
}

/// Run-level counters logged at the end of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub invoices: usize,
    pub matched: usize,
    pub exact: usize,
    pub unmatched: usize,
    pub fallback_resolved: usize,
    pub records_consumed: usize,
}
