use indexmap::IndexSet;

use crate::models::{CandidateGroup, InvoiceRecord, MatchCandidate, MatchMethod};
use crate::service::index::CandidateIndex;
use crate::service::scorer::Scorer;

/// Outcome of the trusted reference path.
pub enum ExplicitResolution {
    /// Invoice carried no reference list.
    Absent,
    /// Every reference resolved to an open record of the same supplier.
    Resolved(MatchCandidate),
    /// At least one reference failed lookup; the whole list is distrusted.
    Unresolved,
}

/// Resolves externally-supplied record references into direct candidate
/// picks, bypassing heuristic scoring.
pub struct ReferenceResolver<'a> {
    index: &'a CandidateIndex,
    scorer: &'a Scorer,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(index: &'a CandidateIndex, scorer: &'a Scorer) -> Self {
        Self { index, scorer }
    }

    /// Resolve the extracted reference list. All-or-nothing: if any id fails
    /// exact lookup within the invoice's supplier, the whole list is distrusted
    /// and the invoice falls through to scoring-based resolution.
    pub fn resolve_explicit(&self, invoice: &InvoiceRecord) -> ExplicitResolution {
        if invoice.extracted_refs.is_empty() {
            return ExplicitResolution::Absent;
        }

        let ids: IndexSet<&str> = invoice.extracted_refs.iter().map(String::as_str).collect();
        let mut members = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.index.lookup(&invoice.supplier_tax_id, id) {
                Some(rec) => members.push(rec),
                None => {
                    tracing::warn!(
                        "invoice {}: reference {} not resolvable, discarding reference list",
                        invoice.uuid,
                        id
                    );
                    return ExplicitResolution::Unresolved;
                }
            }
        }

        let Some(breakdown) = self.scorer.score_group_unbounded(invoice, &members) else {
            return ExplicitResolution::Unresolved;
        };
        let group = CandidateGroup::new(
            members.iter().map(|m| m.record_id.clone()).collect(),
            members.iter().map(|m| m.total.clone()).sum(),
        );
        ExplicitResolution::Resolved(MatchCandidate {
            invoice_uuid: invoice.uuid.clone(),
            group,
            // Explicit references are trusted unconditionally; the exact
            // difference is still reported for the downstream validator.
            score: 100.0,
            method: MatchMethod::ExplicitReference,
            amount_difference: breakdown.amount_difference,
            days_offset: breakdown.days_offset,
        })
    }

    /// Resolve a record number the supplier noted on the invoice itself.
    /// Identity is known but not trusted: the candidate is scored normally.
    pub fn resolve_direct(&self, invoice: &InvoiceRecord) -> Option<MatchCandidate> {
        let noted = invoice.noted_record_id.as_deref()?;
        let rec = self.index.lookup(&invoice.supplier_tax_id, noted)?;
        let breakdown = self.scorer.score_group_unbounded(invoice, &[rec])?;
        Some(MatchCandidate {
            invoice_uuid: invoice.uuid.clone(),
            group: CandidateGroup::new(vec![rec.record_id.clone()], rec.total.clone()),
            score: breakdown.score,
            method: MatchMethod::DirectNumber,
            amount_difference: breakdown.amount_difference,
            days_offset: breakdown.days_offset,
        })
    }
}
