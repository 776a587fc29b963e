use bigdecimal::{BigDecimal, Zero};
use rayon::prelude::*;
use std::collections::HashSet;

use crate::config::MatchConfig;
use crate::error::EngineError;
use crate::models::{
    Assignment, InvoiceRecord, MatchCandidate, MatchResult, RunStats, ShipmentRecord,
    UnmatchedReason,
};
use crate::service::assignment::BatchAssigner;
use crate::service::combination::CombinationSearch;
use crate::service::fallback::FallbackResolver;
use crate::service::index::CandidateIndex;
use crate::service::reference::{ExplicitResolution, ReferenceResolver};
use crate::service::scorer::Scorer;

/// Per-invoice output of the parallel candidate-generation phase.
enum Prepared {
    Invalid(String),
    Candidates {
        list: Vec<MatchCandidate>,
        degraded: bool,
        below_min: bool,
        outside_tolerance: bool,
        /// The invoice carried a reference list that failed resolution.
        reference_failed: bool,
    },
}

/// The reconciliation engine: one synchronous batch computation per call,
/// no state carried across runs. Candidate generation is pure and parallel;
/// assignment and fallback run sequentially over the run-scoped consumed set.
pub struct ReconEngine {
    config: MatchConfig,
}

impl ReconEngine {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Reconcile a batch of invoices against the open shipment-record pool.
    /// Returns exactly one MatchResult per input invoice, in input order.
    pub fn reconcile(
        &self,
        invoices: &[InvoiceRecord],
        pool: Vec<ShipmentRecord>,
    ) -> Result<Vec<MatchResult>, EngineError> {
        if invoices.is_empty() {
            return Err(EngineError::EmptyInput);
        }

        tracing::info!(
            "starting reconciliation: {} invoices against {} shipment records",
            invoices.len(),
            pool.len()
        );

        let index = CandidateIndex::new(pool);
        let scorer = Scorer::new(self.config.clone());

        // Phase 1: candidate generation, read-only and data-parallel.
        let prepared: Vec<Prepared> = invoices
            .par_iter()
            .map(|inv| self.prepare(inv, &index, &scorer))
            .collect();

        // Phase 2: batch-optimal assignment over every candidate at once.
        let candidate_lists: Vec<Vec<MatchCandidate>> = prepared
            .iter()
            .map(|p| match p {
                Prepared::Candidates { list, .. } => list.clone(),
                Prepared::Invalid(_) => Vec::new(),
            })
            .collect();
        let mut assign = BatchAssigner::solve(&candidate_lists);

        // Phase 3: fallback on the residue, then result merge. Sequential:
        // the consumed set is the one mutable shared resource of the run.
        let fallback = FallbackResolver::new(&self.config, &index, &scorer);
        let mut results = Vec::with_capacity(invoices.len());
        let mut fallback_resolved = 0usize;

        for (i, invoice) in invoices.iter().enumerate() {
            let result = match &prepared[i] {
                Prepared::Invalid(reason) => {
                    tracing::warn!("invoice {}: excluded from matching: {}", invoice.uuid, reason);
                    MatchResult::unmatched(
                        &invoice.uuid,
                        &invoice.supplier_tax_id,
                        UnmatchedReason::InvalidData(reason.clone()),
                    )
                }
                Prepared::Candidates {
                    list,
                    degraded,
                    below_min,
                    outside_tolerance,
                    reference_failed,
                } => {
                    if let Some(winner) = assign.assigned[i].take() {
                        self.matched_result(invoice, winner, *degraded, false)
                    } else {
                        let out = fallback.resolve(invoice, &mut assign.consumed);
                        match out.candidate {
                            Some(winner) => {
                                fallback_resolved += 1;
                                self.matched_result(
                                    invoice,
                                    winner,
                                    *degraded || out.degraded,
                                    true,
                                )
                            }
                            None => {
                                let reason = if !list.is_empty() {
                                    UnmatchedReason::RecordsClaimed
                                } else if *reference_failed {
                                    UnmatchedReason::ReferenceUnresolved
                                } else if *below_min || out.below_min {
                                    UnmatchedReason::BelowMinScore
                                } else if *outside_tolerance || out.outside_tolerance {
                                    UnmatchedReason::OutsideTolerance
                                } else {
                                    UnmatchedReason::NoCandidates
                                };
                                tracing::info!(
                                    "invoice {}: unmatched ({})",
                                    invoice.uuid,
                                    reason.label()
                                );
                                let mut r = MatchResult::unmatched(
                                    &invoice.uuid,
                                    &invoice.supplier_tax_id,
                                    reason,
                                );
                                r.degraded = *degraded || out.degraded;
                                r
                            }
                        }
                    }
                }
            };
            results.push(result);
        }

        self.audit_exclusivity(&results);

        let stats = RunStats {
            invoices: results.len(),
            matched: results.iter().filter(|r| r.is_matched()).count(),
            exact: results
                .iter()
                .filter_map(|r| r.assignment.as_ref())
                .filter(|a| a.amount_difference.is_zero())
                .count(),
            unmatched: results.iter().filter(|r| !r.is_matched()).count(),
            fallback_resolved,
            records_consumed: assign.consumed.len(),
        };
        tracing::info!(
            "reconciliation finished: {} matched ({} exact, {} via fallback), {} unmatched, {} records consumed",
            stats.matched,
            stats.exact,
            stats.fallback_resolved,
            stats.unmatched,
            stats.records_consumed
        );

        Ok(results)
    }

    fn prepare(
        &self,
        invoice: &InvoiceRecord,
        index: &CandidateIndex,
        scorer: &Scorer,
    ) -> Prepared {
        if invoice.supplier_tax_id.trim().is_empty() {
            return Prepared::Invalid("missing supplier tax id".to_string());
        }
        if invoice.total <= BigDecimal::zero() {
            return Prepared::Invalid("zero or negative invoice total".to_string());
        }

        let resolver = ReferenceResolver::new(index, scorer);

        // Trusted references bypass scoring entirely; a list that fails
        // resolution is remembered so the final reason can name it.
        let reference_failed = match resolver.resolve_explicit(invoice) {
            ExplicitResolution::Resolved(explicit) => {
                return Prepared::Candidates {
                    list: vec![explicit],
                    degraded: false,
                    below_min: false,
                    outside_tolerance: false,
                    reference_failed: false,
                };
            }
            ExplicitResolution::Unresolved => true,
            ExplicitResolution::Absent => false,
        };

        let mut list: Vec<MatchCandidate> = Vec::new();
        list.extend(resolver.resolve_direct(invoice));

        let pool = index.window(
            &invoice.supplier_tax_id,
            invoice.issue_date,
            self.config.date_window_days,
        );
        let search = CombinationSearch::new(&self.config, scorer);
        let out = search.search(invoice, &pool);
        list.extend(out.best);

        Prepared::Candidates {
            list,
            degraded: out.degraded,
            below_min: out.below_min,
            outside_tolerance: out.outside_tolerance,
            reference_failed,
        }
    }

    fn matched_result(
        &self,
        invoice: &InvoiceRecord,
        winner: MatchCandidate,
        degraded: bool,
        via_fallback: bool,
    ) -> MatchResult {
        let mut notes = Vec::new();
        if winner.group.len() > 1 {
            notes.push(format!("MULTI_RECORD: {} shipment records", winner.group.len()));
        }
        if !winner.amount_difference.is_zero() {
            notes.push(format!("AMOUNT_DIFFERENCE: {}", winner.amount_difference));
        }
        if winner.days_offset > self.config.late_days_alert {
            notes.push(format!("DATE_DRIFT: {} days", winner.days_offset));
        }
        if degraded {
            notes.push("DEGRADED_SEARCH: multi-record enumeration skipped".to_string());
        }
        if via_fallback {
            notes.push("FALLBACK_RESOLVED: first-choice records claimed elsewhere".to_string());
        }

        tracing::info!(
            "invoice {}: matched {:?} score {:.2} ({:?})",
            invoice.uuid,
            winner.group.member_ids,
            winner.score,
            winner.method
        );

        MatchResult {
            invoice_uuid: invoice.uuid.clone(),
            supplier_tax_id: invoice.supplier_tax_id.clone(),
            assignment: Some(Assignment {
                consumed_record_ids: winner.group.member_ids.clone(),
                group: winner.group,
                score: winner.score,
                method: winner.method,
                amount_difference: winner.amount_difference,
            }),
            unmatched_reason: None,
            notes,
            degraded,
        }
    }

    /// Re-verifies the exclusivity invariant over the final results. A hit
    /// here is an engine bug, logged for the alert registry.
    fn audit_exclusivity(&self, results: &[MatchResult]) {
        let mut seen: HashSet<&str> = HashSet::new();
        for result in results {
            let Some(assignment) = &result.assignment else {
                continue;
            };
            for id in &assignment.consumed_record_ids {
                if !seen.insert(id) {
                    tracing::error!(
                        "DUPLICATE_RECORD: shipment record {} consumed by more than one invoice (last: {})",
                        id,
                        result.invoice_uuid
                    );
                }
            }
        }
    }
}
