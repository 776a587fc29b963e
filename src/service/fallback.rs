use indexmap::IndexSet;

use crate::config::MatchConfig;
use crate::models::{InvoiceRecord, MatchCandidate, ShipmentRecord};
use crate::service::combination::CombinationSearch;
use crate::service::index::CandidateIndex;
use crate::service::reference::{ExplicitResolution, ReferenceResolver};
use crate::service::scorer::Scorer;

#[derive(Debug, Default)]
pub struct FallbackOutcome {
    pub candidate: Option<MatchCandidate>,
    pub degraded: bool,
    pub below_min: bool,
    /// Unconsumed records existed but no grouping fit the amount tolerance.
    pub outside_tolerance: bool,
}

/// Individually re-matches invoices the optimizer left unassigned, against
/// the records still unconsumed. Greedy: completeness over global optimality
/// on the residual set.
pub struct FallbackResolver<'a> {
    config: &'a MatchConfig,
    index: &'a CandidateIndex,
    scorer: &'a Scorer,
}

impl<'a> FallbackResolver<'a> {
    pub fn new(config: &'a MatchConfig, index: &'a CandidateIndex, scorer: &'a Scorer) -> Self {
        Self {
            config,
            index,
            scorer,
        }
    }

    /// On success the winning group's records are added to `consumed`.
    pub fn resolve(
        &self,
        invoice: &InvoiceRecord,
        consumed: &mut IndexSet<String>,
    ) -> FallbackOutcome {
        let mut outcome = FallbackOutcome::default();

        let resolver = ReferenceResolver::new(self.index, self.scorer);
        let mut candidates: Vec<MatchCandidate> = Vec::new();
        let mut reference_picks: Vec<MatchCandidate> = Vec::new();
        if let ExplicitResolution::Resolved(cand) = resolver.resolve_explicit(invoice) {
            reference_picks.push(cand);
        }
        reference_picks.extend(resolver.resolve_direct(invoice));
        for cand in reference_picks {
            // A reference whose record was already claimed elsewhere is no
            // longer trustworthy for this invoice.
            if cand.group.member_ids.iter().all(|id| !consumed.contains(id)) {
                candidates.push(cand);
            }
        }

        let pool: Vec<&ShipmentRecord> = self
            .index
            .window(
                &invoice.supplier_tax_id,
                invoice.issue_date,
                self.config.date_window_days,
            )
            .into_iter()
            .filter(|r| !consumed.contains(&r.record_id))
            .collect();

        let search = CombinationSearch::new(self.config, self.scorer);
        let heuristic = search.search(invoice, &pool);
        outcome.degraded = heuristic.degraded;
        outcome.below_min = heuristic.below_min;
        outcome.outside_tolerance = heuristic.outside_tolerance;
        candidates.extend(heuristic.best);

        // Greedy: best remaining candidate wins outright.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.method.cmp(&a.method))
        });

        if let Some(best) = candidates.into_iter().next() {
            for id in &best.group.member_ids {
                consumed.insert(id.clone());
            }
            outcome.candidate = Some(best);
        }
        outcome
    }
}
