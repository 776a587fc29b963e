use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive, Zero};

use crate::config::MatchConfig;
use crate::models::{CandidateGroup, InvoiceRecord, MatchCandidate, MatchMethod, ShipmentRecord};
use crate::service::scorer::Scorer;

/// Outcome of combination search for one invoice over its pre-filtered pool.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Best heuristic candidate, exact groups preferred over tolerance groups.
    pub best: Option<MatchCandidate>,
    /// True when the pool exceeded the enumeration bound and only size-1
    /// groups were searched.
    pub degraded: bool,
    /// A candidate group existed but scored below the heuristic floor.
    pub below_min: bool,
    /// Records were in the window but no grouping came within the amount
    /// tolerance.
    pub outside_tolerance: bool,
}

/// Deterministic preference order between exact groups: fewest members,
/// then members dated closest to the invoice, then lowest id sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    size: usize,
    sum_abs_days: i64,
    member_ids: Vec<String>,
}

impl GroupKey {
    fn new(invoice: &InvoiceRecord, members: &[&ShipmentRecord]) -> Self {
        let mut member_ids: Vec<String> =
            members.iter().map(|m| m.record_id.clone()).collect();
        member_ids.sort();
        Self {
            size: members.len(),
            sum_abs_days: members
                .iter()
                .map(|m| (m.date - invoice.issue_date).num_days().abs())
                .sum(),
            member_ids,
        }
    }
}

/// Enumerates 1..K-record groupings of the candidate pool whose combined
/// total can satisfy one invoice. The pool arrives pre-filtered by supplier
/// and date window; the only bound applied here is the enumeration budget.
pub struct CombinationSearch<'a> {
    config: &'a MatchConfig,
    scorer: &'a Scorer,
}

impl<'a> CombinationSearch<'a> {
    pub fn new(config: &'a MatchConfig, scorer: &'a Scorer) -> Self {
        Self { config, scorer }
    }

    pub fn search(&self, invoice: &InvoiceRecord, pool: &[&ShipmentRecord]) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        if pool.is_empty() || invoice.total <= BigDecimal::zero() {
            return outcome;
        }

        let tolerance_ratio = self.config.amount_tolerance_pct / 100.0;

        // Size 1 first: an exact single match short-circuits enumeration.
        let mut best_exact: Option<(GroupKey, Vec<usize>)> = None;
        let mut best_tolerance: Option<(BigDecimal, GroupKey, Vec<usize>)> = None;
        for (i, rec) in pool.iter().enumerate() {
            let diff = (&invoice.total - &rec.total).abs();
            if diff.is_zero() {
                self.consider_exact(invoice, pool, &[i], &mut best_exact);
            } else if within_ratio(&diff, &invoice.total, tolerance_ratio) {
                self.consider_tolerance(invoice, pool, &[i], diff, &mut best_tolerance);
            }
        }

        if best_exact.is_none() {
            if pool.len() > self.config.max_combination_pool {
                tracing::warn!(
                    "invoice {}: pool of {} exceeds enumeration bound {}, degrading to size-1 search",
                    invoice.uuid,
                    pool.len(),
                    self.config.max_combination_pool
                );
                outcome.degraded = true;
            } else {
                self.enumerate_multi(invoice, pool, &mut best_exact, &mut best_tolerance);
            }
        }

        let chosen = best_exact
            .map(|(_, idxs)| idxs)
            .or_else(|| best_tolerance.map(|(_, _, idxs)| idxs));
        let Some(idxs) = chosen else {
            outcome.outside_tolerance = true;
            return outcome;
        };

        let members: Vec<&ShipmentRecord> = idxs.iter().map(|&i| pool[i]).collect();
        let Some(breakdown) = self.scorer.score_group(invoice, &members) else {
            return outcome;
        };
        if breakdown.score < self.config.min_heuristic_score && !breakdown.is_exact() {
            outcome.below_min = true;
            return outcome;
        }

        outcome.best = Some(MatchCandidate {
            invoice_uuid: invoice.uuid.clone(),
            group: CandidateGroup::new(
                members.iter().map(|m| m.record_id.clone()).collect(),
                members.iter().map(|m| m.total.clone()).sum(),
            ),
            score: breakdown.score,
            method: MatchMethod::Heuristic,
            amount_difference: breakdown.amount_difference,
            days_offset: breakdown.days_offset,
        });
        outcome
    }

    /// Sizes 2..=K, ascending so the smallest-group tie-break falls out of
    /// the enumeration order: once a size yields exact groups, stop.
    fn enumerate_multi(
        &self,
        invoice: &InvoiceRecord,
        pool: &[&ShipmentRecord],
        best_exact: &mut Option<(GroupKey, Vec<usize>)>,
        best_tolerance: &mut Option<(BigDecimal, GroupKey, Vec<usize>)>,
    ) {
        let tolerance_ratio = self.config.amount_tolerance_pct / 100.0;
        // Records alone above the invoice total (plus tolerance) can never be
        // part of a satisfying group.
        let limit = &invoice.total + &abs_tolerance(&invoice.total, tolerance_ratio);
        let eligible: Vec<usize> = (0..pool.len())
            .filter(|&i| pool[i].total <= limit)
            .collect();

        let max_size = self.config.max_group_size.min(eligible.len());
        for size in 2..=max_size {
            let mut current: Vec<usize> = Vec::with_capacity(size);
            self.descend(
                invoice,
                pool,
                &eligible,
                0,
                size,
                BigDecimal::zero(),
                &limit,
                &mut current,
                best_exact,
                best_tolerance,
                tolerance_ratio,
            );
            if best_exact.is_some() {
                return;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn descend(
        &self,
        invoice: &InvoiceRecord,
        pool: &[&ShipmentRecord],
        eligible: &[usize],
        start: usize,
        remaining: usize,
        running: BigDecimal,
        limit: &BigDecimal,
        current: &mut Vec<usize>,
        best_exact: &mut Option<(GroupKey, Vec<usize>)>,
        best_tolerance: &mut Option<(BigDecimal, GroupKey, Vec<usize>)>,
        tolerance_ratio: f64,
    ) {
        if remaining == 0 {
            let diff = (&invoice.total - &running).abs();
            if diff.is_zero() {
                self.consider_exact(invoice, pool, current, best_exact);
            } else if within_ratio(&diff, &invoice.total, tolerance_ratio) {
                self.consider_tolerance(invoice, pool, current, diff, best_tolerance);
            }
            return;
        }
        if eligible.len() - start < remaining {
            return;
        }
        for pos in start..=eligible.len() - remaining {
            let idx = eligible[pos];
            let next = &running + &pool[idx].total;
            // Totals are non-negative, so an overshoot can only grow.
            if &next > limit {
                continue;
            }
            current.push(idx);
            self.descend(
                invoice,
                pool,
                eligible,
                pos + 1,
                remaining - 1,
                next,
                limit,
                current,
                best_exact,
                best_tolerance,
                tolerance_ratio,
            );
            current.pop();
        }
    }

    fn consider_exact(
        &self,
        invoice: &InvoiceRecord,
        pool: &[&ShipmentRecord],
        idxs: &[usize],
        best: &mut Option<(GroupKey, Vec<usize>)>,
    ) {
        let members: Vec<&ShipmentRecord> = idxs.iter().map(|&i| pool[i]).collect();
        let key = GroupKey::new(invoice, &members);
        match best {
            Some((existing, _)) if *existing <= key => {}
            _ => *best = Some((key, idxs.to_vec())),
        }
    }

    /// Tolerance groups are kept by smallest difference first, preference
    /// order as the tie-break.
    fn consider_tolerance(
        &self,
        invoice: &InvoiceRecord,
        pool: &[&ShipmentRecord],
        idxs: &[usize],
        diff: BigDecimal,
        best: &mut Option<(BigDecimal, GroupKey, Vec<usize>)>,
    ) {
        let members: Vec<&ShipmentRecord> = idxs.iter().map(|&i| pool[i]).collect();
        let key = GroupKey::new(invoice, &members);
        let replace = match best {
            None => true,
            Some((d, k, _)) => diff < *d || (diff == *d && key < *k),
        };
        if replace {
            *best = Some((diff, key, idxs.to_vec()));
        }
    }
}

fn within_ratio(diff: &BigDecimal, total: &BigDecimal, ratio: f64) -> bool {
    (diff / total).to_f64().map_or(false, |r| r <= ratio)
}

fn abs_tolerance(total: &BigDecimal, ratio: f64) -> BigDecimal {
    // Tolerance only prunes enumeration; f64 precision is enough here.
    let t = total.to_f64().unwrap_or(0.0) * ratio;
    BigDecimal::from_f64(t).unwrap_or_else(BigDecimal::zero)
}
