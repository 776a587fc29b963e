use indexmap::{IndexMap, IndexSet};
use pathfinding::kuhn_munkres::{kuhn_munkres_min, Weights};

use crate::models::{CandidateGroup, MatchCandidate, MatchMethod};

/// Cost of a pairing the optimizer must never take: no candidate links the
/// invoice to the group. Large enough to dominate any sum of real costs,
/// small enough that n of them cannot overflow i64.
const INFEASIBLE: i64 = 1_000_000;

/// Real costs are centi-points of (100 - score), spread by 4 to leave room
/// for the method tie-break.
fn pair_cost(candidate: &MatchCandidate) -> i64 {
    let base = ((100.0 - candidate.score) * 100.0).round().max(0.0) as i64;
    let method_rank = match candidate.method {
        MatchMethod::ExplicitReference => 0,
        MatchMethod::DirectNumber => 1,
        MatchMethod::Heuristic => 2,
    };
    base * 4 + method_rank
}

/// Square cost matrix for kuhn_munkres, padded with infeasible entries.
struct CostMatrix {
    data: Vec<Vec<i64>>,
    size: usize,
}

impl Weights<i64> for CostMatrix {
    fn rows(&self) -> usize {
        self.size
    }

    fn columns(&self) -> usize {
        self.size
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.data[row][col]
    }

    fn neg(&self) -> Self {
        let data = self
            .data
            .iter()
            .map(|row| row.iter().map(|&v| -v).collect())
            .collect();
        Self {
            data,
            size: self.size,
        }
    }
}

/// Result of one optimizer pass: per-invoice winner (aligned with the input
/// candidate lists) plus the shipment records those winners consumed.
pub struct AssignOutcome {
    pub assigned: Vec<Option<MatchCandidate>>,
    pub consumed: IndexSet<String>,
}

/// Globally optimal one-to-one assignment of invoices to candidate groups.
/// Arrival-order greediness can starve a later invoice of its only viable
/// record; minimum-cost assignment over the whole batch cannot.
pub struct BatchAssigner;

impl BatchAssigner {
    /// `candidates[i]` holds invoice i's MatchCandidates (possibly empty).
    pub fn solve(candidates: &[Vec<MatchCandidate>]) -> AssignOutcome {
        let mut outcome = AssignOutcome {
            assigned: vec![None; candidates.len()],
            consumed: IndexSet::new(),
        };

        // Rows: invoices with at least one candidate.
        let rows: Vec<usize> = (0..candidates.len())
            .filter(|&i| !candidates[i].is_empty())
            .collect();

        // Columns: distinct candidate groups across the batch, keyed by
        // sorted member ids.
        let mut groups: IndexMap<Vec<String>, CandidateGroup> = IndexMap::new();
        for cand in candidates.iter().flatten() {
            groups
                .entry(cand.group.member_ids.clone())
                .or_insert_with(|| cand.group.clone());
        }

        // Degenerate instance: nothing to optimize, fallback handles it all.
        if rows.is_empty() || groups.is_empty() {
            return outcome;
        }

        let n = rows.len().max(groups.len());
        let mut data = vec![vec![INFEASIBLE; n]; n];
        for (r, &inv_idx) in rows.iter().enumerate() {
            for cand in &candidates[inv_idx] {
                let Some(c) = groups.get_index_of(&cand.group.member_ids) else {
                    continue;
                };
                let cost = pair_cost(cand);
                if cost < data[r][c] {
                    data[r][c] = cost;
                }
            }
        }

        let matrix = CostMatrix { data, size: n };
        let (_, cols) = kuhn_munkres_min(&matrix);

        // Collect feasible winners, then admit them best-first so that two
        // distinct groups sharing a record can never both consume it.
        let mut winners: Vec<(usize, MatchCandidate)> = Vec::new();
        for (r, &c) in cols.iter().enumerate() {
            if r >= rows.len() || c >= groups.len() || matrix.at(r, c) >= INFEASIBLE {
                continue;
            }
            let inv_idx = rows[r];
            let Some((member_ids, _)) = groups.get_index(c) else {
                continue;
            };
            let best = candidates[inv_idx]
                .iter()
                .filter(|cand| &cand.group.member_ids == member_ids)
                .min_by_key(|cand| pair_cost(cand));
            if let Some(cand) = best {
                winners.push((inv_idx, cand.clone()));
            }
        }
        winners.sort_by(|a, b| {
            pair_cost(&a.1)
                .cmp(&pair_cost(&b.1))
                .then_with(|| a.0.cmp(&b.0))
        });

        for (inv_idx, cand) in winners {
            let clash = cand
                .group
                .member_ids
                .iter()
                .any(|id| outcome.consumed.contains(id));
            if clash {
                tracing::debug!(
                    "invoice {}: optimizer group overlaps an already consumed record, deferring to fallback",
                    cand.invoice_uuid
                );
                continue;
            }
            for id in &cand.group.member_ids {
                outcome.consumed.insert(id.clone());
            }
            outcome.assigned[inv_idx] = Some(cand);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn cand(uuid: &str, ids: &[&str], score: f64, method: MatchMethod) -> MatchCandidate {
        MatchCandidate {
            invoice_uuid: uuid.to_string(),
            group: CandidateGroup::new(
                ids.iter().map(|s| s.to_string()).collect(),
                BigDecimal::from(100),
            ),
            score,
            method,
            amount_difference: BigDecimal::from(0),
            days_offset: 0,
        }
    }

    #[test]
    fn contended_record_resolved_for_maximum_total_score() {
        // Both invoices want R-1. F-B scores higher on it, but F-A has no
        // alternative: total score is maximized by keeping F-A on R-1 and
        // moving F-B to its second choice (95 + 80 beats 99 alone).
        let candidates = vec![
            vec![cand("F-A", &["R-1"], 95.0, MatchMethod::Heuristic)],
            vec![
                cand("F-B", &["R-1"], 99.0, MatchMethod::Heuristic),
                cand("F-B", &["R-2"], 80.0, MatchMethod::Heuristic),
            ],
        ];
        let out = BatchAssigner::solve(&candidates);
        assert_eq!(
            out.assigned[0].as_ref().unwrap().group.member_ids,
            vec!["R-1"]
        );
        assert_eq!(
            out.assigned[1].as_ref().unwrap().group.member_ids,
            vec!["R-2"]
        );
    }

    #[test]
    fn optimizer_avoids_starving_single_option_invoice() {
        // Greedy by arrival would give R-1 to the first invoice and leave the
        // second (whose only option is R-1) unmatched. Optimal does not.
        let candidates = vec![
            vec![
                cand("F-A", &["R-1"], 99.0, MatchMethod::Heuristic),
                cand("F-A", &["R-2"], 98.0, MatchMethod::Heuristic),
            ],
            vec![cand("F-B", &["R-1"], 97.0, MatchMethod::Heuristic)],
        ];
        let out = BatchAssigner::solve(&candidates);
        assert_eq!(
            out.assigned[0].as_ref().unwrap().group.member_ids,
            vec!["R-2"]
        );
        assert_eq!(
            out.assigned[1].as_ref().unwrap().group.member_ids,
            vec!["R-1"]
        );
    }

    #[test]
    fn overlapping_groups_cannot_both_win() {
        let candidates = vec![
            vec![cand("F-A", &["R-1", "R-2"], 100.0, MatchMethod::Heuristic)],
            vec![cand("F-B", &["R-2", "R-3"], 90.0, MatchMethod::Heuristic)],
        ];
        let out = BatchAssigner::solve(&candidates);
        assert!(out.assigned[0].is_some());
        assert!(out.assigned[1].is_none());
        assert_eq!(out.consumed.len(), 2);
    }

    #[test]
    fn no_record_consumed_twice() {
        let candidates = vec![
            vec![cand("F-A", &["R-1"], 100.0, MatchMethod::Heuristic)],
            vec![cand("F-B", &["R-1"], 100.0, MatchMethod::Heuristic)],
            vec![cand("F-C", &["R-2"], 90.0, MatchMethod::Heuristic)],
        ];
        let out = BatchAssigner::solve(&candidates);
        let matched: Vec<_> = out.assigned.iter().flatten().collect();
        assert_eq!(matched.len(), 2);
        assert_eq!(out.consumed.len(), 2);
    }

    #[test]
    fn empty_instance_short_circuits() {
        let out = BatchAssigner::solve(&[Vec::new(), Vec::new()]);
        assert!(out.assigned.iter().all(Option::is_none));
        assert!(out.consumed.is_empty());
    }

    #[test]
    fn explicit_reference_outranks_equal_score_heuristic() {
        let candidates = vec![vec![
            cand("F-A", &["R-1"], 100.0, MatchMethod::Heuristic),
            cand("F-A", &["R-2"], 100.0, MatchMethod::ExplicitReference),
        ]];
        let out = BatchAssigner::solve(&candidates);
        let a = out.assigned[0].as_ref().unwrap();
        assert_eq!(a.method, MatchMethod::ExplicitReference);
        assert_eq!(a.group.member_ids, vec!["R-2"]);
    }
}
