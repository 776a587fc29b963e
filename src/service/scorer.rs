use bigdecimal::{BigDecimal, ToPrimitive, Zero};

use crate::config::MatchConfig;
use crate::models::{InvoiceRecord, ShipmentRecord};

/// Score weights: amount 50, date 30, product similarity 20.
const WEIGHT_AMOUNT: f64 = 50.0;
const WEIGHT_DATE: f64 = 30.0;
const WEIGHT_PRODUCT: f64 = 20.0;

/// Component breakdown for one invoice/group pairing.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    /// Composite score in [0, 100].
    pub score: f64,
    pub amount_score: f64,
    pub date_score: f64,
    pub product_score: f64,
    pub amount_difference: BigDecimal,
    /// Days from invoice issue date to the nearest member date.
    pub days_offset: i64,
}

impl ScoreBreakdown {
    pub fn is_exact(&self) -> bool {
        self.amount_difference.is_zero()
    }
}

/// Composite similarity scorer between one invoice and one candidate group.
/// Pure: no consumption state, safe to call from parallel candidate generation.
pub struct Scorer {
    config: MatchConfig,
}

impl Scorer {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Score against the date window: candidates whose nearest member date
    /// falls outside +/- `date_window_days` are excluded, not penalized.
    pub fn score_group(
        &self,
        invoice: &InvoiceRecord,
        members: &[&ShipmentRecord],
    ) -> Option<ScoreBreakdown> {
        self.score_inner(invoice, members, true)
    }

    /// Score a group whose identity is already established (direct number or
    /// explicit reference). The date component bottoms out at 0 instead of
    /// excluding the candidate.
    pub fn score_group_unbounded(
        &self,
        invoice: &InvoiceRecord,
        members: &[&ShipmentRecord],
    ) -> Option<ScoreBreakdown> {
        self.score_inner(invoice, members, false)
    }

    fn score_inner(
        &self,
        invoice: &InvoiceRecord,
        members: &[&ShipmentRecord],
        window_excludes: bool,
    ) -> Option<ScoreBreakdown> {
        if members.is_empty() {
            return None;
        }
        // Zero or negative total makes the amount ratio undefined: hard exclusion.
        if invoice.total <= BigDecimal::zero() {
            return None;
        }

        let group_total: BigDecimal = members.iter().map(|m| m.total.clone()).sum();
        let amount_difference = (&invoice.total - &group_total).abs();

        let ratio = (&amount_difference / &invoice.total).to_f64().unwrap_or(1.0);
        let amount_score = (1.0 - ratio).max(0.0) * WEIGHT_AMOUNT;

        let days_offset = members
            .iter()
            .map(|m| (m.date - invoice.issue_date).num_days().abs())
            .min()
            .unwrap_or(i64::MAX);
        let window = self.config.date_window_days;
        let date_score = if days_offset <= window && window > 0 {
            (1.0 - days_offset as f64 / window as f64) * WEIGHT_DATE
        } else if days_offset == 0 {
            WEIGHT_DATE
        } else if window_excludes {
            return None;
        } else {
            0.0
        };

        let product_score = self.product_similarity(invoice, members) * WEIGHT_PRODUCT;

        let score = (amount_score + date_score + product_score).clamp(0.0, 100.0);
        Some(ScoreBreakdown {
            score,
            amount_score,
            date_score,
            product_score,
            amount_difference,
            days_offset,
        })
    }

    /// Best-match-per-invoice-line similarity, averaged. A line whose best
    /// match falls under the similarity threshold scores 0 for its slot, as
    /// does a line with no counterpart at all; an invoice with no lines
    /// contributes the full component (nothing to contradict).
    fn product_similarity(&self, invoice: &InvoiceRecord, members: &[&ShipmentRecord]) -> f64 {
        if invoice.items.is_empty() {
            return 1.0;
        }
        let group_items: Vec<&str> = members
            .iter()
            .flat_map(|m| m.items.iter().map(|it| it.description.as_str()))
            .collect();
        if group_items.is_empty() {
            return 0.0;
        }

        let total: f64 = invoice
            .items
            .iter()
            .map(|item| {
                let best = group_items
                    .iter()
                    .map(|g| token_sort_similarity(&item.description, g))
                    .fold(0.0, f64::max);
                if best >= self.config.similarity_threshold {
                    best
                } else {
                    0.0
                }
            })
            .sum();
        total / invoice.items.len() as f64
    }
}

/// Token-sort text similarity in [0, 1]: lowercase, sort whitespace tokens,
/// then normalized edit distance. Robust to word-order differences between
/// invoice and receipt descriptions.
pub fn token_sort_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&token_sort(a), &token_sort(b))
}

fn token_sort(s: &str) -> String {
    let mut tokens: Vec<String> = s
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    tokens.sort();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, ShipmentStatus};
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn invoice(total: &str, date: &str) -> InvoiceRecord {
        InvoiceRecord {
            uuid: "UUID-1".to_string(),
            supplier_tax_id: "AAA010101AA1".to_string(),
            issue_date: NaiveDate::from_str(date).unwrap(),
            total: BigDecimal::from_str(total).unwrap(),
            items: Vec::new(),
            noted_record_id: None,
            extracted_refs: Vec::new(),
        }
    }

    fn shipment(id: &str, total: &str, date: &str) -> ShipmentRecord {
        ShipmentRecord {
            record_id: id.to_string(),
            supplier_id: "AAA010101AA1".to_string(),
            date: NaiveDate::from_str(date).unwrap(),
            total: BigDecimal::from_str(total).unwrap(),
            status: ShipmentStatus::Open,
            items: Vec::new(),
        }
    }

    fn item(desc: &str) -> LineItem {
        LineItem {
            description: desc.to_string(),
            quantity: BigDecimal::from(1),
            unit_amount: BigDecimal::from(1),
        }
    }

    #[test]
    fn exact_total_same_date_scores_100() {
        let scorer = Scorer::new(MatchConfig::default());
        let inv = invoice("3448.94", "2024-03-10");
        let rec = shipment("R-1", "3448.94", "2024-03-10");
        let s = scorer.score_group(&inv, &[&rec]).unwrap();
        assert!((s.score - 100.0).abs() < 1e-9);
        assert!(s.is_exact());
        assert_eq!(s.days_offset, 0);
    }

    #[test]
    fn date_decays_linearly_inside_window() {
        let mut cfg = MatchConfig::default();
        cfg.date_window_days = 10;
        let scorer = Scorer::new(cfg);
        let inv = invoice("100", "2024-03-10");
        let rec = shipment("R-1", "100", "2024-03-15");
        let s = scorer.score_group(&inv, &[&rec]).unwrap();
        // 5 of 10 days gone -> half of the 30-point date component.
        assert!((s.date_score - 15.0).abs() < 1e-9);
    }

    #[test]
    fn outside_window_excludes_entirely() {
        let mut cfg = MatchConfig::default();
        cfg.date_window_days = 3;
        let scorer = Scorer::new(cfg);
        let inv = invoice("100", "2024-03-10");
        let rec = shipment("R-1", "100", "2024-03-20");
        assert!(scorer.score_group(&inv, &[&rec]).is_none());
        // Direct-number path still scores, date component 0.
        let s = scorer.score_group_unbounded(&inv, &[&rec]).unwrap();
        assert!((s.date_score - 0.0).abs() < 1e-9);
        assert!(s.score > 0.0);
    }

    #[test]
    fn zero_total_is_hard_exclusion() {
        let scorer = Scorer::new(MatchConfig::default());
        let inv = invoice("0", "2024-03-10");
        let rec = shipment("R-1", "0", "2024-03-10");
        assert!(scorer.score_group(&inv, &[&rec]).is_none());
        assert!(scorer.score_group_unbounded(&inv, &[&rec]).is_none());
    }

    #[test]
    fn amount_component_is_proportional() {
        let scorer = Scorer::new(MatchConfig::default());
        let inv = invoice("100", "2024-03-10");
        let rec = shipment("R-1", "90", "2024-03-10");
        let s = scorer.score_group(&inv, &[&rec]).unwrap();
        assert!((s.amount_score - 45.0).abs() < 1e-9);
        assert_eq!(s.amount_difference, BigDecimal::from(10));
    }

    #[test]
    fn product_lines_without_counterpart_score_zero_slots() {
        let scorer = Scorer::new(MatchConfig::default());
        let mut inv = invoice("100", "2024-03-10");
        inv.items = vec![item("VALVULA PVC 2 PULGADAS"), item("TUBO COBRE 1/2")];
        let mut rec = shipment("R-1", "100", "2024-03-10");
        rec.items = vec![item("PVC VALVULA 2 PULGADAS")];
        let s = scorer.score_group(&inv, &[&rec]).unwrap();
        // First line matches near-perfectly, second has no plausible partner.
        assert!(s.product_score > 8.0 && s.product_score < 16.0);
    }

    #[test]
    fn similarity_threshold_gates_weak_slots() {
        let mut inv = invoice("100", "2024-03-10");
        inv.items = vec![item("VALVULA PVC 2 PULGADAS")];
        let mut rec = shipment("R-1", "100", "2024-03-10");
        rec.items = vec![item("BOMBA SUMERGIBLE 3HP")];

        let mut strict = MatchConfig::default();
        strict.similarity_threshold = 0.99;
        let gated = Scorer::new(strict).score_group(&inv, &[&rec]).unwrap();
        assert_eq!(gated.product_score, 0.0);

        let mut lax = MatchConfig::default();
        lax.similarity_threshold = 0.0;
        let raw = Scorer::new(lax).score_group(&inv, &[&rec]).unwrap();
        assert!(raw.product_score > 0.0);
        assert!(raw.product_score > gated.product_score);
    }

    #[test]
    fn token_sort_ignores_word_order() {
        assert!(token_sort_similarity("TUBO COBRE 1/2", "COBRE TUBO 1/2") > 0.99);
    }
}
