//! Price aggregator: folds parsed listings into per-item order statistics.
//! Pure — no I/O, no clock, independently testable against literal inputs.

use std::collections::HashMap;

use crate::scan::parse::ListingRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceAggregate {
    pub item_id: i64,
    /// Per-unit gold prices, ascending.
    pub unit_prices: Vec<f64>,
    pub median_gold: f64,
    pub min_gold: f64,
    /// Sum of stack sizes, not listing count — one 20-stack contributes 20.
    pub total_qty: i64,
}

/// Group records by item id and compute median/min/qty per group. Output is
/// ordered by item id so a cycle's writes are deterministic.
pub fn aggregate(records: impl IntoIterator<Item = ListingRecord>) -> Vec<PriceAggregate> {
    let mut prices: HashMap<i64, Vec<f64>> = HashMap::new();
    let mut qty: HashMap<i64, i64> = HashMap::new();

    for rec in records {
        prices.entry(rec.item_id).or_default().push(rec.unit_gold());
        *qty.entry(rec.item_id).or_insert(0) += rec.stack_size;
    }

    let mut out: Vec<PriceAggregate> = prices
        .into_iter()
        .map(|(item_id, mut unit_prices)| {
            unit_prices.sort_by(|a, b| a.total_cmp(b));
            PriceAggregate {
                item_id,
                median_gold: median_sorted(&unit_prices),
                min_gold: unit_prices[0],
                total_qty: qty.get(&item_id).copied().unwrap_or(0),
                unit_prices,
            }
        })
        .collect();
    out.sort_by_key(|a| a.item_id);
    out
}

/// Standard two-case median of an ascending-sorted slice.
pub fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(item_id: i64, buyout_copper: i64, stack_size: i64) -> ListingRecord {
        ListingRecord { item_id, buyout_copper, stack_size }
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(median_sorted(&[7.0]), 7.0);
        assert_eq!(median_sorted(&[]), 0.0);
    }

    #[test]
    fn groups_and_sorts_per_item() {
        // Item 100: 20000c/1 = 2.0g and 10000c/2 = 0.5g per unit.
        let aggs = aggregate(vec![rec(100, 20000, 1), rec(100, 10000, 2)]);
        assert_eq!(aggs.len(), 1);
        let a = &aggs[0];
        assert_eq!(a.item_id, 100);
        assert_eq!(a.unit_prices, vec![0.5, 2.0]);
        assert_eq!(a.median_gold, 1.25);
        assert_eq!(a.min_gold, 0.5);
        assert_eq!(a.total_qty, 3);
    }

    #[test]
    fn output_ordered_by_item_id() {
        let aggs = aggregate(vec![rec(300, 100, 1), rec(100, 100, 1), rec(200, 100, 1)]);
        let ids: Vec<i64> = aggs.iter().map(|a| a.item_id).collect();
        assert_eq!(ids, vec![100, 200, 300]);
    }

    #[test]
    fn qty_sums_stacks_not_listings() {
        let aggs = aggregate(vec![rec(5, 1000, 20)]);
        assert_eq!(aggs[0].total_qty, 20);
        assert_eq!(aggs[0].unit_prices.len(), 1);
    }
}
