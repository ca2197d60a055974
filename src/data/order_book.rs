use std::cmp::Ordering;
use crate::data::types::{Order, OrderSide};

#[derive(Debug, Clone, PartialEq)]
pub struct BookRow {
    pub side: OrderSide,
    pub price: f64,
    pub amount: f64,
    /// Depth bar width in percent of the largest row on either side.
    pub bar_width: f64,
}

impl BookRow {
    /// Notional value, absent when price or amount is zero.
    pub fn total(&self) -> Option<f64> {
        if self.price != 0.0 && self.amount != 0.0 {
            Some(self.price * self.amount)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CenterLine {
    Spread(f64),
    NoBids,
    NoAsks,
    NoOrders,
}

impl std::fmt::Display for CenterLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CenterLine::Spread(spread) => write!(f, "Spread: {:.4}", spread),
            CenterLine::NoBids => write!(f, "No bids"),
            CenterLine::NoAsks => write!(f, "No asks"),
            CenterLine::NoOrders => write!(f, "No orders"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookView {
    pub outcome: usize,
    /// Best (lowest) ask first.
    pub asks: Vec<BookRow>,
    /// Best (highest) bid first.
    pub bids: Vec<BookRow>,
    pub center: CenterLine,
}

impl OrderBookView {
    /// Filter the flat book to one outcome and lay it out for display.
    pub fn build(orders: &[Order], outcome: usize) -> Self {
        let mut asks: Vec<&Order> = orders
            .iter()
            .filter(|o| o.outcome_id == outcome && o.side == OrderSide::Ask)
            .collect();
        let mut bids: Vec<&Order> = orders
            .iter()
            .filter(|o| o.outcome_id == outcome && o.side == OrderSide::Bid)
            .collect();

        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));
        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));

        let max_amount = asks
            .iter()
            .chain(bids.iter())
            .map(|o| o.amount)
            .fold(1.0_f64, f64::max);

        let center = match (asks.first(), bids.first()) {
            (Some(ask), Some(bid)) => CenterLine::Spread(ask.price - bid.price),
            (Some(_), None) => CenterLine::NoBids,
            (None, Some(_)) => CenterLine::NoAsks,
            (None, None) => CenterLine::NoOrders,
        };

        Self {
            outcome,
            asks: rows(&asks, max_amount),
            bids: rows(&bids, max_amount),
            center,
        }
    }
}

fn rows(orders: &[&Order], max_amount: f64) -> Vec<BookRow> {
    orders
        .iter()
        .map(|o| BookRow {
            side: o.side,
            price: o.price,
            amount: o.amount,
            bar_width: (100.0 * o.amount / max_amount).max(0.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(outcome_id: usize, side: OrderSide, price: f64, amount: f64) -> Order {
        Order { outcome_id, side, price, amount }
    }

    fn sample_book() -> Vec<Order> {
        vec![
            order(0, OrderSide::Ask, 0.70, 5.0),
            order(0, OrderSide::Bid, 0.55, 8.0),
            order(0, OrderSide::Ask, 0.62, 20.0),
            order(1, OrderSide::Ask, 0.30, 500.0),
            order(0, OrderSide::Bid, 0.58, 2.0),
            order(0, OrderSide::Ask, 0.65, 10.0),
        ]
    }

    #[test]
    fn test_sides_sorted_best_first() {
        let view = OrderBookView::build(&sample_book(), 0);

        let ask_prices: Vec<f64> = view.asks.iter().map(|r| r.price).collect();
        let bid_prices: Vec<f64> = view.bids.iter().map(|r| r.price).collect();
        assert_eq!(ask_prices, vec![0.62, 0.65, 0.70]);
        assert_eq!(bid_prices, vec![0.58, 0.55]);
    }

    #[test]
    fn test_bar_widths_relative_to_outcome_max() {
        let view = OrderBookView::build(&sample_book(), 0);

        for row in view.asks.iter().chain(view.bids.iter()) {
            assert!((0.0..=100.0).contains(&row.bar_width));
        }
        // Outcome 1's 500-lot ask must not shrink outcome 0's bars
        assert_eq!(view.asks[0].bar_width, 100.0);
        assert_eq!(view.asks[1].bar_width, 50.0);
        assert_eq!(view.bids[1].bar_width, 40.0);
    }

    #[test]
    fn test_small_amounts_use_floor_of_one() {
        let book = vec![order(0, OrderSide::Ask, 0.5, 0.25)];
        let view = OrderBookView::build(&book, 0);

        assert_eq!(view.asks[0].bar_width, 25.0);
    }

    #[test]
    fn test_spread_formatting() {
        let book = vec![
            order(0, OrderSide::Ask, 0.62, 1.0),
            order(0, OrderSide::Bid, 0.58, 1.0),
        ];
        let view = OrderBookView::build(&book, 0);

        assert_eq!(view.center.to_string(), "Spread: 0.0400");
    }

    #[test]
    fn test_missing_sides() {
        let book = sample_book();

        assert_eq!(OrderBookView::build(&book, 1).center, CenterLine::NoBids);
        assert_eq!(OrderBookView::build(&book, 2).center, CenterLine::NoOrders);

        let bids_only = vec![order(3, OrderSide::Bid, 0.4, 1.0)];
        assert_eq!(OrderBookView::build(&bids_only, 3).center.to_string(), "No asks");
    }

    #[test]
    fn test_row_total() {
        let view = OrderBookView::build(&sample_book(), 0);

        assert!((view.asks[0].total().unwrap() - 12.4).abs() < 1e-9);
        let zero = BookRow { side: OrderSide::Bid, price: 0.0, amount: 3.0, bar_width: 0.0 };
        assert_eq!(zero.total(), None);
    }
}
