use std::fmt::Write;
use crate::data::order_book::BookRow;
use crate::view::model::{
    BettingInterface, ChartKind, ChartSpec, ChartView, HistoryView, OrderBookPanel, PageView,
};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const BAR_CELLS: usize = 20;

/// Plain-text rendering of a page for the terminal.
pub fn render_page(page: &PageView) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{} [{}]", page.header.title, page.header.category);
    let _ = write!(out, "Volume: {}   Wallet: {}", page.header.volume, page.wallet.button);
    if let Some(balance) = &page.wallet.balance {
        let _ = write!(out, " ({} SOL)", balance);
    }
    let _ = writeln!(out);

    let _ = write!(out, "{}", page.headline.chance);
    if let Some(change) = &page.headline.change {
        let _ = write!(out, "  {}", change);
    }
    let _ = writeln!(out, "\n");

    let _ = writeln!(out, "Outcomes");
    for card in &page.outcomes {
        let _ = writeln!(out, "  {:>7}  {:<24} {}", card.percentage, card.name, card.volume);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Options");
    for row in &page.options {
        let marker = if row.selected { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{} [{}] {:<24} {:>7}  {:<24} {}",
            marker, row.index, row.name, row.percentage, row.odds, row.volume
        );
    }
    let _ = writeln!(out);

    render_chart(&mut out, "Probability", &page.price_chart);
    render_chart(&mut out, "Volume", &page.volume_chart);
    render_order_book(&mut out, &page.order_book);
    if let Some(history) = &page.history {
        render_history(&mut out, history);
    }
    render_betting(&mut out, &page.betting, &page.potential_return);

    out
}

fn render_chart(out: &mut String, title: &str, chart: &ChartView) {
    match chart {
        ChartView::Disabled => {}
        ChartView::Placeholder(text) => {
            let _ = writeln!(out, "{}: {}\n", title, text);
        }
        ChartView::Chart(spec) => {
            let _ = writeln!(out, "{} ({} points)", title, spec.labels.len());
            render_series(out, spec);
            let _ = writeln!(out);
        }
    }
}

fn render_series(out: &mut String, spec: &ChartSpec) {
    let (min, max) = spec.y_range.unwrap_or_else(|| {
        let max = spec
            .datasets
            .iter()
            .flat_map(|d| d.data.iter().copied())
            .fold(0.0_f64, f64::max);
        (0.0, max)
    });

    for dataset in &spec.datasets {
        let last = dataset.data.last().copied().unwrap_or(0.0);
        let suffix = match spec.kind {
            ChartKind::Line => format!("{:.1}%", last),
            ChartKind::Bar => format!("{:.3}", last),
        };
        let _ = writeln!(
            out,
            "  {:<24} {} {}",
            dataset.label,
            sparkline(&dataset.data, min, max),
            suffix
        );
    }
}

pub fn sparkline(data: &[f64], min: f64, max: f64) -> String {
    let span = max - min;
    data.iter()
        .map(|v| {
            if span <= 0.0 {
                return SPARK[0];
            }
            let ratio = ((v - min) / span).clamp(0.0, 1.0);
            SPARK[(ratio * (SPARK.len() - 1) as f64).round() as usize]
        })
        .collect()
}

fn render_order_book(out: &mut String, panel: &OrderBookPanel) {
    let tabs: Vec<String> = panel
        .tabs
        .iter()
        .map(|t| if t.active { format!("[{}]", t.name) } else { t.name.clone() })
        .collect();
    let _ = writeln!(out, "Order book: {}", tabs.join(" | "));

    if let Some(book) = &panel.book {
        // Asks print worst-first so the best prices meet at the center line
        for row in book.asks.iter().rev() {
            render_book_row(out, "ask", row);
        }
        let _ = writeln!(out, "  --- {} ---", book.center);
        for row in &book.bids {
            render_book_row(out, "bid", row);
        }
    }
    let _ = writeln!(out);
}

fn render_book_row(out: &mut String, side: &str, row: &BookRow) {
    let cells = ((row.bar_width / 100.0) * BAR_CELLS as f64).round() as usize;
    let total = row.total().map(|t| format!("{:.2}", t)).unwrap_or_default();
    let _ = writeln!(
        out,
        "  {} {:>8.4} {:>10} {:>10} {}",
        side,
        row.price,
        row.amount,
        total,
        "#".repeat(cells.min(BAR_CELLS))
    );
}

fn render_history(out: &mut String, history: &HistoryView) {
    let _ = writeln!(out, "{}", history.title);
    for entry in &history.entries {
        let _ = write!(
            out,
            "  {:<24} {:<24} {:>12}  {}",
            entry.option_name, entry.time, entry.amount, entry.bettor
        );
        if let Some(link) = &entry.explorer_link {
            let _ = write!(out, "  {}", link);
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(out);
}

fn render_betting(out: &mut String, betting: &BettingInterface, potential_return: &str) {
    if let Some(warning) = &betting.warning {
        let _ = writeln!(out, "! {}", warning);
    }
    let _ = writeln!(
        out,
        "Bet: {}  Potential return: {}",
        if betting.submit_enabled { "ready" } else { "disabled" },
        potential_return
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::order_book::{CenterLine, OrderBookView};
    use crate::data::types::OrderSide;
    use crate::view::model::{OrderBookTab, CHART_COLORS};

    #[test]
    fn test_sparkline_scales_to_range() {
        assert_eq!(sparkline(&[0.0, 50.0, 100.0], 0.0, 100.0), "▁▅█");
        assert_eq!(sparkline(&[3.0, 3.0], 0.0, 0.0), "▁▁");
        assert_eq!(sparkline(&[], 0.0, 100.0), "");
    }

    #[test]
    fn test_order_book_center_between_sides() {
        let row = |side, price, amount, bar_width| BookRow { side, price, amount, bar_width };
        let panel = OrderBookPanel {
            tabs: vec![OrderBookTab { index: 0, name: "Yes".to_string(), color: CHART_COLORS[0], active: true }],
            book: Some(OrderBookView {
                outcome: 0,
                asks: vec![row(OrderSide::Ask, 0.62, 10.0, 100.0), row(OrderSide::Ask, 0.70, 5.0, 50.0)],
                bids: vec![row(OrderSide::Bid, 0.58, 2.0, 20.0)],
                center: CenterLine::Spread(0.04),
            }),
        };

        let mut out = String::new();
        render_order_book(&mut out, &panel);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "Order book: [Yes]");
        assert!(lines[1].contains("0.7000"));
        assert!(lines[2].contains("0.6200"));
        assert!(lines[2].ends_with(&"#".repeat(20)));
        assert_eq!(lines[3], "  --- Spread: 0.0400 ---");
        assert!(lines[4].starts_with("  bid"));
    }
}
