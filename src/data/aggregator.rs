use chrono::{DateTime, Utc};
use tracing::warn;
use crate::data::types::Bet;

pub const START_LABEL: &str = "Start";

/// Probability and volume history derived from a market's bets.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// One label per step; the first is `Start` whenever there are bets.
    pub labels: Vec<String>,
    /// `probabilities[option][step]` in percent.
    pub probabilities: Vec<Vec<f64>>,
    /// Size of the bet that produced each step (0 for `Start`).
    pub step_volumes: Vec<f64>,
    pub option_volumes: Vec<f64>,
    pub total_volume: f64,
}

impl Aggregate {
    fn empty(option_count: usize) -> Self {
        Self {
            labels: Vec::new(),
            probabilities: vec![Vec::new(); option_count],
            step_volumes: Vec::new(),
            option_volumes: vec![0.0; option_count],
            total_volume: 0.0,
        }
    }

    pub fn has_history(&self) -> bool {
        !self.labels.is_empty()
    }

    /// Share of total volume per option in percent, equal split without volume.
    pub fn final_shares(&self) -> Vec<f64> {
        shares(&self.option_volumes, self.total_volume)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leader {
    pub index: usize,
    pub share: f64,
}

pub fn equal_split(option_count: usize) -> f64 {
    if option_count == 0 {
        0.0
    } else {
        100.0 / option_count as f64
    }
}

fn shares(volumes: &[f64], total: f64) -> Vec<f64> {
    let fallback = equal_split(volumes.len());
    volumes
        .iter()
        .map(|v| if total > 0.0 { v / total * 100.0 } else { fallback })
        .collect()
}

/// Replay bets in time order, producing one step per bet after a synthetic
/// equal-split `Start` step.
pub fn aggregate(bets: &[Bet], option_count: usize) -> Aggregate {
    let mut sorted: Vec<&Bet> = bets
        .iter()
        .filter(|bet| {
            let in_range = bet.option_id < option_count;
            if !in_range {
                warn!(
                    "Ignoring bet on unknown option {} ({} options)",
                    bet.option_id, option_count
                );
            }
            in_range
        })
        .collect();

    if sorted.is_empty() {
        return Aggregate::empty(option_count);
    }

    // Stable: bets sharing a timestamp keep arrival order
    sorted.sort_by_key(|bet| bet.created_at);

    let initial = equal_split(option_count);
    let mut result = Aggregate::empty(option_count);

    result.labels.push(START_LABEL.to_string());
    for series in result.probabilities.iter_mut() {
        series.push(initial);
    }
    result.step_volumes.push(0.0);

    for bet in sorted {
        result.option_volumes[bet.option_id] += bet.amount;
        result.total_volume += bet.amount;

        result.labels.push(format_step_label(&bet.created_at));
        let step = shares(&result.option_volumes, result.total_volume);
        for (series, pct) in result.probabilities.iter_mut().zip(step) {
            series.push(pct);
        }
        result.step_volumes.push(bet.amount);
    }

    result
}

/// Option with the highest final share; ties keep the earliest option.
pub fn leading_option(aggregate: &Aggregate) -> Option<Leader> {
    if aggregate.total_volume <= 0.0 {
        return None;
    }

    let mut leader: Option<Leader> = None;
    for (index, share) in aggregate.final_shares().into_iter().enumerate() {
        match leader {
            Some(best) if share <= best.share => {}
            _ => leader = Some(Leader { index, share }),
        }
    }
    leader
}

pub fn format_step_label(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %I:%M %p").to_string()
}
