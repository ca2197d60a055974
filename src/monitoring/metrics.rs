use prometheus::{IntCounter, Opts, Registry};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub refreshes: IntCounter,
    pub refreshes_skipped: IntCounter,
    pub bets_submitted: IntCounter,
    pub bets_failed: IntCounter,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Arc<Self> {
        let refreshes = counter("market_refreshes", "Completed market refreshes");
        let refreshes_skipped =
            counter("market_refreshes_skipped", "Refreshes skipped while one was in flight");
        let bets_submitted = counter("bets_submitted", "Bet transfers submitted");
        let bets_failed = counter("bets_failed", "Bet attempts aborted");
        registry.register(Box::new(refreshes.clone())).ok();
        registry.register(Box::new(refreshes_skipped.clone())).ok();
        registry.register(Box::new(bets_submitted.clone())).ok();
        registry.register(Box::new(bets_failed.clone())).ok();
        Arc::new(Self {
            refreshes,
            refreshes_skipped,
            bets_submitted,
            bets_failed,
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "refreshes={} skipped={} bets_submitted={} bets_failed={}",
            self.refreshes.get(),
            self.refreshes_skipped.get(),
            self.bets_submitted.get(),
            self.bets_failed.get()
        )
    }
}

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help)).expect("metric options are valid")
}
