//! Token cost accounting

use super::types::TokenUsage;
use serde::{Deserialize, Serialize};

/// USD per million tokens; an unpriced backend costs nothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Pricing {
    #[cfg(test)]
    pub(crate) fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn is_free(&self) -> bool {
        self.input_per_million == 0.0 && self.output_per_million == 0.0
    }

    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (usage.output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

/// Running total of tokens and spend across backend calls
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CostTracker {
    pub usage: TokenUsage,
    pub cost_usd: f64,
    pub calls: u32,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call; calls without reported usage still count
    pub fn record(&mut self, usage: Option<TokenUsage>, pricing: &Pricing) {
        self.calls += 1;
        if let Some(usage) = usage {
            self.usage += usage;
            self.cost_usd += pricing.cost(&usage);
        }
    }

    pub fn merge(&mut self, other: &CostTracker) {
        self.usage += other.usage;
        self.cost_usd += other.cost_usd;
        self.calls += other.calls;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_cost_flash_pricing() {
        let pricing = Pricing::new(0.30, 2.50);
        let usage = TokenUsage::new(1_000_000, 100_000);
        assert!(approx(pricing.cost(&usage), 0.30 + 0.25));
    }

    #[test]
    fn test_unpriced_is_free() {
        let pricing = Pricing::default();
        assert!(pricing.is_free());
        assert!(approx(pricing.cost(&TokenUsage::new(5000, 5000)), 0.0));
    }

    #[test]
    fn test_partial_pricing_table() {
        let pricing: Pricing = toml::from_str("input_per_million = 1.25").unwrap();
        assert_eq!(pricing, Pricing::new(1.25, 0.0));
    }

    #[test]
    fn test_tracker_record_and_merge() {
        let pricing = Pricing::new(1.0, 2.0);
        let mut a = CostTracker::new();
        a.record(Some(TokenUsage::new(500_000, 500_000)), &pricing);
        a.record(None, &pricing);
        assert_eq!(a.calls, 2);
        assert_eq!(a.usage.total(), 1_000_000);
        assert!(approx(a.cost_usd, 1.5));

        let mut total = CostTracker::new();
        total.merge(&a);
        total.merge(&a);
        assert_eq!(total.calls, 4);
        assert!(approx(total.cost_usd, 3.0));
    }
}
