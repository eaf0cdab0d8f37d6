//! Fundamentals blacklist and signal classification.
//!
//! The blacklist runs first and short-circuits. Everything else is an
//! ordered rule table where the first matching rule wins and `Neutral` is
//! the fallback. Rules 1-3 split on close vs. MA and cannot overlap; the
//! capital-flight rule only sees rows none of them matched.

use flow_core::{BlacklistReason, ClassifierConfig, Instrument, Signal};
use flow_features::{FlowMetrics, SnapshotRow};

/// Fields the rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierInput {
    pub close: f64,
    pub ma: f64,
    pub net_financing_buy: f64,
    pub foreign_inflow: f64,
    pub financing_surge_pct: f64,
}

impl ClassifierInput {
    pub fn new(row: &SnapshotRow, metrics: &FlowMetrics) -> Self {
        Self {
            close: row.close(),
            ma: row.ma,
            net_financing_buy: row.net_financing_buy(),
            foreign_inflow: row.foreign_inflow(),
            financing_surge_pct: metrics.financing_surge_pct,
        }
    }
}

/// One classification rule.
#[derive(Clone, Copy)]
pub struct Rule {
    pub signal: Signal,
    pub matches: fn(&ClassifierInput, &ClassifierConfig) -> bool,
}

fn strong_buy(i: &ClassifierInput, _: &ClassifierConfig) -> bool {
    i.close > i.ma && i.net_financing_buy > 0.0 && i.foreign_inflow > 0.0
}

fn watch(i: &ClassifierInput, _: &ClassifierConfig) -> bool {
    i.close < i.ma && (i.net_financing_buy > 0.0 || i.foreign_inflow > 0.0)
}

fn stop_loss(i: &ClassifierInput, _: &ClassifierConfig) -> bool {
    i.close < i.ma && (i.net_financing_buy < 0.0 || i.foreign_inflow < 0.0)
}

fn capital_flight(i: &ClassifierInput, c: &ClassifierConfig) -> bool {
    i.financing_surge_pct < c.capital_flight_threshold
}

fn uptrend(i: &ClassifierInput, _: &ClassifierConfig) -> bool {
    i.close > i.ma
}

/// Rules in priority order. Do not reorder.
pub const RULES: [Rule; 5] = [
    Rule {
        signal: Signal::StrongBuy,
        matches: strong_buy,
    },
    Rule {
        signal: Signal::Watch,
        matches: watch,
    },
    Rule {
        signal: Signal::StopLoss,
        matches: stop_loss,
    },
    Rule {
        signal: Signal::CapitalFlight,
        matches: capital_flight,
    },
    Rule {
        signal: Signal::Uptrend,
        matches: uptrend,
    },
];

/// Signal classifier.
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    config: ClassifierConfig,
}

impl SignalClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Fundamentals filter. A non-positive total market value is treated as
    /// unknown and passes.
    pub fn blacklist(&self, name: &str, total_mv: f64) -> Option<BlacklistReason> {
        let marker = &self.config.special_treatment_marker;
        if !marker.is_empty() && name.contains(marker.as_str()) {
            return Some(BlacklistReason::SpecialTreatment);
        }
        if total_mv > 0.0 && total_mv < self.config.min_total_mv {
            return Some(BlacklistReason::MicroCap);
        }
        None
    }

    /// Apply the rule table only.
    pub fn classify_flows(&self, input: &ClassifierInput) -> Signal {
        RULES
            .iter()
            .find(|rule| (rule.matches)(input, &self.config))
            .map_or(Signal::Neutral, |rule| rule.signal)
    }

    /// Blacklist, then rules.
    pub fn classify(&self, instrument: &Instrument, input: &ClassifierInput) -> Signal {
        match self.blacklist(&instrument.name, instrument.total_mv) {
            Some(reason) => Signal::Blacklisted(reason),
            None => self.classify_flows(input),
        }
    }
}

impl Default for SignalClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}
