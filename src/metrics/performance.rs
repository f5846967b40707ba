//! Risk-adjusted scores over a series of per-step position returns.
//!
//! Ratios are annualized with `√252` and treat the series as daily returns.

use serde::{Deserialize, Serialize};

use super::statistics::Statistics;

/// Periods per year used for annualization
pub const TRADING_DAYS: f32 = 252.0;

const RATIO_EPSILON: f32 = 1e-8;

/// Score used to judge an evaluation run; higher is always better
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMetric {
    Return,
    #[default]
    SharpeRatio,
    SortinoRatio,
    MaxDrawdown,
}

impl EvalMetric {
    pub fn score(&self, returns: &[f32]) -> f32 {
        match self {
            EvalMetric::Return => total_return(returns),
            EvalMetric::SharpeRatio => sharpe_ratio(returns),
            EvalMetric::SortinoRatio => sortino_ratio(returns),
            EvalMetric::MaxDrawdown => max_drawdown(returns),
        }
    }
}

pub fn total_return(returns: &[f32]) -> f32 {
    returns.iter().sum()
}

/// `mean / (std + 1e-8) · √252`; zero for an empty series
pub fn sharpe_ratio(returns: &[f32]) -> f32 {
    if returns.is_empty() {
        return 0.0;
    }
    let stats = Statistics::from_slice(returns);
    stats.mean / (stats.std + RATIO_EPSILON) * TRADING_DAYS.sqrt()
}

/// Like [`sharpe_ratio`] but only downside deviation counts as risk.
///
/// Without any negative return the deviation is taken as `1e-8`.
pub fn sortino_ratio(returns: &[f32]) -> f32 {
    if returns.is_empty() {
        return 0.0;
    }
    let mean = Statistics::from_slice(returns).mean;
    let downside: Vec<f32> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let downside_std = if downside.is_empty() {
        RATIO_EPSILON
    } else {
        Statistics::from_slice(&downside).std
    };
    mean / downside_std * TRADING_DAYS.sqrt()
}

/// Largest relative fall of the cumulative return from its running peak,
/// negated.
pub fn max_drawdown(returns: &[f32]) -> f32 {
    let mut cumulative = 0.0f32;
    let mut peak: Option<f32> = None;
    let mut worst = 0.0f32;
    for &r in returns {
        cumulative += r;
        let p = peak.map_or(cumulative, |p| p.max(cumulative));
        peak = Some(p);
        worst = worst.max((p - cumulative) / (p + RATIO_EPSILON));
    }
    -worst
}
