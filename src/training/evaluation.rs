use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithms::ProgressiveSac;
use crate::error::{Result, SacError};
use crate::market::{MarketFrame, RegimeClassifier, StateEncoder};
use crate::metrics::EvalMetric;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub episodes: usize,
    /// Bars per evaluation episode
    pub horizon: usize,
    pub metric: EvalMetric,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig { episodes: 5, horizon: 100, metric: EvalMetric::SharpeRatio }
    }
}

/// Score the deterministic policy on `frame`.
///
/// Runs `episodes` windows of up to `horizon` bars from random starts,
/// collecting `position · price_return` per bar, and scores the pooled series
/// with `config.metric`. The policy is switched to evaluation mode for the
/// run and put back in its previous mode afterwards, also on error.
pub fn evaluate_agent<E, C>(
    agent: &mut ProgressiveSac,
    frame: &MarketFrame,
    encoder: &E,
    classifier: &C,
    config: &EvaluationConfig,
) -> Result<f32>
where
    E: StateEncoder + ?Sized,
    C: RegimeClassifier + ?Sized,
{
    let was_training = agent.policy().is_training();
    agent.set_training(false);
    let returns = position_returns(agent, frame, encoder, classifier, config);
    agent.set_training(was_training);

    let returns = returns?;
    let score = config.metric.score(&returns);
    debug!(metric = ?config.metric, score, bars = returns.len(), "Evaluation finished");
    Ok(score)
}

fn position_returns<E, C>(
    agent: &mut ProgressiveSac,
    frame: &MarketFrame,
    encoder: &E,
    classifier: &C,
    config: &EvaluationConfig,
) -> Result<Vec<f32>>
where
    E: StateEncoder + ?Sized,
    C: RegimeClassifier + ?Sized,
{
    let warmup = encoder.warmup();
    if frame.len() < warmup + 2 {
        return Err(SacError::InsufficientData { required: warmup + 2, available: frame.len() });
    }
    let last_start = frame.len().saturating_sub(config.horizon);

    let mut returns = Vec::with_capacity(config.episodes * config.horizon);
    for _ in 0..config.episodes {
        let start = if last_start > warmup {
            agent.rng_mut().gen_range(warmup..last_start)
        } else {
            warmup
        };

        for idx in start..(start + config.horizon).min(frame.len() - 1) {
            let regime = classifier.classify(frame, idx);
            let state = encoder.encode(frame, idx)?;
            let action = agent.select_action(state.view(), true, Some(regime))?;
            let position = action.first().copied().unwrap_or(0.0);
            if let Some(price_return) = frame.price_return(idx) {
                returns.push(position * price_return);
            }
        }
    }
    Ok(returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::ProgressiveSacBuilder;
    use crate::market::{LabelledRegimes, LookbackEncoder};
    use ndarray::{Array1, Array2};

    fn frame(n: usize) -> MarketFrame {
        let close = Array1::from_shape_fn(n, |i| 100.0 + (i as f32 * 0.3).sin());
        let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * (j + 1)) as f32 * 0.01);
        let regimes = (0..n).map(|i| (i / 10 % 3) as i32 + 1).collect();
        MarketFrame::new(features, close, regimes).unwrap()
    }

    #[test]
    fn test_evaluation_restores_mode() {
        let encoder = LookbackEncoder::new(3);
        let mut agent = ProgressiveSacBuilder::new(6, 1).hidden_dims(vec![8, 8]).seed(5).build().unwrap();
        let config = EvaluationConfig { episodes: 2, horizon: 20, metric: EvalMetric::Return };

        let score = evaluate_agent(&mut agent, &frame(60), &encoder, &LabelledRegimes::default(), &config).unwrap();
        assert!(score.is_finite());
        assert!(agent.policy().is_training());
        assert_eq!(agent.total_steps(), 0);
    }

    #[test]
    fn test_evaluation_restores_mode_on_error() {
        // encoder produces 4 features, agent expects 6
        let encoder = LookbackEncoder::new(2);
        let mut agent = ProgressiveSacBuilder::new(6, 1).hidden_dims(vec![8, 8]).seed(5).build().unwrap();
        let result = evaluate_agent(
            &mut agent,
            &frame(60),
            &encoder,
            &LabelledRegimes::default(),
            &EvaluationConfig::default(),
        );
        assert!(matches!(result, Err(SacError::DimensionMismatch { .. })));
        assert!(agent.policy().is_training());
    }

    #[test]
    fn test_short_frame_rejected() {
        let encoder = LookbackEncoder::new(10);
        let mut agent = ProgressiveSacBuilder::new(20, 1).hidden_dims(vec![8, 8]).build().unwrap();
        let result = evaluate_agent(
            &mut agent,
            &frame(5),
            &encoder,
            &LabelledRegimes::default(),
            &EvaluationConfig::default(),
        );
        assert!(matches!(result, Err(SacError::InsufficientData { required: 12, available: 5 })));
    }
}
