//! Train on a synthetic market with three volatility regimes and print the
//! training report.
//!
//! Run with `RUST_LOG=info cargo run --example synthetic_training`.

use ndarray::{Array1, Array2};
use progressive_sac::algorithms::ProgressiveSacBuilder;
use progressive_sac::market::{LabelledRegimes, LookbackEncoder, MarketFrame, PositionReward};
use progressive_sac::metrics::EvalMetric;
use progressive_sac::training::{EvaluationConfig, Trainer, TrainerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use tracing_subscriber::EnvFilter;

const BARS: usize = 1_500;
const LOOKBACK: usize = 10;

/// Random walk whose volatility switches between calm, choppy and wild blocks
fn synthetic_market(rng: &mut StdRng) -> Result<MarketFrame, Box<dyn std::error::Error>> {
    let mut close = Vec::with_capacity(BARS);
    let mut volatility = Vec::with_capacity(BARS);
    let mut regimes = Vec::with_capacity(BARS);
    let mut price = 100.0f32;

    for i in 0..BARS {
        let regime = (i / 100 % 3) as i32 + 1;
        let sigma = 0.005 * regime as f32;
        let drift = if regime == 1 { 0.0005 } else { 0.0 };
        price *= 1.0 + drift + rng.sample(Normal::new(0.0f32, sigma)?);
        close.push(price);
        volatility.push(sigma);
        regimes.push(regime);
    }

    let close = Array1::from_vec(close);
    let features = Array2::from_shape_fn((BARS, 3), |(i, j)| match j {
        0 => if i == 0 { 0.0 } else { close[i] / close[i - 1] - 1.0 },
        1 => volatility[i],
        _ => close[i] / close[i.saturating_sub(20)] - 1.0,
    });

    Ok(MarketFrame::new(features, close, regimes)?.with_volatility(Array1::from_vec(volatility))?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut rng = StdRng::seed_from_u64(2024);
    let frame = synthetic_market(&mut rng)?;
    let encoder = LookbackEncoder::new(LOOKBACK);

    let mut agent = ProgressiveSacBuilder::new(LOOKBACK * frame.num_features(), 1)
        .hidden_dims(vec![64, 64])
        .batch_size(64)
        .buffer_capacity(50_000)
        .start_steps(1_000)
        .update_schedule(500, 50, 50)
        .seed(7)
        .build()?;

    let config = TrainerConfig {
        episodes: 60,
        max_steps: Some(250),
        eval_interval: 10,
        evaluation: EvaluationConfig { metric: EvalMetric::SharpeRatio, ..EvaluationConfig::default() },
        checkpoint_dir: Some(std::env::temp_dir().join("progressive_sac_demo")),
        ..TrainerConfig::default()
    };
    let mut trainer = Trainer::new(config, encoder, LabelledRegimes::default(), PositionReward::default());

    let report = trainer.train(&mut agent, &frame)?;
    println!("{}", report.plot(60, 12));
    println!("{}", report.to_json()?);
    Ok(())
}
