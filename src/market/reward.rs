use crate::market::MarketFrame;

/// Scores holding a position over one bar
pub trait RewardFunction {
    fn reward(&self, frame: &MarketFrame, idx: usize, position: f32, prev_position: f32) -> f32;
}

/// Directional return net of trading cost and a volatility-scaled risk penalty:
/// `position·return − cost·|position − prev| − risk_aversion·|position|·volatility`.
///
/// Bars without a volatility value use `default_volatility`. The last bar of
/// a frame has no next price and scores zero.
#[derive(Clone, Copy, Debug)]
pub struct PositionReward {
    pub transaction_cost: f32,
    pub risk_aversion: f32,
    pub default_volatility: f32,
}

impl Default for PositionReward {
    fn default() -> Self {
        PositionReward {
            transaction_cost: 0.001,
            risk_aversion: 0.5,
            default_volatility: 0.01,
        }
    }
}

impl RewardFunction for PositionReward {
    fn reward(&self, frame: &MarketFrame, idx: usize, position: f32, prev_position: f32) -> f32 {
        let Some(price_return) = frame.price_return(idx) else {
            return 0.0;
        };
        let volatility = frame.volatility(idx).unwrap_or(self.default_volatility);

        position * price_return
            - self.transaction_cost * (position - prev_position).abs()
            - self.risk_aversion * position.abs() * volatility
    }
}
