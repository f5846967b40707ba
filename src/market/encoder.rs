use ndarray::{s, Array1, Array2};

use crate::error::{Result, SacError};
use crate::market::MarketFrame;
use crate::metrics::Statistics;

/// Turns the history up to a bar into an agent state
pub trait StateEncoder {
    /// Length of the vectors produced for `frame`
    fn state_dim(&self, frame: &MarketFrame) -> usize;

    /// Bars needed before the first fully populated state
    fn warmup(&self) -> usize {
        0
    }

    fn encode(&self, frame: &MarketFrame, idx: usize) -> Result<Array1<f32>>;
}

/// Flattened window of the `lookback` bars strictly before `idx`.
///
/// Windows reaching past the start are zero-padded at the front. With
/// `normalize` the flattened window is z-scored.
#[derive(Clone, Copy, Debug)]
pub struct LookbackEncoder {
    pub lookback: usize,
    pub normalize: bool,
}

const NORMALIZE_EPSILON: f32 = 1e-8;

impl LookbackEncoder {
    pub fn new(lookback: usize) -> Self {
        LookbackEncoder { lookback, normalize: true }
    }
}

impl Default for LookbackEncoder {
    fn default() -> Self {
        Self::new(10)
    }
}

impl StateEncoder for LookbackEncoder {
    fn state_dim(&self, frame: &MarketFrame) -> usize {
        self.lookback * frame.num_features()
    }

    fn warmup(&self) -> usize {
        self.lookback
    }

    fn encode(&self, frame: &MarketFrame, idx: usize) -> Result<Array1<f32>> {
        if idx > frame.len() {
            return Err(SacError::invalid_parameter(
                "idx".to_string(),
                format!("{} is past the end of a {}-bar frame", idx, frame.len()),
            ));
        }

        let width = frame.num_features();
        let available = idx.min(self.lookback);
        let mut window = Array2::<f32>::zeros((self.lookback, width));
        window
            .slice_mut(s![self.lookback - available.., ..])
            .assign(&frame.features().slice(s![idx - available..idx, ..]));

        let mut state = Array1::from_iter(window.iter().copied());
        if self.normalize && !state.is_empty() {
            let stats = Statistics::from_array(state.view());
            state.mapv_inplace(|x| (x - stats.mean) / (stats.std + NORMALIZE_EPSILON));
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn frame() -> MarketFrame {
        MarketFrame::new(
            array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]],
            array![1.0, 1.0, 1.0, 1.0],
            vec![1; 4],
        )
        .unwrap()
    }

    #[test]
    fn test_raw_window_is_row_major() {
        let encoder = LookbackEncoder { lookback: 2, normalize: false };
        let state = encoder.encode(&frame(), 3).unwrap();
        assert_eq!(state, array![2.0f32, 20.0, 3.0, 30.0]);
        assert_eq!(encoder.state_dim(&frame()), 4);
    }

    #[test]
    fn test_front_padding() {
        let encoder = LookbackEncoder { lookback: 3, normalize: false };
        let state = encoder.encode(&frame(), 1).unwrap();
        assert_eq!(state, array![0.0f32, 0.0, 0.0, 0.0, 1.0, 10.0]);
        assert!(encoder.encode(&frame(), 0).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_normalized_window() {
        let encoder = LookbackEncoder::new(3);
        let state = encoder.encode(&frame(), 4).unwrap();
        let stats = Statistics::from_array(state.view());
        assert!(stats.mean.abs() < 1e-5);
        assert!((stats.std - 1.0).abs() < 1e-4);
        assert!(encoder.encode(&frame(), 5).is_err());
    }
}
