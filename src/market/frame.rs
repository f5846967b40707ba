use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SacError};
use crate::types::RegimeId;

/// Aligned per-bar market columns.
///
/// Row `i` of `features` describes bar `i`; `close` and the regime labels are
/// indexed the same way.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketFrame {
    features: Array2<f32>,
    close: Array1<f32>,
    volatility: Option<Array1<f32>>,
    regimes: Vec<RegimeId>,
}

impl MarketFrame {
    pub fn new(features: Array2<f32>, close: Array1<f32>, regimes: Vec<RegimeId>) -> Result<Self> {
        let rows = features.nrows();
        if close.len() != rows || regimes.len() != rows {
            return Err(SacError::dimension_mismatch(
                format!("{} rows in every column", rows),
                format!("{} close prices and {} regime labels", close.len(), regimes.len()),
            ));
        }
        if close.iter().any(|&p| !(p.is_finite() && p > 0.0)) {
            return Err(SacError::invalid_parameter("close", "prices must be finite and positive"));
        }
        Ok(MarketFrame { features, close, volatility: None, regimes })
    }

    /// Attach a per-bar volatility column used by risk penalties
    pub fn with_volatility(mut self, volatility: Array1<f32>) -> Result<Self> {
        if volatility.len() != self.len() {
            return Err(SacError::dimension_mismatch(
                format!("{} volatility values", self.len()),
                format!("{} volatility values", volatility.len()),
            ));
        }
        self.volatility = Some(volatility);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<f32> {
        self.features.view()
    }

    pub fn close(&self, idx: usize) -> Option<f32> {
        self.close.get(idx).copied()
    }

    pub fn volatility(&self, idx: usize) -> Option<f32> {
        self.volatility.as_ref().and_then(|v| v.get(idx).copied())
    }

    pub fn regime_label(&self, idx: usize) -> Option<RegimeId> {
        self.regimes.get(idx).copied()
    }

    /// Simple return from bar `idx` to bar `idx + 1`; `None` at the last bar
    pub fn price_return(&self, idx: usize) -> Option<f32> {
        let current = self.close(idx)?;
        let next = self.close(idx + 1)?;
        Some((next - current) / current)
    }
}
