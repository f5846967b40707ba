use crate::market::MarketFrame;
use crate::types::RegimeId;

/// Assigns a regime to a bar of a [`MarketFrame`]
pub trait RegimeClassifier {
    fn classify(&self, frame: &MarketFrame, idx: usize) -> RegimeId;
}

/// Reads the regime label stored with each bar.
///
/// Bars outside the frame map to `fallback`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LabelledRegimes {
    pub fallback: RegimeId,
}

impl RegimeClassifier for LabelledRegimes {
    fn classify(&self, frame: &MarketFrame, idx: usize) -> RegimeId {
        frame.regime_label(idx).unwrap_or(self.fallback)
    }
}
