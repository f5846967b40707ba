use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Statistics for a collection of values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f32,
    /// Population standard deviation
    pub std: f32,
    pub min: f32,
    pub max: f32,
    pub count: usize,
}

impl Statistics {
    /// Compute statistics from a slice of values
    pub fn from_slice(values: &[f32]) -> Self {
        if values.is_empty() {
            return Statistics {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                count: 0,
            };
        }

        let count = values.len();
        let sum: f32 = values.iter().sum();
        let mean = sum / count as f32;

        let variance = values.iter()
            .map(|&x| (x - mean).powi(2))
            .sum::<f32>() / count as f32;
        let std = variance.sqrt();

        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        Statistics {
            mean,
            std,
            min,
            max,
            count,
        }
    }

    /// Compute statistics from an array view
    pub fn from_array(array: ArrayView1<f32>) -> Self {
        let values: Vec<f32> = array.iter().copied().collect();
        Self::from_slice(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_population_std() {
        let stats = Statistics::from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.count, 4);
        assert!((stats.mean - 2.5).abs() < 1e-6);
        assert!((stats.std - 1.118034).abs() < 1e-5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
    }

    #[test]
    fn test_empty_and_strided() {
        assert_eq!(Statistics::from_slice(&[]).count, 0);

        let a = array![[1.0f32, 9.0], [3.0, 9.0]];
        let stats = Statistics::from_array(a.column(0));
        assert!((stats.mean - 2.0).abs() < 1e-6);
    }
}
