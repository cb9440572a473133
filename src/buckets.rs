use serde::Serialize;

/// Quartile cut points of a set of weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WeightThresholds {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum WeightBucket {
    Low,
    Medium,
    MedHigh,
    High,
}

impl WeightThresholds {
    /// Non-finite weights are ignored. No weights gives all-zero thresholds,
    /// which puts every feature in the top bucket.
    pub fn from_weights(weights: &[f64]) -> Self {
        let mut sorted: Vec<f64> = weights.iter().copied().filter(|w| w.is_finite()).collect();
        if sorted.is_empty() {
            return WeightThresholds::default();
        }
        sorted.sort_by(f64::total_cmp);
        WeightThresholds {
            p25: percentile(&sorted, 0.25),
            p50: percentile(&sorted, 0.50),
            p75: percentile(&sorted, 0.75),
        }
    }

    pub fn bucket(&self, weight: f64) -> WeightBucket {
        if weight >= self.p75 {
            WeightBucket::High
        } else if weight >= self.p50 {
            WeightBucket::MedHigh
        } else if weight >= self.p25 {
            WeightBucket::Medium
        } else {
            WeightBucket::Low
        }
    }
}

impl WeightBucket {
    pub const ALL: [WeightBucket; 4] = [
        WeightBucket::High,
        WeightBucket::MedHigh,
        WeightBucket::Medium,
        WeightBucket::Low,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WeightBucket::High => "high",
            WeightBucket::MedHigh => "med-high",
            WeightBucket::Medium => "medium",
            WeightBucket::Low => "low",
        }
    }
}

// linear interpolation between the closest ranks
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
