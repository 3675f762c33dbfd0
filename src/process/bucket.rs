use anyhow::{bail, Result};
use std::fmt;

/// Boundaries for `apps_bought_bucket`.
pub const APPS_BOUGHT_BOUNDARIES: [f64; 6] = [0.0, 20.0, 40.0, 60.0, 80.0, 100.0];

/// Boundaries for `money_spent_bucket`.
pub const MONEY_SPENT_BOUNDARIES: [f64; 11] = [
    0.0, 50.0, 100.0, 150.0, 200.0, 250.0, 300.0, 350.0, 400.0, 450.0, 500.0,
];

/// Where a value landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bucket {
    /// `[lower, upper)`, or `[lower, upper]` for the top interval.
    Within { lower: f64, upper: f64 },
    OutOfRange,
}

impl Bucket {
    pub fn label(&self) -> Option<String> {
        match *self {
            Bucket::Within { lower, upper } => Some(interval_label(lower, upper)),
            Bucket::OutOfRange => None,
        }
    }
}

/// `[lower-upper]`. Whole numbers render without a trailing `.0`.
pub fn interval_label(lower: f64, upper: f64) -> String {
    format!("[{}-{}]", lower, upper)
}

/// Maps numbers onto labelled intervals of an ascending boundary list.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucketizer {
    boundaries: Vec<f64>,
}

impl Bucketizer {
    pub fn new(boundaries: impl Into<Vec<f64>>) -> Result<Self> {
        let boundaries = boundaries.into();
        if boundaries.len() < 2 {
            bail!("need at least two bucket boundaries, got {}", boundaries.len());
        }
        if boundaries.iter().any(|b| !b.is_finite()) {
            bail!("bucket boundaries must be finite: {:?}", boundaries);
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            bail!("bucket boundaries must be strictly increasing: {:?}", boundaries);
        }
        Ok(Self { boundaries })
    }

    pub fn apps_bought() -> Self {
        Self {
            boundaries: APPS_BOUGHT_BOUNDARIES.to_vec(),
        }
    }

    pub fn money_spent() -> Self {
        Self {
            boundaries: MONEY_SPENT_BOUNDARIES.to_vec(),
        }
    }

    pub fn min(&self) -> f64 {
        self.boundaries[0]
    }

    pub fn max(&self) -> f64 {
        self.boundaries[self.boundaries.len() - 1]
    }

    /// Explicit range check first; NaN and anything outside
    /// `[min, max]` is `OutOfRange`.
    pub fn bucket(&self, value: f64) -> Bucket {
        if value.is_nan() || value < self.min() || value > self.max() {
            return Bucket::OutOfRange;
        }
        // number of boundaries <= value; at least 1 here
        let idx = self.boundaries.partition_point(|b| *b <= value);
        let upper_idx = idx.min(self.boundaries.len() - 1);
        Bucket::Within {
            lower: self.boundaries[upper_idx - 1],
            upper: self.boundaries[upper_idx],
        }
    }

    /// Like [`bucket`](Self::bucket), but pins out-of-range values into the
    /// first or last interval. NaN stays out of range.
    pub fn clamped(&self, value: f64) -> Bucket {
        if value.is_nan() {
            Bucket::OutOfRange
        } else {
            self.bucket(value.clamp(self.min(), self.max()))
        }
    }

    /// Every label this bucketizer can produce, lowest first.
    pub fn labels(&self) -> Vec<String> {
        self.boundaries
            .windows(2)
            .map(|w| interval_label(w[0], w[1]))
            .collect()
    }
}

impl fmt::Display for Bucketizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels().join(" "))
    }
}
