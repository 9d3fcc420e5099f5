// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The Quality Evaluator's output grade and the Trend Predictor's forecast
//! (`spec.md` §4.4).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered from best to worst; `Ord` reflects that ordering so callers can
/// compare grades directly (`excellent > good`, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkQualityGrade {
    Unusable,
    VeryPoor,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl NetworkQualityGrade {
    /// Maps a composite score in `[0, 100]` onto a grade, per the cutoffs in
    /// `spec.md` §6.3.
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 90 => NetworkQualityGrade::Excellent,
            s if s >= 70 => NetworkQualityGrade::Good,
            s if s >= 50 => NetworkQualityGrade::Fair,
            s if s >= 30 => NetworkQualityGrade::Poor,
            s if s > 0 => NetworkQualityGrade::VeryPoor,
            _ => NetworkQualityGrade::Unusable,
        }
    }
}

impl fmt::Display for NetworkQualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NetworkQualityGrade::Excellent => "excellent",
            NetworkQualityGrade::Good => "good",
            NetworkQualityGrade::Fair => "fair",
            NetworkQualityGrade::Poor => "poor",
            NetworkQualityGrade::VeryPoor => "very_poor",
            NetworkQualityGrade::Unusable => "unusable",
        };
        write!(f, "{label}")
    }
}

/// Direction the Trend Predictor expects quality to move over the next
/// sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityTrend {
    Improving,
    Stable,
    Degrading,
}

/// A forecast derived from the slope of recent speed samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkPrediction {
    pub trend: QualityTrend,
    pub predicted_grade: NetworkQualityGrade,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_ordering_matches_quality() {
        assert!(NetworkQualityGrade::Excellent > NetworkQualityGrade::Good);
        assert!(NetworkQualityGrade::Poor > NetworkQualityGrade::Unusable);
    }

    #[test]
    fn from_score_covers_full_range() {
        assert_eq!(NetworkQualityGrade::from_score(100), NetworkQualityGrade::Excellent);
        assert_eq!(NetworkQualityGrade::from_score(90), NetworkQualityGrade::Excellent);
        assert_eq!(NetworkQualityGrade::from_score(80), NetworkQualityGrade::Good);
        assert_eq!(NetworkQualityGrade::from_score(60), NetworkQualityGrade::Fair);
        assert_eq!(NetworkQualityGrade::from_score(40), NetworkQualityGrade::Poor);
        assert_eq!(NetworkQualityGrade::from_score(20), NetworkQualityGrade::VeryPoor);
        assert_eq!(NetworkQualityGrade::from_score(0), NetworkQualityGrade::Unusable);
    }

    #[test]
    fn from_score_matches_exact_cutoffs() {
        assert_eq!(NetworkQualityGrade::from_score(70), NetworkQualityGrade::Good);
        assert_eq!(NetworkQualityGrade::from_score(69), NetworkQualityGrade::Fair);
        assert_eq!(NetworkQualityGrade::from_score(50), NetworkQualityGrade::Fair);
        assert_eq!(NetworkQualityGrade::from_score(49), NetworkQualityGrade::Poor);
        assert_eq!(NetworkQualityGrade::from_score(30), NetworkQualityGrade::Poor);
        assert_eq!(NetworkQualityGrade::from_score(29), NetworkQualityGrade::VeryPoor);
        assert_eq!(NetworkQualityGrade::from_score(1), NetworkQualityGrade::VeryPoor);
    }
}
