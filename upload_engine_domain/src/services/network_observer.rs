// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Network Observer State
//!
//! The pure, synchronous core of the Network Observer (`spec.md` §4.4):
//! bounded ring buffers plus the four sub-calculations (Speed Monitor,
//! Quality Evaluator, Stability Analyzer, Trend Predictor). Sampling loops,
//! event buses, and timers are infrastructure concerns layered on top of
//! this state; this module only knows how to fold a new sample in and
//! derive a grade from what it already has.

use crate::value_objects::{
    ConnectionEvent, Direction, NetworkPrediction, NetworkQualityGrade, NetworkSample, NetworkType, QualityTrend,
};
use std::collections::VecDeque;

/// Per-direction ring buffer cap (`spec.md` §3).
pub const SAMPLE_CAP: usize = 50;

/// Connection-event ring buffer cap and window (`spec.md` §4.4).
pub const EVENT_CAP: usize = 100;
pub const STABILITY_WINDOW_MILLIS: i64 = 3 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct NetworkObserverState {
    up_samples: VecDeque<NetworkSample>,
    down_samples: VecDeque<NetworkSample>,
    events: VecDeque<ConnectionEvent>,
    network_type: NetworkType,
    last_grade: Option<NetworkQualityGrade>,
    last_prior_bandwidth_estimate: Option<f64>,
}

impl NetworkObserverState {
    pub fn new(network_type: NetworkType) -> Self {
        NetworkObserverState {
            up_samples: VecDeque::with_capacity(SAMPLE_CAP),
            down_samples: VecDeque::with_capacity(SAMPLE_CAP),
            events: VecDeque::with_capacity(EVENT_CAP),
            network_type,
            last_grade: None,
            last_prior_bandwidth_estimate: None,
        }
    }

    pub fn record_sample(&mut self, sample: NetworkSample) {
        let buf = match sample.direction {
            Direction::Up => &mut self.up_samples,
            Direction::Down => &mut self.down_samples,
        };
        if buf.len() == SAMPLE_CAP {
            buf.pop_front();
        }
        buf.push_back(sample);
    }

    pub fn record_event(&mut self, event: ConnectionEvent) {
        if self.events.len() == EVENT_CAP {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn set_network_type(&mut self, network_type: NetworkType) {
        self.network_type = network_type;
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    pub fn down_samples(&self) -> &VecDeque<NetworkSample> {
        &self.down_samples
    }

    // --- Speed Monitor ---

    /// Exponentially decayed average over the last 3 samples.
    pub fn current_speed_kbps(&self) -> f64 {
        let recent: Vec<f64> = self.down_samples.iter().rev().take(3).map(|s| s.speed_kbps).collect();
        ewma(&recent, 0.5)
    }

    /// Decay factor 0.8 average speed over the whole buffer.
    pub fn average_speed_kbps(&self) -> f64 {
        let all: Vec<f64> = self.down_samples.iter().map(|s| s.speed_kbps).collect();
        ewma(&all.iter().rev().copied().collect::<Vec<_>>(), 0.8)
    }

    /// Mean of top-3 samples ×1.1, smoothed 0.7/0.3 with the prior estimate.
    pub fn bandwidth_estimate_kbps(&mut self) -> f64 {
        let mut speeds: Vec<f64> = self.down_samples.iter().map(|s| s.speed_kbps).collect();
        speeds.sort_by(|a, b| b.partial_cmp(a).unwrap());
        let top3: Vec<f64> = speeds.into_iter().take(3).collect();
        let raw = if top3.is_empty() { 0.0 } else { (top3.iter().sum::<f64>() / top3.len() as f64) * 1.1 };
        let smoothed = match self.last_prior_bandwidth_estimate {
            Some(prior) => 0.7 * raw + 0.3 * prior,
            None => raw,
        };
        self.last_prior_bandwidth_estimate = Some(smoothed);
        smoothed
    }

    // --- Quality Evaluator ---

    /// Composite score 0-100 per the authoritative table in `spec.md` §6.3.
    pub fn quality_score(&self, latency_ms: Option<f64>, packet_loss_pct: f64) -> i32 {
        let base = self.network_type.base_score();
        let speed_score = speed_score(self.average_speed_kbps());
        let latency_score = latency_ms.map(latency_score).unwrap_or(0);
        let jitter_score = jitter_score(self.jitter_ms());
        let stability_penalty = self.stability_penalty();
        let packet_loss_penalty = packet_loss_penalty(packet_loss_pct);

        (base + speed_score + latency_score + jitter_score - stability_penalty - packet_loss_penalty).clamp(0, 100)
    }

    pub fn grade(&self, latency_ms: Option<f64>, packet_loss_pct: f64) -> NetworkQualityGrade {
        NetworkQualityGrade::from_score(self.quality_score(latency_ms, packet_loss_pct))
    }

    /// Folds a new grade in, returning `Some(grade)` only when it differs
    /// from the last recorded one (`spec.md` §4.4 "Deduplicates identical
    /// grade/type transitions").
    pub fn observe_grade_change(&mut self, grade: NetworkQualityGrade) -> Option<NetworkQualityGrade> {
        if self.last_grade == Some(grade) {
            None
        } else {
            self.last_grade = Some(grade);
            Some(grade)
        }
    }

    // --- Stability Analyzer ---

    pub fn jitter_ms(&self) -> f64 {
        let latencies: Vec<f64> = self.down_samples.iter().filter_map(|s| s.latency_ms).collect();
        if latencies.len() < 2 {
            return 0.0;
        }
        let diffs: Vec<f64> = latencies.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        diffs.iter().sum::<f64>() / diffs.len() as f64
    }

    fn stability_penalty(&self) -> i32 {
        let type_changes = self.events.iter().filter(|e| matches!(e, ConnectionEvent::TypeChange { .. })).count() as i32;
        let disconnections = self.events.iter().filter(|e| matches!(e, ConnectionEvent::Offline { .. })).count() as i32;
        (type_changes * 5).min(10) + (disconnections * 10).min(20)
    }

    /// `isStable` iff `stabilityScore > 70` and zero disconnections within
    /// the 3-minute window ending at `now_millis`.
    pub fn is_stable(&self, now_millis: i64) -> bool {
        let stability_score = 100 - self.stability_penalty();
        let disconnections_in_window = self
            .events
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::Offline { .. }) && now_millis - e.at_millis() <= STABILITY_WINDOW_MILLIS)
            .count();
        stability_score > 70 && disconnections_in_window == 0
    }

    // --- Trend Predictor ---

    /// Direction-of-change majority vote over recent download speeds; falls
    /// back from periodicity detection when too few samples exist for
    /// autocorrelation to be meaningful.
    pub fn predict(&self, latency_ms: Option<f64>, packet_loss_pct: f64) -> NetworkPrediction {
        let speeds: Vec<f64> = self.down_samples.iter().map(|s| s.speed_kbps).collect();
        let (trend, confidence) = trend_from_majority_vote(&speeds);
        let predicted_grade = self.grade(latency_ms, packet_loss_pct);
        NetworkPrediction { trend, predicted_grade, confidence }
    }
}

fn ewma(most_recent_first: &[f64], decay: f64) -> f64 {
    if most_recent_first.is_empty() {
        return 0.0;
    }
    let mut weight = 1.0;
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for &value in most_recent_first {
        weighted_sum += value * weight;
        weight_total += weight;
        weight *= decay;
    }
    weighted_sum / weight_total
}

fn speed_score(avg_kbps: f64) -> i32 {
    match avg_kbps {
        s if s >= 10_000.0 => 30,
        s if s >= 5_000.0 => 25,
        s if s >= 1_000.0 => 20,
        s if s >= 500.0 => 15,
        s if s >= 100.0 => 10,
        s if s >= 50.0 => 5,
        _ => 0,
    }
}

fn latency_score(latency_ms: f64) -> i32 {
    match latency_ms {
        l if l < 50.0 => 30,
        l if l < 100.0 => 25,
        l if l < 200.0 => 20,
        l if l < 300.0 => 15,
        l if l < 500.0 => 10,
        l if l < 1000.0 => 5,
        _ => 0,
    }
}

fn jitter_score(jitter_ms: f64) -> i32 {
    match jitter_ms {
        j if j < 10.0 => 20,
        j if j < 20.0 => 15,
        j if j < 50.0 => 10,
        j if j < 100.0 => 5,
        _ => 0,
    }
}

fn packet_loss_penalty(packet_loss_pct: f64) -> i32 {
    match packet_loss_pct {
        p if p < 1.0 => 0,
        p if p < 5.0 => 5,
        p if p < 10.0 => 10,
        p if p < 20.0 => 20,
        _ => 30,
    }
}

fn trend_from_majority_vote(speeds_oldest_first: &[f64]) -> (QualityTrend, f64) {
    if speeds_oldest_first.len() < 2 {
        return (QualityTrend::Stable, 0.0);
    }
    let mut up = 0i32;
    let mut down = 0i32;
    for w in speeds_oldest_first.windows(2) {
        if w[1] > w[0] {
            up += 1;
        } else if w[1] < w[0] {
            down += 1;
        }
    }
    let total = (up + down).max(1);
    let trend = if up > down {
        QualityTrend::Improving
    } else if down > up {
        QualityTrend::Degrading
    } else {
        QualityTrend::Stable
    };
    let confidence = (up.max(down) as f64) / (total as f64);
    (trend, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(speed: f64, latency: Option<f64>) -> NetworkSample {
        NetworkSample { timestamp_millis: 0, direction: Direction::Down, speed_kbps: speed, latency_ms: latency }
    }

    #[test]
    fn ring_buffer_evicts_oldest_beyond_cap() {
        let mut state = NetworkObserverState::new(NetworkType::Wifi);
        for i in 0..(SAMPLE_CAP + 10) {
            state.record_sample(sample(i as f64, None));
        }
        assert_eq!(state.down_samples().len(), SAMPLE_CAP);
    }

    #[test]
    fn grade_deduplicates_repeated_transitions() {
        let mut state = NetworkObserverState::new(NetworkType::Wifi);
        assert_eq!(state.observe_grade_change(NetworkQualityGrade::Good), Some(NetworkQualityGrade::Good));
        assert_eq!(state.observe_grade_change(NetworkQualityGrade::Good), None);
        assert_eq!(state.observe_grade_change(NetworkQualityGrade::Fair), Some(NetworkQualityGrade::Fair));
    }

    #[test]
    fn ethernet_with_fast_stable_samples_grades_excellent() {
        let mut state = NetworkObserverState::new(NetworkType::Ethernet);
        for _ in 0..5 {
            state.record_sample(sample(12_000.0, Some(20.0)));
        }
        assert_eq!(state.grade(Some(20.0), 0.0), NetworkQualityGrade::Excellent);
    }

    #[test]
    fn offline_event_inside_window_breaks_stability() {
        let mut state = NetworkObserverState::new(NetworkType::Wifi);
        state.record_event(ConnectionEvent::Offline { at_millis: 1_000 });
        assert!(!state.is_stable(1_500));
    }

    #[test]
    fn scoring_is_monotone_non_increasing_in_score() {
        assert!(NetworkQualityGrade::from_score(95) >= NetworkQualityGrade::from_score(80));
        assert!(NetworkQualityGrade::from_score(80) >= NetworkQualityGrade::from_score(40));
        assert!(NetworkQualityGrade::from_score(40) >= NetworkQualityGrade::from_score(0));
    }

    #[test]
    fn predictor_detects_improving_trend_from_rising_speeds() {
        let mut state = NetworkObserverState::new(NetworkType::Wifi);
        for speed in [100.0, 200.0, 300.0, 400.0, 500.0] {
            state.record_sample(sample(speed, Some(50.0)));
        }
        let prediction = state.predict(Some(50.0), 0.0);
        assert_eq!(prediction.trend, QualityTrend::Improving);
    }
}
