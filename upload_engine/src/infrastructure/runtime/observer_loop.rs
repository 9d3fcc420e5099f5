// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Network Observer Loop
//!
//! Wraps the domain's synchronous `NetworkObserverState` behind a
//! `parking_lot::Mutex` and drives it with a periodic sampling loop,
//! broadcasting grade transitions to subscribers. The state itself decides
//! what counts as a transition (`observe_grade_change` dedupes identical
//! grades); this module only owns the timer and the fan-out channel.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use upload_engine_domain::services::network_observer::NetworkObserverState;
use upload_engine_domain::value_objects::{ConnectionEvent, NetworkPrediction, NetworkQualityGrade, NetworkSample, NetworkType};

/// Default sampling cadence (`spec.md` §4.4 leaves the exact figure to the
/// infrastructure layer; 30s balances responsiveness against churn).
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(30);

pub struct NetworkObserver {
    state: Mutex<NetworkObserverState>,
    grade_changes: broadcast::Sender<NetworkQualityGrade>,
    /// Fires on every `ConnectionEvent::Online`, for retry paths waiting on
    /// connectivity rather than a timed backoff (`spec.md` §7).
    online_events: broadcast::Sender<()>,
}

impl NetworkObserver {
    pub fn new(network_type: NetworkType) -> Self {
        let (grade_changes, _) = broadcast::channel(32);
        let (online_events, _) = broadcast::channel(8);
        NetworkObserver { state: Mutex::new(NetworkObserverState::new(network_type)), grade_changes, online_events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkQualityGrade> {
        self.grade_changes.subscribe()
    }

    pub fn subscribe_online(&self) -> broadcast::Receiver<()> {
        self.online_events.subscribe()
    }

    pub fn record_sample(&self, sample: NetworkSample) {
        self.state.lock().record_sample(sample);
    }

    pub fn record_event(&self, event: ConnectionEvent) {
        self.state.lock().record_event(event);
        if matches!(event, ConnectionEvent::Online { .. }) {
            let _ = self.online_events.send(());
        }
    }

    /// Resolves immediately if the adapter already reports a concrete
    /// network type, otherwise waits for the next `ConnectionEvent::Online`.
    /// Used by the retry path for `RetryVerdict::RetryAfterOnline`.
    pub async fn wait_for_online(&self) {
        if self.network_type() != NetworkType::None {
            return;
        }
        let mut rx = self.subscribe_online();
        loop {
            match rx.recv().await {
                Ok(()) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    pub fn set_network_type(&self, network_type: NetworkType) {
        self.state.lock().set_network_type(network_type);
    }

    pub fn network_type(&self) -> NetworkType {
        self.state.lock().network_type()
    }

    pub fn current_grade(&self, latency_ms: Option<f64>, packet_loss_pct: f64) -> NetworkQualityGrade {
        self.state.lock().grade(latency_ms, packet_loss_pct)
    }

    pub fn bandwidth_estimate_kbps(&self) -> f64 {
        self.state.lock().bandwidth_estimate_kbps()
    }

    pub fn predict(&self, latency_ms: Option<f64>, packet_loss_pct: f64) -> NetworkPrediction {
        self.state.lock().predict(latency_ms, packet_loss_pct)
    }

    /// Samples the current grade once and broadcasts it if it changed from
    /// the last observed one. Called by the spawned loop, or directly by
    /// tests that want to avoid a real timer.
    pub fn tick(&self, latency_ms: Option<f64>, packet_loss_pct: f64) {
        let changed = {
            let mut state = self.state.lock();
            let grade = state.grade(latency_ms, packet_loss_pct);
            state.observe_grade_change(grade)
        };
        if let Some(grade) = changed {
            // No subscribers is a normal state (engine idle between files);
            // a send error here just means nobody is listening right now.
            let _ = self.grade_changes.send(grade);
        }
    }

    /// Spawns the periodic sampling loop. `sample_inputs` supplies the
    /// latency/packet-loss pair the quality score needs on each tick; a real
    /// adapter measures these via a lightweight probe, while tests can
    /// supply canned values.
    pub fn spawn_sampling_loop<F>(self: Arc<Self>, interval: Duration, sample_inputs: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn() -> (Option<f64>, f64) + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let (latency_ms, packet_loss_pct) = sample_inputs();
                self.tick(latency_ms, packet_loss_pct);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upload_engine_domain::value_objects::Direction;

    #[test]
    fn tick_broadcasts_only_on_grade_change() {
        let observer = NetworkObserver::new(NetworkType::Wifi);
        let mut rx = observer.subscribe();

        observer.record_sample(NetworkSample { timestamp_millis: 0, direction: Direction::Down, speed_kbps: 9_000.0, latency_ms: Some(20.0) });
        observer.tick(Some(20.0), 0.0);
        assert!(rx.try_recv().is_ok());

        observer.tick(Some(20.0), 0.0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn wait_for_online_resolves_when_network_type_is_already_known() {
        let observer = NetworkObserver::new(NetworkType::Wifi);
        tokio::time::timeout(Duration::from_millis(50), observer.wait_for_online()).await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_online_blocks_until_the_online_event_fires() {
        let observer = Arc::new(NetworkObserver::new(NetworkType::None));
        let waiter = observer.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_for_online().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());
        observer.record_event(ConnectionEvent::Online { at_millis: 0 });
        tokio::time::timeout(Duration::from_millis(100), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn sampling_loop_ticks_and_broadcasts() {
        let observer = Arc::new(NetworkObserver::new(NetworkType::Cellular4g));
        let mut rx = observer.subscribe();
        let handle = observer.clone().spawn_sampling_loop(Duration::from_millis(10), || (Some(30.0), 0.0));

        let grade = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(grade.is_ok());
        handle.abort();
    }
}
