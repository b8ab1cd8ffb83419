//! Simulated live tracking of a delivery.
//!
//! [`TrackingState::step`] is the whole simulation: it advances progress by a
//! fixed increment and places the courier on the straight line from pickup to
//! dropoff. [`TrackingTimer`] calls it on a fixed cadence from a background
//! thread until it completes or the timer is stopped.

use serde::Serialize;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const COMPLETE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Point `percent`% of the way from `self` to `to`
    pub fn towards(&self, to: &GeoPoint, percent: u32) -> GeoPoint {
        if percent >= COMPLETE {
            return *to;
        }
        let ratio = f64::from(percent) / f64::from(COMPLETE);
        GeoPoint {
            lat: self.lat + (to.lat - self.lat) * ratio,
            lng: self.lng + (to.lng - self.lng) * ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStage {
    PickedUp,
    InTransit,
    Delivered,
}

impl TrackingStage {
    pub fn for_progress(progress: u32) -> Self {
        match progress {
            0 => Self::PickedUp,
            p if p >= COMPLETE => Self::Delivered,
            _ => Self::InTransit,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PickedUp => "Picked Up",
            Self::InTransit => "In Transit",
            Self::Delivered => "Delivered",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackingUpdate {
    pub progress: u32,
    pub position: GeoPoint,
    pub stage: TrackingStage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingState {
    pub donation_id: String,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    current: GeoPoint,
    progress: u32,
    step_percent: u32,
}

impl TrackingState {
    pub fn new(donation_id: &str, pickup: GeoPoint, dropoff: GeoPoint, step_percent: u32) -> Self {
        Self {
            donation_id: donation_id.to_string(),
            pickup,
            dropoff,
            current: pickup,
            progress: 0,
            step_percent: step_percent.max(1),
        }
    }

    /// Resume from a known progress, capped at 100
    pub fn with_progress(mut self, progress: u32) -> Self {
        self.progress = progress.min(COMPLETE);
        self.current = self.pickup.towards(&self.dropoff, self.progress);
        self
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn position(&self) -> GeoPoint {
        self.current
    }

    pub fn stage(&self) -> TrackingStage {
        TrackingStage::for_progress(self.progress)
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= COMPLETE
    }

    /// Steps left before arrival
    pub fn remaining_steps(&self) -> u32 {
        (COMPLETE - self.progress).div_ceil(self.step_percent)
    }

    /// Advance one tick
    pub fn step(&mut self) -> TrackingUpdate {
        self.progress = self.progress.saturating_add(self.step_percent).min(COMPLETE);
        self.current = self.pickup.towards(&self.dropoff, self.progress);
        self.update()
    }

    pub fn update(&self) -> TrackingUpdate {
        TrackingUpdate {
            progress: self.progress,
            position: self.current,
            stage: self.stage(),
        }
    }
}

/// Drives [`TrackingState::step`] on a background thread.
///
/// Dropping the timer stops and joins the thread; no update is produced
/// after that.
pub struct TrackingTimer {
    updates: Receiver<TrackingUpdate>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<TrackingState>>,
}

impl TrackingTimer {
    pub fn start(state: TrackingState, interval: Duration) -> Self {
        let (update_tx, update_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || Self::run(state, interval, stop_rx, update_tx));

        Self {
            updates: update_rx,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    fn run(
        mut state: TrackingState,
        interval: Duration,
        stop_rx: Receiver<()>,
        update_tx: Sender<TrackingUpdate>,
    ) -> TrackingState {
        while !state.is_complete() {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let update = state.step();
                    if update_tx.send(update).is_err() {
                        break;
                    }
                }
                // Stop requested or timer handle dropped
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        state
    }

    /// Next update, or `None` when none arrives within `timeout` or the
    /// simulation has finished
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TrackingUpdate> {
        self.updates.recv_timeout(timeout).ok()
    }

    /// Stop the timer and return the state it reached
    pub fn stop(mut self) -> Option<TrackingState> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<TrackingState> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl Drop for TrackingTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
