//! Background refresh for sources that block.
//!
//! A [`Probe`] does the slow work (shelling out, scanning a directory). A
//! [`PolledSource`] runs it on its own thread at the probe's cadence and hands
//! every result to an [`ObservationCache`] in one assignment. `observe()` only
//! clones what is cached, so the status tick never waits on I/O.
//!
//! Each `start()` opens a new cache generation and `stop()` closes it. A
//! refresh that was in flight when its generation closed finds the mismatch
//! on write and is discarded.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::source::{Observation, ObservationSource};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The blocking half of a polled source.
pub trait Probe: Send + 'static {
    fn interval(&self) -> Duration;

    fn refresh(&mut self, now: DateTime<Utc>) -> Result<Option<Observation>, SourceError>;
}

#[derive(Debug, Default)]
struct CacheSlot {
    generation: u64,
    value: Option<Observation>,
    /// Set when the most recent refresh failed; cleared by the next success.
    error: Option<SourceError>,
    refreshed: bool,
}

/// Last-good-value cache shared between a refresh thread and `observe()`.
#[derive(Debug, Clone, Default)]
pub struct ObservationCache {
    slot: Arc<Mutex<CacheSlot>>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.slot.lock().map(|slot| slot.generation).unwrap_or(0)
    }

    /// Opens a new generation and clears the cached value. Returns the new
    /// generation; writes tagged with any older one are ignored.
    pub fn invalidate(&self) -> u64 {
        match self.slot.lock() {
            Ok(mut slot) => {
                slot.generation += 1;
                slot.value = None;
                slot.error = None;
                slot.refreshed = false;
                slot.generation
            }
            Err(_) => 0,
        }
    }

    /// Single-assignment handoff. Returns false when `generation` is stale.
    pub fn store(
        &self,
        generation: u64,
        result: Result<Option<Observation>, SourceError>,
    ) -> bool {
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };
        if slot.generation != generation {
            return false;
        }
        match result {
            Ok(value) => {
                slot.value = value;
                slot.error = None;
            }
            Err(err) => {
                slot.error = Some(err);
            }
        }
        slot.refreshed = true;
        true
    }

    /// The last good value. A failure is only surfaced while there is no
    /// good value to fall back on.
    pub fn load(&self) -> Result<Option<Observation>, SourceError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| SourceError::Observation("observation cache poisoned".to_string()))?;
        match (&slot.value, &slot.error) {
            (None, Some(err)) => Err(err.clone()),
            (value, _) => Ok(value.clone()),
        }
    }

    pub fn has_refreshed(&self) -> bool {
        self.slot.lock().map(|slot| slot.refreshed).unwrap_or(false)
    }
}

/// Runs a [`Probe`] on a background thread and serves its cached result.
pub struct PolledSource<P: Probe> {
    id: String,
    probe: Arc<Mutex<P>>,
    cache: ObservationCache,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl<P: Probe> PolledSource<P> {
    pub fn new(id: impl Into<String>, probe: P) -> Self {
        Self {
            id: id.into(),
            probe: Arc::new(Mutex::new(probe)),
            cache: ObservationCache::new(),
            stop_flag: None,
        }
    }

    pub fn cache(&self) -> &ObservationCache {
        &self.cache
    }

    pub fn is_running(&self) -> bool {
        self.stop_flag.is_some()
    }
}

impl<P: Probe> ObservationSource for PolledSource<P> {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&mut self) -> Result<(), SourceError> {
        if self.is_running() {
            return Ok(());
        }
        let generation = self.cache.invalidate();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let probe = Arc::clone(&self.probe);
        let cache = self.cache.clone();
        let id = self.id.clone();

        thread::Builder::new()
            .name(format!("pet-source-{}", self.id))
            .spawn(move || refresh_loop(&id, probe, cache, generation, thread_stop))
            .map_err(|err| SourceError::Unavailable(format!("spawn {}: {}", self.id, err)))?;

        self.stop_flag = Some(stop);
        debug!(source = %self.id, generation, "Polled source started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop_flag.take() {
            stop.store(true, Ordering::SeqCst);
            self.cache.invalidate();
            debug!(source = %self.id, "Polled source stopped");
        }
    }

    fn observe(&mut self, _now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
        self.cache.load()
    }
}

impl<P: Probe> Drop for PolledSource<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn refresh_loop<P: Probe>(
    id: &str,
    probe: Arc<Mutex<P>>,
    cache: ObservationCache,
    generation: u64,
    stop: Arc<AtomicBool>,
) {
    let mut failing = false;
    while !stop.load(Ordering::SeqCst) {
        let (result, interval) = {
            let Ok(mut probe) = probe.lock() else {
                warn!(source = id, "Probe lock poisoned; refresh thread exiting");
                return;
            };
            (probe.refresh(Utc::now()), probe.interval())
        };

        match &result {
            Err(err) if !failing => {
                warn!(source = id, error = %err, "Probe refresh failed");
                failing = true;
            }
            Err(err) => debug!(source = id, error = %err, "Probe refresh still failing"),
            Ok(_) if failing => {
                debug!(source = id, "Probe refresh recovered");
                failing = false;
            }
            Ok(_) => {}
        }

        if !cache.store(generation, result) {
            debug!(source = id, generation, "Discarded refresh from a stopped generation");
            return;
        }

        let deadline = Instant::now() + interval;
        while Instant::now() < deadline {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(STOP_POLL_INTERVAL.min(interval));
        }
    }
}
