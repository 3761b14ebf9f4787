//! CPU and memory load.
//!
//! High global CPU reads as `debugging`. The last measured load is also kept
//! in a shared [`SystemLoadHandle`] so the daemon can report it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use sysinfo::System;

use super::polled::Probe;
use crate::error::SourceError;
use crate::source::Observation;

const REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SystemLoad {
    pub cpu_percent: f32,
    pub ram_percent: f32,
}

/// Read side of the latest measurement.
#[derive(Debug, Clone, Default)]
pub struct SystemLoadHandle(Arc<RwLock<SystemLoad>>);

impl SystemLoadHandle {
    pub fn get(&self) -> SystemLoad {
        self.0.read().map(|load| *load).unwrap_or_default()
    }

    fn set(&self, load: SystemLoad) {
        if let Ok(mut current) = self.0.write() {
            *current = load;
        }
    }
}

pub struct SystemProbe {
    sys: System,
    cpu_high_threshold: f32,
    load: SystemLoadHandle,
}

impl SystemProbe {
    pub fn new(cpu_high_threshold: f32) -> Self {
        let mut sys = System::new();
        // CPU usage is a delta; the first refresh only primes it.
        sys.refresh_cpu();
        Self {
            sys,
            cpu_high_threshold,
            load: SystemLoadHandle::default(),
        }
    }

    pub fn load_handle(&self) -> SystemLoadHandle {
        self.load.clone()
    }
}

impl Probe for SystemProbe {
    fn interval(&self) -> Duration {
        REFRESH_INTERVAL
    }

    fn refresh(&mut self, _now: DateTime<Utc>) -> Result<Option<Observation>, SourceError> {
        self.sys.refresh_cpu();
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        let ram_percent = if total == 0 {
            0.0
        } else {
            (self.sys.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        let load = SystemLoad {
            cpu_percent: self.sys.global_cpu_info().cpu_usage(),
            ram_percent,
        };
        self.load.set(load);

        Ok(classify_load(load, self.cpu_high_threshold))
    }
}

pub fn classify_load(load: SystemLoad, cpu_high_threshold: f32) -> Option<Observation> {
    (load.cpu_percent >= cpu_high_threshold).then(|| Observation::label("debugging"))
}
