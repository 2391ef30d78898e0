//! Per-port sensor polling
//!
//! [`Monitoring`] turns a [`Topology`] into one polling task per monitored
//! port. Each task pushes a pre-built read frame into the connection's
//! outbound queue at the cadence of the port's sensor kind. Any topology
//! change while started restarts the whole set.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::buffer::Frame;
use crate::queue::FrameSink;
use crate::topology::{SensorKind, Topology};

/// Builds the polling plan of a topology
pub type Planner = Arc<dyn Fn(&Topology) -> Vec<MonitorEntry> + Send + Sync>;

/// One planned polling interval
#[derive(Debug, Clone)]
pub struct MonitorEntry {
    pub port: u8,
    pub kind: SensorKind,
    pub interval: Duration,
    pub frame: Frame,
}

/// Observable summary of a running interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveInterval {
    pub port: u8,
    pub kind: SensorKind,
    pub interval: Duration,
}

#[derive(Default)]
struct MonitorState {
    started: bool,
    sink: Option<FrameSink>,
    topology: Topology,
    tasks: Vec<(ActiveInterval, JoinHandle<()>)>,
}

/// Polling scheduler owned by one connection
pub struct Monitoring {
    name: String,
    planner: Planner,
    state: Mutex<MonitorState>,
    restarts: AtomicUsize,
}

impl Monitoring {
    pub fn new(name: impl Into<String>, planner: Planner) -> Self {
        Self {
            name: name.into(),
            planner,
            state: Mutex::new(MonitorState::default()),
            restarts: AtomicUsize::new(0),
        }
    }

    /// Start polling every port of `topology`
    pub fn start(&self, sink: FrameSink, topology: Topology) {
        let mut state = self.state.lock();
        abort_all(&mut state.tasks);
        state.sink = Some(sink);
        state.topology = topology;
        state.started = true;
        self.spawn_all(&mut state);
        info!(
            "{} monitoring started with {} intervals",
            self.name,
            state.tasks.len()
        );
    }

    /// Abort every polling task; safe to call when already stopped
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.started {
            return;
        }
        abort_all(&mut state.tasks);
        state.sink = None;
        state.started = false;
        info!("{} monitoring stopped", self.name);
    }

    /// Replace the topology snapshot
    ///
    /// Returns whether it differed. A difference while started triggers one
    /// full stop-then-start cycle.
    pub fn update_topology(&self, topology: Topology) -> bool {
        let mut state = self.state.lock();
        let changes = state.topology.diff(&topology);
        if changes.is_empty() {
            return false;
        }
        debug!("{} topology changed: {:?}", self.name, changes);
        state.topology = topology;

        if state.started {
            abort_all(&mut state.tasks);
            self.spawn_all(&mut state);
            self.restarts.fetch_add(1, Ordering::SeqCst);
            info!(
                "{} monitoring restarted with {} intervals",
                self.name,
                state.tasks.len()
            );
        }
        true
    }

    pub fn topology(&self) -> Topology {
        self.state.lock().topology.clone()
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn active_intervals(&self) -> Vec<ActiveInterval> {
        self.state.lock().tasks.iter().map(|(a, _)| *a).collect()
    }

    /// Number of restarts caused by topology changes
    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    fn spawn_all(&self, state: &mut MonitorState) {
        let Some(sink) = state.sink.clone() else {
            return;
        };
        for entry in (self.planner)(&state.topology) {
            let active = ActiveInterval {
                port: entry.port,
                kind: entry.kind,
                interval: entry.interval,
            };
            debug!(
                "Polling {} on port {} every {:?}",
                entry.kind, entry.port, entry.interval
            );
            state.tasks.push((active, spawn_poller(entry, sink.clone())));
        }
    }
}

impl Drop for Monitoring {
    fn drop(&mut self) {
        abort_all(&mut self.state.lock().tasks);
    }
}

fn abort_all(tasks: &mut Vec<(ActiveInterval, JoinHandle<()>)>) {
    for (_, task) in tasks.drain(..) {
        task.abort();
    }
}

fn spawn_poller(entry: MonitorEntry, sink: FrameSink) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(entry.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if sink.send(entry.frame.clone()).is_err() {
                break;
            }
        }
    })
}
