//! # Ocupación de Workers
//! src/metrics/collector.rs
//!
//! Cada worker marca si está procesando un evento o esperando en epoll. El
//! comando `ls` de la consola lee estos flags junto con el número de
//! conexiones registradas.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Estado de un worker en el momento de la consulta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Busy,
    Idle,
}

/// Flags busy/idle por worker, sin locks
#[derive(Debug)]
pub struct WorkerActivity {
    busy: Vec<AtomicBool>,
}

impl WorkerActivity {
    /// Crea los flags para `workers` threads, todos en idle
    pub fn new(workers: usize) -> Self {
        Self {
            busy: (0..workers).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    pub fn set_busy(&self, worker: usize) {
        if let Some(flag) = self.busy.get(worker) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    pub fn set_idle(&self, worker: usize) {
        if let Some(flag) = self.busy.get(worker) {
            flag.store(false, Ordering::Relaxed);
        }
    }

    /// Estado actual de cada worker, en orden de id
    pub fn states(&self) -> Vec<WorkerState> {
        self.busy
            .iter()
            .map(|flag| {
                if flag.load(Ordering::Relaxed) {
                    WorkerState::Busy
                } else {
                    WorkerState::Idle
                }
            })
            .collect()
    }
}

/// Resultado de `Server::list_clients()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientsSnapshot {
    /// Conexiones registradas
    pub connections: usize,
    /// Estado de cada worker
    pub workers: Vec<WorkerState>,
}

impl ClientsSnapshot {
    /// Serializa el snapshot como JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl fmt::Display for ClientsSnapshot {
    /// Formato: `Clients count: 3 | thread occupancy: busy idle idle`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Clients count: {} | thread occupancy:", self.connections)?;
        for state in &self.workers {
            match state {
                WorkerState::Busy => write!(f, " busy")?,
                WorkerState::Idle => write!(f, " idle")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workers_are_idle() {
        let activity = WorkerActivity::new(3);
        assert_eq!(activity.states(), vec![WorkerState::Idle; 3]);
    }

    #[test]
    fn test_busy_and_idle() {
        let activity = WorkerActivity::new(2);
        activity.set_busy(1);
        assert_eq!(activity.states(), vec![WorkerState::Idle, WorkerState::Busy]);

        activity.set_idle(1);
        assert_eq!(activity.states(), vec![WorkerState::Idle; 2]);
    }

    #[test]
    fn test_out_of_range_worker_ignored() {
        let activity = WorkerActivity::new(1);
        activity.set_busy(5);
        assert_eq!(activity.states(), vec![WorkerState::Idle]);
    }

    #[test]
    fn test_snapshot_display() {
        let snapshot = ClientsSnapshot {
            connections: 2,
            workers: vec![WorkerState::Busy, WorkerState::Idle],
        };
        assert_eq!(snapshot.to_string(), "Clients count: 2 | thread occupancy: busy idle");
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = ClientsSnapshot {
            connections: 1,
            workers: vec![WorkerState::Idle],
        };
        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json()).unwrap();
        assert_eq!(json["connections"], 1);
        assert_eq!(json["workers"][0], "idle");
    }
}
