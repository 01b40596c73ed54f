//! # Diagnóstico del Servidor
//! src/metrics/mod.rs
//!
//! Snapshot básico para la consola: conexiones registradas y ocupación de
//! cada worker.

pub mod collector;

pub use collector::{ClientsSnapshot, WorkerActivity, WorkerState};
