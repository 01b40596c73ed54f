//! # Comandos del Servidor
//! src/commands/mod.rs
//!
//! Handlers de demostración que se registran en el router junto a los
//! montajes estáticos. Cada handler recibe el `BufferedStream` de la
//! conexión y el largo del cuerpo, y escribe la respuesta completa.

pub mod basic;

// Re-exportar funciones útiles
pub use basic::*;

use crate::router::Router;
use std::time::Duration;

/// Registra `GET /wait` y `POST /sort`
pub fn register(router: &mut Router, slow: Duration) {
    router.get("/wait", wait_handler(slow));
    router.post("/sort", sort_handler);
}
