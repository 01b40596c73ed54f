//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Engine TCP genérico sobre epoll:
//!
//! 1. Un socket de escucha no bloqueante y un único conjunto epoll
//! 2. N workers que esperan sobre el mismo conjunto
//! 3. Un registro `fd → Connection` compartido
//! 4. Por cada conexión lista, un `Protocol` que consume requests del
//!    `BufferedStream` mientras haya datos inmediatos
//!
//! El engine no sabe nada de HTTP: el protocolo se inyecta al construir el
//! `Server` (ver `http::HttpProtocol`).

pub mod poller;
pub mod registry;
pub mod signal;
pub mod socket;
pub mod stream;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use socket::Socket;
pub use stream::{BufferedStream, ReadResult, StreamState};
pub use tcp::Server;

/// Manejo de requests inyectado en el engine
///
/// El engine llama a `handle_request` repetidamente mientras el stream siga
/// en `Good`. Una implementación procesa como mucho un request por llamada:
/// si no hay un request disponible de inmediato, simplemente retorna (el
/// stream queda en `Exhausted`), y si la conexión no puede seguir usándose
/// deja el stream en `Closed` o `Failed`.
pub trait Protocol: Send + Sync + 'static {
    fn handle_request(&self, stream: &mut BufferedStream);
}
