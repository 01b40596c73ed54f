//! # Framer HTTP
//! src/http/protocol.rs
//!
//! Implementa `server::Protocol`: por cada llamada lee a lo sumo un request
//! (request line + headers) del stream y lo entrega al router.
//!
//! - Si no hay una request line disponible de inmediato, retorna sin hacer
//!   nada: así el engine sabe que la conexión quedó drenada.
//! - Los bytes del cuerpo que el handler no consumió se descartan, para que
//!   el siguiente request pipelined empiece en su propia línea.

use super::request::RequestHead;
use crate::router::Router;
use crate::server::{BufferedStream, Protocol, ReadResult, StreamState};
use tracing::{info, warn};

/// Protocolo HTTP/1.1 sobre el engine
pub struct HttpProtocol {
    router: Router,
}

impl HttpProtocol {
    /// El router queda fijo: no se puede modificar una vez que sirve requests
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Lee headers hasta la línea vacía
    fn read_headers(stream: &mut BufferedStream, head: &mut RequestHead) {
        while let Some(line) = stream.read_line() {
            if line.is_empty() {
                break;
            }
            head.apply_header(&line);
        }
    }
}

impl Protocol for HttpProtocol {
    fn handle_request(&self, stream: &mut BufferedStream) {
        let Some(line) = stream.try_read_line() else {
            return;
        };
        // Línea vacía entre requests: se ignora
        let Some(mut head) = RequestHead::from_request_line(&line) else {
            return;
        };

        Self::read_headers(stream, &mut head);
        if stream.state() == StreamState::Failed {
            return;
        }

        let peer = stream.socket().peer_addr();
        info!(%peer, method = %head.method, path = %head.path, body = head.content_length, "request");

        let body_start = stream.total_read();
        if let Err(e) = self
            .router
            .handle_request(head.method, &head.path, stream, head.content_length)
        {
            warn!(%peer, path = %head.path, error = %e, "el handler falló");
            stream.mark_failed();
            return;
        }

        let consumed = (stream.total_read() - body_start) as usize;
        if consumed < head.content_length && !stream.is_finished() {
            if let ReadResult::NotYet = stream.discard(head.content_length - consumed) {
                warn!(%peer, "cuerpo incompleto tras el timeout");
                stream.mark_failed();
            }
        }
    }
}
