//! # Errores del Servidor
//! src/error.rs
//!
//! Errores fatales de arranque. Los fallos de E/S de una conexión individual
//! no pasan por aquí: quedan registrados en el estado de su `BufferedStream`
//! y solo afectan a esa conexión.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Errores que abortan la construcción o el arranque del servidor
#[derive(Debug, Error)]
pub enum ServerError {
    /// No se pudo hacer bind del socket de escucha
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Fallo creando o registrando descriptores en el conjunto epoll
    #[error("epoll setup failed: {0}")]
    Poller(#[source] io::Error),

    /// No se pudo enmascarar SIGPIPE
    #[error("cannot set signal mask: {0}")]
    SignalMask(#[source] io::Error),

    /// No se pudo lanzar un thread worker
    #[error("cannot spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    /// `listen()` se llamó dos veces
    #[error("server is already listening")]
    AlreadyListening,

    /// Configuración inválida (ver `Config::validate`)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result con `ServerError`
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: "[::1]:8080".parse().unwrap(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        let text = err.to_string();
        assert!(text.starts_with("cannot bind [::1]:8080"));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = ServerError::InvalidConfig("Workers must be >= 1".to_string());
        assert_eq!(err.to_string(), "invalid configuration: Workers must be >= 1");
    }
}
