//! # Registro de Conexiones
//! src/server/registry.rs
//!
//! Mapa `fd → Connection` protegido por un único mutex. El mismo lock cubre
//! los cambios en el conjunto epoll, de modo que insertar + registrar y
//! quitar + desregistrar son atómicos respecto de los demás workers.
//!
//! Las entradas son `Arc<Connection>`: el registro y el worker que la está
//! drenando la comparten, y el socket se cierra cuando se suelta la última
//! referencia. Mientras un worker conserve su `Arc`, el descriptor no puede
//! reutilizarse para otra conexión.

use super::poller::{Interest, Poller};
use super::stream::BufferedStream;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::debug;

/// Resultado de intentar tomar el flag de procesamiento
pub enum Claim<'a> {
    /// Este worker drena la conexión hasta soltar el guard
    Owned(MutexGuard<'a, BufferedStream>),
    /// Otro worker la está drenando
    Busy,
    /// Un handler hizo panic con la conexión tomada
    Poisoned,
}

/// Conexión registrada: stream + flag de procesamiento
pub struct Connection {
    fd: RawFd,
    peer: SocketAddr,
    stream: Mutex<BufferedStream>,
}

impl Connection {
    pub fn new(stream: BufferedStream) -> Self {
        Self {
            fd: stream.socket().as_raw_fd(),
            peer: stream.socket().peer_addr(),
            stream: Mutex::new(stream),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Intenta tomar el flag sin bloquear
    pub fn claim(&self) -> Claim<'_> {
        match self.stream.try_lock() {
            Ok(guard) => Claim::Owned(guard),
            Err(TryLockError::WouldBlock) => Claim::Busy,
            Err(TryLockError::Poisoned(_)) => Claim::Poisoned,
        }
    }
}

/// Registro compartido de conexiones
#[derive(Default)]
pub struct Registry {
    connections: Mutex<HashMap<RawFd, Arc<Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RawFd, Arc<Connection>>> {
        // El mapa no queda inconsistente si un thread hace panic con el lock
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserta la conexión y la registra en epoll (edge-triggered)
    ///
    /// Si el registro falla, la entrada se deshace y la conexión se cierra.
    pub fn insert(&self, poller: &Poller, connection: Connection) -> io::Result<Arc<Connection>> {
        let connection = Arc::new(connection);
        let fd = connection.fd();

        let mut map = self.lock();
        map.insert(fd, Arc::clone(&connection));
        if let Err(e) = poller.add(fd, Interest::Connection) {
            map.remove(&fd);
            return Err(e);
        }
        Ok(connection)
    }

    /// Busca la conexión de `fd`
    ///
    /// Si ya no está registrada, se asegura de que `fd` tampoco quede en el
    /// conjunto epoll. Ambas cosas ocurren bajo el lock, así que no puede
    /// afectar a una conexión nueva que esté registrándose con el mismo fd.
    pub fn lookup(&self, poller: &Poller, fd: RawFd) -> Option<Arc<Connection>> {
        let map = self.lock();
        match map.get(&fd) {
            Some(connection) => Some(Arc::clone(connection)),
            None => {
                if poller.delete(fd).is_ok() {
                    debug!(fd, "descriptor huérfano removido de epoll");
                }
                None
            }
        }
    }

    /// Quita la conexión del registro y de epoll
    ///
    /// Idempotente: retorna `None` si otro worker ya la quitó. La conexión
    /// retornada se cierra al soltarla (fuera del lock).
    pub fn remove(&self, poller: &Poller, fd: RawFd) -> Option<Arc<Connection>> {
        let mut map = self.lock();
        let connection = map.remove(&fd)?;
        if let Err(e) = poller.delete(fd) {
            debug!(fd, error = %e, "epoll_ctl(DEL) falló");
        }
        Some(connection)
    }

    /// Número de conexiones registradas
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::socket::Socket;
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    fn connection_pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, peer) = listener.accept().unwrap();
        stream.set_nonblocking(true).unwrap();
        let stream = BufferedStream::new(Socket::new(stream, peer), Duration::from_secs(1));
        (Connection::new(stream), client)
    }

    #[test]
    fn test_insert_and_lookup() {
        let poller = Poller::new().unwrap();
        let registry = Registry::new();
        let (connection, client) = connection_pair();
        let fd = connection.fd();

        let inserted = registry.insert(&poller, connection).unwrap();
        assert_eq!(inserted.peer_addr(), client.local_addr().unwrap());
        assert_eq!(registry.len(), 1);

        let found = registry.lookup(&poller, fd).unwrap();
        assert!(Arc::ptr_eq(&inserted, &found));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let poller = Poller::new().unwrap();
        let registry = Registry::new();
        let (connection, _client) = connection_pair();
        let fd = connection.fd();
        registry.insert(&poller, connection).unwrap();

        assert!(registry.remove(&poller, fd).is_some());
        assert!(registry.remove(&poller, fd).is_none());
        assert!(registry.is_empty());
        assert!(registry.lookup(&poller, fd).is_none());
    }

    #[test]
    fn test_remove_deregisters_from_epoll() {
        let poller = Poller::new().unwrap();
        let registry = Registry::new();
        let (connection, client) = connection_pair();
        let fd = connection.fd();
        let held = registry.insert(&poller, connection).unwrap();

        registry.remove(&poller, fd);
        drop(client);
        assert!(poller.wait(Duration::from_millis(50)).unwrap().is_none());
        drop(held);
    }

    #[test]
    fn test_last_reference_closes_socket() {
        let poller = Poller::new().unwrap();
        let registry = Registry::new();
        let (connection, mut client) = connection_pair();
        let fd = connection.fd();
        let held = registry.insert(&poller, connection).unwrap();

        let removed = registry.remove(&poller, fd).unwrap();
        drop(removed);

        // Un worker todavía la tiene: el socket sigue abierto
        client.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        let mut buf = [0u8; 1];
        assert!(client.read(&mut buf).is_err());

        drop(held);
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let (connection, _client) = connection_pair();

        let first = connection.claim();
        assert!(matches!(first, Claim::Owned(_)));
        assert!(matches!(connection.claim(), Claim::Busy));

        drop(first);
        assert!(matches!(connection.claim(), Claim::Owned(_)));
    }

    #[test]
    fn test_claim_poisoned_after_panic() {
        let (connection, _client) = connection_pair();
        let connection = Arc::new(connection);

        let shared = Arc::clone(&connection);
        let result = std::thread::spawn(move || {
            let _guard = match shared.claim() {
                Claim::Owned(guard) => guard,
                _ => unreachable!(),
            };
            panic!("handler failure");
        })
        .join();

        assert!(result.is_err());
        assert!(matches!(connection.claim(), Claim::Poisoned));
    }
}
