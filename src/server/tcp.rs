//! # Engine TCP sobre epoll
//! src/server/tcp.rs
//!
//! Todos los workers bloquean sobre el mismo conjunto epoll y comparten el
//! mismo registro de conexiones. No hay cola de trabajo propia: el kernel
//! despierta a un worker por evento.
//!
//! ```text
//!            ┌──────────── epoll (1 evento por wait) ────────────┐
//!            │                                                   │
//!   worker-0 ┤  listener  → accept hasta WouldBlock → registrar  │
//!   worker-1 ┤  conexión  → try_lock → drenar → soltar → re-check│
//!   worker-N ┤  hang-up   → quitar del registro (cierra al final)│
//!            └───────────────────────────────────────────────────┘
//! ```
//!
//! Las conexiones se registran edge-triggered, así que quien toma el evento
//! drena el socket hasta que no queden datos inmediatos. Si otro worker ya
//! tiene la conexión tomada, el evento se descarta: al soltarla, ese worker
//! vuelve a revisar si llegaron bytes mientras la tenía.

use super::poller::{Event, Interest, Poller};
use super::registry::{Claim, Connection, Registry};
use super::signal;
use super::socket::{wait_fd, Socket};
use super::stream::BufferedStream;
use super::Protocol;
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::metrics::{ClientsSnapshot, WorkerActivity};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Estado compartido entre los workers
struct Shared<P: Protocol> {
    listener: TcpListener,
    poller: Poller,
    registry: Registry,
    protocol: P,
    running: AtomicBool,
    activity: WorkerActivity,
    wait_timeout: Duration,
    io_timeout: Duration,
}

/// Servidor concurrente parametrizado por su protocolo
pub struct Server<P: Protocol> {
    shared: Arc<Shared<P>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl<P: Protocol> Server<P> {
    /// Hace bind, crea el conjunto epoll y registra el listener
    ///
    /// También bloquea `SIGPIPE` en el thread actual. Cualquier fallo es
    /// fatal y no deja recursos abiertos.
    pub fn new(config: &Config, protocol: P) -> Result<Self> {
        config.validate().map_err(ServerError::InvalidConfig)?;
        let addr = config.socket_addr().map_err(ServerError::InvalidConfig)?;

        signal::block_sigpipe().map_err(ServerError::SignalMask)?;

        let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServerError::Bind { addr, source })?;

        let poller = Poller::new().map_err(ServerError::Poller)?;
        poller
            .add(listener.as_raw_fd(), Interest::Listener)
            .map_err(ServerError::Poller)?;

        let worker_count = config.worker_count();
        info!(addr = %listener.local_addr().unwrap_or(addr), workers = worker_count, "servidor listo");

        Ok(Self {
            shared: Arc::new(Shared {
                listener,
                poller,
                registry: Registry::new(),
                protocol,
                running: AtomicBool::new(false),
                activity: WorkerActivity::new(worker_count),
                wait_timeout: config.wait_timeout(),
                io_timeout: config.io_timeout(),
            }),
            workers: Mutex::new(Vec::new()),
            worker_count,
        })
    }

    /// Dirección real del listener (útil con puerto 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.shared.listener.local_addr()
    }

    /// Lanza los workers y retorna de inmediato
    pub fn listen(&self) -> Result<()> {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if !workers.is_empty() {
            return Err(ServerError::AlreadyListening);
        }

        // Los workers heredan la máscara del thread que los lanza
        signal::block_sigpipe().map_err(ServerError::SignalMask)?;
        self.shared.running.store(true, Ordering::Release);

        for id in 0..self.worker_count {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || shared.worker_loop(id));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    self.shared.running.store(false, Ordering::Release);
                    for handle in workers.drain(..) {
                        let _ = handle.join();
                    }
                    return Err(ServerError::Spawn(e));
                }
            }
        }

        info!(workers = self.worker_count, "workers en ejecución");
        Ok(())
    }

    /// Detiene los workers y espera a que terminen
    ///
    /// Cada worker sale tras su espera actual sobre epoll (a lo sumo
    /// `wait_timeout`). Las conexiones abiertas se cierran al destruir el
    /// servidor.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if handle.join().is_err() {
                error!("un worker terminó con panic");
            }
        }
        info!("servidor detenido");
    }

    /// Conexiones registradas y ocupación de cada worker
    pub fn list_clients(&self) -> ClientsSnapshot {
        ClientsSnapshot {
            connections: self.shared.registry.len(),
            workers: self.shared.activity.states(),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl<P: Protocol> Drop for Server<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<P: Protocol> Shared<P> {
    fn worker_loop(&self, id: usize) {
        debug!(worker = id, "worker iniciado");

        while self.running.load(Ordering::Acquire) {
            let event = match self.poller.wait(self.wait_timeout) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    error!(worker = id, error = %e, "epoll_wait falló");
                    break;
                }
            };

            self.activity.set_busy(id);
            if event.fd == self.listener.as_raw_fd() {
                self.accept_all();
            } else {
                self.serve(event);
            }
            self.activity.set_idle(id);
        }

        debug!(worker = id, "worker terminado");
    }

    /// Acepta hasta que el listener no tenga conexiones pendientes
    fn accept_all(&self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.register(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue
                }
                Err(e) => {
                    warn!(error = %e, "accept falló");
                    break;
                }
            }
        }
    }

    fn register(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(%peer, error = %e, "no se pudo configurar la conexión");
            return;
        }
        let _ = stream.set_nodelay(true);

        let stream = BufferedStream::new(Socket::new(stream, peer), self.io_timeout);
        match self.registry.insert(&self.poller, Connection::new(stream)) {
            Ok(connection) => info!(%peer, fd = connection.fd(), "conexión aceptada"),
            Err(e) => warn!(%peer, error = %e, "no se pudo registrar la conexión"),
        }
    }

    fn serve(&self, event: Event) {
        let Some(connection) = self.registry.lookup(&self.poller, event.fd) else {
            debug!(fd = event.fd, "evento para una conexión ya removida");
            return;
        };

        let finished = event.readable && self.drain(&connection);

        if event.hangup || finished {
            if self.registry.remove(&self.poller, event.fd).is_some() {
                debug!(peer = %connection.peer_addr(), fd = event.fd, "conexión cerrada");
            }
        }
    }

    /// Procesa requests mientras haya datos inmediatos
    ///
    /// Retorna `true` si la conexión ya no puede usarse.
    fn drain(&self, connection: &Connection) -> bool {
        loop {
            let mut stream = match connection.claim() {
                Claim::Owned(stream) => stream,
                Claim::Busy => {
                    debug!(fd = connection.fd(), "conexión tomada por otro worker");
                    return false;
                }
                Claim::Poisoned => return true,
            };

            stream.clear();
            while stream.is_good() {
                self.protocol.handle_request(&mut stream);
            }
            let finished = stream.is_finished();
            drop(stream);

            if finished {
                return true;
            }
            // Bytes que llegaron con el flag tomado no generan otro evento
            if !self.readable_now(connection.fd()) {
                return false;
            }
        }
    }

    fn readable_now(&self, fd: RawFd) -> bool {
        wait_fd(fd, libc::POLLIN, Some(Duration::ZERO)).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::time::Instant;

    /// Protocolo de prueba: devuelve cada línea recibida
    struct LineEcho;

    impl Protocol for LineEcho {
        fn handle_request(&self, stream: &mut BufferedStream) {
            if let Some(line) = stream.try_read_line() {
                let _ = writeln!(stream, "{}", line);
                let _ = stream.flush();
            }
        }
    }

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            workers: Some(2),
            wait_timeout_ms: 50,
            io_timeout_ms: 1000,
            ..Config::default()
        }
    }

    fn start() -> Server<LineEcho> {
        let server = Server::new(&test_config(), LineEcho).unwrap();
        server.listen().unwrap();
        server
    }

    fn connect(server: &Server<LineEcho>) -> TcpStream {
        let client = TcpStream::connect(server.local_addr().unwrap()).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_new_binds_ephemeral_port() {
        let server = Server::new(&test_config(), LineEcho).unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.connection_count(), 0);
    }

    #[test]
    fn test_bind_conflict_is_fatal() {
        let first = Server::new(&test_config(), LineEcho).unwrap();
        let mut config = test_config();
        config.port = first.local_addr().unwrap().port();

        match Server::new(&config, LineEcho) {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr.port(), config.port),
            other => panic!("expected bind error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.workers = Some(0);
        assert!(matches!(
            Server::new(&config, LineEcho),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_listen_twice_fails() {
        let server = start();
        assert!(matches!(server.listen(), Err(ServerError::AlreadyListening)));
    }

    #[test]
    fn test_pipelined_lines_all_answered() {
        let server = start();
        let mut client = connect(&server);
        client.write_all(b"uno\r\ndos\r\ntres\r\n").unwrap();

        let mut reader = BufReader::new(client);
        for expected in ["uno", "dos", "tres"] {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line.trim_end(), expected);
        }
    }

    #[test]
    fn test_concurrent_clients() {
        let server = start();
        let addr = server.local_addr().unwrap();

        let clients: Vec<_> = (0..8)
            .map(|c| {
                thread::spawn(move || {
                    let client = TcpStream::connect(addr).unwrap();
                    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
                    let mut writer = client.try_clone().unwrap();
                    let mut reader = BufReader::new(client);
                    for i in 0..20 {
                        writeln!(writer, "cliente {} mensaje {}", c, i).unwrap();
                        let mut line = String::new();
                        reader.read_line(&mut line).unwrap();
                        assert_eq!(line.trim_end(), format!("cliente {} mensaje {}", c, i));
                    }
                })
            })
            .collect();

        for client in clients {
            client.join().unwrap();
        }
    }

    #[test]
    fn test_disconnect_removes_connection() {
        let server = start();
        let client = connect(&server);
        assert!(wait_for(|| server.connection_count() == 1));

        drop(client);
        assert!(wait_for(|| server.connection_count() == 0));
    }

    #[test]
    fn test_half_close_still_answered() {
        let server = start();
        let mut client = connect(&server);
        client.write_all(b"adios\n").unwrap();
        client.shutdown(std::net::Shutdown::Write).unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).unwrap();
        assert_eq!(response, "adios\n");
        assert!(wait_for(|| server.connection_count() == 0));
    }

    #[test]
    fn test_list_clients_snapshot() {
        let server = start();
        let _a = connect(&server);
        let _b = connect(&server);
        assert!(wait_for(|| server.connection_count() == 2));

        let snapshot = server.list_clients();
        assert_eq!(snapshot.connections, 2);
        assert_eq!(snapshot.workers.len(), 2);
    }

    #[test]
    fn test_stop_joins_workers() {
        let server = start();
        let started = Instant::now();
        server.stop();
        assert!(started.elapsed() < Duration::from_secs(2));

        // Después de stop se puede volver a escuchar
        server.listen().unwrap();
        server.stop();
    }
}
