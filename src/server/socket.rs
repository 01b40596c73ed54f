//! # Socket de Conexión
//! src/server/socket.rs
//!
//! Envuelve el descriptor de una conexión aceptada junto con la dirección
//! del peer. El descriptor pertenece exclusivamente al `Socket`: se mueve
//! con él y se cierra una sola vez, cuando su único dueño se destruye.
//!
//! Además expone esperas de disponibilidad (lectura/escritura) sobre un
//! único descriptor con `poll(2)`, y la transferencia zero-copy de archivos
//! con `sendfile(2)`.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Tamaño máximo de cada llamada a `sendfile`
pub const SENDFILE_CHUNK: usize = 409_600;

/// Espera a que `fd` reporte alguno de `events` (`POLLIN`, `POLLOUT`)
///
/// `timeout = None` bloquea indefinidamente. Retorna `Ok(false)` si el
/// tiempo expira sin que el descriptor esté listo. Un hang-up o error del
/// descriptor cuenta como "listo": la siguiente operación lo reportará.
pub fn wait_fd(fd: RawFd, events: libc::c_short, timeout: Option<Duration>) -> io::Result<bool> {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        let timeout_ms = match deadline {
            None => -1,
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                // Redondear hacia arriba para no despertar 1 ms antes de tiempo
                let ms = left.as_micros().div_ceil(1000);
                ms.min(libc::c_int::MAX as u128) as libc::c_int
            }
        };

        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(rc > 0);
    }
}

/// Conexión TCP aceptada con su dirección remota
#[derive(Debug)]
pub struct Socket {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Socket {
    /// Toma posesión de un stream ya aceptado
    ///
    /// El stream debe estar en modo no bloqueante: el engine drena
    /// conexiones hasta `WouldBlock`.
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Espera hasta que haya datos para leer
    pub fn wait_readable(&self, timeout: Option<Duration>) -> io::Result<bool> {
        wait_fd(self.as_raw_fd(), libc::POLLIN, timeout)
    }

    /// Espera hasta que se pueda escribir sin bloquear
    pub fn wait_writable(&self, timeout: Option<Duration>) -> io::Result<bool> {
        wait_fd(self.as_raw_fd(), libc::POLLOUT, timeout)
    }

    pub(crate) fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    pub(crate) fn send(&self, buf: &[u8]) -> io::Result<usize> {
        (&self.stream).write(buf)
    }

    /// Transfiere `len` bytes de `file` (desde su inicio) directamente al socket
    ///
    /// Usa `sendfile(2)` en bloques de `SENDFILE_CHUNK`. Cuando el buffer del
    /// kernel está lleno espera disponibilidad de escritura hasta `timeout`;
    /// si el socket sigue sin aceptar datos retorna `TimedOut`. Retorna los
    /// bytes enviados, que pueden ser menos que `len` si el archivo se acortó.
    pub fn send_file(&self, file: &File, len: u64, timeout: Duration) -> io::Result<u64> {
        let mut offset: libc::off_t = 0;
        let mut sent: u64 = 0;

        while sent < len {
            let chunk = (len - sent).min(SENDFILE_CHUNK as u64) as usize;
            let rc = unsafe {
                libc::sendfile(self.as_raw_fd(), file.as_raw_fd(), &mut offset, chunk)
            };

            if rc > 0 {
                sent += rc as u64;
                continue;
            }
            if rc == 0 {
                break;
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => {
                    if !self.wait_writable(Some(timeout))? {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "socket not writable during file transfer",
                        ));
                    }
                }
                _ => return Err(err),
            }
        }

        Ok(sent)
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}
