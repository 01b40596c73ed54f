//! # Conjunto de Readiness (epoll)
//! src/server/poller.rs
//!
//! Un único conjunto epoll compartido por todos los workers. Cada worker
//! bloquea en `wait` pidiendo un solo evento; el kernel reparte los eventos
//! entre los threads que esperan, así que no hace falta una cola propia.
//!
//! - El listener se registra level-triggered: mientras queden conexiones
//!   pendientes, cualquier worker libre será notificado.
//! - Las conexiones se registran edge-triggered con `EPOLLRDHUP`: quien
//!   recibe el evento debe drenar el socket hasta `WouldBlock`.

use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// Tipo de registro de un descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Socket de escucha: lectura, level-triggered
    Listener,
    /// Conexión establecida: lectura + hang-up, edge-triggered
    Connection,
}

impl Interest {
    fn flags(self) -> u32 {
        match self {
            Interest::Listener => libc::EPOLLIN as u32,
            Interest::Connection => (libc::EPOLLIN | libc::EPOLLRDHUP | libc::EPOLLET) as u32,
        }
    }
}

/// Evento entregado por `Poller::wait`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub fd: RawFd,
    pub readable: bool,
    /// El peer cerró (`EPOLLRDHUP`), o hubo hang-up o error en el socket
    pub hangup: bool,
}

impl Event {
    fn from_raw(events: u32, data: u64) -> Self {
        let hangup_mask = (libc::EPOLLRDHUP | libc::EPOLLHUP | libc::EPOLLERR) as u32;
        Self {
            fd: data as RawFd,
            readable: (events & libc::EPOLLIN as u32) != 0,
            hangup: (events & hangup_mask) != 0,
        }
    }
}

/// Conjunto epoll
#[derive(Debug)]
pub struct Poller {
    epfd: OwnedFd,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            epfd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Registra `fd` con el tipo de interés indicado
    pub fn add(&self, fd: RawFd, interest: Interest) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: interest.flags(),
            u64: fd as u64,
        };
        let rc = unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Quita `fd` del conjunto
    pub fn delete(&self, fd: RawFd) -> io::Result<()> {
        // Kernels anteriores a 2.6.9 exigen un puntero no nulo
        let mut event = libc::epoll_event { events: 0, u64: 0 };
        let rc = unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Espera a lo sumo un evento durante `timeout`
    ///
    /// Retorna `Ok(None)` si el tiempo expira o la espera fue interrumpida
    /// por una señal.
    pub fn wait(&self, timeout: Duration) -> io::Result<Option<Event>> {
        let mut event = libc::epoll_event { events: 0, u64: 0 };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        let rc = unsafe { libc::epoll_wait(self.epfd.as_raw_fd(), &mut event, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(None);
        }

        // epoll_event es packed: copiar los campos antes de usarlos
        let events = event.events;
        let data = event.u64;
        Ok(Some(Event::from_raw(events, data)))
    }
}
