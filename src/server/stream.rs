//! # Stream con Buffer sobre un Socket
//! src/server/stream.rs
//!
//! `BufferedStream` mantiene dos buffers fijos de 4 KiB (lectura y
//! escritura) sobre un `Socket` no bloqueante.
//!
//! ## Lecturas
//!
//! Cada recarga hace un único `recv`. El resultado es de tres vías
//! (`ReadResult`): hay datos, todavía no hay datos, o la conexión terminó.
//! El estado del stream distingue además el cierre ordenado del peer
//! (`Closed`) de un error real del socket (`Failed`).
//!
//! ```text
//!   Good ──recv=WouldBlock──▶ Exhausted ──clear()/datos──▶ Good
//!     │                                                      │
//!     ├──recv=0──────────────▶ Closed   (terminal)           │
//!     └──error / timeout─────▶ Failed   (terminal) ◀─────────┘
//! ```
//!
//! ## Escrituras
//!
//! Los bytes se acumulan hasta llenar el buffer o hasta un `flush`. Si un
//! `send` bloquearía, se espera disponibilidad de escritura (acotada) y se
//! reintenta una vez; si sigue sin avanzar, el stream pasa a `Failed`.

use super::socket::Socket;
use crate::http::response::ResponseHead;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::{Duration, Instant};
use tracing::warn;

/// Tamaño de cada buffer (lectura y escritura)
pub const BUFFER_SIZE: usize = 4096;

/// Longitud máxima de una línea (request line o header)
pub const MAX_LINE: usize = 8192;

/// Estado del stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Operativo
    Good,
    /// La última lectura no encontró datos disponibles (transitorio)
    Exhausted,
    /// El peer cerró su lado de escritura
    Closed,
    /// Error de socket o espera agotada
    Failed,
}

/// Resultado de una lectura
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    /// Se obtuvieron `n` bytes
    Data(usize),
    /// Todavía no hay datos; reintentar tras esperar disponibilidad
    NotYet,
    /// La conexión se cerró o falló
    Closed,
}

/// Stream de bytes con buffer sobre un `Socket`
pub struct BufferedStream {
    socket: Socket,
    read_buf: Box<[u8; BUFFER_SIZE]>,
    read_pos: usize,
    read_len: usize,
    write_buf: Vec<u8>,
    state: StreamState,
    io_timeout: Duration,
    total_read: u64,
}

impl BufferedStream {
    /// Crea un stream sobre `socket`
    ///
    /// `io_timeout` acota las esperas internas: el resto de una línea ya
    /// empezada, un cuerpo parcial, o espacio de escritura.
    pub fn new(socket: Socket, io_timeout: Duration) -> Self {
        Self {
            socket,
            read_buf: Box::new([0u8; BUFFER_SIZE]),
            read_pos: 0,
            read_len: 0,
            write_buf: Vec::with_capacity(BUFFER_SIZE),
            state: StreamState::Good,
            io_timeout,
            total_read: 0,
        }
    }

    // === Estado ===

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_good(&self) -> bool {
        self.state == StreamState::Good
    }

    /// `true` si la conexión ya no puede usarse (cerrada o fallida)
    pub fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Closed | StreamState::Failed)
    }

    /// Limpia el estado transitorio `Exhausted`
    ///
    /// Los estados `Closed` y `Failed` son terminales y se conservan.
    pub fn clear(&mut self) {
        if self.state == StreamState::Exhausted {
            self.state = StreamState::Good;
        }
    }

    /// Marca la conexión como inutilizable (p.ej. se perdió el framing)
    pub fn mark_failed(&mut self) {
        self.state = StreamState::Failed;
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Total de bytes consumidos del socket desde la creación
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    /// `true` si hay bytes ya recibidos pendientes de consumir
    pub fn has_buffered(&self) -> bool {
        self.read_pos < self.read_len
    }

    /// Espera datos en el socket hasta `timeout`
    pub fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        if self.has_buffered() {
            return Ok(true);
        }
        self.socket.wait_readable(Some(timeout))
    }

    // === Lectura ===

    /// Un único `recv` hacia el buffer de lectura (que debe estar vacío)
    fn fill(&mut self) -> ReadResult {
        if self.is_finished() {
            return ReadResult::Closed;
        }
        loop {
            match self.socket.recv(&mut self.read_buf[..]) {
                Ok(0) => {
                    self.state = StreamState::Closed;
                    return ReadResult::Closed;
                }
                Ok(n) => {
                    self.read_pos = 0;
                    self.read_len = n;
                    if self.state == StreamState::Exhausted {
                        self.state = StreamState::Good;
                    }
                    return ReadResult::Data(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.state = StreamState::Exhausted;
                    return ReadResult::NotYet;
                }
                Err(e) => {
                    warn!(peer = %self.socket.peer_addr(), error = %e, "fallo de lectura");
                    self.state = StreamState::Failed;
                    return ReadResult::Closed;
                }
            }
        }
    }

    /// Como `fill`, pero espera disponibilidad hasta `deadline`
    fn fill_until(&mut self, deadline: Instant) -> ReadResult {
        loop {
            match self.fill() {
                ReadResult::NotYet => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return ReadResult::NotYet;
                    }
                    match self.socket.wait_readable(Some(left)) {
                        Ok(true) => continue,
                        Ok(false) => return ReadResult::NotYet,
                        Err(e) => {
                            warn!(peer = %self.socket.peer_addr(), error = %e, "poll falló");
                            self.state = StreamState::Failed;
                            return ReadResult::Closed;
                        }
                    }
                }
                other => return other,
            }
        }
    }

    fn consume(&mut self, n: usize) {
        self.read_pos += n;
        self.total_read += n as u64;
    }

    /// Lee lo que haya disponible sin esperar
    pub fn read_some(&mut self, buf: &mut [u8]) -> ReadResult {
        if buf.is_empty() {
            return ReadResult::Data(0);
        }
        if !self.has_buffered() {
            if let other @ (ReadResult::NotYet | ReadResult::Closed) = self.fill() {
                return other;
            }
        }
        let n = buf.len().min(self.read_len - self.read_pos);
        buf[..n].copy_from_slice(&self.read_buf[self.read_pos..self.read_pos + n]);
        self.consume(n);
        ReadResult::Data(n)
    }

    /// Consume exactamente `n` bytes entregándolos a `sink`, esperando hasta `io_timeout`
    fn take(&mut self, n: usize, mut sink: impl FnMut(&[u8])) -> ReadResult {
        let deadline = Instant::now() + self.io_timeout;
        let mut left = n;
        while left > 0 {
            if !self.has_buffered() {
                if let other @ (ReadResult::NotYet | ReadResult::Closed) = self.fill_until(deadline) {
                    return other;
                }
            }
            let chunk = left.min(self.read_len - self.read_pos);
            sink(&self.read_buf[self.read_pos..self.read_pos + chunk]);
            self.consume(chunk);
            left -= chunk;
        }
        ReadResult::Data(n)
    }

    /// Llena `buf` por completo, esperando datos parciales hasta `io_timeout`
    ///
    /// `NotYet` significa que la espera se agotó; los bytes recibidos hasta
    /// entonces ya fueron consumidos, así que el llamador debe considerar
    /// perdido el framing de la conexión.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> ReadResult {
        let mut filled = 0;
        self.take(buf.len(), |chunk| {
            buf[filled..filled + chunk.len()].copy_from_slice(chunk);
            filled += chunk.len();
        })
    }

    /// Descarta `n` bytes (p.ej. un cuerpo que ningún handler leyó)
    pub fn discard(&mut self, n: usize) -> ReadResult {
        self.take(n, |_| {})
    }

    /// Lee una línea sin esperar si no hay nada disponible
    ///
    /// Retorna `None` cuando no hay ningún byte listo (el stream queda en
    /// `Exhausted`), o cuando la conexión terminó. Si la línea ya empezó a
    /// llegar, espera el resto hasta `io_timeout`.
    pub fn try_read_line(&mut self) -> Option<String> {
        self.read_line_inner(false)
    }

    /// Lee una línea esperando hasta `io_timeout`
    ///
    /// Se usa para los headers, una vez que la request line ya llegó.
    pub fn read_line(&mut self) -> Option<String> {
        self.read_line_inner(true)
    }

    fn read_line_inner(&mut self, wait_first: bool) -> Option<String> {
        let deadline = Instant::now() + self.io_timeout;
        let mut line: Vec<u8> = Vec::new();

        loop {
            if !self.has_buffered() {
                let waiting = wait_first || !line.is_empty();
                let result = if waiting {
                    self.fill_until(deadline)
                } else {
                    self.fill()
                };
                match result {
                    ReadResult::Data(_) => {}
                    ReadResult::NotYet if !waiting => return None,
                    ReadResult::NotYet => {
                        warn!(peer = %self.socket.peer_addr(), "línea incompleta tras el timeout");
                        self.state = StreamState::Failed;
                        return None;
                    }
                    ReadResult::Closed => return None,
                }
            }

            let available = &self.read_buf[self.read_pos..self.read_len];
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    line.extend_from_slice(&available[..i]);
                    self.consume(i + 1);
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    return Some(String::from_utf8_lossy(&line).into_owned());
                }
                None => {
                    let n = available.len();
                    line.extend_from_slice(available);
                    self.consume(n);
                    if line.len() > MAX_LINE {
                        warn!(peer = %self.socket.peer_addr(), "línea demasiado larga");
                        self.state = StreamState::Failed;
                        return None;
                    }
                }
            }
        }
    }

    // === Escritura ===

    fn fail_write(&mut self, err: io::Error) -> io::Error {
        warn!(peer = %self.socket.peer_addr(), error = %err, "fallo de escritura");
        self.state = StreamState::Failed;
        self.write_buf.clear();
        err
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.state == StreamState::Failed {
            self.write_buf.clear();
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream failed"));
        }

        let mut offset = 0;
        let mut waited = false;
        while offset < self.write_buf.len() {
            match self.socket.send(&self.write_buf[offset..]) {
                Ok(0) => return Err(self.fail_write(io::ErrorKind::WriteZero.into())),
                Ok(n) => {
                    offset += n;
                    waited = false;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock && !waited => {
                    waited = true;
                    if let Err(e) = self.socket.wait_writable(Some(self.io_timeout)) {
                        return Err(self.fail_write(e));
                    }
                }
                Err(e) => return Err(self.fail_write(e)),
            }
        }
        self.write_buf.clear();
        Ok(())
    }

    /// Envía `len` bytes de `file` con transferencia zero-copy
    ///
    /// Primero vacía el buffer de escritura para conservar el orden.
    pub fn transfer_file(&mut self, file: &File, len: u64) -> io::Result<()> {
        self.flush()?;
        match self.socket.send_file(file, len, self.io_timeout) {
            Ok(sent) if sent == len => Ok(()),
            Ok(sent) => Err(self.fail_write(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank during transfer: sent {} of {} bytes", sent, len),
            ))),
            Err(e) => Err(self.fail_write(e)),
        }
    }

    // === Respuestas ===

    /// Respuesta mínima `text/html` cuyo cuerpo es `message`
    pub fn status(&mut self, code: u16, message: &str) -> io::Result<()> {
        self.send(code, message, "text/html", message.as_bytes())
    }

    /// Headers con `Content-Length` calculado, seguido de `body`
    pub fn send(&mut self, code: u16, message: &str, content_type: &str, body: &[u8]) -> io::Result<()> {
        let head = ResponseHead::new(code, message, content_type, body.len() as u64);
        write!(self, "{}", head)?;
        self.write_all(body)?;
        self.flush()
    }

    /// Como `send`, pero copia el contenido completo de `source`
    ///
    /// El largo es el tamaño total de `source`; se lee desde el inicio.
    pub fn send_reader<R: Read + Seek>(
        &mut self,
        code: u16,
        message: &str,
        content_type: &str,
        source: &mut R,
    ) -> io::Result<()> {
        let len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let head = ResponseHead::new(code, message, content_type, len);
        write!(self, "{}", head)?;
        io::copy(source, self)?;
        self.flush()
    }
}

impl Write for BufferedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state == StreamState::Failed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream failed"));
        }
        if self.write_buf.len() == BUFFER_SIZE {
            self.flush_buffer()?;
        }
        let n = buf.len().min(BUFFER_SIZE - self.write_buf.len());
        self.write_buf.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()
    }
}

impl Drop for BufferedStream {
    fn drop(&mut self) {
        if !self.write_buf.is_empty() && self.state != StreamState::Failed {
            let _ = self.flush_buffer();
        }
    }
}
