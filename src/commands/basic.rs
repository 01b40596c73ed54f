//! # Comandos de Demostración
//! src/commands/basic.rs
//!
//! - `GET /wait`: simula un handler lento (duerme y luego responde)
//! - `POST /sort`: ordena una lista de enteros enviada en el cuerpo

use crate::http::StatusCode;
use crate::server::{BufferedStream, ReadResult};
use std::io;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Cuerpo máximo aceptado por `/sort`
pub const MAX_SORT_BODY: usize = 16 * 1024 * 1024;

/// Handler para /wait
///
/// Duerme `delay` y responde `200 DONT LOOK AT ME`. Mientras duerme, el
/// worker queda ocupado pero las demás conexiones siguen atendidas por el
/// resto del pool.
pub fn wait_handler(delay: Duration) -> impl Fn(&mut BufferedStream, usize) -> io::Result<()> + Send + Sync + 'static {
    move |stream: &mut BufferedStream, _body_len: usize| {
        thread::sleep(delay);
        stream.send(200, "OK", "text/html", b"DONT LOOK AT ME")
    }
}

/// Handler para /sort
///
/// Lee exactamente `body_len` bytes (esperando hasta el timeout de I/O si
/// el cuerpo llega en partes), los interpreta como enteros separados por
/// espacios y responde el arreglo ordenado en JSON.
///
/// # Ejemplo
/// ```text
/// POST /sort HTTP/1.1
/// Content-Length: 6
///
/// 3 1 2
/// ```
/// responde `[1, 2, 3]`.
pub fn sort_handler(stream: &mut BufferedStream, body_len: usize) -> io::Result<()> {
    if body_len > MAX_SORT_BODY {
        let status = StatusCode::BadRequest;
        stream.status(status.as_u16(), status.reason_phrase())?;
        // No se va a leer el cuerpo: la conexión pierde el framing
        stream.mark_failed();
        return Ok(());
    }

    let mut body = vec![0u8; body_len];
    match stream.read_exact(&mut body) {
        ReadResult::Data(_) => {}
        ReadResult::NotYet => {
            debug!(peer = %stream.socket().peer_addr(), body_len, "cuerpo incompleto");
            let status = StatusCode::RequestTimeout;
            stream.status(status.as_u16(), status.reason_phrase())?;
            stream.mark_failed();
            return Ok(());
        }
        ReadResult::Closed => return Ok(()),
    }

    let text = String::from_utf8_lossy(&body);
    let Some(mut numbers) = parse_numbers(&text) else {
        let status = StatusCode::BadRequest;
        return stream.status(status.as_u16(), status.reason_phrase());
    };

    numbers.sort_unstable();
    stream.send(200, "OK", "application/json", to_json_array(&numbers).as_bytes())
}

/// Parsea enteros separados por espacios en blanco
///
/// Retorna `None` si algún token no es un entero o si no hay ninguno.
///
/// # Ejemplo
/// ```
/// use epoll_http::commands::parse_numbers;
///
/// assert_eq!(parse_numbers("3 -1\n2"), Some(vec![3, -1, 2]));
/// assert_eq!(parse_numbers("3 x"), None);
/// assert_eq!(parse_numbers(""), None);
/// ```
pub fn parse_numbers(text: &str) -> Option<Vec<i64>> {
    let numbers = text
        .split_whitespace()
        .map(|token| token.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;

    if numbers.is_empty() {
        return None;
    }
    Some(numbers)
}

/// Formatea como arreglo JSON: `[1, 2, 3]`
pub fn to_json_array(values: &[i64]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}
