//! # Cabecera de Respuestas HTTP
//! src/http/response.rs
//!
//! Las respuestas se escriben directamente sobre el `BufferedStream` de la
//! conexión, así que aquí solo se modela la cabecera. El cuerpo lo escribe
//! quien envía (bytes, un `Read + Seek`, o `sendfile`).
//!
//! ## Formato
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/html\r\n
//! Content-Length: 13\r\n
//! \r\n
//! ```

use std::fmt;

/// Status line + `Content-Type` + `Content-Length`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead<'a> {
    pub code: u16,
    pub message: &'a str,
    pub content_type: &'a str,
    pub content_length: u64,
}

impl<'a> ResponseHead<'a> {
    pub fn new(code: u16, message: &'a str, content_type: &'a str, content_length: u64) -> Self {
        Self {
            code,
            message,
            content_type,
            content_length,
        }
    }
}

impl fmt::Display for ResponseHead<'_> {
    /// Genera la cabecera completa, terminada en la línea vacía
    ///
    /// # Ejemplo
    /// ```
    /// use epoll_http::http::ResponseHead;
    ///
    /// let head = ResponseHead::new(200, "OK", "text/html", 5);
    /// assert_eq!(
    ///     head.to_string(),
    ///     "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 5\r\n\r\n"
    /// );
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
            self.code, self.message, self.content_type, self.content_length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_format() {
        let head = ResponseHead::new(404, "Not Found", "text/html", 9);
        assert_eq!(
            head.to_string(),
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\nContent-Length: 9\r\n\r\n"
        );
    }

    #[test]
    fn test_head_ends_with_blank_line() {
        let head = ResponseHead::new(200, "OK", "application/json", 0).to_string();
        assert!(head.ends_with("\r\n\r\n"));
        assert_eq!(head.matches("\r\n").count(), 4);
    }

    #[test]
    fn test_head_large_length() {
        let head = ResponseHead::new(200, "OK", "image/png", 5_000_000_000);
        assert!(head.to_string().contains("Content-Length: 5000000000\r\n"));
    }
}
