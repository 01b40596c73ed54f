//! # Parsing de Requests HTTP/1.1
//! src/http/request.rs
//!
//! Parser línea a línea: el framer (`http::protocol`) lee cada línea del
//! `BufferedStream` y la entrega aquí. Solo se conserva lo que el router
//! necesita: método, path y largo del cuerpo.
//!
//! ## Formato de un Request
//!
//! ```text
//! POST /sort HTTP/1.1\r\n        ← request line
//! Content-Length: 6\r\n          ← headers (solo interesa Content-Length)
//! \r\n                           ← fin de headers
//! 3 1 2\n                        ← body (lo consume el handler)
//! ```

/// Métodos HTTP reconocidos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
}

impl Method {
    /// Parsea un método HTTP
    ///
    /// Los tokens desconocidos se tratan como `GET`.
    ///
    /// # Ejemplo
    /// ```
    /// use epoll_http::http::Method;
    /// assert_eq!(Method::parse("POST"), Method::POST);
    /// assert_eq!(Method::parse("BREW"), Method::GET);
    /// ```
    pub fn parse(token: &str) -> Self {
        match token {
            "HEAD" => Method::HEAD,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "CONNECT" => Method::CONNECT,
            "OPTIONS" => Method::OPTIONS,
            "TRACE" => Method::TRACE,
            "PATCH" => Method::PATCH,
            _ => Method::GET,
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::PATCH => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request line + headers relevantes de un request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Método HTTP
    pub method: Method,

    /// Path tal como llegó (incluye query string si la hay)
    pub path: String,

    /// Valor de `Content-Length` (0 si falta o es inválido)
    pub content_length: usize,
}

impl RequestHead {
    /// Parsea la request line `METHOD PATH [VERSION]`
    ///
    /// Retorna `None` si la línea está vacía.
    ///
    /// # Ejemplo
    /// ```
    /// use epoll_http::http::{Method, RequestHead};
    ///
    /// let head = RequestHead::from_request_line("GET /index.html HTTP/1.1").unwrap();
    /// assert_eq!(head.method, Method::GET);
    /// assert_eq!(head.path, "/index.html");
    /// assert_eq!(head.content_length, 0);
    /// ```
    pub fn from_request_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let method = Method::parse(tokens.next()?);
        let path = tokens.next().unwrap_or_default().to_string();

        Some(Self {
            method,
            path,
            content_length: 0,
        })
    }

    /// Procesa una línea de header
    ///
    /// Solo `Content-Length` (nombre sin distinguir mayúsculas) modifica el
    /// request; un valor no numérico cuenta como 0.
    pub fn apply_header(&mut self, line: &str) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                self.content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let head = RequestHead::from_request_line("GET / HTTP/1.1").unwrap();
        assert_eq!(head.method, Method::GET);
        assert_eq!(head.path, "/");
    }

    #[test]
    fn test_parse_all_methods() {
        for method in [
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::CONNECT,
            Method::OPTIONS,
            Method::TRACE,
            Method::PATCH,
        ] {
            assert_eq!(Method::parse(method.as_str()), method);
        }
    }

    #[test]
    fn test_unknown_method_folds_to_get() {
        let head = RequestHead::from_request_line("FETCH /x HTTP/1.1").unwrap();
        assert_eq!(head.method, Method::GET);
        assert_eq!(head.path, "/x");
    }

    #[test]
    fn test_method_is_case_sensitive() {
        assert_eq!(Method::parse("post"), Method::GET);
    }

    #[test]
    fn test_empty_request_line() {
        assert!(RequestHead::from_request_line("").is_none());
        assert!(RequestHead::from_request_line("   ").is_none());
    }

    #[test]
    fn test_request_line_without_path() {
        let head = RequestHead::from_request_line("GET").unwrap();
        assert_eq!(head.path, "");
    }

    #[test]
    fn test_path_keeps_query_string() {
        let head = RequestHead::from_request_line("GET /dir/?sort=name HTTP/1.1").unwrap();
        assert_eq!(head.path, "/dir/?sort=name");
    }

    #[test]
    fn test_content_length_header() {
        let mut head = RequestHead::from_request_line("POST /sort HTTP/1.1").unwrap();
        head.apply_header("Host: localhost");
        head.apply_header("Content-Length: 42");
        assert_eq!(head.content_length, 42);
    }

    #[test]
    fn test_content_length_case_insensitive() {
        let mut head = RequestHead::from_request_line("POST /sort HTTP/1.1").unwrap();
        head.apply_header("content-length:7");
        assert_eq!(head.content_length, 7);

        head.apply_header("CONTENT-LENGTH :  9 ");
        assert_eq!(head.content_length, 9);
    }

    #[test]
    fn test_malformed_content_length_is_zero() {
        let mut head = RequestHead::from_request_line("POST /sort HTTP/1.1").unwrap();
        head.apply_header("Content-Length: lots");
        assert_eq!(head.content_length, 0);

        head.apply_header("Content-Length: -3");
        assert_eq!(head.content_length, 0);
    }

    #[test]
    fn test_header_without_colon_ignored() {
        let mut head = RequestHead::from_request_line("GET / HTTP/1.1").unwrap();
        head.apply_header("garbage line");
        assert_eq!(head.content_length, 0);
    }
}
