//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Subconjunto conservador de HTTP/1.1 sobre el engine:
//!
//! - Parsing de la request line y de `Content-Length`
//! - Cabecera de respuesta (`Content-Type` + `Content-Length`)
//! - Códigos de estado
//! - `HttpProtocol`: el framer que el engine invoca por cada request
//!
//! No hay chunked transfer encoding ni negociación de keep-alive: la
//! conexión simplemente se reutiliza mientras el cliente siga enviando.

pub mod protocol; // Framer: lee un request y lo despacha al router
pub mod request; // Parsing de request line y headers
pub mod response; // Cabecera de respuesta
pub mod status; // Códigos de estado HTTP

pub use protocol::HttpProtocol;
pub use request::{Method, RequestHead};
pub use response::ResponseHead;
pub use status::StatusCode;
