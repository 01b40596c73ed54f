//! # epoll_http
//! src/lib.rs
//!
//! Servidor HTTP/1.1 concurrente sobre epoll. Un pool fijo de workers
//! comparte un único conjunto epoll y un único registro de conexiones; cada
//! conexión se drena por completo (edge-triggered) sin serializar las demás.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `server`: Engine TCP (socket, stream con buffer, epoll, registro, workers)
//! - `http`: Parsing de requests, cabecera de respuestas, framer
//! - `router`: Rutas exactas, montajes estáticos y páginas de estado
//! - `commands`: Handlers de demostración (`/wait`, `/sort`)
//! - `metrics`: Snapshot de conexiones y ocupación de workers
//! - `config`: Configuración CLI + variables de entorno
//! - `error`: Errores fatales de arranque
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use epoll_http::config::Config;
//! use epoll_http::http::HttpProtocol;
//! use epoll_http::router::Router;
//! use epoll_http::server::Server;
//!
//! let mut router = Router::new();
//! router.serve("/", "./public");
//! router.get("/hello", |stream, _| stream.status(200, "hello"));
//!
//! let server = Server::new(&Config::default(), HttpProtocol::new(router))?;
//! server.listen()?;
//! // ...
//! server.stop();
//! # Ok::<(), epoll_http::error::ServerError>(())
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod router;
pub mod server;
