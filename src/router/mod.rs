//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Dos tablas que se configuran antes de `listen()` y no cambian después:
//!
//! - rutas exactas `(path, método) → handler`
//! - montajes estáticos `prefijo → directorio`
//!
//! ```text
//! Request → ¿ruta exacta? ──sí──▶ handler(stream, body_len)
//!              │ no
//!              ▼
//!          ¿prefijo montado más largo? ──sí──▶ archivo / index.html / listado
//!              │ no
//!              ▼
//!          404 (render_status)
//! ```
//!
//! El router no guarda estado entre requests.

pub mod static_files;

use crate::http::{Method, StatusCode};
use crate::server::BufferedStream;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Tipo de función handler
///
/// Recibe el stream de la conexión (con el cuerpo aún sin leer) y el largo
/// del cuerpo declarado en `Content-Length`. Debe escribir la respuesta
/// completa.
pub type Handler = Box<dyn Fn(&mut BufferedStream, usize) -> io::Result<()> + Send + Sync>;

/// Clave de una ruta exacta
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub path: String,
    pub method: Method,
}

/// Router de rutas exactas y montajes estáticos
pub struct Router {
    routes: HashMap<RouteKey, Handler>,
    mounts: HashMap<String, PathBuf>,
    status_dir: PathBuf,
}

impl Router {
    /// Crea un router vacío con páginas de estado en `./fixed`
    pub fn new() -> Self {
        Self::with_status_dir("./fixed")
    }

    /// Crea un router vacío que busca `<code>.html` en `status_dir`
    pub fn with_status_dir(status_dir: impl Into<PathBuf>) -> Self {
        Self {
            routes: HashMap::new(),
            mounts: HashMap::new(),
            status_dir: status_dir.into(),
        }
    }

    /// Registra una ruta exacta
    ///
    /// # Ejemplo
    /// ```
    /// use epoll_http::http::Method;
    /// use epoll_http::router::Router;
    ///
    /// let mut router = Router::new();
    /// router.add_route(Method::GET, "/hello", |stream, _| stream.status(200, "hello"));
    /// assert_eq!(router.route_count(), 1);
    /// ```
    pub fn add_route<F>(&mut self, method: Method, path: &str, handler: F)
    where
        F: Fn(&mut BufferedStream, usize) -> io::Result<()> + Send + Sync + 'static,
    {
        let key = RouteKey {
            path: path.to_string(),
            method,
        };
        self.routes.insert(key, Box::new(handler));
    }

    pub fn get<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut BufferedStream, usize) -> io::Result<()> + Send + Sync + 'static,
    {
        self.add_route(Method::GET, path, handler);
    }

    pub fn post<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut BufferedStream, usize) -> io::Result<()> + Send + Sync + 'static,
    {
        self.add_route(Method::POST, path, handler);
    }

    pub fn put<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut BufferedStream, usize) -> io::Result<()> + Send + Sync + 'static,
    {
        self.add_route(Method::PUT, path, handler);
    }

    pub fn delete<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut BufferedStream, usize) -> io::Result<()> + Send + Sync + 'static,
    {
        self.add_route(Method::DELETE, path, handler);
    }

    /// Monta `dir` bajo el prefijo `prefix`
    ///
    /// Para montar un directorio completo el prefijo debe terminar en `/`
    /// (`/dir/`); el resto del path se resuelve dentro de `dir`.
    pub fn serve(&mut self, prefix: &str, dir: impl Into<PathBuf>) {
        self.mounts.insert(prefix.to_string(), dir.into());
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Busca el montaje más largo que contiene `path`
    ///
    /// Prueba primero el path completo y luego cada prefijo terminado en `/`,
    /// del más largo al más corto. Retorna el directorio y el resto del path.
    fn find_mount<'a>(&'a self, path: &'a str) -> Option<(&'a Path, &'a str)> {
        if let Some(root) = self.mounts.get(path) {
            return Some((root, ""));
        }

        let mut end = path.len();
        while let Some(i) = path[..end].rfind('/') {
            if let Some(root) = self.mounts.get(&path[..=i]) {
                return Some((root, &path[i + 1..]));
            }
            end = i;
        }
        None
    }

    /// Despacha un request ya parseado
    pub fn handle_request(
        &self,
        method: Method,
        path: &str,
        stream: &mut BufferedStream,
        body_len: usize,
    ) -> io::Result<()> {
        let key = RouteKey {
            path: path.to_string(),
            method,
        };
        if let Some(handler) = self.routes.get(&key) {
            return handler(stream, body_len);
        }

        let path = path.split('?').next().unwrap_or_default();
        match self.find_mount(path) {
            Some((root, sub)) => self.serve_static(stream, root, sub),
            None => {
                debug!(%method, path, "sin ruta ni montaje");
                self.render_not_found(stream)
            }
        }
    }

    fn serve_static(&self, stream: &mut BufferedStream, root: &Path, sub: &str) -> io::Result<()> {
        // Solo segmentos normales: ni `..` ni raíz absoluta (`//etc/passwd`)
        if !Path::new(sub).components().all(|c| matches!(c, Component::Normal(_))) {
            return self.render_not_found(stream);
        }

        let local = root.join(sub);
        if sub.is_empty() || sub.ends_with('/') {
            if static_files::send_file(stream, &local.join("index.html"), 200, "OK")? {
                return Ok(());
            }
            return match static_files::dir_listing(&local) {
                Ok(html) => stream.send(200, "OK", static_files::HTML_CONTENT_TYPE, html.as_bytes()),
                Err(e) => {
                    debug!(dir = %local.display(), error = %e, "no se pudo listar el directorio");
                    self.render_not_found(stream)
                }
            };
        }

        if static_files::send_file(stream, &local, 200, "OK")? {
            return Ok(());
        }
        self.render_not_found(stream)
    }

    fn render_not_found(&self, stream: &mut BufferedStream) -> io::Result<()> {
        let status = StatusCode::NotFound;
        self.render_status(stream, status.as_u16(), status.reason_phrase())
    }

    /// Responde con `<status_dir>/<code>.html` si existe, o con `stream.status`
    pub fn render_status(&self, stream: &mut BufferedStream, code: u16, message: &str) -> io::Result<()> {
        let page = self.status_dir.join(format!("{}.html", code));
        if static_files::send_file(stream, &page, code, message)? {
            return Ok(());
        }
        stream.status(code, message)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
