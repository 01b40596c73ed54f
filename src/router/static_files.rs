//! # Archivos Estáticos
//! src/router/static_files.rs
//!
//! Envío de archivos con `sendfile` y listados de directorio en HTML.

use crate::http::ResponseHead;
use crate::server::BufferedStream;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Content-Type de `.html` y de los listados de directorio
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Content-Type según la extensión (tabla fija)
///
/// # Ejemplo
/// ```
/// use epoll_http::router::static_files::content_type;
/// use std::path::Path;
///
/// assert_eq!(content_type(Path::new("logo.png")), "image/png");
/// assert_eq!(content_type(Path::new("notes")), "text/plain; charset=utf-8");
/// ```
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html") => HTML_CONTENT_TYPE,
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("json") => "application/json; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    }
}

/// Envía `path` como respuesta completa
///
/// Retorna `Ok(false)` sin escribir nada si el archivo no se puede abrir o
/// es un directorio.
pub fn send_file(stream: &mut BufferedStream, path: &Path, code: u16, message: &str) -> io::Result<bool> {
    let Ok(file) = File::open(path) else {
        return Ok(false);
    };
    let Ok(metadata) = file.metadata() else {
        return Ok(false);
    };
    if metadata.is_dir() {
        return Ok(false);
    }

    let len = metadata.len();
    write!(stream, "{}", ResponseHead::new(code, message, content_type(path), len))?;
    stream.transfer_file(&file, len)?;
    Ok(true)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Genera el listado HTML de `dir`, un enlace por entrada
///
/// Las entradas se ordenan por nombre y los directorios llevan `/` al final.
pub fn dir_listing(dir: &Path) -> io::Result<String> {
    let mut entries: Vec<(String, bool)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // Sigue symlinks: un enlace a directorio se lista como directorio
        let is_dir = fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false);
        entries.push((name, is_dir));
    }
    entries.sort();

    let mut html = String::new();
    for (name, is_dir) in entries {
        let name = escape_html(&name);
        let suffix = if is_dir { "/" } else { "" };
        html.push_str(&format!("<a href=\"./{0}{1}\">{0}{1}</a><br>\n", name, suffix));
    }
    Ok(html)
}
