//! # Configuración del Servidor
//! src/config.rs
//!
//! Este módulo define la configuración del servidor con soporte completo
//! para argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./epoll_http --port 8080 \
//!   --workers 8 \
//!   --mount /=./public \
//!   --mount /dir/=./
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_HOST=:: WORKERS=4 ./epoll_http
//! ```

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Configuración del servidor HTTP/1.1
#[derive(Debug, Clone, Parser)]
#[command(name = "epoll_http")]
#[command(about = "Servidor HTTP/1.1 concurrente sobre epoll")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Host/IP en el que escucha (IPv6 por defecto)
    #[arg(long, default_value = "::1", env = "HTTP_HOST")]
    pub host: String,

    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Número de threads worker (por defecto: núcleos disponibles)
    #[arg(short, long, env = "WORKERS")]
    pub workers: Option<usize>,

    // === Timeouts ===

    /// Espera máxima de cada worker sobre epoll antes de revisar el flag de parada
    #[arg(long = "wait-timeout-ms", default_value = "1000", env = "WAIT_TIMEOUT_MS")]
    pub wait_timeout_ms: u64,

    /// Espera máxima por datos o por espacio de escritura en una conexión
    #[arg(long = "io-timeout-ms", default_value = "5000", env = "IO_TIMEOUT_MS")]
    pub io_timeout_ms: u64,

    // === Contenido ===

    /// Directorio con páginas de estado fijas (`<code>.html`)
    #[arg(long = "status-dir", default_value = "./fixed", env = "STATUS_DIR")]
    pub status_dir: String,

    /// Montajes estáticos `PREFIJO=DIRECTORIO` (repetible)
    #[arg(
        long = "mount",
        value_name = "PREFIX=DIR",
        default_value = "/=./public",
        value_delimiter = ',',
        env = "MOUNTS"
    )]
    pub mounts: Vec<String>,

    /// Duración del handler lento `/wait` en milisegundos
    #[arg(long = "slow-ms", default_value = "5000", env = "SLOW_MS")]
    pub slow_ms: u64,

    /// No leer comandos de stdin (`ls`, `exit`)
    #[arg(long = "no-console", env = "NO_CONSOLE")]
    pub no_console: bool,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Dirección completa para bind
    ///
    /// # Ejemplo
    /// ```rust
    /// use epoll_http::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.socket_addr().unwrap().to_string(), "[::1]:8080");
    /// ```
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let ip: IpAddr = host
            .parse()
            .map_err(|_| format!("Invalid host: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Número efectivo de workers
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Parsea los montajes `PREFIJO=DIRECTORIO`
    ///
    /// # Ejemplo
    /// ```rust
    /// use epoll_http::config::Config;
    ///
    /// let mut config = Config::default();
    /// config.mounts = vec!["/dir/=/srv/files".to_string()];
    /// let mounts = config.mounts().unwrap();
    /// assert_eq!(mounts[0].0, "/dir/");
    /// ```
    pub fn mounts(&self) -> Result<Vec<(String, PathBuf)>, String> {
        self.mounts
            .iter()
            .map(|entry| {
                let (prefix, dir) = entry
                    .split_once('=')
                    .ok_or_else(|| format!("Invalid mount (expected PREFIX=DIR): {}", entry))?;
                if !prefix.starts_with('/') {
                    return Err(format!("Mount prefix must start with '/': {}", prefix));
                }
                if dir.is_empty() {
                    return Err(format!("Mount directory is empty: {}", entry));
                }
                Ok((prefix.to_string(), PathBuf::from(dir)))
            })
            .collect()
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        self.socket_addr()?;

        if self.workers == Some(0) {
            return Err("Workers must be >= 1".to_string());
        }

        // Con 0 ms epoll_wait no bloquea
        if self.wait_timeout_ms == 0 {
            return Err("Wait timeout must be > 0".to_string());
        }
        if self.io_timeout_ms == 0 {
            return Err("IO timeout must be > 0".to_string());
        }

        self.mounts()?;
        Ok(())
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║              epoll_http Server Configuration                ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        match self.socket_addr() {
            Ok(addr) => println!("   Address:      {}", addr),
            Err(e) => println!("   Address:      <{}>", e),
        }
        println!("   Workers:      {}", self.worker_count());
        println!();
        println!("⏱  Timeouts:");
        println!("   epoll wait:   {} ms", self.wait_timeout_ms);
        println!("   I/O wait:     {} ms", self.io_timeout_ms);
        println!();
        println!("📁 Static mounts:");
        for entry in &self.mounts {
            println!("   {}", entry);
        }
        println!("   Status pages: {}", self.status_dir);
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            host: "::1".to_string(),
            port: 8080,
            workers: None,
            wait_timeout_ms: 1000,
            io_timeout_ms: 5000,
            status_dir: "./fixed".to_string(),
            mounts: vec!["/=./public".to_string()],
            slow_ms: 5000,
            no_console: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "::1");
        assert_eq!(config.wait_timeout_ms, 1000);
        assert_eq!(config.io_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_socket_addr_ipv6() {
        let config = Config::default();
        let addr = config.socket_addr().unwrap();
        assert!(addr.is_ipv6());
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_socket_addr_bracketed() {
        let mut config = Config::default();
        config.host = "[::]".to_string();
        config.port = 3000;
        assert_eq!(config.socket_addr().unwrap().to_string(), "[::]:3000");
    }

    #[test]
    fn test_socket_addr_ipv4() {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_validate_invalid_host() {
        let mut config = Config::default();
        config.host = "localhost:80".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().contains("Invalid host"));
    }

    // ==================== Workers ====================

    #[test]
    fn test_worker_count_default_is_hardware() {
        let config = Config::default();
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_worker_count_explicit() {
        let mut config = Config::default();
        config.workers = Some(3);
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn test_validate_invalid_workers() {
        let mut config = Config::default();
        config.workers = Some(0);
        let result = config.validate();
        assert!(result.unwrap_err().contains("Workers"));
    }

    // ==================== Timeouts ====================

    #[test]
    fn test_validate_invalid_wait_timeout() {
        let mut config = Config::default();
        config.wait_timeout_ms = 0;
        assert!(config.validate().unwrap_err().contains("Wait timeout"));
    }

    #[test]
    fn test_validate_invalid_io_timeout() {
        let mut config = Config::default();
        config.io_timeout_ms = 0;
        assert!(config.validate().unwrap_err().contains("IO timeout"));
    }

    #[test]
    fn test_timeouts_as_durations() {
        let config = Config::default();
        assert_eq!(config.wait_timeout(), Duration::from_secs(1));
        assert_eq!(config.io_timeout(), Duration::from_secs(5));
    }

    // ==================== Mounts ====================

    #[test]
    fn test_default_mount() {
        let config = Config::default();
        let mounts = config.mounts().unwrap();
        assert_eq!(mounts, vec![("/".to_string(), PathBuf::from("./public"))]);
    }

    #[test]
    fn test_multiple_mounts() {
        let mut config = Config::default();
        config.mounts = vec!["/=./public".to_string(), "/dir/=/".to_string()];
        let mounts = config.mounts().unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[1], ("/dir/".to_string(), PathBuf::from("/")));
    }

    #[test]
    fn test_mount_without_separator() {
        let mut config = Config::default();
        config.mounts = vec!["/public".to_string()];
        assert!(config.validate().unwrap_err().contains("PREFIX=DIR"));
    }

    #[test]
    fn test_mount_relative_prefix() {
        let mut config = Config::default();
        config.mounts = vec!["static=./public".to_string()];
        assert!(config.validate().unwrap_err().contains("must start with '/'"));
    }

    #[test]
    fn test_parse_cli_arguments() {
        let config = Config::try_parse_from([
            "epoll_http",
            "--port",
            "9000",
            "--workers",
            "2",
            "--mount",
            "/=./www",
            "--mount",
            "/dir/=./",
            "--no-console",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.mounts.len(), 2);
        assert!(config.no_console);
    }

    // ==================== Print Summary ====================

    #[test]
    fn test_config_print_summary() {
        let config = Config::default();
        // Should not panic
        config.print_summary();
    }
}
