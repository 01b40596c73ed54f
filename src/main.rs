//! # epoll_http - Entry Point
//! src/main.rs
//!
//! Arranca el servidor con la configuración de CLI/entorno y queda
//! atendiendo comandos:
//!
//! - `ls`: conexiones registradas y ocupación de workers
//! - `json`: lo mismo que `ls`, serializado como JSON
//! - `exit` o EOF en stdin: detiene el servidor
//! - `SIGINT`/`SIGTERM`: detiene el servidor
//!
//! Las señales se bloquean antes de lanzar cualquier thread y se consumen
//! con `sigwait` desde un thread dedicado. Tanto ese thread como el de la
//! consola envían comandos por un canal al thread principal, que es el
//! único dueño del servidor.

use anyhow::{Context, Result};
use epoll_http::commands;
use epoll_http::config::Config;
use epoll_http::http::HttpProtocol;
use epoll_http::router::Router;
use epoll_http::server::{signal, Server};
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Comandos para el thread principal
#[derive(Debug, PartialEq, Eq)]
enum Command {
    ListClients,
    ListClientsJson,
    Stop(&'static str),
}

const STOP_SIGNALS: [libc::c_int; 2] = [libc::SIGINT, libc::SIGTERM];

fn main() -> Result<()> {
    let config = Config::new();
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("configuración inválida")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    config.print_summary();

    // Antes de cualquier thread: todos heredan la máscara
    signal::block(&STOP_SIGNALS).context("no se pudo bloquear SIGINT/SIGTERM")?;

    let router = build_router(&config)?;
    let server = Server::new(&config, HttpProtocol::new(router))?;
    server.listen()?;

    println!("############################################");
    println!("# Server started on {:<22}#", server.local_addr()?.to_string());
    println!("# Type 'ls' to list clients.               #");
    println!("# Type 'exit' or Ctrl-D to stop server.    #");
    println!("############################################");
    println!();

    let (tx, rx) = mpsc::channel();
    spawn_signal_listener(tx.clone())?;
    if !config.no_console {
        spawn_console(tx)?;
    }

    for command in rx {
        match command {
            Command::ListClients => println!("{}", server.list_clients()),
            Command::ListClientsJson => println!("{}", server.list_clients().to_json()),
            Command::Stop(reason) => {
                info!(reason, "deteniendo servidor");
                break;
            }
        }
    }

    println!("Stopping server...");
    server.stop();
    Ok(())
}

/// Montajes de la configuración + handlers de demostración
fn build_router(config: &Config) -> Result<Router> {
    let mut router = Router::with_status_dir(&config.status_dir);
    for (prefix, dir) in config.mounts().map_err(anyhow::Error::msg)? {
        router.serve(&prefix, dir);
    }
    commands::register(&mut router, Duration::from_millis(config.slow_ms));
    Ok(router)
}

fn spawn_signal_listener(tx: Sender<Command>) -> Result<()> {
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || match signal::wait(&STOP_SIGNALS) {
            Ok(received) => {
                let reason = if received == libc::SIGINT { "SIGINT" } else { "SIGTERM" };
                let _ = tx.send(Command::Stop(reason));
            }
            Err(e) => error!(error = %e, "sigwait falló"),
        })
        .context("no se pudo lanzar el thread de señales")?;
    Ok(())
}

/// Traduce una línea de la consola a un comando
fn parse_console_line(line: &str) -> Option<Command> {
    match line.trim() {
        "ls" => Some(Command::ListClients),
        "json" => Some(Command::ListClientsJson),
        "exit" => Some(Command::Stop("console")),
        _ => None,
    }
}

fn spawn_console(tx: Sender<Command>) -> Result<()> {
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                let line = line.trim();
                match parse_console_line(line) {
                    Some(Command::Stop(_)) => break,
                    Some(command) => {
                        if tx.send(command).is_err() {
                            return;
                        }
                    }
                    None if line.is_empty() => {}
                    None => println!("unknown command '{}' (use 'ls', 'json' or 'exit')", line),
                }
            }
            let _ = tx.send(Command::Stop("console"));
        })
        .context("no se pudo lanzar el thread de consola")?;
    Ok(())
}
