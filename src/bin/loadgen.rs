//! # Generador de Carga
//! src/bin/loadgen.rs
//!
//! Abre N conexiones, envía M requests pipelined por cada una y luego lee
//! todas las respuestas.
//!
//! ```bash
//! loadgen 100 10 2     # 100 conexiones × 10 POST /sort
//! ```
//!
//! Tipos de request:
//! - `0`: `GET /wait` (tarda en procesarse)
//! - `1`: `GET /` (página principal)
//! - `2`: `POST /sort` con 10 000 números aleatorios

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::Rng;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::thread;

/// Cantidad de números del request de tipo 2
const SORT_SIZE: usize = 10_000;

/// Generador de carga para epoll_http
#[derive(Debug, Parser)]
#[command(name = "loadgen")]
struct Args {
    /// Número de conexiones
    connections: usize,

    /// Requests por conexión
    requests: usize,

    /// Tipo de request (0 = /wait, 1 = /, 2 = /sort)
    #[arg(default_value = "0")]
    kind: u8,

    /// Host del servidor
    #[arg(long, default_value = "::1", env = "HTTP_HOST")]
    host: IpAddr,

    /// Puerto del servidor
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    port: u16,
}

fn build_request(kind: u8) -> Result<String> {
    match kind {
        0 => Ok("GET /wait HTTP/1.1\r\nHost: localhost\r\n\r\n".to_string()),
        1 => Ok("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".to_string()),
        2 => {
            let mut rng = rand::thread_rng();
            let numbers: Vec<String> = (0..SORT_SIZE)
                .map(|_| rng.gen_range(0..SORT_SIZE).to_string())
                .collect();
            let body = numbers.join(" ");
            Ok(format!(
                "POST /sort HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}\n",
                body.len(),
                body
            ))
        }
        other => bail!("unknown request kind {} (expected 0..=2)", other),
    }
}

/// Lee una respuesta completa; retorna sus primeros bytes de body
fn read_response<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().context("bad Content-Length")?;
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    let preview = String::from_utf8_lossy(&body[..content_length.min(40)]).into_owned();
    Ok(Some(preview))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let addr = SocketAddr::new(args.host, args.port);
    let request = build_request(args.kind)?;
    println!("Packet size: {}", request.len());

    let mut connections = Vec::with_capacity(args.connections);
    for _ in 0..args.connections {
        let stream = TcpStream::connect(addr).with_context(|| format!("cannot connect to {}", addr))?;
        connections.push(stream);
    }

    // Escritura en paralelo: con cuerpos grandes, escribir todo antes de leer
    // podría llenar los buffers de ambos lados
    let mut writers = Vec::with_capacity(connections.len());
    for stream in &connections {
        let mut writer = stream.try_clone()?;
        let request = request.clone();
        let count = args.requests;
        writers.push(thread::spawn(move || -> std::io::Result<usize> {
            for _ in 0..count {
                writer.write_all(request.as_bytes())?;
            }
            writer.flush()?;
            Ok(count)
        }));
    }

    let mut received = 0usize;
    for stream in connections.into_iter().rev() {
        let mut reader = BufReader::new(stream);
        for _ in 0..args.requests {
            match read_response(&mut reader) {
                Ok(Some(preview)) => {
                    println!("{}", preview);
                    received += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    eprintln!("read failed: {}", e);
                    break;
                }
            }
        }
    }

    let mut sent = 0usize;
    for writer in writers {
        match writer.join() {
            Ok(Ok(count)) => sent += count,
            Ok(Err(e)) => eprintln!("write failed: {}", e),
            Err(_) => eprintln!("writer thread panicked"),
        }
    }

    println!();
    println!("Sent {} requests", sent);
    println!("Received {} responses", received);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_sort_request_length_matches_body() {
        let request = build_request(2).unwrap();
        let (head, body) = request.split_once("\r\n\r\n").unwrap();
        let declared: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        // El '\n' final queda fuera del cuerpo declarado
        assert_eq!(declared + 1, body.len());
        assert_eq!(body.split_whitespace().count(), SORT_SIZE);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(build_request(3).is_err());
    }

    #[test]
    fn test_read_pipelined_responses() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 2\r\n\r\nhi\
                   HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nNot Found";
        let mut reader = Cursor::new(raw.as_bytes());

        assert_eq!(read_response(&mut reader).unwrap().as_deref(), Some("hi"));
        assert_eq!(read_response(&mut reader).unwrap().as_deref(), Some("Not Found"));
        assert_eq!(read_response(&mut reader).unwrap(), None);
    }
}
