//! # Máscaras de Señales
//! src/server/signal.rs
//!
//! - `SIGPIPE` se bloquea para que escribir en un socket cerrado por el peer
//!   retorne `EPIPE` en vez de terminar el proceso.
//! - `SIGINT`/`SIGTERM` se bloquean en el thread principal antes de lanzar
//!   workers (que heredan la máscara) y se consumen con `wait` desde un
//!   thread dedicado.

use std::io;

fn signal_set(signals: &[libc::c_int]) -> libc::sigset_t {
    let mut set: libc::sigset_t = unsafe { std::mem::zeroed() };
    unsafe {
        libc::sigemptyset(&mut set);
        for &signal in signals {
            libc::sigaddset(&mut set, signal);
        }
    }
    set
}

/// Bloquea `signals` en el thread actual (y en los threads que lance después)
pub fn block(signals: &[libc::c_int]) -> io::Result<()> {
    let set = signal_set(signals);
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

pub fn block_sigpipe() -> io::Result<()> {
    block(&[libc::SIGPIPE])
}

/// Espera sincrónicamente a que llegue alguna de `signals`
///
/// Las señales deben estar bloqueadas en todos los threads del proceso.
pub fn wait(signals: &[libc::c_int]) -> io::Result<libc::c_int> {
    let set = signal_set(signals);
    let mut received: libc::c_int = 0;
    let rc = unsafe { libc::sigwait(&set, &mut received) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(received)
}

/// `true` si `signal` está bloqueada en el thread actual
pub fn is_blocked(signal: libc::c_int) -> io::Result<bool> {
    let mut current: libc::sigset_t = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), &mut current) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(unsafe { libc::sigismember(&current, signal) } == 1)
}
