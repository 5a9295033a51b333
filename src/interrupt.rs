//! Ctrl+C handling.
//!
//! [`cancel_on_interrupt`] routes the first interrupt signal into a
//! [`CancellationToken`], letting a running [`BatchSession`](crate::BatchSession)
//! store its checkpoint and return. The default tools kill their child
//! process as soon as the token fires, so later interrupts only repeat the
//! request; they never exit the process behind the session's back.
//!
//! The watcher runs on its own thread with a single-threaded Tokio runtime,
//! so the session itself stays fully synchronous.

use crate::error::SubgenError;
use crate::progress::CancellationToken;

/// Install the interrupt watcher for `token`.
///
/// The handler is registered before this function returns.
///
/// # Errors
///
/// Returns [`SubgenError::IoError`] if the runtime, the signal handler, or
/// the watcher thread cannot be created.
#[cfg(unix)]
pub fn cancel_on_interrupt(token: CancellationToken) -> Result<(), SubgenError> {
    use tokio::signal::unix::{SignalKind, signal};

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut interrupts = {
        let _context = runtime.enter();
        signal(SignalKind::interrupt())?
    };

    std::thread::Builder::new()
        .name("subgen-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                while interrupts.recv().await.is_some() {
                    pause(&token);
                }
            });
        })?;
    Ok(())
}

/// Install the interrupt watcher for `token`.
///
/// # Errors
///
/// Returns [`SubgenError::IoError`] if the runtime or the watcher thread
/// cannot be created.
#[cfg(not(unix))]
pub fn cancel_on_interrupt(token: CancellationToken) -> Result<(), SubgenError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("subgen-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    pause(&token);
                }
            });
        })?;
    Ok(())
}

fn pause(token: &CancellationToken) {
    if token.is_cancelled() {
        log::warn!("Already pausing, waiting for the running tool to stop");
    } else {
        log::warn!("Interrupt received, stopping the running tool and pausing");
        token.cancel();
    }
}
