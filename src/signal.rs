//! Interrupt handling
//!
//! Ctrl-C is turned into a cancelled [`CancellationToken`]. The accept loop
//! watches the token; workers only ever watch the connection queue.

use crate::error::panic_message;
use std::io;
use std::thread;
use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives an interrupt
///
/// The listener runs on its own thread with a single-threaded runtime and
/// exits as soon as the token is cancelled, whether by the interrupt or by
/// anyone else holding a clone.
pub fn spawn_interrupt_listener(token: CancellationToken) -> io::Result<thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("fileserve-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => {
                            tracing::info!("interrupt received, shutting down");
                            token.cancel();
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "unable to listen for interrupts");
                        }
                    },
                    _ = token.cancelled() => {}
                }
            });
        })
}

/// Cancel `token` and wait for the listener thread to exit
///
/// Returns `false` if the listener panicked; the panic is logged.
pub fn stop_interrupt_listener(
    token: &CancellationToken,
    handle: thread::JoinHandle<()>,
) -> bool {
    token.cancel();
    match handle.join() {
        Ok(()) => true,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(panic = %message, "interrupt listener panicked");
            false
        }
    }
}
