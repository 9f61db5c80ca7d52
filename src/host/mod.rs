//! Stdio transport between an editor host and the trace pipeline.

mod protocol;
mod server;

pub use protocol::{read_message, write_message, HostMessage, HostMessageContent};
pub use server::HostServer;

use crate::config::Settings;
use crate::error::ProtocolError;
use crate::scheduler::{AvailabilityStore, Completion, SystemLauncher, TraceScheduler};
use anyhow::Context;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

/// Everything the event loop waits on.
#[derive(Debug)]
pub enum LoopEvent {
    Host(HostMessage),
    Process(Completion),
    HostClosed,
}

impl From<Completion> for LoopEvent {
    fn from(completion: Completion) -> Self {
        LoopEvent::Process(completion)
    }
}

fn spawn_stdin_reader(sink: Sender<LoopEvent>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(io::stdin());
        loop {
            match read_message(&mut reader) {
                Ok(Some(msg)) => {
                    if sink.send(LoopEvent::Host(msg)).is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(ProtocolError::Json(e)) => warn!(error = %e, "dropping malformed message"),
                Err(ProtocolError::MissingContentLength) => {
                    warn!("dropping message without Content-Length")
                }
                Err(e) => {
                    warn!(error = %e, "host transport failed");
                    break;
                }
            }
        }
        let _ = sink.send(LoopEvent::HostClosed);
    });
}

/// Serve the host on stdin/stdout until it disconnects or closes the pipe.
///
/// Everything runs on this thread except blocking reads: stdin and every
/// child process have their own reader thread posting into one channel.
pub fn run_host_mode(settings: Settings, interpreter: PathBuf) -> anyhow::Result<()> {
    let options = settings
        .run_options(interpreter)
        .context("invalid tracer settings")?;
    info!(interpreter = %options.interpreter.display(), "host mode starting");

    let (tx, rx) = channel::<LoopEvent>();
    let launcher = SystemLauncher::new(tx.clone());
    let scheduler = TraceScheduler::new(launcher, AvailabilityStore::new(), options);
    let mut server = HostServer::new(io::stdout(), scheduler, settings);
    spawn_stdin_reader(tx);

    loop {
        let event = match server.next_deadline() {
            Some(deadline) if deadline <= Instant::now() => None,
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(event) => Some(event),
                Err(_) => break,
            },
        };

        match event {
            None => server.on_tick(Instant::now())?,
            Some(LoopEvent::Host(msg)) => {
                if !server.handle_message(msg, Instant::now())? {
                    break;
                }
            }
            Some(LoopEvent::Process(completion)) => server.on_completion(completion)?,
            Some(LoopEvent::HostClosed) => break,
        }
    }

    info!("host mode exiting");
    Ok(())
}
