//! Worker thread owning the transport state machine.
//!
//! Commands from the facade arrive on a bounded channel and socket events on
//! an unbounded one. Each connection attempt raises only a handful of events,
//! so that channel stays small; it is drained before the next command so the
//! core sees lifecycle changes as soon as they happen.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use log::warn;
use parking_lot::Mutex;

use crate::{log_metadata::LogMetadata, rate_limited_warner::RateLimitedWarner};

use super::{
    adapter::{EventRoute, SocketConnector, SocketEvent},
    config::{ConfigUpdate, TransportConfig},
    state::TransportStatus,
    state_machine::TransportCore,
};

/// Commands processed by the worker thread.
#[derive(Debug)]
pub enum TransportCommand {
    Write {
        message: String,
        metadata: LogMetadata,
    },
    Configure(ConfigUpdate),
    Status(Sender<TransportStatus>),
    Flush(Sender<()>),
    Close(Sender<TransportStatus>),
}

/// Why the worker woke up.
#[derive(Debug)]
enum Wakeup {
    Command(TransportCommand),
    Socket(SocketEvent),
    Timeout,
    Disconnected,
}

/// Status published by the worker after every message it handles.
pub type SharedStatus = Arc<Mutex<TransportStatus>>;

pub fn spawn_worker(
    config: TransportConfig,
    connector: Box<dyn SocketConnector>,
) -> (Sender<TransportCommand>, thread::JoinHandle<()>, SharedStatus) {
    let (tx, rx) = bounded(config.capacity.max(1));
    let (event_tx, event_rx) = unbounded();
    let route: EventRoute = Arc::new(move |event| {
        let _ = event_tx.send(event);
    });
    let core = TransportCore::new(config, connector, route);
    let shared = Arc::new(Mutex::new(core.status()));
    let published = Arc::clone(&shared);
    let handle = thread::spawn(move || worker_loop(rx, event_rx, core, published));
    (tx, handle, shared)
}

fn next_wakeup(
    commands: &Receiver<TransportCommand>,
    events: &Receiver<SocketEvent>,
    wait: Option<Duration>,
) -> Wakeup {
    if let Ok(event) = events.try_recv() {
        return Wakeup::Socket(event);
    }
    match wait {
        Some(wait) => select! {
            recv(events) -> event => event.map_or(Wakeup::Disconnected, Wakeup::Socket),
            recv(commands) -> command => command.map_or(Wakeup::Disconnected, Wakeup::Command),
            default(wait) => Wakeup::Timeout,
        },
        None => select! {
            recv(events) -> event => event.map_or(Wakeup::Disconnected, Wakeup::Socket),
            recv(commands) -> command => command.map_or(Wakeup::Disconnected, Wakeup::Command),
        },
    }
}

fn worker_loop(
    commands: Receiver<TransportCommand>,
    events: Receiver<SocketEvent>,
    mut core: TransportCore,
    published: SharedStatus,
) {
    core.connect();
    *published.lock() = core.status();
    loop {
        match next_wakeup(&commands, &events, core.next_wakeup(Instant::now())) {
            Wakeup::Command(command) => {
                if !dispatch(&mut core, command, &published) {
                    break;
                }
            }
            Wakeup::Socket(event) => core.handle_event(event),
            Wakeup::Timeout => {}
            Wakeup::Disconnected => {
                core.close();
                *published.lock() = core.status();
                break;
            }
        }
        let now = Instant::now();
        core.fire_due_reconnect(now);
        core.poll_if_due(now);
        *published.lock() = core.status();
    }
}

/// Apply one command. Returns `false` once the worker should exit.
fn dispatch(core: &mut TransportCore, command: TransportCommand, published: &SharedStatus) -> bool {
    match command {
        TransportCommand::Write { message, metadata } => core.write(&message, &metadata),
        TransportCommand::Configure(update) => core.configure(&update),
        TransportCommand::Status(reply) => {
            let _ = reply.send(core.status());
        }
        TransportCommand::Flush(ack) => {
            let _ = ack.send(());
        }
        TransportCommand::Close(ack) => {
            core.close();
            let status = core.status();
            *published.lock() = status.clone();
            let _ = ack.send(status);
            return false;
        }
    }
    true
}

/// Queue a write without blocking, dropping it when the queue is full.
///
/// Returns `false` when the write was dropped.
pub fn enqueue_write(
    tx: &Sender<TransportCommand>,
    command: TransportCommand,
    warner: &RateLimitedWarner,
) -> bool {
    match tx.try_send(command) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("FemtoWebSocketHandler queue full; dropped {count} messages");
            });
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("FemtoWebSocketHandler worker stopped; dropped {count} messages");
            });
            false
        }
    }
}

/// Queue a control command, waiting up to `timeout` for room in the queue.
pub fn send_control(
    tx: &Sender<TransportCommand>,
    command: TransportCommand,
    timeout: Duration,
) -> bool {
    tx.send_timeout(command, timeout).is_ok()
}

/// Send a request carrying a reply channel and wait for the answer.
pub fn request<T>(
    tx: &Sender<TransportCommand>,
    make: impl FnOnce(Sender<T>) -> TransportCommand,
    timeout: Duration,
) -> Option<T> {
    let (reply_tx, reply_rx) = bounded(1);
    if !send_control(tx, make(reply_tx), timeout) {
        return None;
    }
    reply_rx.recv_timeout(timeout).ok()
}
