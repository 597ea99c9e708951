//! Serial Read Loop
//!
//! Polls the serial link, decodes lines permissively, and hands them to the
//! [`Dispatcher`]. Stopping is cooperative: the loop checks its stop flag at
//! the top of every iteration, so a stop request takes effect within one
//! poll interval. Callers that need the loop gone must `join` the handle.

use crate::domain::led::LedClient;
use crate::domain::models::BridgeState;
use crate::domain::settings::SerialSettings;
use crate::infrastructure::serial::dispatcher::Dispatcher;
use crate::infrastructure::serial::port::SerialLink;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub(crate) type SharedLink = Arc<Mutex<Box<dyn SerialLink>>>;
pub(crate) type SharedState = Arc<Mutex<Lifecycle>>;

/// Bridge state plus the id of the only session allowed to move it out of
/// `Listening`.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    pub(crate) state: BridgeState,
    pub(crate) session: u64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: BridgeState::Idle,
            session: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub poll_interval: Duration,
    /// `None` retries forever.
    pub max_consecutive_errors: Option<u32>,
    /// Run dispatch in a second task fed by a FIFO queue.
    pub dispatch_queue: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::from_settings(&SerialSettings::default())
    }
}

impl ListenerConfig {
    pub fn from_settings(settings: &SerialSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            max_consecutive_errors: settings.max_consecutive_errors,
            dispatch_queue: settings.dispatch_queue,
        }
    }
}

/// How a listening session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// Stop was requested. Not a failure.
    Stopped,
    /// Too many read errors, or the task panicked.
    Failed(String),
    /// The task was aborted through its handle.
    Cancelled,
}

/// Handle to a running listening session.
pub struct ListenerHandle {
    task: JoinHandle<LoopExit>,
    cancel: Arc<Notify>,
}

impl ListenerHandle {
    /// Cancel the session. A queued dispatch task is cancelled with it,
    /// and `join` returns once both are gone.
    pub fn abort(&self) {
        self.cancel.notify_one();
    }

    /// Wait for the session to end, including any queued dispatch.
    pub async fn join(self) -> LoopExit {
        match self.task.await {
            Ok(exit) => exit,
            Err(e) if e.is_cancelled() => LoopExit::Cancelled,
            Err(e) => {
                error!("Arduino listener task failed: {}", e);
                LoopExit::Failed(format!("listener task panicked: {}", e))
            }
        }
    }
}

/// Leaves the bridge out of `Listening` however the session ends,
/// including abort and panic. A session that has been superseded by a
/// newer one leaves the state alone.
struct SessionGuard {
    state: SharedState,
    stop: Arc<AtomicBool>,
    id: u64,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        let mut lifecycle = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if lifecycle.session != self.id {
            debug!(
                "Listening session {} closed after session {} took over",
                self.id, lifecycle.session
            );
            return;
        }
        if matches!(
            lifecycle.state,
            BridgeState::Listening | BridgeState::Stopping
        ) {
            lifecycle.state = BridgeState::Connected;
        }
        debug!(
            "Listening session {} closed, bridge is {:?}",
            self.id, lifecycle.state
        );
    }
}

struct Session {
    link: SharedLink,
    client: Arc<dyn LedClient>,
    dispatcher: Dispatcher,
    config: ListenerConfig,
    stop: Arc<AtomicBool>,
    // Dropped with the last task still using the session.
    _guard: SessionGuard,
}

/// Everything a new session needs from the bridge.
pub(crate) struct SessionParts {
    pub(crate) id: u64,
    pub(crate) link: SharedLink,
    pub(crate) state: SharedState,
    pub(crate) stop: Arc<AtomicBool>,
    pub(crate) client: Arc<dyn LedClient>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) config: ListenerConfig,
}

pub(crate) fn spawn(parts: SessionParts) -> ListenerHandle {
    let session = Session {
        link: parts.link,
        client: parts.client,
        dispatcher: parts.dispatcher,
        config: parts.config,
        stop: parts.stop.clone(),
        _guard: SessionGuard {
            state: parts.state,
            stop: parts.stop,
            id: parts.id,
        },
    };
    let cancel = Arc::new(Notify::new());
    let cancelled = cancel.clone();

    let task = tokio::spawn(async move {
        let consumer: ConsumerSlot = Arc::default();
        let slot = consumer.clone();
        let body = async move {
            if session.config.dispatch_queue {
                run_queued(session, slot).await
            } else {
                run_inline(&session).await
            }
        };

        let exit = tokio::select! {
            exit = body => exit,
            _ = cancelled.notified() => LoopExit::Cancelled,
        };

        // The reader is gone; the queued dispatch task is drained on a
        // normal exit and cancelled otherwise.
        let pending = lock_slot(&consumer).take();
        if let Some(task) = pending {
            if exit == LoopExit::Cancelled {
                task.abort();
            }
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("Dispatch task failed: {}", e);
                }
            }
        }

        match &exit {
            LoopExit::Failed(reason) => error!("Arduino listener stopped: {}", reason),
            LoopExit::Cancelled => warn!("Arduino listener cancelled"),
            LoopExit::Stopped => info!("Arduino listener stopped"),
        }
        exit
    });

    ListenerHandle { task, cancel }
}

type ConsumerSlot = Arc<Mutex<Option<JoinHandle<()>>>>;

fn lock_slot(slot: &ConsumerSlot) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

async fn run_inline(session: &Session) -> LoopExit {
    read_loop(session, |line| process_line(session, line)).await
}

/// Read into a FIFO queue drained by a second task. The consumer handle is
/// parked in `slot` for the owning task to await or cancel.
async fn run_queued(session: Session, slot: ConsumerSlot) -> LoopExit {
    let session = Arc::new(session);
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let consumer_session = session.clone();
    *lock_slot(&slot) = Some(tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if consumer_session.stop.load(Ordering::Acquire) {
                debug!("Dropping queued command after stop: {}", line);
                break;
            }
            process_line(&consumer_session, line).await;
        }
    }));

    let exit = read_loop(&session, |line| {
        let queued = tx.send(line);
        async move {
            if let Err(e) = queued {
                warn!("Dispatch queue closed, dropping {}", e.0);
            }
        }
    })
    .await;

    // Closing the queue lets the consumer finish what it already has.
    drop(tx);
    exit
}

async fn read_loop<F, Fut>(session: &Session, mut handle: F) -> LoopExit
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut consecutive_errors = 0u32;

    loop {
        if session.stop.load(Ordering::Acquire) {
            return LoopExit::Stopped;
        }

        match read_available_line(&session.link).await {
            Ok(line) => {
                consecutive_errors = 0;
                if let Some(line) = line.filter(|l| !l.is_empty()) {
                    debug!("Received from Arduino: {}", line);
                    handle(line).await;
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                error!(
                    "Error reading from serial port: {} ({} in a row)",
                    e, consecutive_errors
                );
                if let Some(max) = session.config.max_consecutive_errors {
                    if consecutive_errors >= max {
                        return LoopExit::Failed(format!(
                            "{} consecutive read errors, last: {}",
                            consecutive_errors, e
                        ));
                    }
                }
            }
        }

        tokio::time::sleep(session.config.poll_interval).await;
    }
}

async fn process_line(session: &Session, line: String) {
    let outcome = session
        .dispatcher
        .dispatch(&line, session.client.as_ref())
        .await;

    if let Some(ack) = outcome.ack() {
        if let Err(e) = write_line(&session.link, ack.to_string()).await {
            warn!("Failed to send acknowledgment {}: {}", ack, e);
        }
    }
}

/// Read one line if the port has data. Invalid UTF-8 is replaced, never fatal.
async fn read_available_line(link: &SharedLink) -> io::Result<Option<String>> {
    let link = link.clone();
    let bytes = with_link(link, |link| {
        if link.bytes_to_read()? == 0 {
            return Ok(None);
        }
        link.read_line()
    })
    .await?;

    Ok(bytes.map(|b| String::from_utf8_lossy(&b).trim_end().to_string()))
}

async fn write_line(link: &SharedLink, line: String) -> io::Result<()> {
    with_link(link.clone(), move |link| link.write_line(&line)).await
}

/// Run a blocking serial call off the async scheduler.
async fn with_link<T, F>(link: SharedLink, f: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Box<dyn SerialLink>) -> io::Result<T> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let mut guard = link
            .lock()
            .map_err(|_| io::Error::other("serial link lock poisoned"))?;
        f(&mut *guard)
    })
    .await;

    match joined {
        Ok(result) => result,
        Err(e) => Err(io::Error::other(e.to_string())),
    }
}
