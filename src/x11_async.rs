//! X11 Async Event Stream
//!
//! The display connection's socket is watched by mio on a blocking task; the
//! handler loop sleeps on a [`Notify`] until the socket turns readable and
//! then drains the queued events itself.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{oneshot, Notify};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

/// Upper bound on one poll, so the watcher notices the stream was dropped.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

pub struct X11EventStream {
    conn: Arc<RustConnection>,
    notify: Arc<Notify>,
    /// Dropping this stops the watcher task
    _task_guard: oneshot::Receiver<()>,
}

impl X11EventStream {
    /// Start watching the connection. Must be called inside a tokio runtime.
    pub fn new(conn: Arc<RustConnection>) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let notify = Arc::new(Notify::new());
        let task_notify = notify.clone();

        let (guard, task_guard) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        let mut events = mio::Events::with_capacity(1);
        poll.registry()
            .register(&mut mio::unix::SourceFd(&fd), mio::Token(0), mio::Interest::READABLE)
            .context("Failed to register X11 socket with mio")?;

        tokio::task::spawn_blocking(move || loop {
            if guard.is_closed() {
                tracing::debug!("X11 socket watcher shutting down");
                return;
            }
            if let Err(err) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                tracing::warn!("X11 socket poll failed: {:?}", err);
                continue;
            }
            if events.iter().any(|event| event.token() == mio::Token(0)) {
                task_notify.notify_one();
            }
        });

        Ok(Self {
            conn,
            notify,
            _task_guard: task_guard,
        })
    }

    /// Next already-received event, without blocking.
    pub fn poll_next_event(&self) -> Result<Option<Event>> {
        Ok(self.conn.poll_for_event()?)
    }

    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}
