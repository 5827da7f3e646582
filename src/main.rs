//! strata
//!
//! Tiling/stacking X11 window manager: connects to the display, takes over
//! the root window and feeds every event to the window-manager core.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use x11rb::protocol::xproto::ConnectionExt as _;

use strata::config::Config;
use strata::wm::conn::X11Conn;
use strata::wm::error::XError;
use strata::wm::{Atoms, WindowManager};
use strata::x11_async::X11EventStream;

struct Strata {
    wm: WindowManager<X11Conn>,
    x11_stream: X11EventStream,
}

impl Strata {
    fn new() -> Result<Self> {
        let config = Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {:#}", e);
            Config::default()
        });

        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X server")?;
        let conn = Arc::new(conn);
        info!("Connected to X server (screen {})", screen_num);

        let xconn = X11Conn::new(conn.clone(), screen_num);
        xconn
            .become_wm()
            .context("Failed to select SubstructureRedirect; is another window manager running?")?;

        let atoms = Atoms::intern(|name| {
            conn.intern_atom(false, name.as_bytes())?
                .reply()
                .map(|reply| reply.atom)
                .map_err(|e| XError::from_reply(e, 0, "InternAtom"))
        })
        .context("Failed to intern atoms")?;

        let x11_stream = X11EventStream::new(conn)?;
        let mut wm = WindowManager::new(xconn, atoms, config).context("Failed to query monitors")?;
        wm.setup().context("Failed to initialize root window")?;
        wm.scan().context("Failed to adopt existing windows")?;

        Ok(Self { wm, x11_stream })
    }

    async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!("Starting main event loop");

        'main: while self.wm.is_running() {
            // the connection may already hold events read while waiting for a reply
            while let Some(event) = self.x11_stream.poll_next_event()? {
                if let Err(e) = self.wm.handle_event(&event) {
                    error!("Fatal protocol error: {}", e);
                    return Err(e).context("Event handling failed");
                }
                if !self.wm.is_running() {
                    break 'main;
                }
            }
            self.x11_stream.flush()?;

            tokio::select! {
                () = self.x11_stream.wait_readable() => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, cleaning up...");
                    break;
                }
            }
        }

        self.wm.shutdown().context("Failed to release clients")?;
        info!("Exited cleanly");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "strata=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting strata");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            }
            let _ = shutdown_tx.send(()).await;
        });
    }

    let app = Strata::new()?;
    app.run(shutdown_rx).await
}
