//! The composed webink server: one [`App`] value owns every shared
//! subsystem and is passed by reference into the HTTP handlers, the TCP
//! connection tasks, and the scheduling/render loops. There is no
//! process-wide mutable state.

pub mod http;
pub mod tasks;
pub mod tcp;

use std::sync::Arc;

use anyhow::Context as _;
use jiff::Timestamp;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use ink_registry::DeviceRegistry;
use ink_render::{RenderWorker, SubprocessCapture};
use ink_schedule::Scheduler;
use ink_store::SnapshotStore;
use ink_types::ServerConfig;

/// Render requests queued but not yet started pile up here; beyond this the
/// scheduler's next tick re-requests anyway.
const RENDER_QUEUE_DEPTH: usize = 32;

// ----------------------------------------------------------------------------

/// Everything the serving paths share.
pub struct App {
    pub config: Arc<ServerConfig>,
    pub store: Arc<SnapshotStore>,
    pub registry: Arc<DeviceRegistry>,
    pub scheduler: Mutex<Scheduler>,

    render_tx: mpsc::Sender<String>,

    /// Pages queued or currently rendering; makes re-enqueueing a no-op.
    pending_renders: Mutex<ahash::HashSet<String>>,
}

impl App {
    /// Build the app and the receiving end of its render queue.
    pub fn new(config: ServerConfig) -> (Arc<Self>, mpsc::Receiver<String>) {
        let config = Arc::new(config);
        let store = Arc::new(SnapshotStore::new(config.data_dir.clone()));
        let registry = Arc::new(DeviceRegistry::load(config.data_dir.join("clients.json")));
        let scheduler = Mutex::new(Scheduler::new(config.clone(), Timestamp::now()));
        let (render_tx, render_rx) = mpsc::channel(RENDER_QUEUE_DEPTH);

        let app = Arc::new(Self {
            config,
            store,
            registry,
            scheduler,
            render_tx,
            pending_renders: Mutex::new(ahash::HashSet::default()),
        });

        (app, render_rx)
    }

    pub fn check_api_key(&self, api_key: &str) -> bool {
        api_key == self.config.api_key
    }

    /// Queue a render for `page_id`. A page already queued or in progress is
    /// left alone.
    pub fn request_render(&self, page_id: &str) {
        let mut pending = self.pending_renders.lock();
        if pending.contains(page_id) {
            return;
        }

        match self.render_tx.try_send(page_id.to_owned()) {
            Ok(()) => {
                pending.insert(page_id.to_owned());
            }
            Err(err) => {
                ink_log::warn!("render queue rejected {page_id:?}: {err}");
            }
        }
    }

    /// Called by the render loop once a page's render attempt is over.
    pub(crate) fn render_done(&self, page_id: &str) {
        self.pending_renders.lock().remove(page_id);
    }
}

// ----------------------------------------------------------------------------

/// Bind both surfaces and run until the process is stopped.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;

    if !config.devices.contains_key("default") {
        ink_log::warn!("no `default` device configured; unknown devices will have no page");
    }

    let capture = match &config.capture_command {
        Some(template) => SubprocessCapture::new(template.clone()),
        None => SubprocessCapture::default(),
    };

    let (app, render_rx) = App::new(config);
    let worker = RenderWorker::new(app.config.clone(), app.store.clone(), capture);

    tokio::spawn(tasks::render_loop(app.clone(), worker, render_rx));
    tokio::spawn(tasks::scheduler_loop(app.clone()));

    let tcp_listener = tokio::net::TcpListener::bind(("0.0.0.0", app.config.tcp_port))
        .await
        .with_context(|| format!("failed to bind tcp port {}", app.config.tcp_port))?;
    ink_log::info!(
        "tile protocol ({}) listening on 0.0.0.0:{}",
        tcp::PROTOCOL_NAME,
        app.config.tcp_port
    );
    tokio::spawn(tcp::serve(app.clone(), tcp_listener));

    let http_listener = tokio::net::TcpListener::bind(("0.0.0.0", app.config.http_port))
        .await
        .with_context(|| format!("failed to bind http port {}", app.config.http_port))?;
    ink_log::info!("http listening on 0.0.0.0:{}", app.config.http_port);

    axum::serve(http_listener, http::router(app)).await?;

    Ok(())
}
