//! The two long-lived background tasks: the 1-second scheduler tick and the
//! single render loop that drains the queue serially.

use std::sync::Arc;
use std::time::Duration;

use jiff::{Timestamp, Zoned};
use tokio::sync::mpsc;

use ink_render::{RenderWorker, ViewportCapture};

use crate::App;

/// Wakes once per second, queues whatever is due.
///
/// Before entering the loop, any page with no bitmap in any supported mode
/// is rendered right away so devices have something to pull on a cold start.
pub async fn scheduler_loop(app: Arc<App>) {
    for page_id in app.config.pages.keys() {
        if !app.store.has_any(page_id, &app.config.supported_modes) {
            ink_log::info!("no snapshot yet for {page_id:?}, rendering now");
            app.request_render(page_id);
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let now = Zoned::now();
        let due = app.scheduler.lock().due_pages(&now);
        for page_id in due {
            app.request_render(&page_id);
        }
    }
}

/// Processes render requests one at a time.
///
/// Pages stay in the pending set until their attempt is over, so duplicate
/// requests arriving mid-render are dropped. The schedule is advanced after
/// every attempt; the duration is only recorded when something committed.
pub async fn render_loop<C: ViewportCapture>(
    app: Arc<App>,
    worker: RenderWorker<C>,
    mut render_rx: mpsc::Receiver<String>,
) {
    while let Some(page_id) = render_rx.recv().await {
        let outcome = worker.render_page(&page_id).await;
        app.render_done(&page_id);

        let duration = outcome.any_committed().then_some(outcome.duration);
        app.scheduler
            .lock()
            .on_render_finished(&page_id, duration, Timestamp::now());
    }
}
