use std::sync::Arc;
use std::time::{Duration, Instant};

use ink_store::{SnapshotError, SnapshotStore};
use ink_types::{Mode, PageConfig, ServerConfig};

use crate::{CaptureError, CaptureRequest, ViewportCapture};

// ----------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
enum RenderError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("failed to decode screenshot: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Store(#[from] SnapshotError),
}

/// What a whole-page render attempt produced.
#[derive(Clone, Copy, Debug)]
pub struct RenderOutcome {
    /// Modes whose bitmap was committed to the store.
    pub committed_modes: usize,

    /// Wall-clock time across all of the page's modes.
    pub duration: Duration,
}

impl RenderOutcome {
    #[inline]
    pub fn any_committed(&self) -> bool {
        self.committed_modes > 0
    }
}

// ----------------------------------------------------------------------------

/// Renders one page at a time: capture, rotate, downscale, dither, commit.
///
/// A failed mode never clears an existing bitmap; the previous good one
/// keeps being served.
pub struct RenderWorker<C> {
    config: Arc<ServerConfig>,
    store: Arc<SnapshotStore>,
    capture: C,
}

impl<C: ViewportCapture> RenderWorker<C> {
    pub fn new(config: Arc<ServerConfig>, store: Arc<SnapshotStore>, capture: C) -> Self {
        Self {
            config,
            store,
            capture,
        }
    }

    /// Render `page_id` in every supported mode.
    pub async fn render_page(&self, page_id: &str) -> RenderOutcome {
        let started = Instant::now();
        let mut committed_modes = 0;

        let Some(page) = self.config.pages.get(page_id) else {
            ink_log::error!("unknown page: {page_id:?}");
            return RenderOutcome {
                committed_modes,
                duration: started.elapsed(),
            };
        };

        ink_log::info!(
            "rendering {page_id:?} ({}) zoom={} rotation={}",
            page.url,
            page.zoom_level,
            page.rotation.degrees(),
        );

        for &mode in &self.config.supported_modes {
            match self.render_mode(page_id, page, mode).await {
                Ok(()) => committed_modes += 1,
                Err(RenderError::Capture(err)) if err.is_fatal_for_page() => {
                    ink_log::error!("{page_id:?}: browser unavailable, skipping remaining modes: {err}");
                    break;
                }
                Err(err) => {
                    ink_log::warn!("{page_id:?}: failed to render mode {mode}: {err}");
                }
            }
        }

        let duration = started.elapsed();
        ink_log::info!(
            "rendered {page_id:?}: {committed_modes} mode(s) in {:.2}s",
            duration.as_secs_f64()
        );

        RenderOutcome {
            committed_modes,
            duration,
        }
    }

    async fn render_mode(
        &self,
        page_id: &str,
        page: &PageConfig,
        mode: Mode,
    ) -> Result<(), RenderError> {
        // Capture at the zoomed size; quarter turns swap the viewport axes so
        // the rotated frame lands on the mode's aspect.
        let mut capture_width = (mode.width as f32 * page.zoom_level).round() as u32;
        let mut capture_height = (mode.height as f32 * page.zoom_level).round() as u32;
        if page.rotation.swaps_axes() {
            std::mem::swap(&mut capture_width, &mut capture_height);
        }

        let request = CaptureRequest {
            url: page.url.clone(),
            width: capture_width,
            height: capture_height,
            scroll_to_element: page.scroll_to_element.clone(),
        };

        let png = self.capture.capture(&request).await?;
        let frame = image::load_from_memory(&png)?;
        let bitmap = ink_codec::process_frame(&frame, page.rotation, mode);
        self.store.put(page_id, mode, &bitmap)?;

        Ok(())
    }
}

// ----------------------------------------------------------------------------
