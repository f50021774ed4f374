//! When to render, and how long devices should sleep.
//!
//! The scheduler owns the per-page render cadence. Because a render takes
//! non-trivial wall-clock time and all pages share one serialized worker, a
//! page's render is started early by a *lead time*: the summed last-observed
//! render duration of every page, plus a fixed slack. The sleep planner is
//! the mirror image on the device side: it hands each device the number of
//! seconds to sleep so that it wakes just after a fresh bitmap is ready.

mod scheduler;
mod sleep;

pub use scheduler::{PageStatus, ScheduleStatus, Scheduler};
pub use sleep::sleep_seconds;

/// Fixed slack added on top of the summed render durations.
pub const RENDER_SLACK_SECONDS: i64 = 5;

/// Render-duration estimate for a page that has never been rendered.
pub const DEFAULT_RENDER_ESTIMATE_SECONDS: i64 = 30;
