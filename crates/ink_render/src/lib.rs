//! The render worker: drives the external browser capture once per supported
//! mode, runs the mode codec, and commits the result to the snapshot store.
//!
//! The browser itself sits behind [`ViewportCapture`], an opaque
//! "viewport at W×H → PNG bytes" capability, so the worker never knows
//! which browser (or fake) produced the frame.

mod capture;
mod worker;

pub use capture::{CaptureError, CaptureRequest, SubprocessCapture, ViewportCapture};
pub use worker::{RenderOutcome, RenderWorker};
