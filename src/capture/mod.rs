//! Time-boxed capture of a continuous output stream (e.g. logcat)

mod session;

pub use session::{CaptureReport, StreamCapture};
pub use tokio_util::sync::CancellationToken;
