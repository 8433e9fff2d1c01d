pub mod capture;
pub mod session;

pub use capture::{CaptureSession, CaptureStation};
pub use session::{Station, StationError, StationSession, WindReset};
