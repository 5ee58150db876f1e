//! Video control seam between the coordinator and the browser tabs.
//!
//! Implementations:
//! - `bridge::BridgeVideoController`: native-messaging round trips to the extension
//! - test doubles in `tests` and `MockVideoController` (mockall)

mod controller;

#[cfg(test)]
pub use controller::MockVideoController;
pub use controller::{
    seek_delta, seek_succeeded, ControllerError, SeekFailureReason, SeekResponse, TabId,
    VideoController, VideoStatus, SEEK_STEP_SECONDS,
};
