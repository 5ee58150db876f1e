pub mod app_state;
pub mod device_status;

pub use app_state::{HeldAction, HeldState, StateSnapshot};
pub use device_status::{DeviceStatus, DeviceStatusUpdate};
