//! ADB (Android Debug Bridge) backend for the device collaborators.

mod connection;
mod device;
pub mod input;
mod screenshot;
mod ui_tree;

pub use connection::{parse_devices, AdbConnection, ConnectionType, DeviceInfo};
pub use device::{parse_packages, AdbDevice};
pub use screenshot::{decode_screencap, AdbScreenCapture};
pub use ui_tree::{editable_elements, parse_bounds};
