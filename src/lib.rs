//! MSI GT660 LED controller.
//!
//! [`device::LedController`] owns the claimed USB interface of the controller
//! and keeps the LED groups and animation mode last confirmed by the device.

pub mod controller;
pub mod device;
pub mod error;
pub mod msi_gt660;
pub mod settings;
pub mod usb;
