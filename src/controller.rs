//! USB transport abstraction.

use std::time::Duration;

use crate::error::{Result, TransferError};

/// USB vendor/product pair of a supported LED controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceId {
    pub vendor: u16,
    pub product: u16,
}

/// Known controller identities, in the order they are probed.
pub const DEVICE_IDS: &[DeviceId] = &[
    // MSI GT660 LED controller (MSI EPF USB).
    DeviceId { vendor: 0x1770, product: 0xff00 },
];

/// Blocking control transfers on the claimed interface of one device.
pub trait ControlTransport {
    /// Host-to-device class request; returns the number of bytes written.
    fn write_control(
        &self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransferError>;

    /// Device-to-host class request; returns the number of bytes read.
    fn read_control(
        &self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransferError>;

    /// Human-readable device name.
    fn device_name(&self) -> Result<String>;
}
