//! libusb transport for the LED controller.

use std::time::Duration;

use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType, UsbContext};
use tracing::{debug, info};

use crate::controller::{ControlTransport, DeviceId};
use crate::error::{Error, Result, TransferError};

/// Control interface used by the controller.
const INTERFACE: u8 = 0;

/// Claimed USB interface of an opened controller.
///
/// The interface is released when this is dropped.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    id: DeviceId,
}

impl UsbTransport {
    /// Open the first available device from `ids` and claim its control interface.
    pub fn open(ids: &[DeviceId], force_reset: bool) -> Result<Self> {
        let context =
            Context::new().map_err(|err| Error::TransportUnavailable(TransferError::from(err)))?;

        let (id, mut handle) = ids
            .iter()
            .find_map(|id| {
                context.open_device_with_vid_pid(id.vendor, id.product).map(|handle| (*id, handle))
            })
            .ok_or(Error::DeviceNotFound)?;

        debug!("Opened device {:04x}:{:04x}", id.vendor, id.product);

        if force_reset {
            handle.reset().map_err(|err| Error::ResetFailed(err.into()))?;
            debug!("Device reset");
        }

        // Platforms without kernel driver support report `NotSupported` here.
        match handle.kernel_driver_active(INTERFACE) {
            Ok(true) => {
                handle
                    .detach_kernel_driver(INTERFACE)
                    .map_err(|err| Error::DriverConflict(err.into()))?;
                info!("Detached kernel driver from interface {INTERFACE}");
            },
            Ok(false) => (),
            Err(err) => debug!("Unable to query kernel driver: {err}"),
        }

        handle.claim_interface(INTERFACE).map_err(|err| Error::InterfaceClaimFailed(err.into()))?;

        Ok(Self { handle, id })
    }

    /// Identity of the opened device.
    pub fn id(&self) -> DeviceId {
        self.id
    }
}

impl ControlTransport for UsbTransport {
    fn write_control(
        &self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransferError> {
        let request_type =
            rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface);
        Ok(self.handle.write_control(request_type, request, value, index, data, timeout)?)
    }

    fn read_control(
        &self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> std::result::Result<usize, TransferError> {
        let request_type =
            rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface);
        Ok(self.handle.read_control(request_type, request, value, index, buf, timeout)?)
    }

    fn device_name(&self) -> Result<String> {
        let device = self.handle.device();
        let descriptor = device.device_descriptor().map_err(TransferError::from)?;
        let name =
            self.handle.read_manufacturer_string_ascii(&descriptor).map_err(TransferError::from)?;
        Ok(name)
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        if let Err(err) = self.handle.release_interface(INTERFACE) {
            debug!("Unable to release interface: {err}");
        }
    }
}
