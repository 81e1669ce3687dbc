//! LED controller state.

use tracing::{debug, info, warn};

use crate::controller::{ControlTransport, DEVICE_IDS};
use crate::error::Result;
use crate::msi_gt660::{self, Leds, Mode, EXPECTED_VERSION};
use crate::settings::Settings;
use crate::usb::UsbTransport;

/// Device open parameters.
#[derive(Default, Debug, Copy, Clone)]
pub struct OpenOptions {
    /// Reset the USB device before claiming it.
    pub force_reset: bool,
    /// Report the device name once it is opened.
    pub debug: bool,
}

/// Opened LED controller.
///
/// LED groups and mode are only sent to the device by
/// [`LedController::synchronize`]; every other setter is local.
pub struct LedController<T: ControlTransport> {
    transport: T,
    leds: Leds,
    mode: Mode,
    enabled: bool,
}

impl LedController<UsbTransport> {
    /// Open the first connected LED controller.
    pub fn open(options: OpenOptions) -> Result<Self> {
        let transport = UsbTransport::open(DEVICE_IDS, options.force_reset)?;
        let id = transport.id();
        debug!("Claimed LED controller {:04x}:{:04x}", id.vendor, id.product);

        if options.debug {
            match transport.device_name() {
                Ok(name) => info!("Found LED controller: {name}"),
                Err(err) => warn!("Unable to read device name: {err}"),
            }
        }

        let controller = Self::new(transport)?;

        if options.debug {
            match controller.check_version() {
                Ok(true) => (),
                Ok(false) => warn!("Untested firmware, expected version {EXPECTED_VERSION}"),
                Err(err) => warn!("Unable to read firmware version: {err}"),
            }
        }

        Ok(controller)
    }
}

impl<T: ControlTransport> LedController<T> {
    /// Take ownership of a transport and query the current mode.
    ///
    /// The device has no query for its LED groups, they start out empty until
    /// [`LedController::apply_settings`] is used.
    pub fn new(transport: T) -> Result<Self> {
        let mut controller =
            Self { transport, leds: Leds::empty(), mode: Mode::default(), enabled: true };
        controller.query_mode()?;
        Ok(controller)
    }

    pub fn leds(&self) -> Leds {
        self.leds
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable_leds(&mut self, leds: Leds) {
        self.leds |= leds & Leds::all();
    }

    pub fn disable_leds(&mut self, leds: Leds) {
        self.leds &= !leds;
    }

    /// Enable or disable LED groups.
    ///
    /// Bits outside the known groups are ignored.
    pub fn set_leds(&mut self, leds: Leds, enabled: bool) {
        self.leds.set(leds & Leds::all(), enabled);
    }

    /// Check if any of the `leds` groups is enabled.
    pub fn is_enabled(&self, leds: Leds) -> bool {
        self.leds.intersects(leds)
    }

    pub fn enable_all(&mut self) {
        self.leds = Leds::all();
    }

    pub fn disable_all(&mut self) {
        self.leds = Leds::empty();
    }

    pub fn set_mode(&mut self, mode: Mode, enabled: bool) {
        self.mode = mode;
        self.enabled = enabled;
    }

    /// Push LED groups and mode to the device and store the confirmed values.
    ///
    /// A failed exchange leaves the fields it would have updated untouched.
    pub fn synchronize(&mut self) -> Result<()> {
        let request = msi_gt660::set_leds_request(self.leds);
        let response = msi_gt660::exchange(&self.transport, &request)?;
        self.leds = response.leds()?;

        let request = msi_gt660::set_mode_request(self.mode, self.enabled);
        let response = msi_gt660::exchange(&self.transport, &request)?;
        (self.mode, self.enabled) = response.mode()?;

        debug!(leds = ?self.leds, mode = %self.mode, enabled = self.enabled, "Synchronized");

        Ok(())
    }

    /// Read mode and enabled flag from the device.
    pub fn query_mode(&mut self) -> Result<()> {
        let response = msi_gt660::exchange(&self.transport, &msi_gt660::get_mode_request())?;
        (self.mode, self.enabled) = response.mode()?;
        Ok(())
    }

    /// Firmware version string.
    pub fn version(&self) -> Result<String> {
        msi_gt660::exchange(&self.transport, &msi_gt660::version_request())?.version()
    }

    /// Check if the firmware matches the version this tool knows.
    pub fn check_version(&self) -> Result<bool> {
        Ok(self.version()? == EXPECTED_VERSION)
    }

    /// Device name.
    pub fn device_name(&self) -> Result<String> {
        self.transport.device_name()
    }

    /// Replace local state with persisted settings.
    pub fn apply_settings(&mut self, settings: &Settings) {
        let groups = [
            (settings.back, Leds::BACK),
            (settings.side, Leds::SIDE),
            (settings.front, Leds::FRONT),
        ];
        for (enabled, leds) in groups {
            self.set_leds(leds, enabled);
        }
        self.set_mode(settings.mode, settings.enabled);
    }

    /// Current state as persisted settings.
    pub fn settings(&self) -> Settings {
        Settings {
            back: self.is_enabled(Leds::BACK),
            side: self.is_enabled(Leds::SIDE),
            front: self.is_enabled(Leds::FRONT),
            mode: self.mode,
            enabled: self.enabled,
        }
    }
}
