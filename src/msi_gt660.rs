//! MSI GT660 LED controller protocol.
//!
//! Every command is an 8 byte frame written with a class SET_CONFIGURATION
//! request, followed by a class CLEAR_FEATURE read which returns the device
//! state in a frame of the same shape.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};
use clap::ValueEnum;
use rusb::constants::{LIBUSB_REQUEST_CLEAR_FEATURE, LIBUSB_REQUEST_SET_CONFIGURATION};
use tracing::{debug, error};

use crate::controller::ControlTransport;
use crate::error::{Error, Result, TransferError};

/// Size of request and response frames.
pub const FRAME_LEN: usize = 8;

/// Firmware version this tool was written against.
pub const EXPECTED_VERSION: &str = "UF1.0";

const CONFIG_VALUE: u16 = 0x301;
const CONFIG_INDEX: u16 = 0x00;
const TIMEOUT: Duration = Duration::from_secs(1);

/// Command family marker, first byte of every frame.
const FAMILY: u8 = 0x01;

const CMD_GET: u8 = 0x01;
const CMD_SET: u8 = 0x02;
const CMD_VERSION: u8 = 0x10;

const GET_MODE: u8 = 0x10;
const SET_MODE: u8 = 0x20;
const SET_LEDS: u8 = 0x30;

/// Response offsets.
const VERSION_RANGE: std::ops::Range<usize> = 2..7;
const VALUE_OFFSET: usize = 3;
const ENABLED_OFFSET: usize = 4;

bitflags! {
    /// LED groups.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Leds: u8 {
        const BACK = 0x01;
        const SIDE = 0x02;
        const FRONT = 0x04;
    }
}

/// Animation mode.
#[derive(ValueEnum, Default, PartialEq, Eq, Debug, Copy, Clone)]
#[repr(u8)]
pub enum Mode {
    Blink = 0x01,
    Audio = 0x02,
    Breath = 0x03,
    Demo = 0x04,
    #[default]
    Always = 0x05,
}

impl TryFrom<u8> for Mode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Blink),
            0x02 => Ok(Self::Audio),
            0x03 => Ok(Self::Breath),
            0x04 => Ok(Self::Demo),
            0x05 => Ok(Self::Always),
            value => Err(Error::UnknownMode(value)),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Blink => "BLINK",
            Self::Audio => "AUDIO",
            Self::Breath => "BREATH",
            Self::Demo => "DEMO",
            Self::Always => "ALWAYS",
        };
        f.write_str(name)
    }
}

/// Request for the firmware version string.
pub fn version_request() -> Bytes {
    frame(&[CMD_VERSION])
}

/// Request for the current mode and enabled flag.
pub fn get_mode_request() -> Bytes {
    frame(&[CMD_GET, GET_MODE])
}

/// Request replacing the set of enabled LED groups.
pub fn set_leds_request(leds: Leds) -> Bytes {
    frame(&[CMD_SET, SET_LEDS, leds.bits()])
}

/// Request replacing the animation mode and enabled flag.
pub fn set_mode_request(mode: Mode, enabled: bool) -> Bytes {
    frame(&[CMD_SET, SET_MODE, mode as u8, enabled as u8])
}

fn frame(command: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_LEN);

    buf.put_u8(FAMILY);
    buf.put_slice(command);

    // Padding.
    buf.put_bytes(0, FRAME_LEN - buf.len());

    buf.freeze()
}

/// Device response frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Response {
    buf: [u8; FRAME_LEN],
    len: usize,
}

impl Response {
    pub fn new(buf: [u8; FRAME_LEN], len: usize) -> Self {
        Self { buf, len: len.min(FRAME_LEN) }
    }

    fn byte(&self, offset: usize) -> Result<u8> {
        self.bytes(offset..offset + 1).map(|bytes| bytes[0])
    }

    fn bytes(&self, range: std::ops::Range<usize>) -> Result<&[u8]> {
        if range.end > self.len {
            return Err(Error::ShortResponse { expected: range.end, actual: self.len });
        }
        Ok(&self.buf[range])
    }

    /// Firmware version string.
    pub fn version(&self) -> Result<String> {
        let bytes = self.bytes(VERSION_RANGE)?;
        let version = String::from_utf8_lossy(bytes);
        Ok(version.trim_end_matches('\0').to_string())
    }

    /// Confirmed mode and enabled flag.
    pub fn mode(&self) -> Result<(Mode, bool)> {
        let mode = Mode::try_from(self.byte(VALUE_OFFSET)?)?;
        let enabled = self.byte(ENABLED_OFFSET)? != 0;
        Ok((mode, enabled))
    }

    /// Confirmed LED groups; unknown bits are dropped.
    pub fn leds(&self) -> Result<Leds> {
        Ok(Leds::from_bits_truncate(self.byte(VALUE_OFFSET)?))
    }
}

/// Send one request frame and read back the device response.
pub fn exchange<T>(transport: &T, request: &[u8]) -> Result<Response>
where
    T: ControlTransport + ?Sized,
{
    debug!("OUT {:02x?}", request);
    let request_code = LIBUSB_REQUEST_SET_CONFIGURATION;
    transport
        .write_control(request_code, CONFIG_VALUE, CONFIG_INDEX, request, TIMEOUT)
        .map_err(|err| transfer_failed("OUT", err))?;

    let mut buf = [0; FRAME_LEN];
    let len = transport
        .read_control(LIBUSB_REQUEST_CLEAR_FEATURE, CONFIG_VALUE, CONFIG_INDEX, &mut buf, TIMEOUT)
        .map_err(|err| transfer_failed("IN", err))?;
    debug!("IN  {:02x?}", &buf[..len.min(FRAME_LEN)]);

    Ok(Response::new(buf, len))
}

fn transfer_failed(direction: &str, err: TransferError) -> Error {
    error!(code = err.code, kind = %err.kind, "{direction} transfer failed");
    Error::Transfer(err)
}
