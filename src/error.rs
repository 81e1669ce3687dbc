//! Error types.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// LED controller error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to initialize USB: {0}")]
    TransportUnavailable(TransferError),

    #[error("LED controller not found")]
    DeviceNotFound,

    #[error("unable to reset device: {0}")]
    ResetFailed(TransferError),

    #[error("unable to detach kernel driver: {0}")]
    DriverConflict(TransferError),

    #[error("unable to claim interface: {0} (root permissions required)")]
    InterfaceClaimFailed(TransferError),

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("short response: expected {expected} bytes, got {actual}")]
    ShortResponse { expected: usize, actual: usize },

    #[error("device reported unknown mode {0:#04x}")]
    UnknownMode(u8),

    #[error("{option}: wrong argument '{value}', use {expected}")]
    InvalidArgument { option: String, value: String, expected: &'static str },
}

/// Transport failure, classified from the libusb error code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({code})")]
pub struct TransferError {
    pub kind: TransferKind,
    pub code: i32,
}

impl TransferError {
    pub fn new(kind: TransferKind) -> Self {
        Self { kind, code: kind.code() }
    }
}

/// Transport failure classes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransferKind {
    Io,
    InvalidParam,
    Access,
    NoDevice,
    NotFound,
    Busy,
    Timeout,
    Overflow,
    Pipe,
    Interrupted,
    NoMemory,
    NotSupported,
    Other,
}

impl TransferKind {
    /// Matching libusb error code.
    pub fn code(self) -> i32 {
        match self {
            Self::Io => -1,
            Self::InvalidParam => -2,
            Self::Access => -3,
            Self::NoDevice => -4,
            Self::NotFound => -5,
            Self::Busy => -6,
            Self::Timeout => -7,
            Self::Overflow => -8,
            Self::Pipe => -9,
            Self::Interrupted => -10,
            Self::NoMemory => -11,
            Self::NotSupported => -12,
            Self::Other => -99,
        }
    }
}

impl Display for TransferKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Io => "IO",
            Self::InvalidParam => "INVALID PARAM",
            Self::Access => "ACCESS",
            Self::NoDevice => "NO DEVICE",
            Self::NotFound => "NOT FOUND",
            Self::Busy => "BUSY",
            Self::Timeout => "TIMEOUT",
            Self::Overflow => "OVERFLOW",
            Self::Pipe => "PIPE",
            Self::Interrupted => "INTERRUPTED",
            Self::NoMemory => "NO MEMORY",
            Self::NotSupported => "NOT SUPPORTED",
            Self::Other => "OTHER",
        };
        f.write_str(name)
    }
}

impl From<rusb::Error> for TransferError {
    fn from(err: rusb::Error) -> Self {
        let kind = match err {
            rusb::Error::Io => TransferKind::Io,
            rusb::Error::InvalidParam => TransferKind::InvalidParam,
            rusb::Error::Access => TransferKind::Access,
            rusb::Error::NoDevice => TransferKind::NoDevice,
            rusb::Error::NotFound => TransferKind::NotFound,
            rusb::Error::Busy => TransferKind::Busy,
            rusb::Error::Timeout => TransferKind::Timeout,
            rusb::Error::Overflow => TransferKind::Overflow,
            rusb::Error::Pipe => TransferKind::Pipe,
            rusb::Error::Interrupted => TransferKind::Interrupted,
            rusb::Error::NoMem => TransferKind::NoMemory,
            rusb::Error::NotSupported => TransferKind::NotSupported,
            #[allow(unreachable_patterns)]
            _ => TransferKind::Other,
        };
        Self::new(kind)
    }
}
