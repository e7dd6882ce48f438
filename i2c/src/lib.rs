//! Driver for the Grove LCD RGB Backlight module over Linux I2C.
//!
//! The module exposes two devices on one bus: an HD44780-compatible LCD
//! controller at address `0x3e` and a PCA9633-style RGB backlight
//! controller at address `0x62`. The [`lcd::GroveLcd`] session owns one
//! bus handle per device and translates display operations into the
//! control-byte-framed messages the controllers expect.

pub mod lcd;
pub mod linux;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum I2cError {
    #[error("error opening I2C bus {path}: errno {errno}")]
    Open { path: String, errno: i32 },
    #[error("error binding I2C address {address:#04x}: errno {errno}")]
    AddressBind { address: u16, errno: i32 },
    #[error("error writing to I2C device: errno {errno}")]
    Write { errno: i32 },
    #[error("short write: {written} of {expected} bytes accepted")]
    ShortWrite { written: usize, expected: usize },
    #[error("bus handle is closed")]
    Closed,
    #[error("invalid argument")]
    InvalidArgument,
}

pub type I2cResult<T> = Result<T, I2cError>;

/// A write-only handle to one device on an I2C bus.
///
/// Each handle is bound to a single 7-bit device address for its whole
/// lifetime. [`linux::LinuxI2cBus`] is the character-device backend;
/// anything implementing this trait can stand in for it.
pub trait I2cBus: Debug {
    /// Writes the buffer as one bus message.
    ///
    /// Returns how many bytes the transport accepted, which the caller
    /// must compare against the buffer length to detect short writes.
    fn write(&mut self, buf: &[u8]) -> I2cResult<usize>;

    /// Releases the handle. Best-effort; closing twice is a no-op.
    fn close(&mut self);

    /// Whether the handle is still open.
    fn is_open(&self) -> bool;
}
