//! Linux I2C character-device backend.
//!
//! Opens `/dev/i2c-N` and binds the descriptor to one device address
//! with the `I2C_SLAVE` ioctl. One [`LinuxI2cBus`] is created per
//! logical device, so a bus path is typically opened more than once.

use crate::{I2cBus, I2cError, I2cResult};
use log::trace;
use std::ffi::CString;
use std::fmt::{Debug, Formatter};
use std::os::raw::c_void;

// From linux/i2c-dev.h.
const I2C_SLAVE: libc::c_ulong = 0x0703;

fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(-1)
}

pub struct LinuxI2cBus {
    fd: libc::c_int,
    address: u16,
}

impl LinuxI2cBus {
    /// Opens the bus at `path` and binds the descriptor to `address`.
    ///
    /// If the address bind fails, the descriptor opened just before is
    /// closed again before the error is returned.
    pub fn open(path: &str, address: u16) -> I2cResult<Self> {
        let c_path = CString::new(path).map_err(|_| I2cError::InvalidArgument)?;

        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(I2cError::Open {
                path: path.to_string(),
                errno: errno(),
            });
        }

        if unsafe { libc::ioctl(fd, I2C_SLAVE, address as libc::c_ulong) } < 0 {
            let err = I2cError::AddressBind {
                address,
                errno: errno(),
            };
            unsafe { libc::close(fd) };
            return Err(err);
        }

        trace!("Opened {} as fd {} for address {:#04x}", path, fd, address);

        Ok(LinuxI2cBus { fd, address })
    }
}

impl Debug for LinuxI2cBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2cBus(fd {}, addr {:#04x})", self.fd, self.address)
    }
}

impl I2cBus for LinuxI2cBus {
    fn write(&mut self, buf: &[u8]) -> I2cResult<usize> {
        if self.fd < 0 {
            return Err(I2cError::Closed);
        }

        let written = unsafe { libc::write(self.fd, buf.as_ptr() as *const c_void, buf.len()) };
        if written < 0 {
            return Err(I2cError::Write { errno: errno() });
        }

        Ok(written as usize)
    }

    fn close(&mut self) {
        if self.fd >= 0 {
            trace!("Closing fd {} (addr {:#04x})", self.fd, self.address);
            unsafe { libc::close(self.fd) };
            self.fd = -1;
        }
    }

    fn is_open(&self) -> bool {
        self.fd >= 0
    }
}

impl Drop for LinuxI2cBus {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_bus_fails() {
        let result = LinuxI2cBus::open("/dev/i2c-none-such", 0x3e);
        match result {
            Err(I2cError::Open { path, errno }) => {
                assert_eq!(path, "/dev/i2c-none-such");
                assert_eq!(errno, libc::ENOENT);
            }
            other => panic!("expected open failure, got {:?}", other),
        }
    }

    #[test]
    fn interior_nul_in_path_is_rejected() {
        let result = LinuxI2cBus::open("/dev/\0i2c-0", 0x3e);
        assert!(matches!(result, Err(I2cError::InvalidArgument)));
    }
}
