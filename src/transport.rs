// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Byte-oriented, half-duplex bus access.
//!
//! The engine roles own the transport exclusively while they run; only one
//! role may be active on a physical bus at a time.

use std::io;

/// A blocking, timeout-bounded byte channel.
///
/// The read contract mirrors a serial port with a receive timeout: the
/// call blocks until `buf` is full or the timeout expires, and reports how
/// many bytes actually arrived. A short (or zero) count is how silence on
/// the bus manifests; it is *not* an error. `Err` is reserved for hard
/// transport faults, which terminate the running role.
pub trait Transport {
    /// Read bytes into `buf` until it is full or the timeout expires.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Transmit a complete frame.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

#[cfg(feature = "serial")]
pub mod serial {
    //! RS-485 access through the `serialport` crate.

    use super::Transport;
    use std::io::{self, Read, Write};
    use std::time::Duration;

    use serialport::{DataBits, Parity, SerialPort, StopBits};

    /// Line speed of the target bus.
    pub const BAUD_RATE: u32 = 115_200;

    /// A [`Transport`] backed by a physical serial port.
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    /// Open `path` preconfigured for the 115200-8N2 framing of the bus.
    ///
    /// `timeout` bounds every single read; it is the per-byte timeout the
    /// responder relies on to resynchronize on frame boundaries.
    pub fn open(path: &str, timeout: Duration) -> serialport::Result<SerialTransport> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .timeout(timeout)
            .open()?;
        Ok(SerialTransport { port })
    }

    impl Transport for SerialTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut filled = 0;
            while filled < buf.len() {
                match self.port.read(&mut buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                    Err(e) => return Err(e),
                }
            }
            Ok(filled)
        }

        fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
            self.port.write_all(buf)?;
            self.port.flush()
        }
    }
}
