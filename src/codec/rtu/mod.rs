// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU

use super::*;
use byteorder::{ByteOrder, LittleEndian};

pub mod client;
pub mod server;
pub use crate::frame::rtu::{BROADCAST, Header, RequestAdu, ResponseAdu, SlaveId};

// [MODBUS over Serial Line Specification and Implementation Guide V1.02](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf), page 13
// "The maximum size of a MODBUS RTU frame is 256 bytes."
pub const MAX_FRAME_LEN: usize = 256;

/// An extracted RTU PDU frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub slave: SlaveId,
    pub pdu: &'a [u8],
}

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// Polynomial `0xA001` (reflected `0x8005`), initial value `0xFFFF`,
/// input processed LSB first. The returned value is the conventional one,
/// i.e. it appears on the wire in little-endian byte order.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Return `body` with its CRC appended in wire (little-endian) order.
#[must_use]
pub fn append_crc(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(body.len() + 2);
    frame.extend_from_slice(body);
    let mut crc = [0; 2];
    LittleEndian::write_u16(&mut crc, crc16(body));
    frame.extend_from_slice(&crc);
    frame
}

/// Check the trailing CRC of a complete frame.
#[must_use]
pub fn verify_crc(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (body, crc) = frame.split_at(frame.len() - 2);
    LittleEndian::read_u16(crc) == crc16(body)
}

/// Extract the PDU length out of the ADU request buffer.
pub const fn request_pdu_len(adu_buf: &[u8]) -> Result<Option<usize>> {
    if adu_buf.len() < 2 {
        return Ok(None);
    }
    let fn_code = adu_buf[1];
    let len = match fn_code {
        0x03 | 0x06 => Some(5),
        0x10 => {
            if adu_buf.len() > 6 {
                Some(6 + adu_buf[6] as usize)
            } else {
                // incomplete frame
                None
            }
        }
        0x17 => {
            if adu_buf.len() > 10 {
                Some(10 + adu_buf[10] as usize)
            } else {
                // incomplete frame
                None
            }
        }
        _ => {
            return Err(Error::FnCode(fn_code));
        }
    };
    Ok(len)
}

/// Extract the PDU length out of the ADU response buffer.
pub const fn response_pdu_len(adu_buf: &[u8]) -> Result<Option<usize>> {
    if adu_buf.len() < 2 {
        return Ok(None);
    }
    let fn_code = adu_buf[1];
    let len = match fn_code {
        0x03 | 0x17 => {
            if adu_buf.len() > 2 {
                Some(2 + adu_buf[2] as usize)
            } else {
                // incomplete frame
                None
            }
        }
        0x06 | 0x10 => Some(5),
        0x81..=0xFF => Some(2),
        _ => return Err(Error::FnCode(fn_code)),
    };
    Ok(len)
}

/// Extract a PDU frame out of a buffer.
///
/// Returns `Ok(None)` if the buffer does not yet hold the complete frame
/// and an [`Error::Crc`] if the trailing checksum does not match; there is
/// no resynchronization inside the buffer by design, since the probing
/// engine must reject noise rather than scan past it.
pub fn extract_frame(buf: &[u8], pdu_len: usize) -> Result<Option<DecodedFrame<'_>>> {
    if buf.is_empty() {
        return Err(Error::BufferSize);
    }

    let adu_len = 1 + pdu_len;
    if buf.len() >= adu_len + 2 {
        let (adu_buf, crc_buf) = buf.split_at(adu_len);
        // Read trailing CRC and verify ADU
        let expected_crc = LittleEndian::read_u16(&crc_buf[..2]);
        let actual_crc = crc16(adu_buf);
        if expected_crc != actual_crc {
            return Err(Error::Crc(expected_crc, actual_crc));
        }
        let (slave_id, pdu_data) = adu_buf.split_at(1);
        let slave_id = slave_id[0];
        return Ok(Some(DecodedFrame {
            slave: slave_id,
            pdu: pdu_data,
        }));
    }
    // Incomplete frame
    Ok(None)
}
