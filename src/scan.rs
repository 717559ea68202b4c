// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Holding-register map enumeration.
//!
//! Sweeps the 16-bit register address space with strict single-register
//! reads. The bus may carry unrelated traffic, partial frames and
//! collisions, so a reply is only accepted if it is complete, CRC-valid,
//! correctly addressed and exactly the shape of a 1-register data reply —
//! a false positive is worse than a missed register.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::codec::rtu::{Header, RequestAdu, ResponseAdu, SlaveId, client};
use crate::error::RunError;
use crate::frame::{Address, Request, RequestPdu, Response, ResponsePdu, Word};
use crate::transport::Transport;
use crate::util::HexDump;

/// Room for the 3 header bytes plus the largest representable byte count
/// and the checksum.
const REPLY_BUF_LEN: usize = 3 + u8::MAX as usize + 2;

/// Sweep parameters.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// The slave whose register map is enumerated.
    pub slave: SlaveId,
    /// Addresses to probe, ascending.
    pub range: RangeInclusive<Address>,
    /// Collision-avoidance guard between request and read; not a protocol
    /// requirement.
    pub spacing: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            slave: 1,
            range: 0x0000..=0xFFFF,
            spacing: Duration::from_millis(10),
        }
    }
}

/// Enumerate the register map, returning every `(address, value)` pair
/// that answered with genuine data.
///
/// An RTU data reply does not echo the register it answers, so a reply
/// can only be attributed to a request by send/receive ordering. The
/// sweep therefore drains at most one reply per request and rejects
/// anything that is not a fully self-consistent 1-register reply; a
/// misattributed value would require a well-formed, correctly addressed
/// frame to arrive in exactly the reply window of another register.
pub fn sweep<T: Transport>(
    config: &ScanConfig,
    port: &mut T,
    cancel: &AtomicBool,
) -> Result<Vec<(Address, Word)>, RunError> {
    let mut found = Vec::new();
    for register in config.range.clone() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if let Some(value) = probe(config, port, register)? {
            log::info!("0x{register:04X}  0x{value:04X}");
            found.push((register, value));
        }
    }
    Ok(found)
}

/// Probe a single register; `None` means noise, silence or a rejection.
fn probe<T: Transport>(
    config: &ScanConfig,
    port: &mut T,
    register: Address,
) -> Result<Option<Word>, RunError> {
    let mut request = [0u8; 8];
    let len = client::encode_request(
        RequestAdu {
            hdr: Header {
                slave: config.slave,
            },
            pdu: RequestPdu(Request::ReadHoldingRegisters(register, 1)),
        },
        &mut request,
    )?;
    port.write_all(&request[..len])?;

    thread::sleep(config.spacing);

    // Read the fixed reply header first, then exactly the number of bytes
    // it announces. Anything shorter is a truncated frame.
    let mut reply = [0u8; REPLY_BUF_LEN];
    let got = port.read(&mut reply[..3])?;
    if got < 3 {
        return Ok(None);
    }
    let byte_count = usize::from(reply[2]);
    let total = 3 + byte_count + 2;
    let got = port.read(&mut reply[3..total])?;
    if got < total - 3 {
        log::debug!(
            "0x{register:04X}: frame incomplete: {}",
            HexDump(&reply[..3 + got])
        );
        return Ok(None);
    }

    match client::decode_response(&reply[..total]) {
        Ok(Some(ResponseAdu {
            hdr,
            pdu: ResponsePdu(Ok(Response::ReadHoldingRegisters(data))),
        })) if hdr.slave == config.slave && data.len() == 1 => Ok(data.get(0)),
        Ok(Some(ResponseAdu {
            pdu: ResponsePdu(Err(ex)),
            ..
        })) => {
            log::debug!("0x{register:04X}: exception reply ({})", ex.exception);
            Ok(None)
        }
        Ok(_) => {
            log::debug!("0x{register:04X}: not our reply: {}", HexDump(&reply[..total]));
            Ok(None)
        }
        Err(err) => {
            log::debug!("0x{register:04X}: rejected reply: {err}");
            Ok(None)
        }
    }
}
