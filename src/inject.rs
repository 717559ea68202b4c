// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Active write-side stress frames.
//!
//! Builders for the frames the injector role puts on the bus: the plain
//! single-register write, the legal-maximum multi-register write, the
//! length-lying oversize write, the corrupt-CRC probe and the maximal
//! read/write combination. Legal frames go through the typed codec path;
//! the deliberately malformed ones are raw byte constructions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::{Rng, RngCore};

use crate::codec::rtu::{Header, RequestAdu, SlaveId, client, crc16};
use crate::error::RunError;
use crate::fault;
use crate::frame::{Address, Data, MAX_WRITE_QUANTITY, Request, RequestPdu, Word};
use crate::transport::Transport;
use crate::util::HexDump;

/// Register count the oversize frame claims to carry.
pub const HUGE_CLAIM: u8 = 250;

/// Payload bytes the oversize frame actually ships.
pub const HUGE_ACTUAL_BYTES: usize = 600;

fn encode_adu(slave: SlaveId, pdu: RequestPdu<'_>) -> Vec<u8> {
    let mut buf = vec![0u8; 3 + pdu.0.pdu_len()];
    let adu = RequestAdu {
        hdr: Header { slave },
        pdu,
    };
    // The buffer is sized from the PDU, so encoding cannot fail.
    let Ok(len) = client::encode_request(adu, &mut buf) else {
        unreachable!();
    };
    buf.truncate(len);
    buf
}

/// Write-single-register frame (`0x06`), 8 bytes.
///
/// With [`BROADCAST`](crate::rtu::BROADCAST) as the slave this becomes the
/// broadcast write every slave consumes and none answers.
#[must_use]
pub fn single_write(slave: SlaveId, register: Address, value: Word) -> Vec<u8> {
    encode_adu(slave, RequestPdu(Request::WriteSingleRegister(register, value)))
}

/// Legal-maximum write-multiple-registers frame (`0x10`): 125 registers,
/// 250 payload bytes, 259 bytes on the wire — already past the official
/// [`MAX_FRAME_LEN`](crate::rtu::MAX_FRAME_LEN), which is part of the
/// stress.
#[must_use]
pub fn wide_write(slave: SlaveId, start: Address, rng: &mut impl Rng) -> Vec<u8> {
    let mut payload = [0u8; MAX_WRITE_QUANTITY as usize * 2];
    rng.fill_bytes(&mut payload);
    let data = Data {
        quantity: MAX_WRITE_QUANTITY as usize,
        data: &payload,
    };
    encode_adu(slave, RequestPdu(Request::WriteMultipleRegisters(start, data)))
}

/// Length-lying write-multiple-registers frame.
///
/// The header claims `claim` registers and a byte count of `claim`, but
/// `actual_bytes` of payload follow. The trailing CRC covers only the
/// declared extent (header plus `claim` payload bytes) — the bytes beyond
/// it are the fault under test, probing buffer handling in the receiver.
#[must_use]
pub fn huge_write(
    slave: SlaveId,
    start: Address,
    claim: u8,
    actual_bytes: usize,
    rng: &mut impl Rng,
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(7 + actual_bytes + 2);
    frame.push(slave);
    frame.push(0x10);
    frame.extend_from_slice(&start.to_be_bytes());
    frame.extend_from_slice(&u16::from(claim).to_be_bytes());
    frame.push(claim);
    let mut payload = vec![0u8; actual_bytes];
    rng.fill_bytes(&mut payload);
    frame.extend_from_slice(&payload);
    let declared = 7 + usize::from(claim);
    let crc = crc16(&frame[..declared]);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// A single-register write with its CRC zeroed out.
#[must_use]
pub fn corrupt_single_write(slave: SlaveId, register: Address, rng: &mut impl Rng) -> Vec<u8> {
    let value = rng.gen_range(0..=u16::MAX);
    fault::corrupt_crc(&single_write(slave, register, value))
}

/// Maximal read/write-multiple-registers frame (`0x17`): read 1 register,
/// write 125 (250 payload bytes, 263 bytes on the wire). Legal but
/// maximal; stresses allocation in many slave stacks.
#[must_use]
pub fn read_write_max(slave: SlaveId, start: Address, rng: &mut impl Rng) -> Vec<u8> {
    let mut payload = [0u8; MAX_WRITE_QUANTITY as usize * 2];
    rng.fill_bytes(&mut payload);
    let data = Data {
        quantity: MAX_WRITE_QUANTITY as usize,
        data: &payload,
    };
    encode_adu(
        slave,
        RequestPdu(Request::ReadWriteMultipleRegisters(start, 1, start, data)),
    )
}

/// `len` random bytes followed by a bogus `00 00` checksum, for overrun
/// probing of UART receive paths.
#[must_use]
pub fn flood_chunk(len: usize, rng: &mut impl Rng) -> Vec<u8> {
    let mut chunk = vec![0u8; len + 2];
    rng.fill_bytes(&mut chunk[..len]);
    chunk
}

/// The mutually exclusive frame flavors of the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectMode {
    /// One random value into the target register per frame.
    SingleWrite,
    /// [`wide_write`]: the 125-register legal maximum.
    Wide,
    /// [`huge_write`]: claims 250 registers, ships 600 bytes.
    Huge,
    /// [`corrupt_single_write`]: zeroed CRC, watchdog/DoS probe.
    BadCrc,
}

/// Periodically puts stress frames on the bus.
#[derive(Debug, Clone)]
pub struct Injector {
    pub slave: SlaveId,
    pub register: Address,
    pub mode: InjectMode,
    /// Pause between consecutive frames.
    pub interval: Duration,
}

impl Default for Injector {
    fn default() -> Self {
        Self {
            slave: 1,
            register: 0x0051,
            mode: InjectMode::SingleWrite,
            interval: Duration::from_secs(1),
        }
    }
}

impl Injector {
    /// Build the next frame for the configured mode.
    pub fn next_frame(&self, rng: &mut impl Rng) -> Vec<u8> {
        match self.mode {
            InjectMode::SingleWrite => {
                let value = rng.gen_range(0..=u16::MAX);
                single_write(self.slave, self.register, value)
            }
            InjectMode::Wide => wide_write(self.slave, self.register, rng),
            InjectMode::Huge => {
                huge_write(self.slave, self.register, HUGE_CLAIM, HUGE_ACTUAL_BYTES, rng)
            }
            InjectMode::BadCrc => corrupt_single_write(self.slave, self.register, rng),
        }
    }

    /// Send frames until `cancel` is raised.
    ///
    /// Transport failures are fatal; there is nothing to resynchronize on
    /// the transmit side.
    pub fn run<T: Transport>(
        &self,
        port: &mut T,
        rng: &mut impl Rng,
        cancel: &AtomicBool,
    ) -> Result<(), RunError> {
        while !cancel.load(Ordering::Relaxed) {
            let frame = self.next_frame(rng);
            port.write_all(&frame)?;
            log::info!("→ {} ({} B)", HexDump(&frame), frame.len());
            thread::sleep(self.interval);
        }
        Ok(())
    }
}
