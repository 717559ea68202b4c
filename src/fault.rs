// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deliberately broken reply frames.
//!
//! Each generator violates exactly one protocol invariant so a peer's
//! handling of that invariant can be tested in isolation. All randomness
//! comes from the caller-provided [`Rng`], which makes every fuzz
//! sequence replayable from a seed.

use core::fmt;

use rand::{Rng, RngCore};

use crate::codec::rtu::{SlaveId, append_crc};

/// Ceiling for the data bytes of a single response PDU.
pub const MAX_RESPONSE_DATA_LEN: usize = 252;

/// One way of being wrong on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStyle {
    /// Keep the frame, overwrite its checksum with `00 00`.
    CrcZero,
    /// A minimal frame using a function code outside the profile.
    IllegalFunction,
    /// Declare the maximum legal byte count but lie about the payload.
    OversizeByteCount,
    /// Syntactically valid (correct CRC) but semantically meaningless.
    RandomGarbage,
}

/// Cyclic order used when no fixed style is configured.
pub const ROTATION: [FaultStyle; 4] = [
    FaultStyle::CrcZero,
    FaultStyle::IllegalFunction,
    FaultStyle::OversizeByteCount,
    FaultStyle::RandomGarbage,
];

impl FaultStyle {
    /// Build the faulted reply for this style.
    ///
    /// `frame` is the request being answered; only [`FaultStyle::CrcZero`]
    /// echoes it, the other styles construct fresh frames.
    pub fn forge(self, slave: SlaveId, frame: &[u8], rng: &mut impl Rng) -> Vec<u8> {
        match self {
            Self::CrcZero => corrupt_crc(frame),
            Self::IllegalFunction => illegal_function(slave),
            Self::OversizeByteCount => oversize_byte_count(slave),
            Self::RandomGarbage => random_garbage(slave, rng),
        }
    }
}

impl fmt::Display for FaultStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CrcZero => "crc-zero",
            Self::IllegalFunction => "illegal-function",
            Self::OversizeByteCount => "oversize-byte-count",
            Self::RandomGarbage => "random-garbage",
        };
        write!(f, "{name}")
    }
}

/// Copy `frame` and zero its trailing CRC bytes.
#[must_use]
pub fn corrupt_crc(frame: &[u8]) -> Vec<u8> {
    let mut out = frame.to_vec();
    if let Some(n) = out.len().checked_sub(2) {
        out[n..].fill(0);
    }
    out
}

/// A minimal frame with function code `0x04`, which this engine's profile
/// never uses, and a correct CRC. A conforming peer must answer with an
/// illegal-function exception.
#[must_use]
pub fn illegal_function(slave: SlaveId) -> Vec<u8> {
    append_crc(&[slave, 0x04, 0x00, 0x00])
}

/// A read-holding-registers reply declaring the maximum byte count (252)
/// while actually carrying two header bytes more than declared, padded
/// with the fixed pattern `00..=FB`. Tests whether peers enforce the
/// declared length instead of trusting what arrives.
#[must_use]
pub fn oversize_byte_count(slave: SlaveId) -> Vec<u8> {
    let mut body = Vec::with_capacity(5 + MAX_RESPONSE_DATA_LEN);
    body.extend_from_slice(&[slave, 0x03, MAX_RESPONSE_DATA_LEN as u8, 0x00, 0x00]);
    body.extend((0..MAX_RESPONSE_DATA_LEN).map(|i| i as u8));
    append_crc(&body)
}

/// The slave address followed by 5 to 50 random bytes and a *correct*
/// CRC over them.
#[must_use]
pub fn random_garbage(slave: SlaveId, rng: &mut impl Rng) -> Vec<u8> {
    let len = rng.gen_range(5..=50);
    let mut body = vec![0u8; 1 + len];
    body[0] = slave;
    rng.fill_bytes(&mut body[1..]);
    append_crc(&body)
}

/// When and how the responder deviates from correct protocol behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPolicy {
    /// Fault every n-th completed transaction; `0` disables injection.
    pub every_nth: u32,
    /// Fixed style, or `None` to rotate through [`ROTATION`].
    pub style: Option<FaultStyle>,
}

impl FaultPolicy {
    /// No faults, ever.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            every_nth: 0,
            style: None,
        }
    }

    /// Fault every `n`-th transaction with `style` (or the rotation).
    #[must_use]
    pub const fn every(n: u32, style: Option<FaultStyle>) -> Self {
        Self {
            every_nth: n,
            style,
        }
    }

    /// Whether the transaction with the given (1-based) number is faulted.
    #[must_use]
    pub fn due(&self, counter: u64) -> bool {
        self.every_nth > 0 && counter % u64::from(self.every_nth) == 0
    }
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}
