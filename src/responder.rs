// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Passive slave emulator and fuzzer.
//!
//! Synchronizes to frame boundaries on the shared half-duplex line by
//! hunting for its own address byte, answers the one poll it expects and
//! rejects everything else with a protocol exception — unless the fault
//! policy says it is time to misbehave.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;

use crate::codec::rtu::{Header, RequestAdu, ResponseAdu, SlaveId, server, verify_crc};
use crate::error::RunError;
use crate::fault::{FaultPolicy, FaultStyle, ROTATION};
use crate::frame::{
    Address, Data, Exception, ExceptionResponse, FunctionCode, Quantity, Request, RequestPdu,
    Response, ResponsePdu, Word,
};
use crate::transport::Transport;
use crate::util::HexDump;

/// Fixed size of the request frames this profile receives.
///
/// The controller only ever sends the minimal read/write requests:
/// address, function, register, quantity/value, CRC.
pub const REQUEST_LEN: usize = 8;

/// The one poll the emulated slave answers with data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedPoll {
    pub register: Address,
    pub quantity: Quantity,
}

impl Default for ExpectedPoll {
    fn default() -> Self {
        // The controller keeps reading this register.
        Self {
            register: 0x0051,
            quantity: 1,
        }
    }
}

/// What became of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No frame addressed to us arrived before the timeout.
    Idle,
    /// An addressed frame broke off before its end.
    Incomplete { received: usize },
    /// The frame failed its checksum and was dropped without a reply.
    BadCrc,
    /// The expected poll, answered with this value.
    Answered(Word),
    /// Some other valid request, answered with an exception echoing the
    /// given function code.
    Rejected(u8),
    /// A deliberately broken reply was sent instead of a correct one.
    Faulted(FaultStyle),
}

/// The slave emulator.
///
/// Owns the transaction counter and the fault-rotation cursor; its
/// identity and policy are fixed at construction.
pub struct Responder<R> {
    slave: SlaveId,
    expected: ExpectedPoll,
    policy: FaultPolicy,
    rng: R,
    counter: u64,
    rotation: usize,
}

impl<R: Rng> Responder<R> {
    pub fn new(slave: SlaveId, expected: ExpectedPoll, policy: FaultPolicy, rng: R) -> Self {
        Self {
            slave,
            expected,
            policy,
            rng,
            counter: 0,
            rotation: 0,
        }
    }

    /// Completed transactions so far.
    #[must_use]
    pub const fn transactions(&self) -> u64 {
        self.counter
    }

    /// Serve requests until `cancel` is raised.
    ///
    /// The flag is checked once per transaction; a silent bus cannot stall
    /// the loop because every read is bounded by the transport timeout.
    pub fn run<T: Transport>(&mut self, port: &mut T, cancel: &AtomicBool) -> Result<(), RunError> {
        while !cancel.load(Ordering::Relaxed) {
            self.step(port)?;
        }
        Ok(())
    }

    /// Process at most one transaction.
    pub fn step<T: Transport>(&mut self, port: &mut T) -> Result<Outcome, RunError> {
        let mut frame = [0u8; REQUEST_LEN];

        // Hunt for our address byte; the bus carries traffic for other
        // slaves, which is discarded one byte at a time.
        loop {
            let mut byte = [0u8; 1];
            if port.read(&mut byte)? == 0 {
                return Ok(Outcome::Idle);
            }
            if byte[0] == self.slave {
                break;
            }
            log::trace!("not for us: {:02X}", byte[0]);
        }
        frame[0] = self.slave;

        let got = port.read(&mut frame[1..])?;
        if got < REQUEST_LEN - 1 {
            log::warn!("incomplete request: {}", HexDump(&frame[..1 + got]));
            return Ok(Outcome::Incomplete { received: 1 + got });
        }

        log::debug!("← {}", HexDump(&frame));

        // A real slave never answers a corrupted request.
        if !verify_crc(&frame) {
            log::warn!("bad CRC in request: {}", HexDump(&frame));
            return Ok(Outcome::BadCrc);
        }

        self.counter += 1;

        if self.policy.due(self.counter) {
            let style = match self.policy.style {
                Some(style) => style,
                None => {
                    let style = ROTATION[self.rotation % ROTATION.len()];
                    self.rotation += 1;
                    style
                }
            };
            let forged = style.forge(self.slave, &frame, &mut self.rng);
            port.write_all(&forged)?;
            log::info!("→ ({style}) {}", HexDump(&forged));
            return Ok(Outcome::Faulted(style));
        }

        match server::decode_request(&frame) {
            Ok(Some(RequestAdu {
                pdu: RequestPdu(Request::ReadHoldingRegisters(register, quantity)),
                ..
            })) if register == self.expected.register && quantity == self.expected.quantity => {
                self.answer(port)
            }
            // Any other valid shape, an 8-byte frame posing as a longer
            // one, or a function code outside the profile: the request is
            // integrity-checked but semantically wrong.
            Ok(_) | Err(_) => self.reject(port, frame[1]),
        }
    }

    /// Normal reply to the expected poll with a fresh random value.
    fn answer<T: Transport>(&mut self, port: &mut T) -> Result<Outcome, RunError> {
        let value = self.rng.gen_range(0..=u16::MAX);
        let mut words = [0u8; 2];
        let data = Data::from_words(&[value], &mut words)?;
        let mut reply = [0u8; 16];
        let len = server::encode_response(
            ResponseAdu {
                hdr: Header { slave: self.slave },
                pdu: ResponsePdu(Ok(Response::ReadHoldingRegisters(data))),
            },
            &mut reply,
        )?;
        port.write_all(&reply[..len])?;
        log::info!("→ {} (ok)", HexDump(&reply[..len]));
        Ok(Outcome::Answered(value))
    }

    /// Exception reply echoing the offending function code.
    fn reject<T: Transport>(&mut self, port: &mut T, function: u8) -> Result<Outcome, RunError> {
        let mut reply = [0u8; 8];
        let len = server::encode_response(
            ResponseAdu {
                hdr: Header { slave: self.slave },
                pdu: ResponsePdu(Err(ExceptionResponse {
                    function: FunctionCode::new(function),
                    exception: Exception::IllegalDataAddress,
                })),
            },
            &mut reply,
        )?;
        port.write_all(&reply[..len])?;
        log::info!("→ {} (exc)", HexDump(&reply[..len]));
        Ok(Outcome::Rejected(function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::rtu::append_crc;
    use crate::fault;
    use crate::transport::testing::ScriptedPort;
    use rand::{SeedableRng, rngs::StdRng};

    fn poll(register: u16, quantity: u16) -> Vec<u8> {
        let mut body = vec![0x01, 0x03];
        body.extend_from_slice(&register.to_be_bytes());
        body.extend_from_slice(&quantity.to_be_bytes());
        append_crc(&body)
    }

    fn responder(policy: FaultPolicy) -> Responder<StdRng> {
        Responder::new(1, ExpectedPoll::default(), policy, StdRng::seed_from_u64(42))
    }

    #[test]
    fn answers_expected_poll_and_drops_bad_crc() {
        let good = poll(0x0051, 1);
        let bad = fault::corrupt_crc(&good);
        let mut port = ScriptedPort::new([good, bad]);
        let mut responder = responder(FaultPolicy::disabled());

        let first = responder.step(&mut port).unwrap();
        assert!(matches!(first, Outcome::Answered(_)));
        assert_eq!(responder.step(&mut port).unwrap(), Outcome::BadCrc);
        assert_eq!(responder.step(&mut port).unwrap(), Outcome::Idle);

        // Exactly one reply went out, and it is a well-formed data reply.
        assert_eq!(port.writes.len(), 1);
        let reply = &port.writes[0];
        assert_eq!(reply.len(), 7);
        assert_eq!(&reply[..3], &[0x01, 0x03, 0x02]);
        assert!(crate::rtu::verify_crc(reply));
    }

    #[test]
    fn rejects_unexpected_poll_with_exception() {
        let mut port = ScriptedPort::new([poll(0x1234, 1)]);
        let mut responder = responder(FaultPolicy::disabled());

        assert_eq!(responder.step(&mut port).unwrap(), Outcome::Rejected(0x03));
        let reply = &port.writes[0];
        assert_eq!(&reply[..3], &[0x01, 0x83, 0x02]);
        assert!(crate::rtu::verify_crc(reply));
    }

    #[test]
    fn rejects_undefined_function_with_exception() {
        // 8-byte frame with a valid CRC but function 0x04.
        let mut body = vec![0x01, 0x04];
        body.extend_from_slice(&[0x00, 0x51, 0x00, 0x01]);
        let mut port = ScriptedPort::new([append_crc(&body)]);
        let mut responder = responder(FaultPolicy::disabled());

        assert_eq!(responder.step(&mut port).unwrap(), Outcome::Rejected(0x04));
        assert_eq!(&port.writes[0][..3], &[0x01, 0x84, 0x02]);
    }

    #[test]
    fn ignores_foreign_traffic() {
        // A frame for slave 5 that never contains our address byte.
        let mut port = ScriptedPort::new([vec![0x05, 0x03, 0x00, 0x51, 0x00, 0x05, 0xD5, 0x7B]]);
        let mut responder = responder(FaultPolicy::disabled());

        assert_eq!(responder.step(&mut port).unwrap(), Outcome::Idle);
        assert!(port.writes.is_empty());
        assert_eq!(responder.transactions(), 0);
    }

    #[test]
    fn aborts_incomplete_frames() {
        let mut truncated = poll(0x0051, 1);
        truncated.truncate(5);
        let mut port = ScriptedPort::new([truncated, poll(0x0051, 1)]);
        let mut responder = responder(FaultPolicy::disabled());

        assert_eq!(
            responder.step(&mut port).unwrap(),
            Outcome::Incomplete { received: 5 }
        );
        // Resynchronized on the next frame.
        assert!(matches!(
            responder.step(&mut port).unwrap(),
            Outcome::Answered(_)
        ));
    }

    #[test]
    fn fault_policy_cadence_and_rotation() {
        let polls: Vec<_> = (0..9).map(|_| poll(0x0051, 1)).collect();
        let mut port = ScriptedPort::new(polls);
        let mut responder = responder(FaultPolicy::every(3, None));

        let outcomes: Vec<_> = (0..9)
            .map(|_| responder.step(&mut port).unwrap())
            .collect();

        let faulted: Vec<_> = outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| match o {
                Outcome::Faulted(style) => Some((i, *style)),
                _ => None,
            })
            .collect();
        assert_eq!(
            faulted,
            [
                (2, FaultStyle::CrcZero),
                (5, FaultStyle::IllegalFunction),
                (8, FaultStyle::OversizeByteCount),
            ]
        );
        // All other transactions were answered normally.
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, Outcome::Answered(_)))
                .count(),
            6
        );
        assert_eq!(responder.transactions(), 9);
    }

    #[test]
    fn fixed_fault_style_is_not_rotated() {
        let polls: Vec<_> = (0..4).map(|_| poll(0x0051, 1)).collect();
        let mut port = ScriptedPort::new(polls);
        let mut responder = responder(FaultPolicy::every(2, Some(FaultStyle::RandomGarbage)));

        let outcomes: Vec<_> = (0..4)
            .map(|_| responder.step(&mut port).unwrap())
            .collect();
        assert!(matches!(outcomes[0], Outcome::Answered(_)));
        assert_eq!(outcomes[1], Outcome::Faulted(FaultStyle::RandomGarbage));
        assert!(matches!(outcomes[2], Outcome::Answered(_)));
        assert_eq!(outcomes[3], Outcome::Faulted(FaultStyle::RandomGarbage));
    }

    #[test]
    fn crc_zero_fault_echoes_the_request() {
        let request = poll(0x0051, 1);
        let mut port = ScriptedPort::new([request.clone()]);
        let mut responder = responder(FaultPolicy::every(1, Some(FaultStyle::CrcZero)));

        assert_eq!(
            responder.step(&mut port).unwrap(),
            Outcome::Faulted(FaultStyle::CrcZero)
        );
        assert_eq!(port.writes[0], fault::corrupt_crc(&request));
    }

    #[test]
    fn run_stops_on_cancellation() {
        let mut port = ScriptedPort::new([]);
        let mut responder = responder(FaultPolicy::disabled());
        let cancel = AtomicBool::new(true);
        responder.run(&mut port, &cancel).unwrap();
        assert!(port.writes.is_empty());
    }
}
