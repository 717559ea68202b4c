// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod data;
pub(crate) mod rtu;

pub use self::data::*;

/// A Modbus function code.
///
/// Only the codes exercised by the target profile are first-class; every
/// other code travels as [`FunctionCode::Custom`] so that exception
/// replies can echo it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    /// Modbus Function Code: `03` (`0x03`).
    ReadHoldingRegisters,

    /// Modbus Function Code: `06` (`0x06`).
    WriteSingleRegister,

    /// Modbus Function Code: `16` (`0x10`).
    WriteMultipleRegisters,

    /// Modbus Function Code: `23` (`0x17`).
    ReadWriteMultipleRegisters,

    /// Any function code outside the supported profile.
    Custom(u8),
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x03 => Self::ReadHoldingRegisters,
            0x06 => Self::WriteSingleRegister,
            0x10 => Self::WriteMultipleRegisters,
            0x17 => Self::ReadWriteMultipleRegisters,
            code => Self::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => 0x03,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleRegisters => 0x10,
            Self::ReadWriteMultipleRegisters => 0x17,
            Self::Custom(code) => code,
        }
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> Self {
        code.value()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// The bit a slave sets in the echoed function code to mark an exception
/// reply.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// A Modbus address is represented by 16 bit (from `0` to `65535`).
pub type Address = u16;

/// Modbus uses 16 bit for its data items (big-endian representation).
pub type Word = u16;

/// Number of items to process (`0` - `65535`).
pub type Quantity = u16;

/// Largest register count a single write request may legally carry.
pub const MAX_WRITE_QUANTITY: Quantity = 125;

/// Raw PDU data
pub(crate) type RawData<'r> = &'r [u8];

/// A request represents a message from the client (master) to the server (slave).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'r> {
    ReadHoldingRegisters(Address, Quantity),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Data<'r>),
    ReadWriteMultipleRegisters(Address, Quantity, Address, Data<'r>),
}

/// The response data of a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'r> {
    ReadHoldingRegisters(Data<'r>),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Quantity),
    ReadWriteMultipleRegisters(Data<'r>),
}

/// A server (slave) exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: FunctionCode,
    pub exception: Exception,
}

/// Represents a message from the client (master) to the server (slave).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPdu<'r>(pub Request<'r>);

/// Represents a message from the server (slave) to the client (master).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsePdu<'r>(pub Result<Response<'r>, ExceptionResponse>);

impl<'r> From<Request<'r>> for FunctionCode {
    fn from(r: Request<'r>) -> Self {
        use Request as R;

        match r {
            R::ReadHoldingRegisters(_, _) => Self::ReadHoldingRegisters,
            R::WriteSingleRegister(_, _) => Self::WriteSingleRegister,
            R::WriteMultipleRegisters(_, _) => Self::WriteMultipleRegisters,
            R::ReadWriteMultipleRegisters(_, _, _, _) => Self::ReadWriteMultipleRegisters,
        }
    }
}

impl<'r> From<Response<'r>> for FunctionCode {
    fn from(r: Response<'r>) -> Self {
        use Response as R;

        match r {
            R::ReadHoldingRegisters(_) => Self::ReadHoldingRegisters,
            R::WriteSingleRegister(_, _) => Self::WriteSingleRegister,
            R::WriteMultipleRegisters(_, _) => Self::WriteMultipleRegisters,
            R::ReadWriteMultipleRegisters(_) => Self::ReadWriteMultipleRegisters,
        }
    }
}

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl Exception {
    const fn get_name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

impl Request<'_> {
    /// Number of bytes required for a serialized PDU frame.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match *self {
            Self::ReadHoldingRegisters(_, _) | Self::WriteSingleRegister(_, _) => 5,
            Self::WriteMultipleRegisters(_, words) => 6 + words.data.len(),
            Self::ReadWriteMultipleRegisters(_, _, _, words) => 10 + words.data.len(),
        }
    }
}

impl Response<'_> {
    /// Number of bytes required for a serialized PDU frame.
    #[must_use]
    pub const fn pdu_len(&self) -> usize {
        match *self {
            Self::ReadHoldingRegisters(words) | Self::ReadWriteMultipleRegisters(words) => {
                2 + words.len() * 2
            }
            Self::WriteSingleRegister(_, _) | Self::WriteMultipleRegisters(_, _) => 5,
        }
    }
}
