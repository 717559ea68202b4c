// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

mod codec;
mod error;
mod frame;
mod util;

pub mod fault;
pub mod inject;
pub mod responder;
pub mod scan;
pub mod transport;

pub use codec::rtu;
pub use error::*;
pub use frame::*;
pub use util::HexDump;
