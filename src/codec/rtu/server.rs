// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU server (slave) specific functions.
use super::*;

/// Decode an RTU request.
///
/// Like [`client::decode_response`](super::client::decode_response) this
/// expects `buf` to hold a single candidate frame and refuses to scan
/// past leading garbage.
pub fn decode_request(buf: &[u8]) -> Result<Option<RequestAdu<'_>>> {
    if buf.is_empty() {
        return Ok(None);
    }
    let Some(pdu_len) = request_pdu_len(buf)? else {
        return Ok(None);
    };
    let Some(DecodedFrame { slave, pdu }) = extract_frame(buf, pdu_len)? else {
        return Ok(None);
    };
    let hdr = Header { slave };
    // Decoding of the PDU is unlikely to fail due to transmission errors,
    // because the frame's bytes have already been verified with the CRC.
    Request::try_from(pdu)
        .map(RequestPdu)
        .map(|pdu| Some(RequestAdu { hdr, pdu }))
        .inspect_err(|&err| {
            log::error!("Failed to decode request PDU: {err}");
        })
}

/// Encode an RTU response.
pub fn encode_response(adu: ResponseAdu<'_>, buf: &mut [u8]) -> Result<usize> {
    let ResponseAdu { hdr, pdu } = adu;
    if buf.len() < 2 {
        return Err(Error::BufferSize);
    }
    let len = pdu.encode(&mut buf[1..])?;
    if buf.len() < len + 3 {
        return Err(Error::BufferSize);
    }
    buf[0] = hdr.slave;
    let crc = crc16(&buf[0..=len]);
    LittleEndian::write_u16(&mut buf[len + 1..], crc);
    Ok(len + 3)
}
