// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus RTU client (master) specific functions.
use super::*;

/// Encode an RTU request.
pub fn encode_request(adu: RequestAdu<'_>, buf: &mut [u8]) -> Result<usize> {
    let RequestAdu { hdr, pdu } = adu;
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

/// Decode an RTU response.
///
/// `buf` must hold exactly one candidate frame, starting at its address
/// byte. Anything that is not a complete, CRC-valid reply of a supported
/// shape is an error; the caller decides whether that is fatal or just
/// bus noise.
pub fn decode_response(buf: &[u8]) -> Result<Option<ResponseAdu<'_>>> {
    if buf.is_empty() {
        return Ok(None);
    }
    let Some(pdu_len) = response_pdu_len(buf)? else {
        return Ok(None);
    };
    let Some(DecodedFrame { slave, pdu }) = extract_frame(buf, pdu_len)? else {
        return Ok(None);
    };
    let hdr = Header { slave };
    // Decoding of the PDU is unlikely to fail due to transmission errors,
    // because the frame's bytes have already been verified with the CRC.
    ExceptionResponse::try_from(pdu)
        .map(|er| ResponsePdu(Err(er)))
        .or_else(|_| Response::try_from(pdu).map(|r| ResponsePdu(Ok(r))))
        .map(|pdu| Some(ResponseAdu { hdr, pdu }))
        .inspect_err(|&err| {
            log::error!("Failed to decode response PDU: {err}");
        })
}
