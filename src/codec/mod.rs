use crate::{error::Error, frame::*};
use byteorder::{BigEndian, ByteOrder};

pub mod rtu;

type Result<T> = core::result::Result<T, Error>;

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let data = &mut [0; 2];
        let fn_code: u8 = ex.function.into();
        data[0] = fn_code | EXCEPTION_FLAG;
        data[1] = ex.exception as u8;
        *data
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::BufferSize);
        }
        let fn_err_code = bytes[0];
        if fn_err_code < EXCEPTION_FLAG {
            return Err(Error::ExceptionFnCode(fn_err_code));
        }
        let function = (fn_err_code - EXCEPTION_FLAG).into();
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl<'r> TryFrom<&'r [u8]> for Request<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::BufferSize);
        }

        let fn_code = bytes[0];

        if bytes.len() < min_request_pdu_len(fn_code.into()) {
            return Err(Error::BufferSize);
        }

        use crate::frame::Request::*;
        use FunctionCode as f;

        let req = match FunctionCode::from(fn_code) {
            f::ReadHoldingRegisters => ReadHoldingRegisters(
                BigEndian::read_u16(&bytes[1..3]),
                BigEndian::read_u16(&bytes[3..5]),
            ),
            f::WriteSingleRegister => WriteSingleRegister(
                BigEndian::read_u16(&bytes[1..3]),
                BigEndian::read_u16(&bytes[3..5]),
            ),
            f::WriteMultipleRegisters => {
                let address = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]) as usize;
                let byte_count = bytes[5];
                if bytes.len() < (6 + byte_count as usize) {
                    return Err(Error::ByteCount(byte_count));
                }
                let data = Data {
                    quantity,
                    data: &bytes[6..6 + byte_count as usize],
                };
                WriteMultipleRegisters(address, data)
            }
            f::ReadWriteMultipleRegisters => {
                let read_address = BigEndian::read_u16(&bytes[1..3]);
                let read_quantity = BigEndian::read_u16(&bytes[3..5]);
                let write_address = BigEndian::read_u16(&bytes[5..7]);
                let write_quantity = BigEndian::read_u16(&bytes[7..9]) as usize;
                let write_count = bytes[9];
                if bytes.len() < (10 + write_count as usize) {
                    return Err(Error::ByteCount(write_count));
                }
                let data = Data {
                    quantity: write_quantity,
                    data: &bytes[10..10 + write_count as usize],
                };
                ReadWriteMultipleRegisters(read_address, read_quantity, write_address, data)
            }
            f::Custom(code) => return Err(Error::FnCode(code)),
        };
        Ok(req)
    }
}

impl<'r> TryFrom<&'r [u8]> for Response<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        use crate::frame::Response::*;
        if bytes.is_empty() {
            return Err(Error::BufferSize);
        }
        let fn_code = bytes[0];
        if bytes.len() < min_response_pdu_len(fn_code.into()) {
            return Err(Error::BufferSize);
        }
        use FunctionCode as f;
        let rsp = match FunctionCode::from(fn_code) {
            f::ReadHoldingRegisters | f::ReadWriteMultipleRegisters => {
                let byte_count = bytes[1] as usize;
                if byte_count + 2 > bytes.len() {
                    return Err(Error::BufferSize);
                }
                let quantity = byte_count / 2;
                let data = Data {
                    quantity,
                    data: &bytes[2..2 + byte_count],
                };
                match FunctionCode::from(fn_code) {
                    f::ReadHoldingRegisters => ReadHoldingRegisters(data),
                    f::ReadWriteMultipleRegisters => ReadWriteMultipleRegisters(data),
                    _ => unreachable!(),
                }
            }
            f::WriteSingleRegister | f::WriteMultipleRegisters => {
                let addr = BigEndian::read_u16(&bytes[1..]);
                let payload = BigEndian::read_u16(&bytes[3..]);
                match FunctionCode::from(fn_code) {
                    f::WriteSingleRegister => WriteSingleRegister(addr, payload),
                    f::WriteMultipleRegisters => WriteMultipleRegisters(addr, payload),
                    _ => unreachable!(),
                }
            }
            f::Custom(code) => return Err(Error::FnCode(code)),
        };
        Ok(rsp)
    }
}

impl RequestPdu<'_> {
    /// Serialize the PDU into `buf` and return the number of bytes written.
    pub(crate) fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let RequestPdu(req) = self;
        let len = req.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[0] = FunctionCode::from(*req).value();
        use crate::frame::Request::*;
        match *req {
            ReadHoldingRegisters(address, quantity) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], quantity);
            }
            WriteSingleRegister(address, word) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], word);
            }
            WriteMultipleRegisters(address, data) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], data.len() as u16);
                buf[5] = (data.len() * 2) as u8;
                data.copy_to(&mut buf[6..]);
            }
            ReadWriteMultipleRegisters(read_address, read_quantity, write_address, data) => {
                BigEndian::write_u16(&mut buf[1..], read_address);
                BigEndian::write_u16(&mut buf[3..], read_quantity);
                BigEndian::write_u16(&mut buf[5..], write_address);
                BigEndian::write_u16(&mut buf[7..], data.len() as u16);
                buf[9] = (data.len() * 2) as u8;
                data.copy_to(&mut buf[10..]);
            }
        }
        Ok(len)
    }
}

impl ResponsePdu<'_> {
    /// Serialize the PDU (normal or exception reply) into `buf`.
    pub(crate) fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let ResponsePdu(rsp) = self;
        match rsp {
            Ok(rsp) => {
                let len = rsp.pdu_len();
                if buf.len() < len {
                    return Err(Error::BufferSize);
                }
                buf[0] = FunctionCode::from(*rsp).value();
                use crate::frame::Response::*;
                match *rsp {
                    ReadHoldingRegisters(data) | ReadWriteMultipleRegisters(data) => {
                        buf[1] = (data.len() * 2) as u8;
                        data.copy_to(&mut buf[2..]);
                    }
                    WriteSingleRegister(address, word) => {
                        BigEndian::write_u16(&mut buf[1..], address);
                        BigEndian::write_u16(&mut buf[3..], word);
                    }
                    WriteMultipleRegisters(address, quantity) => {
                        BigEndian::write_u16(&mut buf[1..], address);
                        BigEndian::write_u16(&mut buf[3..], quantity);
                    }
                }
                Ok(len)
            }
            Err(ex) => {
                if buf.len() < 2 {
                    return Err(Error::BufferSize);
                }
                let bytes: [u8; 2] = (*ex).into();
                buf[..2].copy_from_slice(&bytes);
                Ok(2)
            }
        }
    }
}

fn min_request_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode::*;
    match fn_code {
        ReadHoldingRegisters | WriteSingleRegister => 5,
        WriteMultipleRegisters => 6,
        ReadWriteMultipleRegisters => 10,
        Custom(_) => 1,
    }
}

fn min_response_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode::*;
    match fn_code {
        ReadHoldingRegisters | ReadWriteMultipleRegisters => 2,
        WriteSingleRegister | WriteMultipleRegisters => 5,
        Custom(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_response_into_bytes() {
        let bytes: [u8; 2] = ExceptionResponse {
            function: 0x03.into(),
            exception: Exception::IllegalDataAddress,
        }
        .into();
        assert_eq!(bytes[0], 0x83);
        assert_eq!(bytes[1], 0x02);
    }

    #[test]
    fn exception_response_from_bytes() {
        let data: &[u8] = &[0x79, 0x02];
        assert!(ExceptionResponse::try_from(data).is_err());

        let bytes: &[u8] = &[0x83, 0x02];
        let rsp = ExceptionResponse::try_from(bytes).unwrap();
        assert_eq!(
            rsp,
            ExceptionResponse {
                function: 0x03.into(),
                exception: Exception::IllegalDataAddress,
            }
        );
    }

    #[test]
    fn test_min_request_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_request_pdu_len(ReadHoldingRegisters), 5);
        assert_eq!(min_request_pdu_len(WriteSingleRegister), 5);
        assert_eq!(min_request_pdu_len(WriteMultipleRegisters), 6);
        assert_eq!(min_request_pdu_len(ReadWriteMultipleRegisters), 10);
    }

    #[test]
    fn test_min_response_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_response_pdu_len(ReadHoldingRegisters), 2);
        assert_eq!(min_response_pdu_len(WriteSingleRegister), 5);
        assert_eq!(min_response_pdu_len(WriteMultipleRegisters), 5);
        assert_eq!(min_response_pdu_len(ReadWriteMultipleRegisters), 2);
    }

    mod deserialize_requests {
        use super::*;

        #[test]
        fn empty_request() {
            let data: &[u8] = &[];
            assert!(Request::try_from(data).is_err());
        }

        #[test]
        fn unsupported_function() {
            let data: &[u8] = &[0x04, 0x00, 0x09, 0x00, 0x4D];
            assert_eq!(Request::try_from(data).err(), Some(Error::FnCode(0x04)));
        }

        #[test]
        fn read_holding_registers() {
            let data: &[u8] = &[0x03];
            assert!(Request::try_from(data).is_err());

            let bytes: &[u8] = &[0x03, 0x00, 0x09, 0x00, 0x4D];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::ReadHoldingRegisters(0x09, 77));
        }

        #[test]
        fn write_single_register() {
            let bytes: &[u8] = &[0x06, 0x00, 0x07, 0xAB, 0xCD];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::WriteSingleRegister(0x07, 0xABCD));
        }

        #[test]
        fn write_multiple_registers() {
            let data: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x05, 0xAB, 0xCD, 0xEF, 0x12];
            assert!(Request::try_from(data).is_err());

            let bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::WriteMultipleRegisters(
                    0x06,
                    Data {
                        quantity: 2,
                        data: &[0xAB, 0xCD, 0xEF, 0x12]
                    }
                )
            );
            if let Request::WriteMultipleRegisters(_, data) = req {
                assert_eq!(data.get(0), Some(0xABCD));
                assert_eq!(data.get(1), Some(0xEF12));
            } else {
                unreachable!()
            };
        }

        #[test]
        fn read_write_multiple_registers() {
            let data: &[u8] = &[
                0x17, 0x00, 0x05, 0x00, 0x33, 0x00, 0x03, 0x00, 0x02, 0x05, 0xAB, 0xCD, 0xEF, 0x12,
            ];
            assert!(Request::try_from(data).is_err());
            let bytes: &[u8] = &[
                0x17, 0x00, 0x05, 0x00, 0x33, 0x00, 0x03, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12,
            ];
            let req = Request::try_from(bytes).unwrap();
            let data = Data {
                quantity: 2,
                data: &[0xAB, 0xCD, 0xEF, 0x12],
            };
            assert_eq!(
                req,
                Request::ReadWriteMultipleRegisters(0x05, 51, 0x03, data)
            );
        }
    }

    mod serialize_requests {
        use super::*;

        #[test]
        fn read_holding_registers() {
            let buf = &mut [0u8; 5];
            let len = RequestPdu(Request::ReadHoldingRegisters(0x0051, 1))
                .encode(buf)
                .unwrap();
            assert_eq!(len, 5);
            assert_eq!(buf, &[0x03, 0x00, 0x51, 0x00, 0x01]);
        }

        #[test]
        fn write_multiple_registers() {
            let words = &mut [0u8; 4];
            let data = Data::from_words(&[0xABCD, 0xEF12], words).unwrap();
            let buf = &mut [0u8; 16];
            let len = RequestPdu(Request::WriteMultipleRegisters(0x06, data))
                .encode(buf)
                .unwrap();
            assert_eq!(len, 10);
            assert_eq!(
                &buf[..len],
                &[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12]
            );
        }

        #[test]
        fn buffer_too_small() {
            let buf = &mut [0u8; 4];
            assert!(
                RequestPdu(Request::ReadHoldingRegisters(0x0051, 1))
                    .encode(buf)
                    .is_err()
            );
        }
    }

    mod deserialize_responses {
        use super::*;

        #[test]
        fn read_holding_registers() {
            let bytes: &[u8] = &[0x03, 0x04, 0xAA, 0x00, 0x11, 0x11];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadHoldingRegisters(Data {
                    quantity: 2,
                    data: &[0xAA, 0x00, 0x11, 0x11]
                })
            );
        }

        #[test]
        fn read_holding_registers_with_invalid_byte_count() {
            let bytes: &[u8] = &[0x03, 0x04, 0xAA, 0x00];
            assert!(Response::try_from(bytes).is_err());
        }

        #[test]
        fn write_single_register() {
            let bytes: &[u8] = &[0x06, 0x00, 0x07, 0xAB, 0xCD];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::WriteSingleRegister(0x07, 0xABCD));
            let broken_bytes: &[u8] = &[0x06, 0x00, 0x07, 0xAB];
            assert!(Response::try_from(broken_bytes).is_err());
        }

        #[test]
        fn write_multiple_registers() {
            let bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::WriteMultipleRegisters(0x06, 2));
        }

        #[test]
        fn read_write_multiple_registers() {
            let bytes: &[u8] = &[0x17, 0x02, 0x12, 0x34];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadWriteMultipleRegisters(Data {
                    quantity: 1,
                    data: &[0x12, 0x34]
                })
            );
        }

        #[test]
        fn unsupported_function() {
            let bytes: &[u8] = &[0x01, 0x01, 0x00];
            assert_eq!(Response::try_from(bytes).err(), Some(Error::FnCode(0x01)));
        }
    }

    mod serialize_responses {
        use super::*;

        #[test]
        fn read_holding_registers() {
            let words = &mut [0u8; 2];
            let data = Data::from_words(&[0xBEEF], words).unwrap();
            let buf = &mut [0u8; 8];
            let len = ResponsePdu(Ok(Response::ReadHoldingRegisters(data)))
                .encode(buf)
                .unwrap();
            assert_eq!(len, 4);
            assert_eq!(&buf[..len], &[0x03, 0x02, 0xBE, 0xEF]);
        }

        #[test]
        fn exception() {
            let buf = &mut [0u8; 2];
            let len = ResponsePdu(Err(ExceptionResponse {
                function: 0x03.into(),
                exception: Exception::IllegalDataAddress,
            }))
            .encode(buf)
            .unwrap();
            assert_eq!(len, 2);
            assert_eq!(buf, &[0x83, 0x02]);
        }
    }
}
