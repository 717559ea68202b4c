use core::fmt;

/// Protocol-level error.
///
/// Raised while encoding or decoding frames; always recoverable for the
/// engine loops, which discard the offending frame and resynchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid buffer size
    BufferSize,
    /// Invalid function code
    FnCode(u8),
    /// Invalid exception code
    ExceptionCode(u8),
    /// Invalid exception function code
    ExceptionFnCode(u8),
    /// Invalid CRC
    Crc(u16, u16),
    /// Invalid byte count
    ByteCount(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            BufferSize => write!(f, "Invalid buffer size"),
            FnCode(fn_code) => write!(f, "Invalid function code: 0x{fn_code:0>2X}"),
            ExceptionCode(code) => write!(f, "Invalid exception code: 0x{code:0>2X}"),
            ExceptionFnCode(code) => write!(f, "Invalid exception function code: 0x{code:0>2X}"),
            Crc(expected, actual) => write!(
                f,
                "Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}"
            ),
            ByteCount(cnt) => write!(f, "Invalid byte count: {cnt}"),
        }
    }
}

impl std::error::Error for Error {}

/// Fatal error of a running engine role.
///
/// Unlike [`Error`], a `RunError` terminates the role: a failing transport
/// indicates a configuration or hardware fault and must not be retried
/// silently.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The underlying serial transport failed.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
    /// A frame could not be encoded or decoded.
    #[error("protocol violation: {0}")]
    Protocol(#[from] Error),
}
