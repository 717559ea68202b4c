//! Common helpers

use core::fmt;

/// Space-separated hex rendering of a raw frame for transaction logs.
///
/// ```
/// use modbus_probe::HexDump;
///
/// assert_eq!(HexDump(&[0x01, 0x03, 0x51]).to_string(), "01 03 51");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
