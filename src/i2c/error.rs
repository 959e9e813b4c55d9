// Licensed under the Apache-2.0 license

use crate::i2c::registers::status;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Errors reported by the LPC11xx I2C driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Another live instance already owns this enumeration index.
    AlreadyBound,
    /// The device descriptor lacks a register window, index or interrupt line.
    ResourceMissing,
    /// The enumeration index has no entry in the chip's variant table.
    UnsupportedInstance,
    /// The index was not bound; releasing it twice is a logic error.
    NotBound,
    /// The controller reported an unexpected status code during a bus phase.
    ///
    /// The status register does not tell a NACK from a genuine fault apart in a
    /// way callers can act on, so both land here with the raw code attached.
    Bus { status: u8 },
    /// A completion flag never asserted within the configured timeout.
    Timeout,
    /// Buffer sizes were queried while no buffers exist (polled mode).
    BufferQuery,
    /// The ring-buffer provider could not create a buffer of the requested size.
    BufferAllocation,
    /// A buffered request does not fit the ring buffer even when empty.
    BufferOverflow,
    /// The requested bus speed cannot be expressed by the SCL divider registers.
    UnachievableClockRate,
    /// A raw operating-mode value does not name a supported mode.
    InvalidMode,
    /// The target address does not fit in seven bits.
    InvalidAddress,
    /// A buffered transfer is in flight on this instance.
    Busy,
    /// Buffered mode: the request cannot be serviced yet, retry later.
    WouldBlock,
    /// The operation is not available in the current operating mode.
    Unsupported,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Error::Bus { status } => match status {
                status::ADDRESS_W_NACK | status::ADDRESS_R_NACK => {
                    ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
                }
                status::DATA_W_NACK => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
                status::ARBITRATION_LOST => ErrorKind::ArbitrationLoss,
                _ => ErrorKind::Bus,
            },
            Error::BufferOverflow => ErrorKind::Overrun,
            _ => ErrorKind::Other,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::AlreadyBound => f.write_str("instance index already bound"),
            Error::ResourceMissing => f.write_str("device descriptor is missing a resource"),
            Error::UnsupportedInstance => f.write_str("no variant entry for instance index"),
            Error::NotBound => f.write_str("instance index is not bound"),
            Error::Bus { status } => write!(f, "bus error (status {status:#04x})"),
            Error::Timeout => f.write_str("bus timeout"),
            Error::BufferQuery => f.write_str("no transfer buffers in polled mode"),
            Error::BufferAllocation => f.write_str("ring buffer allocation failed"),
            Error::BufferOverflow => f.write_str("request exceeds ring buffer capacity"),
            Error::UnachievableClockRate => f.write_str("bus speed out of divider range"),
            Error::InvalidMode => f.write_str("invalid operating mode"),
            Error::InvalidAddress => f.write_str("address exceeds 7 bits"),
            Error::Busy => f.write_str("buffered transfer in flight"),
            Error::WouldBlock => f.write_str("buffered request pending"),
            Error::Unsupported => f.write_str("operation unsupported in this mode"),
        }
    }
}
