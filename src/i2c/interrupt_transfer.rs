// Licensed under the Apache-2.0 license

//! Buffered transfers driven from the I2C interrupt.
//!
//! The caller and the interrupt handler share the two ring buffers with a
//! fixed direction each:
//!
//! ```text
//!            caller                      interrupt handler
//!  TX:  try_write pushes  ─────────────►  pops into DAT on 0x08/0x18/0x28
//!  RX:  try_read pops     ◄─────────────  pushes from DAT on 0x50/0x58
//! ```
//!
//! A request only kicks off the start condition and returns. Every following
//! phase runs in [`Lpc11xxI2c::service_interrupt`], which reacts to exactly
//! one status code per call and never waits on the hardware.

use crate::common::Logger;
use crate::i2c::common::Direction;
use crate::i2c::error::Error;
use crate::i2c::lpc11xx_i2c::Lpc11xxI2c;
use crate::i2c::registers::{
    status, I2cRegisters, CONCLR, CONSET, CON_AA, CON_SI, CON_STA, CON_STO, DAT,
};
use crate::i2c::ring_buffer::{RingBuffer, RingBufferProvider};
use crate::i2c::system_setup::{InterruptControl, SystemControl};
use embedded_hal::delay::DelayNs;

/// Operating mode together with the resources only that mode owns.
pub(crate) enum Operating<B> {
    Polled,
    Buffered(BufferedState<B>),
}

pub(crate) struct BufferedState<B> {
    pub(crate) rx: B,
    pub(crate) tx: B,
    pub(crate) transfer: Option<Transfer>,
    /// Address byte of the read whose bytes sit in RX.
    pub(crate) rx_source: Option<u8>,
    /// Failed write, held until `try_write` or `flush` collects it.
    pub(crate) write_failure: Option<Error>,
    /// Failed read and its address byte, held for the next `try_read` of that target.
    pub(crate) read_failure: Option<(u8, Error)>,
}

impl<B: RingBuffer> BufferedState<B> {
    pub(crate) fn new(rx: B, tx: B) -> Self {
        Self {
            rx,
            tx,
            transfer: None,
            rx_source: None,
            write_failure: None,
            read_failure: None,
        }
    }

    fn record_failure(&mut self, transfer: Option<Transfer>, err: Error) {
        self.tx.clear();
        match transfer {
            Some(Transfer {
                address_byte,
                direction: Direction::Read,
                ..
            }) => {
                self.rx.clear();
                self.rx_source = None;
                self.read_failure = Some((address_byte, err));
            }
            _ => self.write_failure = Some(err),
        }
    }
}

/// The transfer the interrupt handler is currently advancing.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Transfer {
    address_byte: u8,
    direction: Direction,
    /// Bytes still to receive. Unused for writes, which drain TX.
    remaining: usize,
}

impl<R, S, F, D, L> Lpc11xxI2c<R, S, F, D, L>
where
    R: I2cRegisters,
    S: SystemControl + InterruptControl,
    F: RingBufferProvider,
    D: DelayNs,
    L: Logger,
{
    /// Advance the in-flight buffered transfer by one bus phase.
    pub(crate) fn service_interrupt(&mut self) {
        if self.regs.read(CONSET) & CON_SI == 0 {
            return;
        }
        let Operating::Buffered(state) = &mut self.operating else {
            return;
        };
        let Some(transfer) = state.transfer.as_mut() else {
            return;
        };

        let code = self.regs.status();
        let outcome = match code {
            status::START_TRANSMITTED | status::REPEATED_START_TRANSMITTED => {
                self.regs.write(DAT, u32::from(transfer.address_byte));
                self.regs.write(CONCLR, CON_STA | CON_SI);
                None
            }
            status::ADDRESS_W_ACK | status::DATA_W_ACK => match state.tx.pop() {
                Some(byte) => {
                    self.regs.write(DAT, u32::from(byte));
                    self.regs.write(CONCLR, CON_SI);
                    None
                }
                None => Some(Ok(())),
            },
            status::ADDRESS_R_ACK => {
                if transfer.remaining == 0 {
                    Some(Ok(()))
                } else {
                    Self::select_answer(&mut self.regs, transfer.remaining);
                    self.regs.write(CONCLR, CON_SI);
                    None
                }
            }
            status::DATA_R_ACK => {
                let byte = (self.regs.read(DAT) & 0xFF) as u8;
                transfer.remaining = transfer.remaining.saturating_sub(1);
                if state.rx.push(byte).is_err() {
                    Some(Err(Error::BufferOverflow))
                } else if transfer.remaining == 0 {
                    Some(Ok(()))
                } else {
                    Self::select_answer(&mut self.regs, transfer.remaining);
                    self.regs.write(CONCLR, CON_SI);
                    None
                }
            }
            status::DATA_R_NACK => {
                let byte = (self.regs.read(DAT) & 0xFF) as u8;
                transfer.remaining = transfer.remaining.saturating_sub(1);
                match state.rx.push(byte) {
                    Ok(()) => Some(Ok(())),
                    Err(_) => Some(Err(Error::BufferOverflow)),
                }
            }
            _ => Some(Err(Error::Bus { status: code })),
        };

        if let Some(result) = outcome {
            self.finish_transfer(result);
        }
    }

    /// ACK every byte but the last one of the read.
    fn select_answer(regs: &mut R, remaining: usize) {
        if remaining > 1 {
            regs.write(CONSET, CON_AA);
        } else {
            regs.write(CONCLR, CON_AA);
        }
    }

    fn finish_transfer(&mut self, result: Result<(), Error>) {
        self.regs.write(CONSET, CON_STO);
        self.regs.write(CONCLR, CON_SI);
        if let Operating::Buffered(state) = &mut self.operating {
            let transfer = state.transfer.take();
            if let Err(err) = result {
                let direction = transfer.map(|t| t.direction);
                self.logger.error(format_args!(
                    "i2c{}: buffered {direction:?} failed: {err}",
                    self.index.get()
                ));
                state.record_failure(transfer, err);
            }
        }
    }

    fn begin(&mut self, transfer: Transfer) {
        if let Operating::Buffered(state) = &mut self.operating {
            state.transfer = Some(transfer);
        }
        self.regs.write(CONCLR, CON_SI);
        self.regs.write(CONSET, CON_STA);
    }

    /// Queue `bytes` and start the transfer.
    ///
    /// An uncollected failure of the previous write is returned instead, and
    /// nothing is queued.
    pub(crate) fn buffered_write(&mut self, address: u8, bytes: &[u8]) -> nb::Result<(), Error> {
        let address_byte = Self::address_byte(address, Direction::Write)?;
        let Operating::Buffered(state) = &mut self.operating else {
            return Err(nb::Error::Other(Error::Unsupported));
        };
        if state.transfer.is_some() {
            return Err(nb::Error::WouldBlock);
        }
        if let Some(err) = state.write_failure.take() {
            return Err(nb::Error::Other(err));
        }
        if bytes.len() > state.tx.capacity() {
            return Err(nb::Error::Other(Error::BufferOverflow));
        }
        if bytes.len() > state.tx.free() {
            return Err(nb::Error::WouldBlock);
        }
        for byte in bytes {
            if state.tx.push(*byte).is_err() {
                state.tx.clear();
                return Err(nb::Error::Other(Error::BufferOverflow));
            }
        }

        self.begin(Transfer {
            address_byte,
            direction: Direction::Write,
            remaining: 0,
        });
        Ok(())
    }

    /// Hand out bytes received from `address`, scheduling a read for any
    /// shortfall. Bytes left over from another target are discarded.
    pub(crate) fn buffered_read(&mut self, address: u8, buffer: &mut [u8]) -> nb::Result<(), Error> {
        let address_byte = Self::address_byte(address, Direction::Read)?;
        let Operating::Buffered(state) = &mut self.operating else {
            return Err(nb::Error::Other(Error::Unsupported));
        };
        if buffer.len() > state.rx.capacity() {
            return Err(nb::Error::Other(Error::BufferOverflow));
        }
        // A queued write must finish before its reply can be read.
        if state.transfer.is_some() {
            return Err(nb::Error::WouldBlock);
        }
        if let Some((failed_address, err)) = state.read_failure.take() {
            if failed_address == address_byte {
                return Err(nb::Error::Other(err));
            }
        }
        if state.rx_source != Some(address_byte) {
            state.rx.clear();
            state.rx_source = None;
        }
        if state.rx.len() >= buffer.len() {
            for slot in buffer.iter_mut() {
                *slot = state.rx.pop().unwrap_or_default();
            }
            return Ok(());
        }

        let shortfall = buffer.len() - state.rx.len();
        state.rx_source = Some(address_byte);
        self.begin(Transfer {
            address_byte,
            direction: Direction::Read,
            remaining: shortfall,
        });
        Err(nb::Error::WouldBlock)
    }

    /// Report any failure not yet collected, writes first.
    pub(crate) fn buffered_flush(&mut self) -> nb::Result<(), Error> {
        let Operating::Buffered(state) = &mut self.operating else {
            return Ok(());
        };
        if state.transfer.is_some() {
            return Err(nb::Error::WouldBlock);
        }
        if let Some(err) = state.write_failure.take() {
            return Err(nb::Error::Other(err));
        }
        match state.read_failure.take() {
            Some((_, err)) => Err(nb::Error::Other(err)),
            None => Ok(()),
        }
    }

    /// Whether the interrupt handler is driving a transfer.
    #[must_use]
    pub fn transfer_in_flight(&self) -> bool {
        matches!(&self.operating, Operating::Buffered(state) if state.transfer.is_some())
    }

    /// Drop the in-flight transfer and anything queued for it.
    pub(crate) fn abort_buffered(&mut self) {
        if let Operating::Buffered(state) = &mut self.operating {
            state.transfer = None;
            state.rx_source = None;
            state.write_failure = None;
            state.read_failure = None;
            state.tx.clear();
            state.rx.clear();
        }
    }
}
