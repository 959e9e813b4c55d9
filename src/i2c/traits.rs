// Licensed under the Apache-2.0 license

//! # I2C Hardware Abstraction Traits
//!
//! Composable traits for I2C hardware abstraction. Each trait has one
//! responsibility; a driver implements the ones its hardware supports and
//! upper layers ask only for what they use.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! I2cHardwareCore (foundation: configuration, enable, interrupt entry)
//!     ├── I2cBusProtocol (start / address / data / ack / stop primitives)
//!     ├── I2cMaster (complete blocking transactions)
//!     └── I2cNonBlocking (nb-style transfers backed by ring buffers)
//! PowerControl (clock gating, independent of the operating mode)
//! ```

use crate::i2c::common::{Direction, I2cConfig, I2cSpeed, PowerState};
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};
use fugit::HertzU32;

/// Core I2C hardware interface providing basic operations
///
/// This is the foundation trait that all I2C hardware implementations must provide.
///
/// # Examples
///
/// ```rust,ignore
/// use lpc11xx_ddk::i2c::{I2cConfigBuilder, I2cHardwareCore, I2cSpeed, I2cXferMode};
///
/// fn setup_i2c<T: I2cHardwareCore>(controller: &mut T) -> Result<(), T::Error> {
///     let config = I2cConfigBuilder::new()
///         .mode(I2cXferMode::Buffered)
///         .speed(I2cSpeed::Fast)
///         .build();
///     controller.configure(&config)
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Apply a configuration: operating mode, bus speed and buffer sizes.
    ///
    /// Re-enables the controller and reprograms the clock divider even when
    /// the mode does not change.
    ///
    /// # Errors
    ///
    /// Returns an error if the speed is unreachable from the current input
    /// clock, if transfer buffers cannot be created, or if a buffered
    /// transfer is still in flight.
    fn configure(&mut self, config: &I2cConfig) -> Result<(), Self::Error>;

    /// Read the active configuration back from the hardware.
    ///
    /// # Errors
    ///
    /// Returns an error when buffer sizes cannot be reported because the
    /// controller runs without transfer buffers.
    fn get_config(&self) -> Result<I2cConfig, Self::Error>;

    /// Reprogram only the bus clock.
    ///
    /// # Returns
    ///
    /// The bus frequency the divider actually produces.
    ///
    /// # Errors
    ///
    /// Returns an error if the speed cannot be expressed by the divider.
    fn set_clock_rate(&mut self, speed: I2cSpeed) -> Result<HertzU32, Self::Error>;

    /// Take the controller out of reset and set its enable bit.
    fn enable(&mut self);

    /// Clear the enable bit and hold the controller in reset.
    fn disable(&mut self);

    /// Handle hardware interrupt events (called from ISR)
    ///
    /// Implementations must be fast and never busy-wait.
    fn handle_interrupt(&mut self);

    /// Attempt to recover the I2C bus from stuck conditions
    ///
    /// # Errors
    ///
    /// Returns an error if bus recovery fails or is not supported by the hardware.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// Functional clock gating
pub trait PowerControl {
    fn set_power_state(&mut self, state: PowerState);

    /// Reads the gate back. Never changes it.
    fn power_state(&self) -> PowerState;
}

/// Single bus phases, for callers composing their own sequences
///
/// Every blocking primitive waits for the controller's completion flag and
/// checks the resulting status code. A caller that starts a sequence owns the
/// bus until it calls [`stop`](I2cBusProtocol::stop), which it must do on the
/// error path too.
pub trait I2cBusProtocol<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Generate a start, or a repeated start when the bus is already held.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller does not report a transmitted start.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Transmit the address byte with the direction bit.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not acknowledge its address.
    fn send_address(&mut self, addr: A, direction: Direction) -> Result<(), Self::Error>;

    /// Transmit one data byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not acknowledge the byte.
    fn send_data(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Receive one byte, answering with the ACK or NACK selected beforehand.
    ///
    /// # Errors
    ///
    /// Returns an error if the status does not match the selected answer.
    fn get_data(&mut self) -> Result<u8, Self::Error>;

    /// Acknowledge the next received byte.
    fn send_ack(&mut self);

    /// Do not acknowledge the next received byte, marking it as the last.
    fn send_nack(&mut self);

    /// Whether the last address or data phase was acknowledged.
    fn get_ack(&self) -> bool;

    /// Generate a stop and release the bus.
    fn stop(&mut self);
}

/// I2C Master mode operations
///
/// The address type `A` must implement `AddressMode` to ensure compatibility
/// with embedded-hal.
///
/// # Examples
///
/// ```rust,ignore
/// use lpc11xx_ddk::i2c::I2cMaster;
///
/// fn read_sensor<T: I2cMaster>(mut i2c: T) -> Result<u16, T::Error> {
///     let mut data = [0u8; 2];
///     i2c.read(0x48u8, &mut data)?;
///     Ok(u16::from_be_bytes(data))
/// }
/// ```
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write data to a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge, bus arbitration
    /// is lost, or other I2C protocol errors occur.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge, bus arbitration
    /// is lost, or other I2C protocol errors occur.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Combined write-then-read operation with restart condition
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge during either
    /// the write or read phase, or if bus arbitration is lost.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute a sequence of I2C operations as a single transaction
    ///
    /// # Errors
    ///
    /// Returns an error if any operation in the sequence fails. The bus is
    /// released with a stop before the error is returned.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}

/// Non-blocking transfers
///
/// Controllers running with transfer buffers queue the request and let the
/// interrupt handler drive the bus. `WouldBlock` means "call again later".
pub trait I2cNonBlocking<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Queue `bytes` for transmission to `addr`.
    ///
    /// # Errors
    ///
    /// `WouldBlock` while a previous transfer is in flight.
    fn try_write(&mut self, addr: A, bytes: &[u8]) -> nb::Result<(), Self::Error>;

    /// Fill `buffer` with bytes received from `addr`.
    ///
    /// # Errors
    ///
    /// `WouldBlock` until enough bytes have been received.
    fn try_read(&mut self, addr: A, buffer: &mut [u8]) -> nb::Result<(), Self::Error>;

    /// Wait for the queued transfer to finish and report its outcome.
    ///
    /// # Errors
    ///
    /// `WouldBlock` while the transfer is in flight, then the transfer error if any.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;
}
