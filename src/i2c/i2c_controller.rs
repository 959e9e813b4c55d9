// Licensed under the Apache-2.0 license

//! High-level I2C controller abstraction for LPC11xx devices.
//!
//! [`I2cController`] wraps any [`I2cMaster`] implementation and exposes it as
//! an `embedded-hal` 1.0 [`I2c`](embedded_hal::i2c::I2c) bus, so sensor and
//! EEPROM drivers from the ecosystem can run on top of it.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::I2cConfig;
use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub config: I2cConfig,
    pub logger: L,
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    /// Apply `config` to `hardware` and wrap it.
    ///
    /// # Errors
    ///
    /// Whatever [`configure`](crate::i2c::traits::I2cHardwareCore::configure) reports.
    pub fn new(mut hardware: H, config: I2cConfig, mut logger: L) -> Result<Self, H::Error> {
        if let Err(err) = hardware.configure(&config) {
            logger.error(format_args!("i2c controller: configure failed: {err:?}"));
            return Err(err);
        }
        Ok(Self {
            hardware,
            config,
            logger,
        })
    }

    /// Give the hardware back.
    pub fn release(self) -> H {
        self.hardware
    }

    fn log_failure<T>(
        &mut self,
        what: &str,
        addr: SevenBitAddress,
        result: Result<T, H::Error>,
    ) -> Result<T, H::Error> {
        if let Err(err) = &result {
            self.logger
                .error(format_args!("i2c {what} @{addr:#04x} failed: {err:?}"));
        }
        result
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        let result = self.hardware.read(addr, buffer);
        self.log_failure("read", addr, result)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        let result = self.hardware.write(addr, bytes);
        self.log_failure("write", addr, result)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.write_read(addr, bytes, buffer);
        self.log_failure("write_read", addr, result)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let result = self.hardware.transaction_slice(addr, operations);
        self.log_failure("transaction", addr, result)
    }
}
