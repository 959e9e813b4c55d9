// Licensed under the Apache-2.0 license

//! Register map of the LPC11xx I2C controller.
//!
//! The driver never dereferences raw addresses itself. It talks to an
//! [`I2cRegisters`] implementation: [`MmioRegisters`] on the target, a
//! simulated register window in tests.

use crate::i2c::hardware_instantiation::RegisterWindow;
use core::ptr::{read_volatile, write_volatile};

/// Control set register. Reads return the control bits, writing 1 sets them.
pub const CONSET: usize = 0x00;
/// Status register, holds one of the [`status`] codes.
pub const STAT: usize = 0x04;
/// Data register.
pub const DAT: usize = 0x08;
/// Slave address register 0.
pub const ADR0: usize = 0x0C;
/// SCL duty cycle, high half.
pub const SCLH: usize = 0x10;
/// SCL duty cycle, low half.
pub const SCLL: usize = 0x14;
/// Control clear register. Writing 1 clears the matching CONSET bit.
pub const CONCLR: usize = 0x18;

/// Assert acknowledge after the next received byte.
pub const CON_AA: u32 = 1 << 2;
/// Serial interrupt flag: the controller finished a bus phase.
pub const CON_SI: u32 = 1 << 3;
/// Request a stop condition.
pub const CON_STO: u32 = 1 << 4;
/// Request a start condition.
pub const CON_STA: u32 = 1 << 5;
/// Interface enable.
pub const CON_I2EN: u32 = 1 << 6;
/// Every bit CONCLR can clear.
pub const CON_ALL: u32 = CON_AA | CON_SI | CON_STA | CON_I2EN;

/// Width of each SCL divider half register.
pub const SCL_DIVIDER_MAX: u32 = 0xFFFF;
/// Smallest value the controller accepts in either divider half.
pub const SCL_DIVIDER_MIN: u32 = 4;

/// Master-mode status codes.
pub mod status {
    pub const BUS_ERROR: u8 = 0x00;
    pub const START_TRANSMITTED: u8 = 0x08;
    pub const REPEATED_START_TRANSMITTED: u8 = 0x10;
    pub const ADDRESS_W_ACK: u8 = 0x18;
    pub const ADDRESS_W_NACK: u8 = 0x20;
    pub const DATA_W_ACK: u8 = 0x28;
    pub const DATA_W_NACK: u8 = 0x30;
    pub const ARBITRATION_LOST: u8 = 0x38;
    pub const ADDRESS_R_ACK: u8 = 0x40;
    pub const ADDRESS_R_NACK: u8 = 0x48;
    pub const DATA_R_ACK: u8 = 0x50;
    pub const DATA_R_NACK: u8 = 0x58;
    pub const IDLE: u8 = 0xF8;

    /// Statuses that report an acknowledged address or data byte.
    pub const ACKNOWLEDGED: [u8; 4] = [ADDRESS_W_ACK, ADDRESS_R_ACK, DATA_W_ACK, DATA_R_ACK];
}

/// Word access to one controller's register window.
pub trait I2cRegisters {
    /// Read the 32-bit register at `offset` from the window base.
    fn read(&self, offset: usize) -> u32;

    /// Write the 32-bit register at `offset` from the window base.
    fn write(&mut self, offset: usize, value: u32);

    /// Current status code. Only the low byte is implemented in hardware.
    fn status(&self) -> u8 {
        (self.read(STAT) & 0xFF) as u8
    }
}

/// Volatile access to a memory-mapped register window.
pub struct MmioRegisters {
    base: usize,
}

impl MmioRegisters {
    /// Wrap the register window described by `window`.
    ///
    /// # Safety
    ///
    /// `window` must describe the register block of an LPC11xx I2C controller
    /// and nothing else may access that block while this value is alive.
    #[must_use]
    pub unsafe fn new(window: RegisterWindow) -> Self {
        Self { base: window.start }
    }
}

impl I2cRegisters for MmioRegisters {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: the window is owned exclusively (see `new`) and every offset
        // used by the driver lies inside the 4 KiB register block.
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: as for `read`.
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }
}
