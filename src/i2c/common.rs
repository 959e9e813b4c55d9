// Licensed under the Apache-2.0 license

//! Common types for the LPC11xx I2C driver modules.
//!
//! This module provides the configuration surface shared by the driver,
//! the controller wrapper and the clock setup helpers.

use crate::i2c::error::Error;
use fugit::{HertzU32, MicrosDurationU32};

/// Standard bus speeds the controller can be programmed for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
    HighSpeed = 3_400_000,
}

impl I2cSpeed {
    pub const ALL: [I2cSpeed; 4] = [
        I2cSpeed::Standard,
        I2cSpeed::Fast,
        I2cSpeed::FastPlus,
        I2cSpeed::HighSpeed,
    ];

    #[must_use]
    pub const fn frequency(self) -> HertzU32 {
        HertzU32::from_raw(self as u32)
    }

    /// Standard speed closest to a measured bus frequency.
    #[must_use]
    pub fn nearest(actual: HertzU32) -> I2cSpeed {
        let mut best = I2cSpeed::Standard;
        let mut best_delta = u32::MAX;
        for speed in Self::ALL {
            let delta = speed.frequency().raw().abs_diff(actual.raw());
            if delta < best_delta {
                best = speed;
                best_delta = delta;
            }
        }
        best
    }
}

/// Operating mode of a controller instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cXferMode {
    /// Transfers busy-wait on the completion flag in the caller's context.
    Polled = 0,
    /// Transfers are queued in ring buffers and advanced by the interrupt handler.
    Buffered = 1,
}

impl TryFrom<u8> for I2cXferMode {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(I2cXferMode::Polled),
            1 => Ok(I2cXferMode::Buffered),
            _ => Err(Error::InvalidMode),
        }
    }
}

/// Functional clock state of a controller instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PowerState {
    Awake,
    Asleep,
}

/// Direction bit appended to the 7-bit target address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

pub const DEFAULT_BUFFER_SIZE: usize = 64;
pub const DEFAULT_TIMEOUT: MicrosDurationU32 = MicrosDurationU32::millis(10);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    pub mode: I2cXferMode,
    pub speed: I2cSpeed,
    pub rx_buffer_size: usize,
    pub tx_buffer_size: usize,
    /// Upper bound on every hardware wait inside a polled transfer.
    pub timeout: MicrosDurationU32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    mode: I2cXferMode,
    speed: I2cSpeed,
    rx_buffer_size: usize,
    tx_buffer_size: usize,
    timeout: MicrosDurationU32,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: I2cXferMode::Polled,
            speed: I2cSpeed::Standard,
            rx_buffer_size: DEFAULT_BUFFER_SIZE,
            tx_buffer_size: DEFAULT_BUFFER_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
    #[must_use]
    pub fn mode(mut self, mode: I2cXferMode) -> Self {
        self.mode = mode;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn rx_buffer_size(mut self, size: usize) -> Self {
        self.rx_buffer_size = size;
        self
    }
    #[must_use]
    pub fn tx_buffer_size(mut self, size: usize) -> Self {
        self.tx_buffer_size = size;
        self
    }
    #[must_use]
    pub fn timeout(mut self, timeout: MicrosDurationU32) -> Self {
        self.timeout = timeout;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            mode: self.mode,
            speed: self.speed,
            rx_buffer_size: self.rx_buffer_size,
            tx_buffer_size: self.tx_buffer_size,
            timeout: self.timeout,
        }
    }
}
