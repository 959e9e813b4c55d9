// Licensed under the Apache-2.0 license

//! LPC11xx I2C driver module.
//!
//! Master-mode driver for the LPC11xx I2C controller, designed for bare-metal
//! and `no_std` environments. Hardware access, system control, interrupt
//! control and buffer allocation are injected through traits so the protocol
//! engine runs unchanged against the register simulator in tests.

pub mod common;
pub mod error;
pub mod hardware_instantiation;
pub mod i2c_controller;
mod interrupt_transfer;
pub mod lpc11xx_i2c;
pub mod registers;
pub mod ring_buffer;
pub mod system_setup;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use common::{Direction, I2cConfig, I2cConfigBuilder, I2cSpeed, I2cXferMode, PowerState};
pub use error::Error;
pub use hardware_instantiation::{
    IntegratedDevice, InstanceIndex, InstanceTable, RegisterWindow, Resource, I2C0_DEVICE,
};
pub use i2c_controller::I2cController;
pub use lpc11xx_i2c::Lpc11xxI2c;
pub use registers::{I2cRegisters, MmioRegisters};
pub use ring_buffer::{HeaplessProvider, HeaplessRingBuffer, RingBuffer, RingBufferProvider};
pub use system_setup::{InterruptControl, Lpc11xxSysCon, Nvic, SystemControl};
pub use traits::{I2cBusProtocol, I2cHardwareCore, I2cMaster, I2cNonBlocking, PowerControl};
