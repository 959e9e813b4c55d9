// Licensed under the Apache-2.0 license

//! I2C System Setup Helper
//!
//! Clock gating, peripheral reset and bus-clock divider computation for the
//! LPC11xx I2C units. The driver reaches the system controller and the
//! interrupt controller only through the [`SystemControl`] and
//! [`InterruptControl`] traits, so the same code runs against SYSCON/NVIC on
//! the target and against mocks in tests.

use crate::i2c::error::Error;
use crate::i2c::hardware_instantiation::{InstanceIndex, MAX_I2C_UNITS};
use crate::i2c::registers::{SCL_DIVIDER_MAX, SCL_DIVIDER_MIN};
use core::ptr::{read_volatile, write_volatile};
use fugit::HertzU32;

/// Bit in the AHB clock control register gating one peripheral.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClockGate(pub u32);

/// Bit in the peripheral reset control register.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeripheralReset(pub u32);

/// System controller collaborator: clock gates, resets and the input clock.
pub trait SystemControl {
    fn enable_clock(&mut self, gate: ClockGate);

    fn disable_clock(&mut self, gate: ClockGate);

    /// Current gate state. Must not have side effects.
    fn is_clock_enabled(&self, gate: ClockGate) -> bool;

    fn reset_assert(&mut self, reset: PeripheralReset);

    fn reset_deassert(&mut self, reset: PeripheralReset);

    /// Live frequency of the clock feeding the peripherals.
    ///
    /// Queried on every divider computation since it follows the system
    /// power state.
    fn system_frequency(&self) -> HertzU32;
}

/// Interrupt controller collaborator.
pub trait InterruptControl {
    fn enable_irq(&mut self, irq: u32);

    fn disable_irq(&mut self, irq: u32);
}

impl<T: SystemControl + ?Sized> SystemControl for &mut T {
    fn enable_clock(&mut self, gate: ClockGate) {
        (**self).enable_clock(gate);
    }

    fn disable_clock(&mut self, gate: ClockGate) {
        (**self).disable_clock(gate);
    }

    fn is_clock_enabled(&self, gate: ClockGate) -> bool {
        (**self).is_clock_enabled(gate)
    }

    fn reset_assert(&mut self, reset: PeripheralReset) {
        (**self).reset_assert(reset);
    }

    fn reset_deassert(&mut self, reset: PeripheralReset) {
        (**self).reset_deassert(reset);
    }

    fn system_frequency(&self) -> HertzU32 {
        (**self).system_frequency()
    }
}

impl<T: InterruptControl + ?Sized> InterruptControl for &mut T {
    fn enable_irq(&mut self, irq: u32) {
        (**self).enable_irq(irq);
    }

    fn disable_irq(&mut self, irq: u32) {
        (**self).disable_irq(irq);
    }
}

/// Chip wiring of one I2C unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cVariant {
    pub clock_gate: ClockGate,
    pub reset: PeripheralReset,
}

/// Wiring per enumeration index. Only unit 0 exists on the LPC11xx.
const VARIANTS: [Option<I2cVariant>; MAX_I2C_UNITS] = [
    Some(I2cVariant {
        clock_gate: ClockGate(1 << 5),
        reset: PeripheralReset(1 << 1),
    }),
    None,
    None,
];

/// Look up the clock and reset wiring of `index`.
///
/// # Errors
///
/// `UnsupportedInstance` if the chip has no I2C unit at that index.
pub fn variant(index: InstanceIndex) -> Result<I2cVariant, Error> {
    VARIANTS
        .get(index.get())
        .copied()
        .flatten()
        .ok_or(Error::UnsupportedInstance)
}

/// SCL high and low half-periods, in input clock cycles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockDivider {
    pub high: u32,
    pub low: u32,
}

impl ClockDivider {
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.high + self.low
    }
}

/// Split the bus period into SCL high and low halves.
///
/// The high half takes the odd cycle. No range check happens here; see
/// [`divider_for`].
#[must_use]
pub fn compute_divider(input: HertzU32, target: HertzU32) -> ClockDivider {
    let period = input.raw().checked_div(target.raw()).unwrap_or(0);
    let high = period.div_ceil(2);
    ClockDivider {
        high,
        low: period - high,
    }
}

/// Compute the divider for `target` and check both halves fit the registers.
///
/// # Errors
///
/// `UnachievableClockRate` if either half lies outside the range the SCLH and
/// SCLL registers accept.
pub fn divider_for(input: HertzU32, target: HertzU32) -> Result<ClockDivider, Error> {
    let divider = compute_divider(input, target);
    let in_range = |half: u32| (SCL_DIVIDER_MIN..=SCL_DIVIDER_MAX).contains(&half);
    if in_range(divider.high) && in_range(divider.low) {
        Ok(divider)
    } else {
        Err(Error::UnachievableClockRate)
    }
}

/// Helper for I2C system control operations
pub struct I2cSystemSetup;

impl I2cSystemSetup {
    /// Ungate the unit's clock and pulse its reset.
    pub fn power_on<S: SystemControl + ?Sized>(system: &mut S, variant: I2cVariant) {
        system.enable_clock(variant.clock_gate);
        Self::reset_i2c_peripheral(system, variant);
    }

    /// Gate the unit's clock off.
    pub fn power_off<S: SystemControl + ?Sized>(system: &mut S, variant: I2cVariant) {
        system.disable_clock(variant.clock_gate);
    }

    /// Reset the unit without touching its clock gate.
    pub fn reset_i2c_peripheral<S: SystemControl + ?Sized>(system: &mut S, variant: I2cVariant) {
        system.reset_assert(variant.reset);
        system.reset_deassert(variant.reset);
    }

    /// Input clock of the I2C unit.
    #[must_use]
    pub fn get_i2c_source_frequency<S: SystemControl + ?Sized>(system: &S) -> HertzU32 {
        system.system_frequency()
    }
}

const SYSCON_BASE: usize = 0x4004_8000;
const PRESETCTRL: usize = 0x004;
const SYSAHBCLKCTRL: usize = 0x080;

/// LPC11xx SYSCON block.
///
/// The main clock setup is owned by the firmware's clock tree code, which
/// reports the resulting frequency here.
pub struct Lpc11xxSysCon {
    frequency: HertzU32,
}

impl Lpc11xxSysCon {
    /// # Safety
    ///
    /// The caller must be the only code performing read-modify-write cycles
    /// on SYSAHBCLKCTRL and PRESETCTRL while this value is alive.
    #[must_use]
    pub unsafe fn new(frequency: HertzU32) -> Self {
        Self { frequency }
    }

    /// Record a new main clock frequency after the clock tree changed.
    pub fn set_system_frequency(&mut self, frequency: HertzU32) {
        self.frequency = frequency;
    }

    fn modify(offset: usize, f: impl FnOnce(u32) -> u32) {
        let reg = (SYSCON_BASE + offset) as *mut u32;
        // SAFETY: SYSCON registers are always mapped and access is exclusive
        // per the contract of `new`.
        unsafe { write_volatile(reg, f(read_volatile(reg))) }
    }

    fn read(offset: usize) -> u32 {
        // SAFETY: as for `modify`.
        unsafe { read_volatile((SYSCON_BASE + offset) as *const u32) }
    }
}

impl SystemControl for Lpc11xxSysCon {
    fn enable_clock(&mut self, gate: ClockGate) {
        Self::modify(SYSAHBCLKCTRL, |v| v | gate.0);
    }

    fn disable_clock(&mut self, gate: ClockGate) {
        Self::modify(SYSAHBCLKCTRL, |v| v & !gate.0);
    }

    fn is_clock_enabled(&self, gate: ClockGate) -> bool {
        Self::read(SYSAHBCLKCTRL) & gate.0 != 0
    }

    // PRESETCTRL bits are active low.
    fn reset_assert(&mut self, reset: PeripheralReset) {
        Self::modify(PRESETCTRL, |v| v & !reset.0);
    }

    fn reset_deassert(&mut self, reset: PeripheralReset) {
        Self::modify(PRESETCTRL, |v| v | reset.0);
    }

    fn system_frequency(&self) -> HertzU32 {
        self.frequency
    }
}

const NVIC_ISER: usize = 0xE000_E100;
const NVIC_ICER: usize = 0xE000_E180;

/// Cortex-M0 NVIC enable/disable registers.
pub struct Nvic {
    _private: (),
}

impl Nvic {
    /// # Safety
    ///
    /// Unmasking an interrupt is only sound once its handler is installed.
    #[must_use]
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn set_bit(base: usize, irq: u32) {
        let reg = (base + (irq as usize / 32) * 4) as *mut u32;
        // SAFETY: ISER/ICER are write-one-to-act registers, other lines are unaffected.
        unsafe { write_volatile(reg, 1 << (irq % 32)) }
    }
}

impl InterruptControl for Nvic {
    fn enable_irq(&mut self, irq: u32) {
        Self::set_bit(NVIC_ISER, irq);
    }

    fn disable_irq(&mut self, irq: u32) {
        Self::set_bit(NVIC_ICER, irq);
    }
}
