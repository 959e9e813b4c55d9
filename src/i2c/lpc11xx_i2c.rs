// Licensed under the Apache-2.0 license

//! LPC11xx I2C master driver.
//!
//! One [`Lpc11xxI2c`] owns one bound controller instance: its register
//! window, its slot in the [`InstanceTable`] and, in buffered mode, its two
//! ring buffers. Collaborators are injected as type parameters:
//!
//! - `R`: register window ([`I2cRegisters`])
//! - `S`: system and interrupt controller ([`SystemControl`], [`InterruptControl`])
//! - `F`: ring-buffer provider ([`RingBufferProvider`])
//! - `D`: time source bounding every hardware wait ([`DelayNs`])
//! - `L`: diagnostics ([`Logger`])
//!
//! Polled transfers run Start, Address, Data and Stop back to back in the
//! caller's context. Stop is issued on every exit path, so a failed call
//! never leaves the bus held.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{Direction, I2cConfig, I2cSpeed, I2cXferMode, PowerState};
use crate::i2c::error::Error;
use crate::i2c::hardware_instantiation::{
    IntegratedDevice, InstanceIndex, InstanceTable, RegisterWindow,
};
use crate::i2c::interrupt_transfer::{BufferedState, Operating};
use crate::i2c::registers::{
    status, I2cRegisters, CONCLR, CONSET, CON_AA, CON_ALL, CON_I2EN, CON_SI, CON_STA, CON_STO,
    DAT, SCLH, SCLL,
};
use crate::i2c::ring_buffer::{RingBuffer, RingBufferProvider};
use crate::i2c::system_setup::{
    divider_for, variant, ClockDivider, I2cSystemSetup, I2cVariant, InterruptControl,
    SystemControl,
};
use crate::i2c::traits::{
    I2cBusProtocol, I2cHardwareCore, I2cMaster, I2cNonBlocking, PowerControl,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use fugit::HertzU32;

const MAX_7BIT_ADDRESS: u8 = 0x7F;

pub struct Lpc11xxI2c<R, S, F, D, L = NoOpLogger>
where
    R: I2cRegisters,
    S: SystemControl + InterruptControl,
    F: RingBufferProvider,
    D: DelayNs,
    L: Logger,
{
    pub(crate) regs: R,
    system: S,
    fifos: F,
    delay: D,
    pub(crate) logger: L,
    pub(crate) index: InstanceIndex,
    irq: u32,
    variant: I2cVariant,
    config: I2cConfig,
    pub(crate) operating: Operating<F::Buffer>,
    /// A start went out and no stop followed yet.
    bus_held: bool,
}

impl<R, S, F, D, L> Lpc11xxI2c<R, S, F, D, L>
where
    R: I2cRegisters,
    S: SystemControl + InterruptControl,
    F: RingBufferProvider,
    D: DelayNs,
    L: Logger,
{
    /// Bind `device`, map its registers and power the unit up in polled mode.
    ///
    /// `map` turns the bound register window into a register accessor, for
    /// example `|w| unsafe { MmioRegisters::new(w) }`. The bus clock is not
    /// programmed until [`configure`](I2cHardwareCore::configure).
    ///
    /// # Errors
    ///
    /// Binding errors from [`InstanceTable::bind`], or `UnsupportedInstance`
    /// when the chip has no wiring for the index. The slot is left free on error.
    pub fn probe(
        table: &mut InstanceTable,
        device: &IntegratedDevice,
        map: impl FnOnce(RegisterWindow) -> R,
        mut system: S,
        fifos: F,
        delay: D,
        mut logger: L,
    ) -> Result<Self, Error> {
        let bound = table.bind(device)?;
        let variant = match variant(bound.index) {
            Ok(variant) => variant,
            Err(err) => {
                table.release(bound.index)?;
                return Err(err);
            }
        };

        let mut regs = map(bound.window);
        I2cSystemSetup::power_on(&mut system, variant);
        regs.write(CONCLR, CON_ALL);

        logger.debug(format_args!(
            "i2c{}: bound {} at {:#x}, irq {}",
            bound.index.get(),
            device.name,
            bound.window.start,
            bound.irq
        ));

        Ok(Self {
            regs,
            system,
            fifos,
            delay,
            logger,
            index: bound.index,
            irq: bound.irq,
            variant,
            config: I2cConfig::default(),
            operating: Operating::Polled,
            bus_held: false,
        })
    }

    /// Tear the instance down and free its slot.
    ///
    /// Control bits are reset, the clock gated, buffers returned and the
    /// interrupt line masked before the slot is released, so an interrupted
    /// teardown never leaves a half-dead unit open for binding.
    ///
    /// # Errors
    ///
    /// `NotBound` if the slot was already free, which means the table and the
    /// driver disagree about ownership.
    pub fn cleanup(mut self, table: &mut InstanceTable) -> Result<(), Error> {
        self.regs.write(CONCLR, CON_ALL);
        I2cSystemSetup::power_off(&mut self.system, self.variant);
        if let Operating::Buffered(state) =
            core::mem::replace(&mut self.operating, Operating::Polled)
        {
            self.fifos.destroy(state.rx);
            self.fifos.destroy(state.tx);
        }
        self.system.disable_irq(self.irq);
        self.logger
            .debug(format_args!("i2c{}: released", self.index.get()));
        table.release(self.index)
    }

    #[must_use]
    pub fn mode(&self) -> I2cXferMode {
        match self.operating {
            Operating::Polled => I2cXferMode::Polled,
            Operating::Buffered(_) => I2cXferMode::Buffered,
        }
    }

    #[must_use]
    pub fn instance(&self) -> InstanceIndex {
        self.index
    }

    #[must_use]
    pub fn irq(&self) -> u32 {
        self.irq
    }

    /// Bus frequency produced by the divider currently in SCLH and SCLL.
    #[must_use]
    pub fn clock_rate(&self) -> HertzU32 {
        let period = (self.regs.read(SCLH) & 0xFFFF) + (self.regs.read(SCLL) & 0xFFFF);
        let input = I2cSystemSetup::get_i2c_source_frequency(&self.system);
        HertzU32::from_raw(input.raw().checked_div(period).unwrap_or(0))
    }

    fn program_divider(&mut self, divider: ClockDivider) {
        self.regs.write(SCLH, divider.high);
        self.regs.write(SCLL, divider.low);
        self.logger.debug(format_args!(
            "i2c{}: scl divider {}/{}",
            self.index.get(),
            divider.high,
            divider.low
        ));
    }

    fn enter_buffered(&mut self, config: &I2cConfig) -> Result<(), Error> {
        if let Operating::Buffered(_) = self.operating {
            return Ok(());
        }
        let rx = self
            .fifos
            .create(config.rx_buffer_size)
            .ok_or(Error::BufferAllocation)?;
        let Some(tx) = self.fifos.create(config.tx_buffer_size) else {
            self.fifos.destroy(rx);
            return Err(Error::BufferAllocation);
        };
        self.logger.debug(format_args!(
            "i2c{}: buffers rx {} tx {}",
            self.index.get(),
            rx.capacity(),
            tx.capacity()
        ));
        self.operating = Operating::Buffered(BufferedState::new(rx, tx));
        Ok(())
    }

    fn enter_polled(&mut self) {
        if let Operating::Buffered(state) =
            core::mem::replace(&mut self.operating, Operating::Polled)
        {
            self.fifos.destroy(state.rx);
            self.fifos.destroy(state.tx);
            self.logger
                .debug(format_args!("i2c{}: buffers released", self.index.get()));
        }
    }

    pub(crate) fn address_byte(address: u8, direction: Direction) -> Result<u8, Error> {
        if address > MAX_7BIT_ADDRESS {
            return Err(Error::InvalidAddress);
        }
        Ok((address << 1) | direction as u8)
    }

    fn ensure_polled(&self) -> Result<(), Error> {
        match self.operating {
            Operating::Polled => Ok(()),
            Operating::Buffered(_) => Err(Error::Unsupported),
        }
    }

    /// Spin until the controller raises SI, bounded by the configured timeout.
    fn wait_for_completion(&mut self) -> Result<(), Error> {
        let budget = self.config.timeout.to_micros().max(1);
        for _ in 0..budget {
            if self.regs.read(CONSET) & CON_SI != 0 {
                return Ok(());
            }
            self.delay.delay_us(1);
        }
        if self.regs.read(CONSET) & CON_SI != 0 {
            return Ok(());
        }
        self.logger
            .error(format_args!("i2c{}: timed out", self.index.get()));
        Err(Error::Timeout)
    }

    fn expect_status(&mut self, expected: u8) -> Result<(), Error> {
        let code = self.regs.status();
        if code == expected {
            Ok(())
        } else {
            self.logger.error(format_args!(
                "i2c{}: status {code:#04x}, expected {expected:#04x}",
                self.index.get()
            ));
            Err(Error::Bus { status: code })
        }
    }

    /// Run `body` as one transaction and always finish it with a stop.
    fn transaction<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let result = body(self);
        I2cBusProtocol::stop(self);
        result
    }

    fn read_bytes(&mut self, buffer: &mut [u8], nack_last: bool) -> Result<(), Error> {
        let last = buffer.len().saturating_sub(1);
        for (i, slot) in buffer.iter_mut().enumerate() {
            if i == last && nack_last {
                self.send_nack();
            } else {
                self.send_ack();
            }
            *slot = self.get_data()?;
        }
        Ok(())
    }

    fn write_polled(&mut self, address: u8, bytes: &[u8]) -> Result<(), Error> {
        Self::address_byte(address, Direction::Write)?;
        self.transaction(|this| {
            this.start()?;
            this.send_address(address, Direction::Write)?;
            bytes.iter().try_for_each(|byte| this.send_data(*byte))
        })
    }

    fn read_polled(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Error> {
        Self::address_byte(address, Direction::Read)?;
        self.transaction(|this| {
            this.start()?;
            this.send_address(address, Direction::Read)?;
            this.read_bytes(buffer, true)
        })
    }

    fn operations_polled(&mut self, address: u8, ops: &mut [Operation<'_>]) -> Result<(), Error> {
        Self::address_byte(address, Direction::Write)?;
        if ops.is_empty() {
            return Ok(());
        }
        self.transaction(|this| {
            let mut previous: Option<Direction> = None;
            for i in 0..ops.len() {
                let next_is_read = matches!(ops.get(i + 1), Some(Operation::Read(_)));
                let Some(op) = ops.get_mut(i) else {
                    break;
                };
                let direction = match op {
                    Operation::Write(_) => Direction::Write,
                    Operation::Read(_) => Direction::Read,
                };
                if previous != Some(direction) {
                    this.start()?;
                    this.send_address(address, direction)?;
                    previous = Some(direction);
                }
                match op {
                    Operation::Write(bytes) => {
                        bytes.iter().try_for_each(|byte| this.send_data(*byte))?;
                    }
                    Operation::Read(buffer) => this.read_bytes(buffer, !next_is_read)?,
                }
            }
            Ok(())
        })
    }
}

fn block_error(err: nb::Error<Error>) -> Error {
    match err {
        nb::Error::WouldBlock => Error::WouldBlock,
        nb::Error::Other(err) => err,
    }
}

impl<R, S, F, D, L> I2cHardwareCore for Lpc11xxI2c<R, S, F, D, L>
where
    R: I2cRegisters,
    S: SystemControl + InterruptControl,
    F: RingBufferProvider,
    D: DelayNs,
    L: Logger,
{
    type Error = Error;

    fn configure(&mut self, config: &I2cConfig) -> Result<(), Self::Error> {
        if self.transfer_in_flight() {
            return Err(Error::Busy);
        }
        let input = I2cSystemSetup::get_i2c_source_frequency(&self.system);
        let divider = divider_for(input, config.speed.frequency()).inspect_err(|_| {
            self.logger.error(format_args!(
                "i2c{}: {} Hz unreachable from {} Hz",
                self.index.get(),
                config.speed.frequency().raw(),
                input.raw()
            ));
        })?;

        let previous = self.mode();
        match config.mode {
            I2cXferMode::Buffered => self.enter_buffered(config)?,
            I2cXferMode::Polled => self.enter_polled(),
        }

        self.enable();
        self.program_divider(divider);
        self.config = *config;

        match (previous, config.mode) {
            (I2cXferMode::Polled, I2cXferMode::Buffered) => self.system.enable_irq(self.irq),
            (I2cXferMode::Buffered, I2cXferMode::Polled) => self.system.disable_irq(self.irq),
            _ => {}
        }
        self.logger.debug(format_args!(
            "i2c{}: {:?} at {} Hz",
            self.index.get(),
            config.mode,
            config.speed.frequency().raw()
        ));
        Ok(())
    }

    fn get_config(&self) -> Result<I2cConfig, Self::Error> {
        let Operating::Buffered(state) = &self.operating else {
            return Err(Error::BufferQuery);
        };
        Ok(I2cConfig {
            mode: I2cXferMode::Buffered,
            speed: I2cSpeed::nearest(self.clock_rate()),
            rx_buffer_size: state.rx.capacity(),
            tx_buffer_size: state.tx.capacity(),
            timeout: self.config.timeout,
        })
    }

    fn set_clock_rate(&mut self, speed: I2cSpeed) -> Result<HertzU32, Self::Error> {
        let input = I2cSystemSetup::get_i2c_source_frequency(&self.system);
        let divider = divider_for(input, speed.frequency())?;
        self.program_divider(divider);
        self.config.speed = speed;
        Ok(self.clock_rate())
    }

    fn enable(&mut self) {
        self.system.reset_deassert(self.variant.reset);
        self.regs.write(CONSET, CON_I2EN);
    }

    fn disable(&mut self) {
        self.regs.write(CONCLR, CON_I2EN);
        self.system.reset_assert(self.variant.reset);
        self.bus_held = false;
    }

    fn handle_interrupt(&mut self) {
        self.service_interrupt();
    }

    fn recover_bus(&mut self) -> Result<(), Self::Error> {
        self.logger
            .debug(format_args!("i2c{}: recovering bus", self.index.get()));
        self.abort_buffered();
        self.regs.write(CONSET, CON_STO);
        self.regs.write(CONCLR, CON_ALL);
        self.bus_held = false;
        self.enable();
        Ok(())
    }
}

impl<R, S, F, D, L> PowerControl for Lpc11xxI2c<R, S, F, D, L>
where
    R: I2cRegisters,
    S: SystemControl + InterruptControl,
    F: RingBufferProvider,
    D: DelayNs,
    L: Logger,
{
    fn set_power_state(&mut self, state: PowerState) {
        match state {
            PowerState::Awake => self.system.enable_clock(self.variant.clock_gate),
            PowerState::Asleep => self.system.disable_clock(self.variant.clock_gate),
        }
        self.logger
            .debug(format_args!("i2c{}: {state:?}", self.index.get()));
    }

    fn power_state(&self) -> PowerState {
        if self.system.is_clock_enabled(self.variant.clock_gate) {
            PowerState::Awake
        } else {
            PowerState::Asleep
        }
    }
}

impl<R, S, F, D, L> I2cBusProtocol for Lpc11xxI2c<R, S, F, D, L>
where
    R: I2cRegisters,
    S: SystemControl + InterruptControl,
    F: RingBufferProvider,
    D: DelayNs,
    L: Logger,
{
    fn start(&mut self) -> Result<(), Self::Error> {
        self.ensure_polled()?;
        if self.bus_held {
            // SI holds the controller until cleared; STA must already be set.
            self.regs.write(CONSET, CON_STA);
            self.regs.write(CONCLR, CON_SI);
        } else {
            self.regs.write(CONCLR, CON_SI);
            self.regs.write(CONSET, CON_STA);
        }
        self.wait_for_completion()?;
        match self.regs.status() {
            status::START_TRANSMITTED | status::REPEATED_START_TRANSMITTED => {
                self.bus_held = true;
                Ok(())
            }
            code => {
                self.logger.error(format_args!(
                    "i2c{}: start failed, status {code:#04x}",
                    self.index.get()
                ));
                Err(Error::Bus { status: code })
            }
        }
    }

    fn send_address(
        &mut self,
        addr: SevenBitAddress,
        direction: Direction,
    ) -> Result<(), Self::Error> {
        self.ensure_polled()?;
        let byte = Self::address_byte(addr, direction)?;
        self.regs.write(DAT, u32::from(byte));
        self.regs.write(CONCLR, CON_STA | CON_SI);
        self.wait_for_completion()?;
        self.expect_status(match direction {
            Direction::Write => status::ADDRESS_W_ACK,
            Direction::Read => status::ADDRESS_R_ACK,
        })
    }

    fn send_data(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.ensure_polled()?;
        self.regs.write(DAT, u32::from(byte));
        self.regs.write(CONCLR, CON_SI);
        self.wait_for_completion()?;
        self.expect_status(status::DATA_W_ACK)
    }

    fn get_data(&mut self) -> Result<u8, Self::Error> {
        self.ensure_polled()?;
        let acking = self.regs.read(CONSET) & CON_AA != 0;
        self.regs.write(CONCLR, CON_SI);
        self.wait_for_completion()?;
        let byte = (self.regs.read(DAT) & 0xFF) as u8;
        self.expect_status(if acking {
            status::DATA_R_ACK
        } else {
            status::DATA_R_NACK
        })?;
        Ok(byte)
    }

    fn send_ack(&mut self) {
        self.regs.write(CONSET, CON_AA);
    }

    fn send_nack(&mut self) {
        self.regs.write(CONCLR, CON_AA);
    }

    fn get_ack(&self) -> bool {
        status::ACKNOWLEDGED.contains(&self.regs.status())
    }

    fn stop(&mut self) {
        self.regs.write(CONSET, CON_STO);
        // A start that never completed leaves STA set.
        self.regs.write(CONCLR, CON_STA | CON_SI);
        self.bus_held = false;
    }
}

impl<R, S, F, D, L> I2cMaster for Lpc11xxI2c<R, S, F, D, L>
where
    R: I2cRegisters,
    S: SystemControl + InterruptControl,
    F: RingBufferProvider,
    D: DelayNs,
    L: Logger,
{
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        match self.operating {
            Operating::Polled => self.write_polled(addr, bytes),
            Operating::Buffered(_) => self.buffered_write(addr, bytes).map_err(block_error),
        }
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        match self.operating {
            Operating::Polled => self.read_polled(addr, buffer),
            Operating::Buffered(_) => self.buffered_read(addr, buffer).map_err(block_error),
        }
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.transaction_slice(addr, &mut [Operation::Write(bytes), Operation::Read(buffer)])
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.ensure_polled()?;
        self.operations_polled(addr, ops_slice)
    }
}

impl<R, S, F, D, L> I2cNonBlocking for Lpc11xxI2c<R, S, F, D, L>
where
    R: I2cRegisters,
    S: SystemControl + InterruptControl,
    F: RingBufferProvider,
    D: DelayNs,
    L: Logger,
{
    fn try_write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> nb::Result<(), Self::Error> {
        match self.operating {
            Operating::Polled => self.write_polled(addr, bytes).map_err(nb::Error::Other),
            Operating::Buffered(_) => self.buffered_write(addr, bytes),
        }
    }

    fn try_read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> nb::Result<(), Self::Error> {
        match self.operating {
            Operating::Polled => self.read_polled(addr, buffer).map_err(nb::Error::Other),
            Operating::Buffered(_) => self.buffered_read(addr, buffer),
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.buffered_flush()
    }
}
