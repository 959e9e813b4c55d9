// Licensed under the Apache-2.0 license

//! Test doubles for the I2C driver.
//!
//! [`SimulatedI2c`] models the LPC11xx master state machine at register
//! level. Each time software clears SI (or sets STA/STO while SI is clear)
//! the simulator runs the next bus phase, updates STAT and raises SI again,
//! recording what went over the wire as [`BusEvent`]s.

use crate::common::Logger;
use crate::i2c::hardware_instantiation::{IntegratedDevice, Resource, RegisterWindow};
use crate::i2c::registers::{
    status, I2cRegisters, CONCLR, CONSET, CON_AA, CON_ALL, CON_I2EN, CON_SI, CON_STA,
    CON_STO, DAT, SCLH, SCLL, STAT,
};
use crate::i2c::ring_buffer::{HeaplessProvider, HeaplessRingBuffer, RingBufferProvider};
use crate::i2c::system_setup::{ClockGate, InterruptControl, PeripheralReset, SystemControl};
use embedded_hal::delay::DelayNs;
use fugit::HertzU32;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// Descriptor of a simulated unit: window at 0x4000, index 0, IRQ 31.
pub static TEST_DEVICE: IntegratedDevice = IntegratedDevice {
    name: "sim,i2c",
    resources: &[
        Resource::Memory {
            start: 0x4000,
            end: 0x4FFF,
        },
        Resource::Enumeration(0),
        Resource::Irq(31),
    ],
};

pub const TEST_IRQ: u32 = 31;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Start,
    RepeatedStart,
    Address(u8),
    Write(u8),
    Read { byte: u8, ack: bool },
    Stop,
}

/// A device on the simulated bus.
#[derive(Clone, Debug, Default)]
pub struct Target {
    read_data: VecDeque<u8>,
    nack_address: bool,
    nack_data_after: Option<usize>,
    lose_arbitration_after: Option<usize>,
    received: Vec<u8>,
}

impl Target {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_data(mut self, data: &[u8]) -> Self {
        self.read_data.extend(data.iter().copied());
        self
    }

    pub fn nack_address(mut self) -> Self {
        self.nack_address = true;
        self
    }

    /// Accept `count` data bytes per transfer, then NACK.
    pub fn nack_data_after(mut self, count: usize) -> Self {
        self.nack_data_after = Some(count);
        self
    }

    /// Send `count` bytes per read transfer, then lose arbitration.
    pub fn lose_arbitration_after(mut self, count: usize) -> Self {
        self.lose_arbitration_after = Some(count);
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    StartSent,
    Transmitting(u8),
    Receiving(u8),
    /// Waiting for software to issue a stop or repeated start.
    Held,
}

struct BusModel {
    con: u32,
    stat: u8,
    dat: u8,
    sclh: u32,
    scll: u32,
    phase: Phase,
    targets: HashMap<u8, Target>,
    events: Vec<BusEvent>,
    data_this_transfer: usize,
    stall: bool,
    start_status: Option<u8>,
    register_writes: usize,
}

impl BusModel {
    fn raise(&mut self, code: u8) {
        self.stat = code;
        self.con |= CON_SI;
    }

    fn step(&mut self) {
        if self.con & CON_I2EN == 0 {
            if self.con & CON_STO != 0 && self.phase != Phase::Idle {
                self.events.push(BusEvent::Stop);
            }
            self.con &= !(CON_STA | CON_STO | CON_SI);
            self.phase = Phase::Idle;
            self.stat = status::IDLE;
            return;
        }
        if self.con & CON_SI != 0 {
            return;
        }
        if self.con & CON_STO != 0 {
            self.con &= !CON_STO;
            self.events.push(BusEvent::Stop);
            self.phase = Phase::Idle;
            self.stat = status::IDLE;
        }
        if self.con & CON_STA != 0 {
            if self.stall {
                return;
            }
            if let Some(code) = self.start_status {
                self.phase = Phase::Held;
                self.raise(code);
                return;
            }
            self.data_this_transfer = 0;
            if self.phase == Phase::Idle {
                self.events.push(BusEvent::Start);
                self.raise(status::START_TRANSMITTED);
            } else {
                self.events.push(BusEvent::RepeatedStart);
                self.raise(status::REPEATED_START_TRANSMITTED);
            }
            self.phase = Phase::StartSent;
            return;
        }

        match self.phase {
            Phase::StartSent => {
                let address = self.dat >> 1;
                let read = self.dat & 1 == 1;
                self.events.push(BusEvent::Address(self.dat));
                let ack = self
                    .targets
                    .get(&address)
                    .is_some_and(|target| !target.nack_address);
                let (code, phase) = match (read, ack) {
                    (false, true) => (status::ADDRESS_W_ACK, Phase::Transmitting(address)),
                    (false, false) => (status::ADDRESS_W_NACK, Phase::Held),
                    (true, true) => (status::ADDRESS_R_ACK, Phase::Receiving(address)),
                    (true, false) => (status::ADDRESS_R_NACK, Phase::Held),
                };
                self.phase = phase;
                self.raise(code);
            }
            Phase::Transmitting(address) => {
                let byte = self.dat;
                self.events.push(BusEvent::Write(byte));
                let written = self.data_this_transfer;
                self.data_this_transfer += 1;
                let nack = match self.targets.get_mut(&address) {
                    Some(target) => {
                        let nack = target.nack_data_after.is_some_and(|limit| written >= limit);
                        if !nack {
                            target.received.push(byte);
                        }
                        nack
                    }
                    None => true,
                };
                if nack {
                    self.phase = Phase::Held;
                    self.raise(status::DATA_W_NACK);
                } else {
                    self.raise(status::DATA_W_ACK);
                }
            }
            Phase::Receiving(address) => {
                let sent = self.data_this_transfer;
                self.data_this_transfer += 1;
                let target = self.targets.get_mut(&address);
                if target
                    .as_ref()
                    .and_then(|target| target.lose_arbitration_after)
                    .is_some_and(|limit| sent >= limit)
                {
                    self.phase = Phase::Held;
                    self.raise(status::ARBITRATION_LOST);
                    return;
                }
                let byte = target
                    .and_then(|target| target.read_data.pop_front())
                    .unwrap_or(0xFF);
                let ack = self.con & CON_AA != 0;
                self.dat = byte;
                self.events.push(BusEvent::Read { byte, ack });
                if ack {
                    self.raise(status::DATA_R_ACK);
                } else {
                    self.phase = Phase::Held;
                    self.raise(status::DATA_R_NACK);
                }
            }
            Phase::Idle | Phase::Held => {}
        }
    }
}

/// Shared handle to a simulated controller. Clones see the same bus.
#[derive(Clone)]
pub struct SimulatedI2c {
    model: Rc<RefCell<BusModel>>,
    mapped: Rc<Cell<Option<RegisterWindow>>>,
}

impl SimulatedI2c {
    pub fn new() -> Self {
        Self {
            model: Rc::new(RefCell::new(BusModel {
                con: 0,
                stat: status::IDLE,
                dat: 0,
                sclh: 0,
                scll: 0,
                phase: Phase::Idle,
                targets: HashMap::new(),
                events: Vec::new(),
                data_this_transfer: 0,
                stall: false,
                start_status: None,
                register_writes: 0,
            })),
            mapped: Rc::new(Cell::new(None)),
        }
    }

    pub fn add_target(&self, address: u8, target: Target) {
        self.model.borrow_mut().targets.insert(address, target);
    }

    /// Data bytes the target at `address` accepted.
    pub fn received(&self, address: u8) -> Vec<u8> {
        self.model
            .borrow()
            .targets
            .get(&address)
            .map(|target| target.received.clone())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.model.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.model.borrow_mut().events.clear();
    }

    pub fn stop_count(&self) -> usize {
        self.model
            .borrow()
            .events
            .iter()
            .filter(|event| **event == BusEvent::Stop)
            .count()
    }

    /// Never complete a start: SI stays low.
    pub fn set_stall(&self, stall: bool) {
        self.model.borrow_mut().stall = stall;
    }

    /// Answer the next starts with `code` instead of "start transmitted".
    pub fn set_start_status(&self, code: Option<u8>) {
        self.model.borrow_mut().start_status = code;
    }

    pub fn divider(&self) -> (u32, u32) {
        let model = self.model.borrow();
        (model.sclh, model.scll)
    }

    pub fn control(&self) -> u32 {
        self.model.borrow().con
    }

    pub fn interrupt_pending(&self) -> bool {
        self.control() & CON_SI != 0
    }

    pub fn register_writes(&self) -> usize {
        self.model.borrow().register_writes
    }

    /// Mapping closure for `probe` that records the window it was given.
    pub fn mapper(&self) -> impl FnOnce(RegisterWindow) -> SimulatedI2c {
        let sim = self.clone();
        move |window| {
            sim.mapped.set(Some(window));
            sim
        }
    }

    pub fn mapped_window(&self) -> Option<RegisterWindow> {
        self.mapped.get()
    }
}

impl I2cRegisters for SimulatedI2c {
    fn read(&self, offset: usize) -> u32 {
        let model = self.model.borrow();
        match offset {
            CONSET => model.con,
            STAT => u32::from(model.stat),
            DAT => u32::from(model.dat),
            SCLH => model.sclh,
            SCLL => model.scll,
            _ => 0,
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        let mut model = self.model.borrow_mut();
        model.register_writes += 1;
        match offset {
            CONSET => model.con |= value & (CON_AA | CON_STA | CON_STO | CON_I2EN),
            CONCLR => model.con &= !(value & CON_ALL),
            DAT => model.dat = (value & 0xFF) as u8,
            SCLH => model.sclh = value & 0xFFFF,
            SCLL => model.scll = value & 0xFFFF,
            _ => {}
        }
        model.step();
    }
}

#[derive(Default)]
struct SystemModel {
    frequency: u32,
    enabled_clocks: HashSet<ClockGate>,
    resets: HashMap<PeripheralReset, bool>,
    reset_pulses: HashMap<PeripheralReset, usize>,
    enabled_irqs: HashSet<u32>,
}

/// System and interrupt controller backed by sets and maps.
#[derive(Clone, Default)]
pub struct MockSystem {
    model: Rc<RefCell<SystemModel>>,
}

impl MockSystem {
    pub fn new(frequency: HertzU32) -> Self {
        let mock = Self::default();
        mock.set_frequency(frequency);
        mock
    }

    pub fn set_frequency(&self, frequency: HertzU32) {
        self.model.borrow_mut().frequency = frequency.raw();
    }

    pub fn reset_asserted(&self, reset: PeripheralReset) -> Option<bool> {
        self.model.borrow().resets.get(&reset).copied()
    }

    pub fn reset_pulses(&self, reset: PeripheralReset) -> usize {
        self.model
            .borrow()
            .reset_pulses
            .get(&reset)
            .copied()
            .unwrap_or(0)
    }

    pub fn irq_enabled(&self, irq: u32) -> bool {
        self.model.borrow().enabled_irqs.contains(&irq)
    }

    pub fn clock_enabled(&self, gate: ClockGate) -> bool {
        self.model.borrow().enabled_clocks.contains(&gate)
    }
}

impl SystemControl for MockSystem {
    fn enable_clock(&mut self, gate: ClockGate) {
        self.model.borrow_mut().enabled_clocks.insert(gate);
    }

    fn disable_clock(&mut self, gate: ClockGate) {
        self.model.borrow_mut().enabled_clocks.remove(&gate);
    }

    fn is_clock_enabled(&self, gate: ClockGate) -> bool {
        self.clock_enabled(gate)
    }

    fn reset_assert(&mut self, reset: PeripheralReset) {
        let mut model = self.model.borrow_mut();
        model.resets.insert(reset, true);
        *model.reset_pulses.entry(reset).or_insert(0) += 1;
    }

    fn reset_deassert(&mut self, reset: PeripheralReset) {
        self.model.borrow_mut().resets.insert(reset, false);
    }

    fn system_frequency(&self) -> HertzU32 {
        HertzU32::from_raw(self.model.borrow().frequency)
    }
}

impl InterruptControl for MockSystem {
    fn enable_irq(&mut self, irq: u32) {
        self.model.borrow_mut().enabled_irqs.insert(irq);
    }

    fn disable_irq(&mut self, irq: u32) {
        self.model.borrow_mut().enabled_irqs.remove(&irq);
    }
}

#[derive(Default)]
struct ProviderModel {
    created: usize,
    destroyed: usize,
    fail_on_create: Option<usize>,
}

/// Ring-buffer provider that counts creations and destructions.
#[derive(Clone, Default)]
pub struct CountingProvider {
    model: Rc<RefCell<ProviderModel>>,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th create call (0-based, counting from now) fail.
    pub fn fail_create(&self, n: usize) {
        let mut model = self.model.borrow_mut();
        model.fail_on_create = Some(model.created + n);
    }

    pub fn created(&self) -> usize {
        self.model.borrow().created
    }

    pub fn destroyed(&self) -> usize {
        self.model.borrow().destroyed
    }

    pub fn live(&self) -> usize {
        self.created() - self.destroyed()
    }
}

impl RingBufferProvider for CountingProvider {
    type Buffer = HeaplessRingBuffer<256>;

    fn create(&mut self, capacity: usize) -> Option<Self::Buffer> {
        let mut model = self.model.borrow_mut();
        let created = model.created;
        if model.fail_on_create == Some(created) {
            model.fail_on_create = None;
            return None;
        }
        let buffer = HeaplessProvider::<256>.create(capacity)?;
        model.created += 1;
        Some(buffer)
    }

    fn destroy(&mut self, buffer: Self::Buffer) {
        self.model.borrow_mut().destroyed += 1;
        HeaplessProvider::<256>.destroy(buffer);
    }
}

/// Time source that returns immediately and counts the requested time.
#[derive(Clone, Default)]
pub struct NoopDelay {
    elapsed_ns: Rc<Cell<u64>>,
}

impl NoopDelay {
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns.get() / 1_000
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
    }
}

/// Logger keeping every record, tagged with its level.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    records: Rc<RefCell<Vec<(bool, String)>>>,
}

impl RecordingLogger {
    pub fn errors(&self) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|(is_error, _)| *is_error)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn debugs(&self) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|(is_error, _)| !*is_error)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn debug(&mut self, args: core::fmt::Arguments<'_>) {
        self.records.borrow_mut().push((false, args.to_string()));
    }

    fn error(&mut self, args: core::fmt::Arguments<'_>) {
        self.records.borrow_mut().push((true, args.to_string()));
    }
}
