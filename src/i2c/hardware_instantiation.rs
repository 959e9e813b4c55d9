// Licensed under the Apache-2.0 license

//! # I2C Instance Binding for the LPC11xx family
//!
//! A physical I2C unit is described by an [`IntegratedDevice`]: a name and a
//! short list of [`Resource`]s. Three of them matter to the driver:
//!
//! - the memory-mapped register window,
//! - the enumeration index distinguishing copies of the controller on one chip,
//! - the interrupt line.
//!
//! ## Single ownership
//!
//! [`InstanceTable`] is the arena of live instances, one slot per enumeration
//! index. Its size is the compile-time unit count of the chip
//! ([`MAX_I2C_UNITS`]), and [`InstanceIndex`] can only be built for indices
//! inside that range, so slot lookups never go out of bounds.
//!
//! ```text
//!  bind(device) ──► slot[index] = taken ──► driver owns the register window
//!                                                  │
//!  release(index) ◄── last step of cleanup ◄───────┘
//! ```
//!
//! A slot is freed only by the final step of driver cleanup. A teardown that
//! stops half-way therefore leaves the slot taken, and the half-torn-down
//! unit cannot be bound a second time.
//!
//! ## Static device definitions
//!
//! The integrated units of the chip are declared with `integrated_i2c!`,
//! which produces an `I2C<n>_DEVICE` static for each unit:
//!
//! ```rust,ignore
//! let mut table = InstanceTable::take().ok_or(Error::AlreadyBound)?;
//! let resources = table.bind(&I2C0_DEVICE)?;
//! assert_eq!(resources.window.start, 0x4000_0000);
//! ```

use crate::i2c::error::Error;
use core::cell::Cell;
use critical_section::Mutex;

/// Number of I2C units the instance table can hold.
pub const MAX_I2C_UNITS: usize = 3;

/// Size of one controller's register block.
pub const REGISTER_BLOCK_SIZE: usize = 0x1000;

/// One hardware resource of an integrated device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    /// Memory-mapped register range, `end` inclusive.
    Memory { start: usize, end: usize },
    /// Enumeration index of the unit.
    Enumeration(u32),
    /// Interrupt line number.
    Irq(u32),
}

/// Static description of one integrated peripheral.
#[derive(Copy, Clone, Debug)]
pub struct IntegratedDevice {
    pub name: &'static str,
    pub resources: &'static [Resource],
}

impl IntegratedDevice {
    /// First register window of the device.
    #[must_use]
    pub fn memory(&self) -> Option<RegisterWindow> {
        self.resources.iter().find_map(|resource| match *resource {
            Resource::Memory { start, end } if end >= start => Some(RegisterWindow {
                start,
                size: end - start + 1,
            }),
            _ => None,
        })
    }

    /// Enumeration index of the device.
    #[must_use]
    pub fn enumeration(&self) -> Option<u32> {
        self.resources.iter().find_map(|resource| match *resource {
            Resource::Enumeration(index) => Some(index),
            _ => None,
        })
    }

    /// Interrupt line of the device.
    #[must_use]
    pub fn irq(&self) -> Option<u32> {
        self.resources.iter().find_map(|resource| match *resource {
            Resource::Irq(line) => Some(line),
            _ => None,
        })
    }
}

/// A register window handed to the driver after a successful bind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterWindow {
    pub start: usize,
    pub size: usize,
}

/// Enumeration index known to be inside the instance table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstanceIndex(u8);

impl InstanceIndex {
    #[must_use]
    pub const fn new(index: u32) -> Option<Self> {
        if (index as usize) < MAX_I2C_UNITS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Index checked at compile time.
    #[must_use]
    pub const fn of<const I: usize>() -> Self {
        const { assert!(I < MAX_I2C_UNITS, "index beyond the chip's I2C units") };
        Self(I as u8)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// Resources resolved for a freshly bound instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoundResources {
    pub index: InstanceIndex,
    pub window: RegisterWindow,
    pub irq: u32,
}

static TABLE_TAKEN: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// Arena of live instances, keyed by enumeration index.
///
/// There is one table per program, handed out by [`InstanceTable::take`].
/// Slot ownership is only meaningful within it.
pub struct InstanceTable {
    bound: [bool; MAX_I2C_UNITS],
}

impl InstanceTable {
    /// The instance table, or `None` once it has been taken.
    #[must_use]
    pub fn take() -> Option<Self> {
        critical_section::with(|cs| {
            let taken = TABLE_TAKEN.borrow(cs);
            if taken.replace(true) {
                None
            } else {
                Some(Self::empty())
            }
        })
    }

    const fn empty() -> Self {
        Self {
            bound: [false; MAX_I2C_UNITS],
        }
    }

    /// Private table for driving the driver from host tests.
    #[cfg(test)]
    pub(crate) const fn new() -> Self {
        Self::empty()
    }

    /// Resolve the resources of `device` and claim its enumeration slot.
    ///
    /// Nothing is touched on the hardware here; powering the unit up is the
    /// driver's job once it owns the window.
    ///
    /// # Errors
    ///
    /// * `ResourceMissing` if the window, index or interrupt line is absent.
    /// * `UnsupportedInstance` if the index lies outside the table.
    /// * `AlreadyBound` if a live instance owns the index.
    pub fn bind(&mut self, device: &IntegratedDevice) -> Result<BoundResources, Error> {
        let raw_index = device.enumeration().ok_or(Error::ResourceMissing)?;
        let window = device.memory().ok_or(Error::ResourceMissing)?;
        let irq = device.irq().ok_or(Error::ResourceMissing)?;
        let index = InstanceIndex::new(raw_index).ok_or(Error::UnsupportedInstance)?;

        let slot = self
            .bound
            .get_mut(index.get())
            .ok_or(Error::UnsupportedInstance)?;
        if *slot {
            return Err(Error::AlreadyBound);
        }
        *slot = true;

        Ok(BoundResources { index, window, irq })
    }

    /// Free the slot of `index`.
    ///
    /// # Errors
    ///
    /// `NotBound` if the slot is already free, which means cleanup ran twice.
    pub fn release(&mut self, index: InstanceIndex) -> Result<(), Error> {
        match self.bound.get_mut(index.get()) {
            Some(slot) if *slot => {
                *slot = false;
                Ok(())
            }
            _ => Err(Error::NotBound),
        }
    }

    #[must_use]
    pub fn is_bound(&self, index: InstanceIndex) -> bool {
        self.bound.get(index.get()).copied().unwrap_or(false)
    }

    /// Number of live instances.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.bound.iter().filter(|bound| **bound).count()
    }
}

macro_rules! integrated_i2c {
    ($($n:literal => { base: $base:expr, irq: $irq:expr }),+ $(,)?) => {
        paste::paste! {
            $(
                const [<I2C $n _RESOURCES>]: [Resource; 3] = [
                    Resource::Memory {
                        start: $base,
                        end: $base + REGISTER_BLOCK_SIZE - 1,
                    },
                    Resource::Enumeration($n),
                    Resource::Irq($irq),
                ];

                #[doc = concat!("Integrated I2C unit ", stringify!($n), ".")]
                pub static [<I2C $n _DEVICE>]: IntegratedDevice = IntegratedDevice {
                    name: "lpc11xx,i2c",
                    resources: &[<I2C $n _RESOURCES>],
                };
            )+
        }
    };
}

integrated_i2c! {
    0 => { base: 0x4000_0000, irq: 15 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    static MISSING_IRQ: IntegratedDevice = IntegratedDevice {
        name: "broken",
        resources: &[
            Resource::Memory { start: 0x4000, end: 0x4FFF },
            Resource::Enumeration(0),
        ],
    };

    static OUT_OF_TABLE: IntegratedDevice = IntegratedDevice {
        name: "far",
        resources: &[
            Resource::Memory { start: 0x8000, end: 0x8FFF },
            Resource::Enumeration(9),
            Resource::Irq(3),
        ],
    };

    #[test]
    fn test_bind_resolves_resources() {
        let mut table = InstanceTable::new();

        let bound = table.bind(&I2C0_DEVICE).unwrap();

        assert_eq!(bound.index, InstanceIndex::of::<0>());
        assert_eq!(
            bound.window,
            RegisterWindow { start: 0x4000_0000, size: REGISTER_BLOCK_SIZE }
        );
        assert_eq!(bound.irq, 15);
        assert!(table.is_bound(bound.index));
    }

    #[test]
    fn test_table_is_handed_out_once() {
        let table = InstanceTable::take();

        assert!(table.is_some_and(|table| table.bound_count() == 0));
        assert!(InstanceTable::take().is_none());
    }

    #[test]
    fn test_second_bind_conflicts() {
        let mut table = InstanceTable::new();
        table.bind(&I2C0_DEVICE).unwrap();

        assert_eq!(table.bind(&I2C0_DEVICE), Err(Error::AlreadyBound));
        assert_eq!(table.bound_count(), 1);
    }

    #[test]
    fn test_incomplete_descriptor_is_rejected_without_claiming() {
        let mut table = InstanceTable::new();

        assert_eq!(table.bind(&MISSING_IRQ), Err(Error::ResourceMissing));
        assert_eq!(table.bound_count(), 0);
        assert_eq!(table.bind(&OUT_OF_TABLE), Err(Error::UnsupportedInstance));
    }

    #[test]
    fn test_double_release_is_reported() {
        let mut table = InstanceTable::new();
        let bound = table.bind(&I2C0_DEVICE).unwrap();

        assert_eq!(table.release(bound.index), Ok(()));
        assert_eq!(table.release(bound.index), Err(Error::NotBound));
        assert!(table.bind(&I2C0_DEVICE).is_ok());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Bind(u32),
        Release(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..MAX_I2C_UNITS as u32).prop_map(Op::Bind),
            (0u32..MAX_I2C_UNITS as u32).prop_map(Op::Release),
        ]
    }

    fn leak_device(index: u32) -> &'static IntegratedDevice {
        let resources: &'static [Resource] = Box::leak(Box::new([
            Resource::Memory { start: 0x1000 * (index as usize + 1), end: 0x1000 * (index as usize + 2) - 1 },
            Resource::Enumeration(index),
            Resource::Irq(index),
        ]));
        Box::leak(Box::new(IntegratedDevice { name: "prop", resources }))
    }

    proptest! {
        /// At most one live instance per index for any bind/release sequence.
        #[test]
        fn single_owner_per_index(ops in proptest::collection::vec(op(), 0..40)) {
            let devices: Vec<_> = (0..MAX_I2C_UNITS as u32).map(leak_device).collect();
            let mut table = InstanceTable::new();
            let mut model = [false; MAX_I2C_UNITS];

            for op in ops {
                match op {
                    Op::Bind(i) => {
                        let result = table.bind(devices[i as usize]);
                        if model[i as usize] {
                            prop_assert_eq!(result, Err(Error::AlreadyBound));
                        } else {
                            prop_assert!(result.is_ok());
                            model[i as usize] = true;
                        }
                    }
                    Op::Release(i) => {
                        let index = InstanceIndex::new(i).unwrap();
                        let result = table.release(index);
                        prop_assert_eq!(result.is_ok(), model[i as usize]);
                        model[i as usize] = false;
                    }
                }
                prop_assert_eq!(table.bound_count(), model.iter().filter(|b| **b).count());
            }
        }
    }
}
