//! Test doubles: recording register bus, counting delay

extern crate std;

use std::{collections::BTreeMap, vec::Vec};

use embedded_hal::blocking::delay::DelayMs;

use crate::{device::Transport, register::Address};

#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum Op {
    Read(u16),
    Write(u16, u32),
}

/// Register file in memory.
/// Pinned registers read back their pinned value whatever was written.
#[derive(Debug,Default)]
pub struct MockBus {
    pub mem: BTreeMap<u16, u32>,
    pub pinned: BTreeMap<u16, u32>,
    pub ops: Vec<Op>,
    /// Fails every access to this register
    pub fail_on: Option<Address>,
}

impl MockBus {
    pub fn new() -> Self {
        MockBus::default()
    }

    pub fn pin(&mut self, addr: Address, value: u32) {
        self.pinned.insert(addr.offset(), value);
    }

    pub fn value(&self, addr: Address) -> u32 {
        let off = addr.offset();
        self.pinned.get(&off)
            .or_else(|| self.mem.get(&off))
            .copied()
            .unwrap_or(0)
    }

    /// Written register offsets, in order
    pub fn writes(&self) -> Vec<u16> {
        self.ops.iter()
            .filter_map(|op| match op {
                Op::Write(off, _) => Some(*off),
                Op::Read(_) => None,
            })
            .collect()
    }
}

impl Transport for MockBus {
    type Error = ();

    fn read_register(&mut self, addr: Address) -> Result<u32, ()> {
        self.ops.push(Op::Read(addr.offset()));
        if self.fail_on == Some(addr) {
            return Err(());
        }
        Ok(self.value(addr))
    }

    fn write_register(&mut self, addr: Address, value: u32) -> Result<(), ()> {
        self.ops.push(Op::Write(addr.offset(), value));
        if self.fail_on == Some(addr) {
            return Err(());
        }
        self.mem.insert(addr.offset(), value);
        Ok(())
    }
}

/// Records every requested delay
#[derive(Debug,Default)]
pub struct CountingDelay {
    pub ms: Vec<u16>,
}

impl DelayMs<u16> for CountingDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.ms.push(ms);
    }
}
