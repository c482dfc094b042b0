//! Register transactions
//!
//! Register writes are buffered by the device and take effect on IO update.

use embedded_hal::blocking::delay::DelayMs;
use log::{error, info, trace, warn};

use crate::{
    constants::*,
    device::Transport,
    errors::*,
    register::*,
    router::{route_bit, is_alternate, ClockSource, RouteRegister},
};

/// Register access over a transport
pub struct Registers<T> {
    bus: T,
}

impl<T: Transport> Registers<T> {
    pub fn new(bus: T) -> Self {
        Registers { bus }
    }

    pub fn release(self: Self) -> T {
        self.bus
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(self: &mut Self) -> &mut T {
        &mut self.bus
    }

    /// Raw read, masked to the register width
    pub fn read(self: &mut Self, addr: Address) -> Result<u32, Error<T::Error>> {
        let v = self.bus.read_register(addr).map_err(Error::Transport)? & addr.mask();
        trace!("reg {:#05x} -> {:#x}", addr.offset(), v);
        Ok(v)
    }

    /// Raw write, masked to the register width
    pub fn write(self: &mut Self, addr: Address, value: u32) -> Result<(), Error<T::Error>> {
        trace!("reg {:#05x} <- {:#x}", addr.offset(), value & addr.mask());
        self.bus.write_register(addr, value & addr.mask()).map_err(Error::Transport)
    }

    #[inline]
    pub fn read_reg<R: Register>(self: &mut Self) -> Result<Reg<R>, Error<T::Error>> {
        self.read(R::ADDRESS).map(Reg::new)
    }

    #[inline]
    pub fn write_reg<R: Register>(self: &mut Self, r: Reg<R>) -> Result<(), Error<T::Error>> {
        self.write(R::ADDRESS, r.w)
    }

    pub fn read_clock_dist(self: &mut Self, channel: u8) -> Result<Reg<ClockDist>, Error<T::Error>> {
        self.read(Address::clock_dist(channel)).map(Reg::new)
    }

    pub fn write_clock_dist(self: &mut Self, channel: u8, r: Reg<ClockDist>) -> Result<(), Error<T::Error>> {
        self.write(Address::clock_dist(channel), r.w)
    }

    /// Latches all buffered writes
    pub fn io_update(self: &mut Self) -> Result<(), Error<T::Error>> {
        self.write_reg(Reg::<IoUpdate>::default().set(IoUpdateEn::Enabled))
    }

    /// Points a channel's source select bit at `source`.
    /// No-op for channels without one.
    pub fn route(self: &mut Self, channel: u8, source: ClockSource) -> Result<(), Error<T::Error>> {
        let rb = match route_bit(channel) {
            Some(rb) => rb,
            None => return Ok(()),
        };
        let alt = is_alternate(source);
        match rb.register {
            RouteRegister::OutputCtrl => {
                let r = self.read_reg::<Pll1OutputCtrl>()?;
                self.write_reg(r.set_bit(rb.bit, alt))
            }
            RouteRegister::OutputChannelCtrl => {
                let r = self.read_reg::<Pll1OutputChannelCtrl>()?;
                self.write_reg(r.set_bit(rb.bit, alt))
            }
        }
    }

    /// Restarts all output dividers together: manual sync set, update,
    /// manual sync cleared, update.
    pub fn sync_dividers(self: &mut Self) -> Result<(), Error<T::Error>> {
        let status = self.bus.read_register(StatusSignals::ADDRESS)
            .map_err(|e| Error::Sync(SyncStep::ReadStatus, e))?;
        let status = Reg::<StatusSignals>::new(status & StatusSignals::ADDRESS.mask());

        self.sync_step(SyncStep::ArmSync, StatusSignals::ADDRESS, status.set(SyncManualCtrl::Enabled).w)?;
        self.sync_step(SyncStep::ArmUpdate, IoUpdate::ADDRESS, 1)?;
        self.sync_step(SyncStep::ReleaseSync, StatusSignals::ADDRESS, status.set(SyncManualCtrl::Disabled).w)?;
        self.sync_step(SyncStep::ReleaseUpdate, IoUpdate::ADDRESS, 1)?;

        info!("output dividers synchronized");
        Ok(())
    }

    fn sync_step(self: &mut Self, step: SyncStep, addr: Address, value: u32) -> Result<(), Error<T::Error>> {
        trace!("sync {:?}: reg {:#05x} <- {:#x}", step, addr.offset(), value);
        self.bus.write_register(addr, value).map_err(|e| Error::Sync(step, e))
    }

    /// One EEPROM transfer status poll
    pub fn eeprom_transfer_status(self: &mut Self) -> nb::Result<(), Error<T::Error>> {
        let r = self.bus.read_register(EepromDataXferStatus::ADDRESS)
            .map_err(|e| nb::Error::Other(Error::Storage(StorageStep::PollTransfer, e)))?;
        let r = Reg::<EepromDataXferStatus>::new(r);
        if r.get::<EepromXferInProgress>().is_enabled() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    /// Copies the register file to EEPROM.
    /// Write protection is restored even if the transfer doesn't finish.
    pub fn store_eeprom<D>(self: &mut Self, delay: &mut D) -> Result<(), Error<T::Error>>
    where D: DelayMs<u16>,
    {
        self.storage_step(
            StorageStep::DisableWriteProtect,
            EepromCtrl1::ADDRESS,
            Reg::<EepromCtrl1>::default().set(EepromWriteProtectDisable::Enabled).w,
        )?;
        self.storage_step(
            StorageStep::StartTransfer,
            EepromCtrl2::ADDRESS,
            Reg::<EepromCtrl2>::default().set(Reg2Eeprom::Enabled).w,
        )?;

        let mut done = false;
        for _ in 0..EEPROM_POLL_ATTEMPTS {
            delay.delay_ms(EEPROM_POLL_INTERVAL_MS);
            match self.eeprom_transfer_status() {
                Ok(()) => { done = true; break; }
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }

        self.storage_step(StorageStep::EnableWriteProtect, EepromCtrl1::ADDRESS, 0)?;

        if !done {
            warn!("EEPROM transfer still running after {} polls", EEPROM_POLL_ATTEMPTS);
            return Err(Error::StorageTimeout);
        }

        let r = self.bus.read_register(EepromErrorReadback::ADDRESS)
            .map_err(|e| Error::Storage(StorageStep::ReadError, e))?;
        if Reg::<EepromErrorReadback>::new(r).get::<EepromVerifyFail>().is_enabled() {
            error!("EEPROM verify failed");
            return Err(Error::StorageVerifyFailed);
        }

        info!("registers stored to EEPROM");
        Ok(())
    }

    fn storage_step(self: &mut Self, step: StorageStep, addr: Address, value: u32) -> Result<(), Error<T::Error>> {
        trace!("eeprom {:?}: reg {:#05x} <- {:#x}", step, addr.offset(), value);
        self.bus.write_register(addr, value).map_err(|e| Error::Storage(step, e))
    }

    pub fn status_bits(self: &mut Self) -> Result<StatusBits, Error<T::Error>> {
        let r = self.read_reg::<Readback0>()?;
        Ok(StatusBits::from_bits_truncate(r.w as u8))
    }

    pub fn holdover_bits(self: &mut Self) -> Result<HoldoverBits, Error<T::Error>> {
        let r = self.read_reg::<Readback1>()?;
        Ok(HoldoverBits::from_bits_truncate(r.w as u8))
    }

    /// `WouldBlock` while the VCO calibrates
    pub fn vco_calibration_status(self: &mut Self) -> nb::Result<(), Error<T::Error>> {
        let bits = self.holdover_bits().map_err(nb::Error::Other)?;
        if bits.contains(HoldoverBits::VCO_CALIB_IN_PROGRESS) {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::{vec, vec::Vec};

    use super::*;
    use crate::mock::{CountingDelay, MockBus, Op};

    fn regs() -> Registers<MockBus> {
        Registers::new(MockBus::new())
    }

    #[test]
    fn reads_are_masked() {
        let mut r = regs();
        r.bus.pin(Readback0::ADDRESS, 0xFF_FF05);
        assert_eq!(r.read(Readback0::ADDRESS), Ok(0x05));
    }

    #[test]
    fn route_read_modify_write() {
        let mut r = regs();
        r.bus.pin(Pll1OutputChannelCtrl::ADDRESS, 0x81);
        r.route(8, ClockSource::VcoTap2).unwrap();
        assert_eq!(r.bus.ops.last(), Some(&Op::Write(0x1BB, 0x81 | (1 << 5))));

        r.route(4, ClockSource::VcoTap2).unwrap();
        r.route(5, ClockSource::VcoTap2).unwrap();
        r.route(4, ClockSource::VcoTap1).unwrap();
        assert_eq!(r.bus.value(Pll1OutputCtrl::ADDRESS), 1 << 6);

        let before = r.bus.ops.len();
        r.route(11, ClockSource::VcoTap2).unwrap();
        assert_eq!(r.bus.ops.len(), before);
    }

    #[test]
    fn sync_order() {
        let mut r = regs();
        r.bus.pin(StatusSignals::ADDRESS, 0x302);
        r.sync_dividers().unwrap();
        assert_eq!(r.bus.ops, vec![
            Op::Read(0x232),
            Op::Write(0x232, 0x01_0302),
            Op::Write(0x234, 1),
            Op::Write(0x232, 0x302),
            Op::Write(0x234, 1),
        ]);
    }

    #[test]
    fn sync_failure_names_step() {
        let mut r = regs();
        r.bus.fail_on = Some(IoUpdate::ADDRESS);
        assert_eq!(r.sync_dividers(), Err(Error::Sync(SyncStep::ArmUpdate, ())));
        // stopped at the failing step
        assert_eq!(r.bus.ops.len(), 3);
    }

    #[test]
    fn eeprom_store() {
        let mut r = regs();
        let mut delay = CountingDelay::default();
        r.store_eeprom(&mut delay).unwrap();
        assert_eq!(delay.ms, vec![20]);
        assert_eq!(r.bus.ops, vec![
            Op::Write(0xB02, 1),
            Op::Write(0xB03, 1),
            Op::Read(0xB00),
            Op::Write(0xB02, 0),
            Op::Read(0xB01),
        ]);
    }

    #[test]
    fn eeprom_timeout_restores_write_protect() {
        let mut r = regs();
        r.bus.pin(EepromDataXferStatus::ADDRESS, 1);
        let mut delay = CountingDelay::default();
        assert_eq!(r.store_eeprom(&mut delay), Err(Error::StorageTimeout));
        assert_eq!(delay.ms.len(), EEPROM_POLL_ATTEMPTS as usize);

        let polls = r.bus.ops.iter().filter(|op| **op == Op::Read(0xB00)).count();
        assert_eq!(polls, 5);
        assert_eq!(r.bus.ops.last(), Some(&Op::Write(0xB02, 0)));
    }

    #[test]
    fn eeprom_verify_failure() {
        let mut r = regs();
        r.bus.pin(EepromErrorReadback::ADDRESS, 1);
        let mut delay = CountingDelay::default();
        assert_eq!(r.store_eeprom(&mut delay), Err(Error::StorageVerifyFailed));
        let writes: Vec<_> = r.bus.ops.iter().filter(|op| matches!(op, Op::Write(..))).collect();
        assert_eq!(writes.last(), Some(&&Op::Write(0xB02, 0)));
    }

    #[test]
    fn eeprom_bus_failure_names_step() {
        let mut r = regs();
        r.bus.fail_on = Some(EepromCtrl2::ADDRESS);
        let mut delay = CountingDelay::default();
        assert_eq!(r.store_eeprom(&mut delay), Err(Error::Storage(StorageStep::StartTransfer, ())));
        assert!(delay.ms.is_empty());
    }

    #[test]
    fn status_readback() {
        let mut r = regs();
        r.bus.pin(Readback0::ADDRESS, 0x23);
        let s = r.status_bits().unwrap();
        assert_eq!(s, StatusBits::VCXO | StatusBits::PLL2_LD | StatusBits::PLL1_LD);

        r.bus.pin(Readback1::ADDRESS, 0x01);
        assert_eq!(r.vco_calibration_status(), Err(nb::Error::WouldBlock));
        r.bus.pin(Readback1::ADDRESS, 0x08);
        assert_eq!(r.vco_calibration_status(), Ok(()));
        assert_eq!(r.holdover_bits(), Ok(HoldoverBits::HOLDOVER_ACTIVE));
    }
}
