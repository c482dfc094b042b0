//! Register transport

use embedded_hal::{
    digital::v2::OutputPin,
    blocking::spi::{Transfer, Write},
};

use log::trace;

use crate::register::Address;

/// Register level access to the device.
/// Values are right aligned, `Address::width()` bytes long.
pub trait Transport {
    type Error;

    fn read_register(self: &mut Self, addr: Address) -> Result<u32, Self::Error>;

    fn write_register(self: &mut Self, addr: Address, value: u32) -> Result<(), Self::Error>;
}

/// SPI transport errors
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum BusError {
    Spi,
    Pin,
}

/// Serial instruction word, MSB first.
///
/// | 15  | 14:13     | 12   | 11:0   |
/// | R/W | width - 1 | 0    | offset |
#[inline]
pub fn instruction(read: bool, addr: Address) -> [u8; 2] {
    let w = ((read as u16) << 15)
        | (((addr.width().max(1) - 1) as u16 & 0x3) << 13)
        | addr.offset();
    [(w >> 8) as u8, w as u8]
}

/// 4-wire (or 3-wire) SPI with a chip select pin
pub struct SpiTransport<SPI, CS> {
    spi: SPI,
    pin_cs: CS,
}

impl<SPI, CS> SpiTransport<SPI, CS>
where SPI: Transfer<u8> + Write<u8>,
      CS: OutputPin,
{
    /// `spi` - SPI device (`CPOL` = 0, `CPHA` = 0, MSB first)
    /// `pin_cs` - active low chip select
    pub fn new(spi: SPI, pin_cs: CS) -> Self {
        SpiTransport { spi, pin_cs }
    }

    /// Gives back the bus and the pin
    pub fn release(self: Self) -> (SPI, CS) {
        (self.spi, self.pin_cs)
    }

    /// Runs `f` with chip select asserted, the pin is released whatever `f` returns
    fn selected<F>(self: &mut Self, f: F) -> Result<(), BusError>
    where F: FnOnce(&mut SPI) -> Result<(), BusError>,
    {
        self.pin_cs.set_low().map_err(|_| BusError::Pin)?;
        let res = f(&mut self.spi);
        let released = self.pin_cs.set_high().map_err(|_| BusError::Pin);
        res?;
        released
    }
}

impl<SPI, CS> Transport for SpiTransport<SPI, CS>
where SPI: Transfer<u8> + Write<u8>,
      CS: OutputPin,
{
    type Error = BusError;

    fn read_register(self: &mut Self, addr: Address) -> Result<u32, BusError> {
        let len = 2 + addr.width().max(1).min(3) as usize;
        let mut buf = [0u8; 5];
        buf[..2].copy_from_slice(&instruction(true, addr));

        self.selected(|spi| {
            spi.transfer(&mut buf[..len]).map(|_| ()).map_err(|_| BusError::Spi)
        })?;

        let value = buf[2..len].iter().fold(0u32, |v, b| (v << 8) | *b as u32);
        trace!("read {:#05x}: {:#x}", addr.offset(), value);
        Ok(value)
    }

    fn write_register(self: &mut Self, addr: Address, value: u32) -> Result<(), BusError> {
        let width = addr.width().max(1).min(3) as usize;
        let mut buf = [0u8; 5];
        buf[..2].copy_from_slice(&instruction(false, addr));
        for i in 0..width {
            buf[2 + i] = (value >> (8 * (width - 1 - i))) as u8;
        }

        trace!("write {:#05x}: {:#x}", addr.offset(), value);
        self.selected(|spi| {
            spi.write(&buf[..2 + width]).map_err(|_| BusError::Spi)
        })
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::{cell::RefCell, rc::Rc, vec, vec::Vec};

    use super::*;
    use crate::register::{Register, Pll2LoopFilterCtrl, StatusSignals, IoUpdate};

    #[derive(Debug,PartialEq)]
    enum Ev {
        Cs(bool),
        Tx(Vec<u8>),
    }

    type Log = Rc<RefCell<Vec<Ev>>>;

    struct Spi {
        log: Log,
        reply: Vec<u8>,
        fail: bool,
    }

    impl Transfer<u8> for Spi {
        type Error = ();
        fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], ()> {
            self.log.borrow_mut().push(Ev::Tx(words.to_vec()));
            if self.fail {
                return Err(());
            }
            for (w, r) in words.iter_mut().zip(self.reply.iter()) {
                *w = *r;
            }
            Ok(words)
        }
    }

    impl Write<u8> for Spi {
        type Error = ();
        fn write(&mut self, words: &[u8]) -> Result<(), ()> {
            self.log.borrow_mut().push(Ev::Tx(words.to_vec()));
            if self.fail { Err(()) } else { Ok(()) }
        }
    }

    struct Pin(Log);

    impl OutputPin for Pin {
        type Error = ();
        fn set_low(&mut self) -> Result<(), ()> {
            self.0.borrow_mut().push(Ev::Cs(false));
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), ()> {
            self.0.borrow_mut().push(Ev::Cs(true));
            Ok(())
        }
    }

    fn transport(reply: Vec<u8>, fail: bool) -> (SpiTransport<Spi, Pin>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let spi = Spi { log: log.clone(), reply, fail };
        (SpiTransport::new(spi, Pin(log.clone())), log)
    }

    #[test]
    fn instruction_words() {
        assert_eq!(instruction(false, IoUpdate::ADDRESS), [0x02, 0x34]);
        assert_eq!(instruction(true, IoUpdate::ADDRESS), [0x82, 0x34]);
        assert_eq!(instruction(true, Pll2LoopFilterCtrl::ADDRESS), [0xA0, 0xF6]);
        assert_eq!(instruction(false, StatusSignals::ADDRESS), [0x42, 0x32]);
    }

    #[test]
    fn write_frames_msb_first() {
        let (mut t, log) = transport(vec![], false);
        t.write_register(StatusSignals::ADDRESS, 0x01_0302).unwrap();
        assert_eq!(*log.borrow(), vec![
            Ev::Cs(false),
            Ev::Tx(vec![0x42, 0x32, 0x01, 0x03, 0x02]),
            Ev::Cs(true),
        ]);
    }

    #[test]
    fn read_collects_data_bytes() {
        let (mut t, log) = transport(vec![0xFF, 0xFF, 0x12, 0x34], false);
        assert_eq!(t.read_register(Pll2LoopFilterCtrl::ADDRESS), Ok(0x1234));
        assert_eq!(log.borrow()[1], Ev::Tx(vec![0xA0, 0xF6, 0, 0]));
    }

    #[test]
    fn releases_cs_on_failure() {
        let (mut t, log) = transport(vec![], true);
        assert_eq!(t.write_register(IoUpdate::ADDRESS, 1), Err(BusError::Spi));
        assert_eq!(t.read_register(IoUpdate::ADDRESS), Err(BusError::Spi));
        assert_eq!(log.borrow().last(), Some(&Ev::Cs(true)));
        assert_eq!(log.borrow().len(), 6);
    }
}
