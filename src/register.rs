//! AD9523 registers

use core::marker::PhantomData;

use bitflags::bitflags;

/// Register address.
/// The register width (1 to 3 bytes) travels with the address, the
/// serial instruction carries it as the transfer length.
#[derive(Debug,Copy,Clone,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct Address {
    offset: u16,
    width: u8,
}

impl Address {
    #[inline]
    pub const fn new(offset: u16, width: u8) -> Self {
        Address { offset: offset & 0xFFF, width }
    }

    /// 12 bit register offset
    #[inline]
    pub const fn offset(self: Self) -> u16 { self.offset }

    /// Transfer length, bytes
    #[inline]
    pub const fn width(self: Self) -> u8 { self.width }

    /// Bits a register of this width can hold
    #[inline]
    pub const fn mask(self: Self) -> u32 {
        0x00FF_FFFF >> (8 * (3 - self.width as u32))
    }

    /// Clock distribution register of an output channel
    #[inline]
    pub const fn clock_dist(channel: u8) -> Self {
        Address::new(0x192 + 3 * channel as u16, 3)
    }
}

/// Register with a fixed address
pub trait Register {
    const ADDRESS: Address;
}

/// Register marker types
macro_rules! gen_register_marker {
    ($(#[$meta:meta])*, $r:ident, $off:tt, $w:tt) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        pub struct $r {}

        impl Register for $r { const ADDRESS: Address = Address::new($off, $w); }
    }
}

gen_register_marker!(, SerialPortConfig, 0x000, 1);
gen_register_marker!(, ReadbackCtrl, 0x004, 1);
gen_register_marker!(
    /// Free for customer use, the bus check scratch register
    , EepromCustomerVersionId, 0x006, 2
);
gen_register_marker!(, Pll1RefADivider, 0x011, 2);
gen_register_marker!(, Pll1RefBDivider, 0x013, 2);
gen_register_marker!(, Pll1FeedbackDivider, 0x017, 2);
gen_register_marker!(, Pll1ChargePumpCtrl, 0x019, 2);
gen_register_marker!(, Pll1InputReceiversCtrl, 0x01A, 1);
gen_register_marker!(, Pll1RefCtrl, 0x01B, 1);
gen_register_marker!(, Pll1MiscCtrl, 0x01C, 1);
gen_register_marker!(, Pll1LoopFilterCtrl, 0x01D, 1);
gen_register_marker!(, Pll2ChargePump, 0x0F0, 1);
gen_register_marker!(, Pll2FeedbackDividerAb, 0x0F1, 1);
gen_register_marker!(, Pll2Ctrl, 0x0F2, 1);
gen_register_marker!(, Pll2VcoCtrl, 0x0F3, 1);
gen_register_marker!(, Pll2VcoDivider, 0x0F4, 1);
gen_register_marker!(, Pll2LoopFilterCtrl, 0x0F6, 2);
gen_register_marker!(, Pll2R2Divider, 0x0F7, 1);
gen_register_marker!(
    /// Channel 4-6 VCO divider select
    , Pll1OutputCtrl, 0x1BA, 1
);
gen_register_marker!(
    /// Channel 0-3 VCXO select, channel 7-9 VCO divider select
    , Pll1OutputChannelCtrl, 0x1BB, 1
);
gen_register_marker!(, Readback0, 0x22C, 1);
gen_register_marker!(, Readback1, 0x22D, 1);
gen_register_marker!(, StatusSignals, 0x232, 3);
gen_register_marker!(, PowerDownCtrl, 0x233, 1);
gen_register_marker!(
    /// Buffered register writes take effect on IO update
    , IoUpdate, 0x234, 1
);
gen_register_marker!(, EepromDataXferStatus, 0xB00, 1);
gen_register_marker!(, EepromErrorReadback, 0xB01, 1);
gen_register_marker!(, EepromCtrl1, 0xB02, 1);
gen_register_marker!(, EepromCtrl2, 0xB03, 1);

/// Channel clock distribution register, one per output channel,
/// see [`Address::clock_dist`]
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct ClockDist {}

/// Single register word
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct Reg<R> {
    /// Register word
    pub w: u32,
    phantom: PhantomData<R>,
}

impl<R> Default for Reg<R> {
    #[inline] fn default() -> Self { Reg::new(0) }
}

/// Bit operations on register words
impl<R> Reg<R> {
    #[inline]
    pub fn new(w: u32) -> Self {
        Reg { w, phantom: PhantomData }
    }

    #[inline]
    pub fn get<F>(self: &Self) -> F
    where F: Sized + BitField<R> + From<u32>
    {
        F::from(
            (self.w >> F::offset()) & F::mask()
        )
    }

    #[inline]
    pub fn set<F>(mut self: Self, f: F) -> Self
    where F: Sized + BitField<R> + Into<u32>
    {
        let fbits = (f.into() & F::mask()) << F::offset();
        let rbits = self.w & (! ( F::mask() << F::offset() ));
        self.w = rbits | fbits;
        self
    }

    /// Single bit, for registers that pack one bit per channel
    #[inline]
    pub fn set_bit(mut self: Self, n: u8, v: bool) -> Self {
        if v {
            self.w |= 1 << n;
        } else {
            self.w &= !(1 << n);
        }
        self
    }
}

/// Bit operations on register words
pub trait BitField<R> {
    /// Number of bits in the bit field
    fn num_bits() -> u8;

    /// Offset from 0
    fn offset() -> u8;

    #[inline]
    fn mask() -> u32 {
        !(0xFFFFFFFFu32 << Self::num_bits())
    }
}

/// Generate BitField implementation
macro_rules! gen_bitfield_impl {
    ($r:ty, $n:ident, $nb:tt, $off:tt) => {
        impl BitField<$r> for $n {
            #[inline] fn num_bits() -> u8 { $nb }
            #[inline] fn offset() -> u8 { $off }
        }
    }
}

/// Small bitfield-encoded numbers boilerplate
macro_rules! gen_bitfield_struct {
    ($(#[$meta:meta])*, $r:ty, $n:ident, $v:ty, $nb:tt, $off:tt) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        pub struct $n(pub $v);

        gen_bitfield_impl!($r, $n, $nb, $off);

        impl From<u32> for $n { #[inline] fn from(x: u32) -> Self { $n(x as $v) } }
        impl From<$n> for u32 { #[inline] fn from(x: $n) -> u32 { x.0 as u32 } }
    };
}

/// Multi-valued mode fields, write only
macro_rules! gen_bitfield_enum {
    ($(#[$meta:meta])*, $r:ty, $n:ident, $nb:tt, $off:tt,
     { $($(#[$vmeta:meta])* $v:ident = $x:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        pub enum $n {
            $($(#[$vmeta])* $v = $x,)+
        }

        gen_bitfield_impl!($r, $n, $nb, $off);

        impl From<$n> for u32 { #[inline] fn from(x: $n) -> u32 { x as u32 } }
    };
}

/// Single bit enable / disable fields
macro_rules! gen_bitfield_switch {
    ($(#[$meta:meta])*, $r:ty, $n:ident, $off:tt) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        pub enum $n {
            Disabled,
            Enabled,
        }

        gen_bitfield_impl!($r, $n, 1, $off);

        impl From<bool> for $n {
            #[inline] fn from(x: bool) -> Self { if x { $n::Enabled } else { $n::Disabled } }
        }
        impl From<u32> for $n {
            #[inline] fn from(x: u32) -> Self { (x & 1 != 0).into() }
        }
        impl From<$n> for u32 { #[inline] fn from(x: $n) -> u32 { x as u32 } }

        impl $n {
            #[inline] pub fn is_enabled(self: Self) -> bool { self == $n::Enabled }
        }
    };
}

gen_bitfield_switch!(
    /// SDO pin drives read data (4-wire SPI)
    , SerialPortConfig, SdoActive, 7
);
gen_bitfield_switch!(
    /// Self clearing soft reset
    , SerialPortConfig, SoftReset, 5
);

gen_bitfield_switch!(
    /// Read back the buffered (pending) register values instead of the active ones
    , ReadbackCtrl, ReadBuffered, 0
);

gen_bitfield_struct!(, EepromCustomerVersionId, CustomerVersion, u16, 16, 0);

gen_bitfield_struct!(
    /// PLL1 REFA R divider
    , Pll1RefADivider, RefADivider, u16, 10, 0
);
gen_bitfield_struct!(
    /// PLL1 REFB R divider
    , Pll1RefBDivider, RefBDivider, u16, 10, 0
);
gen_bitfield_struct!(
    /// PLL1 N divider
    , Pll1FeedbackDivider, Pll1FeedbackDiv, u16, 10, 0
);

gen_bitfield_struct!(
    /// PLL1 charge pump current, 0.5 uA steps
    , Pll1ChargePumpCtrl, Pll1ChargePumpCurrent, u8, 7, 0
);
gen_bitfield_switch!(, Pll1ChargePumpCtrl, Pll1ChargePumpTristate, 7);
gen_bitfield_enum!(, Pll1ChargePumpCtrl, Pll1ChargePumpMode, 2, 8, {
    Tristate = 0,
    PumpUp = 1,
    PumpDown = 2,
    Normal = 3,
});
gen_bitfield_enum!(
    /// PFD antibacklash pulse width
    , Pll1ChargePumpCtrl, Pll1BacklashPulseWidth, 2, 10, {
    Min = 0,
    Low = 1,
    High = 2,
    Max = 3,
});

gen_bitfield_switch!(, Pll1InputReceiversCtrl, RefTestRcv, 7);
gen_bitfield_switch!(, Pll1InputReceiversCtrl, RefBDiffRcv, 6);
gen_bitfield_switch!(, Pll1InputReceiversCtrl, RefADiffRcv, 5);
gen_bitfield_switch!(, Pll1InputReceiversCtrl, RefBRcv, 4);
gen_bitfield_switch!(, Pll1InputReceiversCtrl, RefARcv, 3);
gen_bitfield_switch!(
    /// REFA / REFB receivers follow the power down control
    , Pll1InputReceiversCtrl, RefARefBPowerCtrl, 2
);
gen_bitfield_switch!(, Pll1InputReceiversCtrl, OscInCmosNegInp, 1);
gen_bitfield_switch!(, Pll1InputReceiversCtrl, OscInDiff, 0);

gen_bitfield_switch!(, Pll1RefCtrl, BypassRefTestDiv, 7);
gen_bitfield_switch!(, Pll1RefCtrl, BypassFeedbackDiv, 6);
gen_bitfield_switch!(
    /// Enabled: internal zero delay feedback, disabled: external
    , Pll1RefCtrl, ZeroDelayModeInternal, 5
);
gen_bitfield_switch!(, Pll1RefCtrl, OscInPllFeedback, 4);
gen_bitfield_switch!(, Pll1RefCtrl, ZdInCmosNegInp, 3);
gen_bitfield_switch!(, Pll1RefCtrl, ZdInDiff, 2);
gen_bitfield_switch!(, Pll1RefCtrl, RefBCmosNegInp, 1);
gen_bitfield_switch!(, Pll1RefCtrl, RefACmosNegInp, 0);

gen_bitfield_switch!(
    /// REFB uses its own R divider instead of sharing REFA's
    , Pll1MiscCtrl, RefBIndepDivCtrl, 7
);
gen_bitfield_switch!(, Pll1MiscCtrl, OscCtrlFailVccBy2, 6);
gen_bitfield_enum!(
    /// PLL1 reference selection
    , Pll1MiscCtrl, RefMode, 3, 2, {
    /// Automatic, stay on REFB once switched
    NonRevertiveStayOnRefB = 0,
    /// Automatic, return to REFA when it comes back
    RevertToRefA = 1,
    SelectRefA = 2,
    SelectRefB = 3,
    /// REF_SEL pin decides
    ExtRefSel = 4,
});
gen_bitfield_switch!(, Pll1MiscCtrl, BypassRefBDiv, 1);
gen_bitfield_switch!(, Pll1MiscCtrl, BypassRefADiv, 0);

gen_bitfield_struct!(, Pll1LoopFilterCtrl, Pll1LoopFilterRzero, u8, 4, 0);

gen_bitfield_struct!(
    /// PLL2 charge pump current, 3.5 uA steps
    , Pll2ChargePump, Pll2ChargePumpCurrent, u8, 8, 0
);

gen_bitfield_struct!(
    /// PLL2 feedback A counter, N = 4 * B + A
    , Pll2FeedbackDividerAb, NdivA, u8, 2, 6
);
gen_bitfield_struct!(
    /// PLL2 feedback B counter, N = 4 * B + A
    , Pll2FeedbackDividerAb, NdivB, u8, 6, 0
);

gen_bitfield_enum!(, Pll2Ctrl, Pll2ChargePumpMode, 2, 0, {
    Tristate = 0,
    PumpUp = 1,
    PumpDown = 2,
    Normal = 3,
});
gen_bitfield_enum!(, Pll2Ctrl, Pll2BacklashPulseWidth, 2, 2, {
    Min = 0,
    Low = 1,
    High = 2,
    Max = 3,
});
gen_bitfield_switch!(, Pll2Ctrl, Pll2BacklashCtrl, 4);
gen_bitfield_switch!(
    /// Doubles the VCXO frequency ahead of the R2 divider
    , Pll2Ctrl, FreqDoubler, 5
);
gen_bitfield_switch!(, Pll2Ctrl, LockDetectPowerDown, 7);

gen_bitfield_switch!(
    /// Starts a VCO calibration, see [`HoldoverBits::VCO_CALIB_IN_PROGRESS`]
    , Pll2VcoCtrl, VcoCalibrate, 1
);
gen_bitfield_switch!(, Pll2VcoCtrl, ForceVcoMidscale, 2);
gen_bitfield_switch!(, Pll2VcoCtrl, ForceReferenceValid, 3);
gen_bitfield_switch!(, Pll2VcoCtrl, ForceReleaseSync, 4);

/// VCO divider M1, 3 to 5.
/// Stored as M1 - 3.
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct VcoDividerM1(pub u8);
gen_bitfield_impl!(Pll2VcoDivider, VcoDividerM1, 2, 0);
impl From<u32> for VcoDividerM1 { #[inline] fn from(x: u32) -> Self { VcoDividerM1(x as u8 + 3) } }
impl From<VcoDividerM1> for u32 { #[inline] fn from(x: VcoDividerM1) -> u32 { x.0.wrapping_sub(3) as u32 } }

/// VCO divider M2, 3 to 5.
/// Stored as M2 - 3.
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct VcoDividerM2(pub u8);
gen_bitfield_impl!(Pll2VcoDivider, VcoDividerM2, 2, 4);
impl From<u32> for VcoDividerM2 { #[inline] fn from(x: u32) -> Self { VcoDividerM2(x as u8 + 3) } }
impl From<VcoDividerM2> for u32 { #[inline] fn from(x: VcoDividerM2) -> u32 { x.0.wrapping_sub(3) as u32 } }

gen_bitfield_switch!(, Pll2VcoDivider, VcoDividerM1PowerDown, 2);
gen_bitfield_switch!(, Pll2VcoDivider, VcoDividerM2PowerDown, 6);

gen_bitfield_struct!(, Pll2LoopFilterCtrl, Cpole1, u8, 3, 0);
gen_bitfield_struct!(, Pll2LoopFilterCtrl, Rzero, u8, 3, 3);
gen_bitfield_struct!(, Pll2LoopFilterCtrl, Rpole2, u8, 3, 6);
gen_bitfield_switch!(, Pll2LoopFilterCtrl, RzeroBypass, 8);

gen_bitfield_struct!(
    /// PLL2 reference divider, 1 to 31
    , Pll2R2Divider, R2Divider, u8, 5, 0
);

gen_bitfield_struct!(
    /// Divider phase offset, in steps of the channel divider input
    , ClockDist, DividerPhase, u8, 6, 18
);

/// Channel output divider, 1 to 1024.
/// Stored as divider - 1.
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct ChannelDivider(pub u16);
gen_bitfield_impl!(ClockDist, ChannelDivider, 10, 8);
impl From<u32> for ChannelDivider { #[inline] fn from(x: u32) -> Self { ChannelDivider(x as u16 + 1) } }
impl From<ChannelDivider> for u32 { #[inline] fn from(x: ChannelDivider) -> u32 { x.0.wrapping_sub(1) as u32 } }

gen_bitfield_switch!(, ClockDist, InvertDividerOutput, 7);
gen_bitfield_switch!(
    /// Channel keeps running through a divider sync
    , ClockDist, IgnoreSync, 6
);
gen_bitfield_switch!(, ClockDist, ChannelPowerDown, 5);
gen_bitfield_switch!(, ClockDist, LowPowerMode, 4);
gen_bitfield_enum!(
    /// Output driver mode
    , ClockDist, DriverMode, 4, 0, {
    Tristate = 0,
    Lvpecl8mA = 1,
    Lvds4mA = 2,
    Lvds7mA = 3,
    Hstl16mA = 4,
    Hstl8mA = 5,
    CmosConf1 = 6,
    CmosConf2 = 7,
    CmosConf3 = 8,
    CmosConf4 = 9,
    CmosConf5 = 10,
    CmosConf6 = 11,
    CmosConf7 = 12,
    CmosConf8 = 13,
    CmosConf9 = 14,
});

impl Default for DriverMode {
    fn default() -> Self { DriverMode::Tristate }
}

gen_bitfield_switch!(
    /// Manual sync: dividers are held while set and restart together when cleared
    , StatusSignals, SyncManualCtrl, 16
);
gen_bitfield_struct!(
    /// STATUS0 / STATUS1 pin monitor selection
    , StatusSignals, StatusMonitor, u16, 16, 0
);

gen_bitfield_switch!(, PowerDownCtrl, Pll1PowerDown, 2);
gen_bitfield_switch!(, PowerDownCtrl, Pll2PowerDown, 1);
gen_bitfield_switch!(, PowerDownCtrl, DistPowerDown, 0);

gen_bitfield_switch!(, IoUpdate, IoUpdateEn, 0);

gen_bitfield_switch!(, EepromDataXferStatus, EepromXferInProgress, 0);

gen_bitfield_switch!(, EepromErrorReadback, EepromVerifyFail, 0);

gen_bitfield_switch!(, EepromCtrl1, SoftEeprom, 1);
gen_bitfield_switch!(, EepromCtrl1, EepromWriteProtectDisable, 0);

gen_bitfield_switch!(
    /// Self clearing register to EEPROM transfer start
    , EepromCtrl2, Reg2Eeprom, 0
);

bitflags! {
    /// READBACK_0 status
    pub struct StatusBits: u8 {
        const PLL2_REF_CLK = 1 << 7;
        const PLL2_FB_CLK = 1 << 6;
        const VCXO = 1 << 5;
        const REF_TEST = 1 << 4;
        const REFB = 1 << 3;
        const REFA = 1 << 2;
        const PLL2_LD = 1 << 1;
        const PLL1_LD = 1 << 0;
    }
}

bitflags! {
    /// READBACK_1 status
    pub struct HoldoverBits: u8 {
        const HOLDOVER_ACTIVE = 1 << 3;
        const AUTOMODE_SEL_REFB = 1 << 2;
        const VCO_CALIB_IN_PROGRESS = 1 << 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_mask_follows_width() {
        assert_eq!(Pll2R2Divider::ADDRESS.mask(), 0xFF);
        assert_eq!(Pll2LoopFilterCtrl::ADDRESS.mask(), 0xFFFF);
        assert_eq!(StatusSignals::ADDRESS.mask(), 0xFF_FFFF);
    }

    #[test]
    fn clock_dist_addresses() {
        assert_eq!(Address::clock_dist(0), Address::new(0x192, 3));
        assert_eq!(Address::clock_dist(13), Address::new(0x1B9, 3));
        // addressed by their top byte, the last one ends right below PLL1_OUTPUT_CTRL
        assert_eq!(Address::clock_dist(13).offset() + 1, Pll1OutputCtrl::ADDRESS.offset());
    }

    #[test]
    fn feedback_ab_fields() {
        let r = Reg::<Pll2FeedbackDividerAb>::default()
            .set(NdivA(3))
            .set(NdivB(61));
        assert_eq!(r.w, (3 << 6) | 61);

        let a: NdivA = r.get();
        let b: NdivB = r.get();
        assert_eq!((a, b), (NdivA(3), NdivB(61)));
    }

    #[test]
    fn offset_encoded_dividers() {
        let r = Reg::<Pll2VcoDivider>::default()
            .set(VcoDividerM1(3))
            .set(VcoDividerM2(5));
        assert_eq!(r.w, 2 << 4);
        assert_eq!(r.get::<VcoDividerM1>(), VcoDividerM1(3));
        assert_eq!(r.get::<VcoDividerM2>(), VcoDividerM2(5));

        let d = Reg::<ClockDist>::default().set(ChannelDivider(1024));
        assert_eq!(d.w, 0x3FF << 8);
        assert_eq!(d.get::<ChannelDivider>(), ChannelDivider(1024));
    }

    #[test]
    fn clock_dist_fields_do_not_overlap() {
        let r = Reg::<ClockDist>::new(0xFF_FFFF)
            .set(DividerPhase(0))
            .set(ChannelPowerDown::Disabled);
        assert_eq!(r.get::<DividerPhase>(), DividerPhase(0));
        assert_eq!(r.get::<ChannelDivider>(), ChannelDivider(1024));
        assert!(!r.get::<ChannelPowerDown>().is_enabled());
        assert!(r.get::<LowPowerMode>().is_enabled());
        assert_eq!(r.w, 0x03_FFDF);
    }

    #[test]
    fn bits() {
        let r = Reg::<Pll1OutputChannelCtrl>::new(0x80)
            .set_bit(2, true)
            .set_bit(7, false);
        assert_eq!(r.w, 0x04);
    }
}
