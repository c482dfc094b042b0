//! AD9523 device

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, error, info};
use spin::Mutex;

use crate::{
    config::*,
    constants::*,
    device::Transport,
    errors::*,
    frequency::FrequencyPlan,
    protocol::Registers,
    register::*,
    router::{self, ChannelRequest, ChannelState, DerivedFrequencies},
};

/// READBACK_0 decoded
#[derive(Debug,Copy,Clone,PartialEq,Eq,Default)]
pub struct LockStatus {
    pub pll1_locked: bool,
    pub pll2_locked: bool,
    pub ref_a_present: bool,
    pub ref_b_present: bool,
    pub ref_test_present: bool,
    pub bypass_clock_present: bool,
    pub pll2_feedback_present: bool,
    pub pll2_ref_present: bool,
}

impl From<StatusBits> for LockStatus {
    fn from(s: StatusBits) -> Self {
        LockStatus {
            pll1_locked: s.contains(StatusBits::PLL1_LD),
            pll2_locked: s.contains(StatusBits::PLL2_LD),
            ref_a_present: s.contains(StatusBits::REFA),
            ref_b_present: s.contains(StatusBits::REFB),
            ref_test_present: s.contains(StatusBits::REF_TEST),
            bypass_clock_present: s.contains(StatusBits::VCXO),
            pll2_feedback_present: s.contains(StatusBits::PLL2_FB_CLK),
            pll2_ref_present: s.contains(StatusBits::PLL2_REF_CLK),
        }
    }
}

/// Settings of a successful bring-up
#[derive(Debug,Copy,Clone)]
struct Configured {
    plan: FrequencyPlan,
    freqs: DerivedFrequencies,
    vco_hz: u64,
    channels: [ChannelState; NUM_CHANNELS],
}

struct Inner<T> {
    regs: Registers<T>,
    state: Option<Configured>,
}

impl<T: Transport> Inner<T> {
    fn configured(self: &Self) -> Result<&Configured, Error<T::Error>> {
        self.state.as_ref().ok_or(Error::Unconfigured)
    }
}

/// AD9523 device.
///
/// All operations take `&self`, the bus is held for the whole operation.
pub struct Ad9523<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Transport> Ad9523<T> {

    /// Unconfigured device, nothing is written until [`Ad9523::configure`]
    pub fn new(bus: T) -> Self {
        Ad9523 {
            inner: Mutex::new(Inner { regs: Registers::new(bus), state: None }),
        }
    }

    /// Gives back the transport
    pub fn release(self: Self) -> T {
        self.inner.into_inner().regs.release()
    }

    /// Brings the device up.
    ///
    /// Configuration, PLL2 plan and channel routing are all checked before
    /// the first register write. On error the device is left unconfigured.
    pub fn configure(
        self: &Self,
        config: &Config,
        channels: &[ChannelConfig],
    ) -> Result<(), Error<T::Error>> {
        config.validate(channels)?;
        let plan = config.pll2.plan::<T::Error>(config.vcxo_hz)?;
        let freqs = DerivedFrequencies::new(config.vcxo_hz, &plan);

        let mut states = [ChannelState::new(0); NUM_CHANNELS];
        for (i, s) in states.iter_mut().enumerate() {
            *s = ChannelState::new(i as u8);
        }
        for ch in channels {
            states[ch.channel as usize] = ch.resolve(&freqs)?;
        }

        let mut inner = self.inner.lock();
        inner.state = None;

        bring_up(&mut inner.regs, config, &plan, channels, &states)?;

        let vco_hz = plan.vco_hz(config.vcxo_hz);
        info!("AD9523 up: VCO {} Hz, taps {} / {} Hz, VCXO {} Hz",
              vco_hz, freqs.vco_tap1_hz, freqs.vco_tap2_hz, freqs.bypass_hz);

        inner.state = Some(Configured { plan, freqs, vco_hz, channels: states });
        Ok(())
    }

    /// Changes a channel's rate, phase or enable.
    ///
    /// A new rate re-routes the channel and recomputes its divider, a phase
    /// given with it is applied against the new divider.
    pub fn apply_channel(
        self: &Self,
        channel: u8,
        req: ChannelRequest,
    ) -> Result<ChannelState, Error<T::Error>> {
        let mut guard = self.inner.lock();
        let Inner { regs, state } = &mut *guard;
        let cfg = state.as_mut().ok_or(Error::<T::Error>::Unconfigured)?;
        let idx = channel_index(channel)?;

        let dist = regs.read_clock_dist(channel)?;
        let mut next = with_dist(cfg.channels[idx], &dist);
        next.apply(&cfg.freqs, &req)?;

        if req.rate_hz.is_some() {
            regs.route(channel, next.source)?;
            // routing is in the buffered registers now, the next IO update latches it
            cfg.channels[idx].source = next.source;
        }

        let dist = dist
            .set(ChannelDivider(next.output_divider))
            .set(DividerPhase(next.phase_code))
            .set(ChannelPowerDown::from(!next.enabled));
        regs.write_clock_dist(channel, dist)?;
        regs.io_update()?;

        debug!("channel {}: {:?}", channel, next);
        cfg.channels[idx] = next;
        Ok(next)
    }

    /// Channel settings as the device reports them
    pub fn channel_state(self: &Self, channel: u8) -> Result<ChannelState, Error<T::Error>> {
        let mut inner = self.inner.lock();
        let cached = inner.configured()?.channels[channel_index(channel)?];
        let dist = inner.regs.read_clock_dist(channel)?;
        Ok(with_dist(cached, &dist))
    }

    /// Actual channel rate, Hz
    pub fn channel_rate(self: &Self, channel: u8) -> Result<u32, Error<T::Error>> {
        let freqs = self.derived_frequencies()?;
        Ok(self.channel_state(channel)?.rate_hz(&freqs))
    }

    /// Rate a channel would produce, nothing is written
    pub fn round_rate(self: &Self, channel: u8, rate_hz: u32) -> Result<u32, Error<T::Error>> {
        let freqs = self.derived_frequencies()?;
        Ok(router::round_rate(&freqs, channel, rate_hz)?)
    }

    /// Restarts all output dividers in phase
    pub fn sync_dividers(self: &Self) -> Result<(), Error<T::Error>> {
        self.inner.lock().regs.sync_dividers()
    }

    /// Stores the register file to EEPROM, blocks for up to 100 ms
    pub fn commit_to_storage<D>(self: &Self, delay: &mut D) -> Result<(), Error<T::Error>>
    where D: DelayMs<u16>,
    {
        self.inner.lock().regs.store_eeprom(delay)
    }

    pub fn lock_status(self: &Self) -> Result<LockStatus, Error<T::Error>> {
        self.inner.lock().regs.status_bits().map(LockStatus::from)
    }

    pub fn holdover_status(self: &Self) -> Result<HoldoverBits, Error<T::Error>> {
        self.inner.lock().regs.holdover_bits()
    }

    /// `WouldBlock` while the VCO calibrates
    pub fn vco_calibration_status(self: &Self) -> nb::Result<(), Error<T::Error>> {
        self.inner.lock().regs.vco_calibration_status()
    }

    pub fn derived_frequencies(self: &Self) -> Result<DerivedFrequencies, Error<T::Error>> {
        Ok(self.inner.lock().configured()?.freqs)
    }

    pub fn plan(self: &Self) -> Result<FrequencyPlan, Error<T::Error>> {
        Ok(self.inner.lock().configured()?.plan)
    }

    /// VCO frequency, Hz
    pub fn vco_hz(self: &Self) -> Result<u64, Error<T::Error>> {
        Ok(self.inner.lock().configured()?.vco_hz)
    }

    /// Debug read, single byte at `offset`
    pub fn register(self: &Self, offset: u16) -> Result<u8, Error<T::Error>> {
        self.inner.lock().regs.read(Address::new(offset, 1)).map(|v| v as u8)
    }

    /// Debug write, single byte at `offset`, applied right away
    pub fn set_register(self: &Self, offset: u16, value: u8) -> Result<(), Error<T::Error>> {
        let mut inner = self.inner.lock();
        inner.regs.write(Address::new(offset, 1), value as u32)?;
        inner.regs.io_update()
    }
}

fn channel_index(channel: u8) -> Result<usize, ChannelError> {
    if (channel as usize) < NUM_CHANNELS {
        Ok(channel as usize)
    } else {
        Err(ChannelError::InvalidChannel(channel))
    }
}

/// Cached source, everything else from the CLOCK_DIST word
fn with_dist(cached: ChannelState, dist: &Reg<ClockDist>) -> ChannelState {
    ChannelState {
        output_divider: dist.get::<ChannelDivider>().0,
        phase_code: dist.get::<DividerPhase>().0,
        enabled: !dist.get::<ChannelPowerDown>().is_enabled(),
        ..cached
    }
}

fn bring_up<T: Transport>(
    regs: &mut Registers<T>,
    config: &Config,
    plan: &FrequencyPlan,
    channels: &[ChannelConfig],
    states: &[ChannelState; NUM_CHANNELS],
) -> Result<(), Error<T::Error>> {
    regs.write_reg(config.serial_port())?;
    regs.write_reg(Reg::<ReadbackCtrl>::default().set(ReadBuffered::Enabled))?;
    regs.io_update()?;

    read_verify(regs)?;

    let pll1 = &config.pll1;
    regs.write_reg(Reg::<Pll1RefADivider>::default().set(RefADivider(pll1.refa_r_div)))?;
    regs.write_reg(Reg::<Pll1RefBDivider>::default().set(RefBDivider(pll1.refb_r_div)))?;
    regs.write_reg(Reg::<Pll1FeedbackDivider>::default().set(Pll1FeedbackDiv(pll1.feedback_div)))?;
    regs.write_reg(pll1.charge_pump())?;
    regs.write_reg(pll1.input_receivers())?;
    regs.write_reg(pll1.ref_ctrl())?;
    regs.write_reg(pll1.misc_ctrl())?;
    regs.write_reg(pll1.loop_filter())?;
    debug!("PLL1 set up, bypass {}", pll1.bypass_en);

    let pll2 = &config.pll2;
    regs.write_reg(pll2.charge_pump())?;
    regs.write_reg(pll2.feedback(plan))?;
    regs.write_reg(pll2.ctrl(plan))?;
    regs.write_reg(Reg::<Pll2VcoCtrl>::default().set(VcoCalibrate::Enabled))?;
    regs.write_reg(pll2.vco_dividers(plan))?;
    regs.write_reg(pll2.r2(plan))?;
    regs.write_reg(pll2.loop_filter.register())?;
    debug!("PLL2 set up: {:?}", plan);

    let mut active = 0u16;
    for ch in channels {
        let state = &states[ch.channel as usize];
        regs.write_clock_dist(ch.channel, ch.clock_dist(state))?;
        regs.route(ch.channel, state.source)?;
        active |= 1 << ch.channel;
    }
    for channel in 0..NUM_CHANNELS as u8 {
        if active & (1 << channel) == 0 {
            regs.write_clock_dist(channel, unused_clock_dist())?;
        }
    }

    regs.write_reg(Reg::<PowerDownCtrl>::default())?;
    regs.write_reg(Reg::<StatusSignals>::default().set(StatusMonitor(STATUS_MONITOR_PLL12_LOCKED)))?;
    regs.io_update()?;

    regs.sync_dividers()
}

/// Bus check through the customer version register, restored afterwards
fn read_verify<T: Transport>(regs: &mut Registers<T>) -> Result<(), Error<T::Error>> {
    let saved = regs.read_reg::<EepromCustomerVersionId>()?;

    regs.write_reg(Reg::<EepromCustomerVersionId>::default().set(CustomerVersion(READ_VERIFY_PATTERN as u16)))?;
    let r = regs.read_reg::<EepromCustomerVersionId>()?;
    if r.w != READ_VERIFY_PATTERN {
        error!("SPI read verify failed ({:#x})", r.w);
        return Err(Error::ReadVerify(r.w));
    }

    regs.write_reg(saved)
}
