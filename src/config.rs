//! Device configuration

use crate::{
    constants::*,
    errors::*,
    frequency::FrequencyPlan,
    refin::Pll1Config,
    register::*,
    router::*,
};

/// PLL2 loop filter
#[derive(Debug,Copy,Clone,PartialEq,Eq,Default)]
pub struct LoopFilter {
    pub cpole1: u8,
    pub rzero: u8,
    pub rpole2: u8,
    pub rzero_bypass_en: bool,
}

impl LoopFilter {
    pub fn register(self: &Self) -> Reg<Pll2LoopFilterCtrl> {
        Reg::default()
            .set(Cpole1(self.cpole1))
            .set(Rzero(self.rzero))
            .set(Rpole2(self.rpole2))
            .set(RzeroBypass::from(self.rzero_bypass_en))
    }
}

/// Where the PLL2 dividers come from
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum Pll2Dividers {
    /// Fixed divider settings, checked but used as is
    Fixed(FrequencyPlan),
    /// VCO tap frequencies to solve for, Hz, 0 if unused
    Targets { tap1_hz: u32, tap2_hz: u32 },
}

/// PLL2 (VCO loop) configuration
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct Pll2Config {
    /// 3.5 uA steps
    pub charge_pump_current_na: u32,
    pub dividers: Pll2Dividers,
    pub loop_filter: LoopFilter,
}

impl Default for Pll2Config {
    fn default() -> Self {
        Pll2Config {
            charge_pump_current_na: 0,
            dividers: Pll2Dividers::Fixed(FrequencyPlan::default()),
            loop_filter: LoopFilter::default(),
        }
    }
}

impl Pll2Config {

    /// Solves or checks the PLL2 dividers
    pub fn plan<E>(self: &Self, vcxo_hz: u32) -> Result<FrequencyPlan, Error<E>> {
        let plan = match self.dividers {
            Pll2Dividers::Fixed(plan) => plan,
            Pll2Dividers::Targets { tap1_hz, tap2_hz } => FrequencyPlan::solve(vcxo_hz, tap1_hz, tap2_hz)?,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn charge_pump(self: &Self) -> Reg<Pll2ChargePump> {
        Reg::default().set(Pll2ChargePumpCurrent((self.charge_pump_current_na / 3500).min(0xFF) as u8))
    }

    pub fn ctrl(self: &Self, plan: &FrequencyPlan) -> Reg<Pll2Ctrl> {
        Reg::default()
            .set(Pll2ChargePumpMode::Normal)
            .set(Pll2BacklashCtrl::Enabled)
            .set(FreqDoubler::from(plan.doubler_enabled))
    }

    pub fn feedback(self: &Self, plan: &FrequencyPlan) -> Reg<Pll2FeedbackDividerAb> {
        Reg::default()
            .set(NdivA(plan.feedback_a))
            .set(NdivB(plan.feedback_b))
    }

    pub fn vco_dividers(self: &Self, plan: &FrequencyPlan) -> Reg<Pll2VcoDivider> {
        Reg::default()
            .set(VcoDividerM1(plan.m1_divider))
            .set(VcoDividerM2(plan.m2_divider))
    }

    pub fn r2(self: &Self, plan: &FrequencyPlan) -> Reg<Pll2R2Divider> {
        Reg::default().set(R2Divider(plan.reference_r2))
    }
}

/// Device configuration
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct Config {
    /// VCXO (PLL2 reference, bypass clock) frequency, Hz
    pub vcxo_hz: u32,
    /// SDO pin unused, reads come back on SDIO
    pub spi_3wire: bool,
    pub pll1: Pll1Config,
    pub pll2: Pll2Config,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            vcxo_hz: 0,
            spi_3wire: false,
            pll1: Pll1Config::default(),
            pll2: Pll2Config::default(),
        }
    }
}

impl Config {

    /// Checks everything but the PLL2 plan
    pub fn validate(self: &Self, channels: &[ChannelConfig]) -> Result<(), ConfigError> {
        (if self.vcxo_hz == 0 { Err(ConfigError::OscillatorFrequency) } else { Ok(()) })?;
        self.pll1.validate()?;

        let mut seen = 0u16;
        for ch in channels {
            ch.validate()?;
            let bit = 1 << ch.channel;
            (if seen & bit != 0 { Err(ConfigError::DuplicateChannel(ch.channel)) } else { Ok(()) })?;
            seen |= bit;
        }
        Ok(())
    }

    pub fn serial_port(self: &Self) -> Reg<SerialPortConfig> {
        Reg::default()
            .set(SoftReset::Enabled)
            .set(SdoActive::from(!self.spi_3wire))
    }
}

/// Channel output frequency setting
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum ChannelOutput {
    /// Fixed divider on the default or the alternate clock source
    Divider { divider: u16, use_alt_clock_src: bool },
    /// Rate to route and divide for, Hz
    Rate(u32),
}

/// Output channel configuration
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct ChannelConfig {
    pub channel: u8,
    pub output: ChannelOutput,
    /// In divider input cycles, 0 to 63
    pub divider_phase: u8,
    pub driver_mode: DriverMode,
    pub sync_ignore_en: bool,
    pub divider_output_invert_en: bool,
    pub low_power_mode_en: bool,
    pub output_dis: bool,
}

impl ChannelConfig {
    /// Divide by 1 from the default source, output tristated
    pub fn new(channel: u8) -> Self {
        ChannelConfig {
            channel,
            output: ChannelOutput::Divider { divider: CHANNEL_DIV_MIN, use_alt_clock_src: false },
            divider_phase: 0,
            driver_mode: DriverMode::default(),
            sync_ignore_en: false,
            divider_output_invert_en: false,
            low_power_mode_en: false,
            output_dis: false,
        }
    }

    pub fn divider(mut self: Self, divider: u16, use_alt_clock_src: bool) -> Self {
        self.output = ChannelOutput::Divider { divider, use_alt_clock_src };
        self
    }

    pub fn rate(mut self: Self, hz: u32) -> Self {
        self.output = ChannelOutput::Rate(hz);
        self
    }

    pub fn phase(mut self: Self, divider_phase: u8) -> Self {
        self.divider_phase = divider_phase;
        self
    }

    pub fn driver_mode(mut self: Self, mode: DriverMode) -> Self {
        self.driver_mode = mode;
        self
    }

    pub fn ignore_sync(mut self: Self, en: bool) -> Self {
        self.sync_ignore_en = en;
        self
    }

    pub fn invert(mut self: Self, en: bool) -> Self {
        self.divider_output_invert_en = en;
        self
    }

    pub fn low_power(mut self: Self, en: bool) -> Self {
        self.low_power_mode_en = en;
        self
    }

    pub fn disabled(mut self: Self, dis: bool) -> Self {
        self.output_dis = dis;
        self
    }

    pub fn validate(self: &Self) -> Result<(), ConfigError> {
        let channel = self.channel;
        (if channel as usize >= NUM_CHANNELS { Err(ConfigError::ChannelIndex(channel)) } else { Ok(()) })?;

        match self.output {
            ChannelOutput::Divider { divider, .. } =>
                (if !(CHANNEL_DIV_MIN ..= CHANNEL_DIV_MAX).contains(&divider) {
                    Err(ConfigError::ChannelDivider { channel, divider })
                } else { Ok(()) })?,
            ChannelOutput::Rate(hz) =>
                (if hz == 0 { Err(ConfigError::ChannelRate(channel)) } else { Ok(()) })?,
        }

        let phase = self.divider_phase;
        (if phase > PHASE_CODE_MAX { Err(ConfigError::ChannelPhase { channel, phase }) } else { Ok(()) })?;
        Ok(())
    }

    /// Source and divider the channel starts with
    pub fn resolve(self: &Self, freqs: &DerivedFrequencies) -> Result<ChannelState, ConfigError> {
        let policy = RoutingPolicy::for_channel(self.channel)
            .map_err(|_| ConfigError::ChannelIndex(self.channel))?;

        let (source, output_divider) = match self.output {
            ChannelOutput::Divider { divider, use_alt_clock_src } =>
                (policy.source_for_alt(use_alt_clock_src), divider),
            ChannelOutput::Rate(hz) => {
                let source = policy.select(freqs, hz);
                (source, output_divider(freqs.source_hz(source), hz))
            }
        };

        Ok(ChannelState {
            index: self.channel,
            source,
            output_divider,
            phase_code: self.divider_phase,
            enabled: !self.output_dis,
        })
    }

    /// CLOCK_DIST word for a resolved channel
    pub fn clock_dist(self: &Self, state: &ChannelState) -> Reg<ClockDist> {
        Reg::default()
            .set(self.driver_mode)
            .set(ChannelDivider(state.output_divider))
            .set(DividerPhase(state.phase_code))
            .set(IgnoreSync::from(self.sync_ignore_en))
            .set(InvertDividerOutput::from(self.divider_output_invert_en))
            .set(LowPowerMode::from(self.low_power_mode_en))
            .set(ChannelPowerDown::from(self.output_dis))
    }
}

/// CLOCK_DIST word for a channel left out of the configuration
pub fn unused_clock_dist() -> Reg<ClockDist> {
    Reg::default()
        .set(DriverMode::Tristate)
        .set(ChannelPowerDown::Enabled)
}
