//! Output channel clock source routing
//!
//! Channels 0-3 run from VCO tap 1 or the VCXO bypass, channels 4-9 from
//! either VCO tap, channels 10-13 from VCO tap 1 only.

use core::f32::consts::TAU;

use log::debug;

use crate::{constants::*, errors::*, frequency::FrequencyPlan};

/// Upstream clock of an output channel
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum ClockSource {
    /// VCO / M1
    VcoTap1,
    /// VCO / M2
    VcoTap2,
    /// VCXO, PLL2 bypassed
    Bypass,
}

/// Clock source frequencies, Hz
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct DerivedFrequencies {
    pub vco_tap1_hz: u32,
    pub vco_tap2_hz: u32,
    pub bypass_hz: u32,
}

impl DerivedFrequencies {
    pub fn new(oscillator_hz: u32, plan: &FrequencyPlan) -> Self {
        let vco = plan.vco_hz(oscillator_hz);
        let tap = |m: u8| (vco / m.max(1) as u64).min(u32::MAX as u64) as u32;
        DerivedFrequencies {
            vco_tap1_hz: tap(plan.m1_divider),
            vco_tap2_hz: tap(plan.m2_divider),
            bypass_hz: oscillator_hz,
        }
    }

    #[inline]
    pub fn source_hz(self: &Self, source: ClockSource) -> u32 {
        match source {
            ClockSource::VcoTap1 => self.vco_tap1_hz,
            ClockSource::VcoTap2 => self.vco_tap2_hz,
            ClockSource::Bypass => self.bypass_hz,
        }
    }
}

/// Source selection rule, fixed by the channel index
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum RoutingPolicy {
    /// VCXO on an exact match, VCO tap 1 otherwise
    BypassOrTap1,
    /// VCO tap with the smaller rounding error, tap 1 on a tie
    Tap1OrTap2,
    /// VCO tap 1, not routable
    FixedTap1,
}

impl RoutingPolicy {
    pub fn for_channel(channel: u8) -> Result<Self, ChannelError> {
        match channel {
            0 ..= 3 => Ok(RoutingPolicy::BypassOrTap1),
            4 ..= 9 => Ok(RoutingPolicy::Tap1OrTap2),
            10 ..= 13 => Ok(RoutingPolicy::FixedTap1),
            _ => Err(ChannelError::InvalidChannel(channel)),
        }
    }

    /// Best source for a requested rate
    pub fn select(self: Self, freqs: &DerivedFrequencies, requested_hz: u32) -> ClockSource {
        match self {
            RoutingPolicy::BypassOrTap1 =>
                if requested_hz == freqs.bypass_hz {
                    ClockSource::Bypass
                } else {
                    ClockSource::VcoTap1
                },
            RoutingPolicy::Tap1OrTap2 => {
                let r1 = residual(freqs.vco_tap1_hz, requested_hz);
                let r2 = residual(freqs.vco_tap2_hz, requested_hz);
                if r2 < r1 { ClockSource::VcoTap2 } else { ClockSource::VcoTap1 }
            }
            RoutingPolicy::FixedTap1 => ClockSource::VcoTap1,
        }
    }

    /// Source picked by the static "alternate clock source" channel option
    pub fn source_for_alt(self: Self, use_alt_clock_src: bool) -> ClockSource {
        match (self, use_alt_clock_src) {
            (RoutingPolicy::BypassOrTap1, true) => ClockSource::Bypass,
            (RoutingPolicy::Tap1OrTap2, true) => ClockSource::VcoTap2,
            _ => ClockSource::VcoTap1,
        }
    }
}

/// Register holding a channel's source select bit
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum RouteRegister {
    /// PLL1_OUTPUT_CTRL
    OutputCtrl,
    /// PLL1_OUTPUT_CHANNEL_CTRL
    OutputChannelCtrl,
}

/// Source select bit, set routes the channel to its alternate source
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct RouteBit {
    pub register: RouteRegister,
    pub bit: u8,
}

/// `None` for channels without a source select
pub fn route_bit(channel: u8) -> Option<RouteBit> {
    if channel as usize >= NUM_CHANNELS_ALT_CLK_SRC {
        return None;
    }
    match channel {
        0 ..= 3 => Some(RouteBit { register: RouteRegister::OutputChannelCtrl, bit: channel }),
        4 ..= 6 => Some(RouteBit { register: RouteRegister::OutputCtrl, bit: 5 + channel - 4 }),
        _ => Some(RouteBit { register: RouteRegister::OutputChannelCtrl, bit: 4 + channel - 7 }),
    }
}

/// Whether `source` is the alternate one for the channel's select bit
#[inline]
pub fn is_alternate(source: ClockSource) -> bool {
    source != ClockSource::VcoTap1
}

/// round(source / requested), clamped to the channel divider range
pub fn output_divider(source_hz: u32, requested_hz: u32) -> u16 {
    if requested_hz == 0 {
        return CHANNEL_DIV_MAX;
    }
    let (s, r) = (source_hz as u64, requested_hz as u64);
    ((s + r / 2) / r)
        .max(CHANNEL_DIV_MIN as u64)
        .min(CHANNEL_DIV_MAX as u64) as u16
}

/// Output rate error of the best divider for a source
fn residual(source_hz: u32, requested_hz: u32) -> u64 {
    let produced = output_divider(source_hz, requested_hz) as u64 * requested_hz as u64;
    let source = source_hz as u64;
    if produced > source { produced - source } else { source - produced }
}

/// Phase offset in divider input cycles: round(phase × divider / 2π), 0 to 63
pub fn phase_code(phase_radians: f32, divider: u16) -> u8 {
    let x = phase_radians * divider as f32 / TAU;
    if x.is_nan() || x <= 0.0 {
        return 0;
    }
    ((x + 0.5) as u32).min(PHASE_CODE_MAX as u32) as u8
}

/// Phase code back to radians, relative to the current divider
pub fn phase_radians(code: u8, divider: u16) -> f32 {
    code as f32 * TAU / divider.max(1) as f32
}

/// Rate a channel would produce for a request, 0 for a 0 request
pub fn round_rate(freqs: &DerivedFrequencies, channel: u8, requested_hz: u32) -> Result<u32, ChannelError> {
    let policy = RoutingPolicy::for_channel(channel)?;
    if requested_hz == 0 {
        return Ok(0);
    }
    let source_hz = freqs.source_hz(policy.select(freqs, requested_hz));
    Ok(source_hz / output_divider(source_hz, requested_hz) as u32)
}

/// Requested channel changes, `None` leaves the setting alone
#[derive(Debug,Copy,Clone,PartialEq,Default)]
pub struct ChannelRequest {
    pub rate_hz: Option<u32>,
    pub phase_radians: Option<f32>,
    pub enabled: Option<bool>,
}

impl ChannelRequest {
    pub fn rate(mut self: Self, hz: u32) -> Self {
        self.rate_hz = Some(hz);
        self
    }

    pub fn phase(mut self: Self, radians: f32) -> Self {
        self.phase_radians = Some(radians);
        self
    }

    pub fn enable(mut self: Self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}

/// Output channel settings
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct ChannelState {
    pub index: u8,
    pub source: ClockSource,
    pub output_divider: u16,
    pub phase_code: u8,
    pub enabled: bool,
}

impl ChannelState {
    /// Powered down, VCO tap 1, divide by 1
    pub fn new(index: u8) -> Self {
        ChannelState {
            index,
            source: ClockSource::VcoTap1,
            output_divider: CHANNEL_DIV_MIN,
            phase_code: 0,
            enabled: false,
        }
    }

    /// Applies a request, source and divider first, then the phase
    /// against the new divider. Leaves the state untouched on error.
    pub fn apply(
        self: &mut Self,
        freqs: &DerivedFrequencies,
        req: &ChannelRequest,
    ) -> Result<(), ChannelError> {
        let policy = RoutingPolicy::for_channel(self.index)?;
        let mut next = *self;

        if let Some(rate) = req.rate_hz {
            (if rate == 0 { Err(ChannelError::InvalidRate) } else { Ok(()) })?;
            next.source = policy.select(freqs, rate);
            next.output_divider = output_divider(freqs.source_hz(next.source), rate);
            debug!("channel {}: {} Hz from {:?} / {}",
                   self.index, rate, next.source, next.output_divider);
        }

        if let Some(phase) = req.phase_radians {
            next.phase_code = phase_code(phase, next.output_divider);
        }

        if let Some(enabled) = req.enabled {
            next.enabled = enabled;
        }

        *self = next;
        Ok(())
    }

    /// Actual output rate, Hz
    pub fn rate_hz(self: &Self, freqs: &DerivedFrequencies) -> u32 {
        freqs.source_hz(self.source) / self.output_divider.max(1) as u32
    }

    pub fn phase_radians(self: &Self) -> f32 {
        phase_radians(self.phase_code, self.output_divider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freqs() -> DerivedFrequencies {
        DerivedFrequencies {
            vco_tap1_hz: 983_040_000,
            vco_tap2_hz: 737_280_000,
            bypass_hz: 122_880_000,
        }
    }

    #[test]
    fn derived_from_plan() {
        let plan = FrequencyPlan::solve(122_880_000, 983_040_000, 737_280_000).unwrap();
        assert_eq!(DerivedFrequencies::new(122_880_000, &plan), freqs());
    }

    #[test]
    fn smaller_residual_wins() {
        let f = freqs();
        for rate in [122_880_000, 245_760_000, 61_440_000, 100_000_000, 3_000_000, 368_640_000].iter() {
            let r1 = residual(f.vco_tap1_hz, *rate);
            let r2 = residual(f.vco_tap2_hz, *rate);
            let expected = if r2 < r1 { ClockSource::VcoTap2 } else { ClockSource::VcoTap1 };
            assert_eq!(RoutingPolicy::Tap1OrTap2.select(&f, *rate), expected, "{} Hz", rate);
        }
    }

    #[test]
    fn channel5_tie_keeps_tap1() {
        // 983.04 / 8 and 737.28 / 6 are both exact
        let mut ch = ChannelState::new(5);
        ch.apply(&freqs(), &ChannelRequest::default().rate(122_880_000)).unwrap();
        assert_eq!(ch.source, ClockSource::VcoTap1);
        assert_eq!(ch.output_divider, 8);
        assert_eq!(ch.rate_hz(&freqs()), 122_880_000);
    }

    #[test]
    fn tap2_when_exact() {
        // 368.64 MHz = 737.28 / 2, tap 1 would give 983.04 / 3 = 327.68
        let mut ch = ChannelState::new(8);
        ch.apply(&freqs(), &ChannelRequest::default().rate(368_640_000)).unwrap();
        assert_eq!(ch.source, ClockSource::VcoTap2);
        assert_eq!(ch.output_divider, 2);
    }

    #[test]
    fn bypass_on_exact_match_only() {
        let f = freqs();
        assert_eq!(RoutingPolicy::BypassOrTap1.select(&f, 122_880_000), ClockSource::Bypass);
        assert_eq!(RoutingPolicy::BypassOrTap1.select(&f, 122_879_999), ClockSource::VcoTap1);

        let mut ch = ChannelState::new(0);
        ch.apply(&f, &ChannelRequest::default().rate(122_880_000)).unwrap();
        assert_eq!((ch.source, ch.output_divider), (ClockSource::Bypass, 1));
    }

    #[test]
    fn fixed_channels_keep_tap1() {
        let mut ch = ChannelState::new(12);
        ch.apply(&freqs(), &ChannelRequest::default().rate(368_640_000)).unwrap();
        assert_eq!(ch.source, ClockSource::VcoTap1);
        assert_eq!(ch.output_divider, 3);
        assert_eq!(route_bit(12), None);
    }

    #[test]
    fn divider_clamps() {
        assert_eq!(output_divider(983_040_000, 2_000_000_000), 1);
        assert_eq!(output_divider(983_040_000, 1), 1024);
        assert_eq!(output_divider(983_040_000, 491_520_000), 2);
        // rounds to closest
        assert_eq!(output_divider(1000, 400), 3);
        assert_eq!(output_divider(1000, 450), 2);
    }

    #[test]
    fn phase_follows_new_divider() {
        let f = freqs();
        let mut ch = ChannelState::new(4);
        let req = ChannelRequest::default()
            .rate(122_880_000)
            .phase(core::f32::consts::PI);
        ch.apply(&f, &req).unwrap();
        // half a period of divide by 8
        assert_eq!(ch.output_divider, 8);
        assert_eq!(ch.phase_code, 4);
        assert!((ch.phase_radians() - core::f32::consts::PI).abs() < 1e-5);
    }

    #[test]
    fn phase_code_clamps() {
        assert_eq!(phase_code(-1.0, 8), 0);
        assert_eq!(phase_code(f32::NAN, 8), 0);
        assert_eq!(phase_code(100.0, 1024), PHASE_CODE_MAX);
        assert_eq!(phase_code(TAU, 1), 1);
    }

    #[test]
    fn rejects_bad_requests() {
        let f = freqs();
        let mut ch = ChannelState::new(3);
        let before = ch;
        assert_eq!(ch.apply(&f, &ChannelRequest::default().rate(0).enable(true)),
                   Err(ChannelError::InvalidRate));
        assert_eq!(ch, before);

        let mut bad = ChannelState::new(14);
        assert_eq!(bad.apply(&f, &ChannelRequest::default()), Err(ChannelError::InvalidChannel(14)));
    }

    #[test]
    fn enable_only() {
        let mut ch = ChannelState::new(1);
        ch.apply(&freqs(), &ChannelRequest::default().enable(true)).unwrap();
        assert!(ch.enabled);
        assert_eq!(ch.output_divider, 1);
    }

    #[test]
    fn route_bits() {
        assert_eq!(route_bit(2), Some(RouteBit { register: RouteRegister::OutputChannelCtrl, bit: 2 }));
        assert_eq!(route_bit(4), Some(RouteBit { register: RouteRegister::OutputCtrl, bit: 5 }));
        assert_eq!(route_bit(6), Some(RouteBit { register: RouteRegister::OutputCtrl, bit: 7 }));
        assert_eq!(route_bit(7), Some(RouteBit { register: RouteRegister::OutputChannelCtrl, bit: 4 }));
        assert_eq!(route_bit(9), Some(RouteBit { register: RouteRegister::OutputChannelCtrl, bit: 6 }));
        assert_eq!(route_bit(10), None);
    }

    #[test]
    fn round_rate_is_pure() {
        let f = freqs();
        assert_eq!(round_rate(&f, 5, 0), Ok(0));
        assert_eq!(round_rate(&f, 5, 100_000_000), Ok(98_304_000));
        assert_eq!(round_rate(&f, 20, 100_000_000), Err(ChannelError::InvalidChannel(20)));
    }
}
