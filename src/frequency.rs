//! PLL2 frequency planning

use log::debug;

use crate::{constants::*, errors::*, rational};

/// PLL2 divider settings.
///
/// VCO = VCXO × (1 + D) × N / R2, N = 4 × B + A
///
/// where:
/// D is the reference doubler bit.
/// B is the feedback B counter (3 to 63), A the A counter (0 to 3,
/// bounded by B, see [`max_feedback_a`]).
/// R2 is the reference divider (1 to 31).
///
/// VCO tap 1 runs at VCO / M1, VCO tap 2 at VCO / M2.
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct FrequencyPlan {
    /// Divider of the tap the plan was solved for
    pub vco_multiplier: u8,
    pub m1_divider: u8,
    pub m2_divider: u8,
    pub feedback_a: u8,
    pub feedback_b: u8,
    pub reference_r2: u8,
    pub doubler_enabled: bool,
}

impl Default for FrequencyPlan {
    fn default() -> Self {
        FrequencyPlan {
            vco_multiplier: VCO_DIV_MIN,
            m1_divider: VCO_DIV_MIN,
            m2_divider: VCO_DIV_MIN,
            feedback_a: 0,
            feedback_b: (NDIV_MIN / 4) as u8,
            reference_r2: R2_DIV_MIN,
            doubler_enabled: false,
        }
    }
}

/// Largest A counter the prescaler supports with a given B counter
#[inline]
pub fn max_feedback_a(b: u8) -> u8 {
    match b {
        3 => 0,
        4 => 1,
        5 | 6 => 2,
        _ => 3,
    }
}

/// Feedback dividers the A/B counters can produce
pub fn valid_feedback_divider(n: u32) -> bool {
    if !(NDIV_MIN ..= NDIV_MAX).contains(&n) {
        return false;
    }
    !matches!(n, 18 | 19 | 23 | 27)
}

impl FrequencyPlan {

    /// Solves PLL2 dividers for the requested VCO tap frequencies.
    ///
    /// `tap1_hz` is the primary target unless it's zero, then `tap2_hz` is.
    /// All frequencies are truncated to kHz before planning.
    /// Nothing is written to the device.
    pub fn solve(
        oscillator_hz: u32,
        tap1_hz: u32,
        tap2_hz: u32,
    ) -> Result<Self, PlanError> {
        let osc = oscillator_hz / 1000;
        let tap1 = tap1_hz / 1000;
        let tap2 = tap2_hz / 1000;

        if tap1 == 0 && tap2 == 0 {
            return Err(PlanError::NoTargetFrequency);
        }
        (if osc == 0 { Err(PlanError::NoReferenceFrequency) } else { Ok(()) })?;

        let m_freq = if tap1 != 0 { tap1 } else { tap2 };

        let m = (VCO_DIV_MIN ..= VCO_DIV_MAX)
            .find(|m| (VCO_FREQ_MIN_KHZ ..= VCO_FREQ_MAX_KHZ).contains(&(m_freq * *m as u32)))
            .ok_or(PlanError::NoValidVcoMultiplier)?;
        let vco = m_freq * m as u32;

        let (m1, m2) =
            if tap1 != 0 {
                let m2 = if tap2 != 0 { secondary_divider(vco, tap2)? } else { VCO_DIV_MIN };
                (m, m2)
            } else {
                (VCO_DIV_MIN, m)
            };

        let (mut n, mut r) = rational::approximate(vco as u64, osc as u64, NDIV_MAX, R2_DIV_MAX as u32);
        let mut doubler = false;

        if n == 0 || r == 0 {
            return Err(PlanError::DividerOutOfRange);
        }

        if osc as u64 * n as u64 / r as u64 != vco as u64 {
            let (nd, rd) = rational::approximate(vco as u64, 2 * osc as u64, NDIV_MAX, R2_DIV_MAX as u32);
            if nd != 0 && rd != 0 {
                let err = (vco / n) as i64 - (osc / r) as i64;
                let err_doubled = (vco / nd / 2) as i64 - (osc / rd) as i64;
                if err.abs() > err_doubled.abs() {
                    n = nd;
                    r = rd;
                    doubler = true;
                }
            }
        }

        let mut fpfd = osc * (1 + doubler as u32) / r;
        while fpfd > PFD_FREQ_MAX_KHZ || !valid_feedback_divider(n) {
            if n * 2 > NDIV_MAX || r * 2 > R2_DIV_MAX as u32 {
                return Err(PlanError::DividerOutOfRange);
            }
            fpfd /= 2;
            n *= 2;
            r *= 2;
        }

        let vco_actual = osc as u64 * (1 + doubler as u64) * n as u64 / r as u64;
        if !(VCO_FREQ_MIN_KHZ as u64 ..= VCO_FREQ_MAX_KHZ as u64).contains(&vco_actual) {
            return Err(PlanError::DividerOutOfRange);
        }

        let plan = FrequencyPlan {
            vco_multiplier: m,
            m1_divider: m1,
            m2_divider: m2,
            feedback_a: (n % 4) as u8,
            feedback_b: (n / 4) as u8,
            reference_r2: r as u8,
            doubler_enabled: doubler,
        };
        plan.validate().map_err(|_| PlanError::DividerOutOfRange)?;

        debug!("PLL2 plan: VCO {} kHz, N {} R2 {} doubler {}, M1 {} M2 {}, fpfd {} kHz",
               vco, n, r, doubler, m1, m2, fpfd);

        Ok(plan)
    }

    /// Checks divider ranges and the A/B counter pairing
    pub fn validate(self: &Self) -> Result<(), ConfigError> {
        let b = self.feedback_b;
        (if !(NDIV_B_MIN ..= NDIV_B_MAX).contains(&b) { Err(ConfigError::Pll2BCounter(b)) } else { Ok(()) })?;

        let a = self.feedback_a;
        (if a > max_feedback_a(b) { Err(ConfigError::Pll2ACounter { a, b }) } else { Ok(()) })?;

        let r2 = self.reference_r2;
        (if !(R2_DIV_MIN ..= R2_DIV_MAX).contains(&r2) { Err(ConfigError::Pll2R2Divider(r2)) } else { Ok(()) })?;

        let m1 = self.m1_divider;
        (if !(VCO_DIV_MIN ..= VCO_DIV_MAX).contains(&m1) { Err(ConfigError::Pll2M1Divider(m1)) } else { Ok(()) })?;

        let m2 = self.m2_divider;
        (if !(VCO_DIV_MIN ..= VCO_DIV_MAX).contains(&m2) { Err(ConfigError::Pll2M2Divider(m2)) } else { Ok(()) })?;

        Ok(())
    }

    /// N = 4 × B + A
    #[inline]
    pub fn feedback_divider(self: &Self) -> u32 {
        4 * self.feedback_b as u32 + self.feedback_a as u32
    }

    /// VCO = VCXO × (1 + D) × N / R2, Hz
    pub fn vco_hz(self: &Self, oscillator_hz: u32) -> u64 {
        oscillator_hz as u64
            * (1 + self.doubler_enabled as u64)
            * self.feedback_divider() as u64
            / self.reference_r2.max(1) as u64
    }

    /// PLL2 phase detector frequency, Hz
    pub fn pfd_hz(self: &Self, oscillator_hz: u32) -> u64 {
        oscillator_hz as u64
            * (1 + self.doubler_enabled as u64)
            / self.reference_r2.max(1) as u64
    }
}

/// M2 for a secondary tap, the VCO must be within 1 kHz of a multiple
fn secondary_divider(vco_khz: u32, tap_khz: u32) -> Result<u8, PlanError> {
    let m2 = vco_khz / tap_khz;
    if !(VCO_DIV_MIN as u32 ..= VCO_DIV_MAX as u32).contains(&m2) || vco_khz % tap_khz > 1 {
        Err(PlanError::InvalidSecondaryDivider)
    } else {
        Ok(m2 as u8)
    }
}
