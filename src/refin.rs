//! PLL1 reference input config
//! REFA / REFB / ZD_IN / OSC_IN receivers, R dividers, reference selection

use crate::{constants::*, errors::*, register::*};

/// Input receiver configuration.
/// The CMOS negative input options apply with the differential receiver
/// disabled, otherwise the positive input is used.
#[derive(Debug,Copy,Clone,PartialEq,Eq,Default)]
pub struct Receivers {
    pub refa_diff_rcv_en: bool,
    pub refb_diff_rcv_en: bool,
    pub zd_in_diff_en: bool,
    pub osc_in_diff_en: bool,
    pub refa_cmos_neg_inp_en: bool,
    pub refb_cmos_neg_inp_en: bool,
    pub zd_in_cmos_neg_inp_en: bool,
    pub osc_in_cmos_neg_inp_en: bool,
}

/// PLL1 (VCXO cleanup loop) configuration
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct Pll1Config {
    /// REFA R divider, 1 to 1023
    pub refa_r_div: u16,
    /// REFB R divider, 1 to 1023
    pub refb_r_div: u16,
    /// PLL1 N divider, 1 to 1023
    pub feedback_div: u16,
    /// 500 nA steps
    pub charge_pump_current_na: u32,
    pub loop_filter_rzero: u8,
    pub ref_mode: RefMode,
    /// Runs the VCXO open loop, PLL1 powered down
    pub bypass_en: bool,
    pub zero_delay_mode_internal_en: bool,
    pub osc_in_feedback_en: bool,
    pub receivers: Receivers,
}

impl Default for Pll1Config {
    fn default() -> Self {
        Pll1Config {
            refa_r_div: 1,
            refb_r_div: 1,
            feedback_div: 1,
            charge_pump_current_na: 0,
            loop_filter_rzero: 0,
            ref_mode: RefMode::NonRevertiveStayOnRefB,
            bypass_en: false,
            zero_delay_mode_internal_en: false,
            osc_in_feedback_en: false,
            receivers: Receivers::default(),
        }
    }
}

impl Pll1Config {

    pub fn validate(self: &Self) -> Result<(), ConfigError> {
        for div in [self.refa_r_div, self.refb_r_div, self.feedback_div].iter() {
            (if *div > PLL1_DIV_MAX { Err(ConfigError::Pll1Divider(*div)) } else { Ok(()) })?;
        }
        Ok(())
    }

    /// Tristated in bypass, normal pump otherwise
    pub fn charge_pump(self: &Self) -> Reg<Pll1ChargePumpCtrl> {
        if self.bypass_en {
            return Reg::default().set(Pll1ChargePumpTristate::Enabled);
        }
        Reg::default()
            .set(Pll1ChargePumpCurrent((self.charge_pump_current_na / 500).min(0x7F) as u8))
            .set(Pll1ChargePumpMode::Normal)
            .set(Pll1BacklashPulseWidth::Min)
    }

    /// Bypass keeps only the OSC_IN receiver, REFA / REFB follow power down
    pub fn input_receivers(self: &Self) -> Reg<Pll1InputReceiversCtrl> {
        let rcv = &self.receivers;
        let osc = Reg::<Pll1InputReceiversCtrl>::default()
            .set(OscInDiff::from(rcv.osc_in_diff_en))
            .set(OscInCmosNegInp::from(rcv.osc_in_cmos_neg_inp_en));

        if self.bypass_en {
            osc.set(RefARefBPowerCtrl::Enabled)
        } else {
            osc.set(RefARcv::from(rcv.refa_diff_rcv_en))
               .set(RefBRcv::from(rcv.refb_diff_rcv_en))
               .set(RefADiffRcv::from(rcv.refa_diff_rcv_en))
               .set(RefBDiffRcv::from(rcv.refb_diff_rcv_en))
        }
    }

    /// Bypass skips the feedback divider and closes the zero delay loop internally
    pub fn ref_ctrl(self: &Self) -> Reg<Pll1RefCtrl> {
        if self.bypass_en {
            return Reg::default()
                .set(BypassFeedbackDiv::Enabled)
                .set(ZeroDelayModeInternal::Enabled);
        }
        let rcv = &self.receivers;
        Reg::default()
            .set(ZdInDiff::from(rcv.zd_in_diff_en))
            .set(ZdInCmosNegInp::from(rcv.zd_in_cmos_neg_inp_en))
            .set(ZeroDelayModeInternal::from(self.zero_delay_mode_internal_en))
            .set(OscInPllFeedback::from(self.osc_in_feedback_en))
            .set(RefACmosNegInp::from(rcv.refa_cmos_neg_inp_en))
            .set(RefBCmosNegInp::from(rcv.refb_cmos_neg_inp_en))
    }

    pub fn misc_ctrl(self: &Self) -> Reg<Pll1MiscCtrl> {
        Reg::default()
            .set(RefBIndepDivCtrl::Enabled)
            .set(self.ref_mode)
    }

    pub fn loop_filter(self: &Self) -> Reg<Pll1LoopFilterCtrl> {
        Reg::default().set(Pll1LoopFilterRzero(self.loop_filter_rzero))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_range() {
        assert_eq!(Pll1Config::default().validate(), Ok(()));
        let c = Pll1Config { refb_r_div: 1024, ..Pll1Config::default() };
        assert_eq!(c.validate(), Err(ConfigError::Pll1Divider(1024)));
    }

    #[test]
    fn closed_loop_registers() {
        let c = Pll1Config {
            charge_pump_current_na: 10_000,
            loop_filter_rzero: 3,
            ref_mode: RefMode::SelectRefA,
            zero_delay_mode_internal_en: true,
            receivers: Receivers {
                refa_diff_rcv_en: true,
                osc_in_diff_en: true,
                refb_cmos_neg_inp_en: true,
                ..Receivers::default()
            },
            ..Pll1Config::default()
        };
        // 20 × 500 nA, normal mode, min backlash
        assert_eq!(c.charge_pump().w, (3 << 8) | 20);
        // REFA receiver + REFA differential + OSC_IN differential
        assert_eq!(c.input_receivers().w, (1 << 5) | (1 << 3) | 1);
        assert_eq!(c.ref_ctrl().w, (1 << 5) | (1 << 1));
        assert_eq!(c.misc_ctrl().w, (1 << 7) | (2 << 2));
        assert_eq!(c.loop_filter().w, 3);
    }

    #[test]
    fn bypass_registers() {
        let c = Pll1Config {
            bypass_en: true,
            charge_pump_current_na: 10_000,
            receivers: Receivers {
                refa_diff_rcv_en: true,
                osc_in_cmos_neg_inp_en: true,
                ..Receivers::default()
            },
            ..Pll1Config::default()
        };
        assert_eq!(c.charge_pump().w, 1 << 7);
        assert_eq!(c.input_receivers().w, (1 << 2) | (1 << 1));
        assert_eq!(c.ref_ctrl().w, (1 << 6) | (1 << 5));
    }
}
