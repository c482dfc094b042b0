#![no_std]

//! [AD9523](https://www.analog.com/en/products/ad9523.html) low jitter
//! clock generator driver.
//!
//! Two PLLs: PLL1 cleans up the reference with an external VCXO, PLL2
//! multiplies the VCXO up to a 2.94 - 3.1 GHz VCO. The VCO is divided by
//! M1 and M2 into two taps; 14 output channels divide a tap (or the VCXO)
//! down further.
//!
//! ```ignore
//! let bus = SpiTransport::new(spi, cs);
//! let dev = Ad9523::new(bus);
//!
//! let config = Config {
//!     vcxo_hz: 122_880_000,
//!     pll2: Pll2Config {
//!         charge_pump_current_na: 420_000,
//!         dividers: Pll2Dividers::Targets { tap1_hz: 983_040_000, tap2_hz: 0 },
//!         ..Pll2Config::default()
//!     },
//!     ..Config::default()
//! };
//! dev.configure(&config, &[
//!     ChannelConfig::new(0).rate(122_880_000).driver_mode(DriverMode::Lvds7mA),
//! ])?;
//!
//! let ch = dev.apply_channel(0, ChannelRequest::default().rate(245_760_000))?;
//! dev.sync_dividers()?;
//! ```

pub mod constants;
pub mod register;
pub mod errors;
pub mod rational;
pub mod frequency;
pub mod router;
pub mod refin;
pub mod config;
pub mod device;
pub mod protocol;
pub mod session;

#[cfg(test)]
mod mock;

pub use crate::{
    config::{ChannelConfig, ChannelOutput, Config, LoopFilter, Pll2Config, Pll2Dividers},
    device::{BusError, SpiTransport, Transport},
    errors::{ChannelError, ConfigError, Error, PlanError, StorageStep, SyncStep},
    frequency::FrequencyPlan,
    refin::{Pll1Config, Receivers},
    register::{DriverMode, HoldoverBits, RefMode, StatusBits},
    router::{ChannelRequest, ChannelState, ClockSource, DerivedFrequencies},
    session::{Ad9523, LockStatus},
};
