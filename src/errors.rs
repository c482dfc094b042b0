//! Errors

use core::fmt;

/// PLL2 frequency planning failures.
/// Always raised before any register is written.
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum PlanError {
    /// Neither VCO tap target was given
    NoTargetFrequency,
    /// Oscillator frequency below the 1 kHz planning resolution
    NoReferenceFrequency,
    /// No multiplier in 3..=5 puts the VCO into its lock range
    NoValidVcoMultiplier,
    /// Second tap target is not VCO / 3, 4 or 5
    InvalidSecondaryDivider,
    /// Feedback or R2 divider can't be made legal
    DividerOutOfRange,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::NoTargetFrequency => f.write_str("no PLL2 target frequency"),
            PlanError::NoReferenceFrequency => f.write_str("no PLL2 reference frequency"),
            PlanError::NoValidVcoMultiplier => f.write_str("no VCO multiplier reaches the VCO range"),
            PlanError::InvalidSecondaryDivider => f.write_str("M2 divider must be in the range of 3-5"),
            PlanError::DividerOutOfRange => f.write_str("PLL2 dividers out of range"),
        }
    }
}

/// Static configuration out of its documented range.
/// Detected before any register is written.
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum ConfigError {
    /// PLL2 B counter outside 3-63
    Pll2BCounter(u8),
    /// PLL2 A counter above the ceiling for this B counter
    Pll2ACounter { a: u8, b: u8 },
    /// PLL2 R2 divider outside 1-31
    Pll2R2Divider(u8),
    /// PLL2 M1 divider outside 3-5
    Pll2M1Divider(u8),
    /// PLL2 M2 divider outside 3-5
    Pll2M2Divider(u8),
    /// PLL1 REFA / REFB / feedback divider doesn't fit 10 bits
    Pll1Divider(u16),
    /// VCXO frequency is zero
    OscillatorFrequency,
    /// No such output channel
    ChannelIndex(u8),
    /// Output channel configured twice
    DuplicateChannel(u8),
    /// Channel divider outside 1-1024
    ChannelDivider { channel: u8, divider: u16 },
    /// Divider phase above 63
    ChannelPhase { channel: u8, phase: u8 },
    /// Requested channel rate is zero
    ChannelRate(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Pll2BCounter(b) =>
                write!(f, "PLL2 B divider must be in the range 3-63, got {}", b),
            ConfigError::Pll2ACounter { a, b } =>
                write!(f, "PLL2 A counter {} too large for B counter {}", a, b),
            ConfigError::Pll2R2Divider(r) =>
                write!(f, "PLL2 R2 divider must be in the range of 1-31, got {}", r),
            ConfigError::Pll2M1Divider(m) =>
                write!(f, "PLL2 M1 divider must be in the range of 3-5, got {}", m),
            ConfigError::Pll2M2Divider(m) =>
                write!(f, "PLL2 M2 divider must be in the range of 3-5, got {}", m),
            ConfigError::Pll1Divider(d) =>
                write!(f, "PLL1 divider must be below 1024, got {}", d),
            ConfigError::OscillatorFrequency =>
                f.write_str("VCXO frequency must be set"),
            ConfigError::ChannelIndex(c) =>
                write!(f, "no output channel {}", c),
            ConfigError::DuplicateChannel(c) =>
                write!(f, "output channel {} configured twice", c),
            ConfigError::ChannelDivider { channel, divider } =>
                write!(f, "channel {} divider must be in the range 1-1024, got {}", channel, divider),
            ConfigError::ChannelPhase { channel, phase } =>
                write!(f, "channel {} divider phase must be below 64, got {}", channel, phase),
            ConfigError::ChannelRate(c) =>
                write!(f, "channel {} rate must be positive", c),
        }
    }
}

/// Per channel request failures
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum ChannelError {
    InvalidChannel(u8),
    InvalidRate,
}

/// Synchronize dividers protocol step
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum SyncStep {
    ReadStatus,
    ArmSync,
    ArmUpdate,
    ReleaseSync,
    ReleaseUpdate,
}

/// Register to EEPROM transfer step
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum StorageStep {
    DisableWriteProtect,
    StartTransfer,
    PollTransfer,
    EnableWriteProtect,
    ReadError,
}

/// Driver error, `E` is the transport error
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub enum Error<E> {
    /// Bus failure, passed through as is
    Transport(E),
    Plan(PlanError),
    Config(ConfigError),
    Channel(ChannelError),
    /// Channel operation before a successful `configure`
    Unconfigured,
    /// Bus check read back this instead of the pattern
    ReadVerify(u32),
    Sync(SyncStep, E),
    Storage(StorageStep, E),
    /// EEPROM transfer still in progress after the last poll
    StorageTimeout,
    /// EEPROM error readback flagged a failed verify
    StorageVerifyFailed,
}

impl<E> From<PlanError> for Error<E> {
    #[inline] fn from(e: PlanError) -> Self { Error::Plan(e) }
}

impl<E> From<ConfigError> for Error<E> {
    #[inline] fn from(e: ConfigError) -> Self { Error::Config(e) }
}

impl<E> From<ChannelError> for Error<E> {
    #[inline] fn from(e: ChannelError) -> Self { Error::Channel(e) }
}
