//! Constants

/// PLL2 VCO lower lock limit, kHz
pub const VCO_FREQ_MIN_KHZ: u32 = 2_940_000;

/// PLL2 VCO upper lock limit, kHz
pub const VCO_FREQ_MAX_KHZ: u32 = 3_100_000;

/// Max PLL2 Phase Detector Frequency, kHz
pub const PFD_FREQ_MAX_KHZ: u32 = 259_000;

/// VCO multipliers the plan solver tries, smallest first.
/// These are also the legal M1/M2 VCO divider values.
pub const VCO_DIV_MIN: u8 = 3;
pub const VCO_DIV_MAX: u8 = 5;

/// PLL2 R2 reference divider range
pub const R2_DIV_MIN: u8 = 1;
pub const R2_DIV_MAX: u8 = 31;

/// PLL2 feedback B counter range
pub const NDIV_B_MIN: u8 = 3;
pub const NDIV_B_MAX: u8 = 63;

/// Largest PLL2 feedback divider, N = 4 * B + A
pub const NDIV_MAX: u32 = 255;

/// Smallest PLL2 feedback divider that can be encoded with a legal A/B split
pub const NDIV_MIN: u32 = 16;

/// PLL1 REFA / REFB / feedback dividers are 10 bit counters
pub const PLL1_DIV_MAX: u16 = 1023;

/// Output channels
pub const NUM_CHANNELS: usize = 14;

/// Channels 0..10 can be switched to an alternate clock source
pub const NUM_CHANNELS_ALT_CLK_SRC: usize = 10;

/// Channel output divider range
pub const CHANNEL_DIV_MIN: u16 = 1;
pub const CHANNEL_DIV_MAX: u16 = 1024;

/// Largest 6 bit divider phase code
pub const PHASE_CODE_MAX: u8 = 63;

/// Written to the customer version register and read back to check the bus
pub const READ_VERIFY_PATTERN: u32 = 0xAD95;

/// Status monitor setting: report PLL1 and PLL2 lock on the STATUS pins
pub const STATUS_MONITOR_PLL12_LOCKED: u16 = 0x302;

/// Register to EEPROM transfer poll period
pub const EEPROM_POLL_INTERVAL_MS: u16 = 20;

/// Initial check plus 4 retries
pub const EEPROM_POLL_ATTEMPTS: u8 = 5;
