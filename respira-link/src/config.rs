//! Link configuration
//!
//! Defaults match the deployed controller link: 115200 baud 8N1 with no flow
//! control, 42 ms allowed between inbound frames and 15 ms for a transmit to
//! complete.
//!
//! Optionally loaded from a `[link]` TOML table:
//!
//! ```toml
//! [link]
//! baudrate = 115200
//! data_bits = 8
//! parity = "none"
//! stop_bits = 1
//! inter_frame_timeout_ms = 42
//! write_timeout_ms = 15
//! ```
//!
//! Missing keys keep their defaults.

use embassy_time::Duration;
use respira_hal::UartConfig;

/// Default time allowed between inbound frames
pub const INTER_FRAME_TIMEOUT: Duration = Duration::from_millis(42);

/// Default time allowed for a transmit to complete
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(15);

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// TOML parsing failed
    TomlParse,
    /// Baud rate of zero
    InvalidBaudrate,
    /// Unsupported number of data bits
    InvalidDataBits(u8),
    /// Unsupported number of stop bits
    InvalidStopBits(u8),
    /// A timeout of zero would never let an operation complete
    ZeroTimeout,
}

/// Session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Line settings passed to the transport when reception is armed
    pub uart: UartConfig,
    /// Maximum wait for a complete inbound frame
    pub inter_frame_timeout: Duration,
    /// Maximum wait for a transmit to complete
    pub write_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            uart: UartConfig::default(),
            inter_frame_timeout: INTER_FRAME_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
        }
    }
}

impl LinkConfig {
    pub fn with_uart(mut self, uart: UartConfig) -> Self {
        self.uart = uart;
        self
    }

    pub fn with_inter_frame_timeout(mut self, timeout: Duration) -> Self {
        self.inter_frame_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uart.baudrate == 0 {
            return Err(ConfigError::InvalidBaudrate);
        }
        if self.inter_frame_timeout == Duration::from_ticks(0)
            || self.write_timeout == Duration::from_ticks(0)
        {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Parse a `[link]` table from TOML text
    ///
    /// Keys absent from the table, or a missing table, keep their defaults.
    /// The result is validated.
    #[cfg(feature = "toml")]
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let file: raw::ConfigFile = toml::from_str(input).map_err(|_| ConfigError::TomlParse)?;
        let config = file.link.into_config()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "toml")]
mod raw {
    use respira_hal::uart::{DataBits, Parity, StopBits};
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize, Default)]
    pub(super) struct ConfigFile {
        #[serde(default)]
        pub(super) link: RawLink,
    }

    #[derive(Clone, Copy, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub(super) enum RawParity {
        None,
        Even,
        Odd,
    }

    #[derive(Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub(super) struct RawLink {
        baudrate: u32,
        data_bits: u8,
        parity: RawParity,
        stop_bits: u8,
        inter_frame_timeout_ms: u64,
        write_timeout_ms: u64,
    }

    impl Default for RawLink {
        fn default() -> Self {
            Self {
                baudrate: 115200,
                data_bits: 8,
                parity: RawParity::None,
                stop_bits: 1,
                inter_frame_timeout_ms: INTER_FRAME_TIMEOUT.as_millis(),
                write_timeout_ms: WRITE_TIMEOUT.as_millis(),
            }
        }
    }

    pub(super) fn data_bits(bits: u8) -> Result<DataBits, ConfigError> {
        match bits {
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            9 => Ok(DataBits::Nine),
            other => Err(ConfigError::InvalidDataBits(other)),
        }
    }

    pub(super) fn stop_bits(bits: u8) -> Result<StopBits, ConfigError> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(ConfigError::InvalidStopBits(other)),
        }
    }

    impl RawLink {
        pub(super) fn into_config(self) -> Result<LinkConfig, ConfigError> {
            let parity = match self.parity {
                RawParity::None => Parity::None,
                RawParity::Even => Parity::Even,
                RawParity::Odd => Parity::Odd,
            };
            Ok(LinkConfig {
                uart: UartConfig {
                    baudrate: self.baudrate,
                    data_bits: data_bits(self.data_bits)?,
                    parity,
                    stop_bits: stop_bits(self.stop_bits)?,
                },
                inter_frame_timeout: Duration::from_millis(self.inter_frame_timeout_ms),
                write_timeout: Duration::from_millis(self.write_timeout_ms),
            })
        }
    }
}
