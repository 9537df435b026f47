//! Serial port configuration.
//!
//! Settings are plain values so the CLI and TOML config can carry them as
//! strings; conversion to the driver's types happens only when a port opens.

use crate::{Error, Result};
use std::str::FromStr;

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    OneAndHalf,
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    #[default]
    None,
    Hardware,
    Software,
}

/// Complete port configuration, replaced wholesale on every open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Assert DTR after opening.
    pub dtr: bool,
    /// Assert RTS after opening.
    pub rts: bool,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            flow_control: FlowControl::default(),
            dtr: false,
            rts: false,
        }
    }
}

impl PortConfig {
    /// Default settings at the given baud rate.
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }
}

impl DataBits {
    /// Converts a bit count to DataBits.
    pub fn from_count(bits: u8) -> Result<Self> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(Error::InvalidConfig {
                field: "data bits",
                value: bits.to_string(),
            }),
        }
    }

    /// Returns the bit count.
    pub fn count(&self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }

    pub(crate) fn to_driver(self) -> tokio_serial::DataBits {
        match self {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

impl Parity {
    pub(crate) fn to_driver(self) -> Result<tokio_serial::Parity> {
        match self {
            Parity::None => Ok(tokio_serial::Parity::None),
            Parity::Even => Ok(tokio_serial::Parity::Even),
            Parity::Odd => Ok(tokio_serial::Parity::Odd),
            Parity::Mark | Parity::Space => {
                Err(Error::Unsupported(format!("{} parity", self)))
            }
        }
    }
}

impl StopBits {
    pub(crate) fn to_driver(self) -> Result<tokio_serial::StopBits> {
        match self {
            StopBits::One => Ok(tokio_serial::StopBits::One),
            StopBits::Two => Ok(tokio_serial::StopBits::Two),
            StopBits::OneAndHalf => Err(Error::Unsupported("1.5 stop bits".to_string())),
        }
    }
}

impl FlowControl {
    pub(crate) fn to_driver(self) -> tokio_serial::FlowControl {
        match self {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
            FlowControl::Software => tokio_serial::FlowControl::Software,
        }
    }
}

impl FromStr for DataBits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u8>()
            .map_err(|_| Error::InvalidConfig {
                field: "data bits",
                value: s.to_string(),
            })
            .and_then(Self::from_count)
    }
}

impl FromStr for Parity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "even" | "e" => Ok(Parity::Even),
            "odd" | "o" => Ok(Parity::Odd),
            "mark" | "m" => Ok(Parity::Mark),
            "space" | "s" => Ok(Parity::Space),
            _ => Err(Error::InvalidConfig {
                field: "parity",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for StopBits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1" | "one" => Ok(StopBits::One),
            "1.5" | "one-and-half" => Ok(StopBits::OneAndHalf),
            "2" | "two" => Ok(StopBits::Two),
            _ => Err(Error::InvalidConfig {
                field: "stop bits",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for FlowControl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(FlowControl::None),
            "hardware" | "rts-cts" => Ok(FlowControl::Hardware),
            "software" | "xon-xoff" => Ok(FlowControl::Software),
            _ => Err(Error::InvalidConfig {
                field: "flow control",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for DataBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.count())
    }
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::None => write!(f, "none"),
            Parity::Even => write!(f, "even"),
            Parity::Odd => write!(f, "odd"),
            Parity::Mark => write!(f, "mark"),
            Parity::Space => write!(f, "space"),
        }
    }
}

impl std::fmt::Display for StopBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopBits::One => write!(f, "1"),
            StopBits::OneAndHalf => write!(f, "1.5"),
            StopBits::Two => write!(f, "2"),
        }
    }
}

impl std::fmt::Display for FlowControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowControl::None => write!(f, "none"),
            FlowControl::Hardware => write!(f, "hardware"),
            FlowControl::Software => write!(f, "software"),
        }
    }
}

impl std::fmt::Display for PortConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        };
        write!(
            f,
            "{} {}{}{} flow={}",
            self.baud_rate, self.data_bits, parity, self.stop_bits, self.flow_control
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.flow_control, FlowControl::None);
        assert!(!config.dtr);
        assert!(!config.rts);
    }

    #[test]
    fn test_with_baud_rate() {
        let config = PortConfig::with_baud_rate(9600);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, DataBits::Eight);
    }

    #[test]
    fn test_display() {
        assert_eq!(PortConfig::default().to_string(), "115200 8N1 flow=none");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("7".parse::<DataBits>().unwrap(), DataBits::Seven);
        assert!("9".parse::<DataBits>().is_err());
        assert_eq!("EVEN".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!("1.5".parse::<StopBits>().unwrap(), StopBits::OneAndHalf);
        assert_eq!(
            "hardware".parse::<FlowControl>().unwrap(),
            FlowControl::Hardware
        );
        assert!(matches!(
            "bogus".parse::<Parity>(),
            Err(Error::InvalidConfig { field: "parity", .. })
        ));
    }

    #[test]
    fn test_driver_mapping() {
        assert!(matches!(
            DataBits::Five.to_driver(),
            tokio_serial::DataBits::Five
        ));
        assert!(matches!(
            Parity::Odd.to_driver(),
            Ok(tokio_serial::Parity::Odd)
        ));
        assert!(matches!(Parity::Mark.to_driver(), Err(Error::Unsupported(_))));
        assert!(matches!(
            StopBits::OneAndHalf.to_driver(),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            FlowControl::Software.to_driver(),
            tokio_serial::FlowControl::Software
        ));
    }
}
