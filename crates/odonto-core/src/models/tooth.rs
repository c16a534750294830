//! Tooth identity in FDI notation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Charting errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("Invalid FDI tooth number: {0}")]
    InvalidTooth(u8),

    #[error("Invalid chart data: {0}")]
    InvalidData(String),
}

pub type ChartResult<T> = Result<T, ChartError>;

/// Upper-right quadrant in chart order (distal to mesial).
pub const UPPER_RIGHT: [u8; 8] = [18, 17, 16, 15, 14, 13, 12, 11];
/// Upper-left quadrant in chart order.
pub const UPPER_LEFT: [u8; 8] = [21, 22, 23, 24, 25, 26, 27, 28];
/// Lower-left quadrant in chart order.
pub const LOWER_LEFT: [u8; 8] = [31, 32, 33, 34, 35, 36, 37, 38];
/// Lower-right quadrant in chart order.
pub const LOWER_RIGHT: [u8; 8] = [48, 47, 46, 45, 44, 43, 42, 41];

/// A permanent tooth identified by its two-digit FDI number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ToothNumber(u8);

/// Dental arch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    /// Upper jaw (teeth 11-28)
    Maxillary,
    /// Lower jaw (teeth 31-48)
    Mandibular,
}

/// Patient side of the mouth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Right,
    Left,
}

/// Anatomical class of a tooth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToothClass {
    /// Incisors and canines
    Anterior,
    Premolar,
    Molar,
}

impl ToothNumber {
    /// Validate an FDI number (quadrant 1-4, position 1-8).
    pub fn new(number: u8) -> ChartResult<Self> {
        let quadrant = number / 10;
        let position = number % 10;
        if (1..=4).contains(&quadrant) && (1..=8).contains(&position) {
            Ok(Self(number))
        } else {
            Err(ChartError::InvalidTooth(number))
        }
    }

    /// Raw FDI number.
    pub fn number(self) -> u8 {
        self.0
    }

    /// Quadrant digit (1-4).
    pub fn quadrant(self) -> u8 {
        self.0 / 10
    }

    /// Position within the quadrant, counted from the midline (1-8).
    pub fn position(self) -> u8 {
        self.0 % 10
    }

    pub fn arch(self) -> Arch {
        if self.0 <= 28 {
            Arch::Maxillary
        } else {
            Arch::Mandibular
        }
    }

    pub fn side(self) -> Side {
        match self.quadrant() {
            1 | 4 => Side::Right,
            _ => Side::Left,
        }
    }

    pub fn class(self) -> ToothClass {
        match self.position() {
            1..=3 => ToothClass::Anterior,
            4 | 5 => ToothClass::Premolar,
            _ => ToothClass::Molar,
        }
    }

    /// All 32 permanent teeth in chart order: upper row then lower row.
    pub fn all() -> impl Iterator<Item = ToothNumber> {
        UPPER_RIGHT
            .iter()
            .chain(UPPER_LEFT.iter())
            .chain(LOWER_RIGHT.iter())
            .chain(LOWER_LEFT.iter())
            .map(|&n| ToothNumber(n))
    }
}

impl TryFrom<u8> for ToothNumber {
    type Error = ChartError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ToothNumber> for u8 {
    fn from(tooth: ToothNumber) -> Self {
        tooth.0
    }
}

impl fmt::Display for ToothNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tooth surface on which periodontal sites are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Vestibular,
    Lingual,
}

impl Surface {
    pub const ALL: [Surface; 2] = [Surface::Vestibular, Surface::Lingual];
}

/// Probing site along a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Mesial,
    Central,
    Distal,
}

impl Site {
    /// Sites in drawing order.
    pub const ALL: [Site; 3] = [Site::Mesial, Site::Central, Site::Distal];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_numbers() {
        for n in [11, 18, 21, 28, 31, 38, 41, 48] {
            assert!(ToothNumber::new(n).is_ok(), "{} should be valid", n);
        }
    }

    #[test]
    fn test_invalid_numbers() {
        for n in [0, 10, 19, 20, 29, 49, 51, 99] {
            assert_eq!(ToothNumber::new(n), Err(ChartError::InvalidTooth(n)));
        }
    }

    #[test]
    fn test_arch_and_side() {
        let t18 = ToothNumber::new(18).unwrap();
        assert_eq!(t18.arch(), Arch::Maxillary);
        assert_eq!(t18.side(), Side::Right);

        let t28 = ToothNumber::new(28).unwrap();
        assert_eq!(t28.arch(), Arch::Maxillary);
        assert_eq!(t28.side(), Side::Left);

        let t31 = ToothNumber::new(31).unwrap();
        assert_eq!(t31.arch(), Arch::Mandibular);
        assert_eq!(t31.side(), Side::Left);

        let t46 = ToothNumber::new(46).unwrap();
        assert_eq!(t46.arch(), Arch::Mandibular);
        assert_eq!(t46.side(), Side::Right);
    }

    #[test]
    fn test_class_lookup() {
        assert_eq!(ToothNumber::new(11).unwrap().class(), ToothClass::Anterior);
        assert_eq!(ToothNumber::new(13).unwrap().class(), ToothClass::Anterior);
        assert_eq!(ToothNumber::new(24).unwrap().class(), ToothClass::Premolar);
        assert_eq!(ToothNumber::new(35).unwrap().class(), ToothClass::Premolar);
        assert_eq!(ToothNumber::new(46).unwrap().class(), ToothClass::Molar);
        assert_eq!(ToothNumber::new(18).unwrap().class(), ToothClass::Molar);
    }

    #[test]
    fn test_all_teeth() {
        let all: Vec<_> = ToothNumber::all().collect();
        assert_eq!(all.len(), 32);
        assert_eq!(all[0].number(), 18);
        assert_eq!(all[31].number(), 38);
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let tooth: ToothNumber = serde_json::from_str("36").unwrap();
        assert_eq!(tooth.number(), 36);
        assert!(serde_json::from_str::<ToothNumber>("60").is_err());
    }
}
