// SPDX-License-Identifier: MIT

//! Unit definition (Section 6.2.2.7). A unit is a `u32` Report Descriptor
//! value consisting of 7 nibbles. The low nibble defines the unit system, the
//! remaining 6 nibbles contain the exponents in the range `-8..=7` for length,
//! mass, time, temperature, current and luminous intensity, in that order.
//!
//! ```
//! # use hidtrack::unit::*;
//! // cm/s^2
//! let acceleration = Unit::new(UnitSystem::SiLinear)
//!     .with_exponent(UnitKind::Length, 1).unwrap()
//!     .with_exponent(UnitKind::Time, -2).unwrap();
//! assert_eq!(acceleration.raw(), 0xE011);
//! assert_eq!(acceleration.to_string(), "cm s^-2");
//! ```

use crate::{ensure, HidError, Result};

/// Decodes a 4-bit exponent nibble into the range `-8..=7`. Values 8..=15
/// map to `value - 16`.
///
/// Returns [HidError::OutOfRange] if `nibble` is not in `0..=15`.
pub fn decode_exponent(nibble: u32) -> Result<i32> {
    ensure!(
        nibble <= 0xF,
        HidError::OutOfRange {
            value: i64::from(nibble),
            min: 0,
            max: 15,
        }
    );
    let v = nibble as i32;
    Ok(if v >= 8 { v - 16 } else { v })
}

/// Encodes an exponent in the range `-8..=7` into a 4-bit nibble. This is the
/// inverse of [decode_exponent].
///
/// Returns [HidError::OutOfRange] if `exponent` is not in `-8..=7`.
pub fn encode_exponent(exponent: i32) -> Result<u32> {
    ensure!(
        (-8..=7).contains(&exponent),
        HidError::OutOfRange {
            value: i64::from(exponent),
            min: -8,
            max: 7,
        }
    );
    Ok((exponent & 0xF) as u32)
}

/// The unit system, the low nibble of a [Unit].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitSystem {
    None,
    SiLinear,
    SiRotation,
    EnglishLinear,
    EnglishRotation,
    /// Reserved (5..=14) or vendor-defined (15) systems.
    Other(u8),
}

impl From<u8> for UnitSystem {
    fn from(v: u8) -> UnitSystem {
        match v & 0xF {
            0 => UnitSystem::None,
            1 => UnitSystem::SiLinear,
            2 => UnitSystem::SiRotation,
            3 => UnitSystem::EnglishLinear,
            4 => UnitSystem::EnglishRotation,
            n => UnitSystem::Other(n),
        }
    }
}

impl From<UnitSystem> for u8 {
    fn from(s: UnitSystem) -> u8 {
        match s {
            UnitSystem::None => 0,
            UnitSystem::SiLinear => 1,
            UnitSystem::SiRotation => 2,
            UnitSystem::EnglishLinear => 3,
            UnitSystem::EnglishRotation => 4,
            UnitSystem::Other(n) => n & 0xF,
        }
    }
}

/// One of the six dimensions carried by a [Unit]. The discriminant is the
/// nibble index inside the unit value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnitKind {
    Length = 1,
    Mass = 2,
    Time = 3,
    Temperature = 4,
    Current = 5,
    LuminousIntensity = 6,
}

impl UnitKind {
    pub const ALL: [UnitKind; 6] = [
        UnitKind::Length,
        UnitKind::Mass,
        UnitKind::Time,
        UnitKind::Temperature,
        UnitKind::Current,
        UnitKind::LuminousIntensity,
    ];

    fn shift(self) -> u32 {
        u32::from(self as u8) * 4
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthUnit {
    None,
    Centimeter,
    Radians,
    Inch,
    Degrees,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MassUnit {
    None,
    Gram,
    Slug,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    None,
    Seconds,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemperatureUnit {
    None,
    Kelvin,
    Fahrenheit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurrentUnit {
    None,
    Ampere,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LuminousIntensityUnit {
    None,
    Candela,
}

/// A packed HID unit value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Unit(u32);

impl Unit {
    /// A unit in the given system with all exponents zero.
    pub fn new(system: UnitSystem) -> Self {
        Unit(u32::from(u8::from(system)))
    }

    /// Wraps the raw descriptor value.
    pub fn from_raw(raw: u32) -> Self {
        Unit(raw)
    }

    /// The raw descriptor value.
    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn system(&self) -> UnitSystem {
        UnitSystem::from((self.0 & 0xF) as u8)
    }

    pub fn with_system(self, system: UnitSystem) -> Self {
        Unit((self.0 & !0xF) | u32::from(u8::from(system)))
    }

    /// The exponent of the given dimension in the range `-8..=7`.
    pub fn exponent(&self, kind: UnitKind) -> i32 {
        let nibble = (self.0 >> kind.shift()) & 0xF;
        if nibble >= 8 {
            nibble as i32 - 16
        } else {
            nibble as i32
        }
    }

    /// Returns a copy of this unit with the exponent of `kind` replaced.
    ///
    /// Returns [HidError::OutOfRange] if `exponent` is not in `-8..=7`.
    pub fn with_exponent(self, kind: UnitKind, exponent: i32) -> Result<Self> {
        let nibble = encode_exponent(exponent)?;
        let shift = kind.shift();
        Ok(Unit((self.0 & !(0xF << shift)) | (nibble << shift)))
    }

    pub fn length_unit(&self) -> LengthUnit {
        match self.system() {
            UnitSystem::SiLinear => LengthUnit::Centimeter,
            UnitSystem::SiRotation => LengthUnit::Radians,
            UnitSystem::EnglishLinear => LengthUnit::Inch,
            UnitSystem::EnglishRotation => LengthUnit::Degrees,
            _ => LengthUnit::None,
        }
    }

    pub fn mass_unit(&self) -> MassUnit {
        match self.system() {
            UnitSystem::SiLinear | UnitSystem::SiRotation => MassUnit::Gram,
            UnitSystem::EnglishLinear | UnitSystem::EnglishRotation => MassUnit::Slug,
            _ => MassUnit::None,
        }
    }

    pub fn time_unit(&self) -> TimeUnit {
        match self.system() {
            UnitSystem::None | UnitSystem::Other(_) => TimeUnit::None,
            _ => TimeUnit::Seconds,
        }
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        match self.system() {
            UnitSystem::SiLinear | UnitSystem::SiRotation => TemperatureUnit::Kelvin,
            UnitSystem::EnglishLinear | UnitSystem::EnglishRotation => TemperatureUnit::Fahrenheit,
            _ => TemperatureUnit::None,
        }
    }

    pub fn current_unit(&self) -> CurrentUnit {
        match self.system() {
            UnitSystem::None | UnitSystem::Other(_) => CurrentUnit::None,
            _ => CurrentUnit::Ampere,
        }
    }

    pub fn luminous_intensity_unit(&self) -> LuminousIntensityUnit {
        match self.system() {
            UnitSystem::None | UnitSystem::Other(_) => LuminousIntensityUnit::None,
            _ => LuminousIntensityUnit::Candela,
        }
    }

    /// Short symbol of the named unit for `kind` in this unit's system, if any.
    pub fn symbol(&self, kind: UnitKind) -> Option<&'static str> {
        let s = match kind {
            UnitKind::Length => match self.length_unit() {
                LengthUnit::None => return None,
                LengthUnit::Centimeter => "cm",
                LengthUnit::Radians => "rad",
                LengthUnit::Inch => "in",
                LengthUnit::Degrees => "deg",
            },
            UnitKind::Mass => match self.mass_unit() {
                MassUnit::None => return None,
                MassUnit::Gram => "g",
                MassUnit::Slug => "slug",
            },
            UnitKind::Time => match self.time_unit() {
                TimeUnit::None => return None,
                TimeUnit::Seconds => "s",
            },
            UnitKind::Temperature => match self.temperature_unit() {
                TemperatureUnit::None => return None,
                TemperatureUnit::Kelvin => "K",
                TemperatureUnit::Fahrenheit => "F",
            },
            UnitKind::Current => match self.current_unit() {
                CurrentUnit::None => return None,
                CurrentUnit::Ampere => "A",
            },
            UnitKind::LuminousIntensity => match self.luminous_intensity_unit() {
                LuminousIntensityUnit::None => return None,
                LuminousIntensityUnit::Candela => "cd",
            },
        };
        Some(s)
    }
}

impl From<u32> for Unit {
    fn from(raw: u32) -> Unit {
        Unit(raw)
    }
}

impl From<Unit> for u32 {
    fn from(unit: Unit) -> u32 {
        unit.0
    }
}

impl std::fmt::Display for Unit {
    /// Renders the dimensions with a non-zero exponent, e.g. `cm s^-2`.
    /// A unit without a known system renders as an empty string.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for kind in UnitKind::ALL {
            let exp = self.exponent(kind);
            let Some(symbol) = self.symbol(kind) else {
                continue;
            };
            if exp == 0 {
                continue;
            }
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if exp == 1 {
                write!(f, "{symbol}")?;
            } else {
                write!(f, "{symbol}^{exp}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponent_roundtrip() {
        for x in -8..=7 {
            assert_eq!(decode_exponent(encode_exponent(x).unwrap()).unwrap(), x);
        }
        assert_eq!(decode_exponent(15).unwrap(), -1);
        assert_eq!(decode_exponent(8).unwrap(), -8);
        assert_eq!(decode_exponent(7).unwrap(), 7);
    }

    #[test]
    fn exponent_out_of_range() {
        assert!(matches!(
            encode_exponent(8),
            Err(HidError::OutOfRange { value: 8, .. })
        ));
        assert!(encode_exponent(-9).is_err());
        assert!(decode_exponent(16).is_err());
    }

    #[test]
    fn nibbles() {
        // Seconds^-1 in SI Linear, e.g. a frequency
        let unit = Unit::from_raw(0xF001);
        assert_eq!(unit.system(), UnitSystem::SiLinear);
        assert_eq!(unit.exponent(UnitKind::Time), -1);
        assert_eq!(unit.exponent(UnitKind::Length), 0);
        assert_eq!(unit.to_string(), "s^-1");

        // Degrees, English Rotation
        let unit = Unit::from_raw(0x14);
        assert_eq!(unit.system(), UnitSystem::EnglishRotation);
        assert_eq!(unit.length_unit(), LengthUnit::Degrees);
        assert_eq!(unit.to_string(), "deg");
    }

    #[test]
    fn named_units() {
        let si = Unit::new(UnitSystem::SiLinear);
        assert_eq!(si.length_unit(), LengthUnit::Centimeter);
        assert_eq!(si.mass_unit(), MassUnit::Gram);
        assert_eq!(si.temperature_unit(), TemperatureUnit::Kelvin);
        assert_eq!(si.current_unit(), CurrentUnit::Ampere);

        let rot = Unit::new(UnitSystem::SiRotation);
        assert_eq!(rot.length_unit(), LengthUnit::Radians);

        let en = Unit::new(UnitSystem::EnglishLinear);
        assert_eq!(en.length_unit(), LengthUnit::Inch);
        assert_eq!(en.mass_unit(), MassUnit::Slug);
        assert_eq!(en.temperature_unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(en.time_unit(), TimeUnit::Seconds);
        assert_eq!(en.luminous_intensity_unit(), LuminousIntensityUnit::Candela);

        let none = Unit::default();
        assert_eq!(none.system(), UnitSystem::None);
        assert_eq!(none.length_unit(), LengthUnit::None);
        assert_eq!(none.time_unit(), TimeUnit::None);
        assert_eq!(none.symbol(UnitKind::Mass), None);
        assert_eq!(none.to_string(), "");
    }

    #[test]
    fn with_exponent() {
        let unit = Unit::new(UnitSystem::SiLinear)
            .with_exponent(UnitKind::Mass, 1)
            .unwrap()
            .with_exponent(UnitKind::Length, 2)
            .unwrap()
            .with_exponent(UnitKind::Time, -2)
            .unwrap();
        assert_eq!(unit.raw(), 0xE121);
        assert_eq!(unit.to_string(), "cm^2 g s^-2");

        let unit = unit.with_exponent(UnitKind::Time, 0).unwrap();
        assert_eq!(unit.raw(), 0x0121);
        assert!(unit.with_exponent(UnitKind::Current, 9).is_err());

        let unit = unit.with_system(UnitSystem::EnglishLinear);
        assert_eq!(unit.raw(), 0x0123);
    }
}
