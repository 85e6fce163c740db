//! Package measurements and unit normalization.
//!
//! The carrier API takes weight in whole grams and sides in whole
//! centimetres and rejects anything with a fractional part. Catalog data and
//! admin input arrive in whatever unit is convenient, so everything is
//! converted here and rounded **up**: a 0.2 cm thick envelope is sent as
//! 1 cm, a 1.25 kg box as 1250 g.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Lightest accepted package, in grams.
pub const MIN_WEIGHT_GRAMS: u32 = 1;
/// Heaviest accepted package, in grams.
pub const MAX_WEIGHT_GRAMS: u32 = 25_000;
/// Shortest accepted side, in centimetres.
pub const MIN_DIMENSION_CM: u32 = 1;
/// Longest accepted side, in centimetres.
pub const MAX_DIMENSION_CM: u32 = 150;

/// Unit a weight is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    #[serde(alias = "grams")]
    G,
    #[serde(alias = "kilograms")]
    Kg,
}

impl WeightUnit {
    const fn grams_per_unit(self) -> Decimal {
        match self {
            Self::G => Decimal::ONE,
            Self::Kg => Decimal::ONE_THOUSAND,
        }
    }
}

/// Unit a length is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[serde(alias = "millimeters")]
    Mm,
    #[default]
    #[serde(alias = "centimeters")]
    Cm,
    #[serde(alias = "meters")]
    M,
}

impl LengthUnit {
    /// `None` when the converted value does not fit a `Decimal`.
    fn to_cm(self, value: Decimal) -> Option<Decimal> {
        match self {
            Self::Mm => value.checked_div(Decimal::TEN),
            Self::Cm => Some(value),
            Self::M => value.checked_mul(Decimal::ONE_HUNDRED),
        }
    }
}

/// Package measurements as entered, in any supported unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInput {
    pub weight: Decimal,
    #[serde(default)]
    pub weight_unit: WeightUnit,
    pub height: Decimal,
    pub width: Decimal,
    pub length: Decimal,
    #[serde(default)]
    pub length_unit: LengthUnit,
}

impl PackageInput {
    /// Measurements already in grams and centimetres.
    #[must_use]
    pub fn grams_cm(weight: u32, height: u32, width: u32, length: u32) -> Self {
        Self {
            weight: Decimal::from(weight),
            weight_unit: WeightUnit::G,
            height: Decimal::from(height),
            width: Decimal::from(width),
            length: Decimal::from(length),
            length_unit: LengthUnit::Cm,
        }
    }

    /// Convert to integer grams/centimetres and check carrier bounds.
    ///
    /// # Errors
    ///
    /// Returns every unit or bound problem found, one message each.
    pub fn normalize(&self) -> Result<Package, Vec<String>> {
        let mut errors = Vec::new();

        let weight = ceil_to_u32(
            "weight",
            self.weight.checked_mul(self.weight_unit.grams_per_unit()),
            &mut errors,
        );
        let height = ceil_to_u32("height", self.length_unit.to_cm(self.height), &mut errors);
        let width = ceil_to_u32("width", self.length_unit.to_cm(self.width), &mut errors);
        let length = ceil_to_u32("length", self.length_unit.to_cm(self.length), &mut errors);

        // Bounds are meaningless for values that failed to convert
        if !errors.is_empty() {
            return Err(errors);
        }

        let package = Package {
            weight,
            height,
            width,
            length,
        };
        errors.extend(package.bound_errors());

        if errors.is_empty() {
            Ok(package)
        } else {
            Err(errors)
        }
    }
}

fn ceil_to_u32(field: &str, value: Option<Decimal>, errors: &mut Vec<String>) -> u32 {
    let Some(value) = value else {
        errors.push(format!("{field} is too large"));
        return 0;
    };
    if value.is_sign_negative() && !value.is_zero() {
        errors.push(format!("{field} cannot be negative"));
        return 0;
    }
    value.ceil().to_u32().unwrap_or_else(|| {
        errors.push(format!("{field} is too large"));
        0
    })
}

/// Package measurements in the carrier's units: whole grams and centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    /// Grams.
    pub weight: u32,
    /// Centimetres.
    pub height: u32,
    /// Centimetres.
    pub width: u32,
    /// Centimetres.
    pub length: u32,
}

impl Package {
    /// Problems with weight or side lengths, empty when the package is
    /// acceptable.
    #[must_use]
    pub fn bound_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(MIN_WEIGHT_GRAMS..=MAX_WEIGHT_GRAMS).contains(&self.weight) {
            errors.push(format!(
                "weight must be between {MIN_WEIGHT_GRAMS} and {MAX_WEIGHT_GRAMS} grams (got {})",
                self.weight
            ));
        }
        for (name, value) in [
            ("height", self.height),
            ("width", self.width),
            ("length", self.length),
        ] {
            if !(MIN_DIMENSION_CM..=MAX_DIMENSION_CM).contains(&value) {
                errors.push(format!(
                    "{name} must be between {MIN_DIMENSION_CM} and {MAX_DIMENSION_CM} cm (got {value})"
                ));
            }
        }
        errors
    }

    /// Check the carrier bounds.
    ///
    /// # Errors
    ///
    /// Returns every bound violation.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let errors = self.bound_errors();
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use rstest::rstest;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_fractions_round_up() {
        let input = PackageInput {
            weight: dec("1.2501"),
            weight_unit: WeightUnit::Kg,
            height: dec("0.2"),
            width: dec("10"),
            length: dec("10.01"),
            length_unit: LengthUnit::Cm,
        };
        let package = input.normalize().unwrap();
        assert_eq!(
            package,
            Package {
                weight: 1251,
                height: 1,
                width: 10,
                length: 11,
            }
        );
    }

    #[test]
    fn test_millimetres_and_metres() {
        let mm = PackageInput {
            length_unit: LengthUnit::Mm,
            ..PackageInput::grams_cm(500, 305, 200, 1)
        };
        let package = mm.normalize().unwrap();
        assert_eq!((package.height, package.width, package.length), (31, 20, 1));

        let m = PackageInput {
            height: dec("1.5"),
            width: dec("0.25"),
            length: dec("0.001"),
            length_unit: LengthUnit::M,
            ..PackageInput::grams_cm(500, 0, 0, 0)
        };
        let package = m.normalize().unwrap();
        assert_eq!((package.height, package.width, package.length), (150, 25, 1));
    }

    #[rstest]
    #[case(0)]
    #[case(25_001)]
    #[case(100_000)]
    fn test_weight_out_of_range_rejected(#[case] grams: u32) {
        let errors = PackageInput::grams_cm(grams, 10, 10, 10)
            .normalize()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("weight must be between 1 and 25000 grams"));
    }

    #[rstest]
    #[case(1)]
    #[case(25_000)]
    fn test_weight_bounds_inclusive(#[case] grams: u32) {
        assert!(PackageInput::grams_cm(grams, 10, 10, 10).normalize().is_ok());
    }

    #[rstest]
    #[case(151, 10, 10, "height")]
    #[case(10, 151, 10, "width")]
    #[case(10, 10, 151, "length")]
    fn test_dimension_over_150_rejected(
        #[case] height: u32,
        #[case] width: u32,
        #[case] length: u32,
        #[case] field: &str,
    ) {
        let errors = PackageInput::grams_cm(1000, height, width, length)
            .normalize()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with(field));
    }

    #[test]
    fn test_150cm_is_allowed() {
        assert!(PackageInput::grams_cm(1000, 150, 150, 150).normalize().is_ok());
    }

    #[test]
    fn test_metres_just_over_limit_rejected() {
        let input = PackageInput {
            weight: Decimal::ONE_THOUSAND,
            weight_unit: WeightUnit::G,
            height: dec("0.1"),
            width: dec("0.1"),
            length: dec("1.501"),
            length_unit: LengthUnit::M,
        };
        let errors = input.normalize().unwrap_err();
        assert_eq!(errors, vec!["length must be between 1 and 150 cm (got 151)"]);
    }

    #[test]
    fn test_negative_values_reported() {
        let input = PackageInput {
            weight: dec("-1"),
            ..PackageInput::grams_cm(0, 10, 10, 10)
        };
        let errors = input.normalize().unwrap_err();
        assert!(errors.iter().any(|e| e == "weight cannot be negative"));
    }

    #[rstest]
    #[case(WeightUnit::Kg, LengthUnit::Cm, "weight is too large")]
    #[case(WeightUnit::G, LengthUnit::M, "height is too large")]
    fn test_overflowing_conversion_is_a_validation_error(
        #[case] weight_unit: WeightUnit,
        #[case] length_unit: LengthUnit,
        #[case] expected: &str,
    ) {
        let mut input = PackageInput {
            weight_unit,
            length_unit,
            ..PackageInput::grams_cm(1000, 1, 1, 1)
        };
        match weight_unit {
            WeightUnit::Kg => input.weight = Decimal::MAX,
            WeightUnit::G => input.height = Decimal::MAX,
        }

        let errors = input.normalize().unwrap_err();
        assert_eq!(errors, vec![expected.to_string()]);
    }

    #[test]
    fn test_huge_grams_reported_once() {
        let input = PackageInput {
            weight: Decimal::MAX,
            ..PackageInput::grams_cm(0, 10, 10, 10)
        };
        assert_eq!(input.normalize().unwrap_err(), vec!["weight is too large"]);
    }

    #[test]
    fn test_all_violations_reported_together() {
        let errors = PackageInput::grams_cm(30_000, 200, 0, 151)
            .normalize()
            .unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_deserialize_defaults_to_grams_and_cm() {
        let input: PackageInput =
            serde_json::from_str(r#"{"weight": 1.5, "weightUnit": "kg", "height": 10, "width": 20, "length": 30}"#)
                .unwrap();
        assert_eq!(input.length_unit, LengthUnit::Cm);
        assert_eq!(input.normalize().unwrap().weight, 1500);
    }
}
