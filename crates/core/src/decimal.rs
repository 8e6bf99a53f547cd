//! Exact decimal codecs.
//!
//! Two wire encodings are supported:
//!
//! - [`DecimalWire`]: plain decimal string plus scale. Precision preserving,
//!   used off the hot path.
//! - [`Money`]: fixed-point `(units, nanos)` with at most 9 fractional digits,
//!   used where string parsing would be too costly.
//!
//! Neither direction ever rounds. Anything that cannot be represented exactly
//! is rejected with a [`CodecError`].

use serde::{Deserialize, Serialize};

pub use rust_decimal::Decimal;

use crate::error::CodecError;

/// Fractional digits carried by `Money::nanos`.
pub const NANOS_SCALE: u32 = 9;
const NANOS_PER_UNIT: u128 = 1_000_000_000;

/// String-based decimal wire form. An empty `value` means "absent".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalWire {
    pub value: String,
    pub scale: i32,
}

impl DecimalWire {
    pub fn absent() -> Self {
        Self {
            value: String::new(),
            scale: 0,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_empty()
    }
}

/// Fixed-point money wire form.
///
/// Invariants: `|nanos| < 1e9`, and `units`/`nanos` never carry opposite signs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub currency_code: String,
    pub units: i64,
    pub nanos: i32,
}

impl Money {
    pub fn from_decimal(currency_code: impl Into<String>, value: Decimal) -> Result<Self, CodecError> {
        decimal_to_money(currency_code, value)
    }

    pub fn to_decimal(&self) -> Result<Decimal, CodecError> {
        money_to_decimal(&self.currency_code, self.units, self.nanos)
    }
}

/// Encode a decimal as its plain string form and scale.
pub fn decimal_to_wire(value: Decimal) -> DecimalWire {
    DecimalWire {
        value: value.to_string(),
        scale: value.scale() as i32,
    }
}

/// Decode a [`DecimalWire`]. An empty string decodes to `None`, not zero.
///
/// The string is authoritative: the declared `scale` is informational, since
/// other encoders may emit a negative scale for integral values.
pub fn wire_to_decimal(wire: &DecimalWire) -> Result<Option<Decimal>, CodecError> {
    if wire.is_absent() {
        return Ok(None);
    }
    Decimal::from_str_exact(&wire.value)
        .map(Some)
        .map_err(|e| CodecError::InvalidDecimal(format!("`{}`: {e}", wire.value)))
}

/// Convert a decimal to fixed-point money without rounding.
///
/// Trailing zeros are trimmed first, so `1.2300000000` is accepted and encodes
/// exactly like `1.23`.
pub fn decimal_to_money(currency_code: impl Into<String>, value: Decimal) -> Result<Money, CodecError> {
    let currency_code = non_empty_currency(currency_code.into())?;

    let normalized = value.normalize();
    if normalized.scale() > NANOS_SCALE {
        return Err(CodecError::PrecisionOverflow {
            scale: normalized.scale(),
        });
    }

    if normalized.is_zero() {
        return Ok(Money {
            currency_code,
            units: 0,
            nanos: 0,
        });
    }

    let magnitude = normalized.mantissa().unsigned_abs() * 10u128.pow(NANOS_SCALE - normalized.scale());
    let units_abs = i64::try_from(magnitude / NANOS_PER_UNIT).map_err(|_| CodecError::UnitsOutOfRange)?;
    // Remainder of a division by 1e9 always fits in i32.
    let nanos_abs = (magnitude % NANOS_PER_UNIT) as i32;

    let (units, nanos) = if normalized.is_sign_negative() {
        (-units_abs, -nanos_abs)
    } else {
        (units_abs, nanos_abs)
    };

    Ok(Money {
        currency_code,
        units,
        nanos,
    })
}

/// Exact inverse of [`decimal_to_money`]. The result has trailing zeros trimmed.
pub fn money_to_decimal(currency_code: &str, units: i64, nanos: i32) -> Result<Decimal, CodecError> {
    if currency_code.trim().is_empty() {
        return Err(CodecError::EmptyCurrency);
    }
    if i64::from(nanos).unsigned_abs() >= NANOS_PER_UNIT as u64 {
        return Err(CodecError::MalformedMoney(format!("nanos out of range: {nanos}")));
    }
    if units > 0 && nanos < 0 {
        return Err(CodecError::MalformedMoney("inconsistent sign: units>0 but nanos<0".into()));
    }
    if units < 0 && nanos > 0 {
        return Err(CodecError::MalformedMoney("inconsistent sign: units<0 but nanos>0".into()));
    }

    if units == 0 && nanos == 0 {
        return Ok(Decimal::ZERO);
    }

    let unscaled = i128::from(units) * NANOS_PER_UNIT as i128 + i128::from(nanos);
    Decimal::try_from_i128_with_scale(unscaled, NANOS_SCALE)
        .map(|d| d.normalize())
        .map_err(|_| CodecError::UnitsOutOfRange)
}

fn non_empty_currency(code: String) -> Result<String, CodecError> {
    if code.trim().is_empty() {
        Err(CodecError::EmptyCurrency)
    } else {
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn splits_units_and_nanos() {
        let m = decimal_to_money("USD", dec!(12.345)).unwrap();
        assert_eq!((m.units, m.nanos), (12, 345_000_000));

        let neg = decimal_to_money("USD", dec!(-0.5)).unwrap();
        assert_eq!((neg.units, neg.nanos), (0, -500_000_000));

        let neg_mixed = decimal_to_money("USD", dec!(-3.000000001)).unwrap();
        assert_eq!((neg_mixed.units, neg_mixed.nanos), (-3, -1));
    }

    #[test]
    fn rejects_more_than_nine_fractional_digits() {
        let err = decimal_to_money("USD", d("0.0000000001")).unwrap_err();
        assert_eq!(err, CodecError::PrecisionOverflow { scale: 10 });
    }

    #[test]
    fn trailing_zeros_do_not_count_against_precision() {
        let padded = decimal_to_money("USD", d("1.2300000000")).unwrap();
        let trimmed = decimal_to_money("USD", d("1.23")).unwrap();
        assert_eq!(padded, trimmed);
    }

    #[test]
    fn zero_is_canonical_in_both_directions() {
        for zero in ["0", "-0", "0.000", "-0.0000000000000"] {
            let m = decimal_to_money("EUR", d(zero)).unwrap();
            assert_eq!((m.units, m.nanos), (0, 0), "{zero}");
        }
        let back = money_to_decimal("EUR", 0, 0).unwrap();
        assert!(back.is_zero());
        assert!(!back.is_sign_negative());
    }

    #[test]
    fn rejects_sign_conflicts_and_out_of_range_nanos() {
        assert!(matches!(
            money_to_decimal("USD", 1, -500_000_000),
            Err(CodecError::MalformedMoney(_))
        ));
        assert!(matches!(
            money_to_decimal("USD", -1, 1),
            Err(CodecError::MalformedMoney(_))
        ));
        assert!(matches!(
            money_to_decimal("USD", 0, 1_000_000_000),
            Err(CodecError::MalformedMoney(_))
        ));
        assert!(matches!(
            money_to_decimal("USD", 0, -1_000_000_000),
            Err(CodecError::MalformedMoney(_))
        ));
        // Zero units may pair with either nanos sign.
        assert_eq!(money_to_decimal("USD", 0, -250_000_000).unwrap(), dec!(-0.25));
    }

    #[test]
    fn currency_must_be_present() {
        assert_eq!(decimal_to_money("", dec!(1)).unwrap_err(), CodecError::EmptyCurrency);
        assert_eq!(decimal_to_money("  ", dec!(1)).unwrap_err(), CodecError::EmptyCurrency);
        assert_eq!(money_to_decimal("", 1, 0).unwrap_err(), CodecError::EmptyCurrency);
    }

    #[test]
    fn integral_part_beyond_i64_is_rejected() {
        let huge = d("100000000000000000000");
        assert_eq!(decimal_to_money("USD", huge).unwrap_err(), CodecError::UnitsOutOfRange);
    }

    #[test]
    fn decimal_wire_is_plain_and_keeps_scale() {
        let wire = decimal_to_wire(d("1500.250"));
        assert_eq!(wire.value, "1500.250");
        assert_eq!(wire.scale, 3);
        assert_eq!(wire_to_decimal(&wire).unwrap(), Some(d("1500.250")));
    }

    #[test]
    fn empty_decimal_wire_is_absent_not_zero() {
        assert_eq!(wire_to_decimal(&DecimalWire::absent()).unwrap(), None);
    }

    #[test]
    fn scientific_notation_is_not_a_plain_decimal() {
        let wire = DecimalWire {
            value: "1e5".to_string(),
            scale: 0,
        };
        assert!(matches!(wire_to_decimal(&wire), Err(CodecError::InvalidDecimal(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: any decimal with at most 9 fractional digits survives
        /// decimal -> money -> decimal unchanged.
        #[test]
        fn money_round_trip_is_exact(
            mantissa in -9_000_000_000_000_000_000i128..9_000_000_000_000_000_000i128,
            scale in 0u32..=9,
        ) {
            let value = Decimal::from_i128_with_scale(mantissa, scale);
            let money = decimal_to_money("USD", value).unwrap();
            prop_assert!(money.nanos.unsigned_abs() < 1_000_000_000);
            prop_assert!(!(money.units > 0 && money.nanos < 0));
            prop_assert!(!(money.units < 0 && money.nanos > 0));
            let back = money.to_decimal().unwrap();
            prop_assert_eq!(back, value);
        }
    }
}
