//! Conversions between field elements and the string encodings that cross the
//! pipeline's boundaries: base-10 integer strings (the circuit input format)
//! and big-endian hex strings (the credential wire format).
//!
//! Every decoding direction is range-checked against the field modulus. A
//! value outside `[0, r)` is rejected rather than silently reduced: a record
//! whose in-circuit value differs from its true value must never be produced.

use ark_ff::PrimeField;
use num_bigint::BigUint;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("value is not a base-10 non-negative integer: {0:?}")]
    NotDecimal(String),
    #[error("value is not valid hex: {0:?}")]
    NotHex(String),
    #[error("value {value} does not fit in the field (modulus {modulus})")]
    OutOfRange { value: String, modulus: String },
}

/// The field modulus as an arbitrary-precision integer.
pub fn modulus<F: PrimeField>() -> BigUint {
    F::MODULUS.into()
}

/// Parse a base-10 non-negative integer string into a field element,
/// rejecting anything `>= r`.
pub fn field_from_decimal<F: PrimeField>(s: &str) -> Result<F, EncodingError> {
    let n = s
        .parse::<BigUint>()
        .map_err(|_| EncodingError::NotDecimal(s.to_string()))?;
    biguint_to_field(&n)
}

/// Range-checked conversion from an arbitrary-precision integer.
pub fn biguint_to_field<F: PrimeField>(n: &BigUint) -> Result<F, EncodingError> {
    let r = modulus::<F>();
    if *n >= r {
        return Err(EncodingError::OutOfRange {
            value: n.to_string(),
            modulus: r.to_string(),
        });
    }
    Ok(F::from_le_bytes_mod_order(&n.to_bytes_le()))
}

/// Emit a field element as a base-10 integer string.
pub fn field_to_decimal<F: PrimeField>(x: &F) -> String {
    field_to_biguint(x).to_string()
}

pub fn field_to_biguint<F: PrimeField>(x: &F) -> BigUint {
    x.into_bigint().into()
}

/// Parse a big-endian hex string (the credential wire encoding of public key
/// coordinates) into a field element.
pub fn field_from_hex_be<F: PrimeField>(s: &str) -> Result<F, EncodingError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|_| EncodingError::NotHex(s.to_string()))?;
    biguint_to_field(&BigUint::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScalarField;
    use ark_std::UniformRand;
    use num_bigint::BigUint;
    use num_traits::One;
    use proptest::prelude::*;

    #[test]
    fn modulus_is_rejected() {
        let r = modulus::<ScalarField>();
        let err = biguint_to_field::<ScalarField>(&r);
        assert!(matches!(err, Err(EncodingError::OutOfRange { .. })));
        let err = field_from_decimal::<ScalarField>(&r.to_string());
        assert!(matches!(err, Err(EncodingError::OutOfRange { .. })));
    }

    #[test]
    fn modulus_minus_one_is_accepted() {
        let r = modulus::<ScalarField>() - BigUint::one();
        let x: ScalarField = biguint_to_field(&r).unwrap();
        assert_eq!(field_to_biguint(&x), r);
    }

    #[test]
    fn negative_is_rejected() {
        assert!(matches!(
            field_from_decimal::<ScalarField>("-1"),
            Err(EncodingError::NotDecimal(_))
        ));
    }

    #[test]
    fn hex_matches_decimal() {
        let x: ScalarField =
            field_from_hex_be("0f183dcba06341a4549d78c3f8ca0060a9d6aca795103cb6957d1e2973b5fdeb")
                .unwrap();
        assert_eq!(
            field_to_decimal(&x),
            "6827523554590803092735941342538027861463307969735104848636744652918854385131"
        );
    }

    // Check that Fr -> String -> Fr is the identity function.
    proptest! {
        #[test]
        fn test_round_trip_decimal(
            x in prop::strategy::Just(ScalarField::rand(&mut ark_std::rand::thread_rng()))
        ) {
            let s = field_to_decimal(&x);
            let y: ScalarField = field_from_decimal(&s).unwrap();
            prop_assert_eq!(x, y);
        }
    }
}
