//! EdDSA over Baby Jubjub, the embedded curve of BN254.
//!
//! Credentials carry a 64-byte packed signature: a compressed curve point R8
//! (32 bytes, little-endian y with the top bit encoding the sign of x)
//! followed by a little-endian scalar S. The circuit consumes the three
//! unpacked values (R8x, R8y, S) as separate field elements, so unpacking is
//! part of the credential parsing protocol, not an implementation detail.
//!
//! Signing exists so that test fixtures and the demo issuer can mint
//! credentials; verification is what the folding step relation runs per
//! record.

use ark_ec::{twisted_edwards::TECurveConfig, CurveGroup};
use ark_ed_on_bn254::EdwardsConfig;
use ark_ff::{BigInteger, Field, PrimeField};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::{
    encoding, poseidon, EmbeddedCurve, EmbeddedProjectiveCurve, EmbeddedScalarField, ScalarField,
};

/// The prime-order subgroup generator (circomlib's `Base8`).
pub static BASE_POINT: Lazy<EmbeddedCurve> = Lazy::new(|| {
    let x = encoding::field_from_decimal(
        "5299619240641551281634865583518297030282874472190772894086521144482721001553",
    )
    .expect("base point x is a field element");
    let y = encoding::field_from_decimal(
        "16950150798460657717958625567821834550301663161624707787222815936182638968203",
    )
    .expect("base point y is a field element");
    EmbeddedCurve::new_unchecked(x, y)
});

pub const PACKED_SIGNATURE_LENGTH: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("packed signature must be {PACKED_SIGNATURE_LENGTH} bytes, got {0}")]
    UnexpectedLength(usize),
    #[error("R8 does not decompress to a point on the curve")]
    PointNotOnCurve,
    #[error("point is not in the prime-order subgroup")]
    PointNotInSubgroup,
    #[error("S is not a canonical subgroup scalar")]
    NonCanonicalScalar,
    #[error("signature equation does not hold")]
    Rejected,
}

/// An unpacked signature: a curve point and a subgroup scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r8: EmbeddedCurve,
    pub s: EmbeddedScalarField,
}

#[derive(Debug, Clone, Copy)]
pub struct SigningKey {
    secret: EmbeddedScalarField,
    public: EmbeddedCurve,
}

impl SigningKey {
    pub fn from_secret(secret: EmbeddedScalarField) -> Self {
        let public = (EmbeddedProjectiveCurve::from(*BASE_POINT) * secret).into_affine();
        Self { secret, public }
    }

    pub fn random<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        let secret = EmbeddedScalarField::from_le_bytes_mod_order(&rng.gen::<[u8; 32]>());
        Self::from_secret(secret)
    }

    pub fn public(&self) -> EmbeddedCurve {
        self.public
    }

    pub fn secret(&self) -> EmbeddedScalarField {
        self.secret
    }

    /// Sign a message hash. The nonce is derived deterministically from the
    /// secret key and the message, so signing never needs an RNG.
    #[allow(non_snake_case)]
    pub fn sign(&self, message: ScalarField) -> Signature {
        let r = {
            let mut hasher = Sha512::new();
            hasher.update(self.secret.into_bigint().to_bytes_le());
            hasher.update(message.into_bigint().to_bytes_le());
            EmbeddedScalarField::from_le_bytes_mod_order(&hasher.finalize())
        };
        let R = (EmbeddedProjectiveCurve::from(*BASE_POINT) * r).into_affine();
        let h = challenge(&R, &self.public, message);
        let s = r + h * self.secret;
        Signature { r8: R, s }
    }
}

/// h = H(R8x, R8y, Ax, Ay, M), reduced into the subgroup scalar field.
fn challenge(r8: &EmbeddedCurve, public: &EmbeddedCurve, message: ScalarField) -> EmbeddedScalarField {
    let digest = poseidon::hash(&[r8.x, r8.y, public.x, public.y, message]);
    EmbeddedScalarField::from_le_bytes_mod_order(&digest.into_bigint().to_bytes_le())
}

/// Check `S * B == R8 + h * A`. The public key and R8 must already be
/// validated subgroup points (see [validate_point]).
#[allow(non_snake_case)]
pub fn verify(
    signature: &Signature,
    public: &EmbeddedCurve,
    message: ScalarField,
) -> Result<(), SignatureError> {
    validate_point(public)?;
    validate_point(&signature.r8)?;
    let h = challenge(&signature.r8, public, message);
    let P1 = EmbeddedProjectiveCurve::from(*BASE_POINT) * signature.s;
    let P2 = EmbeddedProjectiveCurve::from(signature.r8) + EmbeddedProjectiveCurve::from(*public) * h;
    if P1 == P2 {
        Ok(())
    } else {
        Err(SignatureError::Rejected)
    }
}

pub fn validate_point(point: &EmbeddedCurve) -> Result<(), SignatureError> {
    if !point.is_on_curve() {
        return Err(SignatureError::PointNotOnCurve);
    }
    if !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(SignatureError::PointNotInSubgroup);
    }
    Ok(())
}

/// Decode the 64-byte packed wire form into its point and scalar.
pub fn unpack_signature(bytes: &[u8]) -> Result<Signature, SignatureError> {
    if bytes.len() != PACKED_SIGNATURE_LENGTH {
        return Err(SignatureError::UnexpectedLength(bytes.len()));
    }
    let r8 = unpack_point(bytes[..32].try_into().expect("length checked"))?;
    let s = {
        let n = num_bigint::BigUint::from_bytes_le(&bytes[32..]);
        encoding::biguint_to_field(&n).map_err(|_| SignatureError::NonCanonicalScalar)?
    };
    Ok(Signature { r8, s })
}

pub fn pack_signature(signature: &Signature) -> [u8; PACKED_SIGNATURE_LENGTH] {
    let mut out = [0u8; PACKED_SIGNATURE_LENGTH];
    out[..32].copy_from_slice(&pack_point(&signature.r8));
    let s = signature.s.into_bigint().to_bytes_le();
    out[32..32 + s.len()].copy_from_slice(&s);
    out
}

/// Decompress a point from 32 little-endian bytes of y, the top bit giving
/// the sign of x. Solves `x^2 = (1 - y^2) / (a - d y^2)` and picks the root
/// matching the sign bit.
pub fn unpack_point(bytes: [u8; 32]) -> Result<EmbeddedCurve, SignatureError> {
    let x_is_negative = bytes[31] & 0x80 != 0;
    let mut y_bytes = bytes;
    y_bytes[31] &= 0x7f;
    let y: ScalarField = {
        let n = num_bigint::BigUint::from_bytes_le(&y_bytes);
        encoding::biguint_to_field(&n).map_err(|_| SignatureError::PointNotOnCurve)?
    };

    let y2 = y.square();
    let denominator = EdwardsConfig::COEFF_A - EdwardsConfig::COEFF_D * y2;
    let x2 = (ScalarField::ONE - y2)
        * denominator
            .inverse()
            .ok_or(SignatureError::PointNotOnCurve)?;
    let mut x = x2.sqrt().ok_or(SignatureError::PointNotOnCurve)?;
    if is_negative(&x) != x_is_negative {
        x = -x;
    }

    let point = EmbeddedCurve::new_unchecked(x, y);
    validate_point(&point)?;
    Ok(point)
}

pub fn pack_point(point: &EmbeddedCurve) -> [u8; 32] {
    let mut out = [0u8; 32];
    let y = point.y.into_bigint().to_bytes_le();
    out[..y.len()].copy_from_slice(&y);
    if is_negative(&point.x) {
        out[31] |= 0x80;
    }
    out
}

/// A coordinate is "negative" when it exceeds (p - 1) / 2, matching the
/// packing convention of the upstream wire format.
fn is_negative(x: &ScalarField) -> bool {
    x.into_bigint() > ScalarField::MODULUS_MINUS_ONE_DIV_TWO
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(42)
    }

    #[test]
    fn base_point_is_in_subgroup() {
        assert!(validate_point(&BASE_POINT).is_ok());
    }

    #[test]
    fn sign_verify_round_trip() {
        let key = SigningKey::random(&mut test_rng());
        let message = ScalarField::from(123456789u64);
        let signature = key.sign(message);
        assert!(verify(&signature, &key.public(), message).is_ok());
    }

    #[test]
    fn wrong_message_is_rejected() {
        let key = SigningKey::random(&mut test_rng());
        let signature = key.sign(ScalarField::from(1u64));
        assert_eq!(
            verify(&signature, &key.public(), ScalarField::from(2u64)),
            Err(SignatureError::Rejected)
        );
    }

    #[test]
    fn wrong_key_is_rejected() {
        let mut rng = test_rng();
        let key = SigningKey::random(&mut rng);
        let other = SigningKey::random(&mut rng);
        let message = ScalarField::from(7u64);
        let signature = key.sign(message);
        assert_eq!(
            verify(&signature, &other.public(), message),
            Err(SignatureError::Rejected)
        );
    }

    #[test]
    fn pack_unpack_round_trip() {
        let key = SigningKey::random(&mut test_rng());
        let signature = key.sign(ScalarField::from(99u64));
        let packed = pack_signature(&signature);
        let unpacked = unpack_signature(&packed).unwrap();
        assert_eq!(signature, unpacked);
    }

    #[test]
    fn short_signature_is_rejected() {
        assert_eq!(
            unpack_signature(&[0u8; 63]),
            Err(SignatureError::UnexpectedLength(63))
        );
    }

    // Packed signature taken from a production frog credential; the expected
    // decimal components were computed independently.
    #[test]
    fn unpack_known_vector() {
        let packed = hex::decode(
            "8995c19660f59f320dfcdb4584736081aa3a89da9499bec5854e431937d05409\
             30e1d1cb61db826e1a1a9b1a938ab016543ba6809f9a08b1dd4a56b71701ca04",
        )
        .unwrap();
        let signature = unpack_signature(&packed).unwrap();
        assert_eq!(
            crate::encoding::field_to_decimal(&signature.r8.x),
            "3905193423010470989125634343912498114238974029402349774171177533113727872021"
        );
        assert_eq!(
            crate::encoding::field_to_decimal(&signature.r8.y),
            "4220667839388476583517614235006410826454621394498244403361240346004021155209"
        );
        assert_eq!(
            crate::encoding::field_to_decimal(&signature.s),
            "2166162042551067351421606700226595766359806346872972800506681888202929856816"
        );
        // and re-packing reproduces the wire bytes
        assert_eq!(pack_signature(&signature).to_vec(), packed);
    }
}
