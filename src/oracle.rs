//! Exact reference path for the limb product.
//!
//! Plain arbitrary precision multiply, shift and mask. This is the oracle
//! the verification harness trusts; it shares nothing with the fma kernel.

use crate::{consts, Limb, LimbPair};
use equator::assert;
use num_bigint::BigUint;
use num_traits::ToPrimitive;

/// Exact high and low 51-bit slices of `a * b`.
///
/// The high slice is a full shift, not masked: a product of two 51-bit
/// operands leaves at most 51 bits above bit 51, so it always fits a limb.
pub fn wide_mul(a: Limb, b: Limb) -> LimbPair {
    assert!(all(a <= consts::LIMB_MASK, b <= consts::LIMB_MASK));

    let product = BigUint::from(a) * BigUint::from(b);
    let hi = &product >> consts::LIMB_BITS;
    let lo = product & BigUint::from(consts::LIMB_MASK);

    LimbPair {
        hi: hi.to_u64().unwrap(),
        lo: lo.to_u64().unwrap(),
    }
}
