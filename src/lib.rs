//! Full products of 51-bit limbs computed with double precision fused
//! multiply-add instead of native integer multiplies.
//!
//! The technique comes from "Faster Modular Exponentiation Using Double
//! Precision Floating Point Arithmetic on the GPU" by Emmart, Zheng and
//! Weems, 2018 IEEE 25th Symposium on Computer Arithmetic (ARITH). It is a
//! building block for big integer kernels on hardware where fma throughput
//! is plentiful and integer multiply throughput is not.
//!
//! The product of two limbs is folded into two biased fma results whose raw
//! mantissa bits hold the high and low 51-bit slices of the exact product.
//! Without explicit control of the rounding mode the second fma may round
//! the low word either way; [`fma::wide_mul`] recovers the exact unsigned
//! low limb regardless, while the high limb can come out one too large.
//! See the `fma` module docs for how the harness treats that.
//!
//! The whole construction assumes `f64::mul_add` is a single correctly
//! rounded operation under round-to-nearest-even. That is a platform
//! precondition, not something the library can work around; run
//! [`fma::self_check`] once at startup and refuse to continue if it fails.

pub type Limb = u64;

/// High and low 51-bit slices of one limb product.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct LimbPair {
    pub hi: Limb,
    pub lo: Limb,
}

impl core::fmt::Debug for LimbPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // 51 bits fit in 13 hex digits
        write!(f, "LimbPair {{ hi: {:013X}, lo: {:013X} }}", self.hi, self.lo)
    }
}

pub mod consts {
    use crate::Limb;

    pub const LIMB_BITS: u32 = 51;
    pub const LIMB_MASK: Limb = (1 << LIMB_BITS) - 1;

    /// Operand width drawn by the verification harness. Narrower than the
    /// limb width so that products stay inside the range where the exact
    /// reference path is cheap to trust.
    pub const OPERAND_BITS: u32 = 48;
    pub const OPERAND_MAX: Limb = (1 << OPERAND_BITS) - 1;
}

pub mod fma;
pub mod oracle;
pub mod verify;

pub use fma::{self_check, SelfCheckError};
pub use verify::{run, Mismatch, Outcome};
