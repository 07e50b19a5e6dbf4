//! Randomized verification of the fma kernel against the exact oracle.
//!
//! A seeded run is fully deterministic: identical count and seed produce a
//! byte identical report. Trials are independent; the loop stops at the
//! first hard mismatch and never retries, since a disagreement means the
//! platform precondition is broken, not that the trial was unlucky.

use crate::{consts, fma, oracle, Limb, LimbPair};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::io::{self, Write};
use thiserror::Error;

/// Trial count of the reference run.
pub const DEFAULT_TRIALS: usize = 1000;

/// One operand pair with the limb pairs both paths computed for it.
#[derive(Copy, Clone, Debug)]
pub struct Trial {
    pub a: Limb,
    pub b: Limb,
    pub exact: LimbPair,
    pub fp: LimbPair,
}

/// How a trial's fma result relates to the exact reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Agreement {
    /// Both limbs match.
    Exact,
    /// Low limb matches and the high limb is one past the exact high limb:
    /// the first fma rounded up. Expected for about half of random pairs.
    HiRoundedUp,
    /// Anything else. The kernel's guarantee does not hold.
    Mismatch,
}

impl Trial {
    pub fn run(a: Limb, b: Limb) -> Self {
        Self {
            a,
            b,
            exact: oracle::wide_mul(a, b),
            fp: fma::wide_mul(a, b),
        }
    }

    pub fn agreement(&self) -> Agreement {
        if self.fp.lo != self.exact.lo {
            Agreement::Mismatch
        } else if self.fp.hi == self.exact.hi {
            Agreement::Exact
        } else if self.fp.hi == (self.exact.hi + 1) & consts::LIMB_MASK {
            Agreement::HiRoundedUp
        } else {
            Agreement::Mismatch
        }
    }
}

#[derive(Debug, Error)]
#[error(
    "limb mismatch at trial {index}: a = {}, b = {}, exact {:?}, fp {:?}",
    .trial.a,
    .trial.b,
    .trial.exact,
    .trial.fp
)]
pub struct Mismatch {
    pub index: usize,
    pub trial: Trial,
}

#[derive(Debug)]
pub enum Outcome {
    /// Every low limb matched the oracle. `hi_roundups` counts the trials
    /// whose high limb overshot by one; the report keeps those visible.
    Pass { trials: usize, hi_roundups: usize },
    Fail(Mismatch),
}

/// Runs `count` seeded trials, writing the per trial report to `out`.
///
/// Operands are independent uniform 48-bit values. Each trial block is the
/// operands in decimal, both limb pairs as zero padded 16 digit upper hex,
/// then a blank separator line. A trial whose low limb disagrees with the
/// oracle, or whose high limb is off by anything other than the round-up
/// artifact, writes a literal `Mismatch!` line and stops the loop.
pub fn run(count: usize, seed: u64, out: &mut dyn Write) -> io::Result<Outcome> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    run_with(count, out, |_| {
        let a = rng.gen::<u64>() & consts::OPERAND_MAX;
        let b = rng.gen::<u64>() & consts::OPERAND_MAX;
        Trial::run(a, b)
    })
}

/// The trial loop behind [`run`], with the trial producer injectable so the
/// mismatch path can be driven by a doctored trial.
fn run_with(count: usize, out: &mut dyn Write, mut next_trial: impl FnMut(usize) -> Trial) -> io::Result<Outcome> {
    let mut hi_roundups = 0;

    for index in 0..count {
        let trial = next_trial(index);

        writeln!(out, "a: {}", trial.a)?;
        writeln!(out, "b: {}", trial.b)?;
        writeln!(out, "Using BN: {:016X} {:016X}", trial.exact.hi, trial.exact.lo)?;
        writeln!(out, "Using FP: {:016X} {:016X}", trial.fp.hi, trial.fp.lo)?;

        match trial.agreement() {
            Agreement::Exact => {}
            Agreement::HiRoundedUp => hi_roundups += 1,
            Agreement::Mismatch => {
                writeln!(out, "Mismatch!")?;
                return Ok(Outcome::Fail(Mismatch { index, trial }));
            }
        }

        writeln!(out)?;
    }

    Ok(Outcome::Pass {
        trials: count,
        hi_roundups,
    })
}
