// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Deterministic pattern generator for random-access passes.
//!
//! Both sides of a comparison must draw from the same algorithm and seed,
//! otherwise the ordinary and isolated random passes touch different
//! positions and their ratio is meaningless. The generator is owned by the
//! benchmark session and reset before every random pass.

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

const LCG_MULTIPLIER: u32 = 1_103_515_245;
const LCG_INCREMENT: u32 = 12_345;

const PARK_MILLER_MULTIPLIER: u64 = 16_807;
const PARK_MILLER_MODULUS: u64 = 2_147_483_647;

/// Supported generator algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternAlgorithm {
    /// 32-bit congruential generator (multiplier 1103515245); each value
    /// combines the high halves of two consecutive states.
    #[default]
    Lcg32,
    /// Multiplicative congruential generator over the prime 2^31 - 1,
    /// mapped to [0, 1) and scaled by the region length.
    ParkMiller,
}

impl fmt::Display for PatternAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternAlgorithm::Lcg32 => write!(f, "lcg32"),
            PatternAlgorithm::ParkMiller => write!(f, "park_miller"),
        }
    }
}

/// Seeded, repeatable generator of access positions.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    algorithm: PatternAlgorithm,
    state: u64,
}

impl PatternGenerator {
    /// Create a generator already reset to `seed`.
    pub fn new(algorithm: PatternAlgorithm, seed: u64) -> Self {
        let mut generator = Self {
            algorithm,
            state: 0,
        };
        generator.reset(seed);
        generator
    }

    /// The algorithm in use.
    pub fn algorithm(&self) -> PatternAlgorithm {
        self.algorithm
    }

    /// Restart the sequence from `seed`.
    ///
    /// Park-Miller is degenerate at zero, so a seed congruent to zero is
    /// replaced by one.
    pub fn reset(&mut self, seed: u64) {
        self.state = match self.algorithm {
            PatternAlgorithm::Lcg32 => seed & u64::from(u32::MAX),
            PatternAlgorithm::ParkMiller => match seed % PARK_MILLER_MODULUS {
                0 => 1,
                s => s,
            },
        };
    }

    /// Next raw value.
    #[inline]
    pub fn next_value(&mut self) -> u32 {
        match self.algorithm {
            PatternAlgorithm::Lcg32 => {
                let hi = self.step_lcg() >> 16;
                let lo = self.step_lcg() >> 16;
                (hi << 16).wrapping_add(lo)
            }
            PatternAlgorithm::ParkMiller => {
                self.state = (PARK_MILLER_MULTIPLIER * self.state) % PARK_MILLER_MODULUS;
                self.state as u32
            }
        }
    }

    /// Next position in `[0, len)`.
    #[inline]
    pub fn next_index(&mut self, len: NonZeroUsize) -> usize {
        let len = len.get();
        let value = self.next_value();
        match self.algorithm {
            PatternAlgorithm::Lcg32 => (u64::from(value) % len as u64) as usize,
            PatternAlgorithm::ParkMiller => {
                let unit = f64::from(value) / PARK_MILLER_MODULUS as f64;
                ((len as f64 * unit) as usize).min(len - 1)
            }
        }
    }

    #[inline]
    fn step_lcg(&mut self) -> u32 {
        let next = (self.state as u32)
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state = u64::from(next);
        next
    }
}
