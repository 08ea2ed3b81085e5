//! Crate-wide error type.
//!
//! Recoverable conditions (plaintext overflow, a non-monic reduction step)
//! are logged as warnings by the call site and do not appear here; only
//! conditions that abort an operation are represented.

use thiserror::Error;

/// Errors produced by the ACES core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcesError {
    /// `reduce_step` could not find an integer quotient even after searching
    /// the modular rescue range; the divisor's leading coefficient is not
    /// invertible against every unit in the modulus.
    #[error("non-monic modulus: leading coefficient has no reducing quotient mod {modulus}")]
    NonMonicModulus {
        /// The modulus under which the search failed.
        modulus: String,
    },

    /// Projected noise reached the saturation threshold and no refresh path
    /// brought either operand back under budget.
    #[error("ciphertext noise saturated: projected level {projected} exceeds budget {budget}")]
    Saturation {
        /// The projected noise level that triggered the failure.
        projected: String,
        /// The noise budget `(q+1)/p - 1`.
        budget: String,
    },

    /// A saturating operation was attempted on an algebra built without a
    /// refresher/encrypter/classifier triple.
    #[error("refresh path required but algebra was built without a refresher")]
    RefreshNotConfigured,

    /// `construct_lambdas` found `x_i * x_j mod u` coefficients outside the
    /// expected range; the repartition parameters are inconsistent.
    #[error("tensor dimension mismatch while constructing lambda[{k}][{i}][{j}]")]
    TensorDimension {
        /// Tensor index `k`.
        k: usize,
        /// Tensor index `i`.
        i: usize,
        /// Tensor index `j`.
        j: usize,
    },

    /// `find_candidates` produced no admissible `q` candidates.
    #[error("no candidate modulus q found under the configured bounds")]
    CandidateExhausted,

    /// `find_affine` exceeded `10 * epochs` iterations without populating
    /// both the locator and director sets.
    #[error("classifier training exhausted its iteration budget")]
    ClassifierExhausted,
}

/// Convenience alias for fallible ACES operations.
pub type Result<T> = std::result::Result<T, AcesError>;
