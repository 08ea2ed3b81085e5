//! ACES instance parameters.
//!
//! Parameter sets are toy-scale, chosen for correctness demonstrations
//! rather than security; see spec §1 Non-goals.

use num_bigint::BigInt;

/// Named parameter sets mirroring the concrete scenarios used to pin the
/// testable properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// `n=5, p=2, U=47,601,551, deg_u=3, N=10`.
    Binary,
    /// Same dimensions, `p=4`.
    Nibble,
    /// `n=5, p=2, U=476,015,501, deg_u=3, N=10` — larger `U` for deeper
    /// expressions.
    BinaryWide,
}

/// ACES instance parameters: secret-key dimension, plaintext modulus,
/// ciphertext-modulus search bound, modulus-polynomial degree, and public
/// key capacity.
#[derive(Clone, Debug)]
pub struct Params {
    /// Secret-key dimension `n`.
    pub n: usize,
    /// Plaintext modulus `p`.
    pub p: BigInt,
    /// Upper bound `U` for the candidate-`q` search.
    pub upperbound: BigInt,
    /// Degree of the modulus polynomial `u`.
    pub deg_u: usize,
    /// Public key capacity `N`.
    pub capacity: usize,
}

impl Params {
    pub fn new(scenario: Scenario) -> Self {
        match scenario {
            Scenario::Binary => Params {
                n: 5,
                p: BigInt::from(2),
                upperbound: BigInt::from(47_601_551i64),
                deg_u: 3,
                capacity: 10,
            },
            Scenario::Nibble => Params {
                n: 5,
                p: BigInt::from(4),
                upperbound: BigInt::from(47_601_551i64),
                deg_u: 3,
                capacity: 10,
            },
            Scenario::BinaryWide => Params {
                n: 5,
                p: BigInt::from(2),
                upperbound: BigInt::from(476_015_501i64),
                deg_u: 3,
                capacity: 10,
            },
        }
    }

    /// Toy parameters for quick local testing: same shape as [`Scenario::Binary`].
    pub fn toy() -> Self {
        Self::new(Scenario::Binary)
    }
}
