//! Integer arithmetic: extended Euclid over `Z`, a bounded prime sieve,
//! trial-division factorization, and the candidate-`q` search that seeds
//! [`crate::repartition::Repartition::construct`].

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_integer::Roots;
use num_traits::{One, Zero};
use rand::Rng;
use tracing::{debug, trace};

use crate::error::{AcesError, Result};
use crate::modular::mod_q;

/// Extended Euclidean algorithm: returns `(g, s, t)` with `a*s + b*t = g`.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut r0, mut r1) = (a.clone(), b.clone());
    let (mut s0, mut s1) = (BigInt::one(), BigInt::zero());
    let (mut t0, mut t1) = (BigInt::zero(), BigInt::one());
    while !r1.is_zero() {
        let q = &r0 / &r1;
        let r2 = &r0 - &q * &r1;
        r0 = r1;
        r1 = r2;
        let s2 = &s0 - &q * &s1;
        s0 = s1;
        s1 = s2;
        let t2 = &t0 - &q * &t1;
        t0 = t1;
        t1 = t2;
    }
    (r0, s0, t0)
}

/// Rejection-sample `a in [1, m)` until `gcd(a, m) == 1`; return `(a, a^-1 mod m)`.
pub fn rand_invertible<R: Rng + ?Sized>(rng: &mut R, m: &BigInt) -> (BigInt, BigInt) {
    use num_bigint::RandBigInt;
    loop {
        let a = rng.gen_bigint_range(&BigInt::one(), m);
        let (g, s, _t) = extended_gcd(&a, m);
        if g == BigInt::one() {
            let inv = mod_q(&s, m);
            return (a, inv);
        }
    }
}

fn isqrt(n: &BigInt) -> BigInt {
    n.to_biguint()
        .map(|u| BigInt::from(u.sqrt()))
        .unwrap_or_else(BigInt::zero)
}

/// A sieve of primes up to `sqrt(U)`, used by [`factorize`] and candidate
/// search. `U` is the repartition's `upperbound`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "persistence", derive(serde::Serialize, serde::Deserialize))]
pub struct Primes {
    bound: BigInt,
    list: Vec<BigInt>,
}

impl Primes {
    /// Build (or extend) a prime list covering `[2, sqrt(U)]` by trial division.
    pub fn new(u: &BigInt) -> Self {
        let root = isqrt(u) + BigInt::one();
        let root_u64: u64 = root.to_string().parse().unwrap_or(u64::MAX);
        let mut list = Vec::new();
        for candidate in 2..=root_u64 {
            if list
                .iter()
                .take_while(|&&p: &&u64| p * p <= candidate)
                .all(|&p| candidate % p != 0)
            {
                list.push(candidate);
            }
        }
        debug!(bound = %u, primes_found = list.len(), "built prime sieve");
        Primes {
            bound: u.clone(),
            list: list.into_iter().map(BigInt::from).collect(),
        }
    }

    /// Extend this sieve to cover a larger bound, reusing the existing list
    /// as a seed (mirrors spec §4.2's "optionally extending a cached list").
    pub fn extend_to(&mut self, u: &BigInt) {
        if u <= &self.bound {
            return;
        }
        *self = Primes::new(u);
    }

    pub fn primes(&self) -> &[BigInt] {
        &self.list
    }

    pub fn bound(&self) -> &BigInt {
        &self.bound
    }

    /// Persist this sieve as JSON so a later run can skip re-sieving
    /// (spec §6 "optional persistent files"; gated behind `persistence`
    /// since the core has no mandatory serde dependency).
    #[cfg(feature = "persistence")]
    pub fn save_to_path(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = serde_json::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load a sieve previously written by [`Primes::save_to_path`].
    #[cfg(feature = "persistence")]
    pub fn load_from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn default_limit(&self) -> BigInt {
        let root = isqrt(&self.bound) + BigInt::one();
        &root * &root
    }

    /// Trial-divide `n` by the sieve's primes up to `limit` (default
    /// `(sqrt(U)+1)^2`), treating a residual factor greater than 1 as prime.
    /// Returns `None` when `n` is not in `(0, limit)`.
    pub fn factorize(&self, n: &BigInt, limit: Option<&BigInt>) -> Option<BTreeMap<BigInt, u32>> {
        let limit = limit.cloned().unwrap_or_else(|| self.default_limit());
        if n <= &BigInt::zero() || n >= &limit {
            return None;
        }
        if n.is_one() {
            return Some(BTreeMap::new());
        }
        let mut remaining = n.clone();
        let mut factors = BTreeMap::new();
        for p in &self.list {
            if &(p * p) > &remaining {
                break;
            }
            while (&remaining % p).is_zero() {
                *factors.entry(p.clone()).or_insert(0) += 1;
                remaining /= p;
            }
        }
        if remaining > BigInt::one() {
            *factors.entry(remaining).or_insert(0) += 1;
        }
        Some(factors)
    }
}

/// A multiset of prime factors disqualifying a candidate `q` from being
/// chosen (spec §4.2 "units"). Counts are tracked even though only
/// membership is consulted, matching the source's multiset framing.
#[derive(Clone, Debug, Default)]
pub struct Units {
    counts: BTreeMap<BigInt, u32>,
}

impl Units {
    pub fn new() -> Self {
        Units::default()
    }

    /// Insert every prime factor of `n` (as reported by `primes`).
    pub fn add_units(&mut self, n: &BigInt, primes: &Primes) {
        if let Some(factors) = primes.factorize(n, None) {
            for p in factors.keys() {
                *self.counts.entry(p.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn contains(&self, p: &BigInt) -> bool {
        self.counts.contains_key(p)
    }
}

/// One admissible ciphertext-modulus candidate from [`find_candidates`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub q: BigInt,
    pub factor_count: usize,
    pub min_factor: BigInt,
    pub max_factor: BigInt,
    pub factorization: BTreeMap<BigInt, u32>,
}

/// Scan `[U, (sqrt(U)+1)^2)` for integers divisible by every prime in
/// `zero_divisors` and by none in `units`, sorted ascending by
/// `(factor_count, q, min_factor, max_factor)` so the caller's last entry is
/// the largest, most-factored candidate within budget (spec §4.2, §5
/// cancellation contract).
pub fn find_candidates(
    primes: &Primes,
    zero_divisors: &[BigInt],
    units: &Units,
) -> Result<Vec<Candidate>> {
    let u = primes.bound().clone();
    let limit = {
        let root = isqrt(&u) + BigInt::one();
        &root * &root
    };
    let mut k = u.clone();
    let mut out = Vec::new();
    let mut iterations: u64 = 0;
    let max_iterations: u64 = 8_000_000;
    while k < limit {
        iterations += 1;
        if iterations > max_iterations {
            trace!(iterations, "find_candidates exceeded its iteration cap");
            break;
        }
        if let Some(factorization) = primes.factorize(&k, Some(&limit)) {
            let divides_all_zero_divisors = zero_divisors
                .iter()
                .all(|d| factorization.contains_key(d));
            let divides_no_unit = factorization.keys().all(|p| !units.contains(p));
            if divides_all_zero_divisors && divides_no_unit {
                let min_factor = factorization.keys().next().cloned().unwrap();
                let max_factor = factorization.keys().next_back().cloned().unwrap();
                out.push(Candidate {
                    q: k.clone(),
                    factor_count: factorization.len(),
                    min_factor,
                    max_factor,
                    factorization,
                });
            }
        }
        k += BigInt::one();
    }
    if out.is_empty() {
        return Err(AcesError::CandidateExhausted);
    }
    out.sort_by(|a, b| {
        (a.factor_count, &a.q, &a.min_factor, &a.max_factor).cmp(&(
            b.factor_count,
            &b.q,
            &b.min_factor,
            &b.max_factor,
        ))
    });
    Ok(out)
}
