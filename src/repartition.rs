//! Repartition construction (C3): picks the ciphertext modulus `q`,
//! partitions secret-key indices across `q`'s prime factors via `sigma`,
//! and builds the Bezout coefficients `mu` and relinearization tensor
//! `lambda` consumed by [`crate::channel::ArithChannel`].

use num_bigint::BigInt;
use num_traits::{One, Zero};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::arith::{extended_gcd, find_candidates, Candidate, Primes, Units};
use crate::error::{AcesError, Result};
use crate::modular::mod_q;

/// Sigma-construction mode, named after spec §4.3 step 2's three variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SigmaMode {
    #[default]
    Default,
    TrivialFactor,
    TrivialSigma,
}

/// Partition of secret-key indices over the prime factors of `q`, plus the
/// Bezout coefficients and relinearization tensor built on top of it.
#[derive(Clone, Debug)]
pub struct Repartition {
    pub n: usize,
    pub p: BigInt,
    pub upperbound: BigInt,

    pub candidate: Option<Candidate>,
    pub q: Option<BigInt>,
    pub factors: Vec<BigInt>,
    pub n0: usize,

    pub sigma_done: bool,
    pub sigma_img: Vec<usize>,
    pub sigma_fibers: Vec<Vec<usize>>,

    pub mus: Vec<BigInt>,
    pub x_images: Vec<BigInt>,
    pub lambdas: Vec<Vec<Vec<BigInt>>>,
    pub ell: Vec<Vec<BigInt>>,
}

impl Repartition {
    pub fn new(n: usize, p: BigInt, upperbound: BigInt) -> Self {
        Repartition {
            n,
            p,
            upperbound,
            candidate: None,
            q: None,
            factors: Vec::new(),
            n0: 0,
            sigma_done: false,
            sigma_img: Vec::new(),
            sigma_fibers: Vec::new(),
            mus: Vec::new(),
            x_images: Vec::new(),
            lambdas: Vec::new(),
            ell: Vec::new(),
        }
    }

    fn q(&self) -> &BigInt {
        self.q.as_ref().expect("q not yet chosen")
    }

    /// `sigma_q_divisor(i, j)` from spec §3: single factor if `i`, `j` share
    /// a partition, else the product of both factors.
    pub fn sigma_q_divisor(&self, i: usize, j: usize) -> BigInt {
        let fi = &self.factors[self.sigma_img[i]];
        let fj = &self.factors[self.sigma_img[j]];
        if self.sigma_img[i] == self.sigma_img[j] {
            fi.clone()
        } else {
            fi * fj
        }
    }

    /// `sigma_q(i, j) = q / sigma_q_divisor(i, j)`.
    pub fn sigma_q(&self, i: usize, j: usize) -> BigInt {
        self.q() / self.sigma_q_divisor(i, j)
    }

    /// Run the full construction sequence: choose `q`, build `sigma`, `ell`,
    /// `mu`/`x_images`, and `lambda`.
    #[instrument(skip(self, rng), fields(n = self.n))]
    pub fn construct<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.choose_q()?;
        self.construct_sigma(rng, SigmaMode::Default);
        self.construct_ell(rng);
        self.construct_mus(rng)?;
        self.construct_lambdas()?;
        info!(q = %self.q(), n0 = self.n0, "repartition construction complete");
        Ok(())
    }

    fn choose_q(&mut self) -> Result<()> {
        let primes = Primes::new(&self.upperbound);
        let mut units = Units::new();
        units.add_units(&self.p, &primes);
        let mut candidates = find_candidates(&primes, &[], &units)?;
        let chosen = candidates.pop().expect("non-empty by find_candidates contract");
        debug!(q = %chosen.q, factor_count = chosen.factor_count, "chose candidate q");
        self.factors = std::iter::once(BigInt::one())
            .chain(chosen.factorization.keys().cloned())
            .collect();
        self.n0 = chosen.factorization.len();
        self.q = Some(chosen.q.clone());
        self.candidate = Some(chosen);
        Ok(())
    }

    /// Rebuild `sigma` under a different mode, discarding the dependent
    /// `mu`/`lambda` state (spec §4.3 `reconstruct_sigma`).
    pub fn reconstruct_sigma<R: Rng + ?Sized>(&mut self, rng: &mut R, mode: SigmaMode) {
        self.sigma_done = false;
        self.mus.clear();
        self.x_images.clear();
        self.lambdas.clear();
        self.construct_sigma(rng, mode);
    }

    fn construct_sigma<R: Rng + ?Sized>(&mut self, rng: &mut R, mode: SigmaMode) {
        let mut order: Vec<usize> = (0..self.n).collect();
        order.shuffle(rng);

        let mut sigma_img = vec![0usize; self.n];
        match mode {
            SigmaMode::TrivialSigma => {
                // all zeros, already the default
            }
            SigmaMode::TrivialFactor => {
                let modulus = self.n0 + 1;
                let s = rng.gen_range(0..modulus);
                for (pos, &k) in order.iter().enumerate() {
                    sigma_img[k] = (s + pos) % modulus;
                }
            }
            SigmaMode::Default => {
                let modulus = self.n0.max(1);
                let s = rng.gen_range(0..modulus);
                for (pos, &k) in order.iter().enumerate() {
                    sigma_img[k] = 1 + (s + pos) % modulus;
                }
            }
        }

        let mut fibers = vec![Vec::new(); self.n0 + 1];
        for (k, &v) in sigma_img.iter().enumerate() {
            fibers[v].push(k);
        }

        self.sigma_img = sigma_img;
        self.sigma_fibers = fibers;
        self.sigma_done = true;
    }

    fn construct_ell<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        use num_bigint::RandBigInt;
        let q = self.q().clone();
        let mut ell = vec![vec![BigInt::zero(); self.n]; self.n];
        for i in 0..self.n {
            for j in i..self.n {
                let v = rng.gen_bigint_range(&BigInt::zero(), &q);
                ell[i][j] = v.clone();
                ell[j][i] = v;
            }
        }
        self.ell = ell;
    }

    /// Draw `mu`/`x_images` satisfying `sum_k factors[sigma[k]]*x_images[k]*mu[k] = 1 (mod q)`,
    /// retrying the draw until the Bezout step yields `gcd = 1` (spec §4.3 step 4).
    pub fn construct_mus<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        use num_bigint::RandBigInt;
        let q = self.q().clone();
        let upper = &q + BigInt::one();

        loop {
            let k0 = rng.gen_range(0..self.n);
            let mut mus = vec![BigInt::zero(); self.n];
            let mut x_images = vec![BigInt::zero(); self.n];
            let mut s = BigInt::zero();

            for k in 0..self.n {
                if k == k0 {
                    continue;
                }
                let mu_k = rng.gen_bigint_range(&BigInt::zero(), &upper);
                let x_k = rng.gen_bigint_range(&BigInt::zero(), &upper);
                s += &self.factors[self.sigma_img[k]] * &x_k * &mu_k;
                mus[k] = mu_k;
                x_images[k] = x_k;
            }
            s = mod_q(&s, &q);

            let x_k0 = rng.gen_bigint_range(&BigInt::zero(), &upper);
            let rhs = &self.factors[self.sigma_img[k0]] * &x_k0;
            let (g, alpha, beta) = extended_gcd(&s, &rhs);

            if g == BigInt::one() {
                mus[k0] = mod_q(&beta, &q);
                let alpha_mod = mod_q(&alpha, &q);
                for (k, mu) in mus.iter_mut().enumerate() {
                    if k != k0 {
                        *mu = (&*mu * &alpha_mod) % &q;
                    }
                }
                x_images[k0] = x_k0;
                self.mus = mus;
                self.x_images = x_images;
                debug!(k0, "construct_mus converged");
                return Ok(());
            }
        }
    }

    /// Build the rank-3 relinearization tensor `lambda` (spec §4.3 step 5).
    ///
    /// Validates that `sigma_img`/`mus`/`x_images`/`ell` are consistently
    /// shaped for `n` before indexing them (spec §7 `ETensorDimension`):
    /// since every field here is public, a caller that mutates them between
    /// construction steps (e.g. after `reconstruct_sigma`) can genuinely
    /// desynchronize `sigma_img[k]` from `factors.len()`.
    pub fn construct_lambdas(&mut self) -> Result<()> {
        if self.mus.len() != self.n
            || self.x_images.len() != self.n
            || self.ell.len() != self.n
            || self.sigma_img.len() != self.n
        {
            return Err(AcesError::TensorDimension { k: 0, i: 0, j: 0 });
        }
        for row in &self.ell {
            if row.len() != self.n {
                return Err(AcesError::TensorDimension { k: 0, i: 0, j: 0 });
            }
        }
        for (k, &sigma_k) in self.sigma_img.iter().enumerate() {
            if sigma_k >= self.factors.len() {
                return Err(AcesError::TensorDimension { k, i: 0, j: 0 });
            }
        }

        let q = self.q().clone();
        let mut lambdas = vec![vec![vec![BigInt::zero(); self.n]; self.n]; self.n];
        for i in 0..self.n {
            for j in 0..self.n {
                let cross = &self.x_images[i] * &self.x_images[j]
                    - &self.ell[i][j] * self.sigma_q(i, j);
                for k in 0..self.n {
                    let sigma_k = self.sigma_img[k];
                    let v = &self.factors[sigma_k] * &self.mus[k] * &cross;
                    lambdas[k][i][j] = mod_q(&v, &q);
                }
            }
        }
        self.lambdas = lambdas;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn built(n: usize, p: i64, upperbound: i64, seed: u64) -> Repartition {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut r = Repartition::new(n, BigInt::from(p), BigInt::from(upperbound));
        r.construct(&mut rng).expect("construct succeeds");
        r
    }

    #[test]
    fn mu_bezout_identity_holds() {
        let r = built(5, 2, 47_601_551, 1);
        let q = r.q.clone().unwrap();
        let mut sum = BigInt::zero();
        for k in 0..r.n {
            sum += &r.factors[r.sigma_img[k]] * &r.mus[k] * &r.x_images[k];
        }
        assert_eq!(mod_q(&sum, &q), BigInt::one());
    }

    #[test]
    fn lambda_tensor_matches_defining_identity() {
        let r = built(5, 2, 47_601_551, 2);
        let q = r.q.clone().unwrap();
        for i in 0..r.n {
            for j in 0..r.n {
                let mut lhs = BigInt::zero();
                for k in 0..r.n {
                    lhs += &r.lambdas[k][i][j] * &r.x_images[k];
                }
                lhs = mod_q(&lhs, &q);
                let rhs = &r.x_images[i] * &r.x_images[j] - &r.ell[i][j] * r.sigma_q(i, j);
                let rhs = mod_q(&rhs, &q);
                assert_eq!(lhs, rhs, "mismatch at ({i},{j})");
            }
        }
    }

    #[test]
    fn ell_is_symmetric() {
        let r = built(5, 2, 47_601_551, 3);
        for i in 0..r.n {
            for j in 0..r.n {
                assert_eq!(r.ell[i][j], r.ell[j][i]);
            }
        }
    }

    #[test]
    fn reconstruct_sigma_trivial_is_all_zero() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let mut r = Repartition::new(5, BigInt::from(2), BigInt::from(47_601_551));
        r.construct(&mut rng).expect("construct succeeds");
        r.reconstruct_sigma(&mut rng, SigmaMode::TrivialSigma);
        assert!(r.sigma_img.iter().all(|&v| v == 0));
    }
}
