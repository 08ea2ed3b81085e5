//! Arithmetic channel (C4): samples the modulus polynomial `u`, the secret
//! key `x`, the vanishers `e`, and the public matrices `f0`/`f1` on top of a
//! completed [`Repartition`].

use num_bigint::BigInt;
use num_traits::{One, Zero};
use rand::Rng;
use tracing::{info, instrument};

use crate::modular::mod_q;
use crate::poly::Polynomial;
use crate::repartition::Repartition;

/// `i -> allowed noise levels` map, default `{0, 1}` for every slot (spec §3).
pub type Anchor = Vec<Vec<u64>>;

fn default_anchor(capacity: usize) -> Anchor {
    vec![vec![0, 1]; capacity]
}

/// Public key material handed to encryptors/the homomorphic algebra.
#[derive(Clone, Debug)]
pub struct PublicParams {
    pub f0: Vec<Vec<Polynomial>>,
    pub f1: Vec<Polynomial>,
    pub p: BigInt,
    pub q: BigInt,
    pub n: usize,
    pub capacity: usize,
    pub u: Polynomial,
    pub tensor: Vec<Vec<Vec<BigInt>>>,
    pub levels: Vec<BigInt>,
    pub max_saturation: f64,
}

/// Secret-key side of the channel: `x`, `e`, the repartition, and the
/// parameters needed to regenerate public material.
pub struct ArithChannel {
    pub p: BigInt,
    pub capacity: usize,
    pub deg_u: usize,
    pub repartition: Repartition,
    pub anchor: Anchor,

    pub u: Polynomial,
    pub x: Vec<Polynomial>,
    pub e: Vec<Polynomial>,
    pub levels: Vec<BigInt>,
    pub f0: Vec<Vec<Polynomial>>,
    pub f1: Vec<Polynomial>,
}

impl ArithChannel {
    /// Generate every component of the channel in sequence. `anchor`
    /// defaults to `{0, 1}` per slot when `None` (spec §4.4).
    #[instrument(skip(rng, repartition, anchor), fields(capacity, deg_u))]
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        p: BigInt,
        capacity: usize,
        deg_u: usize,
        repartition: Repartition,
        anchor: Option<Anchor>,
    ) -> Self {
        let anchor = anchor.unwrap_or_else(|| default_anchor(capacity));
        let q = repartition.q.clone().expect("repartition must be constructed first");

        let u = generate_u(rng, &q, deg_u);
        let x = generate_secret_key(rng, &q, deg_u, &repartition);
        let (e, levels) = generate_vanishers(rng, &p, &q, deg_u, capacity, &anchor);
        let f0 = generate_f0(rng, &q, deg_u, capacity, repartition.n, &repartition);
        let f1 = generate_f1(&f0, &x, &e, &u);

        info!(n = repartition.n, capacity, "arithmetic channel generated");

        ArithChannel {
            p,
            capacity,
            deg_u,
            repartition,
            anchor,
            u,
            x,
            e,
            levels,
            f0,
            f1,
        }
    }

    pub fn n(&self) -> usize {
        self.repartition.n
    }

    pub fn q(&self) -> &BigInt {
        self.repartition.q.as_ref().expect("q present after construct")
    }

    /// Assemble the publishable structure of spec §6, including the
    /// convenience `max_saturation = 100 * max(levels) / ((q+1)/p - 1)`.
    pub fn publish(&self) -> PublicParams {
        let q = self.q().clone();
        let max_level = self.levels.iter().max().cloned().unwrap_or_else(BigInt::zero);
        let budget = (&q + BigInt::one()) / &self.p - BigInt::one();
        let max_saturation = if budget.is_zero() {
            0.0
        } else {
            100.0 * to_f64(&max_level) / to_f64(&budget)
        };
        PublicParams {
            f0: self.f0.clone(),
            f1: self.f1.clone(),
            p: self.p.clone(),
            q,
            n: self.n(),
            capacity: self.capacity,
            u: self.u.clone(),
            tensor: self.repartition.lambdas.clone(),
            levels: self.levels.clone(),
            max_saturation,
        }
    }
}

fn to_f64(v: &BigInt) -> f64 {
    v.to_string().parse().unwrap_or(f64::MAX)
}

fn generate_u<R: Rng + ?Sized>(rng: &mut R, q: &BigInt, deg_u: usize) -> Polynomial {
    let base = Polynomial::random_poly(rng, q, deg_u);
    let mut coefs: Vec<BigInt> = base.coefs().to_vec();
    coefs.push(BigInt::one());
    let monic = Polynomial::new(coefs, Some(q.clone()));
    let target = mod_q(&(q - monic.evaluate(&BigInt::one())), q);
    let shift = Polynomial::random_shift(rng, &target, q, deg_u);
    &monic + &shift
}

fn generate_secret_key<R: Rng + ?Sized>(
    rng: &mut R,
    q: &BigInt,
    deg_u: usize,
    repartition: &Repartition,
) -> Vec<Polynomial> {
    (0..repartition.n)
        .map(|k| Polynomial::with_value_at_one(rng, &repartition.x_images[k], q, deg_u))
        .collect()
}

fn generate_vanishers<R: Rng + ?Sized>(
    rng: &mut R,
    p: &BigInt,
    q: &BigInt,
    deg_u: usize,
    capacity: usize,
    anchor: &Anchor,
) -> (Vec<Polynomial>, Vec<BigInt>) {
    let mut e = Vec::with_capacity(capacity);
    let mut levels = Vec::with_capacity(capacity);
    for i in 0..capacity {
        let choices = &anchor[i];
        let idx = rng.gen_range(0..choices.len());
        let k_i = choices[idx];
        let target = p * BigInt::from(k_i);
        e.push(Polynomial::with_value_at_one(rng, &target, q, deg_u));
        levels.push(BigInt::from(*choices.iter().max().unwrap()));
    }
    (e, levels)
}

fn generate_f0<R: Rng + ?Sized>(
    rng: &mut R,
    q: &BigInt,
    deg_u: usize,
    capacity: usize,
    n: usize,
    repartition: &Repartition,
) -> Vec<Vec<Polynomial>> {
    use num_bigint::RandBigInt;
    (0..capacity)
        .map(|_i| {
            (0..n)
                .map(|j| {
                    let r = rng.gen_bigint_range(&BigInt::zero(), q);
                    let target = &repartition.factors[repartition.sigma_img[j]] * &r;
                    Polynomial::with_value_at_one(rng, &target, q, deg_u)
                })
                .collect()
        })
        .collect()
}

fn generate_f1(
    f0: &[Vec<Polynomial>],
    x: &[Polynomial],
    e: &[Polynomial],
    u: &Polynomial,
) -> Vec<Polynomial> {
    f0.iter()
        .zip(e.iter())
        .map(|(row, e_i)| {
            let mut acc = e_i.clone();
            for (f0_ij, x_j) in row.iter().zip(x.iter()) {
                acc = &acc + &(f0_ij * x_j);
            }
            acc.mod_reduce(u)
        })
        .collect()
}
