//! Encryption and decryption (C5): `Aces` is the public-key ("bob") side,
//! `AcesReader` is the secret-key ("alice") side that can also decrypt and
//! encrypt symmetrically.

use num_bigint::BigInt;
use num_traits::{One, Zero};
use rand::Rng;
use tracing::warn;

use crate::channel::{Anchor, ArithChannel, PublicParams};
use crate::cipher::Cipher;
use crate::modular::mod_q;
use crate::poly::Polynomial;

fn ceil_div(a: &BigInt, b: &BigInt) -> BigInt {
    (a + b - BigInt::one()) / b
}

fn warn_if_overflow(m: &BigInt, p: &BigInt) {
    if m >= p {
        warn!(%m, %p, "plaintext overflow: message exceeds modulus, noise absorbs floor(m/p)");
    }
}

/// Public-key encryptor built from a channel's [`PublicParams`].
#[derive(Clone)]
pub struct Aces {
    pub f0: Vec<Vec<Polynomial>>,
    pub f1: Vec<Polynomial>,
    pub p: BigInt,
    pub q: BigInt,
    pub n: usize,
    pub capacity: usize,
    pub u: Polynomial,
    pub levels: Vec<BigInt>,
    /// `i -> allowed b_i(1) values`; defaults to uniform `[0, p]` per slot.
    pub enc_anchor: Option<Anchor>,
}

impl Aces {
    pub fn new(params: PublicParams, enc_anchor: Option<Anchor>) -> Self {
        Aces {
            f0: params.f0,
            f1: params.f1,
            p: params.p,
            q: params.q,
            n: params.n,
            capacity: params.capacity,
            u: params.u,
            levels: params.levels,
            enc_anchor,
        }
    }

    /// Asymmetric (public-key) encryption of `m` (spec §4.5).
    pub fn encrypt<R: Rng + ?Sized>(&self, rng: &mut R, m: &BigInt) -> Cipher {
        warn_if_overflow(m, &self.p);
        let deg_u = self.u.degree();
        let p_bound: u64 = self.p.to_string().parse().unwrap_or(u64::MAX);

        let mut b_vals = Vec::with_capacity(self.capacity);
        let mut b_polys = Vec::with_capacity(self.capacity);
        for i in 0..self.capacity {
            let b_i = match &self.enc_anchor {
                Some(anchor) => {
                    let choices = &anchor[i];
                    choices[rng.gen_range(0..choices.len())]
                }
                None => rng.gen_range(0..=p_bound),
            };
            b_vals.push(b_i);
            b_polys.push(Polynomial::with_value_at_one(
                rng,
                &BigInt::from(b_i),
                &self.q,
                deg_u,
            ));
        }

        let r_m = Polynomial::with_value_at_one(rng, m, &self.q, deg_u);
        let mut enc = r_m;
        for (b_i, f1_i) in b_polys.iter().zip(self.f1.iter()) {
            enc = &enc + &(b_i * f1_i);
        }
        let enc = enc.mod_reduce(&self.u);

        let dec: Vec<Polynomial> = (0..self.n)
            .map(|j| {
                let mut acc = Polynomial::zero(Some(self.q.clone()));
                for (b_i, row) in b_polys.iter().zip(self.f0.iter()) {
                    acc = &acc + &(b_i * &row[j]);
                }
                acc.mod_reduce(&self.u)
            })
            .collect();

        let mut noise = BigInt::zero();
        for (b_i, level) in b_vals.iter().zip(self.levels.iter()) {
            noise += ceil_div(&BigInt::from(*b_i), &self.p) * level * &self.p;
        }
        noise += m / &self.p;

        Cipher::new(dec, enc, noise)
    }
}

/// Secret-key holder: decrypts, and can also encrypt symmetrically.
pub struct AcesReader {
    pub x: Vec<Polynomial>,
    pub x_images: Vec<BigInt>,
    pub p: BigInt,
    pub q: BigInt,
    pub n: usize,
    pub u: Polynomial,
    pub factors: Vec<BigInt>,
    pub sigma_img: Vec<usize>,
}

impl AcesReader {
    pub fn from_channel(channel: &ArithChannel) -> Self {
        AcesReader {
            x: channel.x.clone(),
            x_images: channel.repartition.x_images.clone(),
            p: channel.p.clone(),
            q: channel.q().clone(),
            n: channel.n(),
            u: channel.u.clone(),
            factors: channel.repartition.factors.clone(),
            sigma_img: channel.repartition.sigma_img.clone(),
        }
    }

    /// Decrypt a ciphertext: `pre = enc - sum_k dec[k]*x[k]` (no reduction
    /// by `u`), then `(pre(1) mod q) mod p` (spec §4.5).
    pub fn decrypt(&self, c: &Cipher) -> BigInt {
        let mut pre = c.enc.clone();
        for (dec_k, x_k) in c.dec.iter().zip(self.x.iter()) {
            pre = &pre - &(dec_k * x_k);
        }
        let val = pre.evaluate(&BigInt::one());
        let val_mod_q = mod_q(&val, &self.q);
        mod_q(&val_mod_q, &self.p)
    }

    /// Symmetric (secret-key) encryption with an explicit noise window
    /// `[min_noise, min(q/p, max_noise)]` (spec §4.5).
    pub fn encrypt<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        m: &BigInt,
        min_noise: u64,
        max_noise: u64,
    ) -> Cipher {
        warn_if_overflow(m, &self.p);
        use num_bigint::RandBigInt;
        let deg_u = self.u.degree();

        let q_over_p: u64 = (&self.q / &self.p).to_string().parse().unwrap_or(u64::MAX);
        let upper_k = max_noise.min(q_over_p).max(min_noise);
        let k = rng.gen_range(min_noise..=upper_k);

        let dec: Vec<Polynomial> = (0..self.n)
            .map(|k_idx| {
                let r_k = rng.gen_bigint_range(&BigInt::zero(), &self.q);
                let target = &self.factors[self.sigma_img[k_idx]] * &r_k;
                Polynomial::with_value_at_one(rng, &target, &self.q, deg_u)
            })
            .collect();

        let e_target = &self.p * BigInt::from(k);
        let e = Polynomial::with_value_at_one(rng, &e_target, &self.q, deg_u);
        let r_m = Polynomial::with_value_at_one(rng, m, &self.q, deg_u);

        let mut enc = &r_m + &e;
        for (dec_k, x_k) in dec.iter().zip(self.x.iter()) {
            enc = &enc + &(dec_k * x_k);
        }
        let enc = enc.mod_reduce(&self.u);

        let lvl = BigInt::from(max_noise) + (m / &self.p);
        Cipher::new(dec, enc, lvl)
    }

    /// `[encrypt_symmetric(x_i(1) mod p, min_noise, max_noise) for i in 0..n]`
    /// (spec §4.5 refresher).
    pub fn generate_refresher<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        min_noise: u64,
        max_noise: u64,
    ) -> Vec<Cipher> {
        (0..self.n)
            .map(|i| {
                let m = mod_q(&self.x_images[i], &self.p);
                self.encrypt(rng, &m, min_noise, max_noise)
            })
            .collect()
    }
}
