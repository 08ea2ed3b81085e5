//! Polynomial ring `Z[X]` / `(Z/mZ)[X]`.
//!
//! Coefficients are indexed by power (`coefs[k]` is the coefficient of
//! `X^k`). A polynomial optionally carries a coefficient modulus; arithmetic
//! between two polynomials with differing (or absent) moduli drops to plain
//! integer arithmetic on the result, matching spec §4.1 and the "common
//! modulus or none" rule in the design notes. `Option<BigInt>` is the
//! modulus representation: it is already the `Mod(q) | NoMod` sum type the
//! design notes ask for, so no separate enum is introduced.

use num_bigint::BigInt;
use num_traits::{One, Zero};
use rand::Rng;
use std::fmt;
use std::ops::{Add, Mul, Sub};

use crate::error::{AcesError, Result};
use crate::modular::mod_q;

/// Upper bound on the rescue search performed by [`integer_reduce`] when the
/// divisor's leading coefficient is not directly invertible. Large composite
/// moduli make an exhaustive `[1, b)` search impractical; beyond this bound
/// we report `ENonMonicModulus` rather than loop unboundedly.
const INTEGER_REDUCE_SEARCH_CAP: u64 = 1_000_000;

/// A polynomial over `Z` or `Z/mZ`, coefficients ordered by ascending power.
#[derive(Clone, Debug)]
pub struct Polynomial {
    coefs: Vec<BigInt>,
    modulus: Option<BigInt>,
}

impl Polynomial {
    /// Build a polynomial from coefficients, reducing them mod `modulus` if given.
    pub fn new(coefs: Vec<BigInt>, modulus: Option<BigInt>) -> Self {
        let coefs = match &modulus {
            Some(m) => coefs.into_iter().map(|c| reduce(&c, m)).collect(),
            None => coefs,
        };
        Polynomial { coefs, modulus }
    }

    /// The null (zero) polynomial, carrying the given modulus.
    pub fn zero(modulus: Option<BigInt>) -> Self {
        Polynomial::new(vec![BigInt::zero()], modulus)
    }

    /// A degree-0 polynomial equal to the given constant.
    pub fn constant(c: BigInt, modulus: Option<BigInt>) -> Self {
        Polynomial::new(vec![c], modulus)
    }

    pub fn coefs(&self) -> &[BigInt] {
        &self.coefs
    }

    pub fn modulus(&self) -> Option<&BigInt> {
        self.modulus.as_ref()
    }

    /// Largest index with a non-zero coefficient, or 0 if the polynomial is null.
    pub fn degree(&self) -> usize {
        for (i, c) in self.coefs.iter().enumerate().rev() {
            if !c.is_zero() {
                return i;
            }
        }
        0
    }

    /// Coefficient at `degree()`.
    pub fn lead_coef(&self) -> BigInt {
        self.coefs
            .get(self.degree())
            .cloned()
            .unwrap_or_else(BigInt::zero)
    }

    /// Whether every coefficient is zero.
    pub fn is_null(&self) -> bool {
        self.coefs.iter().all(Zero::is_zero)
    }

    fn coef_at(&self, i: usize) -> BigInt {
        self.coefs.get(i).cloned().unwrap_or_else(BigInt::zero)
    }

    /// Reduce coefficients by `modulus`, replacing the polynomial's modulus.
    pub fn with_modulus(&self, modulus: Option<BigInt>) -> Self {
        Polynomial::new(self.coefs.clone(), modulus)
    }

    /// The common modulus of two operands: `Some(m)` only if both carry the
    /// same modulus, else `None` (spec §4.1/§9).
    fn common_modulus(&self, other: &Polynomial) -> Option<BigInt> {
        match (&self.modulus, &other.modulus) {
            (Some(a), Some(b)) if a == b => Some(a.clone()),
            _ => None,
        }
    }

    /// Evaluate via Horner's rule, reducing after each step if a modulus is set.
    pub fn evaluate(&self, omega: &BigInt) -> BigInt {
        let mut acc = BigInt::zero();
        for c in self.coefs.iter().rev() {
            acc = &acc * omega + c;
            if let Some(m) = &self.modulus {
                acc = reduce(&acc, m);
            }
        }
        acc
    }

    /// One leading-term reduction step: `A` reduced by one term of `U`.
    ///
    /// Returns `(remainder, quotient_step, ok)`. `ok = false` means no
    /// progress was made (degree too small, or the integer reduction of
    /// leading coefficients failed); `remainder` is then just `self.clone()`.
    pub fn reduce_step(&self, divisor: &Polynomial) -> (Polynomial, Polynomial, bool) {
        let zero_step = Polynomial::zero(self.modulus.clone());
        if divisor.is_null() || self.degree() < divisor.degree() {
            return (self.clone(), zero_step, false);
        }
        let a = self.lead_coef();
        let b = divisor.lead_coef();
        let m = self.common_modulus(divisor);
        let quotient = match integer_reduce(&a, &b, m.as_ref()) {
            Some(q) => q,
            None => return (self.clone(), zero_step, false),
        };

        let shift = self.degree() - divisor.degree();
        let mut q_coefs = vec![BigInt::zero(); shift + 1];
        q_coefs[shift] = quotient;
        let q_step = Polynomial::new(q_coefs, m.clone());

        let remainder = self - &(&q_step * divisor);
        (remainder, q_step, true)
    }

    /// Repeatedly apply [`Polynomial::reduce_step`] until it cannot progress
    /// further; return the final remainder.
    pub fn mod_reduce(&self, divisor: &Polynomial) -> Polynomial {
        let mut r = self.clone();
        loop {
            let (next_r, _q, ok) = r.reduce_step(divisor);
            if !ok {
                return r;
            }
            r = next_r;
        }
    }

    /// Euclidean division: returns `(quotient, remainder)`.
    pub fn divmod(&self, divisor: &Polynomial) -> (Polynomial, Polynomial) {
        let mut r = self.clone();
        let mut q = Polynomial::zero(self.common_modulus(divisor));
        loop {
            let (next_r, q_step, ok) = r.reduce_step(divisor);
            if !ok {
                return (q, r);
            }
            q = &q + &q_step;
            r = next_r;
        }
    }

    /// `%` in the Python source: remainder of Euclidean division.
    pub fn rem(&self, divisor: &Polynomial) -> Polynomial {
        self.mod_reduce(divisor)
    }

    /// Extended Euclidean algorithm over polynomials.
    ///
    /// Returns `(g, v, w)` with `g = self*v + other*w`. When a plain
    /// `divmod` step stalls because the divisor's leading coefficient
    /// obstructs further reduction (the remainder equals the dividend), the
    /// dividend is first rescaled by the divisor's leading coefficient, and
    /// that scalar is carried into the `s`/`t` Bezout updates (spec §4.1,
    /// §9). `g` may end up a scalar multiple of the true GCD; callers only
    /// rely on divisibility, never equality, as the spec notes.
    pub fn extended_gcd(&self, other: &Polynomial) -> (Polynomial, Polynomial, Polynomial) {
        let m = self.common_modulus(other);
        let mut r = vec![self.clone(), other.clone()];
        let mut s = vec![
            Polynomial::constant(BigInt::one(), m.clone()),
            Polynomial::zero(m.clone()),
        ];
        let mut t = vec![
            Polynomial::zero(m.clone()),
            Polynomial::constant(BigInt::one(), m.clone()),
        ];

        // Bounded defensively: each iteration strictly decreases degree(r1)
        // in the non-stalling case; the rescue case re-divides after
        // rescaling, so it also makes progress or the loop below breaks.
        let cap = 4 * (self.degree() + other.degree() + 16);
        for _ in 0..cap {
            let r1 = r.last().unwrap().clone();
            if r1.is_null() {
                break;
            }
            let r0 = r[r.len() - 2].clone();
            let (q, r2) = r0.divmod(&r1);

            if r2 != r0 {
                let s_new = &s[s.len() - 2] - &(&q * &s[s.len() - 1]);
                let t_new = &t[t.len() - 2] - &(&q * &t[t.len() - 1]);
                r.push(r2.clone());
                s.push(s_new);
                t.push(t_new);
                if r2.is_null() {
                    break;
                }
            } else {
                // Stalled: rescale r0 by lead(r1) and divide again.
                let lead1 = r1.lead_coef();
                let lead1_poly = Polynomial::constant(lead1, m.clone());
                let r0_scaled = &r0 * &lead1_poly;
                let (q2, r2_scaled) = r0_scaled.divmod(&r1);
                let s_new = &(&s[s.len() - 2] * &lead1_poly) - &(&q2 * &s[s.len() - 1]);
                let t_new = &(&t[t.len() - 2] * &lead1_poly) - &(&q2 * &t[t.len() - 1]);
                r.push(r2_scaled.clone());
                s.push(s_new);
                t.push(t_new);
                if r2_scaled == r0_scaled || r2_scaled.is_null() {
                    break;
                }
            }
        }

        let idx = r.len() - 2;
        (r[idx].clone(), s[idx].clone(), t[idx].clone())
    }

    /// Random polynomial of length `d`, coefficients uniform in `[0, m)`.
    pub fn random_poly<R: Rng + ?Sized>(rng: &mut R, m: &BigInt, d: usize) -> Polynomial {
        use num_bigint::RandBigInt;
        let coefs = (0..d.max(1))
            .map(|_| rng.gen_bigint_range(&BigInt::zero(), m))
            .collect();
        Polynomial::new(coefs, Some(m.clone()))
    }

    /// Random monomial: a single nonzero coefficient `c mod m` placed at a
    /// random position `k in [0, d)`; the result has length `k + 1`.
    pub fn random_shift<R: Rng + ?Sized>(
        rng: &mut R,
        c: &BigInt,
        m: &BigInt,
        d: usize,
    ) -> Polynomial {
        let k = rng.gen_range(0..d.max(1));
        let mut coefs = vec![BigInt::zero(); k + 1];
        coefs[k] = reduce(c, m);
        Polynomial::new(coefs, Some(m.clone()))
    }

    /// Build a random polynomial of length `d` over `Z/mZ` whose value at
    /// `X = 1` equals `target mod m`, by drawing a random base polynomial
    /// and adding a [`Polynomial::random_shift`] that corrects the residual
    /// (spec §4.4's construction of `u`, `x`, `e`, `f0`).
    pub fn with_value_at_one<R: Rng + ?Sized>(
        rng: &mut R,
        target: &BigInt,
        m: &BigInt,
        d: usize,
    ) -> Polynomial {
        let base = Polynomial::random_poly(rng, m, d);
        let residual = mod_q(&(target - base.evaluate(&BigInt::one())), m);
        let shift = Polynomial::random_shift(rng, &residual, m, d);
        &base + &shift
    }

    /// Validate that `reduce_step` can make progress against a monic `U`
    /// (used at call sites that require the modulus polynomial to behave).
    pub fn require_progress(&self, divisor: &Polynomial) -> Result<()> {
        if self.degree() >= divisor.degree() {
            let a = self.lead_coef();
            let b = divisor.lead_coef();
            let m = self.common_modulus(divisor);
            if integer_reduce(&a, &b, m.as_ref()).is_none() {
                return Err(AcesError::NonMonicModulus {
                    modulus: m.map(|m| m.to_string()).unwrap_or_else(|| "none".into()),
                });
            }
        }
        Ok(())
    }
}

impl PartialEq for Polynomial {
    fn eq(&self, other: &Self) -> bool {
        if self.modulus != other.modulus {
            return false;
        }
        let d = self.degree().max(other.degree());
        (0..=d).all(|i| self.coef_at(i) == other.coef_at(i))
    }
}
impl Eq for Polynomial {}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = (0..=self.degree())
            .rev()
            .filter(|&k| !self.coef_at(k).is_zero())
            .map(|k| format!("[{}]^{}", self.coef_at(k), k))
            .collect();
        let body = if terms.is_empty() {
            "[0]^0".to_string()
        } else {
            terms.join("+")
        };
        match &self.modulus {
            Some(m) => write!(f, "{body} ({m})"),
            None => write!(f, "{body} (None)"),
        }
    }
}

/// Determine whether lead coefficient `a` can be reduced by `b`, returning
/// the quotient. Tries exact division first; if a modulus `m` is present,
/// searches `k in [1, b)` for the smallest shift making `a + k*m` divisible
/// by `b` (spec §4.1). Returns `None` on failure or an over-large search.
pub fn integer_reduce(a: &BigInt, b: &BigInt, m: Option<&BigInt>) -> Option<BigInt> {
    if b.is_zero() {
        return None;
    }
    if (a % b).is_zero() {
        return Some(a / b);
    }
    let m = m?;
    if b <= &BigInt::zero() {
        return None;
    }
    let bound = match b.to_string().parse::<u128>() {
        Ok(v) => v.min(INTEGER_REDUCE_SEARCH_CAP as u128) as u64,
        Err(_) => INTEGER_REDUCE_SEARCH_CAP,
    };
    for k in 1..bound {
        let candidate = a + BigInt::from(k) * m;
        if (&candidate % b).is_zero() {
            return Some(candidate / b);
        }
    }
    None
}

fn reduce(val: &BigInt, m: &BigInt) -> BigInt {
    mod_q(val, m)
}

fn add_coefs(a: &Polynomial, b: &Polynomial, m: Option<BigInt>) -> Polynomial {
    let len = a.coefs.len().max(b.coefs.len());
    let coefs = (0..len).map(|i| a.coef_at(i) + b.coef_at(i)).collect();
    Polynomial::new(coefs, m)
}

fn sub_coefs(a: &Polynomial, b: &Polynomial, m: Option<BigInt>) -> Polynomial {
    let len = a.coefs.len().max(b.coefs.len());
    let coefs = (0..len).map(|i| a.coef_at(i) - b.coef_at(i)).collect();
    Polynomial::new(coefs, m)
}

fn mul_coefs(a: &Polynomial, b: &Polynomial, m: Option<BigInt>) -> Polynomial {
    let da = a.degree();
    let db = b.degree();
    let mut coefs = vec![BigInt::zero(); da + db + 1];
    for (i, ca) in a.coefs.iter().enumerate().take(da + 1) {
        if ca.is_zero() {
            continue;
        }
        for (j, cb) in b.coefs.iter().enumerate().take(db + 1) {
            coefs[i + j] += ca * cb;
        }
    }
    Polynomial::new(coefs, m)
}

impl Add for &Polynomial {
    type Output = Polynomial;
    fn add(self, other: &Polynomial) -> Polynomial {
        add_coefs(self, other, self.common_modulus(other))
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;
    fn sub(self, other: &Polynomial) -> Polynomial {
        sub_coefs(self, other, self.common_modulus(other))
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;
    fn mul(self, other: &Polynomial) -> Polynomial {
        mul_coefs(self, other, self.common_modulus(other))
    }
}

impl Add for Polynomial {
    type Output = Polynomial;
    fn add(self, other: Polynomial) -> Polynomial {
        &self + &other
    }
}
impl Sub for Polynomial {
    type Output = Polynomial;
    fn sub(self, other: Polynomial) -> Polynomial {
        &self - &other
    }
}
impl Mul for Polynomial {
    type Output = Polynomial;
    fn mul(self, other: Polynomial) -> Polynomial {
        &self * &other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(coefs: &[i64], m: i64) -> Polynomial {
        Polynomial::new(
            coefs.iter().map(|&c| BigInt::from(c)).collect(),
            Some(BigInt::from(m)),
        )
    }

    #[test]
    fn degree_and_lead_coef() {
        let a = p(&[1, 0, 3, 0], 100);
        assert_eq!(a.degree(), 2);
        assert_eq!(a.lead_coef(), BigInt::from(3));
        assert!(p(&[0, 0], 100).is_null());
    }

    #[test]
    fn add_mul_agree_with_hand_computation() {
        let a = p(&[1, 2], 1000); // 1 + 2x
        let b = p(&[3, 4], 1000); // 3 + 4x
        let sum = &a + &b;
        assert_eq!(sum, p(&[4, 6], 1000));
        let prod = &a * &b; // (1+2x)(3+4x) = 3 + 10x + 8x^2
        assert_eq!(prod, p(&[3, 10, 8], 1000));
    }

    #[test]
    fn evaluate_horner_matches_direct_sum() {
        // P(x) = 1 + 2x + 3x^2, evaluate at 5 => 1 + 10 + 75 = 86
        let a = p(&[1, 2, 3], 1_000_000);
        assert_eq!(a.evaluate(&BigInt::from(5)), BigInt::from(86));
    }

    #[test]
    fn divmod_reconstructs_dividend() {
        let a = p(&[1, 1, 0, 1, 0, 1, 0, 1, 0, 1], 2);
        let b = p(&[1, 0, 1, 1, 0, 1, 1, 1, 1, 1], 2);
        let (q, r) = a.divmod(&b);
        assert_eq!(&(&b * &q) + &r, a);
    }

    #[test]
    fn extended_gcd_satisfies_bezout_over_z_no_modulus() {
        // spec §8 scenario 5: F = (14+X)(45+3X)(1+6X)(25+2X) over plain Z[X],
        // no coefficient modulus — this is the case that actually exercises
        // the rescue branch's stall/rescale path.
        let q = |coefs: &[i64]| Polynomial::new(coefs.iter().map(|&c| BigInt::from(c)).collect(), None);
        let f = &(&q(&[14, 1]) * &q(&[45, 3])) * &(&q(&[1, 6]) * &q(&[25, 2]));
        let a_ = q(&[1, 1, 0, 1, 2]);
        let b_ = q(&[0, 1, 1, 0, 3]);
        let a = &f * &a_;
        let b = &f * &b_;
        let (g, v, w) = a.extended_gcd(&b);
        let combo = &(&a * &v) + &(&w * &b);
        assert_eq!(combo, g);
        assert!(combo.rem(&f).is_null());
    }

    #[test]
    fn mod_none_arithmetic_stays_unreduced() {
        let a = Polynomial::new(vec![BigInt::from(5), BigInt::from(7)], None);
        let b = Polynomial::new(vec![BigInt::from(2)], None);
        let sum = &a + &b;
        assert_eq!(sum.coefs()[0], BigInt::from(7));
    }
}
