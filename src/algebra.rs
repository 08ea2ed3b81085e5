//! Homomorphic algebra (C6): ciphertext `add`/`mult` with tensor-based
//! relinearization, the automatic-refresh driver, and a generic
//! string-expression compiler usable over any `Algebra` implementation.

use num_bigint::BigInt;
use num_traits::{One, Zero};
use tracing::{debug, instrument, trace};

use crate::cipher::Cipher;
use crate::error::{AcesError, Result};
use crate::poly::Polynomial;

/// An algebra supporting `add`/`mult` over some operand type. The
/// [`Compiler`] works unchanged for any implementation, mirroring
/// `compaces.py`'s duck-typed `Algebra` class.
pub trait Algebra {
    type Operand: Clone;
    fn add(&mut self, a: &Self::Operand, b: &Self::Operand) -> Result<Self::Operand>;
    fn mult(&mut self, a: &Self::Operand, b: &Self::Operand) -> Result<Self::Operand>;
}

/// Plain-integer reference algebra, used to check a compiled expression
/// against direct plaintext evaluation (spec §4.6, `compaces.py::Algebra`).
#[derive(Default)]
pub struct PlainAlgebra;

impl Algebra for PlainAlgebra {
    type Operand = i64;
    fn add(&mut self, a: &i64, b: &i64) -> Result<i64> {
        Ok(a + b)
    }
    fn mult(&mut self, a: &i64, b: &i64) -> Result<i64> {
        Ok(a * b)
    }
}

/// Ciphertext algebra: `add`, `mult`, and an automatic-refresh driver that
/// keeps noise under the saturation budget (spec §4.6).
pub struct AcesAlgebra {
    pub p: BigInt,
    pub q: BigInt,
    pub n: usize,
    pub tensor: Vec<Vec<Vec<BigInt>>>,
    pub u: Polynomial,
    pub refresher: Option<Vec<Cipher>>,
    pub encrypter: Option<Box<dyn FnMut(&BigInt) -> Cipher>>,
    pub classifier: Option<Box<dyn Fn(&Cipher) -> bool>>,
}

impl AcesAlgebra {
    pub fn new(
        p: BigInt,
        q: BigInt,
        n: usize,
        tensor: Vec<Vec<Vec<BigInt>>>,
        u: Polynomial,
        encrypter: Option<Box<dyn FnMut(&BigInt) -> Cipher>>,
        refresher: Option<Vec<Cipher>>,
        classifier: Option<Box<dyn Fn(&Cipher) -> bool>>,
    ) -> Self {
        AcesAlgebra {
            p,
            q,
            n,
            tensor,
            u,
            refresher,
            encrypter,
            classifier,
        }
    }

    fn noise_budget(&self) -> BigInt {
        (&self.q + BigInt::one()) / &self.p - BigInt::one()
    }

    fn saturated(&self, projected: &BigInt) -> bool {
        let budget = self.noise_budget();
        if budget <= BigInt::zero() {
            return true;
        }
        projected * BigInt::from(100) >= &budget * BigInt::from(99)
    }

    #[instrument(skip_all)]
    pub fn add(&mut self, a: &Cipher, b: &Cipher) -> Result<Cipher> {
        self.add_impl(a, b, true)
    }

    #[instrument(skip_all)]
    pub fn mult(&mut self, a: &Cipher, b: &Cipher) -> Result<Cipher> {
        self.mult_impl(a, b, true)
    }

    fn add_impl(&mut self, a: &Cipher, b: &Cipher, allow_refresh: bool) -> Result<Cipher> {
        let p_minus_1 = &self.p - BigInt::one();
        let projected = &a.lvl + &b.lvl + (BigInt::from(2) * &p_minus_1) / &self.p;

        if allow_refresh && self.saturated(&projected) {
            let (a2, b2) = self.refresh_pair(a, b)?;
            return self.add_impl(&a2, &b2, false);
        }
        if self.saturated(&projected) {
            return Err(AcesError::Saturation {
                projected: projected.to_string(),
                budget: self.noise_budget().to_string(),
            });
        }

        let dec: Vec<Polynomial> = a
            .dec
            .iter()
            .zip(b.dec.iter())
            .map(|(ak, bk)| (ak + bk).mod_reduce(&self.u))
            .collect();
        let enc = (&a.enc + &b.enc).mod_reduce(&self.u);
        Ok(Cipher::new(dec, enc, projected))
    }

    fn mult_impl(&mut self, a: &Cipher, b: &Cipher, allow_refresh: bool) -> Result<Cipher> {
        let p_minus_1 = &self.p - BigInt::one();
        let projected = (&a.lvl + &b.lvl + &a.lvl * &b.lvl) * &self.p
            + (&p_minus_1 * &p_minus_1) / &self.p;

        if allow_refresh && self.saturated(&projected) {
            let (a2, b2) = self.refresh_pair(a, b)?;
            return self.mult_impl(&a2, &b2, false);
        }
        if self.saturated(&projected) {
            return Err(AcesError::Saturation {
                projected: projected.to_string(),
                budget: self.noise_budget().to_string(),
            });
        }

        let q = self.q.clone();
        let mut dec = Vec::with_capacity(self.n);
        for k in 0..self.n {
            let mut inner = Polynomial::zero(Some(q.clone()));
            for i in 0..self.n {
                let mut lambda_sum = Polynomial::zero(Some(q.clone()));
                for j in 0..self.n {
                    let lambda_kij = Polynomial::constant(self.tensor[k][i][j].clone(), Some(q.clone()));
                    lambda_sum = &lambda_sum + &(&lambda_kij * &b.dec[j]);
                }
                inner = &inner + &(&a.dec[i] * &lambda_sum);
            }
            let term1 = &b.enc * &a.dec[k];
            let term2 = &a.enc * &b.dec[k];
            let dec_k = &(&term1 + &term2) - &inner;
            dec.push(dec_k.mod_reduce(&self.u));
        }
        let enc = (&a.enc * &b.enc).mod_reduce(&self.u);
        Ok(Cipher::new(dec, enc, projected))
    }

    /// Refresh both operands of a saturating operation (spec §4.6
    /// "Automatic refresh driver").
    fn refresh_pair(&mut self, a: &Cipher, b: &Cipher) -> Result<(Cipher, Cipher)> {
        let a2 = self.try_refresh_operand(a)?;
        let b2 = self.try_refresh_operand(b)?;
        Ok((a2, b2))
    }

    fn assess_refresh_level(&self, refresher: &[Cipher], a_c: &[Cipher], b_c: &Cipher) -> BigInt {
        let p_minus_1 = &self.p - BigInt::one();
        let xi = (&p_minus_1 + BigInt::from(self.n as u64) * &p_minus_1 * &p_minus_1) / &self.p;
        let mut estimated = xi + &b_c.lvl;
        for (a_ci, r_i) in a_c.iter().zip(refresher.iter()) {
            estimated += &self.p * (&a_ci.lvl + &r_i.lvl + &a_ci.lvl * &r_i.lvl);
        }
        estimated
    }

    fn try_refresh_operand(&mut self, operand: &Cipher) -> Result<Cipher> {
        let refresher = self
            .refresher
            .clone()
            .ok_or(AcesError::RefreshNotConfigured)?;
        if self.encrypter.is_none() || self.classifier.is_none() {
            return Err(AcesError::RefreshNotConfigured);
        }

        let (a_c, b_c) = {
            let encrypter = self.encrypter.as_mut().unwrap();
            operand.corefresher(&self.p, &self.q, |m| Ok(encrypter(m)))?
        };

        let estimated = self.assess_refresh_level(&refresher, &a_c, &b_c);
        if estimated >= operand.lvl {
            debug!("refresh would not reduce noise; keeping operand");
            return Ok(operand.clone());
        }

        let mut candidate = operand.clone();
        let classifier = self.classifier.take().unwrap();
        let is_refreshable = classifier(&candidate);
        let mut refreshable = is_refreshable;
        let max_attempts = 10_000;
        let mut attempts = 0;
        while !refreshable {
            attempts += 1;
            if attempts > max_attempts {
                self.classifier = Some(classifier);
                return Err(AcesError::ClassifierExhausted);
            }
            let zero = {
                let encrypter = self.encrypter.as_mut().unwrap();
                encrypter(&BigInt::zero())
            };
            candidate = self.add_impl(&candidate, &zero, false)?;
            refreshable = classifier(&candidate);
        }
        self.classifier = Some(classifier);

        let (a_c, b_c) = {
            let encrypter = self.encrypter.as_mut().unwrap();
            candidate.corefresher(&self.p, &self.q, |m| Ok(encrypter(m)))?
        };
        let refreshed = self.refresh(&refresher, &a_c, &b_c)?;

        if refreshed.lvl < operand.lvl {
            trace!(old = %operand.lvl, new = %refreshed.lvl, "refresh reduced noise");
            Ok(refreshed)
        } else {
            Ok(operand.clone())
        }
    }

    /// `result = b_c + sum_i a_c[i] * refresher[i]`, computed with
    /// `refresh = false` to avoid unbounded recursion (spec §4.6).
    pub fn refresh(&mut self, refresher: &[Cipher], a_c: &[Cipher], b_c: &Cipher) -> Result<Cipher> {
        let mut acc = b_c.clone();
        for (a_ci, r_i) in a_c.iter().zip(refresher.iter()) {
            let term = self.mult_impl(a_ci, r_i, false)?;
            acc = self.add_impl(&acc, &term, false)?;
        }
        Ok(acc)
    }
}

impl Algebra for AcesAlgebra {
    type Operand = Cipher;
    fn add(&mut self, a: &Cipher, b: &Cipher) -> Result<Cipher> {
        AcesAlgebra::add(self, a, b)
    }
    fn mult(&mut self, a: &Cipher, b: &Cipher) -> Result<Cipher> {
        AcesAlgebra::mult(self, a, b)
    }
}

/// Parsed arithmetic tree over operand indices (spec §4.6 compiler).
#[derive(Clone, Debug)]
enum Expr {
    Leaf(usize),
    Add(Box<Expr>, Box<Expr>),
    Mult(Box<Expr>, Box<Expr>),
}

fn find_top_level(s: &str, target: char) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == target && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_expr(s: &str) -> Expr {
    let s = s.trim();
    if let Some(pos) = find_top_level(s, '+') {
        return Expr::Add(
            Box::new(parse_expr(&s[..pos])),
            Box::new(parse_expr(&s[pos + 1..])),
        );
    }
    if let Some(pos) = find_top_level(s, '*') {
        return Expr::Mult(
            Box::new(parse_expr(&s[..pos])),
            Box::new(parse_expr(&s[pos + 1..])),
        );
    }
    if s.starts_with('(') && s.ends_with(')') {
        return parse_expr(&s[1..s.len() - 1]);
    }
    Expr::Leaf(s.parse().expect("leaf token must be an operand index"))
}

fn eval_expr<A: Algebra>(expr: &Expr, operands: &[A::Operand], algebra: &mut A) -> Result<A::Operand> {
    match expr {
        Expr::Leaf(i) => Ok(operands[*i].clone()),
        Expr::Add(l, r) => {
            let lv = eval_expr(l, operands, algebra)?;
            let rv = eval_expr(r, operands, algebra)?;
            algebra.add(&lv, &rv)
        }
        Expr::Mult(l, r) => {
            let lv = eval_expr(l, operands, algebra)?;
            let rv = eval_expr(r, operands, algebra)?;
            algebra.mult(&lv, &rv)
        }
    }
}

/// Compiles a string like `"(0*1+2*3)*4+5"` into a reusable tree, then runs
/// it against any [`Algebra`] implementation over a supplied operand array
/// (spec §4.6).
pub struct Compiler {
    tree: Expr,
}

impl Compiler {
    pub fn new(expr: &str) -> Self {
        Compiler {
            tree: parse_expr(expr),
        }
    }

    pub fn run<A: Algebra>(&self, operands: &[A::Operand], algebra: &mut A) -> Result<A::Operand> {
        eval_expr(&self.tree, operands, algebra)
    }
}
