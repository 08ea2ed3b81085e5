//! Ciphertext value types shared by encryption, decryption, and the
//! homomorphic algebra (spec §3).

use num_bigint::BigInt;
use num_traits::Zero;

use crate::error::Result;
use crate::modular::mod_q;
use crate::poly::Polynomial;

/// A ciphertext: `n` linearization components `dec`, one encryption
/// component `enc`, and a tracked noise level `lvl`.
#[derive(Clone, Debug)]
pub struct Cipher {
    pub dec: Vec<Polynomial>,
    pub enc: Polynomial,
    pub lvl: BigInt,
}

/// `Cipher` evaluated at `X = 1`: the value-only view used by the refresh
/// helper and the classifier.
#[derive(Clone, Debug)]
pub struct PseudoCipher {
    pub dec_vals: Vec<BigInt>,
    pub enc_val: BigInt,
}

impl Cipher {
    pub fn new(dec: Vec<Polynomial>, enc: Polynomial, lvl: BigInt) -> Self {
        Cipher { dec, enc, lvl }
    }

    /// Evaluate every component at `X = 1` (spec §3 `PseudoCipher`).
    pub fn pseudo(&self) -> PseudoCipher {
        let one = BigInt::from(1);
        PseudoCipher {
            dec_vals: self.dec.iter().map(|d| d.evaluate(&one)).collect(),
            enc_val: self.enc.evaluate(&one),
        }
    }

    /// Build the refresh helper pair `(a, b)` from spec §4.5 `corefresher`:
    /// negate the pseudo-ciphertext's `dec` components modulo `q`, encrypt
    /// each negated component and the `enc` value mod `p`, using whatever
    /// encryption routine the caller supplies (public-key or symmetric).
    pub fn corefresher(
        &self,
        p: &BigInt,
        q: &BigInt,
        mut encrypt: impl FnMut(&BigInt) -> Result<Cipher>,
    ) -> Result<(Vec<Cipher>, Cipher)> {
        let pseudo = self.pseudo();
        let mut a = Vec::with_capacity(pseudo.dec_vals.len());
        for dec_i in &pseudo.dec_vals {
            let negated = mod_q(&(q - dec_i), q);
            let reduced = mod_q(&negated, p);
            a.push(encrypt(&reduced)?);
        }
        let enc_reduced = mod_q(&pseudo.enc_val, p);
        let b = encrypt(&enc_reduced)?;
        Ok((a, b))
    }
}

impl PseudoCipher {
    pub fn is_zero_cipher(&self) -> bool {
        self.enc_val.is_zero() && self.dec_vals.iter().all(Zero::is_zero)
    }
}
