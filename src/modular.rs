//! Modular arithmetic utilities over arbitrary-precision integers.
//!
//! Coefficients of ciphertext polynomials multiply and sum to products of
//! three `q`-sized values (spec §3), so plain machine integers are not wide
//! enough in general; everything here works over [`BigInt`].

use num_bigint::BigInt;
use num_traits::Signed;

/// Reduce `val` to the range `[0, q)`. Used throughout the crate in place of
/// the `((val % q) + q) % q` idiom wherever a BigInt needs a non-negative
/// representative.
#[inline]
pub fn mod_q(val: &BigInt, q: &BigInt) -> BigInt {
    let mut r = val % q;
    if r.is_negative() {
        r += q;
    }
    r
}
