//! ACES: a fully homomorphic encryption scheme over integer polynomial
//! rings `Z/qZ[X] / (u)`.
//!
//! A public-key holder encrypts integers modulo a small plaintext modulus
//! `p`; ciphertexts support homomorphic `add`/`mult`; the secret-key holder
//! decrypts. A refresh subprotocol reduces accumulated noise so that
//! computation depth is not bounded by a single fixed noise budget.
//!
//! # Example
//!
//! ```ignore
//! use aces_rs::params::Params;
//! use aces_rs::repartition::Repartition;
//! use aces_rs::channel::ArithChannel;
//! use aces_rs::aces::{Aces, AcesReader};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let params = Params::toy();
//! let mut rng = ChaCha20Rng::seed_from_u64(0);
//! let mut repartition = Repartition::new(params.n, params.p.clone(), params.upperbound.clone());
//! repartition.construct(&mut rng).unwrap();
//! let channel = ArithChannel::new(&mut rng, params.p.clone(), params.capacity, params.deg_u, repartition, None);
//! let public = channel.publish();
//! let aces = Aces::new(public, None);
//! let reader = AcesReader::from_channel(&channel);
//!
//! let c = aces.encrypt(&mut rng, &num_bigint::BigInt::from(1));
//! assert_eq!(reader.decrypt(&c), num_bigint::BigInt::from(1));
//! ```

pub mod aces;
pub mod algebra;
pub mod arith;
pub mod channel;
pub mod cipher;
pub mod classifier;
pub mod error;
pub mod modular;
pub mod params;
pub mod poly;
pub mod repartition;

pub use aces::{Aces, AcesReader};
pub use algebra::{AcesAlgebra, Algebra, Compiler, PlainAlgebra};
pub use channel::{ArithChannel, PublicParams};
pub use cipher::{Cipher, PseudoCipher};
pub use classifier::{Classifier, PublicClassifier};
pub use error::{AcesError, Result};
pub use params::{Params, Scenario};
pub use poly::Polynomial;
pub use repartition::{Repartition, SigmaMode};

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn build(scenario: Scenario, seed: u64) -> (ArithChannel, Params) {
        let params = Params::new(scenario);
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut repartition = Repartition::new(params.n, params.p.clone(), params.upperbound.clone());
        repartition.construct(&mut rng).unwrap();
        let channel = ArithChannel::new(
            &mut rng,
            params.p.clone(),
            params.capacity,
            params.deg_u,
            repartition,
            None,
        );
        (channel, params)
    }

    #[test]
    fn scenario_1_binary_add_and_mult() {
        let (channel, _params) = build(Scenario::Binary, 1);
        let public = channel.publish();
        let aces = Aces::new(public.clone(), None);
        let reader = AcesReader::from_channel(&channel);
        let tensor = public.tensor.clone();
        let mut algebra = AcesAlgebra::new(
            public.p.clone(),
            public.q.clone(),
            public.n,
            tensor,
            public.u.clone(),
            None,
            None,
            None,
        );

        let mut rng = ChaCha20Rng::seed_from_u64(2);
        for m1 in [0u64, 1] {
            for m2 in [0u64, 1] {
                let c1 = aces.encrypt(&mut rng, &BigInt::from(m1));
                let c2 = aces.encrypt(&mut rng, &BigInt::from(m2));
                let sum = algebra.add(&c1, &c2).unwrap();
                let prod = algebra.mult(&c1, &c2).unwrap();
                assert_eq!(reader.decrypt(&sum), BigInt::from((m1 + m2) % 2));
                assert_eq!(reader.decrypt(&prod), BigInt::from((m1 * m2) % 2));
            }
        }
    }

    #[test]
    fn scenario_2_nibble_fifty_random_pairs() {
        let (channel, _params) = build(Scenario::Nibble, 3);
        let public = channel.publish();
        let aces = Aces::new(public.clone(), None);
        let reader = AcesReader::from_channel(&channel);
        let mut algebra = AcesAlgebra::new(
            public.p.clone(),
            public.q.clone(),
            public.n,
            public.tensor.clone(),
            public.u.clone(),
            None,
            None,
            None,
        );

        let mut rng = ChaCha20Rng::seed_from_u64(4);
        for _ in 0..50 {
            let m1 = rng.gen_range(0u64..4);
            let m2 = rng.gen_range(0u64..4);
            let c1 = aces.encrypt(&mut rng, &BigInt::from(m1));
            let c2 = aces.encrypt(&mut rng, &BigInt::from(m2));
            let sum = algebra.add(&c1, &c2).unwrap();
            let prod = algebra.mult(&c1, &c2).unwrap();
            assert_eq!(reader.decrypt(&sum), BigInt::from((m1 + m2) % 4));
            assert_eq!(reader.decrypt(&prod), BigInt::from((m1 * m2) % 4));
        }
    }

    #[test]
    fn scenario_3_compiled_expression_matches_plaintext() {
        let (channel, _params) = build(Scenario::BinaryWide, 5);
        let public = channel.publish();
        let aces = Aces::new(public.clone(), None);
        let reader = AcesReader::from_channel(&channel);
        let mut algebra = AcesAlgebra::new(
            public.p.clone(),
            public.q.clone(),
            public.n,
            public.tensor.clone(),
            public.u.clone(),
            None,
            None,
            None,
        );

        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let plain: Vec<u64> = (0..8).map(|_| rng.gen_range(0u64..2)).collect();
        let ciphers: Vec<Cipher> = plain
            .iter()
            .map(|m| aces.encrypt(&mut rng, &BigInt::from(*m)))
            .collect();

        let compiler = Compiler::new("0*1+2*5+3*4+6*7+1*5");
        let mut plain_algebra = PlainAlgebra;
        let plain_result = compiler
            .run::<PlainAlgebra>(
                &plain.iter().map(|&m| m as i64).collect::<Vec<_>>(),
                &mut plain_algebra,
            )
            .unwrap();

        let cipher_result = compiler.run::<AcesAlgebra>(&ciphers, &mut algebra).unwrap();
        let decrypted = reader.decrypt(&cipher_result);
        assert_eq!(decrypted, BigInt::from(plain_result.rem_euclid(2)));
    }

    #[test]
    fn scenario_4_automatic_refresh_matches_plaintext() {
        let (channel, _params) = build(Scenario::Nibble, 8);
        let public = channel.publish();
        let aces = Aces::new(public.clone(), None);
        let reader = AcesReader::from_channel(&channel);

        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let plain: Vec<u64> = (0..8).map(|_| rng.gen_range(0u64..4)).collect();
        let ciphers: Vec<Cipher> = plain
            .iter()
            .map(|m| aces.encrypt(&mut rng, &BigInt::from(*m)))
            .collect();

        let refresher = reader.generate_refresher(&mut rng, 1, 80);
        let classifier = Classifier::new(
            channel.repartition.x_images.clone(),
            public.p.clone(),
            public.q.clone(),
        );
        let mut enc_rng = ChaCha20Rng::seed_from_u64(10);
        let enc_aces = aces.clone();
        let mut algebra = AcesAlgebra::new(
            public.p.clone(),
            public.q.clone(),
            public.n,
            public.tensor.clone(),
            public.u.clone(),
            Some(Box::new(move |m: &BigInt| enc_aces.encrypt(&mut enc_rng, m))),
            Some(refresher),
            Some(Box::new(move |c: &Cipher| classifier.refresh_classifier(c))),
        );

        let compiler = Compiler::new("(((0*1+2*3+4*5)*6+7)*3)*2");
        let mut plain_algebra = PlainAlgebra;
        let plain_result = compiler
            .run::<PlainAlgebra>(
                &plain.iter().map(|&m| m as i64).collect::<Vec<_>>(),
                &mut plain_algebra,
            )
            .unwrap();

        let cipher_result = compiler.run::<AcesAlgebra>(&ciphers, &mut algebra).unwrap();
        let decrypted = reader.decrypt(&cipher_result);
        assert_eq!(decrypted, BigInt::from(plain_result.rem_euclid(4)));
    }

    #[test]
    fn scenario_6_public_classifier_implies_decrypt_preserved_across_refresh() {
        let (channel, _params) = build(Scenario::Nibble, 11);
        let public = channel.publish();
        let reader = AcesReader::from_channel(&channel);
        let aces = Aces::new(public.clone(), None);

        let secret_classifier = Classifier::new(
            channel.repartition.x_images.clone(),
            public.p.clone(),
            public.q.clone(),
        );
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let (locators, directors) = secret_classifier
            .find_affine(&mut rng, public.n, 0, 2, 2000)
            .expect("converges within budget");
        let public_classifier =
            PublicClassifier::new(locators, directors, public.p.clone(), public.q.clone(), public.n);

        let refresher = reader.generate_refresher(&mut rng, 1, 80);
        let mut algebra = AcesAlgebra::new(
            public.p.clone(),
            public.q.clone(),
            public.n,
            public.tensor.clone(),
            public.u.clone(),
            None,
            None,
            None,
        );

        let mut enc_rng = ChaCha20Rng::seed_from_u64(13);
        let mut checked = 0;
        for m in 0u64..4 {
            for _ in 0..100 {
                let c = reader.encrypt(&mut rng, &BigInt::from(m), 1, 5);
                let pseudo = c.pseudo();
                if !public_classifier.classify(&pseudo.dec_vals, &c.lvl) {
                    continue;
                }
                let before = reader.decrypt(&c);
                let (a_c, b_c) = c
                    .corefresher(&public.p, &public.q, |msg| Ok(aces.encrypt(&mut enc_rng, msg)))
                    .expect("corefresher succeeds");
                let refreshed = algebra
                    .refresh(&refresher, &a_c, &b_c)
                    .expect("refresh succeeds");
                let after = reader.decrypt(&refreshed);
                assert_eq!(before, after);
                checked += 1;
            }
        }
        assert!(
            checked > 0,
            "public classifier should flag at least one sampled cipher"
        );
    }
}
