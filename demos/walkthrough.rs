//! Demo: ACES homomorphic encryption over a toy-scale arithmetic channel.

use aces_rs::{Aces, AcesAlgebra, AcesReader, Classifier, Compiler, Params, Repartition, Scenario};
use num_bigint::BigInt;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn main() {
    println!("ACES Arithmetic Channel Encryption Scheme - Demo\n");

    let params = Params::new(Scenario::Binary);
    println!(
        "Parameters: n={}, p={}, U={}, deg_u={}, N={}",
        params.n, params.p, params.upperbound, params.deg_u, params.capacity
    );

    let mut rng = ChaCha20Rng::seed_from_u64(0);

    println!("\n--- Channel construction ---");
    let mut repartition = Repartition::new(params.n, params.p.clone(), params.upperbound.clone());
    repartition
        .construct(&mut rng)
        .expect("repartition construction converges");
    let channel = aces_rs::ArithChannel::new(
        &mut rng,
        params.p.clone(),
        params.capacity,
        params.deg_u,
        repartition,
        None,
    );
    println!("q = {}", channel.q());
    println!("n0 (prime factors of q) = {}", channel.repartition.n0);

    let public = channel.publish();
    println!("max_saturation = {:.2}%", public.max_saturation);

    let bob = Aces::new(public.clone(), None);
    let alice = AcesReader::from_channel(&channel);

    println!("\n--- Basic encryption (public key) ---");
    for bit in [0u64, 1u64] {
        let c = bob.encrypt(&mut rng, &BigInt::from(bit));
        let dec = alice.decrypt(&c);
        println!(
            "Encrypt({}) -> Decrypt -> {} {}",
            bit,
            dec,
            if dec == BigInt::from(bit) { "\u{2713}" } else { "\u{2717}" }
        );
    }

    println!("\n--- Symmetric encryption (secret key) ---");
    for bit in [0u64, 1u64] {
        let c = alice.encrypt(&mut rng, &BigInt::from(bit), 1, 10);
        let dec = alice.decrypt(&c);
        println!(
            "EncryptSym({}) -> Decrypt -> {} {}",
            bit,
            dec,
            if dec == BigInt::from(bit) { "\u{2713}" } else { "\u{2717}" }
        );
    }

    println!("\n--- Homomorphic operations ---");
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

    let c0 = bob.encrypt(&mut rng, &BigInt::from(0u64));
    let c1 = bob.encrypt(&mut rng, &BigInt::from(1u64));

    let xor_01 = algebra.add(&c0, &c1).expect("addition within budget");
    let and_11 = algebra.mult(&c1, &c1).expect("multiplication within budget");
    println!(
        "0 + 1 = {} (expected 1) {}",
        alice.decrypt(&xor_01),
        if alice.decrypt(&xor_01) == BigInt::from(1u64) {
            "\u{2713}"
        } else {
            "\u{2717}"
        }
    );
    println!(
        "1 * 1 = {} (expected 1) {}",
        alice.decrypt(&and_11),
        if alice.decrypt(&and_11) == BigInt::from(1u64) {
            "\u{2713}"
        } else {
            "\u{2717}"
        }
    );

    println!("\n--- Compiled expression ---");
    let plain: Vec<u64> = vec![1, 0, 1, 1, 0, 1];
    let ciphers: Vec<_> = plain
        .iter()
        .map(|m| bob.encrypt(&mut rng, &BigInt::from(*m)))
        .collect();
    let compiler = Compiler::new("(0*1+2*3)*4+5");
    let result = compiler
        .run::<AcesAlgebra>(&ciphers, &mut algebra)
        .expect("expression stays within the noise budget");
    let expected = (plain[0] * plain[1] + plain[2] * plain[3]) * plain[4] + plain[5];
    println!(
        "(0*1+2*3)*4+5 = {} (expected {}) {}",
        alice.decrypt(&result),
        expected % 2,
        if alice.decrypt(&result) == BigInt::from(expected % 2) {
            "\u{2713}"
        } else {
            "\u{2717}"
        }
    );

    println!("\n--- Refresh classifier ---");
    let classifier = Classifier::new(
        channel.repartition.x_images.clone(),
        public.p.clone(),
        public.q.clone(),
    );
    let refreshable_before = classifier.is_refreshable(&and_11);
    println!("is_refreshable(1*1) = {refreshable_before}");
    let refresher = alice.generate_refresher(&mut rng, 1, 20);
    println!("generated {} refresher ciphertexts", refresher.len());

    println!("\n--- Summary ---");
    println!("ACES implementation complete with:");
    println!("  - Polynomial ring arithmetic over Z/qZ[X]");
    println!("  - Repartition-based secret key and relinearization tensor");
    println!("  - Public-key and symmetric encryption");
    println!("  - Homomorphic addition and multiplication");
    println!("  - A string-expression compiler");
    println!("  - A refresh classifier (secret- and public-side)");
}
