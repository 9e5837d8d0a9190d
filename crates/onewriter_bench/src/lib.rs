//! Benchmark utilities for onewriter.
//!
//! The benchmarks themselves live under `benches/`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a random key of the form `key:<hex>`.
pub fn random_key() -> String {
    format!("key:{:016x}", rand::thread_rng().gen::<u64>())
}

/// Generate `count` keys paired with random values of `value_size` bytes.
pub fn generate_writes(count: usize, value_size: usize) -> Vec<(String, Vec<u8>)> {
    (0..count)
        .map(|_| (random_key(), random_data(value_size)))
        .collect()
}
