#![no_main]

//! Fuzz target for normalize() and Signature::from_bytes()
//!
//! Downloaded bytes are untrusted. Any input must come back as an error,
//! never a panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_normalize

use libfuzzer_sys::fuzz_target;
use lookalike_core::{normalize, Signature};

fuzz_target!(|data: &[u8]| {
    if let Ok(canonical) = normalize(data) {
        // A normalized image must always be signable
        let signature = Signature::from_bytes(&canonical).unwrap();
        assert_eq!(signature.hashes.simple_hash.len(), 64);
    }
    let _ = Signature::from_bytes(data);
});
