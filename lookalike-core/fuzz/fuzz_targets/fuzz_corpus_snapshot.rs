#![no_main]

//! Fuzz target for corpus snapshot decoding
//!
//! Exercises CBOR deserialization of stored profiles, including the
//! bitstring hash parser, then averages whatever signatures came out.
//!
//! Run with: cargo +nightly fuzz run fuzz_corpus_snapshot

use libfuzzer_sys::fuzz_target;
use lookalike_core::CorpusSnapshot;

fuzz_target!(|data: &[u8]| {
    if let Ok(snapshot) = ciborium::from_reader::<CorpusSnapshot, _>(data) {
        for profile in &snapshot.profiles {
            let _ = profile.average_signature();
        }
    }
});
