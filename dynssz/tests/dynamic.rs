//! Spec-driven resizing, fast-path equivalence and spec independence.

use dynssz::{Describe, Deserialize, DynSsz, ErrorKind, Serialize};
use std::sync::Arc;

fn ssz_with(pairs: &[(&str, u64)]) -> DynSsz {
    DynSsz::new(pairs.iter().map(|(k, v)| (k.to_string(), *v)))
}

#[derive(Debug, PartialEq, Describe, Serialize, Deserialize)]
struct HistoricalBlocks {
    #[ssz(static_size = "8192,32", dynamic_size = "SLOTS_PER_HISTORICAL_ROOT,32")]
    roots: Vec<[u8; 32]>,
}

#[test]
fn spec_value_resizes_the_vector() {
    let minimal = ssz_with(&[("SLOTS_PER_HISTORICAL_ROOT", 64)]);
    let value = HistoricalBlocks {
        roots: vec![[0xAB; 32]; 64],
    };
    let bytes = minimal.marshal(&value).expect("marshal");
    assert_eq!(bytes.len(), 64 * 32);

    let mut decoded = HistoricalBlocks { roots: Vec::new() };
    minimal.unmarshal(&mut decoded, &bytes).expect("unmarshal");
    assert_eq!(decoded, value);
}

#[test]
fn wrong_element_count_is_a_size_mismatch() {
    let minimal = ssz_with(&[("SLOTS_PER_HISTORICAL_ROOT", 64)]);
    let value = HistoricalBlocks {
        roots: vec![[0u8; 32]; 65],
    };
    let err = minimal.marshal(&value).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::SizeMismatch { .. }));
    assert_eq!(err.path(), "HistoricalBlocks.roots");
}

#[test]
fn matching_spec_value_keeps_the_static_layout() {
    let mainnet = ssz_with(&[("SLOTS_PER_HISTORICAL_ROOT", 8192)]);
    let desc = mainnet.descriptor::<HistoricalBlocks>().expect("descriptor");
    assert!(!desc.needs_dynamic());
    assert_eq!(desc.fixed_size(), Some(8192 * 32));
}

#[test]
fn unregistered_spec_names_fail_descriptor_build() {
    let empty = DynSsz::default();
    let err = empty.descriptor::<HistoricalBlocks>().unwrap_err();
    assert!(
        matches!(err.kind(), ErrorKind::UnknownSpec(name) if name == "SLOTS_PER_HISTORICAL_ROOT")
    );
    assert_eq!(err.path(), "roots");
}

#[derive(Debug, PartialEq, Describe, Serialize, Deserialize)]
struct Validator {
    pubkey: [u8; 48],
    effective_balance: u64,
    slashed: bool,
}

#[test]
fn fast_path_and_dynamic_path_agree_byte_for_byte() {
    let ssz = DynSsz::default();
    let value = Validator {
        pubkey: [0x5A; 48],
        effective_balance: 32_000_000_000,
        slashed: true,
    };

    let desc = ssz.descriptor::<Validator>().expect("descriptor");
    assert!(desc.fast_path());
    assert!(!desc.needs_dynamic());

    // `marshal` goes through the dispatcher; drive both delegates directly
    // and compare.
    let dispatched = ssz.marshal(&value).expect("marshal");

    let mut dynamic = Vec::new();
    value.encode(&desc, &mut dynamic).expect("dynamic encode");
    assert_eq!(dispatched, dynamic);

    let mut fast = Vec::new();
    value.static_encode(&mut fast).expect("static encode");
    assert_eq!(dispatched, fast);
    assert_eq!(value.static_size().expect("static size"), dispatched.len());

    // Each path accepts the other's output.
    let mut decoded = Validator::zeroed();
    decoded.decode(&desc, &fast).expect("dynamic decode");
    assert_eq!(decoded, value);

    let mut decoded = Validator::zeroed();
    let mut cursor = dynamic.as_slice();
    decoded
        .static_decode(&mut cursor)
        .expect("static decode");
    assert!(cursor.is_empty());
    assert_eq!(decoded, value);
}

#[test]
fn fixed_types_encode_identically_under_any_spec() {
    let a = DynSsz::default();
    let b = ssz_with(&[("SLOTS_PER_HISTORICAL_ROOT", 64), ("UNRELATED", 7)]);
    let value = Validator {
        pubkey: [0x11; 48],
        effective_balance: 7,
        slashed: false,
    };
    assert_eq!(a.marshal(&value).unwrap(), b.marshal(&value).unwrap());
}

#[test]
fn dynamic_dimensions_disable_the_fast_path_but_not_fixedness() {
    let minimal = ssz_with(&[("SLOTS_PER_HISTORICAL_ROOT", 64)]);
    let desc = minimal.descriptor::<HistoricalBlocks>().expect("descriptor");
    assert!(desc.needs_dynamic());
    // The resolved layout is still fixed-size, just not the static one.
    assert_eq!(desc.fixed_size(), Some(64 * 32));
}

#[derive(Debug, PartialEq, Describe, Serialize, Deserialize)]
struct Attestations {
    #[ssz(max_size = "128", dynamic_max = "MAX_ATTESTATIONS")]
    seen: Vec<u16>,
}

#[test]
fn dynamic_caps_govern_list_overflow() {
    let minimal = ssz_with(&[("MAX_ATTESTATIONS", 2)]);
    let wire: Vec<u8> = vec![4, 0, 0, 0, 1, 0, 2, 0, 3, 0];
    let mut decoded = Attestations { seen: Vec::new() };
    let err = minimal.unmarshal(&mut decoded, &wire).unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::ListOverflow { len: 3, max: 2 }
    ));

    let mainnet = ssz_with(&[("MAX_ATTESTATIONS", 128)]);
    mainnet.unmarshal(&mut decoded, &wire).expect("unmarshal");
    assert_eq!(decoded.seen, vec![1, 2, 3]);
}

#[test]
fn expressions_compose_spec_values() {
    #[derive(Debug, PartialEq, Describe, Serialize, Deserialize)]
    struct VotingRoots {
        #[ssz(dynamic_size = "EPOCHS_PER_ETH1_VOTING_PERIOD * SLOTS_PER_EPOCH")]
        slots: Vec<u8>,
    }

    let ssz = ssz_with(&[("EPOCHS_PER_ETH1_VOTING_PERIOD", 4), ("SLOTS_PER_EPOCH", 8)]);
    let value = VotingRoots {
        slots: vec![0; 32],
    };
    assert_eq!(ssz.size(&value).expect("size"), 32);
    assert!(ssz
        .marshal(&VotingRoots { slots: vec![0; 31] })
        .is_err());
}

#[test]
fn descriptors_are_built_once_per_instance() {
    let ssz = DynSsz::default();
    let first = ssz.descriptor::<Validator>().expect("descriptor");
    let second = ssz.descriptor::<Validator>().expect("descriptor");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn concurrent_calls_share_one_instance() {
    let ssz = ssz_with(&[("SLOTS_PER_HISTORICAL_ROOT", 8)]);
    std::thread::scope(|scope| {
        for worker in 0..4 {
            let ssz = &ssz;
            scope.spawn(move || {
                for i in 0..50u64 {
                    let value = HistoricalBlocks {
                        roots: vec![[worker as u8; 32]; 8],
                    };
                    let bytes = ssz.marshal(&value).expect("marshal");
                    assert_eq!(bytes.len(), 8 * 32);
                    let mut decoded = HistoricalBlocks { roots: Vec::new() };
                    ssz.unmarshal(&mut decoded, &bytes).expect("unmarshal");
                    assert_eq!(decoded, value);
                    assert_eq!(ssz.size(&0x0102u64).expect("size"), 8, "round {i}");
                }
            });
        }
    });
}
