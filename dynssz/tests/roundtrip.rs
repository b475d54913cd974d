//! Property tests: round-trip and size agreement across value shapes.

use dynssz::{BitList, Describe, Deserialize, DynSsz, Serialize};
use proptest::prelude::*;

fn check<T>(ssz: &DynSsz, value: &T)
where
    T: Serialize + Deserialize + PartialEq + core::fmt::Debug + 'static,
{
    let bytes = ssz.marshal(value).expect("marshal");
    assert_eq!(ssz.size(value).expect("size"), bytes.len());

    let mut decoded = T::zeroed();
    ssz.unmarshal(&mut decoded, &bytes).expect("unmarshal");
    assert_eq!(&decoded, value);
}

#[derive(Debug, Clone, PartialEq, Describe, Serialize, Deserialize)]
struct Record {
    id: u64,
    tag: [u8; 4],
    #[ssz(max_size = "1024")]
    payload: Vec<u8>,
    flag: bool,
}

#[derive(Debug, PartialEq, Describe, Serialize, Deserialize)]
struct Batch {
    #[ssz(max_size = "64")]
    records: Vec<Record>,
    #[ssz(max_size = "256")]
    votes: BitList,
}

#[derive(Debug, Clone, PartialEq, Describe, Serialize, Deserialize)]
enum Message {
    None,
    Record(Record),
    Raw(Vec<u8>),
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        any::<u64>(),
        any::<[u8; 4]>(),
        proptest::collection::vec(any::<u8>(), 0..64),
        any::<bool>(),
    )
        .prop_map(|(id, tag, payload, flag)| Record {
            id,
            tag,
            payload,
            flag,
        })
}

proptest! {
    #[test]
    fn uint64_lists_round_trip(values in proptest::collection::vec(any::<u64>(), 0..64)) {
        check(&DynSsz::default(), &values);
    }

    #[test]
    fn byte_lists_round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        check(&DynSsz::default(), &bytes);
    }

    #[test]
    fn bitlists_round_trip(bits in proptest::collection::vec(any::<bool>(), 0..200)) {
        check(&DynSsz::default(), &BitList::from_bools(&bits));
    }

    #[test]
    fn records_round_trip(record in record_strategy()) {
        check(&DynSsz::default(), &record);
    }

    #[test]
    fn batches_round_trip(
        records in proptest::collection::vec(record_strategy(), 0..8),
        bits in proptest::collection::vec(any::<bool>(), 0..100),
    ) {
        check(
            &DynSsz::default(),
            &Batch {
                records,
                votes: BitList::from_bools(&bits),
            },
        );
    }

    #[test]
    fn unions_round_trip(message in prop_oneof![
        Just(Message::None),
        record_strategy().prop_map(Message::Record),
        proptest::collection::vec(any::<u8>(), 0..32).prop_map(Message::Raw),
    ]) {
        check(&DynSsz::default(), &message);
    }

    #[test]
    fn decoding_overwrites_previous_contents(
        first in record_strategy(),
        second in record_strategy(),
    ) {
        let ssz = DynSsz::default();
        let bytes = ssz.marshal(&second).expect("marshal");
        // Reuse a previously populated target.
        let mut target = first;
        ssz.unmarshal(&mut target, &bytes).expect("unmarshal");
        prop_assert_eq!(target, second);
    }

    #[test]
    fn random_buffers_never_panic_on_decode(data in proptest::collection::vec(any::<u8>(), 0..128)) {
        let ssz = DynSsz::default();
        let mut target = Batch::zeroed();
        // Errors are fine; panics and hangs are not.
        let _ = ssz.unmarshal(&mut target, &data);
    }
}
