//! Property tests for framing invariants.

use proptest::prelude::*;
use slipmux_frame::{
    decode, encode, encode_delimited, encode_frame, DecodedFrame, FrameExtractor,
    LengthDelimited, END, ESC, ESC_END, ESC_ESC,
};

/// Split `data` at the given (sorted, deduplicated) cut points.
fn split_at_points(data: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.iter_mut().for_each(|c| *c %= data.len() + 1);
    cuts.sort_unstable();
    cuts.dedup();
    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(&data[start..cut]);
        start = cut;
    }
    chunks.push(&data[start..]);
    chunks
}

fn collect_frames(extractor: &mut FrameExtractor, chunks: &[&[u8]]) -> Vec<DecodedFrame> {
    chunks
        .iter()
        .flat_map(|chunk| extractor.push(chunk))
        .map(|r| r.expect("valid frame"))
        .collect()
}

proptest! {
    #[test]
    fn prop_decode_inverts_encode(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(decode(&encode(&data)), data);
    }

    #[test]
    fn prop_encode_has_no_bare_markers(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let wire = encode(&data);
        prop_assert_eq!(wire.last(), Some(&END));

        let body = &wire[..wire.len() - 1];
        prop_assert!(!body.contains(&END));

        let mut i = 0;
        while i < body.len() {
            if body[i] == ESC {
                prop_assert!(i + 1 < body.len());
                prop_assert!(body[i + 1] == ESC_END || body[i + 1] == ESC_ESC);
                i += 2;
            } else {
                i += 1;
            }
        }
    }

    #[test]
    fn prop_extractor_independent_of_chunking(
        frames in proptest::collection::vec(
            (any::<u8>(), proptest::collection::vec(any::<u8>(), 0..64)),
            1..8,
        ),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let wire: Vec<u8> = frames
            .iter()
            .flat_map(|(address, payload)| encode_frame(*address, payload))
            .collect();

        let whole = collect_frames(&mut FrameExtractor::new(), &[&wire]);
        let chunked = collect_frames(&mut FrameExtractor::new(), &split_at_points(&wire, cuts));

        prop_assert_eq!(whole.len(), frames.len());
        prop_assert_eq!(&whole, &chunked);
        for (frame, (address, payload)) in whole.iter().zip(&frames) {
            prop_assert_eq!(frame.address, *address);
            prop_assert_eq!(&frame.payload[..], &payload[..]);
        }
    }

    #[test]
    fn prop_delimited_yields_every_message_in_order(
        messages in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..400), 1..10),
        cuts in proptest::collection::vec(any::<usize>(), 0..20),
    ) {
        let wire: Vec<u8> = messages.iter().flat_map(|m| encode_delimited(m)).collect();

        let mut reassembler = LengthDelimited::new();
        let mut got = Vec::new();
        for chunk in split_at_points(&wire, cuts) {
            reassembler.feed(chunk, |m| got.push(m.to_vec())).unwrap();
        }

        prop_assert_eq!(got, messages);
        prop_assert_eq!(reassembler.buffered_len(), 0);
    }
}
