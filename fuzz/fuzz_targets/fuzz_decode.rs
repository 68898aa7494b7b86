#![no_main]

//! Fuzz target for the GIF decoder.
//!
//! Feeds arbitrary bytes through the full decode path with varying skip
//! counts to find panics, out-of-bounds reads and callback protocol
//! violations on malformed input.

use arbitrary::Arbitrary;
use gifdec::{decode_with_pool, BufferPool, FrameInfo, FrameSink, MetadataInfo};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct DecodeInput {
    data: Vec<u8>,
    skip: u8,
    want_metadata: bool,
}

struct CheckingSink {
    want_metadata: bool,
    skip: usize,
    next_index: usize,
}

impl FrameSink for CheckingSink {
    fn on_frame(&mut self, frame: &FrameInfo<'_>) {
        // Indices are contiguous and start at the skip threshold.
        assert_eq!(frame.index, self.next_index.max(self.skip));
        self.next_index = frame.index + 1;

        // Dimensions always match the delivered pixel slice.
        assert_eq!(
            frame.pixels.len(),
            frame.width as usize * frame.height as usize
        );

        // The palette view never reads past its active entries.
        let len = frame.palette.len();
        assert!(len.is_power_of_two() && (2..=256).contains(&len));
        assert!(frame.palette.get(255).is_none() || len == 256);
    }

    fn on_metadata(&mut self, meta: &MetadataInfo<'_>) {
        assert!(meta.raw().len() >= 11);
        let _ = meta.netscape_loop_count();
    }

    fn wants_metadata(&self) -> bool {
        self.want_metadata
    }
}

/// Heap pool that refuses absurd buffer sizes so a 13-byte input cannot
/// declare a multi-gigabyte screen.
struct CappedPool;

impl BufferPool for CappedPool {
    fn acquire(&mut self, len: usize) -> Option<Vec<u8>> {
        (len <= 1 << 24).then(|| vec![0; len])
    }

    fn release(&mut self, _buf: Vec<u8>) {}
}

fuzz_target!(|input: DecodeInput| {
    if input.data.len() > 1 << 20 {
        return;
    }

    let skip = input.skip as usize;
    let mut sink = CheckingSink {
        want_metadata: input.want_metadata,
        skip,
        next_index: 0,
    };

    if let Ok(summary) = decode_with_pool(&input.data, &mut sink, skip, &mut CappedPool) {
        assert!(summary.frames_delivered <= summary.frames_seen);
    }
});
