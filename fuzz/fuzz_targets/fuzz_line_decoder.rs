//! Fuzz target for chunked line decoding.
//!
//! Splitting input at an arbitrary byte must decode to the same lines as
//! feeding it whole.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lm_stream::{Charset, LineDecoder};
use std::collections::VecDeque;

#[derive(Debug, Arbitrary)]
struct Input {
    label: u8,
    split: usize,
    data: Vec<u8>,
}

const LABELS: &[&str] = &["utf8", "utf16le", "latin1", "ascii", "gbk", "shift_jis", "utf-16be"];

fn decode(charset: Charset, chunks: &[&[u8]]) -> Vec<String> {
    let mut decoder = LineDecoder::new(charset);
    let mut lines = VecDeque::new();
    for chunk in chunks {
        decoder.push(chunk, &mut lines);
    }
    decoder.finish(&mut lines);
    lines.into_iter().collect()
}

fuzz_target!(|input: Input| {
    let label = LABELS[input.label as usize % LABELS.len()];
    let Ok(charset) = Charset::resolve(label) else {
        return;
    };
    let split = if input.data.is_empty() {
        0
    } else {
        input.split % (input.data.len() + 1)
    };
    let (head, tail) = input.data.split_at(split);

    let whole = decode(charset, &[&input.data]);
    let chunked = decode(charset, &[head, tail]);
    assert_eq!(whole, chunked);
});
