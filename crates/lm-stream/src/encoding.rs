//! Charset resolution, incremental line decoding, and line encoding.
//!
//! Native charsets (UTF-8, UTF-16LE, Latin-1, ASCII) are encoded directly.
//! Every other WHATWG label goes through `encoding_rs`.

use crate::error::{Result, StreamError};
use encoding_rs::{CoderResult, Decoder, Encoding, GBK, UTF_16BE, UTF_16LE, UTF_8};
use std::collections::VecDeque;

/// Charsets encoded without a transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCharset {
    Utf8,
    Utf16Le,
    Latin1,
    Ascii,
}

/// A resolved charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Native(NativeCharset),
    Legacy(&'static Encoding),
}

impl Charset {
    /// Resolve a user-supplied label.
    pub fn resolve(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        let native = match normalized.as_str() {
            "utf8" | "utf-8" => Some(NativeCharset::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Some(NativeCharset::Utf16Le),
            "latin1" | "binary" => Some(NativeCharset::Latin1),
            "ascii" | "us-ascii" => Some(NativeCharset::Ascii),
            _ => None,
        };
        if let Some(native) = native {
            return Ok(Charset::Native(native));
        }

        if normalized == "gb2312" {
            return Ok(Charset::Legacy(GBK));
        }

        match Encoding::for_label(normalized.as_bytes()) {
            Some(enc) if enc == UTF_8 => Ok(Charset::Native(NativeCharset::Utf8)),
            Some(enc) if enc == UTF_16LE => Ok(Charset::Native(NativeCharset::Utf16Le)),
            // Only UTF-16BE may encode to something other than itself here.
            Some(enc) if enc.output_encoding() == enc || enc == UTF_16BE => {
                Ok(Charset::Legacy(enc))
            }
            _ => Err(StreamError::UnsupportedEncoding(label.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Charset::Native(NativeCharset::Utf8) => "utf-8",
            Charset::Native(NativeCharset::Utf16Le) => "utf-16le",
            Charset::Native(NativeCharset::Latin1) => "latin1",
            Charset::Native(NativeCharset::Ascii) => "ascii",
            Charset::Legacy(enc) => enc.name(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Charset::Native(_))
    }

    /// Append `text` encoded in this charset to `out`.
    ///
    /// Unmappable characters become `?` for Latin-1 and ASCII, and numeric
    /// character references for legacy charsets.
    pub fn encode_into(&self, text: &str, out: &mut Vec<u8>) {
        match self {
            Charset::Native(NativeCharset::Utf8) => out.extend_from_slice(text.as_bytes()),
            Charset::Native(NativeCharset::Utf16Le) => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Charset::Native(NativeCharset::Latin1) => {
                out.extend(text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')));
            }
            Charset::Native(NativeCharset::Ascii) => {
                out.extend(text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }));
            }
            Charset::Legacy(enc) if *enc == UTF_16BE => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            Charset::Legacy(enc) => {
                let (bytes, _, _) = enc.encode(text);
                out.extend_from_slice(&bytes);
            }
        }
    }
}

/// Incremental decoder that turns byte chunks into lines.
///
/// Lines are split on `\n`; a trailing `\r` is stripped. Multi-byte sequences
/// split across chunk boundaries are carried over to the next chunk.
pub struct LineDecoder {
    charset: Charset,
    decoder: Option<Decoder>,
    pending: String,
    finished: bool,
}

impl LineDecoder {
    pub fn new(charset: Charset) -> Self {
        let decoder = match charset {
            Charset::Native(NativeCharset::Utf8) => Some(UTF_8.new_decoder_without_bom_handling()),
            Charset::Native(NativeCharset::Utf16Le) => {
                Some(UTF_16LE.new_decoder_without_bom_handling())
            }
            Charset::Native(NativeCharset::Latin1 | NativeCharset::Ascii) => None,
            Charset::Legacy(enc) => Some(enc.new_decoder_without_bom_handling()),
        };
        Self {
            charset,
            decoder,
            pending: String::new(),
            finished: false,
        }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Decode one chunk and append every completed line to `lines`.
    pub fn push(&mut self, chunk: &[u8], lines: &mut VecDeque<String>) {
        self.decode(chunk, false);
        self.split_lines(lines);
    }

    /// Flush the decoder at end of input. A final unterminated line, if any,
    /// is appended.
    pub fn finish(&mut self, lines: &mut VecDeque<String>) {
        if self.finished {
            return;
        }
        self.decode(&[], true);
        self.finished = true;
        self.split_lines(lines);
        if !self.pending.is_empty() {
            let mut last = std::mem::take(&mut self.pending);
            if last.ends_with('\r') {
                last.pop();
            }
            lines.push_back(last);
        }
    }

    fn decode(&mut self, mut input: &[u8], last: bool) {
        match (&mut self.decoder, self.charset) {
            (Some(decoder), _) => loop {
                let needed = decoder
                    .max_utf8_buffer_length(input.len())
                    .unwrap_or(input.len().saturating_mul(3).saturating_add(16));
                self.pending.reserve(needed);
                let (result, read, _) = decoder.decode_to_string(input, &mut self.pending, last);
                input = &input[read..];
                if let CoderResult::InputEmpty = result {
                    break;
                }
            },
            (None, Charset::Native(NativeCharset::Ascii)) => {
                self.pending.extend(
                    input
                        .iter()
                        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER }),
                );
            }
            (None, _) => {
                self.pending.extend(input.iter().map(|&b| char::from(b)));
            }
        }
    }

    fn split_lines(&mut self, lines: &mut VecDeque<String>) {
        let mut start = 0;
        while let Some(offset) = self.pending[start..].find('\n') {
            let end = start + offset;
            let line = &self.pending[start..end];
            lines.push_back(line.strip_suffix('\r').unwrap_or(line).to_string());
            start = end + 1;
        }
        self.pending.drain(..start);
    }
}
