//! Decoder table construction and the record-copy decode loop.
//!
//! Every dictionary entry becomes a fixed-width record: the word's source
//! bytes, zero padding, and the word length in the last byte. Decoding
//! slides a `K+O`-bit key over the codeword stream, copies whole records
//! and advances the output cursor by the recorded length, so later words
//! overwrite the previous record's overhang. Output bytes carry only the
//! high bits of each symbol; the residual plane and the rare list are
//! applied by the framing layer afterwards.

use crate::dictionary::Dictionary;
use crate::error::CodecError;

pub(crate) struct DecoderTable {
    records: Vec<u8>,
    record_width: usize,
    key_size: usize,
    key_mask: usize,
}

impl DecoderTable {
    pub(crate) fn build(dict: &Dictionary) -> Result<Self, CodecError> {
        let record_width = dict.max_word_size() + 1;
        if !record_width.is_power_of_two() || !(4..=64).contains(&record_width) {
            return Err(CodecError::Unsupported(format!(
                "no decode loop is compiled for max_word_size {}",
                dict.max_word_size()
            )));
        }

        let alphabet = dict.alphabet().entries();
        let mut records = vec![0u8; dict.words().len() * record_width];
        for (word, record) in dict.words().iter().zip(records.chunks_exact_mut(record_width)) {
            for (slot, &symbol) in record.iter_mut().zip(&word.symbols) {
                *slot = alphabet[symbol as usize].symbol;
            }
            record[record_width - 1] = word.symbols.len() as u8;
        }

        Ok(Self {
            records,
            record_width,
            key_size: dict.key_size(),
            key_mask: (1usize << (dict.key_size() + dict.overlap())) - 1,
        })
    }

    #[cfg(test)]
    pub(crate) fn max_length_byte(&self) -> u8 {
        self.records
            .chunks_exact(self.record_width)
            .map(|r| r[self.record_width - 1])
            .max()
            .unwrap_or(0)
    }

    /// Decodes the codeword stream into `dst`, returning the number of
    /// bytes produced. Stops when either side is exhausted; the framing
    /// layer decides whether a short fill is an error.
    pub(crate) fn decode(&self, src: &[u8], dst: &mut [u8]) -> usize {
        match (self.key_size, self.record_width) {
            (8, 4) => self.decode_bytes::<4>(src, dst),
            (8, 8) => self.decode_bytes::<8>(src, dst),
            (8, 16) => self.decode_bytes::<16>(src, dst),
            (8, 32) => self.decode_bytes::<32>(src, dst),
            (8, 64) => self.decode_bytes::<64>(src, dst),
            (_, 4) => self.decode_packed::<4>(src, dst),
            (_, 8) => self.decode_packed::<8>(src, dst),
            (_, 16) => self.decode_packed::<16>(src, dst),
            (_, 32) => self.decode_packed::<32>(src, dst),
            (_, 64) => self.decode_packed::<64>(src, dst),
            _ => unreachable!("record width checked at construction"),
        }
    }

    #[inline(always)]
    fn emit<const R: usize>(&self, key: usize, dst: &mut [u8], cursor: usize) -> usize {
        let record = &self.records[key * R..key * R + R];
        dst[cursor..cursor + R].copy_from_slice(record);
        cursor + record[R - 1] as usize
    }

    #[inline(always)]
    fn emit_clamped<const R: usize>(&self, key: usize, dst: &mut [u8], cursor: usize) -> usize {
        let record = &self.records[key * R..key * R + R];
        let len = (record[R - 1] as usize).min(dst.len() - cursor);
        dst[cursor..cursor + len].copy_from_slice(&record[..len]);
        cursor + len
    }

    /// K = 8: each input byte is one codeword; the previous byte's low `O`
    /// bits ride along in the sliding key and select the chapter.
    fn decode_bytes<const R: usize>(&self, src: &[u8], dst: &mut [u8]) -> usize {
        let mut key = 0usize;
        let mut cursor = 0usize;
        let mut input = src.iter();

        for &byte in input.by_ref() {
            key = ((key << 8) | byte as usize) & self.key_mask;
            if cursor + R > dst.len() {
                cursor = self.emit_clamped::<R>(key, dst, cursor);
                break;
            }
            cursor = self.emit::<R>(key, dst, cursor);
        }
        // Tail: full-record copies no longer fit, clamp each word.
        for &byte in input {
            if cursor >= dst.len() {
                break;
            }
            key = ((key << 8) | byte as usize) & self.key_mask;
            cursor = self.emit_clamped::<R>(key, dst, cursor);
        }
        cursor
    }

    /// General K: refill a bit register from the stream and peel K-bit
    /// units; the key keeps `O` bits of the previous unit above the new one.
    fn decode_packed<const R: usize>(&self, src: &[u8], dst: &mut [u8]) -> usize {
        let key_size = self.key_size as u32;
        let mut register = 0u64;
        let mut available = 0u32;
        let mut cursor = 0usize;
        let mut input = src.iter();

        loop {
            while available < key_size {
                match input.next() {
                    Some(&byte) => {
                        register = (register << 8) | byte as u64;
                        available += 8;
                    }
                    None => return cursor,
                }
            }
            available -= key_size;
            let key = (register >> available) as usize & self.key_mask;
            if cursor >= dst.len() {
                return cursor;
            }
            cursor = if cursor + R > dst.len() {
                self.emit_clamped::<R>(key, dst, cursor)
            } else {
                self.emit::<R>(key, dst, cursor)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::config::CodecConfig;

    fn build_dict(max_word_size: usize) -> Dictionary {
        let pmf: Vec<f64> = (0..256).map(|k| 0.5f64.powi(k + 1)).collect();
        let alphabet = Alphabet::build(&pmf, 0, &CodecConfig::default()).unwrap();
        Dictionary::build(alphabet, 8, 2, max_word_size, 3)
    }

    #[test]
    fn length_bytes_never_exceed_max_word_size() {
        for max_word_size in [3, 7, 15] {
            let table = DecoderTable::build(&build_dict(max_word_size)).unwrap();
            assert!(table.max_length_byte() as usize <= max_word_size);
        }
    }

    #[test]
    fn unsupported_word_size_is_rejected() {
        let dict = build_dict(7);
        // Rebuild with a width outside the dispatch matrix.
        let bad = Dictionary::build(dict.alphabet().clone(), 8, 2, 5, 1);
        assert!(matches!(
            DecoderTable::build(&bad),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn decode_stops_at_output_boundary() {
        let dict = build_dict(7);
        let table = DecoderTable::build(&dict).unwrap();
        // Arbitrary bytes must never panic or write out of bounds.
        let garbage: Vec<u8> = (0..64).map(|i| (i * 37) as u8).collect();
        let mut out = vec![0u8; 16];
        let produced = table.decode(&garbage, &mut out);
        assert!(produced <= out.len());
    }
}
