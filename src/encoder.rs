//! Jump table construction and the two codeword emitters.
//!
//! Encoding walks the dictionary as a state machine: the state is a position
//! in the full `2^(K+O)` word array, and the jump table maps
//! `(position, next Marlin symbol)` to the successor position. When the
//! current word cannot be extended, the entry carries [`FLAG_NEXT_WORD`]:
//! the finished word's codeword is emitted and the machine restarts at the
//! singleton of the incoming symbol, inside the chapter named by the low
//! `O` bits of the emitted codeword.

use std::collections::HashMap;

use crate::dictionary::Dictionary;
use crate::MarlinSymbol;

/// Set on a jump target when the transition emits the current codeword.
pub(crate) const FLAG_NEXT_WORD: u32 = 1 << 31;

const UNDEFINED: u32 = u32::MAX;

/// Flattened `(position, symbol) -> successor` map. One column per Marlin
/// symbol plus one for the unrepresented sentinel, which behaves like
/// symbol 0 (the encoder records the escape out of band).
pub(crate) struct JumpTable {
    entries: Vec<u32>,
    word_mask: u32,
    word_stride: usize,
}

impl JumpTable {
    pub(crate) fn build(dict: &Dictionary) -> Self {
        let key_size = dict.key_size();
        let overlap = dict.overlap();
        let n_symbols = dict.alphabet().len();
        let word_stride = key_size + overlap;
        let positions = word_positions(dict);

        let chapters = 1usize << overlap;
        let chapter_size = 1usize << key_size;
        let mut entries = vec![UNDEFINED; (n_symbols + 1) << word_stride];
        let index = |word: usize, symbol: usize| word + (symbol << word_stride);

        // Link every word to the shorter word it extends, one symbol at a
        // time, within its own chapter.
        for (chapter, positions) in positions.iter().enumerate() {
            let base = chapter * chapter_size;
            for (i, word) in dict.words()[base..base + chapter_size].iter().enumerate() {
                let mut prefix = word.symbols.clone();
                let mut word_idx = base + i;
                while prefix.len() > 1 {
                    let last = prefix.pop().unwrap_or_default();
                    let parent_idx = *positions
                        .get(&prefix)
                        .expect("every word longer than one symbol has its prefix in the chapter");
                    entries[index(parent_idx, last as usize)] = word_idx as u32;
                    word_idx = parent_idx;
                }
            }
        }

        // Remaining cells end the current word and restart at the incoming
        // symbol's singleton, in the chapter the current position routes to.
        for word in 0..(chapters * chapter_size) {
            let next_chapter = word % chapters;
            for symbol in 0..n_symbols {
                let cell = index(word, symbol);
                if entries[cell] == UNDEFINED {
                    let singleton = positions[next_chapter]
                        .get([symbol as MarlinSymbol].as_slice())
                        .copied()
                        .expect("every chapter holds a singleton for each kept symbol");
                    entries[cell] = singleton as u32 | FLAG_NEXT_WORD;
                }
            }
            // The unrepresented sentinel column mirrors symbol 0; rare input
            // is coerced to the most probable symbol during encoding.
            entries[index(word, n_symbols)] = entries[index(word, 0)];
        }

        Self {
            entries,
            word_mask: (1u32 << word_stride) - 1,
            word_stride,
        }
    }

    #[inline(always)]
    pub(crate) fn next(&self, position: u32, symbol: MarlinSymbol) -> u32 {
        self.entries[((position & self.word_mask) as usize) + ((symbol as usize) << self.word_stride)]
    }

    #[cfg(test)]
    pub(crate) fn is_fully_defined(&self) -> bool {
        self.entries.iter().all(|&e| e != UNDEFINED)
    }
}

/// Per-chapter word-to-position maps over the packed dictionary.
fn word_positions(dict: &Dictionary) -> Vec<HashMap<Vec<MarlinSymbol>, usize>> {
    let chapter_size = 1usize << dict.key_size();
    dict.words()
        .chunks_exact(chapter_size)
        .enumerate()
        .map(|(chapter, words)| {
            words
                .iter()
                .enumerate()
                .map(|(i, w)| (w.symbols.clone(), chapter * chapter_size + i))
                .collect()
        })
        .collect()
}

/// Positions, within chapter 0, of each symbol's singleton word. The
/// encoder's start state for a block is the singleton of its first symbol.
pub(crate) fn chapter0_singletons(dict: &Dictionary) -> Vec<u32> {
    let chapter_size = 1usize << dict.key_size();
    let mut starts = vec![0u32; dict.alphabet().len()];
    for (i, word) in dict.words()[..chapter_size].iter().enumerate() {
        if let [symbol] = word.symbols.as_slice() {
            starts[*symbol as usize] = i as u32;
        }
    }
    starts
}

/// Shared per-block encoder state and lookup tables.
pub(crate) struct BlockEncoder<'a> {
    pub jump: &'a JumpTable,
    pub starts: &'a [u32],
    pub source_to_marlin: &'a [u8; 256],
    pub shift: usize,
    pub n_symbols: usize,
    pub key_size: usize,
}

/// Margin kept free in the output so the inner loop never has to bounds
/// check a single emission precisely; running into it aborts to raw storage.
const OUTPUT_MARGIN: usize = 16;

impl BlockEncoder<'_> {
    #[inline(always)]
    fn classify(&self, byte: u8, offset: usize, rare: &mut Vec<usize>) -> MarlinSymbol {
        let symbol = self.source_to_marlin[(byte >> self.shift) as usize];
        if symbol as usize == self.n_symbols {
            rare.push(offset);
        }
        symbol
    }

    /// Byte-aligned emitter for K = 8: codewords land directly on output
    /// bytes, so a pending slot is rewritten until a word is finished.
    ///
    /// Returns `None` when the output budget runs out, which callers turn
    /// into raw storage.
    pub(crate) fn encode_bytes(
        &self,
        src: &[u8],
        dst: &mut [u8],
        rare: &mut Vec<usize>,
    ) -> Option<usize> {
        if dst.len() < OUTPUT_MARGIN {
            return None;
        }
        let mut j = self.starts[self.classify(src[0], 0, rare) as usize % self.n_symbols];
        let mut out = 0usize;

        for (offset, &byte) in src.iter().enumerate().skip(1) {
            if dst.len() - out < OUTPUT_MARGIN {
                return None;
            }
            let symbol = self.classify(byte, offset, rare);
            dst[out] = (j & 0xFF) as u8;
            j = self.jump.next(j, symbol);
            if j & FLAG_NEXT_WORD != 0 {
                out += 1;
            }
        }
        dst[out] = (j & 0xFF) as u8;
        Some(out + 1)
    }

    /// Bit-packing emitter for any K: finished codewords' low K bits are
    /// folded MSB-first into a 32-bit register and drained as whole bytes.
    pub(crate) fn encode_packed(
        &self,
        src: &[u8],
        dst: &mut [u8],
        rare: &mut Vec<usize>,
    ) -> Option<usize> {
        if dst.len() < OUTPUT_MARGIN {
            return None;
        }
        let key_size = self.key_size as u32;
        let key_mask = (1u32 << key_size) - 1;
        let mut j = self.starts[self.classify(src[0], 0, rare) as usize % self.n_symbols];
        let mut out = 0usize;
        let mut register = 0u32;
        let mut bits = 0u32;

        for (offset, &byte) in src.iter().enumerate().skip(1) {
            if dst.len() - out < OUTPUT_MARGIN {
                return None;
            }
            let symbol = self.classify(byte, offset, rare);
            let previous = j;
            j = self.jump.next(j, symbol);
            if j & FLAG_NEXT_WORD != 0 {
                register |= (previous & key_mask) << (32 - key_size - bits);
                bits += key_size;
                while bits > 8 {
                    dst[out] = (register >> 24) as u8;
                    out += 1;
                    register <<= 8;
                    bits -= 8;
                }
            }
        }

        register |= (j & key_mask) << (32 - key_size - bits);
        bits += key_size;
        while bits > 0 {
            dst[out] = (register >> 24) as u8;
            out += 1;
            register <<= 8;
            bits = bits.saturating_sub(8);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::config::CodecConfig;

    fn build_dict() -> Dictionary {
        let pmf: Vec<f64> = (0..256).map(|k| 0.5f64.powi(k + 1)).collect();
        let alphabet = Alphabet::build(&pmf, 0, &CodecConfig::default()).unwrap();
        Dictionary::build(alphabet, 8, 2, 7, 3)
    }

    #[test]
    fn jump_table_has_no_undefined_cells() {
        let dict = build_dict();
        assert!(JumpTable::build(&dict).is_fully_defined());
    }

    #[test]
    fn sentinel_column_matches_symbol_zero() {
        let dict = build_dict();
        let jump = JumpTable::build(&dict);
        let sentinel = dict.alphabet().len() as MarlinSymbol;
        for position in 0..(1u32 << (dict.key_size() + dict.overlap())) {
            assert_eq!(jump.next(position, sentinel), jump.next(position, 0));
        }
    }

    #[test]
    fn extensions_point_to_longer_words_in_the_same_chapter() {
        let dict = build_dict();
        let jump = JumpTable::build(&dict);
        let chapter_size = 1usize << dict.key_size();
        for (i, word) in dict.words().iter().enumerate() {
            if word.symbols.is_empty() {
                continue;
            }
            for symbol in 0..dict.alphabet().len() as u8 {
                let target = jump.next(i as u32, symbol);
                if target & FLAG_NEXT_WORD != 0 {
                    // Restart: a singleton in the chapter this word routes to.
                    let target = (target & !FLAG_NEXT_WORD) as usize;
                    assert_eq!(target / chapter_size, i % (1 << dict.overlap()));
                    assert_eq!(dict.words()[target].symbols.as_slice(), &[symbol]);
                } else {
                    // Extension: same chapter, one symbol longer.
                    let target = target as usize;
                    assert_eq!(target / chapter_size, i / chapter_size);
                    let extended = &dict.words()[target].symbols;
                    assert_eq!(extended.len(), word.symbols.len() + 1);
                    assert_eq!(&extended[..word.symbols.len()], word.symbols.as_slice());
                    assert_eq!(extended[word.symbols.len()], symbol);
                }
            }
        }
    }
}
