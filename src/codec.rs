//! The immutable codec handle: trained tables plus the block frame layout.
//!
//! A handle owns the alphabet, dictionary, jump table and decoder table for
//! one source distribution. All of it is read-only after construction, so a
//! single handle may serve any number of threads.
//!
//! Frame layout of a coded block (little-endian multi-byte fields):
//!
//! ```text
//! [0..padding)       verbatim bytes, present when N is not a multiple of 8
//! [padding]          rare_count : u8
//! [padding+1..M)     marlin codewords
//! [M..M+rare_size)   rare_count entries of { offset : u8/u16/u32/u64, value : u8 }
//! [M+rare_size..end) residual plane, body_len * S / 8 bytes
//! ```
//!
//! A block stored raw has length exactly `N`; a constant block is a single
//! byte; an empty block is empty. Coded blocks are always strictly shorter
//! than `N`, which is how the decoder tells the cases apart.

use log::debug;

use crate::alphabet::Alphabet;
use crate::config::CodecConfig;
use crate::decoder::DecoderTable;
use crate::dictionary::Dictionary;
use crate::encoder::{chapter0_singletons, BlockEncoder, JumpTable};
use crate::error::CodecError;
use crate::residual;

/// A trained Marlin codec for one source distribution.
pub struct MarlinCodec {
    dictionary: Dictionary,
    jump: JumpTable,
    decoder: DecoderTable,
    starts: Vec<u32>,
    source_to_marlin: [u8; 256],
}

impl MarlinCodec {
    /// Trains a codec on a source distribution.
    ///
    /// `pmf[s]` is the probability (or count) of source symbol `s`. Shift
    /// and maximum word size are swept when the configuration leaves them
    /// unset, keeping the values with the best estimated efficiency.
    pub fn new(pmf: &[f64], config: CodecConfig) -> Result<Self, CodecError> {
        config.validate()?;

        let shift = match config.shift {
            Some(shift) => shift,
            None => select_shift(pmf, &config)?,
        };
        let max_word_size = match config.max_word_size {
            Some(size) => size,
            None => select_max_word_size(pmf, shift, &config)?,
        };

        let alphabet = Alphabet::build(pmf, shift, &config)?;
        let dictionary = Dictionary::build(
            alphabet,
            config.key_size,
            config.overlap,
            max_word_size,
            config.iterations,
        );
        debug!(
            "trained dictionary: K={} O={} S={shift} maxWordSize={max_word_size} \
             alphabet={} efficiency={:.4}",
            config.key_size,
            config.overlap,
            dictionary.alphabet().len(),
            dictionary.efficiency()
        );

        let jump = JumpTable::build(&dictionary);
        let decoder = DecoderTable::build(&dictionary)?;
        let starts = chapter0_singletons(&dictionary);
        let source_to_marlin = dictionary.alphabet().source_to_marlin();

        Ok(Self {
            dictionary,
            jump,
            decoder,
            starts,
            source_to_marlin,
        })
    }

    /// The trained dictionary backing this codec.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Estimated fraction of the Shannon bound this codec reaches.
    pub fn efficiency(&self) -> f64 {
        self.dictionary.efficiency()
    }

    /// Low bits per byte carried by the residual plane.
    pub fn shift(&self) -> usize {
        self.dictionary.alphabet().shift()
    }

    fn block_encoder(&self) -> BlockEncoder<'_> {
        BlockEncoder {
            jump: &self.jump,
            starts: &self.starts,
            source_to_marlin: &self.source_to_marlin,
            shift: self.shift(),
            n_symbols: self.dictionary.alphabet().len(),
            key_size: self.dictionary.key_size(),
        }
    }

    /// Encodes one block into `dst` and returns the number of bytes
    /// written. `dst` must be at least as large as `src`; a block that does
    /// not benefit from coding is stored raw and `src.len()` is returned.
    pub fn compress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if dst.len() < src.len() {
            return Err(CodecError::InsufficientBuffer {
                needed: src.len(),
                available: dst.len(),
            });
        }
        if src.is_empty() {
            return Ok(0);
        }
        if src.iter().all(|&b| b == src[0]) {
            dst[0] = src[0];
            return Ok(1);
        }

        // Arbitrary sizes: a verbatim prefix brings the body to a multiple
        // of eight so the residual plane stays whole-word.
        let padding = src.len() % 8;
        dst[..padding].copy_from_slice(&src[..padding]);
        let body = &src[padding..];

        let shift = self.shift();
        let residual_size = body.len() * shift / 8;
        let mut rare: Vec<usize> = Vec::new();

        let marlin_size = self.encode_body(body, residual_size, padding, dst, &mut rare);

        let offset_width = rare_offset_width(body.len());
        let rare_size = rare.len() * (offset_width + 1);
        let total =
            marlin_size.map(|marlin| padding + 1 + marlin + rare_size + residual_size);

        match total {
            Some(total) if rare.len() <= 255 && total < src.len() => {
                let marlin_size = marlin_size.unwrap_or_default();
                dst[padding] = rare.len() as u8;
                let mut at = padding + 1 + marlin_size;
                for &offset in &rare {
                    dst[at..at + offset_width]
                        .copy_from_slice(&offset.to_le_bytes()[..offset_width]);
                    at += offset_width;
                    dst[at] = body[offset];
                    at += 1;
                }
                residual::extract_plane(body, shift, &mut dst[at..at + residual_size]);
                Ok(total)
            }
            // Not worth coding: store the block raw.
            _ => {
                dst[..src.len()].copy_from_slice(src);
                Ok(src.len())
            }
        }
    }

    fn encode_body(
        &self,
        body: &[u8],
        residual_size: usize,
        padding: usize,
        dst: &mut [u8],
        rare: &mut Vec<usize>,
    ) -> Option<usize> {
        if body.is_empty() || dst.len() < padding + 1 + residual_size {
            return None;
        }
        let dst_len = dst.len();
        let region = &mut dst[padding + 1..dst_len - residual_size];
        let encoder = self.block_encoder();
        if self.dictionary.key_size() == 8 {
            encoder.encode_bytes(body, region, rare)
        } else {
            encoder.encode_packed(body, region, rare)
        }
    }

    /// Convenience wrapper allocating the output block.
    pub fn compress(&self, src: &[u8]) -> Vec<u8> {
        let mut dst = vec![0u8; src.len().max(1)];
        let written = self
            .compress_into(src, &mut dst)
            .expect("buffer sized to the input cannot be insufficient");
        dst.truncate(written);
        dst
    }

    /// Decodes one block of known uncompressed size `dst.len()`.
    pub fn decompress_into(&self, src: &[u8], dst: &mut [u8]) -> Result<(), CodecError> {
        if src.len() == dst.len() {
            dst.copy_from_slice(src);
            return Ok(());
        }
        if dst.is_empty() {
            return Err(CodecError::Frame("data present for an empty block"));
        }
        if src.len() == 1 {
            dst.fill(src[0]);
            return Ok(());
        }
        if src.len() > dst.len() {
            return Err(CodecError::Frame("encoded block longer than its output"));
        }

        let padding = dst.len() % 8;
        if src.len() < padding + 1 {
            return Err(CodecError::Frame("truncated block header"));
        }
        dst[..padding].copy_from_slice(&src[..padding]);
        let body = &mut dst[padding..];

        let rare_count = src[padding] as usize;
        let offset_width = rare_offset_width(body.len());
        let rare_size = rare_count * (offset_width + 1);
        let shift = self.shift();
        let residual_size = body.len() * shift / 8;
        let header = padding + 1;
        if src.len() < header + rare_size + residual_size {
            return Err(CodecError::Frame("rare table or residual plane overruns block"));
        }
        let marlin_end = src.len() - rare_size - residual_size;

        // High bits first: seed with the most probable symbol, then let the
        // codeword stream overwrite it.
        body.fill(self.dictionary.alphabet().most_probable());
        let produced = self.decoder.decode(&src[header..marlin_end], body);
        if produced != body.len() {
            return Err(CodecError::Frame("codeword stream ends before the block"));
        }

        residual::deposit_plane(&src[marlin_end + rare_size..], shift, body);

        let mut at = marlin_end;
        for _ in 0..rare_count {
            let mut offset_bytes = [0u8; 8];
            offset_bytes[..offset_width].copy_from_slice(&src[at..at + offset_width]);
            let offset = u64::from_le_bytes(offset_bytes) as usize;
            at += offset_width;
            if offset >= body.len() {
                return Err(CodecError::Frame("rare entry offset out of range"));
            }
            body[offset] = src[at];
            at += 1;
        }
        Ok(())
    }

    /// Convenience wrapper allocating the `n`-byte output block.
    pub fn decompress(&self, src: &[u8], n: usize) -> Result<Vec<u8>, CodecError> {
        let mut dst = vec![0u8; n];
        self.decompress_into(src, &mut dst)?;
        Ok(dst)
    }
}

/// Rare-list offset field width for a given body size.
fn rare_offset_width(body_len: usize) -> usize {
    match body_len as u64 {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFFFF_FFFF => 4,
        _ => 8,
    }
}

fn efficiency_for(
    pmf: &[f64],
    shift: usize,
    max_word_size: usize,
    config: &CodecConfig,
) -> Result<f64, CodecError> {
    let alphabet = Alphabet::build(pmf, shift, config)?;
    Ok(Dictionary::build(
        alphabet,
        config.key_size,
        config.overlap,
        max_word_size,
        config.iterations,
    )
    .efficiency())
}

/// Greedy sweep for the largest shift that does not reduce the estimated
/// efficiency. Probes with the middle of the word-size family.
fn select_shift(pmf: &[f64], config: &CodecConfig) -> Result<usize, CodecError> {
    let probe_size = config.max_word_size.unwrap_or(7);
    let mut best = efficiency_for(pmf, 0, probe_size, config)?;
    let mut chosen = 0;
    for shift in 1..=5 {
        let e = match efficiency_for(pmf, shift, probe_size, config) {
            Ok(e) => e,
            // A large shift can collapse the alphabet below two symbols;
            // smaller shifts were fine, so the sweep just stops there.
            Err(CodecError::AlphabetTooSmall { .. }) => break,
            Err(other) => return Err(other),
        };
        if e >= best {
            best = e;
            chosen = shift;
        } else {
            break;
        }
    }
    debug!("selected shift {chosen} (estimated efficiency {best:.4})");
    Ok(chosen)
}

/// Chooses the word size among {3, 7, 15}, escalating only for a relative
/// improvement above 0.01%.
fn select_max_word_size(
    pmf: &[f64],
    shift: usize,
    config: &CodecConfig,
) -> Result<usize, CodecError> {
    let e3 = efficiency_for(pmf, shift, 3, config)?;
    let e7 = efficiency_for(pmf, shift, 7, config)?;
    let e15 = efficiency_for(pmf, shift, 15, config)?;
    let mut chosen = 3;
    if e7 > 1.0001 * e3 {
        chosen = 7;
    }
    if e15 > 1.0001 * e7 {
        chosen = 15;
    }
    debug!("selected max word size {chosen} (e3={e3:.4} e7={e7:.4} e15={e15:.4})");
    Ok(chosen)
}
