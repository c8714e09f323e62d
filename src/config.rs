use crate::error::CodecError;
use crate::SOURCE_BITS;

/// Codeword sizes accepted by the decoder dispatch matrix: a dictionary word
/// plus its length byte must fill a power-of-two record.
pub const SUPPORTED_MAX_WORD_SIZES: [usize; 5] = [3, 7, 15, 31, 63];

/// Construction parameters for a [`MarlinCodec`](crate::MarlinCodec).
///
/// `K` and `O` fix the dictionary geometry; `shift` and `max_word_size` are
/// swept automatically when left unset, picking the values with the best
/// estimated efficiency for the trained distribution.
#[derive(Clone, Debug)]
pub struct CodecConfig {
    /// Bits per emitted codeword (`K`). 8 keeps the encoder byte aligned.
    pub key_size: usize,

    /// Overlap bits (`O`): log2 of the chapter count. The low `O` bits of a
    /// codeword select the chapter of the next one.
    pub overlap: usize,

    /// Number of low bits per source byte stored verbatim in the residual
    /// plane (`S`). `None` sweeps 0..=5 at construction.
    pub shift: Option<usize>,

    /// Longest dictionary word, in symbols. `None` chooses among {3, 7, 15}
    /// at construction.
    pub max_word_size: Option<usize>,

    /// Fixed-point refinement passes over the chapter state probabilities.
    pub iterations: usize,

    /// Alphabet entries with probability below this are folded into the
    /// rare-symbol escape, as long as enough symbols remain.
    pub purge_threshold: f64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            key_size: 8,
            overlap: 2,
            shift: None,
            max_word_size: None,
            iterations: 3,
            purge_threshold: 1e-5,
        }
    }
}

impl CodecConfig {
    /// Smallest alphabet the purge loop will leave behind.
    pub fn min_marlin_symbols(&self) -> usize {
        (1usize << self.overlap).max(8)
    }

    /// Largest alphabet a `K`-bit codeword can index, one slot being
    /// reserved for the empty word.
    pub fn max_marlin_symbols(&self) -> usize {
        (1usize << self.key_size) - 1
    }

    pub(crate) fn validate(&self) -> Result<(), CodecError> {
        if !(4..=12).contains(&self.key_size) {
            return Err(CodecError::InvalidConfig(format!(
                "key_size must be in 4..=12, got {}",
                self.key_size
            )));
        }
        if self.overlap > 4 {
            return Err(CodecError::InvalidConfig(format!(
                "overlap must be in 0..=4, got {}",
                self.overlap
            )));
        }
        if let Some(shift) = self.shift {
            if shift >= SOURCE_BITS {
                return Err(CodecError::InvalidConfig(format!(
                    "shift must be in 0..=7, got {shift}"
                )));
            }
        }
        if let Some(size) = self.max_word_size {
            if !SUPPORTED_MAX_WORD_SIZES.contains(&size) {
                return Err(CodecError::Unsupported(format!(
                    "max_word_size {size} is outside the decoder dispatch \
                     matrix {SUPPORTED_MAX_WORD_SIZES:?}"
                )));
            }
        }
        if self.min_marlin_symbols() > self.max_marlin_symbols() {
            return Err(CodecError::InvalidConfig(format!(
                "2^{} chapters cannot fit in {}-bit codewords",
                self.overlap, self.key_size
            )));
        }
        if !(self.purge_threshold.is_finite() && self.purge_threshold >= 0.0) {
            return Err(CodecError::InvalidConfig(format!(
                "purge_threshold must be a finite non-negative probability, got {}",
                self.purge_threshold
            )));
        }
        Ok(())
    }
}
