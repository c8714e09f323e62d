//! # Marlin: a variable-to-fixed entropy codec
//!
//! Marlin codes memoryless byte sources with strongly skewed distributions,
//! such as the residuals of a simple image predictor. It is a
//! variable-to-fixed (V2F) code: variable-length runs of input symbols map to
//! fixed-size codewords, so the decoder is a tight table lookup that emits
//! several bytes per codeword. The price is a dictionary trained offline on
//! the source distribution; the payoff is decode throughput well beyond
//! Huffman-style bit unpacking.
//!
//! The dictionary is partitioned into `2^O` "chapters". The low `O` bits of
//! every codeword select the chapter the next codeword is read from, which
//! lets consecutive words share context without any extra signaling. Symbols
//! too rare to earn a dictionary slot are folded off the alphabet and
//! patched through an out-of-band `(offset, value)` list, and the low `S`
//! bits of every byte bypass the dictionary entirely as a packed residual
//! plane.
//!
//! ```
//! use marlin_codec::{CodecConfig, MarlinCodec};
//! use marlin_codec::distribution;
//!
//! let pmf = distribution::geometric_pmf(0.5);
//! let codec = MarlinCodec::new(&pmf, CodecConfig::default()).unwrap();
//!
//! let block = vec![0u8, 0, 1, 0, 0, 0, 2, 0, 0, 0, 0, 1, 0, 0, 0, 0];
//! let encoded = codec.compress(&block);
//! let decoded = codec.decompress(&encoded, block.len()).unwrap();
//! assert_eq!(block, decoded);
//! ```
//!
//! Reference: Martinez, Haro and Ayala, "Marlin: a high throughput
//! variable-to-fixed codec using plurally parsable dictionaries", DCC 2017.

pub mod alphabet;
pub mod codec;
pub mod config;
pub mod dictionary;
pub mod distribution;
pub mod error;
pub mod image;

mod decoder;
mod encoder;
mod residual;

pub use codec::MarlinCodec;
pub use config::CodecConfig;
pub use error::CodecError;

/// A raw source symbol. The codec works on 8-bit sources.
pub type SourceSymbol = u8;

/// An index into the kept, frequency-sorted alphabet. Index 0 is always the
/// most probable symbol; the alphabet size itself is used as the sentinel for
/// "unrepresented" during encoding.
pub type MarlinSymbol = u8;

/// Bit width of a [`SourceSymbol`].
pub const SOURCE_BITS: usize = 8;
