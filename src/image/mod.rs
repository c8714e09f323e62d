//! Image compression pipeline on top of the block codec.
//!
//! The pipeline predicts each block, measures the entropy of the residual
//! plane and picks the closest member of a fixed family of
//! Laplacian-trained codecs. Only the family index travels in the header,
//! so the decompressor rebuilds the identical dictionary deterministically.

pub mod pgm;
pub mod transform;

use anyhow::{bail, Context, Result};
use log::info;

use crate::config::CodecConfig;
use crate::distribution;
use crate::error::CodecError;
use crate::MarlinCodec;

pub use pgm::{read_pgm, write_pgm, GrayImage};
pub use transform::{NorthPredictor, Transformed};

const MAGIC: &[u8; 4] = b"MRL1";

/// Number of Laplacian-trained dictionaries available to the image coder,
/// spaced by residual entropy.
pub const DICTIONARY_FAMILY: usize = 16;

/// Builds the family member for a header index. Deterministic, so both
/// sides of the pipeline derive the same tables.
pub fn family_codec(index: u8) -> Result<MarlinCodec, CodecError> {
    let index = (index as usize).min(DICTIONARY_FAMILY - 1);
    let target = 8.0 * (index as f64 + 0.5) / DICTIONARY_FAMILY as f64;
    let pmf = distribution::laplacian_pmf_for_entropy(target);
    MarlinCodec::new(&pmf, CodecConfig::default())
}

fn family_index_for(residuals: &[u8]) -> u8 {
    let mut histogram = [0f64; 256];
    for &r in residuals {
        histogram[r as usize] += 1.0;
    }
    let bits = distribution::entropy(&histogram);
    let index = (bits / 8.0 * DICTIONARY_FAMILY as f64) as usize;
    index.min(DICTIONARY_FAMILY - 1) as u8
}

/// Serialized image header: magic, dimensions, block size, quantizer step
/// and the dictionary family index.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHeader {
    pub rows: u32,
    pub cols: u32,
    pub block_size: u16,
    pub qstep: u8,
    pub dictionary: u8,
}

impl ImageHeader {
    const SIZE: usize = 4 + 4 + 4 + 2 + 1 + 1;

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.rows.to_le_bytes());
        out.extend_from_slice(&self.cols.to_le_bytes());
        out.extend_from_slice(&self.block_size.to_le_bytes());
        out.push(self.qstep);
        out.push(self.dictionary);
    }

    fn read_from(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("truncated image header");
        }
        if &data[..4] != MAGIC {
            bail!("not a marlin image stream");
        }
        Ok(Self {
            rows: u32::from_le_bytes(data[4..8].try_into()?),
            cols: u32::from_le_bytes(data[8..12].try_into()?),
            block_size: u16::from_le_bytes(data[12..14].try_into()?),
            qstep: data[14],
            dictionary: data[15],
        })
    }
}

/// Compresses a grayscale image. Lossless for `qstep` 1.
pub fn compress_image(image: &GrayImage, block_size: usize, qstep: u8) -> Result<Vec<u8>> {
    let predictor = NorthPredictor::new(block_size, qstep)?;
    let transformed = predictor.transform_direct(&image.pixels, image.rows, image.cols)?;

    let dictionary = family_index_for(&transformed.residuals);
    let codec = family_codec(dictionary).context("training the block dictionary")?;

    let header = ImageHeader {
        rows: image.rows as u32,
        cols: image.cols as u32,
        block_size: block_size as u16,
        qstep,
        dictionary,
    };
    let mut out = Vec::with_capacity(ImageHeader::SIZE + image.pixels.len() / 2);
    header.write_to(&mut out);
    out.extend_from_slice(&transformed.side_info);

    // Entropy code the residual plane one prediction block at a time, each
    // with its own length prefix so blocks stay independently decodable.
    let coded_block = block_size * block_size;
    let mut scratch = vec![0u8; coded_block];
    for block in transformed.residuals.chunks(coded_block) {
        let written = codec
            .compress_into(block, &mut scratch)
            .context("entropy coding a residual block")?;
        out.extend_from_slice(&(written as u32).to_le_bytes());
        out.extend_from_slice(&scratch[..written]);
    }

    info!(
        "compressed {}x{} image: {} -> {} bytes ({:.3} bpp, dictionary {})",
        image.cols,
        image.rows,
        image.pixels.len(),
        out.len(),
        8.0 * out.len() as f64 / image.pixels.len() as f64,
        dictionary,
    );
    Ok(out)
}

/// Inverts [`compress_image`].
pub fn decompress_image(data: &[u8]) -> Result<GrayImage> {
    let header = ImageHeader::read_from(data)?;
    let (rows, cols) = (header.rows as usize, header.cols as usize);
    let block_size = header.block_size as usize;
    let predictor = NorthPredictor::new(block_size, header.qstep)?;

    let blocks = (rows / block_size) * (cols / block_size);
    let mut at = ImageHeader::SIZE;
    if data.len() < at + blocks {
        bail!("truncated side information");
    }
    let side_info = data[at..at + blocks].to_vec();
    at += blocks;

    let codec = family_codec(header.dictionary).context("rebuilding the block dictionary")?;
    let coded_block = block_size * block_size;
    let mut residuals = Vec::with_capacity(rows * cols);
    for _ in 0..blocks {
        if data.len() < at + 4 {
            bail!("truncated block length");
        }
        let len = u32::from_le_bytes(data[at..at + 4].try_into()?) as usize;
        at += 4;
        if data.len() < at + len {
            bail!("truncated block payload");
        }
        let block = codec
            .decompress(&data[at..at + len], coded_block)
            .context("entropy decoding a residual block")?;
        residuals.extend_from_slice(&block);
        at += len;
    }

    let transformed = Transformed {
        side_info,
        residuals,
    };
    let pixels = predictor.transform_inverse(&transformed, rows, cols)?;
    Ok(GrayImage { rows, cols, pixels })
}
