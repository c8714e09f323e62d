//! Block predictor and uniform quantizer.
//!
//! The image is cut into square blocks. Each block keeps its top-left pixel
//! as side information; the rest of the first row is predicted from the
//! left neighbor and every later row from the pixel directly above
//! ("north"). Residuals are wrapping byte differences, which concentrates
//! their distribution around zero for smooth images. Quantization, when
//! enabled, divides pixels by a power-of-two step before prediction.

use anyhow::{bail, Result};

/// Direct and inverse north-prediction transform over fixed-size blocks.
pub struct NorthPredictor {
    block_size: usize,
    qstep_log2: u32,
}

/// Output of the direct transform: one seed pixel per block plus the
/// block-sequential residual plane.
pub struct Transformed {
    pub side_info: Vec<u8>,
    pub residuals: Vec<u8>,
}

impl NorthPredictor {
    /// `qstep` must be a power of two in 1..=8.
    pub fn new(block_size: usize, qstep: u8) -> Result<Self> {
        if block_size < 2 {
            bail!("block size must be at least 2, got {block_size}");
        }
        if !qstep.is_power_of_two() || qstep > 8 {
            bail!("quantizer step must be a power of two in 1..=8, got {qstep}");
        }
        Ok(Self {
            block_size,
            qstep_log2: qstep.trailing_zeros(),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn check_dims(&self, rows: usize, cols: usize) -> Result<()> {
        if rows == 0 || cols == 0 || rows % self.block_size != 0 || cols % self.block_size != 0 {
            bail!(
                "image dimensions {cols}x{rows} must be non-zero multiples of \
                 the block size {}",
                self.block_size
            );
        }
        Ok(())
    }

    /// Predicts and quantizes `pixels` (row-major `rows` by `cols`).
    pub fn transform_direct(&self, pixels: &[u8], rows: usize, cols: usize) -> Result<Transformed> {
        self.check_dims(rows, cols)?;
        if pixels.len() != rows * cols {
            bail!("pixel buffer does not match {cols}x{rows}");
        }

        let bs = self.block_size;
        let quantized: Vec<u8>;
        let pixels = if self.qstep_log2 > 0 {
            quantized = pixels.iter().map(|p| p >> self.qstep_log2).collect();
            &quantized[..]
        } else {
            pixels
        };

        let (brows, bcols) = (rows / bs, cols / bs);
        let mut side_info = Vec::with_capacity(brows * bcols);
        let mut residuals = Vec::with_capacity(rows * cols);

        for bi in 0..brows {
            for bj in 0..bcols {
                let top = bi * bs;
                let left = bj * bs;
                side_info.push(pixels[top * cols + left]);

                // First row: left-neighbor prediction; the seed position
                // itself contributes a zero residual.
                residuals.push(0);
                for jj in 1..bs {
                    let at = top * cols + left + jj;
                    residuals.push(pixels[at].wrapping_sub(pixels[at - 1]));
                }
                // Remaining rows: north prediction.
                for ii in 1..bs {
                    let at = (top + ii) * cols + left;
                    for jj in 0..bs {
                        residuals.push(pixels[at + jj].wrapping_sub(pixels[at + jj - cols]));
                    }
                }
            }
        }

        Ok(Transformed {
            side_info,
            residuals,
        })
    }

    /// Rebuilds the (quantized) image from residuals and side information,
    /// then rescales by the quantizer step.
    pub fn transform_inverse(
        &self,
        transformed: &Transformed,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<u8>> {
        self.check_dims(rows, cols)?;
        let bs = self.block_size;
        let (brows, bcols) = (rows / bs, cols / bs);
        if transformed.side_info.len() != brows * bcols {
            bail!("side information does not match the block grid");
        }
        if transformed.residuals.len() != rows * cols {
            bail!("residual plane does not match {cols}x{rows}");
        }

        let mut pixels = vec![0u8; rows * cols];
        let mut residuals = transformed.residuals.iter();

        for bi in 0..brows {
            for bj in 0..bcols {
                let top = bi * bs;
                let left = bj * bs;
                let seed = transformed.side_info[bi * bcols + bj];

                let _ = residuals.next();
                pixels[top * cols + left] = seed;
                for jj in 1..bs {
                    let at = top * cols + left + jj;
                    let r = *residuals.next().unwrap_or(&0);
                    pixels[at] = pixels[at - 1].wrapping_add(r);
                }
                for ii in 1..bs {
                    let at = (top + ii) * cols + left;
                    for jj in 0..bs {
                        let r = *residuals.next().unwrap_or(&0);
                        pixels[at + jj] = pixels[at + jj - cols].wrapping_add(r);
                    }
                }
            }
        }

        if self.qstep_log2 > 0 {
            for p in pixels.iter_mut() {
                *p <<= self.qstep_log2;
            }
        }
        Ok(pixels)
    }
}
