//! Minimal PGM (P5, 8-bit, single channel) reader and writer.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

/// A grayscale image with row-major pixels.
pub struct GrayImage {
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<u8>,
}

/// Reads a binary P5 file with a maximum value of 255.
pub fn read_pgm(path: &Path) -> Result<GrayImage> {
    let file = File::open(path).with_context(|| format!("cannot read {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let magic = read_header_token(&mut reader)?;
    if magic != "P5" {
        bail!("only binary P5 images are supported, got {magic:?}");
    }
    let cols: usize = read_header_token(&mut reader)?
        .parse()
        .context("invalid width")?;
    let rows: usize = read_header_token(&mut reader)?
        .parse()
        .context("invalid height")?;
    let max_value: usize = read_header_token(&mut reader)?
        .parse()
        .context("invalid maximum value")?;
    if cols == 0 || rows == 0 {
        bail!("invalid dimensions {cols}x{rows}");
    }
    if !(1..=255).contains(&max_value) {
        bail!("only 8-bit images are supported, maximum value is {max_value}");
    }

    let mut pixels = vec![0u8; rows * cols];
    reader
        .read_exact(&mut pixels)
        .with_context(|| format!("expected {} pixel bytes", rows * cols))?;
    Ok(GrayImage { rows, cols, pixels })
}

/// Writes a binary P5 file.
pub fn write_pgm(path: &Path, image: &GrayImage) -> Result<()> {
    if image.pixels.len() != image.rows * image.cols {
        bail!(
            "pixel buffer holds {} bytes for a {}x{} image",
            image.pixels.len(),
            image.cols,
            image.rows
        );
    }
    let mut file =
        File::create(path).with_context(|| format!("cannot write {}", path.display()))?;
    write!(file, "P5\n{} {}\n255\n", image.cols, image.rows)?;
    file.write_all(&image.pixels)?;
    Ok(())
}

/// Next whitespace-delimited header token, skipping `#` comment lines.
fn read_header_token<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut token = String::new();
    loop {
        let mut byte = [0u8; 1];
        if reader.read(&mut byte)? == 0 {
            if token.is_empty() {
                bail!("truncated header");
            }
            return Ok(token);
        }
        match byte[0] {
            b'#' if token.is_empty() => {
                let mut comment = String::new();
                reader.read_line(&mut comment)?;
            }
            c if c.is_ascii_whitespace() => {
                if !token.is_empty() {
                    return Ok(token);
                }
            }
            c => token.push(c as char),
        }
    }
}
