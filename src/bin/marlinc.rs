use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use marlin_codec::image::{compress_image, decompress_image, read_pgm, write_pgm};

#[derive(Parser, Debug)]
#[command(about = "Marlin image compressor for 8-bit PGM images", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbosity; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a PGM image into a marlin stream.
    Compress {
        input: PathBuf,
        output: PathBuf,

        /// Side length of the prediction blocks.
        #[arg(long, default_value_t = 64)]
        block_size: usize,

        /// Power-of-two quantizer step; 1 keeps the pipeline lossless.
        #[arg(long, default_value_t = 1)]
        qstep: u8,
    },
    /// Decompress a marlin stream back into a PGM image.
    Decompress { input: PathBuf, output: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    stderrlog::new()
        .verbosity(args.verbose as usize + 2)
        .timestamp(stderrlog::Timestamp::Second)
        .init()
        .unwrap();

    match args.command {
        Command::Compress {
            input,
            output,
            block_size,
            qstep,
        } => {
            let image = read_pgm(&input)?;
            let start = Instant::now();
            let compressed = compress_image(&image, block_size, qstep)?;
            info!(
                "{}: {} -> {} bytes ({:.2}:1) in {:.1} ms",
                input.display(),
                image.pixels.len(),
                compressed.len(),
                image.pixels.len() as f64 / compressed.len() as f64,
                start.elapsed().as_secs_f64() * 1e3,
            );
            fs::write(&output, compressed)
                .with_context(|| format!("cannot write {}", output.display()))?;
        }
        Command::Decompress { input, output } => {
            let data = fs::read(&input)
                .with_context(|| format!("cannot read {}", input.display()))?;
            let start = Instant::now();
            let image = decompress_image(&data)?;
            info!(
                "{}: {} -> {} bytes in {:.1} ms",
                input.display(),
                data.len(),
                image.pixels.len(),
                start.elapsed().as_secs_f64() * 1e3,
            );
            write_pgm(&output, &image)?;
        }
    }
    Ok(())
}
