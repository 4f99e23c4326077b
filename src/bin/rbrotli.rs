use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use rbrotli::{compress_stats, decompress, CompressConfig};

#[derive(Parser, Debug)]
#[command(name = "rbrotli")]
#[command(about = "Compress or decompress Brotli (RFC 7932) streams")]
#[command(version)]
struct Args {
    /// Input file (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (use - for stdout)
    #[arg(short, long, required_unless_present = "verify")]
    output: Option<PathBuf>,

    /// Decompress instead of compress
    #[arg(short, long)]
    decompress: bool,

    /// Window size in bits (10-24)
    #[arg(short = 'w', long, default_value = "22", value_parser = clap::value_parser!(u8).range(10..=24))]
    window_bits: u8,

    /// Always emit uncompressed meta-blocks (fast, no compression)
    #[arg(long)]
    store: bool,

    /// Compress, then decode the result and check it matches the input
    /// (0 = match, 1 = mismatch, 2 = error)
    #[arg(long)]
    verify: bool,

    /// Show statistics on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

const EXIT_OK: u8 = 0;
const EXIT_MISMATCH: u8 = 1;
const EXIT_ERROR: u8 = 2;

/// Format bytes as a human-readable string
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn read_input(path: &PathBuf) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    if path.to_str() == Some("-") {
        io::stdin().lock().read_to_end(&mut data)?;
    } else {
        File::open(path)?.read_to_end(&mut data)?;
    }
    Ok(data)
}

fn write_output(path: &PathBuf, data: &[u8]) -> io::Result<()> {
    if path.to_str() == Some("-") {
        io::stdout().lock().write_all(data)?;
    } else {
        File::create(path)?.write_all(data)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run() -> Result<u8, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let input = read_input(&args.input)?;
    let config = CompressConfig {
        window_bits: args.window_bits,
        force_uncompressed: args.store,
    };

    if args.verify {
        let start = Instant::now();
        let (encoded, stats) = compress_stats(&input, &config);
        let decoded = decompress(&encoded)?;
        let elapsed = start.elapsed();

        let matched = decoded == input;
        if !args.quiet {
            eprintln!("Round trip: {}", if matched { "ok" } else { "MISMATCH" });
            eprintln!("  Input bytes:  {}", stats.input_bytes);
            eprintln!("  Stream bytes: {}", stats.output_bytes);
            eprintln!("  Meta-blocks:  {}", stats.meta_blocks);
            eprintln!("  Time:         {:.2?}", elapsed);
        }
        return Ok(if matched { EXIT_OK } else { EXIT_MISMATCH });
    }

    let output_path = args.output.as_ref().expect("output required when not verifying");
    let start = Instant::now();

    if args.decompress {
        let decoded = decompress(&input)?;
        write_output(output_path, &decoded)?;
        let elapsed = start.elapsed();
        if args.verbose && !args.quiet {
            eprintln!("Decompressed:");
            eprintln!("  Input bytes:  {} ({})", input.len(), format_bytes(input.len() as u64));
            eprintln!(
                "  Output bytes: {} ({})",
                decoded.len(),
                format_bytes(decoded.len() as u64)
            );
            eprintln!("  Time:         {:.2?}", elapsed);
            eprintln!(
                "  Throughput:   {:.1} MB/s",
                decoded.len() as f64 / elapsed.as_secs_f64() / 1_000_000.0
            );
        }
    } else {
        let (encoded, stats) = compress_stats(&input, &config);
        write_output(output_path, &encoded)?;
        let elapsed = start.elapsed();
        if args.verbose && !args.quiet {
            let ratio = if input.is_empty() {
                1.0
            } else {
                encoded.len() as f64 / input.len() as f64
            };
            eprintln!("Compressed:");
            eprintln!("  Input bytes:  {} ({})", input.len(), format_bytes(input.len() as u64));
            eprintln!(
                "  Output bytes: {} ({})",
                encoded.len(),
                format_bytes(encoded.len() as u64)
            );
            eprintln!("  Ratio:        {:.3}", ratio);
            eprintln!("  Meta-blocks:  {}", stats.meta_blocks);
            eprintln!("  Commands:     {}", stats.commands);
            eprintln!("  Time:         {:.2?}", elapsed);
            eprintln!(
                "  Throughput:   {:.1} MB/s",
                input.len() as f64 / elapsed.as_secs_f64() / 1_000_000.0
            );
        }
    }

    Ok(EXIT_OK)
}
