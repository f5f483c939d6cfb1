//! Command-line front end: decompresses a zstd stream from a file (or
//! stdin) to a file (or stdout), with flags for an external dictionary and
//! the decoder's bounded parameters.
//!
//! Grounded on `passcod-zarc`'s `puredec` binary (`clap::Parser` over a
//! single input path, dispatching straight into the library's decoder) and
//! on `oozextract`'s `log`-based diagnostics in place of `puredec`'s
//! `tracing` macros, to keep the binary's logging on the same crate as the
//! library it drives.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use zdecomp::context::{DecoderParameters, Format};
use zdecomp::{Dictionary, DecompressionContext};

/// Decompress a Zstandard (zstd) stream.
#[derive(Debug, Parser)]
#[command(name = "zdecomp", version, about)]
struct Args {
    /// Input file; reads stdin when omitted.
    input: Option<PathBuf>,

    /// Output file; writes stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// External dictionary file (raw content, or zstd-formatted).
    #[arg(long)]
    dict: Option<PathBuf>,

    /// Largest accepted Window_Descriptor, in log2 bytes.
    #[arg(long, default_value_t = DecoderParameters::default().window_log_max)]
    window_log_max: u32,

    /// Accept frames with no magic number (format is known out of band).
    #[arg(long)]
    magicless: bool,

    /// Consume but don't verify the trailing content checksum.
    #[arg(long)]
    force_ignore_checksum: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    log::debug!("{:?}", args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("zdecomp: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let input = read_input(args.input.as_deref())?;
    log::info!("read {} input bytes", input.len());

    let mut params = DecoderParameters {
        window_log_max: args.window_log_max,
        ..DecoderParameters::default()
    };
    if args.magicless {
        params.format = Format::Zstd1Magicless;
    }
    params.force_ignore_checksum = args.force_ignore_checksum;

    let mut ctx = DecompressionContext::new();
    ctx.set_parameters(params);

    if let Some(dict_path) = &args.dict {
        let dict_bytes = fs::read(dict_path)?;
        let dict = Dictionary::parse(&dict_bytes)?;
        log::debug!("loaded dictionary, dict_id={}", dict.dict_id);
        ctx.load_dictionary(dict);
    }

    let output = ctx.decompress(&input)?;
    log::info!("wrote {} output bytes", output.len());
    write_output(args.output.as_deref(), &output)
}

fn read_input(path: Option<&std::path::Path>) -> io::Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&std::path::Path>, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(path) => fs::write(path, bytes)?,
        None => io::stdout().write_all(bytes)?,
    }
    Ok(())
}
