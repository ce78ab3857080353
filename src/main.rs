//! isx2gb, a converter from ISAS's ISX object format to flat Game Boy ROMs.

#![deny(unused)]
#![deny(warnings)]
#![deny(unsafe_code)]

use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use structopt::StructOpt;

use isx2gb::config::Fill;
use isx2gb::config::Options;
use isx2gb::convert;
use isx2gb::emit;
use isx2gb::error;
use isx2gb::isx::dump;
use isx2gb::isx::Framing;
use isx2gb::isx::Isx;

lazy_static! {
  static ref ISX_SUFFIX: Regex = Regex::new(r"(?i)\.isx$").unwrap();
}

/// Converts an ISX object file into a Game Boy ROM.
#[derive(StructOpt, Debug)]
#[structopt(name = "isx2gb")]
struct Args {
  /// Fill byte for unused ROM space, 0x00 or 0xff [default: 0xff]
  #[structopt(short, long)]
  fill: Option<Fill>,

  /// Treat conflicting overlapping writes as fatal
  #[structopt(short, long)]
  strict: bool,

  /// Skip range (0x13) and symbol (0x14) records instead of rejecting them
  #[structopt(short, long)]
  metadata: bool,

  /// JSON5 options file; command line flags take precedence over it
  #[structopt(short, long, parse(from_os_str))]
  config: Option<PathBuf>,

  /// Output path [default: the input path, with .isx replaced by .gb]
  #[structopt(short, long, parse(from_os_str))]
  output: Option<PathBuf>,

  /// Apply the records to an existing ROM, writing <rom>-patched.<ext>
  #[structopt(short, long, parse(from_os_str))]
  patch: Option<PathBuf>,

  /// Write each bank data record to its own .bin file instead of a ROM
  #[structopt(short, long)]
  dump: bool,

  /// Print a listing of every record instead of writing a ROM
  #[structopt(short, long)]
  list: bool,

  /// Print where data was placed in the ROM
  #[structopt(short, long)]
  verbose: bool,

  /// The .isx file to convert
  #[structopt(parse(from_os_str))]
  input: PathBuf,
}

fn main() {
  env_logger::Builder::from_env(
    env_logger::Env::default().default_filter_or("warn"),
  )
  .init();

  let args = Args::from_args();
  if let Err(code) = run(&args) {
    process::exit(code);
  }
}

/// Prints `error` to stderr, returning the exit code to fail with.
fn fail<E: error::Error + ?Sized>(error: &E, file: &Path) -> i32 {
  let _ = error::dump_one(error, file, io::stderr());
  1
}

fn run(args: &Args) -> Result<(), i32> {
  let input = args.input.to_string_lossy();
  if !ISX_SUFFIX.is_match(&input) {
    eprintln!("error: {} is not an .isx file", args.input.display());
    return Err(1);
  }
  let stem = PathBuf::from(ISX_SUFFIX.replace(&input, "").into_owned());
  let default_output =
    PathBuf::from(ISX_SUFFIX.replace(&input, ".gb").into_owned());

  let mut opts = match &args.config {
    Some(path) => Options::load(path).map_err(|e| fail(&e, path))?,
    None => Options::default(),
  };
  if let Some(fill) = args.fill {
    opts.fill = fill;
  }
  opts.strict |= args.strict;
  if args.metadata {
    opts.framing = Framing::Metadata;
  }
  info!("options: {:?}", opts);

  let file = &args.input;
  let raw = emit::read(file).map_err(|e| fail(&e, file))?;

  if args.list || args.dump {
    let isx = Isx::parse(&raw).map_err(|e| fail(&e, file))?;
    if args.list {
      let stdout = io::stdout();
      dump::list(&isx, opts.framing, stdout.lock())
        .map_err(|e| fail(&e, file))?;
    }
    if args.dump {
      let paths = dump::split(&isx, opts.framing, &stem)
        .map_err(|e| fail(&e, file))?;
      for path in paths {
        println!("wrote {}", path.display());
      }
    }
    return Ok(());
  }

  let (output, out) = match &args.patch {
    Some(rom) => {
      let bytes = emit::read(rom).map_err(|e| fail(&e, rom))?;
      let out = convert::patch(&raw, bytes, &opts)
        .map_err(|e| fail(&e, file))?;
      let output = args.output.clone().unwrap_or_else(|| patched_path(rom));
      (output, out)
    }
    None => {
      let out = convert::convert(&raw, &opts).map_err(|e| fail(&e, file))?;
      let output = args.output.clone().unwrap_or(default_output);
      (output, out)
    }
  };

  println!("{}", out.build_tag);
  emit::write_atomic(&output, &out.rom).map_err(|e| fail(&e, &output))?;
  info!("wrote {} bytes to {}", out.rom.len(), output.display());

  let stderr = io::stderr();
  let mut stderr = stderr.lock();
  let _ = out.summary.diagnostics.dump_to(file, &mut stderr);
  if args.verbose {
    let _ = write!(stderr, "{}", out.summary.layout);
    let _ = writeln!(
      stderr,
      "{} records, {} bytes placed, {} byte ROM",
      out.summary.records,
      out.summary.layout.total(),
      out.rom.len()
    );
  }
  Ok(())
}

/// Returns where a patched copy of the ROM at `rom` goes:
/// `game.gb` becomes `game-patched.gb`.
fn patched_path(rom: &Path) -> PathBuf {
  let stem = rom
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();
  let name = match rom.extension() {
    Some(ext) => format!("{}-patched.{}", stem, ext.to_string_lossy()),
    None => format!("{}-patched", stem),
  };
  rom.with_file_name(name)
}
