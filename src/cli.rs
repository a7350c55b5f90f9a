// Command-line interface for pngdemux.
//
// Uses explicit subcommands and long-form options over the render engine:
// `render` turns a stream of concatenated PNGs into an animated GIF, `scan`
// lists the frame signatures a stream contains without decoding, and
// `config` prints build details.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::anim::DEFAULT_DELAY;
use crate::codec::decoder::PngDecoder;
use crate::codec::encoder::{DEFAULT_GIF_SPEED, GifEncoder};
use crate::engine::{self, MAX_WINDOW_SIZE, RenderOptions, RenderStats};
use crate::io::{self as file_io, IoError};
use crate::stream::{DEFAULT_WINDOW_SIZE, PNG_SIGNATURE, ScanOutcome, Signature, StreamDemuxer};

const DEFAULT_DELAY_MS: u64 = DEFAULT_DELAY.as_millis() as u64;
const DEFAULT_SCAN_WINDOW: u64 = 64 * 1024;

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

/// Parse a byte count with an optional K, M or G suffix.
fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

fn parse_signature(s: &str) -> Result<Signature, String> {
    Signature::from_hex(s).map_err(|e| e.to_string())
}

/// `-` selects stdin/stdout.
fn non_stdio(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| p.as_os_str() != "-")
}

fn window_from(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Split a stream of concatenated PNG images into an animated GIF.
#[derive(Parser, Debug)]
#[command(
    name = "pngdemux",
    version,
    about = "Render a stream of concatenated PNG images as an animated GIF",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decode every frame in the input and write an animated GIF.
    Render(RenderArgs),
    /// List frame signature offsets without decoding.
    Scan(ScanArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct StreamArgs {
    /// Frame signature as hex (default: the PNG magic).
    #[arg(long, value_parser = parse_signature)]
    signature: Option<Signature>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Input stream (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Delay between frames in milliseconds.
    #[arg(long = "delay-ms", default_value_t = DEFAULT_DELAY_MS)]
    delay_ms: u64,

    /// Number of loops (0 loops forever).
    #[arg(long = "loop-count", default_value_t = 0)]
    loop_count: u16,

    /// Lookahead window (supports K/M/G suffix).
    #[arg(long = "window-size", value_parser = parse_byte_size, default_value_t = DEFAULT_WINDOW_SIZE as u64)]
    window_size: u64,

    /// Retry with a doubled window up to this size when a frame outgrows it.
    #[arg(long = "grow-window", value_name = "MAX", value_parser = parse_byte_size)]
    grow_window: Option<u64>,

    /// Keep the frames decoded before a corrupt one.
    #[arg(long)]
    salvage: bool,

    /// GIF quantisation speed (1 = best, 30 = fastest).
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..=30), default_value_t = DEFAULT_GIF_SPEED)]
    speed: i32,

    #[command(flatten)]
    stream: StreamArgs,

    /// Input stream (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Input stream.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Scan window (supports K/M/G suffix).
    #[arg(long = "window-size", value_parser = parse_byte_size, default_value_t = DEFAULT_SCAN_WINDOW)]
    window_size: u64,

    #[command(flatten)]
    stream: StreamArgs,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Render,
    Scan,
    Config,
}

struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    signature: Signature,
    window_size: u64,
    grow_window: Option<u64>,
    delay_ms: u64,
    loop_count: u16,
    salvage: bool,
    speed: i32,
}

impl Options {
    fn new(force: bool, quiet: bool, verbose: u8, json_output: bool) -> Self {
        Self {
            command: Command::Config,
            use_stdout: false,
            force,
            quiet,
            verbose,
            json_output,
            input_file: None,
            output_file: None,
            signature: Signature::png(),
            window_size: DEFAULT_WINDOW_SIZE as u64,
            grow_window: None,
            delay_ms: DEFAULT_DELAY_MS,
            loop_count: 0,
            salvage: false,
            speed: DEFAULT_GIF_SPEED,
        }
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            signature: self.signature.clone(),
            window_size: window_from(self.window_size),
            delay: Duration::from_millis(self.delay_ms),
            loop_count: self.loop_count,
            salvage_partial: self.salvage,
            cancel: None,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    let base = Options::new(cli.force, cli.quiet, cli.verbose.min(2), cli.json_output);

    match cli.command {
        Cmd::Render(args) => Options {
            command: Command::Render,
            use_stdout: args.stdout,
            input_file: non_stdio(args.input.or(args.input_pos)),
            output_file: non_stdio(args.output.or(args.output_pos)),
            signature: args.stream.signature.unwrap_or_default(),
            window_size: args.window_size,
            grow_window: args.grow_window,
            delay_ms: args.delay_ms,
            loop_count: args.loop_count,
            salvage: args.salvage,
            speed: args.speed,
            ..base
        },
        Cmd::Scan(args) => Options {
            command: Command::Scan,
            input_file: non_stdio(Some(args.input)),
            signature: args.stream.signature.unwrap_or_default(),
            window_size: args.window_size,
            ..base
        },
        Cmd::Config => base,
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("pngdemux".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = opts.render_options().validate();
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("pngdemux version {version} (Rust)");

    let png = cfg!(feature = "png-decoder") as u8;
    let gif = cfg!(feature = "gif-encoder") as u8;
    let file_io = cfg!(feature = "file-io") as u8;

    eprintln!("PNG_DECODER={png}");
    eprintln!("GIF_ENCODER={gif}");
    eprintln!("FILE_IO={file_io}");
    eprintln!("SIGNATURE={}", Signature::png());
    eprintln!("DEFAULT_WINDOW_SIZE={DEFAULT_WINDOW_SIZE}");
    eprintln!("MAX_WINDOW_SIZE={MAX_WINDOW_SIZE}");
    eprintln!("DEFAULT_DELAY_MS={DEFAULT_DELAY_MS}");
    eprintln!("DEFAULT_GIF_SPEED={DEFAULT_GIF_SPEED}");

    0
}

// ---------------------------------------------------------------------------
// Render command
// ---------------------------------------------------------------------------

/// The PNG decoder only starts on its own magic, so a render signature
/// must be a prefix of it.
fn png_accepts(signature: &Signature) -> bool {
    PNG_SIGNATURE.starts_with(signature.as_bytes())
}

fn cmd_render(opts: &Options) -> i32 {
    if !png_accepts(&opts.signature) {
        eprintln!(
            "pngdemux: --signature {} does not start a PNG frame; render needs a prefix of {}",
            opts.signature,
            Signature::png()
        );
        return 1;
    }

    let render_opts = opts.render_options();
    if let Err(e) = render_opts.validate() {
        eprintln!("pngdemux: --window-size: {e}");
        return 1;
    }

    let output_file = if opts.use_stdout {
        None
    } else {
        opts.output_file.as_deref()
    };
    if let Some(path) = output_file
        && path.exists()
        && !opts.force
    {
        eprintln!(
            "pngdemux: output file exists, use -f to overwrite: {}",
            path.display()
        );
        return 1;
    }

    let decoder = PngDecoder::new();
    let encoder = GifEncoder::with_speed(opts.speed);

    let result = match (&opts.input_file, output_file) {
        (Some(input), Some(output)) => {
            let stats = match opts.grow_window {
                Some(max) => file_io::render_file_adaptive(
                    input,
                    output,
                    decoder,
                    encoder,
                    &render_opts,
                    window_from(max),
                ),
                None => file_io::render_file(input, output, decoder, encoder, &render_opts),
            };
            stats.map(|stats| Rendered {
                attempts: stats.attempts,
                output_size: stats.output_size,
                output_sha256: stats.output_sha256,
                render: stats.render,
            })
        }
        (input, output) => {
            if opts.grow_window.is_some() && !opts.quiet {
                eprintln!("pngdemux: warning: --grow-window needs file input and output, ignoring");
            }
            render_stream(input.as_deref(), output, decoder, encoder, &render_opts)
        }
    };

    let rendered = match result {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("pngdemux: {e}");
            return 1;
        }
    };
    report_render(opts, &rendered);
    0
}

/// Outcome of a render, however the input and output were opened.
struct Rendered {
    render: RenderStats,
    attempts: u32,
    output_size: u64,
    output_sha256: Option<[u8; 32]>,
}

fn render_stream(
    input: Option<&Path>,
    output: Option<&Path>,
    decoder: PngDecoder,
    encoder: GifEncoder,
    opts: &RenderOptions,
) -> Result<Rendered, IoError> {
    let reader: Box<dyn Read> = match input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin().lock()),
    };

    let mut encoded = Vec::new();
    let render = engine::render(reader, &mut encoded, decoder, encoder, opts)?;

    let output_sha256 = match output {
        Some(path) => file_io::write_output(File::create(path)?, &encoded)?,
        None => file_io::write_output(io::stdout().lock(), &encoded)?,
    };

    Ok(Rendered {
        render,
        attempts: 1,
        output_size: encoded.len() as u64,
        output_sha256,
    })
}

fn report_render(opts: &Options, rendered: &Rendered) {
    let stats = &rendered.render;

    if stats.truncated && !opts.quiet {
        eprintln!(
            "pngdemux: warning: input truncated by a corrupt frame, kept {} frames",
            stats.frames
        );
    }
    if !opts.quiet {
        eprintln!("pngdemux: {} frames rendered", stats.frames);
    }
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "pngdemux: input: {} bytes, skipped: {}, trailing: {}, window: {}",
            stats.bytes_in, stats.skipped_bytes, stats.trailing_bytes, stats.window_size
        );
        eprintln!(
            "pngdemux: output: {} bytes, canvas {}x{}",
            rendered.output_size, stats.canvas.0, stats.canvas.1
        );
        if let Some(digest) = &rendered.output_sha256 {
            eprintln!("pngdemux: sha256: {}", file_io::hex_digest(digest));
        }
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "render",
            "frames": stats.frames,
            "input_bytes": stats.bytes_in,
            "skipped_bytes": stats.skipped_bytes,
            "trailing_bytes": stats.trailing_bytes,
            "window_size": stats.window_size,
            "attempts": rendered.attempts,
            "truncated": stats.truncated,
            "end": stats.end.map(|end| format!("{end:?}")),
            "canvas": [stats.canvas.0, stats.canvas.1],
            "output_bytes": rendered.output_size,
            "output_sha256": rendered.output_sha256.map(|d| file_io::hex_digest(&d)),
            "decoder": stats.decoder,
            "encoder": stats.encoder,
        });
        eprintln!("{json:#}");
    }
}

// ---------------------------------------------------------------------------
// Scan command
// ---------------------------------------------------------------------------

/// Frame signature offsets found in a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScanReport {
    offsets: Vec<u64>,
    /// Total stream length.
    total: u64,
}

impl ScanReport {
    /// Distance from each signature to the next (or to end of stream).
    fn spans(&self) -> Vec<u64> {
        let ends = self.offsets.iter().skip(1).copied().chain([self.total]);
        self.offsets
            .iter()
            .zip(ends)
            .map(|(start, end)| end - start)
            .collect()
    }

    /// Smallest window that covers a decoder consuming nothing at all.
    fn recommended_window(&self, signature_len: usize) -> u64 {
        let largest = self.spans().into_iter().max().unwrap_or(0);
        (largest + signature_len as u64).max(DEFAULT_WINDOW_SIZE as u64)
    }
}

/// Locate every signature, stepping over stretches longer than the window.
fn scan_stream<R: Read>(
    source: R,
    signature: &Signature,
    window_size: usize,
) -> io::Result<ScanReport> {
    let mut demuxer = StreamDemuxer::new(source, signature.clone(), window_size);
    let stride = window_size - signature.len() + 1;
    let mut offsets = Vec::new();
    loop {
        match demuxer.next_frame()? {
            ScanOutcome::FrameReady { offset, .. } => offsets.push(offset),
            ScanOutcome::EndOfStream { .. } => break,
            ScanOutcome::WindowExhausted { .. } => {
                demuxer.stream().skip(stride)?;
            }
        }
    }
    demuxer.stream().skip(usize::MAX)?;
    Ok(ScanReport {
        offsets,
        total: demuxer.position(),
    })
}

fn cmd_scan(opts: &Options) -> i32 {
    let window_size = window_from(opts.window_size);
    if window_size < opts.signature.len() || window_size > MAX_WINDOW_SIZE {
        eprintln!(
            "pngdemux: --window-size must be between {} and {MAX_WINDOW_SIZE}",
            opts.signature.len()
        );
        return 1;
    }

    let report = match &opts.input_file {
        Some(path) => File::open(path).and_then(|f| scan_stream(f, &opts.signature, window_size)),
        None => scan_stream(io::stdin().lock(), &opts.signature, window_size),
    };
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            eprintln!("pngdemux: scan: {e}");
            return 1;
        }
    };

    let spans = report.spans();
    let recommended = report.recommended_window(opts.signature.len());

    if opts.json_output {
        let json = serde_json::json!({
            "command": "scan",
            "frames": report.offsets.len(),
            "offsets": report.offsets,
            "spans": spans,
            "total_bytes": report.total,
            "recommended_window": recommended,
        });
        eprintln!("{json:#}");
        return 0;
    }

    println!("{:>6}  {:>12}  {:>12}", "frame", "offset", "span");
    for (i, (offset, span)) in report.offsets.iter().zip(&spans).enumerate() {
        println!("{i:>6}  {offset:>12}  {span:>12}");
    }
    if !opts.quiet {
        eprintln!(
            "pngdemux: {} frames in {} bytes; --window-size {recommended} covers every frame",
            report.offsets.len(),
            report.total
        );
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    let default_level = match opts.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Warn if -c overrides output filename.
    if opts.use_stdout
        && let Some(path) = opts.output_file.take()
        && !opts.quiet
    {
        eprintln!(
            "pngdemux: warning: -c option overrides output filename: {}",
            path.display()
        );
    }

    let exit_code = match opts.command {
        Command::Render => cmd_render(&opts),
        Command::Scan => cmd_scan(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
