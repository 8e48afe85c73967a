use clap::{Parser, Subcommand};
use pixbatch::clipboard::{ArboardClipboard, ClipboardError, PASTE_FORMATS, PasteInput};
use pixbatch::config::{self, PixbatchConfig};
use pixbatch::imaging::{DimensionLocks, OutputFormat, RustBackend};
use pixbatch::package::DirectorySink;
use pixbatch::session::{Session, SessionError};
use pixbatch::{clipboard, output};
use std::path::{Path, PathBuf};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pixbatch")]
#[command(about = "Save clipboard images and batch resize/convert image files")]
#[command(long_about = "\
Save clipboard images and batch resize/convert image files

Input formats: jpg, jpeg, png, gif, bmp, webp, tif, tiff, avif
(heic/heif are recognised but cannot be decoded).
Output formats: png, jpeg, webp, avif, bmp, tiff.

Sizing:
  --width / --height set the target size. With --lock-ratio (the default)
  entering one axis derives the other from each image's aspect ratio.
  --lock-width / --lock-height make that axis authoritative.
  Values like '640.5' are truncated; 0, negative or non-numeric values are
  treated as not entered.

Settings are read from pixbatch.toml in the current directory.
Run 'pixbatch gen-config' to generate a documented one.")]
#[command(version = version_string())]
struct Cli {
    /// Directory converted files are written to
    #[arg(long, default_value = ".", global = true)]
    output: PathBuf,

    /// Config file (default: ./pixbatch.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Target size and lock toggles.
#[derive(clap::Args, Clone)]
struct SizeArgs {
    /// Target width in pixels
    #[arg(long)]
    width: Option<String>,

    /// Target height in pixels
    #[arg(long)]
    height: Option<String>,

    /// Make the entered width authoritative
    #[arg(long)]
    lock_width: bool,

    /// Make the entered height authoritative
    #[arg(long)]
    lock_height: bool,

    /// Derive the missing axis from the aspect ratio
    #[arg(long, conflicts_with = "no_lock_ratio")]
    lock_ratio: bool,

    /// Do not derive the missing axis
    #[arg(long)]
    no_lock_ratio: bool,
}

/// Images to put in the queue.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Image files or directories
    paths: Vec<PathBuf>,

    /// Also queue the image on the clipboard
    #[arg(long)]
    clipboard: bool,

    /// Keep every input instead of only the first
    #[arg(long)]
    batch: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Save the clipboard image as pasted-image.<ext>
    Paste {
        /// png, jpeg or webp
        #[arg(long, default_value = "png")]
        format: OutputFormat,

        /// Read the image from this file instead of the clipboard
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Resize and convert images
    Convert {
        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        size: SizeArgs,

        /// Output format
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Lossy encoder quality, 0.0 to 1.0
        #[arg(long)]
        quality: Option<f32>,

        /// Deliver multiple outputs as one zip
        #[arg(long)]
        zip: bool,
    },
    /// Show the queue and the size each image would be converted to
    Inspect {
        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        size: SizeArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock pixbatch.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Paste { format, from } => {
            if !PASTE_FORMATS.contains(&format) {
                return Err(format!("paste supports png, jpeg and webp, not {format}").into());
            }
            let backend = RustBackend::new();
            let mut sink = DirectorySink::new(&cli.output);
            let result = match from {
                Some(path) => clipboard::paste(PasteInput::File(path), &backend, format, &mut sink),
                None => ArboardClipboard::open().and_then(|mut source| {
                    clipboard::paste(PasteInput::Clipboard(&mut source), &backend, format, &mut sink)
                }),
            };
            match result {
                Ok(report) => output::print_paste_report(&report),
                Err(e @ (ClipboardError::Io(_) | ClipboardError::Deliver(_))) => {
                    return Err(e.into());
                }
                Err(e) => eprintln!("{e}"),
            }
        }
        Command::Convert {
            inputs,
            size,
            format,
            quality,
            zip,
        } => {
            let mut config = load_settings(cli.config.as_deref())?;
            if let Some(format) = format {
                config.output.format = format;
            }
            if let Some(quality) = quality {
                config.output.quality = quality;
            }
            config.output.archive |= zip;
            config.validate()?;
            init_thread_pool(&config.processing);

            let backend = RustBackend::new();
            let session = build_session(&config, &inputs, &size, &backend);

            let mut sink = DirectorySink::new(&cli.output);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_convert_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = session.convert_all(&backend, &mut sink, Some(&tx));
            drop(tx);
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;

            match result {
                Ok(outcome) => output::print_convert_outcome(&outcome),
                Err(SessionError::Package(e)) => {
                    log::error!("packaging failed: {e}");
                    eprintln!("Error processing images. Nothing was saved.");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Inspect { inputs, size, json } => {
            let config = load_settings(cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            let backend = RustBackend::new();
            let session = build_session(&config, &inputs, &size, &backend);
            if json {
                println!("{}", output::queue_json(&session)?);
            } else {
                output::print_queue(&session);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the named config file, or `./pixbatch.toml` when present.
fn load_settings(path: Option<&Path>) -> Result<PixbatchConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_explicit_config(path),
        None => config::load_config(Path::new(config::CONFIG_FILE)),
    }
}

/// Build a session from config and flags, fill its queue, and apply the size inputs.
fn build_session(
    config: &PixbatchConfig,
    inputs: &InputArgs,
    size: &SizeArgs,
    backend: &RustBackend,
) -> Session {
    let mut session = Session::new(
        config.output.output_spec(),
        config.dimensions.locks(),
        inputs.batch || config.acquire.batch,
    )
    .with_archive_name(&config.output.archive_name);

    if inputs.clipboard {
        let acquired = ArboardClipboard::open()
            .map_err(SessionError::from)
            .and_then(|mut source| session.acquire_clipboard(backend, &mut source));
        match acquired {
            Ok(report) => output::print_acquire_report(&report),
            Err(e) => eprintln!("{e}"),
        }
    }
    if !inputs.paths.is_empty() {
        let report = session.acquire_paths(backend, &inputs.paths);
        output::print_acquire_report(&report);
    }

    let base = config.dimensions.locks();
    let ratio = if size.no_lock_ratio {
        false
    } else {
        size.lock_ratio || base.ratio
    };
    session.set_locks(DimensionLocks::new(
        size.lock_width || base.width,
        size.lock_height || base.height,
        ratio,
    ));
    if let Some(width) = &size.width {
        session.set_width_input(width.as_str());
    }
    if let Some(height) = &size.height {
        session.set_height_input(height.as_str());
    }
    session
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
