use clap::{Parser, Subcommand};
use std::path::PathBuf;
use webp_sync::{config, exclude, output, sync};

#[derive(Parser)]
#[command(name = "webp-sync")]
#[command(about = "Mirror PNG and JPEG images into a tree of WebP derivatives")]
#[command(long_about = "\
Mirror PNG and JPEG images into a tree of WebP derivatives

Every run first deletes derivatives whose source is gone or excluded, then
encodes each image whose derivative is missing or older than the image.
A second run with no changes converts nothing.

Layout (defaults):

  public/
  └── assets/                      # Source tree
      ├── photos/dawn.jpg
      ├── private/                 # Listed in exclude_paths: never converted
      └── _webp/                   # Derivative tree, mirrors assets/
          └── photos/dawn.jpg.webp

Image type is detected from file content, not the extension. Images above
size_limit_megapixels are reported and left alone.

Run 'webp-sync gen-config' to generate a documented webp-sync.toml.")]
#[command(version)]
struct Cli {
    /// Config file; relative paths inside it resolve against its directory
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Override the public web root from the config file
    #[arg(long, global = true)]
    public_root: Option<PathBuf>,

    /// Verbose logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delete orphaned derivatives, then convert new and changed images
    Run {
        /// Also print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve config, roots and exclusions without touching any file
    Check,
    /// Print a stock webp-sync.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "webp_sync=debug".to_string()
        } else {
            "webp_sync=warn".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Run { json } => {
            let sync_config = load(&cli.config, cli.public_root.as_deref())?;
            let base_dir = config::config_base_dir(&cli.config);
            init_thread_pool(&sync_config.processing);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_sync_event(&event);
                }
            });
            let result = sync::run(&sync_config, base_dir, Some(&tx));
            drop(tx);
            printer.join().map_err(|_| "output thread panicked")?;
            let report = result?;

            output::print_report(&report);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Command::Check => {
            let sync_config = load(&cli.config, cli.public_root.as_deref())?;
            let roots = sync_config.resolve_roots(config::config_base_dir(&cli.config))?;
            let exclusions =
                exclude::ExclusionFilter::resolve(&roots.public_root, &sync_config.exclude_paths);
            output::print_check_output(&cli.config, &roots, &exclusions);
            if !roots.source_root.is_dir() {
                return Err(sync::SyncError::SourceRootMissing(roots.source_root).into());
            }
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config file and apply command-line overrides.
fn load(
    path: &std::path::Path,
    public_root: Option<&std::path::Path>,
) -> Result<config::SyncConfig, Box<dyn std::error::Error>> {
    let mut sync_config = config::load_config(path)?;
    if let Some(root) = public_root {
        // Command-line paths are relative to the working directory
        sync_config.public_root = std::path::absolute(root)?;
    }
    Ok(sync_config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
