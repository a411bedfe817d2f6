use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mtptree_core::config::parse_storage;
use mtptree_core::provider::directory::DirectoryProvider;
use mtptree_core::{export, logging};
use mtptree_core::{ChannelProgress, Config, ProgressSink, Session, TransferMsg, TransferReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

type DeviceSession = Session<DirectoryProvider>;

#[derive(Parser, Debug)]
#[command(name = "mtptree", about = "Browse and copy device storage as a directory tree")]
struct Args {
    /// Directory emulating the device storage
    #[arg(long)]
    device: PathBuf,
    /// Release and reopen the device session before running the command
    #[arg(long)]
    reset: bool,
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Storage id to select (decimal or 0x-prefixed)
    #[arg(long)]
    storage: Option<String>,
    #[arg(long)]
    max_depth: Option<usize>,
    /// Include hidden entries
    #[arg(short, long)]
    all: bool,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a device folder
    Ls {
        #[arg(default_value = "/")]
        path: String,
        #[arg(short, long)]
        recursive: bool,
        #[arg(long, conflicts_with = "csv")]
        json: bool,
        #[arg(long)]
        csv: bool,
    },
    /// Show one entry
    Info { path: String },
    /// List storages of the device
    Storages,
    Mkdir { path: String },
    Rm { path: String },
    Rename { path: String, name: String },
    /// Copy a device file or folder into a local directory
    Pull { path: String, dest: PathBuf },
    /// Copy a local file or directory into a device folder
    Push { source: PathBuf, dest: String },
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    }
    .with_env()?;
    if let Some(storage) = &args.storage {
        config.storage = Some(parse_storage(storage)?);
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if args.all {
        config.ignore_hidden = false;
    }
    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    let provider = DirectoryProvider::new(&args.device, config.chunk_size);
    let mut session = Session::with_config(provider, config);

    let outcome = run(&mut session, &args);
    match session.release() {
        Ok(()) => info!("device released"),
        Err(e) => warn!(error = %e, "release failed"),
    }
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(session: &mut DeviceSession, args: &Args) -> Result<()> {
    let storage = session
        .open()
        .with_context(|| format!("opening device at {}", args.device.display()))?;
    info!(device = %args.device.display(), storage = storage.0, "device open");
    if args.reset {
        let storage = session.reset().context("resetting session")?;
        info!(storage = storage.0, "session reset");
    }

    match &args.command {
        Command::Ls {
            path,
            recursive,
            json,
            csv,
        } => {
            let opts = session.config().scan_options(*recursive);
            let nodes = session.list(path, opts)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&export::to_json(&nodes))?);
            } else if *csv {
                export::to_csv(&nodes, std::io::stdout())?;
            } else {
                print!("{}", export::render_text(&nodes));
            }
        }
        Command::Info { path } => {
            let node = session.resolve(path)?;
            println!("{}", serde_json::to_string_pretty(&node)?);
        }
        Command::Storages => {
            for (id, storage) in session.storages()? {
                println!("{:#010x}  {}  {}", id.0, storage.volume_label, storage.description);
            }
        }
        Command::Mkdir { path } => {
            let node = session.create_folder(path)?;
            println!("{} ({})", node.path, node.id);
        }
        Command::Rm { path } => session.delete(path)?,
        Command::Rename { path, name } => {
            let node = session.rename(path, name)?;
            println!("{}", node.path);
        }
        Command::Pull { path, dest } => {
            let report = transfer(|sink| session.download(path, dest, Some(sink)))?;
            print_report(&report);
        }
        Command::Push { source, dest } => {
            let report = transfer(|sink| session.upload(source, dest, Some(sink)))?;
            print_report(&report);
        }
    }
    Ok(())
}

/// Runs `job` on a worker thread and renders its progress messages until
/// it finishes.
fn transfer<F>(job: F) -> Result<TransferReport>
where
    F: FnOnce(&mut dyn ProgressSink) -> mtptree_core::Result<TransferReport> + Send,
{
    let (tx, rx) = crossbeam_channel::unbounded::<TransferMsg>();
    std::thread::scope(|scope| {
        let worker = scope.spawn(move || {
            let mut sink = ChannelProgress(tx);
            job(&mut sink)
        });
        for msg in rx.iter() {
            match msg {
                TransferMsg::Progress { path, sent, total } => {
                    eprint!("\r{path}: {sent}/{total}");
                }
                TransferMsg::Completed { path, bytes } => {
                    eprintln!("\r{path}: done ({bytes} bytes)");
                }
            }
        }
        let result = worker
            .join()
            .map_err(|_| anyhow!("transfer thread panicked"))?;
        Ok(result?)
    })
}

fn print_report(report: &TransferReport) {
    println!(
        "{} files, {} folders, {} bytes",
        report.files, report.folders, report.bytes
    );
}
