//! Entry point used by the uninstaller
use clap::Parser;
use mullvad_cleanup::common::{install_logger, APP_NAME};
use mullvad_cleanup::Operation;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Run every operation
    #[arg(long, conflicts_with = "operations")]
    all: bool,
    /// Operations to run, in the order given
    #[arg(value_enum, required_unless_present = "all")]
    operations: Vec<Operation>,
}

#[cfg(windows)]
fn run(args: Args) -> anyhow::Result<bool> {
    use mullvad_cleanup::platform::NativePlatform;
    use mullvad_cleanup::Cleaner;

    log::info!(
        "Starting {} cleanup, version: {}",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    let operations = if args.all {
        enum_iterator::all::<Operation>().collect()
    } else {
        args.operations
    };
    let outcomes = Cleaner::new(NativePlatform).run(operations);
    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(outcomes.iter().all(|o| o.error.is_none()))
}

#[cfg(not(windows))]
fn run(_args: Args) -> anyhow::Result<bool> {
    anyhow::bail!("{} cleanup is only supported on Windows", APP_NAME)
}

fn main() {
    let args: Args = Args::parse();

    if let Err(e) = install_logger(args.debug, args.log_file.as_deref()) {
        eprintln!("Unable to install logger: {:#}", e);
        std::process::exit(1);
    }
    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
