//! Command-line entry point: wires a transport (a real PC/SC reader or the
//! in-memory simulator), a CSV key ledger, and a terminal logger to the
//! three tool-level operations the core exposes.

mod logging_setup;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ntag_core::keyledger::KeySet;
use ntag_core::rng::{OsRandom, RandomSource};
use ntag_core::sdm::SdmUrlTemplate;
use ntag_core::tools;
use ntag_core::Transport;
use ntag_ledger::CsvKeyLedger;
use ntag_logging::{ImmutableLogger, SharedLogger};
use ntag_transport::{PcscTransport, SimulatorTransport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ntag-cli", about = "Diagnose, provision and restore NTAG424 DNA SDM tags")]
struct Cli {
    /// Reader name to connect to. Mutually exclusive with --simulate.
    #[arg(long, global = true)]
    reader: Option<String>,

    /// Run against the in-memory simulator instead of a real reader.
    #[arg(long, global = true)]
    simulate: bool,

    /// Pass the escape-wrapped "Direct Transmit" envelope some readers need.
    #[arg(long, global = true)]
    escape: bool,

    /// Path to the CSV key ledger.
    #[arg(long, global = true, default_value = "keys.csv")]
    ledger: PathBuf,

    /// Increase logging verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a tag's version and file configuration without authenticating.
    Diagnose,
    /// Install fresh keys and configure SDM on the NDEF file.
    Provision {
        /// URL template carrying the `{uid}`, `{counter}` and `{cmac}` placeholders.
        #[arg(long)]
        url_template: String,
    },
    /// Restore a previously provisioned tag to factory (all-zero) keys.
    RestoreFactory,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = logging_setup::level_for_verbosity(cli.verbose);
    let logger = logging_setup::terminal_logger(level);

    let mut ledger = CsvKeyLedger::open(&cli.ledger)
        .with_context(|| format!("opening key ledger at {}", cli.ledger.display()))?;

    match (&cli.reader, cli.simulate) {
        (Some(_), true) => anyhow::bail!("--reader and --simulate are mutually exclusive"),
        (None, false) => anyhow::bail!("pass either --reader <name> or --simulate"),
        _ => {}
    }

    if cli.simulate {
        run(&mut SimulatorTransport::new(), &mut ledger, &logger, &cli.command)
    } else {
        let mut transport = PcscTransport::connect(cli.reader.as_deref(), cli.escape)
            .context("connecting to reader")?;
        run(&mut transport, &mut ledger, &logger, &cli.command)
    }
}

fn run<T: Transport>(
    transport: &mut T,
    ledger: &mut CsvKeyLedger,
    logger: &SharedLogger,
    command: &Command,
) -> Result<()> {
    let logger_ref: Option<&dyn ImmutableLogger> = Some(logger);

    match command {
        Command::Diagnose => {
            let report = tools::diagnose(transport, logger_ref).context("diagnose")?;
            println!("UID:       {}", hex::encode_upper(report.version.uid));
            println!(
                "Hardware:  v{}.{}",
                report.version.hardware.major_version, report.version.hardware.minor_version
            );
            println!(
                "Software:  v{}.{}",
                report.version.software.major_version, report.version.software.minor_version
            );
            println!("Batch:     {}", hex::encode_upper(report.version.batch_no));
            println!("Fab date:  week {} / 20{:02}", report.version.fab_week, report.version.fab_year);
            Ok(())
        }
        Command::Provision { url_template } => {
            let template = SdmUrlTemplate::new(url_template.clone(), "{uid}", "{ctr}", "{mac}");
            let fresh_keys = fresh_key_set();
            let mut rng = OsRandom;
            let report = tools::provision(transport, ledger, &template, fresh_keys, &mut rng, logger_ref)
                .context("provision")?;
            println!("Provisioned UID {}", hex::encode_upper(report.uid));
            println!("NDEF file size: {:?}", report.ndef_file.file_size);
            Ok(())
        }
        Command::RestoreFactory => {
            let mut rng = OsRandom;
            let report = tools::restore_factory(transport, ledger, &mut rng, logger_ref)
                .context("restore-factory")?;
            println!("Restored UID {} to factory keys", hex::encode_upper(report.uid));
            Ok(())
        }
    }
}

fn fresh_key_set() -> KeySet {
    let mut rng = OsRandom;
    let mut next_key = || {
        let mut key = [0u8; 16];
        rng.fill(&mut key);
        key
    };
    KeySet {
        k0: next_key(),
        k1: next_key(),
        k2: next_key(),
        k3: next_key(),
        k4: next_key(),
    }
}
