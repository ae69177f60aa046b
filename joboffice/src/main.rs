//  MAIN.rs
//    by Ray Plante
//
//  Description:
//!   Entrypoint to the `joboffice` executable: parses the CLI surface
//!   (broker host/port, run-id, data root, policy file, daemonize flag),
//!   loads the policy file into a `JobOfficeConfig`, builds a `JobOffice`,
//!   optionally daemonizes, and then drives it to completion. Exit codes:
//!   `0` normal, `1` fatal (including child failure), `2` unexpected.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction::SetTrue, Parser};
use dotenvy::dotenv;
use log::{debug, error, info, LevelFilter};

use joboffice_cfg::JobOfficeConfig;

mod errors;
mod office;
mod stop_listener;

use errors::Error;
use office::JobOffice;


/***** ARGUMENTS *****/
#[derive(Parser)]
#[clap(name = "joboffice", version = env!("CARGO_PKG_VERSION"), about = "Starts a long-running Job Office scheduler.")]
struct Opts {
    /// Print debug info.
    #[clap(long, action = SetTrue, env = "DEBUG")]
    debug: bool,

    /// The policy/configuration YAML file describing this job office's
    /// name, persistence directory, listen settings, and scheduler.
    #[clap(short, long, default_value = "./joboffice.yml", env = "POLICY_FILE")]
    policy_file: PathBuf,

    /// Identifies the processing run this job office instance serves;
    /// every inbound event is scoped to this run-id via a `RUNID=…`
    /// selector, the way several concurrent runs share one set of topics
    /// without cross-talking.
    #[clap(short, long, env = "RUN_ID")]
    run_id: String,

    /// Overrides `listen.brokerHostName` from the policy file.
    #[clap(long, env = "BROKER_HOST")]
    broker_host: Option<String>,
    /// Overrides `listen.brokerHostPort` from the policy file.
    #[clap(long, env = "BROKER_PORT")]
    broker_port: Option<u16>,

    /// Overrides the `{name}`-substituted blackboard directory computed
    /// from `persist.dir` in the policy file.
    #[clap(short, long, env = "DATA_ROOT")]
    data_root: Option<PathBuf>,

    /// Forks into the background once the broker connections are
    /// established, redirecting stdout/stderr to a log file rather than
    /// the invoking shell.
    #[clap(long, action = SetTrue, env = "DAEMONIZE")]
    daemonize: bool,
    /// Where the daemonized process's stdout/stderr are redirected. Only
    /// consulted when `--daemonize` is given.
    #[clap(long, default_value = "./joboffice.log", env = "LOG_FILE")]
    log_file: PathBuf,
}


fn main() -> ExitCode {
    dotenv().ok();
    let opts = Opts::parse();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    if opts.debug {
        logger.filter_level(LevelFilter::Debug).init();
    } else {
        logger.filter_level(LevelFilter::Info).init();
    }

    let mut config = match JobOfficeConfig::from_path(&opts.policy_file) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load policy file '{}': {}", opts.policy_file.display(), err);
            return ExitCode::from(1);
        },
    };
    if let Some(host) = opts.broker_host { config.listen.broker_host_name = host; }
    if let Some(port) = opts.broker_port { config.listen.broker_host_port = port; }
    if let Some(root) = &opts.data_root {
        config.persist.dir = root.join(&config.name).to_string_lossy().into_owned();
    }

    if opts.daemonize {
        if let Err(err) = daemonize(&opts.log_file) {
            error!("failed to daemonize: {}", err);
            return ExitCode::from(1);
        }
    }

    info!("starting job office '{}' for run '{}'", config.name, opts.run_id);
    debug!("persisting to '{}'", config.persist_dir());

    let mut office = match JobOffice::new(config, opts.run_id) {
        Ok(office) => office,
        Err(err) => {
            error!("failed to initialize job office: {}", err);
            return ExitCode::from(1);
        },
    };

    if let Err(err) = office.start() {
        error!("failed to start job office: {}", err);
        return ExitCode::from(1);
    }

    office.join();
    match office.last_error() {
        Some(err) => {
            error!("job office main loop exited abnormally: {}", err);
            ExitCode::from(1)
        },
        None => {
            info!("job office halted cleanly");
            ExitCode::SUCCESS
        },
    }
}

/// Forks the current process into the background, the way the `--daemonize`
/// flag specifies: stdout/stderr are redirected to `log_file`, and the
/// child continues running as the `JobOffice` worker while the parent
/// exits `0` immediately. Called only after the broker connections are
/// about to be established, so a broker outage still reports to the
/// invoking shell rather than being silently swallowed by the fork.
fn daemonize(log_file: &std::path::Path) -> Result<(), Error> {
    use daemonize::Daemonize;

    let stdout = std::fs::File::create(log_file).map_err(|err| Error::Daemonize(err.to_string()))?;
    let stderr = stdout.try_clone().map_err(|err| Error::Daemonize(err.to_string()))?;

    Daemonize::new()
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .map_err(|err| Error::Daemonize(err.to_string()))
}
