//! ptail - tail the logs of running processes
//!
//! Selects processes by pid or command-line regex, discovers the log
//! files they hold open and either lists them (`--show-logs`) or follows
//! them (`--continuous`, the default).

use clap::Parser;
use ptail_config::LogSetup;
use ptail_core::cli::{Cli, Operation, RunPlan};
use ptail_core::collect::{CommandRunner, LogDiscovery, ShellProbe};
use ptail_core::exit_codes::ExitCode;
use ptail_core::log_meta::LogMetadataResolver;
use ptail_core::logging::{init_logging, LogConfig};
use ptail_core::signals;
use ptail_core::tail::{TailError, TailOrchestrator};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.log_level, cli.log_format);
    init_logging(&log_config);

    let exit_code = run(&cli);
    match exit_code {
        code if code.is_internal_error() => error!(exit_code = %code, "exiting after failure"),
        code if code.is_user_error() => info!(exit_code = %code, "exiting on invalid input"),
        code => debug!(exit_code = %code, success = code.is_success(), "exiting"),
    }
    std::process::exit(exit_code.as_i32());
}

fn run(cli: &Cli) -> ExitCode {
    let plan = match cli.plan() {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("ptail: {}", e);
            return ExitCode::ArgsError;
        }
    };

    let setup = match LogSetup::load(&cli.config_file) {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("ptail: {} [code {}]", e, e.code());
            return ExitCode::ConfigError;
        }
    };

    let probe = ShellProbe::new(CommandRunner::with_defaults(), plan.exec.clone());
    let discovery = LogDiscovery::new(
        probe,
        LogMetadataResolver::new(setup),
        plan.log_filter.clone(),
    );
    info!(selector = %plan.selector, exec_type = %plan.exec.exec_type(), "starting");

    let mut orchestrator = TailOrchestrator::new(
        discovery,
        plan.selector.clone(),
        plan.options.clone(),
        io::stdout().lock(),
    );

    let result = match plan.operation {
        Operation::Show(format) => orchestrator.show(format).map(|()| ExitCode::Clean),
        Operation::Tail { wait, once } => follow(&mut orchestrator, &plan, wait, once),
    };
    let closed = orchestrator.shutdown();

    match result.and_then(|code| closed.map(|()| code)) {
        Ok(code) => code,
        Err(TailError::Output(e)) if e.kind() == io::ErrorKind::BrokenPipe => ExitCode::Clean,
        Err(e @ TailError::Output(_)) => {
            error!(error = %e, "output failed");
            ExitCode::IoError
        }
        Err(e) => {
            eprintln!("ptail: {}", e);
            ExitCode::InternalError
        }
    }
}

fn follow<W: Write>(
    orchestrator: &mut TailOrchestrator<ShellProbe, W>,
    plan: &RunPlan,
    wait: Duration,
    once: bool,
) -> Result<ExitCode, TailError> {
    if let Err(e) = signals::install() {
        error!(error = %e, "unable to install interrupt handlers");
    }

    loop {
        orchestrator.tail(&plan.rules)?;
        if once {
            return Ok(ExitCode::Clean);
        }
        if signals::interrupted() {
            break;
        }
        debug!(?wait, "sleeping");
        thread::sleep(wait);
        if signals::interrupted() {
            break;
        }
    }

    writeln!(orchestrator.output_mut(), "Detected CTRL+C. Exiting ..").map_err(TailError::Output)?;
    Ok(ExitCode::Interrupted)
}
