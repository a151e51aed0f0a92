//! Main arm executable entry point.
//!
//! # Architecture
//!
//! - Load parameters, start the session and the logger
//! - Build the dispatcher and attach the link to the arm, with a reader thread pushing everything
//!   the arm says back into the dispatcher
//! - Home the arm
//! - Run the program given on the command line, if any
//! - Wait for the outstanding acknowledgments, then close the link

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::{atomic::AtomicBool, mpsc::Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use arm_lib::{
    arm_ctrl::{ArmCtrl, ProgramOutcome},
    collision::CollisionPredictor,
    dispatcher::{DispatchEvent, Dispatcher},
    params::ArmExecParams,
};
use comms_if::net::{self, SimArmLink};
use util::{
    logger::{logger_init, LevelFilter, LogConfig},
    script_interpreter::ScriptInterpreter,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// How often the pending commands are checked while waiting for them to drain.
const DRAIN_POLL_PERIOD: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "arm_exec", about = "Six degree of freedom arm executable")]
struct Opt {
    /// Parameter file, relative to the params directory
    #[structopt(long, default_value = "arm_exec.toml")]
    params: String,

    /// Queue and log commands without sending them
    #[structopt(long)]
    simulate: bool,

    /// Don't move the arm to its start position before running
    #[structopt(long)]
    skip_homing: bool,

    /// Default log level, overrides the parameter file
    #[structopt(long)]
    log_level: Option<LevelFilter>,

    /// Arm program to run
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,
}

/// Counts of what happened to the commands over the whole run.
#[derive(Debug, Default)]
struct EventTally {
    sent: usize,
    simulated: usize,
    executed: usize,
    not_executed: usize,
    abandoned: usize,
    protocol_errors: usize,
    transport_faults: usize,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- LOAD PARAMETERS ----

    let params: ArmExecParams =
        util::params::load(&opt.params).wrap_err("Could not load the arm exec params")?;

    let log_level = match opt.log_level {
        Some(l) => l,
        None => params
            .log_level
            .parse()
            .map_err(|e| eyre!("Invalid log level {:?}: {}", params.log_level, e))?,
    };

    let mut log_config = LogConfig::new(log_level).wrap_err("Invalid default log level")?;
    for (target, level) in params.log_targets.iter() {
        let level: LevelFilter = level
            .parse()
            .map_err(|e| eyre!("Invalid log level {:?} for {}: {}", level, target, e))?;
        log_config = log_config
            .with_target(target, level)
            .wrap_err("Invalid target log level")?;
    }

    // ---- EARLY INITIALISATION ----

    let session = Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(&log_config, &session).wrap_err("Failed to initialise logging")?;

    info!("SixDOF Arm Executable\n");
    info!("Session directory: {:?}", session.session_root);
    debug!("Options: {:#?}", opt);
    debug!("Parameters: {:#?}", params);

    // ---- DISPATCHER ----

    let dispatcher = Dispatcher::new();
    dispatcher.set_simulation(params.simulation || opt.simulate);
    dispatcher.set_time_between_commands(Duration::from_millis(params.time_between_commands_ms));

    let monitor = spawn_monitor(dispatcher.subscribe()).wrap_err("Failed to start the monitor")?;

    let mut ctrl = ArmCtrl::new(
        dispatcher.clone(),
        CollisionPredictor::new(params.geometry.clone()),
    );

    // ---- LINK ----

    let reader = if dispatcher.is_simulation() {
        info!("Simulation mode, commands will not be sent");
        None
    } else {
        info!("Attaching the simulated arm link");

        let (link, rx) = SimArmLink::new(Duration::from_millis(params.sim_ack_delay_ms))
            .wrap_err("Failed to start the simulated arm")?;
        ctrl.connect(Box::new(link));

        Some(net::spawn_reader(rx, dispatcher.clone()).wrap_err("Failed to start the arm reader")?)
    };

    // ---- HOMING ----

    if opt.skip_homing {
        info!("Skipping homing");
    } else {
        ctrl.move_to_start_position()
            .wrap_err("Failed to move the arm to its start position")?;
    }

    // ---- PROGRAM ----

    let mut aborted = None;

    if let Some(ref path) = opt.script {
        let mut script = ScriptInterpreter::new(path).wrap_err("Failed to load the program")?;

        let report = ctrl
            .run_program(&mut script, &AtomicBool::new(false))
            .wrap_err("Failed to run the program")?;

        match report.outcome {
            ProgramOutcome::Completed => {
                info!("Program complete, {} command(s) issued", report.executed)
            }
            ProgramOutcome::Cancelled { line_num } => {
                warn!("Program cancelled before line {}", line_num)
            }
            ProgramOutcome::Aborted {
                line_num,
                line,
                error,
            } => aborted = Some(eyre!("Program aborted at line {} ({:?}): {}", line_num, line, error)),
        }
    }

    // ---- SHUTDOWN ----

    if !dispatcher.is_simulation() {
        wait_for_drain(&dispatcher, Duration::from_secs_f64(params.drain_timeout_s.max(0.0)));
    }

    let abandoned = ctrl.disconnect();
    if !abandoned.is_empty() {
        warn!("{} command(s) were never acknowledged", abandoned.len());
    }

    if let Some(r) = reader {
        r.join().map_err(|_| eyre!("The arm reader panicked"))?;
    }

    // Dropping the last dispatcher handle closes the monitor's channel
    drop(ctrl);
    drop(dispatcher);

    let tally = monitor.join().map_err(|_| eyre!("The event monitor panicked"))?;
    info!("Run summary: {:#?}", tally);

    match aborted {
        Some(e) => Err(e),
        None => {
            info!("End of execution");
            Ok(())
        }
    }
}

/// Wait until every command has been acknowledged or the timeout elapses.
fn wait_for_drain(dispatcher: &Dispatcher, timeout: Duration) {
    let start = Instant::now();

    info!(
        "Waiting up to {:.1} s for {} outstanding acknowledgment(s)",
        timeout.as_secs_f64(),
        dispatcher.pending_len()
    );

    while dispatcher.pending_len() > 0 {
        if start.elapsed() >= timeout {
            warn!("Timed out waiting for acknowledgments");
            return;
        }
        thread::sleep(DRAIN_POLL_PERIOD);
    }

    info!("All commands acknowledged");
}

/// Start a thread counting dispatch events until the dispatcher is dropped.
fn spawn_monitor(rx: Receiver<DispatchEvent>) -> std::io::Result<JoinHandle<EventTally>> {
    thread::Builder::new()
        .name("event_monitor".into())
        .spawn(move || {
            let mut tally = EventTally::default();

            for event in rx {
                match event {
                    DispatchEvent::Sent(_) => tally.sent += 1,
                    DispatchEvent::Simulated(_) => tally.simulated += 1,
                    DispatchEvent::Executed(_) => tally.executed += 1,
                    DispatchEvent::NotExecuted(_) => tally.not_executed += 1,
                    DispatchEvent::Abandoned(_) => tally.abandoned += 1,
                    DispatchEvent::Protocol(_) => tally.protocol_errors += 1,
                    DispatchEvent::TransportFault(_) => tally.transport_faults += 1,
                    DispatchEvent::IgnoredData(_) => (),
                }
            }

            tally
        })
}
