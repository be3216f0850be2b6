//! Main drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Open the link to the actuator, or run local-only if it can't be opened
//!     - Main loop, once per cycle period:
//!         - Operator command handling
//!         - Control loop cycle (link results, motion, telemetry)
//!         - Cycle management
//!
//! Operator commands are read from stdin, see the `console` module.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod console;

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
use std::sync::mpsc::TryRecvError;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use comms_if::{
    eqpt::drive::Channel,
    net::{self, OfflineLink, RemoteLink, TransportKind},
};
use console::ConsoleCmd;
use drive_lib::{
    control_loop::ControlLoop, motion_ctrl::MotionStatus, params::DriveExecParams,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Drive a simulated agent towards operator targets, mirrored to a remote actuator.
#[derive(Debug, StructOpt)]
#[structopt(name = "drive_exec")]
struct Opt {
    /// Parameter file name, relative to the software root's params directory.
    #[structopt(short, long, default_value = "drive_exec.toml")]
    params: String,

    /// Load the parameters from this path instead.
    #[structopt(long, parse(from_os_str))]
    params_path: Option<PathBuf>,

    /// Override the actuator's base URL, selects the HTTP transport.
    #[structopt(long, conflicts_with = "serial")]
    url: Option<String>,

    /// Override the serial device path, selects the serial transport.
    #[structopt(long)]
    serial: Option<String>,

    /// Minimum log level, at least `info`.
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,

    /// Initial logical target.
    #[structopt(long, number_of_values = 2, value_names = &["X", "Y"], allow_hyphen_values = true)]
    target: Option<Vec<i32>>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("drive_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Drive Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let mut params: DriveExecParams = match opt.params_path {
        Some(ref path) => util::params::load_from_path(path),
        None => util::params::load(&opt.params),
    }
    .wrap_err("Could not load exec params")?;

    if let Some(ref url) = opt.url {
        params.link.transport = TransportKind::Http;
        params.link.base_url = url.clone();
    }
    if let Some(ref device) = opt.serial {
        params.link.transport = TransportKind::Serial;
        params.link.device_path = device.clone();
    }

    params.validate().wrap_err("Invalid exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE LINK ----

    let link: Box<dyn RemoteLink> = match net::connect(&params.link) {
        Ok(l) => {
            info!("{:?} link to the actuator opened", params.link.transport);
            l
        }
        Err(e) => {
            warn!("Could not open the link ({}), running local-only", e);
            Box::new(OfflineLink::new(e.to_string()))
        }
    };

    // ---- INITIALISE MODULES ----

    let cycle_period = util::time::seconds_to_std(params.cycle_period_s)
        .ok_or_else(|| eyre!("Invalid cycle period {}", params.cycle_period_s))?;

    let mut control_loop =
        ControlLoop::new(params, link).wrap_err("Failed to initialise the control loop")?;

    if let Some(target) = opt.target {
        control_loop
            .set_target(target[0], target[1])
            .wrap_err("Could not set the initial target")?;
    }

    let console_rx = console::spawn_stdin_reader();
    let mut console_open = true;

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut num_consec_cycle_overruns: u64 = 0;

    'main_loop: loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- OPERATOR COMMANDS ----

        while console_open {
            let cmd = match console_rx.try_recv() {
                Ok(c) => c,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Console closed, exiting once idle");
                    console_open = false;
                    break;
                }
            };

            let result = match cmd {
                ConsoleCmd::Goto { x, y } => control_loop.set_target(x, y),
                ConsoleCmd::Stop => control_loop.halt().map(|_| ()),
                ConsoleCmd::Clear => control_loop.clear_history(),
                ConsoleCmd::Status => {
                    log_status(&control_loop);
                    Ok(())
                }
                ConsoleCmd::Quit => break 'main_loop,
            };

            if let Err(e) = result {
                warn!("Could not execute {:?}: {}", cmd, e);
            }
        }

        // ---- CONTROL LOOP ----

        let report = control_loop.cycle();

        // With no console left nothing new can arrive, so stop after the last
        // motion finishes
        if !console_open && report.status != MotionStatus::Moving {
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                num_consec_cycle_overruns += 1;
                warn!(
                    "Cycle overran by {:.06} s ({} in a row)",
                    (cycle_dur - cycle_period).as_secs_f64(),
                    num_consec_cycle_overruns
                );
            }
        }
    }

    // ---- SHUTDOWN ----

    if control_loop.agent_state().moving {
        control_loop.halt().ok();
    }

    // Dropping the loop joins the link worker, flushing any queued stop
    drop(control_loop);

    info!("End of execution");

    Ok(())
}

/// Log the current state of the loop.
fn log_status(control_loop: &ControlLoop) {
    let ds = control_loop.data_store();
    let history = control_loop.history().snapshot();

    info!(
        "Cycle {}: position {}, {:?}, target {}",
        ds.num_cycles,
        ds.logical_position,
        ds.motion_status,
        control_loop
            .mapper()
            .to_logical(control_loop.agent_state().target)
    );
    info!(
        "Telemetry: {} samples held, {} ok, {} failed",
        history.len(),
        history.num_ok(),
        history.num_failed()
    );
    for channel in [Channel::Left, Channel::Right].iter().copied() {
        let values = history.channel(channel);
        info!(
            "    {}: latest {:?}, range {:?}, last values {:?}",
            channel.label(),
            ds.latest_sample.map(|s| s.get(channel)),
            history.chart_range(channel),
            &values[values.len().saturating_sub(5)..]
        );
    }

    if ds.link_degraded {
        warn!(
            "Link degraded after {} consecutive errors, last: {}",
            ds.num_consec_link_errors,
            ds.last_link_error.as_deref().unwrap_or("none")
        );
    }
}
