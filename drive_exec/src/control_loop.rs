//! # Control Loop
//!
//! Ties the modules together for one cycle of the executable:
//!
//! - Drain results from the link worker into the data store
//! - Process motion control with any target or halt received since the last cycle
//! - Stop the remote actuator on arrival
//! - Request the next telemetry poll
//!
//! Nothing here blocks on the network. Commands and polls are queued to the link worker and
//! their results are picked up on a later cycle. Link failures are logged and counted, the local
//! simulation carries on regardless.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};

use util::module::State;

use comms_if::net::RemoteLink;

use crate::{
    coord_map::CoordMapper,
    data_store::DataStore,
    link_client::{LinkClient, LinkClientError, LinkEvent},
    loc::Position,
    motion_ctrl::{self, AgentState, MotionCmd, MotionCtrl, MotionCtrlError, MotionStatus},
    params::{DriveExecParams, ParamsError},
    tm_sampler::{HistoryReader, TelemetrySampler},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Headless orchestrator of the drive modules.
pub struct ControlLoop {
    params: DriveExecParams,
    mapper: CoordMapper,
    motion_ctrl: MotionCtrl,

    /// Motion command applied at the start of the next cycle
    pending_motion_cmd: Option<MotionCmd>,

    link: LinkClient,
    ds: DataStore,
}

/// What happened during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Agent position in the display frame
    pub position: Position,

    /// Agent position in the logical frame
    pub logical_position: Position,

    pub status: MotionStatus,

    /// Link results picked up at the start of the cycle
    pub events: Vec<LinkEvent>,

    /// True if a telemetry poll was queued this cycle
    pub poll_requested: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ControlLoopError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error(transparent)]
    MotionCtrl(#[from] MotionCtrlError),

    #[error(transparent)]
    Link(#[from] LinkClientError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlLoop {
    /// Create the loop with the agent resting at the logical origin, and start the link worker.
    pub fn new(params: DriveExecParams, link: Box<dyn RemoteLink>) -> Result<Self, ControlLoopError> {
        params.validate()?;

        let mapper = CoordMapper::new(&params.display);
        let motion_ctrl = MotionCtrl::new(params.motion, mapper.to_display(Position::origin()))?;
        let link = LinkClient::spawn(link, TelemetrySampler::new(params.telemetry.history_len));

        let mut ds = DataStore::default();
        ds.position = motion_ctrl.position();
        ds.logical_position = Position::origin();

        Ok(Self {
            params,
            mapper,
            motion_ctrl,
            pending_motion_cmd: None,
            link,
            ds,
        })
    }

    /// Move the agent towards the logical target `(x, y)` and forward the target to the
    /// actuator.
    ///
    /// Local motion heads for the new target from the next cycle, replacing any earlier target
    /// or halt not yet processed. The remote command is sent in the background.
    pub fn set_target(&mut self, x: i32, y: i32) -> Result<(), ControlLoopError> {
        let target = self.mapper.to_display(Position::from((x, y)));
        if !target.is_finite() {
            return Err(MotionCtrlError::InvalidTarget(target).into());
        }

        self.pending_motion_cmd = Some(MotionCmd::Begin(target));
        self.link.set_target(x, y)?;

        info!("New target ({}, {})", x, y);

        Ok(())
    }

    /// Stop the agent where it is from the next cycle and command the actuator to stop.
    ///
    /// The stop is sent even if the agent was not moving. Returns true if the
    /// agent was moving, or about to start.
    pub fn halt(&mut self) -> Result<bool, ControlLoopError> {
        let was_moving = self.motion_ctrl.is_moving()
            || matches!(self.pending_motion_cmd, Some(MotionCmd::Begin(_)));

        self.pending_motion_cmd = Some(MotionCmd::Halt);
        self.link.stop()?;

        info!("Stop requested at {}", self.ds.logical_position);

        Ok(was_moving)
    }

    /// Run one cycle.
    pub fn cycle(&mut self) -> CycleReport {
        self.ds.cycle_start();

        // ---- LINK RESULTS ----

        let events = self.link.drain_events();
        for event in &events {
            self.handle_link_event(event);
        }

        // ---- MOTION ----

        let input = motion_ctrl::InputData {
            cmd: self.pending_motion_cmd.take(),
        };

        let (position, status) = match self.motion_ctrl.proc(&input) {
            Ok((position, report)) => {
                if report.halted {
                    info!("Halted at {}", self.mapper.to_logical(position));
                }
                (position, report.status)
            }
            Err(e) => {
                // Only a bad command can fail, carry on with the current motion
                warn!("Error during MotionCtrl processing: {}", e);
                let output = self.motion_ctrl.tick();
                (output.position, output.status)
            }
        };

        self.ds.position = position;
        self.ds.logical_position = self.mapper.to_logical(position);
        self.ds.motion_status = status;

        if status == MotionStatus::Arrived {
            info!("Arrived at {}", self.ds.logical_position);

            if let Err(e) = self.link.stop() {
                warn!("Could not queue stop: {}", e);
            }
        }

        // ---- TELEMETRY ----

        let poll_requested = if self.motion_ctrl.is_moving() || self.params.poll_while_idle {
            match self.link.request_poll() {
                Ok(queued) => queued,
                Err(e) => {
                    warn!("Could not queue telemetry poll: {}", e);
                    false
                }
            }
        }
        else {
            false
        };

        self.ds.cycle_end();

        CycleReport {
            position,
            logical_position: self.ds.logical_position,
            status,
            events,
            poll_requested,
        }
    }

    /// Empty the telemetry history.
    pub fn clear_history(&self) -> Result<(), ControlLoopError> {
        Ok(self.link.clear_history()?)
    }

    /// Read-only handle onto the telemetry history, for display.
    pub fn history(&self) -> HistoryReader {
        self.link.history()
    }

    pub fn data_store(&self) -> &DataStore {
        &self.ds
    }

    pub fn agent_state(&self) -> AgentState {
        self.motion_ctrl.state()
    }

    pub fn mapper(&self) -> &CoordMapper {
        &self.mapper
    }

    pub fn params(&self) -> &DriveExecParams {
        &self.params
    }

    fn handle_link_event(&mut self, event: &LinkEvent) {
        let max_errors = self.params.max_consec_link_errors;

        match event {
            LinkEvent::CmdDone { cmd, result: Ok(()) } => {
                debug!("Sent {:?}", cmd);
                self.ds.record_link_ok();
            }
            LinkEvent::CmdDone { cmd, result: Err(e) } => {
                warn!("Could not send {:?}: {}", cmd, e);
                self.ds.record_link_error(e, max_errors);
            }
            LinkEvent::CmdSuperseded(cmd) => debug!("{:?} superseded before it was sent", cmd),
            LinkEvent::Polled(Ok(sample)) => {
                self.ds.latest_sample = Some(*sample);
                self.ds.record_link_ok();
            }
            LinkEvent::Polled(Err(e)) => {
                warn!("Telemetry poll failed: {}", e);
                self.ds.record_link_error(e, max_errors);
            }
        }
    }
}
