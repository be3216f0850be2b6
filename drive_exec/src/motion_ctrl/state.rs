//! Implementations for the MotionCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace};
use serde::Serialize;

// Internal
use super::{MotionCtrlError, Params};
use crate::loc::Position;
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motion control module state
#[derive(Debug, Default)]
pub struct MotionCtrl {
    params: Params,

    state: AgentState,
}

/// Position, target and motion flag of the agent.
///
/// Position and target are in the frame the caller uses for targets, the
/// display frame in the executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AgentState {
    pub position: Position,
    pub target: Position,
    pub moving: bool,
}

/// The result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickOutput {
    pub position: Position,
    pub status: MotionStatus,
}

/// Input data to motion control for one cycle.
#[derive(Debug, Default)]
pub struct InputData {
    /// New command for this cycle, or `None` to carry on with the current
    /// motion.
    pub cmd: Option<MotionCmd>,
}

/// Status report for MotionCtrl processing.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct StatusReport {
    pub status: MotionStatus,

    /// Distance left to the target after this cycle.
    pub distance_to_target: f64,

    /// True if motion was halted by a command this cycle.
    pub halted: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Motion state reported by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotionStatus {
    /// Not moving, nothing happened this tick.
    Idle,

    /// Moved towards the target and has not yet arrived.
    Moving,

    /// Arrived at the target on this tick, motion is now stopped.
    Arrived,
}

/// Commands accepted by [`MotionCtrl::proc`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCmd {
    /// Start moving towards a new target, replacing any current one.
    Begin(Position),

    /// Stop where we are without arriving.
    Halt,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MotionCtrl {
    type InitData = Params;
    type InitError = MotionCtrlError;

    type InputData = InputData;
    type OutputData = Position;
    type StatusReport = StatusReport;
    type ProcError = MotionCtrlError;

    /// Initialise the MotionCtrl module with the given parameters.
    ///
    /// The agent state is left untouched.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        init_data.validate()?;
        self.params = init_data;

        Ok(())
    }

    /// Apply any new command then advance one tick.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let mut halted = false;

        match input_data.cmd {
            Some(MotionCmd::Begin(target)) => self.begin(target)?,
            Some(MotionCmd::Halt) => halted = self.halt(),
            None => (),
        }

        let output = self.tick();

        Ok((output.position, StatusReport {
            status: output.status,
            distance_to_target: self.distance_to_target(),
            halted,
        }))
    }
}

impl MotionCtrl {
    /// Create a new controller resting at `start`, with the target equal to
    /// the start, then initialise it with `params`.
    pub fn new(params: Params, start: Position) -> Result<Self, MotionCtrlError> {
        if !start.is_finite() {
            return Err(MotionCtrlError::InvalidTarget(start));
        }

        let mut motion_ctrl = Self {
            params: Params::default(),
            state: AgentState {
                position: start,
                target: start,
                moving: false,
            },
        };
        motion_ctrl.init(params)?;

        Ok(motion_ctrl)
    }

    /// Start moving towards `target`.
    ///
    /// Any motion in progress is replaced, the next tick steps towards the new
    /// target. Non-finite targets are rejected and leave the state unchanged.
    pub fn begin(&mut self, target: Position) -> Result<(), MotionCtrlError> {
        if !target.is_finite() {
            return Err(MotionCtrlError::InvalidTarget(target));
        }

        if self.state.moving {
            debug!(
                "MotionCtrl target {} replaced by {} while moving",
                self.state.target, target
            );
        }

        self.state.target = target;
        self.state.moving = true;

        info!("MotionCtrl moving from {} to {}", self.state.position, target);

        Ok(())
    }

    /// Advance the agent by one control period.
    ///
    /// The agent moves `speed` towards the target, never past it. Arrival is
    /// reported on the tick which brings the agent within the arrival
    /// tolerance, after which ticks are no-ops until the next `begin`.
    pub fn tick(&mut self) -> TickOutput {
        if !self.state.moving {
            return self.output(MotionStatus::Idle);
        }

        let delta = self.state.target.to_vector() - self.state.position.to_vector();
        let distance = delta.norm();

        if distance > self.params.arrival_tolerance {
            if distance <= self.params.speed {
                self.state.position = self.state.target;
            }
            else {
                let step = delta / distance * self.params.speed;
                self.state.position = (self.state.position.to_vector() + step).into();
            }

            trace!("MotionCtrl position {}", self.state.position);
        }

        if self.distance_to_target() <= self.params.arrival_tolerance {
            self.state.moving = false;
            info!("MotionCtrl target {} reached", self.state.target);
            return self.output(MotionStatus::Arrived);
        }

        self.output(MotionStatus::Moving)
    }

    /// Stop moving without arriving.
    ///
    /// Returns true if the agent was moving.
    pub fn halt(&mut self) -> bool {
        let was_moving = self.state.moving;

        if was_moving {
            info!("MotionCtrl halted at {}", self.state.position);
        }

        self.state.moving = false;

        was_moving
    }

    /// Get a copy of the agent state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn position(&self) -> Position {
        self.state.position
    }

    pub fn is_moving(&self) -> bool {
        self.state.moving
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Distance between the current position and the target.
    pub fn distance_to_target(&self) -> f64 {
        self.state.position.distance_to(&self.state.target)
    }

    fn output(&self, status: MotionStatus) -> TickOutput {
        TickOutput {
            position: self.state.position,
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn ctrl(start: Position) -> MotionCtrl {
        MotionCtrl::new(Params::default(), start).unwrap()
    }

    /// Tick until arrival, returning the number of ticks taken and checking
    /// the distance never grows.
    fn ticks_to_arrival(mc: &mut MotionCtrl, limit: usize) -> usize {
        let mut last_distance = mc.distance_to_target();

        for i in 1..=limit {
            let out = mc.tick();
            let distance = mc.distance_to_target();

            assert!(distance <= last_distance + 1e-9, "distance grew on tick {}", i);
            last_distance = distance;

            if out.status == MotionStatus::Arrived {
                return i;
            }
            assert_eq!(out.status, MotionStatus::Moving);
        }

        panic!("Did not arrive within {} ticks", limit);
    }

    #[test]
    fn test_idle_until_begin() {
        let mut mc = ctrl(Position::new(300.0, 300.0));

        assert!(!mc.is_moving());
        assert_eq!(mc.tick(), TickOutput {
            position: Position::new(300.0, 300.0),
            status: MotionStatus::Idle,
        });
    }

    #[test]
    fn test_reference_run() {
        // speed 2, tolerance 1, 20 units to go: arrives on tick 10 exactly
        let mut mc = ctrl(Position::new(300.0, 300.0));
        mc.begin(Position::new(320.0, 300.0)).unwrap();

        for _ in 0..9 {
            assert_eq!(mc.tick().status, MotionStatus::Moving);
        }

        let out = mc.tick();
        assert_eq!(out.status, MotionStatus::Arrived);
        assert!(out.position.distance_to(&Position::new(320.0, 300.0)) <= 1.0);
        assert!(!mc.is_moving());

        // Further ticks do nothing
        assert_eq!(mc.tick().status, MotionStatus::Idle);
        assert_eq!(mc.position(), out.position);
    }

    #[test]
    fn test_converges_within_bound() {
        let starts = [(0.0, 0.0), (300.0, 300.0), (-12.5, 40.0)];
        let targets = [(1000.0, -3.0), (300.5, 300.5), (-12.5, -40.0), (17.0, 23.0)];

        for &(sx, sy) in starts.iter() {
            for &(tx, ty) in targets.iter() {
                let start = Position::new(sx, sy);
                let target = Position::new(tx, ty);
                let bound = (start.distance_to(&target) / 2.0).ceil().max(1.0) as usize;

                let mut mc = ctrl(start);
                mc.begin(target).unwrap();

                let n = ticks_to_arrival(&mut mc, bound);
                assert!(n <= bound);
                assert!(mc.distance_to_target() <= 1.0);
            }
        }
    }

    #[test]
    fn test_begin_at_current_position_arrives_next_tick() {
        let mut mc = ctrl(Position::new(5.0, 5.0));
        mc.begin(Position::new(5.0, 5.0)).unwrap();

        assert_eq!(mc.tick().status, MotionStatus::Arrived);
        assert_eq!(mc.position(), Position::new(5.0, 5.0));
    }

    #[test]
    fn test_begin_mid_motion_replaces_target() {
        let mut mc = ctrl(Position::origin());
        mc.begin(Position::new(100.0, 0.0)).unwrap();
        mc.tick();
        mc.tick();
        assert_eq!(mc.position(), Position::new(4.0, 0.0));

        // New target straight up, the next step must head there
        mc.begin(Position::new(4.0, 100.0)).unwrap();
        let out = mc.tick();

        assert_eq!(out.status, MotionStatus::Moving);
        assert_eq!(out.position, Position::new(4.0, 2.0));
        assert_eq!(mc.state().target, Position::new(4.0, 100.0));
    }

    #[test]
    fn test_invalid_target_rejected() {
        let mut mc = ctrl(Position::origin());
        mc.begin(Position::new(10.0, 0.0)).unwrap();
        let before = mc.state();

        let bad = Position::new(f64::NAN, 1.0);
        assert_eq!(mc.begin(bad), Err(MotionCtrlError::InvalidTarget(bad)));
        assert!(mc.begin(Position::new(0.0, f64::INFINITY)).is_err());

        assert_eq!(mc.state(), before);
    }

    #[test]
    fn test_halt() {
        let mut mc = ctrl(Position::origin());

        assert!(!mc.halt());

        mc.begin(Position::new(10.0, 0.0)).unwrap();
        mc.tick();
        assert!(mc.halt());
        assert_eq!(mc.tick().status, MotionStatus::Idle);
        assert_eq!(mc.position(), Position::new(2.0, 0.0));
    }

    #[test]
    fn test_invalid_params() {
        let bad_speed = Params { speed: 0.0, ..Default::default() };
        let bad_tol = Params { arrival_tolerance: -1.0, ..Default::default() };

        assert!(matches!(
            MotionCtrl::new(bad_speed, Position::origin()),
            Err(MotionCtrlError::InvalidParams(_))
        ));
        assert!(matches!(
            MotionCtrl::new(bad_tol, Position::origin()),
            Err(MotionCtrlError::InvalidParams(_))
        ));

        let mut mc = MotionCtrl::default();
        assert!(mc.init(bad_speed).is_err());
    }

    #[test]
    fn test_proc() {
        let mut mc = MotionCtrl::default();
        mc.init(Params { speed: 5.0, arrival_tolerance: 0.5 }).unwrap();

        let (pos, rpt) = mc.proc(&InputData {
            cmd: Some(MotionCmd::Begin(Position::new(0.0, 10.0)))
        }).unwrap();
        assert_eq!(pos, Position::new(0.0, 5.0));
        assert_eq!(rpt.status, MotionStatus::Moving);
        assert_eq!(rpt.distance_to_target, 5.0);

        let (_, rpt) = mc.proc(&InputData::default()).unwrap();
        assert_eq!(rpt.status, MotionStatus::Arrived);

        mc.proc(&InputData { cmd: Some(MotionCmd::Begin(Position::new(0.0, 0.0))) }).unwrap();
        let (pos, rpt) = mc.proc(&InputData { cmd: Some(MotionCmd::Halt) }).unwrap();
        assert!(rpt.halted);
        assert_eq!(rpt.status, MotionStatus::Idle);
        assert_eq!(pos, Position::new(0.0, 5.0));
    }
}
