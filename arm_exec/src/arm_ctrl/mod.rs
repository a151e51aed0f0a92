//! # Arm control module
//!
//! `ArmCtrl` is the front end to the arm. It validates every move against the joint catalog,
//! refuses vertical moves the collision predictor flags, keeps track of the requested pose and
//! hands the resulting wire text to the dispatcher.
//!
//! Angles are given in the arm's frame. The shoulder servos are mounted mirrored, so shoulder
//! amounts are negated on the wire.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pose;
mod program;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};

// Internal
use crate::collision::{CollisionPredictor, VerticalPose};
use crate::dispatcher::Dispatcher;
use comms_if::{
    eqpt::arm::ArmCommand,
    net::Transport,
    tc::{
        self,
        catalog::{catalog, ActionCode, CLAMP_MAX_DEG, CLAMP_MIN_DEG},
        ParseError,
    },
};

pub use pose::{Pose, CLAMP_REST_DEG};
pub use program::{ProgramOutcome, ProgramReport};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Moves which bring the arm from any pose back to its start position, unfolding it upright
/// first so that the final fold can't pass through the base.
const START_SEQUENCE: [(ActionCode, i32); 13] = [
    (ActionCode::EV, 0),
    (ActionCode::WV, 0),
    (ActionCode::SV, 0),
    (ActionCode::EV, 90),
    (ActionCode::WV, -90),
    (ActionCode::SV, 90),
    (ActionCode::SH, 0),
    (ActionCode::WR, -20),
    (ActionCode::WR, 20),
    (ActionCode::WR, 0),
    (ActionCode::CS, CLAMP_MIN_DEG),
    (ActionCode::CS, CLAMP_MAX_DEG),
    (ActionCode::CS, CLAMP_REST_DEG),
];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during ArmCtrl operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArmCtrlError {
    #[error("Command rejected: {0}")]
    Rejected(#[from] ParseError),

    #[error("Refusing {action}, a collision is predicted (clamp tip would be {vertical_m:.3} m above the ground)")]
    CollisionPredicted { action: String, vertical_m: f64 },

    #[error("The arm is not connected and simulation mode is off")]
    NotConnected,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arm control module state
pub struct ArmCtrl {
    dispatcher: Dispatcher,

    predictor: CollisionPredictor,

    pose: Pose,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    pub fn new(dispatcher: Dispatcher, predictor: CollisionPredictor) -> Self {
        Self {
            dispatcher,
            predictor,
            pose: Pose::default(),
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Whether commands will go anywhere, either to a connected arm or to the simulation.
    pub fn is_ready(&self) -> bool {
        self.dispatcher.is_simulation() || self.dispatcher.is_connected()
    }

    /// Attach the link to the arm.
    pub fn connect(&self, transport: Box<dyn Transport>) {
        if let Some(mut old) = self.dispatcher.set_transport(transport) {
            old.close();
        }
        info!("Arm link attached");
    }

    /// Close the link to the arm and abandon every command still waiting for an
    /// acknowledgment.
    pub fn disconnect(&self) -> Vec<ArmCommand> {
        self.dispatcher.interrupt();

        if let Some(mut link) = self.dispatcher.clear_transport() {
            link.close();
            info!("Arm link closed");
        }

        self.dispatcher.drain_abandoned()
    }

    // ---- MOVES ----

    pub fn move_shoulder_horizontally(&mut self, deg: i32) -> Result<String, ArmCtrlError> {
        check_range(ActionCode::SH, deg)?;

        self.pose.shoulder_horizontal = deg;
        Ok(self.send(ActionCode::SH, Some(-deg)))
    }

    pub fn move_shoulder_vertically(&mut self, deg: i32) -> Result<String, ArmCtrlError> {
        check_range(ActionCode::SV, deg)?;

        let mut target = self.pose;
        target.shoulder_vertical = deg;
        self.check_collision(ActionCode::SV, deg, &target.vertical())?;

        self.pose = target;
        Ok(self.send(ActionCode::SV, Some(-deg)))
    }

    pub fn move_elbow_vertically(&mut self, deg: i32) -> Result<String, ArmCtrlError> {
        check_range(ActionCode::EV, deg)?;

        let mut target = self.pose;
        target.elbow_vertical = deg;
        self.check_collision(ActionCode::EV, deg, &target.vertical())?;

        self.pose = target;
        Ok(self.send(ActionCode::EV, Some(deg)))
    }

    pub fn move_wrist_vertically(&mut self, deg: i32) -> Result<String, ArmCtrlError> {
        check_range(ActionCode::WV, deg)?;

        let mut target = self.pose;
        target.wrist_vertical = deg;
        self.check_collision(ActionCode::WV, deg, &target.vertical())?;

        self.pose = target;
        Ok(self.send(ActionCode::WV, Some(deg)))
    }

    pub fn rotate_wrist(&mut self, deg: i32) -> Result<String, ArmCtrlError> {
        check_range(ActionCode::WR, deg)?;

        self.pose.wrist_rotation = deg;
        Ok(self.send(ActionCode::WR, Some(deg)))
    }

    pub fn open_clamp(&mut self) -> String {
        self.pose.clamp = CLAMP_MIN_DEG;
        self.send(ActionCode::CO, None)
    }

    pub fn close_clamp(&mut self) -> String {
        self.pose.clamp = CLAMP_MAX_DEG;
        self.send(ActionCode::CC, None)
    }

    pub fn set_clamp(&mut self, deg: i32) -> Result<String, ArmCtrlError> {
        check_range(ActionCode::CS, deg)?;

        self.pose.clamp = deg;
        Ok(self.send(ActionCode::CS, Some(deg)))
    }

    /// Parse and execute a single instruction, e.g. `EV-30`.
    ///
    /// Actions taking a parameter but written without one move to zero, if zero is in range for
    /// them.
    pub fn execute(&mut self, line: &str) -> Result<String, ArmCtrlError> {
        let inst = tc::parse(line)?;
        self.apply(inst.code, inst.amount)
    }

    /// Send text to the arm as it is, without validation or pose tracking.
    pub fn send_command(&self, raw: &str) -> String {
        warn!("Sending unchecked command {:?}", raw);
        self.dispatcher.enqueue(raw)
    }

    /// Bring the arm back to its start position.
    ///
    /// Stops at the first refused move, returning the error. On success returns the ids of the
    /// commands sent.
    pub fn move_to_start_position(&mut self) -> Result<Vec<String>, ArmCtrlError> {
        warn!("Moving the arm to its start position, stand clear");

        let mut ids = Vec::with_capacity(START_SEQUENCE.len());

        for (code, amount) in START_SEQUENCE.iter() {
            ids.push(self.apply(*code, *amount)?);
        }

        info!("Arm at start position");

        Ok(ids)
    }

    fn apply(&mut self, code: ActionCode, amount: i32) -> Result<String, ArmCtrlError> {
        match code {
            ActionCode::SH => self.move_shoulder_horizontally(amount),
            ActionCode::SV => self.move_shoulder_vertically(amount),
            ActionCode::EV => self.move_elbow_vertically(amount),
            ActionCode::WV => self.move_wrist_vertically(amount),
            ActionCode::WR => self.rotate_wrist(amount),
            ActionCode::CO => Ok(self.open_clamp()),
            ActionCode::CC => Ok(self.close_clamp()),
            ActionCode::CS => self.set_clamp(amount),
        }
    }

    fn check_collision(
        &self,
        code: ActionCode,
        deg: i32,
        target: &VerticalPose,
    ) -> Result<(), ArmCtrlError> {
        if self.predictor.collision(&self.pose.vertical(), target) {
            let err = ArmCtrlError::CollisionPredicted {
                action: format!("{}{}", code, deg),
                vertical_m: self.predictor.vertical_m(target),
            };
            warn!("{}", err);
            return Err(err);
        }

        Ok(())
    }

    fn send(&self, code: ActionCode, amount: Option<i32>) -> String {
        let text = match amount {
            Some(a) => format!("{}{}", code, a),
            None => code.to_string(),
        };

        self.dispatcher.enqueue(&text)
    }
}

fn check_range(code: ActionCode, deg: i32) -> Result<(), ArmCtrlError> {
    match catalog().action(code) {
        Some(spec) if spec.accepts(deg as i64) => Ok(()),
        Some(spec) => Err(ArmCtrlError::Rejected(ParseError::InvalidValueForCommand {
            action: code.to_string(),
            amount: deg as i64,
            min: spec.min,
            max: spec.max,
        })),
        None => Err(ArmCtrlError::Rejected(ParseError::NoCommandFound(
            code.to_string(),
        ))),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
