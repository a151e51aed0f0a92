//! # Joint catalog
//!
//! Static description of the arm's joints, the actions each joint accepts and
//! the valid amount range of each action. The catalog is a flat table built
//! once on first use and read-only afterwards.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use conquer_once::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Lowest angle accepted by the shoulder, elbow and wrist servos.
///
/// Units: degrees
pub const JOINT_MIN_DEG: i32 = -90;

/// Highest angle accepted by the shoulder, elbow and wrist servos.
///
/// Units: degrees
pub const JOINT_MAX_DEG: i32 = 90;

/// Narrowest clamp aperture.
///
/// Units: degrees
pub const CLAMP_MIN_DEG: i32 = 20;

/// Widest clamp aperture.
///
/// Units: degrees
pub const CLAMP_MAX_DEG: i32 = 90;

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

static CATALOG: Lazy<JointCatalog> = Lazy::new(JointCatalog::standard);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The joints of the arm.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Joint {
    Shoulder,
    Elbow,
    Wrist,
    Clamp,
}

/// Two letter action codes understood by the arm.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionCode {
    /// Shoulder vertical
    SV,
    /// Shoulder horizontal
    SH,
    /// Elbow vertical
    EV,
    /// Wrist vertical
    WV,
    /// Wrist rotation
    WR,
    /// Clamp open
    CO,
    /// Clamp close
    CC,
    /// Clamp set aperture
    CS,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Validation rules for a single action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSpec {
    pub code: ActionCode,

    /// Smallest accepted amount, 0 for actions without a parameter
    pub min: i32,

    /// Largest accepted amount, 0 for actions without a parameter
    pub max: i32,

    pub has_parameter: bool,
}

/// A joint and the actions it supports.
#[derive(Debug, Clone, Serialize)]
pub struct JointSpec {
    pub joint: Joint,
    pub commands: BTreeMap<ActionCode, ActionSpec>,
}

/// All joints of the arm, with the union of their actions.
#[derive(Debug, Clone)]
pub struct JointCatalog {
    joints: BTreeMap<Joint, JointSpec>,
    actions: BTreeMap<ActionCode, ActionSpec>,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The process wide joint catalog.
pub fn catalog() -> &'static JointCatalog {
    &CATALOG
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Joint {
    pub const ALL: [Joint; 4] = [Joint::Shoulder, Joint::Elbow, Joint::Wrist, Joint::Clamp];

    pub fn name(&self) -> &'static str {
        match self {
            Joint::Shoulder => "shoulder",
            Joint::Elbow => "elbow",
            Joint::Wrist => "wrist",
            Joint::Clamp => "clamp",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ActionCode {
    pub const ALL: [ActionCode; 8] = [
        ActionCode::SV,
        ActionCode::SH,
        ActionCode::EV,
        ActionCode::WV,
        ActionCode::WR,
        ActionCode::CO,
        ActionCode::CC,
        ActionCode::CS,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCode::SV => "SV",
            ActionCode::SH => "SH",
            ActionCode::EV => "EV",
            ActionCode::WV => "WV",
            ActionCode::WR => "WR",
            ActionCode::CO => "CO",
            ActionCode::CC => "CC",
            ActionCode::CS => "CS",
        }
    }

    /// The joint this action moves.
    pub fn joint(&self) -> Joint {
        match self {
            ActionCode::SV | ActionCode::SH => Joint::Shoulder,
            ActionCode::EV => Joint::Elbow,
            ActionCode::WV | ActionCode::WR => Joint::Wrist,
            ActionCode::CO | ActionCode::CC | ActionCode::CS => Joint::Clamp,
        }
    }

    /// True for the actions which move the clamp tip up or down and must
    /// therefore be checked for collisions.
    pub fn is_vertical(&self) -> bool {
        matches!(self, ActionCode::SV | ActionCode::EV | ActionCode::WV)
    }
}

impl fmt::Display for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionCode {
    type Err = ();

    /// Parse an action code, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionCode::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl ActionSpec {
    fn ranged(code: ActionCode, min: i32, max: i32) -> Self {
        Self {
            code,
            min,
            max,
            has_parameter: true,
        }
    }

    fn flag(code: ActionCode) -> Self {
        Self {
            code,
            min: 0,
            max: 0,
            has_parameter: false,
        }
    }

    /// Check that `amount` lies within `[min, max]`.
    pub fn accepts(&self, amount: i64) -> bool {
        amount >= self.min as i64 && amount <= self.max as i64
    }
}

impl JointSpec {
    fn new(joint: Joint, specs: &[ActionSpec]) -> Self {
        Self {
            joint,
            commands: specs.iter().map(|s| (s.code, *s)).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.joint.name()
    }

    pub fn actions(&self) -> impl Iterator<Item = ActionCode> + '_ {
        self.commands.keys().copied()
    }

    /// The `(min, max)` range of an action of this joint.
    pub fn range(&self, code: ActionCode) -> Option<(i32, i32)> {
        self.commands.get(&code).map(|s| (s.min, s.max))
    }

    pub fn has_parameter(&self, code: ActionCode) -> Option<bool> {
        self.commands.get(&code).map(|s| s.has_parameter)
    }
}

impl JointCatalog {
    /// Build the catalog of the standard six degree of freedom arm.
    pub fn standard() -> Self {
        use ActionCode::*;

        let specs = vec![
            JointSpec::new(
                Joint::Shoulder,
                &[
                    ActionSpec::ranged(SV, JOINT_MIN_DEG, JOINT_MAX_DEG),
                    ActionSpec::ranged(SH, JOINT_MIN_DEG, JOINT_MAX_DEG),
                ],
            ),
            JointSpec::new(
                Joint::Elbow,
                &[ActionSpec::ranged(EV, JOINT_MIN_DEG, JOINT_MAX_DEG)],
            ),
            JointSpec::new(
                Joint::Wrist,
                &[
                    ActionSpec::ranged(WV, JOINT_MIN_DEG, JOINT_MAX_DEG),
                    ActionSpec::ranged(WR, JOINT_MIN_DEG, JOINT_MAX_DEG),
                ],
            ),
            JointSpec::new(
                Joint::Clamp,
                &[
                    ActionSpec::flag(CO),
                    ActionSpec::flag(CC),
                    ActionSpec::ranged(CS, CLAMP_MIN_DEG, CLAMP_MAX_DEG),
                ],
            ),
        ];

        let actions = specs
            .iter()
            .flat_map(|j| j.commands.values().map(|s| (s.code, *s)))
            .collect();

        Self {
            joints: specs.into_iter().map(|j| (j.joint, j)).collect(),
            actions,
        }
    }

    /// The actions of the given joint.
    pub fn commands_for(&self, joint: Joint) -> &BTreeMap<ActionCode, ActionSpec> {
        // Every joint is inserted by `standard`
        &self.joints[&joint].commands
    }

    pub fn joint(&self, joint: Joint) -> &JointSpec {
        &self.joints[&joint]
    }

    /// Look up a joint by its name, e.g. `"elbow"`.
    pub fn joint_named(&self, name: &str) -> Option<&JointSpec> {
        self.joints.values().find(|j| j.name() == name)
    }

    /// Look up an action in the union of all joints' actions.
    pub fn action(&self, code: ActionCode) -> Option<&ActionSpec> {
        self.actions.get(&code)
    }

    /// All action codes in the catalog.
    pub fn actions(&self) -> impl Iterator<Item = ActionCode> + '_ {
        self.actions.keys().copied()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_catalog_entries() {
        let cat = catalog();

        let shoulder = cat.commands_for(Joint::Shoulder);
        assert_eq!(shoulder.len(), 2);
        assert_eq!(shoulder[&ActionCode::SV], ActionSpec::ranged(ActionCode::SV, -90, 90));
        assert_eq!(shoulder[&ActionCode::SH], ActionSpec::ranged(ActionCode::SH, -90, 90));

        let elbow = cat.commands_for(Joint::Elbow);
        assert_eq!(elbow.keys().copied().collect::<Vec<_>>(), vec![ActionCode::EV]);

        let wrist = cat.joint_named("wrist").unwrap();
        assert_eq!(wrist.range(ActionCode::WV), Some((-90, 90)));
        assert_eq!(wrist.range(ActionCode::WR), Some((-90, 90)));
        assert_eq!(wrist.range(ActionCode::CS), None);

        let clamp = cat.joint(Joint::Clamp);
        assert_eq!(clamp.has_parameter(ActionCode::CO), Some(false));
        assert_eq!(clamp.has_parameter(ActionCode::CC), Some(false));
        assert_eq!(clamp.range(ActionCode::CS), Some((20, 90)));

        assert!(cat.joint_named("knee").is_none());
    }

    #[test]
    fn test_merged_actions() {
        let mut codes: Vec<ActionCode> = catalog().actions().collect();
        codes.sort();
        let mut all = ActionCode::ALL.to_vec();
        all.sort();
        assert_eq!(codes, all);

        for code in ActionCode::ALL.iter() {
            let spec = catalog().action(*code).unwrap();
            assert_eq!(catalog().commands_for(code.joint())[code], *spec);
        }
    }

    #[test]
    fn test_action_code_from_str() {
        assert_eq!("sv".parse::<ActionCode>(), Ok(ActionCode::SV));
        assert_eq!("Cs".parse::<ActionCode>(), Ok(ActionCode::CS));
        assert_eq!("XX".parse::<ActionCode>(), Err(()));
        assert_eq!("SVX".parse::<ActionCode>(), Err(()));
    }
}
