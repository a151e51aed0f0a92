//! Arm program execution

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use util::script_interpreter::ScriptInterpreter;

use super::{ArmCtrl, ArmCtrlError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// How a program run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramOutcome {
    /// Every line was executed
    Completed,

    /// A line was refused, no further lines were executed
    Aborted {
        line_num: usize,
        line: String,
        error: ArmCtrlError,
    },

    /// The run was cancelled before executing the given line
    Cancelled { line_num: usize },
}

/// Summary of a program run.
#[derive(Debug, Clone)]
pub struct ProgramReport {
    pub name: String,

    /// Number of lines handed to the dispatcher
    pub executed: usize,

    /// Ids of the commands sent, in order
    pub ids: Vec<String>,

    pub outcome: ProgramOutcome,

    pub started: DateTime<Utc>,

    pub finished: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProgramReport {
    /// Time taken to issue the program's commands. The arm may still be executing them.
    pub fn duration_s(&self) -> f64 {
        util::time::duration_to_seconds(self.finished - self.started).unwrap_or(0.0)
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == ProgramOutcome::Completed
    }
}

impl ArmCtrl {
    /// Execute every line of a program in order.
    ///
    /// The run stops at the first line which fails to parse or is refused, or before the next
    /// line once `cancel` is set. Commands already handed to the dispatcher are left alone.
    pub fn run_program(
        &mut self,
        script: &mut ScriptInterpreter,
        cancel: &AtomicBool,
    ) -> Result<ProgramReport, ArmCtrlError> {
        if !self.is_ready() {
            return Err(ArmCtrlError::NotConnected);
        }

        info!(
            "Running program {} ({} lines)",
            script.name(),
            script.get_num_lines()
        );

        let started = Utc::now();
        let mut ids = Vec::new();
        let mut outcome = ProgramOutcome::Completed;

        while let Some(line) = script.next_line() {
            if cancel.load(Ordering::SeqCst) {
                warn!("Program cancelled before line {}", line.line_num);
                outcome = ProgramOutcome::Cancelled {
                    line_num: line.line_num,
                };
                break;
            }

            match self.execute(&line.text) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!(
                        "Program aborted at line {} ({:?}): {}",
                        line.line_num, line.text, e
                    );
                    outcome = ProgramOutcome::Aborted {
                        line_num: line.line_num,
                        line: line.text,
                        error: e,
                    };
                    break;
                }
            }
        }

        let report = ProgramReport {
            name: script.name().to_string(),
            executed: ids.len(),
            ids,
            outcome,
            started,
            finished: Utc::now(),
        };

        info!(
            "Program {} issued {} command(s) in {:.3} s",
            report.name,
            report.executed,
            report.duration_s()
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::collision::CollisionPredictor;
    use crate::dispatcher::Dispatcher;
    use comms_if::tc::ParseError;

    fn sim_ctrl() -> ArmCtrl {
        let d = Dispatcher::new();
        d.set_simulation(true);
        ArmCtrl::new(d, CollisionPredictor::default())
    }

    fn texts(ctrl: &ArmCtrl) -> Vec<String> {
        ctrl.dispatcher()
            .pending()
            .iter()
            .map(|c| c.text().to_string())
            .collect()
    }

    #[test]
    fn test_program_completes() {
        let mut ctrl = sim_ctrl();
        let mut script =
            ScriptInterpreter::from_source("wave", "# wave\nSV10\n\nEV-20\nCO\nCS45\n").unwrap();

        let report = ctrl
            .run_program(&mut script, &AtomicBool::new(false))
            .unwrap();

        assert!(report.is_completed());
        assert_eq!(report.executed, 4);
        assert_eq!(report.ids.len(), 4);
        assert_eq!(texts(&ctrl), vec!["SV-10", "EV-20", "CO", "CS45"]);
        assert!(report.duration_s() >= 0.0);
    }

    #[test]
    fn test_program_aborts_on_bad_line() {
        let mut ctrl = sim_ctrl();
        let mut script = ScriptInterpreter::from_source("bad", "SV10\nCS10\nCO\n").unwrap();

        let report = ctrl
            .run_program(&mut script, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(report.executed, 1);
        match report.outcome {
            ProgramOutcome::Aborted {
                line_num,
                line,
                error,
            } => {
                assert_eq!(line_num, 2);
                assert_eq!(line, "CS10");
                assert!(matches!(
                    error,
                    ArmCtrlError::Rejected(ParseError::InvalidValueForCommand { .. })
                ));
            }
            o => panic!("Expected the program to abort, got {:?}", o),
        }
        assert_eq!(texts(&ctrl), vec!["SV-10"]);
    }

    #[test]
    fn test_program_aborts_on_collision() {
        let mut ctrl = sim_ctrl();
        let mut script = ScriptInterpreter::from_source("fold", "SV90\nEV90\nCO\n").unwrap();

        let report = ctrl
            .run_program(&mut script, &AtomicBool::new(false))
            .unwrap();

        assert!(matches!(
            report.outcome,
            ProgramOutcome::Aborted {
                line_num: 2,
                error: ArmCtrlError::CollisionPredicted { .. },
                ..
            }
        ));
        assert_eq!(report.executed, 1);
    }

    #[test]
    fn test_program_matches_execute() {
        let mut direct = sim_ctrl();
        let direct_err = direct.execute("  EV-20").unwrap_err();

        let mut ctrl = sim_ctrl();
        let mut script = ScriptInterpreter::from_source("indented", "CO\n  EV-20\nCC\n").unwrap();

        let report = ctrl
            .run_program(&mut script, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(
            report.outcome,
            ProgramOutcome::Aborted {
                line_num: 2,
                line: "  EV-20".into(),
                error: direct_err,
            }
        );
        assert_eq!(texts(&ctrl), vec!["CO"]);
    }

    #[test]
    fn test_program_cancelled() {
        let mut ctrl = sim_ctrl();
        let mut script = ScriptInterpreter::from_source("cancel", "CO\nCC\n").unwrap();

        let report = ctrl
            .run_program(&mut script, &AtomicBool::new(true))
            .unwrap();

        assert_eq!(report.outcome, ProgramOutcome::Cancelled { line_num: 1 });
        assert_eq!(report.executed, 0);
        assert_eq!(ctrl.dispatcher().pending_len(), 0);
    }

    #[test]
    fn test_program_needs_link() {
        let mut ctrl = ArmCtrl::new(Dispatcher::new(), CollisionPredictor::default());
        let mut script = ScriptInterpreter::from_source("idle", "CO\n").unwrap();

        assert_eq!(
            ctrl.run_program(&mut script, &AtomicBool::new(false))
                .unwrap_err(),
            ArmCtrlError::NotConnected
        );
    }
}
