//! Cook-program sequencer.
//!
//! A program is an ordered list of steps fetched from the sync service.
//! Each step names the mode to run, the grill target to hold, and a
//! completion trigger: an elapsed-time limit measured from the program
//! clock, or a food-probe temperature limit.
//!
//! The sequencer owns the steps and the cursor.  Applying a step's targets
//! and mode — and deciding what a finished program means — is the service's
//! job; the sequencer only answers "has the current step completed?" and
//! "what happens when I advance?".

use log::info;
use serde::{Deserialize, Serialize};

use crate::fsm::Mode;

// ═══════════════════════════════════════════════════════════════
//  Steps
// ═══════════════════════════════════════════════════════════════

/// What completes a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Completes once the program clock exceeds `limit` seconds.
    Time,
    /// Completes once the probe reading exceeds `limit` °F.
    Temp,
}

/// One program step, as delivered on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStep {
    /// Mode to enter when the step is applied.
    pub mode: Mode,
    /// Grill target (°F) to hold for the duration of the step.
    #[serde(rename = "targetGrill")]
    pub target_grill: i32,
    /// Completion trigger kind.
    pub trigger: Trigger,
    /// Trigger limit: seconds for [`Trigger::Time`], °F for
    /// [`Trigger::Temp`].
    pub limit: i64,
}

// ═══════════════════════════════════════════════════════════════
//  Sequencer
// ═══════════════════════════════════════════════════════════════

/// Result of advancing past a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The cursor moved to the next step; apply it.
    Next,
    /// The completed step was the last one; shut down.
    Finished,
    /// The cursor was out of range — internal consistency fault.
    Invalid,
}

struct Program {
    id: String,
    steps: Vec<ProgramStep>,
    index: usize,
}

/// Holds the active program, if any.  Replaced wholesale whenever a new
/// program is accepted; cleared on Shutdown.
pub struct ProgramSequencer {
    program: Option<Program>,
}

impl ProgramSequencer {
    pub fn new() -> Self {
        Self { program: None }
    }

    /// Install a new program with the cursor at `start_index`.
    pub fn load(&mut self, id: String, steps: Vec<ProgramStep>, start_index: usize) {
        info!("program '{}' loaded: {} steps, starting at {}", id, steps.len(), start_index);
        self.program = Some(Program {
            id,
            steps,
            index: start_index,
        });
    }

    /// Drop the program (Shutdown, or remote suspension).
    pub fn clear(&mut self) {
        if self.program.take().is_some() {
            info!("program cleared");
        }
    }

    /// True if a program with at least one step is installed.
    pub fn is_loaded(&self) -> bool {
        self.program.as_ref().is_some_and(|p| !p.steps.is_empty())
    }

    /// Identifier of the installed program.
    pub fn id(&self) -> Option<&str> {
        self.program.as_ref().map(|p| p.id.as_str())
    }

    /// Cursor position, when a program is installed.
    pub fn index(&self) -> Option<usize> {
        self.program.as_ref().map(|p| p.index)
    }

    /// The step under the cursor, or `None` when no program is installed or
    /// the cursor is out of range.
    pub fn current(&self) -> Option<&ProgramStep> {
        self.program.as_ref().and_then(|p| p.steps.get(p.index))
    }

    /// Check the current step's completion trigger.
    ///
    /// `elapsed_secs` is time since the program clock was last restarted;
    /// `probe_f` is the latest probe reading.  A Temp trigger can only fire
    /// with a probe reading present.
    pub fn limit_reached(&self, elapsed_secs: f32, probe_f: Option<i32>) -> bool {
        let Some(step) = self.current() else {
            return false;
        };
        match step.trigger {
            Trigger::Time => {
                if elapsed_secs > step.limit as f32 {
                    info!("step timer expired ({}s limit)", step.limit);
                    return true;
                }
                false
            }
            Trigger::Temp => match probe_f {
                Some(probe) if i64::from(probe) > step.limit => {
                    info!("probe reached requested temperature ({} > {})", probe, step.limit);
                    true
                }
                _ => false,
            },
        }
    }

    /// Move past the completed current step.
    pub fn advance(&mut self) -> AdvanceOutcome {
        let Some(program) = self.program.as_mut() else {
            return AdvanceOutcome::Invalid;
        };
        if program.steps.len() > program.index + 1 {
            program.index += 1;
            info!("advancing to step {}", program.index);
            AdvanceOutcome::Next
        } else if program.steps.len() == program.index + 1 {
            info!("finished last step in program");
            AdvanceOutcome::Finished
        } else {
            AdvanceOutcome::Invalid
        }
    }
}

impl Default for ProgramSequencer {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
