use serde::Deserialize;

/// Which end of the keyboard the backend is waiting for during calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitStep {
    Low,
    High,
}

/// A guided range calibration in progress for one device.
///
/// The backend decides when each step is satisfied; the client only mirrors
/// the step it reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitWorkflow {
    pub device_id: String,
    pub step: InitStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingLow,
    AwaitingHigh,
}

impl InitWorkflow {
    pub fn begin(device_id: impl Into<String>) -> Self {
        InitWorkflow {
            device_id: device_id.into(),
            step: InitStep::Low,
        }
    }

    /// Move to the step reported by the backend; a report without a step
    /// means the low note was captured.
    pub fn advance(&mut self, step: Option<InitStep>) {
        self.step = step.unwrap_or(InitStep::High);
    }

    pub fn phase(&self) -> Phase {
        match self.step {
            InitStep::Low => Phase::AwaitingLow,
            InitStep::High => Phase::AwaitingHigh,
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self.step {
            InitStep::Low => "Play the lowest note on your keyboard.",
            InitStep::High => "Now play the highest note on your keyboard.",
        }
    }

    /// `(current, total)` for a "Step 1 of 2" style indicator.
    pub fn progress(&self) -> (u8, u8) {
        match self.step {
            InitStep::Low => (1, 2),
            InitStep::High => (2, 2),
        }
    }
}

pub fn phase(workflow: Option<&InitWorkflow>) -> Phase {
    workflow.map_or(Phase::Idle, InitWorkflow::phase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begins_awaiting_low() {
        let wf = InitWorkflow::begin("KB-1");
        assert_eq!(wf.device_id, "KB-1");
        assert_eq!(wf.phase(), Phase::AwaitingLow);
        assert_eq!(wf.progress(), (1, 2));
        assert_eq!(wf.prompt(), "Play the lowest note on your keyboard.");
    }

    #[test]
    fn advance_defaults_to_high() {
        let mut wf = InitWorkflow::begin("KB-1");
        wf.advance(None);
        assert_eq!(wf.phase(), Phase::AwaitingHigh);
        assert_eq!(wf.progress(), (2, 2));
    }

    #[test]
    fn advance_follows_reported_step() {
        let mut wf = InitWorkflow::begin("KB-1");
        wf.advance(Some(InitStep::High));
        wf.advance(Some(InitStep::Low));
        assert_eq!(wf.phase(), Phase::AwaitingLow);
    }

    #[test]
    fn no_workflow_is_idle() {
        assert_eq!(phase(None), Phase::Idle);
        assert_eq!(phase(Some(&InitWorkflow::begin("x"))), Phase::AwaitingLow);
    }
}
