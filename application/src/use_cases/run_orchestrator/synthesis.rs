//! End-of-run summary: a synthesizer call with a local fallback.

use super::RunOrchestrator;
use super::types::RunError;
use crate::use_cases::subagent::{SubagentCall, SubagentCaller, SubagentError};
use cohort_domain::core::string::truncate;
use cohort_domain::{
    RolePromptTemplate, RunStatus, SubagentRole, SynthesisOutput, UnitStatus, WorkUnitState,
};
use tracing::warn;

/// Most completed-unit summaries listed in a local summary.
const MAX_LOCAL_HIGHLIGHTS: usize = 8;

impl RunOrchestrator {
    pub(super) async fn synthesize(
        &self,
        caller: &SubagentCaller,
        goal: &str,
        status: RunStatus,
        states: &[WorkUnitState],
        notes: &[String],
    ) -> Result<SynthesisOutput, RunError> {
        let unit_lines: Vec<String> = states.iter().map(unit_line).collect();
        let system = RolePromptTemplate::system(SubagentRole::Synthesizer);
        let prompt = RolePromptTemplate::synthesizer(goal, status.as_str(), &unit_lines, notes);

        match caller
            .call::<SynthesisOutput>(SubagentCall::new(SubagentRole::Synthesizer, &system, &prompt))
            .await
        {
            Ok(response) => Ok(response.parsed),
            Err(SubagentError::Cancelled) => Err(RunError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Synthesis failed; building summary locally");
                Ok(local_synthesis(status, states, notes))
            }
        }
    }
}

fn unit_line(state: &WorkUnitState) -> String {
    let detail = match state.status {
        UnitStatus::Completed => state.summary.clone().unwrap_or_default(),
        _ => state.last_error.clone().unwrap_or_default(),
    };
    format!(
        "- {} [{}] {}: {}",
        state.id(),
        state.status,
        state.unit.title,
        truncate(&detail, 240)
    )
}

/// Summary built without a model call.
pub(super) fn local_synthesis(
    status: RunStatus,
    states: &[WorkUnitState],
    notes: &[String],
) -> SynthesisOutput {
    let completed = states
        .iter()
        .filter(|s| s.status == UnitStatus::Completed)
        .count();

    let highlights = states
        .iter()
        .filter(|s| s.status == UnitStatus::Completed)
        .filter_map(|s| s.summary.as_ref().map(|summary| format!("{}: {}", s.id(), summary)))
        .take(MAX_LOCAL_HIGHLIGHTS)
        .collect();

    let mut follow_ups: Vec<String> = states
        .iter()
        .filter(|s| matches!(s.status, UnitStatus::Failed | UnitStatus::Blocked))
        .map(|s| {
            format!(
                "Revisit {}: {}",
                s.id(),
                truncate(s.last_error.as_deref().unwrap_or("no error recorded"), 160)
            )
        })
        .collect();
    follow_ups.extend(notes.iter().cloned());

    SynthesisOutput {
        summary: format!(
            "Run {}: {}/{} work units completed",
            status,
            completed,
            states.len()
        ),
        highlights,
        follow_ups,
    }
}
