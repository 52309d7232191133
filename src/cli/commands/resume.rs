use anyhow::Result;

use super::{next_step_hint, print_state};
use crate::workflow::{Collaborators, RouteParams, WorkflowOrchestrator, WorkflowStep};

/// Resolve route identifiers the way a deep link would and report the step
pub struct ResumeCommand {
    pub intent: Option<String>,
    pub dseq: Option<String>,
    collaborators: Collaborators,
}

impl ResumeCommand {
    pub fn new(intent: Option<String>, dseq: Option<String>, collaborators: Collaborators) -> Self {
        Self {
            intent,
            dseq,
            collaborators,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let params = RouteParams::from_raw(self.intent.as_deref(), self.dseq.as_deref())?;
        let mut orchestrator =
            WorkflowOrchestrator::resume(self.collaborators.clone(), &params).await?;

        print_state(&orchestrator.state());

        if orchestrator.step() == WorkflowStep::PreflightChecking {
            let report = orchestrator.run_preflight().await?;
            if report.is_ready() {
                println!("   ✅ Preflight passed");
            } else {
                for issue in &report.issues {
                    println!("   ❌ {issue}");
                }
            }
        }

        if orchestrator.step() == WorkflowStep::ProviderSelecting {
            match orchestrator.specification() {
                Some(spec) => println!("   📄 Saved SDL: {}", spec.app_name),
                None => println!("   ⚠️  No saved SDL for this deployment"),
            }
        }

        if let Some(hint) = next_step_hint(&orchestrator.state()) {
            println!();
            println!("💡 Next: {hint}");
        }
        Ok(())
    }
}
