use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::info;

use super::{next_step_hint, print_state};
use crate::workflow::{Collaborators, WorkflowOrchestrator, WorkloadSpecification};

pub struct DeployCommand {
    pub sdl: PathBuf,
    pub name: Option<String>,
    pub skip_preflight: bool,
    collaborators: Collaborators,
}

impl DeployCommand {
    pub fn new(
        sdl: PathBuf,
        name: Option<String>,
        skip_preflight: bool,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            sdl,
            name,
            skip_preflight,
            collaborators,
        }
    }

    fn app_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.sdl
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| "deployment".to_string())
        })
    }

    pub async fn execute(&self) -> Result<()> {
        let sdl = tokio::fs::read_to_string(&self.sdl)
            .await
            .with_context(|| format!("Failed to read SDL file {}", self.sdl.display()))?;
        let spec = WorkloadSpecification::new(self.app_name(), sdl);

        println!("🚀 Deploying {}", spec.app_name);
        println!();

        let mut orchestrator = WorkflowOrchestrator::new(self.collaborators.clone());
        info!(correlation_id = %orchestrator.correlation_id(), "Deploy started");

        orchestrator.begin_preflight(spec.clone())?;

        print!("🔍 Running preflight checks... ");
        std::io::Write::flush(&mut std::io::stdout())?;
        let report = orchestrator.run_preflight().await?;
        if report.is_ready() {
            println!("✅");
        } else {
            println!("⚠️");
            for issue in &report.issues {
                println!("   ❌ {issue}");
            }
            if !self.skip_preflight {
                return Err(anyhow!(
                    "Preflight found {} issue(s); fix them or pass --skip-preflight",
                    report.issues.len()
                ));
            }
            println!("   Continuing because --skip-preflight was given");
        }

        println!("📦 Creating deployment...");
        let result = orchestrator.create_deployment(spec).await;
        let state = orchestrator.state();
        print_state(&state);

        let deployment = result?;
        println!();
        println!("✅ Deployment {} created", deployment.dseq);
        if let Some(hint) = next_step_hint(&state) {
            println!("💡 Next: {hint}");
        }
        Ok(())
    }
}
