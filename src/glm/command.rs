use std::process::Command;

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::glm::{GlmBackend, GlmFit, GlmRequest};
use crate::io::read_text;

/// Delegates fitting to an external program.
///
/// The program is called as `<program> <args..> <request.json> <response.json>`
/// and must write a [`GlmFit`] JSON document to the response path.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl GlmBackend for CommandBackend {
    fn name(&self) -> &'static str {
        "command"
    }

    fn check_available(&self) -> Result<()> {
        which::which(&self.program).map(|_| ()).map_err(|e| {
            PipelineError::DependencyUnavailable(format!("{}: {}", self.program, e))
        })
    }

    fn fit(&self, request: &GlmRequest<'_>) -> Result<GlmFit> {
        let stem = format!("{}_ses-{}_task-{}", request.subject, request.session, request.task);
        let request_path = request.output_dir.join(format!("{}_glm-request.json", stem));
        let response_path = request.output_dir.join(format!("{}_glm-response.json", stem));

        let body = serde_json::to_vec_pretty(request)
            .map_err(|e| PipelineError::StageFailed(format!("encode GLM request: {}", e)))?;
        std::fs::write(&request_path, body)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&request_path)
            .arg(&response_path)
            .output()
            .map_err(|e| PipelineError::StageFailed(format!("{}: {}", self.program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::StageFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let response = read_text(&response_path)?;
        let fit: GlmFit = serde_json::from_str(&response).map_err(|e| {
            PipelineError::StageFailed(format!("{}: {}", response_path.display(), e))
        })?;
        info!(
            subject = %request.subject,
            session = request.session,
            contrasts = fit.contrasts.len(),
            "glm_command_finished"
        );
        Ok(fit)
    }
}
