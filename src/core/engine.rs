use crate::core::executor::{EngineError, EngineResponse, TransformEngine};
use crate::core::transformation::Transformation;
use crate::core::types::SkipReason;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

/// Stderr prefix by which a stylesheet signals "does not apply here".
const SKIP_PREFIX: &str = "skip:";

/// Engine backed by an external `xsltproc`-compatible processor.
///
/// The record XML is piped through stdin; parameters are bound as string
/// params. Stylesheets communicate back over stderr: a line starting with
/// `skip:<reason>` is a not-applicable signal, every other line is a
/// diagnostic that ends up as a warning on the outcome.
#[derive(Debug, Clone)]
pub struct XsltProcEngine {
    command: String,
}

impl XsltProcEngine {
    pub fn new(command: impl Into<String>) -> Self {
        XsltProcEngine {
            command: command.into(),
        }
    }
}

impl Default for XsltProcEngine {
    fn default() -> Self {
        XsltProcEngine::new("xsltproc")
    }
}

#[async_trait]
impl TransformEngine for XsltProcEngine {
    async fn apply(
        &self,
        transformation: &Transformation,
        params: &IndexMap<String, String>,
        xml: &str,
    ) -> Result<EngineResponse, EngineError> {
        if !transformation.path.is_file() {
            return Err(EngineError::Unavailable(format!(
                "stylesheet not found: {}",
                transformation.path.display()
            )));
        }

        let mut command = tokio::process::Command::new(&self.command);
        for (name, value) in params {
            command.arg("--stringparam").arg(name).arg(value);
        }
        command
            .arg(&transformation.path)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| {
            EngineError::Unavailable(format!("failed to start {}: {}", self.command, e))
        })?;
        // Feed stdin while draining stdout, or a record larger than the pipe
        // buffer wedges both sides. A processor that settles without reading
        // its input closes the pipe; that write error is not an engine fault.
        let stdin = child.stdin.take();
        let feed = async {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(xml.as_bytes()).await {
                    tracing::debug!("engine stopped reading input: {e}");
                }
            }
        };
        let (_, output) = tokio::join!(feed, child.wait_with_output());
        let output =
            output.map_err(|e| EngineError::Unavailable(format!("engine did not exit: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut messages = Vec::new();
        let mut skip_signal = None;
        for line in stderr.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.strip_prefix(SKIP_PREFIX) {
                Some(reason) if skip_signal.is_none() => {
                    skip_signal = Some(skip_reason(reason.trim()));
                }
                _ => messages.push(line.to_string()),
            }
        }

        if !output.status.success() {
            let error = if messages.is_empty() {
                format!("engine exited with {}", output.status)
            } else {
                messages.join("; ")
            };
            return Err(EngineError::Processing(error));
        }
        if let Some(reason) = skip_signal {
            return Ok(EngineResponse::NotApplicable { reason, messages });
        }
        Ok(EngineResponse::Transformed {
            xml: String::from_utf8_lossy(&output.stdout).into_owned(),
            messages,
        })
    }
}

/// This engine's signal-to-reason mapping; unknown signals stay generic.
fn skip_reason(signal: &str) -> SkipReason {
    match signal {
        "already-applied" => SkipReason::AlreadyApplied,
        "invalid-input" => SkipReason::InvalidInput,
        _ => SkipReason::NotApplicable,
    }
}
