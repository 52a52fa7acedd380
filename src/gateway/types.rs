//! Call result type for downstream gateway calls.

use serde_json::Value;

use crate::gateway::runner::CommandOutput;

const REDACTED: &str = "[redacted]";

/// Outcome of one downstream call.
///
/// `payload` is set only when trimmed stdout parses as JSON. A missing
/// payload is not an error: `success` reflects the exit status alone.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub success: bool,
    pub exit_code: i32,
    pub payload: Option<Value>,
    pub stdout: String,
    pub stderr: String,
}

impl CallResult {
    pub fn from_output(output: CommandOutput) -> Self {
        let payload = serde_json::from_str(output.stdout.trim()).ok();
        Self {
            success: output.code == 0,
            exit_code: output.code,
            payload,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }

    /// Scrub a secret from captured output. The payload is left alone; it
    /// was parsed before and the gateway does not echo tokens in results.
    pub fn redact(&mut self, secret: &str) {
        if secret.is_empty() {
            return;
        }
        if self.stdout.contains(secret) {
            self.stdout = self.stdout.replace(secret, REDACTED);
        }
        if self.stderr.contains(secret) {
            self.stderr = self.stderr.replace(secret, REDACTED);
        }
    }
}
