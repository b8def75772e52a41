//! Subprocess-backed `ToolExecutor`: spawns `execute_command` calls as
//! shell commands, capturing combined output under a timeout and
//! honoring cooperative cancellation (§6 ToolExecutor).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

use zace_core::cancel::CancellationToken;
use zace_core::traits::ToolExecutor;
use zace_core::types::{ToolArtifacts, ToolCall, ToolResult};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Executes `execute_command` tool calls via `/bin/sh -c`. Other tool
/// names (`search_session_messages`, `write_session_message`, ...) are
/// outside this executor's scope and are reported as unsupported — the
/// loop wires a session-aware executor for those separately.
pub struct ShellToolExecutor {
    timeout: Duration,
}

impl Default for ShellToolExecutor {
    fn default() -> Self {
        Self { timeout: DEFAULT_COMMAND_TIMEOUT }
    }
}

impl ShellToolExecutor {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_command(&self, command: &str, cancel: &CancellationToken) -> ToolResult {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(command);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => return ToolResult::failure(format!("failed to spawn command: {source}")),
        };

        let mut stdout = child.stdout.take().map(BufReader::new);
        let mut stderr = child.stderr.take().map(BufReader::new);

        let wait_fut = async {
            let mut out = String::new();
            let mut err = String::new();
            if let Some(reader) = stdout.as_mut() {
                let _ = reader.read_to_string(&mut out).await;
            }
            if let Some(reader) = stderr.as_mut() {
                let _ = reader.read_to_string(&mut err).await;
            }
            let status = child.wait().await;
            (status, out, err)
        };

        tokio::select! {
            result = timeout(self.timeout, wait_fut) => {
                match result {
                    Ok((status, out, err)) => build_result(status, out, err),
                    Err(_) => {
                        let _ = child.start_kill();
                        ToolResult::failure(format!("command timed out after {:?}", self.timeout))
                    }
                }
            }
            () = poll_cancel(cancel) => {
                let _ = child.start_kill();
                let mut artifacts = ToolArtifacts::default();
                artifacts.aborted = true;
                ToolResult {
                    success: false,
                    output: String::new(),
                    error: Some("cancelled".into()),
                    artifacts: Some(artifacts),
                }
            }
        }
    }
}

async fn poll_cancel(cancel: &CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
    }
}

fn build_result(status: std::io::Result<std::process::ExitStatus>, stdout: String, stderr: String) -> ToolResult {
    match status {
        Ok(status) => {
            let combined = if stderr.is_empty() { stdout.clone() } else { format!("{stdout}\n{stderr}") };
            ToolResult {
                success: status.success(),
                output: combined,
                error: if status.success() { None } else { Some(format!("exit code {}", status.code().unwrap_or(-1))) },
                artifacts: None,
            }
        }
        Err(source) => ToolResult::failure(format!("failed to wait for command: {source}")),
    }
}

#[async_trait]
impl ToolExecutor for ShellToolExecutor {
    async fn execute(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        match call.name.as_str() {
            "execute_command" => match call.string_arg("command") {
                Some(command) => self.run_command(command, cancel).await,
                None => ToolResult::failure("execute_command requires a 'command' argument"),
            },
            other => ToolResult::failure(format!("unsupported tool: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use serde_json::json;

    fn call(name: &str, args: &[(&str, &str)]) -> ToolCall {
        let mut arguments = HashMap::new();
        for (k, v) in args {
            arguments.insert(k.to_string(), json!(v));
        }
        ToolCall { name: name.to_string(), arguments }
    }

    #[tokio::test]
    async fn successful_command_returns_output() {
        let executor = ShellToolExecutor::default();
        let result = executor.execute(&call("execute_command", &[("command", "echo hi")]), &CancellationToken::new()).await;
        assert!(result.success);
        assert!(result.output.contains("hi"));
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code() {
        let executor = ShellToolExecutor::default();
        let result = executor.execute(&call("execute_command", &[("command", "exit 3")]), &CancellationToken::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains('3'));
    }

    #[tokio::test]
    async fn missing_command_argument_fails() {
        let executor = ShellToolExecutor::default();
        let result = executor.execute(&call("execute_command", &[]), &CancellationToken::new()).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn unsupported_tool_name_fails() {
        let executor = ShellToolExecutor::default();
        let result = executor.execute(&call("mystery_tool", &[]), &CancellationToken::new()).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn timeout_kills_long_running_command() {
        let executor = ShellToolExecutor::with_timeout(Duration::from_millis(50));
        let result = executor.execute(&call("execute_command", &[("command", "sleep 5")]), &CancellationToken::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn cancellation_aborts_command() {
        let executor = ShellToolExecutor::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = executor.execute(&call("execute_command", &[("command", "sleep 5")]), &cancel).await;
        assert!(!result.success);
        assert!(result.artifacts.unwrap().aborted);
    }
}
