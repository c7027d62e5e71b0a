use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::LlmError;
use crate::types::{ResultMessage, StreamMessage};

// ─── ClaudeProcess ────────────────────────────────────────────────────────

/// A single-turn `claude --print --output-format stream-json` subprocess.
///
/// The prompt goes in as one stream-json user message on stdin, then stdin is
/// closed. Replies are read as JSONL from stdout. Stderr is drained in the
/// background and attached to exit errors.
pub(crate) struct ClaudeProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stdin: Option<ChildStdin>,
    stderr_buf: Arc<Mutex<String>>,
}

/// Options for one invocation of the CLI.
#[derive(Debug, Clone)]
pub(crate) struct Invocation<'a> {
    pub executable: &'a str,
    pub model: &'a str,
    pub system_prompt: &'a str,
}

impl ClaudeProcess {
    /// Spawn the CLI and hand it `prompt`.
    ///
    /// `CLAUDECODE` is removed so the CLI does not refuse to nest when the
    /// server itself runs under a claude session.
    pub(crate) async fn spawn(prompt: &str, inv: &Invocation<'_>) -> Result<Self, LlmError> {
        let mut cmd = build_command(inv);
        cmd.env_remove("CLAUDECODE");

        let mut process = Self::from_command(cmd)?;

        let user_msg = serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{"type": "text", "text": prompt}]
            }
        });
        process.send_message(&user_msg).await?;
        process.close_stdin();

        Ok(process)
    }

    /// Wrap an arbitrary command that emits stream-json on stdout.
    #[cfg(test)]
    pub(crate) fn spawn_command(cmd: Command) -> Result<Self, LlmError> {
        Self::from_command(cmd)
    }

    fn from_command(mut cmd: Command) -> Result<Self, LlmError> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LlmError::Process("stdout not captured".into()))?;
        let stdin = child.stdin.take();

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            });
        }

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            stdin,
            stderr_buf,
        })
    }

    async fn send_message(&mut self, msg: &serde_json::Value) -> Result<(), LlmError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| LlmError::Process("stdin already closed".into()))?;

        let mut buf = serde_json::to_vec(msg)
            .map_err(|e| LlmError::Process(format!("failed to serialize stdin message: {e}")))?;
        buf.push(b'\n');

        stdin.write_all(&buf).await?;
        stdin.flush().await?;
        Ok(())
    }

    fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Next known message from stdout, `Ok(None)` on EOF.
    ///
    /// Valid JSON with an unrecognised `type` (`rate_limit_event`, hook
    /// progress, ...) is skipped.
    pub(crate) async fn next_message(&mut self) -> Result<Option<StreamMessage>, LlmError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<StreamMessage>(trimmed) {
                Ok(msg) => return Ok(Some(msg)),
                Err(_) if is_unknown_message_type(trimmed) => continue,
                Err(e) => {
                    return Err(LlmError::Parse {
                        line: trimmed.to_owned(),
                        source: e,
                    })
                }
            }
        }
    }

    /// Read until the terminal `result` message.
    ///
    /// EOF without a result surfaces the exit status and captured stderr.
    pub(crate) async fn read_result(&mut self) -> Result<ResultMessage, LlmError> {
        while let Some(msg) = self.next_message().await? {
            if let StreamMessage::Result(r) = msg {
                return Ok(r);
            }
        }
        Err(self
            .wait_exit_error()
            .await
            .unwrap_or_else(|| LlmError::Process("claude exited without a result message".into())))
    }

    async fn wait_exit_error(&mut self) -> Option<LlmError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(LlmError::Io(e)),
        };
        if status.success() {
            return None;
        }

        let stderr = self
            .stderr_buf
            .lock()
            .ok()
            .map(|b| b.clone())
            .unwrap_or_default();

        let head = match status.code() {
            Some(code) => format!("claude exited with code {code}"),
            None => "claude terminated by signal".to_string(),
        };
        Some(LlmError::Process(if stderr.is_empty() {
            head
        } else {
            format!("{head}\nstderr: {stderr}")
        }))
    }

    /// Best-effort.
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

fn is_unknown_message_type(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line)
        .map(|v| v.get("type").is_some())
        .unwrap_or(false)
}

// ─── Command builder ──────────────────────────────────────────────────────

fn build_command(inv: &Invocation<'_>) -> Command {
    let mut cmd = Command::new(inv.executable);
    cmd.arg("--print")
        .arg("--output-format")
        .arg("stream-json")
        .arg("--verbose")
        .arg("--input-format")
        .arg("stream-json")
        .arg("--max-turns")
        .arg("1")
        .arg("--no-session-persistence");

    if !inv.model.is_empty() {
        cmd.arg("--model").arg(inv.model);
    }
    if !inv.system_prompt.is_empty() {
        cmd.arg("--system-prompt").arg(inv.system_prompt);
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn mock(lines: &[&str]) -> (ClaudeProcess, tempfile::NamedTempFile) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        let mut cmd = Command::new("cat");
        cmd.arg(f.path());
        (ClaudeProcess::spawn_command(cmd).unwrap(), f)
    }

    #[tokio::test]
    async fn reads_through_to_result() {
        let (mut p, _f) = mock(&[
            r#"{"type":"system","subtype":"init","session_id":"s1","model":"m"}"#,
            "",
            r#"{"type":"rate_limit_event","limit":1}"#,
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"{}"}]}}"#,
            r#"{"type":"result","subtype":"success","session_id":"s1","result":"{\"tip\":\"ok\"}","is_error":false}"#,
        ]);
        let r = p.read_result().await.unwrap();
        assert_eq!(r.result_text(), Some("{\"tip\":\"ok\"}"));
    }

    #[tokio::test]
    async fn garbage_line_is_a_parse_error() {
        let (mut p, _f) = mock(&["not json at all"]);
        let err = p.read_result().await.unwrap_err();
        let LlmError::Parse { line, .. } = err else {
            panic!("expected Parse, got {err:?}");
        };
        assert_eq!(line, "not json at all");
    }

    #[tokio::test]
    async fn clean_eof_without_result_is_a_process_error() {
        let (mut p, _f) = mock(&[r#"{"type":"system","subtype":"init"}"#]);
        let err = p.read_result().await.unwrap_err();
        assert!(matches!(err, LlmError::Process(ref m) if m.contains("without a result")), "{err}");
    }

    #[tokio::test]
    async fn non_zero_exit_reports_code_and_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 3");
        let mut p = ClaudeProcess::spawn_command(cmd).unwrap();
        let err = p.read_result().await.unwrap_err();
        let LlmError::Process(msg) = err else {
            panic!("expected Process");
        };
        assert!(msg.contains("code 3"), "{msg}");
    }

    #[test]
    fn command_carries_model_and_system_prompt() {
        let cmd = build_command(&Invocation {
            executable: "claude",
            model: "claude-haiku-4-5",
            system_prompt: "be brief",
        });
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w == ["--model", "claude-haiku-4-5"]));
        assert!(args.windows(2).any(|w| w == ["--system-prompt", "be brief"]));
        assert!(args.iter().any(|a| a == "--print"));
    }
}
