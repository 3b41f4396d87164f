//! # Command Execution Module / 命令执行模块
//!
//! The process-launching capability the job runner depends on, plus the tokio
//! implementation used by the CLI. Output streams are read concurrently and
//! combined into one diagnostic string.
//!
//! 作业运行器所依赖的进程启动能力，以及 CLI 使用的 tokio 实现。
//! 输出流被并发读取并合并为一个诊断字符串。

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::core::error::StepError;

/// Everything needed to launch one external process.
/// 启动一个外部进程所需的全部信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// The complete environment of the child; nothing is inherited implicitly.
    /// 子进程的完整环境；不会隐式继承任何变量。
    pub env: BTreeMap<String, String>,
    pub current_dir: PathBuf,
}

impl CommandSpec {
    /// Renders the command line for logs.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| shlex::try_quote(part).map(|q| q.into_owned()).unwrap_or_else(|_| part.to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status and combined stdout/stderr of a finished process.
/// 已结束进程的退出状态及合并的 stdout/stderr。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Launches external processes. The job runner only sees this capability.
/// 启动外部进程。作业运行器只依赖此能力。
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Runs the command to completion. `Err` only when it could not be started.
    /// 运行命令直至结束。仅在无法启动时返回 `Err`。
    async fn launch(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput>;
}

/// [`ProcessLauncher`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioLauncher;

#[async_trait]
impl ProcessLauncher for TokioLauncher {
    async fn launch(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput> {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .env_clear()
            .envs(&spec.env)
            .current_dir(&spec.current_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        spawn_and_capture(cmd).await
    }
}

/// Spawns a command and captures its stdout and stderr into one string.
///
/// 派生一个命令，捕获其 stdout 和 stderr 并合并为一个字符串。
pub async fn spawn_and_capture(mut cmd: tokio::process::Command) -> std::io::Result<ProcessOutput> {
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("failed to capture stderr"))?;

    // Both readers append to one buffer so interleaving roughly follows arrival order.
    // 两个读取任务写入同一个缓冲区，使交错顺序大致与到达顺序一致。
    let output = Arc::new(Mutex::new(String::new()));
    let stdout_handle = tokio::spawn(pump_lines(stdout, Arc::clone(&output)));
    let stderr_handle = tokio::spawn(pump_lines(stderr, Arc::clone(&output)));

    let status = child.wait().await?;

    drain("stdout", stdout_handle, &output).await;
    drain("stderr", stderr_handle, &output).await;

    let output = output.lock().await.clone();
    Ok(ProcessOutput {
        exit_code: status.code(),
        output,
    })
}

/// Copies `stream` into `sink` until EOF.
///
/// Bytes are read raw and decoded lossily, so invalid UTF-8 never stops the
/// reader. Stopping early would close the pipe under a still-writing child.
///
/// 将 `stream` 复制到 `sink` 直到 EOF。按原始字节读取并有损解码，
/// 无效的 UTF-8 不会让读取提前结束（否则仍在写入的子进程会因管道关闭而被终止）。
async fn pump_lines<R>(stream: R, sink: Arc<Mutex<String>>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        sink.lock().await.push_str(&String::from_utf8_lossy(&line));
    }
}

/// Waits for a reader task; a failed read ends up in the captured output.
async fn drain(stream: &str, handle: JoinHandle<std::io::Result<()>>, sink: &Mutex<String>) {
    let error = match handle.await {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    let mut sink = sink.lock().await;
    if !sink.is_empty() && !sink.ends_with('\n') {
        sink.push('\n');
    }
    sink.push_str(&format!("[run-matrix] {stream} capture incomplete: {error}\n"));
}

/// Expands `$VAR` / `${VAR}` against `env`, then splits the line shell-style.
///
/// 先根据 `env` 展开 `$VAR` / `${VAR}`，再按 shell 规则拆分命令行。
///
/// # Errors
/// [`StepError::Unparsable`] for unbalanced quotes, [`StepError::EmptyCommand`]
/// if nothing is left after splitting.
pub fn parse_command_line(
    step: &str,
    line: &str,
    env: &BTreeMap<String, String>,
) -> Result<(String, Vec<String>), StepError> {
    let expanded = shellexpand::env_with_context_no_errors(line, |name| env.get(name));
    let mut parts = shlex::split(&expanded).ok_or_else(|| StepError::Unparsable {
        step: step.to_string(),
        command: expanded.to_string(),
    })?;
    if parts.is_empty() {
        return Err(StepError::EmptyCommand {
            step: step.to_string(),
        });
    }
    let program = parts.remove(0);
    Ok((program, parts))
}

/// Splits an extra-argument string; expansion uses the same environment.
pub fn split_args(
    step: &str,
    args: &str,
    env: &BTreeMap<String, String>,
) -> Result<Vec<String>, StepError> {
    let expanded = shellexpand::env_with_context_no_errors(args, |name| env.get(name));
    shlex::split(&expanded).ok_or_else(|| StepError::Unparsable {
        step: step.to_string(),
        command: expanded.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_variables_before_splitting() {
        let mut env = BTreeMap::new();
        env.insert("PKG".to_string(), "libssl-dev".to_string());
        let (program, args) =
            parse_command_line("deps", "apt-get install -y ${PKG} 'two words'", &env).unwrap();
        assert_eq!(program, "apt-get");
        assert_eq!(args, ["install", "-y", "libssl-dev", "two words"]);
    }

    #[test]
    fn empty_and_unbalanced_lines_are_errors() {
        let env = BTreeMap::new();
        assert!(matches!(
            parse_command_line("s", "   ", &env),
            Err(StepError::EmptyCommand { .. })
        ));
        assert!(matches!(
            parse_command_line("s", "echo 'oops", &env),
            Err(StepError::Unparsable { .. })
        ));
    }

    #[cfg(unix)]
    fn sh(script: &str) -> CommandSpec {
        let mut env = BTreeMap::new();
        if let Ok(path) = std::env::var("PATH") {
            env.insert("PATH".to_string(), path);
        }
        CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env,
            current_dir: std::env::temp_dir(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_does_not_truncate_output() {
        let result = TokioLauncher
            .launch(&sh("printf 'before\\n\\377\\nerror: test failed\\n'; exit 3"))
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(3));
        assert!(result.output.contains("before\n"));
        assert!(result.output.contains('\u{FFFD}'));
        assert!(result.output.contains("error: test failed"), "got {:?}", result.output);
    }

    /// A child that keeps writing after an invalid byte must not be killed by
    /// a closed pipe.
    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_keeps_draining_a_busy_child() {
        let result = TokioLauncher
            .launch(&sh(
                "printf '\\377\\n'; head -c 300000 /dev/zero | tr '\\0' a; echo; echo done",
            ))
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(0));
        assert!(result.output.trim_end().ends_with("done"));
        assert!(result.output.len() > 300_000);
    }

    #[tokio::test]
    async fn reader_failures_are_recorded_in_the_output() {
        let sink = Mutex::new("partial".to_string());
        let failed = tokio::spawn(async { Err(std::io::Error::other("pipe reset")) });
        drain("stdout", failed, &sink).await;

        let panicked: JoinHandle<std::io::Result<()>> = tokio::spawn(async { panic!("reader crashed") });
        drain("stderr", panicked, &sink).await;

        let finished = tokio::spawn(async { Ok(()) });
        drain("stdout", finished, &sink).await;

        let output = sink.lock().await.clone();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "partial");
        assert_eq!(lines[1], "[run-matrix] stdout capture incomplete: pipe reset");
        assert!(lines[2].starts_with("[run-matrix] stderr capture incomplete:"));
    }

    #[test]
    fn display_line_quotes_arguments_with_spaces() {
        let spec = CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 1".to_string()],
            env: BTreeMap::new(),
            current_dir: PathBuf::from("."),
        };
        assert_eq!(spec.display_line(), "sh -c 'exit 1'");
    }
}
