// ─── Launch Task ───
// Spawns the server process and supervises it according to its I/O contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::command::{is_ready_line, IoContract, LaunchCommand};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::resourcepack::ResourcePackServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// One line of server console output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleLine {
    pub stream: ConsoleStream,
    pub line: String,
}

pub type ConsoleSink = UnboundedSender<ConsoleLine>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitReport {
    /// `None` when the process was ended by a signal.
    pub code: Option<i32>,
    /// Whether the ready line was seen. Always `false` when stdout is not
    /// captured.
    pub reached_ready: bool,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug)]
pub enum LaunchOutcome {
    Exited(ExitReport),
    Running(RunningServer),
}

impl LaunchOutcome {
    pub fn into_running(self) -> Option<RunningServer> {
        match self {
            LaunchOutcome::Running(server) => Some(server),
            LaunchOutcome::Exited(_) => None,
        }
    }
}

/// Handle to a server that keeps running after the launch call returned.
///
/// Dropping the handle does not stop the process; it keeps being supervised
/// in the background until it exits.
#[derive(Debug)]
pub struct RunningServer {
    instance: String,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    kill: Option<oneshot::Sender<()>>,
    exit: JoinHandle<LauncherResult<ExitReport>>,
}

impl RunningServer {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Write one console command to the server's stdin.
    pub async fn send_command(&mut self, command: &str) -> LauncherResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| LauncherError::Other(format!("stdin of '{}' is closed", self.instance)))?;
        let line = format!("{}\n", command.trim_end());
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| LauncherError::Other(format!("write to '{}' failed: {e}", self.instance)))?;
        stdin
            .flush()
            .await
            .map_err(|e| LauncherError::Other(format!("write to '{}' failed: {e}", self.instance)))?;
        debug!("[mc:{}] > {}", self.instance, command.trim_end());
        Ok(())
    }

    /// Ask the server to `stop`, then kill it if it is still alive after
    /// `grace`.
    pub async fn stop(mut self, grace: Duration) -> LauncherResult<ExitReport> {
        if let Err(e) = self.send_command("stop").await {
            warn!("Could not send stop to '{}': {}", self.instance, e);
        }
        self.stdin = None;

        match tokio::time::timeout(grace, &mut self.exit).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                warn!(
                    "'{}' did not stop within {:?}, killing it",
                    self.instance, grace
                );
                if let Some(kill) = self.kill.take() {
                    let _ = kill.send(());
                }
                flatten(self.exit.await)
            }
        }
    }

    /// Wait for the process to exit on its own.
    pub async fn wait(self) -> LauncherResult<ExitReport> {
        flatten(self.exit.await)
    }
}

fn flatten(
    joined: Result<LauncherResult<ExitReport>, tokio::task::JoinError>,
) -> LauncherResult<ExitReport> {
    joined.map_err(|e| LauncherError::Other(format!("supervisor task failed: {e}")))?
}

/// Spawn `cmd` and wire it up per `contract`. `pack` is stopped once the
/// process exits.
pub async fn run(
    cmd: &LaunchCommand,
    contract: IoContract,
    instance: &str,
    sink: Option<ConsoleSink>,
    pack: Option<ResourcePackServer>,
) -> LauncherResult<LaunchOutcome> {
    info!("Launching '{}' ({:?}): {}", instance, contract, cmd.display());

    let child = match spawn_child(cmd, contract) {
        Ok(child) => child,
        Err(e) => {
            error!("Failed to launch '{}': {}", instance, e);
            if let Some(pack) = pack {
                pack.stop().await;
            }
            return Err(e);
        }
    };
    info!("Server '{}' started with PID {:?}", instance, child.id());

    match contract {
        IoContract::Interactive => {
            let report = wait_interactive(child, instance).await;
            if let Some(pack) = pack {
                pack.stop().await;
            }
            report.map(LaunchOutcome::Exited)
        }
        IoContract::ProbeInit => {
            let report = probe(child, instance, sink).await;
            if let Some(pack) = pack {
                pack.stop().await;
            }
            report.map(LaunchOutcome::Exited)
        }
        IoContract::StreamedLog | IoContract::HeadlessDiscard => Ok(LaunchOutcome::Running(
            supervise(child, instance, sink, pack),
        )),
    }
}

fn spawn_child(cmd: &LaunchCommand, contract: IoContract) -> LauncherResult<Child> {
    cmd.to_command(contract).spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LauncherError::RuntimeNotFound(cmd.program.clone())
        } else {
            LauncherError::Spawn(format!("{}: {e}", cmd.program.display()))
        }
    })
}

async fn wait_interactive(mut child: Child, instance: &str) -> LauncherResult<ExitReport> {
    let status = child
        .wait()
        .await
        .map_err(|e| LauncherError::Spawn(format!("waiting for '{instance}': {e}")))?;
    info!("Server '{}' exited with code {:?}", instance, status.code());
    Ok(ExitReport {
        code: status.code(),
        reached_ready: false,
    })
}

/// Read stdout until the ready line, answer with `stop`, then drain and wait.
async fn probe(
    mut child: Child,
    instance: &str,
    sink: Option<ConsoleSink>,
) -> LauncherResult<ExitReport> {
    let mut stdin = child.stdin.take();
    let stderr = child
        .stderr
        .take()
        .map(|err| pump(err, ConsoleStream::Stderr, instance.to_string(), sink.clone(), None));

    let mut reached_ready = false;
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("[mc:{}] stdout read failed: {}", instance, e);
                    break;
                }
            };
            debug!("[mc:{}] {}", instance, line);
            let ready = !reached_ready && is_ready_line(&line);
            forward(&sink, ConsoleStream::Stdout, line);

            if ready {
                reached_ready = true;
                info!("'{}' finished initialising, sending stop", instance);
                if let Some(mut input) = stdin.take() {
                    if let Err(e) = input.write_all(b"stop\n").await {
                        warn!("Could not send stop to '{}': {}", instance, e);
                    }
                    let _ = input.flush().await;
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| LauncherError::Spawn(format!("waiting for '{instance}': {e}")))?;
    if let Some(stderr) = stderr {
        let _ = stderr.await;
    }

    if !reached_ready {
        warn!("'{}' exited before reporting ready", instance);
    }
    info!("Probe of '{}' exited with code {:?}", instance, status.code());
    Ok(ExitReport {
        code: status.code(),
        reached_ready,
    })
}

fn supervise(
    mut child: Child,
    instance: &str,
    sink: Option<ConsoleSink>,
    pack: Option<ResourcePackServer>,
) -> RunningServer {
    let pid = child.id();
    let stdin = child.stdin.take();
    let ready = Arc::new(AtomicBool::new(false));

    let mut pumps = Vec::new();
    if let Some(out) = child.stdout.take() {
        pumps.push(pump(
            out,
            ConsoleStream::Stdout,
            instance.to_string(),
            sink.clone(),
            Some(ready.clone()),
        ));
    }
    if let Some(err) = child.stderr.take() {
        pumps.push(pump(err, ConsoleStream::Stderr, instance.to_string(), sink, None));
    }

    let (kill_tx, kill_rx) = oneshot::channel::<()>();
    let name = instance.to_string();
    let exit = tokio::spawn(async move {
        // A dropped handle closes the channel; only an explicit send kills.
        let status = tokio::select! {
            status = child.wait() => status,
            Ok(()) = kill_rx => {
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill '{}': {}", name, e);
                }
                child.wait().await
            }
        };

        for pump in pumps {
            let _ = pump.await;
        }
        if let Some(pack) = pack {
            pack.stop().await;
        }

        let status =
            status.map_err(|e| LauncherError::Spawn(format!("waiting for '{name}': {e}")))?;
        info!("Server '{}' exited with code {:?}", name, status.code());
        Ok(ExitReport {
            code: status.code(),
            reached_ready: ready.load(Ordering::SeqCst),
        })
    });

    RunningServer {
        instance: instance.to_string(),
        pid,
        stdin,
        kill: Some(kill_tx),
        exit,
    }
}

/// Forward every line of `reader` to the log and the sink until EOF.
fn pump<R>(
    reader: R,
    stream: ConsoleStream,
    instance: String,
    sink: Option<ConsoleSink>,
    ready: Option<Arc<AtomicBool>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    debug!("[mc:{}] {}", instance, line);
                    if let Some(flag) = &ready {
                        if is_ready_line(&line) {
                            flag.store(true, Ordering::SeqCst);
                        }
                    }
                    forward(&sink, stream, line);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("[mc:{}] {:?} read failed: {}", instance, stream, e);
                    break;
                }
            }
        }
    })
}

fn forward(sink: &Option<ConsoleSink>, stream: ConsoleStream, line: String) {
    if let Some(tx) = sink {
        let _ = tx.send(ConsoleLine { stream, line });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sh(tmp: &TempDir, script: &str) -> LaunchCommand {
        LaunchCommand {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), script.into()],
            cwd: tmp.path().to_path_buf(),
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ConsoleLine>) -> Vec<ConsoleLine> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn interactive_reports_exit_code() {
        let tmp = TempDir::new().unwrap();
        let outcome = run(&sh(&tmp, "exit 3"), IoContract::Interactive, "t", None, None)
            .await
            .unwrap();
        match outcome {
            LaunchOutcome::Exited(report) => assert_eq!(report.code, Some(3)),
            LaunchOutcome::Running(_) => panic!("interactive launch must block"),
        }
    }

    #[tokio::test]
    async fn probe_sends_stop_on_ready_line() {
        let tmp = TempDir::new().unwrap();
        let script = r#"echo 'Preparing level "world"'
echo 'Done (0.42s)! For help, type "help"'
read cmd
if [ "$cmd" = stop ]; then exit 0; else exit 5; fi"#;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let outcome = run(&sh(&tmp, script), IoContract::ProbeInit, "t", Some(tx), None)
            .await
            .unwrap();
        let LaunchOutcome::Exited(report) = outcome else {
            panic!("probe must block");
        };
        assert_eq!(report.code, Some(0));
        assert!(report.reached_ready);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn probe_without_ready_line_reports_it() {
        let tmp = TempDir::new().unwrap();
        let outcome = run(&sh(&tmp, "echo crash; exit 1"), IoContract::ProbeInit, "t", None, None)
            .await
            .unwrap();
        let LaunchOutcome::Exited(report) = outcome else {
            panic!("probe must block");
        };
        assert_eq!(report.code, Some(1));
        assert!(!report.reached_ready);
    }

    #[tokio::test]
    async fn streamed_log_forwards_both_streams_and_accepts_commands() {
        let tmp = TempDir::new().unwrap();
        let script = r#"echo 'Done (1.0s)! For help, type "help"'
echo warn-line 1>&2
while read cmd; do
  echo "got $cmd"
  if [ "$cmd" = stop ]; then exit 0; fi
done
exit 9"#;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut server = run(&sh(&tmp, script), IoContract::StreamedLog, "t", Some(tx), None)
            .await
            .unwrap()
            .into_running()
            .unwrap();
        assert!(server.pid().is_some());

        server.send_command("list").await.unwrap();
        let report = server.stop(Duration::from_secs(10)).await.unwrap();
        assert_eq!(report.code, Some(0));
        assert!(report.reached_ready);

        let lines = drain(&mut rx);
        let stdout: Vec<_> = lines
            .iter()
            .filter(|l| l.stream == ConsoleStream::Stdout)
            .map(|l| l.line.as_str())
            .collect();
        assert!(stdout.contains(&"got list"));
        assert!(stdout.contains(&"got stop"));
        assert!(lines
            .iter()
            .any(|l| l.stream == ConsoleStream::Stderr && l.line == "warn-line"));
    }

    #[tokio::test]
    async fn stop_kills_after_grace_period() {
        let tmp = TempDir::new().unwrap();
        let script = "trap '' TERM; while true; do sleep 1; done";

        let server = run(&sh(&tmp, script), IoContract::HeadlessDiscard, "t", None, None)
            .await
            .unwrap()
            .into_running()
            .unwrap();

        let report = server.stop(Duration::from_millis(200)).await.unwrap();
        assert_eq!(report.code, None);
        assert!(!report.reached_ready);
    }

    #[tokio::test]
    async fn missing_runtime_is_runtime_not_found() {
        let tmp = TempDir::new().unwrap();
        let cmd = LaunchCommand {
            program: PathBuf::from("/definitely/not/here/java"),
            args: vec![],
            cwd: tmp.path().to_path_buf(),
        };
        let err = run(&cmd, IoContract::Interactive, "t", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::RuntimeNotFound(_)));
    }

    #[tokio::test]
    async fn pack_server_is_stopped_when_process_exits() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("pack.zip");
        std::fs::write(&file, b"pack").unwrap();
        let pack = ResourcePackServer::start(file, "127.0.0.1", 0).await.unwrap();
        let addr = pack.local_addr();

        let report = run(&sh(&tmp, "exit 0"), IoContract::StreamedLog, "t", None, Some(pack))
            .await
            .unwrap()
            .into_running()
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(report.success());
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
