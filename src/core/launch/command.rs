use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};

/// How the child's standard streams are wired and whether the launch call
/// blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoContract {
    /// Inherit the terminal; block until exit.
    Interactive,
    /// Capture stdout, send `stop` once the server is ready; block until exit.
    ProbeInit,
    /// Drain stdout/stderr into a sink; return right after spawn.
    StreamedLog,
    /// Discard output, keep stdin for a later `stop`; return right after spawn.
    HeadlessDiscard,
}

impl IoContract {
    /// `nogui` is passed unless a headless launch explicitly asked for the GUI.
    pub fn wants_nogui(self, gui: bool) -> bool {
        !(self == IoContract::HeadlessDiscard && gui)
    }

    pub fn blocks(self) -> bool {
        matches!(self, IoContract::Interactive | IoContract::ProbeInit)
    }

    /// stdin, stdout, stderr.
    pub(crate) fn stdio(self) -> (Stdio, Stdio, Stdio) {
        match self {
            IoContract::Interactive => (Stdio::inherit(), Stdio::inherit(), Stdio::inherit()),
            IoContract::ProbeInit | IoContract::StreamedLog => {
                (Stdio::piped(), Stdio::piped(), Stdio::piped())
            }
            IoContract::HeadlessDiscard => (Stdio::piped(), Stdio::null(), Stdio::null()),
        }
    }
}

/// Fully built command line for one server launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl LaunchCommand {
    /// `<runtime> -Xmx<mem> -Xms<mem> -jar <artifact> [nogui]`
    pub fn server(runtime: PathBuf, memory: &str, artifact: &Path, cwd: &Path, nogui: bool) -> Self {
        let mut args = vec![
            format!("-Xmx{memory}"),
            format!("-Xms{memory}"),
            "-jar".to_string(),
            artifact.to_string_lossy().into_owned(),
        ];
        if nogui {
            args.push("nogui".into());
        }
        Self {
            program: runtime,
            args,
            cwd: cwd.to_path_buf(),
        }
    }

    pub(crate) fn to_command(&self, contract: IoContract) -> tokio::process::Command {
        let (stdin, stdout, stderr) = contract.stdio();
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr);
        cmd
    }

    /// Shell-ish rendering for logs. Arguments with spaces are quoted.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|part| {
                if part.contains(' ') {
                    format!("\"{part}\"")
                } else {
                    part
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The dedicated server prints `Done (12.345s)! For help, type "help"` once
/// the world is loaded.
pub fn is_ready_line(line: &str) -> bool {
    line.contains("Done (") && line.contains("For help")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_server_command_line() {
        let cmd = LaunchCommand::server(
            PathBuf::from("java"),
            "4G",
            Path::new("/srv/survival/server-1.21-vanilla.jar"),
            Path::new("/srv/survival"),
            true,
        );
        assert_eq!(
            cmd.args,
            vec!["-Xmx4G", "-Xms4G", "-jar", "/srv/survival/server-1.21-vanilla.jar", "nogui"]
        );
        assert_eq!(cmd.cwd, PathBuf::from("/srv/survival"));
        assert_eq!(
            cmd.display(),
            "java -Xmx4G -Xms4G -jar /srv/survival/server-1.21-vanilla.jar nogui"
        );
    }

    #[test]
    fn nogui_only_dropped_for_headless_with_gui() {
        assert!(IoContract::Interactive.wants_nogui(true));
        assert!(IoContract::StreamedLog.wants_nogui(true));
        assert!(IoContract::ProbeInit.wants_nogui(true));
        assert!(IoContract::HeadlessDiscard.wants_nogui(false));
        assert!(!IoContract::HeadlessDiscard.wants_nogui(true));
    }

    #[test]
    fn detects_ready_line() {
        assert!(is_ready_line(
            "[12:00:01] [Server thread/INFO]: Done (3.512s)! For help, type \"help\""
        ));
        assert!(!is_ready_line("[12:00:00] [Server thread/INFO]: Preparing level \"world\""));
        assert!(!is_ready_line("Done (3.512s)!"));
    }
}
