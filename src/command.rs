//! Type-safe external command execution.
//!
//! Commands are described by structs implementing [`CommandArgs`] and started
//! through a [`CommandLauncher`]. The launcher is the seam tests replace with
//! a recording fake; production uses [`SystemLauncher`].

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use nix::unistd::Pid;

/// Typed arguments for an external command.
///
/// # Contract
///
/// - `program()`: absolute path of the binary to run.
/// - `to_cli_args()`: arguments exactly as the program expects them.
pub trait CommandArgs {
    fn program(&self) -> &Path;

    fn to_cli_args(&self) -> Vec<String>;

    /// Human readable command line for logs.
    fn display(&self) -> String {
        let mut parts = vec![self.program().display().to_string()];
        parts.extend(self.to_cli_args());
        parts.join(" ")
    }
}

/// Output of a command that was waited for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Starts external commands.
pub trait CommandLauncher: Send + Sync {
    /// Start the command and return as soon as it is running.
    ///
    /// Only a failure to start is reported. The exit status is collected in
    /// the background and logged.
    fn spawn_detached(&self, program: &Path, args: &[String]) -> io::Result<()>;

    /// Start the command and wait for it to finish.
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput>;
}

/// [`CommandLauncher`] that runs real processes, each in its own process group.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    fn command(program: &Path, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).in_new_process_group();
        cmd
    }
}

impl CommandLauncher for SystemLauncher {
    fn spawn_detached(&self, program: &Path, args: &[String]) -> io::Result<()> {
        let child = Self::command(program, args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        tracing::debug!("Started {} {:?} as PID {}", program.display(), args, child.id());

        let program = program.to_path_buf();
        std::thread::spawn(move || reap(program, child));
        Ok(())
    }

    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        tracing::debug!("Running {} {:?}", program.display(), args);
        let output = Self::command(program, args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            success: output.status.success(),
        })
    }
}

/// Wait for a detached child so it does not linger as a zombie.
fn reap(program: PathBuf, child: Child) {
    let pid = child.id();
    match child.wait_with_output() {
        Ok(output) if output.status.success() => {
            tracing::debug!("{} (PID {}) finished", program.display(), pid);
        }
        Ok(output) => {
            tracing::warn!(
                "{} (PID {}) failed with exit code {}: {}",
                program.display(),
                pid,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Err(e) => tracing::warn!("Failed waiting for {} (PID {}): {}", program.display(), pid, e),
    }
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Configure the command to run in its own process group, out of reach
    /// of terminal signals aimed at the agent.
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(io::Error::from)
            });
        }
        self
    }
}
