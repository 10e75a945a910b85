//! Persist a generated script and run it under a wall-clock budget.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    time::timeout,
};
use tracing::{debug, warn};

use super::ExecutionOutcome;
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    /// Interpreter binary, resolved through `PATH` when not absolute.
    pub interpreter: PathBuf,
    /// Arguments placed before the script path, e.g. `run -n env python` for conda.
    pub interpreter_args: Vec<String>,
    pub work_dir: PathBuf,
    pub script_name: String,
    pub timeout: Duration,
}

impl ScriptRunner {
    pub fn new(interpreter: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            interpreter_args: Vec::new(),
            work_dir: work_dir.into(),
            script_name: "test.py".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let interpreter = cfg.get_path("PYTHON_INTERPRETER").unwrap_or_else(|| PathBuf::from("python"));
        let mut runner = Self::new(interpreter, cfg.work_dir());
        runner.interpreter_args = cfg.interpreter_args();
        if let Some(name) = cfg.get("SCRIPT_NAME") {
            runner.script_name = name;
        }
        if let Some(secs) = cfg.get_u64("EXEC_TIMEOUT") {
            runner.timeout = Duration::from_secs(secs);
        }
        runner
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }

    pub fn script_path(&self) -> PathBuf {
        self.work_dir.join(&self.script_name)
    }

    /// Create the work dir if needed and overwrite the script file.
    /// Returns the absolute script path.
    pub fn write_script(&self, code: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("creating work dir: {}", self.work_dir.display()))?;
        let path = self.script_path();
        fs::write(&path, code).with_context(|| format!("writing script: {}", path.display()))?;
        fs::canonicalize(&path).with_context(|| format!("resolving script path: {}", path.display()))
    }

    /// Run `script` with the work dir as cwd. Never fails; problems become
    /// [`ExecutionOutcome::Error`].
    pub async fn run(&self, script: &Path) -> ExecutionOutcome {
        match self.try_run(script).await {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::Error { message: format!("{:#}", e) },
        }
    }

    async fn try_run(&self, script: &Path) -> Result<ExecutionOutcome> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.interpreter_args)
            .arg(script)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        // own group, so a timeout takes down wrappers' children too
        #[cfg(unix)]
        cmd.process_group(0);
        let capture = capture::Capture::attach(&mut cmd).context("failed to set up output pipe")?;

        debug!(interpreter = %self.interpreter.display(), script = %script.display(), "spawning script");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn interpreter {}", self.interpreter.display()))?;
        // release the parent's copies of the write ends so reads reach EOF
        drop(cmd);
        let pid = child.id();
        let reader = capture.reader(&mut child).context("failed to read script output")?;

        // the budget covers the exit and the draining of every output holder
        let finished = timeout(self.timeout, async {
            let (status, output) = tokio::join!(child.wait(), reader.read_all());
            Ok::<_, anyhow::Error>((
                status.context("failed to wait for script")?,
                output.context("failed to read script output")?,
            ))
        })
        .await;

        let (status, output) = match finished {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "script timed out, killing it");
                terminate(&mut child, pid).await;
                return Ok(ExecutionOutcome::Timeout { after: self.timeout });
            }
        };
        debug!(code = ?status.code(), bytes = output.len(), "script finished");

        if status.success() {
            Ok(ExecutionOutcome::Success { output })
        } else {
            Ok(ExecutionOutcome::Failed { code: status.code(), output })
        }
    }
}

#[cfg_attr(not(unix), allow(unused_variables))]
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // process_group(0) makes the group id equal to the child's pid
        // SAFETY: killpg only sends a signal; no memory is touched.
        if unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) } == -1 {
            warn!(error = %std::io::Error::last_os_error(), "failed to kill process group");
        }
    }
    // reaps the leader; errors when it was already reaped
    if let Err(e) = child.kill().await {
        debug!(error = %e, "script already exited");
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut r) = reader {
        r.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// stdout and stderr share one pipe, so output keeps the order it was written in.
#[cfg(unix)]
mod capture {
    use std::{
        io,
        os::fd::{AsRawFd, FromRawFd, OwnedFd},
        process::Stdio,
    };

    use tokio::{
        net::unix::pipe,
        process::{Child, Command},
    };

    use super::drain;

    pub struct Capture {
        read: OwnedFd,
    }

    impl Capture {
        pub fn attach(cmd: &mut Command) -> io::Result<Self> {
            let (read, write) = cloexec_pipe()?;
            cmd.stdout(Stdio::from(write.try_clone()?)).stderr(Stdio::from(write));
            Ok(Self { read })
        }

        pub fn reader(self, _child: &mut Child) -> io::Result<OutputReader> {
            Ok(OutputReader { rx: pipe::Receiver::from_owned_fd(self.read)? })
        }
    }

    pub struct OutputReader {
        rx: pipe::Receiver,
    }

    impl OutputReader {
        pub async fn read_all(self) -> io::Result<String> {
            let bytes = drain(Some(self.rx)).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: `fds` has room for the two descriptors pipe(2) writes.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: both descriptors were just created and are owned by nobody else.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        for fd in [&read, &write] {
            // SAFETY: valid descriptor, only its flags are changed.
            if unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok((read, write))
    }
}

/// Two pipes, stdout first then stderr.
#[cfg(not(unix))]
mod capture {
    use std::{io, process::Stdio};

    use tokio::process::{Child, ChildStderr, ChildStdout, Command};

    use super::drain;

    pub struct Capture;

    impl Capture {
        pub fn attach(cmd: &mut Command) -> io::Result<Self> {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            Ok(Self)
        }

        pub fn reader(self, child: &mut Child) -> io::Result<OutputReader> {
            Ok(OutputReader { stdout: child.stdout.take(), stderr: child.stderr.take() })
        }
    }

    pub struct OutputReader {
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
    }

    impl OutputReader {
        pub async fn read_all(self) -> io::Result<String> {
            let (out, err) = tokio::try_join!(drain(self.stdout), drain(self.stderr))?;
            Ok(combine_output(&out, &err))
        }
    }

    pub(super) fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
        let mut body = String::from_utf8_lossy(stdout).into_owned();
        if !stderr.is_empty() {
            if !body.is_empty() && !body.ends_with('\n') {
                body.push('\n');
            }
            body.push_str(&String::from_utf8_lossy(stderr));
        }
        body
    }
}
