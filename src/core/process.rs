//! Child process host
//!
//! Spawns a program with redirected stdin/stdout/stderr and exposes its
//! streams without blocking: reader threads push output chunks into
//! channels, and the owner drains whatever has arrived on each poll. Input
//! goes the other way through a writer thread.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// How long to wait for output pipes to close after the process exited.
/// Grandchildren may keep them open indefinitely.
const EXIT_GRACE: Duration = Duration::from_millis(200);

/// How long a dropped child may take to exit after SIGTERM before it is
/// killed outright.
const STOP_GRACE: Duration = Duration::from_millis(300);

/// Everything needed to launch a program
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Program followed by its arguments
    pub argv: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Overrides applied on top of the current environment
    pub env: Vec<(String, String)>,
}

impl SpawnRequest {
    /// Build a request from a command line, an optional working directory
    /// (empty for none) and `KEY=VALUE` overrides. Entries without `=` are
    /// ignored.
    pub fn new(program: &str, working_dir: &str, env: &[String]) -> Self {
        let env = env
            .iter()
            .filter_map(|entry| {
                let (key, value) = entry.split_once('=')?;
                Some((key.to_string(), value.to_string()))
            })
            .collect();
        Self {
            argv: split_command_line(program),
            working_dir: (!working_dir.is_empty()).then(|| PathBuf::from(working_dir)),
            env,
        }
    }
}

/// Spawns child processes
pub trait ProcessHost {
    type Child: ChildHandle;

    fn spawn(&mut self, request: &SpawnRequest) -> io::Result<Self::Child>;
}

/// A running child process with redirected streams
pub trait ChildHandle {
    fn id(&self) -> u32;

    /// Append stdout bytes available right now to `out`. Never blocks.
    fn read_stdout(&mut self, out: &mut Vec<u8>) -> bool;

    /// Append stderr bytes available right now to `out`. Never blocks.
    fn read_stderr(&mut self, out: &mut Vec<u8>) -> bool;

    fn write_stdin(&mut self, data: &[u8]) -> io::Result<()>;

    /// Ask the process to terminate
    fn terminate(&mut self) -> io::Result<()>;

    /// Exit code once the process has finished. Never blocks.
    fn poll_exit(&mut self) -> Option<i32>;
}

/// Host backed by `std::process`
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalHost;

impl ProcessHost for LocalHost {
    type Child = LocalChild;

    fn spawn(&mut self, request: &SpawnRequest) -> io::Result<LocalChild> {
        let (program, args) = request
            .argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().map(StdinWriter::spawn).transpose()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stderr not captured"))?;

        let stdout = StreamReader::spawn(stdout, "stdout")?;
        let stderr = StreamReader::spawn(stderr, "stderr")?;
        debug!("Spawned {:?} as pid {}", request.argv, child.id());

        Ok(LocalChild {
            child,
            stdin,
            stdout,
            stderr,
            exited: None,
            terminating: false,
        })
    }
}

/// Background reader for one output pipe
struct StreamReader {
    rx: Receiver<Vec<u8>>,
    closed: bool,
}

impl StreamReader {
    fn spawn<R: Read + Send + 'static>(mut source: R, name: &str) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        thread::Builder::new()
            .name(format!("child-{}", name))
            .spawn(move || {
                let mut buffer = vec![0u8; 4096];
                loop {
                    match source.read(&mut buffer) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buffer[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            })?;
        Ok(Self { rx, closed: false })
    }

    fn drain(&mut self, out: &mut Vec<u8>) -> bool {
        let before = out.len();
        loop {
            match self.rx.try_recv() {
                Ok(data) => out.extend_from_slice(&data),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        out.len() > before
    }
}

/// Background writer for the input pipe
struct StdinWriter {
    tx: Sender<Vec<u8>>,
}

impl StdinWriter {
    fn spawn(mut sink: ChildStdin) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        thread::Builder::new()
            .name("child-stdin".to_string())
            .spawn(move || {
                // Ends when the sender is dropped or the pipe breaks
                for data in rx {
                    if sink.write_all(&data).and_then(|_| sink.flush()).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self { tx })
    }

    fn send(&self, data: &[u8]) -> io::Result<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stdin is closed"))
    }
}

/// Child spawned by [`LocalHost`]
pub struct LocalChild {
    child: Child,
    stdin: Option<StdinWriter>,
    stdout: StreamReader,
    stderr: StreamReader,
    /// Exit code and when it was observed
    exited: Option<(i32, Instant)>,
    /// SIGTERM already sent
    terminating: bool,
}

impl ChildHandle for LocalChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn read_stdout(&mut self, out: &mut Vec<u8>) -> bool {
        self.stdout.drain(out)
    }

    fn read_stderr(&mut self, out: &mut Vec<u8>) -> bool {
        self.stderr.drain(out)
    }

    fn write_stdin(&mut self, data: &[u8]) -> io::Result<()> {
        self.stdin
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin is closed"))?
            .send(data)
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.stdin.take();
        if !self.is_running() {
            return Ok(());
        }
        self.terminating = true;
        send_terminate(&mut self.child)
    }

    fn poll_exit(&mut self) -> Option<i32> {
        let (code, at) = match self.exited {
            Some(exited) => exited,
            None => {
                let code = match self.child.try_wait() {
                    Ok(Some(status)) => exit_code(status),
                    Ok(None) => return None,
                    Err(e) => {
                        warn!("Failed to query process {}: {}", self.child.id(), e);
                        -1
                    }
                };
                let exited = (code, Instant::now());
                self.exited = Some(exited);
                exited
            }
        };

        // Report once the remaining output has been delivered
        let streams_closed = self.stdout.closed && self.stderr.closed;
        (streams_closed || at.elapsed() >= EXIT_GRACE).then_some(code)
    }
}

impl LocalChild {
    /// Not yet reaped. A pid that was already reaped may belong to another
    /// process, so it must not be signalled.
    fn is_running(&mut self) -> bool {
        if self.exited.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exited = Some((exit_code(status), Instant::now()));
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    fn wait_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_running() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for LocalChild {
    fn drop(&mut self) {
        self.stdin.take();
        if self.is_running() {
            if !self.terminating {
                if let Err(e) = send_terminate(&mut self.child) {
                    debug!("SIGTERM to pid {} failed: {}", self.child.id(), e);
                }
            }
            if !self.wait_exit(STOP_GRACE) {
                warn!("pid {} ignored SIGTERM, killing", self.child.id());
                let _ = self.child.kill();
            }
        }
        // Reap; the reader threads finish on their own once the pipes close
        let _ = self.child.wait();
    }
}

/// Ask the child to exit, letting it run its cleanup
#[cfg(unix)]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> io::Result<()> {
    match child.kill() {
        // Already exited
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Split a command line into arguments.
///
/// Whitespace separates arguments. Single quotes keep everything literally,
/// double quotes allow `\` escapes, and `\` outside quotes escapes the next
/// character.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match quote {
            Some('\'') => {
                if ch == '\'' {
                    quote = None;
                } else {
                    current.push(ch);
                }
            }
            Some(q) => {
                if ch == q {
                    quote = None;
                } else if ch == '\\' {
                    current.push(chars.next().unwrap_or('\\'));
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_arg = true;
                }
                '\\' => {
                    current.push(chars.next().unwrap_or('\\'));
                    in_arg = true;
                }
                c if c.is_whitespace() => {
                    if in_arg {
                        args.push(std::mem::take(&mut current));
                        in_arg = false;
                    }
                }
                c => {
                    current.push(c);
                    in_arg = true;
                }
            },
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

/// Join arguments into a command line that [`split_command_line`] restores
pub fn join_command_line(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            let plain = !arg.is_empty()
                && !arg
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\'));
            if plain {
                arg.clone()
            } else {
                let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
