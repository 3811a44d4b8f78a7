//! Interactive program terminal
//!
//! Runs one child process at a time. Its stdout/stderr are polled on a
//! timer and inserted into the transcript just before the input region; the
//! user types a line after the input boundary and Enter sends it to the
//! program's stdin.
//!
//! ```text
//! Running: python3 -i\n          <- history (read-only)
//! >>> \n                          <- program output
//! print(1)                       <- input region, from input_start to end
//! ```

use std::io;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::process::{ChildHandle, ProcessHost, SpawnRequest};
use crate::ui::{Key, KeyInput, Style, StyledText};

const BANNER: &str = "Terminal - programs run here automatically\n\n";

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("A program is already running in this terminal.")]
    AlreadyRunning,

    #[error("Empty command line")]
    EmptyCommand,

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("No program is running")]
    NotRunning,

    #[error("Failed to write to program input: {0}")]
    Write(#[source] io::Error),
}

/// What the terminal host sees: the capability other components use to run
/// programs in the terminal
pub trait TerminalPanel {
    fn run_program(&mut self, program: &str, working_dir: &str, env: &[String]) -> bool;
    fn clear(&mut self);
    fn is_running(&self) -> bool;
    fn surface(&self) -> &StyledText;
}

/// Whether a key was taken by the terminal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not intercepted; the host may handle it
    Ignored,
    Handled,
}

/// Recurring poll deadline
#[derive(Clone, Copy, Debug)]
pub struct PollTimer {
    interval: Duration,
    next: Option<Instant>,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_active(&self) -> bool {
        self.next.is_some()
    }

    /// True when a tick is due at `now`; schedules the following one
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.next {
            Some(due) if now >= due => {
                self.next = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

/// Incremental UTF-8 decoder that holds back an incomplete trailing sequence
#[derive(Debug, Default)]
struct Utf8Stream {
    pending: Vec<u8>,
}

impl Utf8Stream {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
        out
    }

    /// Whatever is left, decoded lossily
    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Terminal panel running one program at a time
pub struct Terminal<H: ProcessHost> {
    host: H,
    transcript: StyledText,
    process: Option<H::Child>,
    pid: Option<u32>,
    /// Start of the editable input region
    input_start: usize,
    /// Insertion point
    cursor: usize,
    timer: PollTimer,
    stdout: Utf8Stream,
    stderr: Utf8Stream,
    /// User-visible error messages not yet shown
    alerts: Vec<String>,
}

impl<H: ProcessHost> Terminal<H> {
    pub fn new(host: H, poll_interval: Duration) -> Self {
        let mut transcript = StyledText::new();
        let end = transcript.append(Style::Banner, BANNER);
        Self {
            host,
            transcript,
            process: None,
            pid: None,
            input_start: end,
            cursor: end,
            timer: PollTimer::new(poll_interval),
            stdout: Utf8Stream::default(),
            stderr: Utf8Stream::default(),
            alerts: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &StyledText {
        &self.transcript
    }

    pub fn input_start(&self) -> usize {
        self.input_start
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the insertion point (e.g. a mouse click into the history)
    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor = pos.min(self.transcript.len());
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_active()
    }

    pub fn poll_interval(&self) -> Duration {
        self.timer.interval()
    }

    /// Messages that should be shown to the user
    pub fn take_alerts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.alerts)
    }

    pub fn take_scroll_request(&mut self) -> bool {
        self.transcript.take_scroll_request()
    }

    /// Empty the transcript
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.input_start = 0;
        self.cursor = 0;
    }

    /// Launch `program` (a command line) with an optional working directory
    /// and `KEY=VALUE` environment overrides. Returns the process id.
    pub fn start(
        &mut self,
        program: &str,
        working_dir: &str,
        env: &[String],
    ) -> Result<u32, TerminalError> {
        if self.is_running() {
            warn!("Rejected start of {:?}: a program is already running", program);
            let err = TerminalError::AlreadyRunning;
            self.alerts.push(err.to_string());
            return Err(err);
        }

        self.clear();
        self.transcript
            .append(Style::Info, &format!("Running: {}\n", program));
        self.input_start = self.transcript.len();
        self.cursor = self.input_start;
        self.stdout = Utf8Stream::default();
        self.stderr = Utf8Stream::default();

        let request = SpawnRequest::new(program, working_dir, env);
        let spawned = if request.argv.is_empty() {
            Err(TerminalError::EmptyCommand)
        } else {
            self.host
                .spawn(&request)
                .map_err(|source| TerminalError::Spawn {
                    program: program.to_string(),
                    source,
                })
        };

        match spawned {
            Ok(child) => {
                let pid = child.id();
                info!("Started {:?} as pid {}", program, pid);
                self.process = Some(child);
                self.pid = Some(pid);
                self.timer.start(Instant::now());
                Ok(pid)
            }
            Err(e) => {
                warn!("{}", e);
                self.append_line(Style::Failure, "Failed to start program.\n");
                Err(e)
            }
        }
    }

    /// Terminate the running program. Does nothing when idle.
    pub fn stop(&mut self) {
        if let Some(pid) = self.pid.take() {
            self.timer.stop();
            info!("Stopping pid {}", pid);
            if let Some(child) = self.process.as_mut() {
                if let Err(e) = child.terminate() {
                    warn!("Failed to terminate pid {}: {}", pid, e);
                }
            }
        }
        self.process = None;
    }

    /// Timer entry point: polls output when a tick is due and reports exit
    pub fn tick(&mut self, now: Instant) {
        if !self.timer.fire(now) {
            return;
        }
        self.poll();

        let exit = self.process.as_mut().and_then(|child| child.poll_exit());
        if let Some(code) = exit {
            self.on_process_exited(code);
        }
    }

    /// Drain available output into the transcript. Returns true if any
    /// bytes were read.
    pub fn poll(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };

        let mut out = Vec::new();
        let mut err = Vec::new();
        let got_out = child.read_stdout(&mut out);
        let got_err = child.read_stderr(&mut err);

        if got_out {
            let text = self.stdout.decode(&out);
            self.insert_output(Style::Output, &text);
        }
        if got_err {
            let text = self.stderr.decode(&err);
            self.insert_output(Style::Stderr, &text);
        }

        let any = got_out || got_err;
        if any {
            self.transcript.request_scroll_to_end();
        }
        any
    }

    /// The program finished with `exit_code`
    pub fn on_process_exited(&mut self, exit_code: i32) {
        if self.process.is_none() {
            debug!("Ignoring exit notification with no program");
            return;
        }
        self.timer.stop();

        self.poll();
        let out = self.stdout.finish();
        self.insert_output(Style::Output, &out);
        let err = self.stderr.finish();
        self.insert_output(Style::Stderr, &err);

        info!("Program exited with code {}", exit_code);
        self.append_line(
            Style::Exited,
            &format!("\nProgram exited with code {}\n", exit_code),
        );
        self.transcript.request_scroll_to_end();

        self.process = None;
        self.pid = None;
    }

    /// Line editor key handling
    pub fn on_key(&mut self, input: KeyInput) -> KeyOutcome {
        if !self.is_running() {
            return KeyOutcome::Ignored;
        }

        if input.key == Key::Enter {
            if self.cursor >= self.input_start {
                self.send_input_line();
            }
            return KeyOutcome::Handled;
        }

        // History is immutable
        if input.key == Key::Backspace && self.cursor <= self.input_start {
            return KeyOutcome::Handled;
        }

        if self.cursor < self.input_start && !input.ctrl() {
            self.cursor = self.transcript.len();
            return KeyOutcome::Handled;
        }

        if input.ctrl() {
            return KeyOutcome::Ignored;
        }

        match input.key {
            Key::Char(ch) if input.is_printable() => {
                let mut buf = [0u8; 4];
                self.cursor = self
                    .transcript
                    .insert(self.cursor, Style::Typing, ch.encode_utf8(&mut buf));
            }
            Key::Backspace => {
                self.transcript.remove(self.cursor - 1..self.cursor);
                self.cursor -= 1;
            }
            Key::Delete => {
                self.transcript.remove(self.cursor..self.cursor + 1);
            }
            Key::Left => self.cursor = self.cursor.saturating_sub(1),
            Key::Right => self.cursor = (self.cursor + 1).min(self.transcript.len()),
            Key::Home => self.cursor = self.input_start,
            Key::End => self.cursor = self.transcript.len(),
            _ => {}
        }
        KeyOutcome::Handled
    }

    fn send_input_line(&mut self) {
        let mut line = self
            .transcript
            .slice(self.input_start..self.transcript.len());
        line.push('\n');

        if let Err(e) = self.write_to_input(&line) {
            warn!("{}", e);
            self.alerts.push(e.to_string());
        }

        // Echo the line break; the typed text keeps its typing style
        self.transcript.append(Style::Sent, "\n");
        self.input_start = self.transcript.len();
        self.cursor = self.input_start;
    }

    fn write_to_input(&mut self, text: &str) -> Result<(), TerminalError> {
        let child = self.process.as_mut().ok_or(TerminalError::NotRunning)?;
        child
            .write_stdin(text.as_bytes())
            .map_err(TerminalError::Write)
    }

    /// Insert program output before the input region
    fn insert_output(&mut self, style: Style, text: &str) {
        if text.is_empty() {
            return;
        }
        let at = self.input_start;
        self.input_start = self.transcript.insert(at, style, text);
        if self.cursor >= at {
            self.cursor += self.input_start - at;
        }
    }

    /// Append a status line at the end and move the boundary past it
    fn append_line(&mut self, style: Style, text: &str) {
        self.input_start = self.transcript.append(style, text);
        self.cursor = self.input_start;
    }
}

impl<H: ProcessHost> TerminalPanel for Terminal<H> {
    fn run_program(&mut self, program: &str, working_dir: &str, env: &[String]) -> bool {
        self.start(program, working_dir, env).is_ok()
    }

    fn clear(&mut self) {
        Terminal::clear(self);
    }

    fn is_running(&self) -> bool {
        Terminal::is_running(self)
    }

    fn surface(&self) -> &StyledText {
        &self.transcript
    }
}

impl<H: ProcessHost> Drop for Terminal<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::Modifiers;
    use std::cell::RefCell;
    use std::rc::Rc;

    const INTERVAL: Duration = Duration::from_millis(25);

    #[derive(Default)]
    struct Shared {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        stdin: Vec<u8>,
        terminated: bool,
        exit: Option<i32>,
        spawned: Vec<SpawnRequest>,
    }

    #[derive(Clone, Default)]
    struct FakeHost {
        shared: Rc<RefCell<Shared>>,
        fail: bool,
    }

    struct FakeChild {
        shared: Rc<RefCell<Shared>>,
        id: u32,
    }

    impl ProcessHost for FakeHost {
        type Child = FakeChild;

        fn spawn(&mut self, request: &SpawnRequest) -> io::Result<FakeChild> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
            }
            let mut shared = self.shared.borrow_mut();
            shared.spawned.push(request.clone());
            shared.terminated = false;
            shared.exit = None;
            Ok(FakeChild {
                shared: Rc::clone(&self.shared),
                id: 100 + shared.spawned.len() as u32,
            })
        }
    }

    impl ChildHandle for FakeChild {
        fn id(&self) -> u32 {
            self.id
        }

        fn read_stdout(&mut self, out: &mut Vec<u8>) -> bool {
            let data = std::mem::take(&mut self.shared.borrow_mut().stdout);
            out.extend_from_slice(&data);
            !data.is_empty()
        }

        fn read_stderr(&mut self, out: &mut Vec<u8>) -> bool {
            let data = std::mem::take(&mut self.shared.borrow_mut().stderr);
            out.extend_from_slice(&data);
            !data.is_empty()
        }

        fn write_stdin(&mut self, data: &[u8]) -> io::Result<()> {
            self.shared.borrow_mut().stdin.extend_from_slice(data);
            Ok(())
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.shared.borrow_mut().terminated = true;
            Ok(())
        }

        fn poll_exit(&mut self) -> Option<i32> {
            self.shared.borrow().exit
        }
    }

    fn running() -> (Terminal<FakeHost>, Rc<RefCell<Shared>>) {
        let host = FakeHost::default();
        let shared = Rc::clone(&host.shared);
        let mut terminal = Terminal::new(host, INTERVAL);
        terminal.start("prog --flag", "", &[]).unwrap();
        (terminal, shared)
    }

    fn type_text(terminal: &mut Terminal<FakeHost>, text: &str) {
        for ch in text.chars() {
            assert_eq!(terminal.on_key(KeyInput::new(Key::Char(ch))), KeyOutcome::Handled);
        }
    }

    #[test]
    fn test_start_writes_running_line() {
        let (terminal, shared) = running();

        assert_eq!(terminal.transcript().text(), "Running: prog --flag\n");
        assert_eq!(terminal.transcript().style_at(0), Some(Style::Info));
        assert_eq!(terminal.input_start(), terminal.transcript().len());
        assert!(terminal.is_running());
        assert!(terminal.is_polling());
        assert_eq!(terminal.pid(), Some(101));
        assert_eq!(shared.borrow().spawned[0].argv, vec!["prog", "--flag"]);
    }

    #[test]
    fn test_start_passes_environment_and_directory() {
        let host = FakeHost::default();
        let shared = Rc::clone(&host.shared);
        let mut terminal = Terminal::new(host, INTERVAL);
        terminal
            .start("make", "/tmp/build", &["CC=clang".to_string()])
            .unwrap();

        let shared = shared.borrow();
        let spawned = &shared.spawned[0];
        assert_eq!(spawned.working_dir, Some("/tmp/build".into()));
        assert_eq!(spawned.env, vec![("CC".to_string(), "clang".to_string())]);
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let (mut terminal, shared) = running();
        let before = terminal.transcript().text();

        let result = terminal.start("other", "", &[]);
        assert!(matches!(result, Err(TerminalError::AlreadyRunning)));
        assert!(!terminal.run_program("other", "", &[]));

        assert_eq!(terminal.transcript().text(), before);
        assert_eq!(shared.borrow().spawned.len(), 1);
        assert!(terminal.is_polling());
        assert_eq!(terminal.pid(), Some(101));
        assert_eq!(terminal.take_alerts().len(), 2);

        // The first program still gets polled
        shared.borrow_mut().stdout.extend_from_slice(b"still here\n");
        assert!(terminal.poll());
        assert!(terminal.transcript().text().ends_with("still here\n"));
    }

    #[test]
    fn test_spawn_failure_returns_to_idle() {
        let host = FakeHost {
            fail: true,
            ..FakeHost::default()
        };
        let mut terminal = Terminal::new(host, INTERVAL);

        let result = terminal.start("missing", "", &[]);
        assert!(matches!(result, Err(TerminalError::Spawn { .. })));
        assert_eq!(
            terminal.transcript().text(),
            "Running: missing\nFailed to start program.\n"
        );
        assert!(!terminal.is_running());
        assert!(!terminal.is_polling());
    }

    #[test]
    fn test_empty_command_fails() {
        let mut terminal = Terminal::new(FakeHost::default(), INTERVAL);
        assert!(matches!(
            terminal.start("   ", "", &[]),
            Err(TerminalError::EmptyCommand)
        ));
        assert!(!terminal.is_running());
    }

    #[test]
    fn test_backspace_at_boundary_is_noop() {
        let (mut terminal, _) = running();
        let len = terminal.transcript().len();

        assert_eq!(terminal.on_key(KeyInput::new(Key::Backspace)), KeyOutcome::Handled);
        assert_eq!(terminal.transcript().len(), len);
    }

    #[test]
    fn test_stdout_is_inserted_before_boundary() {
        let (mut terminal, shared) = running();
        let boundary = terminal.input_start();

        shared.borrow_mut().stdout.extend_from_slice(b"ok\n");
        assert!(terminal.poll());

        assert_eq!(terminal.input_start(), boundary + 3);
        assert_eq!(terminal.transcript().slice(boundary..boundary + 3), "ok\n");
        assert_eq!(terminal.transcript().style_at(boundary), Some(Style::Output));
        assert!(terminal.take_scroll_request());
    }

    #[test]
    fn test_output_lands_before_typed_input() {
        let (mut terminal, shared) = running();
        type_text(&mut terminal, "ab");

        shared.borrow_mut().stdout.extend_from_slice(b"x\n");
        shared.borrow_mut().stderr.extend_from_slice(b"warn\n");
        terminal.poll();

        let text = terminal.transcript().text();
        assert_eq!(text, "Running: prog --flag\nx\nwarn\nab");
        let boundary = terminal.input_start();
        assert_eq!(terminal.transcript().slice(boundary..text.len()), "ab");
        assert_eq!(terminal.cursor(), terminal.transcript().len());
        assert_eq!(terminal.transcript().style_at(boundary - 2), Some(Style::Stderr));
    }

    #[test]
    fn test_enter_sends_line() {
        let (mut terminal, shared) = running();
        let start = terminal.input_start();
        type_text(&mut terminal, "hi");
        terminal.on_key(KeyInput::new(Key::Enter));

        assert_eq!(shared.borrow().stdin, b"hi\n");
        let transcript = terminal.transcript();
        assert_eq!(transcript.slice(start..transcript.len()), "hi\n");
        assert_eq!(transcript.style_at(start), Some(Style::Typing));
        assert_eq!(transcript.style_at(start + 2), Some(Style::Sent));
        assert_eq!(terminal.input_start(), transcript.len());
    }

    #[test]
    fn test_line_editing() {
        let (mut terminal, shared) = running();
        type_text(&mut terminal, "helo");
        terminal.on_key(KeyInput::new(Key::Left));
        type_text(&mut terminal, "l");
        terminal.on_key(KeyInput::new(Key::Home));
        terminal.on_key(KeyInput::new(Key::Delete));
        terminal.on_key(KeyInput::new(Key::End));
        terminal.on_key(KeyInput::new(Key::Backspace));
        terminal.on_key(KeyInput::new(Key::Enter));

        assert_eq!(shared.borrow().stdin, b"ell\n");
    }

    #[test]
    fn test_edit_before_boundary_is_redirected() {
        let (mut terminal, _) = running();
        let before = terminal.transcript().text();
        terminal.set_cursor(3);

        assert_eq!(terminal.on_key(KeyInput::new(Key::Char('x'))), KeyOutcome::Handled);
        assert_eq!(terminal.transcript().text(), before);
        assert_eq!(terminal.cursor(), terminal.transcript().len());

        // Typing now continues at the end
        type_text(&mut terminal, "x");
        assert!(terminal.transcript().text().ends_with("\nx"));
    }

    #[test]
    fn test_ctrl_before_boundary_is_not_redirected() {
        let (mut terminal, _) = running();
        terminal.set_cursor(3);

        let copy = KeyInput::with_mods(Key::Char('c'), Modifiers::CTRL);
        assert_eq!(terminal.on_key(copy), KeyOutcome::Ignored);
        assert_eq!(terminal.cursor(), 3);
    }

    #[test]
    fn test_idle_keys_are_not_intercepted() {
        let mut terminal = Terminal::new(FakeHost::default(), INTERVAL);
        let before = terminal.transcript().text();

        assert_eq!(terminal.on_key(KeyInput::new(Key::Char('a'))), KeyOutcome::Ignored);
        assert_eq!(terminal.on_key(KeyInput::new(Key::Backspace)), KeyOutcome::Ignored);
        assert_eq!(terminal.transcript().text(), before);
    }

    #[test]
    fn test_exit_reports_status_and_allows_restart() {
        let (mut terminal, shared) = running();
        shared.borrow_mut().stdout.extend_from_slice(b"bye\n");

        terminal.on_process_exited(0);

        let text = terminal.transcript().text();
        assert!(text.contains("bye\n"));
        let status_lines: Vec<&str> = text.lines().filter(|l| l.contains("exited")).collect();
        assert_eq!(status_lines, vec!["Program exited with code 0"]);
        assert!(text.find("bye").unwrap() < text.find("exited").unwrap());
        assert!(!terminal.is_running());
        assert!(!terminal.is_polling());

        assert!(terminal.start("again", "", &[]).is_ok());
        assert!(terminal.is_running());
    }

    #[test]
    fn test_tick_polls_and_detects_exit() {
        let (mut terminal, shared) = running();
        let now = Instant::now();

        shared.borrow_mut().stdout.extend_from_slice(b"1\n");
        terminal.tick(now + INTERVAL * 2);
        assert!(terminal.transcript().text().ends_with("1\n"));

        shared.borrow_mut().stdout.extend_from_slice(b"2\n");
        shared.borrow_mut().exit = Some(2);
        terminal.tick(now + INTERVAL * 4);

        let text = terminal.transcript().text();
        assert!(text.ends_with("2\n\nProgram exited with code 2\n"));
        assert!(!terminal.is_running());
    }

    #[test]
    fn test_stop_is_idempotent_and_halts_polling() {
        let (mut terminal, shared) = running();
        terminal.stop();

        assert!(shared.borrow().terminated);
        assert!(!terminal.is_running());
        assert!(!terminal.is_polling());

        let len = terminal.transcript().len();
        shared.borrow_mut().stdout.extend_from_slice(b"late\n");
        terminal.tick(Instant::now() + INTERVAL * 10);
        assert_eq!(terminal.transcript().len(), len);

        terminal.stop();
        terminal.on_process_exited(0);
        assert_eq!(terminal.transcript().len(), len);
    }

    #[test]
    fn test_utf8_split_across_polls() {
        let (mut terminal, shared) = running();
        let boundary = terminal.input_start();

        shared.borrow_mut().stdout.extend_from_slice(&[b'a', 0xc3]);
        terminal.poll();
        assert_eq!(terminal.input_start(), boundary + 1);

        shared.borrow_mut().stdout.push(0xa9);
        terminal.poll();
        assert_eq!(terminal.transcript().slice(boundary..boundary + 2), "aé");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut stream = Utf8Stream::default();
        assert_eq!(stream.decode(&[b'a', 0xff, b'b']), "a\u{fffd}b");
        assert_eq!(stream.decode(&[0xe2, 0x82]), "");
        assert_eq!(stream.finish(), "\u{fffd}");
    }

    #[test]
    fn test_clear_resets_boundary() {
        let (mut terminal, _) = running();
        type_text(&mut terminal, "abc");
        terminal.clear();

        assert!(terminal.transcript().is_empty());
        assert_eq!(terminal.input_start(), 0);
        assert_eq!(terminal.cursor(), 0);
        // Still running: typing works from the start
        type_text(&mut terminal, "z");
        assert_eq!(terminal.transcript().text(), "z");
    }

    #[test]
    fn test_poll_timer() {
        let mut timer = PollTimer::new(INTERVAL);
        let now = Instant::now();
        assert!(!timer.fire(now + INTERVAL));

        timer.start(now);
        assert!(!timer.fire(now));
        assert!(timer.fire(now + INTERVAL));
        assert!(!timer.fire(now + INTERVAL));

        timer.stop();
        assert!(!timer.fire(now + INTERVAL * 10));
    }

    #[test]
    #[cfg(unix)]
    fn test_local_program_runs_to_completion() {
        use crate::core::process::LocalHost;

        let mut terminal = Terminal::new(LocalHost, Duration::from_millis(1));
        terminal
            .start("/bin/echo 'Hello from the terminal'", "", &[])
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while terminal.is_running() {
            assert!(Instant::now() < deadline, "program did not finish");
            std::thread::sleep(Duration::from_millis(5));
            terminal.tick(Instant::now());
        }

        let text = terminal.transcript().text();
        assert!(text.contains("Hello from the terminal\n"));
        assert!(text.ends_with("Program exited with code 0\n"));
    }

    #[test]
    #[cfg(unix)]
    fn test_stop_delivers_sigterm() {
        use crate::core::process::LocalHost;

        let marker = std::env::temp_dir().join(format!("memterm-stop-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let env = vec![format!("MARKER={}", marker.display())];

        let mut terminal = Terminal::new(LocalHost, Duration::from_millis(1));
        terminal
            .start(
                "sh -c 'trap \"echo stopped > $MARKER; exit 0\" TERM; echo ready; while :; do sleep 0.05; done'",
                "",
                &env,
            )
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !terminal.transcript().text().contains("ready\n") {
            assert!(Instant::now() < deadline, "program did not start");
            std::thread::sleep(Duration::from_millis(5));
            terminal.tick(Instant::now());
        }

        terminal.stop();
        assert!(!terminal.is_running());

        let contents = std::fs::read_to_string(&marker).unwrap_or_default();
        let _ = std::fs::remove_file(&marker);
        assert_eq!(contents, "stopped\n");
    }
}
