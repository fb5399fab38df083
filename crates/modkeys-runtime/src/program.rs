#![forbid(unsafe_code)]

//! Elm-style runtime loop with in-band capability negotiation.
//!
//! The program owns the application model, the terminal writer and the
//! [`NegotiationState`]. One input thread decodes terminal bytes and
//! background tasks compute messages; both feed a single inbound queue
//! that the update loop drains one item at a time.
//!
//! # Example
//!
//! ```ignore
//! use modkeys_core::event::{InputMsg, ReportingMode};
//! use modkeys_runtime::capability;
//! use modkeys_runtime::program::{Cmd, Model, Program};
//!
//! struct Keys {
//!     mode: Option<ReportingMode>,
//! }
//!
//! enum Msg {
//!     Input(InputMsg),
//! }
//!
//! impl From<InputMsg> for Msg {
//!     fn from(msg: InputMsg) -> Self {
//!         Msg::Input(msg)
//!     }
//! }
//!
//! impl Model for Keys {
//!     type Message = Msg;
//!
//!     fn init(&mut self) -> Cmd<Msg> {
//!         Cmd::batch(vec![
//!             capability::set_reporting_mode(ReportingMode::Extended),
//!             capability::query_reporting_mode(),
//!         ])
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Cmd<Msg> {
//!         match msg {
//!             Msg::Input(InputMsg::ReportingMode(mode)) => self.mode = Some(mode),
//!             Msg::Input(InputMsg::KeyPress(key)) if key.ctrl() && key.is_char('c') => {
//!                 return Cmd::quit();
//!             }
//!             Msg::Input(_) => {}
//!         }
//!         Cmd::none()
//!     }
//! }
//!
//! Program::new(Keys { mode: None })?.run()?;
//! ```
//!
//! # Design Notes
//!
//! - Report messages are settled against the negotiation state after they
//!   are dequeued, on the update thread, never on the input thread.
//! - `Cmd::Request` marks the capability outstanding before the request is
//!   written, so the reply always finds its entry.
//! - Shutdown stops the input thread and drops outstanding negotiation
//!   entries and running tasks without error.

use std::fmt;
use std::io::{self, Stdout, Write};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use modkeys_core::decoder::InputDecoder;
use modkeys_core::event::{InputMsg, ReportingMode};
use modkeys_core::negotiation::{NegotiationState, Settlement};
use modkeys_core::request::TerminalRequest;

use crate::capability;
use crate::error::{Result, RuntimeError};
use crate::input_reader::{ByteSource, InputReader, ReaderConfig, ReaderEvent};
use crate::terminal_writer::TerminalWriter;

/// Environment variable selecting a reporting mode to set at startup.
pub const ENV_REPORTING_MODE: &str = "MODKEYS_REPORTING_MODE";

/// Environment variable enabling a terminal version query at startup.
pub const ENV_QUERY_VERSION: &str = "MODKEYS_QUERY_VERSION";

/// The Model trait defines application state and behavior.
pub trait Model: Sized {
    /// The message type for this model.
    ///
    /// Must be convertible from decoded terminal input.
    type Message: From<InputMsg> + Send + 'static;

    /// Initialize the model with startup commands.
    fn init(&mut self) -> Cmd<Self::Message> {
        Cmd::none()
    }

    /// Update the model in response to a message.
    fn update(&mut self, msg: Self::Message) -> Cmd<Self::Message>;
}

/// Commands represent side effects to be executed by the runtime.
///
/// Commands are inert values: building one does no I/O. The runtime
/// executes them after `init()` or `update()` returns.
pub enum Cmd<M> {
    /// No operation.
    None,
    /// Quit the application.
    Quit,
    /// Execute multiple commands, stopping early on quit.
    Batch(Vec<Cmd<M>>),
    /// Execute commands in order, stopping early on quit.
    Sequence(Vec<Cmd<M>>),
    /// Send a message to the model.
    Msg(M),
    /// Run a blocking closure on a background thread.
    ///
    /// Its return value is delivered as a message.
    Task(Box<dyn FnOnce() -> M + Send>),
    /// Write a sanitized log line to the terminal.
    Log(String),
    /// Write a capability request to the terminal.
    ///
    /// Fire-and-forget: any reply arrives later as an ordinary message.
    Request(TerminalRequest),
}

impl<M: fmt::Debug> fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Quit => write!(f, "Quit"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Sequence(cmds) => f.debug_tuple("Sequence").field(cmds).finish(),
            Self::Msg(m) => f.debug_tuple("Msg").field(m).finish(),
            Self::Task(_) => write!(f, "Task(...)"),
            Self::Log(s) => f.debug_tuple("Log").field(s).finish(),
            Self::Request(r) => f.debug_tuple("Request").field(r).finish(),
        }
    }
}

impl<M> Cmd<M> {
    /// Create a no-op command.
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    /// Create a quit command.
    #[inline]
    pub fn quit() -> Self {
        Self::Quit
    }

    /// Create a message command.
    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    /// Create a log command.
    #[inline]
    pub fn log(msg: impl Into<String>) -> Self {
        Self::Log(msg.into())
    }

    /// Create a capability request command.
    #[inline]
    pub fn request(request: TerminalRequest) -> Self {
        Self::Request(request)
    }

    /// Create a batch of commands.
    pub fn batch(cmds: Vec<Self>) -> Self {
        Self::collapse(cmds, Self::Batch)
    }

    /// Create a sequence of commands.
    pub fn sequence(cmds: Vec<Self>) -> Self {
        Self::collapse(cmds, Self::Sequence)
    }

    fn collapse(mut cmds: Vec<Self>, wrap: fn(Vec<Self>) -> Self) -> Self {
        match cmds.len() {
            0 => Self::None,
            1 => cmds.pop().unwrap_or(Self::None),
            _ => wrap(cmds),
        }
    }

    /// Create a background task command.
    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(Box::new(f))
    }

    /// The request carried by this command, if it is a `Request`.
    #[must_use]
    pub fn as_request(&self) -> Option<TerminalRequest> {
        match self {
            Self::Request(r) => Some(*r),
            _ => None,
        }
    }

    /// Return a stable name for tracing.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Quit => "Quit",
            Self::Batch(_) => "Batch",
            Self::Sequence(_) => "Sequence",
            Self::Msg(_) => "Msg",
            Self::Task(_) => "Task",
            Self::Log(_) => "Log",
            Self::Request(_) => "Request",
        }
    }
}

impl<M> Default for Cmd<M> {
    fn default() -> Self {
        Self::None
    }
}

/// Configuration for the program runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramConfig {
    /// How long the input thread waits before treating input as idle.
    pub poll_timeout: Duration,
    /// Input read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Reporting mode to request before `init()` runs.
    pub startup_reporting_mode: Option<ReportingMode>,
    /// Whether to query the terminal version before `init()` runs.
    pub query_version_on_start: bool,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            read_buffer_size: 1024,
            startup_reporting_mode: None,
            query_version_on_start: false,
        }
    }
}

impl ProgramConfig {
    /// Default configuration with environment overrides applied.
    ///
    /// Reads:
    /// - `MODKEYS_REPORTING_MODE`: `0`, `1` or `2`
    /// - `MODKEYS_QUERY_VERSION`: `1`/`true` or `0`/`false`
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom lookup (for tests).
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = get_env(ENV_REPORTING_MODE) {
            match val.trim().parse::<u32>().ok().and_then(ReportingMode::from_param) {
                Some(mode) => config.startup_reporting_mode = Some(mode),
                None => tracing::warn!(value = %val, "ignoring invalid {ENV_REPORTING_MODE}"),
            }
        }

        if let Some(val) = get_env(ENV_QUERY_VERSION) {
            let val = val.trim();
            if val == "1" || val.eq_ignore_ascii_case("true") {
                config.query_version_on_start = true;
            } else if val == "0" || val.eq_ignore_ascii_case("false") {
                config.query_version_on_start = false;
            } else {
                tracing::warn!(value = %val, "ignoring invalid {ENV_QUERY_VERSION}");
            }
        }

        config
    }

    /// Set the input poll timeout.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the read buffer size (at least one byte).
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Request a reporting mode at startup.
    #[must_use]
    pub fn with_reporting_mode(mut self, mode: ReportingMode) -> Self {
        self.startup_reporting_mode = Some(mode);
        self
    }

    /// Query the terminal version at startup.
    #[must_use]
    pub fn with_version_query(mut self) -> Self {
        self.query_version_on_start = true;
        self
    }

    /// Commands issued before the model's `init()`.
    pub fn startup_cmd<M>(&self) -> Cmd<M> {
        let mut cmds = Vec::new();
        if let Some(mode) = self.startup_reporting_mode {
            cmds.push(capability::set_reporting_mode(mode));
        }
        if self.query_version_on_start {
            cmds.push(capability::query_terminal_version());
        }
        Cmd::sequence(cmds)
    }

    fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            poll_timeout: self.poll_timeout,
            buffer_size: self.read_buffer_size,
        }
    }
}

/// An item on the program's inbound queue.
#[derive(Debug)]
pub enum Inbound<M> {
    /// Decoded terminal input.
    Input(InputMsg),
    /// A message produced by a background task.
    Message(M),
    /// The input source is gone.
    InputClosed,
}

impl<M> From<ReaderEvent> for Inbound<M> {
    fn from(event: ReaderEvent) -> Self {
        match event {
            ReaderEvent::Input(msg) => Self::Input(msg),
            ReaderEvent::Closed => Self::InputClosed,
        }
    }
}

/// Settle a delivered input message against the negotiation state.
pub(crate) fn settle_input(negotiation: &mut NegotiationState, msg: &InputMsg) {
    match negotiation.settle(msg) {
        Some(Settlement::Matched(capability)) => {
            tracing::debug!(
                target: "modkeys.negotiation",
                capability = capability.name(),
                "reply matched outstanding query"
            );
        }
        Some(Settlement::Unsolicited(capability)) => {
            tracing::debug!(
                target: "modkeys.negotiation",
                capability = capability.name(),
                "unsolicited report delivered"
            );
        }
        None => {}
    }
}

/// Record a request in the negotiation state and write it out.
pub(crate) fn issue_request<W: Write>(
    negotiation: &mut NegotiationState,
    writer: &mut TerminalWriter<W>,
    request: TerminalRequest,
) -> io::Result<()> {
    let _span = tracing::debug_span!(
        "modkeys.effect.request",
        request = %request,
        query = request.is_query()
    )
    .entered();
    negotiation.begin(request);
    writer.write_request(request)
}

/// The program runtime that manages the update loop.
pub struct Program<M: Model, W: Write = Stdout> {
    /// The application model.
    model: M,
    /// Terminal output.
    writer: TerminalWriter<W>,
    /// Capability negotiation bookkeeping.
    negotiation: NegotiationState,
    config: ProgramConfig,
    sender: mpsc::Sender<Inbound<M::Message>>,
    receiver: mpsc::Receiver<Inbound<M::Message>>,
    /// Input source, until the reader thread takes it.
    source: Option<Box<dyn ByteSource>>,
    input: Option<InputReader>,
    task_handles: Vec<JoinHandle<()>>,
    running: bool,
}

#[cfg(unix)]
impl<M: Model> Program<M, Stdout> {
    /// Create a program on the controlling terminal with environment config.
    ///
    /// # Errors
    ///
    /// Fails when `/dev/tty` cannot be opened.
    pub fn new(model: M) -> Result<Self> {
        Self::with_config(model, ProgramConfig::from_env())
    }

    /// Create a program on the controlling terminal.
    ///
    /// # Errors
    ///
    /// Fails when `/dev/tty` cannot be opened.
    pub fn with_config(model: M, config: ProgramConfig) -> Result<Self> {
        let source = crate::input_reader::TtySource::open()?;
        Ok(Self::with_source(model, io::stdout(), source, config))
    }
}

impl<M: Model, W: Write> Program<M, W> {
    /// Create a program over an arbitrary input source and output stream.
    pub fn with_source<S>(model: M, out: W, source: S, config: ProgramConfig) -> Self
    where
        S: ByteSource + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        Self {
            model,
            writer: TerminalWriter::new(out),
            negotiation: NegotiationState::new(),
            config,
            sender,
            receiver,
            source: Some(Box::new(source)),
            input: None,
            task_handles: Vec::new(),
            running: true,
        }
    }

    /// Run the main loop until the model quits or input closes.
    ///
    /// 1. Startup capability requests from the config
    /// 2. `init()`
    /// 3. Input thread start
    /// 4. Dequeue, settle, update, execute until quit
    /// 5. Shutdown
    ///
    /// # Errors
    ///
    /// Terminal write failures, a failed thread spawn, or a panicked input
    /// thread.
    pub fn run(&mut self) -> Result<()> {
        {
            let _span = tracing::debug_span!("modkeys.program.init").entered();
            let startup = self.config.startup_cmd();
            self.execute_cmd(startup)?;
            let init = self.model.init();
            self.execute_cmd(init)?;
        }

        if self.running
            && let Some(source) = self.source.take()
        {
            let reader = InputReader::spawn(
                source,
                InputDecoder::new(),
                self.sender.clone(),
                self.config.reader_config(),
            )?;
            self.input = Some(reader);
        }

        let result = self.event_loop();
        let shutdown = self.shutdown();
        result.and(shutdown)
    }

    fn event_loop(&mut self) -> Result<()> {
        while self.running {
            // Program holds a sender, so recv only fails once that is gone.
            let Ok(inbound) = self.receiver.recv() else {
                break;
            };
            self.handle_inbound(inbound)?;
            self.reap_finished_tasks();
        }
        Ok(())
    }

    fn handle_inbound(&mut self, inbound: Inbound<M::Message>) -> Result<()> {
        match inbound {
            Inbound::Input(msg) => {
                settle_input(&mut self.negotiation, &msg);
                let msg_type = msg.kind();
                self.dispatch(M::Message::from(msg), msg_type)
            }
            Inbound::Message(msg) => self.dispatch(msg, "task"),
            Inbound::InputClosed => {
                tracing::info!("terminal input closed; stopping");
                self.running = false;
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, msg: M::Message, msg_type: &'static str) -> Result<()> {
        let span = tracing::debug_span!(
            "modkeys.program.update",
            msg_type,
            cmd_type = tracing::field::Empty
        );
        let cmd = {
            let _guard = span.enter();
            let cmd = self.model.update(msg);
            span.record("cmd_type", cmd.type_name());
            cmd
        };
        self.execute_cmd(cmd)
    }

    /// Execute a command.
    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) -> Result<()> {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.running = false,
            Cmd::Msg(m) => self.dispatch(m, "cmd")?,
            Cmd::Batch(cmds) | Cmd::Sequence(cmds) => {
                for c in cmds {
                    self.execute_cmd(c)?;
                    if !self.running {
                        break;
                    }
                }
            }
            Cmd::Task(f) => {
                let sender = self.sender.clone();
                let handle = std::thread::spawn(move || {
                    let msg = f();
                    let _ = sender.send(Inbound::Message(msg));
                });
                self.task_handles.push(handle);
            }
            Cmd::Log(text) => self.writer.write_log(&text)?,
            Cmd::Request(request) => {
                issue_request(&mut self.negotiation, &mut self.writer, request)?;
            }
        }
        Ok(())
    }

    fn reap_finished_tasks(&mut self) {
        if self.task_handles.is_empty() {
            return;
        }
        let (finished, running): (Vec<_>, Vec<_>) = self
            .task_handles
            .drain(..)
            .partition(JoinHandle::is_finished);
        for handle in finished {
            if handle.join().is_err() {
                tracing::warn!("background task panicked");
            }
        }
        self.task_handles = running;
    }

    fn shutdown(&mut self) -> Result<()> {
        let outstanding: Vec<_> = self.negotiation.outstanding().map(|c| c.name()).collect();
        if !outstanding.is_empty() {
            tracing::debug!(
                target: "modkeys.negotiation",
                ?outstanding,
                "dropping unanswered queries"
            );
        }
        if !self.task_handles.is_empty() {
            tracing::debug!(tasks = self.task_handles.len(), "detaching running tasks");
            self.task_handles.clear();
        }
        // A reader blocked in read() is detached rather than joined.
        let grace = self.config.poll_timeout.saturating_mul(2);
        match self.input.take() {
            Some(reader) => reader
                .stop_within(grace)
                .map(|_| ())
                .map_err(|_| RuntimeError::InputThreadPanicked),
            None => Ok(()),
        }
    }

    /// Get a reference to the model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get a mutable reference to the model.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Capability negotiation state.
    pub fn negotiation(&self) -> &NegotiationState {
        &self.negotiation
    }

    /// The output stream requests and logs are written to.
    pub fn output(&self) -> &W {
        self.writer.get_ref()
    }

    /// The active configuration.
    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Check if the program is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Request the loop to stop after the current message.
    pub fn quit(&mut self) {
        self.running = false;
    }
}

impl<M: Model, W: Write> Drop for Program<M, W> {
    fn drop(&mut self) {
        if let Some(reader) = &self.input {
            reader.signal_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_reader::ReaderSource;
    use modkeys_core::event::{KeyCode, KeyPress};
    use modkeys_core::negotiation::Capability;
    use std::collections::HashMap;
    use std::io::Cursor;

    #[derive(Debug)]
    enum TestMsg {
        Input(InputMsg),
        Computed(u32),
    }

    impl From<InputMsg> for TestMsg {
        fn from(msg: InputMsg) -> Self {
            TestMsg::Input(msg)
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<InputMsg>,
        computed: Vec<u32>,
        init_cmd: Option<fn() -> Cmd<TestMsg>>,
    }

    impl Model for Recorder {
        type Message = TestMsg;

        fn init(&mut self) -> Cmd<TestMsg> {
            self.init_cmd.map_or_else(Cmd::none, |f| f())
        }

        fn update(&mut self, msg: TestMsg) -> Cmd<TestMsg> {
            match msg {
                TestMsg::Input(InputMsg::KeyPress(key)) if key.is_char('q') => Cmd::quit(),
                TestMsg::Input(InputMsg::KeyPress(key)) if key.is_char('t') => {
                    Cmd::task(|| TestMsg::Computed(42))
                }
                TestMsg::Input(msg) => {
                    self.seen.push(msg);
                    Cmd::none()
                }
                TestMsg::Computed(n) => {
                    self.computed.push(n);
                    Cmd::quit()
                }
            }
        }
    }

    fn program(
        model: Recorder,
        input: &[u8],
        config: ProgramConfig,
    ) -> Program<Recorder, Vec<u8>> {
        Program::with_source(
            model,
            Vec::new(),
            ReaderSource::new(Cursor::new(input.to_vec())),
            config,
        )
    }

    #[test]
    fn cmd_constructors() {
        assert!(matches!(Cmd::<TestMsg>::none(), Cmd::None));
        assert!(matches!(Cmd::<TestMsg>::quit(), Cmd::Quit));
        assert!(matches!(Cmd::msg(TestMsg::Computed(1)), Cmd::Msg(_)));
        assert!(matches!(Cmd::<TestMsg>::log("x"), Cmd::Log(_)));
    }

    #[test]
    fn cmd_batch_collapses() {
        assert!(matches!(Cmd::<TestMsg>::batch(vec![]), Cmd::None));
        assert!(matches!(Cmd::<TestMsg>::batch(vec![Cmd::quit()]), Cmd::Quit));
        assert!(matches!(
            Cmd::<TestMsg>::batch(vec![Cmd::none(), Cmd::quit()]),
            Cmd::Batch(_)
        ));
        assert!(matches!(Cmd::<TestMsg>::sequence(vec![]), Cmd::None));
    }

    #[test]
    fn cmd_type_names_and_debug() {
        let task: Cmd<TestMsg> = Cmd::task(|| TestMsg::Computed(0));
        assert_eq!(task.type_name(), "Task");
        assert_eq!(format!("{task:?}"), "Task(...)");
        let req: Cmd<TestMsg> = Cmd::request(TerminalRequest::QueryModifyOtherKeys);
        assert_eq!(req.type_name(), "Request");
        assert_eq!(req.as_request(), Some(TerminalRequest::QueryModifyOtherKeys));
        assert_eq!(Cmd::<TestMsg>::quit().as_request(), None);
    }

    #[test]
    fn config_defaults_and_builders() {
        let config = ProgramConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.startup_reporting_mode, None);
        assert!(!config.query_version_on_start);

        let config = ProgramConfig::default()
            .with_reporting_mode(ReportingMode::Extended)
            .with_version_query()
            .with_read_buffer_size(0)
            .with_poll_timeout(Duration::from_millis(5));
        assert_eq!(config.startup_reporting_mode, Some(ReportingMode::Extended));
        assert!(config.query_version_on_start);
        assert_eq!(config.read_buffer_size, 1);
        assert_eq!(config.poll_timeout, Duration::from_millis(5));
    }

    #[test]
    fn config_from_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_REPORTING_MODE, "2"), (ENV_QUERY_VERSION, "true")]
            .into_iter()
            .collect();
        let config = ProgramConfig::from_env_with(|k| env.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.startup_reporting_mode, Some(ReportingMode::Extended));
        assert!(config.query_version_on_start);
    }

    #[test]
    fn config_from_env_ignores_garbage() {
        let env: HashMap<&str, &str> = [(ENV_REPORTING_MODE, "7"), (ENV_QUERY_VERSION, "maybe")]
            .into_iter()
            .collect();
        let config = ProgramConfig::from_env_with(|k| env.get(k).map(|v| (*v).to_string()));
        assert_eq!(config, ProgramConfig::default());
    }

    #[test]
    fn startup_cmd_orders_set_before_query() {
        let config = ProgramConfig::default()
            .with_reporting_mode(ReportingMode::Ambiguous)
            .with_version_query();
        match config.startup_cmd::<TestMsg>() {
            Cmd::Sequence(cmds) => {
                let requests: Vec<_> = cmds.iter().filter_map(Cmd::as_request).collect();
                assert_eq!(requests, vec![
                    TerminalRequest::SetModifyOtherKeys(ReportingMode::Ambiguous),
                    TerminalRequest::QueryTerminalVersion,
                ]);
            }
            other => panic!("expected sequence, got {other:?}"),
        }
        assert!(matches!(
            ProgramConfig::default().startup_cmd::<TestMsg>(),
            Cmd::None
        ));
    }

    #[test]
    fn run_delivers_input_until_close() {
        let mut program = program(
            Recorder::default(),
            b"a\x1b[27;1;13~",
            ProgramConfig::default(),
        );
        program.run().unwrap();
        assert!(!program.is_running());
        assert_eq!(program.model().seen, vec![
            InputMsg::KeyPress(KeyPress::char('a', modkeys_core::event::KeyMod::empty())),
            InputMsg::KeyPress(KeyPress::new(KeyCode::Enter)),
        ]);
    }

    #[test]
    fn startup_query_is_settled_by_reply() {
        let config = ProgramConfig::default().with_version_query();
        let mut program = program(Recorder::default(), b"\x1bP>|XTerm(380)\x1b\\", config);
        program.run().unwrap();
        assert_eq!(program.output().as_slice(), b"\x1b[>0q");
        assert!(!program.negotiation().is_awaiting(Capability::TerminalVersion));
        assert_eq!(program.negotiation().terminal_version(), Some("XTerm(380)"));
        assert_eq!(program.model().seen, vec![InputMsg::TerminalVersion(
            "XTerm(380)".into()
        )]);
    }

    #[test]
    fn unanswered_query_is_dropped_on_shutdown() {
        let mut model = Recorder::default();
        model.init_cmd = Some(|| crate::capability::query_reporting_mode());
        let mut program = program(model, b"", ProgramConfig::default());
        program.run().unwrap();
        assert_eq!(program.output().as_slice(), b"\x1b[?4m");
        assert!(program.negotiation().is_awaiting(Capability::ModifyOtherKeys));
    }

    #[test]
    fn quit_key_stops_before_remaining_input() {
        let mut program = program(Recorder::default(), b"xqy", ProgramConfig::default());
        program.run().unwrap();
        assert_eq!(program.model().seen.len(), 1);
    }

    /// Never produces input and never closes.
    struct SilentSource;

    impl ByteSource for SilentSource {
        fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
            std::thread::sleep(timeout);
            Ok(false)
        }

        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn task_result_returns_through_queue() {
        let mut model = Recorder::default();
        model.init_cmd = Some(|| Cmd::task(|| TestMsg::Computed(7)));
        let config = ProgramConfig::default().with_poll_timeout(Duration::from_millis(5));
        let mut program = Program::with_source(model, Vec::new(), SilentSource, config);
        program.run().unwrap();
        assert_eq!(program.model().computed, vec![7]);
        assert!(!program.is_running());
    }

    /// A reader whose `read` never returns, like a terminal nobody types on.
    struct BlockedRead;

    impl io::Read for BlockedRead {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            loop {
                std::thread::park();
            }
        }
    }

    #[test]
    fn quit_returns_while_reader_is_blocked() {
        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut model = Recorder::default();
            model.init_cmd = Some(|| Cmd::task(|| TestMsg::Computed(3)));
            let mut program = Program::with_source(
                model,
                Vec::new(),
                ReaderSource::new(BlockedRead),
                ProgramConfig::default(),
            );
            let result = program.run();
            let _ = done_tx.send((result.is_ok(), program.model().computed.clone()));
        });
        let (ok, computed) = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("run() did not return after quit");
        assert!(ok);
        assert_eq!(computed, vec![3]);
    }

    #[test]
    fn log_cmd_is_sanitized() {
        let mut model = Recorder::default();
        model.init_cmd = Some(|| Cmd::sequence(vec![Cmd::log("\x1b[31mhi"), Cmd::quit()]));
        let mut program = program(model, b"", ProgramConfig::default());
        program.run().unwrap();
        assert_eq!(program.output().as_slice(), b"hi\n");
    }
}
