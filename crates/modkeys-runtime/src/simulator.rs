#![forbid(unsafe_code)]

//! Deterministic, thread-free program driver for tests.
//!
//! [`ProgramSimulator`] runs a [`Model`] the way [`Program`] does, minus
//! the threads: input bytes are fed in by hand, tasks run inline, and every
//! capability request is captured instead of written.
//!
//! ```ignore
//! let mut sim = ProgramSimulator::new(model);
//! sim.init();
//! sim.feed(b"\x1b[>4;2m");
//! assert!(!sim.negotiation().is_awaiting(Capability::ModifyOtherKeys));
//! ```
//!
//! [`Program`]: crate::program::Program

use modkeys_core::decoder::InputDecoder;
use modkeys_core::event::InputMsg;
use modkeys_core::negotiation::NegotiationState;
use modkeys_core::request::TerminalRequest;

use crate::program::{Cmd, Model, settle_input};

/// Drives a model without a terminal.
pub struct ProgramSimulator<M: Model> {
    model: M,
    decoder: InputDecoder,
    negotiation: NegotiationState,
    /// Requests in execution order.
    requests: Vec<TerminalRequest>,
    /// Log lines, unsanitized.
    logs: Vec<String>,
    running: bool,
}

impl<M: Model> ProgramSimulator<M> {
    /// Wrap a model. Call [`init`](Self::init) to run its startup commands.
    pub fn new(model: M) -> Self {
        Self {
            model,
            decoder: InputDecoder::new(),
            negotiation: NegotiationState::new(),
            requests: Vec::new(),
            logs: Vec::new(),
            running: true,
        }
    }

    /// Run `init()` and execute its commands.
    pub fn init(&mut self) {
        let cmd = self.model.init();
        self.execute_cmd(cmd);
    }

    /// Decode terminal bytes and deliver every resulting message.
    ///
    /// Ignored once the model has quit. Messages decoded after a quit in
    /// the same chunk are dropped.
    pub fn feed(&mut self, bytes: &[u8]) {
        if !self.running {
            return;
        }
        for msg in self.decoder.decode(bytes) {
            if !self.running {
                break;
            }
            self.deliver(msg);
        }
    }

    /// Deliver a held lone ESC as if input went idle.
    pub fn flush_input(&mut self) {
        if let Some(msg) = self.decoder.flush() {
            self.deliver(msg);
        }
    }

    /// Deliver an already-decoded input message.
    pub fn deliver(&mut self, msg: InputMsg) {
        if !self.running {
            return;
        }
        settle_input(&mut self.negotiation, &msg);
        self.send(M::Message::from(msg));
    }

    /// Send an application message straight to `update()`.
    pub fn send(&mut self, msg: M::Message) {
        if !self.running {
            return;
        }
        let cmd = self.model.update(msg);
        self.execute_cmd(cmd);
    }

    fn execute_cmd(&mut self, cmd: Cmd<M::Message>) {
        match cmd {
            Cmd::None => {}
            Cmd::Quit => self.running = false,
            Cmd::Msg(m) => self.send(m),
            Cmd::Batch(cmds) | Cmd::Sequence(cmds) => {
                for c in cmds {
                    self.execute_cmd(c);
                    if !self.running {
                        break;
                    }
                }
            }
            Cmd::Task(f) => {
                let msg = f();
                self.send(msg);
            }
            Cmd::Log(text) => self.logs.push(text),
            Cmd::Request(request) => {
                self.negotiation.begin(request);
                self.requests.push(request);
            }
        }
    }

    /// The model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The model, mutably.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Negotiation state as the update loop sees it.
    pub fn negotiation(&self) -> &NegotiationState {
        &self.negotiation
    }

    /// Requests executed so far.
    pub fn requests(&self) -> &[TerminalRequest] {
        &self.requests
    }

    /// The bytes a real program would have written for the requests.
    pub fn output_bytes(&self) -> Vec<u8> {
        self.requests
            .iter()
            .flat_map(|r| r.to_bytes())
            .collect()
    }

    /// Log lines emitted by `Cmd::Log`.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// False once the model has quit.
    pub fn is_running(&self) -> bool {
        self.running
    }
}
