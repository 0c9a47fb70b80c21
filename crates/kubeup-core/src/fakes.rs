//! Test doubles for [`CommandRunner`]. Public so both unit tests and
//! downstream integration tests can drive pipelines without a real host.

use crate::error::Result;
use crate::runner::{CmdSpec, CommandRunner, ExecResult};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// A runner that records every command and answers from a per-program
/// script. Programs without a scripted response succeed with empty output;
/// scripted responses are consumed in FIFO order, so a program polled twice
/// can answer differently on each call.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: RefCell<Vec<CmdSpec>>,
    responses: RefCell<HashMap<String, VecDeque<ExecResult>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next invocation of `program`.
    pub fn respond(&self, program: &str, result: ExecResult) {
        self.responses
            .borrow_mut()
            .entry(program.to_string())
            .or_default()
            .push_back(result);
    }

    /// Queue a successful response with the given stdout.
    pub fn respond_ok(&self, program: &str, stdout: &str) {
        self.respond(program, ExecResult::ok(stdout));
    }

    /// Queue a failure with the given exit code and stderr.
    pub fn respond_failure(&self, program: &str, exit_code: i32, stderr: &str) {
        self.respond(program, ExecResult::failed(exit_code, stderr));
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CmdSpec> {
        self.calls.borrow().clone()
    }

    /// Program names run so far, in order.
    pub fn programs_run(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.program.clone()).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CmdSpec) -> Result<ExecResult> {
        self.calls.borrow_mut().push(spec.clone());
        let response = self
            .responses
            .borrow_mut()
            .get_mut(&spec.program)
            .and_then(VecDeque::pop_front);
        Ok(response.unwrap_or_else(|| ExecResult::ok("")))
    }
}
