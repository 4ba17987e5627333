//! Scripted command runner

use crate::error::ClientError;
use crate::exec::{CommandOutput, CommandRunner, Invocation};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&Invocation) -> CommandOutput + Send + Sync;

/// Mock CommandRunner for testing
///
/// Answers every invocation through a closure and records what was run, so
/// tests can assert on exact command lines without spawning anything.
#[derive(Clone)]
pub struct MockCommandRunner {
    responder: Arc<Responder>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl MockCommandRunner {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Invocation) -> CommandOutput + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer every invocation with the same output.
    pub fn always(output: CommandOutput) -> Self {
        Self::new(move |_| output.clone())
    }

    /// Everything run so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn last_invocation(&self) -> Option<Invocation> {
        self.invocations.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ClientError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        Ok((self.responder)(invocation))
    }
}
