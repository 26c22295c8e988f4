//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::monitor::{ProvisioningState, ResourceIdentity, StatusError, StatusFuture, StatusSource};
use crate::runner::{CommandOutput, CommandRunner, RunnerError, RunnerFuture};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
/// Clones share the same queue and invocation log.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<Result<CommandOutput, RunnerError>>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns `true` when this is an `az deployment group create` call.
    #[must_use]
    pub fn is_deployment(&self) -> bool {
        self.args.first().is_some_and(|arg| arg == "deployment")
    }

    /// Returns `true` when any argument equals `value`.
    #[must_use]
    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|arg| arg == value)
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns only the provisioning (deployment) invocations.
    #[must_use]
    pub fn deployments(&self) -> Vec<CommandInvocation> {
        self.invocations()
            .into_iter()
            .filter(CommandInvocation::is_deployment)
            .collect()
    }

    /// Number of responses still queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, response: Result<CommandOutput, RunnerError>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "{}", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes a successful status lookup reporting `state`.
    pub fn push_state(&self, state: &str) {
        self.push_output(Some(0), format!("\"{state}\"\n"), "");
    }

    /// Pushes a spawn failure.
    pub fn push_spawn_failure(&self, message: &str) {
        self.push(Err(RunnerError::Spawn {
            program: String::from("az"),
            message: message.to_owned(),
        }));
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.push(Ok(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }));
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> RunnerFuture<'a> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CommandInvocation {
                program: program.to_owned(),
                args: args.to_vec(),
            });
        let response = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(RunnerError::Spawn {
                    program: program.to_owned(),
                    message: String::from("no scripted response available"),
                })
            });
        Box::pin(std::future::ready(response))
    }
}

type StateScript = VecDeque<Result<ProvisioningState, StatusError>>;

/// Status source that replays scripted states and counts queries.
///
/// Results pushed with [`Self::push_for`] answer only the named resource;
/// every other query reads the shared script. Once a script is exhausted its
/// last entry repeats, so a single transitional state models a resource
/// that never settles.
#[derive(Clone, Debug, Default)]
pub struct ScriptedStatusSource {
    script: Arc<Mutex<StateScript>>,
    by_resource: Arc<Mutex<HashMap<String, StateScript>>>,
    queries: Arc<Mutex<Vec<ResourceIdentity>>>,
}

impl ScriptedStatusSource {
    /// Creates a source from raw state strings.
    #[must_use]
    pub fn with_states(states: &[&str]) -> Self {
        let source = Self::default();
        for state in states {
            source.push(Ok(ProvisioningState::parse(state)));
        }
        source
    }

    /// Appends a scripted query result.
    pub fn push(&self, result: Result<ProvisioningState, StatusError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// Appends a scripted result for the resource called `resource_name`.
    pub fn push_for(&self, resource_name: &str, result: Result<ProvisioningState, StatusError>) {
        self.by_resource
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(resource_name.to_owned())
            .or_default()
            .push_back(result);
    }

    /// Number of queries answered so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Identities queried so far, in order.
    #[must_use]
    pub fn queried(&self) -> Vec<ResourceIdentity> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StatusSource for ScriptedStatusSource {
    fn query<'a>(&'a self, identity: &'a ResourceIdentity) -> StatusFuture<'a> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identity.clone());
        let mut by_resource = self
            .by_resource
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let next = match by_resource.get_mut(&identity.resource_name) {
            Some(script) => next_scripted(script),
            None => next_scripted(&mut self.script.lock().unwrap_or_else(PoisonError::into_inner)),
        };
        let result = next.unwrap_or_else(|| {
            Err(StatusError::Transient {
                identity: identity.to_string(),
                message: String::from("no scripted state available"),
            })
        });
        Box::pin(std::future::ready(result))
    }
}

fn next_scripted<T: Clone>(script: &mut VecDeque<T>) -> Option<T> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
