//! Handoff of resolved workflows to the command runner.
//!
//! The engine never executes commands itself. [`Dispatcher`] packages a
//! [`DispatchRequest`] and hands it to a [`CommandRunner`], which must return
//! immediately. [`SpawnRunner`] is the stock runner: it executes requests on
//! tokio through a [`CommandExecutor`].

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use workflow_config::{AppContext, Command, ExecutionMode};

use crate::{
    Error, Result,
    cache::{ScopeKey, WorkflowEntry, WorkflowRef},
};

/// What caused a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOrigin {
    /// A keyboard shortcut or chord, matched in `scope`.
    Shortcut {
        /// Scope the match was found in.
        scope: ScopeKey,
    },
    /// A typed snippet.
    Snippet {
        /// The literal that matched.
        text: String,
    },
    /// An application lifecycle transition.
    Application {
        /// Application the transition happened to.
        bundle_identifier: String,
        /// Which transition.
        context: AppContext,
    },
}

impl fmt::Display for DispatchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shortcut { scope } => write!(f, "shortcut@{scope}"),
            Self::Snippet { text } => write!(f, "snippet:{text:?}"),
            Self::Application {
                bundle_identifier,
                context,
            } => write!(f, "app:{bundle_identifier}:{context:?}"),
        }
    }
}

/// One unit of work for the command runner.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// The matched workflow.
    pub workflow: WorkflowRef,
    /// Its commands, shared with the trigger tables.
    pub commands: Arc<[Command]>,
    /// How to execute `commands`.
    pub mode: ExecutionMode,
    /// What triggered the dispatch.
    pub origin: DispatchOrigin,
    /// Cancelled by [`Dispatcher::cancel_all`]; checked by the runner between
    /// steps.
    pub cancel: CancellationToken,
}

/// Receives dispatch requests. Implementations must not block.
pub trait CommandRunner: Send + Sync {
    /// Take ownership of `request` and arrange for it to run.
    fn run(&self, request: DispatchRequest);
}

/// Builds requests and hands them to a runner.
pub struct Dispatcher {
    runner: Arc<dyn CommandRunner>,
    root: CancellationToken,
}

impl Dispatcher {
    /// Dispatcher feeding `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            root: CancellationToken::new(),
        }
    }

    /// Hand `workflow` to the runner.
    pub fn dispatch(&self, workflow: &WorkflowRef, origin: DispatchOrigin) {
        if workflow.commands.is_empty() {
            debug!(workflow = %workflow.id, %origin, "dispatch_no_commands");
            return;
        }
        debug!(
            workflow = %workflow.id,
            %origin,
            commands = workflow.commands.len(),
            mode = ?workflow.execution,
            "dispatch"
        );
        self.runner.run(DispatchRequest {
            workflow: workflow.clone(),
            commands: workflow.commands.clone(),
            mode: workflow.execution,
            origin,
            cancel: self.root.child_token(),
        });
    }

    /// Cancel every request dispatched so far. Later dispatches are unaffected.
    pub fn cancel_all(&mut self) {
        debug!("dispatch_cancel_all");
        self.root.cancel();
        self.root = CancellationToken::new();
    }
}

/// Executes one command. The seam between the engine and the backends that
/// actually launch apps, run scripts or type text.
///
/// Cancellation is cooperative: a started command is never dropped by the
/// runner. Long-running executors may watch `cancel` and stop early.
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    /// Run `command` on behalf of `workflow`.
    async fn execute(
        &self,
        workflow: &WorkflowEntry,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Runs requests as tokio tasks.
pub struct SpawnRunner<E> {
    executor: Arc<E>,
    handle: Handle,
}

impl<E: CommandExecutor> SpawnRunner<E> {
    /// Runner on the current tokio runtime.
    pub fn new(executor: E) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::Msg(format!("SpawnRunner needs a tokio runtime: {e}")))?;
        Ok(Self::with_handle(executor, handle))
    }

    /// Runner on an explicit runtime.
    pub fn with_handle(executor: E, handle: Handle) -> Self {
        Self {
            executor: Arc::new(executor),
            handle,
        }
    }

    fn run_concurrent(&self, request: DispatchRequest) {
        for command in request.commands.iter().cloned() {
            let executor = self.executor.clone();
            let workflow = request.workflow.clone();
            let cancel = request.cancel.clone();
            self.handle.spawn(async move {
                if cancel.is_cancelled() {
                    trace!(workflow = %workflow.id, command = %command.id, "command_cancelled");
                    return;
                }
                if let Err(e) = executor.execute(&workflow, &command, &cancel).await {
                    warn!(workflow = %workflow.id, command = %command.id, error = %e, "command_failed");
                }
            });
        }
    }

    fn run_serial(&self, request: DispatchRequest) {
        let executor = self.executor.clone();
        self.handle.spawn(async move {
            let DispatchRequest {
                workflow,
                commands,
                cancel,
                ..
            } = request;
            for command in commands.iter() {
                if cancel.is_cancelled() {
                    trace!(workflow = %workflow.id, command = %command.id, "serial_cancelled");
                    return;
                }
                if let Err(e) = executor.execute(&workflow, command, &cancel).await {
                    warn!(workflow = %workflow.id, command = %command.id, error = %e, "serial_aborted");
                    return;
                }
            }
            trace!(workflow = %workflow.id, "serial_done");
        });
    }
}

impl<E: CommandExecutor> CommandRunner for SpawnRunner<E> {
    fn run(&self, request: DispatchRequest) {
        match request.mode {
            ExecutionMode::Concurrent => self.run_concurrent(request),
            ExecutionMode::Serial => self.run_serial(request),
        }
    }
}
