//! Implementation of the `run` and `check` subcommands.

use std::sync::Arc;

use async_trait::async_trait;
use humantime::format_duration;
use keyflow_engine::{
    CommandExecutor, CommandRunner, DispatchRequest, Engine, EventDecision, RawEvent, SpawnRunner,
    WorkflowEntry,
    runtime::{self, EngineInput},
};
use keypost::NullPoster;
use mac_keycode::Keystroke;
use tokio::{
    runtime::Builder,
    sync::{mpsc, oneshot},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use workflow_config::{Command, load_from_path, resolve_config_path};

use crate::{
    cli::{CheckArgs, RunArgs},
    error::{Error, Result},
    script::{self, Action},
};

/// Prints each command instead of running it.
struct PrintExecutor;

#[async_trait]
impl CommandExecutor for PrintExecutor {
    async fn execute(
        &self,
        workflow: &WorkflowEntry,
        command: &Command,
        _cancel: &CancellationToken,
    ) -> keyflow_engine::Result<()> {
        info!(workflow = %workflow.id, command = %command.id, "replay_command");
        println!("  exec {} {:?}", workflow.id, command.kind);
        Ok(())
    }
}

/// Prints the dispatch origin, then hands the request to the spawn runner.
struct PrintingRunner {
    /// Executes the request's commands.
    inner: SpawnRunner<PrintExecutor>,
}

impl CommandRunner for PrintingRunner {
    fn run(&self, request: DispatchRequest) {
        println!(
            "dispatch {} ({}) via {} [{:?}]",
            request.workflow.id, request.workflow.group, request.origin, request.mode
        );
        self.inner.run(request);
    }
}

/// Load the configuration and print every diagnostic.
pub fn check(args: &CheckArgs) -> Result<()> {
    let path = resolve_config_path(args.config.as_deref())?;
    let config = load_from_path(&path)?;
    let diagnostics = config.diagnostics();
    for d in &diagnostics {
        println!("{}/{}: {}", d.group, d.workflow, d.message);
    }
    println!(
        "{}: {} groups, {} problems",
        path.display(),
        config.groups.len(),
        diagnostics.len()
    );
    Ok(())
}

/// Replay a script against a configuration.
pub fn run(args: &RunArgs) -> Result<()> {
    let path = resolve_config_path(args.config.as_deref())?;
    let config = load_from_path(&path)?;
    let script = script::load(&args.script)?;
    let actions = script.actions()?;
    debug!(steps = script.steps.len(), actions = actions.len(), "script_loaded");

    let rt = Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async move {
        let runner = PrintingRunner {
            inner: SpawnRunner::new(PrintExecutor)?,
        };
        let engine = Engine::new(Arc::new(NullPoster), Arc::new(runner));
        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(runtime::run(engine, rx));

        let inputs = Inputs { tx };
        inputs
            .send(EngineInput::ApplyConfig {
                version: 1,
                config: Box::new(config),
            })
            .await?;
        seed(&inputs, &script).await?;
        for action in actions {
            play(&inputs, action).await?;
        }

        time::sleep(args.settle).await;
        inputs.send(EngineInput::Shutdown).await?;
        task.await.map_err(|_| Error::EngineStopped)?;
        println!("done (settled {})", format_duration(args.settle));
        Ok::<_, Error>(())
    })
}

/// Sender half of the engine loop.
struct Inputs {
    /// Engine input channel.
    tx: mpsc::Sender<EngineInput>,
}

impl Inputs {
    /// Send one input, failing once the loop has exited.
    async fn send(&self, input: EngineInput) -> Result<()> {
        self.tx.send(input).await.map_err(|_| Error::EngineStopped)
    }
}

/// Replay the script's starting context.
async fn seed(inputs: &Inputs, script: &script::Script) -> Result<()> {
    if !script.running.is_empty() {
        inputs
            .send(EngineInput::RunningApplications(script.running.clone()))
            .await?;
    }
    if let Some(front) = &script.frontmost {
        inputs
            .send(EngineInput::FrontmostChanged(front.clone()))
            .await?;
    }
    if !script.user_modes.is_empty() {
        inputs
            .send(EngineInput::SetUserModes(script.user_modes.clone()))
            .await?;
    }
    Ok(())
}

/// Perform one action, printing what the engine decided.
async fn play(inputs: &Inputs, action: Action) -> Result<()> {
    match action {
        Action::Event(event) => {
            let label = describe(&event);
            let (reply, rx) = oneshot::channel();
            inputs
                .send(EngineInput::Event {
                    event,
                    reply: Some(reply),
                })
                .await?;
            let decision = rx.await.map_err(|_| Error::EngineStopped)?;
            println!("{label:<24} {}", decision_label(decision));
        }
        Action::Wait(d) => {
            println!("wait {}", format_duration(d));
            time::sleep(d).await;
        }
        Action::Frontmost(bundle) => {
            println!("frontmost {bundle}");
            inputs.send(EngineInput::FrontmostChanged(bundle)).await?;
        }
        Action::Running(apps) => {
            println!("running {}", apps.join(" "));
            inputs.send(EngineInput::RunningApplications(apps)).await?;
        }
        Action::Modes(modes) => {
            println!("modes {}", modes.join(" "));
            inputs.send(EngineInput::SetUserModes(modes)).await?;
        }
    }
    Ok(())
}

/// One-line label for an event, as a keystroke spec when the key is known.
fn describe(event: &RawEvent) -> String {
    match event.key() {
        Some(key) => {
            let stroke = Keystroke {
                modifiers: event.modifiers(),
                key,
            };
            format!("{:?} {stroke}", event.kind)
        }
        None => format!("{:?} code {}", event.kind, event.key_code),
    }
}

/// Short label for a decision.
fn decision_label(decision: EventDecision) -> String {
    match decision {
        EventDecision::PassThrough => "pass".to_string(),
        EventDecision::Suppress => "suppress".to_string(),
        EventDecision::Decorate(m) => format!("decorate {m:?}"),
    }
}
