//! Single-task driver for an [`Engine`].
//!
//! Every input, including timer fires, is processed on the task running
//! [`run`], so engine state has exactly one writer.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use workflow_config::Configuration;

use crate::{Engine, EventDecision, RawEvent};

/// Messages accepted by [`run`].
#[derive(Debug)]
pub enum EngineInput {
    /// A tap event; the decision is sent back on `reply` when present.
    Event {
        /// The event.
        event: RawEvent,
        /// Where to send the decision.
        reply: Option<oneshot::Sender<EventDecision>>,
    },
    /// Full running-applications snapshot.
    RunningApplications(Vec<String>),
    /// New frontmost application.
    FrontmostChanged(String),
    /// New configuration snapshot.
    ApplyConfig {
        /// Monotonic configuration version.
        version: u64,
        /// The snapshot.
        config: Box<Configuration>,
    },
    /// Replace the active user modes.
    SetUserModes(Vec<String>),
    /// Activate one user mode.
    ActivateUserMode(String),
    /// Deactivate one user mode.
    DeactivateUserMode(String),
    /// Cancel in-flight workflows.
    CancelAll,
    /// Stop the loop.
    Shutdown,
}

/// Process `rx` and timer fires until shutdown or until every sender is
/// dropped. Returns the engine so callers can inspect or reuse it.
pub async fn run(mut engine: Engine, mut rx: mpsc::Receiver<EngineInput>) -> Engine {
    debug!("engine_loop_start");
    loop {
        tokio::select! {
            Some(fired) = engine.next_timer() => engine.on_timer(fired),
            input = rx.recv() => {
                let Some(input) = input else {
                    debug!("engine_inputs_closed");
                    break;
                };
                if !handle_input(&mut engine, input) {
                    break;
                }
            }
        }
    }
    engine.reset();
    debug!("engine_loop_stop");
    engine
}

/// Apply one input. Returns false on shutdown.
fn handle_input(engine: &mut Engine, input: EngineInput) -> bool {
    match input {
        EngineInput::Event { event, reply } => {
            let decision = engine.handle_event(&event);
            if let Some(reply) = reply
                && reply.send(decision).is_err()
            {
                trace!("event_reply_dropped");
            }
        }
        EngineInput::RunningApplications(apps) => {
            engine.on_running_applications(apps);
        }
        EngineInput::FrontmostChanged(bundle) => {
            engine.on_frontmost_changed(&bundle);
        }
        EngineInput::ApplyConfig { version, config } => {
            engine.apply_config(version, &config);
        }
        EngineInput::SetUserModes(modes) => engine.set_user_modes(modes),
        EngineInput::ActivateUserMode(mode) => engine.activate_user_mode(&mode),
        EngineInput::DeactivateUserMode(mode) => engine.deactivate_user_mode(&mode),
        EngineInput::CancelAll => engine.cancel_all(),
        EngineInput::Shutdown => return false,
    }
    true
}
