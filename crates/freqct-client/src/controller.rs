//! Tokio task that owns a [`CtableState`] and executes its effects.
//!
//! Commands arrive over an mpsc channel and are reduced one at a time.
//! Minimum-frequency edits restart a single debounce deadline; fetches run on
//! spawned tasks and report back as [`Command::FetchCompleted`], so the loop
//! never blocks on the network. Every reduced state is published on a watch
//! channel, every import on a broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use freqct_core::{Command, CtSnapshot, CtableError, CtableState, Effect};

use crate::ContingencyBackend;

const COMMAND_QUEUE: usize = 64;
const DATA_QUEUE: usize = 16;

struct Envelope {
    cmd: Command,
    ack: Option<oneshot::Sender<CtableState>>,
}

/// Client side of a running controller.
pub struct ControllerHandle<B> {
    commands: mpsc::Sender<Envelope>,
    state: watch::Receiver<CtableState>,
    data: broadcast::Sender<Arc<CtSnapshot>>,
    backend: Arc<B>,
    task: JoinHandle<()>,
}

fn stopped() -> CtableError {
    CtableError::Network("controller stopped".to_string())
}

impl<B: ContingencyBackend> ControllerHandle<B> {
    /// Queue a command without waiting for it to be reduced.
    pub async fn send(&self, cmd: Command) -> Result<(), CtableError> {
        self.commands
            .send(Envelope { cmd, ack: None })
            .await
            .map_err(|_| stopped())
    }

    /// Queue a command and return the state right after it was reduced.
    pub async fn dispatch(&self, cmd: Command) -> Result<CtableState, CtableError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Envelope { cmd, ack: Some(tx) })
            .await
            .map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())
    }

    /// Latest published state.
    pub fn current(&self) -> CtableState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CtableState> {
        self.state.clone()
    }

    /// Snapshots of every future import.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CtSnapshot>> {
        self.data.subscribe()
    }

    /// Wait until a published state satisfies `pred`.
    pub async fn wait_for(
        &self,
        pred: impl FnMut(&CtableState) -> bool,
    ) -> Result<CtableState, CtableError> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(pred).await.map_err(|_| stopped())?;
        Ok(state.clone())
    }

    /// Wait until no fetch is in flight and no edit awaits its debounce.
    pub async fn wait_idle(&self) -> Result<CtableState, CtableError> {
        self.wait_for(|s| !s.is_waiting).await
    }

    /// Convert the currently presented projection through the backend.
    pub async fn export(&self, format: &str) -> Result<Vec<u8>, CtableError> {
        let payload = self.state.borrow().export_payload();
        self.backend.export(&payload, format).await
    }

    /// Close the command channel and wait for the task to finish.
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.task.await;
    }
}

/// Start a controller task for `initial`.
pub fn spawn_controller<B: ContingencyBackend>(
    backend: Arc<B>,
    initial: CtableState,
    debounce: Duration,
) -> ControllerHandle<B> {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
    let (state_tx, state_rx) = watch::channel(initial.clone());
    let (data_tx, _) = broadcast::channel(DATA_QUEUE);

    let task = tokio::spawn(run(
        Arc::clone(&backend),
        initial,
        debounce,
        cmd_rx,
        state_tx,
        data_tx.clone(),
    ));

    ControllerHandle {
        commands: cmd_tx,
        state: state_rx,
        data: data_tx,
        backend,
        task,
    }
}

async fn run<B: ContingencyBackend>(
    backend: Arc<B>,
    mut state: CtableState,
    debounce: Duration,
    mut commands: mpsc::Receiver<Envelope>,
    state_tx: watch::Sender<CtableState>,
    data_tx: broadcast::Sender<Arc<CtSnapshot>>,
) {
    let (done_tx, mut done_rx) = mpsc::channel::<Command>(COMMAND_QUEUE);
    let mut deadline: Option<Instant> = None;
    info!("controller started (debounce {debounce:?})");

    loop {
        let (cmd, ack) = tokio::select! {
            received = commands.recv() => match received {
                Some(Envelope { cmd, ack }) => (cmd, ack),
                None => break,
            },
            Some(cmd) = done_rx.recv() => (cmd, None),
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                (Command::ApplyMinFreq, None)
            }
        };

        let (next, effects) = state.reduce(cmd);
        state = next;
        for effect in effects {
            match effect {
                Effect::ScheduleMinFreqApply => {
                    deadline = Some(Instant::now() + debounce);
                }
                Effect::Fetch {
                    request_id,
                    query,
                    conc_args,
                } => {
                    let backend = Arc::clone(&backend);
                    let done = done_tx.clone();
                    tokio::spawn(async move {
                        let result = backend.fetch(&query, &conc_args).await;
                        // The controller may be gone; nothing to report to then.
                        let _ = done
                            .send(Command::FetchCompleted { request_id, result })
                            .await;
                    });
                }
                Effect::NewData(snapshot) => {
                    // No subscribers is not an error.
                    let _ = data_tx.send(snapshot);
                }
            }
        }

        state_tx.send_replace(state.clone());
        if let Some(ack) = ack {
            let _ = ack.send(state.clone());
        }
    }
    debug!("controller stopped");
}
