use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::{
    core::session::{
        BootstrapLoads, BootstrapReport, GameSession, GameView, HintOutcome, StateError,
    },
    persist::{PersistError, SharedStore, with_store},
    sync::{
        RemoteStore, SyncError, SyncOutcome, SyncStatus,
        agent::SyncAgent,
        trigger::{EveryNthSolve, SyncTrigger},
    },
    types::{Clock, utc_day},
};

use super::events::GameEvent;

/// Failure of a runtime command.
#[derive(Debug, Error)]
pub enum GameError {
    /// The session refused the command in its current phase.
    #[error(transparent)]
    State(#[from] StateError),
    /// A local read or write failed; nothing was reported as done.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// A manual flush failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// The runtime task is gone.
    #[error("game runtime has stopped")]
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Runtime settings. Every field has a default.
pub struct GameConfig {
    /// Identity attached to queued scores.
    pub user_id: String,
    /// Hints allowed per puzzle.
    pub hints_per_day: u32,
    /// Flush after every Nth lifetime solve; 0 disables.
    pub sync_every_solves: u64,
    /// Largest batch sent in one remote call.
    pub sync_batch_max: usize,
    /// Flush once when bootstrap completes.
    pub sync_on_bootstrap: bool,
    /// Capacity of the command channel.
    pub command_queue_bound: usize,
    /// Remote calls slower than this count as failed.
    pub remote_timeout_ms: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            user_id: "local-player".to_string(),
            hints_per_day: 2,
            sync_every_solves: 5,
            sync_batch_max: 20,
            sync_on_bootstrap: true,
            command_queue_bound: 64,
            remote_timeout_ms: Some(10_000),
        }
    }
}

/// Result of a guess that passed state checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// Correct and durably saved.
    Solved {
        /// Points awarded.
        score: u32,
        /// Streak after this solve.
        streak: u32,
        /// Success feedback.
        message: String,
    },
    /// Wrong or unparseable; nothing was saved.
    Rejected {
        /// Why the guess missed.
        message: String,
    },
}

/// Cloneable handle to a running game. Commands are processed one at a time.
pub struct GameHandle {
    cmd_tx: mpsc::Sender<Command>,
    sync_tx: mpsc::Sender<SyncMsg>,
    events_tx: broadcast::Sender<GameEvent>,
    sync_batch_max: usize,
}

impl Clone for GameHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            sync_tx: self.sync_tx.clone(),
            events_tx: self.events_tx.clone(),
            sync_batch_max: self.sync_batch_max,
        }
    }
}

enum Command {
    Bootstrap {
        resp: oneshot::Sender<BootstrapReport>,
    },
    SubmitGuess {
        guess: String,
        resp: oneshot::Sender<Result<GuessOutcome, GameError>>,
    },
    TriggerHint {
        resp: oneshot::Sender<Result<HintOutcome, GameError>>,
    },
    ResetDaily {
        resp: oneshot::Sender<bool>,
    },
    View {
        resp: oneshot::Sender<GameView>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

enum SyncMsg {
    Flush {
        max_batch: usize,
        resp: Option<oneshot::Sender<Result<SyncOutcome, SyncError>>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the game runtime, flushing every `config.sync_every_solves` solves.
pub fn spawn_game(
    store: SharedStore,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    config: GameConfig,
) -> GameHandle {
    let trigger = Box::new(EveryNthSolve::new(config.sync_every_solves));
    spawn_game_with_trigger(store, remote, clock, config, trigger)
}

/// Spawns the game runtime with a caller-supplied flush trigger.
pub fn spawn_game_with_trigger(
    store: SharedStore,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    config: GameConfig,
    trigger: Box<dyn SyncTrigger>,
) -> GameHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (sync_tx, sync_rx) = mpsc::channel::<SyncMsg>(8);
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<SyncStatus>();
    let (events_tx, _) = broadcast::channel::<GameEvent>(256);

    let mut agent = SyncAgent::new(Arc::clone(&store), remote);
    if let Some(ms) = config.remote_timeout_ms {
        agent = agent.with_timeout(Duration::from_millis(ms));
    }
    spawn_sync_worker(agent, sync_rx, status_tx, events_tx.clone());

    let now = clock.now();
    let mut session = GameSession::new(utc_day(now), now, config.hints_per_day);
    let sync_batch_max = config.sync_batch_max;
    let mut controller = Controller {
        store,
        clock,
        config,
        trigger,
        sync_tx: sync_tx.clone(),
        events_tx: events_tx.clone(),
    };

    tokio::spawn(async move {
        let mut status_open = true;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if controller.handle_command(cmd, &mut session).await {
                        break;
                    }
                }
                status = status_rx.recv(), if status_open => {
                    match status {
                        Some(status) => session.set_sync_status(status),
                        None => status_open = false,
                    }
                }
            }
        }
    });

    GameHandle {
        cmd_tx,
        sync_tx,
        events_tx,
        sync_batch_max,
    }
}

impl GameHandle {
    /// New receiver for runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events_tx.subscribe()
    }

    /// Loads today's puzzle and stored state. Safe to call again; a new
    /// calendar day switches to the new puzzle.
    pub async fn bootstrap(&self) -> Result<BootstrapReport, GameError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Bootstrap { resp: tx })
            .await
            .map_err(|_| GameError::ChannelClosed)?;
        rx.await.map_err(|_| GameError::ChannelClosed)
    }

    /// Checks a guess and, if correct, commits the solve before replying.
    pub async fn submit_guess(&self, guess: impl Into<String>) -> Result<GuessOutcome, GameError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SubmitGuess {
                guess: guess.into(),
                resp: tx,
            })
            .await
            .map_err(|_| GameError::ChannelClosed)?;
        rx.await.map_err(|_| GameError::ChannelClosed)?
    }

    /// Spends one hint on today's puzzle.
    pub async fn trigger_hint(&self) -> Result<HintOutcome, GameError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::TriggerHint { resp: tx })
            .await
            .map_err(|_| GameError::ChannelClosed)?;
        rx.await.map_err(|_| GameError::ChannelClosed)?
    }

    /// Re-bootstraps if the UTC day has rolled over. Returns true if it had.
    pub async fn reset_daily(&self) -> Result<bool, GameError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ResetDaily { resp: tx })
            .await
            .map_err(|_| GameError::ChannelClosed)?;
        rx.await.map_err(|_| GameError::ChannelClosed)
    }

    /// Snapshot of the session.
    pub async fn view(&self) -> Result<GameView, GameError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::View { resp: tx })
            .await
            .map_err(|_| GameError::ChannelClosed)?;
        rx.await.map_err(|_| GameError::ChannelClosed)
    }

    /// Flushes the sync queue now and waits for the result.
    pub async fn sync_now(&self) -> Result<SyncOutcome, GameError> {
        let (tx, rx) = oneshot::channel();
        self.sync_tx
            .send(SyncMsg::Flush {
                max_batch: self.sync_batch_max,
                resp: Some(tx),
            })
            .await
            .map_err(|_| GameError::ChannelClosed)?;
        let outcome = rx.await.map_err(|_| GameError::ChannelClosed)?;
        Ok(outcome?)
    }

    /// Stops the runtime and its sync worker.
    pub async fn shutdown(&self) -> Result<(), GameError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| GameError::ChannelClosed)?;
        rx.await.map_err(|_| GameError::ChannelClosed)
    }
}

struct Controller {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    config: GameConfig,
    trigger: Box<dyn SyncTrigger>,
    sync_tx: mpsc::Sender<SyncMsg>,
    events_tx: broadcast::Sender<GameEvent>,
}

impl Controller {
    async fn handle_command(&mut self, cmd: Command, session: &mut GameSession) -> bool {
        match cmd {
            Command::Bootstrap { resp } => {
                let report = self.bootstrap(session).await;
                let _ = resp.send(report);
            }
            Command::SubmitGuess { guess, resp } => {
                let res = self.submit_guess(session, &guess).await;
                let _ = resp.send(res);
            }
            Command::TriggerHint { resp } => {
                let res = session.trigger_hint().map_err(GameError::from);
                if let Ok(hint) = &res {
                    let _ = self.events_tx.send(GameEvent::HintUsed {
                        remaining: hint.remaining,
                    });
                }
                let _ = resp.send(res);
            }
            Command::ResetDaily { resp } => {
                let rolled = session.puzzle().date != self.clock.today();
                if rolled {
                    self.bootstrap(session).await;
                }
                let _ = resp.send(rolled);
            }
            Command::View { resp } => {
                let _ = resp.send(session.view());
            }
            Command::Shutdown { resp } => {
                let (done_tx, done_rx) = oneshot::channel();
                if self
                    .sync_tx
                    .send(SyncMsg::Shutdown { resp: done_tx })
                    .await
                    .is_ok()
                {
                    let _ = done_rx.await;
                }
                let _ = resp.send(());
                return true;
            }
        }
        false
    }

    async fn bootstrap(&mut self, session: &mut GameSession) -> BootstrapReport {
        let now = self.clock.now();
        session.begin_bootstrap(utc_day(now), now);
        let date = session.puzzle().date;

        let loads = with_store(&self.store, move |s| {
            Ok(BootstrapLoads {
                today: s.get_progress(date),
                streak: s.get_streak(),
                history: s.all_progress(),
            })
        })
        .await
        .unwrap_or_else(|err| {
            let msg = err.to_string();
            BootstrapLoads {
                today: Err(PersistError::Join(msg.clone())),
                streak: Err(PersistError::Join(msg.clone())),
                history: Err(PersistError::Join(msg)),
            }
        });

        let report = session.finish_bootstrap(loads);
        for failure in &report.failures {
            warn!("[GAME] Bootstrap read {:?} failed: {}", failure.part, failure.error);
        }
        info!(
            "[GAME] Bootstrapped {} (already solved: {})",
            report.puzzle.id, report.already_solved
        );
        let _ = self.events_tx.send(GameEvent::Bootstrapped {
            date,
            already_solved: report.already_solved,
            failed_reads: report.failures.len(),
        });

        if self.config.sync_on_bootstrap {
            self.request_flush();
        }
        report
    }

    async fn submit_guess(
        &mut self,
        session: &mut GameSession,
        guess: &str,
    ) -> Result<GuessOutcome, GameError> {
        let validation = session.check_guess(guess)?;
        if !validation.valid {
            let _ = self.events_tx.send(GameEvent::GuessRejected);
            return Ok(GuessOutcome::Rejected {
                message: validation.message,
            });
        }

        let now = self.clock.now();
        let need_streak = !session.streak_loaded();
        let need_today = !session.today_loaded();
        let date = session.puzzle().date;
        let reads = with_store(&self.store, move |s| {
            let today = if need_today {
                Some(s.get_progress(date)?)
            } else {
                None
            };
            let streak = if need_streak {
                Some(s.get_streak()?.unwrap_or_default())
            } else {
                None
            };
            Ok((s.solved_count()?, streak, today))
        })
        .await;
        let (solved_count, streak, today) = match reads {
            Ok(reads) => reads,
            Err(err) => {
                warn!("[GAME] Could not read stored state before solve: {}", err);
                session.record_save_failure(&err);
                return Err(err.into());
            }
        };
        if let Some(today) = today {
            if let Err(err) = session.apply_today_progress(today) {
                info!("[GAME] {} was already solved in storage", session.puzzle().id);
                return Err(err.into());
            }
        }
        if let Some(streak) = streak {
            session.set_streak(streak);
        }

        let commit = session.plan_solve(now, &self.config.user_id, solved_count);
        let to_store = commit.clone();
        if let Err(err) = with_store(&self.store, move |s| s.commit_solve(&to_store)).await {
            warn!("[GAME] Solve for {} not saved: {}", commit.progress.puzzle_id, err);
            session.record_save_failure(&err);
            return Err(err.into());
        }

        session.confirm_solve(&commit, &validation.message);
        info!(
            "[GAME] Solved {} for {} points (streak {})",
            commit.progress.puzzle_id, commit.progress.score, commit.streak.streak
        );
        let _ = self.events_tx.send(GameEvent::Solved {
            date: commit.progress.date,
            score: commit.progress.score,
            streak: commit.streak.streak,
        });

        if self.trigger.on_solve_count_changed(commit.solved_count) {
            self.request_flush();
        }

        Ok(GuessOutcome::Solved {
            score: commit.progress.score,
            streak: commit.streak.streak,
            message: validation.message,
        })
    }

    fn request_flush(&self) {
        let msg = SyncMsg::Flush {
            max_batch: self.config.sync_batch_max,
            resp: None,
        };
        if let Err(err) = self.sync_tx.try_send(msg) {
            debug!("[GAME] Flush request not queued: {}", err);
        }
    }
}

fn spawn_sync_worker(
    agent: SyncAgent,
    mut rx: mpsc::Receiver<SyncMsg>,
    status_tx: mpsc::UnboundedSender<SyncStatus>,
    events_tx: broadcast::Sender<GameEvent>,
) {
    tokio::spawn(async move {
        let set_status = |status: SyncStatus| {
            let _ = status_tx.send(status);
            let _ = events_tx.send(GameEvent::SyncStatusChanged(status));
        };

        while let Some(msg) = rx.recv().await {
            match msg {
                SyncMsg::Flush { max_batch, resp } => {
                    set_status(SyncStatus::Syncing);
                    let result = agent.flush(max_batch).await;
                    match &result {
                        Ok(outcome) => {
                            set_status(SyncStatus::Idle);
                            if outcome.synced > 0 {
                                let _ = events_tx.send(GameEvent::Synced {
                                    count: outcome.synced,
                                });
                            }
                        }
                        Err(_) => set_status(SyncStatus::Failed),
                    }
                    if let Some(resp) = resp {
                        let _ = resp.send(result);
                    }
                }
                SyncMsg::Shutdown { resp } => {
                    let _ = resp.send(());
                    break;
                }
            }
        }
    });
}
