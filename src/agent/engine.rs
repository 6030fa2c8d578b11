//! Execution engine
//!
//! Runs the autonomous cycle `select -> dispatch -> cool down` until
//! stopped, and exposes the same dispatch path for manual runs. One action
//! is in flight at a time across the loop and every manual caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{AgentProfile, TaskConfig};
use crate::connections::{build_registry, payload_text, ConnectionRegistry};
use crate::error::{ConnectionError, LoopError, Result};
use crate::moderation::{review_fail_closed, KeywordModerator, Moderator, Verdict};

use super::clock::{Clock, SystemClock};
use super::rate::RateTracker;
use super::scheduler::{candidate_set, pick_weighted};
use super::status::{AgentStatus, CycleOutcome, LastAction, LoopState};

/// Consecutive failed cycles before a warning is logged.
const FAILURE_ALERT_THRESHOLD: u32 = 3;

/// What happened inside one attempt before classification.
enum Attempt {
    Done(Value),
    Rejected(String),
}

/// Drives one agent: scheduling, rate tracking, moderation and dispatch.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use loopclaw::agent::{AgentEngine, CycleOutcome};
/// use loopclaw::config::{AgentProfile, TaskConfig};
/// use loopclaw::connections::{ActionSpec, ConnectionRegistry, ConsoleConnection};
///
/// # tokio_test::block_on(async {
/// let profile = AgentProfile {
///     name: "demo".into(),
///     moderated: false,
///     tasks: vec![TaskConfig::new("post", 1.0)],
///     ..Default::default()
/// };
/// let mut registry = ConnectionRegistry::new();
/// registry
///     .register(Arc::new(ConsoleConnection::new("console", vec![ActionSpec::new("post")])))
///     .unwrap();
///
/// let engine = AgentEngine::new(profile, registry).unwrap();
/// let outcome = engine.run_once(Some("post")).await.unwrap();
/// assert!(matches!(outcome, CycleOutcome::Completed { .. }));
/// # });
/// ```
pub struct AgentEngine {
    profile: AgentProfile,
    registry: ConnectionRegistry,
    tracker: RateTracker,
    moderator: Option<Arc<dyn Moderator>>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    status: RwLock<AgentStatus>,
    /// Held for the whole of every dispatch
    in_flight: tokio::sync::Mutex<()>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl AgentEngine {
    /// Create an engine for a validated profile and a populated registry.
    ///
    /// The RNG is seeded from `profile.seed` when set. No moderator is
    /// attached; a moderated profile then rejects all content until one is
    /// added with [`AgentEngine::with_moderator`].
    pub fn new(profile: AgentProfile, registry: ConnectionRegistry) -> Result<Self> {
        profile.validate()?;
        let rng = match profile.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            tracker: RateTracker::from_profile(&profile),
            status: RwLock::new(AgentStatus::new(&profile.name)),
            profile,
            registry,
            moderator: None,
            clock: Arc::new(SystemClock),
            rng: Mutex::new(rng),
            in_flight: tokio::sync::Mutex::new(()),
            running: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    /// Build the registry from the profile's connection settings and attach
    /// the keyword moderator from its moderation section.
    pub fn from_profile(profile: AgentProfile) -> Result<Self> {
        let registry = build_registry(&profile)?;
        let moderator = KeywordModerator::from_config(&profile.moderation)?;
        Ok(Self::new(profile, registry)?.with_moderator(Arc::new(moderator)))
    }

    pub fn with_moderator(mut self, moderator: Arc<dyn Moderator>) -> Self {
        self.moderator = Some(moderator);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &RateTracker {
        &self.tracker
    }

    /// Check if the autonomous loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of loop state, counters and the last outcome.
    pub fn status(&self) -> AgentStatus {
        let mut status = self.status.read().unwrap().clone();
        status.running = self.is_running();
        status
    }

    // ------------------------------------------------------------------
    // Control surface
    // ------------------------------------------------------------------

    /// Run the autonomous loop on the current task until stopped.
    ///
    /// Returns `Ok(())` after [`AgentEngine::stop`], or the fatal error that
    /// ended the loop.
    pub async fn start(&self) -> Result<()> {
        let shutdown_rx = self.begin()?;
        self.run_loop(shutdown_rx).await
    }

    /// Start the autonomous loop on a background task.
    ///
    /// The loop is marked running before this returns, so a `stop()` issued
    /// right after is never lost.
    pub fn spawn(self: &Arc<Self>) -> Result<JoinHandle<Result<()>>> {
        let shutdown_rx = self.begin()?;
        let engine = Arc::clone(self);
        Ok(tokio::spawn(async move { engine.run_loop(shutdown_rx).await }))
    }

    /// Ask the loop to stop.
    ///
    /// A sleeping loop wakes immediately; an in-flight action is abandoned
    /// and still counts as attempted.
    pub fn stop(&self) {
        info!(agent = %self.profile.name, "Stopping agent loop");
        self.shutdown_tx.send_replace(true);
    }

    /// Run one cycle now.
    ///
    /// With a task name, weighted selection is bypassed but cooldowns and
    /// moderation still apply; a task still cooling down yields
    /// [`CycleOutcome::Ineligible`]. Without one, a regular selection runs.
    pub async fn run_once(&self, task: Option<&str>) -> Result<CycleOutcome> {
        let Some(name) = task else {
            return self.cycle(None).await;
        };
        let task = self
            .profile
            .task(name)
            .ok_or_else(|| LoopError::UnknownTask(name.to_string()))?;
        match self.registry.resolve(task) {
            Some((connection, action)) => {
                self.dispatch(task, &connection, &action, task.args.clone(), None)
                    .await
            }
            None => {
                let outcome = CycleOutcome::Skipped {
                    task: task.name.clone(),
                    error: format!(
                        "no ready connection exposes action '{}'",
                        task.action_name()
                    ),
                };
                self.note(&outcome, self.clock.now());
                Ok(outcome)
            }
        }
    }

    /// Perform one action directly, outside the task list.
    ///
    /// Goes through the same gate as scheduled work: cooldown, argument
    /// checks, moderation and the in-flight lock.
    pub async fn perform_direct(
        &self,
        connection: &str,
        action: &str,
        args: Vec<Value>,
    ) -> Result<CycleOutcome> {
        if !self.registry.has(connection) {
            return Err(LoopError::UnknownConnection(connection.to_string()));
        }
        let task = TaskConfig::new(action, 0.0).bound_to(connection, action);
        self.dispatch(&task, connection, action, args, None).await
    }

    // ------------------------------------------------------------------
    // Loop
    // ------------------------------------------------------------------

    fn begin(&self) -> Result<watch::Receiver<bool>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(LoopError::AlreadyRunning);
        }
        // Clear any stop request left over from a previous run.
        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        {
            let mut status = self.status.write().unwrap();
            status.state = LoopState::Idle;
            status.started_at = Some(self.clock.now());
        }
        info!(
            agent = %self.profile.name,
            tasks = self.profile.tasks.len(),
            loop_delay_secs = self.profile.loop_delay,
            "Starting agent loop"
        );
        Ok(shutdown_rx)
    }

    async fn run_loop(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let delay = self.profile.loop_delay();

        let result = loop {
            if *shutdown_rx.borrow() {
                break Ok(());
            }
            self.set_state(LoopState::Idle);

            let cycle = {
                let mut status = self.status.write().unwrap();
                status.cycles += 1;
                status.cycles
            };
            let span = info_span!("cycle", agent = %self.profile.name, cycle = cycle);
            if let Err(e) = self
                .cycle(Some(shutdown_rx.clone()))
                .instrument(span)
                .await
            {
                error!(agent = %self.profile.name, error = %e, "Agent loop stopping on fatal error");
                break Err(e);
            }

            if *shutdown_rx.borrow() {
                break Ok(());
            }
            self.set_state(LoopState::Cooling);
            debug!(delay_secs = delay.as_secs(), "Cooling down");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    break Ok(());
                }
            }
        };

        self.running.store(false, Ordering::SeqCst);
        self.set_state(LoopState::Stopped);
        info!(agent = %self.profile.name, "Agent loop stopped");
        result
    }

    fn set_state(&self, state: LoopState) {
        self.status.write().unwrap().state = state;
    }

    // ------------------------------------------------------------------
    // Cycle
    // ------------------------------------------------------------------

    async fn cycle(&self, shutdown_rx: Option<watch::Receiver<bool>>) -> Result<CycleOutcome> {
        let from_loop = shutdown_rx.is_some();
        if from_loop {
            self.set_state(LoopState::Selecting);
        }

        let now = self.clock.now();
        let set = candidate_set(&self.profile, &self.registry, &self.tracker, now);
        debug!(
            period = ?set.period,
            candidates = set.candidates.len(),
            excluded = set.excluded.len(),
            "Candidate set built"
        );
        if set.unresolved() > 0 {
            debug!(unresolved = set.unresolved(), "Tasks without a ready connection");
        }

        let picked = {
            let mut rng = self.rng.lock().unwrap();
            pick_weighted(&set.candidates, &mut *rng).cloned()
        };
        let Some(candidate) = picked else {
            crate::log_component!(
                info,
                "scheduler",
                "No eligible task; idling",
                excluded = set.excluded.len()
            );
            let outcome = CycleOutcome::Idle;
            self.note(&outcome, now);
            return Ok(outcome);
        };

        // Names may repeat; dispatch the exact entry that was drawn.
        let Some(task) = self.profile.tasks.get(candidate.index) else {
            return Err(LoopError::UnknownTask(candidate.task));
        };
        info!(
            task = %candidate.task,
            connection = %candidate.connection,
            action = %candidate.action,
            weight = candidate.weight,
            "Task selected"
        );
        self.dispatch(
            task,
            &candidate.connection,
            &candidate.action,
            task.args.clone(),
            shutdown_rx,
        )
        .await
    }

    /// Attempt `action` on `connection` for `task` and classify the result.
    ///
    /// Only configuration problems and fatal errors leave the cooldown
    /// untouched and stamped respectively; everything else is absorbed into
    /// a [`CycleOutcome`].
    async fn dispatch(
        &self,
        task: &TaskConfig,
        connection: &str,
        action: &str,
        args: Vec<Value>,
        shutdown_rx: Option<watch::Receiver<bool>>,
    ) -> Result<CycleOutcome> {
        // The loop gives up waiting for a manual action when asked to stop.
        let _in_flight = match &shutdown_rx {
            Some(rx) => {
                let mut rx = rx.clone();
                tokio::select! {
                    guard = self.in_flight.lock() => guard,
                    _ = rx.wait_for(|stop| *stop) => {
                        debug!(task = %task.name, "Stop requested while waiting to dispatch");
                        return Ok(CycleOutcome::Idle);
                    }
                }
            }
            None => self.in_flight.lock().await,
        };
        let now = self.clock.now();

        if let Some(remaining) = self.tracker.remaining(connection, action, now) {
            let outcome = CycleOutcome::Ineligible {
                task: task.name.clone(),
                connection: connection.to_string(),
                action: action.to_string(),
                remaining_secs: remaining.as_secs(),
            };
            self.note(&outcome, now);
            return Ok(outcome);
        }

        let attempt = self.attempt(task, connection, action, args);
        let result = match shutdown_rx {
            Some(mut rx) => {
                self.set_state(LoopState::Dispatching);
                tokio::select! {
                    result = attempt => result,
                    _ = rx.wait_for(|stop| *stop) => {
                        self.tracker.record(connection, action, now);
                        let outcome = CycleOutcome::Interrupted {
                            task: task.name.clone(),
                            connection: connection.to_string(),
                            action: action.to_string(),
                        };
                        self.note(&outcome, now);
                        return Ok(outcome);
                    }
                }
            }
            None => attempt.await,
        };

        let outcome = match result {
            Ok(Attempt::Done(payload)) => {
                self.tracker.record(connection, action, now);
                CycleOutcome::Completed {
                    task: task.name.clone(),
                    connection: connection.to_string(),
                    action: action.to_string(),
                    payload,
                }
            }
            Ok(Attempt::Rejected(reason)) => {
                self.tracker.record(connection, action, now);
                CycleOutcome::Rejected {
                    task: task.name.clone(),
                    connection: connection.to_string(),
                    action: action.to_string(),
                    reason,
                }
            }
            Err(e) if e.is_configuration() => CycleOutcome::Skipped {
                task: task.name.clone(),
                error: e.to_string(),
            },
            Err(e) if e.is_fatal() => {
                if matches!(e, LoopError::Connection(_)) {
                    self.tracker.record(connection, action, now);
                }
                let mut status = self.status.write().unwrap();
                status.last_error = Some(e.to_string());
                status.consecutive_failures += 1;
                return Err(e);
            }
            Err(e) => {
                self.tracker.record(connection, action, now);
                CycleOutcome::Failed {
                    task: task.name.clone(),
                    connection: connection.to_string(),
                    action: action.to_string(),
                    error: e.to_string(),
                }
            }
        };
        self.note(&outcome, now);
        Ok(outcome)
    }

    async fn attempt(
        &self,
        task: &TaskConfig,
        connection: &str,
        action: &str,
        mut args: Vec<Value>,
    ) -> Result<Attempt> {
        // Catch configuration problems before paying for content generation.
        let conn = self.registry.get(connection)?;
        if !conn.is_configured() {
            return Err(ConnectionError::NotConfigured(connection.to_string()).into());
        }
        if conn.action_spec(action).is_none() {
            return Err(
                ConnectionError::UnsupportedAction(format!("{} on {}", action, connection)).into(),
            );
        }

        let mut generated = None;
        if let Some(prompt) = &task.prompt {
            let text = self.generate(prompt).await?;
            args.push(Value::String(text.clone()));
            generated = Some(text);
        }

        let (conn, args) = self.registry.prepare(connection, action, args)?;

        if self.profile.moderated {
            let content = conn
                .action_spec(action)
                .and_then(|spec| spec.reviewable_text(&args))
                .or(generated);
            if let Some(content) = content {
                if let Verdict::Rejected(reason) =
                    review_fail_closed(self.moderator.as_deref(), &content).await
                {
                    return Ok(Attempt::Rejected(reason));
                }
            }
        }

        let payload = ConnectionRegistry::invoke(&conn, action, args).await?;
        Ok(Attempt::Done(payload))
    }

    /// Ask the LLM binding for text.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let binding = self.profile.llm_binding();
        let payload = self
            .registry
            .perform(
                &binding.connection,
                &binding.action,
                vec![
                    Value::String(prompt.to_string()),
                    Value::String(self.profile.system_prompt()),
                ],
            )
            .await?;
        payload_text(&payload).ok_or_else(|| {
            ConnectionError::Transient(format!("{} returned no text", binding.connection)).into()
        })
    }

    /// Log an outcome and fold it into the status snapshot.
    fn note(&self, outcome: &CycleOutcome, at: DateTime<Utc>) {
        match outcome {
            CycleOutcome::Completed { task, .. } => info!(task = %task, "Task completed"),
            CycleOutcome::Ineligible {
                task,
                remaining_secs,
                ..
            } => info!(task = %task, remaining_secs = *remaining_secs, "Task still cooling down"),
            CycleOutcome::Rejected { task, reason, .. } => {
                warn!(task = %task, reason = %reason, "Content rejected by moderation")
            }
            CycleOutcome::Failed { task, error, .. } => {
                warn!(task = %task, error = %error, "Task failed; will retry after cooldown")
            }
            CycleOutcome::Skipped { task, error } => {
                warn!(task = %task, error = %error, "Task skipped")
            }
            CycleOutcome::Interrupted { task, .. } => {
                info!(task = %task, "Task interrupted by stop request")
            }
            CycleOutcome::Idle => {}
        }

        let mut status = self.status.write().unwrap();
        if outcome.attempted() {
            if let CycleOutcome::Completed {
                task,
                connection,
                action,
                ..
            }
            | CycleOutcome::Rejected {
                task,
                connection,
                action,
                ..
            }
            | CycleOutcome::Failed {
                task,
                connection,
                action,
                ..
            }
            | CycleOutcome::Interrupted {
                task,
                connection,
                action,
            } = outcome
            {
                status.last_action = Some(LastAction {
                    task: task.clone(),
                    connection: connection.clone(),
                    action: action.clone(),
                    at,
                });
            }
        }
        match outcome {
            CycleOutcome::Completed { .. } => status.consecutive_failures = 0,
            CycleOutcome::Failed { .. } | CycleOutcome::Skipped { .. } => {
                status.consecutive_failures += 1;
                if status.consecutive_failures == FAILURE_ALERT_THRESHOLD {
                    warn!(
                        agent = %status.agent,
                        failures = status.consecutive_failures,
                        "Agent has failed several cycles in a row"
                    );
                }
            }
            _ => {}
        }
        if let Some(err) = outcome.error() {
            status.last_error = Some(err);
        }
        status.last_outcome = Some(outcome.clone());
    }
}
