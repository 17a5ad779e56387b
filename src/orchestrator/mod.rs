//! Dispatches a run to the remote worker pool, executes inline checks and
//! collects the correlated results into one report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub mod bus;
pub mod message;

pub use bus::{BusError, Envelope, InMemoryBus, MessageBus, SpoolBus};
pub use message::{decode_result_body, ResultKind, ResultMessage, TriggerMessage};

use crate::check::{CheckContext, CheckRegistry, CheckResult};
use crate::error::{ReleasabilityError, Result};
use crate::report::Report;
use crate::version::VersionPolicy;

pub const DEFAULT_TRIGGER_TOPIC: &str = "ReleasabilityTriggerTopic";
pub const DEFAULT_RESULT_TOPIC: &str = "ReleasabilityResultTopic";
pub const DEFAULT_RESULT_QUEUE: &str = "ReleasabilityResultQueue";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(20);
pub const DEFAULT_MAX_MESSAGES: usize = 10;
/// Pause after a batch that only held other runs' messages
const RELEASE_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub trigger_topic: String,
    /// Reply reference carried in the trigger message
    pub result_topic: String,
    pub result_queue: String,
    pub timeout: Duration,
    pub poll_wait: Duration,
    pub max_messages: usize,
    /// Delete messages carrying another run's correlation id
    pub drop_foreign_messages: bool,
    pub version_policy: VersionPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            trigger_topic: DEFAULT_TRIGGER_TOPIC.to_string(),
            result_topic: DEFAULT_RESULT_TOPIC.to_string(),
            result_queue: DEFAULT_RESULT_QUEUE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            poll_wait: DEFAULT_POLL_WAIT,
            max_messages: DEFAULT_MAX_MESSAGES,
            drop_foreign_messages: true,
            version_policy: VersionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Dispatched,
    AwaitingResults,
    Complete,
    TimedOut,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Idle => "idle",
            RunState::Dispatched => "dispatched",
            RunState::AwaitingResults => "awaiting results",
            RunState::Complete => "complete",
            RunState::TimedOut => "timed out",
        };
        f.write_str(label)
    }
}

/// What the polling loop did with one received message
#[derive(Debug)]
enum Disposition {
    Recorded(CheckResult),
    Ignored,
    /// Returned to the queue for the run that owns it
    Released,
}

pub struct Orchestrator<B: MessageBus> {
    bus: B,
    registry: CheckRegistry,
    settings: OrchestratorSettings,
    state: RunState,
}

impl<B: MessageBus> Orchestrator<B> {
    pub fn new(bus: B, registry: CheckRegistry, settings: OrchestratorSettings) -> Self {
        Self {
            bus,
            registry,
            settings,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Validate the version and publish the trigger message. Returns the correlation id.
    pub fn start_dispatched_checks(&mut self, context: &CheckContext) -> Result<String> {
        let policy = self.settings.version_policy;
        policy.validate_version(&context.version)?;
        let build_number = policy.extract_build_number(&context.version)?;

        info!("Starting releasability checks: {}", context);

        let correlation_id = Uuid::new_v4().to_string();
        let trigger = TriggerMessage::new(
            correlation_id.as_str(),
            self.settings.result_topic.as_str(),
            context,
            build_number,
        );
        let payload = serde_json::to_string(&trigger)?;

        let message_id = self
            .bus
            .publish(&self.settings.trigger_topic, &payload)
            .map_err(ReleasabilityError::Publish)?;

        info!(
            "Issued trigger message {}; the request identifier is {}",
            message_id, correlation_id
        );
        self.state = RunState::Dispatched;
        Ok(correlation_id)
    }

    /// Run every inline check in registration order. A failing check only
    /// affects its own result.
    pub fn execute_inline_checks(&self, context: &CheckContext) -> Vec<CheckResult> {
        let names = self.registry.inline_check_names();
        info!("Executing {} inline checks", names.len());
        let started = Instant::now();

        let mut results = Vec::with_capacity(names.len());
        for (name, check) in self.registry.inline_checks() {
            debug!("Executing inline check: {}", name);
            match check.execute(context) {
                Ok(result) => {
                    info!("Inline check {}: {}", name, result.state());
                    results.push(result);
                }
                Err(err) => {
                    error!("Inline check {} failed: {:#}", name, err);
                    results.push(CheckResult::error_with(name, format!("{:#}", err)));
                }
            }
        }

        info!("Inline checks completed in {:.2}s", started.elapsed().as_secs_f64());
        results
    }

    /// Dispatch first, then run inline checks while the workers start up
    pub fn start_checks(&mut self, context: &CheckContext) -> Result<(String, Vec<CheckResult>)> {
        let correlation_id = self.start_dispatched_checks(context)?;
        let inline_results = self.execute_inline_checks(context);
        Ok((correlation_id, inline_results))
    }

    /// Poll the result queue until every dispatched check reported or the timeout elapsed
    pub fn dispatched_results(&mut self, correlation_id: &str) -> Result<Vec<CheckResult>> {
        self.state = RunState::AwaitingResults;

        let mut awaiting: BTreeSet<String> = self.registry.dispatched_check_names().clone();
        let expected = awaiting.len();
        let mut received = Vec::with_capacity(expected);
        let timeout = self.settings.timeout;
        let started = Instant::now();

        while !awaiting.is_empty() {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                break;
            }
            let wait = self.settings.poll_wait.min(timeout - elapsed);

            let envelopes = match self.bus.receive(&self.settings.result_queue, self.settings.max_messages, wait) {
                Ok(envelopes) => envelopes,
                Err(err) => {
                    warn!("Failed to receive check results, retrying: {}", err);
                    thread::sleep(wait);
                    continue;
                }
            };

            let mut released = 0;
            let mut recorded = 0;
            for envelope in envelopes {
                match self.handle_envelope(correlation_id, &envelope, &mut awaiting) {
                    Disposition::Recorded(result) => {
                        info!("Received result for {}: {}", result.name(), result.state());
                        received.push(result);
                        recorded += 1;
                    }
                    Disposition::Released => released += 1,
                    Disposition::Ignored => {}
                }
            }

            // Released messages are visible again at once
            if released > 0 && recorded == 0 {
                thread::sleep(RELEASE_BACKOFF.min(timeout.saturating_sub(started.elapsed())));
            }
        }

        if awaiting.is_empty() {
            self.state = RunState::Complete;
            return Ok(received);
        }

        self.state = RunState::TimedOut;
        let missing: Vec<String> = awaiting.into_iter().collect();
        error!("Timed out waiting for check results: {}", missing.join(","));
        Err(ReleasabilityError::ResultsUnavailable {
            received: received.len(),
            expected,
            timeout_secs: timeout.as_secs_f64(),
            missing,
        })
    }

    fn handle_envelope(
        &self,
        correlation_id: &str,
        envelope: &Envelope,
        awaiting: &mut BTreeSet<String>,
    ) -> Disposition {
        let message = match decode_result_body(&envelope.body) {
            Ok(message) => message,
            Err(err) => {
                warn!("Skipping malformed result message: {}", err);
                return self.discard_foreign(envelope);
            }
        };

        if message.request_uuid != correlation_id {
            debug!("Ignoring result for foreign request {}", message.request_uuid);
            return self.discard_foreign(envelope);
        }

        self.delete(envelope);

        if message.is_ack() {
            debug!("Check {} acknowledged the request", message.check_name);
            return Disposition::Ignored;
        }

        if !awaiting.remove(&message.check_name) {
            debug!("Ignoring duplicate or unexpected result for {}", message.check_name);
            return Disposition::Ignored;
        }

        match message.into_check_result() {
            Some(result) => Disposition::Recorded(result),
            None => Disposition::Ignored,
        }
    }

    /// Delete or release a message this run cannot use, per `drop_foreign_messages`
    fn discard_foreign(&self, envelope: &Envelope) -> Disposition {
        if self.settings.drop_foreign_messages {
            self.delete(envelope);
            return Disposition::Ignored;
        }
        if let Err(err) = self.bus.release(&self.settings.result_queue, &envelope.receipt) {
            warn!("Failed to release message {}: {}", envelope.receipt, err);
        }
        Disposition::Released
    }

    fn delete(&self, envelope: &Envelope) {
        if let Err(err) = self.bus.delete(&self.settings.result_queue, &envelope.receipt) {
            warn!("Failed to delete message {}: {}", envelope.receipt, err);
        }
    }

    /// Inline results first, then the dispatched results collected for this correlation id
    pub fn get_combined_report(&mut self, correlation_id: &str, inline_results: Vec<CheckResult>) -> Result<Report> {
        let dispatched = self.dispatched_results(correlation_id)?;
        let mut results = inline_results;
        results.extend(dispatched);
        Ok(Report::new(results))
    }

    pub fn run(&mut self, context: &CheckContext) -> Result<Report> {
        let (correlation_id, inline_results) = self.start_checks(context)?;
        self.get_combined_report(&correlation_id, inline_results)
    }

    /// Validate the version and run only the inline checks. Nothing is published.
    pub fn run_inline(&mut self, context: &CheckContext) -> Result<Report> {
        self.settings.version_policy.validate_version(&context.version)?;
        info!("Starting inline releasability checks: {}", context);
        let report = Report::new(self.execute_inline_checks(context));
        self.state = RunState::Complete;
        Ok(report)
    }
}
