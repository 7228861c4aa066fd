use crate::assessment::{ParseError, parse_assessment};
use crate::clock::{Clock, SystemClock};
use crate::gate::AdmissionGate;
use crate::gateway::InferenceGateway;
use crate::log::{LogEntry, SessionLog, latency_secs};
use crate::prompts::PromptSet;
use crate::signals::SignalSource;
use crate::snapshot::{DEFAULT_HAND_WINDOW, Snapshot};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which of the three completions a tick was waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Activity,
    Environment,
    Situation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Activity => "activity",
            Stage::Environment => "environment",
            Stage::Situation => "situation",
        })
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    /// No scene caption yet; nothing was sent.
    NotReady,
    /// Another tick is still in flight; this one was dropped.
    Busy,
    Published(LogEntry),
}

/// A tick that started but produced no log entry.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error("{stage} completion failed: {source:#}")]
    Gateway {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not parse assessment: {0}")]
    Parse(#[from] ParseError),
}

/// Turns the live signals into assessments, one tick at a time.
///
/// A tick snapshots the signals, asks the gateway for the activity, then the
/// environment, then the situational assessment, and appends the result to
/// the session log. At most one tick runs at a time; a tick that arrives while
/// another is in flight returns [`TickOutcome::Busy`] immediately.
pub struct Orchestrator<G, S> {
    gateway: G,
    source: S,
    prompts: PromptSet,
    gate: Arc<AdmissionGate>,
    log: SessionLog,
    clock: Arc<dyn Clock>,
    hand_window: Duration,
}

impl<G: InferenceGateway, S: SignalSource> Orchestrator<G, S> {
    pub fn new(gateway: G, source: S, log: SessionLog) -> Self {
        Self {
            gateway,
            source,
            prompts: PromptSet::default(),
            gate: Arc::new(AdmissionGate::new()),
            log,
            clock: Arc::new(SystemClock),
            hand_window: DEFAULT_HAND_WINDOW,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_hand_window(mut self, hand_window: Duration) -> Self {
        self.hand_window = hand_window;
        self
    }

    pub fn gate(&self) -> Arc<AdmissionGate> {
        self.gate.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Runs one tick and logs how it ended.
    pub async fn tick(&self) {
        match self.run_tick().await {
            Ok(TickOutcome::NotReady) => tracing::trace!("tick skipped: no scene caption yet"),
            Ok(TickOutcome::Busy) => tracing::debug!("tick dropped: previous tick still running"),
            Ok(TickOutcome::Published(entry)) => tracing::debug!(
                "tick published after {:.2}s (log size {})",
                entry.latency_secs,
                self.log.len()
            ),
            Err(e) => tracing::warn!("tick aborted: {}", e),
        }
    }

    pub async fn run_tick(&self) -> Result<TickOutcome, TickError> {
        if !self.source.scene_ready() {
            return Ok(TickOutcome::NotReady);
        }

        // Held until the entry is published or the tick fails.
        let Some(_permit) = self.gate.try_acquire() else {
            return Ok(TickOutcome::Busy);
        };

        let snapshot = Snapshot::capture(self.source.current(), self.clock.now(), self.hand_window);
        if snapshot.caption.is_empty() {
            // Caption was cleared between the readiness check and the snapshot.
            return Ok(TickOutcome::NotReady);
        }

        let activity = self
            .ask(Stage::Activity, &self.prompts.activity(&snapshot.caption))
            .await?;
        let environment = self
            .ask(Stage::Environment, &self.prompts.environment(&snapshot.caption))
            .await?;

        let hand_caption = snapshot
            .hand_detected
            .then_some(snapshot.hand_caption.as_str());
        let situation_prompt =
            self.prompts
                .situation(&activity, &environment, hand_caption, snapshot.volume);
        let raw = self.ask(Stage::Situation, &situation_prompt).await?;

        let assessment = parse_assessment(&raw).inspect_err(|e| {
            tracing::debug!("unparseable assessment ({}): {}", e, raw);
        })?;

        let published_at = self.clock.now();
        let entry = LogEntry {
            timestamp: published_at,
            latency_secs: latency_secs(snapshot.started_at, published_at),
            snapshot,
            activity,
            environment,
            assessment,
        };

        tracing::info!(
            video = %entry.snapshot.video.id,
            eye = %entry.assessment.eye,
            hearing = %entry.assessment.hearing,
            vocal = %entry.assessment.vocal,
            hand = %entry.assessment.hand,
            latency = entry.latency_secs,
            "assessment published: {} {}",
            entry.activity,
            entry.environment
        );

        self.log.append(entry.clone());
        Ok(TickOutcome::Published(entry))
    }

    async fn ask(&self, stage: Stage, prompt: &str) -> Result<String, TickError> {
        let text = self
            .gateway
            .complete(prompt)
            .await
            .map_err(|source| TickError::Gateway { stage, source })?;
        if text.is_empty() {
            tracing::warn!("{} completion came back empty", stage);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::Availability;
    use crate::clock::ManualClock;
    use crate::gateway::MockInferenceGateway;
    use crate::signals::{SharedSignals, VideoSource};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use mockall::Sequence;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    const WELL_FORMED: &str = "Eye: Affected; Hearing: Available; Vocal: Available; Hand: Affected;";

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn ready_signals(hand_age_ms: Option<i64>) -> SharedSignals {
        let signals = SharedSignals::new();
        signals.update_visual(|v| {
            v.caption = "a person at a desk".into();
            v.hand_caption = "typing on a keyboard".into();
            v.objects = vec!["laptop 91%".into()];
            v.last_hand_seen = hand_age_ms.map(|ms| t0() - ChronoDuration::milliseconds(ms));
        });
        signals.update_audio(|a| {
            a.volume = 42.0;
            a.classifications = vec!["Typing".into(), "Speech".into(), "Silence".into()];
        });
        signals.set_video(VideoSource::Webcam { camera_id: None });
        signals
    }

    /// The part of a situational prompt after the few-shot preamble.
    fn question(prompt: &str) -> &str {
        prompt.rsplit_once("Q: ").map_or(prompt, |(_, q)| q)
    }

    /// Mock answering activity, environment, then `situation`, in that order.
    /// `check_situation` inspects the question of the situational prompt.
    fn scripted_mock(
        situation: &'static str,
        check_situation: impl Fn(&str) -> bool + Send + 'static,
    ) -> MockInferenceGateway {
        let mut mock = MockInferenceGateway::new();
        let mut seq = Sequence::new();
        mock.expect_complete()
            .withf(|p| p.contains("Describe what is C doing"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("C is typing on a laptop.".to_string()));
        mock.expect_complete()
            .withf(|p| p.contains("What location or environment"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("C is in an office.".to_string()));
        mock.expect_complete()
            .withf(move |p| p.contains("Q: ") && check_situation(question(p)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(situation.to_string()));
        mock
    }

    #[tokio::test]
    async fn no_gateway_call_before_first_caption() {
        let mut mock = MockInferenceGateway::new();
        mock.expect_complete().never();

        let orchestrator = Orchestrator::new(mock, SharedSignals::new(), SessionLog::new());

        assert!(matches!(orchestrator.run_tick().await, Ok(TickOutcome::NotReady)));
        assert!(!orchestrator.is_busy());
        assert!(orchestrator.log().is_empty());
    }

    #[tokio::test]
    async fn recent_hand_scenario_publishes_full_entry() {
        let mock = scripted_mock(WELL_FORMED, |q| {
            q.starts_with("C is typing on a laptop. C is in an office.")
                && q.contains("C’s hand is typing on a keyboard.")
                && q.contains("around 42 decibels")
        });
        let clock = Arc::new(ManualClock::new(t0()));
        let orchestrator = Orchestrator::new(mock, ready_signals(Some(500)), SessionLog::new())
            .with_clock(clock);

        let entry = match orchestrator.run_tick().await {
            Ok(TickOutcome::Published(entry)) => entry,
            other => panic!("expected a published entry, got {other:?}"),
        };

        assert!(entry.snapshot.hand_detected);
        assert_eq!(entry.snapshot.video.id, "webcam");
        assert_eq!(entry.activity, "C is typing on a laptop.");
        assert_eq!(entry.environment, "C is in an office.");
        assert_eq!(entry.assessment.eye, Availability::Affected);
        assert_eq!(entry.assessment.hearing, Availability::Available);
        assert_eq!(entry.assessment.vocal, Availability::Available);
        assert_eq!(entry.assessment.hand, Availability::Affected);
        assert_eq!(entry.latency_secs, 0.0);
        assert_eq!(orchestrator.log().len(), 1);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn stale_hand_omits_hand_clause() {
        let mock = scripted_mock(WELL_FORMED, |q| {
            !q.contains("hand is") && q.contains("around 42 decibels")
        });
        let orchestrator = Orchestrator::new(mock, ready_signals(Some(2500)), SessionLog::new())
            .with_clock(Arc::new(ManualClock::new(t0())));

        let outcome = orchestrator.run_tick().await.unwrap();
        match outcome {
            TickOutcome::Published(entry) => assert!(!entry.snapshot.hand_detected),
            other => panic!("expected a published entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gateway_failure_aborts_tick_and_frees_gate() {
        let mut mock = MockInferenceGateway::new();
        let mut seq = Sequence::new();
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("C is typing.".to_string()));
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let orchestrator = Orchestrator::new(mock, ready_signals(None), SessionLog::new());

        match orchestrator.run_tick().await {
            Err(TickError::Gateway { stage, source }) => {
                assert_eq!(stage, Stage::Environment);
                assert!(source.to_string().contains("connection reset"));
            }
            other => panic!("expected gateway error, got {other:?}"),
        }
        assert!(!orchestrator.is_busy());
        assert!(orchestrator.log().is_empty());
    }

    #[tokio::test]
    async fn parse_failure_aborts_tick_and_next_tick_runs() {
        let mut mock = MockInferenceGateway::new();
        let answers = Arc::new(AtomicUsize::new(0));
        let counter = answers.clone();
        mock.expect_complete().times(6).returning(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(match n {
                2 => "Eye: Affected; Hearing: Available;".to_string(),
                5 => WELL_FORMED.to_string(),
                _ => "C is working.".to_string(),
            })
        });

        let orchestrator = Orchestrator::new(mock, ready_signals(None), SessionLog::new());

        match orchestrator.run_tick().await {
            Err(TickError::Parse(e)) => assert_eq!(e, ParseError::MissingLabel {
                channel: crate::assessment::Channel::Vocal
            }),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(!orchestrator.is_busy());
        assert!(orchestrator.log().is_empty());

        assert!(matches!(orchestrator.run_tick().await, Ok(TickOutcome::Published(_))));
        assert_eq!(orchestrator.log().len(), 1);
    }

    /// Gateway whose calls block until the test hands out permits.
    struct HeldGateway {
        release: Arc<Semaphore>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl InferenceGateway for HeldGateway {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.acquire().await?.forget();
            if prompt.contains("Describe what is C doing") {
                Ok("C is typing.".into())
            } else if prompt.contains("What location") {
                Ok("C is in an office.".into())
            } else {
                Ok(WELL_FORMED.into())
            }
        }
    }

    #[tokio::test]
    async fn overlapping_tick_is_dropped_not_queued() {
        let release = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = HeldGateway {
            release: release.clone(),
            calls: calls.clone(),
        };
        let orchestrator = Arc::new(Orchestrator::new(
            gateway,
            ready_signals(Some(100)),
            SessionLog::new(),
        ));

        let first = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.run_tick().await }
        });
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // First tick is parked inside its activity call.
        assert!(orchestrator.is_busy());
        assert!(matches!(orchestrator.run_tick().await, Ok(TickOutcome::Busy)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        release.add_permits(3);
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, TickOutcome::Published(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!orchestrator.is_busy());
        assert_eq!(orchestrator.log().len(), 1);
    }

    /// Gateway that takes 400ms of clock time per call.
    struct SlowGateway {
        clock: Arc<ManualClock>,
    }

    #[async_trait]
    impl InferenceGateway for SlowGateway {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.clock.advance(ChronoDuration::milliseconds(400));
            Ok(if prompt.contains("Let's think step by step") {
                WELL_FORMED.to_string()
            } else {
                "C is here.".to_string()
            })
        }
    }

    #[tokio::test]
    async fn latency_spans_snapshot_to_publish() {
        let clock = Arc::new(ManualClock::new(t0()));
        let orchestrator = Orchestrator::new(
            SlowGateway { clock: clock.clone() },
            ready_signals(None),
            SessionLog::new(),
        )
        .with_clock(clock);

        match orchestrator.run_tick().await.unwrap() {
            TickOutcome::Published(entry) => {
                assert_eq!(entry.snapshot.started_at, t0());
                assert_eq!(entry.timestamp, t0() + ChronoDuration::milliseconds(1200));
                assert_eq!(entry.latency_secs, 1.2);
            }
            other => panic!("expected a published entry, got {other:?}"),
        }
    }
}
