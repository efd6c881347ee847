use std::collections::VecDeque;
use std::fmt;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use flow_engine::{
    ContainerSize, FlowEngine, FlowSettings, IngestOutcome, MetricsAccumulator, MetricsHandle,
    RetireReason, SettingsHandle, StreamId, TickReport,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::bootstrap::AppWiring;
use super::cli::DEFAULT_FPS;
use super::script::{ScriptAction, ScriptLine};

#[derive(Debug, Clone)]
pub(crate) struct HostConfig {
    pub(crate) fps: u32,
    pub(crate) realtime: bool,
    pub(crate) metrics_log_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            realtime: false,
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) frames: u64,
    pub(crate) admitted: u64,
    pub(crate) rejected: u64,
    pub(crate) filtered: u64,
    pub(crate) retired: u64,
    pub(crate) stale: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} admitted={} rejected={} filtered={} retired={} stale={}",
            self.frames, self.admitted, self.rejected, self.filtered, self.retired, self.stale
        )
    }
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let config = app.config;
    let start = Instant::now();
    let mut session = HostSession::new(app.engine, app.settings, app.script, &config, start);
    let target = frame_duration(config.fps);

    let mut frame_index = 0u64;
    while !session.is_finished() {
        let frame_start = Instant::now();
        session.step(start + frame_offset(frame_index, config.fps));
        frame_index += 1;

        if config.realtime {
            let sleep = compute_cap_sleep(frame_start.elapsed(), target);
            if !sleep.is_zero() {
                thread::sleep(sleep);
            }
        }
    }

    let summary = session.summary();
    let last_metrics = session.metrics_handle().snapshot();
    info!(
        frames = summary.frames,
        admitted = summary.admitted,
        retired = summary.retired,
        stale_total = last_metrics.stale_total,
        "shutdown"
    );
    println!("{summary}");
    ExitCode::SUCCESS
}

/// Plays a script against the engine on a caller-supplied clock.
pub(crate) struct HostSession {
    engine: FlowEngine,
    settings: SettingsHandle,
    metrics: MetricsHandle,
    pending: VecDeque<ScriptLine>,
    start: Instant,
    visible: bool,
    summary: RunSummary,
}

impl HostSession {
    pub(crate) fn new(
        engine: FlowEngine,
        settings: SettingsHandle,
        script: Vec<ScriptLine>,
        config: &HostConfig,
        start: Instant,
    ) -> Self {
        Self {
            engine: engine.with_metrics(MetricsAccumulator::new_at(
                config.metrics_log_interval,
                start,
            )),
            settings,
            metrics: MetricsHandle::default(),
            pending: script.into(),
            start,
            visible: true,
            summary: RunSummary::default(),
        }
    }

    pub(crate) fn summary(&self) -> RunSummary {
        self.summary
    }

    pub(crate) fn metrics_handle(&self) -> MetricsHandle {
        self.metrics.clone()
    }

    /// Nothing left to play and nothing that a later frame could move.
    pub(crate) fn is_finished(&self) -> bool {
        self.pending.is_empty() && (!self.engine.is_running() || !self.visible)
    }

    pub(crate) fn step(&mut self, now: Instant) {
        self.summary.frames += 1;
        while self
            .pending
            .front()
            .is_some_and(|line| self.start + Duration::from_millis(line.at_ms) <= now)
        {
            if let Some(line) = self.pending.pop_front() {
                self.apply(line.action, now);
            }
        }

        self.engine.sync_settings(&self.settings);
        if self.visible {
            let report = self.engine.tick(now);
            self.record_report(&report);
        }

        if let Some(snapshot) = self.engine.poll_metrics(now) {
            self.metrics.publish(snapshot);
            info!(
                admissions_per_sec = snapshot.admissions_per_sec,
                ticks_per_sec = snapshot.ticks_per_sec,
                active_slots = snapshot.active_slots,
                admitted_total = snapshot.admitted_total,
                rejected_total = snapshot.rejected_total,
                filtered_total = snapshot.filtered_total,
                retired_total = snapshot.retired_total,
                "flow_metrics"
            );
        }
    }

    fn apply(&mut self, action: ScriptAction, now: Instant) {
        match action {
            ScriptAction::StreamCreated {
                stream_id,
                width,
                height,
            } => {
                self.engine
                    .create_stream(StreamId::new(stream_id), ContainerSize::new(width, height));
            }
            ScriptAction::StreamResized {
                stream_id,
                width,
                height,
            } => {
                let stream_id = StreamId::new(stream_id);
                if !self
                    .engine
                    .resize_stream(&stream_id, ContainerSize::new(width, height))
                {
                    debug!(stream_id = %stream_id, "resize_for_unknown_stream");
                }
            }
            ScriptAction::StreamRemoved { stream_id } => {
                let retired = self.engine.destroy_stream(&StreamId::new(stream_id));
                self.summary.retired += retired.len() as u64;
            }
            ScriptAction::StreamToggled { stream_id, enabled } => {
                self.engine
                    .set_stream_enabled(&StreamId::new(stream_id), enabled);
            }
            ScriptAction::Message(event) => match self.engine.ingest(&event, now) {
                IngestOutcome::Admitted(_) => self.summary.admitted += 1,
                IngestOutcome::Dropped(rejection) if rejection.is_filter() => {
                    self.summary.filtered += 1;
                }
                IngestOutcome::Dropped(_) => self.summary.rejected += 1,
            },
            ScriptAction::Hidden => {
                if self.visible {
                    info!("host_hidden");
                }
                self.visible = false;
            }
            ScriptAction::Visible => {
                if !self.visible {
                    info!("host_visible");
                    self.visible = true;
                    let report = self.engine.resume(now);
                    self.record_report(&report);
                }
            }
            ScriptAction::Settings(patch) => {
                match merge_settings(&self.settings.current().settings, &patch) {
                    Ok(settings) => {
                        let generation = self.settings.publish(settings);
                        info!(generation, keys = patch.len(), "settings_updated");
                        self.engine.sync_settings(&self.settings);
                    }
                    Err(err) => {
                        warn!(error = %err, "settings patch rejected; keeping current settings");
                    }
                }
            }
        }
    }

    fn record_report(&mut self, report: &TickReport) {
        self.summary.retired += report.retired.len() as u64;
        self.summary.stale += report.retired_count(RetireReason::Stale) as u64;
    }
}

/// Overlays the present keys of `patch` onto `base`.
fn merge_settings(
    base: &FlowSettings,
    patch: &Map<String, Value>,
) -> Result<FlowSettings, serde_json::Error> {
    let mut value = serde_json::to_value(base)?;
    if let Value::Object(fields) = &mut value {
        for (key, entry) in patch {
            fields.insert(key.clone(), entry.clone());
        }
    }
    serde_json::from_value(value)
}

fn frame_duration(fps: u32) -> Option<Duration> {
    (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64))
}

fn frame_offset(frame_index: u64, fps: u32) -> Duration {
    let fps = u64::from(fps.max(1));
    Duration::from_nanos(frame_index.saturating_mul(1_000_000_000) / fps)
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}
