use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::intake::{normalize_event, ChatMessage, InboundEvent, RecentIds, StreamId};
use crate::measure::{ContentMeasurer, RenderContent};
use crate::settings::{FlowSettings, MessageStyle, SettingsHandle};

use super::metrics::{FlowMetricsSnapshot, MetricsAccumulator};
use super::placement::{plan_placement, PlacementParams, Rejection};
use super::registry::StreamRegistry;
use super::scheduler::{MotionScheduler, RetireReason, RetiredSlot, TickReport};
use super::stream::{ActiveSlot, ContainerSize, Slot, SlotIdAllocator, Stream};

const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub stream_id: StreamId,
    pub message_id: String,
    pub slot: Slot,
    pub style: MessageStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Admitted(Admission),
    Dropped(Rejection),
}

impl IngestOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, IngestOutcome::Admitted(_))
    }

    pub fn admission(&self) -> Option<&Admission> {
        match self {
            IngestOutcome::Admitted(admission) => Some(admission),
            IngestOutcome::Dropped(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            IngestOutcome::Admitted(_) => None,
            IngestOutcome::Dropped(rejection) => Some(*rejection),
        }
    }
}

/// Owns every stream and the shared motion clock.
///
/// All state lives on one logical thread: the host calls `ingest` as
/// records arrive and `tick` once per frame, never concurrently. Settings
/// arrive wholesale through `apply_settings` or a `SettingsHandle`.
pub struct FlowEngine {
    settings: FlowSettings,
    settings_generation: Option<u64>,
    registry: StreamRegistry,
    scheduler: MotionScheduler,
    measurer: Box<dyn ContentMeasurer>,
    recent_ids: RecentIds,
    slot_ids: SlotIdAllocator,
    metrics: MetricsAccumulator,
}

impl std::fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowEngine")
            .field("settings", &self.settings)
            .field("streams", &self.registry.len())
            .field("active_slots", &self.registry.total_active())
            .field("running", &self.scheduler.is_running())
            .finish_non_exhaustive()
    }
}

impl FlowEngine {
    pub fn new(settings: FlowSettings, measurer: impl ContentMeasurer + 'static) -> Self {
        Self {
            settings: settings.normalized(),
            settings_generation: None,
            registry: StreamRegistry::new(),
            scheduler: MotionScheduler::new(),
            measurer: Box::new(measurer),
            recent_ids: RecentIds::default(),
            slot_ids: SlotIdAllocator::default(),
            metrics: MetricsAccumulator::new(DEFAULT_METRICS_INTERVAL),
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsAccumulator) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn stream(&self, id: &StreamId) -> Option<&Stream> {
        self.registry.get(id)
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn active_slots(&self) -> usize {
        self.registry.total_active()
    }

    /// Only admissions after this call observe the new values; in-flight
    /// slots keep the speed and duration they were admitted with.
    pub fn apply_settings(&mut self, settings: FlowSettings) {
        let settings = settings.normalized();
        if settings.enabled != self.settings.enabled {
            info!(enabled = settings.enabled, "flow_toggled");
        }
        self.settings = settings;
    }

    /// Pulls from the shared cell when its generation moved. Returns whether
    /// anything was applied.
    pub fn sync_settings(&mut self, handle: &SettingsHandle) -> bool {
        let current = handle.current();
        if self.settings_generation == Some(current.generation) {
            return false;
        }
        debug!(generation = current.generation, "settings_synced");
        self.settings_generation = Some(current.generation);
        self.apply_settings(current.settings);
        true
    }

    pub fn create_stream(&mut self, id: StreamId, container: ContainerSize) -> bool {
        self.registry.create(id, container)
    }

    pub fn destroy_stream(&mut self, id: &StreamId) -> Vec<RetiredSlot> {
        let retired = self
            .registry
            .destroy(id)
            .iter()
            .map(|active| RetiredSlot::from_active(id, active, RetireReason::StreamDestroyed))
            .collect::<Vec<_>>();
        self.metrics
            .record_retired(RetireReason::StreamDestroyed, retired.len());
        retired
    }

    pub fn resize_stream(&mut self, id: &StreamId, container: ContainerSize) -> bool {
        self.registry.resize(id, container)
    }

    pub fn set_stream_enabled(&mut self, id: &StreamId, enabled: bool) -> bool {
        self.registry.set_enabled(id, enabled)
    }

    /// Page leave: every stream goes away along with whatever is in flight.
    pub fn deactivate(&mut self) -> Vec<RetiredSlot> {
        let retired = self
            .registry
            .clear()
            .iter()
            .map(|(stream_id, active)| {
                RetiredSlot::from_active(stream_id, active, RetireReason::StreamDestroyed)
            })
            .collect::<Vec<_>>();
        self.metrics
            .record_retired(RetireReason::StreamDestroyed, retired.len());
        self.recent_ids.clear();
        self.scheduler = MotionScheduler::new();
        info!(retired = retired.len(), "flow_deactivated");
        retired
    }

    /// Full intake pipeline for one raw record.
    pub fn ingest(&mut self, event: &InboundEvent, now: Instant) -> IngestOutcome {
        match self.admit_event(event, now) {
            Ok(admission) => IngestOutcome::Admitted(admission),
            Err(rejection) => {
                self.metrics.record_rejection(rejection);
                debug!(
                    stream_id = %event.stream_id,
                    reason = rejection.as_str(),
                    "placement_rejected"
                );
                IngestOutcome::Dropped(rejection)
            }
        }
    }

    fn admit_event(&mut self, event: &InboundEvent, now: Instant) -> Result<Admission, Rejection> {
        if !self.settings.enabled {
            return Err(Rejection::GloballyDisabled);
        }
        let message = normalize_event(event).ok_or(Rejection::EmptyContent)?;

        let stream = self
            .registry
            .get(&message.stream_id)
            .ok_or(Rejection::StreamNotFound)?;
        if !stream.enabled() {
            return Err(Rejection::StreamDisabled);
        }
        if !self.settings.shows(message.rank) {
            return Err(Rejection::RankHidden);
        }
        if !self.recent_ids.insert(&message.stream_id, &message.id) {
            return Err(Rejection::Duplicate);
        }
        if stream.active_count() >= self.settings.max_messages {
            return Err(Rejection::AtCapacity);
        }

        let style = self.settings.style_for(message.rank, message.has_avatar());
        let size = self.measurer.measure(
            &RenderContent {
                fragments: &message.fragments,
                show_avatar: style.show_avatar,
            },
            style.font_size,
        );
        if !size.is_renderable() {
            return Err(Rejection::EmptyContent);
        }

        let stream_id = message.stream_id.clone();
        let (slot, message_id) =
            self.place(&stream_id, message, style, size.width, size.height, now)?;
        Ok(Admission {
            stream_id,
            message_id,
            slot,
            style,
        })
    }

    /// Placement for content the host has already measured. Filters are
    /// not applied here beyond stream existence.
    pub fn try_place(
        &mut self,
        stream_id: &StreamId,
        message: ChatMessage,
        width: f32,
        height: f32,
        now: Instant,
    ) -> Result<Slot, Rejection> {
        let style = self.settings.style_for(message.rank, message.has_avatar());
        match self.place(stream_id, message, style, width, height, now) {
            Ok((slot, _)) => Ok(slot),
            Err(rejection) => {
                self.metrics.record_rejection(rejection);
                debug!(stream_id = %stream_id, reason = rejection.as_str(), "placement_rejected");
                Err(rejection)
            }
        }
    }

    fn place(
        &mut self,
        stream_id: &StreamId,
        message: ChatMessage,
        style: MessageStyle,
        width: f32,
        height: f32,
        now: Instant,
    ) -> Result<(Slot, String), Rejection> {
        let stream = self
            .registry
            .get_mut(stream_id)
            .ok_or(Rejection::StreamNotFound)?;
        let params = PlacementParams::from_settings(stream.container(), &self.settings);
        let plan = plan_placement(stream.active_slots(), width, height, &params, now)?;

        let slot = Slot {
            id: self.slot_ids.allocate(),
            top: plan.top,
            width,
            height,
            speed: plan.speed,
            start_x: plan.start_x,
            admitted_at: now,
            display_duration: params.display_duration,
        };
        let message_id = message.id.clone();
        debug!(
            stream_id = %stream_id,
            message_id = %message_id,
            slot_id = slot.id.0,
            top = slot.top,
            speed = slot.speed,
            "message_admitted"
        );
        stream.admit(ActiveSlot {
            slot,
            message,
            style,
        });

        self.metrics.record_admission();
        self.scheduler.wake();
        Ok((slot, message_id))
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        if !self.scheduler.is_running() {
            return TickReport::default();
        }
        let report = self.scheduler.tick(&mut self.registry, now);
        self.metrics.record_tick();
        self.metrics
            .record_retired(RetireReason::Exited, report.retired_count(RetireReason::Exited));
        report
    }

    /// Call when frames start arriving again after the host view was hidden.
    pub fn resume(&mut self, now: Instant) -> TickReport {
        let report = self.scheduler.resume(&mut self.registry, now);
        for reason in [RetireReason::Stale, RetireReason::Exited] {
            self.metrics
                .record_retired(reason, report.retired_count(reason));
        }
        report
    }

    pub fn poll_metrics(&mut self, now: Instant) -> Option<FlowMetricsSnapshot> {
        self.metrics
            .maybe_snapshot(now, self.registry.total_active())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::intake::{Fragment, InboundFragment, Rank};
    use crate::measure::ContentSize;
    use crate::settings::MAX_DISPLAY_TIME_SECONDS;

    const EPSILON: f32 = 0.001;

    fn scenario_settings() -> FlowSettings {
        FlowSettings {
            display_time: 8.0,
            font_size: 20.0,
            min_vertical_gap: 4.0,
            ..FlowSettings::default()
        }
    }

    fn fixed_engine(settings: FlowSettings, width: f32, height: f32) -> FlowEngine {
        FlowEngine::new(settings, move |_: &RenderContent<'_>, _: f32| {
            ContentSize::new(width, height)
        })
    }

    fn event(stream: &str, id: &str, rank: &str) -> InboundEvent {
        InboundEvent {
            stream_id: stream.to_string(),
            id: Some(id.to_string()),
            rank: Some(rank.to_string()),
            fragments: Some(vec![InboundFragment::Text {
                content: format!("hello {id}"),
            }]),
            ..InboundEvent::default()
        }
    }

    fn message(stream: &str, id: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            stream_id: StreamId::from(stream),
            author: None,
            rank: Rank::Normal,
            fragments: vec![Fragment::Text("x".to_string())],
            avatar_ref: None,
        }
    }

    fn admitted_top(outcome: &IngestOutcome) -> f32 {
        outcome.admission().expect("admitted").slot.top
    }

    #[test]
    fn two_band_container_fills_then_frees() {
        let mut engine = fixed_engine(scenario_settings(), 100.0, 30.0);
        let stream = StreamId::from("live");
        let base = Instant::now();
        engine.create_stream(stream.clone(), ContainerSize::new(800.0, 100.0));

        let a = engine.ingest(&event("live", "a", "normal"), base);
        let b = engine.ingest(&event("live", "b", "normal"), base);
        let c = engine.ingest(&event("live", "c", "normal"), base);
        assert!(admitted_top(&a).abs() < EPSILON);
        assert!((admitted_top(&b) - 34.0).abs() < EPSILON);
        assert_eq!(c.rejection(), Some(Rejection::NoVerticalRoom));

        let speed = a.admission().expect("admitted").slot.speed;
        assert!((speed - 100.0).abs() < EPSILON);

        let early = engine.ingest(&event("live", "d", "normal"), base + Duration::from_millis(1_100));
        assert_eq!(early.rejection(), Some(Rejection::NoVerticalRoom));
        let later = engine.ingest(&event("live", "e", "normal"), base + Duration::from_millis(1_300));
        assert!(admitted_top(&later).abs() < EPSILON);
    }

    #[test]
    fn try_place_exposes_measured_placement() {
        let mut engine = fixed_engine(scenario_settings(), 100.0, 30.0);
        let stream = StreamId::from("live");
        let base = Instant::now();
        engine.create_stream(stream.clone(), ContainerSize::new(800.0, 100.0));

        let slot = engine
            .try_place(&stream, message("live", "a"), 200.0, 30.0, base)
            .expect("placed");
        assert!(slot.top.abs() < EPSILON);
        assert!((slot.start_x - 800.0).abs() < EPSILON);

        assert_eq!(
            engine.try_place(&StreamId::from("gone"), message("gone", "b"), 10.0, 10.0, base),
            Err(Rejection::StreamNotFound)
        );
        assert_eq!(
            engine.try_place(&stream, message("live", "c"), 0.0, 30.0, base),
            Err(Rejection::EmptyContent)
        );
    }

    #[test]
    fn random_traffic_never_overlaps_in_a_shared_band() {
        let settings = FlowSettings {
            display_time: 6.0,
            font_size: 16.0,
            min_vertical_gap: 2.0,
            max_messages: 40,
            ..FlowSettings::default()
        };
        let mut engine = FlowEngine::new(settings, |content: &RenderContent<'_>, font_size: f32| {
            let chars = content
                .fragments
                .iter()
                .map(|fragment| match fragment {
                    Fragment::Text(text) => text.len(),
                    Fragment::Image { .. } => 2,
                })
                .sum::<usize>();
            ContentSize::new(chars as f32 * font_size * 0.6, font_size + (chars % 3) as f32 * 4.0)
        });
        let stream = StreamId::from("live");
        let base = Instant::now();
        engine.create_stream(stream.clone(), ContainerSize::new(640.0, 240.0));

        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            seed >> 33
        };

        let mut elapsed_ms = 0u64;
        let mut admitted = 0usize;
        for index in 0..600 {
            elapsed_ms += next() % 120;
            let now = base + Duration::from_millis(elapsed_ms);
            engine.tick(now);

            let text = "w".repeat(1 + (next() % 24) as usize);
            let inbound = InboundEvent {
                stream_id: "live".to_string(),
                id: Some(format!("m{index}")),
                fragments: Some(vec![InboundFragment::Text { content: text }]),
                ..InboundEvent::default()
            };
            if engine.ingest(&inbound, now).is_admitted() {
                admitted += 1;
            }

            let slots = engine.stream(&stream).expect("stream").active_slots();
            assert!(slots.len() <= 40);
            for (i, first) in slots.iter().enumerate() {
                for second in &slots[i + 1..] {
                    let (a, b) = (&first.slot, &second.slot);
                    if !a.band_overlaps(b.top, b.height, 2.0) {
                        continue;
                    }
                    let (left, right) = if a.x_at(now) <= b.x_at(now) { (a, b) } else { (b, a) };
                    assert!(
                        left.right_edge_at(now) <= right.x_at(now) + EPSILON,
                        "slots {:?} and {:?} overlap at {elapsed_ms}ms",
                        left.id,
                        right.id
                    );
                }
            }
        }
        assert!(admitted > 50);
    }

    #[test]
    fn capacity_caps_active_slots() {
        let settings = FlowSettings {
            max_messages: 2,
            ..scenario_settings()
        };
        let mut engine = fixed_engine(settings, 10.0, 5.0);
        let base = Instant::now();
        engine.create_stream(StreamId::from("live"), ContainerSize::new(800.0, 600.0));

        assert!(engine.ingest(&event("live", "a", "normal"), base).is_admitted());
        assert!(engine.ingest(&event("live", "b", "normal"), base).is_admitted());
        assert_eq!(
            engine.ingest(&event("live", "c", "normal"), base).rejection(),
            Some(Rejection::AtCapacity)
        );
        assert_eq!(engine.active_slots(), 2);
    }

    #[test]
    fn every_admission_retires_exactly_once_within_its_crossing_time() {
        const FRAME: Duration = Duration::from_millis(16);
        let mut engine = fixed_engine(scenario_settings(), 100.0, 30.0);
        let base = Instant::now();
        engine.create_stream(StreamId::from("live"), ContainerSize::new(800.0, 100.0));

        let mut admitted = HashMap::new();
        for (index, offset) in [0u64, 0, 1_500, 3_000].into_iter().enumerate() {
            let outcome = engine.ingest(
                &event("live", &format!("m{index}"), "normal"),
                base + Duration::from_millis(offset),
            );
            if let Some(admission) = outcome.admission() {
                admitted.insert(admission.message_id.clone(), admission.slot);
            }
        }
        assert_eq!(admitted.len(), 4);

        let mut retired = Vec::new();
        let mut frame = 0u32;
        while engine.is_running() {
            frame += 1;
            let now = base + FRAME * frame;
            for slot in engine.tick(now).retired {
                assert_eq!(slot.reason, RetireReason::Exited);
                let admitted_slot = admitted.get(&slot.message_id).expect("admitted slot");
                let lifetime = now.saturating_duration_since(admitted_slot.admitted_at);
                let bound = admitted_slot.display_duration
                    + Duration::from_secs_f32(admitted_slot.width / admitted_slot.speed)
                    + FRAME
                    + Duration::from_millis(1);
                assert!(
                    lifetime <= bound,
                    "{} lived {lifetime:?}, bound {bound:?}",
                    slot.message_id
                );
                retired.push(slot.message_id);
            }
            assert!(frame < 10_000, "scheduler never went idle");
        }
        retired.sort();
        let mut expected = admitted.into_keys().collect::<Vec<_>>();
        expected.sort();
        assert_eq!(retired, expected);
        assert_eq!(engine.active_slots(), 0);
    }

    #[test]
    fn speed_changes_and_resizes_mid_flight_never_overlap() {
        let settings = FlowSettings {
            display_time: 6.0,
            font_size: 16.0,
            min_vertical_gap: 3.0,
            max_messages: 60,
            ..FlowSettings::default()
        };
        let mut engine = FlowEngine::new(settings.clone(), |content: &RenderContent<'_>, font_size: f32| {
            let chars = content
                .fragments
                .iter()
                .map(|fragment| match fragment {
                    Fragment::Text(text) => text.len(),
                    Fragment::Image { .. } => 2,
                })
                .sum::<usize>();
            ContentSize::new(chars as f32 * font_size * 0.6, font_size + (chars % 3) as f32 * 4.0)
        });
        let stream = StreamId::from("live");
        let base = Instant::now();
        engine.create_stream(stream.clone(), ContainerSize::new(800.0, 240.0));

        let display_times = [3.0, 4.5, 6.0, 9.0, 12.0];
        let widths = [480.0, 640.0, 800.0, 1_024.0];
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = move || {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            seed >> 33
        };

        let gap = settings.min_vertical_gap;
        let mut elapsed_ms = 0u64;
        let mut admitted = 0usize;
        for index in 0..1_500 {
            elapsed_ms += next() % 90;
            let now = base + Duration::from_millis(elapsed_ms);

            if index % 97 == 0 {
                let display_time = display_times[(next() % display_times.len() as u64) as usize];
                engine.apply_settings(FlowSettings {
                    display_time,
                    ..settings.clone()
                });
            }
            if index % 131 == 0 {
                let width = widths[(next() % widths.len() as u64) as usize];
                engine.resize_stream(&stream, ContainerSize::new(width, 240.0));
            }

            engine.tick(now);
            let inbound = InboundEvent {
                stream_id: "live".to_string(),
                id: Some(format!("m{index}")),
                fragments: Some(vec![InboundFragment::Text {
                    content: "w".repeat(1 + (next() % 20) as usize),
                }]),
                ..InboundEvent::default()
            };
            if engine.ingest(&inbound, now).is_admitted() {
                admitted += 1;
            }

            let slots = engine.stream(&stream).expect("stream").active_slots();
            for (i, first) in slots.iter().enumerate() {
                for second in &slots[i + 1..] {
                    let (a, b) = (&first.slot, &second.slot);
                    if !a.band_overlaps(b.top, b.height, gap) {
                        continue;
                    }
                    let (left, right) = if a.x_at(now) <= b.x_at(now) { (a, b) } else { (b, a) };
                    assert!(
                        left.right_edge_at(now) <= right.x_at(now) + 0.05,
                        "slots {:?} and {:?} overlap at {elapsed_ms}ms",
                        left.id,
                        right.id
                    );
                }
            }
        }
        assert!(admitted > 100);
    }

    #[test]
    fn huge_display_time_is_tolerated_by_ingest() {
        let settings = FlowSettings {
            display_time: 1.0e30,
            ..scenario_settings()
        };
        let mut engine = fixed_engine(settings.clone(), 100.0, 30.0);
        let base = Instant::now();
        engine.create_stream(StreamId::from("live"), ContainerSize::new(800.0, 100.0));

        let outcome = engine.ingest(&event("live", "a", "normal"), base);
        let slot = outcome.admission().expect("admitted").slot;
        assert_eq!(
            slot.display_duration,
            Duration::from_secs_f32(MAX_DISPLAY_TIME_SECONDS)
        );
        assert!((slot.speed - 800.0 / MAX_DISPLAY_TIME_SECONDS).abs() < EPSILON);

        engine.apply_settings(FlowSettings {
            display_time: f32::MAX,
            ..settings
        });
        assert!(engine
            .ingest(&event("live", "b", "normal"), base + Duration::from_secs(1))
            .is_admitted());
    }

    #[test]
    fn create_is_idempotent_and_destroy_rejects_followups() {
        let mut engine = fixed_engine(scenario_settings(), 100.0, 30.0);
        let stream = StreamId::from("live");
        let base = Instant::now();

        assert!(engine.create_stream(stream.clone(), ContainerSize::new(800.0, 100.0)));
        assert!(engine.ingest(&event("live", "a", "normal"), base).is_admitted());
        assert!(!engine.create_stream(stream.clone(), ContainerSize::new(800.0, 100.0)));
        assert_eq!(engine.active_slots(), 1);

        let retired = engine.destroy_stream(&stream);
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].reason, RetireReason::StreamDestroyed);
        assert!(engine.destroy_stream(&stream).is_empty());

        assert_eq!(
            engine.ingest(&event("live", "b", "normal"), base).rejection(),
            Some(Rejection::StreamNotFound)
        );
    }

    #[test]
    fn filters_drop_before_placement() {
        let settings = FlowSettings {
            show_member: false,
            ..scenario_settings()
        };
        let mut engine = fixed_engine(settings, 100.0, 30.0);
        let stream = StreamId::from("live");
        let base = Instant::now();
        engine.create_stream(stream.clone(), ContainerSize::new(800.0, 100.0));

        assert_eq!(
            engine.ingest(&event("live", "m", "member"), base).rejection(),
            Some(Rejection::RankHidden)
        );
        assert_eq!(
            engine.ingest(&event("other", "x", "normal"), base).rejection(),
            Some(Rejection::StreamNotFound)
        );
        assert_eq!(
            engine
                .ingest(
                    &InboundEvent {
                        stream_id: "live".to_string(),
                        ..InboundEvent::default()
                    },
                    base
                )
                .rejection(),
            Some(Rejection::EmptyContent)
        );

        assert!(engine.ingest(&event("live", "a", "superchat"), base).is_admitted());
        assert_eq!(
            engine.ingest(&event("live", "a", "normal"), base).rejection(),
            Some(Rejection::Duplicate)
        );

        engine.set_stream_enabled(&stream, false);
        assert_eq!(
            engine.ingest(&event("live", "b", "normal"), base).rejection(),
            Some(Rejection::StreamDisabled)
        );
        assert_eq!(engine.active_slots(), 1);
        assert!(!engine.tick(base + Duration::from_secs(1)).moved.is_empty());

        engine.apply_settings(FlowSettings {
            enabled: false,
            ..scenario_settings()
        });
        engine.set_stream_enabled(&stream, true);
        assert_eq!(
            engine.ingest(&event("live", "c", "normal"), base).rejection(),
            Some(Rejection::GloballyDisabled)
        );
    }

    #[test]
    fn avatar_flag_widens_measured_content() {
        let mut engine = FlowEngine::new(
            scenario_settings(),
            |content: &RenderContent<'_>, _: f32| {
                ContentSize::new(if content.show_avatar { 150.0 } else { 100.0 }, 30.0)
            },
        );
        let base = Instant::now();
        engine.create_stream(StreamId::from("live"), ContainerSize::new(800.0, 100.0));

        let mut owner = event("live", "o", "owner");
        owner.avatar_ref = Some("https://example.invalid/a.png".to_string());
        let outcome = engine.ingest(&owner, base);
        let admission = outcome.admission().expect("admitted");
        assert!(admission.style.show_avatar);
        assert!((admission.slot.width - 150.0).abs() < EPSILON);
        assert_eq!(admission.style.color, scenario_settings().color_owner);

        let mut normal = event("live", "n", "normal");
        normal.avatar_ref = Some("https://example.invalid/b.png".to_string());
        let outcome = engine.ingest(&normal, base);
        assert!(!outcome.admission().expect("admitted").style.show_avatar);
    }

    #[test]
    fn lowering_max_messages_only_caps_future_admissions() {
        let settings = FlowSettings {
            max_messages: 50,
            ..scenario_settings()
        };
        let mut engine = fixed_engine(settings.clone(), 10.0, 5.0);
        let base = Instant::now();
        engine.create_stream(StreamId::from("live"), ContainerSize::new(800.0, 1_000.0));
        for index in 0..20 {
            assert!(engine
                .ingest(&event("live", &format!("m{index}"), "normal"), base)
                .is_admitted());
        }

        let handle = SettingsHandle::new(settings.clone());
        handle.publish(FlowSettings {
            max_messages: 5,
            ..settings
        });
        assert!(engine.sync_settings(&handle));
        assert!(!engine.sync_settings(&handle));
        assert_eq!(engine.active_slots(), 20);
        assert_eq!(
            engine.ingest(&event("live", "late", "normal"), base).rejection(),
            Some(Rejection::AtCapacity)
        );
    }

    #[test]
    fn display_time_change_leaves_in_flight_speed() {
        let mut engine = fixed_engine(scenario_settings(), 100.0, 30.0);
        let base = Instant::now();
        engine.create_stream(StreamId::from("live"), ContainerSize::new(800.0, 100.0));
        engine.ingest(&event("live", "a", "normal"), base);

        engine.apply_settings(FlowSettings {
            display_time: 4.0,
            ..scenario_settings()
        });
        let report = engine.tick(base + Duration::from_secs(2));
        assert!((report.moved[0].x - 600.0).abs() < EPSILON);

        let fast = engine.ingest(&event("live", "b", "normal"), base + Duration::from_secs(2));
        let slot = &fast.admission().expect("admitted").slot;
        assert!((slot.speed - 200.0).abs() < EPSILON);
        assert!((slot.top - 34.0).abs() < EPSILON);
    }

    #[test]
    fn resume_purges_slots_that_aged_out_while_hidden() {
        let mut engine = fixed_engine(scenario_settings(), 100.0, 30.0);
        let base = Instant::now();
        engine.create_stream(StreamId::from("live"), ContainerSize::new(800.0, 100.0));
        engine.ingest(&event("live", "a", "normal"), base);
        engine.ingest(&event("live", "b", "normal"), base + Duration::from_secs(5));

        let report = engine.resume(base + Duration::from_secs(9));
        assert_eq!(report.retired_count(RetireReason::Stale), 1);
        assert_eq!(engine.active_slots(), 1);

        let snapshot = engine
            .poll_metrics(base + Duration::from_secs(30))
            .expect("snapshot");
        assert_eq!(snapshot.stale_total, 1);
        assert_eq!(snapshot.admitted_total, 2);
    }

    #[test]
    fn scheduler_stops_when_idle_and_restarts_on_admission() {
        let mut engine = fixed_engine(scenario_settings(), 100.0, 30.0);
        let base = Instant::now();
        engine.create_stream(StreamId::from("live"), ContainerSize::new(800.0, 100.0));
        assert!(!engine.is_running());

        engine.ingest(&event("live", "a", "normal"), base);
        assert!(engine.is_running());

        let report = engine.tick(base + Duration::from_secs(10));
        assert_eq!(report.retired_count(RetireReason::Exited), 1);
        assert!(!engine.is_running());
        assert!(engine.tick(base + Duration::from_secs(11)).is_empty());

        engine.ingest(&event("live", "b", "normal"), base + Duration::from_secs(12));
        assert!(engine.is_running());
    }

    #[test]
    fn deactivate_tears_down_everything() {
        let mut engine = fixed_engine(scenario_settings(), 100.0, 30.0);
        let base = Instant::now();
        engine.create_stream(StreamId::from("a"), ContainerSize::new(800.0, 100.0));
        engine.create_stream(StreamId::from("b"), ContainerSize::new(800.0, 100.0));
        engine.ingest(&event("a", "1", "normal"), base);
        engine.ingest(&event("b", "2", "normal"), base);

        let retired = engine.deactivate();
        assert_eq!(retired.len(), 2);
        assert!(engine.registry().is_empty());
        assert!(!engine.is_running());
    }
}
