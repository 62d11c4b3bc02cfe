//! # Attention-State Engine
//!
//! Composes the safety gate pipeline, the area state machine, the
//! governance overlay, and the distribution channel into one per-cycle
//! evaluation loop. The engine is the only writer of area state and the
//! only publisher into the channel; everything a consumer sees has passed
//! through `run_cycle`.

pub mod errors;

pub use errors::{EngineError, EngineResult};

use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::audit::{AuditLog, PolicyAuditRecord};
use crate::config::EngineConfig;
use crate::disclosure::CandidateDisclosure;
use crate::governance::{
    annotate, explain_silence, perturbed_profile, CoordinationDetector, CoordinationSeverity,
    SilenceExplanation,
};
use crate::lifecycle::{
    AreaRegistry, AreaState, LifecycleError, LifecycleSnapshot, TransitionOutcome,
};
use crate::observability::Logger;
use crate::policy::{apply_safety_policy, scrub_pii, PolicyVerdict, ThresholdProfile};
use crate::realtime::{ChannelEvent, DeliveryFilter, Dispatcher, EventType};
use crate::tier::Tier;

/// Arrival timestamps retained per area for cadence analysis.
const ARRIVAL_HISTORY_CAP: usize = 32;

/// Counters for one evaluation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Candidates that reached the gate pipeline.
    pub evaluated: usize,
    /// Candidates that passed every gate.
    pub passed: usize,
    /// Candidates blocked by a gate.
    pub blocked: usize,
    /// Candidates rejected before evaluation (malformed, unconfigured area).
    pub rejected: usize,
    /// Candidates superseded by a newer one for the same area.
    pub superseded: usize,
    /// Areas whose state changed this cycle.
    pub transitions: usize,
    /// Cluster updates published into the channel.
    pub published: usize,
    /// Alerts published for newly elevated areas.
    pub alerts: usize,
}

/// The governed engine: per-cycle evaluation plus operator surface.
pub struct Engine {
    config: EngineConfig,
    profile: ThresholdProfile,
    registry: AreaRegistry,
    audit: Arc<dyn AuditLog>,
    dispatcher: Arc<Dispatcher>,
    detector: CoordinationDetector,
    arrivals: Mutex<HashMap<String, VecDeque<(DateTime<Utc>, i64)>>>,
    last_verdicts: Mutex<HashMap<String, PolicyVerdict>>,
}

impl Engine {
    /// Build the engine from a validated configuration.
    pub fn new(config: EngineConfig, audit: Arc<dyn AuditLog>) -> EngineResult<Self> {
        config.validate()?;
        let profile = config.profile()?;
        let filter = DeliveryFilter::new(config.tier_delays.clone(), &config.forbidden_terms)?;
        let dispatcher = Arc::new(Dispatcher::new(filter, config.rate_cap_per_min));
        let registry = AreaRegistry::new(&config.areas);
        let detector = CoordinationDetector::new(config.coordination.clone());

        Ok(Self {
            config,
            profile,
            registry,
            audit,
            dispatcher,
            detector,
            arrivals: Mutex::new(HashMap::new()),
            last_verdicts: Mutex::new(HashMap::new()),
        })
    }

    /// Shared handle to the distribution channel, for the network layer.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one batch of candidates against every configured area.
    ///
    /// Every candidate leaves a trace in the audit log, including
    /// duplicates and rejects. Areas with no candidate this cycle still
    /// run a transition so quiet decay and overrides take effect.
    pub fn run_cycle(
        &self,
        candidates: Vec<CandidateDisclosure>,
        now: DateTime<Utc>,
    ) -> EngineResult<CycleReport> {
        let mut report = CycleReport::default();
        let mut by_area: HashMap<String, CandidateDisclosure> = HashMap::new();

        for candidate in candidates {
            if !self.registry.contains(&candidate.area_key) {
                self.audit.append(&PolicyAuditRecord::rejected(
                    candidate.area_key.clone(),
                    now,
                    "unconfigured area",
                ))?;
                report.rejected += 1;
                continue;
            }
            // Latest signal wins; the loser is audited as superseded.
            match by_area.entry(candidate.area_key.clone()) {
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    let superseded = if candidate.latest_signal_time
                        >= slot.get().latest_signal_time
                    {
                        slot.insert(candidate)
                    } else {
                        candidate
                    };
                    self.audit.append(&PolicyAuditRecord::rejected(
                        superseded.area_key.clone(),
                        now,
                        "superseded by newer candidate",
                    ))?;
                    report.superseded += 1;
                }
            }
        }

        for area_id in self.registry.area_ids() {
            match by_area.remove(&area_id) {
                Some(candidate) => self.evaluate_area(&area_id, candidate, now, &mut report)?,
                None => {
                    self.last_verdicts
                        .lock()
                        .map_err(|_| EngineError::Internal("verdict lock poisoned".into()))?
                        .remove(&area_id);
                    let outcome = self.transition(&area_id, None, &self.profile, now)?;
                    if outcome.changed {
                        report.transitions += 1;
                    }
                }
            }
        }

        self.publish_heatmap(now)?;
        self.publish_pipeline_status(&report, now)?;
        Logger::info(
            "cycle_complete",
            &[
                ("evaluated", &report.evaluated.to_string()),
                ("passed", &report.passed.to_string()),
                ("published", &report.published.to_string()),
                ("transitions", &report.transitions.to_string()),
            ],
        );
        Ok(report)
    }

    fn evaluate_area(
        &self,
        area_id: &str,
        candidate: CandidateDisclosure,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> EngineResult<()> {
        if let Err(e) = candidate.validate() {
            self.audit
                .append(&PolicyAuditRecord::rejected(area_id, now, e.to_string()))?;
            report.rejected += 1;
            // A malformed candidate counts as no candidate for the area.
            let outcome = self.transition(area_id, None, &self.profile, now)?;
            if outcome.changed {
                report.transitions += 1;
            }
            return Ok(());
        }

        let (arrivals, source_counts) =
            self.record_arrival(area_id, candidate.source_count as i64, now)?;

        // Per-area, per-day thresholds.
        let day_profile = perturbed_profile(
            &self.profile,
            &self.config.perturbation_seed,
            now.date_naive(),
            area_id,
        );

        let verdict = apply_safety_policy(&candidate, &day_profile, now)?;

        // Cadence over arrival times; the aggregator attaches no per-signal
        // attribution, so dominance rests on the per-aggregate source counts.
        let coordination = self.detector.analyze(&arrivals, &[], &source_counts);
        let override_installed = self.detector.installs_override(&coordination);
        if override_installed {
            self.registry.with_area(area_id, |lifecycle| {
                lifecycle.set_override("coordinated signal pattern detected")
            })?;
            Logger::warn("coordination_override", &[("area", area_id)]);
        } else if coordination.severity == CoordinationSeverity::Advisory {
            Logger::warn("coordination_advisory", &[("area", area_id)]);
        }

        let mut record = PolicyAuditRecord::from_verdict(area_id, now, &verdict);
        if override_installed {
            record = record.with_note("safety override installed: coordinated signal pattern");
        }
        self.audit.append(&record)?;
        report.evaluated += 1;
        if verdict.passed {
            report.passed += 1;
        } else {
            report.blocked += 1;
        }

        let outcome =
            self.transition(area_id, Some((&candidate, &verdict)), &day_profile, now)?;
        if outcome.changed {
            report.transitions += 1;
        }

        self.last_verdicts
            .lock()
            .map_err(|_| EngineError::Internal("verdict lock poisoned".into()))?
            .insert(area_id.to_string(), verdict.clone());

        if verdict.passed && outcome.state.is_visible() {
            self.publish_cluster_update(area_id, &candidate, &outcome.state, now)?;
            report.published += 1;

            if outcome.changed && outcome.state == AreaState::ElevatedAttention {
                self.publish_alert(area_id, &candidate, now)?;
                report.alerts += 1;
            }
        }

        Ok(())
    }

    fn transition(
        &self,
        area_id: &str,
        evaluated: Option<(&CandidateDisclosure, &PolicyVerdict)>,
        profile: &ThresholdProfile,
        now: DateTime<Utc>,
    ) -> EngineResult<TransitionOutcome> {
        Ok(self.registry.with_area(area_id, |lifecycle| {
            lifecycle.transition(
                evaluated,
                profile,
                self.config.elevated_volume_threshold,
                self.config.quiet_decay,
                now,
            )
        })?)
    }

    fn record_arrival(
        &self,
        area_id: &str,
        source_count: i64,
        now: DateTime<Utc>,
    ) -> EngineResult<(Vec<DateTime<Utc>>, Vec<i64>)> {
        let mut arrivals = self
            .arrivals
            .lock()
            .map_err(|_| EngineError::Internal("arrival lock poisoned".into()))?;
        let history = arrivals.entry(area_id.to_string()).or_default();
        history.push_back((now, source_count));
        while history.len() > ARRIVAL_HISTORY_CAP {
            history.pop_front();
        }
        Ok(history.iter().copied().unzip())
    }

    fn publish_cluster_update(
        &self,
        area_id: &str,
        candidate: &CandidateDisclosure,
        state: &AreaState,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let uncertainty = annotate(candidate, now);
        let data = json!({
            "area": area_id,
            "state": state.state_name(),
            "size": candidate.size,
            "source_count": candidate.source_count,
            "volume_score": candidate.volume_score,
            "summary": scrub_pii(&candidate.summary_text),
            "uncertainty": uncertainty,
        });
        let event = ChannelEvent::cluster_update(area_id, candidate.latest_signal_time, data);
        self.dispatcher.publish(&event, now)?;
        Ok(())
    }

    fn publish_alert(
        &self,
        area_id: &str,
        candidate: &CandidateDisclosure,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let data = json!({
            "area": area_id,
            "state": AreaState::ElevatedAttention.state_name(),
            "volume_score": candidate.volume_score,
            "summary": scrub_pii(&candidate.summary_text),
        });
        let event = ChannelEvent::alert(area_id, candidate.latest_signal_time, data);
        self.dispatcher.publish(&event, now)?;
        Ok(())
    }

    /// Whole-map view after the cycle: every area's state plus a silence
    /// explanation for each non-visible area.
    fn publish_heatmap(&self, now: DateTime<Utc>) -> EngineResult<()> {
        let verdicts = self
            .last_verdicts
            .lock()
            .map_err(|_| EngineError::Internal("verdict lock poisoned".into()))?;
        let mut areas = Vec::with_capacity(self.registry.len());
        let mut silence = Vec::new();
        for area_id in self.registry.area_ids() {
            let state = self
                .registry
                .with_area(&area_id, |lifecycle| lifecycle.current_state().clone())?;
            areas.push(json!({"area": area_id, "state": state.state_name()}));
            if !state.is_visible() {
                silence.push(explain_silence(&area_id, &state, verdicts.get(&area_id)));
            }
        }
        drop(verdicts);

        let data = json!({"areas": areas, "silence": silence});
        let event = ChannelEvent::new(EventType::HeatmapRefresh, None, now, data);
        self.dispatcher.publish(&event, now)?;
        Ok(())
    }

    fn publish_pipeline_status(
        &self,
        report: &CycleReport,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let data = json!({
            "evaluated": report.evaluated,
            "passed": report.passed,
            "blocked": report.blocked,
            "rejected": report.rejected,
            "transitions": report.transitions,
        });
        let event = ChannelEvent::new(EventType::PipelineStatus, None, now, data);
        self.dispatcher.publish(&event, now)?;
        Ok(())
    }

    /// Snapshot every area as seen by one tier, sorted by area key.
    pub fn snapshots(&self, tier: Tier) -> EngineResult<Vec<LifecycleSnapshot>> {
        let delay = self.config.tier_delays.for_tier(tier);
        let mut snaps = Vec::with_capacity(self.registry.len());
        for area_id in self.registry.area_ids() {
            snaps.push(
                self.registry
                    .with_area(&area_id, |lifecycle| lifecycle.snapshot(tier, delay))?,
            );
        }
        Ok(snaps)
    }

    /// Structured silence explanations for every area with no visible
    /// disclosure.
    pub fn silence_views(&self) -> EngineResult<Vec<SilenceExplanation>> {
        let verdicts = self
            .last_verdicts
            .lock()
            .map_err(|_| EngineError::Internal("verdict lock poisoned".into()))?;
        let mut views = Vec::new();
        for area_id in self.registry.area_ids() {
            let state = self
                .registry
                .with_area(&area_id, |lifecycle| lifecycle.current_state().clone())?;
            if state.is_visible() {
                continue;
            }
            views.push(explain_silence(&area_id, &state, verdicts.get(&area_id)));
        }
        Ok(views)
    }

    /// Operator-forced state change. Tier 2 only.
    pub fn force_area_state(
        &self,
        tier: Tier,
        area_id: &str,
        state: AreaState,
        reason: &str,
        operator: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<TransitionOutcome> {
        if tier != Tier::Moderator {
            return Err(LifecycleError::ForbiddenForce(tier).into());
        }
        let outcome = self
            .registry
            .with_area(area_id, |lifecycle| {
                lifecycle.force_state(state, reason, operator, now)
            })?;
        Logger::warn(
            "forced_state",
            &[
                ("area", area_id),
                ("operator", operator),
                ("state", outcome.state.state_name()),
            ],
        );
        Ok(outcome)
    }

    /// Operator release of an area's safety override. Tier 2 only.
    pub fn release_override(
        &self,
        tier: Tier,
        area_id: &str,
        operator: &str,
    ) -> EngineResult<()> {
        if tier != Tier::Moderator {
            return Err(LifecycleError::ForbiddenForce(tier).into());
        }
        self.registry
            .with_area(area_id, |lifecycle| lifecycle.clear_override())?;
        Logger::warn(
            "override_released",
            &[("area", area_id), ("operator", operator)],
        );
        Ok(())
    }
}
