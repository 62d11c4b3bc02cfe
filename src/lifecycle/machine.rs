//! # Area State Machine
//!
//! Converts the per-cycle stream of gate evaluations into an auditable
//! lifecycle state for one area. One instance per area for process
//! lifetime; mutated only through `transition`, `force_state`, and the
//! override setters; never deleted, only reset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::state::{AreaState, TransitionRecord};
use crate::disclosure::CandidateDisclosure;
use crate::policy::{GateName, PolicyVerdict, ThresholdProfile};
use crate::tier::Tier;

/// What happens to a `QUIET` area once candidates stop arriving.
///
/// The source behavior was unspecified, so this is policy rather than a
/// hard-coded guess.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QuietDecayPolicy {
    /// A candidate-free cycle resolves straight to `NO_DATA`.
    #[default]
    Immediate,
    /// `QUIET` persists indefinitely without candidates.
    Persist,
    /// `QUIET` decays to `NO_DATA` once the last transition is older than
    /// the horizon.
    DecayAfter { hours: i64 },
}

/// Outcome of one transition cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// Whether a new history entry was appended.
    pub changed: bool,

    /// Resolved state after the cycle.
    pub state: AreaState,
}

/// Point-in-time view of one area for one consumer tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSnapshot {
    pub area_id: String,
    pub tier: String,
    #[serde(flatten)]
    pub current_state: AreaState,
    pub delay_hours: i64,
    pub safety_override_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<DateTime<Utc>>,
    pub transition_count: usize,
}

/// Per-area lifecycle record and transition logic.
#[derive(Debug, Clone)]
pub struct AreaLifecycle {
    area_id: String,
    current_state: AreaState,
    last_transition: Option<DateTime<Utc>>,
    history: Vec<TransitionRecord>,
    safety_override_active: bool,
    override_reason: Option<String>,
}

impl AreaLifecycle {
    /// New record in the initial `NO_DATA` state.
    pub fn new(area_id: impl Into<String>) -> Self {
        Self {
            area_id: area_id.into(),
            current_state: AreaState::NoData,
            last_transition: None,
            history: Vec::new(),
            safety_override_active: false,
            override_reason: None,
        }
    }

    pub fn area_id(&self) -> &str {
        &self.area_id
    }

    pub fn current_state(&self) -> &AreaState {
        &self.current_state
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn safety_override_active(&self) -> bool {
        self.safety_override_active
    }

    pub fn override_reason(&self) -> Option<&str> {
        self.override_reason.as_deref()
    }

    /// Install the safety override. Takes effect on the next transition.
    pub fn set_override(&mut self, reason: impl Into<String>) {
        self.safety_override_active = true;
        self.override_reason = Some(reason.into());
    }

    /// Clear the safety override. The next transition resolves normally.
    pub fn clear_override(&mut self) {
        self.safety_override_active = false;
        self.override_reason = None;
    }

    /// Run one transition cycle for this area.
    ///
    /// `evaluated` carries this cycle's candidate together with its policy
    /// verdict, or `None` when no candidate arrived. A transition is
    /// recorded only when the resolved state differs from the current one;
    /// re-entering the same state refreshes its payload without appending
    /// history.
    pub fn transition(
        &mut self,
        evaluated: Option<(&CandidateDisclosure, &PolicyVerdict)>,
        profile: &ThresholdProfile,
        elevated_threshold: f64,
        decay: QuietDecayPolicy,
        now: DateTime<Utc>,
    ) -> TransitionOutcome {
        let (resolved, trigger) = self.resolve(evaluated, profile, elevated_threshold, decay, now);
        self.apply(resolved, trigger, now)
    }

    /// Tier-2 operators may force an arbitrary state with an authenticated
    /// reason. The only externally triggerable transition that bypasses the
    /// per-cycle resolution.
    pub fn force_state(
        &mut self,
        state: AreaState,
        reason: &str,
        operator: &str,
        now: DateTime<Utc>,
    ) -> TransitionOutcome {
        let trigger = format!("forced by {operator}: {reason}");
        self.apply(state, trigger, now)
    }

    /// Reset to the initial state, clearing any override. History is
    /// append-only and survives the reset.
    pub fn reset(&mut self, operator: &str, now: DateTime<Utc>) -> TransitionOutcome {
        self.clear_override();
        self.apply(AreaState::NoData, format!("reset by {operator}"), now)
    }

    /// Snapshot for one consumer tier.
    pub fn snapshot(&self, tier: Tier, delay_hours: i64) -> LifecycleSnapshot {
        LifecycleSnapshot {
            area_id: self.area_id.clone(),
            tier: tier.as_str().to_string(),
            current_state: self.current_state.clone(),
            delay_hours,
            safety_override_active: self.safety_override_active,
            last_transition: self.last_transition,
            transition_count: self.history.len(),
        }
    }

    fn resolve(
        &self,
        evaluated: Option<(&CandidateDisclosure, &PolicyVerdict)>,
        profile: &ThresholdProfile,
        elevated_threshold: f64,
        decay: QuietDecayPolicy,
        now: DateTime<Utc>,
    ) -> (AreaState, String) {
        // Step 1: an active override preempts everything.
        if self.safety_override_active {
            let reason = self
                .override_reason
                .clone()
                .unwrap_or_else(|| "safety override".to_string());
            return (AreaState::DataDelayedForSafety { reason }, "safety_override".to_string());
        }

        // Step 2: no candidate.
        let Some((candidate, verdict)) = evaluated else {
            if self.current_state == AreaState::Quiet {
                let stays_quiet = match decay {
                    QuietDecayPolicy::Immediate => false,
                    QuietDecayPolicy::Persist => true,
                    QuietDecayPolicy::DecayAfter { hours } => self
                        .last_transition
                        .map(|at| now - at < Duration::hours(hours))
                        .unwrap_or(false),
                };
                if stays_quiet {
                    return (AreaState::Quiet, "no_candidate".to_string());
                }
            }
            return (AreaState::NoData, "no_candidate".to_string());
        };

        // Step 3: still inside the mandatory delay window.
        if !verdict
            .gate(GateName::TimeDelay)
            .map(|g| g.passed)
            .unwrap_or(true)
        {
            let remaining_mins =
                profile.delay_hours * 60 - candidate.age(now).num_minutes().max(0);
            let hours_remaining = (remaining_mins.max(0) + 59) / 60;
            return (
                AreaState::Buffering { hours_remaining },
                "time_delay".to_string(),
            );
        }

        // Step 4: any other gate failure. QUIET when attention existed
        // before, NO_DATA when it never did.
        if let Some(blocked) = verdict.blocked_reason {
            let state = if self.current_state.was_active() {
                AreaState::Quiet
            } else {
                AreaState::NoData
            };
            return (state, format!("blocked:{blocked}"));
        }

        // Step 5: disclosed. Classify by volume.
        if candidate.volume_score >= elevated_threshold {
            (AreaState::ElevatedAttention, "elevated_volume".to_string())
        } else {
            (AreaState::LowActivity, "visible".to_string())
        }
    }

    fn apply(&mut self, resolved: AreaState, trigger: String, now: DateTime<Utc>) -> TransitionOutcome {
        if self.current_state.same_state(&resolved) {
            // Same named state: refresh the payload (e.g. hours remaining)
            // without recording a transition.
            self.current_state = resolved.clone();
            return TransitionOutcome {
                changed: false,
                state: resolved,
            };
        }

        self.history.push(TransitionRecord {
            from: self.current_state.state_name().to_string(),
            to: resolved.state_name().to_string(),
            at: now,
            trigger,
        });
        self.last_transition = Some(now);
        self.current_state = resolved.clone();
        TransitionOutcome {
            changed: true,
            state: resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::apply_safety_policy;

    fn candidate(now: DateTime<Utc>, age_hours: i64) -> CandidateDisclosure {
        CandidateDisclosure {
            area_key: "10115".to_string(),
            size: 5,
            source_count: 3,
            volume_score: 1.5,
            earliest_signal_time: now - Duration::hours(age_hours + 24),
            latest_signal_time: now - Duration::hours(age_hours),
            summary_text: "sustained discussion about road closures".to_string(),
            structured_fields: None,
        }
    }

    fn evaluate(
        c: &CandidateDisclosure,
        profile: &ThresholdProfile,
        now: DateTime<Utc>,
    ) -> PolicyVerdict {
        apply_safety_policy(c, profile, now).unwrap()
    }

    fn transition_with(
        machine: &mut AreaLifecycle,
        c: Option<&CandidateDisclosure>,
        now: DateTime<Utc>,
    ) -> TransitionOutcome {
        let profile = ThresholdProfile::production();
        let verdict = c.map(|c| evaluate(c, &profile, now));
        machine.transition(
            c.zip(verdict.as_ref()),
            &profile,
            3.0,
            QuietDecayPolicy::Immediate,
            now,
        )
    }

    // =========================================================================
    // PER-CYCLE RESOLUTION
    // =========================================================================

    #[test]
    fn test_initial_state_is_no_data() {
        let machine = AreaLifecycle::new("10115");
        assert_eq!(machine.current_state(), &AreaState::NoData);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_passing_candidate_reaches_low_activity() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        let c = candidate(now, 48);
        let outcome = transition_with(&mut machine, Some(&c), now);
        assert!(outcome.changed);
        assert_eq!(outcome.state, AreaState::LowActivity);
    }

    #[test]
    fn test_high_volume_reaches_elevated_attention() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        let mut c = candidate(now, 48);
        c.volume_score = 3.5;
        let outcome = transition_with(&mut machine, Some(&c), now);
        assert_eq!(outcome.state, AreaState::ElevatedAttention);
    }

    #[test]
    fn test_recent_candidate_buffers_with_hours_remaining() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        let c = candidate(now, 6);
        let outcome = transition_with(&mut machine, Some(&c), now);
        match outcome.state {
            AreaState::Buffering { hours_remaining } => {
                assert_eq!(hours_remaining, 18);
            }
            other => panic!("expected BUFFERING, got {other:?}"),
        }
    }

    #[test]
    fn test_subsided_attention_goes_quiet_not_no_data() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        transition_with(&mut machine, Some(&candidate(now, 48)), now);
        assert_eq!(machine.current_state(), &AreaState::LowActivity);

        // Next cycle the cluster shrank below k-anonymity.
        let mut small = candidate(now, 48);
        small.size = 1;
        let outcome = transition_with(&mut machine, Some(&small), now);
        assert_eq!(outcome.state, AreaState::Quiet);
    }

    #[test]
    fn test_never_active_area_stays_no_data_on_failure() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        let mut small = candidate(now, 48);
        small.size = 1;
        let outcome = transition_with(&mut machine, Some(&small), now);
        assert_eq!(outcome.state, AreaState::NoData);
        assert!(!outcome.changed);
    }

    #[test]
    fn test_no_candidate_resolves_no_data() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        transition_with(&mut machine, Some(&candidate(now, 48)), now);
        let outcome = transition_with(&mut machine, None, now);
        assert_eq!(outcome.state, AreaState::NoData);
    }

    // =========================================================================
    // IDEMPOTENCE
    // =========================================================================

    #[test]
    fn test_unchanged_candidate_appends_no_history() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        let c = candidate(now, 48);
        transition_with(&mut machine, Some(&c), now);
        let before = machine.history().len();

        let outcome = transition_with(&mut machine, Some(&c), now);
        assert!(!outcome.changed);
        assert_eq!(machine.history().len(), before);
    }

    #[test]
    fn test_buffering_refresh_is_not_a_transition() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        let c = candidate(now, 6);
        transition_with(&mut machine, Some(&c), now);
        let before = machine.history().len();

        // Four hours later, still buffering but with fewer hours remaining.
        let later = now + Duration::hours(4);
        let outcome = transition_with(&mut machine, Some(&c), later);
        assert!(!outcome.changed);
        assert_eq!(machine.history().len(), before);
        match outcome.state {
            AreaState::Buffering { hours_remaining } => assert_eq!(hours_remaining, 14),
            other => panic!("expected BUFFERING, got {other:?}"),
        }
    }

    // =========================================================================
    // SAFETY OVERRIDE
    // =========================================================================

    #[test]
    fn test_override_preempts_valid_transition() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        machine.set_override("coordinated activity detected");

        let c = candidate(now, 48);
        let outcome = transition_with(&mut machine, Some(&c), now);
        match outcome.state {
            AreaState::DataDelayedForSafety { reason } => {
                assert!(reason.contains("coordinated activity"));
            }
            other => panic!("expected DATA_DELAYED_FOR_SAFETY, got {other:?}"),
        }
    }

    #[test]
    fn test_override_clear_restores_normal_resolution() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        machine.set_override("manual hold");
        transition_with(&mut machine, Some(&candidate(now, 48)), now);

        machine.clear_override();
        let outcome = transition_with(&mut machine, Some(&candidate(now, 48)), now);
        assert_eq!(outcome.state, AreaState::LowActivity);
    }

    // =========================================================================
    // QUIET DECAY POLICY
    // =========================================================================

    #[test]
    fn test_quiet_persists_under_persist_policy() {
        let now = Utc::now();
        let profile = ThresholdProfile::production();
        let mut machine = AreaLifecycle::new("10115");
        transition_with(&mut machine, Some(&candidate(now, 48)), now);
        let mut small = candidate(now, 48);
        small.size = 1;
        transition_with(&mut machine, Some(&small), now);
        assert_eq!(machine.current_state(), &AreaState::Quiet);

        let outcome = machine.transition(None, &profile, 3.0, QuietDecayPolicy::Persist, now);
        assert_eq!(outcome.state, AreaState::Quiet);
    }

    #[test]
    fn test_quiet_decays_after_horizon() {
        let now = Utc::now();
        let profile = ThresholdProfile::production();
        let mut machine = AreaLifecycle::new("10115");
        transition_with(&mut machine, Some(&candidate(now, 48)), now);
        let mut small = candidate(now, 48);
        small.size = 1;
        transition_with(&mut machine, Some(&small), now);

        let policy = QuietDecayPolicy::DecayAfter { hours: 12 };
        // Within the horizon: stays quiet.
        let soon = now + Duration::hours(6);
        let outcome = machine.transition(None, &profile, 3.0, policy, soon);
        assert_eq!(outcome.state, AreaState::Quiet);
        // Past the horizon: decays.
        let later = now + Duration::hours(24);
        let outcome = machine.transition(None, &profile, 3.0, policy, later);
        assert_eq!(outcome.state, AreaState::NoData);
    }

    // =========================================================================
    // FORCE AND RESET
    // =========================================================================

    #[test]
    fn test_force_state_records_operator_trigger() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        let outcome = machine.force_state(
            AreaState::ElevatedAttention,
            "verified incident",
            "op-7",
            now,
        );
        assert!(outcome.changed);
        let record = machine.history().last().unwrap();
        assert!(record.trigger.contains("op-7"));
        assert!(record.trigger.contains("verified incident"));
    }

    #[test]
    fn test_force_same_state_is_noop() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        let outcome = machine.force_state(AreaState::NoData, "noop", "op-7", now);
        assert!(!outcome.changed);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_reset_keeps_history() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        machine.set_override("hold");
        machine.force_state(AreaState::ElevatedAttention, "incident", "op-7", now);
        let history_len = machine.history().len();

        let outcome = machine.reset("op-7", now);
        assert_eq!(outcome.state, AreaState::NoData);
        assert!(!machine.safety_override_active());
        assert_eq!(machine.history().len(), history_len + 1);
    }

    // =========================================================================
    // SNAPSHOT
    // =========================================================================

    #[test]
    fn test_snapshot_shape() {
        let now = Utc::now();
        let mut machine = AreaLifecycle::new("10115");
        transition_with(&mut machine, Some(&candidate(now, 48)), now);

        let snap = machine.snapshot(Tier::Public, 72);
        assert_eq!(snap.area_id, "10115");
        assert_eq!(snap.tier, "public");
        assert_eq!(snap.delay_hours, 72);
        assert_eq!(snap.transition_count, 1);
        assert!(!snap.safety_override_active);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["state"], "LOW_ACTIVITY");
    }
}
