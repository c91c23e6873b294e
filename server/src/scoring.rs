//! Scoring engine
//!
//! Applies decoded inbound events to the [`MatchState`]. Each handler runs to
//! completion against the state and reports what must be broadcast, the feed
//! line it appended and the audio cue the event maps to.

use crate::state::MatchState;
use photon_shared::{
    scoring_team, InboundEvent, PlayerId, BASE_CAPTURE_POINTS, FRIENDLY_FIRE_PENALTY, HIT_POINTS,
};

/// Named sound cue for the external audio collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Start,
    End,
    Hit,
    FriendlyFire,
    BaseCapture,
}

impl Cue {
    pub fn name(&self) -> &'static str {
        match self {
            Cue::Start => "start",
            Cue::End => "end",
            Cue::Hit => "hit",
            Cue::FriendlyFire => "friendly-fire",
            Cue::BaseCapture => "base-capture",
        }
    }
}

/// Result of applying one inbound event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Ids to broadcast, in order.
    pub broadcasts: Vec<i32>,
    /// Line appended to the feed, if any.
    pub log: Option<String>,
    pub cue: Option<Cue>,
}

impl Outcome {
    fn logged(state: &mut MatchState, line: String) -> Self {
        state.push_feed(line.clone());
        Self {
            broadcasts: Vec::new(),
            log: Some(line),
            cue: None,
        }
    }

    fn with_cue(mut self, cue: Cue) -> Self {
        self.cue = Some(cue);
        self
    }
}

pub fn apply(state: &mut MatchState, event: &InboundEvent) -> Outcome {
    match event {
        InboundEvent::Hit { attacker, target } => on_hit(state, *attacker, *target),
        InboundEvent::BaseCapture { code, scorer } => on_base_capture(state, *code, *scorer),
        InboundEvent::Malformed { raw, reason } => {
            Outcome::logged(state, format!("Malformed packet {:?} ({})", raw, reason))
        }
        InboundEvent::Unrecognized { .. } => Outcome::default(),
    }
}

fn on_hit(state: &mut MatchState, attacker: PlayerId, target: PlayerId) -> Outcome {
    // The target is echoed even when unknown so the equipment registers the hit
    let mut broadcasts = vec![target];

    let (attacker_team, target_team) = match (state.team_of(attacker), state.team_of(target)) {
        (Some(a), Some(t)) => (a, t),
        _ => {
            let mut outcome = Outcome::logged(
                state,
                format!(
                    "Hit {}:{} ignored, unregistered player",
                    attacker, target
                ),
            )
            .with_cue(Cue::Hit);
            outcome.broadcasts = broadcasts;
            return outcome;
        }
    };

    let (line, cue) = if attacker_team == target_team {
        state.adjust_score(attacker, -FRIENDLY_FIRE_PENALTY);
        state.adjust_score(target, -FRIENDLY_FIRE_PENALTY);
        broadcasts.push(attacker);
        (
            format!(
                "Friendly fire! {} hit teammate {} (-{} each)",
                attacker, target, FRIENDLY_FIRE_PENALTY
            ),
            Cue::FriendlyFire,
        )
    } else {
        state.adjust_score(attacker, HIT_POINTS);
        (
            format!("{} tagged {} (+{})", attacker, target, HIT_POINTS),
            Cue::Hit,
        )
    };

    let mut outcome = Outcome::logged(state, line).with_cue(cue);
    outcome.broadcasts = broadcasts;
    outcome
}

fn on_base_capture(state: &mut MatchState, code: i32, scorer: Option<PlayerId>) -> Outcome {
    let Some(team) = scoring_team(code) else {
        return Outcome::logged(state, format!("Ignored non-base code {}", code));
    };
    let base = team.opponent();

    let Some(scorer) = scorer else {
        return Outcome::logged(
            state,
            format!(
                "{} base captured, scorer unknown; no points awarded",
                capitalize(base.as_str())
            ),
        )
        .with_cue(Cue::BaseCapture);
    };

    // Every attributed base packet plays the base cue, rewarded or not
    match state.team_of(scorer) {
        Some(scorer_team) if scorer_team == team => {
            state.adjust_score(scorer, BASE_CAPTURE_POINTS);
            state.set_base_holder(scorer);

            let mut outcome = Outcome::logged(
                state,
                format!(
                    "{} ({}) captured the {} base (+{})",
                    scorer, team, base, BASE_CAPTURE_POINTS
                ),
            )
            .with_cue(Cue::BaseCapture);
            outcome.broadcasts.push(scorer);
            outcome
        }
        Some(scorer_team) => Outcome::logged(
            state,
            format!(
                "Inconsistent base event: {} is on {}, not {} ({} base)",
                scorer, scorer_team, team, base
            ),
        )
        .with_cue(Cue::BaseCapture),
        None => Outcome::logged(
            state,
            format!(
                "Inconsistent base event: {} is not registered ({} base)",
                scorer, base
            ),
        )
        .with_cue(Cue::BaseCapture),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photon_shared::{Player, Team, GREEN_BASE_CODE, RED_BASE_CODE};

    const GREEN_SCORES: i32 = RED_BASE_CODE;
    const RED_SCORES: i32 = GREEN_BASE_CODE;

    fn state() -> MatchState {
        let mut state = MatchState::new();
        state.add_player(&Player::new(1, "Opus"), Team::Red);
        state.add_player(&Player::new(2, "Scooby"), Team::Red);
        state.add_player(&Player::new(3, "Shark"), Team::Green);
        state.add_player(&Player::new(4, "Bolt"), Team::Green);
        state
    }

    fn hit(attacker: PlayerId, target: PlayerId) -> InboundEvent {
        InboundEvent::Hit { attacker, target }
    }

    fn capture(code: i32, scorer: Option<PlayerId>) -> InboundEvent {
        InboundEvent::BaseCapture { code, scorer }
    }

    #[test]
    fn test_hit_between_unregistered_players() {
        let mut state = MatchState::new();
        let outcome = apply(&mut state, &hit(70, 71));

        assert_eq!(outcome.broadcasts, vec![71]);
        assert_eq!(state.score_of(70), 0);
        assert_eq!(state.score_of(71), 0);
        assert_eq!(state.feed().len(), 1);
        assert_eq!(outcome.cue, Some(Cue::Hit));
    }

    #[test]
    fn test_hit_with_one_unregistered_player() {
        let mut state = state();
        let outcome = apply(&mut state, &hit(1, 99));

        assert_eq!(outcome.broadcasts, vec![99]);
        assert_eq!(state.score_of(1), 0);
        assert_eq!(state.feed().len(), 1);
        assert!(state.feed()[0].contains("unregistered"));
    }

    #[test]
    fn test_cross_team_hit() {
        let mut state = state();
        let outcome = apply(&mut state, &hit(1, 3));

        assert_eq!(state.score_of(1), 10);
        assert_eq!(state.score_of(3), 0);
        assert_eq!(outcome.broadcasts, vec![3]);
        assert_eq!(outcome.cue, Some(Cue::Hit));
        let line = outcome.log.unwrap();
        assert!(line.contains('1') && line.contains('3') && line.contains("+10"));
    }

    #[test]
    fn test_friendly_fire() {
        let mut state = state();
        let outcome = apply(&mut state, &hit(1, 2));

        assert_eq!(state.score_of(1), -10);
        assert_eq!(state.score_of(2), -10);
        assert_eq!(outcome.broadcasts, vec![2, 1]);
        assert_eq!(outcome.cue, Some(Cue::FriendlyFire));
        assert_eq!(state.feed().len(), 1);
        assert!(state.feed()[0].contains("-10"));
    }

    #[test]
    fn test_base_capture_success() {
        let mut state = state();
        let outcome = apply(&mut state, &capture(GREEN_SCORES, Some(3)));

        assert_eq!(state.score_of(3), 100);
        assert_eq!(state.score_of(4), 0);
        assert_eq!(state.base_holder(), Some(3));
        assert_eq!(outcome.broadcasts, vec![3]);
        assert_eq!(outcome.cue, Some(Cue::BaseCapture));
    }

    #[test]
    fn test_base_capture_replaces_previous_holder() {
        let mut state = state();
        apply(&mut state, &capture(GREEN_SCORES, Some(3)));
        apply(&mut state, &capture(RED_SCORES, Some(1)));

        assert_eq!(state.base_holder(), Some(1));
        assert_eq!(state.score_of(1), 100);
        assert_eq!(state.score_of(3), 100);
    }

    #[test]
    fn test_base_capture_wrong_team() {
        let mut state = state();
        apply(&mut state, &capture(RED_SCORES, Some(1)));
        let outcome = apply(&mut state, &capture(GREEN_SCORES, Some(2)));

        assert_eq!(state.score_of(2), 0);
        assert_eq!(state.base_holder(), Some(1));
        assert!(outcome.broadcasts.is_empty());
        assert_eq!(outcome.cue, Some(Cue::BaseCapture));
        assert_eq!(state.feed().len(), 2);
        assert!(state.feed()[1].contains("Inconsistent"));
    }

    #[test]
    fn test_base_capture_unknown_scorer() {
        let mut state = state();
        let outcome = apply(&mut state, &capture(RED_SCORES, Some(42)));

        assert!(outcome.broadcasts.is_empty());
        assert_eq!(state.base_holder(), None);
        assert_eq!(outcome.cue, Some(Cue::BaseCapture));
        assert!(outcome.log.unwrap().contains("Inconsistent"));
    }

    #[test]
    fn test_base_capture_without_scorer() {
        let mut state = state();
        let outcome = apply(&mut state, &capture(GREEN_SCORES, None));

        assert!(outcome.broadcasts.is_empty());
        assert_eq!(state.team_total(Team::Green), 0);
        assert_eq!(state.base_holder(), None);
        assert!(outcome.log.unwrap().contains("scorer unknown"));
        assert_eq!(outcome.cue, Some(Cue::BaseCapture));
    }

    #[test]
    fn test_malformed_logged() {
        let mut state = state();
        let outcome = apply(
            &mut state,
            &InboundEvent::Malformed {
                raw: "garbage".to_string(),
                reason: "invalid code".to_string(),
            },
        );

        assert!(outcome.broadcasts.is_empty());
        assert_eq!(outcome.cue, None);
        assert!(state.feed()[0].contains("garbage"));
        assert!(state.feed()[0].contains("invalid code"));
    }

    #[test]
    fn test_unrecognized_is_ignored() {
        let mut state = state();
        let outcome = apply(&mut state, &InboundEvent::Unrecognized { code: 17 });

        assert_eq!(outcome, Outcome::default());
        assert!(outcome.log.is_none());
        assert!(state.feed().is_empty());
    }

    #[test]
    fn test_cue_names() {
        assert_eq!(Cue::FriendlyFire.name(), "friendly-fire");
        assert_eq!(Cue::BaseCapture.name(), "base-capture");
    }
}
