//! Authoritative match record: rosters, scores, base holder and the event feed

use crate::clock::Phase;
use photon_shared::{Player, PlayerId, Team};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// One line of a team roster as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterRow {
    pub id: PlayerId,
    pub codename: String,
    pub score: i32,
    pub holds_base: bool,
}

/// Read-only copy of the match handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSnapshot {
    pub teams: BTreeMap<PlayerId, Team>,
    pub codenames: BTreeMap<PlayerId, String>,
    pub scores: BTreeMap<PlayerId, i32>,
    pub base_holder: Option<PlayerId>,
    pub feed: Vec<String>,
    pub phase: Phase,
    pub remaining_secs: u64,
    pub red_total: i32,
    pub green_total: i32,
    pub leader: Option<Team>,
    pub red_roster: Vec<RosterRow>,
    pub green_roster: Vec<RosterRow>,
}

impl MatchSnapshot {
    pub fn roster(&self, team: Team) -> &[RosterRow] {
        match team {
            Team::Red => &self.red_roster,
            Team::Green => &self.green_roster,
        }
    }

    pub fn total(&self, team: Team) -> i32 {
        match team {
            Team::Red => self.red_total,
            Team::Green => self.green_total,
        }
    }
}

/// Pure data; every mutation goes through the scoring engine or registration.
#[derive(Debug, Clone, Default)]
pub struct MatchState {
    team: HashMap<PlayerId, Team>,
    codename: HashMap<PlayerId, String>,
    score: HashMap<PlayerId, i32>,
    base_holder: Option<PlayerId>,
    feed: Vec<String>,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a player to `team`, or moves an already rostered player there.
    /// An existing score is kept.
    pub fn add_player(&mut self, player: &Player, team: Team) {
        self.team.insert(player.id, team);
        self.codename.insert(player.id, player.codename.clone());
        self.score.entry(player.id).or_insert(0);
    }

    pub fn team_of(&self, id: PlayerId) -> Option<Team> {
        self.team.get(&id).copied()
    }

    pub fn codename_of(&self, id: PlayerId) -> Option<&str> {
        self.codename.get(&id).map(String::as_str)
    }

    pub fn score_of(&self, id: PlayerId) -> i32 {
        self.score.get(&id).copied().unwrap_or(0)
    }

    pub fn adjust_score(&mut self, id: PlayerId, delta: i32) {
        *self.score.entry(id).or_insert(0) += delta;
    }

    pub fn base_holder(&self) -> Option<PlayerId> {
        self.base_holder
    }

    /// Replaces any previous holder.
    pub fn set_base_holder(&mut self, id: PlayerId) {
        self.base_holder = Some(id);
    }

    pub fn push_feed(&mut self, line: impl Into<String>) {
        self.feed.push(line.into());
    }

    pub fn feed(&self) -> &[String] {
        &self.feed
    }

    /// The most recent `n` feed lines, oldest first.
    pub fn feed_tail(&self, n: usize) -> &[String] {
        let start = self.feed.len().saturating_sub(n);
        &self.feed[start..]
    }

    pub fn player_count(&self) -> usize {
        self.team.len()
    }

    pub fn team_size(&self, team: Team) -> usize {
        self.team.values().filter(|t| **t == team).count()
    }

    pub fn team_total(&self, team: Team) -> i32 {
        self.team
            .iter()
            .filter(|(_, t)| **t == team)
            .map(|(id, _)| self.score_of(*id))
            .sum()
    }

    /// Team with the higher total, `None` on a tie.
    pub fn leader(&self) -> Option<Team> {
        let red = self.team_total(Team::Red);
        let green = self.team_total(Team::Green);
        match red.cmp(&green) {
            std::cmp::Ordering::Greater => Some(Team::Red),
            std::cmp::Ordering::Less => Some(Team::Green),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Roster rows for `team`, highest score first, ties by id.
    pub fn roster(&self, team: Team) -> Vec<RosterRow> {
        let mut rows: Vec<RosterRow> = self
            .team
            .iter()
            .filter(|(_, t)| **t == team)
            .map(|(id, _)| RosterRow {
                id: *id,
                codename: self.codename_of(*id).unwrap_or_default().to_string(),
                score: self.score_of(*id),
                holds_base: self.base_holder == Some(*id),
            })
            .collect();

        rows.sort_by_key(|row| (Reverse(row.score), row.id));
        rows
    }

    pub fn snapshot(&self, phase: Phase, remaining_secs: u64, feed_tail: usize) -> MatchSnapshot {
        MatchSnapshot {
            teams: self.team.iter().map(|(id, t)| (*id, *t)).collect(),
            codenames: self
                .codename
                .iter()
                .map(|(id, name)| (*id, name.clone()))
                .collect(),
            scores: self
                .team
                .keys()
                .map(|id| (*id, self.score_of(*id)))
                .collect(),
            base_holder: self.base_holder,
            feed: self.feed_tail(feed_tail).to_vec(),
            phase,
            remaining_secs,
            red_total: self.team_total(Team::Red),
            green_total: self.team_total(Team::Green),
            leader: self.leader(),
            red_roster: self.roster(Team::Red),
            green_roster: self.roster(Team::Green),
        }
    }
}
