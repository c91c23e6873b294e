//! Player directory seam
//!
//! The relational player store lives outside this crate. The match server only
//! needs `find` and `create`; [`InMemoryDirectory`] backs the binary and tests.

use photon_shared::{Player, PlayerId, Team};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("player {0} already exists")]
    AlreadyExists(PlayerId),

    #[error("codename must not be empty")]
    EmptyCodename,

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("player {0} is new, a codename is required")]
    CodenameRequired(PlayerId),

    #[error("{team} team is full ({limit} players)")]
    TeamFull { team: Team, limit: usize },

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

pub trait PlayerDirectory: Send {
    fn find(&self, id: PlayerId) -> Result<Option<Player>, DirectoryError>;
    fn create(&mut self, id: PlayerId, codename: &str) -> Result<Player, DirectoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    players: HashMap<PlayerId, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_players<I>(players: I) -> Self
    where
        I: IntoIterator<Item = Player>,
    {
        Self {
            players: players.into_iter().map(|p| (p.id, p.codename)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl PlayerDirectory for InMemoryDirectory {
    fn find(&self, id: PlayerId) -> Result<Option<Player>, DirectoryError> {
        Ok(self
            .players
            .get(&id)
            .map(|codename| Player::new(id, codename.clone())))
    }

    fn create(&mut self, id: PlayerId, codename: &str) -> Result<Player, DirectoryError> {
        let codename = codename.trim();
        if codename.is_empty() {
            return Err(DirectoryError::EmptyCodename);
        }
        if self.players.contains_key(&id) {
            return Err(DirectoryError::AlreadyExists(id));
        }

        self.players.insert(id, codename.to_string());
        Ok(Player::new(id, codename))
    }
}

/// Looks a player up, creating the record when a codename is supplied for an unseen id.
///
/// A known player keeps the codename stored in the directory.
pub fn resolve_player(
    directory: &mut dyn PlayerDirectory,
    id: PlayerId,
    codename: Option<&str>,
) -> Result<Player, RegistrationError> {
    if let Some(player) = directory.find(id)? {
        return Ok(player);
    }

    match codename.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => Ok(directory.create(id, name)?),
        None => Err(RegistrationError::CodenameRequired(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_existing() {
        let directory = InMemoryDirectory::with_players(vec![Player::new(1, "Opus")]);
        assert_eq!(directory.find(1), Ok(Some(Player::new(1, "Opus"))));
        assert_eq!(directory.find(2), Ok(None));
    }

    #[test]
    fn test_create_rejects_duplicates_and_empty_names() {
        let mut directory = InMemoryDirectory::new();
        assert_eq!(directory.create(5, " Ghost "), Ok(Player::new(5, "Ghost")));
        assert_eq!(
            directory.create(5, "Other"),
            Err(DirectoryError::AlreadyExists(5))
        );
        assert_eq!(directory.create(6, "  "), Err(DirectoryError::EmptyCodename));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_resolve_known_player_ignores_codename() {
        let mut directory = InMemoryDirectory::with_players(vec![Player::new(1, "Opus")]);
        let player = resolve_player(&mut directory, 1, Some("Renamed")).unwrap();
        assert_eq!(player, Player::new(1, "Opus"));
    }

    #[test]
    fn test_resolve_creates_new_player() {
        let mut directory = InMemoryDirectory::new();
        let player = resolve_player(&mut directory, 9, Some("Viper")).unwrap();
        assert_eq!(player, Player::new(9, "Viper"));
        assert_eq!(directory.find(9), Ok(Some(Player::new(9, "Viper"))));
    }

    #[test]
    fn test_resolve_requires_codename_for_new_player() {
        let mut directory = InMemoryDirectory::new();
        assert_eq!(
            resolve_player(&mut directory, 9, None),
            Err(RegistrationError::CodenameRequired(9))
        );
        assert_eq!(
            resolve_player(&mut directory, 9, Some("   ")),
            Err(RegistrationError::CodenameRequired(9))
        );
        assert!(directory.is_empty());
    }

    struct BrokenDirectory;

    impl PlayerDirectory for BrokenDirectory {
        fn find(&self, _id: PlayerId) -> Result<Option<Player>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }

        fn create(&mut self, _id: PlayerId, _codename: &str) -> Result<Player, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_resolve_surfaces_directory_failure() {
        let result = resolve_player(&mut BrokenDirectory, 1, Some("Opus"));
        assert!(matches!(
            result,
            Err(RegistrationError::Directory(DirectoryError::Unavailable(_)))
        ));
    }
}
