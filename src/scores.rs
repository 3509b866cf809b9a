//! Local leaderboard for finished games.
//!
//! Entries are ranked by score, highest first. In the browser the table is
//! kept in LocalStorage; the terminal binary keeps it in a JSON file.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum number of entries to keep
pub const MAX_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Name of the game that produced the score
    pub game: String,
    pub score: u64,
    /// Level or wave reached
    pub level: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<ScoreEntry>,
}

impl Leaderboard {
    #[cfg(target_arch = "wasm32")]
    const STORAGE_KEY: &'static str = "arcade_leaderboard";

    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `score` would earn a place in the table.
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_ENTRIES {
            return true;
        }
        self.entries.last().map(|e| score > e.score).unwrap_or(true)
    }

    /// Record a finished game. Returns the 1-based rank, or `None` if the
    /// score did not make the table.
    pub fn record(&mut self, game: &str, score: u64, level: u32) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }

        let entry = ScoreEntry {
            game: game.to_string(),
            score,
            level,
        };
        // Ties keep the earlier entry ahead
        let rank = match self.entries.iter().position(|e| score > e.score) {
            Some(i) => {
                self.entries.insert(i, entry);
                i + 1
            }
            None => {
                self.entries.push(entry);
                self.entries.len()
            }
        };
        self.entries.truncate(MAX_ENTRIES);
        log::info!("{} scored {} (rank {})", game, score, rank);
        Some(rank)
    }

    /// Entries for one game, still ranked.
    pub fn for_game<'a>(&'a self, game: &'a str) -> impl Iterator<Item = &'a ScoreEntry> + 'a {
        self.entries.iter().filter(move |e| e.game == game)
    }

    pub fn top_score(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut board: Leaderboard = serde_json::from_str(json)?;
        board.entries.sort_by(|a, b| b.score.cmp(&a.score));
        board.entries.truncate(MAX_ENTRIES);
        Ok(board)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(board) => {
                        log::info!("Loaded {} leaderboard entries", board.entries.len());
                        return board;
                    }
                    Err(e) => log::warn!("Discarding stored leaderboard: {}", e),
                }
            }
        }
        Self::new()
    }

    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            match self.to_json() {
                Ok(json) => {
                    if storage.set_item(Self::STORAGE_KEY, &json).is_err() {
                        log::warn!("Could not persist leaderboard");
                    }
                }
                Err(e) => log::warn!("Could not encode leaderboard: {}", e),
            }
        }
    }

    /// Read a table from `path`; a missing file is an empty table.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: &std::path::Path) -> Result<Self, crate::error::GameError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Ok(Self::from_json(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(crate::error::RenderError::Io(e).into()),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), crate::error::GameError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(crate::error::RenderError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_never_qualifies() {
        let mut board = Leaderboard::new();
        assert!(!board.qualifies(0));
        assert_eq!(board.record("crossing", 0, 1), None);
        assert!(board.is_empty());
    }

    #[test]
    fn test_ranked_descending() {
        let mut board = Leaderboard::new();
        assert_eq!(board.record("collector", 300, 2), Some(1));
        assert_eq!(board.record("defender", 900, 3), Some(1));
        assert_eq!(board.record("crossing", 500, 1), Some(2));
        assert_eq!(board.record("crossing", 500, 2), Some(3));

        let scores: Vec<u64> = board.entries.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![900, 500, 500, 300]);
        assert_eq!(board.entries[1].level, 1);
        assert_eq!(board.top_score(), Some(900));
    }

    #[test]
    fn test_full_table_drops_lowest() {
        let mut board = Leaderboard::new();
        for score in 1..=10 {
            board.record("defender", score * 10, 1);
        }
        assert!(!board.qualifies(10));
        assert_eq!(board.record("defender", 5, 1), None);
        assert_eq!(board.record("defender", 55, 1), Some(6));
        assert_eq!(board.entries.len(), MAX_ENTRIES);
        assert_eq!(board.entries.last().map(|e| e.score), Some(20));
    }

    #[test]
    fn test_filter_by_game() {
        let mut board = Leaderboard::new();
        board.record("collector", 10, 1);
        board.record("defender", 20, 1);
        board.record("collector", 30, 2);
        let collector: Vec<u64> = board.for_game("collector").map(|e| e.score).collect();
        assert_eq!(collector, vec![30, 10]);
    }

    #[test]
    fn test_json_is_reranked_on_load() {
        let json = r#"{"entries":[
            {"game":"crossing","score":10,"level":1},
            {"game":"crossing","score":70,"level":2}
        ]}"#;
        let board = Leaderboard::from_json(json).unwrap();
        assert_eq!(board.top_score(), Some(70));

        let again = Leaderboard::from_json(&board.to_json().unwrap()).unwrap();
        assert_eq!(again, board);
        assert!(Leaderboard::from_json("[").is_err());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let path = std::env::temp_dir().join("arcade-leaderboard-does-not-exist.json");
        let board = Leaderboard::load_from(&path).unwrap();
        assert!(board.is_empty());
    }
}
