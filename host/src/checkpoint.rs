//! Oracle bootstrap checkpoint: one JSON record per network.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use blindquiz_core::GameIds;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checkpoint {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("refusing to move checkpoint from `{from}` to `{to}`")]
    Regress { from: &'static str, to: &'static str },
}

/// Completed bootstrap stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Uninitialized,
    GameCreated { game: GameIds },
    QuestsUploaded { game: GameIds },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Uninitialized => "uninitialized",
            Stage::GameCreated { .. } => "game_created",
            Stage::QuestsUploaded { .. } => "quests_uploaded",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Stage::Uninitialized => 0,
            Stage::GameCreated { .. } => 1,
            Stage::QuestsUploaded { .. } => 2,
        }
    }

    pub fn game(&self) -> Option<&GameIds> {
        match self {
            Stage::Uninitialized => None,
            Stage::GameCreated { game } | Stage::QuestsUploaded { game } => Some(game),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/oracle-state.<network>.json`
    pub fn for_network(dir: &Path, network: &str) -> Self {
        Self::new(dir.join(format!("oracle-state.{network}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// A missing file is `Uninitialized`.
    pub fn load(&self) -> Result<Stage, CheckpointError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Stage::Uninitialized),
            Err(e) => return Err(self.io(e)),
        };
        serde_json::from_str(&json).map_err(|source| CheckpointError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Moves the checkpoint strictly forward. The record is replaced atomically.
    pub fn advance(&self, next: &Stage) -> Result<(), CheckpointError> {
        let current = self.load()?;
        if next.rank() <= current.rank() {
            return Err(CheckpointError::Regress {
                from: current.name(),
                to: next.name(),
            });
        }

        let json = serde_json::to_string_pretty(next).map_err(|source| CheckpointError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io(e))?;
        }
        fs::write(&tmp, json).map_err(|e| self.io(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io(e))?;
        tracing::info!(path = %self.path.display(), stage = next.name(), "checkpoint advanced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> CheckpointStore {
        let dir = std::env::temp_dir().join(format!("blindquiz-ckpt-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        CheckpointStore::for_network(&dir, "testnet")
    }

    fn game() -> GameIds {
        GameIds {
            number: 1,
            profiles_handle: "0xp".into(),
            answers_handle: "0xa".into(),
        }
    }

    #[test]
    fn missing_file_is_uninitialized() {
        let store = temp_store("missing");
        assert_eq!(store.load().unwrap(), Stage::Uninitialized);
    }

    #[test]
    fn advances_forward_only() {
        let store = temp_store("forward");
        store.advance(&Stage::GameCreated { game: game() }).unwrap();
        assert_eq!(store.load().unwrap(), Stage::GameCreated { game: game() });

        let err = store.advance(&Stage::GameCreated { game: game() }).unwrap_err();
        assert!(matches!(err, CheckpointError::Regress { .. }));

        store.advance(&Stage::QuestsUploaded { game: game() }).unwrap();
        let err = store.advance(&Stage::GameCreated { game: game() }).unwrap_err();
        assert!(matches!(err, CheckpointError::Regress { from: "quests_uploaded", .. }));
        assert_eq!(store.load().unwrap(), Stage::QuestsUploaded { game: game() });
    }

    #[test]
    fn no_temp_file_left_behind() {
        let store = temp_store("atomic");
        store.advance(&Stage::GameCreated { game: game() }).unwrap();
        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn record_format() {
        let json = serde_json::to_value(Stage::GameCreated { game: game() }).unwrap();
        assert_eq!(json["stage"], "game_created");
        assert_eq!(json["game"]["number"], 1);
        assert_eq!(json["game"]["answers_handle"], "0xa");
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let store = temp_store("corrupt");
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(CheckpointError::Corrupt { .. })));
    }
}
