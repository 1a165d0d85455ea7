use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk preference file. Field names are the persisted keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct Stored {
    #[serde(rename = "show-root-indicator")]
    show_root_indicator: bool,
}

/// User preferences that outlive a connection.
pub struct Preferences {
    path: Option<PathBuf>,
    stored: Stored,
}

impl Preferences {
    /// Read preferences from `path`. Unreadable or invalid files fall back to
    /// defaults; they are rewritten on the next change.
    pub fn load(path: Option<PathBuf>) -> Self {
        let stored = match &path {
            Some(p) if p.exists() => match std::fs::read_to_string(p)
                .map_err(anyhow::Error::from)
                .and_then(|s| Ok(toml::from_str::<Stored>(&s)?))
            {
                Ok(stored) => stored,
                Err(e) => {
                    log::warn!("Ignoring preferences at {}: {e}", p.display());
                    Stored::default()
                }
            },
            _ => Stored::default(),
        };
        Preferences { path, stored }
    }

    /// Preferences that are never written anywhere.
    pub fn in_memory() -> Self {
        Preferences {
            path: None,
            stored: Stored::default(),
        }
    }

    pub fn show_root_indicator(&self) -> bool {
        self.stored.show_root_indicator
    }

    /// Update the flag and write the file. The in-memory value is kept even
    /// if the write fails.
    pub fn set_show_root_indicator(&mut self, show: bool) -> anyhow::Result<()> {
        self.stored.show_root_indicator = show;
        self.save()
    }

    fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, toml::to_string(&self.stored)?)?;
        log::debug!("Saved preferences to {}", path.display());
        Ok(())
    }
}
