//! Game profiles and save-data location lookup.
//!
//! Each supported game maps to a save-data root on the local machine and an
//! ordered list of subfolders under that root that count as save data. An
//! empty subfolder list means the whole root is backed up.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while resolving a game's save-data root
#[derive(Error, Debug)]
pub enum GameError {
    #[error("{game} save folder not found (expected {path})")]
    NotFound { game: String, path: PathBuf },

    #[error("Unknown game '{0}'. Pass --root to back up a custom folder.")]
    UnknownGame(String),
}

/// Where a game keeps its save data
enum Location {
    /// Under a documents directory, first matching subpath wins
    Documents(&'static [&'static str]),
    /// Under the local application data directory
    LocalAppData(&'static str),
}

/// Games with a built-in save-data layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Game {
    Sims4,
    Sims3,
    SimsMedieval,
    MySims,
    MySimsKingdom,
}

impl Game {
    pub const ALL: [Game; 5] = [
        Game::Sims4,
        Game::Sims3,
        Game::SimsMedieval,
        Game::MySims,
        Game::MySimsKingdom,
    ];

    /// Display name, also accepted as an identifier on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sims4 => "Sims 4",
            Self::Sims3 => "Sims 3",
            Self::SimsMedieval => "Sims Medieval",
            Self::MySims => "MySims",
            Self::MySimsKingdom => "MySims Kingdom",
        }
    }

    /// Key used for per-game settings
    pub fn key(&self) -> String {
        game_key(self.name())
    }

    /// Prefix used in archive file names
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Sims4 => "sims4",
            Self::Sims3 => "sims3",
            Self::SimsMedieval => "simsmedieval",
            Self::MySims => "mysims",
            Self::MySimsKingdom => "mysimskingdom",
        }
    }

    /// Subfolders of the root that hold save data, in backup order
    pub fn subfolders(&self) -> &'static [&'static str] {
        match self {
            Self::Sims4 => &["saves", "Tray"],
            Self::Sims3 => &["Saves", "Library", "Exports"],
            Self::SimsMedieval => &["Saves", "Library"],
            Self::MySims | Self::MySimsKingdom => &[],
        }
    }

    fn location(&self) -> Location {
        match self {
            Self::Sims4 => Location::Documents(&["Electronic Arts/The Sims 4", "The Sims 4"]),
            Self::Sims3 => Location::Documents(&["Electronic Arts/The Sims 3", "The Sims 3"]),
            Self::SimsMedieval => Location::Documents(&[
                "Electronic Arts/The Sims Medieval",
                "The Sims Medieval",
            ]),
            Self::MySims => Location::LocalAppData("Electronic Arts/MySims"),
            Self::MySimsKingdom => Location::LocalAppData("Electronic Arts/MySims Kingdom"),
        }
    }

    /// Look up a game by name or key, ignoring case and surrounding whitespace
    pub fn from_id(id: &str) -> Option<Self> {
        let key = game_key(id);
        Self::ALL.into_iter().find(|g| g.key() == key || g.slug() == key)
    }

    /// Locate this game's save-data root
    pub fn resolve_root(&self, dirs: &SearchDirs) -> Result<PathBuf, GameError> {
        let (found, preferred) = match self.location() {
            Location::Documents(subpaths) => {
                let found = dirs
                    .documents
                    .iter()
                    .flat_map(|base| subpaths.iter().map(move |sub| base.join(sub)))
                    .find(|candidate| candidate.is_dir());
                let base = dirs
                    .documents
                    .first()
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from("Documents"));
                (found, base.join(subpaths[0]))
            }
            Location::LocalAppData(subpath) => {
                let candidate = dirs
                    .local_data
                    .as_deref()
                    .unwrap_or_else(|| Path::new("AppData/Local"))
                    .join(subpath);
                (candidate.is_dir().then(|| candidate.clone()), candidate)
            }
        };

        found.ok_or_else(|| GameError::NotFound {
            game: self.name().to_string(),
            path: preferred,
        })
    }
}

/// Normalize a game name into a settings key ("Sims 4" -> "sims_4")
pub fn game_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Base directories probed when locating save data
#[derive(Debug, Clone, Default)]
pub struct SearchDirs {
    /// Documents directories in priority order
    pub documents: Vec<PathBuf>,
    /// Local application data directory
    pub local_data: Option<PathBuf>,
}

impl SearchDirs {
    /// Build the search list for the current user.
    ///
    /// Covers the regular documents folder plus both OneDrive redirections,
    /// keeping only directories that exist.
    pub fn from_env() -> Self {
        let mut candidates = Vec::new();

        if let Some(user_dirs) = directories::UserDirs::new() {
            if let Some(docs) = user_dirs.document_dir() {
                candidates.push(docs.to_path_buf());
            }
            candidates.push(user_dirs.home_dir().join("Documents"));
            if let Some(onedrive) = std::env::var_os("OneDrive") {
                candidates.push(PathBuf::from(onedrive).join("Documents"));
            }
            candidates.push(user_dirs.home_dir().join("OneDrive").join("Documents"));
        }

        let mut documents: Vec<PathBuf> = Vec::new();
        for dir in candidates {
            if dir.is_dir() && !documents.contains(&dir) {
                documents.push(dir);
            }
        }

        let local_data =
            directories::BaseDirs::new().map(|dirs| dirs.data_local_dir().to_path_buf());

        Self {
            documents,
            local_data,
        }
    }
}

/// A game identifier bound to its save-data root for the duration of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProfile {
    /// Display name
    pub name: String,
    /// Prefix for archive and scratch directory names
    pub slug: String,
    /// Save-data subfolders; empty means the whole root
    pub subfolders: Vec<String>,
    /// Save-data root
    pub root: PathBuf,
}

impl GameProfile {
    /// Resolve a known game's profile on this machine
    pub fn resolve(id: &str, dirs: &SearchDirs) -> Result<Self, GameError> {
        let game = Game::from_id(id).ok_or_else(|| GameError::UnknownGame(id.to_string()))?;
        let root = game.resolve_root(dirs)?;
        Ok(Self::for_game(game, root))
    }

    /// Profile for an explicit root. Unknown identifiers treat the whole root as payload.
    pub fn with_root(id: &str, root: PathBuf) -> Self {
        match Game::from_id(id) {
            Some(game) => Self::for_game(game, root),
            None => Self {
                name: id.trim().to_string(),
                slug: sanitize_slug(id),
                subfolders: Vec::new(),
                root,
            },
        }
    }

    fn for_game(game: Game, root: PathBuf) -> Self {
        Self {
            name: game.name().to_string(),
            slug: game.slug().to_string(),
            subfolders: game.subfolders().iter().map(|s| s.to_string()).collect(),
            root,
        }
    }

    /// Settings key for this profile
    pub fn key(&self) -> String {
        game_key(&self.name)
    }
}

fn sanitize_slug(id: &str) -> String {
    let slug: String = game_key(id)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if slug.is_empty() {
        "custom".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_id_is_case_insensitive() {
        assert_eq!(Game::from_id("Sims 4"), Some(Game::Sims4));
        assert_eq!(Game::from_id("  sims medieval "), Some(Game::SimsMedieval));
        assert_eq!(Game::from_id("MYSIMS_KINGDOM"), Some(Game::MySimsKingdom));
        assert_eq!(Game::from_id("sims4"), Some(Game::Sims4));
        assert_eq!(Game::from_id("Stardew Valley"), None);
    }

    #[test]
    fn test_game_key() {
        assert_eq!(game_key("Sims 4"), "sims_4");
        assert_eq!(game_key(" MySims Kingdom "), "mysims_kingdom");
    }

    #[test]
    fn test_resolve_prefers_electronic_arts_folder() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path().join("Documents");
        let ea = docs.join("Electronic Arts").join("The Sims 4");
        let plain = docs.join("The Sims 4");
        fs::create_dir_all(&ea).unwrap();
        fs::create_dir_all(&plain).unwrap();

        let dirs = SearchDirs {
            documents: vec![docs],
            local_data: None,
        };

        assert_eq!(Game::Sims4.resolve_root(&dirs).unwrap(), ea);
    }

    #[test]
    fn test_resolve_checks_every_documents_dir() {
        let temp_dir = TempDir::new().unwrap();
        let local_docs = temp_dir.path().join("Documents");
        let onedrive_docs = temp_dir.path().join("OneDrive").join("Documents");
        let root = onedrive_docs.join("The Sims 3");
        fs::create_dir_all(&local_docs).unwrap();
        fs::create_dir_all(&root).unwrap();

        let dirs = SearchDirs {
            documents: vec![local_docs, onedrive_docs],
            local_data: None,
        };

        assert_eq!(Game::Sims3.resolve_root(&dirs).unwrap(), root);
    }

    #[test]
    fn test_resolve_missing_reports_preferred_path() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path().join("Documents");
        fs::create_dir_all(&docs).unwrap();

        let dirs = SearchDirs {
            documents: vec![docs.clone()],
            local_data: None,
        };

        match Game::Sims4.resolve_root(&dirs) {
            Err(GameError::NotFound { path, .. }) => {
                assert_eq!(path, docs.join("Electronic Arts/The Sims 4"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_local_app_data_game() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("Electronic Arts").join("MySims");
        fs::create_dir_all(&root).unwrap();

        let dirs = SearchDirs {
            documents: Vec::new(),
            local_data: Some(temp_dir.path().to_path_buf()),
        };

        let profile = GameProfile::resolve("mysims", &dirs).unwrap();
        assert_eq!(profile.root, root);
        assert!(profile.subfolders.is_empty());
        assert!(matches!(
            GameProfile::resolve("MySims Kingdom", &dirs),
            Err(GameError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_game_needs_explicit_root() {
        assert!(matches!(
            GameProfile::resolve("Stardew Valley", &SearchDirs::default()),
            Err(GameError::UnknownGame(_))
        ));

        let profile = GameProfile::with_root("Stardew Valley!", PathBuf::from("/saves"));
        assert_eq!(profile.slug, "stardew_valley");
        assert!(profile.subfolders.is_empty());

        let known = GameProfile::with_root("sims 4", PathBuf::from("/saves"));
        assert_eq!(known.subfolders, vec!["saves", "Tray"]);
        assert_eq!(known.key(), "sims_4");
    }
}
