//! Statically provisioned user directory.
//!
//! Users are provisioned at deploy time and never created or destroyed at
//! runtime. The roster ships with the binary and can be replaced by pointing
//! `general.directory_path` at a TOML file with the same shape. The
//! `default_password` on each entry is the baseline credential; the resolver
//! supersedes it with any recorded change.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Closed set of role variants. Authorization is a pure function of role:
/// observers are read-only, everyone else may mutate task/content records.
/// Reaching the admin reset flow is gated separately, by user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Ceo,
    Executive,
    Leader,
    Member,
    Observer,
}

impl Role {
    #[must_use]
    pub const fn can_write(self) -> bool {
        !matches!(self, Self::Observer)
    }
}

// Not Serialize: a User carries default_password and never crosses a wire
// or session boundary whole.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,

    /// Login handle, unique across the roster. Matched exactly, case-sensitive.
    pub username: String,

    /// Baseline credential provisioned at deploy time; immutable for the
    /// lifetime of the process. Stored in the clear, matching the system
    /// this service replaces.
    pub default_password: String,

    pub name: String,

    pub position: String,

    #[serde(default)]
    pub track: Option<String>,

    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDirectory {
    users: Vec<User>,
}

impl UserDirectory {
    pub fn load(directory_path: Option<&str>) -> Result<Self> {
        match directory_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => Ok(Self::provisioned()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster file: {}", path.display()))?;

        let directory: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse roster file: {}", path.display()))?;

        directory.validate()?;
        Ok(directory)
    }

    fn validate(&self) -> Result<()> {
        for (i, user) in self.users.iter().enumerate() {
            if self.users[..i].iter().any(|u| u.username == user.username) {
                anyhow::bail!("Duplicate username in roster: {}", user.username);
            }
            if self.users[..i].iter().any(|u| u.id == user.id) {
                anyhow::bail!("Duplicate user id in roster: {}", user.id);
            }
        }
        Ok(())
    }

    /// Exact match, case-sensitive, no normalization.
    #[must_use]
    pub fn find_by_username(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    #[must_use]
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// The task-force roster as provisioned for the pilot deployment.
    #[must_use]
    pub fn provisioned() -> Self {
        let user = |id: &str,
                    username: &str,
                    default_password: &str,
                    name: &str,
                    position: &str,
                    track: Option<&str>,
                    role: Role| User {
            id: id.to_string(),
            username: username.to_string(),
            default_password: default_password.to_string(),
            name: name.to_string(),
            position: position.to_string(),
            track: track.map(String::from),
            role,
        };

        Self {
            users: vec![
                user(
                    "external-observer-psml",
                    "psml",
                    "1111",
                    "PSML",
                    "Observer",
                    None,
                    Role::Observer,
                ),
                user(
                    "ceo-kim-jin-hwan",
                    "ceo",
                    "seowon2030!",
                    "김진환",
                    "대표이사",
                    None,
                    Role::Ceo,
                ),
                user(
                    "executive-lee-kang-beom",
                    "lkb",
                    "seowon2030",
                    "이강범",
                    "전무 (총괄 책임임원)",
                    None,
                    Role::Executive,
                ),
                user(
                    "kim-mu-bin",
                    "kmb",
                    "woaini96!!",
                    "김무빈",
                    "팀장",
                    Some("management"),
                    Role::Leader,
                ),
                user(
                    "yoo-byung-ki",
                    "ybk",
                    "seowon2026",
                    "예병기",
                    "이사",
                    Some("construction"),
                    Role::Member,
                ),
                user(
                    "song-kyu-nam",
                    "skn",
                    "seowon2026",
                    "송규남",
                    "차장",
                    Some("construction"),
                    Role::Member,
                ),
                user(
                    "hwang-se-won",
                    "hsw",
                    "seowon2026",
                    "황세원",
                    "차장",
                    Some("cost"),
                    Role::Member,
                ),
                user(
                    "um-tae-hyun",
                    "uth",
                    "seowon2026",
                    "엄태현",
                    "과장",
                    Some("cost"),
                    Role::Member,
                ),
                user(
                    "sim-wan-su",
                    "sws",
                    "seowon2026",
                    "심완수",
                    "과장",
                    Some("cost"),
                    Role::Member,
                ),
                user(
                    "lim-sung-yoon",
                    "lsy",
                    "seowon2026",
                    "임성윤",
                    "차장",
                    Some("safety"),
                    Role::Member,
                ),
                user(
                    "lee-sang-hun",
                    "lsh",
                    "seowon2026",
                    "이상헌",
                    "대리",
                    Some("safety"),
                    Role::Member,
                ),
                user(
                    "jung-hee-joong",
                    "jhj",
                    "seowon2026",
                    "정희중",
                    "부장",
                    Some("quality"),
                    Role::Member,
                ),
                user(
                    "kim-ga-yoon",
                    "kgy",
                    "seowon2026",
                    "김가윤",
                    "과장",
                    Some("procurement"),
                    Role::Member,
                ),
                user(
                    "chun-ji-yeon",
                    "cjy",
                    "seowon2026",
                    "천지연",
                    "대리",
                    Some("it-data"),
                    Role::Member,
                ),
            ],
        }
    }
}
