use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{AuthorId, WallId};

pub const WALL_NAME_MAX_LEN: usize = 255;
const SLUG_BASE_MAX_LEN: usize = 48;
const SLUG_SUFFIX_LEN: usize = 6;

/// Where a wall is, as the client described it. Stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WallLocation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// A named canvas reachable by its slug. Sessions and nodes hang off it.
///
/// # Fields Overview
///
/// - `slug`: unique, URL-safe handle derived from `name`
/// - `creator_id`: author that created the wall; only they can delete it
/// - `last_opened_at`: last time anyone opened the wall by slug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub id: WallId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub location: Option<WallLocation>,
    pub creator_id: AuthorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_opened_at: Option<DateTime<Utc>>,
}

impl Wall {
    pub fn from_new(id: WallId, wall: NewWall, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: wall.name,
            slug: wall.slug,
            location: wall.location,
            creator_id: wall.creator_id,
            created_at: now,
            updated_at: now,
            last_opened_at: None,
        }
    }

    /// Last time the wall was opened, or its creation time if it never was.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_opened_at.unwrap_or(self.created_at)
    }

    pub fn mark_opened(&mut self, now: DateTime<Utc>) {
        self.last_opened_at = Some(now);
        self.updated_at = now;
    }
}

/// Payload for creating a wall.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWall {
    pub name: String,
    pub slug: String,
    pub location: Option<WallLocation>,
    pub creator_id: AuthorId,
}

impl NewWall {
    /// Validates `name` and derives a fresh slug from it.
    pub fn named(
        name: &str,
        location: Option<WallLocation>,
        creator_id: AuthorId,
    ) -> Result<Self, String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Wall name must not be empty".into());
        }
        if name.chars().count() > WALL_NAME_MAX_LEN {
            return Err(format!(
                "Wall name must be at most {} characters",
                WALL_NAME_MAX_LEN
            ));
        }
        Ok(Self {
            name: name.to_string(),
            slug: generate_slug(name),
            location,
            creator_id,
        })
    }
}

/// One visit to a wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallView {
    pub id: Uuid,
    pub wall_id: WallId,
    pub viewer_id: AuthorId,
    pub viewed_at: DateTime<Utc>,
}

/// The whole drawing surface of a wall as last saved, one per wall.
///
/// Elements and app state are kept as opaque JSON so nothing the client sends
/// is lost on the way back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub wall_id: WallId,
    pub elements: Vec<Value>,
    #[serde(default)]
    pub app_state: Map<String, Value>,
    pub last_edited_by: AuthorId,
    pub updated_at: DateTime<Utc>,
}

fn slug_separators() -> &'static Regex {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// Lowercase ASCII words of `name` joined by `-`, plus a short random suffix
/// so walls with the same name get distinct slugs.
pub fn generate_slug(name: &str) -> String {
    let lowered = name.to_lowercase();
    let joined = slug_separators().replace_all(&lowered, "-");
    let truncated: String = joined
        .trim_matches('-')
        .chars()
        .take(SLUG_BASE_MAX_LEN)
        .collect();
    let base = truncated.trim_end_matches('-');

    let random = Uuid::new_v4().simple().to_string();
    let suffix = &random[..SLUG_SUFFIX_LEN];
    if base.is_empty() {
        format!("wall-{}", suffix)
    } else {
        format!("{}-{}", base, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_of(slug: &str) -> &str {
        &slug[..slug.len() - SLUG_SUFFIX_LEN - 1]
    }

    #[test]
    fn slug_keeps_words_and_drops_punctuation() {
        let slug = generate_slug("  Coffee Shop: Back Wall!! ");
        assert_eq!(base_of(&slug), "coffee-shop-back-wall");
        let suffix = &slug[slug.len() - SLUG_SUFFIX_LEN..];
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_name_gets_distinct_slugs() {
        assert_ne!(generate_slug("Lobby"), generate_slug("Lobby"));
    }

    #[test]
    fn slug_without_usable_characters_falls_back() {
        assert!(generate_slug("¡¿!?").starts_with("wall-"));
        assert_eq!(base_of(&generate_slug("Café Nord")), "caf-nord");
    }

    #[test]
    fn long_names_are_truncated_without_trailing_dash() {
        let name = format!("{} tail", "a".repeat(47));
        let slug = generate_slug(&name);
        assert_eq!(base_of(&slug), "a".repeat(47));
    }

    #[test]
    fn wall_names_are_validated() {
        let creator = Uuid::new_v4();
        assert!(NewWall::named("   ", None, creator).is_err());
        assert!(NewWall::named(&"x".repeat(256), None, creator).is_err());

        let wall = NewWall::named(" Atrium ", None, creator).unwrap();
        assert_eq!(wall.name, "Atrium");
        assert!(wall.slug.starts_with("atrium-"));
    }

    #[test]
    fn last_activity_prefers_last_open() {
        let created = Utc::now();
        let new = NewWall::named("Atrium", None, Uuid::new_v4()).unwrap();
        let mut wall = Wall::from_new(Uuid::new_v4(), new, created);
        assert_eq!(wall.last_activity(), created);

        let opened = created + chrono::Duration::minutes(5);
        wall.mark_opened(opened);
        assert_eq!(wall.last_activity(), opened);
        assert_eq!(wall.updated_at, opened);
    }
}
