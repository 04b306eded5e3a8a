//! Project document types.
//!
//! # Responsibility
//! - Describe the manuscript, lore database, maps, timeline and relationship
//!   graphs persisted as one JSON document.
//!
//! # Invariants
//! - JSON field names are camelCase.
//! - Every collection defaults to empty, so partial documents deserialize.
//! - Chapter and entity ids are stable strings; new ones are UUID v4.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Title used when a project or file name would otherwise be empty.
pub const UNTITLED: &str = "Untitled";

/// Lore folders every new project starts with.
pub const DEFAULT_LORE_FOLDERS: &[&str] = &["Characters", "Locations", "Items", "Factions", "Events"];

/// The single persisted entity of a Seymour project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectDocument {
    pub title: String,
    /// Free-form project notes.
    pub notes: String,
    /// Directory the project file lives in, when the host associated one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    pub settings: ProjectSettings,
    /// Ordered chapters.
    pub manuscript: Vec<Chapter>,
    pub lore: LoreDatabase,
    pub maps: Vec<WorldMap>,
    /// Ordered timeline events.
    pub timeline: Vec<TimelineEvent>,
    pub relationships: Vec<RelationshipGraph>,
    /// Top-level fields this build does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self {
            title: UNTITLED.to_string(),
            notes: String::new(),
            directory: None,
            settings: ProjectSettings::default(),
            manuscript: Vec::new(),
            lore: LoreDatabase::default(),
            maps: Vec::new(),
            timeline: Vec::new(),
            relationships: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl ProjectDocument {
    /// Creates the document produced by "New Project".
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let title = title.trim();
        Self {
            title: if title.is_empty() {
                UNTITLED.to_string()
            } else {
                title.to_string()
            },
            ..Self::default()
        }
    }

    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.manuscript.iter().find(|chapter| chapter.id == id)
    }

    pub fn chapter_mut(&mut self, id: &str) -> Option<&mut Chapter> {
        self.manuscript.iter_mut().find(|chapter| chapter.id == id)
    }

    /// Whitespace-separated words across all chapter bodies, tags excluded.
    pub fn word_count(&self) -> usize {
        self.manuscript
            .iter()
            .map(|chapter| crate::persist::text_backup::html_to_text(&chapter.content))
            .map(|text| text.split_whitespace().count())
            .sum()
    }
}

/// Per-project preferences persisted with the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    /// Debounced saves run only while this is set.
    pub auto_save: bool,
    /// Write a plain-text manuscript copy after path-based saves.
    pub text_backup: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            auto_save: true,
            text_backup: true,
        }
    }
}

/// One manuscript chapter. `content` is editor HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Chapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: String::new(),
            synopsis: String::new(),
            notes: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Entities grouped into a folder hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoreDatabase {
    pub folders: Vec<LoreFolder>,
    pub entities: Vec<LoreEntity>,
}

impl Default for LoreDatabase {
    fn default() -> Self {
        Self {
            folders: DEFAULT_LORE_FOLDERS
                .iter()
                .map(|name| LoreFolder {
                    id: name.to_ascii_lowercase(),
                    name: (*name).to_string(),
                    parent_id: None,
                })
                .collect(),
            entities: Vec::new(),
        }
    }
}

impl LoreDatabase {
    /// Entities filed directly under `folder_id`.
    pub fn entities_in(&self, folder_id: &str) -> impl Iterator<Item = &LoreEntity> {
        let folder_id = folder_id.to_string();
        self.entities
            .iter()
            .filter(move |entity| entity.folder_id.as_deref() == Some(folder_id.as_str()))
    }

    /// Direct child folders of `parent_id` (`None` lists root folders).
    pub fn child_folders(&self, parent_id: Option<&str>) -> Vec<&LoreFolder> {
        self.folders
            .iter()
            .filter(|folder| folder.parent_id.as_deref() == parent_id)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoreFolder {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoreEntity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub description: String,
    /// User-defined attribute fields ("Age", "Allegiance", ...).
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LoreEntity {
    pub fn new(name: impl Into<String>, folder_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            folder_id,
            description: String::new(),
            fields: BTreeMap::new(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldMap {
    pub id: String,
    pub name: String,
    /// Image path or data URL of the map background.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub pins: Vec<MapPin>,
}

/// Pin position in normalized map coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPin {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: String,
    pub title: String,
    /// In-world date label; calendars are user-defined so this stays text.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entity_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipGraph {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub entity_id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub label: String,
}
