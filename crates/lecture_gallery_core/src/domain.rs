//! crates/lecture_gallery_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any particular store or camera backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Photo Records
//=========================================================================================

/// A single persisted photo entry.
///
/// Records are immutable once created; the only lifecycle transition after
/// creation is deletion. The serialized field names are the ones the document
/// store speaks (`subject`, `ownerId`, `imageData`, `createdAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: Uuid,
    pub subject: String,
    pub owner_id: String,
    pub image_data: String,
    pub created_at: DateTime<Utc>,
}

/// The payload of a create call, before the store assigns `id` and `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    /// Client-generated idempotency key. A store that has already accepted
    /// this key returns the existing record instead of inserting a duplicate.
    pub request_id: Uuid,
    pub subject: String,
    pub owner_id: String,
    pub image_data: String,
}

/// Equality filter used by one-shot queries and live subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhotoFilter {
    pub subject: String,
    pub owner_id: Option<String>,
}

impl PhotoFilter {
    pub fn new(subject: impl Into<String>, owner_id: Option<String>) -> Self {
        Self {
            subject: subject.into(),
            owner_id,
        }
    }

    /// Whether `record` belongs to the result set described by this filter.
    pub fn matches(&self, record: &PhotoRecord) -> bool {
        record.subject == self.subject
            && self
                .owner_id
                .as_deref()
                .map_or(true, |owner| record.owner_id == owner)
    }
}

//=========================================================================================
// Images and Frames
//=========================================================================================

/// A self-contained, transportable image (a `data:` URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data_url: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// A still frame read from a live camera stream, as tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// The rear camera ("environment" facing), preferred for photographing a board.
    Environment,
    User,
}

/// What a capture session asks the device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub video: bool,
    pub audio: bool,
    pub facing: FacingMode,
}

impl StreamConstraints {
    /// Video only, rear-facing if the platform has one.
    pub fn rear_camera() -> Self {
        Self {
            video: true,
            audio: false,
            facing: FacingMode::Environment,
        }
    }
}

//=========================================================================================
// Users and Subjects
//=========================================================================================

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
        }
    }

    /// The name shown in the greeting: the display name, else the local part
    /// of the email address, else a generic fallback.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        if let Some(local) = self
            .email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|l| !l.is_empty())
        {
            return local.to_string();
        }
        "Student".to_string()
    }
}

/// A course key used to partition photo records and gallery views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub id: &'static str,
    pub label: &'static str,
}

/// The semester's subjects, in display order.
pub const SUBJECTS: &[Subject] = &[
    Subject { id: "analyse", label: "ANALYSE" },
    Subject { id: "algebre", label: "ALGÈBRE" },
    Subject { id: "sfsd", label: "SFSD" },
    Subject { id: "electronic", label: "ELECTRONIC" },
    Subject { id: "archi", label: "ARCHI" },
    Subject { id: "proba", label: "PROBA" },
];

impl Subject {
    pub fn find(id: &str) -> Option<&'static Subject> {
        SUBJECTS.iter().find(|s| s.id == id)
    }

    /// Heading for a subject page. Ids outside the catalog are shown upper-cased.
    pub fn heading_for(id: &str) -> String {
        Self::find(id)
            .map(|s| s.label.to_string())
            .unwrap_or_else(|| id.to_uppercase())
    }
}
