use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::document::{ClassRecord, Document, Student};

/// What a student may see through a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    /// Individual grade entries.
    #[serde(default = "enabled")]
    pub show_grades: bool,
    /// Grade categories (names and weights).
    #[serde(default = "enabled")]
    pub show_categories: bool,
    /// Grading scale, plus/minus and participation settings.
    #[serde(default = "enabled")]
    pub show_grading_config: bool,
}

fn enabled() -> bool {
    true
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            show_grades: true,
            show_categories: true,
            show_grading_config: true,
        }
    }
}

/// A hashed PIN and the student it unlocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinEntry {
    pub pin_hash: String,
    pub name: String,
}

/// A time-limited, PIN-protected read-only view of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    pub share_token: String,
    pub account_id: String,
    pub class_id: String,
    pub class_name: String,
    pub teacher_name: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    /// Set when the owner revoked the share; the record is a tombstone until swept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visibility: VisibilityPolicy,
    /// student id -> PIN entry
    #[serde(default)]
    pub student_pins: BTreeMap<String, PinEntry>,
    /// [`ShareSnapshot`] sealed with the process master key.
    #[serde(default)]
    pub encrypted_snapshot: String,
}

impl ClassShare {
    /// Shares expire at their expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Active and not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }
}

/// Grading settings copied into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingConfig {
    pub plus_minus_grade_settings: Value,
    pub grade_percentage_ranges: Value,
    pub participation_settings: Value,
}

/// The decrypted content of a share: one class, as of the owner's last write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSnapshot {
    pub class_id: String,
    pub class_name: String,
    pub teacher_name: String,
    pub categories: Vec<Value>,
    pub subjects: Vec<Value>,
    pub grading: GradingConfig,
    pub students: Vec<Student>,
    #[serde(with = "crate::models::timestamp")]
    pub synced_at: DateTime<Utc>,
}

impl ShareSnapshot {
    pub fn build(document: &Document, class: &ClassRecord, now: DateTime<Utc>) -> Self {
        Self {
            class_id: class.id.clone(),
            class_name: class.name.clone(),
            teacher_name: document.teacher_name.clone(),
            categories: document.categories.clone(),
            subjects: class.subjects.clone(),
            grading: GradingConfig {
                plus_minus_grade_settings: document.plus_minus_grade_settings.clone(),
                grade_percentage_ranges: document.grade_percentage_ranges.clone(),
                participation_settings: document.participation_settings.clone(),
            },
            students: class.students.clone(),
            synced_at: now,
        }
    }

    pub fn find_student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|student| student.id == student_id)
    }
}

/// What a student receives after a successful PIN check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentView {
    pub class_name: String,
    pub teacher_name: String,
    pub student_id: String,
    pub student_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grades: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Value>>,
    pub subjects: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grading: Option<GradingConfig>,
    pub visibility: VisibilityPolicy,
    pub expires_at: DateTime<Utc>,
    pub synced_at: DateTime<Utc>,
}

impl StudentView {
    /// Projects one student out of a snapshot, applying the share's visibility policy.
    pub fn project(
        snapshot: &ShareSnapshot,
        student: &Student,
        visibility: VisibilityPolicy,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            class_name: snapshot.class_name.clone(),
            teacher_name: snapshot.teacher_name.clone(),
            student_id: student.id.clone(),
            student_name: student.name.clone(),
            grades: visibility.show_grades.then(|| student.grades.clone()),
            categories: visibility
                .show_categories
                .then(|| snapshot.categories.clone()),
            subjects: snapshot.subjects.clone(),
            grading: visibility
                .show_grading_config
                .then(|| snapshot.grading.clone()),
            visibility,
            expires_at,
            synced_at: snapshot.synced_at,
        }
    }
}

/// A cleartext PIN, handed to the owner exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedPin {
    pub student_id: String,
    pub student_name: String,
    pub pin: String,
}

/// Result of a status query for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareStatus {
    pub has_share: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_count: Option<usize>,
}

impl ShareStatus {
    pub fn none() -> Self {
        Self {
            has_share: false,
            share_token: None,
            created_at: None,
            expires_at: None,
            visibility: None,
            student_count: None,
        }
    }

    pub fn of(share: &ClassShare) -> Self {
        Self {
            has_share: true,
            share_token: Some(share.share_token.clone()),
            created_at: Some(share.created_at),
            expires_at: Some(share.expires_at),
            visibility: Some(share.visibility),
            student_count: Some(share.student_pins.len()),
        }
    }
}
