use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// A pupil inside a class, with the grades the teacher entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub grades: Vec<Value>,
    /// Client fields the backend does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One class of the teacher's gradebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The full dataset of one account: classes, students, categories and grading settings.
///
/// Only the fields the backend reasons about are typed; everything else the client
/// stores round-trips untouched through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub current_class_id: Option<String>,
    #[serde(default)]
    pub classes: Vec<ClassRecord>,
    #[serde(default)]
    pub categories: Vec<Value>,
    #[serde(default = "default_participation_settings")]
    pub participation_settings: Value,
    #[serde(default = "default_plus_minus_settings")]
    pub plus_minus_grade_settings: Value,
    #[serde(default = "default_grade_ranges")]
    pub grade_percentage_ranges: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_participation_settings() -> Value {
    json!({"plusValue": 0.5, "minusValue": 0.5})
}

fn default_plus_minus_settings() -> Value {
    json!({"startGrade": 3, "plusValue": 0.5, "minusValue": 0.5})
}

fn default_grade_ranges() -> Value {
    json!([
        {"grade": 1, "minPercent": 85, "maxPercent": 100},
        {"grade": 2, "minPercent": 70, "maxPercent": 84},
        {"grade": 3, "minPercent": 55, "maxPercent": 69},
        {"grade": 4, "minPercent": 40, "maxPercent": 54},
        {"grade": 5, "minPercent": 0, "maxPercent": 39}
    ])
}

impl Default for Document {
    /// The gradebook a freshly registered teacher starts with.
    fn default() -> Self {
        let mut extra = Map::new();
        extra.insert("students".to_string(), json!([]));
        extra.insert(
            "tutorial".to_string(),
            json!({"completed": false, "neverShowAgain": false}),
        );

        Self {
            teacher_name: String::new(),
            current_class_id: None,
            classes: Vec::new(),
            categories: Vec::new(),
            participation_settings: default_participation_settings(),
            plus_minus_grade_settings: default_plus_minus_settings(),
            grade_percentage_ranges: default_grade_ranges(),
            extra,
        }
    }
}

impl Document {
    pub fn find_class(&self, class_id: &str) -> Option<&ClassRecord> {
        self.classes.iter().find(|class| class.id == class_id)
    }

    /// Reads a plaintext document written before encryption existed.
    ///
    /// Old clients did not always give classes and students an id; those get a
    /// fresh one. Anything that is not a gradebook object is rejected.
    pub fn from_legacy(mut raw: Value) -> Result<Self, serde_json::Error> {
        let Some(root) = raw.as_object_mut() else {
            return Err(serde::de::Error::custom("legacy document is not an object"));
        };
        if root.contains_key("encrypted") || root.contains_key("ciphertext") {
            return Err(serde::de::Error::custom("half-written encrypted document"));
        }

        if let Some(classes) = root.get_mut("classes").and_then(Value::as_array_mut) {
            for class in classes.iter_mut().filter_map(Value::as_object_mut) {
                ensure_id(class);
                if let Some(students) = class.get_mut("students").and_then(Value::as_array_mut) {
                    for student in students.iter_mut().filter_map(Value::as_object_mut) {
                        ensure_id(student);
                    }
                }
            }
        }

        serde_json::from_value(raw)
    }
}

fn ensure_id(record: &mut Map<String, Value>) {
    if !record.get("id").is_some_and(Value::is_string) {
        record.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
}
