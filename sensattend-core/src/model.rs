//! Roster and submission data types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AttendanceError, Result};

/// Display placeholder for a student without a name.
pub const UNNAMED: &str = "Unnamed";

/// Display placeholder for a student without a roll number.
pub const NO_ROLL_NUMBER: &str = "N/A";

/// Unique student identifier.
///
/// The service may send roll numbers as JSON strings or numbers; both are
/// normalised to their textual form so equality is textual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RollNumber(String);

impl RollNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RollNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RollNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RollNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for RollNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// A registered student as listed by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roll_number: Option<RollNumber>,
    /// Server-relative reference photo URL.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Student {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => UNNAMED,
        }
    }

    pub fn display_roll_number(&self) -> &str {
        self.roll_number
            .as_ref()
            .map(RollNumber::as_str)
            .unwrap_or(NO_ROLL_NUMBER)
    }

    pub fn has_roll_number(&self, roll_number: &RollNumber) -> bool {
        self.roll_number.as_ref() == Some(roll_number)
    }

    /// Resolve the reference photo against the service base URL.
    pub fn image_link(&self, base: &url::Url) -> Option<url::Url> {
        self.image_url
            .as_deref()
            .and_then(|path| base.join(path).ok())
    }
}

/// Opaque image payload selected by the operator.
///
/// The bytes are shared, so cloning a selection for an upload is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    bytes: Arc<[u8]>,
    file_name: Option<String>,
    content_type: Option<String>,
}

impl ImageUpload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
            file_name: None,
            content_type: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("bytes", &self.bytes.len())
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Raw roster form input, as produced by the operator's widgets.
#[derive(Debug, Clone, Default)]
pub struct StudentForm {
    pub name: String,
    pub roll_number: String,
    pub image: Option<ImageUpload>,
}

impl StudentForm {
    /// Check that every field is filled in.
    ///
    /// Whitespace-only text counts as missing.
    pub fn validate(self) -> Result<NewStudent> {
        let name = self.name.trim();
        let roll_number = self.roll_number.trim();

        let mut missing = Vec::new();
        if name.is_empty() {
            missing.push("name");
        }
        if roll_number.is_empty() {
            missing.push("roll_number");
        }
        let image = match self.image {
            Some(image) if !image.is_empty() => Some(image),
            _ => {
                missing.push("image");
                None
            }
        };

        match image {
            Some(image) if missing.is_empty() => Ok(NewStudent {
                name: name.to_string(),
                roll_number: RollNumber::new(roll_number),
                image,
            }),
            _ => Err(AttendanceError::IncompleteSubmission { missing }),
        }
    }
}

/// A validated registration ready to send.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub roll_number: RollNumber,
    pub image: ImageUpload,
}

/// Roll numbers the service judged present in one submitted image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MatchResult {
    pub matched_roll_numbers: Vec<RollNumber>,
    pub message: Option<String>,
}

impl MatchResult {
    pub fn roll_numbers(&self) -> impl Iterator<Item = &str> {
        self.matched_roll_numbers.iter().map(RollNumber::as_str)
    }
}
