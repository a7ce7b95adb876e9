//! Request and response bodies for the Android Publisher edits resources.
use serde::{Deserialize, Serialize};
use std::fmt;

/// An open edit transaction. Only `id` is required to drive the rest of the
/// publish sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEdit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time_seconds: Option<String>,
}

/// Version code assigned by Play to an uploaded bundle.
///
/// The API documents it as an integer but int64 values may arrive as JSON
/// strings, so both forms are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVersionCode", into = "i64")]
pub struct VersionCode(pub i64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersionCode {
    Number(i64),
    Text(String),
}

impl TryFrom<RawVersionCode> for VersionCode {
    type Error = String;

    fn try_from(value: RawVersionCode) -> Result<Self, Self::Error> {
        match value {
            RawVersionCode::Number(code) => Ok(VersionCode(code)),
            RawVersionCode::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(VersionCode)
                .map_err(|e| format!("invalid version code {text:?}: {e}")),
        }
    }
}

impl From<VersionCode> for i64 {
    fn from(value: VersionCode) -> Self {
        value.0
    }
}

impl fmt::Display for VersionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of uploading a bundle under an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub version_code: VersionCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// One release entry within a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRelease {
    /// int64 values encoded as strings, as the API expects.
    #[serde(default)]
    pub version_codes: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A named distribution channel and the releases assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub track: String,
    #[serde(default)]
    pub releases: Vec<TrackRelease>,
}

impl Track {
    /// Track update carrying exactly one release for one version code.
    pub fn single_release(
        track: impl Into<String>,
        version_code: VersionCode,
        status: impl Into<String>,
    ) -> Self {
        Self {
            track: track.into(),
            releases: vec![TrackRelease {
                version_codes: vec![version_code.to_string()],
                status: status.into(),
                name: None,
            }],
        }
    }
}
