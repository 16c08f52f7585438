use serde::{Deserialize, Serialize};
use std::path::Path;

/// File extensions the store accepts, lowercase.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// Normalized extension of `name` if it is an allowed video type.
pub fn allowed_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "mov" => "video/quicktime",
        _ => "video/mp4",
    }
}

pub fn default_team_name() -> String {
    "Unknown Team".to_string()
}

pub fn default_description() -> String {
    "No description available".to_string()
}

/// One uploaded video plus its display metadata. Identity is `filename`,
/// which is also embedded in `url`. Ledger records and API payloads share
/// this shape; older ledger entries may lack the optional fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub filename: String,
    pub url: String,
    #[serde(default = "default_team_name")]
    pub team_name: String,
    #[serde(default = "default_description")]
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideosResponse {
    pub videos: Vec<VideoDescriptor>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub video_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

pub struct AppState {
    pub store: crate::store::VideoStore,
    pub config: crate::config::Config,
}
