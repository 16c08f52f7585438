use rand::seq::SliceRandom;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    allowed_extension, default_description, default_team_name, VideoDescriptor,
    ALLOWED_EXTENSIONS,
};

/// Owns the upload directory and the metadata ledger. The ledger is a single
/// JSON array rewritten in full on every append; the rewrite is serialized
/// behind `ledger_lock` so concurrent uploads cannot lose records, and lands
/// via a temp file + rename so a crash mid-write cannot truncate it.
pub struct VideoStore {
    upload_dir: PathBuf,
    metadata_file: PathBuf,
    sample_size: usize,
    ledger_lock: Mutex<()>,
}

impl VideoStore {
    pub fn new(config: &Config) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            metadata_file: config.metadata_file.clone(),
            sample_size: config.sample_size,
            ledger_lock: Mutex::new(()),
        }
    }

    /// Random sample of videos on disk, joined with ledger metadata.
    /// An empty result is not an error; an unreadable directory is.
    pub async fn list_videos(&self) -> Result<Vec<VideoDescriptor>, ApiError> {
        let mut filenames = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.upload_dir)
            .await
            .map_err(|e| ApiError::storage("Unable to read video files", e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ApiError::storage("Unable to read video files", e))?
        {
            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    warn!("Skipping unreadable entry {:?}: {}", entry.path(), e);
                    continue;
                }
            };
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if allowed_extension(&name).is_some() {
                filenames.push(name);
            }
        }

        filenames.shuffle(&mut rand::thread_rng());
        filenames.truncate(self.sample_size);

        // A ledger that fails to parse degrades the join to placeholders;
        // the files themselves are still listable.
        let ledger = match self.read_ledger().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Metadata ledger unreadable, using placeholders: {e:#}");
                Vec::new()
            }
        };

        Ok(filenames
            .into_iter()
            .map(|filename| descriptor_for(filename, &ledger))
            .collect())
    }

    /// Validate, persist under a generated name, and record an upload.
    pub async fn upload(
        &self,
        original_name: &str,
        data: &[u8],
        team_name: String,
        description: String,
    ) -> Result<VideoDescriptor, ApiError> {
        let Some(ext) = allowed_extension(original_name) else {
            return Err(ApiError::Validation(format!(
                "Invalid file type. Allowed extensions: {}",
                ALLOWED_EXTENSIONS
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        };

        // Never store under the client's filename: a generated id avoids
        // overwrites and path traversal.
        let video_id = format!(
            "{}{}",
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            Uuid::new_v4().to_string().replace('-', "")
        );
        let filename = format!("{video_id}.{ext}");
        let path = self.upload_dir.join(&filename);

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| ApiError::storage("Failed to save file", e))?;

        let descriptor = VideoDescriptor {
            url: format!("/uploads/{filename}"),
            filename,
            team_name,
            description,
        };
        self.append_record(descriptor.clone()).await?;
        info!(
            "Stored {} ({} bytes) for team {:?}",
            descriptor.filename,
            data.len(),
            descriptor.team_name
        );
        Ok(descriptor)
    }

    async fn read_ledger(&self) -> anyhow::Result<Vec<VideoDescriptor>> {
        match tokio::fs::read(&self.metadata_file).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_record(&self, record: VideoDescriptor) -> Result<(), ApiError> {
        let _guard = self.ledger_lock.lock().await;
        // A corrupt ledger refuses the append rather than being silently
        // replaced by a one-record file.
        let mut records = self
            .read_ledger()
            .await
            .map_err(|e| ApiError::storage("Failed to read metadata ledger", e))?;
        records.push(record);
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| ApiError::storage("Failed to encode metadata ledger", e))?;
        let tmp = self.metadata_file.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| ApiError::storage("Failed to write metadata ledger", e))?;
        tokio::fs::rename(&tmp, &self.metadata_file)
            .await
            .map_err(|e| ApiError::storage("Failed to write metadata ledger", e))?;
        Ok(())
    }
}

/// First ledger match wins; files without a record get placeholder metadata.
fn descriptor_for(filename: String, ledger: &[VideoDescriptor]) -> VideoDescriptor {
    let record = ledger.iter().find(|r| r.filename == filename);
    VideoDescriptor {
        url: format!("/uploads/{filename}"),
        filename,
        team_name: record
            .map(|r| r.team_name.clone())
            .unwrap_or_else(default_team_name),
        description: record
            .map(|r| r.description.clone())
            .unwrap_or_else(default_description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store(dir: &std::path::Path) -> VideoStore {
        let config = Config {
            port: 0,
            upload_dir: dir.to_path_buf(),
            metadata_file: dir.join("metadata.json"),
            max_file_size: 50 * 1024 * 1024,
            sample_size: 10,
        };
        VideoStore::new(&config)
    }

    #[tokio::test]
    async fn list_filters_non_video_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("b.mov"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("metadata.json"), b"[]").unwrap();

        let store = make_store(dir.path());
        let videos = store.list_videos().await.unwrap();
        let mut names: Vec<_> = videos.iter().map(|v| v.filename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a.mp4", "b.mov"]);
    }

    #[tokio::test]
    async fn list_caps_at_sample_size() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7 {
            std::fs::write(dir.path().join(format!("v{i}.mp4")), b"x").unwrap();
        }
        let mut store = make_store(dir.path());
        store.sample_size = 3;
        assert_eq!(store.list_videos().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn list_substitutes_placeholders_without_ledger_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stray.mp4"), b"x").unwrap();

        let store = make_store(dir.path());
        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].team_name, "Unknown Team");
        assert_eq!(videos[0].description, "No description available");
        assert_eq!(videos[0].url, "/uploads/stray.mp4");
    }

    #[tokio::test]
    async fn list_fails_when_directory_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("file");
        std::fs::write(&not_a_dir, b"x").unwrap();

        let store = make_store(&not_a_dir);
        assert!(matches!(
            store.list_videos().await,
            Err(ApiError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn upload_persists_file_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());

        let descriptor = store
            .upload("clip.mp4", b"bytes", "Alpha".into(), "demo".into())
            .await
            .unwrap();

        assert!(descriptor.filename.ends_with(".mp4"));
        assert_ne!(descriptor.filename, "clip.mp4");
        assert_eq!(descriptor.url, format!("/uploads/{}", descriptor.filename));
        assert!(dir.path().join(&descriptor.filename).exists());

        let listed = store.list_videos().await.unwrap();
        let found = listed
            .iter()
            .find(|v| v.filename == descriptor.filename)
            .unwrap();
        assert_eq!(found.team_name, "Alpha");
        assert_eq!(found.description, "demo");
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());

        let err = store
            .upload("anim.gif", b"bytes", "Alpha".into(), "demo".into())
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(message) => {
                assert!(message.contains(".mp4"));
                assert!(message.contains(".mov"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_uploads_keep_all_ledger_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(make_store(dir.path()));

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .upload("a.mp4", b"a", "TeamA".into(), "first".into())
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .upload("b.mov", b"b", "TeamB".into(), "second".into())
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let ledger: Vec<VideoDescriptor> = serde_json::from_slice(
            &std::fs::read(dir.path().join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn ledger_lookup_returns_first_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dup.mp4"), b"x").unwrap();
        let ledger = serde_json::json!([
            {"filename": "dup.mp4", "url": "/uploads/dup.mp4", "teamName": "First", "description": "one"},
            {"filename": "dup.mp4", "url": "/uploads/dup.mp4", "teamName": "Second", "description": "two"}
        ]);
        std::fs::write(
            dir.path().join("metadata.json"),
            serde_json::to_vec(&ledger).unwrap(),
        )
        .unwrap();

        let store = make_store(dir.path());
        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos[0].team_name, "First");
    }

    #[tokio::test]
    async fn corrupt_ledger_degrades_listing_but_refuses_append() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("metadata.json"), b"not json").unwrap();

        let store = make_store(dir.path());
        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos[0].team_name, "Unknown Team");

        let err = store
            .upload("b.mp4", b"y", "Alpha".into(), "demo".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
        // the corrupt ledger is left untouched
        assert_eq!(
            std::fs::read(dir.path().join("metadata.json")).unwrap(),
            b"not json"
        );
    }
}
