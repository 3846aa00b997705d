//! File-backed persistence for approved sections and project metadata.
//!
//! Layout under the project root:
//!
//! ```text
//! .pagecraft/
//!   sections/<slug>-<hash>.html
//!   project.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use pagecraft_core::SessionMetadata;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::persister::Persister;

/// Base directory for Pagecraft files
pub const PAGECRAFT_DIR: &str = ".pagecraft";
const SECTIONS_DIR: &str = "sections";
const PROJECT_FILE: &str = "project.json";

static NON_SLUG_CHARS: OnceLock<Option<Regex>> = OnceLock::new();

fn non_slug_chars() -> Option<&'static Regex> {
    NON_SLUG_CHARS
        .get_or_init(|| Regex::new(r"[^a-z0-9]+").ok())
        .as_ref()
}

/// Turn a section name into a file-safe slug: `"Call To Action!"` -> `"call-to-action"`.
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let slug = match non_slug_chars() {
        Some(re) => re.replace_all(&lower, "-").into_owned(),
        None => lower
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect(),
    };
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

/// File stem for a section: readable slug plus a hash of the exact name.
///
/// Names that slug alike (`"Hero"` and `"hero"`, or any two non-Latin names)
/// still get distinct files.
pub fn section_file_stem(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    format!("{}-{}", slugify(name), hex::encode(&digest[..8]))
}

#[derive(Debug, Clone)]
pub struct FilePersister {
    base_path: PathBuf,
}

impl FilePersister {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn root_dir(&self) -> PathBuf {
        self.base_path.join(PAGECRAFT_DIR)
    }

    pub fn sections_dir(&self) -> PathBuf {
        self.root_dir().join(SECTIONS_DIR)
    }

    pub fn section_path(&self, section_name: &str) -> PathBuf {
        self.sections_dir()
            .join(format!("{}.html", section_file_stem(section_name)))
    }

    pub fn project_path(&self) -> PathBuf {
        self.root_dir().join(PROJECT_FILE)
    }

    pub async fn ensure_directories(&self) -> std::io::Result<()> {
        let sections_dir = self.sections_dir();
        debug!("Ensuring directory exists: {:?}", sections_dir);
        fs::create_dir_all(&sections_dir).await
    }

    pub async fn read_section(&self, section_name: &str) -> Result<Option<String>> {
        let path = self.section_path(section_name);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OrchestratorError::persistence(
                section_name,
                format!("failed to read {:?}: {}", path, e),
            )),
        }
    }

    pub async fn read_project(&self) -> Result<Option<SessionMetadata>> {
        let path = self.project_path();
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OrchestratorError::finalize_failed(format!(
                    "failed to read {:?}: {}",
                    path, e
                )))
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| OrchestratorError::finalize_failed(format!("invalid {:?}: {}", path, e)))
    }

    /// Write via a temp file in the same directory, then rename over the target.
    async fn write_atomic(&self, path: &Path, content: &str) -> std::io::Result<()> {
        self.ensure_directories().await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("pagecraft");
        let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        fs::write(&temp_path, content).await?;
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl Persister for FilePersister {
    async fn save(&self, session_id: Uuid, section_name: &str, content: &str) -> Result<()> {
        let path = self.section_path(section_name);
        info!(session_id = %session_id, section = %section_name, "Writing section to {:?}", path);

        self.write_atomic(&path, content).await.map_err(|e| {
            OrchestratorError::persistence(section_name, format!("failed to write {:?}: {}", path, e))
        })
    }

    async fn finalize(&self, metadata: &SessionMetadata) -> Result<()> {
        let path = self.project_path();
        let json = serde_json::to_string_pretty(metadata)
            .map_err(OrchestratorError::finalize_failed)?;
        info!(session_id = %metadata.session_id, "Writing project metadata to {:?}", path);

        self.write_atomic(&path, &json).await.map_err(|e| {
            OrchestratorError::finalize_failed(format!("failed to write {:?}: {}", path, e))
        })
    }
}
