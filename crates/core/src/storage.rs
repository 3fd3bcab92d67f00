//! On-disk layout for sources, renditions and their scratch files.
//!
//! ```text
//! <root>/sources/<user>/<source_id>.<ext>
//! <root>/renditions/<user>/<rendition_id>.mp4
//! <root>/renditions/<user>/<rendition_id>_clean.mp4   (scratch)
//! <root>/renditions/<user>/<rendition_id>_synth.mp4   (scratch)
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

const BUFFER_SIZE: usize = 64 * 1024;

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding `sources/` and `renditions/`.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

/// Resolves storage paths under a root directory.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sources_dir(&self, user_id: &str) -> PathBuf {
        self.root.join("sources").join(path_component(user_id))
    }

    pub fn renditions_dir(&self, user_id: &str) -> PathBuf {
        self.root.join("renditions").join(path_component(user_id))
    }

    /// Location of a source file, keeping the uploaded file's extension.
    pub fn source_path(&self, user_id: &str, source_id: &str, original_filename: &str) -> PathBuf {
        let ext = Path::new(original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "mp4".to_string());
        self.sources_dir(user_id)
            .join(format!("{}.{}", path_component(source_id), ext))
    }

    pub fn rendition_path(&self, user_id: &str, rendition_id: &str) -> PathBuf {
        self.renditions_dir(user_id)
            .join(format!("{}.mp4", path_component(rendition_id)))
    }

    /// Scratch output of the scrub stage.
    pub fn scrubbed_path(&self, user_id: &str, rendition_id: &str) -> PathBuf {
        self.renditions_dir(user_id)
            .join(format!("{}_clean.mp4", path_component(rendition_id)))
    }

    /// Scratch output of the synthesize stage.
    pub fn synthesized_path(&self, user_id: &str, rendition_id: &str) -> PathBuf {
        self.renditions_dir(user_id)
            .join(format!("{}_synth.mp4", path_component(rendition_id)))
    }

    /// Creates the per-user directories.
    pub async fn ensure_user_dirs(&self, user_id: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.sources_dir(user_id)).await?;
        tokio::fs::create_dir_all(self.renditions_dir(user_id)).await
    }
}

/// Maps an identifier to a single safe path component.
fn path_component(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Hex SHA-256 of a file's contents.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let file = File::open(path).await?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut hasher = Sha256::new();

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
