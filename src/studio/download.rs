// Download - hand a record's source to a save action

use super::error::{Result, StudioError};
use super::transfer::{is_remote, parse_data_uri};
use std::path::{Path, PathBuf};
use tracing::info;

/// Save action for a displayed image. Implementations must not hit the network.
pub trait ImageSaver {
    fn save(&self, src: &str, filename: &str) -> Result<PathBuf>;
}

/// Writes data-URI images into a directory
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ImageSaver for DirectorySaver {
    fn save(&self, src: &str, filename: &str) -> Result<PathBuf> {
        if is_remote(src) {
            return Err(StudioError::MalformedSource(
                "remote images must be opened in a browser to save".to_string(),
            ));
        }
        let (_, bytes) = parse_data_uri(src)?;

        // Only the final path component of the name is used
        let filename = Path::new(filename)
            .file_name()
            .ok_or_else(|| StudioError::MalformedSource(format!("bad filename: {}", filename)))?;

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)?;

        info!(path = %path.display(), "Saved image");
        Ok(path)
    }
}
