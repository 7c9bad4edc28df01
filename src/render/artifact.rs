use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use log::{info, warn};
use tempfile::NamedTempFile;

use crate::error::{Result, VizError};

// ---------------------------------------------------------------------------
// All-or-nothing PNG output for one pipeline run
// ---------------------------------------------------------------------------

/// Images rendered by one pipeline, written together.
pub struct ArtifactSet {
    dir: PathBuf,
    images: Vec<(String, RgbImage)>,
}

impl ArtifactSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ArtifactSet {
            dir: dir.into(),
            images: Vec::new(),
        }
    }

    pub fn add(&mut self, file_name: &str, image: RgbImage) {
        self.images.push((file_name.to_string(), image));
    }

    /// Encode every image and stage it in a temporary file next to its
    /// target; only once all are staged are they renamed into place. A
    /// failed rename removes the files this call already put in place.
    pub fn write(self) -> Result<Vec<PathBuf>> {
        let mut encoded = Vec::with_capacity(self.images.len());
        for (name, image) in &self.images {
            let mut bytes = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .map_err(|e| VizError::Render(format!("encoding {name}: {e}")))?;
            encoded.push((self.dir.join(name), bytes));
        }

        fs::create_dir_all(&self.dir).map_err(|source| VizError::Io {
            path: self.dir.clone(),
            source,
        })?;

        // dropping a NamedTempFile deletes it, so an early return here
        // leaves nothing behind
        let mut staged = Vec::with_capacity(encoded.len());
        for (path, bytes) in encoded {
            let temp = stage(&self.dir, &bytes).map_err(|source| VizError::Io {
                path: path.clone(),
                source,
            })?;
            staged.push((temp, path));
        }

        let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
        for (temp, path) in staged {
            if let Err(e) = temp.persist(&path) {
                roll_back(&written);
                return Err(VizError::Io {
                    path,
                    source: e.error,
                });
            }
            info!("wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn stage(dir: &Path, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

fn roll_back(written: &[PathBuf]) {
    for path in written {
        if let Err(e) = fs::remove_file(path) {
            warn!("could not remove partial output {}: {e}", path.display());
        }
    }
}
