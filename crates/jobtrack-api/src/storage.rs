use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CLAIM_ATTEMPTS: usize = 8;

/// On-disk media storage for résumés and profile pictures.
///
/// Files are addressed by paths relative to the media root
/// (`resumes/jan_Developer_20250101120000.pdf`); that relative path is what
/// gets stored in the database.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Absolute path for a stored file. Rejects anything that would escape the media root.
    pub fn file_path(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        let clean = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if relative.is_empty() || !clean {
            bail!("Invalid media path {:?}", relative);
        }
        Ok(self.dir.join(rel))
    }

    /// Write `data` under `relative`, returning the path actually used. If the
    /// name is taken a short random suffix is added before the extension.
    ///
    /// The bytes land in a temporary file first and are hard-linked into place.
    /// The link fails when the target exists, so two concurrent saves of the
    /// same name never share a file and a reader never sees a partial upload.
    pub async fn save(&self, relative: &str, data: &[u8]) -> Result<String> {
        let path = self.file_path(relative)?;
        let parent = path.parent().unwrap_or(&self.dir).to_path_buf();
        fs::create_dir_all(&parent).await?;

        let tmp = parent.join(format!(".{}.part", Uuid::new_v4()));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.flush().await?;
        drop(file);

        let claimed = self.claim_name(&tmp, relative).await;
        if let Err(e) = fs::remove_file(&tmp).await {
            warn!("Failed to remove temp file {}: {}", tmp.display(), e);
        }
        let stored = claimed?;

        info!("Stored {} ({} bytes)", stored, data.len());
        Ok(stored)
    }

    async fn claim_name(&self, tmp: &Path, relative: &str) -> Result<String> {
        let mut candidate = relative.to_string();
        for _ in 0..CLAIM_ATTEMPTS {
            match fs::hard_link(tmp, self.file_path(&candidate)?).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} is taken", candidate);
                    candidate = with_suffix(relative);
                }
                Err(e) => return Err(e.into()),
            }
        }
        bail!("No free name for {} after {} attempts", relative, CLAIM_ATTEMPTS)
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.file_path(relative)?).await?)
    }

    pub async fn exists(&self, relative: &str) -> Result<bool> {
        Ok(fs::try_exists(self.file_path(relative)?).await?)
    }

    /// Delete a stored file. A file that is already gone is not an error.
    pub async fn delete_file(&self, relative: &str) -> Result<()> {
        let path = self.file_path(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("File {} already gone", relative);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// `resumes/cv.pdf` -> `resumes/cv_1a2b3c4.pdf`
fn with_suffix(relative: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..7];
    match relative.rsplit_once('.') {
        Some((stem, ext)) if !stem.ends_with('/') && !ext.contains('/') => {
            format!("{stem}_{suffix}.{ext}")
        }
        _ => format!("{relative}_{suffix}"),
    }
}
