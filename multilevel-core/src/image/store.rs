//! Flat directory holding every downloaded image.

use chrono::NaiveDateTime;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};

use crate::{error::Result, image::ImageFormat};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where an image came from; decides its filename prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    Generated,
    Edited,
    Variation,
}

impl ImageOrigin {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Edited => "edited",
            Self::Variation => "variation",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the directory if absent.
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Writes `data` as `<prefix>_<YYYYMMDD_HHMMSS>.png`.
    ///
    /// Files are created exclusively; if another image already took the name
    /// within the same second, `_1`, `_2`, ... is appended before the extension.
    pub async fn persist(
        &self,
        origin: ImageOrigin,
        data: &[u8],
        now: NaiveDateTime,
    ) -> Result<(String, PathBuf)> {
        let stem = format!("{}_{}", origin.prefix(), now.format(TIMESTAMP_FORMAT));

        let mut attempt = 0u32;
        loop {
            let filename = match attempt {
                0 => format!("{stem}.png"),
                n => format!("{stem}_{n}.png"),
            };
            let path = self.dir.join(&filename);

            let open = fs::OpenOptions::new().write(true).create_new(true).open(&path).await;
            let file = match open {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            write_or_discard(&path, file, data).await?;
            tracing::debug!(filename, bytes = data.len(), "stored image");

            return Ok((filename, path));
        }
    }

    /// Live scan of image files, sorted by name. A missing directory is empty.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if ImageFormat::from_filename(&name).is_some() && entry.file_type().await?.is_file() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Path of a stored file, if `filename` is a plain name that exists.
    pub async fn resolve(&self, filename: &str) -> Option<PathBuf> {
        if !is_plain_filename(filename) {
            return None;
        }

        let path = self.dir.join(filename);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

/// Writes `data` through `file`; on failure the file at `path` is removed so
/// no truncated image is ever listed or served.
async fn write_or_discard(path: &Path, mut file: impl AsyncWrite + Unpin, data: &[u8]) -> Result<()> {
    let written = async {
        file.write_all(data).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial image");
        }
        return Err(e.into());
    }

    Ok(())
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|f| f == name)
}
