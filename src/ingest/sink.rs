use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::engine::TrackInfo;

/// Append-only destination for one track's payload units.
pub type Sink = Box<dyn AsyncWrite + Send + Unpin>;

#[async_trait]
pub trait SinkFactory: Send + Sync {
    async fn open(&self, name: &str) -> io::Result<Sink>;
}

/// Opens sinks as files in one directory, truncating existing ones.
pub struct DirSinkFactory {
    dir: PathBuf,
}

impl DirSinkFactory {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SinkFactory for DirSinkFactory {
    async fn open(&self, name: &str) -> io::Result<Sink> {
        let file = tokio::fs::File::create(self.dir.join(name)).await?;
        Ok(Box::new(file))
    }
}

/// `{kind}_{id}.{extension}`, with the id reduced to characters safe in a file name.
/// The kind prefix keeps the result from ever being `.` or `..`.
pub fn file_name(info: &TrackInfo, extension: &str) -> String {
    let id: String = info
        .id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}.{}", info.kind, id, extension)
}
