use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::{RemoteTrack, TrackHandler};

use self::dispatch::dispatch;
use self::sink::{file_name, SinkFactory};
use self::track::{IngestReport, TrackEnd};

pub mod dispatch;
pub mod sink;
pub mod track;

#[cfg(test)]
mod testing;

/// Turns every arriving track into its own ingestion task.
#[derive(Clone)]
pub struct Ingestor {
    sinks: Arc<dyn SinkFactory>,
}

impl Ingestor {
    pub fn new(sinks: Arc<dyn SinkFactory>) -> Self {
        Self { sinks }
    }

    /// Returns `None` without touching the sink factory when the codec is unsupported.
    pub fn spawn(&self, track: RemoteTrack) -> Option<JoinHandle<anyhow::Result<IngestReport>>> {
        let RemoteTrack { info, source } = track;
        info!(
            "[{}] [track] kind: {}, codec: {}, payload type: {}",
            info.id, info.kind, info.mime_type, info.payload_type
        );
        let Some(dispatch) = dispatch(&info.mime_type) else {
            warn!(
                "[{}] [track] unsupported codec: {}, ignored",
                info.id, info.mime_type
            );
            return None;
        };
        let sinks = self.sinks.clone();
        Some(tokio::spawn(async move {
            let name = file_name(&info, dispatch.extension);
            let sink = sinks.open(&name).await.map_err(|e| {
                error!("[{}] [track] failed to create {}: {}", info.id, name, e);
                anyhow::anyhow!("failed to create {}: {}", name, e)
            })?;
            info!("[{}] [track] {:?} start writing {}", info.id, dispatch.codec, name);
            let report = track::ingest(&info, source, dispatch.depacketizer, sink).await;
            match &report.end {
                TrackEnd::SourceClosed(err) => {
                    info!("[{}] [track] {} closed ({}): {}", info.id, name, err, report)
                }
                TrackEnd::WriteFailed(err) => {
                    error!("[{}] [track] {} write error ({}): {}", info.id, name, err, report)
                }
            }
            Ok(report)
        }))
    }
}

impl TrackHandler for Ingestor {
    fn on_track(&self, track: RemoteTrack) {
        let _ = self.spawn(track);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::engine::{TrackInfo, TrackKind};

    use super::sink::Sink;
    use super::testing::{rtp, FailingSink, MemorySink, ScriptedSource};
    use super::*;

    /// Hands out memory sinks, except for names listed as broken.
    #[derive(Default)]
    struct MemorySinks {
        broken: Vec<String>,
        opened: Mutex<HashMap<String, MemorySink>>,
    }

    impl MemorySinks {
        fn get(&self, name: &str) -> Option<MemorySink> {
            self.opened.lock().unwrap().get(name).cloned()
        }

        fn names(&self) -> Vec<String> {
            let mut names: Vec<_> = self.opened.lock().unwrap().keys().cloned().collect();
            names.sort();
            names
        }
    }

    #[async_trait]
    impl SinkFactory for MemorySinks {
        async fn open(&self, name: &str) -> io::Result<Sink> {
            if self.broken.iter().any(|b| b == name) {
                return Ok(Box::new(FailingSink::default()));
            }
            let sink = MemorySink::default();
            self.opened
                .lock()
                .unwrap()
                .insert(name.to_string(), sink.clone());
            Ok(Box::new(sink))
        }
    }

    fn track(id: &str, kind: TrackKind, mime_type: &str, packets: Vec<Vec<u8>>) -> RemoteTrack {
        RemoteTrack {
            info: TrackInfo {
                id: id.to_string(),
                kind,
                mime_type: mime_type.to_string(),
                payload_type: 111,
            },
            source: Box::new(ScriptedSource::new(packets)),
        }
    }

    #[tokio::test]
    async fn test_unsupported_codec_creates_no_sink() {
        let sinks = Arc::new(MemorySinks::default());
        let ingestor = Ingestor::new(sinks.clone());

        let handle = ingestor.spawn(track(
            "v9",
            TrackKind::Video,
            "video/VP9",
            vec![rtp(1, &[0x01, 0x02, 0x03])],
        ));

        assert!(handle.is_none());
        assert!(sinks.names().is_empty());
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_stop_other_track() {
        let sinks = Arc::new(MemorySinks {
            broken: vec!["audio_a0.opus".to_string()],
            ..Default::default()
        });
        let ingestor = Ingestor::new(sinks.clone());

        let audio: Vec<_> = (1..=20).map(|i| rtp(i, &[i as u8; 8])).collect();
        let video: Vec<_> = (1..=20)
            .map(|i| rtp(i, &[0x10, i as u8, i as u8, i as u8, i as u8]))
            .collect();

        let audio = ingestor
            .spawn(track("a0", TrackKind::Audio, "audio/opus", audio))
            .unwrap();
        let video = ingestor
            .spawn(track("v0", TrackKind::Video, "video/VP8", video))
            .unwrap();
        let (audio, video) = tokio::join!(audio, video);

        let audio = audio.unwrap().unwrap();
        assert!(matches!(audio.end, TrackEnd::WriteFailed(_)));
        assert_eq!(0, audio.units);

        let video = video.unwrap().unwrap();
        assert!(matches!(video.end, TrackEnd::SourceClosed(_)));
        assert_eq!(20, video.packets);
        assert_eq!(20, video.units);
        let expected: Vec<u8> = (1..=20u8).flat_map(|i| [i; 4]).collect();
        assert_eq!(expected, sinks.get("video_v0.vp8").unwrap().contents());
    }

    #[tokio::test]
    async fn test_track_handler_spawns_detached_task() {
        let sinks = Arc::new(MemorySinks::default());
        let handler: Arc<dyn TrackHandler> = Arc::new(Ingestor::new(sinks.clone()));

        handler.on_track(track(
            "a1",
            TrackKind::Audio,
            "audio/opus",
            vec![rtp(1, &[0xF8, 0xFF, 0xFE])],
        ));

        let mut contents = vec![];
        for _ in 0..100 {
            if let Some(sink) = sinks.get("audio_a1.opus") {
                if sink.is_shutdown() {
                    contents = sink.contents();
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(vec![0xF8, 0xFF, 0xFE], contents);
    }
}
