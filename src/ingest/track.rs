use std::fmt;
use std::io;

use tokio::io::AsyncWriteExt;
use tracing::{error, trace};
use webrtc::rtp::packet::Packet;
use webrtc::rtp::packetizer::Depacketizer;
use webrtc::util::Unmarshal;

use crate::engine::{PacketSource, TrackInfo};

use super::sink::Sink;

/// Stays under a typical path MTU.
pub const READ_BUFFER_SIZE: usize = 1400;

/// Why a track loop stopped.
#[derive(Debug)]
pub enum TrackEnd {
    /// The source failed or ran out; the normal way for a track to end.
    SourceClosed(anyhow::Error),
    WriteFailed(io::Error),
}

#[derive(Debug)]
pub struct IngestReport {
    pub packets: u64,
    pub malformed: u64,
    pub undecodable: u64,
    pub units: u64,
    pub bytes: u64,
    pub end: TrackEnd,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packets: {}, malformed: {}, undecodable: {}, units: {}, bytes: {}",
            self.packets, self.malformed, self.undecodable, self.units, self.bytes
        )
    }
}

/// Reads packets from `source` in arrival order and appends every
/// depacketized unit to `sink` until the source ends or a write fails.
///
/// Malformed packets and undecodable payloads are skipped. The sink is shut
/// down on every exit path.
pub async fn ingest(
    info: &TrackInfo,
    mut source: Box<dyn PacketSource>,
    mut depacketizer: Box<dyn Depacketizer + Send>,
    mut sink: Sink,
) -> IngestReport {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let (mut packets, mut malformed, mut undecodable, mut units, mut bytes) = (0, 0, 0, 0, 0);

    let end = loop {
        let n = match source.read(&mut buf).await {
            Ok(n) => n,
            Err(err) => break TrackEnd::SourceClosed(err),
        };
        packets += 1;

        let packet = match Packet::unmarshal(&mut &buf[..n]) {
            Ok(packet) => packet,
            Err(err) => {
                trace!("[{}] malformed rtp packet: {}", info.id, err);
                malformed += 1;
                continue;
            }
        };

        let unit = match depacketizer.depacketize(&packet.payload) {
            Ok(unit) => unit,
            Err(err) => {
                trace!(
                    "[{}] seq {} depacketize error: {}",
                    info.id,
                    packet.header.sequence_number,
                    err
                );
                undecodable += 1;
                continue;
            }
        };
        // partial fragments yield nothing until the unit is complete
        if unit.is_empty() {
            continue;
        }

        if let Err(err) = sink.write_all(&unit).await {
            break TrackEnd::WriteFailed(err);
        }
        units += 1;
        bytes += unit.len() as u64;
    };

    if let Err(err) = sink.shutdown().await {
        if let TrackEnd::SourceClosed(_) = end {
            error!("[{}] failed to close sink: {}", info.id, err);
        }
    }

    IngestReport {
        packets,
        malformed,
        undecodable,
        units,
        bytes,
        end,
    }
}
