//! Synthetic sources and sinks for the ingest tests.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWrite;
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;
use webrtc::util::Marshal;

use crate::engine::PacketSource;

pub fn rtp(sequence_number: u16, payload: &[u8]) -> Vec<u8> {
    Packet {
        header: Header {
            version: 2,
            payload_type: 96,
            sequence_number,
            timestamp: sequence_number as u32 * 3000,
            ssrc: 0x1234_5678,
            ..Default::default()
        },
        payload: Bytes::copy_from_slice(payload),
    }
    .marshal()
    .unwrap()
    .to_vec()
}

/// Yields its packets in order, then reports end of stream.
pub struct ScriptedSource {
    packets: VecDeque<Vec<u8>>,
}

impl ScriptedSource {
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self {
            packets: packets.into(),
        }
    }
}

#[async_trait]
impl PacketSource for ScriptedSource {
    async fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        tokio::task::yield_now().await;
        let packet = self
            .packets
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("end of stream"))?;
        if packet.len() > buf.len() {
            anyhow::bail!("short buffer: {} > {}", packet.len(), buf.len());
        }
        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }
}

#[derive(Clone, Default)]
pub struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
    shutdown: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl AsyncWrite for MemorySink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.data.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdown.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// Rejects every write, like a full disk.
#[derive(Clone, Default)]
pub struct FailingSink {
    shutdown: Arc<AtomicBool>,
}

impl FailingSink {
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl AsyncWrite for FailingSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdown.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
