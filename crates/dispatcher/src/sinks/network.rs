//! UDP announcement sink.
//!
//! Datagrams carry a compact per-frame announcement; pixel data never
//! goes on the wire. Downstream consumers that need the image read it
//! from the file sink output.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

use contracts::{ContractError, FrameSink, StampSource, StampedFrame};

/// Wire encoding of the announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// Human-readable, larger
    #[default]
    Json,
    /// Binary, compact
    Bincode,
}

/// NetworkSink settings
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    /// Warn threshold; IPv4 UDP tops out at 65507 payload bytes
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Parse from the sink's free-form params map.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr = match params.get("addr") {
            Some(s) => s
                .parse::<SocketAddr>()
                .map_err(|e| format!("invalid address '{s}': {e}"))?,
            None => return Err("missing 'addr' parameter".to_string()),
        };
        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{other}'")),
        };
        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Per-frame wire record
#[derive(Debug, Serialize, Deserialize)]
pub struct FrameAnnouncement {
    pub seq: u64,
    pub timestamp: f64,
    pub camera_id: String,
    pub width: u32,
    pub height: u32,
    pub stamp_source: StampSource,
    pub trigger_counter: Option<u32>,
    pub trigger_latency: Option<f64>,
    pub data_len: usize,
}

impl FrameAnnouncement {
    fn from_frame(frame: &StampedFrame) -> Self {
        Self {
            seq: frame.seq,
            timestamp: frame.timestamp,
            camera_id: frame.info.camera_id.to_string(),
            width: frame.width,
            height: frame.height,
            stamp_source: frame.stamp_source,
            trigger_counter: frame.sync_meta.trigger_counter,
            trigger_latency: frame.sync_meta.trigger_latency,
            data_len: frame.data.len(),
        }
    }
}

/// Announces every dispatched frame over a connected UDP socket.
///
/// Sends are fire-and-forget; a failed send is logged but never surfaces
/// as a write error, matching UDP's delivery contract.
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;
        debug!(sink = %name, target = %config.addr, "udp sink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Factory entry used by the dispatcher's sink table.
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_write("network", e))?;

        Self::new(name, config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: "network".to_string(),
                message: e.to_string(),
            })
    }

    fn encode(&self, frame: &StampedFrame) -> Result<Vec<u8>, ContractError> {
        let announcement = FrameAnnouncement::from_frame(frame);
        let encoded = match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(&announcement)
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?,
            NetworkFormat::Bincode => bincode::serialize(&announcement)
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?,
        };
        if encoded.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = encoded.len(),
                max = self.config.max_packet_size,
                "announcement exceeds configured packet size"
            );
        }
        Ok(encoded)
    }
}

impl FrameSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, frame: &StampedFrame) -> Result<(), ContractError> {
        let payload = self.encode(frame)?;
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket already closed"))?;

        match socket.send(&payload).await {
            Ok(sent) => debug!(sink = %self.name, seq = frame.seq, bytes = sent, "announced"),
            Err(e) => error!(sink = %self.name, seq = frame.seq, error = %e, "udp send failed"),
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "udp sink closed");
        Ok(())
    }
}
