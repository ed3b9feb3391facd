//! Live AIS feed adapter
//!
//! The feed is a stream of JSON frames. After connecting, the client sends
//! one subscription frame; the server then pushes message envelopes. Only
//! position reports are used, everything else is ignored.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    collector::Collector,
    errors::{FeedError, SubmitError},
    models::Mmsi,
};

const MESSAGE_TYPE_POSITION_REPORT: &str = "PositionReport";

/// `[[lat, lon], [lat, lon]]` corners of a bounding box
pub type BoundingBox = [[f64; 2]; 2];

/// The whole world
pub const WORLD: BoundingBox = [[-90.0, -180.0], [90.0, 180.0]];

#[derive(Debug, Serialize)]
pub struct SubscriptionMessage {
    #[serde(rename = "APIKey")]
    pub api_key: String,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<BoundingBox>,
}

/// Envelope of every frame pushed by the feed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AisPacket {
    pub message_type: String,
    #[serde(default)]
    pub meta_data: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub message: AisPacketMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AisPacketMessage {
    pub position_report: Option<PositionReport>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PositionReport {
    #[serde(rename = "UserID")]
    pub user_id: u32,
    pub latitude: f64,
    pub longitude: f64,
}

impl AisPacket {
    pub fn parse(frame: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Vessel name carried out-of-band in the metadata, empty when absent
    pub fn ship_name(&self) -> &str {
        self.meta_data
            .get("ShipName")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }

    pub fn position_report(&self) -> Option<&PositionReport> {
        if self.message_type != MESSAGE_TYPE_POSITION_REPORT {
            return None;
        }
        self.message.position_report.as_ref()
    }
}

/// A bidirectional text-frame connection to the feed
#[async_trait]
pub trait FeedConnection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), FeedError>;

    /// Next frame, `None` once the connection has ended.
    async fn next_text(&mut self) -> Result<Option<String>, FeedError>;
}

pub struct FeedListener {
    api_key: String,
    bounding_boxes: Vec<BoundingBox>,
    collector: Arc<Collector>,
}

impl FeedListener {
    pub fn new(
        api_key: impl Into<String>,
        bounding_boxes: Vec<BoundingBox>,
        collector: Arc<Collector>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            bounding_boxes,
            collector,
        }
    }

    /// Subscribe, then feed position reports to the collector until the
    /// connection ends or `cancel` fires.
    pub async fn listen<C: FeedConnection>(
        &self,
        conn: &mut C,
        cancel: CancellationToken,
    ) -> Result<(), FeedError> {
        let subscription = serde_json::to_string(&SubscriptionMessage {
            api_key: self.api_key.clone(),
            bounding_boxes: self.bounding_boxes.clone(),
        })?;
        conn.send_text(subscription).await?;
        info!(
            bounding_boxes = self.bounding_boxes.len(),
            "Subscribed to AIS feed"
        );

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Feed listener stopped");
                    return Ok(());
                }
                frame = conn.next_text() => frame?,
            };
            let Some(frame) = frame else {
                info!("Feed connection closed");
                return Ok(());
            };

            self.process_frame(&frame).await?;
        }
    }

    async fn process_frame(&self, frame: &str) -> Result<(), FeedError> {
        let packet = match AisPacket::parse(frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "Failed to parse feed message");
                return Ok(());
            }
        };

        let Some(report) = packet.position_report() else {
            debug!(message_type = %packet.message_type, "Ignoring feed message");
            return Ok(());
        };

        match self
            .collector
            .submit(
                Mmsi::new(report.user_id),
                packet.ship_name(),
                report.latitude,
                report.longitude,
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(SubmitError::Invalid(e)) => {
                warn!(mmsi = report.user_id, error = %e, "Rejected position report");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Feed connection over standard input/output, one frame per line.
///
/// Lets the binary be bridged to a websocket by an external tool.
pub struct StdioFeed {
    lines: Lines<BufReader<Stdin>>,
    stdout: Stdout,
}

impl StdioFeed {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for StdioFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedConnection for StdioFeed {
    async fn send_text(&mut self, text: String) -> Result<(), FeedError> {
        self.stdout.write_all(text.as_bytes()).await?;
        self.stdout.write_all(b"\n").await?;
        self.stdout.flush().await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Result<Option<String>, FeedError> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }
}
