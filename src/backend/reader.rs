//! Channel reader
//!
//! Owns every open transport and turns a channel descriptor into one scaled
//! value per call. Channels that name the same port share a transport, so a
//! Modbus bus with several unit addresses is opened once.
//!
//! Reads never fail outward: any transport, timeout or decode error becomes
//! `None` for that channel in that round.

use super::transport::{LinkStats, RegisterRequest, RegisterTransport, TransportFactory};
use crate::config::{ChannelConfig, TransportKind};
use crate::error::{DataLogError, Result};
use std::collections::HashMap;
use std::time::Instant;

/// Read one channel over an open transport: one exchange, field selection,
/// then scaling.
pub fn read_channel(transport: &mut dyn RegisterTransport, channel: &ChannelConfig) -> Result<f64> {
    let registers = transport.read_registers(&RegisterRequest::from(channel))?;
    let raw = registers.get(channel.field_index).copied().ok_or_else(|| {
        DataLogError::Protocol(format!(
            "field {} missing from {} register block",
            channel.field_index,
            registers.len()
        ))
    })?;
    Ok(channel.scale.apply(raw as f64))
}

/// Reads every configured channel over shared transports
pub struct ChannelReader {
    channels: Vec<ChannelConfig>,
    links: Vec<Box<dyn RegisterTransport>>,
    /// Link index per channel, `None` when the transport failed to open
    link_of: Vec<Option<usize>>,
    stats: Vec<LinkStats>,
    closed: bool,
}

impl std::fmt::Debug for ChannelReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelReader")
            .field("channels", &self.channels.len())
            .field("links", &self.links.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl ChannelReader {
    /// Open one transport per distinct port
    ///
    /// A channel whose transport fails to open keeps its slot and always
    /// reads `None`. Fails when no channel is configured or no transport
    /// opens at all.
    pub fn open(channels: Vec<ChannelConfig>, factory: &dyn TransportFactory) -> Result<Self> {
        if channels.is_empty() {
            return Err(DataLogError::Config("no channels configured".to_string()));
        }

        let mut links: Vec<Box<dyn RegisterTransport>> = Vec::new();
        let mut by_port: HashMap<(TransportKind, String), Option<usize>> = HashMap::new();
        let mut link_of = Vec::with_capacity(channels.len());

        for channel in &channels {
            let key = (channel.transport, channel.port.clone());
            let slot = match by_port.get(&key) {
                Some(slot) => *slot,
                None => {
                    let slot = match factory.open(channel) {
                        Ok(link) => {
                            links.push(link);
                            Some(links.len() - 1)
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to open {} for '{}': {}",
                                channel.port,
                                channel.name,
                                e
                            );
                            None
                        }
                    };
                    by_port.insert(key, slot);
                    slot
                }
            };
            link_of.push(slot);
        }

        if links.is_empty() {
            return Err(DataLogError::Config(
                "no channel transport could be opened".to_string(),
            ));
        }

        tracing::info!(
            "Channel reader ready: {} channels over {} links",
            channels.len(),
            links.len()
        );

        let stats = vec![LinkStats::default(); channels.len()];
        Ok(Self {
            channels,
            links,
            link_of,
            stats,
            closed: false,
        })
    }

    /// Configured channels, in column order
    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    /// Number of configured channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of distinct open transports
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether the channel at `index` has a transport
    pub fn is_connected(&self, index: usize) -> bool {
        !self.closed && matches!(self.link_of.get(index), Some(Some(_)))
    }

    /// Read statistics per channel
    pub fn stats(&self) -> &[LinkStats] {
        &self.stats
    }

    /// Read one channel, `None` on any failure
    pub fn read(&mut self, index: usize) -> Option<f64> {
        let channel = self.channels.get(index)?;
        let link = match self.link_of[index] {
            Some(link) if !self.closed => link,
            _ => {
                self.stats[index].record_failure(false);
                return None;
            }
        };

        let start = Instant::now();
        match read_channel(self.links[link].as_mut(), channel) {
            Ok(value) => {
                self.stats[index].record_success(start.elapsed());
                Some(value)
            }
            Err(e) => {
                tracing::debug!("Read failed for '{}': {}", channel.name, e);
                self.stats[index].record_failure(e.is_timeout());
                None
            }
        }
    }

    /// Read every channel sequentially; always one slot per channel
    pub fn read_round(&mut self) -> Vec<Option<f64>> {
        (0..self.channels.len()).map(|i| self.read(i)).collect()
    }

    /// Close every transport once. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for link in &mut self.links {
            link.close();
        }
        self.closed = true;
        tracing::info!("Closed {} channel links", self.links.len());
    }

    /// Log per-channel link statistics
    pub fn log_link_stats(&self) {
        for (channel, stats) in self.channels.iter().zip(&self.stats) {
            if stats.successful_reads + stats.failed_reads == 0 {
                continue;
            }
            tracing::info!(
                "'{}' on {}: {:.1}% ok ({} timeouts), avg {:.0}us, jitter {}us",
                channel.name,
                channel.port,
                stats.success_rate(),
                stats.timeouts,
                stats.avg_read_time_us(),
                stats.jitter_us()
            );
        }
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ChannelReader {
    fn drop(&mut self) {
        self.close();
    }
}
