//! Builders for configs and logs

use datalog_rs::config::{AppConfig, ChannelConfig, TransportKind};

/// Config with `channels` simulated channels, each on its own port
pub fn simulated_config(channels: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.acquisition.sample_rate_hz = 100.0;
    config.acquisition.flush_interval_s = 0.1;
    config.channels = (0..channels)
        .map(|i| {
            ChannelConfig::new(format!("Sensor {}", i + 1), format!("sim{}", i), 1)
                .with_unit("mm")
                .with_transport(TransportKind::Simulated)
        })
        .collect();
    config
}

/// CSV log text built row by row
#[derive(Debug, Clone)]
pub struct LogBuilder {
    lines: Vec<String>,
}

impl LogBuilder {
    /// Start with a header of `Timestamp` plus the given columns
    pub fn new(columns: &[&str]) -> Self {
        let mut header = vec!["Timestamp"];
        header.extend_from_slice(columns);
        Self {
            lines: vec![header.join(",")],
        }
    }

    /// Append a row; `None` becomes an empty field
    pub fn row(mut self, timestamp: &str, values: &[Option<f64>]) -> Self {
        let mut fields = vec![timestamp.to_string()];
        fields.extend(values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        self.lines.push(fields.join(","));
        self
    }

    /// Append a raw line as-is
    pub fn raw(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}
