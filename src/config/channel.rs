//! Per-channel instrument descriptors
//!
//! A [`ChannelConfig`] describes one physical reading: which serial port it
//! lives on, how to address the instrument, which register of the response
//! block to keep, and how to scale the raw register into a display value.
//!
//! # Scaling
//!
//! Scaling is a tagged [`ScaleRule`]: either a linear factor or a named
//! transform resolved through a fixed registry of pure functions. Configs
//! never carry executable code.
//!
//! ```toml
//! scale = { linear = 0.1 }
//! scale = { transform = "encoder_offset_4096" }
//! ```

use serde::{Deserialize, Serialize};

/// Modbus "read holding registers"
pub const FN_READ_HOLDING_REGISTERS: u8 = 0x03;
/// Modbus "read input registers"
pub const FN_READ_INPUT_REGISTERS: u8 = 0x04;

/// How a channel's transport is provided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Modbus RTU over a real serial port
    #[default]
    Serial,
    /// Deterministic register generator, no hardware required
    Simulated,
}

/// Serial parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParitySetting {
    #[default]
    None,
    Odd,
    Even,
}

impl From<ParitySetting> for serialport::Parity {
    fn from(parity: ParitySetting) -> Self {
        match parity {
            ParitySetting::None => serialport::Parity::None,
            ParitySetting::Odd => serialport::Parity::Odd,
            ParitySetting::Even => serialport::Parity::Even,
        }
    }
}

/// Line settings for a serial transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits (5-8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Parity
    #[serde(default)]
    pub parity: ParitySetting,

    /// Stop bits (1 or 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,

    /// Response timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    30
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: ParitySetting::None,
            stop_bits: default_stop_bits(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SerialSettings {
    /// Data bits as a serialport setting
    pub fn serial_data_bits(&self) -> Option<serialport::DataBits> {
        match self.data_bits {
            5 => Some(serialport::DataBits::Five),
            6 => Some(serialport::DataBits::Six),
            7 => Some(serialport::DataBits::Seven),
            8 => Some(serialport::DataBits::Eight),
            _ => None,
        }
    }

    /// Stop bits as a serialport setting
    pub fn serial_stop_bits(&self) -> Option<serialport::StopBits> {
        match self.stop_bits {
            1 => Some(serialport::StopBits::One),
            2 => Some(serialport::StopBits::Two),
            _ => None,
        }
    }

    /// Response timeout
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// Identifier of a statically registered value transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformId {
    /// Raw value passed through unchanged
    #[serde(rename = "identity")]
    Identity,
    /// Raw register reinterpreted as a two's complement i16
    #[serde(rename = "signed_16")]
    Signed16,
    /// 12-bit encoder counts around a 1000 count offset: `(x - 1000) * 100 / 4096`
    #[serde(rename = "encoder_offset_4096")]
    EncoderOffset4096,
}

struct TransformEntry {
    id: TransformId,
    name: &'static str,
    apply: fn(f64) -> f64,
}

static TRANSFORMS: &[TransformEntry] = &[
    TransformEntry {
        id: TransformId::Identity,
        name: "identity",
        apply: identity,
    },
    TransformEntry {
        id: TransformId::Signed16,
        name: "signed_16",
        apply: signed_16,
    },
    TransformEntry {
        id: TransformId::EncoderOffset4096,
        name: "encoder_offset_4096",
        apply: encoder_offset_4096,
    },
];

fn identity(x: f64) -> f64 {
    x
}

fn signed_16(x: f64) -> f64 {
    if x >= 32_768.0 {
        x - 65_536.0
    } else {
        x
    }
}

fn encoder_offset_4096(x: f64) -> f64 {
    ((x - 1000.0) * 100.0) / 4096.0
}

impl TransformId {
    fn entry(self) -> &'static TransformEntry {
        // Every variant has exactly one registry entry
        TRANSFORMS
            .iter()
            .find(|entry| entry.id == self)
            .unwrap_or(&TRANSFORMS[0])
    }

    /// Apply the registered function
    pub fn apply(self, raw: f64) -> f64 {
        (self.entry().apply)(raw)
    }

    /// Registry name (as written in config files)
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Look up a transform by registry name
    pub fn from_name(name: &str) -> Option<Self> {
        TRANSFORMS
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id)
    }

    /// All registered transform names
    pub fn names() -> impl Iterator<Item = &'static str> {
        TRANSFORMS.iter().map(|entry| entry.name)
    }
}

/// Rule turning a raw register value into an engineering value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleRule {
    /// `raw * factor`
    Linear(f64),
    /// Named function from the transform registry
    Transform(TransformId),
}

impl Default for ScaleRule {
    fn default() -> Self {
        ScaleRule::Linear(1.0)
    }
}

impl ScaleRule {
    /// Apply the rule to a raw value
    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            ScaleRule::Linear(factor) => raw * factor,
            ScaleRule::Transform(id) => id.apply(raw),
        }
    }
}

impl std::fmt::Display for ScaleRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleRule::Linear(factor) => write!(f, "x{}", factor),
            ScaleRule::Transform(id) => write!(f, "{}", id.name()),
        }
    }
}

/// Immutable descriptor for one instrument channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Display name (unique per session)
    pub name: String,

    /// Engineering unit, used in the log header and plot labels
    #[serde(default)]
    pub unit: String,

    /// Serial port path, e.g. "/dev/ttyUSB0" or "COM12"
    pub port: String,

    /// Transport implementation
    #[serde(default)]
    pub transport: TransportKind,

    /// Line settings
    #[serde(flatten)]
    pub serial: SerialSettings,

    /// Slave/unit address on the bus
    #[serde(default = "default_unit_address")]
    pub unit_address: u8,

    /// First register to read (0-based)
    #[serde(default)]
    pub register_address: u16,

    /// Number of consecutive registers to read
    #[serde(default = "default_register_count")]
    pub register_count: u16,

    /// Function code (3 = holding, 4 = input)
    #[serde(default = "default_function_code")]
    pub function_code: u8,

    /// Index of the register to keep from the response block
    #[serde(default)]
    pub field_index: usize,

    /// Scaling rule applied to the selected register
    #[serde(default)]
    pub scale: ScaleRule,
}

fn default_unit_address() -> u8 {
    1
}

fn default_register_count() -> u16 {
    1
}

fn default_function_code() -> u8 {
    FN_READ_HOLDING_REGISTERS
}

impl ChannelConfig {
    /// Create a channel with default line settings and linear scale of 1.0
    pub fn new(name: impl Into<String>, port: impl Into<String>, unit_address: u8) -> Self {
        Self {
            name: name.into(),
            unit: String::new(),
            port: port.into(),
            transport: TransportKind::Serial,
            serial: SerialSettings::default(),
            unit_address,
            register_address: 0,
            register_count: default_register_count(),
            function_code: FN_READ_HOLDING_REGISTERS,
            field_index: 0,
            scale: ScaleRule::default(),
        }
    }

    /// Set the engineering unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the register block and the field kept from it
    pub fn with_registers(mut self, address: u16, count: u16, field_index: usize) -> Self {
        self.register_address = address;
        self.register_count = count;
        self.field_index = field_index;
        self
    }

    /// Set the scaling rule
    pub fn with_scale(mut self, scale: ScaleRule) -> Self {
        self.scale = scale;
        self
    }

    /// Set the transport kind
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.serial.baud_rate = baud_rate;
        self
    }

    /// Column label used in the log header: `Name (Unit)`
    pub fn column_label(&self) -> String {
        format!("{} ({})", self.name, self.unit)
    }

    /// Check the descriptor for values the transport cannot honour
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("channel name must not be empty".to_string());
        }
        if self.port.trim().is_empty() {
            return Err(format!("channel '{}' has no port", self.name));
        }
        if self.register_count == 0 {
            return Err(format!("channel '{}' reads zero registers", self.name));
        }
        if self.field_index >= self.register_count as usize {
            return Err(format!(
                "channel '{}' field index {} is outside a block of {} registers",
                self.name, self.field_index, self.register_count
            ));
        }
        if !matches!(
            self.function_code,
            FN_READ_HOLDING_REGISTERS | FN_READ_INPUT_REGISTERS
        ) {
            return Err(format!(
                "channel '{}' uses unsupported function code {}",
                self.name, self.function_code
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(format!("channel '{}' has a zero baud rate", self.name));
        }
        if self.serial.serial_data_bits().is_none() {
            return Err(format!(
                "channel '{}' has invalid data bits {}",
                self.name, self.serial.data_bits
            ));
        }
        if self.serial.serial_stop_bits().is_none() {
            return Err(format!(
                "channel '{}' has invalid stop bits {}",
                self.name, self.serial.stop_bits
            ));
        }
        if let ScaleRule::Linear(factor) = self.scale {
            if !factor.is_finite() {
                return Err(format!("channel '{}' has a non-finite scale", self.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_scale() {
        assert_eq!(ScaleRule::Linear(0.5).apply(10.0), 5.0);
        assert_eq!(ScaleRule::default().apply(42.0), 42.0);
    }

    #[test]
    fn test_transform_registry() {
        let rule = ScaleRule::Transform(TransformId::EncoderOffset4096);
        assert_eq!(rule.apply(1000.0), 0.0);
        assert!((rule.apply(5096.0) - 100.0).abs() < 1e-9);

        assert_eq!(TransformId::Signed16.apply(65_535.0), -1.0);
        assert_eq!(TransformId::Signed16.apply(100.0), 100.0);

        for name in TransformId::names() {
            let id = TransformId::from_name(name).unwrap();
            assert_eq!(id.name(), name);
        }
        assert!(TransformId::from_name("lambda").is_none());
    }

    #[test]
    fn test_scale_rule_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            scale: ScaleRule,
        }

        let linear: Wrapper = toml::from_str("scale = { linear = 2.5 }").unwrap();
        assert_eq!(linear.scale, ScaleRule::Linear(2.5));

        let named: Wrapper =
            toml::from_str("scale = { transform = \"encoder_offset_4096\" }").unwrap();
        assert_eq!(
            named.scale,
            ScaleRule::Transform(TransformId::EncoderOffset4096)
        );

        assert!(toml::from_str::<Wrapper>("scale = { transform = \"rm -rf\" }").is_err());
    }

    #[test]
    fn test_channel_validation() {
        let channel = ChannelConfig::new("Sensor 1", "/dev/ttyUSB0", 1).with_registers(512, 3, 0);
        assert!(channel.validate().is_ok());

        let bad_index = channel.clone().with_registers(0, 2, 2);
        assert!(bad_index.validate().is_err());

        let mut bad_fn = channel.clone();
        bad_fn.function_code = 6;
        assert!(bad_fn.validate().is_err());

        let mut bad_bits = channel;
        bad_bits.serial.data_bits = 9;
        assert!(bad_bits.validate().is_err());
    }

    #[test]
    fn test_column_label() {
        let channel = ChannelConfig::new("Sensor 2", "COM12", 2).with_unit("mm");
        assert_eq!(channel.column_label(), "Sensor 2 (mm)");
    }
}
