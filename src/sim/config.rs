use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimConfig {
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_org_preset")]
    pub org_preset: String,
    #[serde(default = "default_timing_preset")]
    pub timing_preset: String,
    #[serde(default = "default_clock_ratio")]
    pub clock_ratio: i64,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Config for SimConfig {}

fn default_device() -> String {
    "GDDR6".to_string()
}

fn default_org_preset() -> String {
    "GDDR6_AiM_org".to_string()
}

fn default_timing_preset() -> String {
    "GDDR6_AiM_timing".to_string()
}

fn default_clock_ratio() -> i64 {
    1
}

fn default_delimiter() -> String {
    " ".to_string()
}

fn default_timeout() -> u64 {
    100_000_000
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            device: default_device(),
            org_preset: default_org_preset(),
            timing_preset: default_timing_preset(),
            clock_ratio: default_clock_ratio(),
            delimiter: default_delimiter(),
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BufferConfig {
    #[serde(default = "default_buffer_size")]
    pub read_size: usize,
    #[serde(default = "default_buffer_size")]
    pub write_size: usize,
    #[serde(default = "default_buffer_size")]
    pub aim_size: usize,
    #[serde(default = "default_buffer_size")]
    pub active_size: usize,
    #[serde(default = "default_priority_size")]
    pub priority_size: usize,
    #[serde(default = "default_wr_low")]
    pub wr_low_watermark: f32,
    #[serde(default = "default_wr_high")]
    pub wr_high_watermark: f32,
}

impl Config for BufferConfig {}

fn default_buffer_size() -> usize {
    32
}

fn default_priority_size() -> usize {
    512 * 3 + 32
}

fn default_wr_low() -> f32 {
    0.2
}

fn default_wr_high() -> f32 {
    0.8
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            read_size: default_buffer_size(),
            write_size: default_buffer_size(),
            aim_size: default_buffer_size(),
            active_size: default_buffer_size(),
            priority_size: default_priority_size(),
            wr_low_watermark: default_wr_low(),
            wr_high_watermark: default_wr_high(),
        }
    }
}

impl BufferConfig {
    pub fn to_ctrl_config(self) -> crate::controller::CtrlConfig {
        crate::controller::CtrlConfig {
            active_size: self.active_size,
            priority_size: self.priority_size,
            read_size: self.read_size,
            write_size: self.write_size,
            aim_size: self.aim_size,
            wr_low_watermark: self.wr_low_watermark,
            wr_high_watermark: self.wr_high_watermark,
        }
    }
}
