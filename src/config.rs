use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StereocamConfig {
    pub relay: RelayConfig,
    pub analysis: AnalysisConfig,
    pub camera: CameraConfig,
    pub view: ViewConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    /// IP address to bind to
    #[serde(default = "default_relay_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_relay_port")]
    pub port: u16,

    /// Chat completions endpoint of the upstream vision model
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Environment variable holding the upstream API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout for a single upstream call
    #[serde(default = "default_upstream_timeout")]
    pub request_timeout_seconds: u64,

    /// Maximum accepted request body in megabytes
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    /// Prompt sent with each captured frame; empty disables analysis
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Seconds between capture-analyze cycles
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,

    /// JPEG quality for captured stills (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Base URL of the relay serving /api/analyze-image
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Timeout for a single analysis request
    #[serde(default = "default_analysis_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Ideal capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Preferred camera facing
    #[serde(default = "default_camera_facing")]
    pub facing: Facing,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ViewConfig {
    /// Mirror the right eye surface horizontally
    #[serde(default = "default_mirror_right_eye")]
    pub mirror_right_eye: bool,

    /// Divisor applied to device tilt before it reaches the eye transform
    #[serde(default = "default_orientation_damping")]
    pub orientation_damping: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera
    Environment,
    /// Front camera
    User,
}

impl StereocamConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("relay.ip", default_relay_ip())?
            .set_default("relay.port", default_relay_port())?
            .set_default("relay.upstream_url", default_upstream_url())?
            .set_default("relay.api_key_env", default_api_key_env())?
            .set_default("relay.request_timeout_seconds", default_upstream_timeout())?
            .set_default("relay.body_limit_mb", default_body_limit_mb() as i64)?
            .set_default("analysis.prompt", default_prompt())?
            .set_default("analysis.interval_seconds", default_interval_seconds())?
            .set_default("analysis.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("analysis.relay_url", default_relay_url())?
            .set_default(
                "analysis.request_timeout_seconds",
                default_analysis_timeout(),
            )?
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.facing", "environment")?
            .set_default("view.mirror_right_eye", default_mirror_right_eye())?
            .set_default("view.orientation_damping", default_orientation_damping())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // STEREOCAM_RELAY__PORT=4000 style overrides
            .add_source(
                Environment::with_prefix("STEREOCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: StereocamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.port == 0 {
            return Err(ConfigError::Message(
                "Relay port must be greater than 0".to_string(),
            ));
        }

        if self.relay.body_limit_mb == 0 {
            return Err(ConfigError::Message(
                "Relay body limit must be greater than 0".to_string(),
            ));
        }

        if self.analysis.interval().is_none() {
            return Err(ConfigError::Message(
                "Analysis interval_seconds must be a positive number of seconds".to_string(),
            ));
        }

        if self.analysis.jpeg_quality == 0 || self.analysis.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Analysis jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if !(self.view.orientation_damping > 0.0) {
            return Err(ConfigError::Message(
                "View orientation_damping must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl AnalysisConfig {
    /// Interval between cycles, or `None` when `interval_seconds` is not a
    /// positive duration that fits in a `Duration`
    pub fn interval(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.interval_seconds)
            .ok()
            .filter(|interval| !interval.is_zero())
    }
}

impl Default for StereocamConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig {
                ip: default_relay_ip(),
                port: default_relay_port(),
                upstream_url: default_upstream_url(),
                api_key_env: default_api_key_env(),
                request_timeout_seconds: default_upstream_timeout(),
                body_limit_mb: default_body_limit_mb(),
            },
            analysis: AnalysisConfig {
                prompt: default_prompt(),
                interval_seconds: default_interval_seconds(),
                jpeg_quality: default_jpeg_quality(),
                relay_url: default_relay_url(),
                request_timeout_seconds: default_analysis_timeout(),
            },
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                facing: default_camera_facing(),
            },
            view: ViewConfig {
                mirror_right_eye: default_mirror_right_eye(),
                orientation_damping: default_orientation_damping(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_relay_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_relay_port() -> u16 {
    3000
}
fn default_upstream_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API".to_string()
}
fn default_upstream_timeout() -> u64 {
    60
}
fn default_body_limit_mb() -> usize {
    50
}

fn default_prompt() -> String {
    String::new()
}
fn default_interval_seconds() -> f64 {
    5.0
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_relay_url() -> String {
    "http://127.0.0.1:3000".to_string()
}
fn default_analysis_timeout() -> u64 {
    30
}

fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_facing() -> Facing {
    Facing::Environment
}

fn default_mirror_right_eye() -> bool {
    false
}
fn default_orientation_damping() -> f64 {
    10.0
}

fn default_event_bus_capacity() -> usize {
    100
}
