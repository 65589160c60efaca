use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ImagegenError;
use crate::model::GenerationParameters;

/// AutismMix SDXL checkpoint.
pub const DEFAULT_MODEL: &str = "urn:air:sdxl:checkpoint:civitai:288584@324619";
pub const DEFAULT_NETWORK: &str = "urn:air:sdxl:lora:civitai:659532@737982";

pub const DEFAULT_PROMPT: &str = "score_9, (Doug Funnie), journal, glowing, \
    mecha_battle, giant_robot, cityscape, high_angle, dynamic, anime90s, action";
pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, line art, deformed, ugly, sad, \
    anxious, depressing,  old, full hair, 3d, sketch, monochrome, ecstacy, suggestive";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub const DEFAULT_BASE_URL: &str = "https://orchestration.civitai.com";

const DEFAULT_CONFIG_FILE: &str = "imagegen.toml";

/// Everything the submitter and poller need that isn't per-call.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub model: String,
    pub network: String,
    pub network_type: String,
    pub network_strength: f64,
    /// Attach `network` to every request.
    pub use_additional_network: bool,
    pub default_prompt: String,
    pub negative_prompt: String,
    pub params: GenerationParameters,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            network_type: "Lora".to_string(),
            network_strength: 0.85,
            use_additional_network: false,
            default_prompt: DEFAULT_PROMPT.to_string(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            // Cheap params: larger sizes are rejected above 1024 by the service.
            params: GenerationParameters {
                scheduler: "EulerA".to_string(),
                steps: 30,
                cfg_scale: 7.0,
                width: 512,
                height: 512,
                clip_skip: 2,
            },
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GeneratorConfig {
    /// A zero interval would never advance the poll deadline.
    pub fn validate(&self) -> Result<(), ImagegenError> {
        if self.poll_interval.is_zero() {
            return Err(ImagegenError::Config("poll interval must be non-zero".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ImagegenError::Config("model must be set".into()));
        }
        Ok(())
    }
}

/// Where the generation service lives and how to authenticate.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub service: ServiceConfig,
}

// ---------------------------------------------------------------------------
// TOML overlay
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    generator: FileGenerator,
    #[serde(default)]
    service: FileService,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileGenerator {
    model: Option<String>,
    network: Option<String>,
    network_type: Option<String>,
    network_strength: Option<f64>,
    use_additional_network: Option<bool>,
    default_prompt: Option<String>,
    negative_prompt: Option<String>,
    scheduler: Option<String>,
    steps: Option<u32>,
    cfg_scale: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
    clip_skip: Option<u32>,
    poll_interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileService {
    base_url: Option<String>,
}

impl Config {
    /// Defaults, then the TOML file (if any), then environment variables.
    pub fn load() -> Result<Self, ImagegenError> {
        let explicit = env::var("IMAGEGEN_CONFIG").ok().map(PathBuf::from);
        let mut config = match config_path(explicit)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ImagegenError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ImagegenError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| ImagegenError::Config(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ImagegenError> {
        let file: FileConfig =
            toml::from_str(text).map_err(|e| ImagegenError::Config(e.to_string()))?;

        let mut config = Self::default();
        let g = &mut config.generator;
        let f = file.generator;
        if let Some(v) = f.model {
            g.model = v;
        }
        if let Some(v) = f.network {
            g.network = v;
        }
        if let Some(v) = f.network_type {
            g.network_type = v;
        }
        if let Some(v) = f.network_strength {
            g.network_strength = v;
        }
        if let Some(v) = f.use_additional_network {
            g.use_additional_network = v;
        }
        if let Some(v) = f.default_prompt {
            g.default_prompt = v;
        }
        if let Some(v) = f.negative_prompt {
            g.negative_prompt = v;
        }
        if let Some(v) = f.scheduler {
            g.params.scheduler = v;
        }
        if let Some(v) = f.steps {
            g.params.steps = v;
        }
        if let Some(v) = f.cfg_scale {
            g.params.cfg_scale = v;
        }
        if let Some(v) = f.width {
            g.params.width = v;
        }
        if let Some(v) = f.height {
            g.params.height = v;
        }
        if let Some(v) = f.clip_skip {
            g.params.clip_skip = v;
        }
        if let Some(v) = f.poll_interval_secs {
            g.poll_interval = Duration::from_secs(v);
        }
        if let Some(v) = f.timeout_secs {
            g.timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.service.base_url {
            config.service.base_url = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables. `lookup` is injectable for tests.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ImagegenError> {
        if let Some(v) = lookup("IMAGEGEN_MODEL") {
            self.generator.model = v;
        }
        if let Some(v) = lookup("IMAGEGEN_POLL_INTERVAL_SECS") {
            let secs = parse_secs("IMAGEGEN_POLL_INTERVAL_SECS", &v)?;
            self.generator.poll_interval = Duration::from_secs(secs);
        }
        if let Some(v) = lookup("IMAGEGEN_TIMEOUT_SECS") {
            let secs = parse_secs("IMAGEGEN_TIMEOUT_SECS", &v)?;
            self.generator.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = lookup("CIVITAI_BASE_URL") {
            self.service.base_url = v;
        }
        match lookup("CIVITAI_API_TOKEN") {
            Some(token) if !token.trim().is_empty() => self.service.api_token = Some(token),
            _ => tracing::warn!("CIVITAI_API_TOKEN not set, requests will be unauthenticated"),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ImagegenError> {
        self.generator.validate()
    }
}

/// Which config file to read. A path named in `IMAGEGEN_CONFIG` must exist;
/// the implicit `./imagegen.toml` is optional.
fn config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>, ImagegenError> {
    match explicit {
        Some(path) if path.exists() => Ok(Some(path)),
        Some(path) => Err(ImagegenError::Config(format!(
            "IMAGEGEN_CONFIG points to missing file {}",
            path.display()
        ))),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            Ok(path.exists().then_some(path))
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ImagegenError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ImagegenError::Config(format!("{key}={value:?}: {e}")))
}
