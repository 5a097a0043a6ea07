use anyhow::Context;
use ppvcore::prelude::ProcessingConfig;
use ppvcore::processing::SessionConfig;
use ppvcore::receivers::DirectoryConfig;
use ppvcore::RionSource;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub processing: ProcessingConfig,
    pub receivers: DirectoryConfig,
    pub require_receivers: bool,
    pub instant_tag: Option<String>,
    pub bind: SocketAddr,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            receivers: DirectoryConfig::default(),
            require_receivers: true,
            instant_tag: Some("Inst".to_string()),
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(window_size: u32, k_factor: f64) -> Self {
        Self {
            processing: ProcessingConfig {
                window_size,
                k_factor,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            processing: self.processing.clone(),
            receivers: self.receivers.clone(),
            require_receivers: self.require_receivers,
        }
    }

    pub fn source(&self) -> RionSource {
        RionSource::new(self.instant_tag.clone())
    }
}
