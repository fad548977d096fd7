//! Engine configuration from a JSON file, the environment and flags
//!
//! Precedence, lowest first: built-in defaults, `--config` file, environment
//! (`QUADSHEET_*`, `.env` included), command-line flags.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use quadsheet_core::{EngineConfig, RasterizerSetting};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RasterizerMode {
    /// Use pdftoppm when it can be found
    Auto,
    /// Draw labelled boxes instead of page images
    Disabled,
}

#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// JSON file with engine settings
    #[arg(long, global = true, env = "QUADSHEET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Rasterizer selection
    #[arg(long, global = true, value_enum, env = "QUADSHEET_RASTERIZER")]
    pub rasterizer: Option<RasterizerMode>,

    /// Path to the pdftoppm executable (implies rasterization)
    #[arg(long, global = true, env = "QUADSHEET_PDFTOPPM")]
    pub pdftoppm: Option<PathBuf>,

    /// Rasterization resolution
    #[arg(long, global = true, env = "QUADSHEET_DPI")]
    pub dpi: Option<u32>,

    /// Directory for temporary files
    #[arg(long, global = true, env = "QUADSHEET_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,
}

impl EngineArgs {
    pub fn resolve(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => EngineConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut EngineConfig) {
        if let Some(mode) = self.rasterizer {
            config.rasterizer = match mode {
                RasterizerMode::Auto => RasterizerSetting::Auto,
                RasterizerMode::Disabled => RasterizerSetting::Disabled,
            };
        }
        if let Some(program) = &self.pdftoppm {
            config.rasterizer = RasterizerSetting::Command(program.clone());
        }
        if let Some(dpi) = self.dpi {
            config.raster_dpi = dpi;
        }
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir = Some(dir.clone());
        }
    }
}

pub fn load_config_file(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))
}
