//! Engine configuration loaded from TOML
//!
//! Every section is optional and falls back to its defaults:
//!
//! ```toml
//! visualize = false
//! display_pause_ms = 10
//! echo_selection = "first"
//!
//! [registration]
//! max_iterations = 50
//! cauchy_scale = 0.5
//!
//! [grid]
//! width = 2000
//! height = 2000
//! resolution = 0.1
//!
//! [refiner]
//! jacobian_step = 0.01
//! jacobian = "central_difference"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::SlamResult;
use crate::mapping::GridConfig;
use crate::sensor::EchoSelection;
use crate::slam::{RefinerConfig, RegistrationConfig};

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Slam2DConfig {
    /// Range picked from multi-echo bearings
    pub echo_selection: EchoSelection,
    /// Render the map after every registered scan
    pub visualize: bool,
    /// Pause after each render [ms]
    pub display_pause_ms: u64,
    pub registration: RegistrationConfig,
    pub grid: GridConfig,
    pub refiner: RefinerConfig,
}

impl Default for Slam2DConfig {
    fn default() -> Self {
        Self {
            echo_selection: EchoSelection::First,
            visualize: false,
            display_pause_ms: 10,
            registration: RegistrationConfig::default(),
            grid: GridConfig::default(),
            refiner: RefinerConfig::default(),
        }
    }
}

impl Slam2DConfig {
    /// Load and validate a TOML file
    pub fn load(path: &Path) -> SlamResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML string
    pub fn from_toml(contents: &str) -> SlamResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SlamResult<()> {
        self.registration.validate()?;
        self.grid.validate()?;
        self.refiner.validate()
    }
}
