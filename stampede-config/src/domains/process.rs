//! Local-process scaling configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Local-process scaling configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Worker executable; the running binary when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Extra arguments appended after the worker flags
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Validatable for ProcessConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(ref executable) = self.executable {
            if executable.as_os_str().is_empty() {
                return Err(self.validation_error("executable cannot be empty"));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "process"
    }
}
