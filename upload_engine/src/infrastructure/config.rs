// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Settings
//!
//! Host-process configuration for running the engine outside a browser or
//! mini-program (`spec.md` §9 "Environment-dependent capabilities"): where
//! chunks and merges are sent, how big the resume ledger's TTL is, and the
//! process-level network-sampling cadence. Layered through the `config`
//! crate: a base file, an optional environment-specific override, then
//! `UPLOAD_ENGINE_*` environment variables.

use serde::Deserialize;
use upload_engine_domain::UploadError;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    pub upload_url: String,
    pub merge_url: Option<String>,
    #[serde(default = "default_resume_ttl_days")]
    pub resume_ttl_days: i64,
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
    #[serde(default)]
    pub durable_kv: bool,
}

fn default_resume_ttl_days() -> i64 {
    7
}

fn default_sample_interval_secs() -> u64 {
    30
}

impl EngineSettings {
    /// Loads settings from `config/default.{toml,yaml,json}`, an optional
    /// `config/{run_mode}` override, and `UPLOAD_ENGINE_*` environment
    /// variables, in that order of precedence (later sources win) — the
    /// same layering shape the teacher's configuration service uses.
    pub fn load(run_mode: &str) -> Result<Self, UploadError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("upload_engine").separator("__"))
            .build()
            .map_err(|e| UploadError::InvalidConfiguration(format!("failed to load engine settings: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| UploadError::InvalidConfiguration(format!("failed to parse engine settings: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_still_resolve_defaults_when_upload_url_is_set_via_env() {
        std::env::set_var("UPLOAD_ENGINE_UPLOAD_URL", "https://example.test/upload");
        let settings = EngineSettings::load("test").unwrap();
        assert_eq!(settings.upload_url, "https://example.test/upload");
        assert_eq!(settings.resume_ttl_days, 7);
        assert_eq!(settings.sample_interval_secs, 30);
        std::env::remove_var("UPLOAD_ENGINE_UPLOAD_URL");
    }
}
