use crate::error::{ErrataError, Result};
use crate::exception::ExceptionKind;
use dashmap::DashMap;
use std::collections::HashSet;
use std::env;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// Environment key of the debug flag
pub const DEBUG_KEY: &str = "APP_DEBUG";

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Configuration seeded from the process environment
    pub fn new() -> Self {
        let service = Self::empty();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Read a boolean flag; `Ok(None)` when the key is unset
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "(true)" => Ok(Some(true)),
            "false" | "0" | "no" | "off" | "(false)" | "" => Ok(Some(false)),
            _ => Err(ErrataError::invalid_config(
                key,
                format!("expected a boolean, got {raw:?}"),
            )),
        }
    }
}

/// Settings of the error translator
///
/// Built once and handed to the translator at construction; nothing reads the
/// environment after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// Render unexpected errors verbosely instead of the generic envelope
    pub debug: bool,
    /// Kinds that never reach the reporter
    pub dont_report: HashSet<ExceptionKind>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            debug: false,
            dont_report: ExceptionKind::iter()
                .filter(|kind| kind.is_classified())
                .collect(),
        }
    }
}

impl TranslatorConfig {
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let debug = config.get_bool(DEBUG_KEY)?.unwrap_or(false);
        Ok(Self::default().with_debug(debug))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(&ConfigService::new())
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Stop reporting `kind`
    pub fn dont_report(mut self, kind: ExceptionKind) -> Self {
        self.dont_report.insert(kind);
        self
    }

    /// Report `kind` even if it is classified
    pub fn report(mut self, kind: ExceptionKind) -> Self {
        self.dont_report.remove(&kind);
        self
    }

    pub fn should_report(&self, kind: ExceptionKind) -> bool {
        !self.dont_report.contains(&kind)
    }
}
