//! Named string settings.
//!
//! Deployments keep settings like `transcription-language` in a variable
//! service; locally they come from the environment.

use std::collections::HashMap;

/// Source of named, string-valued settings.
pub trait VarSource {
    fn get_var(&self, name: &str) -> Option<String>;
}

impl VarSource for HashMap<String, String> {
    fn get_var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Reads settings from the process environment.
///
/// `transcription-language` is looked up as `TRANSCRIPTION_LANGUAGE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvVars;

impl EnvVars {
    pub fn env_name(name: &str) -> String {
        name.replace('-', "_").to_ascii_uppercase()
    }
}

impl VarSource for EnvVars {
    fn get_var(&self, name: &str) -> Option<String> {
        std::env::var(Self::env_name(name)).ok()
    }
}
