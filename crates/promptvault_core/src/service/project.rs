//! Project namespace delegate.

use crate::service::prompt::{Prompt, PromptResult};
use crate::storage::StorageBackend;
use log::info;

/// Named group of prompts. Holds no state beyond its name.
pub struct Project<'b, B: StorageBackend + ?Sized> {
    name: String,
    backend: &'b B,
}

impl<B: StorageBackend + ?Sized> std::fmt::Debug for Project<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project").field("name", &self.name).finish()
    }
}

impl<'b, B: StorageBackend + ?Sized> Project<'b, B> {
    pub fn new(backend: &'b B, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Prompt names stored under this project.
    pub fn list_prompts(&self) -> PromptResult<Vec<String>> {
        Ok(self.backend.list_prompts(&self.name)?)
    }

    pub fn exists_prompt(&self, prompt: &str) -> PromptResult<bool> {
        Ok(self.backend.exists_prompt(&self.name, prompt)?)
    }

    /// Returns an unloaded prompt, creating its namespace when missing.
    pub fn get_prompt(&self, prompt: &str) -> PromptResult<Prompt<'b, B>> {
        if !self.backend.exists_prompt(&self.name, prompt)? {
            self.backend.mkdir_prompt(&self.name, prompt)?;
            info!(
                "event=prompt_provision module=service status=ok project={} prompt={}",
                self.name, prompt
            );
        }
        Ok(Prompt::new(self.backend, self.name.clone(), prompt))
    }
}
