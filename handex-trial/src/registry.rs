use handex_core::TrialRecord;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::TrialConfig;
use crate::error::TrialError;
use crate::state::RunningTrial;

pub type CompletionCallback = Box<dyn FnOnce(TrialRecord) + Send>;

/// Descriptor the host framework reads before starting a trial. The
/// parameter schema is empty for every shipped variant.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub parameters: Value,
}

impl PluginInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Value::Object(serde_json::Map::new()),
        }
    }
}

/// One registered trial type: a descriptor plus an entry point producing a
/// running trial the host drives frame by frame.
pub trait TrialPlugin {
    fn info(&self) -> &PluginInfo;
    fn begin(
        &mut self,
        config: TrialConfig,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn RunningTrial>, TrialError>;
}

/// Handle returned by registration; resolves back to the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginHandle(usize);

/// Explicit, host-owned plugin registry. Registration returns a handle
/// instead of writing into a shared global namespace.
#[derive(Default)]
pub struct Registry {
    plugins: Vec<Box<dyn TrialPlugin>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn TrialPlugin>) -> PluginHandle {
        self.plugins.push(plugin);
        PluginHandle(self.plugins.len() - 1)
    }

    pub fn info(&self, handle: PluginHandle) -> Option<&PluginInfo> {
        self.plugins.get(handle.0).map(|p| p.info())
    }

    pub fn find(&self, name: &str) -> Option<PluginHandle> {
        self.plugins
            .iter()
            .position(|p| p.info().name == name)
            .map(PluginHandle)
    }

    pub fn begin(
        &mut self,
        handle: PluginHandle,
        config: TrialConfig,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn RunningTrial>, TrialError> {
        let plugin = self
            .plugins
            .get_mut(handle.0)
            .ok_or_else(|| TrialError::UnknownTrialType(format!("handle #{}", handle.0)))?;
        plugin.begin(config, on_complete)
    }

    /// Host entry point keyed by trial-type name. Unconfigured names hit
    /// the placeholder path: a logged "not implemented" and a typed error.
    pub fn begin_by_name(
        &mut self,
        name: &str,
        config: TrialConfig,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn RunningTrial>, TrialError> {
        match self.find(name) {
            Some(handle) => self.begin(handle, config, on_complete),
            None => {
                warn!(trial_type = name, "trial type not implemented");
                Err(TrialError::UnknownTrialType(name.to_string()))
            }
        }
    }
}
