pub mod cancel;
pub mod config;
pub mod error;
pub mod registry;
pub mod state;

pub use cancel::CancellationToken;
pub use config::{TrialConfig, TrialVariant};
pub use error::TrialError;
pub use registry::{CompletionCallback, PluginHandle, PluginInfo, Registry, TrialPlugin};
pub use state::{summarize_labels, RunningTrial, TrialController, TrialEvent};
