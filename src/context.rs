//! Per-process command context.
//!
//! Owns everything a command execution reads or writes besides its own
//! flags: settings, the transport, the output format and the wait state.
//! Nested invocations reuse the same context.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::config::Settings;
use crate::waitinfo::WaitInfo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

pub struct Context {
    pub settings: Settings,
    pub output: OutputFormat,
    pub waitinfo: WaitInfo,
    transport: Arc<dyn Transport>,
}

impl Context {
    pub fn new(settings: Settings, transport: Arc<dyn Transport>, output: OutputFormat) -> Self {
        Self {
            settings,
            output,
            waitinfo: WaitInfo::new(),
            transport,
        }
    }

    pub fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!(%request, "dispatching");
        self.transport.send(request)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .field("output", &self.output)
            .field("waitinfo", &self.waitinfo)
            .finish_non_exhaustive()
    }
}
