use crate::core::buffer::ChunkBuffer;
use crate::core::error::{DownloadError, TransferError};
use crate::core::model::ByteRange;
use async_trait::async_trait;
use clap::{ArgMatches, Command};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Settings every range request is built with.
#[derive(Debug, Clone)]
pub struct TransportContext {
    pub user_agent: String,
    pub headers: HashMap<String, String>,
    /// Connect timeout only; a started transfer is never timed out.
    pub connect_timeout: Option<Duration>,
}

impl Default for TransportContext {
    fn default() -> Self {
        Self {
            user_agent: "multiget/0.1".to_string(),
            headers: HashMap::new(),
            connect_timeout: None,
        }
    }
}

/// Fetches one inclusive byte range of a URL, streaming the body into a sink.
#[async_trait]
pub trait RangeTransport: Send + Sync {
    fn name(&self) -> &'static str;
    fn supports(&self, url: &Url) -> bool;

    /// Every received fragment is appended to `sink` in arrival order.
    async fn fetch_range(
        &self,
        url: &Url,
        ctx: &TransportContext,
        range: ByteRange,
        sink: &mut ChunkBuffer,
    ) -> Result<(), TransferError>;
}

pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_download_command(&self, cmd: Command) -> Command;
    fn apply_download_matches(&self, matches: &ArgMatches, ctx: &mut TransportContext) -> anyhow::Result<()>;
}

pub struct PluginRegistry {
    transports: Vec<Arc<dyn RangeTransport>>,
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl PluginRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self { transports: vec![], cli_plugins: vec![] };
        reg.transports.push(Arc::new(crate::plugins::http::driver::HttpDriver::new()));
        reg.cli_plugins.push(Box::new(crate::plugins::http::cli::HttpCliPlugin::new()));
        reg
    }

    pub fn augment_download_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_download_command(c))
    }

    pub fn apply_download_matches(&self, matches: &ArgMatches, ctx: &mut TransportContext) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            p.apply_download_matches(matches, ctx)?;
        }
        Ok(())
    }

    pub fn transport_for(&self, url: &Url) -> Result<Arc<dyn RangeTransport>, DownloadError> {
        self.transports
            .iter()
            .find(|t| t.supports(url))
            .cloned()
            .ok_or_else(|| DownloadError::UnsupportedScheme(url.scheme().to_string()))
    }
}
