use crate::plugins::registry::{CliPlugin, TransportContext};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub struct HttpCliPlugin;

impl HttpCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpCliPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl CliPlugin for HttpCliPlugin {
    fn name(&self) -> &'static str {
        "http"
    }

    fn augment_download_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("http_header")
                .long("header")
                .help_heading("HTTP")
                .help("Extra HTTP header (repeatable), e.g. --header 'Authorization: Bearer xxx'")
                .action(ArgAction::Append)
                .num_args(1),
        )
        .arg(
            Arg::new("http_user_agent")
                .long("user-agent")
                .help_heading("HTTP")
                .help("HTTP User-Agent")
                .default_value("multiget/0.1")
                .num_args(1),
        )
        .arg(
            Arg::new("http_connect_timeout_secs")
                .long("connect-timeout-secs")
                .help_heading("HTTP")
                .help("Give up connecting after this many seconds (transfers themselves never time out)")
                .value_parser(value_parser!(u64).range(1..))
                .num_args(1),
        )
    }

    fn apply_download_matches(&self, matches: &ArgMatches, ctx: &mut TransportContext) -> anyhow::Result<()> {
        if let Some(ua) = matches.get_one::<String>("http_user_agent") {
            ctx.user_agent = ua.clone();
        }
        if let Some(secs) = matches.get_one::<u64>("http_connect_timeout_secs") {
            ctx.connect_timeout = Some(Duration::from_secs(*secs));
        }

        if let Some(values) = matches.get_many::<String>("http_header") {
            for h in values {
                let (k, v) = h
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("invalid header format: {}", h))?;
                ctx.headers.insert(k.trim().to_string(), v.trim().to_string());
            }
        }

        Ok(())
    }
}
