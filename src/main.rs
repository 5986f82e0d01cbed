use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use multiget::core::events::EngineEvent;
use multiget::plugins::http::driver::HTTP_SUBSYSTEM;
use multiget::plugins::registry::{PluginRegistry, TransportContext};
use multiget::{DownloadRequest, Engine, TransferMode};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;
use url::Url;

fn build_cli(registry: &PluginRegistry) -> Command {
    let cmd = Command::new("multiget")
        .about("Fetch one resource as byte-range chunks and reassemble it in order")
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Write output to <FILE>")
                .default_value("384MB.jar")
                .num_args(1),
        )
        .arg(
            Arg::new("parallel")
                .short('p')
                .long("parallel")
                .help("Download chunks in parallel instead of sequentially")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("chunks")
                .short('n')
                .long("chunks")
                .help("Number of chunks")
                .default_value("4")
                .value_parser(value_parser!(u64).range(1..))
                .num_args(1),
        )
        .arg(
            Arg::new("chunk_size")
                .short('s')
                .long("chunk-size")
                .help("Size of a chunk in bytes")
                .default_value("1000000")
                .value_parser(value_parser!(u64).range(1..))
                .num_args(1),
        )
        .arg(Arg::new("url").help("URL to download").required(true).num_args(1));

    registry.augment_download_command(cmd)
}

fn build_request(m: &ArgMatches) -> anyhow::Result<DownloadRequest> {
    let raw = m.get_one::<String>("url").context("missing url")?;
    let url = Url::parse(raw).with_context(|| format!("invalid url: {}", raw))?;
    let num_chunks = *m.get_one::<u64>("chunks").context("missing chunk count")?;

    Ok(DownloadRequest {
        url,
        dest: m.get_one::<String>("output").context("missing output")?.into(),
        mode: if m.get_flag("parallel") { TransferMode::Parallel } else { TransferMode::Serial },
        num_chunks: usize::try_from(num_chunks).context("chunk count too large")?,
        chunk_size: *m.get_one::<u64>("chunk_size").context("missing chunk size")?,
    })
}

/// Next progress event; a lagging receiver skips what it missed. `None` once the engine is gone.
async fn next_event(rx: &mut broadcast::Receiver<EngineEvent>) -> Option<EngineEvent> {
    loop {
        match rx.recv().await {
            Ok(evt) => return Some(evt),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress display fell behind");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let teardown = HTTP_SUBSYSTEM.shutdown_guard();

    let registry = PluginRegistry::with_defaults();
    let matches = match build_cli(&registry).try_get_matches() {
        Ok(m) => m,
        Err(e) => {
            drop(teardown);
            e.exit();
        }
    };

    let req = build_request(&matches)?;
    let mut ctx = TransportContext::default();
    registry.apply_download_matches(&matches, &mut ctx)?;

    let transport = registry.transport_for(&req.url)?;
    let engine = Engine::new(transport, ctx);

    let mut rx = engine.subscribe();
    let ui_task = tokio::spawn(async move {
        let sty = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks {wide_msg}")
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let pb = ProgressBar::new(0);
        pb.set_style(sty);

        let mut received = 0u64;
        while let Some(evt) = next_event(&mut rx).await {
            match evt {
                EngineEvent::PlanReady { chunks, planned_bytes } => {
                    pb.set_length(chunks as u64);
                    pb.set_message(format!("up to {}", fmt_bytes(planned_bytes)));
                    pb.enable_steady_tick(std::time::Duration::from_millis(120));
                }
                EngineEvent::ChunkStarted { index, range } => {
                    pb.set_message(format!("chunk {} requested ({})", index, range));
                }
                EngineEvent::ChunkFinished { index, bytes } => {
                    received += bytes;
                    pb.inc(1);
                    pb.set_message(format!("chunk {} done, {} received", index, fmt_bytes(received)));
                }
                EngineEvent::ChunkFailed { index, message } => {
                    pb.println(format!("[ERR] chunk {}: {}", index, message));
                }
                EngineEvent::Assembling => pb.set_message("writing output"),
                EngineEvent::Finished { success } => {
                    if success {
                        pb.finish_with_message(format!("{} received", fmt_bytes(received)));
                    } else {
                        pb.abandon_with_message("failed");
                    }
                    break;
                }
            }
        }
    });

    let result = engine.download(&req).await;
    drop(engine);
    let _ = ui_task.await;

    let summary = result.with_context(|| format!("download of {} failed", req.url))?;
    println!(
        "\nCompleted transmission: {} ({} in {} chunks)",
        summary.dest.display(),
        fmt_bytes(summary.bytes_written),
        summary.chunks
    );

    drop(teardown);
    Ok(())
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Result<ArgMatches, clap::Error> {
        build_cli(&PluginRegistry::with_defaults()).try_get_matches_from(args)
    }

    #[test]
    fn test_defaults() {
        let req = build_request(&parse(&["multiget", "http://host/file.jar"]).unwrap()).unwrap();
        assert_eq!(req.dest, PathBuf::from("384MB.jar"));
        assert_eq!(req.mode, TransferMode::Serial);
        assert_eq!(req.num_chunks, 4);
        assert_eq!(req.chunk_size, 1_000_000);
        assert_eq!(req.url.as_str(), "http://host/file.jar");
    }

    #[test]
    fn test_all_flags() {
        let m = parse(&["multiget", "-o", "out.bin", "--parallel", "-n", "6", "-s", "10000", "https://host/x"]).unwrap();
        let req = build_request(&m).unwrap();
        assert_eq!(req.dest, PathBuf::from("out.bin"));
        assert_eq!(req.mode, TransferMode::Parallel);
        assert_eq!(req.num_chunks, 6);
        assert_eq!(req.chunk_size, 10_000);
    }

    #[test]
    fn test_rejects_zero_and_missing_url() {
        assert!(parse(&["multiget", "-n", "0", "http://host/x"]).is_err());
        assert!(parse(&["multiget", "-s", "0", "http://host/x"]).is_err());
        assert!(parse(&["multiget", "-p"]).is_err());
    }

    #[test]
    fn test_rejects_malformed_url() {
        let m = parse(&["multiget", "not a url"]).unwrap();
        assert!(build_request(&m).is_err());
    }

    #[tokio::test]
    async fn test_progress_survives_lag() {
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(EngineEvent::Assembling).unwrap();
        tx.send(EngineEvent::Finished { success: true }).unwrap();

        assert_eq!(next_event(&mut rx).await, Some(EngineEvent::Finished { success: true }));
        drop(tx);
        assert_eq!(next_event(&mut rx).await, None);
    }

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(512), "512B");
        assert_eq!(fmt_bytes(2048), "2.00KiB");
        assert_eq!(fmt_bytes(1_000_000), "976.56KiB");
    }
}
