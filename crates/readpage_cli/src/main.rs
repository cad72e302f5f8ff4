use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, engine_warn, LogDestination};
use log::LevelFilter;
use readpage_engine::{read_page, ExtractSettings, FetchSettings, ReqwestFetcher};
use url::Url;

/// Read a remote page and print its social-web metadata as JSON.
#[derive(Debug, Parser)]
#[command(name = "readpage", version)]
struct Args {
    /// Page to read.
    url: Url,

    /// Overall extraction deadline, secondary fetches included.
    #[arg(long, default_value_t = 30)]
    deadline_secs: u64,

    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Exit with status 2 unless the page is a bookmark of this URL.
    #[arg(long, value_name = "URL")]
    expect_bookmark_of: Option<Url>,

    /// Also write logs to ./readpage.log.
    #[arg(long)]
    log_file: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = if args.log_file {
        LogDestination::TerminalAndFile(PathBuf::from("./readpage.log"))
    } else {
        LogDestination::Terminal
    };
    engine_logging::initialize(destination, level);

    let deadline = Duration::from_secs(args.deadline_secs);
    let fetch_settings = FetchSettings {
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        // Leave the listeners time to use what a slow secondary fetch did not block.
        request_timeout: deadline / 2,
        ..FetchSettings::default()
    };
    let fetcher = Arc::new(ReqwestFetcher::new(fetch_settings).context("building HTTP client")?);
    let settings = ExtractSettings {
        deadline,
        ..ExtractSettings::default()
    };

    let result = read_page(fetcher, &args.url, settings)
        .await
        .with_context(|| format!("reading {}", args.url))?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(expected) = args.expect_bookmark_of {
        if !result.is_bookmark_of(&expected) {
            engine_warn!("{} is not a bookmark of {}", args.url, expected);
            return Ok(ExitCode::from(2));
        }
        engine_info!("{} is a bookmark of {}", args.url, expected);
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_apply() {
        let args = Args::try_parse_from(["readpage", "https://ex.com/1"]).unwrap();
        assert_eq!(args.deadline_secs, 30);
        assert_eq!(args.connect_timeout_secs, 10);
        assert_eq!(args.expect_bookmark_of, None);
        assert!(!args.log_file);
    }

    #[test]
    fn rejects_relative_url() {
        assert!(Args::try_parse_from(["readpage", "/relative"]).is_err());
    }
}
