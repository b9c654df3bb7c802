use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use threadsheet::cli::Args;
use threadsheet::{
    read_urls, ApiClient, Credentials, Pipeline, RedditSession, RunOptions, SheetWriter, Throttle,
};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // everything fatal happens before the first API call
    let creds = Credentials::from_env(Some(args.env_file.as_path()))?;
    let input = read_urls(&args.input)?;
    let writer = SheetWriter::create(&args.output)?;

    let session = RedditSession::connect(creds).await?;
    let client = ApiClient::new(
        session,
        Throttle::per_minute(args.rpm),
        args.retry_policy(),
        args.caps(),
    );
    let pipeline = Pipeline::new(
        client,
        RunOptions {
            workers: args.workers,
            progress: !args.no_progress,
        },
    );

    let summary = pipeline.run(input, writer).await?;
    for f in &summary.failures {
        tracing::warn!(row = f.row, url = %f.url, kind = %f.kind, "{}", f.message);
    }

    if summary.any_output() {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("no URL produced any output");
        Ok(ExitCode::FAILURE)
    }
}
