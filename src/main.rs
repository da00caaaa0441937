use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use feedmux::{Aggregator, Post};

#[derive(Parser, Debug)]
#[command(
    name = "feedmux",
    version,
    about = "Fetch and merge RSS, Medium, Twitter, Instagram and Facebook feeds"
)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Number of posts to print (defaults to the config's default_count)
    #[arg(short, long, value_name = "N")]
    count: Option<usize>,

    /// Print posts as a JSON array
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --json output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let aggregator = Aggregator::try_new(args.config.as_path()).with_context(|| {
        format!("Failed to load config from '{}'", args.config.display())
    })?;

    let posts = aggregator
        .get_feed(args.count)
        .await
        .context("Failed to fetch feeds")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &posts).context("Failed to write JSON")?;
        writeln!(out)?;
    } else {
        for post in &posts {
            writeln!(out, "{}", summary_line(post))?;
        }
    }

    Ok(())
}

/// `2024-01-02 10:00  [rss] Title  https://link`
fn summary_line(post: &Post) -> String {
    let date = post
        .date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "----------------".to_string());
    let headline = post
        .title
        .as_deref()
        .or(post.excerpt.as_deref())
        .unwrap_or("(untitled)");
    let headline = feedmux::util::truncate_chars(headline, 100);

    match &post.link {
        Some(link) => format!("{}  [{}] {}  {}", date, post.provider, headline, link),
        None => format!("{}  [{}] {}", date, post.provider, headline),
    }
}
