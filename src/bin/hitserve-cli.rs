use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

#[derive(Parser)]
#[command(name = "hitserve-cli")]
#[command(about = "Download files from and stress a hitserve instance", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a path; print HTML, save PNG and PDF files
    Get {
        path: String,
        /// Directory for downloaded files
        #[arg(short, long, default_value = "downloads")]
        out: PathBuf,
    },
    /// Fire concurrent requests at one file and compare its hit count
    Race {
        path: String,
        #[arg(short = 'n', long, default_value_t = 100)]
        requests: usize,
    },
    /// Fire a burst of concurrent requests and tally 200 vs 429
    Burst {
        path: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        requests: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().pool_max_idle_per_host(0).build()?;
    let base = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Get { path, out } => get(&client, &base, &normalize(&path), &out).await,
        Commands::Race { path, requests } => race(&client, &base, &normalize(&path), requests).await,
        Commands::Burst { path, requests } => burst(&client, &base, &normalize(&path), requests).await,
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

async fn get(
    client: &reqwest::Client,
    base: &str,
    path: &str,
    out: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let res = client.get(format!("{base}{path}")).send().await?;
    let status = res.status();
    println!("Status Code: {}", status.as_u16());

    let content_type = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_default();
    let body = res.bytes().await?;

    if status != StatusCode::OK {
        eprintln!("Error: server returned status {}", status);
        eprintln!("{}", String::from_utf8_lossy(&body));
        std::process::exit(1);
    }

    println!("Content-Type: {}", content_type);
    match content_type.as_str() {
        "text/html" => println!("{}", String::from_utf8_lossy(&body)),
        "image/png" | "application/pdf" => {
            std::fs::create_dir_all(out)?;
            let name = path.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or("download");
            let target = out.join(name);
            std::fs::write(&target, &body)?;
            println!("Saved {} bytes to {}", body.len(), target.display());
        }
        other => {
            println!("Unknown content type: {}", other);
            let preview = &body[..body.len().min(500)];
            println!("{}", String::from_utf8_lossy(preview));
        }
    }
    Ok(())
}

async fn fire(client: &reqwest::Client, url: &str, n: usize) -> Vec<Option<StatusCode>> {
    let requests = (0..n).map(|_| async move {
        match client.get(url).send().await {
            Ok(res) => {
                let status = res.status();
                // Drain so the server sees a completed exchange.
                let _ = res.bytes().await;
                Some(status)
            }
            Err(_) => None,
        }
    });
    join_all(requests).await
}

async fn race(
    client: &reqwest::Client,
    base: &str,
    path: &str,
    n: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{base}{path}");
    println!("Sending {} concurrent requests to {}", n, url);

    let start = Instant::now();
    let results = fire(client, &url, n).await;
    let ok = results.iter().filter(|s| **s == Some(StatusCode::OK)).count();
    println!("Done in {:.2?}: {}/{} succeeded", start.elapsed(), ok, n);

    let (dir, name) = match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("/", path),
    };
    let listing = client.get(format!("{base}{dir}")).send().await?.text().await?;

    match hit_count(&listing, name) {
        Some(observed) => {
            println!("Expected count: {}", ok);
            println!("Observed count: {}", observed);
            println!("Lost updates:   {}", (ok as u64).saturating_sub(observed));
        }
        None => println!("No hit count for {} in the listing of {}", name, dir),
    }
    Ok(())
}

async fn burst(
    client: &reqwest::Client,
    base: &str,
    path: &str,
    n: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{base}{path}");
    let start = Instant::now();
    let results = fire(client, &url, n).await;
    let elapsed = start.elapsed();

    let ok = results.iter().filter(|s| **s == Some(StatusCode::OK)).count();
    let limited = results
        .iter()
        .filter(|s| **s == Some(StatusCode::TOO_MANY_REQUESTS))
        .count();
    let failed = results.iter().filter(|s| s.is_none()).count();

    println!("Completed {} requests in {:.2?}", n, elapsed);
    println!("  200 OK:                {}", ok);
    println!("  429 Too Many Requests: {}", limited);
    println!("  Other:                 {}", n - ok - limited - failed);
    println!("  Failed:                {}", failed);
    Ok(())
}

/// Pull `name`'s count out of a listing row `...>name</a></td><td>N</td>`.
fn hit_count(listing: &str, name: &str) -> Option<u64> {
    let marker = format!(">{name}</a></td><td>");
    let start = listing.find(&marker)? + marker.len();
    let digits: String = listing[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
