//! Snapline Snapshot Client
//!
//! Asks one node for a snapshot and prints every node's balance.
//!
//! # Usage
//!
//! ```bash
//! snapline-snapshot
//! snapline-snapshot --addr 127.0.0.1:55513
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use snapline_messages::{ControlReply, ControlRequest, SnapshotReport};
use std::fmt::Write;
use std::time::Duration;

/// Snapline Snapshot Client
#[derive(Parser, Debug)]
#[command(name = "snapline-snapshot")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Control address of the node that initiates the snapshot
    #[arg(long, default_value = "127.0.0.1:55512")]
    addr: String,

    /// Give up after this many seconds (waits forever when absent)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// One line per node, a rule, then the total, all right-aligned.
fn render(report: &SnapshotReport) -> String {
    let mut out = String::new();
    for (node, balance) in &report.nodes {
        let _ = writeln!(out, "{}: {:>8}", node, balance);
    }
    let _ = writeln!(out, "===========");
    let _ = writeln!(out, "{:>11}", report.total());
    out
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = cli.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder.build().context("Failed to build HTTP client")?;

    let url = format!("http://{}/control", cli.addr);
    let response = client
        .post(&url)
        .json(&ControlRequest::snapshot())
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Snapshot request failed with {}: {}", status, body);
    }

    let reply: ControlReply = response
        .json()
        .await
        .context("Failed to decode snapshot reply")?;
    print!("{}", render(&reply.snapshot));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapline_types::NodeId;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_aligns_balances() {
        let report = SnapshotReport {
            nodes: BTreeMap::from([
                (NodeId(1), 4_970_000),
                (NodeId(2), 5_000_000),
                (NodeId(3), 5_030_000),
            ]),
        };

        assert_eq!(
            render(&report),
            "1:  4970000\n2:  5000000\n3:  5030000\n===========\n   15000000\n"
        );
    }
}
