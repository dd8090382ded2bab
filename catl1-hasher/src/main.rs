// Copyright (c) catalogue-tools contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use catl_core::catl1::{CatlReader, ReaderOptions};
use catl_core::CollapseMode;
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[clap(name = "catl1-hasher", author = "catalogue-tools contributors")]
struct Opts {
    /// Path to the CATL v1 file to stream and verify.
    file: PathBuf,

    /// Path collapse behavior to apply while rebuilding each ledger's maps.
    #[clap(long, value_enum, default_value = "leaves-only")]
    collapse_mode: CollapseModeArg,

    /// Reject any node record whose value exceeds this many bytes.
    #[clap(long, default_value_t = 5 * 1024 * 1024)]
    max_value_size: u32,

    /// Stop after processing the ledger with this sequence number.
    #[clap(long)]
    stop_at: Option<u32>,

    /// Log verbosity, passed through to `tracing_subscriber`'s env filter.
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CollapseModeArg {
    LeavesOnly,
    LeavesAndInners,
}

impl From<CollapseModeArg> for CollapseMode {
    fn from(arg: CollapseModeArg) -> Self {
        match arg {
            CollapseModeArg::LeavesOnly => CollapseMode::LeavesOnly,
            CollapseModeArg::LeavesAndInners => CollapseMode::LeavesAndInners,
        }
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    let filter = tracing_subscriber::EnvFilter::try_new(&opts.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let file = File::open(&opts.file)
        .with_context(|| format!("opening {}", opts.file.display()))?;
    // Safety: the file is not expected to be concurrently truncated while
    // mapped; a truncation underneath us would surface as an I/O error on
    // the next page fault, not memory unsafety.
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .with_context(|| format!("mapping {}", opts.file.display()))?;

    let body = catl_core::catl1::compress::load(&mmap[..])
        .with_context(|| format!("reading header of {}", opts.file.display()))?;

    let options = ReaderOptions {
        max_value_size: opts.max_value_size,
        collapse_mode: opts.collapse_mode.into(),
    };
    let mut reader = CatlReader::new(body.as_slice(), options)
        .with_context(|| format!("reading header of {}", opts.file.display()))?;

    info!(
        min_ledger = reader.header().min_ledger,
        max_ledger = reader.header().max_ledger,
        network_id = reader.header().network_id,
        "opened CATL file"
    );

    let mut any_mismatch = false;
    while let Some(outcome) = reader.next_ledger()? {
        if outcome.state_hash_matches && outcome.tx_hash_matches {
            info!(
                sequence = outcome.info.sequence,
                state_nodes = outcome.state_nodes,
                tx_nodes = outcome.tx_nodes,
                "ledger verified"
            );
        } else {
            any_mismatch = true;
            warn!(
                sequence = outcome.info.sequence,
                state_hash_matches = outcome.state_hash_matches,
                tx_hash_matches = outcome.tx_hash_matches,
                "ledger hash mismatch"
            );
        }
        if opts.stop_at == Some(outcome.info.sequence) {
            info!(sequence = outcome.info.sequence, "stopping at requested ledger");
            break;
        }
    }

    let stats = reader.stats();
    info!(
        ledgers_processed = stats.ledgers_processed,
        state_nodes_added = stats.state_nodes_added,
        state_removals_succeeded = stats.state_removals_succeeded,
        tx_nodes_added = stats.tx_nodes_added,
        successful_hash_verifications = stats.successful_hash_verifications,
        failed_hash_verifications = stats.failed_hash_verifications,
        "done"
    );

    if any_mismatch || stats.failed_hash_verifications > 0 {
        anyhow::bail!("one or more ledgers failed hash verification");
    }
    Ok(())
}
