//! strata-node: operate a chain's vertex state from the command line.
//!
//! Each invocation:
//!   1. Opens (or creates) the sled vertex database
//!   2. Initializes the Serializer for the given chain, reloading the frontier
//!   3. Runs one engine operation (edge, get, parse, build, accept, reject, verify)
//!   4. Prints the result as JSON on stdout; logs go to stderr
//!
//! Fatal vertex-state errors (store failures, invariant violations) halt the
//! process with exit code 1 after logging the offending vertex.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use strata_core::constants::{DB_CACHE_SIZE, REGISTRY_PRUNE_THRESHOLD};
use strata_core::error::StrataError;
use strata_core::types::{ChainId, TxId, VertexId};
use strata_state::{Context, RawVm, Serializer, SledDb, StateConfig, VertexHandle};

#[derive(Parser, Debug)]
#[command(
    name = "strata-node",
    version,
    about = "Strata vertex state: build, parse and decide DAG vertices"
)]
struct Args {
    /// Directory for the persistent vertex database.
    #[arg(long, default_value = "~/.strata/data")]
    data_dir: PathBuf,

    /// Chain this node serves (64 hex characters).
    #[arg(long, value_parser = parse_chain_id)]
    chain_id: ChainId,

    /// Capacity of the LRU cache over raw store lookups.
    #[arg(long, default_value_t = DB_CACHE_SIZE)]
    db_cache_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current frontier.
    Edge,
    /// Print a stored vertex.
    Get {
        #[arg(value_parser = parse_vertex_id)]
        id: VertexId,
    },
    /// Register hex-encoded vertex bytes read from a file.
    Parse { file: PathBuf },
    /// Build a vertex on top of the given parents.
    Build {
        #[arg(long, default_value_t = 0)]
        epoch: u32,
        /// Parent vertex id; repeat for several.
        #[arg(long = "parent", value_parser = parse_vertex_id)]
        parents: Vec<VertexId>,
        /// Hex-encoded transaction payload; repeat for several.
        #[arg(long = "tx")]
        txs: Vec<String>,
        /// Restriction id; repeat for several.
        #[arg(long = "restriction", value_parser = parse_tx_id)]
        restrictions: Vec<TxId>,
    },
    /// Mark a processing vertex accepted and advance the frontier.
    Accept {
        #[arg(value_parser = parse_vertex_id)]
        id: VertexId,
    },
    /// Mark a processing vertex rejected.
    Reject {
        #[arg(value_parser = parse_vertex_id)]
        id: VertexId,
    },
    /// Check a vertex against its parents and the VM.
    Verify {
        #[arg(value_parser = parse_vertex_id)]
        id: VertexId,
    },
}

/// JSON view of a vertex handle.
#[derive(Serialize)]
struct VertexSummary {
    id: String,
    status: String,
    height: u64,
    epoch: u32,
    parents: Vec<String>,
    txs: Vec<String>,
    restrictions: Vec<String>,
    bytes: String,
}

impl VertexSummary {
    fn of(handle: &VertexHandle) -> Result<Self, StrataError> {
        let vtx = handle.vertex()?;
        Ok(Self {
            id: handle.id().to_hex(),
            status: handle.status()?.to_string(),
            height: vtx.height(),
            epoch: vtx.epoch(),
            parents: vtx.parent_ids().iter().map(VertexId::to_hex).collect(),
            txs: vtx.txs().iter().map(hex::encode).collect(),
            restrictions: vtx.restrictions().iter().map(TxId::to_hex).collect(),
            bytes: hex::encode(vtx.bytes()),
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,strata=debug")),
        )
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            if let Some(fatal) = e.downcast_ref::<StrataError>().filter(|se| se.is_fatal()) {
                error!(error = %fatal, "fatal vertex state error, halting");
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

fn run(args: Args) -> anyhow::Result<serde_json::Value> {
    // ── Vertex database ──────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db = Arc::new(SledDb::open(&data_dir).context("opening vertex database")?);

    // ── Serializer ───────────────────────────────────────────────────────────
    let config = StateConfig {
        db_cache_size: args.db_cache_size,
        registry_prune_threshold: REGISTRY_PRUNE_THRESHOLD,
    };
    let vm = Arc::new(RawVm::new());
    let serializer = Serializer::initialize(
        Context {
            chain_id: args.chain_id,
        },
        vm.clone(),
        db,
        &config,
    )?;

    // ── Command ──────────────────────────────────────────────────────────────
    let output = match args.command {
        Command::Edge => {
            let edge: Vec<String> = serializer.edge().iter().map(VertexId::to_hex).collect();
            serde_json::to_value(edge)?
        }
        Command::Get { id } => {
            let handle = serializer.get(&id)?;
            summary(&handle)?
        }
        Command::Parse { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading vertex bytes from {}", file.display()))?;
            let bytes = hex::decode(text.trim()).context("decoding vertex hex")?;
            let handle = serializer.parse(&bytes)?;
            summary(&handle)?
        }
        Command::Build {
            epoch,
            parents,
            txs,
            restrictions,
        } => {
            for tx in &txs {
                let payload = hex::decode(tx).with_context(|| format!("decoding tx hex {tx}"))?;
                vm.submit(payload);
            }
            let handle = serializer.build_pending(epoch, &parents, &restrictions)?;
            info!(vtx_id = %handle.id(), "built vertex");
            summary(&handle)?
        }
        Command::Accept { id } => {
            let handle = serializer.get(&id)?;
            handle.accept()?;
            summary(&handle)?
        }
        Command::Reject { id } => {
            let handle = serializer.get(&id)?;
            handle.reject()?;
            summary(&handle)?
        }
        Command::Verify { id } => {
            let handle = serializer.get(&id)?;
            handle.verify()?;
            summary(&handle)?
        }
    };
    Ok(output)
}

fn summary(handle: &VertexHandle) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::to_value(VertexSummary::of(handle)?)?)
}

fn parse_chain_id(s: &str) -> Result<ChainId, String> {
    ChainId::from_hex(s).map_err(|e| format!("invalid chain id: {e}"))
}

fn parse_vertex_id(s: &str) -> Result<VertexId, String> {
    VertexId::from_hex(s).map_err(|e| format!("invalid vertex id: {e}"))
}

fn parse_tx_id(s: &str) -> Result<TxId, String> {
    TxId::from_hex(s).map_err(|e| format!("invalid restriction id: {e}"))
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
