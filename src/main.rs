//! kemtree CLI - Command line interface for a kemtree directory
//!
//! Each invocation opens the tree from disk, runs one command, and prints
//! the result as JSON on stdout. Logs go to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use kemtree::{Node, StoreConfig, Timestamp, TreeStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kemtree")]
#[command(about = "A persisted, level-order indexed, change-tracked member tree")]
#[command(version)]
struct Cli {
    /// Directory holding the node records (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.config/kemtree/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Treat payload arguments as hex instead of UTF-8 text
    #[arg(long)]
    hex: bool,

    #[arg(short, long, default_value = "warn", value_enum)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Silent => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory
    Init,

    // === Structure Commands ===
    /// Add a member
    Insert {
        /// Member name
        name: String,
        /// Member payload (public key)
        payload: String,
    },

    /// Remove a node
    Delete {
        /// Node name
        name: String,
    },

    /// Look up a node by name
    Find {
        /// Node name
        name: String,
    },

    /// Show the root-to-node path
    Path {
        /// Node name
        name: String,
    },

    /// Look up a node by level-order index
    Node {
        /// Level-order index
        index: usize,
    },

    /// Dump the whole tree structure
    Structure,

    /// List members left to right
    Leaves,

    // === Key Commands ===
    /// Set an intermediate node's key
    SetKey {
        /// Intermediate node name
        name: String,
        /// New payload
        payload: String,
    },

    /// Replace a member's key
    UpdateKey {
        /// Member name
        name: String,
        /// New payload
        payload: String,
    },

    // === Change Tracking Commands ===
    /// Nodes modified after a timestamp
    Changes {
        /// Nanoseconds since the Unix epoch
        #[arg(short, long, default_value = "0")]
        since: u64,
    },

    /// Nodes modified since they were last checked
    Dirty,

    /// Mark one node, or every node, as checked
    MarkChecked {
        /// Node name (all nodes if omitted)
        name: Option<String>,
    },

    /// Show tree status
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.log_level);

    let mut config = StoreConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }

    match cli.command {
        Commands::Init => {
            let tree = TreeStore::open(config)?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "message": format!("Initialized tree at {}", tree.config().data_dir.display()),
                    "nodes": tree.len()
                }),
            );
        }

        Commands::Insert { name, payload } => {
            let mut tree = TreeStore::open(config)?;
            tree.insert(&name, parse_payload(&payload, cli.hex)?)?;
            let node = tree
                .find(&name)
                .ok_or_else(|| anyhow::anyhow!("Inserted node missing: {}", name))?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "name": name,
                    "index": node.index(),
                    "size": tree.len()
                }),
            );
        }

        Commands::Delete { name } => {
            let mut tree = TreeStore::open(config)?;
            tree.delete(&name)?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "name": name,
                    "size": tree.len()
                }),
            );
        }

        Commands::Find { name } => {
            let tree = TreeStore::open(config)?;
            match tree.find(&name) {
                Some(node) => output(cli.format, &node_json(node)),
                None => not_found(cli.format, &name),
            }
        }

        Commands::Path { name } => {
            let tree = TreeStore::open(config)?;
            match tree.path(&name) {
                Ok(path) => {
                    let items: Vec<_> = path.iter().map(|n| node_json(n)).collect();
                    output(
                        cli.format,
                        &serde_json::json!({
                            "name": name,
                            "length": items.len(),
                            "path": items
                        }),
                    );
                }
                Err(kemtree::Error::NotFound(_)) => not_found(cli.format, &name),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Node { index } => {
            let tree = TreeStore::open(config)?;
            match tree.node_by_index(index) {
                Some(node) => output(cli.format, &node_json(node)),
                None => not_found(cli.format, &format!("index {}", index)),
            }
        }

        Commands::Structure => {
            let tree = TreeStore::open(config)?;
            let mut nodes: Vec<_> = tree.tree_structure().into_values().collect();
            nodes.sort_by_key(|info| info.node_index);
            output(
                cli.format,
                &serde_json::json!({
                    "count": nodes.len(),
                    "nodes": nodes
                }),
            );
        }

        Commands::Leaves => {
            let tree = TreeStore::open(config)?;
            let items: Vec<_> = tree.leaves().iter().map(|n| node_json(n)).collect();
            output(
                cli.format,
                &serde_json::json!({
                    "count": items.len(),
                    "leaves": items
                }),
            );
        }

        Commands::SetKey { name, payload } => {
            let mut tree = TreeStore::open(config)?;
            tree.set_intermediate_key(&name, parse_payload(&payload, cli.hex)?)?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "name": name
                }),
            );
        }

        Commands::UpdateKey { name, payload } => {
            let mut tree = TreeStore::open(config)?;
            tree.update_leaf_key(&name, parse_payload(&payload, cli.hex)?)?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "name": name
                }),
            );
        }

        Commands::Changes { since } => {
            let tree = TreeStore::open(config)?;
            let mut changes: Vec<_> = tree
                .changes_since(Timestamp::from_nanos(since))
                .into_iter()
                .collect();
            changes.sort_by_key(|(_, modified)| *modified);
            let items: Vec<_> = changes
                .iter()
                .map(|(name, modified)| {
                    serde_json::json!({
                        "name": name,
                        "last_modified": modified.as_nanos()
                    })
                })
                .collect();
            output(
                cli.format,
                &serde_json::json!({
                    "since": since,
                    "count": items.len(),
                    "changes": items
                }),
            );
        }

        Commands::Dirty => {
            let tree = TreeStore::open(config)?;
            let items: Vec<_> = tree.needing_update().iter().map(|n| node_json(n)).collect();
            output(
                cli.format,
                &serde_json::json!({
                    "count": items.len(),
                    "nodes": items
                }),
            );
        }

        Commands::MarkChecked { name } => {
            let mut tree = TreeStore::open(config)?;
            match &name {
                Some(name) => tree.mark_checked(name)?,
                None => tree.mark_all_checked()?,
            }
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "name": name
                }),
            );
        }

        Commands::Status => {
            let tree = TreeStore::open(config)?;
            output(
                cli.format,
                &serde_json::json!({
                    "data_dir": tree.config().data_dir.display().to_string(),
                    "nodes": tree.len(),
                    "leaves": tree.leaf_count(),
                    "records": tree.store().record_count()?,
                    "root": tree.head().map(|n| n.name().to_string()),
                    "last_modified": tree.latest_modification().ok().map(|t| t.as_nanos()),
                    "dirty": tree.needing_update().len()
                }),
            );
        }
    }

    Ok(())
}

fn setup_tracing(level: LogLevel) {
    if let Some(level) = level.to_tracing_level() {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

fn parse_payload(payload: &str, hex: bool) -> anyhow::Result<Vec<u8>> {
    if hex {
        hex::decode(payload).map_err(|e| anyhow::anyhow!("Invalid hex payload: {}", e))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

fn node_json(node: &Node) -> serde_json::Value {
    serde_json::json!({
        "name": node.name(),
        "kind": node.kind(),
        "payload": hex::encode(node.payload()),
        "index": node.index(),
        "leaf_index": node.leaf_index(),
        "left_count": node.left_count(),
        "right_count": node.right_count(),
        "last_modified": node.last_modified().as_nanos(),
        "last_checked": node.last_checked().as_nanos(),
        "needs_update": node.needs_update()
    })
}

fn not_found(format: OutputFormat, what: &str) {
    output(
        format,
        &serde_json::json!({
            "status": "error",
            "message": format!("Not found: {}", what)
        }),
    );
    std::process::exit(1);
}

fn output(format: OutputFormat, value: &serde_json::Value) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Text => serde_json::to_string_pretty(value),
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}
