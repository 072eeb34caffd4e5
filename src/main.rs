//! Binary entrypoint for the meshtrace analyzer CLI.
//!
//! Offline tooling over the library crate — nothing here talks to a radio:
//! - `init` - create a starter `config.toml`
//! - `packet <raw-hex>` - packet identity digest plus decoded path-length byte
//! - `path <text>` - normalize a path string, optionally as a round trip
//! - `resolve <prefix>` - run the identity resolver against a JSON directory
//! - `apply-trace` - apply a resolved path to the topology store
//! - `edges` - list stored edges with age

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use meshtrace::codec;
use meshtrace::config::Config;
use meshtrace::directory::InMemoryDirectory;
use meshtrace::geo::Location;
use meshtrace::path;
use meshtrace::resolver::IdentityResolver;
use meshtrace::topology::{SledTopologyStore, TopologyBuilder, TopologyStore, TraceOrigin};

#[derive(Parser)]
#[command(name = "meshtrace")]
#[command(about = "Trace and topology analyzer for MeshCore packet radio meshes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter configuration file
    Init,
    /// Compute a packet's identity digest and decode its path-length byte
    Packet {
        /// Raw packet bytes as hex
        raw_hex: String,
        /// Override the payload type instead of reading it from the header
        #[arg(long)]
        payload_type: Option<u8>,
    },
    /// Normalize a path string into hop tokens
    Path {
        /// Path text: comma/space-separated or contiguous hex
        text: String,
        /// Build the round-trip form of the path
        #[arg(short, long)]
        reciprocal: bool,
        /// Treat hops as 2-byte (4 hex char) prefixes
        #[arg(long)]
        wide: bool,
    },
    /// Resolve a hash prefix against a directory snapshot
    Resolve {
        /// Hash prefix (lowercase hex)
        prefix: String,
        /// JSON directory snapshot
        #[arg(short, long)]
        directory: String,
        /// Reference location as "lat,lon" for collision disambiguation
        #[arg(long)]
        near: Option<String>,
    },
    /// Apply a resolved trace path to the topology store
    ApplyTrace {
        /// JSON directory snapshot
        #[arg(short, long)]
        directory: String,
        /// Trace path text (hop order as recorded in the packet)
        #[arg(short, long)]
        path: String,
        /// Our own hash prefix (the trace destination)
        #[arg(long)]
        origin_prefix: String,
        /// Our full public key
        #[arg(long)]
        origin_key: Option<String>,
        /// Our location as "lat,lon"
        #[arg(long)]
        origin_location: Option<String>,
        /// Mark this as a self-initiated round-trip probe
        #[arg(long)]
        self_trace: bool,
    },
    /// List stored topology edges
    Edges,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init => Config::default(),
        _ => Config::load(&cli.config).await.unwrap_or_default(),
    };
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            println!("Wrote default configuration to {}", cli.config);
        }
        Commands::Packet { raw_hex, payload_type } => {
            let digest = codec::packet_hash_hex(&raw_hex, payload_type);
            println!("packet hash: {}", digest);
            if digest == codec::SENTINEL_PACKET_HASH {
                println!("(structurally unparseable; sentinel digest)");
            }
            if let Some(byte) = path_len_byte(&raw_hex) {
                let (path_bytes, bytes_per_hop) =
                    codec::decode_path_len_byte(byte, config.codec.max_path_size);
                println!(
                    "path_len byte 0x{:02x}: {} path byte(s), {} byte(s)/hop",
                    byte, path_bytes, bytes_per_hop
                );
            }
        }
        Commands::Path { text, reciprocal, wide } => {
            let width = if wide {
                path::WIDE_PREFIX_HEX_CHARS
            } else {
                path::PREFIX_HEX_CHARS
            };
            let mut nodes = path::parse_path_string(&text, width);
            nodes.truncate(config.trace.maximum_hops);
            if reciprocal {
                nodes = path::build_reciprocal(&nodes);
            }
            // The wire form is always 1-byte prefixes; wide tokens are a
            // display convention, joined as parsed.
            let rendered = if wide {
                (!nodes.is_empty()).then(|| nodes.join(","))
            } else {
                path::path_to_wire(&nodes)
            };
            match rendered {
                Some(wire) => println!("{} ({} hops)", wire, nodes.len()),
                None => println!("(flood)"),
            }
        }
        Commands::Resolve { prefix, directory, near } => {
            let dir = InMemoryDirectory::load_json(&directory)?;
            let reference = near.as_deref().map(parse_lat_lon).transpose()?;
            let resolver = IdentityResolver::new(&dir);
            let window = Some(config.topology.recency_window());
            match resolver.resolve(&prefix, reference, window) {
                Some(node) => {
                    println!("{} -> {}", prefix, node.public_key);
                    match node.location {
                        Some(loc) => println!("location: {:.5}, {:.5}", loc.lat, loc.lon),
                        None => println!("location: hidden"),
                    }
                    if !node.is_unambiguous() {
                        println!("({} candidates shared this prefix)", node.candidate_count);
                    }
                }
                None => println!("{}: no routing node matches", prefix),
            }
        }
        Commands::ApplyTrace {
            directory,
            path: path_text,
            origin_prefix,
            origin_key,
            origin_location,
            self_trace,
        } => {
            let dir = InMemoryDirectory::load_json(&directory)?;
            let store = SledTopologyStore::open(SledTopologyStore::default_path(
                &config.storage.data_dir,
            ))?;
            let mut origin = TraceOrigin::new(origin_prefix);
            if let Some(key) = origin_key {
                origin = origin.with_public_key(key);
            }
            if let Some(text) = origin_location {
                origin = origin.with_location(parse_lat_lon(&text)?);
            }
            let hops = path::parse_path_string(&path_text, path::PREFIX_HEX_CHARS);
            let builder = TopologyBuilder::new(
                &dir,
                &store,
                origin,
                Some(config.topology.recency_window()),
            );
            builder.update_from_trace(&hops, self_trace)?;
            info!("applied {} hop(s) to the topology store", hops.len());
            println!("{} edge(s) stored", store.edge_count()?);
        }
        Commands::Edges => {
            let store = SledTopologyStore::open(SledTopologyStore::default_path(
                &config.storage.data_dir,
            ))?;
            let now = chrono::Utc::now();
            let edges = store.list_edges()?;
            if edges.is_empty() {
                println!("no edges stored");
            }
            for edge in edges {
                let distance = edge
                    .geographic_distance_km
                    .map(|d| format!("{:.1} km", d))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{} -> {}  hop {}  {}  confirmed {}h ago",
                    edge.from_prefix,
                    edge.to_prefix,
                    edge.hop_position,
                    distance,
                    edge.age(now).num_hours()
                );
            }
        }
    }

    Ok(())
}

/// Extract the path-length byte from a raw hex packet dump, honoring the
/// transport-code offset, so `packet` can show the decoded stride.
fn path_len_byte(raw_hex: &str) -> Option<u8> {
    let raw: Vec<u8> = (0..raw_hex.len() / 2 * 2)
        .step_by(2)
        .map(|i| u8::from_str_radix(raw_hex.get(i..i + 2)?, 16).ok())
        .collect::<Option<_>>()?;
    let header = *raw.first()?;
    let route_type = header & 0x03;
    let offset = if route_type == 0x00 || route_type == 0x03 { 5 } else { 1 };
    raw.get(offset).copied()
}

fn parse_lat_lon(text: &str) -> Result<Location> {
    let (lat, lon) = text
        .split_once(',')
        .ok_or_else(|| anyhow!("expected \"lat,lon\", got {:?}", text))?;
    Ok(Location::new(
        lat.trim().parse::<f64>()?,
        lon.trim().parse::<f64>()?,
    ))
}

fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    builder.parse_filters(&level);
    let _ = builder.try_init();
}
