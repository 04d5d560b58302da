//! Kiln CLI - Command-line tool for inspecting engine asset bundles.
//!
//! This is the main entry point for the Kiln command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use kiln::bundle::BundleMetadata;
use kiln::serialized::{class_id, export};
use kiln::prelude::*;

/// Kiln - engine asset bundle inspection and mesh extraction tool
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header, block table and directory of bundles
    BundleInfo {
        /// Bundle files, directories or glob patterns
        #[arg(short, long, env = "KILN_INPUT", required = true, num_args = 1..)]
        input: Vec<String>,

        /// Print JSON instead of a summary
        #[arg(short, long)]
        json: bool,
    },

    /// List the objects of every serialized file
    List {
        /// Bundles or serialized files, directories or glob patterns
        #[arg(short, long, env = "KILN_INPUT", required = true, num_args = 1..)]
        input: Vec<String>,

        /// Class name filter (glob-style, e.g. "Mesh" or "*Renderer")
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Dump every object's decoded tree as JSON
    DumpTree {
        /// Bundles or serialized files, directories or glob patterns
        #[arg(short, long, env = "KILN_INPUT", required = true, num_args = 1..)]
        input: Vec<String>,

        /// Output JSON file (stdout if omitted)
        #[arg(short, long, env = "KILN_OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Summarize mesh objects without decoding geometry
    Meshes {
        /// Bundles or serialized files, directories or glob patterns
        #[arg(short, long, env = "KILN_INPUT", required = true, num_args = 1..)]
        input: Vec<String>,

        /// Print JSON instead of a table
        #[arg(short, long)]
        json: bool,
    },

    /// Write bundle nodes, or decoded mesh geometry, to disk
    Extract {
        /// Bundles or serialized files, directories or glob patterns
        #[arg(short, long, env = "KILN_INPUT", required = true, num_args = 1..)]
        input: Vec<String>,

        /// Output directory
        #[arg(short, long, env = "KILN_OUTPUT")]
        output: PathBuf,

        /// Node path filter (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Write each mesh's geometry as JSON instead of raw nodes
        #[arg(short, long)]
        meshes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::BundleInfo { input, json } => {
            cmd_bundle_info(&collect_inputs(&input)?, json)?;
        }
        Commands::List { input, filter } => {
            cmd_list(&collect_inputs(&input)?, filter.as_deref())?;
        }
        Commands::DumpTree { input, output } => {
            cmd_dump_tree(&collect_inputs(&input)?, output.as_deref())?;
        }
        Commands::Meshes { input, json } => {
            cmd_meshes(&collect_inputs(&input)?, json)?;
        }
        Commands::Extract { input, output, filter, meshes } => {
            let inputs = collect_inputs(&input)?;
            if meshes {
                cmd_extract_meshes(&inputs, &output)?;
            } else {
                cmd_extract_nodes(&inputs, &output, filter.as_deref())?;
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Expand files, directories and glob patterns into a sorted file list.
fn collect_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(true) {
                let entry = entry.with_context(|| format!("Failed to walk {}", input))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else if path.exists() {
            files.push(path.to_path_buf());
        } else {
            let matches = glob::glob(input).with_context(|| format!("Invalid pattern {}", input))?;
            let before = files.len();
            for entry in matches {
                let entry = entry.context("Failed to read glob match")?;
                if entry.is_file() {
                    files.push(entry);
                }
            }
            if files.len() == before {
                warn!(pattern = %input, "no input files matched");
            }
        }
    }

    files.sort();
    files.dedup();
    if files.is_empty() {
        anyhow::bail!("No input files found");
    }
    Ok(files)
}

fn load_environment(inputs: &[PathBuf]) -> Result<Environment> {
    let start = Instant::now();
    let mut env = Environment::new();
    for path in inputs {
        env.load_path(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
    }
    info!(assets = env.assets().len(), elapsed = ?start.elapsed(), "environment loaded");
    Ok(env)
}

/// Case-insensitive glob filter; without a pattern everything matches.
struct NameFilter(Option<Pattern>);

impl NameFilter {
    fn new(pattern: Option<&str>) -> Result<Self> {
        let pattern = pattern
            .map(Pattern::new)
            .transpose()
            .context("Invalid filter pattern")?;
        Ok(Self(pattern))
    }

    fn matches(&self, name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.0
            .as_ref()
            .map_or(true, |pattern| pattern.matches_with(name, options))
    }
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    println!("{}", text);
    Ok(())
}

fn cmd_bundle_info(inputs: &[PathBuf], json: bool) -> Result<()> {
    let mut reports = Vec::new();
    for path in inputs {
        let bundle = Bundle::open(path)
            .with_context(|| format!("Failed to open bundle {}", path.display()))?;
        reports.push((path, BundleMetadata::from_bundle(&bundle)));
    }

    if json {
        let reports: Vec<_> = reports
            .iter()
            .map(|(path, metadata)| {
                serde_json::json!({ "file": path.display().to_string(), "bundle": metadata })
            })
            .collect();
        return print_json(&reports);
    }

    for (path, metadata) in &reports {
        println!("{}", path.display());
        println!(
            "  {} v{} ({} / {})",
            metadata.signature,
            metadata.format_version,
            metadata.player_version,
            metadata.engine_version
        );
        println!(
            "  size {}, block info {}/{} bytes, flags {:#x}{}",
            metadata.size,
            metadata.compressed_block_info_size,
            metadata.uncompressed_block_info_size,
            metadata.flags,
            if metadata.block_info_at_end { " (block info at end)" } else { "" }
        );
        println!("  data offset {}", metadata.data_offset);
        if let Some(hash) = &metadata.block_hash {
            println!("  hash {}", hash);
        }

        println!("  {} blocks:", metadata.blocks.len());
        for block in &metadata.blocks {
            println!(
                "    {:>12} {:>12} {:#06x}",
                block.compressed_size, block.uncompressed_size, block.flags
            );
        }

        println!("  {} nodes:", metadata.nodes.len());
        for node in &metadata.nodes {
            println!("    {:>12} {:>12} {:#x} {}", node.offset, node.size, node.flags, node.path);
        }
    }

    Ok(())
}

fn cmd_list(inputs: &[PathBuf], filter: Option<&str>) -> Result<()> {
    let filter = NameFilter::new(filter)?;
    let env = load_environment(inputs)?;

    let mut count = 0;
    for source in env.files()? {
        let file = source
            .parse(ParseOptions::default())
            .with_context(|| format!("Failed to parse {}", source.path))?;
        println!(
            "{}:{} (v{}, {}, {} objects)",
            source.asset,
            source.path,
            file.version(),
            file.unity_version(),
            file.objects().len()
        );

        for object in file.objects() {
            let class = class_id::display_name(object.class_id);
            if !filter.matches(&class) {
                continue;
            }
            println!("  {:>20} {:>10} {}", object.path_id, object.byte_size, class);
            count += 1;
        }
    }

    println!("\nTotal: {} objects", count);

    Ok(())
}

#[derive(Serialize)]
struct FileDump {
    asset: String,
    file: String,
    objects: Vec<export::ObjectDump>,
}

fn cmd_dump_tree(inputs: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let env = load_environment(inputs)?;

    let mut dumps = Vec::new();
    for source in env.files()? {
        let file = source
            .parse(ParseOptions::default())
            .with_context(|| format!("Failed to parse {}", source.path))?;
        dumps.push(FileDump {
            asset: source.asset.to_string(),
            file: source.path.to_string(),
            objects: export::dump_objects(&file),
        });
    }

    match output {
        Some(path) => {
            let text = serde_json::to_string_pretty(&dumps).context("Failed to serialize JSON")?;
            fs::write(path, text).context("Failed to write output file")?;
            println!("Dumped {} files to {}", dumps.len(), path.display());
        }
        None => print_json(&dumps)?,
    }

    Ok(())
}

fn cmd_meshes(inputs: &[PathBuf], json: bool) -> Result<()> {
    let env = load_environment(inputs)?;
    let records = env.mesh_diagnostics()?;

    let mut summaries = Vec::new();
    for record in records {
        match record.diagnostics {
            Ok(diagnostics) => summaries.push(diagnostics),
            Err(e) => eprintln!("Error reading mesh {} in {}: {}", record.path_id, record.file, e),
        }
    }

    if json {
        return print_json(&summaries);
    }

    println!(
        "{:>20} {:>8} {:>10} {:>10} {:>5}  {}",
        "pathId", "verts", "indices", "vdata", "rend", "name"
    );
    for mesh in &summaries {
        println!(
            "{:>20} {:>8} {:>10} {:>10} {:>5}  {}{}",
            mesh.path_id,
            mesh.vertex_count,
            mesh.index_buffer_length,
            mesh.vertex_data_length,
            if mesh.renderable { "yes" } else { "no" },
            mesh.name,
            mesh.stream
                .as_ref()
                .map(|s| format!(" [{} @ {}+{}]", s.path, s.offset, s.size))
                .unwrap_or_default()
        );
    }
    println!("\nTotal: {} meshes", summaries.len());

    Ok(())
}

/// Turn a node or asset path into a file name that stays inside the output.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

fn cmd_extract_nodes(inputs: &[PathBuf], output: &Path, filter: Option<&str>) -> Result<()> {
    let filter = NameFilter::new(filter)?;
    let env = load_environment(inputs)?;

    let mut entries = Vec::new();
    for asset in env.assets() {
        if let Some(bundle) = asset.as_bundle() {
            for node in bundle.nodes() {
                if filter.matches(&node.path) {
                    entries.push((asset, bundle, node));
                }
            }
        }
    }

    if entries.is_empty() {
        println!("No bundle nodes to extract");
        return Ok(());
    }

    println!("Extracting {} nodes...", entries.len());
    let pb = progress_bar(entries.len())?;
    fs::create_dir_all(output)?;

    let start = Instant::now();
    for (asset, bundle, node) in &entries {
        let dir = output.join(sanitize(&asset.name));
        fs::create_dir_all(&dir)?;

        let data = bundle
            .node_data(node)
            .with_context(|| format!("Failed to read node {}", node.path))?;
        fs::write(dir.join(sanitize(node.file_name())), data)?;

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!("Extraction completed in {:?}", start.elapsed());

    Ok(())
}

fn cmd_extract_meshes(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let env = load_environment(inputs)?;

    let start = Instant::now();
    let records = env.extract_meshes().context("Failed to extract meshes")?;
    println!("Decoded {} meshes in {:?}", records.len(), start.elapsed());

    let pb = progress_bar(records.len())?;
    fs::create_dir_all(output)?;

    let mut written = 0;
    let mut missing = 0;
    let mut errors = 0;
    for record in &records {
        match &record.mesh {
            Ok(mesh) => {
                if mesh.missing_resource.is_some() {
                    missing += 1;
                }
                let dir = output.join(sanitize(&record.asset)).join(sanitize(&record.file));
                fs::create_dir_all(&dir)?;
                let name = format!("{}_{}.json", record.path_id, sanitize(&mesh.name));
                let text = serde_json::to_string(mesh).context("Failed to serialize mesh")?;
                fs::write(dir.join(name), text)?;
                written += 1;
            }
            Err(e) => {
                eprintln!("Error extracting mesh {} in {}: {}", record.path_id, record.file, e);
                errors += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "Wrote {} meshes ({} missing streamed data, {} errors)",
        written, missing, errors
    );

    Ok(())
}
