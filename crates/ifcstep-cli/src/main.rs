//! ifcstep CLI - inspect and rewrite IFC STEP files
//!
//! Every command loads a schema definition (TOML or JSON) first, then reads
//! the STEP file against it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ifcstep::{read_step, write_step, Describe, EntityId, EntityView, LoadResult};
use ifcstep_schema::{Schema, SchemaDef};
use serde::Serialize;

mod config;
mod logging;

use config::Config;

#[derive(Parser)]
#[command(name = "ifcstep")]
#[command(about = "Inspect and rewrite IFC STEP files", long_about = None)]
struct Cli {
    /// Schema definition (.toml or .json)
    #[arg(short, long)]
    schema: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a file and report diagnostics
    Check {
        /// Input STEP file
        file: PathBuf,
    },
    /// Count entities per type
    Stats {
        /// Input STEP file
        file: PathBuf,
    },
    /// Show one entity's attributes and inverse relationships
    Show {
        /// Input STEP file
        file: PathBuf,
        /// Entity id (with or without '#')
        id: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Load a file and write it back out
    Roundtrip {
        /// Input STEP file
        input: PathBuf,
        /// Output STEP file
        output: PathBuf,
    },
    /// Deep-copy one entity and write the model
    Copy {
        /// Input STEP file
        input: PathBuf,
        /// Entity id to copy
        id: String,
        /// Output STEP file
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let schema = Arc::new(load_schema(&cli.schema)?);
    let config = Config::load(cli.config.as_deref())?;
    config.validate(&schema)?;

    match cli.command {
        Commands::Check { file } => check(&file, schema, &config),
        Commands::Stats { file } => stats(&file, schema, &config),
        Commands::Show { file, id, json } => show(&file, &id, json, schema, &config),
        Commands::Roundtrip { input, output } => {
            let loaded = load(&input, schema, &config)?;
            write_step(&loaded.model, &output, &config.write)?;
            println!(
                "Wrote {} entities to {}",
                loaded.model.len(),
                output.display()
            );
            Ok(())
        }
        Commands::Copy { input, id, output } => copy(&input, &id, &output, schema, &config),
    }
}

fn load_schema(path: &Path) -> Result<Schema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let def = match ext.to_lowercase().as_str() {
        "json" => SchemaDef::from_json(&text)?,
        _ => SchemaDef::from_toml(&text)?,
    };
    let schema = def.compile()?;
    tracing::debug!(
        schema = schema.name(),
        entities = schema.entities().len(),
        "compiled schema"
    );
    Ok(schema)
}

fn load(path: &Path, schema: Arc<Schema>, config: &Config) -> Result<LoadResult> {
    read_step(path, schema, &config.read).with_context(|| format!("loading {}", path.display()))
}

fn parse_id(text: &str) -> Result<EntityId> {
    text.trim_start_matches('#')
        .parse()
        .with_context(|| format!("invalid entity id {}", text))
}

fn check(file: &Path, schema: Arc<Schema>, config: &Config) -> Result<()> {
    let loaded = load(file, schema, config)?;
    for diagnostic in &loaded.diagnostics {
        println!("{}", diagnostic);
    }
    let errors = loaded.errors().count();
    println!(
        "{}: {} entities, {} errors, {} warnings",
        file.display(),
        loaded.model.len(),
        errors,
        loaded.diagnostics.len() - errors
    );
    if errors > 0 {
        bail!("{} has {} error(s)", file.display(), errors);
    }
    Ok(())
}

fn stats(file: &Path, schema: Arc<Schema>, config: &Config) -> Result<()> {
    let loaded = load(file, schema, config)?;
    let counts = loaded.model.type_counts();
    let width = counts.keys().map(|k| k.len()).max().unwrap_or(0);
    for (name, count) in &counts {
        println!("{:width$}  {}", name, count, width = width);
    }
    println!("{:width$}  {}", "total", loaded.model.len(), width = width);
    Ok(())
}

#[derive(Serialize)]
struct EntityReport {
    id: EntityId,
    #[serde(rename = "type")]
    type_name: String,
    incomplete: bool,
    attributes: Vec<(String, String)>,
    inverses: Vec<(String, Vec<EntityId>)>,
}

impl EntityReport {
    fn new(view: &EntityView<'_>, schema: &Schema) -> Self {
        let slots = &view.entity_type().slots;
        let attributes = view
            .describe()
            .into_iter()
            .zip(slots)
            .map(|((name, value), slot)| {
                let mut text = String::new();
                ifcstep::encode(value, Some(&slot.ty), schema, &mut text);
                (name.to_string(), text)
            })
            .collect();
        let inverses = view
            .describe_inverse()
            .into_iter()
            .map(|(name, ids)| (name.to_string(), ids))
            .collect();
        Self {
            id: view.id(),
            type_name: view.type_name().to_string(),
            incomplete: view.entity().is_incomplete(),
            attributes,
            inverses,
        }
    }
}

fn show(file: &Path, id: &str, json: bool, schema: Arc<Schema>, config: &Config) -> Result<()> {
    let id = parse_id(id)?;
    let loaded = load(file, Arc::clone(&schema), config)?;
    let Some(view) = loaded.model.view_by_id(id) else {
        bail!("no entity #{} in {}", id, file.display());
    };
    let report = EntityReport::new(&view, &schema);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("#{} {}", report.id, report.type_name);
    if let Some(raw) = view.entity().raw_arguments() {
        println!("  (incomplete) {}", raw);
    }
    for (name, value) in &report.attributes {
        println!("  {} = {}", name, value);
    }
    for (name, ids) in &report.inverses {
        let ids: Vec<String> = ids.iter().map(|id| format!("#{}", id)).collect();
        println!("  {} <- [{}]", name, ids.join(", "));
    }
    Ok(())
}

fn copy(
    input: &Path,
    id: &str,
    output: &Path,
    schema: Arc<Schema>,
    config: &Config,
) -> Result<()> {
    let id = parse_id(id)?;
    let mut loaded = load(input, schema, config)?;
    let model = &mut loaded.model;
    let root = model
        .get(id)
        .with_context(|| format!("no entity #{} in {}", id, input.display()))?;
    let before = model.len();
    let clone = model.deep_copy(root, &config.copy)?;
    let clone_id = model.entity(clone).map(|e| e.id()).unwrap_or_default();
    write_step(model, output, &config.write)?;
    println!(
        "Copied #{} to #{} ({} new entities), wrote {}",
        id,
        clone_id,
        model.len() - before,
        output.display()
    );
    Ok(())
}
