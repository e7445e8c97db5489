//! querydef: inspect, author and run stored query definitions.
//!
//! # Usage
//!
//! ```bash
//! # Write a managed query definition
//! querydef managed --tables users --column id --column email \
//!     --where "active = ?" --bind 1 --limit 10 -o active_users.json
//!
//! # Show what it would run
//! querydef show active_users.json
//!
//! # Run it
//! querydef run active_users.json --database-url sqlite://app.db
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use querydef::prelude::*;

#[derive(Parser)]
#[command(name = "querydef")]
#[command(version)]
#[command(about = "Stored query definitions: author, inspect and run", long_about = None)]
#[command(after_help = "EXAMPLES:
    querydef raw --sql 'SELECT count(*) AS n FROM users' -o count.json
    querydef managed --tables users --where 'id = ?' --bind 7 --tag users.by_id
    querydef run count.json --database-url sqlite://app.db --format json")]
struct Cli {
    /// Database connection URL
    #[arg(long, global = true, env = "QUERYDEF_DATABASE_URL")]
    database_url: Option<String>,

    /// Configuration file (defaults to querydef.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain a stored query definition and print the SQL it runs
    Show {
        /// Query definition file (JSON)
        file: PathBuf,
    },
    /// Execute a stored query definition
    Run {
        /// Query definition file (JSON)
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Create a raw query definition
    Raw {
        /// SQL statement, not ; terminated
        #[arg(long)]
        sql: String,

        /// Positional parameter binding for ? (repeatable, in order)
        #[arg(short, long)]
        bind: Vec<String>,

        #[command(flatten)]
        meta: MetaArgs,
    },
    /// Create a managed query definition
    Managed {
        /// Table expression (may be a join)
        #[arg(long)]
        tables: String,

        /// Column to return (repeatable; omit for all columns)
        #[arg(short, long = "column")]
        columns: Vec<String>,

        /// WHERE body
        #[arg(long = "where")]
        selection: Option<String>,

        /// Positional parameter binding for ? in the WHERE body (repeatable, in order)
        #[arg(short, long)]
        bind: Vec<String>,

        #[arg(long)]
        group_by: Option<String>,

        #[arg(long)]
        having: Option<String>,

        #[arg(long)]
        order_by: Option<String>,

        #[arg(long)]
        limit: Option<String>,

        #[arg(long)]
        distinct: bool,

        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        meta: MetaArgs,
    },
}

#[derive(Args)]
struct MetaArgs {
    /// Model version
    #[arg(long = "model-version", default_value_t = 0)]
    version: i32,

    #[arg(long)]
    tag: Option<String>,

    #[arg(long)]
    comment: Option<String>,

    /// Write the definition to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    let result = match &cli.command {
        Commands::Show { file } => show_model(file),
        Commands::Run { file, format } => run_model(file, format, &cli),
        Commands::Raw { meta, .. } | Commands::Managed { meta, .. } => {
            match cli.command.authored_model() {
                Some(model) => write_model(&model, meta.output.as_deref()),
                None => Ok(()),
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

impl Commands {
    /// The model described by a `raw` or `managed` command line.
    fn authored_model(&self) -> Option<QueryModel> {
        match self {
            Commands::Show { .. } | Commands::Run { .. } => None,
            Commands::Raw { sql, bind, meta } => Some(
                meta.builder()
                    .raw(RawQuery::new(sql.as_str()).args(bind.iter().cloned())),
            ),
            Commands::Managed {
                tables,
                columns,
                selection,
                bind,
                group_by,
                having,
                order_by,
                limit,
                distinct,
                strict,
                meta,
            } => {
                let managed = ManagedQuery {
                    tables: tables.clone(),
                    distinct: *distinct,
                    strict: *strict,
                    columns: (!columns.is_empty()).then(|| columns.clone()),
                    selection: selection.clone(),
                    selection_args: bind.clone(),
                    group_by: group_by.clone(),
                    having: having.clone(),
                    sort_order: order_by.clone(),
                    limit: limit.clone(),
                };
                Some(meta.builder().managed(managed))
            }
        }
    }
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "querydef=debug" } else { "querydef=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

impl MetaArgs {
    fn builder(&self) -> QueryModelBuilder {
        let mut builder = QueryModel::builder().version(self.version);
        if let Some(tag) = &self.tag {
            builder = builder.tag(tag.as_str());
        }
        if let Some(comment) = &self.comment {
            builder = builder.comment(comment.as_str());
        }
        builder
    }
}

fn load_model(file: &Path) -> anyhow::Result<QueryModel> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let model = QueryModel::from_json(&json)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    Ok(model)
}

fn write_model(model: &QueryModel, output: Option<&Path>) -> anyhow::Result<()> {
    let json = model.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Wrote {} query to {}",
                "✓".green(),
                model.query_type(),
                path.display().to_string().cyan()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// SQL a model would run on a connection that supports strict mode.
fn preview_sql(model: &QueryModel) -> Result<Option<String>, QueryError> {
    match model.kind() {
        QueryKind::Uninitialized => Ok(None),
        QueryKind::Raw(raw) => Ok(Some(raw.sql.clone())),
        QueryKind::Managed(managed) => {
            let mut builder = SelectBuilder::new();
            builder.set_tables(managed.tables.as_str());
            builder.set_distinct(managed.distinct);
            builder.set_strict_mode(managed.strict);
            builder.build_query(&managed.clauses()).map(Some)
        }
    }
}

fn show_model(file: &Path) -> anyhow::Result<()> {
    let model = load_model(file)?;

    println!("{}", "Query Definition".cyan().bold());
    println!();
    println!("  {} {}", "File:".dimmed(), file.display().to_string().yellow());
    println!("  {} {}", "Type:".dimmed(), model.query_type().to_string().cyan());
    println!("  {} {}", "Version:".dimmed(), model.version());
    if let Some(tag) = model.tag() {
        println!("  {} {}", "Tag:".dimmed(), tag.white());
    }
    if let Some(comment) = model.comment() {
        println!("  {} {}", "Comment:".dimmed(), comment.white());
    }

    if let Some(managed) = model.managed_query() {
        println!("  {} {}", "Tables:".dimmed(), managed.tables.white());
        println!("  {} {}", "Distinct:".dimmed(), managed.distinct);
        println!("  {} {}", "Strict:".dimmed(), managed.strict);
        if managed.having.is_some() && managed.group_by.is_none() {
            println!("  {}", "⚠ HAVING is ignored without GROUP BY".yellow());
        }
    }

    println!();
    match preview_sql(&model) {
        Ok(Some(sql)) => {
            println!("{}", "Generated SQL:".green().bold());
            println!("  {}", sql.white());
        }
        Ok(None) => println!("{}", "⚠ Model is uninitialised; nothing to run".yellow()),
        Err(e) => println!("{} {}", "Rejected:".red().bold(), e),
    }

    let args = model.selection_args();
    if !args.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, arg) in args.iter().enumerate() {
            println!("  ?{} = {}", i + 1, arg.yellow());
        }
    }

    Ok(())
}

fn run_model(file: &Path, format: &OutputFormat, cli: &Cli) -> anyhow::Result<()> {
    let model = load_model(file)?;

    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load()?,
    };
    let url = cli
        .database_url
        .clone()
        .or_else(|| config.database.url.clone())
        .context("No database URL. Use --database-url, set QUERYDEF_DATABASE_URL or add [database] url to querydef.toml")?;

    if cli.verbose {
        println!("{} {}", "Connecting to:".dimmed(), url);
    }

    let conn = SqlxConnection::connect_with(&url, config.database.connection_options())?;
    let cursor = model.execute(&conn)?;
    format_output(cursor.rows(), format);
    Ok(())
}

fn format_output(results: &RowSet, format: &OutputFormat) {
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            let objects: Vec<serde_json::Map<String, serde_json::Value>> = results
                .rows
                .iter()
                .map(|row| {
                    results
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().cloned())
                        .collect()
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&objects).unwrap_or_default());
        }
        OutputFormat::Table => {
            // Calculate column widths
            let mut widths: Vec<usize> = results.columns.iter().map(|c| c.len()).collect();
            for row in &results.rows {
                for (i, val) in row.iter().enumerate() {
                    if let Some(w) = widths.get_mut(i) {
                        *w = (*w).max(val_to_string(val).len());
                    }
                }
            }

            // Print header
            let header: Vec<String> = results
                .columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            // Print separator
            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            // Print rows
            for row in &results.rows {
                let cells: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(val, w)| format!("{:width$}", val_to_string(val), width = *w))
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", results.len().to_string().cyan());
        }
    }
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}
