//! ingesta CLI - engineering document pipeline driver

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use ingesta::{FsSource, PipelineConfig, RuleSet, SourceBackend};

#[derive(Parser)]
#[command(name = "ingesta")]
#[command(version)]
#[command(
    about = "Turn folders of engineering documents into text, tables and a graph",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all five stages in order
    Run {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Stage 1: extract page text and manifests
    Extract {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Stage 2: remove repeated headers and footers
    Clean {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Stage 3: parse blocks, tables and diagram context
    Parse {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Stage 4: merge documents into corpus-wide master files
    Consolidate {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Stage 5: export the node/edge graph
    Graph {
        #[command(flatten)]
        stage: StageArgs,
    },

    /// Print the active rule tables as JSON
    Rules {
        /// Rule tables file; built-in tables when omitted
        #[arg(long, value_name = "FILE", env = "INGESTA_RULES")]
        rules: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

/// Options shared by every stage command.
#[derive(Args)]
struct StageArgs {
    /// Directory scanned for input documents
    #[arg(
        short,
        long,
        value_name = "DIR",
        env = "INGESTA_INPUT",
        default_value = "docs"
    )]
    input: PathBuf,

    /// Root directory for stage artifacts
    #[arg(
        short,
        long,
        value_name = "DIR",
        env = "INGESTA_OUTPUT",
        default_value = "outputs"
    )]
    output: PathBuf,

    /// Process only this document id
    #[arg(long, value_name = "DOC_ID")]
    doc: Option<String>,

    /// Rule tables file (JSON); built-in tables when omitted
    #[arg(long, value_name = "FILE", env = "INGESTA_RULES")]
    rules: Option<PathBuf>,

    /// Page source backend
    #[arg(long, value_enum, default_value = "auto")]
    backend: Backend,
}

impl StageArgs {
    fn to_config(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = PipelineConfig::new(&self.input, &self.output)
            .with_backend(self.backend.into());
        if let Some(doc) = &self.doc {
            config = config.with_doc_filter(doc);
        }
        if let Some(path) = &self.rules {
            config = config.with_rules(RuleSet::from_path(path)?);
        }
        Ok(config)
    }

    fn source(&self, config: &PipelineConfig) -> FsSource {
        FsSource::new(&config.input_dir, config.backend)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Pick per file: extraction dumps win over PDFs
    Auto,
    /// Native PDF text layer only
    Pdf,
    /// Sidecar extraction dumps only
    Dump,
}

impl From<Backend> for SourceBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Auto => SourceBackend::Auto,
            Backend::Pdf => SourceBackend::Pdf,
            Backend::Dump => SourceBackend::Dump,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Some(Commands::Run { stage }) => cmd_run(&stage),
        Some(Commands::Extract { stage }) => cmd_extract(&stage),
        Some(Commands::Clean { stage }) => cmd_clean(&stage),
        Some(Commands::Parse { stage }) => cmd_parse(&stage),
        Some(Commands::Consolidate { stage }) => cmd_consolidate(&stage),
        Some(Commands::Graph { stage }) => cmd_graph(&stage),
        Some(Commands::Rules { rules, output }) => cmd_rules(rules.as_deref(), output.as_deref()),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!("{}", "Usage: ingesta <COMMAND>".yellow());
            println!("       ingesta --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_run(args: &StageArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;
    let source = args.source(&config);

    let pb = ProgressBar::new(5);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    pb.set_message("Extracting pages...");
    let extract = ingesta::extract_pages(&config, &source)?;
    pb.inc(1);

    pb.set_message("Cleaning headers and footers...");
    let clean = ingesta::clean_pages(&config)?;
    pb.inc(1);

    pb.set_message("Parsing blocks and tables...");
    let parse = ingesta::parse_blocks(&config, &source)?;
    pb.inc(1);

    pb.set_message("Consolidating master files...");
    let consolidate = ingesta::consolidate(&config)?;
    pb.inc(1);

    pb.set_message("Building graph...");
    let graph = ingesta::build_graph(&config)?;
    pb.inc(1);

    pb.finish_with_message("Done!");

    println!("\n{}", "Pipeline summary:".green().bold());
    println!(
        "  {} extract: {} documents, {} pages ({} failed)",
        "├─".dimmed(),
        extract.documents,
        extract.pages,
        extract.failed_documents
    );
    println!(
        "  {} clean: {} lines removed across {} documents",
        "├─".dimmed(),
        clean.removed_lines,
        clean.documents
    );
    println!(
        "  {} parse: {} blocks on {} pages",
        "├─".dimmed(),
        parse.blocks,
        parse.pages
    );
    println!(
        "  {} consolidate: {} section rows, {} table rows, {} pid rows",
        "├─".dimmed(),
        consolidate.section_rows,
        consolidate.table_rows,
        consolidate.pid_rows
    );
    println!(
        "  {} graph: {} nodes, {} edges",
        "└─".dimmed(),
        graph.nodes,
        graph.edges
    );
    println!("\n{} {}", "Artifacts under".bold(), config.output_dir.display());

    Ok(())
}

fn cmd_extract(args: &StageArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;
    let source = args.source(&config);
    let report = ingesta::extract_pages(&config, &source)?;
    println!(
        "{} {} documents, {} pages ({} failed)",
        "Extracted".green().bold(),
        report.documents,
        report.pages,
        report.failed_documents
    );
    println!(
        "{} {}",
        "Index:".bold(),
        config.raw_pages_dir().join("index.json").display()
    );
    Ok(())
}

fn cmd_clean(args: &StageArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;
    let report = ingesta::clean_pages(&config)?;
    println!(
        "{} {} documents, {} repeated lines removed ({} failed)",
        "Cleaned".green().bold(),
        report.documents,
        report.removed_lines,
        report.failed_documents
    );
    Ok(())
}

fn cmd_parse(args: &StageArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;
    let source = args.source(&config);
    let report = ingesta::parse_blocks(&config, &source)?;
    println!(
        "{} {} blocks on {} pages across {} documents ({} failed)",
        "Parsed".green().bold(),
        report.blocks,
        report.pages,
        report.documents,
        report.failed_documents
    );
    Ok(())
}

fn cmd_consolidate(args: &StageArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;
    let report = ingesta::consolidate(&config)?;
    println!(
        "{} {} documents: {} section rows, {} table rows, {} pid rows",
        "Consolidated".green().bold(),
        report.documents,
        report.section_rows,
        report.table_rows,
        report.pid_rows
    );
    println!(
        "{} {}",
        "Masters:".bold(),
        config.consolidated_dir().display()
    );
    Ok(())
}

fn cmd_graph(args: &StageArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;
    let report = ingesta::build_graph(&config)?;
    println!(
        "{} {} nodes, {} edges",
        "Graph".green().bold(),
        report.nodes,
        report.edges
    );
    println!("{} {}", "Output:".bold(), config.graph_dir().display());
    Ok(())
}

fn cmd_rules(
    rules: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let set = match rules {
        Some(path) => RuleSet::from_path(path)?,
        None => RuleSet::default(),
    };
    let json = serde_json::to_string_pretty(&set)?;

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{json}");
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "ingesta".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Engineering document pipeline");
    println!();
    println!("License: MIT");
}
