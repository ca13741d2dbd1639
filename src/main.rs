use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use snippatch::config::{load_from_path, ToolConfig};
use snippatch::progress::{Event, Severity};
use snippatch::replace::ReplaceJob;
use snippatch::session::Session;
use snippatch::store::Slot;
use snippatch::PlanOutcome;
use std::io::Read;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

#[derive(Parser)]
#[command(name = "snippatch")]
#[command(about = "AST-aware snippet patching and bulk find/replace for Python sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults are used if not given)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory tree and run find/replace + reformat over it
    Run {
        /// Root directory to scan
        root: PathBuf,

        /// Search pattern (omit for a format-only pass)
        #[arg(short, long)]
        find: Option<String>,

        /// Replacement text
        #[arg(short, long, default_value = "")]
        replace: String,

        /// Treat the pattern as a regular expression
        #[arg(long)]
        regex: bool,

        /// Skip the external formatter
        #[arg(long)]
        no_format: bool,
    },

    /// Preview a snippet patch against a target file without writing
    Plan {
        /// File containing the snippet, or `-` for stdin
        snippet: PathBuf,

        /// Target file to patch
        target: PathBuf,
    },

    /// Plan a snippet patch, show the diff, and apply it
    Apply {
        /// File containing the snippet, or `-` for stdin
        snippet: PathBuf,

        /// Target file to patch
        target: PathBuf,

        /// Apply without asking for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Restore a file to its previous snapshot
    Undo { file: PathBuf },

    /// Re-apply the change undone by the last undo
    Redo { file: PathBuf },

    /// Restore a file from an explicit snapshot slot
    Restore {
        file: PathBuf,

        #[arg(value_enum)]
        slot: RestoreSlot,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RestoreSlot {
    Backup,
    Redo,
}

impl From<RestoreSlot> for Slot {
    fn from(slot: RestoreSlot) -> Self {
        match slot {
            RestoreSlot::Backup => Slot::Backup,
            RestoreSlot::Redo => Slot::Redo,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ToolConfig::default(),
    };

    match cli.command {
        Commands::Run {
            root,
            find,
            replace,
            regex,
            no_format,
        } => cmd_run(config, root, find, replace, regex, no_format),

        Commands::Plan { snippet, target } => cmd_plan(config, &snippet, &target),

        Commands::Apply {
            snippet,
            target,
            yes,
        } => cmd_apply(config, &snippet, &target, yes),

        Commands::Undo { file } => cmd_restore_op(config, &file, Op::Undo),
        Commands::Redo { file } => cmd_restore_op(config, &file, Op::Redo),
        Commands::Restore { file, slot } => cmd_restore_op(config, &file, Op::Restore(slot.into())),
    }
}

fn cmd_run(
    mut config: ToolConfig,
    root: PathBuf,
    find: Option<String>,
    replace: String,
    regex: bool,
    no_format: bool,
) -> Result<()> {
    if no_format {
        config.formatter.enabled = false;
    }
    let diff_context = config.diff_context;
    let mut session = Session::new(config)?;

    println!("Scanning {} ...", root.display());
    let rx = session.start_scan(root)?;
    let (files, cancelled) = drain_scan(rx);
    session.wait();

    if cancelled {
        println!("{}", "Scan cancelled; proceeding with partial list.".yellow());
    }
    if files.is_empty() {
        println!("No matching files found.");
        return Ok(());
    }
    println!("Found {} file(s).\n", files.len());

    let job = ReplaceJob {
        pattern: find.unwrap_or_default(),
        replacement: replace,
        use_regex: regex,
        diff_context,
    };

    let rx = session.start_replace(files, job)?;
    let summary = drain_replace(rx);
    session.wait();

    println!();
    let line = format!(
        "Done: {} updated, {} unchanged, {} warning(s), {} error(s){}",
        summary.updated,
        summary.unchanged,
        summary.warnings,
        summary.errors,
        if summary.cancelled { " (cancelled)" } else { "" },
    );
    if summary.errors > 0 {
        println!("{}", line.red());
    } else if summary.warnings > 0 || summary.cancelled {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.green());
    }
    Ok(())
}

fn cmd_plan(config: ToolConfig, snippet: &PathBuf, target: &PathBuf) -> Result<()> {
    let snippet_text = read_snippet(snippet)?;
    let mut session = Session::new(config)?;

    match session.plan(&snippet_text, target)? {
        PlanOutcome::Ready { patch, diff } => {
            println!(
                "Would replace {} `{}` at lines {}..{} in {}:\n",
                patch.target_kind,
                patch.target_name,
                patch.start_line + 1,
                patch.end_line,
                patch.file.display()
            );
            print_diff(&diff);
            println!("\n{}", "Run `snippatch apply` to commit this patch.".dimmed());
        }
        PlanOutcome::NoChange { name, kind } => {
            println!(
                "{}",
                format!("No changes: the snippet is identical to {kind} `{name}`.").dimmed()
            );
        }
    }
    Ok(())
}

fn cmd_apply(config: ToolConfig, snippet: &PathBuf, target: &PathBuf, yes: bool) -> Result<()> {
    let snippet_text = read_snippet(snippet)?;
    let mut session = Session::new(config)?;

    match session.plan(&snippet_text, target)? {
        PlanOutcome::Ready { patch, diff } => {
            println!(
                "Replacing {} `{}` at lines {}..{} in {}:\n",
                patch.target_kind,
                patch.target_name,
                patch.start_line + 1,
                patch.end_line,
                patch.file.display()
            );
            print_diff(&diff);

            if !yes && !confirm("Apply this patch?")? {
                println!("Aborted; nothing written.");
                return Ok(());
            }

            let applied = session.apply_pending()?;
            println!(
                "{}",
                format!(
                    "Applied `{}` patch to {}.",
                    applied.target_name,
                    applied.file.display()
                )
                .green()
            );
        }
        PlanOutcome::NoChange { name, kind } => {
            println!(
                "{}",
                format!("No changes: the snippet is identical to {kind} `{name}`.").dimmed()
            );
        }
    }
    Ok(())
}

enum Op {
    Undo,
    Redo,
    Restore(Slot),
}

fn cmd_restore_op(config: ToolConfig, file: &PathBuf, op: Op) -> Result<()> {
    let session = Session::new(config)?;
    let verb = match op {
        Op::Undo => {
            session.undo(file)?;
            "Undid last change to"
        }
        Op::Redo => {
            session.redo(file)?;
            "Redid last undo of"
        }
        Op::Restore(slot) => {
            session.restore(file, slot)?;
            "Restored"
        }
    };
    println!("{}", format!("{verb} {}.", file.display()).green());
    Ok(())
}

fn read_snippet(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading snippet from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading snippet from {}", path.display()))
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    println!("\n{prompt} [y/N]");
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("reading confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn drain_scan(rx: Receiver<Event>) -> (Vec<PathBuf>, bool) {
    for event in rx {
        match event {
            Event::Progress(record) => print_record(&record.message, record.severity),
            Event::ScanFinished { files, cancelled } => return (files, cancelled),
            Event::ReplaceFinished(_) => {}
        }
    }
    (Vec::new(), false)
}

fn drain_replace(rx: Receiver<Event>) -> snippatch::BatchSummary {
    for event in rx {
        match event {
            Event::Progress(record) => {
                let line = format!("[{:>3}%] {}", record.percent, record.message);
                print_record(&line, record.severity);
            }
            Event::ReplaceFinished(summary) => return summary,
            Event::ScanFinished { .. } => {}
        }
    }
    snippatch::BatchSummary::default()
}

fn print_record(message: &str, severity: Severity) {
    match severity {
        Severity::Info => println!("{}", message.dimmed()),
        Severity::Success => println!("{}", message.green()),
        Severity::Warning => println!("{}", message.yellow()),
        Severity::Error => eprintln!("{}", message.red()),
    }
}

fn print_diff(diff: &str) {
    for line in diff.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            println!("{}", line.green());
        } else if line.starts_with('-') && !line.starts_with("---") {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
}
