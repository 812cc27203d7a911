use std::io::{self, BufRead, Write};

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;

use backup_tools::compare::{Oracle, path_mtime_seconds};
use backup_tools::config::Interpreter;
use backup_tools::diff::{ChangeSet, ScanOptions, scan_changes};
use backup_tools::report::{self, ApplyProgress, Spinner};
use backup_tools::tree::{TreeOptions, print_tracked_tree};
use backup_tools::{apply, paths};

#[derive(Parser)]
#[command(
    name = "backuptools",
    about = "Config-driven one-way mirror of local directories"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a backup of files
    Backup {
        /// Path to the config file
        config: String,
        /// Limit output to N lines per category (negative = no limit)
        #[arg(short = 'l', long, default_value_t = 50, allow_negative_numbers = true)]
        limit: i64,
        /// Skip reading/writing the cache file
        #[arg(long)]
        skip_cache: bool,
        /// Compare by modification time only (no binary scan)
        #[arg(long)]
        fast_compare: bool,
        /// Run without confirmation or the closing re-check
        #[arg(short, long)]
        force: bool,
    },
    /// List changes to make during backup
    Check {
        /// Path to the config file
        config: String,
        /// Limit output to N lines per category (negative = no limit)
        #[arg(short = 'l', long, default_value_t = 50, allow_negative_numbers = true)]
        limit: i64,
        /// Skip reading/writing the cache file
        #[arg(long)]
        skip_cache: bool,
        /// Compare by modification time only (no binary scan)
        #[arg(long)]
        fast_compare: bool,
    },
    /// Display tree of tracked files
    Tree {
        /// Path to the config file
        config: String,
        /// Only display the total count
        #[arg(short, long)]
        count: bool,
        /// Show tracked file destinations
        #[arg(short, long)]
        verbose: bool,
        /// Hide sub-trees that only contain ignored items
        #[arg(short, long)]
        prune: bool,
    },
    /// Show the config file documentation
    HelpConfig,
    /// Exit the interactive shell
    Exit,
}

fn output_limit(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

fn config_path(raw: &str) -> Utf8PathBuf {
    paths::from_user_input(raw)
}

/// Cache files live under `.backuptools/` in the working directory, one per
/// config file name.
fn cache_path_for(config: &Utf8Path) -> Utf8PathBuf {
    let name = config.file_name().unwrap_or("config");
    Utf8PathBuf::from(format!(".backuptools/{name}.cache"))
}

/// Shared scan flow of `check` and `backup`: load the cache, expand and
/// diff, save the cache back, and (optionally) print the changes.
fn run_scan(
    config: &Utf8Path,
    options: ScanOptions,
    limit: usize,
    print_changes: bool,
    confirmation: bool,
) -> Result<ChangeSet> {
    let mut interp = Interpreter::open(config)?;
    let config_mtime = path_mtime_seconds(config);
    let cache_path = cache_path_for(config);

    let mut oracle = match config_mtime {
        Some(tag) if !options.skip_cache && cache_path.exists() => {
            print!("Parsing cache file...");
            match Oracle::load(&cache_path, tag) {
                Some(oracle) => {
                    println!();
                    oracle
                }
                None => {
                    println!(" Canceled (config file was updated).");
                    Oracle::new()
                }
            }
        }
        _ => Oracle::new(),
    };

    let mut spinner = Spinner::new("Scanning for changes...");
    let (changes, scanned) = {
        let spin = &mut spinner;
        scan_changes(&mut interp, &mut oracle, options, &mut || spin.tick())?
    };
    spinner.finish(scanned);

    if !options.skip_cache
        && let Some(tag) = config_mtime
        && let Err(e) = oracle.save(&cache_path, tag)
    {
        report::warn(format_args!("Cannot save cache: {e:#}"));
    }

    if print_changes {
        report::print_changes(&changes, limit, confirmation);
    }

    Ok(changes)
}

fn cmd_check(config: &Utf8Path, limit: usize, options: ScanOptions) -> Result<()> {
    run_scan(config, options, limit, true, false)?;
    Ok(())
}

fn cmd_backup(config: &Utf8Path, limit: usize, options: ScanOptions, force: bool) -> Result<()> {
    let changes = run_scan(config, options, limit, !force, true)?;
    if changes.is_empty() {
        return Ok(());
    }
    if !force && !report::confirm() {
        println!("\nBackup canceled.");
        return Ok(());
    }

    println!();
    let progress = ApplyProgress::new(changes.len());
    apply::apply_changes(&changes, &mut |message| progress.step(message));
    progress.finish();

    if !force {
        // A second pass reveals I/O failures and recursive config rules
        // (a destination nested inside a source keeps producing changes).
        let after = run_scan(config, options, limit, false, false)?;
        if after.is_empty() {
            println!("Done.");
        } else {
            println!(
                "{}",
                "Warning: Found remaining changes after running backup. This may have been \
                 caused by an error during\nfile operations or recursive rules in the config \
                 file. Run \"check <config file>\" for more details."
                    .yellow()
            );
        }
    }
    Ok(())
}

fn cmd_tree(config: &Utf8Path, options: TreeOptions) -> Result<()> {
    let mut interp = Interpreter::open(config)?;
    print_tracked_tree(&mut interp, options)
}

fn run(command: &Commands) -> i32 {
    let result = match command {
        Commands::Backup {
            config,
            limit,
            skip_cache,
            fast_compare,
            force,
        } => cmd_backup(
            &config_path(config),
            output_limit(*limit),
            ScanOptions {
                skip_cache: *skip_cache,
                fast_compare: *fast_compare,
            },
            *force,
        ),
        Commands::Check {
            config,
            limit,
            skip_cache,
            fast_compare,
        } => cmd_check(
            &config_path(config),
            output_limit(*limit),
            ScanOptions {
                skip_cache: *skip_cache,
                fast_compare: *fast_compare,
            },
        ),
        Commands::Tree {
            config,
            count,
            verbose,
            prune,
        } => cmd_tree(
            &config_path(config),
            TreeOptions {
                verbose: *verbose,
                count_only: *count,
                prune: *prune,
            },
        ),
        Commands::HelpConfig => {
            show_config_help();
            Ok(())
        }
        Commands::Exit => Ok(()),
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red());
            1
        }
    }
}

/// Splits a REPL input line into arguments. Double quotes group whitespace
/// into one argument and `\"` escapes a literal quote.
fn split_arguments(line: &str) -> Vec<String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut within_arg = false;
    let mut within_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_whitespace() && !within_quotes {
            if within_arg {
                arguments.push(std::mem::take(&mut current));
                within_arg = false;
            }
        } else {
            within_arg = true;
            if c == '"' {
                within_quotes = !within_quotes;
            } else if c == '\\' && chars.peek() == Some(&'"') {
                current.push('"');
                chars.next();
            } else {
                current.push(c);
            }
        }
    }
    if within_arg {
        arguments.push(current);
    }
    arguments
}

fn repl() -> i32 {
    let _ = Cli::command().print_help();
    let stdin = io::stdin();
    loop {
        print!("\n>>> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return 0,
            Ok(_) => {}
        }
        let mut argv = vec!["backuptools".to_string()];
        argv.extend(split_arguments(&line));
        if argv.len() == 1 {
            continue;
        }
        match Cli::try_parse_from(argv.iter().map(String::as_str)) {
            Ok(cli) => {
                if matches!(cli.command, Commands::Exit) {
                    return 0;
                }
                run(&cli.command);
            }
            Err(e) => {
                let _ = e.print();
            }
        }
    }
}

fn main() {
    let code = if std::env::args().len() >= 2 {
        match Cli::try_parse() {
            Ok(cli) => run(&cli.command),
            Err(e) => e.exit(),
        }
    } else {
        repl()
    };
    std::process::exit(code);
}

fn show_config_help() {
    println!(
        r#"Configuration files are newline-delimited command streams. Blank lines
and lines starting with # are skipped. Paths may use / or \ as separator;
a path containing spaces must be wrapped in double quotes.

Glob patterns in paths:
    *      any run of characters within one name (not the separator)
    ?      any single character within one name
    [...]  one character from a set or range: [abc], [a-z], [!a-z]
    **     any number of directories; must stand alone in its sub-path
           Ex: "/data/**/*.png" matches .png files at any depth.
    With "set match-hidden false", * and ? skip names starting with a dot.

set <variable> <true/false>
    glob-matching   Enable or disable wildcards (default true). The **
                    pattern keeps working even when disabled.
    match-hidden    Whether * and ? match leading dots (default true).

    set match-hidden false

root <identifier> <replacement-path>
    Declares an alias for a path prefix. The identifier is substituted
    when it appears as the first element of a later path. Matching is
    case-sensitive.

    root SOURCE /home/user/documents
    root DEST "/mnt/backup drive"

ignore <path>
    Excludes matching items from the backup, on both the source and the
    destination side (an ignored destination entry is never deleted).
    Relative patterns match at any depth; absolute patterns are anchored.

    ignore *.tmp
    ignore "/mnt/backup drive/System Volume Information"

include <path>
    Removes a pattern previously added with ignore. The pattern must
    match an active ignore exactly, otherwise an error is raised.

    include *.tmp

in <destination-path> [add <source-path>]
    Selects the destination for subsequent add commands, optionally
    adding the first source on the same line.

add <source-path>
    Tracks a source below the current destination. A directory mirrors
    its contents; a pattern tracks everything it matches. A source that
    expands twice is only backed up at its first occurrence.

    in DEST
        add SOURCE
        add *.txt
        add "/var/data/reports""#
    );
}
