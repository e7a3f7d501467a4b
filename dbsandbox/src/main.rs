//! Sandbox SQL runner.
//!
//! This binary copies selected tables from a source database into a
//! disposable sandbox database, runs SQL against the copy and wipes the
//! sandbox before exiting.
//!
//! # Security Guarantees
//! - The source is opened read-only and never written
//! - The sandbox is wiped on every exit path
//! - No credentials stored or logged

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use dbsandbox_core::config::ResolvedConfig;
use dbsandbox_core::logging::init_logging;
use dbsandbox_core::{AppConfig, SandboxSession, SqlTool, connect};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "dbsandbox")]
#[command(about = "Run SQL against a disposable copy of a database")]
#[command(version)]
#[command(long_about = "
dbsandbox - Safe SQL execution against a sandbox copy

Selected tables are copied (or sampled, when large) from the source
database into a sandbox database. SQL runs against the copy only, and
the sandbox is wiped afterwards.

SUPPORTED DATABASES:
- MySQL (mysql://)
- PostgreSQL (postgres://)

EXAMPLES:
  dbsandbox run --tables orders,customers --sql \"DELETE FROM orders WHERE id < 10\"
  dbsandbox shell --tables orders < queries.sql
  dbsandbox --config staging.json wipe
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    quiet: bool,

    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "DBSANDBOX_CONFIG",
        default_value = "dbsandbox.json",
        help = "Path to the dbsandbox.json configuration file"
    )]
    config: PathBuf,

    /// Log file
    #[arg(long, global = true, help = "Also write debug logs to this file")]
    log_file: Option<PathBuf>,

    /// Prompt for passwords
    #[arg(
        long,
        global = true,
        help = "Prompt for database passwords missing from the configuration"
    )]
    ask_password: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Provision, run one SQL call and dispose
    Run(RunArgs),
    /// Provision, then run one SQL call per stdin line
    Shell(TablesArgs),
    /// Print the source DDL of tables
    Ddl(TablesArgs),
    /// Remove every object from the sandbox database
    Wipe,
    /// Test both database connections
    Check,
}

#[derive(Args)]
struct TablesArgs {
    /// Tables to copy
    #[arg(
        short,
        long,
        required = true,
        value_delimiter = ',',
        help = "Comma-separated list of source tables"
    )]
    tables: Vec<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    tables: TablesArgs,

    /// SQL to execute
    #[arg(long, help = "SQL to execute against the sandbox (statements separated by ';')")]
    sql: String,

    /// SQL run before the call
    #[arg(long, help = "SQL executed before the call; its results are not printed")]
    pre_sql: Option<String>,

    /// SQL run after the call
    #[arg(long, help = "SQL executed after the call, even when it failed")]
    post_sql: Option<String>,

    /// Print provisioning summary
    #[arg(long, help = "Print the provisioning summary as JSON before the results")]
    json_summary: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(
        cli.global.verbose,
        cli.global.quiet,
        cli.global.log_file.as_deref(),
    )?;

    let config = load_config(&cli.global.config, cli.global.ask_password)?;

    match cli.command {
        Command::Run(args) => run(&config, args).await,
        Command::Shell(args) => shell(&config, &args.tables).await,
        Command::Ddl(args) => print_ddl(&config, &args.tables).await,
        Command::Wipe => wipe(&config).await,
        Command::Check => check(&config).await,
    }
}

/// Loads and resolves the configuration, prompting for missing passwords.
fn load_config(path: &Path, ask_password: bool) -> anyhow::Result<ResolvedConfig> {
    let mut config = AppConfig::load(path)?
        .resolve()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    if ask_password {
        for (role, profile) in [
            ("source", &mut config.source),
            ("sandbox", &mut config.sandbox),
        ] {
            if !profile.credentials.has_password() {
                let password = prompt_password(&format!(
                    "Password for {role} ({}): ",
                    profile.config
                ))?;
                profile.credentials.set_password(password);
            }
        }
    }

    Ok(config)
}

fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    eprint!("{prompt}");
    std::io::stderr()
        .flush()
        .context("Failed to flush stderr before reading password")?;
    let password = rpassword::read_password().context("Failed to read password")?;
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

async fn open_session(config: &ResolvedConfig) -> anyhow::Result<SandboxSession> {
    SandboxSession::open(config).await.map_err(|e| {
        error!("Failed to open sandbox session: {}", e);
        e.into()
    })
}

/// Provisions `tables`, keeping the session for cleanup on failure.
async fn provision(session: &mut SandboxSession, tables: &[String]) -> anyhow::Result<()> {
    let summary = session.provision(tables).await?;
    for table in &summary.tables {
        info!(
            "{} -> {}: {} of {} rows{}",
            table.original,
            table.sandbox_name,
            table.copied_rows,
            table.source_rows,
            if table.is_sampled { " (sampled)" } else { "" }
        );
    }
    Ok(())
}

/// Closes the session and folds its result into the command result.
async fn finish(session: SandboxSession, outcome: anyhow::Result<()>) -> anyhow::Result<()> {
    match session.close().await {
        Ok(report) => {
            for (object, reason) in &report.failures {
                warn!("Failed to drop {}: {}", object, reason);
            }
            outcome
        }
        Err(close_error) => {
            outcome?;
            Err(close_error).context("Failed to dispose sandbox")
        }
    }
}

async fn run(config: &ResolvedConfig, args: RunArgs) -> anyhow::Result<()> {
    let mut session = open_session(config).await?;
    if let Some(sql) = args.pre_sql {
        session.register_preprocess_sql(sql);
    }
    if let Some(sql) = args.post_sql {
        session.register_clean_up_sql(sql);
    }

    let outcome = async {
        provision(&mut session, &args.tables.tables).await?;
        if args.json_summary {
            if let Some(summary) = session.provisioner().summary() {
                println!("{}", serde_json::to_string_pretty(summary)?);
            }
        }
        println!("{}", session.execute_sql(&args.sql).await);
        Ok::<(), anyhow::Error>(())
    }
    .await;

    finish(session, outcome).await
}

async fn shell(config: &ResolvedConfig, tables: &[String]) -> anyhow::Result<()> {
    let mut session = open_session(config).await?;

    let outcome = async {
        provision(&mut session, tables).await?;
        info!("Sandbox ready; reading SQL from stdin, one call per line");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            if line.trim().is_empty() {
                continue;
            }
            println!("{}\n", session.call(&line).await);
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    finish(session, outcome).await
}

async fn print_ddl(config: &ResolvedConfig, tables: &[String]) -> anyhow::Result<()> {
    let mut source = connect(
        config.source.config.clone(),
        config.source.credentials.clone(),
    )
    .await?;

    let outcome = async {
        for table in tables {
            if !source.table_exists(table).await? {
                bail!("Table not found on source database: {table}");
            }
            println!("{};\n", source.create_table_ddl(table).await?);
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    let closed = source.close().await;
    outcome?;
    closed.context("Failed to close source connection")
}

async fn wipe(config: &ResolvedConfig) -> anyhow::Result<()> {
    let mut session = open_session(config).await?;
    let outcome = session.provisioner_mut().reset().await;
    let outcome = match outcome {
        Ok(report) => {
            println!(
                "Dropped {} of {} objects from {}",
                report.objects_dropped, report.objects_found, config.sandbox.config
            );
            if report.is_clean() {
                Ok(())
            } else {
                Err(anyhow::anyhow!(
                    "{} objects could not be dropped",
                    report.failures.len()
                ))
            }
        }
        Err(e) => Err(e.into()),
    };
    finish(session, outcome).await
}

async fn check(config: &ResolvedConfig) -> anyhow::Result<()> {
    info!("Testing database connections...");
    let session = open_session(config).await?;
    println!("Connection to source {} successful", config.source.config);
    println!("Connection to sandbox {} successful", config.sandbox.config);
    finish(session, Ok(())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "dbsandbox",
            "-vv",
            "run",
            "--tables",
            "orders,customers",
            "--sql",
            "SELECT 1",
            "--post-sql",
            "SET @x = 0",
        ])
        .unwrap();

        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.config, PathBuf::from("dbsandbox.json"));
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.tables.tables, vec!["orders", "customers"]);
        assert_eq!(args.sql, "SELECT 1");
        assert_eq!(args.pre_sql, None);
        assert_eq!(args.post_sql.as_deref(), Some("SET @x = 0"));
        assert!(!args.json_summary);
    }

    #[test]
    fn test_tables_are_required() {
        assert!(Cli::try_parse_from(["dbsandbox", "shell"]).is_err());
        assert!(Cli::try_parse_from(["dbsandbox", "ddl", "--tables", "orders"]).is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dbsandbox",
            "wipe",
            "--quiet",
            "--config",
            "other.json",
        ])
        .unwrap();
        assert!(cli.global.quiet);
        assert_eq!(cli.global.config, PathBuf::from("other.json"));
        assert!(matches!(cli.command, Command::Wipe));
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(&dir.path().join("absent.json"), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_resolves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbsandbox.json");
        std::fs::write(
            &path,
            r#"{
                "source": {"url": "mysql://reader:pw@prod/shop"},
                "sandbox": {"url": "mysql://root:pw@localhost/shop_sandbox", "read_only": false}
            }"#,
        )
        .unwrap();

        let config = load_config(&path, false).unwrap();
        assert!(config.source.config.read_only);
        assert!(!config.sandbox.config.read_only);
        assert_eq!(config.sandbox.credentials.username(), "root");
    }
}
