use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use xmlshred::db::{migrate, Db};
use xmlshred::ingest::{discover_files, ingest_file, IngestOptions};
use xmlshred::{query, registry, Config, IngestError, QueryError, XmlShredError};

#[derive(Parser, Debug)]
#[command(name = "xmlshred")]
#[command(about = "Shred XML documents into SQLite and query their structure")]
struct Cli {
    /// Database file (overrides store.db_path from config.toml)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema if it does not exist
    Init,
    /// Check schema objects, pragmas and database integrity
    Verify,
    /// Ingest XML files; each file is stored under its file name
    Ingest {
        /// Files to ingest
        paths: Vec<PathBuf>,
        /// Also ingest every .xml file below this directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Count elements with a given tag name in a file
    Count {
        #[command(flatten)]
        target: Target,
        /// Treat a count of zero as "not found"
        #[arg(long)]
        require_match: bool,
        #[arg(long)]
        json: bool,
    },
    /// List distinct attribute names used by a tag in a file
    Attributes {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        json: bool,
    },
    /// List stored files
    Files {
        #[arg(long)]
        json: bool,
    },
    /// Delete a stored file with all of its tags and attributes
    Delete { name: String },
}

#[derive(Args, Debug)]
struct Target {
    /// Stored file name, e.g. catalog.xml
    #[arg(long = "file", default_value = "")]
    file_name: String,
    /// Tag name (case-sensitive)
    #[arg(long = "tag", default_value = "")]
    tag_name: String,
}

#[derive(Serialize)]
struct CountResponse<'a> {
    filename: &'a str,
    tag_name: &'a str,
    count: u64,
}

#[derive(Serialize)]
struct AttributesResponse<'a> {
    filename: &'a str,
    tag_name: &'a str,
    attributes: &'a [String],
}

/// Process exit codes for the tagged core errors
mod exit {
    pub const FAILURE: u8 = 1;
    pub const INVALID_INPUT: u8 = 2;
    pub const DUPLICATE: u8 = 3;
    pub const NOT_FOUND: u8 = 4;
    pub const PARSE: u8 = 5;
}

fn ingest_exit_code(err: &IngestError) -> u8 {
    match err {
        IngestError::InvalidInput(_) => exit::INVALID_INPUT,
        IngestError::DuplicateFile(_) => exit::DUPLICATE,
        IngestError::Parse(_) => exit::PARSE,
        IngestError::Storage(_) | IngestError::Rollback { .. } => exit::FAILURE,
    }
}

fn query_exit_code(err: &QueryError) -> u8 {
    match err {
        QueryError::MissingParameters(_) => exit::INVALID_INPUT,
        QueryError::FileNotFound(_) => exit::NOT_FOUND,
        QueryError::Storage(_) => exit::FAILURE,
    }
}

fn exit_code(err: &XmlShredError) -> u8 {
    match err {
        XmlShredError::Ingest(e) => ingest_exit_code(e),
        XmlShredError::Query(e) => query_exit_code(e),
        _ => exit::FAILURE,
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(db_path) = cli.db.clone() {
        config.store.db_path = db_path;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.store.log_level),
    )
    .init();

    log::debug!("Database path: {}", config.db_path().display());

    let db = Db::new(config.db_path()).with_busy_timeout(config.busy_timeout());
    db.with_connection(|conn| migrate::run_migrations(conn)).await?;

    let code = match cli.command {
        Command::Init => {
            log::info!("Schema ready at {}", config.db_path().display());
            0
        }
        Command::Verify => {
            db.with_connection(|conn| migrate::verify_schema(conn)).await?;
            0
        }
        Command::Ingest { paths, dir } => run_ingest(&db, &config, paths, dir).await?,
        Command::Count {
            target,
            require_match,
            json,
        } => run_count(&db, &target, require_match, json).await?,
        Command::Attributes { target, json } => run_attributes(&db, &target, json).await?,
        Command::Files { json } => {
            let files = registry::files(&db).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in &files {
                    println!("{:>6}  {:<40} {:>8} tags", file.id, file.name, file.tag_count);
                }
            }
            0
        }
        Command::Delete { name } => {
            if registry::remove_file(&db, &name).await? {
                log::info!("Deleted '{}'", name);
                0
            } else {
                eprintln!("File '{}' not found", name);
                exit::NOT_FOUND
            }
        }
    };

    Ok(ExitCode::from(code))
}

/// Ingest every file, continuing past failures. The exit code is the first
/// failure's code.
async fn run_ingest(db: &Db, config: &Config, mut paths: Vec<PathBuf>, dir: Option<PathBuf>) -> Result<u8> {
    if let Some(dir) = dir {
        paths.extend(discover_files(&dir)?);
    }
    if paths.is_empty() {
        log::warn!("No files to ingest");
        return Ok(exit::INVALID_INPUT);
    }

    let total = paths.len();
    let mut failed = 0usize;
    let mut first_code = 0u8;

    for (idx, path) in paths.iter().enumerate() {
        log::info!("[{}/{}] Processing: {}", idx + 1, total, path.display());
        match ingest_file(db, path, IngestOptions::from(config.ingest.clone())).await {
            Ok(file_id) => log::info!("✓ {} (file id {})", path.display(), file_id),
            Err(e) => {
                failed += 1;
                if first_code == 0 {
                    first_code = exit_code(&e);
                }
                log::error!("✗ {}: {}", path.display(), e);
            }
        }
    }

    log::info!("=== Ingestion Complete ===");
    log::info!("Files processed: {} (success: {}, errors: {})", total, total - failed, failed);
    Ok(first_code)
}

async fn run_count(db: &Db, target: &Target, require_match: bool, json: bool) -> Result<u8> {
    let count = match query::count_tag(db, &target.file_name, &target.tag_name).await {
        Ok(count) => count,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(query_exit_code(&e));
        }
    };

    // Zero matches is a valid answer from the store; only this adapter may
    // choose to present it as "not found".
    if count == 0 && require_match {
        eprintln!("No '{}' tags in '{}'", target.tag_name, target.file_name);
        return Ok(exit::NOT_FOUND);
    }

    if json {
        let response = CountResponse {
            filename: &target.file_name,
            tag_name: &target.tag_name,
            count,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{}", count);
    }
    Ok(0)
}

async fn run_attributes(db: &Db, target: &Target, json: bool) -> Result<u8> {
    let attributes = match query::list_attribute_names(db, &target.file_name, &target.tag_name).await {
        Ok(names) => names,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(query_exit_code(&e));
        }
    };

    if json {
        let response = AttributesResponse {
            filename: &target.file_name,
            tag_name: &target.tag_name,
            attributes: &attributes,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        for name in &attributes {
            println!("{}", name);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ingest_exit_code(&IngestError::DuplicateFile("a.xml".into())), exit::DUPLICATE);
        assert_eq!(ingest_exit_code(&IngestError::Parse("x".into())), exit::PARSE);
        assert_eq!(query_exit_code(&QueryError::FileNotFound("a.xml".into())), exit::NOT_FOUND);
        assert_eq!(
            exit_code(&XmlShredError::Query(QueryError::MissingParameters("x".into()))),
            exit::INVALID_INPUT
        );
        assert_eq!(exit_code(&XmlShredError::Config("x".into())), exit::FAILURE);
    }

    #[test]
    fn test_cli_parses_count() {
        let cli = Cli::try_parse_from([
            "xmlshred", "--db", "x.db", "count", "--file", "t.xml", "--tag", "a", "--json",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        match cli.command {
            Command::Count { target, json, require_match } => {
                assert_eq!(target.file_name, "t.xml");
                assert_eq!(target.tag_name, "a");
                assert!(json);
                assert!(!require_match);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_count_response_shape() {
        let response = CountResponse {
            filename: "t.xml",
            tag_name: "a",
            count: 2,
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"filename":"t.xml","tag_name":"a","count":2}"#
        );
    }
}
