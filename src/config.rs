//! 명령행 설정과 파일 단위 파서 구성

use crate::connection::{ConnectionConfig, MySqlConnection};
use crate::consumer::{parse_comma_list, ConsumerChain, JsonLinesSink};
use crate::error::{CdcError, Result};
use crate::processor::{process_file, ProcessStats};
use crate::watcher::FileProcessor;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{warn, Level};

/// MySQL binlog 파일을 JSON 변경 메시지로 변환
#[derive(Parser, Debug)]
#[command(name = "binlog-parser")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// MySQL host for column metadata queries
    #[arg(long, default_value = "localhost", env = "DB_HOST", global = true)]
    pub db_host: String,

    #[arg(long, default_value_t = 3306, env = "DB_PORT", global = true)]
    pub db_port: u16,

    #[arg(long, default_value = "root", env = "DB_USER", global = true)]
    pub db_user: String,

    #[arg(long, default_value = "", env = "DB_PASSWORD", global = true, hide_env_values = true)]
    pub db_password: String,

    #[arg(long, env = "DB_NAME", global = true)]
    pub db_name: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub db_timeout: u64,

    /// Directory for `<binlog name>.json` output files
    #[arg(long, default_value = "/tmp", global = true)]
    pub output_dir: PathBuf,

    /// Write messages to stdout instead of files
    #[arg(long, global = true)]
    pub stdout: bool,

    #[arg(long, global = true)]
    pub pretty_json: bool,

    /// Only emit messages for these tables (comma-separated)
    #[arg(long, default_value = "", global = true)]
    pub include_tables: String,

    /// Only emit messages for these schemas (comma-separated)
    #[arg(long, default_value = "", global = true)]
    pub include_schemas: String,

    /// Index of binlog files that were already parsed
    #[arg(long, default_value = "/tmp/parsed.index", global = true)]
    pub parsed_index: PathBuf,

    /// -v: debug, -vv: trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Parse a single binlog file
    File { binlog: PathBuf },

    /// Parse every finished binlog listed in a binlog index once
    Index { index: PathBuf },

    /// Keep parsing new binlogs as the index changes, until Ctrl-C
    Watch {
        index: PathBuf,

        /// Skip a run that can't reach MySQL instead of exiting
        #[arg(long)]
        ignore_connection_errors: bool,
    },
}

impl Cli {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            hostname: self.db_host.clone(),
            port: self.db_port,
            username: self.db_user.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone().filter(|db| !db.is_empty()),
            timeout: Duration::from_secs(self.db_timeout),
        }
    }

    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            output_dir: self.output_dir.clone(),
            stdout: self.stdout,
            pretty: self.pretty_json,
            include_tables: parse_comma_list(&self.include_tables),
            include_schemas: parse_comma_list(&self.include_schemas),
        }
    }

    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// 메시지 출력 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub stdout: bool,
    pub pretty: bool,
    pub include_tables: Vec<String>,
    pub include_schemas: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            output_dir: PathBuf::from("/tmp"),
            stdout: false,
            pretty: false,
            include_tables: Vec::new(),
            include_schemas: Vec::new(),
        }
    }
}

/// binlog 파일 하나에 대한 consumer chain 구성
///
/// 파일 출력이면 `output_dir/<binlog 파일명>.json`에 기록합니다.
pub fn build_chain(output: &OutputConfig, binlog_path: &Path) -> Result<ConsumerChain> {
    let mut chain = ConsumerChain::new();
    chain.include_tables(&output.include_tables);
    chain.include_schemas(&output.include_schemas);

    if output.stdout {
        chain.add_sink(JsonLinesSink::new(std::io::stdout(), output.pretty, "stdout"));
    } else {
        let name = binlog_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CdcError::ConfigError(format!("Invalid binlog file name: {}", binlog_path.display()))
            })?;

        chain.add_sink(JsonLinesSink::create_in_dir(
            &output.output_dir,
            &format!("{}.json", name),
            output.pretty,
        )?);
    }

    Ok(chain)
}

/// 파일마다 새 DB 연결과 출력 chain으로 binlog를 처리
#[derive(Debug, Clone)]
pub struct BinlogFileParser {
    connection: ConnectionConfig,
    output: OutputConfig,
}

impl BinlogFileParser {
    pub fn new(connection: ConnectionConfig, output: OutputConfig) -> Self {
        BinlogFileParser { connection, output }
    }

    pub async fn parse(&self, path: &Path) -> Result<ProcessStats> {
        if !path.exists() {
            return Err(CdcError::FileNotFound(path.display().to_string()));
        }

        let mut chain = build_chain(&self.output, path)?;
        let mut conn = MySqlConnection::connect(&self.connection).await?;

        let result = process_file(path, &mut conn, &mut chain).await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close MySQL connection: {}", e);
        }

        result
    }
}

impl FileProcessor for BinlogFileParser {
    async fn process(&self, path: &Path) -> Result<()> {
        self.parse(path).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::MessageConsumer;
    use crate::messages::{Message, MessageHeader, QueryMessage};

    #[test]
    fn test_parse_file_command() {
        let cli = Cli::try_parse_from([
            "binlog-parser",
            "--include-tables",
            "users, orders",
            "--db-host",
            "10.0.0.5",
            "file",
            "/var/lib/mysql/mysql-bin.000001",
            "--pretty-json",
            "-vv",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Commands::File {
                binlog: PathBuf::from("/var/lib/mysql/mysql-bin.000001")
            }
        );
        assert_eq!(cli.connection_config().hostname, "10.0.0.5");
        assert_eq!(cli.log_level(), Level::TRACE);

        let output = cli.output_config();
        assert!(output.pretty);
        assert_eq!(output.include_tables, vec!["users", "orders"]);
        assert!(output.include_schemas.is_empty());
        assert_eq!(output.output_dir, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_parse_watch_command() {
        let cli = Cli::try_parse_from([
            "binlog-parser",
            "watch",
            "/var/lib/mysql/mysql-bin.index",
            "--ignore-connection-errors",
            "--parsed-index",
            "/data/parsed.index",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Commands::Watch {
                index: PathBuf::from("/var/lib/mysql/mysql-bin.index"),
                ignore_connection_errors: true,
            }
        );
        assert_eq!(cli.parsed_index, PathBuf::from("/data/parsed.index"));
        assert_eq!(cli.log_level(), Level::INFO);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["binlog-parser"]).is_err());
    }

    #[test]
    fn test_build_chain_writes_binlog_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            output_dir: dir.path().to_path_buf(),
            include_schemas: vec!["db".to_string()],
            ..Default::default()
        };

        let mut chain = build_chain(&output, Path::new("/var/lib/mysql/mysql-bin.000042")).unwrap();
        for schema in ["db", "other"] {
            chain
                .consume(Message::Query(QueryMessage {
                    header: MessageHeader::new(schema, "", 0, 4, 0, None),
                    query: "DROP TABLE t".to_string(),
                }))
                .unwrap();
        }
        drop(chain);

        let content = std::fs::read_to_string(dir.path().join("mysql-bin.000042.json")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("\"Schema\":\"db\""));
    }

    #[tokio::test]
    async fn test_missing_binlog_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let parser = BinlogFileParser::new(
            ConnectionConfig::new("invalid.host", "root"),
            OutputConfig {
                output_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
        );

        let result = parser.process(&dir.path().join("mysql-bin.000001")).await;
        assert!(matches!(result, Err(CdcError::FileNotFound(_))));
        assert!(!dir.path().join("mysql-bin.000001.json").exists());
    }
}
