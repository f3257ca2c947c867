/// MySQL binlog 파서 실행 파일
///
/// binlog 파일 하나, 또는 binlog 인덱스에 있는 파일들을 JSON 메시지로 변환합니다.
use binlog_parser::config::{BinlogFileParser, Cli, Commands};
use binlog_parser::watcher::{watch_index, IncrementalWatcher};
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화 (stdout은 메시지 출력용)
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let connection = cli.connection_config();
    info!(
        "Using MySQL {}:{} for column metadata",
        connection.hostname, connection.port
    );

    let parser = BinlogFileParser::new(connection, cli.output_config());

    match &cli.command {
        Commands::File { binlog } => {
            parser.parse(binlog).await?;
        }

        Commands::Index { index } => {
            let watcher = IncrementalWatcher::new(index, &cli.parsed_index, parser)?;
            let parsed = watcher.trigger().await?;
            info!("Parsed {} binlog files from {}", parsed, index.display());
        }

        Commands::Watch {
            index,
            ignore_connection_errors,
        } => {
            let (stop_tx, stop_rx) = oneshot::channel();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Received Ctrl-C, shutting down");
                        let _ = stop_tx.send(());
                    }
                    Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
                }
            });

            watch_index(
                index.clone(),
                &cli.parsed_index,
                parser,
                *ignore_connection_errors,
                stop_rx,
            )
            .await?;
        }
    }

    Ok(())
}
