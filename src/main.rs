use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use bucket_backup::{
    logging, server, AppState, BackupConfig, BackupRunner, BackupWorkspace,
};
use clap::{ArgGroup, Parser};
use tracing::{error, info};

/// 对象存储空间增量备份
#[derive(Debug, Parser)]
#[command(name = "bucket-backup", version, about)]
#[command(group(ArgGroup::new("action").required(true).args(["port", "put", "backup"])))]
struct Cli {
    /// 配置文件路径（JSON，或 .toml）
    #[arg(short = 'c', long = "conf", value_name = "PATH")]
    conf: PathBuf,

    /// 启动控制面 HTTP 服务
    #[arg(short = 's', long = "serve", value_name = "PORT")]
    port: Option<u16>,

    /// 入队一个 key
    #[arg(short = 'p', long = "put", value_name = "KEY")]
    put: Option<String>,

    /// 执行一次备份并等待结束
    #[arg(short = 'b', long = "backup")]
    backup: bool,

    /// 输出 debug 日志
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match BackupConfig::load_from_file(&cli.conf) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to init: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // 必须保持 _log_guard 存活
    let _log_guard = logging::init_logging(&config.log, cli.verbose);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: BackupConfig) -> anyhow::Result<()> {
    info!("Bucket Backup v{} 启动中...", env!("CARGO_PKG_VERSION"));
    info!("配置: {}", config.summary());

    let workspace = BackupWorkspace::init(&config).context("Failed to init")?;

    if let Some(key) = cli.put {
        let task_id = workspace
            .keys
            .put(&key)
            .with_context(|| format!("Error with the key : {}", key))?;
        info!("Success with the key : {} ({})", key, task_id);
        return Ok(());
    }

    let runner = Arc::new(BackupRunner::from_config(&config, &workspace).context("Failed to init")?);

    if cli.backup {
        match runner.start_backup() {
            Ok(handle) => match handle.await {
                Ok(Ok(report)) => info!(
                    "备份结束 [{}]: 新任务 {} 成功 / {} 失败, 重做 {} 成功 / {} 失败",
                    report.run_id,
                    report.new_succeeded,
                    report.new_failed,
                    report.redo_succeeded,
                    report.redo_failed
                ),
                Ok(Err(e)) => error!("备份失败: {}", e),
                Err(e) => error!("备份任务异常退出: {}", e),
            },
            Err(e) => error!("Error starting backup: {}", e),
        }
        return Ok(());
    }

    if let Some(port) = cli.port {
        let state = AppState::new(&config, &workspace, runner);
        server::serve(state, port).await?;
    }

    Ok(())
}
