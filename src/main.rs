mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use colored::Colorize;

/// 所有场景通过
const EXIT_PASSED: u8 = 0;
/// 至少一个场景失败
const EXIT_FAILED: u8 = 1;
/// 参数或配置错误，没有运行任何场景
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // 报告写到 stdout，日志默认只输出警告
    rucontract::logger::init_logger("warn");

    // 参数错误时 clap 自行以退出码 2 结束
    let cli = Cli::parse();
    match cli.execute().await {
        Ok(true) => ExitCode::from(EXIT_PASSED),
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}
