use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use rucontract::config::{ConfigLoader, HarnessConfig, Overrides};
use rucontract::http::Client;
use rucontract::runner::{ContractReporter, ContractRunner, scenario_table};
use rucontract::scenario::{Scenario, ScenarioLoader, catalog, select, validate_all};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser, Debug)]
#[command(
    name = "rucontract",
    author,
    version,
    about = "Contract tests for an HTTP user API",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// 不带子命令时等同于 `run`
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 运行契约场景（默认）
    Run(RunArgs),
    /// 列出将要运行的场景
    List(ListArgs),
}

/// 场景来源与过滤
#[derive(Args, Debug, Clone, Default)]
pub struct SelectArgs {
    /// 只保留名称包含该字符串的场景（可重复，忽略大小写）
    #[arg(short, long = "scenario", value_name = "FILTER")]
    pub scenarios: Vec<String>,

    /// 从 TOML 文件加载额外场景（可重复）
    #[arg(short, long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// 不加载内置的用户 API 场景
    #[arg(long)]
    pub no_builtin: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// 被测服务的基础 URL，例如 http://localhost:4000/api 或 :4000/api
    #[arg(short, long, value_name = "URL")]
    pub base_url: Option<String>,

    /// 使用配置文件中的环境
    #[arg(short, long, value_name = "NAME")]
    pub env: Option<String>,

    /// 配置文件路径（默认自动查找 rucontract.toml）
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 单个请求的超时时间（秒）
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// 并行运行互不依赖的场景
    #[arg(short, long)]
    pub parallel: bool,

    /// 并行模式下同时运行的场景数
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// 显示每个步骤、断言和响应
    #[arg(short, long)]
    pub verbose: bool,

    /// 输出格式
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// 配置文件路径，其中的 scenario_files 也会被列出
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 使用配置文件中的环境
    #[arg(short, long, value_name = "NAME")]
    pub env: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Cli {
    /// 执行命令，返回所有场景是否通过
    pub async fn execute(self) -> Result<bool> {
        match self.command {
            Some(Commands::Run(args)) => run(args).await,
            Some(Commands::List(args)) => list(args).map(|_| true),
            None => run(self.run).await,
        }
    }
}

async fn run(args: RunArgs) -> Result<bool> {
    let config = load_config(args.config.as_ref())?;
    let overrides = Overrides {
        base_url: args.base_url.clone(),
        timeout_secs: args.timeout,
        concurrency: args.concurrency,
    };
    let resolved = ConfigLoader::resolve(&config, args.env.as_deref(), &overrides)?;
    let scenarios = load_scenarios(&args.select, &resolved.scenario_files)?;

    let client = Client::new(resolved.timeout)?;
    let runner = ContractRunner::new(client).with_default_headers(resolved.headers);
    let reporter = ContractReporter::new(args.verbose);
    let base_url = resolved.base_url;

    info!(
        base_url = %base_url,
        scenarios = scenarios.len(),
        parallel = args.parallel,
        "starting contract run"
    );

    if args.format == OutputFormat::Text {
        reporter.print_header(&base_url.to_string(), scenarios.len());
    }

    let suite = if args.parallel {
        runner
            .run_suite_parallel(&scenarios, &base_url, resolved.concurrency)
            .await
    } else {
        runner.run_suite(&scenarios, &base_url).await
    };

    match args.format {
        OutputFormat::Text => reporter.print_suite(&suite),
        OutputFormat::Json => reporter.print_json(&suite)?,
    }

    Ok(suite.success())
}

fn list(args: ListArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let resolved = ConfigLoader::resolve(&config, args.env.as_deref(), &Overrides::default())?;
    let scenarios = load_scenarios(&args.select, &resolved.scenario_files)?;

    println!("{}", scenario_table(&scenarios));
    println!("{} scenario(s)", scenarios.len());
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<HarnessConfig> {
    match path {
        Some(path) => ConfigLoader::load_from_path(path)
            .with_context(|| format!("cannot use config file {}", path.display())),
        None => Ok(ConfigLoader::find_and_load()?.unwrap_or_default()),
    }
}

/// 内置场景、配置文件中的场景文件、命令行 `--file` 依次合并后过滤
fn load_scenarios(args: &SelectArgs, config_files: &[PathBuf]) -> Result<Vec<Scenario>> {
    let mut scenarios = if args.no_builtin {
        Vec::new()
    } else {
        catalog::user_api().context("built-in scenarios are invalid")?
    };
    scenarios.extend(ScenarioLoader::load_all(config_files)?);
    scenarios.extend(ScenarioLoader::load_all(&args.files)?);

    // 不同来源之间也不允许重名
    validate_all(&scenarios)?;

    let selected = select(scenarios, &args.scenarios)?;
    if selected.is_empty() {
        bail!("no scenarios to run (use --file to load scenarios when --no-builtin is set)");
    }
    Ok(selected)
}
