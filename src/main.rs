use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use selfjoin_planner::config::{self, Config};
use selfjoin_planner::core::PlannerResult;
use selfjoin_planner::query::optimizer::{install_self_join_hooks, PlannerHooks};
use selfjoin_planner::query::planner::fixtures::{self, Scenario};
use selfjoin_planner::query::planner::plan::describe_plan;
use selfjoin_planner::utils::logging;

#[derive(Parser)]
#[clap(version = "0.1.0", author = "GraphDB Contributors")]
#[clap(about = "规划一次两表连接并输出自连接折叠结果与执行计划")]
struct Cli {
    /// 内置场景 a、b、c、d
    #[clap(short, long, default_value = "a")]
    scenario: String,

    /// 从 JSON 文件读取规划状态，优先于 --scenario
    #[clap(short, long)]
    input: Option<PathBuf>,

    /// 配置文件
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// 关闭自连接消除
    #[clap(long)]
    disable: bool,

    /// 只输出规划状态 JSON，不做规划
    #[clap(long)]
    dump_scenario: bool,

    /// 按配置写文件日志
    #[clap(long)]
    log: bool,
}

fn load_scenario(cli: &Cli) -> PlannerResult<Scenario> {
    match &cli.input {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Scenario::from_json(&content)
        }
        None => fixtures::scenario_by_name(&cli.scenario),
    }
}

fn run(cli: &Cli) -> PlannerResult<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.disable {
        config.selfjoin.enabled = false;
    }
    if cli.log {
        logging::init(&config)?;
    }

    let mut scenario = load_scenario(cli)?;
    if cli.dump_scenario {
        println!("{}", serde_json::to_string_pretty(&scenario)?);
        return Ok(());
    }

    let mut hooks = PlannerHooks::new();
    let installed = install_self_join_hooks(&mut hooks, config::shared(config.selfjoin.clone()));
    let plan = scenario.plan(&hooks)?;

    let report = serde_json::json!({
        "outcomes": installed.join_pathlist.take_outcomes(),
        "explain": describe_plan(&plan),
        "plan": plan,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = run(&cli);
    if cli.log {
        logging::shutdown();
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("规划失败: {}", e);
            ExitCode::FAILURE
        }
    }
}
