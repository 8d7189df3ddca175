use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

use lsb_stego::{
    cli::{Cli, Commands},
    config::Settings,
    handler::{handle_capacity, handle_compare, handle_hide, handle_recover},
};

/// 初始化日志：`-v` 提升到 debug，`-vv` 提升到 trace，否则使用配置文件中的级别。
fn init_logger(verbose: u8, configured: LevelFilter) {
    let level = match verbose {
        0 => configured,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .filter_level(level)
        .init();
}

/// 程序的主入口点
///
/// 负责解析命令行参数和配置文件，并根据指定的子命令
/// 将执行分派到相应的处理函数
fn main() -> anyhow::Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();
    let settings = Settings::load_or_default(cli.config.as_deref())?;
    init_logger(cli.verbose, settings.log_level()?);

    // 根据子命令调用相应的处理函数
    match cli.command {
        Commands::Hide(args) => handle_hide(args, &settings),
        Commands::Recover(args) => handle_recover(args, &settings),
        Commands::Capacity(args) => handle_capacity(args, &settings),
        Commands::Compare(args) => handle_compare(args),
    }
}
