use clap::Parser;
use tracing::debug;

use wasm_skill_loader::cli::{init_tracing, InjectCli};
use wasm_skill_loader::config::LoaderConfig;
use wasm_skill_loader::loader::{inject, Console};

#[tokio::main]
async fn main() {
    let cli = InjectCli::parse();
    init_tracing(cli.common.verbose);

    let mut config = LoaderConfig::load();
    cli.common.apply_to(&mut config);
    debug!("config: {config:?}");

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let mut console = Console::new(&mut stdout, &mut stderr);

    let code = inject::run(&cli.args(), &config, &mut console).await;
    std::process::exit(code);
}
