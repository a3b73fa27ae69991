use clap::Parser;

mod cmd;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = cmd::Cli::parse();
    cli.command.run()
}
