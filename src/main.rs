use clap::Parser;
use loopsim::Opts;
use loopsim::cli::SubCommandExtend;
use loopsim::config::SubCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Similarity(config) => config.run(&opts).await,
        SubCommand::Candidates(config) => config.run(&opts).await,
        SubCommand::Best(config) => config.run(&opts).await,
        SubCommand::Eval(config) => config.run(&opts).await,
        SubCommand::Loops(config) => config.run(&opts).await,
    }
}
