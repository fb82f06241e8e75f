use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod quiz;
mod semantic;
mod storage;
mod survey;
#[cfg(test)]
mod tests;
mod web;

use config::Config;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tastetwin=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_tracing();

    let base_path = config::base_path()?;
    let config = Config::load_with(&base_path)?;

    match args.command {
        cli::Command::Quiz { k, json } => cli::handle_quiz(&config, k, json),

        cli::Command::Match {
            answers,
            answers_json,
            k,
        } => cli::handle_match(&config, answers, answers_json, k),

        cli::Command::BuildCorpus { input, output } => {
            cli::handle_build_corpus(&config, input, output)
        }

        cli::Command::Corpus {} => cli::handle_corpus(&config),

        cli::Command::Daemon { listen } => {
            // blocking http clients must exist before the runtime starts
            let service = cli::open_service(&config)?;
            let addr = listen.unwrap_or_else(|| config.listen_addr.clone());
            web::start_daemon(service, &addr)
        }
    }
}
