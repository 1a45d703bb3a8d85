use std::io::{stdin, stdout, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use sqlask::{logging, Cli, Deadline, Resources, TextToSqlChain};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.debug) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    cli.validate().context("validate configuration")?;
    let deadline = Deadline::after(cli.timeout);

    let resources = Resources::load(&cli).context("load resources")?;

    let processor = TextToSqlChain::initialize(&cli, resources.template.clone(), &deadline).await?;
    processor.bootstrap(&resources, &deadline).await?;

    let question = read_question().context("read question")?;
    if question.trim().is_empty() {
        info!("no question given");
        return Ok(());
    }

    let mut out = stdout();
    processor.run(&question, &deadline, &mut out).await?;

    Ok(())
}

fn read_question() -> std::io::Result<String> {
    if stdin().is_terminal() {
        print!("How can I help you?: ");
        stdout().flush()?;
    }

    let mut input = String::new();
    stdin().read_line(&mut input)?;

    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
