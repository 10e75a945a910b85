mod cli;
mod demo;

use std::io::{self, Read};

use anyhow::{bail, Result};
use is_terminal::IsTerminal;
use tracing::{debug, Level};

use plotgpt::{
    config::Config,
    execution::ScriptRunner,
    extract::{Delimiters, Extractor},
    llm::{ChatOptions, LlmClient},
    pipeline::{Pipeline, DEFAULT_MAX_RETRY},
    printer,
    utils::{read_questions, split_questions},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let max_level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cfg = Config::load();
    debug!(config = %cfg.config_path.display(), "configuration loaded");

    let questions = collect_questions(&args)?;
    if questions.is_empty() {
        bail!("Provide a question, --file, --demo or pipe questions via stdin");
    }

    let client = LlmClient::from_config(&cfg)?;

    // CLI overrides config; fall back to DEFAULT_MODEL
    let model = args
        .model
        .clone()
        .or_else(|| cfg.get("DEFAULT_MODEL"))
        .unwrap_or_else(|| "gpt-4o-2024-08-06".to_string());
    let opts = ChatOptions {
        model,
        temperature: args.temperature,
        top_p: args.top_p,
        max_tokens: args.max_tokens,
    };

    let delimiters = match args.anchor.clone().or_else(|| cfg.get("EXTRACT_ANCHOR")) {
        Some(anchor) => Delimiters::anchor(anchor),
        None => Delimiters::default(),
    };
    let extractor = Extractor::new(delimiters)?;

    let mut runner = ScriptRunner::from_config(&cfg);
    args.apply_to_runner(&mut runner);

    let max_retry = args
        .max_retry
        .or_else(|| cfg.get_usize("MAX_RETRY"))
        .unwrap_or(DEFAULT_MAX_RETRY);

    let pipeline = Pipeline::new(client, opts, extractor, runner).with_max_retry(max_retry);
    let summary = pipeline.run_batch(&questions, args.image.as_deref()).await;
    printer::print_summary(&summary);
    Ok(())
}

fn collect_questions(args: &cli::Cli) -> Result<Vec<String>> {
    if args.demo {
        return Ok(demo::questions(args.image.is_some()));
    }
    let mut questions = Vec::new();
    if let Some(path) = &args.file {
        questions.extend(read_questions(path)?);
    }
    questions.extend(args.questions.iter().map(|q| q.trim().to_string()).filter(|q| !q.is_empty()));

    if questions.is_empty() && !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        questions = split_questions(&buf);
    }
    Ok(questions)
}
