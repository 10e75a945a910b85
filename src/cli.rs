use std::{path::PathBuf, time::Duration};

use clap::{ArgGroup, Parser};
use plotgpt::execution::ScriptRunner;

#[derive(Parser, Debug, Clone)]
#[command(name = "plotgpt", about = "Generate and run Plotly visualizations for graphics questions", version)]
#[command(group(ArgGroup::new("source").args(["file", "demo"]).multiple(false)))]
pub struct Cli {
    /// Questions to visualize. Read from stdin when omitted and stdin is piped.
    #[arg(value_name = "QUESTION")]
    pub questions: Vec<String>,

    /// Read questions from a file; separate questions with a line containing only `---`.
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Run the built-in sample questions.
    #[arg(long)]
    pub demo: bool,

    /// Image sent along with every question (described first, then attached).
    #[arg(short = 'i', long)]
    pub image: Option<PathBuf>,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated output.
    #[arg(long, default_value_t = 1.0, value_parser = clap::value_parser!(f32))]
    pub temperature: f32,

    /// Limits highest probable tokens (words).
    #[arg(long = "top-p", default_value_t = 1.0, value_parser = clap::value_parser!(f32))]
    pub top_p: f32,

    /// Maximum tokens per completion.
    #[arg(long = "max-tokens")]
    pub max_tokens: Option<u32>,

    /// Extra requests after a reply without a code block.
    #[arg(long = "max-retry")]
    pub max_retry: Option<usize>,

    /// Seconds a generated script may run before it is killed.
    #[arg(short = 't', long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Interpreter used to run generated scripts. Replaces the configured
    /// INTERPRETER_ARGS unless --interpreter-arg is given.
    #[arg(long)]
    pub interpreter: Option<PathBuf>,

    /// Argument passed to the interpreter before the script path. Repeatable.
    #[arg(long = "interpreter-arg", value_name = "ARG", action = clap::ArgAction::Append, allow_hyphen_values = true)]
    pub interpreter_args: Vec<String>,

    /// Directory holding the script and the HTML files it writes.
    #[arg(long = "work-dir")]
    pub work_dir: Option<PathBuf>,

    /// Extract code starting at this text instead of a ```python fence.
    #[arg(long)]
    pub anchor: Option<String>,

    /// Verbose logging on stderr.
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Apply execution flags on top of the configured runner.
    pub fn apply_to_runner(&self, runner: &mut ScriptRunner) {
        if let Some(interpreter) = &self.interpreter {
            runner.interpreter = interpreter.clone();
            runner.interpreter_args = self.interpreter_args.clone();
        } else if !self.interpreter_args.is_empty() {
            runner.interpreter_args = self.interpreter_args.clone();
        }
        if let Some(dir) = &self.work_dir {
            runner.work_dir = dir.clone();
        }
        if let Some(secs) = self.timeout {
            runner.timeout = Duration::from_secs(secs);
        }
    }
}
