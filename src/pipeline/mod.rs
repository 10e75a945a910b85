//! Generate, extract, execute: one question at a time.
//!
//! Per question: build the request (describing the image first if there is
//! one), ask the service for a script, extract it with a bounded number of
//! retries, write it to the runner's fixed path and execute it. Extraction
//! exhaustion skips the question; errors before execution are returned to the
//! caller.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    execution::{ExecutionOutcome, ScriptRunner},
    extract::Extractor,
    llm::{ChatMessage, ChatOptions, CompletionService},
    printer, prompt,
    utils::encode_image_data_url,
};

pub const DEFAULT_MAX_RETRY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Executed(ExecutionOutcome),
    /// No code block found in any of `attempts` replies.
    Skipped { attempts: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub code: Option<String>,
    pub attempts: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub timed_out: usize,
    /// Non-zero exits and scripts that could not be started.
    pub failed: usize,
    pub skipped: usize,
    /// Questions aborted by an error before execution.
    pub errors: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Executed(ExecutionOutcome::Success { .. }) => self.succeeded += 1,
            Outcome::Executed(ExecutionOutcome::Timeout { .. }) => self.timed_out += 1,
            Outcome::Executed(ExecutionOutcome::Failed { .. } | ExecutionOutcome::Error { .. }) => {
                self.failed += 1
            }
            Outcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.timed_out + self.failed + self.skipped + self.errors
    }
}

pub struct Pipeline<S> {
    service: S,
    opts: ChatOptions,
    extractor: Extractor,
    runner: ScriptRunner,
    max_retry: usize,
}

impl<S: CompletionService> Pipeline<S> {
    pub fn new(service: S, opts: ChatOptions, extractor: Extractor, runner: ScriptRunner) -> Self {
        Self { service, opts, extractor, runner, max_retry: DEFAULT_MAX_RETRY }
    }

    /// Additional attempts after the first failed extraction.
    pub fn with_max_retry(mut self, max_retry: usize) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    /// Summarize an image (as data URL) with a preliminary request.
    pub async fn describe_image(&self, image_url: &str) -> Result<String> {
        let request = prompt::describe_image_request(image_url);
        let reply = self.service.complete(&request, &self.opts).await?;
        Ok(reply.trim().to_string())
    }

    pub async fn build_request(&self, question: &str, image: Option<&Path>) -> Result<Vec<ChatMessage>> {
        let Some(image) = image else {
            return Ok(prompt::visualize_request(question));
        };
        let image_url = encode_image_data_url(image)?;
        let description = self.describe_image(&image_url).await?;
        printer::print_image_description(&description);
        Ok(prompt::visualize_with_image_request(question, &description, &image_url))
    }

    /// Resend `request` until a code block is extracted, at most
    /// `max_retry + 1` calls. The last attempt's result is returned.
    pub async fn generate_code(&self, request: &[ChatMessage]) -> Result<Generation> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!(attempt = attempts, "requesting code");
            let reply = self.service.complete(request, &self.opts).await?;
            let code = self.extractor.extract(&reply);
            if code.is_some() {
                return Ok(Generation { code, attempts });
            }
            let left = (self.max_retry + 1).saturating_sub(attempts);
            if left == 0 {
                warn!(attempts, "Max retries exceeded. Could not extract code.");
                return Ok(Generation { code: None, attempts });
            }
            info!("Code extraction failed. Retrying... ({} retries left)", left);
        }
    }

    pub async fn process_question(&self, question: &str, image: Option<&Path>) -> Result<Outcome> {
        let request = self.build_request(question, image).await?;
        let generation = self.generate_code(&request).await?;
        let Some(code) = generation.code else {
            return Ok(Outcome::Skipped { attempts: generation.attempts });
        };
        let script = self.runner.write_script(&code)?;
        debug!(script = %script.display(), "script written");
        Ok(Outcome::Executed(self.runner.run(&script).await))
    }

    /// Process questions sequentially, printing each outcome. An error on one
    /// question is printed and the batch moves on.
    pub async fn run_batch<Q: AsRef<str>>(&self, questions: &[Q], image: Option<&Path>) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for question in questions {
            let question = question.as_ref();
            match self.process_question(question, image).await {
                Ok(outcome) => {
                    printer::print_outcome(question, &outcome);
                    summary.record(&outcome);
                }
                Err(e) => {
                    printer::print_error(question, &e);
                    summary.errors += 1;
                }
            }
        }
        summary
    }
}
