//! Pull the first delimited code block out of free-form model output.

use anyhow::{Context, Result};
use regex::Regex;

pub const DEFAULT_LANGUAGE: &str = "python";
pub const DEFAULT_ANCHOR: &str = "import numpy as np";
pub const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delimiters {
    /// ```` ```<language> ... ``` ````
    Fenced { language: String },
    /// `<anchor> ... <closing>`; the anchor line is kept in the result.
    Anchor { anchor: String, closing: String },
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::Fenced { language: DEFAULT_LANGUAGE.to_string() }
    }
}

impl Delimiters {
    pub fn anchor(anchor: impl Into<String>) -> Self {
        Self::Anchor { anchor: anchor.into(), closing: FENCE.to_string() }
    }
}

#[derive(Debug, Clone)]
pub struct Extractor {
    delimiters: Delimiters,
    re: Regex,
}

impl Extractor {
    pub fn new(delimiters: Delimiters) -> Result<Self> {
        // case-insensitive, `.` spans newlines
        let pattern = match &delimiters {
            Delimiters::Fenced { language } => {
                format!(r"(?is){}{}(.*?){}", regex::escape(FENCE), regex::escape(language), regex::escape(FENCE))
            }
            Delimiters::Anchor { anchor, closing } => {
                format!(r"(?is){}\s*(.*?)\s*{}", regex::escape(anchor), regex::escape(closing))
            }
        };
        let re = Regex::new(&pattern)
            .with_context(|| format!("invalid extraction pattern: {}", pattern))?;
        Ok(Self { delimiters, re })
    }

    /// Trimmed code of the first matching block, or `None`.
    pub fn extract(&self, text: &str) -> Option<String> {
        let caps = self.re.captures(text)?;
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        match &self.delimiters {
            Delimiters::Fenced { .. } => Some(body.to_string()),
            Delimiters::Anchor { anchor, .. } => Some(format!("{}\n{}", anchor, body)),
        }
    }
}
