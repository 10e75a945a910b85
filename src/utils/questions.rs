//! Question files: free text, one question per block, blocks separated by a
//! line containing only `---`.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};

const SEPARATOR: &str = "---";

pub fn read_questions(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        bail!("Question file '{}' does not exist", path.display());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read question file '{}'", path.display()))?;
    Ok(split_questions(&text))
}

/// Split on separator lines; blank blocks are dropped, others are trimmed.
pub fn split_questions(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim() == SEPARATOR {
            push_block(&mut out, &mut current);
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_block(&mut out, &mut current);
    out
}

fn push_block(out: &mut Vec<String>, current: &mut String) {
    let block = current.trim();
    if !block.is_empty() {
        out.push(block.to_string());
    }
    current.clear();
}
