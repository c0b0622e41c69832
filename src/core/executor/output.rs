use anyhow::{Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Structured result an AI CLI is asked to emit as its final output.
/// Missing fields default to empty; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedOutput {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub modified_files: Vec<String>,
    #[serde(default)]
    pub created_files: Vec<String>,
    #[serde(default)]
    pub deleted_files: Vec<String>,
}

fn json_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // (?s) so a block may span lines; non-greedy so each block matches
    // separately and the last one can be picked out.
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*?\}").expect("valid json block pattern"))
}

/// Extract a [`ParsedOutput`] from raw process output.
///
/// Tolerant of surrounding prose: if the whole text is not valid JSON, the
/// last brace-delimited block wins (a CLI may print diagnostic JSON before its
/// final result). A block that fails to parse verbatim is retried once on the
/// slice between its first `{` and last `}`. Anything beyond that is an error,
/// with no partial result.
pub fn parse_output(output: &str) -> Result<ParsedOutput> {
    // 1. The entire output may already be a single JSON document.
    if let Ok(result) = serde_json::from_str::<ParsedOutput>(output) {
        return Ok(result);
    }

    // 2. Fall back to scanning for brace-delimited blocks.
    let last_match = json_block_pattern()
        .find_iter(output)
        .last()
        .ok_or_else(|| anyhow!("no JSON block found in output"))?;
    let block = last_match.as_str();

    match serde_json::from_str::<ParsedOutput>(block) {
        Ok(result) => Ok(result),
        Err(e) => {
            // 3. Trim to the outermost braces of the block and retry once.
            if let (Some(start), Some(end)) = (block.find('{'), block.rfind('}'))
                && end > start
                && let Ok(result) = serde_json::from_str::<ParsedOutput>(&block[start..=end])
            {
                return Ok(result);
            }
            Err(anyhow!("failed to parse extracted JSON: {}", e))
        }
    }
}
