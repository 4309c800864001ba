//! Post-processing helpers for model output.

use regex::Regex;

/// A fenced code block extracted from model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

/// Remove `<think>...</think>` spans emitted by reasoning models.
pub fn strip_think_tags(text: &str) -> String {
    let re = Regex::new(r"(?s)<think>.*?</think>").unwrap();
    re.replace_all(text, "").to_string()
}

/// Extract fenced markdown code blocks. The first line inside the fence is
/// taken as the language tag.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let re = Regex::new(r"(?s)```(.*?)```").unwrap();
    re.captures_iter(text)
        .map(|captures| {
            let inner = captures.get(1).map_or("", |m| m.as_str());
            let mut parts = inner.splitn(2, '\n');
            let language = parts.next().unwrap_or("").trim().to_string();
            let code = parts.next().unwrap_or("").to_string();
            CodeBlock { language, code }
        })
        .collect()
}
