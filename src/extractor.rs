//! Verification-code extraction and message normalization.
//!
//! Candidates are tried in a fixed order and the first hit wins:
//! a keyword-labelled code, then content that is nothing but a code,
//! then the first standalone four-digit number.
//!
//! All patterns use bounded repetition and the `regex` engine runs in linear
//! time, so hostile input cannot trigger pathological matching.

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

use crate::response::TIMESTAMP_FORMAT;

static LABELED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:验证码|code|校验码|verification code)[:：]?\s{0,32}([0-9A-Za-z]{4,8})")
        .expect("labeled code pattern is valid")
});

static BARE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z]{4,8}$").expect("bare code pattern is valid")
});

static FOUR_DIGIT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9]{4})\b").expect("four digit pattern is valid")
});

/// Which heuristic produced the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSource {
    Labeled,
    Bare,
    FourDigit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundCode {
    pub code: String,
    pub source: CodeSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub found_code: Option<FoundCode>,
    pub normalized_content: String,
}

/// Locate a verification code in `content`, if any.
pub fn find_code(content: &str) -> Option<FoundCode> {
    if let Some(caps) = LABELED_CODE.captures(content) {
        return Some(FoundCode {
            code: caps[1].to_string(),
            source: CodeSource::Labeled,
        });
    }

    let trimmed = content.trim();
    if BARE_CODE.is_match(trimmed) {
        return Some(FoundCode {
            code: trimmed.to_string(),
            source: CodeSource::Bare,
        });
    }

    FOUR_DIGIT_CODE.captures(content).map(|caps| FoundCode {
        code: caps[1].to_string(),
        source: CodeSource::FourDigit,
    })
}

/// Timestamp the message and, when a code is found, put it on top.
pub fn process(content: &str, now: NaiveDateTime) -> ExtractionResult {
    let stamp = now.format(TIMESTAMP_FORMAT);
    let found_code = find_code(content);

    let normalized_content = match &found_code {
        Some(found) => format!("【时间】：{stamp}\n\n【验证码】：{}\n\n{content}", found.code),
        None => format!("【时间】：{stamp}\n\n{content}"),
    };

    ExtractionResult {
        found_code,
        normalized_content,
    }
}

/// Convenience wrapper returning only the rewritten text.
pub fn extract(content: &str, now: NaiveDateTime) -> String {
    process(content, now).normalized_content
}
