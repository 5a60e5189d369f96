//! Enhancement prompt construction.
//!
//! Every file gets the same instruction regardless of language, followed by
//! the file's content exactly as read.

use crate::file::SourceFile;
use std::path::PathBuf;

/// Instruction placed in front of every file's code.
pub const INSTRUCTION: &str = "\
You are an expert software engineer and architect. Improve the quality, maintainability, \
scalability, and performance of this code. Follow these guidelines:
1. Keep the code modular and well structured, following the best practices of its language.
2. Provide a clear separation of concerns between types, functions and modules.
3. Add error handling, input validation and security hardening where they are missing.
4. Remove redundant or inefficient operations.
5. Keep compatibility with current versions of the frameworks and libraries used.
6. Use clear, descriptive names for variables, functions and types.
7. Document public items where it helps readability.

Return only the improved code for this file, with no explanations.";

/// A prompt ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementRequest {
    /// Path of the source file relative to the input directory
    pub relative_path: PathBuf,

    /// Instruction followed by the verbatim code
    pub prompt: String,
}

impl EnhancementRequest {
    /// Builds the request for a source file.
    #[must_use]
    pub fn for_file(file: &SourceFile) -> Self {
        Self {
            relative_path: file.relative_path.clone(),
            prompt: build_prompt(&file.content),
        }
    }
}

/// Combines the fixed instruction with `code`.
///
/// The code is appended unchanged after a blank line.
#[must_use]
pub fn build_prompt(code: &str) -> String {
    let mut prompt = String::with_capacity(INSTRUCTION.len() + 2 + code.len());
    prompt.push_str(INSTRUCTION);
    prompt.push_str("\n\n");
    prompt.push_str(code);
    prompt
}

/// Removes one Markdown code fence wrapping the whole of a model reply.
///
/// Replies with text outside the fence, or with several fenced blocks, are
/// returned unchanged.
#[must_use]
pub fn strip_code_fence(reply: &str) -> &str {
    let Some(inner) = reply
        .trim()
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return reply;
    };

    let Some((info, code)) = inner.split_once('\n') else {
        return reply;
    };

    if info.contains('`') || code.lines().any(|line| line.trim_start().starts_with("```")) {
        return reply;
    }

    code
}
