//! Prompt templates for transcript analysis and sub-step generation.

/// Characters of transcript embedded in the analysis prompt.
pub const TRANSCRIPT_CHAR_LIMIT: usize = 30_000;

/// Number of sub-steps requested per task.
pub const SUB_STEP_COUNT: usize = 4;

/// First `limit` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn analysis_prompt(transcript: &str) -> String {
    format!(
        r#"You are an expert video analyst.
Analyze the following transcript and extract distinct "Tasks" or "Topics" discussed.
For each task, provide a timestamp (find the closest match in the text), a name, and a description.

RETURN ONLY A JSON ARRAY. NO MARKDOWN.
Format: [{{ "task_name": "...", "timestamp_seconds": 12.5, "description": "..." }}]

TRANSCRIPT:
{}"#,
        truncate_chars(transcript, TRANSCRIPT_CHAR_LIMIT)
    )
}

pub fn sub_steps_prompt(task_name: &str, context_description: &str) -> String {
    format!(
        r#"TASK: "{task_name}"
CONTEXT: "{context_description}"

INSTRUCTION: Break this task down into exactly {SUB_STEP_COUNT} clear, actionable sub-steps for a beginner.
RETURN ONLY A JSON ARRAY OF STRINGS. NO MARKDOWN.
Example: ["Step 1...", "Step 2...", "Step 3...", "Step 4..."]"#
    )
}
