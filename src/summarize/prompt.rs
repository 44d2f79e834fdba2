/// Transcripts longer than this are truncated before prompting.
pub const MAX_TRANSCRIPT_CHARS: usize = 100_000;

const INSTRUCTIONS: &str = "You are an assistant that writes meeting minutes from a raw \
transcript. Write the minutes in plain text using exactly these sections:

1. Summary: two to four sentences.
2. Discussion Points: bullet list.
3. Decisions: bullet list, or \"None recorded\".
4. Action Items: bullet list of \"owner - task - due date\" when known.

Do not invent facts that are not in the transcript.";

/// Build the minutes prompt for a transcript.
pub fn minutes_prompt(transcript: &str) -> String {
    let transcript = truncate_chars(transcript.trim(), MAX_TRANSCRIPT_CHARS);
    format!(
        "{}\n\n<transcript>\n{}\n</transcript>",
        INSTRUCTIONS, transcript
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
