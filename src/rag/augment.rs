//! Prompt assembly for one retrieval-augmented turn.
//!
//! The retrieved records are rendered into a text block that is appended to
//! the newest user message. Earlier turns are passed through untouched.

use crate::models::chat::Message;
use crate::models::retrieval::RetrievedRecord;

pub const RETRIEVAL_HEADER: &str = "Returned results from vector db (done automatically):";

/// Renders `records` in the order given, one entry per record.
pub fn render_retrieval_block(records: &[RetrievedRecord]) -> String {
    let mut block = format!("\n\n{}", RETRIEVAL_HEADER);
    for record in records {
        block.push_str(
            &format!(
                "\n\nProfessor: {}\nCourse: {}\nRating: {}\nComment: {}\n",
                record.identifier,
                record.course,
                record.rating_display(),
                record.review
            )
        );
    }
    block
}

pub fn augment_query(query: &str, records: &[RetrievedRecord]) -> String {
    let mut text = String::with_capacity(query.len() + 128 * records.len());
    text.push_str(query);
    text.push_str(&render_retrieval_block(records));
    text
}

/// System persona, then every message but the last, then the last message's
/// text with the retrieval block appended, sent as a user turn.
///
/// Returns `None` for an empty history.
pub fn build_prompt(
    system_prompt: &str,
    history: &[Message],
    records: &[RetrievedRecord]
) -> Option<Vec<Message>> {
    let (last, earlier) = history.split_last()?;
    let mut prompt = Vec::with_capacity(history.len() + 1);
    prompt.push(Message::system(system_prompt));
    prompt.extend(earlier.iter().cloned());
    prompt.push(Message::user(augment_query(&last.content, records)));
    Some(prompt)
}
