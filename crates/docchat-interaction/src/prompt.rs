//! Deterministic prompt assembly.
//!
//! Builds the exact `generateContent` request for a session turn. The
//! backend holds no server-side conversation memory, so the grounding
//! material (inline payload or embedded document text) is replayed on every
//! call, followed by a synthesized model acknowledgment, the verbatim prior
//! transcript, and the new question.
//!
//! Given identical inputs the output is byte-identical: no randomness, no
//! timestamps, no I/O.

use crate::gemini::{Content, GenerateContentRequest, InlineData, Part, role_name};
use docchat_core::content::{ContentBody, ContentDescriptor};
use docchat_core::conversation::{Turn, TurnPart};

/// Fixed instruction framing the assistant as an analyst restricted to the
/// supplied binary document.
const INLINE_INSTRUCTION: &str = "You are an expert at analyzing documents. The user has provided \
     a document. Answer their questions based only on the content of this document. Be precise \
     and helpful.";

/// Trailing question framing for the single-shot inline shape.
const INLINE_QUESTION_PREFIX: &str =
    "Based on the document provided, answer the following question: ";

/// Question framing for the single-shot text-grounded shape.
const TEXT_QUESTION_PREFIX: &str = "Now, answer this question: ";

/// Synthesized acknowledgment replayed in place of a remembered model turn.
const MODEL_ACKNOWLEDGMENT: &str =
    "I have analyzed the document and will answer questions based only on its contents.";

/// Builds the request payload for the next turn.
///
/// `prior_turns` is the transcript so far, excluding the locally
/// synthesized greeting and the question being asked now. With no prior
/// turns this produces the single-shot shape: one user turn carrying the
/// grounding material and the question. With prior turns it produces the
/// continuation shape: grounding turn, acknowledgment turn, prior
/// transcript, new user turn.
pub fn assemble(
    descriptor: &ContentDescriptor,
    prior_turns: &[Turn],
    current_input: &str,
) -> GenerateContentRequest {
    if prior_turns.is_empty() {
        return GenerateContentRequest {
            contents: vec![single_shot_turn(descriptor, current_input)],
        };
    }

    let mut contents = Vec::with_capacity(prior_turns.len() + 3);
    contents.push(grounding_turn(descriptor));
    contents.push(Content {
        role: "model".to_string(),
        parts: vec![Part::Text {
            text: MODEL_ACKNOWLEDGMENT.to_string(),
        }],
    });
    contents.extend(prior_turns.iter().map(wire_turn));
    contents.push(Content {
        role: "user".to_string(),
        parts: vec![Part::Text {
            text: current_input.to_string(),
        }],
    });

    GenerateContentRequest { contents }
}

/// The grounding turn plus the question, as one user turn.
fn single_shot_turn(descriptor: &ContentDescriptor, current_input: &str) -> Content {
    match &descriptor.body {
        ContentBody::Inline { media_type, data } => Content {
            role: "user".to_string(),
            parts: vec![
                Part::Text {
                    text: INLINE_INSTRUCTION.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: media_type.clone(),
                        data: data.clone(),
                    },
                },
                Part::Text {
                    text: format!("{INLINE_QUESTION_PREFIX}{current_input}"),
                },
            ],
        },
        ContentBody::Text(document) => Content {
            role: "user".to_string(),
            parts: vec![Part::Text {
                text: format!(
                    "{}{TEXT_QUESTION_PREFIX}{current_input}",
                    text_grounding(document)
                ),
            }],
        },
    }
}

/// The grounding turn alone, for the continuation shape.
fn grounding_turn(descriptor: &ContentDescriptor) -> Content {
    match &descriptor.body {
        ContentBody::Inline { media_type, data } => Content {
            role: "user".to_string(),
            parts: vec![
                Part::Text {
                    text: INLINE_INSTRUCTION.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: media_type.clone(),
                        data: data.clone(),
                    },
                },
            ],
        },
        ContentBody::Text(document) => Content {
            role: "user".to_string(),
            parts: vec![Part::Text {
                text: text_grounding(document),
            }],
        },
    }
}

/// Embeds the document text verbatim between delimiter markers.
fn text_grounding(document: &str) -> String {
    format!(
        "You are a helpful AI assistant that answers questions based ONLY on the provided text \
         document. The document content is below:\n\n---\n{document}\n---\n\n"
    )
}

fn wire_turn(turn: &Turn) -> Content {
    Content {
        role: role_name(turn.role).to_string(),
        parts: turn
            .parts
            .iter()
            .map(|part| match part {
                TurnPart::Text(text) => Part::Text { text: text.clone() },
            })
            .collect(),
    }
}
