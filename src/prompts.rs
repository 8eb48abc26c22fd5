//! Prompts for VLM-based alt-text generation.
//!
//! Kept in one place so the wording can be changed (and unit-tested) without
//! touching the HTTP or fallback logic in [`crate::pipeline::caption`].

/// Caption used whenever the model is unavailable or its answer is unusable.
pub const FALLBACK_CAPTION: &str = "Book cover image";

/// Build the user instruction for a cover with the given title.
///
/// The title is quoted verbatim; the model is asked for the alt text only so
/// the response can be attached without post-processing beyond a trim.
pub fn alt_text_prompt(title: &str) -> String {
    format!(
        "Generate a concise alternative text description for this book cover image. \
The book title is: \"{title}\". \
The alt text should be suitable for screen readers and accessibility purposes. \
Describe the key visual elements, colors, and any text visible on the cover. \
Keep the description under 150 characters if possible. \
Respond with only the alt text, no additional explanation."
    )
}
