//! Prompt templating for tile classification requests.

use tracing::warn;

/// Placeholder replaced by the target description.
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// Template used when none is given on the command line.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Respond with 1 if image has a {target}, else 0.";

/// Slot id the tile is attached under in `image_data`.
pub const IMAGE_SLOT_ID: i32 = 10;

/// Substitute the target into every placeholder of the template.
///
/// A template without a placeholder is used verbatim.
pub fn render_prompt(template: &str, target: &str) -> String {
    if !template.contains(TARGET_PLACEHOLDER) {
        warn!("Prompt template has no {} placeholder", TARGET_PLACEHOLDER);
        return template.to_string();
    }
    template.replace(TARGET_PLACEHOLDER, target)
}

/// Wrap a classification prompt in the chat transcript the server expects.
pub fn build_completion_prompt(prompt: &str) -> String {
    format!("USER:[img-{}]\nUSER:{}\nASSISTANT:", IMAGE_SLOT_ID, prompt)
}
