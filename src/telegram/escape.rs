/// Characters with special meaning in Telegram MarkdownV2.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!',
];

/// Escape `text` so it renders literally inside a MarkdownV2 message.
///
/// # Examples
///
/// ```
/// use tldr::telegram::escape::escape_markdown_v2;
///
/// assert_eq!(escape_markdown_v2("- done!"), "\\- done\\!");
/// ```
#[must_use]
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
