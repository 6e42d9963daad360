//! Note content helpers.

use crate::models::NoteType;

/// Message shown when an image upload fails
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload image. Please try again.";

/// Append an uploaded image reference to note content.
///
/// Markdown gets an image link on its own line, rich text gets an `<img>`
/// between line breaks. Todo notes have no body to splice into, so `None`.
#[must_use]
pub fn splice_image(
    note_type: NoteType,
    content: &str,
    file_name: &str,
    url: &str,
) -> Option<String> {
    match note_type {
        NoteType::Markdown => Some(format!("{content}\n![{file_name}]({url})\n")),
        NoteType::RichText => Some(format!(
            r#"{content}<br><img src="{}" alt="{}" style="max-width: 100%;"><br>"#,
            escape_attribute(url),
            escape_attribute(file_name)
        )),
        NoteType::Todo => None,
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Plain-text preview of note content; rich-text tags are dropped.
#[must_use]
pub fn plain_text(note_type: NoteType, content: &str) -> String {
    match note_type {
        NoteType::RichText => {
            let mut text = String::with_capacity(content.len());
            let mut in_tag = false;
            for ch in content.chars() {
                match ch {
                    '<' => {
                        in_tag = true;
                        text.push(' ');
                    }
                    '>' => in_tag = false,
                    _ if !in_tag => text.push(ch),
                    _ => {}
                }
            }
            text
        }
        NoteType::Markdown | NoteType::Todo => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_gets_image_line() {
        let spliced = splice_image(
            NoteType::Markdown,
            "# Trip",
            "beach.png",
            "https://cdn.example/beach.png",
        );
        assert_eq!(
            spliced.as_deref(),
            Some("# Trip\n![beach.png](https://cdn.example/beach.png)\n")
        );
    }

    #[test]
    fn rich_text_gets_escaped_img_tag() {
        let spliced = splice_image(
            NoteType::RichText,
            "<p>Hi</p>",
            "a\"b.png",
            "https://cdn.example/x.png?a=1&b=2",
        )
        .unwrap();
        assert_eq!(
            spliced,
            "<p>Hi</p><br><img src=\"https://cdn.example/x.png?a=1&amp;b=2\" alt=\"a&quot;b.png\" style=\"max-width: 100%;\"><br>"
        );
    }

    #[test]
    fn todo_notes_are_not_spliced() {
        assert_eq!(splice_image(NoteType::Todo, "", "a.png", "u"), None);
    }

    #[test]
    fn plain_text_strips_tags() {
        assert_eq!(
            plain_text(NoteType::RichText, "<p>Hello <b>world</b></p>").split_whitespace().collect::<Vec<_>>(),
            vec!["Hello", "world"]
        );
        assert_eq!(plain_text(NoteType::Markdown, "**bold**"), "**bold**");
    }
}
