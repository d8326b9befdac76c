use crate::models::Section;

pub const WORDS_PER_MINUTE: usize = 200;

/// Estimated reading time such as `"4 min"`, rounded up to whole minutes.
pub fn reading_time(content: &[Section]) -> String {
    let words: usize = content
        .iter()
        .map(|section| {
            section.heading.split_whitespace().count()
                + section.body.as_text().split_whitespace().count()
        })
        .sum();

    format!("{} min", words.div_ceil(WORDS_PER_MINUTE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rich_text::{RichText, RichTextNode, TextBlock};

    fn section(heading: &str, body: &str) -> Section {
        Section {
            heading: heading.to_string(),
            body: RichText(vec![RichTextNode::Paragraph(TextBlock {
                text: body.to_string(),
                spans: Vec::new(),
            })]),
        }
    }

    #[test]
    fn empty_content_reads_in_zero_minutes() {
        assert_eq!(reading_time(&[]), "0 min");
    }

    #[test]
    fn rounds_partial_minutes_up() {
        assert_eq!(reading_time(&[section("Intro", "a b c")]), "1 min");
    }

    #[test]
    fn sums_headings_and_bodies_across_sections() {
        let body = vec!["word"; 124].join(" ");
        let content = [section("Part one", &body), section("Part two", &body)];
        // 2 + 124 + 2 + 124 = 252 words
        assert_eq!(reading_time(&content), "2 min");
    }

    #[test]
    fn exactly_two_hundred_fifty_words_is_two_minutes() {
        let body = vec!["lorem"; 249].join("  \n\t");
        assert_eq!(reading_time(&[section("Heading", &body)]), "2 min");
    }

    #[test]
    fn counts_words_split_across_blocks() {
        let body: RichText = serde_json::from_value(serde_json::json!([
            { "type": "paragraph", "text": "end", "spans": [] },
            { "type": "paragraph", "text": "start", "spans": [] }
        ]))
        .expect("rich text");
        let content = [Section {
            heading: String::new(),
            body,
        }];
        assert_eq!(reading_time(&content), "1 min");
    }
}
