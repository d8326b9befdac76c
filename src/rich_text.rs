//! Structured rich text as delivered by the CMS, with plain-text and HTML
//! serializers.

use serde::Deserialize;

/// An ordered list of rich-text blocks.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct RichText(pub Vec<RichTextNode>);

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RichTextNode {
    Heading1(TextBlock),
    Heading2(TextBlock),
    Heading3(TextBlock),
    Heading4(TextBlock),
    Heading5(TextBlock),
    Heading6(TextBlock),
    Paragraph(TextBlock),
    Preformatted(TextBlock),
    ListItem(TextBlock),
    OListItem(TextBlock),
    Image(ImageBlock),
    Embed(EmbedBlock),
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

/// Inline formatting over `text`. Offsets are UTF-16 code units, the way the
/// CMS computes them.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(flatten)]
    pub kind: SpanKind,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink { data: LinkData },
    Label { data: LabelData },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LinkData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LabelData {
    #[serde(default)]
    pub label: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ImageBlock {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EmbedBlock {
    #[serde(default)]
    pub oembed: Oembed,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Oembed {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
}

impl RichTextNode {
    fn text_block(&self) -> Option<&TextBlock> {
        match self {
            RichTextNode::Heading1(block)
            | RichTextNode::Heading2(block)
            | RichTextNode::Heading3(block)
            | RichTextNode::Heading4(block)
            | RichTextNode::Heading5(block)
            | RichTextNode::Heading6(block)
            | RichTextNode::Paragraph(block)
            | RichTextNode::Preformatted(block)
            | RichTextNode::ListItem(block)
            | RichTextNode::OListItem(block) => Some(block),
            RichTextNode::Image(_) | RichTextNode::Embed(_) | RichTextNode::Unsupported => None,
        }
    }

    fn list_tag(&self) -> Option<&'static str> {
        match self {
            RichTextNode::ListItem(_) => Some("ul"),
            RichTextNode::OListItem(_) => Some("ol"),
            _ => None,
        }
    }
}

impl RichText {
    /// Text of every text block, joined with a single space.
    pub fn as_text(&self) -> String {
        self.0
            .iter()
            .filter_map(RichTextNode::text_block)
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Serializes the blocks to HTML. Consecutive list items are grouped into
    /// a single `<ul>`/`<ol>`.
    pub fn as_html(&self) -> String {
        let mut out = String::new();
        let mut open_list: Option<&'static str> = None;

        for node in &self.0 {
            let list_tag = node.list_tag();
            if open_list != list_tag {
                if let Some(tag) = open_list {
                    out.push_str(&format!("</{tag}>"));
                }
                if let Some(tag) = list_tag {
                    out.push_str(&format!("<{tag}>"));
                }
                open_list = list_tag;
            }
            out.push_str(&node_html(node));
        }

        if let Some(tag) = open_list {
            out.push_str(&format!("</{tag}>"));
        }
        out
    }
}

fn node_html(node: &RichTextNode) -> String {
    match node {
        RichTextNode::Heading1(block) => wrap("h1", block),
        RichTextNode::Heading2(block) => wrap("h2", block),
        RichTextNode::Heading3(block) => wrap("h3", block),
        RichTextNode::Heading4(block) => wrap("h4", block),
        RichTextNode::Heading5(block) => wrap("h5", block),
        RichTextNode::Heading6(block) => wrap("h6", block),
        RichTextNode::Paragraph(block) => wrap("p", block),
        RichTextNode::Preformatted(block) => wrap("pre", block),
        RichTextNode::ListItem(block) | RichTextNode::OListItem(block) => wrap("li", block),
        RichTextNode::Image(image) => format!(
            "<p class=\"block-img\"><img src=\"{}\" alt=\"{}\" /></p>",
            htmlescape::encode_minimal(&image.url),
            htmlescape::encode_minimal(image.alt.as_deref().unwrap_or_default())
        ),
        RichTextNode::Embed(embed) => {
            let oembed = &embed.oembed;
            format!(
                "<div data-oembed=\"{}\" data-oembed-type=\"{}\" data-oembed-provider=\"{}\">{}</div>",
                htmlescape::encode_minimal(oembed.embed_url.as_deref().unwrap_or_default()),
                htmlescape::encode_minimal(oembed.kind.as_deref().unwrap_or_default()),
                htmlescape::encode_minimal(oembed.provider_name.as_deref().unwrap_or_default()),
                oembed.html.as_deref().unwrap_or_default()
            )
        }
        RichTextNode::Unsupported => String::new(),
    }
}

fn wrap(tag: &str, block: &TextBlock) -> String {
    format!("<{tag}>{}</{tag}>", serialize_spans(block))
}

fn serialize_spans(block: &TextBlock) -> String {
    let units: Vec<u16> = block.text.encode_utf16().collect();
    let mut spans: Vec<&Span> = block
        .spans
        .iter()
        .filter(|span| span.start < span.end && span.end <= units.len())
        .collect();
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    serialize_range(&units, 0, units.len(), &spans)
}

/// Renders `units[from..to]`, nesting every span that lies fully inside an
/// earlier one. Spans crossing a sibling's boundary are dropped.
fn serialize_range(units: &[u16], from: usize, to: usize, spans: &[&Span]) -> String {
    let mut out = String::new();
    let mut cursor = from;
    let mut i = 0;

    while i < spans.len() {
        let span = spans[i];
        if span.start < cursor || span.end > to {
            i += 1;
            continue;
        }

        out.push_str(&escape_text(&units[cursor..span.start]));

        let mut j = i + 1;
        while j < spans.len() && spans[j].start < span.end {
            j += 1;
        }
        let children: Vec<&Span> = spans[i + 1..j]
            .iter()
            .copied()
            .filter(|child| child.end <= span.end)
            .collect();
        let inner = serialize_range(units, span.start, span.end, &children);
        out.push_str(&wrap_span(&span.kind, &inner));

        cursor = span.end;
        i = j;
    }

    out.push_str(&escape_text(&units[cursor..to]));
    out
}

fn wrap_span(kind: &SpanKind, inner: &str) -> String {
    match kind {
        SpanKind::Strong => format!("<strong>{inner}</strong>"),
        SpanKind::Em => format!("<em>{inner}</em>"),
        SpanKind::Hyperlink { data } => {
            let href = link_href(data);
            match data.target.as_deref() {
                Some(target) => format!(
                    "<a href=\"{}\" target=\"{}\" rel=\"noopener noreferrer\">{inner}</a>",
                    htmlescape::encode_minimal(&href),
                    htmlescape::encode_minimal(target)
                ),
                None => format!("<a href=\"{}\">{inner}</a>", htmlescape::encode_minimal(&href)),
            }
        }
        SpanKind::Label { data } => format!(
            "<span class=\"{}\">{inner}</span>",
            htmlescape::encode_minimal(&data.label)
        ),
        SpanKind::Unsupported => inner.to_string(),
    }
}

/// Web links keep their url; links to other documents resolve to their page.
fn link_href(data: &LinkData) -> String {
    match (&data.url, &data.uid) {
        (Some(url), _) => url.clone(),
        (None, Some(uid)) => format!("/post/{uid}"),
        (None, None) => "#".to_string(),
    }
}

fn escape_text(units: &[u16]) -> String {
    let text = String::from_utf16_lossy(units);
    htmlescape::encode_minimal(&text).replace('\n', "<br />")
}
