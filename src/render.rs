//! HTML for the post page, the home listing and the error pages.

use chrono::{DateTime, FixedOffset};
use htmlescape::encode_minimal as escape;

use crate::models::{Post, PostSummary};
use crate::reading_time::reading_time;
use crate::retrieval::{HomePage, PostPage};

const HOT_RELOAD_SCRIPT: &str = r#"
<script>
    const socket = new WebSocket("ws://" + window.location.host + "/ws");
    socket.onmessage = (event) => {
        if (event.data === "reload") {
            window.location.reload();
        }
    };
</script>
"#;

/// Seconds the loading placeholder waits before asking again.
const RESOLVING_REFRESH_SECS: u32 = 1;

/// Whether the data of a post page is available yet.
#[derive(Debug, Clone, Copy)]
pub enum RenderState<'a> {
    Resolving,
    Ready(&'a PostPage),
}

#[derive(Debug, Clone, Default)]
pub struct CommentsWidget {
    pub repo: String,
    pub theme: String,
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub site_name: String,
    pub comments: Option<CommentsWidget>,
}

/// Pieces substituted into the layout template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPage {
    pub title: String,
    pub head: String,
    pub body: String,
}

pub fn render_post(state: RenderState<'_>, options: &RenderOptions) -> RenderedPage {
    let page = match state {
        RenderState::Resolving => return render_loading(options),
        RenderState::Ready(page) => page,
    };
    let post = &page.post;

    let mut body = String::new();
    body.push_str(&banner(post));
    body.push_str("<main class=\"post-container\"><article class=\"post\">");
    body.push_str(&format!("<h1>{}</h1>", escape(&post.data.title)));
    body.push_str(&format!(
        "<div class=\"post-info\"><time>{}</time><span class=\"author\">{}</span><span class=\"reading-time\">{}</span></div>",
        format_date(post.first_publication_date),
        escape(&post.data.author),
        reading_time(&post.data.content)
    ));
    if let (true, Some(last)) = (post.was_edited(), post.last_publication_date) {
        body.push_str(&format!(
            "<p class=\"edited\">{}</p>",
            last.format("* edited on %d %b %Y, at %H:%M")
        ));
    }

    for section in &post.data.content {
        body.push_str(&format!(
            "<section class=\"post-section\"><h2>{}</h2><div class=\"post-body\">{}</div></section>",
            escape(&section.heading),
            section.body.as_html()
        ));
    }
    body.push_str("</article>");

    body.push_str(&navigation(page.prev_post.as_ref(), page.next_post.as_ref()));

    if let Some(comments) = &options.comments {
        body.push_str(&comments_widget(comments));
    }

    if page.preview_ref.is_some() {
        body.push_str(
            "<aside class=\"preview\"><a href=\"/api/exit-preview\">Exit preview mode</a></aside>",
        );
    }
    body.push_str("</main>");

    RenderedPage {
        title: page_title(&post.data.title, options),
        head: String::new(),
        body,
    }
}

fn render_loading(options: &RenderOptions) -> RenderedPage {
    RenderedPage {
        title: options.site_name.clone(),
        head: format!("<meta http-equiv=\"refresh\" content=\"{RESOLVING_REFRESH_SECS}\">"),
        body: "<main class=\"post-container loading\"><p>Loading...</p></main>".to_string(),
    }
}

fn banner(post: &Post) -> String {
    match &post.data.banner.url {
        Some(url) => format!(
            "<div class=\"post-banner\" style=\"background-image: url('{}')\"></div>",
            escape(url)
        ),
        None => "<div class=\"post-banner\"></div>".to_string(),
    }
}

fn navigation(prev: Option<&Post>, next: Option<&Post>) -> String {
    if prev.is_none() && next.is_none() {
        return String::new();
    }

    let mut out = String::from("<nav class=\"post-navigation\">");
    if let Some(prev) = prev {
        out.push_str(&format!(
            "<div class=\"prev-post\"><p>{}</p><a href=\"/post/{}\">Previous post</a></div>",
            escape(&prev.data.title),
            escape(&prev.uid)
        ));
    }
    if let Some(next) = next {
        out.push_str(&format!(
            "<div class=\"next-post\"><p>{}</p><a href=\"/post/{}\">Next post</a></div>",
            escape(&next.data.title),
            escape(&next.uid)
        ));
    }
    out.push_str("</nav>");
    out
}

fn comments_widget(comments: &CommentsWidget) -> String {
    format!(
        "<div class=\"comments\"><script src=\"https://utteranc.es/client.js\" repo=\"{}\" issue-term=\"pathname\" theme=\"{}\" crossorigin=\"anonymous\" async></script></div>",
        escape(&comments.repo),
        escape(&comments.theme)
    )
}

pub fn render_home(home: &HomePage, intro_html: &str, options: &RenderOptions) -> RenderedPage {
    let mut body = String::from("<main class=\"home-container\">");
    body.push_str(&format!("<div class=\"intro\">{intro_html}</div>"));

    for post in &home.posts {
        body.push_str(&summary(post));
    }

    if let Some(next) = home.next_page {
        body.push_str(&format!(
            "<a class=\"load-more\" href=\"/?page={next}\">Load more posts</a>"
        ));
    }
    body.push_str("</main>");

    RenderedPage {
        title: options.site_name.clone(),
        head: String::new(),
        body,
    }
}

fn summary(post: &PostSummary) -> String {
    format!(
        "<div class=\"post-summary\"><a href=\"/post/{}\"><strong>{}</strong><p>{}</p></a><div class=\"post-info\"><time>{}</time><span class=\"author\">{}</span></div></div>",
        escape(&post.uid),
        escape(&post.title),
        escape(&post.subtitle),
        format_date(post.first_publication_date),
        escape(&post.author)
    )
}

/// Fills the `{{slug}}` placeholder of the not-found template.
pub fn render_not_found(template: &str, slug: &str, options: &RenderOptions) -> RenderedPage {
    RenderedPage {
        title: page_title("Not found", options),
        head: String::new(),
        body: template.replace("{{slug}}", &escape(slug)),
    }
}

pub fn render_error(options: &RenderOptions) -> RenderedPage {
    RenderedPage {
        title: page_title("Error", options),
        head: String::new(),
        body: "<main class=\"post-container\"><h1>Something went wrong</h1><p>Please try again in a moment.</p></main>".to_string(),
    }
}

pub fn render_with_layout(
    layout: &str,
    banner: &str,
    page: &RenderedPage,
    is_development: bool,
) -> String {
    let mut html = layout
        .replace("{{ title }}", &escape(&page.title))
        .replace("{{ head }}", &page.head)
        .replace("{{ banner }}", banner)
        .replace("{{ content }}", &page.body);

    if is_development {
        html = html.replace("</body>", &format!("{}</body>", HOT_RELOAD_SCRIPT));
    }

    html
}

fn page_title(title: &str, options: &RenderOptions) -> String {
    if options.site_name.is_empty() {
        title.to_string()
    } else {
        format!("{} | {}", title, options.site_name)
    }
}

fn format_date(date: Option<DateTime<FixedOffset>>) -> String {
    date.map(|d| d.format("%d %b %Y").to_string())
        .unwrap_or_default()
}
