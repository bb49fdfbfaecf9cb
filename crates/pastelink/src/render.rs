//! HTML pages: the submission form and rendered text artifacts.
//!
//! Markdown goes through pulldown-cmark with tables and strikethrough.
//! Raw HTML in a paste is escaped rather than passed through.

use maud::{html, Markup, PreEscaped, DOCTYPE};
use pulldown_cmark::{html as md_html, Event, Options, Parser};

/// Content-Security-Policy for rendered pastes: no scripts, same-origin images.
pub const CSP_HEADER: &str =
    "default-src 'none'; style-src 'unsafe-inline'; img-src 'self' data:; frame-ancestors 'none'";

/// Render markdown to an HTML fragment.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut html_output = String::with_capacity(markdown.len() * 2);
    md_html::push_html(&mut html_output, parser);
    html_output
}

/// Full page for a text artifact.
pub fn render_page(markdown: &str) -> String {
    let title = page_title(markdown).unwrap_or("pastelink");
    let rendered = render_markdown(markdown);

    page_shell(
        title,
        PAGE_CSS,
        html! {
            article { (PreEscaped(rendered)) }
        },
    )
    .into_string()
}

/// Submission form served at `/`.
pub fn render_form() -> String {
    page_shell(
        "pastelink",
        FORM_CSS,
        html! {
            h1 { "pastelink" }
            form method="POST" action="/convert" {
                label for="title" { "Title (optional)" }
                input type="text" id="title" name="title" placeholder="Title";

                label for="text" { "Content" }
                textarea id="text" name="text" placeholder="Text or markdown" {}

                label for="images" { "Images (base64 or data URLs, one per line)" }
                textarea id="images" name="images" {}

                button type="submit" { "Create link" }
            }
        },
    )
    .into_string()
}

fn page_shell(title: &str, css: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(css)) }
            }
            body { (body) }
        }
    }
}

/// Text of the leading `# ` heading, if the document starts with one.
fn page_title(markdown: &str) -> Option<&str> {
    let first = markdown.lines().next()?;
    let title = first.strip_prefix("# ")?.trim();
    (!title.is_empty()).then_some(title)
}

const PAGE_CSS: &str = r#"
body{font-family:system-ui,-apple-system,"Segoe UI",Roboto,sans-serif;max-width:800px;margin:0 auto;padding:2.5rem 1rem;line-height:1.6;color:#24292e}
h1,h2,h3{border-bottom:1px solid #eaecef;padding-bottom:.3em}
pre{background:#f6f8fa;border-radius:4px;padding:1rem;overflow:auto;font-size:85%}
code{background:rgba(27,31,35,.05);border-radius:3px;padding:.2em .4em;font-size:85%}
pre code{background:none;padding:0}
blockquote{border-left:.25em solid #dfe2e5;color:#6a737d;margin:0;padding:0 1em}
img{max-width:100%;height:auto}
hr{border:0;height:.25em;background:#e1e4e8;margin:1.5rem 0}
table{border-collapse:collapse;display:block;overflow:auto}
th,td{border:1px solid #dfe2e5;padding:6px 13px}
tr:nth-child(2n){background:#f6f8fa}
"#;

const FORM_CSS: &str = r#"
body{font-family:system-ui,-apple-system,"Segoe UI",Roboto,sans-serif;max-width:800px;margin:0 auto;padding:1.5rem 1rem}
label{display:block;margin:1rem 0 .25rem;font-weight:600}
input,textarea{width:100%;box-sizing:border-box;padding:.5rem}
textarea{height:200px;font-family:ui-monospace,Menlo,Consolas,monospace}
#images{height:100px}
button{margin-top:1rem;padding:.5rem 1.5rem}
"#;
