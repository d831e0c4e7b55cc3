//! HTML fragments for the read-only surfaces.
//!
//! Everything here reads already-stored discussions; nothing triggers a
//! remote call. Stored text was sanitized on the way in and is escaped
//! again on the way out.

use crate::models::StoredDiscussion;
use crate::sanitize::escape_html;

pub const EMPTY_LIST_MESSAGE: &str = "No GitHub discussions found.";
pub const EMPTY_WIDGET_MESSAGE: &str = "No discussions available.";

/// Link target for a stored discussion: the source URL, or the local page.
pub fn discussion_href(discussion: &StoredDiscussion) -> String {
    discussion
        .source_url
        .clone()
        .unwrap_or_else(|| format!("/discussions/{}", discussion.id))
}

fn link_list(discussions: &[StoredDiscussion]) -> String {
    let mut out = String::from("<ul class=\"github-discussions\">");
    for d in discussions {
        out.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>",
            escape_html(&discussion_href(d)),
            escape_html(&d.title)
        ));
    }
    out.push_str("</ul>");
    out
}

fn notice(message: &str) -> String {
    format!("<p class=\"notice\">{}</p>", escape_html(message))
}

/// Embeddable list of the most recent discussions.
pub fn render_discussion_list(discussions: &[StoredDiscussion]) -> String {
    if discussions.is_empty() {
        return notice(EMPTY_LIST_MESSAGE);
    }
    link_list(discussions)
}

/// Compact dashboard panel. Each entry names its repository.
pub fn render_widget(discussions: &[StoredDiscussion]) -> String {
    if discussions.is_empty() {
        return notice(EMPTY_WIDGET_MESSAGE);
    }
    let mut out = String::from("<div class=\"github-discussions-widget\"><ul>");
    for d in discussions {
        out.push_str(&format!(
            "<li><a href=\"{}\">{}</a>",
            escape_html(&discussion_href(d)),
            escape_html(&d.title)
        ));
        if let Some(repo) = &d.repository {
            out.push_str(&format!(" <span class=\"repo\">{}</span>", escape_html(repo)));
        }
        out.push_str("</li>");
    }
    out.push_str("</ul></div>");
    out
}

/// Discussions filed under one repository tag.
pub fn render_tag_block(discussions: &[StoredDiscussion]) -> String {
    render_discussion_list(discussions)
}

/// Full page for a single discussion. Blank lines separate paragraphs.
pub fn render_discussion_page(discussion: &StoredDiscussion) -> String {
    let mut content = format!("<h1>{}</h1>", escape_html(&discussion.title));
    if let Some(repo) = &discussion.repository {
        content.push_str(&format!("<p class=\"repo\">{}</p>", escape_html(repo)));
    }
    for para in discussion.body.split("\n\n").filter(|p| !p.trim().is_empty()) {
        let lines: Vec<String> = para.lines().map(escape_html).collect();
        content.push_str(&format!("<p>{}</p>", lines.join("<br>")));
    }
    if let Some(url) = &discussion.source_url {
        content.push_str(&format!(
            "<p><a href=\"{}\">View on GitHub</a></p>",
            escape_html(url)
        ));
    }
    page(&discussion.title, &content)
}

/// Inline error text shown in place of a list.
pub fn render_error(message: &str) -> String {
    notice(message)
}

/// Wrap a fragment in a minimal standalone document.
pub fn page(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>\n",
        escape_html(title),
        content
    )
}
