//! # HTML
//!
//! Server-rendered markup: the page shell with its role-aware sidebar, plus
//! small builders for forms, tables and badges.
//!
//! Every builder escapes the text it is handed. Functions that take
//! pre-rendered `html` fragments say so in their parameter name.

use menagerie_core::authz::navigation;
use menagerie_core::{FormState, User};
use std::fmt::Write as _;

// =============================================================================
// ESCAPING
// =============================================================================

/// Escape text for element content and double-quoted attributes.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

// =============================================================================
// SHELLS
// =============================================================================

fn document(title: &str, body_html: &str) -> String {
    let mut html = String::with_capacity(4096 + body_html.len());
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"/>");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width,initial-scale=1\"/>");
    let _ = write!(html, "<title>{} | Menagerie</title>", escape(title));
    html.push_str(STYLE);
    html.push_str("</head><body>");
    html.push_str(body_html);
    html.push_str("</body></html>");
    html
}

/// Signed-in page: sidebar filtered by role, header with the user, content.
#[must_use]
pub fn page(title: &str, user: &User, active: &str, content_html: &str) -> String {
    let mut body = String::with_capacity(2048 + content_html.len());
    body.push_str("<div class=\"layout\"><aside class=\"sidebar\">");
    body.push_str("<a class=\"logo\" href=\"/home\">Menagerie</a><nav>");
    for item in navigation(user.role) {
        let class = if item.url == active { "nav-link active" } else { "nav-link" };
        let _ = write!(
            body,
            "<a class=\"{class}\" href=\"{}\">{}</a>",
            item.url,
            escape(item.title)
        );
    }
    body.push_str("</nav><div class=\"who\">");
    let _ = write!(
        body,
        "<div class=\"who-name\">{}</div><div class=\"who-role\">{}</div>",
        escape(user.label()),
        user.role
    );
    body.push_str(&post_button("/logout", "Log out", "btn btn-ghost"));
    body.push_str("</div></aside><main class=\"main\">");
    let _ = write!(body, "<h1 class=\"title\">{}</h1>", escape(title));
    body.push_str(content_html);
    body.push_str("</main></div>");
    document(title, &body)
}

/// Page without the sidebar (login, errors).
#[must_use]
pub fn public_page(title: &str, content_html: &str) -> String {
    let mut body = String::with_capacity(512 + content_html.len());
    body.push_str("<main class=\"centered\"><div class=\"card narrow\">");
    let _ = write!(body, "<h1 class=\"title\">{}</h1>", escape(title));
    body.push_str(content_html);
    body.push_str("</div></main>");
    document(title, &body)
}

#[must_use]
pub fn not_found_page() -> String {
    public_page(
        "Not Found",
        "<p>Could not find the requested page.</p><p><a href=\"/home\">Return Home</a></p>",
    )
}

#[must_use]
pub fn unauthorized_page() -> String {
    public_page(
        "Unauthorized",
        "<p>You don't have permission to view this page.</p>\
         <p><a href=\"/home\">Return Home</a></p>",
    )
}

#[must_use]
pub fn error_page(title: &str, detail: &str) -> String {
    let content = format!(
        "<p>{}</p><p><a href=\"/home\">Return Home</a></p>",
        escape(detail)
    );
    public_page(title, &content)
}

// =============================================================================
// BUILDING BLOCKS
// =============================================================================

/// Titled panel.
#[must_use]
pub fn card(title: &str, body_html: &str) -> String {
    format!(
        "<section class=\"card\"><h2>{}</h2>{body_html}</section>",
        escape(title)
    )
}

/// Anchor styled as a button.
#[must_use]
pub fn link_button(href: &str, label: &str) -> String {
    format!(
        "<a class=\"btn\" href=\"{}\">{}</a>",
        escape(href),
        escape(label)
    )
}

/// Anchor.
#[must_use]
pub fn link(href: &str, label: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape(href), escape(label))
}

/// Single-button form posting to `action`.
#[must_use]
pub fn post_button(action: &str, label: &str, class: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{}\" class=\"inline\"><button class=\"{class}\" type=\"submit\">{}</button></form>",
        escape(action),
        escape(label)
    )
}

/// Colored pill. `tone` is one of the `badge-*` classes.
#[must_use]
pub fn badge(label: &str, tone: &str) -> String {
    format!("<span class=\"badge badge-{tone}\">{}</span>", escape(label))
}

/// Table with escaped headers and pre-rendered cells.
#[must_use]
pub fn table(headers: &[&str], rows_html: &[Vec<String>]) -> String {
    if rows_html.is_empty() {
        return "<p class=\"muted\">No results.</p>".to_string();
    }
    let mut html = String::from("<table><thead><tr>");
    for header in headers {
        let _ = write!(html, "<th>{}</th>", escape(header));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows_html {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{cell}</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Label/value list for detail pages. Values are pre-rendered.
#[must_use]
pub fn details(rows_html: &[(&str, String)]) -> String {
    let mut html = String::from("<dl class=\"details\">");
    for (label, value) in rows_html {
        let _ = write!(html, "<dt>{}</dt><dd>{value}</dd>", escape(label));
    }
    html.push_str("</dl>");
    html
}

/// Escaped text, or a dash when absent.
#[must_use]
pub fn or_dash(value: Option<&str>) -> String {
    value.map_or_else(|| "-".to_string(), escape)
}

// =============================================================================
// FORMS
// =============================================================================

/// Summary message and database error above a form.
#[must_use]
pub fn form_message(state: &FormState) -> String {
    let mut html = String::new();
    if let Some(message) = &state.message {
        let _ = write!(html, "<div class=\"alert\">{}</div>", escape(message));
    }
    html.push_str(&field_errors(state, menagerie_core::response::DB_FIELD));
    html
}

/// Messages attached to one field.
#[must_use]
pub fn field_errors(state: &FormState, field: &str) -> String {
    let mut html = String::new();
    for message in state.field(field) {
        let _ = write!(html, "<p class=\"field-error\">{}</p>", escape(message));
    }
    html
}

/// Labeled `<input>`.
#[must_use]
pub fn input(label: &str, name: &str, kind: &str, value: &str, state: &FormState) -> String {
    format!(
        "<label class=\"field\"><span>{}</span><input type=\"{kind}\" name=\"{name}\" value=\"{}\"/>{}</label>",
        escape(label),
        escape(value),
        field_errors(state, name)
    )
}

/// Labeled `<textarea>`.
#[must_use]
pub fn textarea(label: &str, name: &str, value: &str, state: &FormState) -> String {
    format!(
        "<label class=\"field\"><span>{}</span><textarea name=\"{name}\" rows=\"4\">{}</textarea>{}</label>",
        escape(label),
        escape(value),
        field_errors(state, name)
    )
}

/// Labeled `<select>` over `(value, text)` options.
#[must_use]
pub fn select(
    label: &str,
    name: &str,
    options: &[(String, String)],
    selected: &str,
    state: &FormState,
) -> String {
    let mut html = format!(
        "<label class=\"field\"><span>{}</span><select name=\"{name}\">",
        escape(label)
    );
    for (value, text) in options {
        let mark = if value == selected { " selected" } else { "" };
        let _ = write!(
            html,
            "<option value=\"{}\"{mark}>{}</option>",
            escape(value),
            escape(text)
        );
    }
    html.push_str("</select>");
    html.push_str(&field_errors(state, name));
    html.push_str("</label>");
    html
}

/// Options for a labeled enum, e.g. `enum_options(TaskType::ALL)`.
pub fn enum_options<T: Copy + ToString>(values: &[T]) -> Vec<(String, String)> {
    values
        .iter()
        .map(|v| (v.to_string(), v.to_string()))
        .collect()
}

/// Options for an optional reference, starting with an empty "None" entry.
pub fn reference_options<I>(items: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (u64, String)>,
{
    std::iter::once((String::new(), "None".to_string()))
        .chain(items.into_iter().map(|(id, text)| (id.to_string(), text)))
        .collect()
}

/// `<form>` wrapper with a submit button.
#[must_use]
pub fn form(action: &str, fields_html: &str, submit: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{}\" class=\"form\">{fields_html}<button class=\"btn\" type=\"submit\">{}</button></form>",
        escape(action),
        escape(submit)
    )
}

const STYLE: &str = r"<style>
*,*::before,*::after{box-sizing:border-box;margin:0;padding:0}
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;background:#F6F7F4;color:#1F2A1F;line-height:1.6}
a{color:#2F6B3A}
.layout{display:flex;min-height:100vh}
.sidebar{width:220px;background:#1F2A1F;color:#DDE5D8;padding:24px 16px;display:flex;flex-direction:column;gap:24px}
.logo{font-weight:800;font-size:20px;color:#F4D35E;text-decoration:none}
.sidebar nav{display:flex;flex-direction:column;gap:4px}
.nav-link{color:#B9C4B3;text-decoration:none;padding:6px 10px;border-radius:8px}
.nav-link.active,.nav-link:hover{background:rgba(244,211,94,.15);color:#F4D35E}
.who{margin-top:auto;font-size:13px}
.who-role{color:#8FA08A;margin-bottom:8px}
.main{flex:1;padding:32px 40px;max-width:1200px}
.title{font-size:28px;margin-bottom:20px}
.centered{display:flex;justify-content:center;padding-top:10vh}
.card{background:#fff;border:1px solid #E2E6DE;border-radius:12px;padding:20px;margin-bottom:20px}
.card h2{font-size:18px;margin-bottom:12px}
.narrow{width:380px}
.cards{display:grid;grid-template-columns:repeat(auto-fit,minmax(240px,1fr));gap:16px}
.stat{font-size:30px;font-weight:700}
.muted{color:#7A857A}
table{width:100%;border-collapse:collapse;font-size:14px}
th,td{text-align:left;padding:8px;border-bottom:1px solid #ECEFE9;vertical-align:top}
.btn{display:inline-block;background:#2F6B3A;color:#fff;border:0;border-radius:8px;padding:8px 14px;cursor:pointer;text-decoration:none;font-size:14px}
.btn-ghost{background:transparent;border:1px solid #5B6B58;color:#DDE5D8}
.btn-danger{background:#B83A2E}
.inline{display:inline}
.form{display:flex;flex-direction:column;gap:12px;max-width:560px}
.field{display:flex;flex-direction:column;gap:4px;font-size:14px}
.field input,.field select,.field textarea{padding:8px;border:1px solid #CBD3C6;border-radius:8px;font:inherit}
.field-error{color:#B83A2E;font-size:13px}
.alert{background:#FBE9E7;color:#8C2A20;border-radius:8px;padding:10px;margin-bottom:12px}
.badge{display:inline-block;border-radius:999px;padding:2px 10px;font-size:12px;font-weight:600}
.badge-green{background:#E3F2E1;color:#2F6B3A}
.badge-amber{background:#FFF4D6;color:#8A6100}
.badge-red{background:#FBE9E7;color:#8C2A20}
.badge-gray{background:#ECEFE9;color:#4A554A}
.badge-blue{background:#E2ECF8;color:#244C7A}
.details{display:grid;grid-template-columns:180px 1fr;gap:6px 16px;font-size:14px}
.details dt{color:#7A857A}
.toolbar{display:flex;gap:8px;margin-bottom:16px;flex-wrap:wrap}
.map{background:#E8EFE2;border-radius:12px;border:1px solid #D3DCCB}
</style>";
