use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::models::notice::NoticeType;

/// Rendered subject and bodies for one notice. SMS transports only use the
/// text body; the email relay gets all three.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotice {
    pub subject: String,
    pub body_html: String,
    pub body_text: String,
}

#[derive(Debug, Clone)]
pub struct NoticeTemplate {
    pub subject: &'static str,
    pub body_html: &'static str,
    pub body_text: &'static str,
    /// Context paths that must resolve before rendering is attempted.
    pub required_fields: &'static [&'static str],
}

pub struct TemplateCatalog {
    templates: HashMap<NoticeType, NoticeTemplate>,
}

impl TemplateCatalog {
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();

        templates.insert(
            NoticeType::HoldReady,
            NoticeTemplate {
                subject: "Your hold is ready: {{item.title}}",
                body_html: "<p>Dear {{patron.name}},</p>\
                    <p>The item <strong>{{item.title}}</strong> is ready for pickup \
                    at {{library.name}}. Please collect it by {{hold.pickup_by}}.</p>",
                body_text: "Dear {{patron.name}},\n\
                    The item \"{{item.title}}\" is ready for pickup at \
                    {{library.name}}. Please collect it by {{hold.pickup_by}}.",
                required_fields: &["patron.name", "item.title"],
            },
        );

        templates.insert(
            NoticeType::EventReminder,
            NoticeTemplate {
                subject: "Reminder: {{event.title}} on {{event.date}}",
                body_html: "<p>Dear {{patron.name}},</p>\
                    <p>This is a reminder that <strong>{{event.title}}</strong> \
                    takes place on {{event.date}} at {{event.location}}.</p>\
                    <p>{{library.name}}</p>",
                body_text: "Dear {{patron.name}},\n\
                    This is a reminder that \"{{event.title}}\" takes place on \
                    {{event.date}} at {{event.location}}.\n{{library.name}}",
                required_fields: &["patron.name", "event.title"],
            },
        );

        templates.insert(
            NoticeType::Overdue,
            NoticeTemplate {
                subject: "Overdue notice: {{item.title}}",
                body_html: "<p>Dear {{patron.name}},</p>\
                    <p>The item <strong>{{item.title}}</strong> was due on \
                    {{item.due_date}}. Please return it to {{library.name}}.</p>",
                body_text: "Dear {{patron.name}},\n\
                    The item \"{{item.title}}\" was due on {{item.due_date}}. \
                    Please return it to {{library.name}}.",
                required_fields: &["patron.name", "item.title"],
            },
        );

        Self { templates }
    }

    pub fn get(&self, notice_type: NoticeType) -> &NoticeTemplate {
        &self.templates[&notice_type]
    }

    pub fn required_fields(&self, notice_type: NoticeType) -> &'static [&'static str] {
        self.get(notice_type).required_fields
    }

    /// Render all three parts for a notice. Only the email body is rendered
    /// in HTML mode; subjects and text bodies are substituted verbatim.
    pub fn render_notice(&self, notice_type: NoticeType, context: &JsonValue) -> RenderedNotice {
        let template = self.get(notice_type);

        debug!(notice_type = notice_type.as_str(), "Rendering notice templates");

        RenderedNotice {
            subject: render(template.subject, context, false),
            body_html: render(template.body_html, context, true),
            body_text: render(template.body_text, context, false),
        }
    }
}

/// Single-pass `{{dotted.path}}` substitution over a JSON context.
///
/// Missing or null paths become empty strings, non-string values are
/// substituted as their JSON text form, and malformed placeholders (bad path
/// token, unclosed delimiter) are left in the output untouched. Never fails.
pub fn render(template: &str, context: &JsonValue, html_mode: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            // Unclosed delimiter: emit the tail literally.
            out.push_str(&rest[start..]);
            return out;
        };

        let token = after[..end].trim();

        if is_path_token(token) {
            let text = resolved_text(context, token);

            if html_mode {
                out.push_str(&escape_html(&text));
            } else {
                out.push_str(&text);
            }
        } else {
            out.push_str(&rest[start..start + 2 + end + 2]);
        }

        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

/// Walk the context one dotted segment at a time. Anything missing along the
/// way yields None, as does an explicit null.
pub fn resolve_path<'a>(context: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = context;

    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }

    if current.is_null() { None } else { Some(current) }
}

fn is_path_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

fn resolved_text(context: &JsonValue, path: &str) -> String {
    match resolve_path(context, path) {
        None => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }

    out
}
