use notice_service::clients::template::{TemplateCatalog, render, resolve_path};
use notice_service::models::notice::NoticeType;
use serde_json::json;

/// Test: dotted paths resolve through nested objects
#[test]
fn test_nested_path_substitution() {
    let context = json!({"a": {"b": "X"}});

    assert_eq!(render("{{a.b}}", &context, false), "X");
    assert_eq!(render("before {{a.b}} after", &context, false), "before X after");
}

/// Test: missing paths substitute as empty strings, never errors
#[test]
fn test_missing_path_yields_empty() {
    assert_eq!(render("{{missing}}", &json!({}), false), "");
    assert_eq!(render("{{a.b.c}}", &json!({"a": {}}), false), "");
    assert_eq!(render("{{a.b}}", &json!({"a": "leaf"}), false), "");
}

/// Test: explicit nulls are treated like missing values
#[test]
fn test_null_yields_empty() {
    assert_eq!(render("[{{a}}]", &json!({"a": null}), false), "[]");
}

/// Test: html mode escapes substituted values but not template text
#[test]
fn test_html_mode_escapes_values() {
    assert_eq!(
        render("<{{x}}>", &json!({"x": "<script>"}), true),
        "<&lt;script&gt;>"
    );
    assert_eq!(
        render("{{x}}", &json!({"x": "a & \"b\" & 'c'"}), true),
        "a &amp; &quot;b&quot; &amp; &#39;c&#39;"
    );
}

/// Test: plain mode inserts values verbatim
#[test]
fn test_plain_mode_inserts_verbatim() {
    assert_eq!(
        render("{{x}}", &json!({"x": "<b>&</b>"}), false),
        "<b>&</b>"
    );
}

/// Test: non-string values substitute as their JSON text form
#[test]
fn test_non_string_values_serialize_as_json() {
    let context = json!({
        "count": 3,
        "price": 100.5,
        "renewable": true,
        "copies": [1, 2],
        "branch": {"code": "W"},
    });

    assert_eq!(render("{{count}}", &context, false), "3");
    assert_eq!(render("{{price}}", &context, false), "100.5");
    assert_eq!(render("{{renewable}}", &context, false), "true");
    assert_eq!(render("{{copies}}", &context, false), "[1,2]");
    assert_eq!(render("{{branch}}", &context, false), "{\"code\":\"W\"}");
}

/// Test: an unclosed delimiter leaves the tail untouched
#[test]
fn test_unclosed_delimiter_is_literal() {
    let context = json!({"name": "Ada"});

    assert_eq!(render("Hello {{name", &context, false), "Hello {{name");
    assert_eq!(render("{{name}} and {{rest", &context, false), "Ada and {{rest");
}

/// Test: placeholders with invalid path tokens stay literal
#[test]
fn test_invalid_path_tokens_stay_literal() {
    let context = json!({"a": "x"});

    assert_eq!(render("{{a b}}", &context, false), "{{a b}}");
    assert_eq!(render("{{}}", &context, false), "{{}}");
    assert_eq!(render("{{a}} {{b$c}}", &context, false), "x {{b$c}}");
}

/// Test: whitespace around the path token is trimmed
#[test]
fn test_path_token_is_trimmed() {
    assert_eq!(render("{{ a.b }}", &json!({"a": {"b": "X"}}), false), "X");
}

/// Test: rendering is pure, identical inputs yield identical output
#[test]
fn test_render_is_pure() {
    let context = json!({"patron": {"name": "Ada"}, "item": {"title": "Dune"}});
    let template = "Dear {{patron.name}}, \"{{item.title}}\" awaits.";

    let first = render(template, &context, false);
    let second = render(template, &context, false);

    assert_eq!(first, second);
    assert_eq!(first, "Dear Ada, \"Dune\" awaits.");
}

/// Test: resolve_path distinguishes present values from null and missing
#[test]
fn test_resolve_path() {
    let context = json!({"patron": {"email": "a@b.org", "phone": null}});

    assert!(resolve_path(&context, "patron.email").is_some());
    assert!(resolve_path(&context, "patron.phone").is_none());
    assert!(resolve_path(&context, "patron.fax").is_none());
    assert!(resolve_path(&context, "staff.email").is_none());
}

/// Test: the catalog renders subject, html, and text for a notice
#[test]
fn test_catalog_renders_all_parts() {
    let catalog = TemplateCatalog::builtin();
    let context = json!({
        "patron": {"name": "Ada & Co"},
        "event": {"title": "Summer Reading Kickoff", "date": "2026-08-10 17:00", "location": "Main Hall"},
        "library": {"name": "Westside Library"},
    });

    let rendered = catalog.render_notice(NoticeType::EventReminder, &context);

    assert_eq!(
        rendered.subject,
        "Reminder: Summer Reading Kickoff on 2026-08-10 17:00"
    );
    assert!(rendered.body_html.contains("Ada &amp; Co"));
    assert!(rendered.body_html.contains("<strong>Summer Reading Kickoff</strong>"));
    assert!(rendered.body_text.contains("Ada & Co"));
    assert!(rendered.body_text.contains("Main Hall"));
}

/// Test: each notice type declares its required context fields
#[test]
fn test_catalog_required_fields() {
    let catalog = TemplateCatalog::builtin();

    assert!(catalog.required_fields(NoticeType::HoldReady).contains(&"item.title"));
    assert!(catalog.required_fields(NoticeType::EventReminder).contains(&"event.title"));
    assert!(catalog.required_fields(NoticeType::Overdue).contains(&"patron.name"));
}
