use std::collections::HashMap;

use ifusergroup::{Engine, Error, RenderContext, Value};

// ── Engine edge cases ──

fn render(template: &str, ctx: &RenderContext) -> String {
    Engine::new().render_str(template, ctx).unwrap()
}

#[test]
fn empty_template_produces_empty_output() {
    assert_eq!(render("", &RenderContext::new()), "");
}

#[test]
fn dot_access_and_bracket_access_equivalent() {
    let mut user_info = HashMap::new();
    user_info.insert("team".to_string(), Value::from("Editors"));
    let ctx = RenderContext::new().with_var("info", user_info);
    let a = render("{{ info.team }}", &ctx);
    let b = render("{{ info['team'] }}", &ctx);
    assert_eq!(a, b);
    assert_eq!(a, "Editors");
}

#[test]
fn array_index_by_number() {
    let ctx = RenderContext::new().with_var("groups", vec!["Admins", "Editors"]);
    assert_eq!(render("{{ groups.1 }}|{{ groups[0] }}|{{ groups.7 }}", &ctx), "Editors|Admins|");
}

#[test]
fn or_operator_in_condition() {
    let template = "{% for r in roles %}{% if r == 'user' or r == 'assistant' %}Y{% else %}N{% endif %}{% endfor %}";
    let ctx = RenderContext::new().with_var("roles", vec!["system", "user", "assistant"]);
    assert_eq!(render(template, &ctx), "NYY");
}

#[test]
fn flag_default_false_when_missing() {
    let template = "{% if show_banner %}BANNER{% endif %}body";
    assert_eq!(render(template, &RenderContext::new()), "body");
}

#[test]
fn bool_values_render_as_words() {
    let ctx = RenderContext::new().with_var("flag", true);
    assert_eq!(render("{{ flag }}/{{ not flag }}", &ctx), "true/false");
}

#[test]
fn special_characters_are_not_escaped() {
    let ctx = RenderContext::new().with_var("content", "Hello <world> & \"friends\"");
    assert_eq!(render("{{ content }}", &ctx), "Hello <world> & \"friends\"");
}

#[test]
fn unicode_content() {
    let ctx = RenderContext::new().with_var("greeting", "こんにちは 🌍");
    assert_eq!(render("«{{ greeting }}»", &ctx), "«こんにちは 🌍»");
}

#[test]
fn newlines_are_preserved_without_trim_blocks() {
    let template = "{% if true %}\nline\n{% endif %}\n";
    assert_eq!(render(template, &RenderContext::new()), "\nline\n\n");
}

#[test]
fn unterminated_variable_is_syntax_error() {
    let err = Engine::new().compile("Hi {{ name").unwrap_err();
    assert_eq!(err, Error::syntax("unterminated tag, expected `}}`", 3));
}

#[test]
fn unregistered_tag_is_syntax_error() {
    let err = Engine::new()
        .compile("{% ifusergroup Admins %}A{% endifusergroup %}")
        .unwrap_err();
    assert_eq!(err, Error::syntax("unknown or unexpected tag 'ifusergroup'", 0));
}
