//! End-to-end routing scenarios against built sitemaps.

mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use common::*;
use sitemap_router::components::ComponentInfo;
use sitemap_router::environment::RequestEnvironment;
use sitemap_router::pipeline::{Dispatch, RedirectKind};
use sitemap_router::routing::types::Role;
use sitemap_router::{CancelToken, Completion, Sitemap, SitemapError};

const DOCS: &str = r#"
[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "/docs/*.html"
[[pipelines.children.children]]
kind = "generate"
type = "file"
src = "content/{1}.xml"
[[pipelines.children.children]]
kind = "transform"
type = "xslt"
src = "style/page.xsl"
[[pipelines.children.children]]
kind = "serialize"

[[pipelines.children]]
kind = "match"
pattern = "/api/**"
[[pipelines.children.children]]
kind = "generate"
src = "api/{1}"
[[pipelines.children.children]]
kind = "serialize"
type = "xml"

[[pipelines.children]]
kind = "match"
pattern = "/a/*"
[[pipelines.children.children]]
kind = "redirect"
uri = "/b/{1}"
"#;

#[test]
fn test_docs_page_pipeline() {
    let sitemap = build(DOCS);
    let pipeline = pipeline(route(&sitemap, "/docs/intro.html").unwrap());

    let generator = pipeline.generator.as_ref().unwrap();
    assert_eq!(generator.kind, "file");
    assert_eq!(generator.source.as_deref(), Some("content/intro.xml"));
    assert_eq!(transformer_types(&pipeline), vec!["xslt"]);
    assert_eq!(pipeline.transformers[0].source.as_deref(), Some("style/page.xsl"));

    let output = pipeline.output.as_ref().unwrap();
    assert_eq!(output.kind, "html");
    assert_eq!(output.mime_type.as_deref(), Some("text/html"));
    assert!(pipeline.cache_key.is_none());
}

#[test]
fn test_double_star_captures_across_segments() {
    let sitemap = build(DOCS);
    let pipeline = pipeline(route(&sitemap, "/api/v1/users/42").unwrap());

    assert_eq!(pipeline.generator.unwrap().source.as_deref(), Some("api/v1/users/42"));
    assert_eq!(pipeline.output.unwrap().mime_type.as_deref(), Some("text/xml"));
}

#[test]
fn test_single_star_stops_at_separator() {
    let sitemap = build(DOCS);
    assert_eq!(route(&sitemap, "/docs/guide/intro.html").unwrap(), Completion::Unhandled);
}

#[test]
fn test_redirect_short_circuits() {
    let sitemap = build(
        &format!(
            "{}\n{}",
            DOCS,
            r#"
[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "**"
[[pipelines.children.children]]
kind = "generate"
src = "fallback"
[[pipelines.children.children]]
kind = "serialize"
"#
        ),
    );

    let completion = route(&sitemap, "/a/x").unwrap();
    assert_eq!(
        completion,
        Completion::Dispatch {
            dispatch: Dispatch::Redirect {
                target: "/b/x".into(),
                kind: RedirectKind::Local,
            }
        }
    );

    let env = RequestEnvironment::from_target("/a/x").with_base_url("http://example.com/a/x");
    match route_env(&sitemap, env).unwrap() {
        Completion::Dispatch {
            dispatch: Dispatch::Redirect { target, .. },
        } => assert_eq!(target, "http://example.com/b/x"),
        other => panic!("expected a redirect, got {other:?}"),
    }
}

#[test]
fn test_nothing_matched_is_unhandled() {
    let sitemap = build(DOCS);
    assert_eq!(route(&sitemap, "/nowhere").unwrap(), Completion::Unhandled);
}

#[test]
fn test_select_first_match_wins() {
    let selector = Arc::new(ChoiceSelector::default());
    let pool = Arc::new({
        let mut m = manager();
        m.register_selector("choice", selector.clone());
        m
    });
    let sitemap = build_with(
        pool.clone(),
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "select"
type = "choice"
[[pipelines.children.when]]
test = "a"
[[pipelines.children.when.children]]
kind = "generate"
src = "a"
[[pipelines.children.when.children]]
kind = "serialize"
[[pipelines.children.when]]
test = "b"
[[pipelines.children.when.children]]
kind = "generate"
src = "first-b"
[[pipelines.children.when.children]]
kind = "serialize"
[[pipelines.children.when]]
test = "b"
[[pipelines.children.when.children]]
kind = "generate"
src = "second-b"
[[pipelines.children.when.children]]
kind = "serialize"
[[pipelines.children.otherwise]]
kind = "generate"
src = "otherwise"
[[pipelines.children.otherwise]]
kind = "serialize"
"#,
    )
    .unwrap();

    let chosen = pipeline(route(&sitemap, "/?choice=b").unwrap());
    assert_eq!(chosen.generator.unwrap().source.as_deref(), Some("first-b"));
    assert_eq!(selector.tests(), vec!["a".to_string(), "b".to_string()]);

    let fallback = pipeline(route(&sitemap, "/?choice=z").unwrap());
    assert_eq!(fallback.generator.unwrap().source.as_deref(), Some("otherwise"));
    assert_eq!(pool.active(Role::Selector, "choice"), 0);
}

#[test]
fn test_handled_section_stops_later_sections() {
    let action = RecordingAction::succeeding(&[]);
    let pool = Arc::new({
        let mut m = manager();
        m.register_action("audit", action.clone());
        m
    });
    let sitemap = build_with(
        pool,
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "/x"
[[pipelines.children.children]]
kind = "generate"
[[pipelines.children.children]]
kind = "serialize"

[[pipelines]]
[[pipelines.children]]
kind = "act"
type = "audit"
"#,
    )
    .unwrap();

    pipeline(route(&sitemap, "/x").unwrap());
    assert_eq!(action.call_count(), 0);

    assert_eq!(route(&sitemap, "/y").unwrap(), Completion::Unhandled);
    assert_eq!(action.call_count(), 1);
}

#[test]
fn test_second_generator_is_a_located_state_error() {
    let sitemap = build(
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "**"
[[pipelines.children.children]]
kind = "generate"
src = "one"
[[pipelines.children.children]]
kind = "generate"
src = "two"
[[pipelines.children.children]]
kind = "serialize"
"#,
    );

    let err = route(&sitemap, "/page").unwrap_err();
    assert!(matches!(err.root(), SitemapError::PipelineState(_)));
    assert_eq!(
        err.location().map(|l| l.as_str()),
        Some("pipelines[0]/match[0]/generate[1]")
    );
}

#[test]
fn test_nested_captures_and_match_value() {
    let sitemap = build(
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "/shop/*"
[[pipelines.children.children]]
kind = "match"
value = "{request-param:item}"
pattern = "*"
[[pipelines.children.children.children]]
kind = "generate"
src = "{../1}/{1}"
[[pipelines.children.children.children]]
kind = "serialize"
"#,
    );

    let found = pipeline(route(&sitemap, "/shop/men?item=hat").unwrap());
    assert_eq!(found.generator.unwrap().source.as_deref(), Some("men/hat"));
}

#[test]
fn test_templated_pattern_compiled_per_request() {
    let sitemap = build(
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "/{request-param:section}/*"
[[pipelines.children.children]]
kind = "generate"
src = "{1}"
[[pipelines.children.children]]
kind = "serialize"
"#,
    );

    let blog = pipeline(route(&sitemap, "/blog/post?section=blog").unwrap());
    assert_eq!(blog.generator.unwrap().source.as_deref(), Some("post"));
    assert_eq!(route(&sitemap, "/blog/post?section=news").unwrap(), Completion::Unhandled);
}

#[test]
fn test_action_set_merges_first_writer_wins() {
    let first = RecordingAction::succeeding(&[("a", "1")]);
    let second = RecordingAction::succeeding(&[("a", "9"), ("b", "2")]);
    let save = RecordingAction::succeeding(&[("saved", "yes")]);
    let pool = Arc::new({
        let mut m = manager();
        m.register_action("first", first.clone())
            .register_action("second", second.clone())
            .register_action("save", save.clone());
        m
    });
    let sitemap = build_with(
        pool,
        r#"
[[action_sets]]
name = "auth"
[[action_sets.actions]]
type = "first"
parameters = { mode = "lax", level = "1" }
[[action_sets.actions]]
type = "second"
parameters = { seen = "{a}" }
[[action_sets.actions]]
type = "save"
action = "save"

[[pipelines]]
[[pipelines.children]]
kind = "act"
set = "auth"
parameters = { mode = "strict", level = "" }
[[pipelines.children.children]]
kind = "generate"
src = "{a}-{b}-{saved}"
[[pipelines.children.children]]
kind = "serialize"
"#,
    )
    .unwrap();

    let merged = pipeline(route(&sitemap, "/").unwrap());
    assert_eq!(merged.generator.unwrap().source.as_deref(), Some("1-2-"));
    assert_eq!(save.call_count(), 0);

    let caller_merged = &first.calls()[0];
    assert_eq!(caller_merged.get("mode").map(String::as_str), Some("strict"));
    assert_eq!(caller_merged.get("level").map(String::as_str), Some("1"));
    // Later members see the accumulator.
    assert_eq!(second.calls()[0].get("seen").map(String::as_str), Some("1"));

    let saved = pipeline(route(&sitemap, "/?cocoon-action=save").unwrap());
    assert_eq!(saved.generator.unwrap().source.as_deref(), Some("1-2-yes"));
    assert_eq!(save.call_count(), 1);
}

#[test]
fn test_declining_action_skips_children() {
    let declined = RecordingAction::new(Behavior::Decline);
    let pool = Arc::new({
        let mut m = manager();
        m.register_action("login", declined.clone());
        m
    });
    let sitemap = build_with(
        pool,
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "act"
type = "login"
[[pipelines.children.children]]
kind = "generate"
src = "secret"
[[pipelines.children.children]]
kind = "serialize"

[[pipelines.children]]
kind = "generate"
src = "public"
[[pipelines.children]]
kind = "serialize"
"#,
    )
    .unwrap();

    let public = pipeline(route(&sitemap, "/").unwrap());
    assert_eq!(public.generator.unwrap().source.as_deref(), Some("public"));
    assert_eq!(declined.call_count(), 1);
}

#[test]
fn test_empty_node_parameter_keeps_type_default() {
    let audit = RecordingAction::succeeding(&[]);
    let pool = Arc::new({
        let mut m = manager();
        m.register_action_with(
            "audit",
            ComponentInfo {
                parameters: map(&[("level", "info"), ("channel", "default")]),
                ..ComponentInfo::default()
            },
            audit.clone(),
        );
        m
    });
    let sitemap = build_with(
        pool,
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "act"
type = "audit"
parameters = { level = "{request-param:level}", channel = "{request-param:channel}" }
[[pipelines.children.children]]
kind = "generate"
[[pipelines.children.children]]
kind = "serialize"
"#,
    )
    .unwrap();

    route(&sitemap, "/?channel=ops").unwrap();
    assert_eq!(
        audit.calls(),
        vec![map(&[("level", "info"), ("channel", "ops")])]
    );
}

#[test]
fn test_failure_stops_later_siblings() {
    let after = RecordingAction::succeeding(&[]);
    let pool = Arc::new({
        let mut m = manager();
        m.register_action("boom", RecordingAction::new(Behavior::Fail("database down")))
            .register_action("after", after.clone());
        m
    });
    let sitemap = build_with(
        pool,
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "act"
type = "boom"

[[pipelines.children]]
kind = "act"
type = "after"
"#,
    )
    .unwrap();

    let err = route(&sitemap, "/").unwrap_err();
    assert!(matches!(err.root(), SitemapError::ComponentInvocation { .. }));
    assert_eq!(after.call_count(), 0);
}

const VIEWS: &str = r#"
[[views]]
name = "content"
from_label = "content"
[[views.children]]
kind = "serialize"
type = "xml"

[[views]]
name = "raw"
from_position = "first"
[[views.children]]
kind = "serialize"
type = "xml"

[[views]]
name = "pretty"
from_position = "last"
[[views.children]]
kind = "transform"
type = "i18n"
[[views.children]]
kind = "serialize"
type = "xml"

[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "/page"
[[pipelines.children.children]]
kind = "generate"
src = "page.xml"
[[pipelines.children.children]]
kind = "transform"
type = "xslt"
labels = ["content"]
[[pipelines.children.children]]
kind = "transform"
type = "i18n"
[[pipelines.children.children]]
kind = "serialize"
"#;

#[test]
fn test_view_from_label() {
    let sitemap = build(VIEWS);
    let viewed = pipeline(route(&sitemap, "/page?cocoon-view=content").unwrap());
    assert_eq!(transformer_types(&viewed), vec!["xslt"]);
    assert_eq!(viewed.output.unwrap().kind, "xml");
}

#[test]
fn test_view_from_first_and_last() {
    let sitemap = build(VIEWS);

    let raw = pipeline(route(&sitemap, "/page?cocoon-view=raw").unwrap());
    assert!(raw.transformers.is_empty());
    assert_eq!(raw.output.unwrap().kind, "xml");

    let pretty = pipeline(route(&sitemap, "/page?cocoon-view=pretty").unwrap());
    assert_eq!(transformer_types(&pretty), vec!["xslt", "i18n", "i18n"]);
    assert_eq!(pretty.output.unwrap().kind, "xml");
}

#[test]
fn test_unknown_view_is_ignored() {
    let sitemap = build(VIEWS);
    let plain = pipeline(route(&sitemap, "/page?cocoon-view=missing").unwrap());
    assert_eq!(transformer_types(&plain), vec!["xslt", "i18n"]);
    assert_eq!(plain.output.unwrap().kind, "html");
}

#[test]
fn test_cancelled_request_stops() {
    let sitemap = build(DOCS);
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut env = RequestEnvironment::from_target("/docs/intro.html");
    let err = sitemap.process(&mut env, cancel).unwrap_err();
    assert!(err.is_cancelled());
}

const FAILING: &str = r#"
[[pipelines]]
[[pipelines.children]]
kind = "select"
type = "choice"
[[pipelines.children.when]]
test = "go"
[[pipelines.children.when.children]]
kind = "act"
type = "boom"
[[pipelines.children.when.children.children]]
kind = "serialize"
"#;

#[test]
fn test_components_released_on_error() {
    let pool = Arc::new({
        let mut m = manager();
        m.register_selector("choice", Arc::new(ChoiceSelector::default()))
            .register_action("boom", RecordingAction::new(Behavior::Fail("database down")));
        m
    });
    let sitemap = build_with(pool.clone(), FAILING).unwrap();

    let err = route(&sitemap, "/?choice=go").unwrap_err();
    assert!(matches!(
        err.root(),
        SitemapError::ComponentInvocation { role: Role::Action, .. }
    ));
    assert_eq!(
        err.location().map(|l| l.as_str()),
        Some("pipelines[0]/select[0]/when[0]/act[0]")
    );
    assert_eq!(pool.active(Role::Action, "boom"), 0);
    assert_eq!(pool.active(Role::Selector, "choice"), 0);
}

#[test]
fn test_components_released_on_panic() {
    let pool = Arc::new({
        let mut m = manager();
        m.register_selector("choice", Arc::new(ChoiceSelector::default()))
            .register_action("boom", RecordingAction::new(Behavior::Panic));
        m
    });
    let sitemap = build_with(pool.clone(), FAILING).unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| route(&sitemap, "/?choice=go")));
    assert!(result.is_err());
    assert_eq!(pool.active(Role::Action, "boom"), 0);
    assert_eq!(pool.active(Role::Selector, "choice"), 0);
}

#[test]
fn test_flow_call_without_response_fails() {
    let pool = Arc::new({
        let mut m = manager();
        m.register_flow("silent", Arc::new(SilentFlow));
        m
    });
    let sitemap = build_with(
        pool.clone(),
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "call"
function = "start"
"#,
    )
    .unwrap();

    let err = route(&sitemap, "/").unwrap_err();
    assert!(matches!(err.root(), SitemapError::NoResponseProduced(f) if f == "start"));
    assert_eq!(pool.active(Role::Flow, "silent"), 0);
}

#[test]
fn test_configured_redirect_flow() {
    let sitemap = Sitemap::from_config(&parse(
        r#"
[[components.flows]]
name = "redirect"
implementation = "redirect"

[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "/resume"
[[pipelines.children.children]]
kind = "call"
continuation = "{request-param:k}"

[[pipelines.children]]
kind = "call"
function = "login"
arguments = [{ name = "target", value = "/login" }]
"#,
    ))
    .unwrap_or_else(|e| panic!("build failed: {e}"));

    match route(&sitemap, "/resume?k=abc").unwrap() {
        Completion::Dispatch {
            dispatch: Dispatch::Continuation { id },
        } => assert_eq!(id, "abc"),
        other => panic!("expected a continuation, got {other:?}"),
    }

    match route(&sitemap, "/account").unwrap() {
        Completion::Dispatch {
            dispatch: Dispatch::Redirect { target, kind },
        } => {
            assert_eq!(target, "/login");
            assert_eq!(kind, RedirectKind::Local);
        }
        other => panic!("expected a redirect, got {other:?}"),
    }
}

#[test]
fn test_continuation_takes_precedence_over_function() {
    let sitemap = Sitemap::from_config(&parse(
        r#"
[[components.flows]]
name = "redirect"
implementation = "redirect"

[[pipelines]]
[[pipelines.children]]
kind = "call"
continuation = "{request-param:k}"
function = "login"
arguments = [{ name = "target", value = "/login" }]
"#,
    ))
    .unwrap_or_else(|e| panic!("build failed: {e}"));

    match route(&sitemap, "/?k=abc").unwrap() {
        Completion::Dispatch {
            dispatch: Dispatch::Continuation { id },
        } => assert_eq!(id, "abc"),
        other => panic!("expected a continuation, got {other:?}"),
    }

    // Empty continuation id falls back to the function.
    for target in ["/", "/?k="] {
        match route(&sitemap, target).unwrap() {
            Completion::Dispatch {
                dispatch: Dispatch::Redirect { target, .. },
            } => assert_eq!(target, "/login"),
            other => panic!("expected a redirect, got {other:?}"),
        }
    }
}

#[test]
fn test_resource_call_with_parameters() {
    let sitemap = build(
        r#"
[[resources]]
name = "page"
[[resources.children]]
kind = "generate"
src = "docs/{name}.xml"
[[resources.children]]
kind = "serialize"

[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "/page/*"
[[pipelines.children.children]]
kind = "call"
resource = "page"
arguments = [{ name = "name", value = "{1}" }]
"#,
    );

    let page = pipeline(route(&sitemap, "/page/intro").unwrap());
    assert_eq!(page.generator.unwrap().source.as_deref(), Some("docs/intro.xml"));
}

#[test]
fn test_resource_recursion_is_bounded() {
    let sitemap = build(
        r#"
[settings]
max_call_depth = 4

[[resources]]
name = "loop"
[[resources.children]]
kind = "call"
resource = "loop"

[[pipelines]]
[[pipelines.children]]
kind = "call"
resource = "loop"
"#,
    );

    let err = route(&sitemap, "/").unwrap_err();
    assert!(matches!(err.root(), SitemapError::RecursionLimit(4)));
}

#[test]
fn test_handle_errors_replaces_pipeline() {
    let pool = Arc::new({
        let mut m = manager();
        m.register_action("boom", RecordingAction::new(Behavior::Fail("database down")));
        m
    });
    let sitemap = build_with(
        pool,
        r#"
[[pipelines]]
[[pipelines.handle_errors]]
kind = "match"
pattern = "/recover"
[[pipelines.handle_errors.children]]
kind = "generate"
src = "error.xml"
parameters = { message = "{../message}", at = "{../location}" }
[[pipelines.handle_errors.children]]
kind = "serialize"
status_code = "500"

[[pipelines.children]]
kind = "generate"
src = "page.xml"
[[pipelines.children]]
kind = "act"
type = "boom"
[[pipelines.children.children]]
kind = "serialize"
"#,
    )
    .unwrap();

    let mut env = RequestEnvironment::from_target("/recover");
    let recovered = pipeline(sitemap.process(&mut env, CancelToken::new()).unwrap());
    let generator = recovered.generator.unwrap();
    assert_eq!(generator.source.as_deref(), Some("error.xml"));
    assert_eq!(
        generator.parameters.get("message").map(String::as_str),
        Some("action 'boom' failed: database down")
    );
    assert_eq!(generator.parameters.get("at").map(String::as_str), Some("pipelines[0]/act[1]"));
    assert_eq!(env.status(), Some(500));

    // Handler that does not handle: the original error propagates.
    let err = route(&sitemap, "/other").unwrap_err();
    assert!(matches!(err.root(), SitemapError::ComponentInvocation { .. }));
}

#[test]
fn test_internal_only_section() {
    let sitemap = build(
        r#"
[[pipelines]]
internal_only = true
[[pipelines.children]]
kind = "generate"
src = "internal"
[[pipelines.children]]
kind = "serialize"

[[pipelines]]
[[pipelines.children]]
kind = "generate"
src = "public"
[[pipelines.children]]
kind = "serialize"
"#,
    );

    let external = pipeline(route(&sitemap, "/").unwrap());
    assert_eq!(external.generator.unwrap().source.as_deref(), Some("public"));

    let internal = pipeline(route_env(&sitemap, RequestEnvironment::from_target("/").internal()).unwrap());
    assert_eq!(internal.generator.unwrap().source.as_deref(), Some("internal"));
}

#[test]
fn test_cacheable_section_computes_key() {
    let sitemap = build(
        r#"
[[pipelines]]
cacheable = true
expires_secs = 60
[[pipelines.children]]
kind = "match"
pattern = "/*"
[[pipelines.children.children]]
kind = "generate"
src = "{1}.xml"
[[pipelines.children.children]]
kind = "serialize"
"#,
    );

    let first = pipeline(route(&sitemap, "/a").unwrap());
    let again = pipeline(route(&sitemap, "/a").unwrap());
    let other = pipeline(route(&sitemap, "/b").unwrap());

    let key = first.cache_key.clone().unwrap();
    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(first.expires_secs, Some(60));
    assert_eq!(again.cache_key, first.cache_key);
    assert_ne!(other.cache_key, first.cache_key);
}

#[test]
fn test_link_transformers_inserted() {
    let sitemap = build(DOCS);

    let translated = route_env(
        &sitemap,
        RequestEnvironment::from_target("/docs/intro.html").with_attribute("link-translation", "true"),
    )
    .unwrap();
    assert_eq!(transformer_types(&pipeline(translated)), vec!["xslt", "link-translator"]);

    let both = route_env(
        &sitemap,
        RequestEnvironment::from_target("/docs/intro.html")
            .with_attribute("link-translation", "1")
            .with_attribute("link-gathering", "yes"),
    )
    .unwrap();
    assert_eq!(
        transformer_types(&pipeline(both)),
        vec!["xslt", "link-gatherer", "link-translator"]
    );

    let off = route_env(
        &sitemap,
        RequestEnvironment::from_target("/docs/intro.html").with_attribute("link-translation", "false"),
    )
    .unwrap();
    assert_eq!(transformer_types(&pipeline(off)), vec!["xslt"]);
}

#[test]
fn test_unparsable_status_is_ignored() {
    let sitemap = build(
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "generate"
[[pipelines.children]]
kind = "serialize"
status_code = "{request-param:status}"
"#,
    );

    let mut env = RequestEnvironment::from_target("/?status=abc");
    let garbage = pipeline(sitemap.process(&mut env, CancelToken::new()).unwrap());
    assert_eq!(garbage.output.unwrap().status, None);
    assert_eq!(env.status(), None);

    let mut env = RequestEnvironment::from_target("/?status=404");
    let not_found = pipeline(sitemap.process(&mut env, CancelToken::new()).unwrap());
    assert_eq!(not_found.output.unwrap().status, Some(404));
    assert_eq!(env.status(), Some(404));
}

#[test]
fn test_reader_is_source_and_output() {
    let sitemap = build(
        r#"
[[pipelines]]
[[pipelines.children]]
kind = "match"
pattern = "/static/**"
[[pipelines.children.children]]
kind = "read"
src = "public/{1}"
"#,
    );

    let read = pipeline(route(&sitemap, "/static/css/site.css").unwrap());
    assert!(read.generator.is_none());
    assert_eq!(read.reader.unwrap().source.as_deref(), Some("public/css/site.css"));
    let output = read.output.unwrap();
    assert_eq!(output.kind, "resource");
    assert_eq!(output.mime_type.as_deref(), Some("application/octet-stream"));
}

#[test]
fn test_concurrent_requests_do_not_share_state() {
    let sitemap = Arc::new(build(DOCS));

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let sitemap = Arc::clone(&sitemap);
            scope.spawn(move || {
                for round in 0..50 {
                    let page = format!("p{worker}-{round}");

                    let docs = pipeline(route(&sitemap, &format!("/docs/{page}.html")).unwrap());
                    let expected = format!("content/{page}.xml");
                    assert_eq!(
                        docs.generator.unwrap().source.as_deref(),
                        Some(expected.as_str())
                    );

                    match route(&sitemap, &format!("/a/{page}")).unwrap() {
                        Completion::Dispatch {
                            dispatch: Dispatch::Redirect { target, .. },
                        } => assert_eq!(target, format!("/b/{page}")),
                        other => panic!("expected a redirect, got {other:?}"),
                    }
                }
            });
        }
    });
}
