//! Runtime tests over compiled templates.
//!
//! Each test compiles a template, builds a page over the compiled markup and
//! checks the rendered document after one or more refreshes.

use serde_json::json;
use sinopia_armature::parse;
use sinopia_atelier::{compile_template, CompilerOptions};
use sinopia_fresco::script::{compile_function, instantiate};
use sinopia_fresco::{Environment, EvalError, JsValue, Page, PageError, ScopeId};
use sinopia_relief::{ScopeDescriptor, ValueDescriptor};

fn page_with(src: &str, environment: Environment) -> Page {
    let compiled = compile_template(src, &CompilerOptions::default());
    assert!(!compiled.has_errors(), "{:?}", compiled.errors);
    let (doc, _) = parse(&compiled.markup);
    Page::new(doc, &compiled.root, environment).unwrap()
}

fn page(src: &str) -> Page {
    page_with(src, Environment::default())
}

fn rendered(src: &str) -> String {
    let mut page = page(src);
    page.refresh();
    page.to_html()
}

fn get(page: &mut Page, scope: ScopeId, name: &str) -> String {
    page.accessor(scope).get(name).unwrap().to_string()
}

fn scope(page: &Page, id: &str) -> ScopeId {
    page.find_scope(id)
        .unwrap_or_else(|| panic!("no scope `{id}`"))
}

/// Every edge is recorded on both ends.
fn assert_edges_mutual(page: &Page) {
    for (id, value) in page.iter_values() {
        for up in value.upstream() {
            let up = page.value(up).unwrap();
            assert!(up.downstream().any(|d| d == id), "{} -> {}", value.key(), up.key());
        }
        for down in value.downstream() {
            let down = page.value(down).unwrap();
            assert!(down.upstream().any(|u| u == id), "{} <- {}", value.key(), down.key());
        }
    }
}

// =============================================================================
// Values
// =============================================================================

mod values {
    use super::*;

    #[test]
    fn attribute_follows_literal() {
        let mut page = page(r#"<div v=[[x]] w=[[y]] :x="1" :y="2"></div>"#);
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" v="1" w="2"></div>"#);

        let root = page.root();
        let w = page.scope(root).unwrap().value("attr_w").unwrap();
        page.accessor(root).set("x", 5).unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" v="5" w="2"></div>"#);
        assert_eq!(page.value(w).unwrap().cached().to_string(), "2");
        assert_eq!(get(&mut page, root, "x"), "5");
    }

    #[test]
    fn declared_value_reflects_as_attribute() {
        let mut page = page(r#"<div :v=[[x]] :x="1"></div>"#);
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" v="1"></div>"#);

        let root = page.root();
        page.accessor(root).set("x", 5).unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" v="5"></div>"#);
        assert_eq!(get(&mut page, root, "v"), "5");
    }

    #[test]
    fn statement_sequence_returns_last_expression() {
        insta::assert_snapshot!(
            rendered(r#"<p :a="2">[[ let t = a * 2; t + 1 ]]</p>"#),
            @r#"<p data-sn="0"><!--t:0-->5<!--/t:0--></p>"#
        );
    }

    #[test]
    fn leading_call_statement() {
        insta::assert_snapshot!(
            rendered(r#"<p :a="3">[[ double(a); function double(k) { return k * 2 } double(a) + 1 ]]</p>"#),
            @r#"<p data-sn="0"><!--t:0-->7<!--/t:0--></p>"#
        );

        let mut page = page(r#"<p :items="[]" :n="4">[[ items.push(n); items.length ]]</p>"#);
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<p data-sn="0"><!--t:0-->1<!--/t:0--></p>"#);
    }

    #[test]
    fn null_removes_attribute() {
        let mut page = page(r#"<a href=[[link]] :link="/home"></a>"#);
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<a data-sn="0" href="/home"></a>"#);

        let root = page.root();
        page.accessor(root).set("link", JsValue::Null).unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<a data-sn="0"></a>"#);
    }

    #[test]
    fn hyphenated_attribute() {
        insta::assert_snapshot!(
            rendered(r#"<div data-item-id="[[ 40 + 2 ]]"></div>"#),
            @r#"<div data-sn="0" data-item-id="42"></div>"#
        );
    }

    #[test]
    fn text_placeholders() {
        insta::assert_snapshot!(
            rendered(r#"<p :name="Ada">Hello, [[ name ]]! <b>[[ missing ]]</b></p>"#),
            @r#"<p data-sn="0"><!--t:0-->Hello, Ada! <!--/t:0--><b><!--t:1--><!--/t:1--></b></p>"#
        );
    }

    #[test]
    fn read_between_refreshes_is_fresh() {
        let mut page = page(r#"<div v="[[ x * 2 ]]" :x="1"></div>"#);
        page.refresh();
        let root = page.root();
        page.accessor(root).set("x", 4).unwrap();

        assert_eq!(get(&mut page, root, "attr_v"), "8");
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" v="8"></div>"#);
    }

    #[test]
    fn set_detaches_formula() {
        let mut page = page(r#"<div :x="1" :y="[[ x + 1 ]]" v=[[y]]></div>"#);
        page.refresh();
        let root = page.root();
        assert_eq!(get(&mut page, root, "y"), "2");

        page.accessor(root).set("y", 10).unwrap();
        page.accessor(root).set("x", 3).unwrap();
        page.refresh();
        assert_eq!(get(&mut page, root, "y"), "10");
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" y="10" v="10"></div>"#);

        let y = page.scope(root).unwrap().value("y").unwrap();
        assert!(!page.value(y).unwrap().is_computed());
        assert_eq!(page.value(y).unwrap().upstream().count(), 0);
    }

    #[test]
    fn unknown_name_is_declared_on_write() {
        let mut page = page(r#"<div v="[[ typeof later ]]"></div>"#);
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" v="undefined"></div>"#);

        let root = page.root();
        page.accessor(root).set("later", "now").unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" v="string"></div>"#);
    }

    #[test]
    fn reserved_properties_are_read_only() {
        let mut page = page("<div></div>");
        let root = page.root();
        let err = page.accessor(root).set("$outer", 1).unwrap_err();
        assert!(matches!(err, EvalError::Type(_)));
        assert!(page.accessor(root).get("$outer").unwrap().is_nullish());
    }
}

// =============================================================================
// Scopes
// =============================================================================

mod scopes {
    use super::*;

    #[test]
    fn shadowed_name_reads_outer() {
        insta::assert_snapshot!(
            rendered(r#"<div :v="7"><p :v="[[ v ]]">[[ v ]]</p></div>"#),
            @r#"<div data-sn="0"><p data-sn="1" v="7"><!--t:0-->7<!--/t:0--></p></div>"#
        );
        insta::assert_snapshot!(
            rendered(r#"<div :v="1"><p :v="[[ v + 1 ]]">[[ v ]]</p></div>"#),
            @r#"<div data-sn="0"><p data-sn="1" v="2"><!--t:0-->2<!--/t:0--></p></div>"#
        );
    }

    #[test]
    fn shadowed_name_links_to_outer() {
        let mut page = page(r#"<div :v="1"><p :v="[[ v + 1 ]]"></p></div>"#);
        page.refresh();
        let outer = page.scope(page.root()).unwrap().value("v").unwrap();
        let p = scope(&page, "1");
        let inner = page.scope(p).unwrap().value("v").unwrap();
        let upstream: Vec<_> = page.value(inner).unwrap().upstream().collect();
        assert_eq!(upstream, [outer]);
    }

    #[test]
    fn child_reads_ancestor() {
        insta::assert_snapshot!(
            rendered(r#"<main :who="world"><section :depth="2"><p :x="1">[[ who ]] [[ depth ]]</p></section></main>"#),
            @r#"<main data-sn="0"><section data-sn="1"><p data-sn="2"><!--t:0-->world 2<!--/t:0--></p></section></main>"#
        );
    }

    #[test]
    fn named_scope() {
        let mut page = page(r#"<div><p :aka="row" :x="3"></p><span>[[ row.x ]]</span></div>"#);
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><p data-sn="1"></p><span><!--t:0-->3<!--/t:0--></span></div>"#);

        let root = page.root();
        let p = scope(&page, "1");
        assert!(matches!(page.accessor(root).get("row").unwrap(), JsValue::Scope(s) if s == p));
        assert!(matches!(page.accessor(p).get("$outer").unwrap(), JsValue::Scope(s) if s == root));
    }

    #[test]
    fn template_children_stay_inert() {
        let mut page = page(r#"<div><template><b :x="[[ 1 ]]">[[ x ]]</b></template></div>"#);
        page.refresh();
        let template = scope(&page, "1");
        assert!(page.scope(template).unwrap().children().is_empty());
        assert!(page.find_scope("2").is_none());
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><template data-sn="1"><b data-sn="2"><!--t:0--><!--/t:0--></b></template></div>"#);
    }

    #[test]
    fn edges_are_mutual() {
        let mut page = page(
            r#"<div :a="1" :b="[[ a + 1 ]]" :c="[[ a + b ]]"><p :d="[[ c * 2 ]]">[[ a ]] [[ d ]]</p></div>"#,
        );
        page.refresh();
        assert_edges_mutual(&page);

        let p = scope(&page, "1");
        let d = page.scope(p).unwrap().value("d").unwrap();
        let c = page.scope(page.root()).unwrap().value("c").unwrap();
        assert!(page.value(c).unwrap().downstream().any(|v| v == d));

        page.unlink_value(d);
        assert_eq!(page.value(d).unwrap().upstream().count(), 0);
        assert!(!page.value(c).unwrap().downstream().any(|v| v == d));
        assert_edges_mutual(&page);
    }

    #[test]
    fn globals_from_environment() {
        let environment = Environment::new().with_global("greeting", json!("hello"));
        let mut page = page_with(r#"<p>[[ greeting ]] [[ Math.max(1, 2) ]]</p>"#, environment);
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<p data-sn="0"><!--t:0-->hello 2<!--/t:0--></p>"#);

        let root = page.root();
        page.accessor(root).set("greeting", "bye").unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<p data-sn="0"><!--t:0-->bye 2<!--/t:0--></p>"#);
        assert!(page.scope(root).unwrap().value("greeting").is_none());
    }
}

// =============================================================================
// Replication
// =============================================================================

mod replication {
    use super::*;

    const LIST: &str = r#"<ul :items="[]"><li :data="[[ items ]]">[[ data ]]</li></ul>"#;

    fn set_items(page: &mut Page, items: serde_json::Value) {
        let root = page.root();
        page.accessor(root).set("items", JsValue::from(items)).unwrap();
        page.refresh();
    }

    #[test]
    fn one_representation_per_element() {
        let mut page = page(LIST);
        set_items(&mut page, json!(["a", "b", "c"]));
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1.0"><!--t:0-->a<!--/t:0--></li><li data-sn="1.1"><!--t:0-->b<!--/t:0--></li><li data-sn="1"><!--t:0-->c<!--/t:0--></li></ul>"#);

        let template = scope(&page, "1");
        assert_eq!(page.scope(template).unwrap().clones().len(), 2);
        for (id, item) in [("1.0", "a"), ("1.1", "b"), ("1", "c")] {
            let s = scope(&page, id);
            assert_eq!(get(&mut page, s, "data"), item);
        }
        assert_edges_mutual(&page);
    }

    #[test]
    fn shrink_disposes_from_the_end() {
        let mut page = page(LIST);
        set_items(&mut page, json!([1, 2, 3, 4]));
        let template = scope(&page, "1");
        let kept = scope(&page, "1.0");
        assert_eq!(page.scope(template).unwrap().clones().len(), 3);

        set_items(&mut page, json!([5, 6]));
        assert_eq!(page.scope(template).unwrap().clones(), [kept]);
        assert!(page.find_scope("1.1").is_none());
        assert!(page.find_scope("1.2").is_none());
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1.0"><!--t:0-->5<!--/t:0--></li><li data-sn="1"><!--t:0-->6<!--/t:0--></li></ul>"#);
        assert_edges_mutual(&page);
    }

    #[test]
    fn grow_after_shrink() {
        let mut page = page(LIST);
        set_items(&mut page, json!(["x"]));
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1"><!--t:0-->x<!--/t:0--></li></ul>"#);

        set_items(&mut page, json!(["p", "q", "r"]));
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1.0"><!--t:0-->p<!--/t:0--></li><li data-sn="1.1"><!--t:0-->q<!--/t:0--></li><li data-sn="1"><!--t:0-->r<!--/t:0--></li></ul>"#);
    }

    #[test]
    fn empty_list_hides_template() {
        let mut page = page(LIST);
        set_items(&mut page, json!([]));
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1" hidden><!--t:0--><!--/t:0--></li></ul>"#);
        let template = scope(&page, "1");
        assert!(page.scope(template).unwrap().is_hidden());
        assert!(page.accessor(template).get("data").unwrap().is_nullish());

        set_items(&mut page, json!(["back"]));
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1"><!--t:0-->back<!--/t:0--></li></ul>"#);
    }

    #[test]
    fn non_array_source_passes_through() {
        let mut page = page(LIST);
        set_items(&mut page, json!("solo"));
        let template = scope(&page, "1");
        assert!(page.scope(template).unwrap().clones().is_empty());
        assert_eq!(get(&mut page, template, "data"), "solo");
    }

    #[test]
    fn clones_keep_their_own_index() {
        let mut page = page(r#"<ul :items="[]"><li :data="[[ items ]]" title="[[ data.name ]]"></li></ul>"#);
        set_items(&mut page, json!([{ "name": "one" }, { "name": "two" }]));
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1.0" title="one"></li><li data-sn="1" title="two"></li></ul>"#);

        set_items(&mut page, json!([{ "name": "uno" }, { "name": "dos" }]));
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1.0" title="uno"></li><li data-sn="1" title="dos"></li></ul>"#);
    }

    #[test]
    fn nested_lists() {
        let mut page = page(
            r#"<div :rows="[]"><p :data="[[ rows ]]"><b :data="[[ data ]]">[[ data ]]</b></p></div>"#,
        );
        let root = page.root();
        page.accessor(root)
            .set("rows", JsValue::from(json!([[1, 2], [3]])))
            .unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><p data-sn="1.0"><b data-sn="1.0/2.0"><!--t:0-->1<!--/t:0--></b><b data-sn="1.0/2"><!--t:0-->2<!--/t:0--></b></p><p data-sn="1"><b data-sn="2"><!--t:0-->3<!--/t:0--></b></p></div>"#);
        assert_edges_mutual(&page);
    }

    #[test]
    fn in_place_push_is_seen_by_the_next_refresh() {
        let mut page = page(
            r#"<ul :items="[]" :on-add="[[ () => items.push('new') ]]"><li :data="[[ items ]]">[[ data ]]</li></ul>"#,
        );
        set_items(&mut page, json!(["old"]));
        let root = page.root();
        let element = page.scope(root).unwrap().element();
        page.dispatch_event(element, "add", JsValue::Undefined).unwrap();
        insta::assert_snapshot!(page.to_html(), @r#"<ul data-sn="0"><li data-sn="1.0"><!--t:0-->old<!--/t:0--></li><li data-sn="1"><!--t:0-->new<!--/t:0--></li></ul>"#);
    }
}

// =============================================================================
// Structure
// =============================================================================

mod structure {
    use super::*;

    fn badge() -> ScopeDescriptor {
        let mut badge = ScopeDescriptor::new("9");
        badge.inline_markup = Some("<span></span>".to_string());
        badge.values.push(ValueDescriptor::computed(
            "attr_title",
            "function () { return (this.label); }",
            vec!["label".to_string()],
        ));
        badge
    }

    #[test]
    fn mount_and_dispose() {
        let mut page = page(r#"<div :label="hi"></div>"#);
        let root = page.root();
        let mounted = page.mount(root, &badge()).unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><span data-sn="9" title="hi"></span></div>"#);

        let label = page.scope(root).unwrap().value("label").unwrap();
        assert_eq!(page.value(label).unwrap().downstream().count(), 1);

        page.dispose(mounted).unwrap();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"></div>"#);
        assert!(page.find_scope("9").is_none());
        assert!(page.scope(mounted).is_none());
        assert_eq!(page.value(label).unwrap().downstream().count(), 0);
        assert!(page.scope(root).unwrap().children().is_empty());
    }

    #[test]
    fn root_cannot_be_disposed() {
        let mut page = page("<div></div>");
        let root = page.root();
        assert!(matches!(page.dispose(root), Err(PageError::RootDisposal)));
    }

    #[test]
    fn dom_selector_binding() {
        let mut page = page(r#"<div :n="4"><em class="count"></em></div>"#);
        let root = page.root();
        let mut counter = ScopeDescriptor::new("5");
        counter.dom_selector = Some("em.count".to_string());
        counter.values.push(ValueDescriptor::computed(
            "attr_dataN",
            "function () { return (this.n); }",
            vec!["n".to_string()],
        ));
        page.mount(root, &counter).unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><em class="count" data-sn="5" data-n="4"></em></div>"#);
    }

    #[test]
    fn missing_element() {
        let mut page = page("<div></div>");
        let root = page.root();
        let mut ghost = ScopeDescriptor::new("3");
        ghost.dom_selector = Some("article".to_string());
        assert!(matches!(page.mount(root, &ghost), Err(PageError::MissingElement(id)) if id == "3"));

        let mut empty = ScopeDescriptor::new("4");
        empty.inline_markup = Some("just text".to_string());
        assert!(matches!(page.mount(root, &empty), Err(PageError::InlineMarkup { .. })));
    }

    #[test]
    fn explicit_clone() {
        let mut page = page(r#"<div><p :x="1">[[ x ]]</p></div>"#);
        page.refresh();
        let p = scope(&page, "1");
        assert!(matches!(
            page.clone_scope(p, 1),
            Err(PageError::CloneIndex { index: 1, expected: 0, .. })
        ));

        let clone = page.clone_scope(p, 0).unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><p data-sn="1.0"><!--t:0-->1<!--/t:0--></p><p data-sn="1"><!--t:0-->1<!--/t:0--></p></div>"#);

        page.accessor(clone).set("x", 2).unwrap();
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><p data-sn="1.0"><!--t:0-->2<!--/t:0--></p><p data-sn="1"><!--t:0-->1<!--/t:0--></p></div>"#);

        let root = page.root();
        assert!(matches!(page.clone_scope(root, 0), Err(PageError::NotClonable(_))));
        page.dispose(clone).unwrap();
        assert!(page.scope(p).unwrap().clones().is_empty());
    }
}

// =============================================================================
// Refresh
// =============================================================================

mod refresh {
    use super::*;

    #[test]
    fn nested_refresh_counts_once() {
        let mut page = page(r#"<div :n="1" v="[[ ($refresh(), n) ]]"></div>"#);
        page.refresh();
        assert_eq!(page.refresh_count(), 1);
        assert!(!page.is_refreshing());
        assert!(page.last_error().is_none());
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" v="1"></div>"#);

        page.refresh();
        assert_eq!(page.refresh_count(), 2);
    }

    #[test]
    fn errors_abort_and_are_swallowed() {
        let mut page = page(r#"<div w="[[ 1 ]]" v="[[ boom() ]]" u="[[ 2 ]]"></div>"#);
        page.refresh();
        assert_eq!(page.refresh_count(), 0);
        assert!(matches!(
            page.last_error(),
            Some(PageError::Eval(EvalError::Type(_)))
        ));
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0" w="1"></div>"#);
    }

    #[test]
    fn oversized_array_is_a_swallowed_error() {
        let mut page = page(r#"<p :n="4294967295">[[ let a = []; a.length = n; a.length ]]</p>"#);
        page.refresh();
        assert_eq!(page.refresh_count(), 0);
        assert!(matches!(
            page.take_last_error(),
            Some(PageError::Eval(EvalError::Range(_)))
        ));

        let root = page.root();
        page.accessor(root).set("n", 3).unwrap();
        page.refresh();
        assert_eq!(page.refresh_count(), 1);
        assert!(page.last_error().is_none());
        insta::assert_snapshot!(page.to_html(), @r#"<p data-sn="0"><!--t:0-->3<!--/t:0--></p>"#);
    }

    #[test]
    fn refresh_from_subtree() {
        let mut page = page(r#"<div :a="1" x=[[a]]><p :b="2" y="[[ a + b ]]"></p></div>"#);
        let p = scope(&page, "1");
        page.refresh_from(p);
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><p data-sn="1" y="3"></p></div>"#);
        assert_eq!(page.refresh_count(), 1);
    }
}

// =============================================================================
// Events
// =============================================================================

mod events {
    use super::*;

    const COUNTER: &str = r#"<div :count="0" :seen="0" :on-click="[[ () => seen++ ]]"><button :on-click="[[ (e) => count++ ]]">[[ count ]]</button><i>[[ seen ]]</i></div>"#;

    fn button(page: &Page) -> sinopia_armature::NodeId {
        let s = scope(page, "1");
        page.scope(s).unwrap().element()
    }

    #[test]
    fn click_bubbles_and_refreshes() {
        let mut page = page(COUNTER);
        page.refresh();
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><button data-sn="1"><!--t:0-->0<!--/t:0--></button><i><!--t:0-->0<!--/t:0--></i></div>"#);

        let target = button(&page);
        assert_eq!(page.dispatch_event(target, "click", JsValue::Undefined).unwrap(), 2);
        insta::assert_snapshot!(page.to_html(), @r#"<div data-sn="0"><button data-sn="1"><!--t:0-->1<!--/t:0--></button><i><!--t:0-->1<!--/t:0--></i></div>"#);
        assert_eq!(page.refresh_count(), 2);
    }

    #[test]
    fn text_node_target_resolves_to_scope() {
        let mut page = page(COUNTER);
        page.refresh();
        let text = page.document().descendants(button(&page))[1];
        assert!(page.document().is_text(text));
        assert_eq!(page.scope_of_node(text), Some(scope(&page, "1")));
        page.dispatch_event(text, "click", JsValue::Undefined).unwrap();
        let root = page.root();
        assert_eq!(get(&mut page, root, "count"), "1");
    }

    #[test]
    fn cancel_bubble_stops_at_target() {
        let mut page = page(
            r#"<div :seen="0" :on-click="[[ () => seen++ ]]"><b :on-click="[[ (e) => { e.cancelBubble = true } ]]"></b></div>"#,
        );
        page.refresh();
        let b = scope(&page, "1");
        let element = page.scope(b).unwrap().element();
        assert_eq!(page.dispatch_event(element, "click", JsValue::Undefined).unwrap(), 1);
        let root = page.root();
        assert_eq!(get(&mut page, root, "seen"), "0");
    }

    #[test]
    fn registered_listener_sees_detail() {
        let mut page = page(r#"<div></div>"#);
        let root = page.root();
        let listener = instantiate(
            compile_function("function (e) { this.last = e.type + ':' + e.detail; }").unwrap(),
            None,
        );
        page.add_event_listener(root, "ping", listener).unwrap();
        let element = page.scope(root).unwrap().element();
        assert_eq!(page.dispatch_event(element, "ping", JsValue::from(7)).unwrap(), 1);
        assert_eq!(get(&mut page, root, "last"), "ping:7");
    }

    #[test]
    fn listener_errors_are_recorded() {
        let mut page = page(r#"<div :on-click="[[ () => nope() ]]"></div>"#);
        let root = page.root();
        let element = page.scope(root).unwrap().element();
        assert_eq!(page.dispatch_event(element, "click", JsValue::Undefined).unwrap(), 1);
        assert!(page.last_error().is_some());
    }

    #[test]
    fn node_outside_scopes() {
        let mut page = page("<div></div>");
        let document = page.document().root();
        assert!(matches!(
            page.dispatch_event(document, "click", JsValue::Undefined),
            Err(PageError::UnknownScope)
        ));
    }
}
