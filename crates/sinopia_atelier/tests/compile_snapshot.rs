//! Template compiler snapshot tests.
//!
//! These tests compare the rewritten markup and the descriptor tree against
//! inline snapshots.

use sinopia_atelier::{compile_template, CompilerOptions};

/// Helper to get the compiled markup and descriptor JSON
fn get_compiled(src: &str) -> String {
    let result = compile_template(src, &CompilerOptions::default());

    if result.has_errors() {
        panic!("Compilation errors: {:?}", result.errors);
    }

    format!(
        "{}\n---\n{}",
        result.markup,
        serde_json::to_string_pretty(&result.root).unwrap()
    )
}

// =============================================================================
// Static Element Tests
// =============================================================================

mod static_element {
    use super::*;

    #[test]
    fn simple_div() {
        insta::assert_snapshot!(get_compiled("<div></div>"), @r#"
        <div data-sn="0"></div>
        ---
        {
          "id": "0"
        }
        "#);
    }

    #[test]
    fn static_children_stay_in_root() {
        insta::assert_snapshot!(get_compiled("<main><p>a</p><br></main>"), @r#"
        <main data-sn="0"><p>a</p><br></main>
        ---
        {
          "id": "0"
        }
        "#);
    }
}

// =============================================================================
// Value Tests
// =============================================================================

mod values {
    use super::*;

    #[test]
    fn attribute_and_literal() {
        insta::assert_snapshot!(get_compiled(r#"<div v=[[x]] :x="1"></div>"#), @r#"
        <div data-sn="0"></div>
        ---
        {
          "id": "0",
          "values": [
            {
              "key": "attr_v",
              "evaluator": "function () { return (this.x); }",
              "referencedNames": [
                "x"
              ]
            },
            {
              "key": "x",
              "literal": 1
            }
          ]
        }
        "#);
    }

    #[test]
    fn text_placeholder() {
        insta::assert_snapshot!(get_compiled("<p>Hi [[ name ]]!</p>"), @r#"
        <p data-sn="0"><!--t:0--><!--/t:0--></p>
        ---
        {
          "id": "0",
          "values": [
            {
              "key": "text_0",
              "evaluator": "function () { return ('Hi '+__nn(( this.name ))+'!'); }",
              "referencedNames": [
                "name"
              ]
            }
          ]
        }
        "#);
    }

    #[test]
    fn listener() {
        insta::assert_snapshot!(get_compiled(r#"<button :on-click="[[ (e) => count++ ]]">+</button>"#), @r#"
        <button data-sn="0">+</button>
        ---
        {
          "id": "0",
          "values": [
            {
              "key": "on_click",
              "evaluator": "(e) => this.count++",
              "passive": true,
              "referencedNames": [
                "count"
              ]
            }
          ]
        }
        "#);
    }
}

// =============================================================================
// Scope Tests
// =============================================================================

mod scopes {
    use super::*;

    #[test]
    fn shadowed_name_reads_outer() {
        insta::assert_snapshot!(get_compiled(r#"<div :v="1"><p :v="[[ v + 1 ]]">[[ v ]]</p></div>"#), @r#"
        <div data-sn="0"><p data-sn="1"><!--t:0--><!--/t:0--></p></div>
        ---
        {
          "id": "0",
          "values": [
            {
              "key": "v",
              "literal": 1
            }
          ],
          "children": [
            {
              "id": "1",
              "values": [
                {
                  "key": "v",
                  "evaluator": "function () { return (this.$outer.v + 1); }",
                  "reflect": true,
                  "referencedNames": [
                    "v"
                  ]
                },
                {
                  "key": "text_0",
                  "evaluator": "function () { return (this.v); }",
                  "referencedNames": [
                    "v"
                  ]
                }
              ]
            }
          ]
        }
        "#);
    }

    #[test]
    fn list_source() {
        insta::assert_snapshot!(get_compiled(r#"<ul><li :aka="row" :data="[[ items ]]">[[ data.label ]]</li></ul>"#), @r#"
        <ul data-sn="0"><li data-sn="1"><!--t:0--><!--/t:0--></li></ul>
        ---
        {
          "id": "0",
          "children": [
            {
              "id": "1",
              "name": "row",
              "values": [
                {
                  "key": "data",
                  "evaluator": "function () { return (this.items); }",
                  "referencedNames": [
                    "items"
                  ]
                },
                {
                  "key": "text_0",
                  "evaluator": "function () { return (this.data.label); }",
                  "referencedNames": [
                    "data"
                  ]
                }
              ]
            }
          ]
        }
        "#);
    }

    #[test]
    fn template_is_a_scope_boundary() {
        insta::assert_snapshot!(get_compiled("<div><template><b>[[ x ]]</b></template></div>"), @r#"
        <div data-sn="0"><template data-sn="1"><b><!--t:0--><!--/t:0--></b></template></div>
        ---
        {
          "id": "0",
          "children": [
            {
              "id": "1",
              "values": [
                {
                  "key": "text_0",
                  "evaluator": "function () { return (this.x); }",
                  "referencedNames": [
                    "x"
                  ]
                }
              ]
            }
          ]
        }
        "#);
    }
}

// =============================================================================
// Scoping Rules
// =============================================================================

mod scoping {
    use sinopia_atelier::qualify_value;
    use sinopia_carton::FxHashSet;

    fn is_rewritten(source: &str, name: &str) -> bool {
        let mut refs = FxHashSet::default();
        let out = qualify_value(source, None, &mut refs).unwrap();
        out.contains(&format!("this.{name}")) && refs.contains(name)
    }

    #[test]
    fn var_in_nested_block_is_local() {
        for source in [
            "{ var n = 1; } n",
            "if (a) { { var n = 1; } } n",
            "for (var n = 0; n < 3; n++) {} n",
            "try { var n = 1 } catch (e) {} n",
            "(() => { { var n = 1; } return n; })()",
        ] {
            assert!(!is_rewritten(source, "n"), "{source}");
        }
    }

    #[test]
    fn let_and_const_in_nested_block_escape() {
        for source in [
            "{ let n = 1; } n",
            "{ const n = 1; } n",
            "if (a) { let n = 1; } n",
            "for (let n = 0; n < 3; n++) {} n",
            "{ class n {} } n",
        ] {
            assert!(is_rewritten(source, "n"), "{source}");
        }
    }

    #[test]
    fn parameters_are_local_only_inside() {
        assert!(!is_rewritten("((n) => n)(1)", "n"));
        assert!(is_rewritten("((m) => m)(n)", "n"));
        assert!(is_rewritten("function f(n) {} n", "n"));
    }
}
