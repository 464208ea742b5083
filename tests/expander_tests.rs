//! Expansion pipeline tests: local generator definitions, `mix`, `map`,
//! cache lifetime, the expansion trace, and the error taxonomy.

use ctex::{BufferSink, ErrorType, Expander, Provenance, Value};

fn as_numbers(v: &Value) -> Vec<f64> {
    match v {
        Value::Array(items) => items
            .borrow()
            .iter()
            .map(|v| match v {
                Value::Number(n) => *n,
                other => panic!("expected number, got {}", other.type_name()),
            })
            .collect(),
        other => panic!("expected array, got {}", other.type_name()),
    }
}

const PERMUTATIONS: &str = r#"function ( a, b, c, d )
{
    ct.def( function expr( sx, sy, sz ) {
        return '('+sx+'+'+sy+')/('+sy+'-'+sz+')*'+sz+'*'+sz;
    }).ct;

    return [
        ct.expr( 'a', 'b', 'c' ).ct
        , ct.expr( 'a', 'c', 'b' ).ct
        , ct.expr( 'b', 'a', 'c' ).ct
        , ct.expr( 'b', 'c', 'a' ).ct
        , ct.expr( 'c', 'a', 'b' ).ct
        , ct.expr( 'c', 'b', 'a' ).ct
    ];
}"#;

#[test]
fn local_generator_produces_the_permutation_table() {
    let mut expander = Expander::new();
    let produced = expander.expand(PERMUTATIONS).unwrap();

    // The definition is erased and the generated expressions spliced in.
    assert!(!produced.source().contains("ct.def"));
    assert!(produced.source().contains("(a+b)/(b-c)*c*c"));
    assert!(produced.source().contains("(c+b)/(b-a)*a*a"));

    let out = expander
        .call(
            &produced,
            &[
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
                Value::Number(4.0),
            ],
        )
        .unwrap();
    assert_eq!(as_numbers(&out), vec![-27.0, 16.0, -13.5, 2.5, -16.0, 5.0]);
}

#[test]
fn map_over_a_local_generator_matches_explicit_calls() {
    let mut expander = Expander::new();
    let produced = expander
        .expand(
            r#"function ( a, b, c, d )
{
    ct.def( function expr( sx, sy, sz ) {
        return '('+sx+'+'+sy+')/('+sy+'-'+sz+')*'+sz+'*'+sz;
    }).ct;

    return ct.map(expr)([
        [ 'a', 'b', 'c' ]
        , [ 'a', 'c', 'b' ]
        , [ 'b', 'a', 'c' ]
        , [ 'b', 'c', 'a' ]
        , [ 'c', 'a', 'b' ]
        , [ 'c', 'b', 'a' ]
    ]).ct;
}"#,
        )
        .unwrap();

    let out = expander
        .call(
            &produced,
            &[
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
                Value::Number(4.0),
            ],
        )
        .unwrap();
    assert_eq!(as_numbers(&out), vec![-27.0, 16.0, -13.5, 2.5, -16.0, 5.0]);
}

#[test]
fn emap_over_an_array_agrees_with_map() {
    let mut expander = Expander::new();
    let produced = expander
        .expand(
            r#"function ( a, b, c, d )
{
    ct.def( function expr( sx, sy, sz ) {
        return '('+sx+'+'+sy+')/('+sy+'-'+sz+')*'+sz+'*'+sz;
    }).ct;

    return ct.emap(expr)([
        [ 'a', 'b', 'c' ]
        , [ 'a', 'c', 'b' ]
        , [ 'b', 'a', 'c' ]
        , [ 'b', 'c', 'a' ]
        , [ 'c', 'a', 'b' ]
        , [ 'c', 'b', 'a' ]
    ]).ct;
}"#,
        )
        .unwrap();

    let out = expander
        .call(
            &produced,
            &[
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0),
                Value::Number(4.0),
            ],
        )
        .unwrap();
    assert_eq!(as_numbers(&out), vec![-27.0, 16.0, -13.5, 2.5, -16.0, 5.0]);
}

#[test]
fn mix_splices_the_result_of_a_helper_call() {
    let (sink, buffer) = BufferSink::new();
    let mut expander = Expander::with_output(Box::new(sink));
    expander
        .evaluator_mut()
        .run(
            "function _wr(name) { return 'print(' + '\"' + name + '\", ' + name + ')'; }",
            "helpers",
        )
        .unwrap();

    let produced = expander
        .expand("function (x) { ct.mix(_wr('x')).ct; }")
        .unwrap();
    assert!(produced.source().contains("print(\"x\", x)"));

    expander.call(&produced, &[Value::Number(123.0)]).unwrap();
    expander.call(&produced, &[Value::Number(456.0)]).unwrap();
    assert_eq!(buffer.borrow().as_str(), "x 123\nx 456\n");
}

#[test]
fn def_accepts_the_name_comma_form() {
    let mut expander = Expander::new();
    let produced = expander
        .expand(
            "function (x) { ct.def(dbl, function (s) { return '(' + s + ')*2'; }).ct; return ct.dbl('x').ct; }",
        )
        .unwrap();
    assert!(produced.source().contains("return (x)*2;"));
    let out = expander.call(&produced, &[Value::Number(10.0)]).unwrap();
    match out {
        Value::Number(n) => assert_eq!(n, 20.0),
        other => panic!("expected number, got {}", other.type_name()),
    }
}

#[test]
fn local_definitions_do_not_leak_across_expansions() {
    let mut expander = Expander::new();
    expander
        .expand("function () { ct.def(function g() { return '1'; }).ct; return ct.g().ct; }")
        .unwrap();

    let err = expander
        .expand("function () { return ct.g().ct; }")
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::UnknownMacro);
}

#[test]
fn a_local_definition_shadows_a_builtin_for_its_expansion() {
    let mut expander = Expander::new();
    let produced = expander
        .expand("function () { ct.def(function last(s) { return s; }).ct; return ct.last('7').ct; }")
        .unwrap();
    assert!(produced.source().contains("return 7;"));

    // The built-in is untouched for the next expansion.
    let expanded = expander.expand_text("ct.last(arr).ct").unwrap();
    assert_eq!(expanded, "(arr)[(arr).length - 1]");
}

#[test]
fn trace_records_every_substitution_with_provenance() {
    let mut expander = Expander::new();
    let (_, trace) = expander.expand_traced(PERMUTATIONS).unwrap();

    assert_eq!(trace.steps.len(), 7);
    assert_eq!(trace.steps[0].macro_name, "def");
    assert_eq!(trace.steps[0].provenance, Provenance::Builtin);
    assert_eq!(trace.steps[0].replacement, "");
    for step in &trace.steps[1..] {
        assert_eq!(step.macro_name, "expr");
        assert_eq!(step.provenance, Provenance::Local);
    }

    let json = serde_json::to_string(&trace).unwrap();
    assert!(json.contains("\"macro_name\":\"expr\""));
}

#[test]
fn non_function_results_display_their_value() {
    let mut expander = Expander::new();
    let produced = expander.expand("1 + ct.mix(2).ct").unwrap();
    assert_eq!(produced.source(), "1 + 2");
    assert_eq!(produced.to_string(), "(3)");
}

#[test]
fn plain_text_passes_through_untouched() {
    let mut expander = Expander::new();
    let expanded = expander
        .expand_text("var compact = octet + 1; // no invocations here")
        .unwrap();
    assert_eq!(expanded, "var compact = octet + 1; // no invocations here");
}

mod error_taxonomy {
    use super::*;

    fn expand_err(source: &str) -> ErrorType {
        Expander::new().expand(source).unwrap_err().error_type()
    }

    #[test]
    fn unknown_macro() {
        assert_eq!(expand_err("ct.nope(1).ct"), ErrorType::UnknownMacro);
    }

    #[test]
    fn unterminated_invocation() {
        assert_eq!(expand_err("ct.mix(1 + 2"), ErrorType::Unterminated);
    }

    #[test]
    fn def_without_a_name() {
        assert_eq!(
            expand_err("ct.def(function (x) { return x; }).ct"),
            ErrorType::MissingName
        );
    }

    #[test]
    fn def_of_a_non_function() {
        assert_eq!(expand_err("ct.def(q, 42).ct"), ErrorType::MustBeFunction);
    }

    #[test]
    fn template_with_a_bad_delimiter() {
        assert_eq!(expand_err("ct.tli(q).ct"), ErrorType::InvalidDelimiter);
    }

    #[test]
    fn obj_entry_with_two_colons() {
        assert_eq!(
            expand_err("ct.obj({a : b : c}).ct"),
            ErrorType::MalformedArgument
        );
    }

    #[test]
    fn opt_without_a_hop() {
        assert_eq!(expand_err("ct.opt(o).ct"), ErrorType::MalformedArgument);
    }

    #[test]
    fn expansion_time_evaluation_failure() {
        assert_eq!(expand_err("ct.mix(null.x).ct"), ErrorType::Eval);
    }

    #[test]
    fn unparseable_argument_expression() {
        assert_eq!(expand_err("ct.mix(1 +).ct"), ErrorType::Parse);
    }
}
