//! End-to-end tests of the embedded dialect through the public `Evaluator`.

use ctex::{Evaluator, Value};

fn run(source: &str) -> Value {
    let mut evaluator = Evaluator::new();
    evaluator.run(source, "test").unwrap()
}

fn as_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => *n,
        other => panic!("expected number, got {}", other.type_name()),
    }
}

fn as_str(v: &Value) -> String {
    match v {
        Value::Str(s) => s.clone(),
        other => panic!("expected string, got {}", other.type_name()),
    }
}

#[test]
fn recursion() {
    let v = run("function fact(n) { if (n <= 1) return 1; return n * fact(n - 1); } fact(6);");
    assert_eq!(as_number(&v), 720.0);
}

#[test]
fn closures_capture_by_reference() {
    let v = run(
        "var n = 0;
         function bump() { n += 1; return n; }
         bump(); bump(); bump();",
    );
    assert_eq!(as_number(&v), 3.0);
}

#[test]
fn object_writes_and_reads() {
    let v = run("var o = {}; o.a = 1; o['b'] = 2; o.a + o.b;");
    assert_eq!(as_number(&v), 3.0);
}

#[test]
fn array_assignment_grows_the_array() {
    let v = run("var a = []; a[0] = 'x'; a[2] = 'z'; a.length + '/' + (a[1] === null);");
    assert_eq!(as_str(&v), "3/true");
}

#[test]
fn update_operators() {
    let v = run("var i = 5; var a = i++; var b = ++i; a + '/' + b + '/' + i;");
    assert_eq!(as_str(&v), "5/7/7");
}

#[test]
fn conditional_and_comparisons() {
    let v = run("var x = 3 < 4 ? 'lo' : 'hi'; x;");
    assert_eq!(as_str(&v), "lo");
    let v = run("'abc' < 'abd';");
    assert!(matches!(v, Value::Bool(true)));
}

#[test]
fn strict_equality_is_identity_for_reference_types() {
    assert!(matches!(run("[1] == [1];"), Value::Bool(false)));
    assert!(matches!(run("var a = [1]; var b = a; a === b;"), Value::Bool(true)));
    assert!(matches!(run("1 === 1;"), Value::Bool(true)));
    assert!(matches!(run("'x' != 'x';"), Value::Bool(false)));
}

#[test]
fn in_operator() {
    assert!(matches!(run("'a' in {a : 1};"), Value::Bool(true)));
    assert!(matches!(run("'b' in {a : 1};"), Value::Bool(false)));
    assert!(matches!(run("'1' in [10, 20];"), Value::Bool(true)));
}

#[test]
fn for_in_over_an_array_yields_index_strings() {
    let v = run("var s = ''; for (var k in [7, 8, 9]) { s = s + k; } s;");
    assert_eq!(as_str(&v), "012");
}

#[test]
fn compound_assignment() {
    let v = run("var x = 10; x -= 3; x *= 2; x /= 7; x;");
    assert_eq!(as_number(&v), 2.0);
}

#[test]
fn string_length_and_indexing() {
    let v = run("var s = 'hello'; s.length + '/' + s[1];");
    assert_eq!(as_str(&v), "5/e");
}

#[test]
fn undefined_variable_reads_fail() {
    let mut evaluator = Evaluator::new();
    let err = evaluator.run("nope + 1;", "test").unwrap_err();
    assert_eq!(err.error_type(), ctex::ErrorType::Eval);
}

#[test]
fn function_values_stringify_to_their_source() {
    let v = run("function id(x) { return x; } id;");
    assert_eq!(v.to_display(), "function id(x) { return x; }");
}
