use expression_compiler::{Error, EvaluationError, Expression, LexicalError, ParseError, compile};

fn eval(src: &str) -> f64 {
    compile(src, &[])
        .unwrap_or_else(|e| panic!("{src:?} failed to compile: {e:?}"))
        .evaluate(&[])
        .unwrap_or_else(|e| panic!("{src:?} failed to evaluate: {e:?}"))
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(eval("2+3*4"), 14.0);
    assert_eq!(eval("2*3^2"), 18.0);
}

#[test]
fn subtraction_and_power_are_left_associative() {
    assert_eq!(eval("2-3-4"), -5.0);
    assert_eq!(eval("2^3^2"), 64.0);
}

#[test]
fn unary_minus_binds_tighter_than_power() {
    assert_eq!(eval("-2^2"), 4.0);
    assert_eq!(eval("-(2)^2"), 4.0);
}

#[test]
fn e_and_pi_are_predeclared() {
    assert_close(eval("e"), std::f64::consts::E);
    assert_close(eval("pi"), std::f64::consts::PI);
    assert!((eval("e") - 2.718281828).abs() < 1e-9);
    assert!((eval("pi") - 3.141592653).abs() < 1e-9);
}

#[test]
fn folding_a_constant_expression() {
    let mut expr = compile("(1+2)*3", &["x"]).unwrap();
    expr.optimize().unwrap();
    assert_eq!(expr.render(), "9");
    for x in [-1.0, 0.0, 12.5] {
        assert_eq!(expr.evaluate(&[x]), Ok(9.0));
    }
}

#[test]
fn partial_folding_keeps_variables_live() {
    let mut expr = compile("x+1*2", &["x"]).unwrap();
    assert_eq!(expr.render(), "(x + (1 * 2))");
    expr.optimize().unwrap();
    assert_eq!(expr.render(), "(x + 2)");
    assert_eq!(expr.evaluate(&[5.0]), Ok(7.0));
    assert_eq!(expr.evaluate(&[-2.0]), Ok(0.0));
}

#[test]
fn optimize_is_idempotent() {
    let mut expr = compile("sin(x) * (2 + 3) - max(1, 2, 3)", &["x"]).unwrap();
    expr.optimize().unwrap();
    let once = expr.render();
    let root = expr.root().clone();
    expr.optimize().unwrap();
    assert_eq!(expr.render(), once);
    assert_eq!(expr.root(), &root);
    assert_eq!(once, "((sin(x) * 5) - 3)");
}

#[test]
fn optimized_and_plain_agree_across_a_grid() {
    let src = "x^2 + y*(3 - 1) - sqrt(16) / 2 + atan2(y, 1 + 1)";
    let mut plain = compile(src, &["x", "y"]).unwrap();
    let mut folded = plain.clone();
    folded.optimize().unwrap();

    for i in -5_i32..=5 {
        for j in -5_i32..=5 {
            let values = [f64::from(i) * 0.5, f64::from(j) * 0.25];
            assert_eq!(plain.evaluate(&values), folded.evaluate(&values));
        }
    }
}

#[test]
fn undeclared_variable_is_a_compile_error() {
    let err = compile("x+y", &["x"]).unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::UndefinedVariable { .. })));
}

#[test]
fn unknown_function_is_a_compile_error() {
    let err = compile("foo(1,2)", &[]).unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::FunctionNotFound { .. })));
}

#[test]
fn unbalanced_brackets() {
    let err = compile("(1+2", &[]).unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::UnmatchedBracket { .. })));

    let err = compile("1+2)", &[]).unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::ExtraTokensAtEnd { .. })));
}

#[test]
fn lexical_errors_surface_from_compile() {
    let err = compile("1 & 2", &[]).unwrap_err();
    match err {
        Error::Lex(lex @ LexicalError::UnexpectedCharacter { token: '&', .. }) => {
            assert_eq!(lex.offset(), 2)
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn near_compares_with_tolerance() {
    assert_eq!(eval("near(1.0, 1.00000005)"), 1.0);
    assert_eq!(eval("near(1.0, 1.001)"), 0.0);
}

#[test]
fn division_by_zero_is_infinite() {
    assert_eq!(eval("1/0"), f64::INFINITY);
    assert_eq!(eval("-1/0"), f64::NEG_INFINITY);
    assert!(eval("0/0").is_nan());
}

#[test]
fn long_sums_compile_and_evaluate() {
    let source = vec!["1"; 5000].join("+");
    assert_eq!(eval(&source), 5000.0);

    let mut expr = compile(&format!("x{}", "+x".repeat(4999)), &["x"]).unwrap();
    assert_eq!(expr.evaluate(&[2.0]), Ok(10000.0));
    expr.optimize().unwrap();
    assert_eq!(expr.evaluate(&[3.0]), Ok(15000.0));
}

#[test]
fn values_are_assigned_by_declaration_order() {
    let mut expr = compile("a - b", &["b", "a"]).unwrap();
    assert_eq!(expr.evaluate(&[1.0, 10.0]), Ok(9.0));
    assert_eq!(expr.variables().collect::<Vec<_>>(), vec!["b", "a"]);
}

#[test]
fn declared_variables_start_at_zero_and_persist() {
    let mut expr = compile("a * 10 + b", &["a", "b"]).unwrap();
    assert_eq!(expr.evaluate(&[]), Ok(0.0));
    assert_eq!(expr.evaluate(&[1.0, 2.0]), Ok(12.0));
    // only `a` is rewritten, `b` keeps its previous value
    assert_eq!(expr.evaluate(&[3.0]), Ok(32.0));
}

#[test]
fn too_many_values_is_an_evaluation_error() {
    let mut expr = compile("x", &["x"]).unwrap();
    assert_eq!(
        expr.evaluate(&[1.0, 2.0]),
        Err(EvaluationError::TooManyValues {
            declared: 1,
            given: 2
        })
    );
}

#[test]
fn declared_names_can_shadow_pi() {
    let mut expr = compile("pi * 2", &["pi"]).unwrap();
    assert_eq!(expr.evaluate(&[]), Ok(0.0));
    assert_eq!(expr.evaluate(&[3.0]), Ok(6.0));
}

#[test]
fn functions_from_the_registry() {
    assert_close(eval("sin(pi / 2)"), 1.0);
    assert_close(eval("cos(0)"), 1.0);
    assert_close(eval("ln(e)"), 1.0);
    assert_close(eval("log10(1000)"), 3.0);
    assert_close(eval("cbrt(27)"), 3.0);
    assert_eq!(eval("floor(-1.5) + ceil(1.2)"), 0.0);
    assert_eq!(eval("max(1, min(7, 4), 2)"), 4.0);
}

#[test]
fn independent_expressions_share_no_state() {
    let mut a = compile("x * 2", &["x"]).unwrap();
    let mut b = compile("x * 2", &["x"]).unwrap();
    a.evaluate(&[10.0]).unwrap();
    assert_eq!(b.evaluate(&[]), Ok(0.0));
    assert_eq!(a.evaluate(&[]), Ok(20.0));
}

#[test]
fn expressions_move_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Expression>();

    let handles: Vec<_> = (0..4_i32)
        .map(|i| {
            std::thread::spawn(move || {
                let mut expr = compile("x * x", &["x"]).unwrap();
                expr.evaluate(&[f64::from(i)]).unwrap()
            })
        })
        .collect();
    let results: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![0.0, 1.0, 4.0, 9.0]);
}

#[test]
fn render_is_fully_parenthesized() {
    let expr = compile("-x * (y + 1) ^ 2 % 3", &["x", "y"]).unwrap();
    assert_eq!(expr.to_string(), "((-(x) * ((y + 1) ^ 2)) % 3)");
}
