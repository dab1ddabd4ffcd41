//! End-to-end tests: declare symbols, parse, register resolvers, evaluate.

use ahash::AHashMap;
use balance_formula::{
    evaluate_formula, parse_formula, EvalError, Evaluator, FormulaError, FormulaReferences,
    ParseError, SymbolError, SymbolTable,
};
use pretty_assertions::assert_eq;

fn empty() -> SymbolTable {
    SymbolTable::new()
}

fn eval(formula: &str) -> f64 {
    evaluate_formula(formula, &empty(), &Evaluator::new()).unwrap()
}

#[test]
fn test_precedence_and_grouping() {
    assert_eq!(eval("2+3*4"), 14.0);
    assert_eq!(eval("(2+3)*4"), 20.0);
    assert_eq!(eval("-3+5"), 2.0);
    assert_eq!(eval("3*-2"), -6.0);
    assert_eq!(eval("((1+2)*(3+4))%5"), 1.0);
}

#[test]
fn test_builtin_functions() {
    assert_eq!(eval("SQRT(16)"), 4.0);
    assert_eq!(eval("MAX(1,5,3)"), 5.0);
    assert_eq!(eval("INTDIV(7,2)"), 3.0);
    assert_eq!(eval("FLOOR(2.7)+CEIL(2.2)"), 5.0);
    assert_eq!(eval("MIN(MAX(1,2),SQRT(9),POW(2,2))"), 2.0);
}

#[test]
fn test_sum_meta_function() {
    assert_eq!(eval("SUM(1,5,i)"), 15.0);
    assert_eq!(eval("SUM(1,10,2,i)"), 25.0);
    assert_eq!(eval("SUM(5,1,-1,i)"), 15.0);
    assert_eq!(eval("SUM(1,3,SUM(1,3,i*j))"), 36.0);
    assert_eq!(eval("SUM(1,SUM(1,2,i),1)"), 3.0);
    assert_eq!(eval("SUM(SUM(1,2,i),3,1)"), 1.0);
}

#[test]
fn test_arity_validation() {
    let mut symbols = empty();
    symbols.add_signatures(["F(2-3)"]).unwrap();

    let err = parse_formula("F(1)", &symbols).unwrap_err();
    assert_eq!(
        err,
        ParseError::ArgumentCount {
            formula: "F(1)".into(),
            method: "F".into(),
            index: 0,
            expected: "between 2 and 3".into(),
            actual: 1,
        }
    );
    assert!(parse_formula("F(1,2)", &symbols).is_ok());
    assert!(parse_formula("F(1,2,3)", &symbols).is_ok());
}

#[test]
fn test_unknown_symbol_index() {
    let err = parse_formula("x+1", &empty()).unwrap_err();
    assert_eq!(err.index(), 0);
    assert!(matches!(err, ParseError::UnknownSymbol { .. }));

    let err = parse_formula("MAX(1,(2*y))", &empty()).unwrap_err();
    assert_eq!(err.index(), 9);
}

#[test]
fn test_resolver_chaining() {
    let mut symbols = empty();
    symbols.add_variable("x").unwrap();
    let ast = parse_formula("x", &symbols).unwrap();

    let mut evaluator = Evaluator::new();
    evaluator.add_variable_resolver(1, |_| None).unwrap();
    evaluator
        .add_variable_resolver(2, |name| (name == "x").then_some(7.0))
        .unwrap();
    assert_eq!(evaluator.evaluate(&ast), Ok(7.0));

    assert_eq!(
        evaluator.add_variable_resolver(i32::MIN, |_| None),
        Err(SymbolError::ReservedPriority(i32::MIN))
    );
}

#[test]
fn test_evaluate_rows() {
    // Evaluate one damage curve against several data rows, reusing the AST
    let mut symbols = empty();
    symbols.add_variables(["level", "power"]).unwrap();
    symbols.add_signatures(["CRIT(0-1)"]).unwrap();
    let ast = parse_formula("power*(1+level/10)+CRIT()", &symbols).unwrap();

    let rows = [(1.0, 10.0, 0.0), (5.0, 20.0, 2.0), (10.0, 40.0, 0.5)];
    let results: Vec<f64> = rows
        .iter()
        .map(|&(level, power, crit)| {
            let mut values = AHashMap::new();
            values.insert("level", level);
            values.insert("power", power);

            let mut evaluator = Evaluator::new();
            evaluator
                .add_variable_resolver(0, |name| values.get(name).copied())
                .unwrap();
            evaluator
                .add_method_resolver(0, |name, _| (name == "CRIT").then_some(crit))
                .unwrap();
            evaluator.evaluate(&ast).unwrap()
        })
        .collect();

    assert_eq!(results, vec![11.0, 32.0, 80.5]);
}

#[test]
fn test_idempotence() {
    let mut symbols = empty();
    symbols.add_variable("x").unwrap();
    let mut evaluator = Evaluator::new();
    evaluator.add_variable_resolver(0, |_| Some(0.3)).unwrap();

    let formula = "SUM(1,7,x/i)*COS(x*100)-PHI";
    let first = evaluate_formula(formula, &symbols, &evaluator).unwrap();
    for _ in 0..3 {
        let again = evaluate_formula(formula, &symbols, &evaluator).unwrap();
        assert_eq!(again.to_bits(), first.to_bits());
    }
}

#[test]
fn test_zero_step_versus_division_by_zero() {
    let evaluator = Evaluator::new();
    assert_eq!(
        evaluate_formula("1/0", &empty(), &evaluator).unwrap(),
        f64::INFINITY
    );

    let err = evaluate_formula("SUM(1,2,0,i)", &empty(), &evaluator).unwrap_err();
    assert!(matches!(
        err,
        FormulaError::Evaluation(EvalError::ZeroStep { .. })
    ));
}

#[test]
fn test_references_and_canonical_form() {
    let mut symbols = empty();
    symbols.add_variables(["base", "level"]).unwrap();
    symbols.add_signatures(["BONUS(1-INF)"]).unwrap();

    let ast = parse_formula("(base)+BONUS(level,SUM(1,level,i))*2", &symbols).unwrap();
    assert_eq!(ast.to_string(), "(base)+BONUS(level,SUM(1,level,i))*2");
    assert_eq!(parse_formula(&ast.to_string(), &symbols).unwrap(), ast);

    assert_eq!(
        FormulaReferences::collect(&ast),
        FormulaReferences {
            variables: vec!["base".into(), "level".into()],
            methods: vec!["BONUS".into()],
            uses_meta_function: true,
        }
    );
}
