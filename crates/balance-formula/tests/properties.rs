//! Property tests: operator-only formulas agree with plain arithmetic.

use balance_formula::{parse_formula, Evaluator, SymbolTable};
use proptest::prelude::*;
use std::fmt;

/// Operand of a generated formula, optionally negated
#[derive(Debug, Clone)]
struct Operand {
    negated: bool,
    term: Term,
}

#[derive(Debug, Clone)]
enum Term {
    Number(u32),
    Group(Box<Chain>),
}

/// `first op operand op operand ...`
#[derive(Debug, Clone)]
struct Chain {
    first: Operand,
    rest: Vec<(char, Operand)>,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("-")?;
        }
        match &self.term {
            Term::Number(n) => write!(f, "{n}"),
            Term::Group(chain) => write!(f, "({chain})"),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (op, operand) in &self.rest {
            write!(f, "{op}{operand}")?;
        }
        Ok(())
    }
}

fn apply(op: char, left: f64, right: f64) -> f64 {
    match op {
        '+' => left + right,
        '-' => left - right,
        '*' => left * right,
        '/' => left / right,
        _ => left % right,
    }
}

fn reference_operand(operand: &Operand) -> f64 {
    let value = match &operand.term {
        Term::Number(n) => f64::from(*n),
        Term::Group(chain) => reference_chain(chain),
    };
    if operand.negated {
        -value
    } else {
        value
    }
}

/// Multiplicative operators bind tighter; both tiers associate to the left
fn reference_chain(chain: &Chain) -> f64 {
    let mut terms = vec![('+', reference_operand(&chain.first))];
    for (op, operand) in &chain.rest {
        let value = reference_operand(operand);
        match op {
            '+' | '-' => terms.push((*op, value)),
            _ => {
                if let Some(last) = terms.last_mut() {
                    last.1 = apply(*op, last.1, value);
                }
            }
        }
    }
    terms
        .iter()
        .skip(1)
        .fold(terms[0].1, |total, (op, value)| apply(*op, total, *value))
}

fn operator() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['+', '-', '%', '*', '/'])
}

fn operand() -> impl Strategy<Value = Operand> {
    let leaf = (any::<bool>(), 0u32..20).prop_map(|(negated, n)| Operand {
        negated,
        term: Term::Number(n),
    });
    leaf.prop_recursive(3, 32, 4, |inner| {
        (
            any::<bool>(),
            inner.clone(),
            prop::collection::vec((operator(), inner), 0..4),
        )
            .prop_map(|(negated, first, rest)| Operand {
                negated,
                term: Term::Group(Box::new(Chain { first, rest })),
            })
    })
}

fn chain() -> impl Strategy<Value = Chain> {
    (operand(), prop::collection::vec((operator(), operand()), 0..6))
        .prop_map(|(first, rest)| Chain { first, rest })
}

proptest! {
    #[test]
    fn test_matches_reference_arithmetic(chain in chain()) {
        let formula = chain.to_string();
        let ast = parse_formula(&formula, &SymbolTable::new()).unwrap();
        let actual = Evaluator::new().evaluate(&ast).unwrap();
        let expected = reference_chain(&chain);

        prop_assert!(
            actual == expected || (actual.is_nan() && expected.is_nan()),
            "{} evaluated to {}, expected {}", formula, actual, expected
        );
    }

    #[test]
    fn test_parse_never_panics(formula in "[-+*/%().,0-9a-zA-Z_ ]{0,24}") {
        let _ = parse_formula(&formula, &SymbolTable::new());
    }

    #[test]
    fn test_canonical_form_reparses(chain in chain()) {
        let symbols = SymbolTable::new();
        let ast = parse_formula(&chain.to_string(), &symbols).unwrap();
        let rendered = ast.to_string();
        prop_assert_eq!(parse_formula(&rendered, &symbols).unwrap(), ast);
    }
}
