//! Formula Abstract Syntax Tree types

use std::fmt;

/// Formula expression AST
///
/// A parsed formula is always rooted at a [`FormulaExpr::Grouping`], and so
/// is every argument of a [`MethodCall`].
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    /// Parenthesized sub-formula, also the root of a formula
    Grouping(Box<FormulaExpr>),
    /// Arithmetic operation
    Operator(OperatorExpr),
    /// Literal or symbol
    Leaf(Leaf),
    /// Method or meta-function call
    Call(MethodCall),
}

/// Arithmetic operators, in source order of precedence tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Modulo,
    Multiply,
    Divide,
}

impl Operator {
    /// Operator for a source character, if it is one
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            '%' => Some(Operator::Modulo),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            _ => None,
        }
    }

    /// Source character of the operator
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Modulo => '%',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }

    /// Binding tier: 0 binds tighter than 1
    pub fn tier(self) -> usize {
        match self {
            Operator::Modulo | Operator::Multiply | Operator::Divide => 0,
            Operator::Add | Operator::Subtract => 1,
        }
    }
}

/// An operator node. The variant fixes the child count.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorExpr {
    /// Unary minus (one child)
    Negate(Box<FormulaExpr>),
    /// Binary operation (two children, left evaluated first)
    Binary {
        op: Operator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
}

impl OperatorExpr {
    /// The operator kind; negation is a one-child subtraction
    pub fn operator(&self) -> Operator {
        match self {
            OperatorExpr::Negate(_) => Operator::Subtract,
            OperatorExpr::Binary { op, .. } => *op,
        }
    }

    pub fn child_count(&self) -> usize {
        match self {
            OperatorExpr::Negate(_) => 1,
            OperatorExpr::Binary { .. } => 2,
        }
    }
}

/// Leaf of the tree
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    /// Numeric constant, kept as written
    Literal(Literal),
    /// Name resolved when the formula is evaluated
    Symbol(Symbol),
}

/// Kind of numeric literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    Decimal,
}

/// Numeric constant stored as its source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub text: String,
}

/// Where the parser found a symbol name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolOrigin {
    /// Loop variable of an enclosing meta-function
    BoundVariable,
    /// Variable declared in the host symbol table
    Host,
    /// Built-in constant
    Builtin,
}

/// A named variable leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub origin: SymbolOrigin,
}

/// Method call node
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub name: String,
    /// Argument sub-formulas, each rooted at a grouping
    pub args: Vec<FormulaExpr>,
    /// Number of loop variables the call introduces (0 for plain methods)
    pub bound_variables: usize,
}

impl MethodCall {
    pub fn is_meta_function(&self) -> bool {
        self.bound_variables > 0
    }
}

impl FormulaExpr {
    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<&FormulaExpr> {
        match self {
            FormulaExpr::Grouping(child) => vec![child.as_ref()],
            FormulaExpr::Operator(OperatorExpr::Negate(operand)) => vec![operand.as_ref()],
            FormulaExpr::Operator(OperatorExpr::Binary { left, right, .. }) => {
                vec![left.as_ref(), right.as_ref()]
            }
            FormulaExpr::Leaf(_) => Vec::new(),
            FormulaExpr::Call(call) => call.args.iter().collect(),
        }
    }

    /// Strip one level of grouping, if any
    pub fn ungrouped(&self) -> &FormulaExpr {
        match self {
            FormulaExpr::Grouping(child) => child,
            other => other,
        }
    }

    /// Total number of nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(FormulaExpr::node_count)
            .sum::<usize>()
    }

    /// Build a literal leaf
    pub fn literal(kind: LiteralKind, text: impl Into<String>) -> Self {
        FormulaExpr::Leaf(Leaf::Literal(Literal {
            kind,
            text: text.into(),
        }))
    }

    /// Build a symbol leaf
    pub fn symbol(name: impl Into<String>, origin: SymbolOrigin) -> Self {
        FormulaExpr::Leaf(Leaf::Symbol(Symbol {
            name: name.into(),
            origin,
        }))
    }
}

// Rendering writes the canonical text: the root grouping and call
// arguments without parentheses, every other grouping with them.
fn write_expr(f: &mut fmt::Formatter<'_>, expr: &FormulaExpr, nested: bool) -> fmt::Result {
    match expr {
        FormulaExpr::Grouping(child) if nested => {
            f.write_str("(")?;
            write_expr(f, child, true)?;
            f.write_str(")")
        }
        FormulaExpr::Grouping(child) => write_expr(f, child, true),
        FormulaExpr::Operator(OperatorExpr::Negate(operand)) => {
            f.write_str("-")?;
            write_expr(f, operand, true)
        }
        FormulaExpr::Operator(OperatorExpr::Binary { op, left, right }) => {
            write_expr(f, left, true)?;
            write!(f, "{}", op.symbol())?;
            write_expr(f, right, true)
        }
        FormulaExpr::Leaf(Leaf::Literal(literal)) => f.write_str(&literal.text),
        FormulaExpr::Leaf(Leaf::Symbol(symbol)) => f.write_str(&symbol.name),
        FormulaExpr::Call(call) => {
            write!(f, "{}(", call.name)?;
            for (i, arg) in call.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write_expr(f, arg, false)?;
            }
            f.write_str(")")
        }
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, false)
    }
}
