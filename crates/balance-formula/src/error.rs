//! Formula error types

use thiserror::Error;

/// Result type for operations that may fail for any reason
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Result type for parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Result type for evaluation
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Errors produced while turning formula text into an AST.
///
/// Every variant carries the full formula text and the character index of
/// the offending position in that text, so hosts can point at it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// An opening parenthesis has no matching closing one
    #[error("unmatched parenthesis at index {index} in '{formula}'")]
    UnmatchedParenthesis { formula: String, index: usize },

    /// A numeric literal with a misplaced or repeated decimal point
    #[error("malformed number at index {index} in '{formula}'")]
    MalformedNumber { formula: String, index: usize },

    /// A unary '-' without an operand after it
    #[error("unary '-' at index {index} is not followed by an operand in '{formula}'")]
    DanglingUnaryMinus { formula: String, index: usize },

    /// An identifier that is not a known variable or method here
    #[error("unknown symbol '{symbol}' at index {index} in '{formula}'")]
    UnknownSymbol {
        formula: String,
        symbol: String,
        index: usize,
    },

    /// A character that cannot start any token
    #[error("unexpected character '{character}' at index {index} in '{formula}'")]
    UnexpectedCharacter {
        formula: String,
        character: char,
        index: usize,
    },

    /// A known method called with the wrong number of arguments
    #[error(
        "wrong number of arguments for {method} at index {index}: expected {expected}, got {actual}"
    )]
    ArgumentCount {
        formula: String,
        method: String,
        index: usize,
        expected: String,
        actual: usize,
    },

    /// An empty group or argument where an operand is required
    #[error("empty expression at index {index} in '{formula}'")]
    EmptyExpression { formula: String, index: usize },

    /// Operators and operands that do not reduce to a single tree
    #[error("malformed expression at index {index} in '{formula}'")]
    MalformedExpression { formula: String, index: usize },
}

impl ParseError {
    /// Index of the offending character in the formula text
    pub fn index(&self) -> usize {
        match self {
            ParseError::UnmatchedParenthesis { index, .. }
            | ParseError::MalformedNumber { index, .. }
            | ParseError::DanglingUnaryMinus { index, .. }
            | ParseError::UnknownSymbol { index, .. }
            | ParseError::UnexpectedCharacter { index, .. }
            | ParseError::ArgumentCount { index, .. }
            | ParseError::EmptyExpression { index, .. }
            | ParseError::MalformedExpression { index, .. } => *index,
        }
    }

    /// The formula text the error was found in
    pub fn formula(&self) -> &str {
        match self {
            ParseError::UnmatchedParenthesis { formula, .. }
            | ParseError::MalformedNumber { formula, .. }
            | ParseError::DanglingUnaryMinus { formula, .. }
            | ParseError::UnknownSymbol { formula, .. }
            | ParseError::UnexpectedCharacter { formula, .. }
            | ParseError::ArgumentCount { formula, .. }
            | ParseError::EmptyExpression { formula, .. }
            | ParseError::MalformedExpression { formula, .. } => formula,
        }
    }
}

/// Caller contract violations made while configuring symbols or resolvers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    /// A method signature string that does not follow `NAME(min-max)`
    #[error("invalid method signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    /// A name that cannot be used as a formula symbol
    #[error("invalid symbol name '{0}'")]
    InvalidSymbolName(String),

    /// The same method name registered twice
    #[error("method '{0}' is already registered")]
    DuplicateMethod(String),

    /// A resolver registered at a priority reserved for built-ins
    #[error("resolver priority {0} is reserved")]
    ReservedPriority(i32),
}

/// Failures while evaluating an AST. Evaluation stops at the first one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// No resolver produced a value for a variable
    #[error("variable '{0}' was not resolved")]
    UnresolvedVariable(String),

    /// No resolver produced a value for a method call
    #[error("method '{name}' with {arg_count} argument(s) was not resolved")]
    UnresolvedMethod { name: String, arg_count: usize },

    /// A literal leaf whose text is not a number
    #[error("invalid literal '{0}'")]
    InvalidLiteral(String),

    /// A meta-function loop whose step is zero
    #[error("invalid step {step} for meta-function '{method}'")]
    ZeroStep { method: String, step: f64 },

    /// A call flagged as meta-function that has no implementation
    #[error("unknown meta-function '{0}'")]
    UnknownMetaFunction(String),
}

/// Any error this crate can produce
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Symbol or resolver configuration error
    #[error("Configuration error: {0}")]
    Symbol(#[from] SymbolError),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),
}
