//! Formula parser
//!
//! Formulas are scanned left to right into a flat list of operands and
//! operators. Parenthesized blocks and call arguments are parsed
//! recursively as their own sub-formulas. The flat list is then folded into
//! a tree: unary minus first, then `% * /`, then `+ -`, left to right.
//!
//! Identifiers are only accepted when they exactly match a name that is
//! legal at that point: a loop variable of an enclosing meta-function, a
//! host symbol, or a built-in.

use crate::ast::{FormulaExpr, LiteralKind, MethodCall, Operator, OperatorExpr, SymbolOrigin};
use crate::builtins::BuiltinSymbols;
use crate::error::{ParseError, ParseResult};
use crate::symbols::{is_symbol_char, Method, SymbolTable};

/// Parse a formula string into an AST rooted at a grouping
///
/// # Example
/// ```rust
/// use balance_formula::{parse_formula, SymbolTable};
///
/// let mut symbols = SymbolTable::new();
/// symbols.add_variable("level").unwrap();
///
/// let ast = parse_formula("10+level*2", &symbols).unwrap();
/// assert_eq!(ast.to_string(), "10+level*2");
/// ```
pub fn parse_formula(formula: &str, symbols: &SymbolTable) -> ParseResult<FormulaExpr> {
    FormulaParser::new(symbols).parse(formula)
}

/// Parse a formula string, returning `None` when it contains no token
pub fn try_parse_formula(formula: &str, symbols: &SymbolTable) -> ParseResult<Option<FormulaExpr>> {
    FormulaParser::new(symbols).try_parse(formula)
}

/// Formula parser bound to a host symbol table
///
/// A parser may be reused for any number of formulas.
pub struct FormulaParser<'a> {
    symbols: &'a SymbolTable,
    builtins: BuiltinSymbols,
}

impl<'a> FormulaParser<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            builtins: BuiltinSymbols::new(),
        }
    }

    /// The host symbols formulas are parsed against
    pub fn symbols(&self) -> &SymbolTable {
        self.symbols
    }

    /// The built-in constants, functions and meta-functions
    pub fn builtins(&self) -> &BuiltinSymbols {
        &self.builtins
    }

    /// Parse a formula. Text without any token is an error.
    pub fn parse(&self, formula: &str) -> ParseResult<FormulaExpr> {
        self.try_parse(formula)?
            .ok_or_else(|| ParseError::EmptyExpression {
                formula: formula.to_string(),
                index: 0,
            })
    }

    /// Parse a formula, returning `None` when it contains no token
    pub fn try_parse(&self, formula: &str) -> ParseResult<Option<FormulaExpr>> {
        let scan = Scan {
            parser: self,
            formula,
            chars: formula.chars().collect(),
        };
        let ast = scan.parse_block(0, scan.chars.len(), 0)?;

        tracing::debug!(
            length = scan.chars.len(),
            variables = self.symbols.variable_names().len(),
            methods = self.symbols.method_names().len(),
            nodes = ast.as_ref().map_or(0, FormulaExpr::node_count),
            "parsed formula"
        );

        Ok(ast)
    }
}

/// Flat token produced by the scanning pass
#[derive(Debug)]
enum Token {
    Operand { index: usize, expr: FormulaExpr },
    Operator { index: usize, op: Operator },
}

impl Token {
    fn index(&self) -> usize {
        match self {
            Token::Operand { index, .. } | Token::Operator { index, .. } => *index,
        }
    }
}

/// State of one parse: the formula text as characters. Positions are
/// character indices into the whole formula, so errors found inside
/// sub-formulas point into the original text.
struct Scan<'p, 'a> {
    parser: &'p FormulaParser<'a>,
    formula: &'p str,
    chars: Vec<char>,
}

impl<'p, 'a> Scan<'p, 'a> {
    // === Blocks ===

    /// Parse `chars[start..end]` with `bound` loop variables in scope
    fn parse_block(&self, start: usize, end: usize, bound: usize) -> ParseResult<Option<FormulaExpr>> {
        let mut tokens = Vec::new();

        let mut pos = start;
        while pos < end {
            if let Some((expr, next)) = self.scan_number(pos, end)? {
                tokens.push(Token::Operand { index: pos, expr });
                pos = next;
                continue;
            }

            if let Some(op) = Operator::from_char(self.chars[pos]) {
                tokens.push(Token::Operator { index: pos, op });
                pos += 1;
                continue;
            }

            if self.chars[pos] == '(' {
                let close = self.find_closing(pos, end)?;
                let expr = self
                    .parse_block(pos + 1, close, bound)?
                    .ok_or_else(|| self.empty(pos))?;
                tokens.push(Token::Operand { index: pos, expr });
                pos = close + 1;
                continue;
            }

            if let Some((expr, next)) = self.scan_variable(pos, end, bound) {
                tokens.push(Token::Operand { index: pos, expr });
                pos = next;
                continue;
            }

            if let Some((expr, next)) = self.scan_call(pos, end, bound)? {
                tokens.push(Token::Operand { index: pos, expr });
                pos = next;
                continue;
            }

            return Err(self.unrecognized(pos, end));
        }

        if tokens.is_empty() {
            return Ok(None);
        }

        self.fold_unary_minus(&mut tokens)?;
        for tier in 0..=1 {
            self.fold_binary(&mut tokens, tier)?;
        }

        if tokens.len() != 1 {
            let index = tokens
                .iter()
                .find(|token| matches!(token, Token::Operator { .. }))
                .or_else(|| tokens.get(1))
                .map_or(start, Token::index);
            return Err(ParseError::MalformedExpression {
                formula: self.formula.to_string(),
                index,
            });
        }

        match tokens.pop() {
            Some(Token::Operand { expr, .. }) => Ok(Some(FormulaExpr::Grouping(Box::new(expr)))),
            Some(Token::Operator { index, .. }) => Err(ParseError::MalformedExpression {
                formula: self.formula.to_string(),
                index,
            }),
            None => Ok(None),
        }
    }

    /// Index of the parenthesis closing the one at `open`
    fn find_closing(&self, open: usize, end: usize) -> ParseResult<usize> {
        let mut depth = 0usize;
        for i in open..end {
            match self.chars[i] {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        Err(ParseError::UnmatchedParenthesis {
            formula: self.formula.to_string(),
            index: open,
        })
    }

    // === Literals ===

    /// Scan a numeric literal: digits with at most one decimal point
    fn scan_number(&self, start: usize, end: usize) -> ParseResult<Option<(FormulaExpr, usize)>> {
        let mut kind = None;
        let mut pos = start;

        while pos < end {
            match (self.chars[pos], kind) {
                (c, None) if c.is_ascii_digit() => kind = Some(LiteralKind::Integer),
                (c, Some(_)) if c.is_ascii_digit() => {}
                ('.', Some(LiteralKind::Integer)) => kind = Some(LiteralKind::Decimal),
                ('.', _) => {
                    return Err(ParseError::MalformedNumber {
                        formula: self.formula.to_string(),
                        index: pos,
                    })
                }
                _ => break,
            }
            pos += 1;
        }

        Ok(kind.map(|kind| {
            let text: String = self.chars[start..pos].iter().collect();
            (FormulaExpr::literal(kind, text), pos)
        }))
    }

    // === Identifiers ===

    /// Match the identifier at `start` against candidate names.
    ///
    /// Candidates are narrowed one character at a time; a name matches only
    /// if the identifier run has exactly its length.
    fn match_symbol<'n>(
        &self,
        start: usize,
        end: usize,
        candidates: impl IntoIterator<Item = &'n str>,
    ) -> Option<&'n str> {
        if !self.chars[start].is_ascii_alphabetic() {
            return None;
        }

        let mut remaining: Vec<&str> = candidates.into_iter().collect();
        let mut pos = start;
        while pos < end && !remaining.is_empty() && is_symbol_char(self.chars[pos]) {
            let offset = pos - start;
            let c = self.chars[pos];
            remaining.retain(|name| name.as_bytes().get(offset).map(|b| *b as char) == Some(c));
            pos += 1;
        }

        let length = pos - start;
        remaining.into_iter().find(|name| name.len() == length)
    }

    /// The full identifier run at `start`, if one starts there
    fn identifier_at(&self, start: usize, end: usize) -> Option<String> {
        if !self.chars[start].is_ascii_alphabetic() {
            return None;
        }
        let length = self.chars[start..end]
            .iter()
            .take_while(|c| is_symbol_char(**c))
            .count();
        Some(self.chars[start..start + length].iter().collect())
    }

    fn followed_by_paren(&self, pos: usize, end: usize) -> bool {
        pos < end && self.chars[pos] == '('
    }

    /// Scan a variable: loop variables in scope, then host variables, then
    /// built-in constants. A name followed by `(` is not a variable.
    fn scan_variable(&self, start: usize, end: usize, bound: usize) -> Option<(FormulaExpr, usize)> {
        let symbols = self.parser.symbols;
        let builtins = &self.parser.builtins;

        let (name, origin) = self
            .match_symbol(
                start,
                end,
                BuiltinSymbols::bound_variable_names(bound).iter().copied(),
            )
            .map(|name| (name, SymbolOrigin::BoundVariable))
            .or_else(|| {
                self.match_symbol(start, end, symbols.variable_names().iter().map(String::as_str))
                    .map(|name| (name, SymbolOrigin::Host))
            })
            .or_else(|| {
                self.match_symbol(start, end, builtins.constant_names())
                    .map(|name| (name, SymbolOrigin::Builtin))
            })?;

        let next = start + name.len();
        if self.followed_by_paren(next, end) {
            return None;
        }
        Some((FormulaExpr::symbol(name, origin), next))
    }

    /// Methods named at `start`, in lookup order: meta-functions, then
    /// host methods, then built-in functions. The lists may share a name.
    fn lookup_methods(&self, start: usize, end: usize) -> Vec<&'p Method> {
        let symbols: &'p SymbolTable = self.parser.symbols;
        let builtins: &'p BuiltinSymbols = &self.parser.builtins;

        let meta = self
            .match_symbol(start, end, builtins.meta_function_names())
            .and_then(|name| builtins.meta_function(name))
            .map(|(method, _)| method);
        let host = self
            .match_symbol(start, end, symbols.method_names().iter().map(String::as_str))
            .and_then(|name| symbols.method(name));
        let builtin = self
            .match_symbol(start, end, builtins.function_names().iter().copied())
            .and_then(|name| builtins.function(name))
            .map(|def| &def.method);

        [meta, host, builtin].into_iter().flatten().collect()
    }

    /// Scan a method call `NAME(arg, ...)`. The first candidate whose
    /// arity accepts the argument count is used.
    fn scan_call(
        &self,
        start: usize,
        end: usize,
        bound: usize,
    ) -> ParseResult<Option<(FormulaExpr, usize)>> {
        let candidates = self.lookup_methods(start, end);
        let first = match candidates.first() {
            Some(method) => *method,
            None => return Ok(None),
        };

        let open = start + first.name().len();
        if !self.followed_by_paren(open, end) {
            return Ok(None);
        }
        let close = self.find_closing(open, end)?;
        let ranges = self.split_arguments(open, close);

        let method = match candidates.iter().find(|method| method.accepts(ranges.len())) {
            Some(method) => *method,
            None => {
                return Err(ParseError::ArgumentCount {
                    formula: self.formula.to_string(),
                    method: first.name().to_string(),
                    index: start,
                    expected: first.arity_description(),
                    actual: ranges.len(),
                })
            }
        };

        // Only the last argument (the body) sees the loop variables the
        // call introduces.
        let last = ranges.len().saturating_sub(1);
        let mut args = Vec::with_capacity(ranges.len());
        for (i, (arg_start, arg_end)) in ranges.into_iter().enumerate() {
            let scope = if i == last {
                bound + method.bound_variables()
            } else {
                bound
            };
            let arg = self
                .parse_block(arg_start, arg_end, scope)?
                .ok_or_else(|| self.empty(arg_start))?;
            args.push(arg);
        }

        tracing::trace!(method = method.name(), args = args.len(), "parsed call");

        let call = MethodCall {
            name: method.name().to_string(),
            args,
            bound_variables: method.bound_variables(),
        };
        Ok(Some((FormulaExpr::Call(call), close + 1)))
    }

    /// Split the text between the call parentheses on top-level commas.
    /// A trailing empty argument is dropped.
    fn split_arguments(&self, open: usize, close: usize) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut depth = 0usize;
        let mut arg_start = open + 1;

        for i in open + 1..close {
            match self.chars[i] {
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    ranges.push((arg_start, i));
                    arg_start = i + 1;
                }
                _ => {}
            }
        }

        if close > arg_start {
            ranges.push((arg_start, close));
        }
        ranges
    }

    // === Tree building ===

    /// Fold each `-` that starts the block or follows another operator into
    /// a negation of the operand after it
    fn fold_unary_minus(&self, tokens: &mut Vec<Token>) -> ParseResult<()> {
        let mut i = 0;
        while i < tokens.len() {
            let is_unary = matches!(tokens[i], Token::Operator { op: Operator::Subtract, .. })
                && (i == 0 || matches!(tokens[i - 1], Token::Operator { .. }));

            if is_unary {
                let index = tokens[i].index();
                if !matches!(tokens.get(i + 1), Some(Token::Operand { .. })) {
                    return Err(ParseError::DanglingUnaryMinus {
                        formula: self.formula.to_string(),
                        index,
                    });
                }
                if let Token::Operand { expr, .. } = tokens.remove(i + 1) {
                    tokens[i] = Token::Operand {
                        index,
                        expr: FormulaExpr::Operator(OperatorExpr::Negate(Box::new(expr))),
                    };
                }
            }

            i += 1;
        }
        Ok(())
    }

    /// Fold the binary operators of one precedence tier, left to right
    fn fold_binary(&self, tokens: &mut Vec<Token>, tier: usize) -> ParseResult<()> {
        let mut i = 1;
        while i + 1 < tokens.len() {
            let matches_tier = matches!(
                &tokens[i - 1..=i + 1],
                [Token::Operand { .. }, Token::Operator { op, .. }, Token::Operand { .. }]
                    if op.tier() == tier
            );
            if !matches_tier {
                i += 1;
                continue;
            }

            let op_index = tokens[i].index();
            let folded: Vec<Token> = tokens.drain(i - 1..=i + 1).collect();
            let token = match <[Token; 3]>::try_from(folded) {
                Ok(
                    [Token::Operand { index, expr: left }, Token::Operator { op, .. }, Token::Operand { expr: right, .. }],
                ) => Token::Operand {
                    index,
                    expr: FormulaExpr::Operator(OperatorExpr::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
                },
                _ => {
                    return Err(ParseError::MalformedExpression {
                        formula: self.formula.to_string(),
                        index: op_index,
                    })
                }
            };
            tokens.insert(i - 1, token);
        }
        Ok(())
    }

    // === Errors ===

    fn empty(&self, index: usize) -> ParseError {
        ParseError::EmptyExpression {
            formula: self.formula.to_string(),
            index,
        }
    }

    fn unrecognized(&self, pos: usize, end: usize) -> ParseError {
        let formula = self.formula.to_string();
        let character = self.chars[pos];

        if character == ')' {
            return ParseError::UnmatchedParenthesis {
                formula,
                index: pos,
            };
        }

        match self.identifier_at(pos, end) {
            Some(symbol) => ParseError::UnknownSymbol {
                formula,
                symbol,
                index: pos,
            },
            None => ParseError::UnexpectedCharacter {
                formula,
                character,
                index: pos,
            },
        }
    }
}
