//! Parser from layout tokens to the surface [`ast`](crate::ast), written with `chumsky`
//! combinators over the `logos` token stream.
//!
//! Python constructs outside the contract subset still parse. They become [`Unsupported`] nodes
//! located at their first token, their remaining tokens are skipped, and the earliest one in the
//! source is reported as [`AnalysisError::Unsupported`].

use crate::{
    ast::*,
    error::{AnalysisError, Result},
    lexer::{LineIndex, Span, Text, TextKind, Token},
};
use chumsky::{error::RichReason, extra, input::IterInput, prelude::*};
use cobra_data::{BinaryOp, SourceLocation};

type Tokens = IterInput<std::vec::IntoIter<(Token, Span)>, Span>;
type ParserError<'src> = extra::Err<Rich<'src, Token, Span>>;
type Extra<'src, 'b> = chumsky::input::MapExtra<'src, 'b, Tokens, ParserError<'src>>;

const MULTIPLE_CONTRACTS: Unsupported =
    Unsupported::new("multiple contracts", "a source unit defines exactly one contract class");
const MODULE_FUNCTION: Unsupported =
    Unsupported::new("module-level function", "functions must be methods of the contract class");
const MODULE_DECORATOR: Unsupported =
    Unsupported::new("module-level decorator", "decorators are only allowed on contract methods");
const MODULE_STATEMENT: Unsupported = Unsupported::new(
    "module-level statement",
    "only imports and one contract class may appear at module level",
);
const NESTED_CLASS: Unsupported = Unsupported::new("nested class", "classes cannot be nested");
const IMPORT_INSIDE_CONTRACT: Unsupported =
    Unsupported::new("import inside contract", "imports are only allowed at module level");
const ASYNC_FUNCTION: Unsupported =
    Unsupported::new("async function", "contract methods execute synchronously");
const CLASS_LEVEL_STATEMENT: Unsupported = Unsupported::new(
    "class-level statement",
    "a contract body holds field declarations, events and methods",
);
const DECORATOR_EXPRESSION: Unsupported =
    Unsupported::new("decorator expression", "decorators are plain names such as `@view`");
const VARIADIC_PARAMETERS: Unsupported =
    Unsupported::new("variadic parameters", "parameters must be named and typed");
const DEFAULT_PARAMETER: Unsupported =
    Unsupported::new("default parameter value", "every argument is supplied by the caller");

const UNBOUNDED_LOOP: Unsupported = Unsupported::new(
    "unbounded loop",
    "`while` loops have no static bound, use `for i in range(n)`",
);
const NESTED_FUNCTION: Unsupported = Unsupported::new("nested function", "functions cannot be nested");
const EXCEPTION_HANDLING: Unsupported =
    Unsupported::new("exception handling", "use `require` to abort a call");
const RAISE: Unsupported =
    Unsupported::new("raise statement", "use `revert(\"reason\")` or `require` to abort a call");
const WITH: Unsupported = Unsupported::new("with statement", "context managers are not supported");
const DEL: Unsupported = Unsupported::new("del statement", "storage cannot be deleted");
const GLOBAL: Unsupported =
    Unsupported::new("global declaration", "contract state lives in `self` fields");
const MULTIPLE_RETURNS: Unsupported =
    Unsupported::new("multiple return values", "functions return at most one value");
const TUPLE_TARGETS: Unsupported =
    Unsupported::new("tuple assignment", "assign one target per statement");
const TUPLE_VALUES: Unsupported = Unsupported::new("tuple assignment", "assign one value per statement");
const CHAINED_ASSIGNMENT: Unsupported =
    Unsupported::new("chained assignment", "assign one target per statement");
const TUPLE_UNPACKING: Unsupported = Unsupported::new("tuple unpacking", "loops bind a single counter");
const FOR_ELSE: Unsupported = Unsupported::new("for-else", "loops cannot have an `else` clause");

const LAMBDA: Unsupported = Unsupported::new("lambda", "anonymous functions are not supported");
const GENERATOR: Unsupported = Unsupported::new("generator", "`yield` is not supported");
const AWAIT: Unsupported = Unsupported::new("await expression", "contract methods execute synchronously");
const CONDITIONAL_EXPRESSION: Unsupported =
    Unsupported::new("conditional expression", "use an `if` statement");
const ASSIGNMENT_EXPRESSION: Unsupported =
    Unsupported::new("assignment expression", "assign in a separate statement");
const COMPREHENSION: Unsupported =
    Unsupported::new("comprehension", "comprehensions build dynamic collections");
const CHAINED_COMPARISON: Unsupported =
    Unsupported::new("chained comparison", "combine comparisons with `and`");
const MEMBERSHIP_TEST: Unsupported = Unsupported::new(
    "membership test",
    "`in` needs iterable collections, use a mapping lookup",
);
const IDENTITY_TEST: Unsupported = Unsupported::new("identity test", "use `==` to compare values");
const ARGUMENT_UNPACKING: Unsupported =
    Unsupported::new("argument unpacking", "pass arguments one by one");
const KEYWORD_ARGUMENT: Unsupported =
    Unsupported::new("keyword argument", "arguments are passed by position");
const SLICE: Unsupported = Unsupported::new("slice", "slicing is not supported");
const TUPLE: Unsupported = Unsupported::new("tuple", "tuples are not supported");
const LIST_LITERAL: Unsupported = Unsupported::new(
    "list literal",
    "dynamic collections are not supported, declare an `array[T, N]` field",
);
const DICT_LITERAL: Unsupported = Unsupported::new(
    "dict literal",
    "dynamic collections are not supported, declare a `mapping[K, V]` field",
);
const F_STRING: Unsupported = Unsupported::new("f-string", "string formatting is not supported");
const FLOAT: Unsupported =
    Unsupported::new("floating point literal", "all numbers are 256-bit unsigned integers");

/// Parses the tokens of one source unit down to its contract class.
pub fn parse_contract(source: &str, tokens: Vec<(Token, Span)>) -> Result<ClassDef> {
    let lines = LineIndex::new(source);
    let input = IterInput::new(tokens.into_iter(), lines.end());
    let items = module(&lines)
        .parse(input)
        .into_result()
        .map_err(|errors| syntax_error(&lines, errors))?;

    let mut earliest = Earliest::default();
    let mut contract = None;
    for item in items {
        match item {
            Item::Class(class) if contract.is_none() => {
                earliest.class(&class);
                contract = Some(class);
            }
            Item::Class(class) => earliest.note(MULTIPLE_CONTRACTS, class.location),
            Item::Unsupported(unsupported, location) => earliest.note(unsupported, location),
            Item::Skipped => {}
        }
    }
    if let Some((location, unsupported)) = earliest.0 {
        return Err(unsupported.error(location));
    }
    contract.ok_or_else(|| {
        AnalysisError::syntax(
            "source does not define a contract class",
            lines.location(lines.end().start),
        )
    })
}

fn syntax_error(lines: &LineIndex<'_>, errors: Vec<Rich<'_, Token, Span>>) -> AnalysisError {
    let Some(error) = errors.into_iter().next() else {
        return AnalysisError::syntax("invalid syntax", lines.location(lines.end().start));
    };
    let message = match error.reason() {
        RichReason::Custom(message) => message.clone(),
        _ => match error.found() {
            Some(token) => format!("unexpected {token}"),
            None => "unexpected end of input".to_string(),
        },
    };
    AnalysisError::syntax(message, lines.location(error.span().start))
}

#[derive(Debug, Clone)]
enum Item {
    Class(ClassDef),
    /// Imports and module docstrings.
    Skipped,
    Unsupported(Unsupported, SourceLocation),
}

#[derive(Debug, Clone)]
enum Trailer {
    Attribute(String),
    Call(Vec<Expr>),
    Index(Expr),
}

#[derive(Debug, Clone)]
enum Assignment {
    Plain(Expr, Option<(Unsupported, SourceLocation)>),
    Annotated(Expr, Option<Expr>),
    Augmented(BinaryOp, Expr),
    Rejected(Unsupported, SourceLocation),
}

fn located<'src>(
    lines: &'src LineIndex<'src>,
    token: Token,
) -> impl Parser<'src, Tokens, SourceLocation, ParserError<'src>> + Clone {
    just(token).map_with(move |_, e: &mut Extra<'src, '_>| lines.location(e.span().start))
}

fn marker<'src>(
    lines: &'src LineIndex<'src>,
    token: Token,
    unsupported: Unsupported,
) -> impl Parser<'src, Tokens, (Unsupported, SourceLocation), ParserError<'src>> + Clone {
    located(lines, token).map(move |location| (unsupported, location))
}

fn identifier<'src>(
    lines: &'src LineIndex<'src>,
) -> impl Parser<'src, Tokens, (String, SourceLocation), ParserError<'src>> + Clone {
    select! { Token::Name(name) => name }
        .map_with(move |name, e: &mut Extra<'src, '_>| (name, lines.location(e.span().start)))
}

/// A bracket group with everything inside it.
fn group<'src>() -> impl Parser<'src, Tokens, (), ParserError<'src>> + Clone {
    recursive(|group| {
        let inside = choice((
            group,
            any().filter(|token: &Token| !token.is_opening() && !token.is_closing()).ignored(),
        ))
        .repeated();
        choice((
            inside.clone().delimited_by(just(Token::LParen), just(Token::RParen)),
            inside.clone().delimited_by(just(Token::LBracket), just(Token::RBracket)),
            inside.delimited_by(just(Token::LBrace), just(Token::RBrace)),
        ))
    })
}

/// Skips tokens, bracket groups whole, up to one of `stops`, a closing bracket or the end of the
/// line.
fn skip_until<'src>(stops: &[Token]) -> impl Parser<'src, Tokens, (), ParserError<'src>> + Clone {
    let stops = stops.to_vec();
    let plain = any().filter(move |token: &Token| {
        !token.is_opening()
            && !token.is_closing()
            && !matches!(token, Token::Newline | Token::Indent | Token::Dedent)
            && !stops.contains(token)
    });
    choice((group(), plain.ignored())).repeated()
}

/// The rest of an expression that is already known to be rejected.
fn expr_tail<'src>() -> impl Parser<'src, Tokens, (), ParserError<'src>> + Clone {
    skip_until(&[Token::Comma, Token::Colon, Token::Semicolon, Token::Assign])
}

/// An indented block, nested blocks included.
fn suite<'src>() -> impl Parser<'src, Tokens, (), ParserError<'src>> + Clone {
    recursive(|suite| {
        let line = any().filter(|token: &Token| !matches!(token, Token::Indent | Token::Dedent));
        choice((suite, line.ignored()))
            .repeated()
            .delimited_by(just(Token::Indent), just(Token::Dedent))
    })
}

/// The rest of a statement, including the block it opens.
fn skip_compound<'src>() -> impl Parser<'src, Tokens, (), ParserError<'src>> + Clone {
    skip_until(&[]).then(just(Token::Newline)).then(suite().or_not()).ignored()
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let location = lhs.location;
    Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, location)
}

fn unary(op: UnaryOperator, operand: Expr, location: SourceLocation) -> Expr {
    Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, location)
}

fn unsupported_expr((unsupported, location): (Unsupported, SourceLocation)) -> Expr {
    Expr::new(ExprKind::Unsupported(unsupported), location)
}

fn unsupported_stmt((unsupported, location): (Unsupported, SourceLocation)) -> Stmt {
    Stmt { kind: StmtKind::Unsupported(unsupported), location }
}

/// `kept` when it already holds a rejected construct, which necessarily comes first.
fn reject(kept: Expr, unsupported: Unsupported, location: SourceLocation) -> Expr {
    let mut earliest = Earliest::default();
    earliest.expr(&kept);
    if earliest.0.is_some() { kept } else { unsupported_expr((unsupported, location)) }
}

fn reject_stmt(kept: Stmt, unsupported: Unsupported, location: SourceLocation) -> Stmt {
    let mut earliest = Earliest::default();
    earliest.stmt(&kept);
    if earliest.0.is_some() { kept } else { unsupported_stmt((unsupported, location)) }
}

fn left_assoc<'src, P, O>(
    operand: P,
    operator: O,
) -> impl Parser<'src, Tokens, Expr, ParserError<'src>> + Clone
where
    P: Parser<'src, Tokens, Expr, ParserError<'src>> + Clone,
    O: Parser<'src, Tokens, BinaryOp, ParserError<'src>> + Clone,
{
    operand
        .clone()
        .foldl(operator.then(operand).repeated(), |lhs, (op, rhs)| binary(op, lhs, rhs))
}

/// Adjacent string literals concatenate, as in Python. Mixing bytes with text fails at the first
/// literal of the other kind.
fn string_literal(
    parts: Vec<(Text, SourceLocation, Span)>,
) -> std::result::Result<Expr, (Span, SourceLocation)> {
    let location = parts.first().map(|(_, location, _)| *location).unwrap_or_default();
    let bytes = parts.first().is_some_and(|(text, ..)| text.kind == TextKind::Bytes);
    let mut value = Vec::new();
    for (text, at, span) in parts {
        match text.kind {
            TextKind::Format => return Ok(unsupported_expr((F_STRING, at))),
            TextKind::Bytes if !bytes => return Err((span, at)),
            TextKind::Str if bytes => return Err((span, at)),
            _ => value.extend(text.value),
        }
    }
    let kind = if bytes { ExprKind::Bytes(value) } else { ExprKind::Str(value) };
    Ok(Expr::new(kind, location))
}

fn expression<'src>(
    lines: &'src LineIndex<'src>,
) -> impl Parser<'src, Tokens, Expr, ParserError<'src>> + Clone {
    recursive(move |expr| {
        let literal = select! {
            Token::Int(value) => ExprKind::Int(value),
            Token::True => ExprKind::Bool(true),
            Token::False => ExprKind::Bool(false),
            Token::None => ExprKind::None,
            Token::Ellipsis => ExprKind::Ellipsis,
        }
        .map_with(move |kind, e: &mut Extra<'src, '_>| Expr::new(kind, lines.location(e.span().start)));

        let strings = select! { Token::Text(text) => text }
            .map_with(move |text, e: &mut Extra<'src, '_>| (text, lines.location(e.span().start), e.span()))
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .validate(|parts, _, emitter| {
                string_literal(parts).unwrap_or_else(|(span, location)| {
                    emitter.emit(Rich::custom(span, "cannot mix bytes and string literals"));
                    Expr::new(ExprKind::Str(Vec::new()), location)
                })
            });

        let name = identifier(lines).map(|(name, location)| Expr::new(ExprKind::Name(name), location));

        let parenthesized = expr.clone().delimited_by(just(Token::LParen), just(Token::RParen));
        let tuple = choice((
            located(lines, Token::LParen).then_ignore(just(Token::RParen)),
            located(lines, Token::LParen)
                .then_ignore(expr.clone())
                .then_ignore(just(Token::Comma))
                .then_ignore(skip_until(&[]))
                .then_ignore(just(Token::RParen)),
        ))
        .map(|location| unsupported_expr((TUPLE, location)));
        let collection = |open: Token, close: Token, unsupported: Unsupported| {
            marker(lines, open, unsupported).then_ignore(skip_until(&[])).then_ignore(just(close))
        };

        let rejected_atom = choice((
            collection(Token::LBracket, Token::RBracket, LIST_LITERAL),
            collection(Token::LBrace, Token::RBrace, DICT_LITERAL),
            marker(lines, Token::Lambda, LAMBDA)
                .then_ignore(skip_until(&[Token::Colon]))
                .then_ignore(just(Token::Colon).then(expr_tail()).or_not()),
            marker(lines, Token::Yield, GENERATOR).then_ignore(expr_tail()),
            marker(lines, Token::Await, AWAIT).then_ignore(expr_tail()),
            marker(lines, Token::Float, FLOAT),
        ))
        .map(unsupported_expr);

        let atom =
            choice((literal, strings, name, parenthesized, tuple, rejected_atom)).boxed();

        let argument = choice((
            choice((located(lines, Token::Star), located(lines, Token::DoubleStar)))
                .then_ignore(expr_tail())
                .map(|location| unsupported_expr((ARGUMENT_UNPACKING, location))),
            identifier(lines)
                .then_ignore(just(Token::Assign))
                .then_ignore(expr_tail())
                .map(|(_, location)| unsupported_expr((KEYWORD_ARGUMENT, location))),
            expr.clone(),
        ));
        let arguments = argument
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        // `mapping[address, uint256]` is the one place a tuple is allowed.
        let subscript = choice((
            expr.clone()
                .or_not()
                .ignore_then(marker(lines, Token::Colon, SLICE))
                .then_ignore(skip_until(&[]))
                .map(unsupported_expr),
            expr.clone()
                .then(
                    just(Token::Comma)
                        .ignore_then(
                            expr.clone().separated_by(just(Token::Comma)).allow_trailing().collect::<Vec<_>>(),
                        )
                        .or_not(),
                )
                .map(|(first, rest)| match rest {
                    None => first,
                    Some(rest) => {
                        let location = first.location;
                        let items = std::iter::once(first).chain(rest).collect();
                        Expr::new(ExprKind::Tuple(items), location)
                    }
                }),
        ));

        let trailer = choice((
            just(Token::Dot).ignore_then(identifier(lines)).map(|(attr, _)| Trailer::Attribute(attr)),
            arguments.map(Trailer::Call),
            subscript.delimited_by(just(Token::LBracket), just(Token::RBracket)).map(Trailer::Index),
        ));
        let primary = atom
            .foldl(trailer.repeated(), |value, trailer| {
                let location = value.location;
                let value = Box::new(value);
                let kind = match trailer {
                    Trailer::Attribute(attr) => ExprKind::Attribute { value, attr },
                    Trailer::Call(args) => ExprKind::Call { func: value, args },
                    Trailer::Index(index) => ExprKind::Subscript { value, index: Box::new(index) },
                };
                Expr::new(kind, location)
            })
            .boxed();

        let unary_operator = select! {
            Token::Minus => UnaryOperator::Neg,
            Token::Plus => UnaryOperator::Pos,
            Token::Tilde => UnaryOperator::Invert,
        }
        .map_with(move |op, e: &mut Extra<'src, '_>| (op, lines.location(e.span().start)));
        // The exponent binds tighter than a unary minus on the left but may carry its own.
        let factor = recursive(|factor| {
            let power = primary
                .then(just(Token::DoubleStar).ignore_then(factor).or_not())
                .map(|(base, exponent)| match exponent {
                    Some(exponent) => binary(BinaryOp::Pow, base, exponent),
                    None => base,
                });
            unary_operator
                .repeated()
                .foldr(power, |(op, location), operand| unary(op, operand, location))
        })
        .boxed();

        let term = left_assoc(
            factor,
            select! {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::DoubleSlash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
            },
        );
        let sum = left_assoc(
            term,
            select! { Token::Plus => BinaryOp::Add, Token::Minus => BinaryOp::Sub },
        );
        let shift = left_assoc(
            sum,
            select! { Token::Shl => BinaryOp::Shl, Token::Shr => BinaryOp::Shr },
        );
        let bit_and = left_assoc(shift, just(Token::Amp).to(BinaryOp::BitAnd));
        let bit_xor = left_assoc(bit_and, just(Token::Caret).to(BinaryOp::BitXor));
        let bit_or = left_assoc(bit_xor, just(Token::Pipe).to(BinaryOp::BitOr)).boxed();

        let comparison_operator = select! {
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::Ne,
            Token::Lt => BinaryOp::Lt,
            Token::Le => BinaryOp::Le,
            Token::Gt => BinaryOp::Gt,
            Token::Ge => BinaryOp::Ge,
        };
        let membership = choice((
            marker(lines, Token::In, MEMBERSHIP_TEST),
            marker(lines, Token::Not, MEMBERSHIP_TEST).then_ignore(just(Token::In)),
            marker(lines, Token::Is, IDENTITY_TEST),
        ))
        .then_ignore(expr_tail());
        let chained = comparison_operator
            .clone()
            .map_with(move |_, e: &mut Extra<'src, '_>| (CHAINED_COMPARISON, lines.location(e.span().start)))
            .then_ignore(expr_tail());
        let comparison = bit_or
            .clone()
            .then(
                choice((
                    membership.clone().map(|rejected| (None, Some(rejected))),
                    comparison_operator
                        .then(bit_or)
                        .then(membership.or(chained).or_not())
                        .map(|(rhs, rejected)| (Some(rhs), rejected)),
                ))
                .or_not(),
            )
            .map(|(lhs, rest)| {
                let Some((rhs, rejected)) = rest else { return lhs };
                let expr = match rhs {
                    Some((op, rhs)) => binary(op, lhs, rhs),
                    None => lhs,
                };
                match rejected {
                    Some((unsupported, location)) => reject(expr, unsupported, location),
                    None => expr,
                }
            });

        let not_expr = located(lines, Token::Not).repeated().foldr(comparison, |location, operand| {
            unary(UnaryOperator::Not, operand, location)
        });
        let and_expr = left_assoc(not_expr, just(Token::And).to(BinaryOp::And));
        let or_expr = left_assoc(and_expr, just(Token::Or).to(BinaryOp::Or));

        let rejected_suffix = choice((
            marker(lines, Token::If, CONDITIONAL_EXPRESSION),
            marker(lines, Token::Walrus, ASSIGNMENT_EXPRESSION),
            marker(lines, Token::For, COMPREHENSION),
        ))
        .then_ignore(expr_tail());
        or_expr.then(rejected_suffix.or_not()).map(|(expr, rejected)| match rejected {
            Some((unsupported, location)) => reject(expr, unsupported, location),
            None => expr,
        })
    })
}

fn if_statement(
    (((location, condition), body), orelse): (((SourceLocation, Expr), Vec<Stmt>), Option<Vec<Stmt>>),
) -> Stmt {
    Stmt { kind: StmtKind::If { condition, body, orelse: orelse.unwrap_or_default() }, location }
}

/// `:` followed by an indented suite or by simple statements on the same line.
fn block<'src, P>(
    lines: &'src LineIndex<'src>,
    expr: P,
) -> impl Parser<'src, Tokens, Vec<Stmt>, ParserError<'src>> + Clone
where
    P: Parser<'src, Tokens, Expr, ParserError<'src>> + Clone + 'src,
{
    recursive(move |block| {
        let rest = skip_until(&[]);

        let keyword_statement = select! {
            Token::Pass => StmtKind::Pass,
            Token::Break => StmtKind::Break,
            Token::Continue => StmtKind::Continue,
        }
        .map_with(move |kind, e: &mut Extra<'src, '_>| Stmt { kind, location: lines.location(e.span().start) });

        let return_statement = located(lines, Token::Return)
            .then(expr.clone().or_not())
            .then(located(lines, Token::Comma).then_ignore(rest.clone()).or_not())
            .map(|((location, value), comma)| {
                let stmt = Stmt { kind: StmtKind::Return(value), location };
                match comma {
                    Some(at) => reject_stmt(stmt, MULTIPLE_RETURNS, at),
                    None => stmt,
                }
            });

        let assert_statement = located(lines, Token::Assert)
            .then(expr.clone())
            .then(just(Token::Comma).ignore_then(expr.clone()).or_not())
            .map(|((location, test), message)| Stmt {
                kind: StmtKind::Assert { test, message },
                location,
            });

        let rejected_simple = choice((
            marker(lines, Token::Raise, RAISE),
            marker(lines, Token::Del, DEL),
            marker(lines, Token::Global, GLOBAL),
            marker(lines, Token::Nonlocal, GLOBAL),
            marker(lines, Token::Import, IMPORT_INSIDE_CONTRACT),
            marker(lines, Token::From, IMPORT_INSIDE_CONTRACT),
        ))
        .then_ignore(rest.clone())
        .map(unsupported_stmt);

        let assignment = choice((
            marker(lines, Token::Comma, TUPLE_TARGETS)
                .then_ignore(rest.clone())
                .map(|(unsupported, location)| Assignment::Rejected(unsupported, location)),
            just(Token::Assign)
                .ignore_then(expr.clone())
                .then(
                    choice((
                        marker(lines, Token::Assign, CHAINED_ASSIGNMENT),
                        marker(lines, Token::Comma, TUPLE_VALUES),
                    ))
                    .then_ignore(rest.clone())
                    .or_not(),
                )
                .map(|(value, rejected)| Assignment::Plain(value, rejected)),
            just(Token::Colon)
                .ignore_then(expr.clone())
                .then(just(Token::Assign).ignore_then(expr.clone()).or_not())
                .map(|(annotation, value)| Assignment::Annotated(annotation, value)),
            select! { Token::AugAssign(op) => op }
                .then(expr.clone())
                .map(|(op, value)| Assignment::Augmented(op, value)),
        ));
        let expression_statement =
            expr.clone().then(assignment.or_not()).map_with(move |(target, assignment), e| {
                let location = lines.location(e.span().start);
                let kind = match assignment {
                    None => StmtKind::Expr(target),
                    Some(Assignment::Plain(value, None)) => StmtKind::Assign { target, value },
                    Some(Assignment::Plain(value, Some((unsupported, at)))) => {
                        let kept = Stmt { kind: StmtKind::Assign { target, value }, location };
                        return reject_stmt(kept, unsupported, at);
                    }
                    Some(Assignment::Annotated(annotation, value)) => {
                        StmtKind::AnnAssign { target, annotation, value }
                    }
                    Some(Assignment::Augmented(op, value)) => {
                        StmtKind::AugAssign { target, op, value }
                    }
                    Some(Assignment::Rejected(unsupported, at)) => {
                        let kept = Stmt { kind: StmtKind::Expr(target), location };
                        return reject_stmt(kept, unsupported, at);
                    }
                };
                Stmt { kind, location }
            });

        let simple_line = choice((
            keyword_statement,
            return_statement,
            assert_statement,
            rejected_simple,
            expression_statement,
        ))
        .separated_by(just(Token::Semicolon))
        .allow_trailing()
        .at_least(1)
        .collect::<Vec<_>>()
        .then_ignore(just(Token::Newline))
        .boxed();

        let else_block = just(Token::Else).ignore_then(block.clone());
        let elif_chain = recursive(|elif_chain| {
            located(lines, Token::Elif)
                .then(expr.clone())
                .then(block.clone())
                .then(choice((elif_chain.map(|stmt| vec![stmt]), else_block.clone())).or_not())
                .map(if_statement)
        });
        let if_stmt = located(lines, Token::If)
            .then(expr.clone())
            .then(block.clone())
            .then(choice((elif_chain.map(|stmt| vec![stmt]), else_block)).or_not())
            .map(if_statement);

        let for_stmt = choice((
            located(lines, Token::For)
                .ignore_then(identifier(lines))
                .ignore_then(marker(lines, Token::Comma, TUPLE_UNPACKING))
                .then_ignore(skip_compound())
                .map(unsupported_stmt),
            located(lines, Token::For)
                .then(identifier(lines))
                .then_ignore(just(Token::In))
                .then(expr.clone())
                .then(block.clone())
                .then(located(lines, Token::Else).then_ignore(block.clone()).or_not())
                .map(|((((location, (target, _)), iter), body), orelse)| {
                    let stmt = Stmt { kind: StmtKind::For { target, iter, body }, location };
                    match orelse {
                        Some(at) => reject_stmt(stmt, FOR_ELSE, at),
                        None => stmt,
                    }
                }),
        ));

        let rejected_compound = choice((
            marker(lines, Token::While, UNBOUNDED_LOOP),
            marker(lines, Token::Def, NESTED_FUNCTION),
            marker(lines, Token::Class, NESTED_CLASS),
            marker(lines, Token::Try, EXCEPTION_HANDLING),
            marker(lines, Token::Except, EXCEPTION_HANDLING),
            marker(lines, Token::Finally, EXCEPTION_HANDLING),
            marker(lines, Token::With, WITH),
            marker(lines, Token::Async, ASYNC_FUNCTION),
        ))
        .then_ignore(skip_compound())
        .map(unsupported_stmt);

        let statement = choice((
            if_stmt.map(|stmt| vec![stmt]),
            for_stmt.map(|stmt| vec![stmt]),
            rejected_compound.map(|stmt| vec![stmt]),
            simple_line.clone(),
        ))
        .boxed();

        let suite = statement
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|lines| lines.into_iter().flatten().collect::<Vec<_>>())
            .delimited_by(just(Token::Indent), just(Token::Dedent));
        just(Token::Colon).ignore_then(choice((just(Token::Newline).ignore_then(suite), simple_line)))
    })
}

fn module<'src>(
    lines: &'src LineIndex<'src>,
) -> impl Parser<'src, Tokens, Vec<Item>, ParserError<'src>> + Clone {
    let expr = expression(lines).boxed();
    let block = block(lines, expr.clone()).boxed();

    let dotted_name = identifier(lines)
        .map(|(name, _)| name)
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(|parts| parts.join("."));

    let decorator = located(lines, Token::At)
        .then(dotted_name.clone())
        .then(choice((
            just(Token::Newline).to(None),
            skip_until(&[]).then(just(Token::Newline)).to(Some(DECORATOR_EXPRESSION)),
        )))
        .map(|((location, name), rejected)| (Decorator { name, location }, rejected));

    let parameter = choice((
        choice((
            located(lines, Token::Star),
            located(lines, Token::DoubleStar),
            located(lines, Token::Slash),
        ))
        .then_ignore(skip_until(&[Token::Comma]))
        .map(|location| Err((VARIADIC_PARAMETERS, location))),
        identifier(lines)
            .then(just(Token::Colon).ignore_then(expr.clone()).or_not())
            .then(located(lines, Token::Assign).then_ignore(skip_until(&[Token::Comma])).or_not())
            .map(|(((name, location), annotation), default)| match default {
                Some(at) => Err((DEFAULT_PARAMETER, at)),
                None => Ok(ParamDecl { name, annotation, location }),
            }),
    ));

    let method = decorator
        .repeated()
        .collect::<Vec<_>>()
        .then(located(lines, Token::Def))
        .then(identifier(lines))
        .then(
            parameter
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then(just(Token::Arrow).ignore_then(expr.clone()).or_not())
        .then(block)
        .map(|(((((decorators, location), (name, _)), params), returns), body)| {
            let rejected = decorators
                .iter()
                .find_map(|(decorator, rejected)| rejected.map(|u| (u, decorator.location)))
                .or_else(|| params.iter().find_map(|param| param.as_ref().err().copied()));
            if let Some((unsupported, at)) = rejected {
                return Member::Unsupported(unsupported, at);
            }
            let decorators = decorators.into_iter().map(|(decorator, _)| decorator).collect();
            let params = params.into_iter().flatten().collect();
            Member::Method(FunctionDef { name, decorators, params, returns, body, location })
        });

    let field = identifier(lines)
        .then(choice((
            just(Token::Colon)
                .ignore_then(expr.clone())
                .then(just(Token::Assign).ignore_then(expr.clone()).or_not())
                .map(|(annotation, value)| (Some(annotation), value)),
            just(Token::Assign).ignore_then(expr.clone()).map(|value| (None, Some(value))),
        )))
        .then_ignore(just(Token::Newline))
        .map(|((name, location), (annotation, value))| {
            Member::Field(FieldDecl { name, annotation, value, location })
        });

    // Docstrings, `...` and `pass` lines.
    let filler = choice((
        select! { Token::Text(_) => () },
        just(Token::Ellipsis).ignored(),
        just(Token::Pass).ignored(),
    ))
    .then_ignore(just(Token::Newline));

    let rejected_member = choice((
        marker(lines, Token::Class, NESTED_CLASS),
        marker(lines, Token::Import, IMPORT_INSIDE_CONTRACT),
        marker(lines, Token::From, IMPORT_INSIDE_CONTRACT),
        marker(lines, Token::Async, ASYNC_FUNCTION),
        any()
            .filter(|token: &Token| {
                !matches!(
                    token,
                    Token::Name(_)
                        | Token::Def
                        | Token::At
                        | Token::Indent
                        | Token::Dedent
                        | Token::Newline
                )
            })
            .map_with(move |_, e: &mut Extra<'src, '_>| (CLASS_LEVEL_STATEMENT, lines.location(e.span().start))),
    ))
    .then_ignore(skip_compound())
    .map(|(unsupported, location)| Member::Unsupported(unsupported, location));

    let member = choice((
        method.map(Some),
        field.map(Some),
        filler.to(None),
        rejected_member.map(Some),
    ));

    let class = located(lines, Token::Class)
        .then(identifier(lines))
        .then(
            dotted_name
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .or_not(),
        )
        .then_ignore(just(Token::Colon))
        .then_ignore(just(Token::Newline))
        .then(
            member
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::Indent), just(Token::Dedent)),
        )
        .map(|(((location, (name, _)), bases), members)| ClassDef {
            name,
            bases: bases.unwrap_or_default(),
            members: members.into_iter().flatten().collect(),
            location,
        });

    let item = choice((
        class.map(Item::Class),
        choice((just(Token::Import), just(Token::From)))
            .then(skip_until(&[]))
            .then(just(Token::Newline))
            .to(Item::Skipped),
        select! { Token::Text(_) => () }
            .then(skip_until(&[]))
            .then(just(Token::Newline))
            .to(Item::Skipped),
        choice((
            marker(lines, Token::Def, MODULE_FUNCTION),
            marker(lines, Token::At, MODULE_DECORATOR),
            any()
                .filter(|token: &Token| {
                    !matches!(token, Token::Class | Token::Indent | Token::Dedent | Token::Newline)
                })
                .map_with(move |_, e: &mut Extra<'src, '_>| (MODULE_STATEMENT, lines.location(e.span().start))),
        ))
        .then_ignore(skip_compound())
        .map(|(unsupported, location)| Item::Unsupported(unsupported, location)),
    ));

    item.repeated().collect::<Vec<_>>().then_ignore(end())
}

/// Tracks the rejected construct that comes first in the source.
#[derive(Default)]
struct Earliest(Option<(SourceLocation, Unsupported)>);

impl Earliest {
    fn note(&mut self, unsupported: Unsupported, location: SourceLocation) {
        if self.0.is_none_or(|(first, _)| location < first) {
            self.0 = Some((location, unsupported));
        }
    }

    fn class(&mut self, class: &ClassDef) {
        for member in &class.members {
            match member {
                Member::Field(field) => {
                    for expr in field.annotation.iter().chain(&field.value) {
                        self.expr(expr);
                    }
                }
                Member::Method(method) => {
                    for param in &method.params {
                        if let Some(annotation) = &param.annotation {
                            self.expr(annotation);
                        }
                    }
                    if let Some(returns) = &method.returns {
                        self.expr(returns);
                    }
                    self.stmts(&method.body);
                }
                Member::Unsupported(unsupported, location) => self.note(*unsupported, *location),
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => self.expr(expr),
            StmtKind::Assign { target, value } | StmtKind::AugAssign { target, value, .. } => {
                self.expr(target);
                self.expr(value);
            }
            StmtKind::AnnAssign { target, annotation, value } => {
                self.expr(target);
                self.expr(annotation);
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::If { condition, body, orelse } => {
                self.expr(condition);
                self.stmts(body);
                self.stmts(orelse);
            }
            StmtKind::For { iter, body, .. } => {
                self.expr(iter);
                self.stmts(body);
            }
            StmtKind::Assert { test, message } => {
                self.expr(test);
                if let Some(message) = message {
                    self.expr(message);
                }
            }
            StmtKind::Return(None) | StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Unsupported(unsupported) => self.note(*unsupported, stmt.location),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Attribute { value, .. } => self.expr(value),
            ExprKind::Subscript { value, index } => {
                self.expr(value);
                self.expr(index);
            }
            ExprKind::Tuple(items) => {
                for item in items {
                    self.expr(item);
                }
            }
            ExprKind::Call { func, args } => {
                self.expr(func);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Unsupported(unsupported) => self.note(*unsupported, expr.location),
            ExprKind::Name(_)
            | ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Bytes(_)
            | ExprKind::Bool(_)
            | ExprKind::None
            | ExprKind::Ellipsis => {}
        }
    }
}
