// Copyright (c) 2018 Fabian Schuiki

//! A table-driven shift-reduce parser.
//!
//! A `ParserBuilder` collects the rules of a grammar together with a reduction
//! closure for each of them. Building it computes the state machine, and the
//! resulting `Parser` can then be run over any number of token sequences. Each
//! run keeps its own stack of states, semantic values and spans.
//!
//! If the grammar enables error recovery, rules may mention the builtin
//! `error` terminal. Upon a syntax error the parser discards stack entries
//! until it finds a state that can shift `error` and continue with the
//! offending lookahead, records the error, and carries on.

use std::fmt;
use std::io::{self, Write};
use std::mem;

use rexlr_runtime::{Position, Span};
use thiserror::Error;

use crate::grammar::{Associativity, Grammar, NonterminalId, Rule, RuleId, Symbol, TerminalId,
                     END, ERROR};
use crate::machine::{Action, GrammarError, StateId, StateMachine};

/// A terminal together with its semantic value and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<V> {
    /// The terminal this token represents.
    pub terminal: TerminalId,
    /// The semantic value of the token.
    pub value: V,
    /// The location of the token in the input.
    pub span: Span,
}

impl<V> Token<V> {
    /// Create a new token.
    pub fn new(terminal: TerminalId, value: V, span: Span) -> Token<V> {
        Token {
            terminal,
            value,
            span,
        }
    }
}

/// A value that can sit on the parse stack.
pub trait SemanticValue: Sized {
    /// The nonterminal this value was produced for, if it carries such a tag.
    ///
    /// The parser compares the tag of every reduction result against the
    /// rule's nonterminal and fails with `ParseError::SymbolMismatch` if they
    /// differ. Untagged values are not checked.
    fn nonterminal(&self) -> Option<NonterminalId> {
        None
    }

    /// Create the value of an `error` terminal inserted during recovery.
    fn from_error(error: &ParseError) -> Self;

    /// Record the span covered by a reduction or an `error` entry.
    ///
    /// Called by the parser after each reduction. Values that do not track
    /// locations can ignore it.
    fn set_span(&mut self, _span: Span) {}
}

/// A reduction closure, called with the values of a rule's symbols.
pub type Reducer<V> = Box<dyn Fn(Vec<V>) -> V + Send + Sync>;

/// An error encountered while parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// A token for which the current state has no action.
    #[error("{span}: unexpected `{name}`, expected {}", one_of(.expected))]
    UnexpectedToken {
        /// The offending terminal.
        terminal: TerminalId,
        /// The name of the offending terminal.
        name: String,
        /// The location of the offending token.
        span: Span,
        /// The names of the terminals the parser would have accepted.
        expected: Vec<String>,
    },
    /// The input ended while the parser expected more.
    #[error("{position}: unexpected end of input, expected {}", one_of(.expected))]
    UnexpectedEnd {
        /// The position after the last token.
        position: Position,
        /// The names of the terminals the parser would have accepted.
        expected: Vec<String>,
    },
    /// A reduction produced a value tagged with the wrong nonterminal.
    #[error("rule {rule} produced `{found}` instead of `{expected}`")]
    SymbolMismatch {
        /// The rule that was reduced.
        rule: RuleId,
        /// The nonterminal of the rule.
        expected: String,
        /// The nonterminal the value was tagged with.
        found: String,
    },
    /// The state machine and the parse stack disagree.
    #[error("inconsistent parser state: {0}")]
    Internal(String),
}

fn one_of(names: &[String]) -> String {
    match names.len() {
        0 => "nothing".to_string(),
        1 => format!("`{}`", names[0]),
        _ => {
            let names: Vec<_> = names.iter().map(|n| format!("`{}`", n)).collect();
            format!("one of {}", names.join(", "))
        }
    }
}

/// A builder for parsers.
pub struct ParserBuilder<V> {
    grammar: Grammar,
    reducers: Vec<Reducer<V>>,
}

impl<V: SemanticValue> ParserBuilder<V> {
    /// Create a builder for an empty grammar.
    pub fn new() -> ParserBuilder<V> {
        ParserBuilder {
            grammar: Grammar::new(),
            reducers: Vec::new(),
        }
    }

    /// Declare a terminal.
    pub fn terminal<S: Into<String>>(&mut self, name: S) -> TerminalId {
        self.grammar.add_terminal(name)
    }

    /// Declare a nonterminal. The first one declared is the default start.
    pub fn nonterminal<S: Into<String>>(&mut self, name: S) -> NonterminalId {
        self.grammar.add_nonterminal(name)
    }

    /// Add a rule with its reduction closure.
    pub fn rule<F>(&mut self, name: NonterminalId, symbols: Vec<Symbol>, reduce: F) -> RuleId
    where
        F: Fn(Vec<V>) -> V + Send + Sync + 'static,
    {
        self.add(Rule::new(name, symbols), reduce)
    }

    /// Add a rule that takes the precedence of `precedence` rather than that
    /// of its rightmost terminal.
    pub fn rule_with_precedence<F>(
        &mut self,
        name: NonterminalId,
        symbols: Vec<Symbol>,
        precedence: TerminalId,
        reduce: F,
    ) -> RuleId
    where
        F: Fn(Vec<V>) -> V + Send + Sync + 'static,
    {
        self.add(Rule::new(name, symbols).with_precedence(precedence), reduce)
    }

    fn add<F>(&mut self, rule: Rule, reduce: F) -> RuleId
    where
        F: Fn(Vec<V>) -> V + Send + Sync + 'static,
    {
        self.reducers.push(Box::new(reduce));
        self.grammar.add_rule(rule)
    }

    /// Declare a precedence group binding tighter than all previous ones.
    pub fn precedence(&mut self, associativity: Associativity, terminals: Vec<TerminalId>) {
        self.grammar.add_precedence(associativity, terminals);
    }

    /// Designate the start nonterminal.
    pub fn start(&mut self, start: NonterminalId) {
        self.grammar.set_start(start);
    }

    /// Enable or disable panic-mode error recovery.
    ///
    /// `Parser::parse` still fails with the first recovered error. Use
    /// `Parser::parse_with_errors` to get the value of a recovered parse.
    pub fn recover_errors(&mut self, enable: bool) {
        self.grammar.set_recover_errors(enable);
    }

    /// The grammar built so far.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Compute the state machine and build the parser.
    pub fn build(self) -> Result<Parser<V>, GrammarError> {
        let machine = StateMachine::compute(&self.grammar)?;
        Ok(Parser {
            grammar: self.grammar,
            machine,
            reducers: self.reducers,
            trace: false,
        })
    }
}

impl<V: SemanticValue> Default for ParserBuilder<V> {
    fn default() -> ParserBuilder<V> {
        ParserBuilder::new()
    }
}

/// A parser for a grammar.
///
/// The parser itself is immutable and may be shared across threads; every
/// call to `parse` runs on its own stack.
pub struct Parser<V> {
    grammar: Grammar,
    machine: StateMachine,
    reducers: Vec<Reducer<V>>,
    trace: bool,
}

impl<V> fmt::Debug for Parser<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Parser")
            .field("rules", &self.grammar.rule_count())
            .field("states", &self.machine.len())
            .field("trace", &self.trace)
            .finish()
    }
}

impl<V: SemanticValue> Parser<V> {
    /// The grammar this parser was built from.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// The state machine driving this parser.
    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Print the stack, action and lookahead of every step to stdout.
    ///
    /// The same lines are always logged at trace level.
    pub fn set_trace(&mut self, enable: bool) {
        self.trace = enable;
    }

    /// Parse a sequence of tokens.
    ///
    /// If the grammar recovers from errors, parsing continues past them but
    /// the first one is still returned. Use `parse_with_errors` to obtain the
    /// value regardless.
    pub fn parse<I>(&self, tokens: I) -> Result<V, ParseError>
    where
        I: IntoIterator<Item = Token<V>>,
    {
        let mut errors = Vec::new();
        let value = self.parse_with_errors(tokens, &mut errors)?;
        first_error(value, errors)
    }

    /// Parse a sequence of tokens, collecting recovered errors in `errors`.
    pub fn parse_with_errors<I>(&self, tokens: I, errors: &mut Vec<ParseError>) -> Result<V, ParseError>
    where
        I: IntoIterator<Item = Token<V>>,
    {
        let machine = ParserMachine::new(self, tokens.into_iter());
        if self.trace {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            machine.run(errors, Some(&mut out as &mut dyn Write))
        } else {
            machine.run(errors, None)
        }
    }

    /// Parse a sequence of tokens, writing one line per step to `out`.
    ///
    /// Each line shows the stack, the action taken and the lookahead, in the
    /// same format `set_trace` prints. Errors are reported as in `parse`.
    pub fn parse_traced<I, W>(&self, tokens: I, out: &mut W) -> Result<V, ParseError>
    where
        I: IntoIterator<Item = Token<V>>,
        W: Write,
    {
        let mut errors = Vec::new();
        let value = ParserMachine::new(self, tokens.into_iter())
            .run(&mut errors, Some(out as &mut dyn Write))?;
        first_error(value, errors)
    }

    /// Parse a sequence of tokens produced by a fallible source, such as a
    /// lexer over a stream.
    ///
    /// The first source error aborts parsing and is returned as is.
    pub fn parse_fallible<I, E>(&self, tokens: I) -> Result<V, E>
    where
        I: IntoIterator<Item = Result<Token<V>, E>>,
        E: From<ParseError>,
    {
        let mut failure = None;
        let result = {
            let tokens = tokens.into_iter().scan((), |_, token| match token {
                Ok(token) => Some(token),
                Err(e) => {
                    failure = Some(e);
                    None
                }
            });
            self.parse(tokens)
        };
        match failure {
            Some(e) => Err(e),
            None => result.map_err(E::from),
        }
    }
}

/// The stack and input of a single parser run.
struct ParserMachine<'a, V, I> {
    parser: &'a Parser<V>,
    input: I,
    peek: Option<Token<V>>,
    stack: Vec<StackEntry<V>>,
}

/// An entry on the parser stack.
struct StackEntry<V> {
    state: StateId,
    symbol: Symbol,
    value: V,
    span: Span,
}

impl<'a, V: SemanticValue, I: Iterator<Item = Token<V>>> ParserMachine<'a, V, I> {
    fn new(parser: &'a Parser<V>, mut input: I) -> ParserMachine<'a, V, I> {
        ParserMachine {
            parser,
            peek: input.next(),
            input,
            stack: Vec::new(),
        }
    }

    fn run(
        mut self,
        errors: &mut Vec<ParseError>,
        mut out: Option<&mut dyn Write>,
    ) -> Result<V, ParseError> {
        let mut recovering = false;
        loop {
            let state = self.state();
            let lookahead = self.lookahead();
            let action = self.parser.machine[state].action(lookahead);
            if out.is_some() || log_enabled!(log::Level::Trace) {
                let step = self.describe_step(lookahead, action);
                trace!("{}", step);
                if let Some(out) = out.as_mut() {
                    writeln!(out, "{}", step)
                        .map_err(|e| ParseError::Internal(format!("cannot write trace: {}", e)))?;
                }
            }
            match action {
                Some(Action::Shift(target)) => {
                    self.shift(target)?;
                    recovering = false;
                }
                Some(Action::Reduce(rule)) => self.reduce(rule)?,
                Some(Action::Accept) => return self.accept(),
                None => {
                    let error = self.unexpected(state);
                    if !self.parser.grammar.recover_errors() {
                        return Err(error);
                    }
                    if recovering {
                        // No token was shifted since the last recovery, so
                        // discard the lookahead instead of reporting again.
                        if self.peek.is_none() {
                            return Err(error);
                        }
                        debug!("discarding token while recovering: {}", error);
                        self.advance();
                        continue;
                    }
                    if !self.recover(lookahead, &error) {
                        return Err(error);
                    }
                    debug!("recovered from syntax error: {}", error);
                    recovering = true;
                    errors.push(error);
                }
            }
        }
    }

    fn state(&self) -> StateId {
        self.stack
            .last()
            .map(|e| e.state)
            .unwrap_or(StateId::from_usize(0))
    }

    fn lookahead(&self) -> TerminalId {
        self.peek.as_ref().map(|t| t.terminal).unwrap_or(END)
    }

    /// The position after the last shifted or reduced symbol.
    fn top_end(&self) -> Position {
        match (self.stack.last(), self.peek.as_ref()) {
            (Some(entry), _) => entry.span.end,
            (None, Some(token)) => token.span.start,
            (None, None) => Position::default(),
        }
    }

    fn advance(&mut self) -> Option<Token<V>> {
        mem::replace(&mut self.peek, self.input.next())
    }

    fn shift(&mut self, target: StateId) -> Result<(), ParseError> {
        let token = match self.advance() {
            Some(token) => token,
            None => return Err(self.unexpected(self.state())),
        };
        self.stack.push(StackEntry {
            state: target,
            symbol: Symbol::Terminal(token.terminal),
            value: token.value,
            span: token.span,
        });
        Ok(())
    }

    fn reduce(&mut self, rule_id: RuleId) -> Result<(), ParseError> {
        let grammar = &self.parser.grammar;
        let rule = grammar.rule(rule_id);
        let length = rule.symbols().len();
        let at = match self.stack.len().checked_sub(length) {
            Some(at) => at,
            None => {
                return Err(ParseError::Internal(format!(
                    "stack too shallow to reduce {}",
                    rule.pretty(grammar)
                )))
            }
        };
        let span = if length > 0 {
            Span::new(self.stack[at].span.start, self.stack[self.stack.len() - 1].span.end)
        } else {
            Span::empty(self.top_end())
        };
        let args = self.stack.drain(at..).map(|e| e.value).collect();
        let mut value = (self.parser.reducers[rule_id.as_usize()])(args);
        value.set_span(span);
        if let Some(found) = value.nonterminal() {
            if found != rule.name() {
                return Err(ParseError::SymbolMismatch {
                    rule: rule_id,
                    expected: grammar.nonterminal_name(rule.name()).to_string(),
                    found: grammar.nonterminal_name(found).to_string(),
                });
            }
        }
        let target = match self.parser.machine[self.state()].goto(rule.name()) {
            Some(target) => target,
            None => {
                return Err(ParseError::Internal(format!(
                    "no goto on {} in state {}",
                    rule.name().pretty(grammar),
                    self.state()
                )))
            }
        };
        self.stack.push(StackEntry {
            state: target,
            symbol: Symbol::Nonterminal(rule.name()),
            value,
            span,
        });
        Ok(())
    }

    fn accept(mut self) -> Result<V, ParseError> {
        let start = self.parser.grammar.start();
        match self.stack.pop() {
            Some(ref entry) if self.stack.is_empty() && entry.symbol != Symbol::Nonterminal(start) => {
                Err(ParseError::Internal(format!(
                    "accepted {} instead of the start symbol",
                    entry.symbol.pretty(&self.parser.grammar)
                )))
            }
            Some(entry) if self.stack.is_empty() => Ok(entry.value),
            _ => Err(ParseError::Internal(
                "accepted with other than one symbol on the stack".to_string(),
            )),
        }
    }

    /// Pop stack entries until `error` can be shifted, then push the `error`
    /// entry. Prefers the topmost state that can also handle the lookahead
    /// after `error`; otherwise the topmost state that can shift `error` at
    /// all, in which case the lookahead will be discarded.
    fn recover(&mut self, lookahead: TerminalId, error: &ParseError) -> bool {
        let machine = &self.parser.machine;
        let candidates: Vec<(usize, StateId)> = (0..self.stack.len() + 1)
            .rev()
            .filter_map(|k| {
                let base = if k == 0 {
                    StateId::from_usize(0)
                } else {
                    self.stack[k - 1].state
                };
                match machine[base].action(ERROR) {
                    Some(Action::Shift(target)) => Some((k, target)),
                    _ => None,
                }
            })
            .collect();
        let chosen = candidates
            .iter()
            .find(|&&(_, target)| machine[target].action(lookahead).is_some())
            .or_else(|| candidates.first())
            .cloned();
        let (k, target) = match chosen {
            Some(chosen) => chosen,
            None => return false,
        };
        let end = self.top_end();
        let start = self.stack.get(k).map(|e| e.span.start).unwrap_or(end);
        let span = Span::new(start, end);
        let mut value = V::from_error(error);
        value.set_span(span);
        self.stack.truncate(k);
        self.stack.push(StackEntry {
            state: target,
            symbol: Symbol::Terminal(ERROR),
            value,
            span,
        });
        true
    }

    fn unexpected(&self, state: StateId) -> ParseError {
        let grammar = &self.parser.grammar;
        let expected = self.parser.machine[state]
            .expected()
            .filter(|&t| t != ERROR)
            .map(|t| grammar.terminal_name(t).to_string())
            .collect();
        match self.peek {
            Some(ref token) => ParseError::UnexpectedToken {
                terminal: token.terminal,
                name: grammar.terminal_name(token.terminal).to_string(),
                span: token.span,
                expected,
            },
            None => ParseError::UnexpectedEnd {
                position: self.top_end(),
                expected,
            },
        }
    }

    fn describe_step(&self, lookahead: TerminalId, action: Option<Action>) -> String {
        let grammar = &self.parser.grammar;
        let mut line = String::from("[0");
        for entry in &self.stack {
            line.push_str(&format!(" {} {}", entry.symbol.pretty(grammar), entry.state));
        }
        line.push(']');
        let action = match action {
            Some(Action::Shift(target)) => format!("shift {}", target),
            Some(Action::Reduce(rule)) => format!("reduce {}", grammar.rule(rule).pretty(grammar)),
            Some(Action::Accept) => "accept".to_string(),
            None => "error".to_string(),
        };
        format!("{} {} <- {}", line, action, lookahead.pretty(grammar))
    }
}

fn first_error<V>(value: V, errors: Vec<ParseError>) -> Result<V, ParseError> {
    match errors.into_iter().next() {
        Some(error) => Err(error),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl SemanticValue for i64 {
        fn from_error(_: &ParseError) -> i64 {
            0
        }
    }

    struct Calc {
        parser: Parser<i64>,
        num: TerminalId,
        plus: TerminalId,
        minus: TerminalId,
        times: TerminalId,
        semi: TerminalId,
    }

    fn calc(recover: bool) -> Calc {
        let mut b = ParserBuilder::<i64>::new();
        let list = b.nonterminal("list");
        let stmt = b.nonterminal("stmt");
        let expr = b.nonterminal("expr");
        let num = b.terminal("num");
        let plus = b.terminal("+");
        let minus = b.terminal("-");
        let times = b.terminal("*");
        let semi = b.terminal(";");
        b.precedence(Associativity::Left, vec![plus, minus]);
        b.precedence(Associativity::Left, vec![times]);
        b.rule(list, vec![stmt.into()], |v| v[0]);
        b.rule(list, vec![list.into(), stmt.into()], |v| v[0] + v[1]);
        b.rule(stmt, vec![expr.into(), semi.into()], |v| v[0]);
        b.rule(stmt, vec![ERROR.into(), semi.into()], |_| 1000);
        b.rule(expr, vec![expr.into(), plus.into(), expr.into()], |v| v[0] + v[2]);
        b.rule(expr, vec![expr.into(), minus.into(), expr.into()], |v| v[0] - v[2]);
        b.rule(expr, vec![expr.into(), times.into(), expr.into()], |v| v[0] * v[2]);
        b.rule(expr, vec![num.into()], |v| v[0]);
        b.recover_errors(recover);
        let parser = b.build().unwrap();
        Calc {
            parser,
            num,
            plus,
            minus,
            times,
            semi,
        }
    }

    fn tokens(c: &Calc, input: &str) -> Vec<Token<i64>> {
        input
            .chars()
            .enumerate()
            .map(|(i, ch)| {
                let span = Span::new(Position::new(0, i), Position::new(0, i + 1));
                let (terminal, value) = match ch {
                    '+' => (c.plus, 0),
                    '-' => (c.minus, 0),
                    '*' => (c.times, 0),
                    ';' => (c.semi, 0),
                    d => (c.num, d.to_digit(10).map(i64::from).unwrap_or(0)),
                };
                Token::new(terminal, value, span)
            })
            .collect()
    }

    #[test]
    fn precedence_and_associativity() {
        let c = calc(false);
        assert_eq!(c.parser.parse(tokens(&c, "1+2*3;")), Ok(7));
        assert_eq!(c.parser.parse(tokens(&c, "1-2-3;")), Ok(-4));
        assert_eq!(c.parser.parse(tokens(&c, "2*3-4*5;1;")), Ok(-13));
    }

    #[test]
    fn syntax_error_without_recovery() {
        let c = calc(false);
        match c.parser.parse(tokens(&c, "1++2;")) {
            Err(ParseError::UnexpectedToken { name, span, .. }) => {
                assert_eq!(name, "+");
                assert_eq!(span.start, Position::new(0, 2));
            }
            other => panic!("unexpected {:?}", other),
        }
        match c.parser.parse(tokens(&c, "1+")) {
            Err(ParseError::UnexpectedEnd { position, expected }) => {
                assert_eq!(position, Position::new(0, 2));
                assert_eq!(expected, vec!["num".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn recovery_records_one_error() {
        let c = calc(true);
        let mut errors = Vec::new();
        let value = c.parser
            .parse_with_errors(tokens(&c, "1+*2;3;"), &mut errors)
            .unwrap();
        assert_eq!(value, 1003);
        let mut single = Vec::new();
        assert_eq!(c.parser.parse_with_errors(tokens(&c, "1+;3;"), &mut single), Ok(1003));
        assert_eq!(single.len(), 1);
        assert_eq!(errors.len(), 1);
        match errors[0] {
            ParseError::UnexpectedToken { ref name, span, .. } => {
                assert_eq!(name, "*");
                assert_eq!(span.start, Position::new(0, 2));
            }
            ref other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.parser.parse(tokens(&c, "1+*2;3;")), Err(errors[0].clone()));
    }

    #[test]
    fn trace_shows_every_step() {
        let c = calc(false);
        let mut out = Vec::new();
        assert_eq!(c.parser.parse_traced(tokens(&c, "1+2;"), &mut out), Ok(3));
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("[0] shift "), "{}", lines[0]);
        assert!(lines[0].ends_with("<- num"), "{}", lines[0]);
        assert!(lines.iter().any(|l| l.contains("reduce expr -> expr + expr")), "{}", out);
        assert!(lines.iter().any(|l| l.contains("reduce list -> stmt")), "{}", out);
        assert!(lines.last().unwrap().contains("accept"), "{}", out);
        assert!(lines.last().unwrap().ends_with("<- $end"), "{}", out);
    }

    #[test]
    fn recovery_fails_at_end_of_input() {
        let c = calc(true);
        let mut errors = Vec::new();
        match c.parser.parse_with_errors(tokens(&c, "1+"), &mut errors) {
            Err(ParseError::UnexpectedEnd { .. }) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fallible_input_stops_at_first_error() {
        #[derive(Debug, PartialEq)]
        enum Error {
            Source,
            Parse(ParseError),
        }
        impl From<ParseError> for Error {
            fn from(e: ParseError) -> Error {
                Error::Parse(e)
            }
        }
        let c = calc(false);
        let mut input: Vec<Result<Token<i64>, Error>> =
            tokens(&c, "1+2;").into_iter().map(Ok).collect();
        assert_eq!(c.parser.parse_fallible(input.drain(..)), Ok(3));
        let mut input: Vec<Result<_, Error>> = tokens(&c, "1+2;").into_iter().map(Ok).collect();
        input.insert(2, Err(Error::Source));
        assert_eq!(c.parser.parse_fallible(input), Err(Error::Source));
    }

    #[test]
    fn reduction_tags_are_checked() {
        #[derive(Debug, PartialEq)]
        struct Tagged(Option<NonterminalId>);
        impl SemanticValue for Tagged {
            fn nonterminal(&self) -> Option<NonterminalId> {
                self.0
            }
            fn from_error(_: &ParseError) -> Tagged {
                Tagged(None)
            }
        }
        let mut b = ParserBuilder::<Tagged>::new();
        let s = b.nonterminal("s");
        let t = b.nonterminal("t");
        let x = b.terminal("x");
        b.rule(s, vec![t.into()], move |_| Tagged(Some(s)));
        b.rule(t, vec![x.into()], move |_| Tagged(Some(s)));
        let parser = b.build().unwrap();
        let input = vec![Token::new(x, Tagged(None), Span::default())];
        match parser.parse(input) {
            Err(ParseError::SymbolMismatch { expected, found, .. }) => {
                assert_eq!(expected, "t");
                assert_eq!(found, "s");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn spans_cover_children() {
        #[derive(Debug, Clone, PartialEq)]
        struct Spanned(Span);
        impl SemanticValue for Spanned {
            fn from_error(_: &ParseError) -> Spanned {
                Spanned(Span::default())
            }
            fn set_span(&mut self, span: Span) {
                self.0 = span;
            }
        }
        // s -> a x ; a -> ε
        let mut b = ParserBuilder::<Spanned>::new();
        let s = b.nonterminal("s");
        let a = b.nonterminal("a");
        let x = b.terminal("x");
        b.rule(s, vec![a.into(), x.into()], |v| Spanned(v[0].0.union(v[1].0)));
        b.rule(a, vec![], |_| Spanned(Span::default()));
        let parser = b.build().unwrap();
        let span = Span::new(Position::new(1, 3), Position::new(1, 4));
        let value = parser.parse(vec![Token::new(x, Spanned(span), span)]).unwrap();
        assert_eq!(value.0, span);

        // The empty rule sits at the start of the lookahead.
        let mut b = ParserBuilder::<Spanned>::new();
        let s = b.nonterminal("s");
        let a = b.nonterminal("a");
        let x = b.terminal("x");
        b.rule(s, vec![a.into(), x.into()], |v| v[0].clone());
        b.rule(a, vec![], |_| Spanned(Span::default()));
        let parser = b.build().unwrap();
        let value = parser.parse(vec![Token::new(x, Spanned(span), span)]).unwrap();
        assert_eq!(value.0, span);
        assert!(!value.0.is_empty());
    }
}
