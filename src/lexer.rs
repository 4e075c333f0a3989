// Copyright (c) 2018 Fabian Schuiki

//! A lexer driven by one DFA per lexer state.
//!
//! Rules are registered for a lexer state together with an action. The
//! lexer repeatedly matches the longest prefix of the input against the
//! rules of its current state and runs the action of the winning rule. An
//! action inspects the match through a `Scanner` and may switch to another
//! state, queue tokens, hand back part of the match, or end the stream.

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;
use rexlr_runtime::{Position, SeekError, Span, TextSource};

use crate::dfa::{ConflictPolicy, Dfa, RegexCompiler, RegexError, RegexRule, DEFAULT_ALPHABET};
use crate::grammar::TerminalId;
use crate::parser::Token;
use crate::regex::PatternParser;
use crate::runner::next_match_with_span;

/// The action run when a rule matches.
pub type LexAction<S, V> = Box<dyn Fn(&mut Scanner<S, V>) -> Option<Token<V>> + Send + Sync>;

/// The view of a match handed to a lexer action.
#[derive(Debug)]
pub struct Scanner<S, V> {
    text: String,
    span: Span,
    state: S,
    queued: Vec<Token<V>>,
    ended: bool,
    reverse: usize,
}

impl<S, V> Scanner<S, V> {
    /// The matched text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The location of the matched text.
    pub fn span(&self) -> Span {
        self.span
    }

    /// The state the lexer will continue in.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Continue in another lexer state after this action.
    pub fn goto(&mut self, state: S) {
        self.state = state;
    }

    /// Queue a token. Queued tokens are emitted before the token the action
    /// returns.
    pub fn yield_token(&mut self, token: Token<V>) {
        self.queued.push(token);
    }

    /// Queue a token that covers the match.
    pub fn emit(&mut self, terminal: TerminalId, value: V) {
        let token = self.make(terminal, value);
        self.yield_token(token);
    }

    /// Create a token that covers the match.
    pub fn make(&self, terminal: TerminalId, value: V) -> Token<V> {
        Token::new(terminal, value, self.span)
    }

    /// Stop the token stream after the tokens of this action.
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// Hand the last `amount` characters back to the input once the action
    /// returns. The span of the match is not affected.
    pub fn reverse(&mut self, amount: usize) {
        self.reverse += amount;
    }
}

/// An action that turns the match into a token, with a value computed from
/// the matched text.
pub fn token<S, V, F>(terminal: TerminalId, value: F) -> LexAction<S, V>
where
    F: Fn(&str) -> V + Send + Sync + 'static,
{
    Box::new(move |s: &mut Scanner<S, V>| Some(s.make(terminal, value(s.text()))))
}

/// An action that discards the match.
pub fn skip<S, V>() -> LexAction<S, V> {
    Box::new(|_: &mut Scanner<S, V>| None)
}

/// Collects the rules of a lexer.
///
/// A rule that accepts the empty string also matches at the end of input,
/// so its action runs once more with empty text there.
pub struct LexerBuilder<'p, S, V> {
    parser: &'p PatternParser,
    initial: S,
    rules: Vec<(S, RegexRule<usize>)>,
    actions: Vec<LexAction<S, V>>,
    alphabet: u32,
    policy: ConflictPolicy,
}

impl<'p, S, V> LexerBuilder<'p, S, V>
where
    S: Clone + Eq + Hash + fmt::Debug,
{
    /// Create a builder for a lexer that starts in state `initial`.
    pub fn new(parser: &'p PatternParser, initial: S) -> LexerBuilder<'p, S, V> {
        LexerBuilder {
            parser,
            initial,
            rules: Vec::new(),
            actions: Vec::new(),
            alphabet: DEFAULT_ALPHABET,
            policy: ConflictPolicy::default(),
        }
    }

    /// Add a rule with priority 0 and return its index.
    pub fn rule<P: Into<String>>(&mut self, state: S, pattern: P, action: LexAction<S, V>) -> usize {
        self.rule_with_priority(state, pattern, 0, action)
    }

    /// Add a rule and return its index.
    pub fn rule_with_priority<P: Into<String>>(
        &mut self,
        state: S,
        pattern: P,
        priority: i32,
        action: LexAction<S, V>,
    ) -> usize {
        let index = self.rules.len();
        self.rules
            .push((state, RegexRule::new(pattern, index).with_priority(priority)));
        self.actions.push(action);
        index
    }

    /// Set the code points negated classes range over.
    pub fn alphabet(&mut self, alphabet: u32) {
        self.alphabet = alphabet;
    }

    /// Set how rules of equal priority accepting the same input are handled.
    pub fn policy(&mut self, policy: ConflictPolicy) {
        self.policy = policy;
    }

    /// Compile the rules of every state.
    ///
    /// Errors carry the index of the offending rules as returned by `rule`.
    pub fn build(self) -> Result<LexerDef<S, V>, RegexError> {
        let mut grouped = IndexMap::<S, Vec<RegexRule<usize>>>::new();
        for (state, rule) in self.rules {
            grouped.entry(state).or_insert_with(Vec::new).push(rule);
        }
        let compiler = RegexCompiler::new(self.parser)
            .alphabet(self.alphabet)
            .policy(self.policy);
        let mut dfas = IndexMap::new();
        for (state, rules) in grouped {
            let global: Vec<usize> = rules.iter().map(|r| r.payload).collect();
            let dfa = compiler
                .compile(rules)
                .map_err(|e| e.map_rules(|local| global[local]))?;
            debug!("lexer state {:?}: {} DFA states", state, dfa.len());
            dfas.insert(state, dfa);
        }
        Ok(LexerDef {
            initial: self.initial,
            dfas,
            actions: self.actions,
        })
    }
}

/// A compiled lexer.
pub struct LexerDef<S, V> {
    initial: S,
    /// One automaton per state, reporting global rule indices.
    dfas: IndexMap<S, Dfa<usize>>,
    actions: Vec<LexAction<S, V>>,
}

impl<S, V> LexerDef<S, V>
where
    S: Clone + Eq + Hash + fmt::Debug,
{
    /// The state a lexer starts in.
    pub fn initial(&self) -> &S {
        &self.initial
    }

    /// The automaton of a state.
    pub fn dfa(&self, state: &S) -> Option<&Dfa<usize>> {
        self.dfas.get(state)
    }

    /// Tokenize a source.
    pub fn lex<R: TextSource>(&self, source: R) -> Lexer<S, V, R> {
        Lexer {
            def: self,
            source,
            state: self.initial.clone(),
            queue: VecDeque::new(),
            stalled: Vec::new(),
            ended: false,
        }
    }
}

impl<S: fmt::Debug, V> fmt::Debug for LexerDef<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LexerDef")
            .field("initial", &self.initial)
            .field("states", &self.dfas.keys().collect::<Vec<_>>())
            .field("rules", &self.actions.len())
            .finish()
    }
}

/// A lazy stream of tokens.
pub struct Lexer<'d, S, V, R> {
    def: &'d LexerDef<S, V>,
    source: R,
    state: S,
    queue: VecDeque<Token<V>>,
    /// States already tried at the current offset without consuming input.
    stalled: Vec<S>,
    ended: bool,
}

impl<'d, S, V, R> Lexer<'d, S, V, R>
where
    S: Clone + Eq + Hash + fmt::Debug,
    R: TextSource,
{
    /// The current lexer state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// The position of the input cursor.
    ///
    /// After the stream stopped because no rule matched, this is where the
    /// unmatched input begins.
    pub fn position(&self) -> Position {
        self.source.position()
    }

    /// Give back the source.
    pub fn into_source(self) -> R {
        self.source
    }

    /// Match once and run the action. Returns `false` once the stream ends.
    fn step(&mut self) -> Result<bool, SeekError> {
        let dfa = match self.def.dfas.get(&self.state) {
            Some(dfa) => dfa,
            None => {
                warn!("lexer state {:?} has no rules", self.state);
                return Ok(false);
            }
        };
        let before = self.source.offset();
        let (m, span) = match next_match_with_span(dfa, &mut self.source)? {
            Some(x) => x,
            None => {
                debug!("no rule matches at {} in {:?}", self.source.position(), self.state);
                return Ok(false);
            }
        };
        let rule = *m.payload;
        trace!("{}: rule {} matched {:?} in {:?}", span, rule, m.text, self.state);

        let mut scanner = Scanner {
            text: m.text,
            span,
            state: self.state.clone(),
            queued: Vec::new(),
            ended: false,
            reverse: 0,
        };
        let direct = (self.def.actions[rule])(&mut scanner);
        if scanner.reverse > 0 {
            self.source.reverse(scanner.reverse)?;
        }
        self.queue.extend(scanner.queued);
        self.queue.extend(direct);

        let previous = std::mem::replace(&mut self.state, scanner.state);
        if scanner.ended {
            return Ok(false);
        }
        if self.source.offset() > before {
            self.stalled.clear();
        } else {
            if previous == self.state || self.stalled.contains(&self.state) {
                debug!("lexer makes no progress at {}", self.source.position());
                return Ok(false);
            }
            self.stalled.push(previous);
        }
        Ok(true)
    }
}

impl<'d, S, V, R> Iterator for Lexer<'d, S, V, R>
where
    S: Clone + Eq + Hash + fmt::Debug,
    R: TextSource,
{
    type Item = Result<Token<V>, SeekError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.queue.pop_front() {
                return Some(Ok(token));
            }
            if self.ended {
                return None;
            }
            match self.step() {
                Ok(true) => (),
                Ok(false) => self.ended = true,
                Err(e) => {
                    self.ended = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexlr_runtime::StrSource;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Mode {
        Code,
        Str,
    }

    const WORD: TerminalId = TerminalId::from_usize(2);
    const STR: TerminalId = TerminalId::from_usize(3);
    const QUOTE: TerminalId = TerminalId::from_usize(4);

    fn run<S>(def: &LexerDef<S, String>, input: &str) -> Vec<(usize, String, String)>
    where
        S: Clone + Eq + Hash + fmt::Debug,
    {
        def.lex(StrSource::new(input))
            .map(|t| {
                let t = t.unwrap();
                (t.terminal.as_usize(), t.value, t.span.to_string())
            })
            .collect()
    }

    fn string_lexer(parser: &PatternParser) -> LexerDef<Mode, String> {
        let mut b = LexerBuilder::new(parser, Mode::Code);
        b.rule(Mode::Code, "[a-z]+", token(WORD, |s| s.to_string()));
        b.rule(Mode::Code, "[ \n]+", skip());
        b.rule(Mode::Code, "\"", Box::new(|s: &mut Scanner<Mode, String>| {
            s.goto(Mode::Str);
            Some(s.make(QUOTE, String::new()))
        }));
        b.rule(Mode::Str, "[^\"]*\"", Box::new(|s: &mut Scanner<Mode, String>| {
            let body = s.text().trim_end_matches('"').to_string();
            s.goto(Mode::Code);
            s.emit(STR, body);
            None
        }));
        b.build().unwrap()
    }

    #[test]
    fn states_switch_rules() {
        let parser = PatternParser::new().unwrap();
        let def = string_lexer(&parser);
        assert_eq!(
            run(&def, "ab \"x y\"\ncd"),
            vec![
                (2, "ab".to_string(), "1:1-1:3".to_string()),
                (4, "".to_string(), "1:4-1:5".to_string()),
                (3, "x y".to_string(), "1:5-1:9".to_string()),
                (2, "cd".to_string(), "2:1-2:3".to_string()),
            ]
        );
    }

    #[test]
    fn queued_tokens_come_first() {
        let parser = PatternParser::new().unwrap();
        let mut b = LexerBuilder::new(&parser, ());
        b.rule((), "ab", Box::new(|s: &mut Scanner<(), String>| {
            s.emit(WORD, "first".to_string());
            s.emit(WORD, "second".to_string());
            Some(s.make(STR, "direct".to_string()))
        }));
        let def = b.build().unwrap();
        let values: Vec<String> = run(&def, "ab").into_iter().map(|t| t.1).collect();
        assert_eq!(values, vec!["first", "second", "direct"]);
    }

    #[test]
    fn end_stops_the_stream() {
        let parser = PatternParser::new().unwrap();
        let mut b = LexerBuilder::new(&parser, ());
        b.rule((), "[a-z]+", token(WORD, |s| s.to_string()));
        b.rule((), ";", Box::new(|s: &mut Scanner<(), String>| {
            s.end();
            Some(s.make(QUOTE, String::new()))
        }));
        let def = b.build().unwrap();
        let mut lexer = def.lex(StrSource::new("ab;cd"));
        assert_eq!(lexer.next().unwrap().unwrap().value, "ab");
        assert_eq!(lexer.next().unwrap().unwrap().terminal, QUOTE);
        assert!(lexer.next().is_none());
        assert_eq!(lexer.position(), Position::new(0, 3));
    }

    #[test]
    fn reverse_hands_input_back() {
        let parser = PatternParser::new().unwrap();
        let mut b = LexerBuilder::new(&parser, ());
        // Only keep the first character of a run of digits.
        b.rule((), "[0-9]+", Box::new(|s: &mut Scanner<(), String>| {
            let n = s.text().chars().count();
            s.reverse(n - 1);
            Some(s.make(WORD, s.text()[..1].to_string()))
        }));
        let def = b.build().unwrap();
        let values: Vec<String> = run(&def, "123").into_iter().map(|t| t.1).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
    }

    #[test]
    fn unmatched_input_stops_silently() {
        let parser = PatternParser::new().unwrap();
        let def = string_lexer(&parser);
        let mut lexer = def.lex(StrSource::new("ab\n  9x"));
        assert_eq!(lexer.next().unwrap().unwrap().value, "ab");
        assert!(lexer.next().is_none());
        assert_eq!(lexer.position(), Position::new(1, 2));
    }

    #[test]
    fn empty_matches_terminate() {
        let parser = PatternParser::new().unwrap();
        let mut b = LexerBuilder::new(&parser, Mode::Code);
        b.rule(Mode::Code, "a*", token(WORD, |s| s.to_string()));
        let def = b.build().unwrap();
        // The trailing empty match at the end of input is emitted once.
        let values: Vec<String> = run(&def, "aa").into_iter().map(|t| t.1).collect();
        assert_eq!(values, vec!["aa", ""]);

        // Bouncing between states without consuming input ends as well.
        let mut b = LexerBuilder::new(&parser, Mode::Code);
        b.rule(Mode::Code, "", Box::new(|s: &mut Scanner<Mode, String>| {
            s.goto(Mode::Str);
            None
        }));
        b.rule(Mode::Str, "", Box::new(|s: &mut Scanner<Mode, String>| {
            s.goto(Mode::Code);
            None
        }));
        let def = b.build().unwrap();
        assert!(run(&def, "x").is_empty());
    }

    #[test]
    fn missing_state_ends_the_stream() {
        let parser = PatternParser::new().unwrap();
        let mut b = LexerBuilder::new(&parser, Mode::Code);
        b.rule(Mode::Code, "a", Box::new(|s: &mut Scanner<Mode, String>| {
            s.goto(Mode::Str);
            Some(s.make(WORD, s.text().to_string()))
        }));
        let def = b.build().unwrap();
        assert_eq!(run(&def, "aa").len(), 1);
    }

    #[test]
    fn errors_name_global_rules() {
        let parser = PatternParser::new().unwrap();
        let mut b = LexerBuilder::<Mode, String>::new(&parser, Mode::Code);
        b.policy(ConflictPolicy::Throw);
        b.rule(Mode::Str, "x", skip());
        b.rule(Mode::Code, "a", skip());
        b.rule(Mode::Str, "y", skip());
        b.rule(Mode::Code, "[ab]", skip());
        assert_eq!(
            b.build().unwrap_err(),
            RegexError::Conflict { rules: vec![1, 3] }
        );

        let mut b = LexerBuilder::<Mode, String>::new(&parser, Mode::Code);
        b.rule(Mode::Code, "a", skip());
        b.rule(Mode::Str, "(", skip());
        match b.build().unwrap_err() {
            RegexError::Syntax { rule, .. } => assert_eq!(rule, 1),
            e => panic!("unexpected error {}", e),
        }
    }
}
