// Copyright (c) 2018 Fabian Schuiki

//! Regular expression syntax.
//!
//! Patterns are parsed with a grammar run through the crate's own parser.
//! The supported syntax covers literals, the escapes `\n`, `\r`, `\t` and
//! escaped metacharacters, character classes `[...]` and `[^...]` with
//! ranges, the whitespace classes `\s` and `\S`, grouping, alternation, `*`
//! and `+`. The characters `? $ { }` are reserved and only match when
//! escaped. Concatenation binds tighter than alternation. An empty pattern, an empty group and a missing operand
//! of `|` all denote the empty string.

use std::collections::BTreeSet;
use std::fmt;

use rexlr_runtime::{Position, Span};

use crate::grammar::{Associativity, TerminalId};
use crate::machine::GrammarError;
use crate::parser::{ParseError, Parser, ParserBuilder, SemanticValue, Token};

/// The syntax tree of a regular expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ast {
    /// The empty string.
    Empty,
    /// A single character.
    Char(char),
    /// Any character of a set, or any character not in it.
    Class {
        /// The characters listed in the class.
        chars: BTreeSet<char>,
        /// Whether the class matches the characters *not* listed.
        negated: bool,
    },
    /// One expression followed by another.
    Concat(Box<Ast>, Box<Ast>),
    /// Either of two expressions.
    Alt(Box<Ast>, Box<Ast>),
    /// Zero or more repetitions.
    Star(Box<Ast>),
    /// One or more repetitions.
    Plus(Box<Ast>),
}

impl Ast {
    fn concat(a: Ast, b: Ast) -> Ast {
        Ast::Concat(Box::new(a), Box::new(b))
    }

    fn alt(a: Ast, b: Ast) -> Ast {
        Ast::Alt(Box::new(a), Box::new(b))
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Ast::Empty => write!(f, "()"),
            Ast::Char(c) => write!(f, "{:?}", c),
            Ast::Class {
                ref chars,
                negated,
            } => {
                write!(f, "[{}", if negated { "^" } else { "" })?;
                for c in chars {
                    write!(f, "{}", c.escape_default())?;
                }
                write!(f, "]")
            }
            Ast::Concat(ref a, ref b) => write!(f, "({} {})", a, b),
            Ast::Alt(ref a, ref b) => write!(f, "({} | {})", a, b),
            Ast::Star(ref a) => write!(f, "{}*", a),
            Ast::Plus(ref a) => write!(f, "{}+", a),
        }
    }
}

/// A value on the pattern parser's stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// A raw pattern character or a resolved literal character.
    Char(char),
    /// The characters of a single class item.
    Chars(Vec<char>),
    /// The accumulated characters of a class.
    Set(BTreeSet<char>),
    /// A subexpression.
    Node(Ast),
    /// Stands in for input skipped during error recovery.
    Invalid,
}

impl Fragment {
    /// Return the character wrapped in this fragment.
    ///
    /// Panics if the fragment is not a character.
    pub fn unwrap_char(self) -> char {
        match self {
            Fragment::Char(c) => c,
            x => panic!("expected character, got {:?}", x),
        }
    }

    /// Return the subexpression wrapped in this fragment.
    ///
    /// Panics if the fragment is not a subexpression.
    pub fn unwrap_node(self) -> Ast {
        match self {
            Fragment::Node(n) => n,
            x => panic!("expected subexpression, got {:?}", x),
        }
    }

    /// Return the class characters wrapped in this fragment.
    ///
    /// Panics if the fragment is not a class item or class.
    pub fn unwrap_set(self) -> BTreeSet<char> {
        match self {
            Fragment::Chars(c) => c.into_iter().collect(),
            Fragment::Set(s) => s,
            x => panic!("expected class, got {:?}", x),
        }
    }
}

impl SemanticValue for Fragment {
    fn from_error(_: &ParseError) -> Fragment {
        Fragment::Invalid
    }
}

/// The characters matched by `\s`.
const WHITESPACE: [char; 6] = [' ', '\t', '\n', '\r', '\x0c', '\x0b'];

/// Bind the leading reduction arguments to names.
///
/// Panics if the rule produced fewer arguments than named.
macro_rules! args {
    ($v:expr; $($name:ident),+) => {
        let mut iter = $v.into_iter();
        $(let $name = match iter.next() {
            Some(x) => x,
            None => panic!("reduction is missing argument `{}`", stringify!($name)),
        };)+
    };
}

/// The terminals of the pattern grammar.
#[derive(Debug, Clone, Copy)]
struct Terminals {
    lparen: TerminalId,
    rparen: TerminalId,
    lbracket: TerminalId,
    rbracket: TerminalId,
    pipe: TerminalId,
    star: TerminalId,
    plus: TerminalId,
    caret: TerminalId,
    backslash: TerminalId,
    single_quote: TerminalId,
    double_quote: TerminalId,
    dot: TerminalId,
    dash: TerminalId,
    special: TerminalId,
    space: TerminalId,
    non_space: TerminalId,
    inert: TerminalId,
    reserved: TerminalId,
    other: TerminalId,
}

impl Terminals {
    /// Map a pattern character to its terminal.
    fn classify(&self, c: char) -> TerminalId {
        match c {
            '(' => self.lparen,
            ')' => self.rparen,
            '[' => self.lbracket,
            ']' => self.rbracket,
            '|' => self.pipe,
            '*' => self.star,
            '+' => self.plus,
            '^' => self.caret,
            '\\' => self.backslash,
            '\'' => self.single_quote,
            '"' => self.double_quote,
            '.' => self.dot,
            '-' => self.dash,
            'n' | 'r' | 't' => self.special,
            's' => self.space,
            'S' => self.non_space,
            '=' | '!' => self.inert,
            '?' | '$' | '{' | '}' => self.reserved,
            _ => self.other,
        }
    }
}

/// A parser for regular expression patterns.
///
/// Building the pattern grammar's state machine takes a moment, so construct
/// one `PatternParser` and pass it around by reference.
#[derive(Debug)]
pub struct PatternParser {
    parser: Parser<Fragment>,
    terms: Terminals,
}

impl PatternParser {
    /// Build the pattern grammar.
    pub fn new() -> Result<PatternParser, GrammarError> {
        let mut b = ParserBuilder::<Fragment>::new();
        let regex = b.nonterminal("regex");
        let expr = b.nonterminal("expr");
        let primary = b.nonterminal("primary");
        let literal = b.nonterminal("literal");
        let character = b.nonterminal("character");
        let class = b.nonterminal("class");
        let classes = b.nonterminal("classes");

        let t = Terminals {
            lparen: b.terminal("("),
            rparen: b.terminal(")"),
            lbracket: b.terminal("["),
            rbracket: b.terminal("]"),
            pipe: b.terminal("|"),
            star: b.terminal("*"),
            plus: b.terminal("+"),
            caret: b.terminal("^"),
            backslash: b.terminal("\\"),
            single_quote: b.terminal("'"),
            double_quote: b.terminal("\""),
            dot: b.terminal("."),
            dash: b.terminal("-"),
            special: b.terminal("special"),
            space: b.terminal("s"),
            non_space: b.terminal("S"),
            inert: b.terminal("inert"),
            reserved: b.terminal("reserved"),
            other: b.terminal("other"),
        };
        // Only used to give concatenation its precedence.
        let concat = b.terminal("concat");

        // Alternation binds loosest. Concatenation competes with every
        // terminal that can start a primary expression.
        b.precedence(Associativity::Left, vec![t.pipe]);
        b.precedence(
            Associativity::Left,
            vec![
                concat,
                t.lparen,
                t.lbracket,
                t.caret,
                t.dash,
                t.other,
                t.single_quote,
                t.double_quote,
                t.special,
                t.space,
                t.non_space,
                t.inert,
                t.backslash,
            ],
        );

        b.rule(regex, vec![expr.into()], first);
        b.rule(regex, vec![], |_| Fragment::Node(Ast::Empty));
        b.rule(regex, vec![t.pipe.into()], |_| Fragment::Node(Ast::Empty));
        b.rule(regex, vec![t.pipe.into(), expr.into()], |v| {
            args!(v; _pipe, e);
            Fragment::Node(Ast::alt(e.unwrap_node(), Ast::Empty))
        });

        b.rule(expr, vec![primary.into()], first);
        b.rule(expr, vec![expr.into(), t.pipe.into(), expr.into()], |v| {
            args!(v; a, _pipe, b);
            Fragment::Node(Ast::alt(a.unwrap_node(), b.unwrap_node()))
        });
        b.rule(expr, vec![expr.into(), t.pipe.into()], |v| {
            args!(v; a);
            Fragment::Node(Ast::alt(a.unwrap_node(), Ast::Empty))
        });
        b.rule_with_precedence(expr, vec![expr.into(), expr.into()], concat, |v| {
            args!(v; a, b);
            Fragment::Node(Ast::concat(a.unwrap_node(), b.unwrap_node()))
        });
        b.rule(expr, vec![primary.into(), t.star.into()], |v| {
            args!(v; a);
            Fragment::Node(Ast::Star(Box::new(a.unwrap_node())))
        });
        b.rule(expr, vec![primary.into(), t.plus.into()], |v| {
            args!(v; a);
            Fragment::Node(Ast::Plus(Box::new(a.unwrap_node())))
        });

        b.rule(primary, vec![t.lparen.into(), t.rparen.into()], |_| {
            Fragment::Node(Ast::Empty)
        });
        b.rule(primary, vec![t.lparen.into(), expr.into(), t.rparen.into()], |v| {
            args!(v; _lparen, e);
            e
        });
        b.rule(primary, vec![t.lparen.into(), t.pipe.into(), t.rparen.into()], |_| {
            Fragment::Node(Ast::Empty)
        });
        b.rule(
            primary,
            vec![t.lparen.into(), t.pipe.into(), expr.into(), t.rparen.into()],
            |v| {
                args!(v; _lparen, _pipe, e);
                Fragment::Node(Ast::alt(e.unwrap_node(), Ast::Empty))
            },
        );
        b.rule(primary, vec![literal.into()], |v| {
            args!(v; c);
            Fragment::Node(Ast::Char(c.unwrap_char()))
        });
        b.rule(primary, vec![t.lbracket.into(), classes.into(), t.rbracket.into()], |v| {
            args!(v; _lbracket, set);
            Fragment::Node(Ast::Class {
                chars: set.unwrap_set(),
                negated: false,
            })
        });
        b.rule(
            primary,
            vec![t.lbracket.into(), t.caret.into(), classes.into(), t.rbracket.into()],
            |v| {
                args!(v; _lbracket, _caret, set);
                Fragment::Node(Ast::Class {
                    chars: set.unwrap_set(),
                    negated: true,
                })
            },
        );

        b.rule(primary, vec![t.backslash.into(), t.space.into()], |_| {
            Fragment::Node(Ast::Class {
                chars: WHITESPACE.iter().cloned().collect(),
                negated: false,
            })
        });
        b.rule(primary, vec![t.backslash.into(), t.non_space.into()], |_| {
            Fragment::Node(Ast::Class {
                chars: WHITESPACE.iter().cloned().collect(),
                negated: true,
            })
        });

        for &term in &[t.caret, t.dash] {
            b.rule(literal, vec![term.into()], first);
        }
        b.rule(literal, vec![character.into()], first);

        let plain = [
            t.other,
            t.single_quote,
            t.double_quote,
            t.special,
            t.space,
            t.non_space,
            t.inert,
        ];
        for &term in &plain {
            b.rule(character, vec![term.into()], first);
        }
        b.rule(character, vec![t.backslash.into(), t.special.into()], |v| {
            args!(v; _backslash, c);
            Fragment::Char(match c.unwrap_char() {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                c => c,
            })
        });
        let escapable = [
            t.lparen,
            t.rparen,
            t.lbracket,
            t.rbracket,
            t.pipe,
            t.star,
            t.plus,
            t.caret,
            t.backslash,
            t.single_quote,
            t.double_quote,
            t.dot,
            t.dash,
            t.inert,
            t.reserved,
        ];
        for &term in &escapable {
            b.rule(character, vec![t.backslash.into(), term.into()], |v| {
                args!(v; _backslash, c);
                c
            });
        }

        b.rule(class, vec![character.into()], |v| {
            args!(v; c);
            Fragment::Chars(vec![c.unwrap_char()])
        });
        b.rule(class, vec![t.backslash.into(), t.space.into()], |_| {
            Fragment::Chars(WHITESPACE.to_vec())
        });
        b.rule(class, vec![character.into(), t.dash.into(), character.into()], |v| {
            args!(v; lo, _dash, hi);
            Fragment::Chars((lo.unwrap_char()..=hi.unwrap_char()).collect())
        });
        b.rule(classes, vec![], |_| Fragment::Set(BTreeSet::new()));
        b.rule(classes, vec![classes.into(), class.into()], |v| {
            args!(v; set, item);
            let mut set = set.unwrap_set();
            set.extend(item.unwrap_set());
            Fragment::Set(set)
        });

        b.start(regex);
        let parser = b.build()?;
        debug!(
            "built pattern grammar with {} states",
            parser.machine().len()
        );
        Ok(PatternParser { parser, terms: t })
    }

    /// Parse a pattern into its syntax tree.
    pub fn parse(&self, pattern: &str) -> Result<Ast, ParseError> {
        let tokens = pattern.chars().enumerate().map(|(index, c)| {
            let span = Span::new(Position::new(0, index), Position::new(0, index + 1));
            Token::new(self.terms.classify(c), Fragment::Char(c), span)
        });
        match self.parser.parse(tokens)? {
            Fragment::Node(ast) => Ok(ast),
            other => Err(ParseError::Internal(format!(
                "pattern parsed to {:?}",
                other
            ))),
        }
    }
}

fn first(v: Vec<Fragment>) -> Fragment {
    args!(v; x);
    x
}
