// Copyright (c) 2018 Fabian Schuiki

//! David Tribble's example 11, a grammar that is LR(1) but not SLR. Both
//! `A -> c` and `B -> c` end up in the same state, and the follow sets of
//! `A` and `B` cannot tell them apart.

extern crate rexlr;

use rexlr::grammar::{Associativity, NonterminalId, TerminalId};
use rexlr::machine::ConflictKind;
use rexlr::runtime::{Position, Span};
use rexlr::{GrammarError, ParseError, ParserBuilder, SemanticValue, Token};

#[derive(Debug, Clone, PartialEq)]
struct Tree(String);

impl SemanticValue for Tree {
    fn from_error(_: &ParseError) -> Tree {
        Tree("?".to_string())
    }
}

struct Tribble {
    builder: ParserBuilder<Tree>,
    terminals: [TerminalId; 5],
    a: NonterminalId,
    b: NonterminalId,
}

fn tribble() -> Tribble {
    let mut b = ParserBuilder::new();
    let s = b.nonterminal("S");
    let na = b.nonterminal("A");
    let nb = b.nonterminal("B");
    let t = [
        b.terminal("a"),
        b.terminal("b"),
        b.terminal("c"),
        b.terminal("d"),
        b.terminal("e"),
    ];
    let join = |v: Vec<Tree>| Tree(v.into_iter().map(|t| t.0).collect::<Vec<_>>().join(" "));
    b.rule(s, vec![t[0].into(), na.into(), t[3].into()], join);
    b.rule(s, vec![t[0].into(), nb.into(), t[4].into()], join);
    b.rule(s, vec![t[1].into(), na.into(), t[4].into()], join);
    b.rule(s, vec![t[1].into(), nb.into(), t[3].into()], join);
    b.rule(na, vec![t[2].into()], |_| Tree("A".to_string()));
    b.rule(nb, vec![t[2].into()], |_| Tree("B".to_string()));
    b.start(s);
    Tribble {
        builder: b,
        terminals: t,
        a: na,
        b: nb,
    }
}

fn tokens(terminals: &[TerminalId; 5], input: &str) -> Vec<Token<Tree>> {
    input
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let index = (c as usize) - ('a' as usize);
            let span = Span::new(Position::new(0, i), Position::new(0, i + 1));
            Token::new(terminals[index], Tree(c.to_string()), span)
        })
        .collect()
}

#[test]
fn reduce_reduce_conflicts() {
    let t = tribble();
    let (a, b) = (t.a, t.b);
    let grammar = t.builder.grammar().clone();
    let conflicts = match t.builder.build() {
        Err(GrammarError::Conflicts(c)) => c,
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("grammar should not be SLR"),
    };
    assert_eq!(conflicts.len(), 2);
    for c in &conflicts {
        assert_eq!(c.kind, ConflictKind::ReduceReduce);
        let names: Vec<_> = c.rules.iter().map(|&r| grammar.rule(r).name()).collect();
        assert_eq!(names, vec![a, b]);
        assert!(c.description.contains("reduce-reduce"), "{}", c.description);
    }
    let lookaheads: Vec<_> = conflicts.iter().map(|c| c.lookahead).collect();
    assert_eq!(lookaheads, vec![t.terminals[3], t.terminals[4]]);
}

#[test]
fn precedence_picks_the_earlier_rule() {
    let mut t = tribble();
    let c = t.terminals[2];
    t.builder.precedence(Associativity::Left, vec![c]);
    let parser = t.builder.build().unwrap();
    let t = &t.terminals;
    assert_eq!(
        parser.parse(tokens(t, "acd")),
        Ok(Tree("a A d".to_string()))
    );
    assert_eq!(
        parser.parse(tokens(t, "bce")),
        Ok(Tree("b A e".to_string()))
    );
    // `B -> c` is never reduced, so these are rejected.
    assert!(parser.parse(tokens(t, "ace")).is_err());
    assert!(parser.parse(tokens(t, "bcd")).is_err());
}
