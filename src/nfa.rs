// Copyright (c) 2018 Fabian Schuiki

//! Nondeterministic finite automata.
//!
//! Every rule's pattern is lowered into a fragment of epsilon-linked states
//! by Thompson's construction. All fragments hang off a single root state,
//! such that the automaton matches all rules at once. The automaton only
//! lives until it has been determinized.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bit_set::BitSet;

use crate::regex::Ast;

/// A nondeterministic automaton over the patterns of several rules.
#[derive(Debug, Clone)]
pub struct Nfa {
    states: Vec<NfaState>,
}

/// A single state of an NFA.
#[derive(Debug, Clone, Default)]
pub struct NfaState {
    /// The rule whose pattern this state belongs to.
    rule: Option<usize>,
    /// The priority of that rule.
    priority: i32,
    /// The rule accepted when the automaton is in this state.
    accept: Option<usize>,
    /// States reachable without consuming input.
    epsilon: Vec<NfaStateId>,
    /// States reachable by consuming a character.
    transitions: BTreeMap<char, Vec<NfaStateId>>,
}

/// A unique NFA state identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NfaStateId(usize);

/// The entry and exit state of a partially built pattern.
#[derive(Debug, Clone, Copy)]
struct Fragment {
    start: NfaStateId,
    end: NfaStateId,
}

impl Nfa {
    /// Create an automaton that only consists of the root state.
    pub fn new() -> Nfa {
        Nfa {
            states: vec![NfaState::default()],
        }
    }

    /// The root state that leads into every rule.
    pub fn root(&self) -> NfaStateId {
        NfaStateId(0)
    }

    /// Add the pattern of a rule to the automaton.
    ///
    /// Negated classes match every code point below `alphabet` that is not
    /// listed in the class.
    pub fn add_rule(&mut self, rule: usize, priority: i32, ast: &Ast, alphabet: u32) {
        let mut builder = Builder {
            nfa: self,
            rule,
            priority,
            alphabet,
        };
        let frag = builder.lower(ast);
        let accept = builder.add();
        builder.epsilon(frag.end, accept);
        self.states[accept.0].accept = Some(rule);
        self.states[0].epsilon.push(frag.start);
    }

    /// The number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check whether the automaton has no states. Never true.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Get a state.
    pub fn state(&self, id: NfaStateId) -> &NfaState {
        &self.states[id.0]
    }

    /// An empty set of states.
    pub fn empty_set(&self) -> BitSet {
        BitSet::with_capacity(self.states.len())
    }

    /// Extend a set of states by everything reachable through epsilon edges.
    pub fn epsilon_closure(&self, set: &mut BitSet) {
        let mut todo: Vec<usize> = set.iter().collect();
        while let Some(id) = todo.pop() {
            for next in &self.states[id].epsilon {
                if set.insert(next.0) {
                    todo.push(next.0);
                }
            }
        }
    }

    /// The characters on which any state in the set has a transition.
    pub fn symbols(&self, set: &BitSet) -> BTreeSet<char> {
        set.iter()
            .flat_map(|id| self.states[id].transitions.keys().cloned())
            .collect()
    }

    /// The epsilon closure of the states reached from a set by consuming `c`.
    pub fn step(&self, set: &BitSet, c: char) -> BitSet {
        let mut next = self.empty_set();
        for id in set.iter() {
            if let Some(targets) = self.states[id].transitions.get(&c) {
                for target in targets {
                    next.insert(target.0);
                }
            }
        }
        self.epsilon_closure(&mut next);
        next
    }

    /// The accepting states in a set, as `(priority, rule)` pairs.
    pub fn accepting<'a>(&'a self, set: &'a BitSet) -> impl Iterator<Item = (i32, usize)> + 'a {
        set.iter().filter_map(move |id| {
            let state = &self.states[id];
            state.accept.map(|rule| (state.priority, rule))
        })
    }
}

impl Default for Nfa {
    fn default() -> Nfa {
        Nfa::new()
    }
}

impl NfaState {
    /// The rule this state belongs to, or `None` for the root.
    pub fn rule(&self) -> Option<usize> {
        self.rule
    }

    /// The priority of the rule this state belongs to.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The rule accepted in this state, if any.
    pub fn accept(&self) -> Option<usize> {
        self.accept
    }

    /// The epsilon successors.
    pub fn epsilon(&self) -> &[NfaStateId] {
        &self.epsilon
    }

    /// The successors when consuming `c`.
    pub fn transitions(&self, c: char) -> &[NfaStateId] {
        self.transitions.get(&c).map(|t| t.as_slice()).unwrap_or(&[])
    }
}

impl NfaStateId {
    /// Obtain the id as a usize.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for NfaStateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

struct Builder<'a> {
    nfa: &'a mut Nfa,
    rule: usize,
    priority: i32,
    alphabet: u32,
}

impl<'a> Builder<'a> {
    fn add(&mut self) -> NfaStateId {
        let id = NfaStateId(self.nfa.states.len());
        self.nfa.states.push(NfaState {
            rule: Some(self.rule),
            priority: self.priority,
            ..NfaState::default()
        });
        id
    }

    fn epsilon(&mut self, from: NfaStateId, to: NfaStateId) {
        self.nfa.states[from.0].epsilon.push(to);
    }

    fn edge(&mut self, from: NfaStateId, c: char, to: NfaStateId) {
        self.nfa.states[from.0]
            .transitions
            .entry(c)
            .or_insert_with(Vec::new)
            .push(to);
    }

    fn lower(&mut self, ast: &Ast) -> Fragment {
        match *ast {
            Ast::Empty => {
                let s = self.add();
                Fragment { start: s, end: s }
            }
            Ast::Char(c) => {
                let start = self.add();
                let end = self.add();
                self.edge(start, c, end);
                Fragment { start, end }
            }
            Ast::Class {
                ref chars,
                negated,
            } => {
                let start = self.add();
                let end = self.add();
                if negated {
                    let complement: Vec<char> = (0..self.alphabet)
                        .filter_map(std::char::from_u32)
                        .filter(|c| !chars.contains(c))
                        .collect();
                    for c in complement {
                        self.edge(start, c, end);
                    }
                } else {
                    for &c in chars {
                        self.edge(start, c, end);
                    }
                }
                Fragment { start, end }
            }
            Ast::Concat(ref a, ref b) => {
                let a = self.lower(a);
                let b = self.lower(b);
                self.epsilon(a.end, b.start);
                Fragment {
                    start: a.start,
                    end: b.end,
                }
            }
            Ast::Alt(ref a, ref b) => {
                let start = self.add();
                let a = self.lower(a);
                let b = self.lower(b);
                let end = self.add();
                self.epsilon(start, a.start);
                self.epsilon(start, b.start);
                self.epsilon(a.end, end);
                self.epsilon(b.end, end);
                Fragment { start, end }
            }
            Ast::Star(ref a) => {
                let start = self.add();
                let a = self.lower(a);
                let end = self.add();
                self.epsilon(start, a.start);
                self.epsilon(a.end, start);
                self.epsilon(start, end);
                Fragment { start, end }
            }
            Ast::Plus(ref a) => {
                let start = self.add();
                let a = self.lower(a);
                let end = self.add();
                self.epsilon(start, a.start);
                self.epsilon(a.end, end);
                self.epsilon(end, start);
                Fragment { start, end }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chr(c: char) -> Box<Ast> {
        Box::new(Ast::Char(c))
    }

    /// Run the automaton over `input` and report the accepted rules.
    fn run(nfa: &Nfa, input: &str) -> Vec<usize> {
        let mut set = nfa.empty_set();
        set.insert(nfa.root().as_usize());
        nfa.epsilon_closure(&mut set);
        for c in input.chars() {
            set = nfa.step(&set, c);
        }
        let mut rules: Vec<usize> = nfa.accepting(&set).map(|(_, r)| r).collect();
        rules.sort();
        rules
    }

    #[test]
    fn alternation_and_star() {
        // (a|b)*c
        let ast = Ast::Concat(
            Box::new(Ast::Star(Box::new(Ast::Alt(chr('a'), chr('b'))))),
            chr('c'),
        );
        let mut nfa = Nfa::new();
        nfa.add_rule(0, 0, &ast, 128);
        assert_eq!(run(&nfa, "c"), vec![0]);
        assert_eq!(run(&nfa, "abbac"), vec![0]);
        assert_eq!(run(&nfa, "ab"), Vec::<usize>::new());
        assert_eq!(run(&nfa, "cc"), Vec::<usize>::new());
    }

    #[test]
    fn plus_requires_one() {
        let mut nfa = Nfa::new();
        nfa.add_rule(3, 0, &Ast::Plus(chr('x')), 128);
        assert_eq!(run(&nfa, ""), Vec::<usize>::new());
        assert_eq!(run(&nfa, "x"), vec![3]);
        assert_eq!(run(&nfa, "xxx"), vec![3]);
    }

    #[test]
    fn negated_class_uses_alphabet() {
        let ast = Ast::Class {
            chars: "ab".chars().collect(),
            negated: true,
        };
        let mut nfa = Nfa::new();
        nfa.add_rule(0, 0, &ast, 128);
        assert_eq!(run(&nfa, "z"), vec![0]);
        assert_eq!(run(&nfa, "a"), Vec::<usize>::new());
        assert_eq!(run(&nfa, "é"), Vec::<usize>::new());

        let mut wide = Nfa::new();
        wide.add_rule(0, 0, &ast, 256);
        assert_eq!(run(&wide, "é"), vec![0]);
    }

    #[test]
    fn rules_share_the_root() {
        let mut nfa = Nfa::new();
        nfa.add_rule(0, 0, &Ast::Char('a'), 128);
        nfa.add_rule(1, 5, &Ast::Plus(chr('a')), 128);
        nfa.add_rule(2, 0, &Ast::Empty, 128);
        assert_eq!(nfa.state(nfa.root()).epsilon().len(), 3);
        assert_eq!(run(&nfa, ""), vec![2]);
        assert_eq!(run(&nfa, "a"), vec![0, 1]);
        assert_eq!(run(&nfa, "aa"), vec![1]);
    }
}
