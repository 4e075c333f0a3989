// Copyright (c) 2018 Fabian Schuiki

//! Deterministic finite automata and the regex compiler.
//!
//! A set of rules is compiled into a single DFA by parsing each pattern,
//! lowering all of them into one NFA and determinizing it by subset
//! construction. Each DFA state stands for the set of NFA states the
//! automaton may be in, and accepts the rule with the highest priority among
//! the accepting states in that set.

use std::collections::BTreeMap;
use std::fmt;

use bit_set::BitSet;
use indexmap::IndexMap;
use thiserror::Error;

use crate::nfa::Nfa;
use crate::parser::ParseError;
use crate::regex::PatternParser;

/// The default upper bound of code points a negated class may match.
pub const DEFAULT_ALPHABET: u32 = 128;

/// How to resolve several rules accepting the same input with equal
/// priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The rule declared last wins.
    Last,
    /// Compilation fails.
    Throw,
}

impl Default for ConflictPolicy {
    fn default() -> ConflictPolicy {
        ConflictPolicy::Last
    }
}

/// A pattern to be matched, with its priority and the payload reported when
/// it matches.
#[derive(Debug, Clone)]
pub struct RegexRule<T> {
    /// The pattern.
    pub pattern: String,
    /// The priority. Higher wins.
    pub priority: i32,
    /// The payload.
    pub payload: T,
}

impl<T> RegexRule<T> {
    /// Create a rule with priority 0.
    pub fn new<S: Into<String>>(pattern: S, payload: T) -> RegexRule<T> {
        RegexRule {
            pattern: pattern.into(),
            priority: 0,
            payload,
        }
    }

    /// Change the priority of the rule.
    pub fn with_priority(mut self, priority: i32) -> RegexRule<T> {
        self.priority = priority;
        self
    }
}

/// An error that occurred while compiling rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegexError {
    /// The pattern of a rule is malformed.
    #[error("invalid pattern in rule {rule}: {source}")]
    Syntax {
        /// The index of the offending rule.
        rule: usize,
        /// The parse error.
        source: ParseError,
    },
    /// Several rules accept the same input with equal priority.
    #[error("rules {} accept the same input with equal priority", list(.rules))]
    Conflict {
        /// The indices of all tied rules.
        rules: Vec<usize>,
    },
}

fn list(rules: &[usize]) -> String {
    let rules: Vec<String> = rules.iter().map(|r| r.to_string()).collect();
    rules.join(", ")
}

impl RegexError {
    /// Translate the rule indices carried by the error.
    pub fn map_rules<F: Fn(usize) -> usize>(self, f: F) -> RegexError {
        match self {
            RegexError::Syntax { rule, source } => RegexError::Syntax {
                rule: f(rule),
                source,
            },
            RegexError::Conflict { rules } => RegexError::Conflict {
                rules: rules.into_iter().map(f).collect(),
            },
        }
    }
}

/// A deterministic automaton that matches several rules at once.
#[derive(Debug, Clone)]
pub struct Dfa<T> {
    states: Vec<DfaState>,
    payloads: Vec<T>,
}

/// A single state of a DFA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfaState {
    transitions: BTreeMap<char, DfaStateId>,
    accept: Option<usize>,
}

/// A unique DFA state identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DfaStateId(usize);

impl<T> Dfa<T> {
    /// The state the automaton starts in.
    pub fn start(&self) -> DfaStateId {
        DfaStateId(0)
    }

    /// The state reached from `state` by consuming `c`, if any.
    pub fn next(&self, state: DfaStateId, c: char) -> Option<DfaStateId> {
        self.states[state.0].transitions.get(&c).cloned()
    }

    /// The rule accepted in a state and its payload.
    pub fn accept(&self, state: DfaStateId) -> Option<(usize, &T)> {
        self.states[state.0]
            .accept
            .map(|rule| (rule, &self.payloads[rule]))
    }

    /// The payload of a rule.
    pub fn payload(&self, rule: usize) -> &T {
        &self.payloads[rule]
    }

    /// All states.
    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    /// The number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check whether there are no states. Never true for compiled automata.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl DfaState {
    /// The outgoing transitions.
    pub fn transitions(&self) -> impl Iterator<Item = (char, DfaStateId)> + '_ {
        self.transitions.iter().map(|(&c, &id)| (c, id))
    }

    /// The rule accepted in this state, if any.
    pub fn accept(&self) -> Option<usize> {
        self.accept
    }
}

impl DfaStateId {
    /// Obtain the id as a usize.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for DfaStateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

impl<T> fmt::Display for Dfa<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, state) in self.states.iter().enumerate() {
            write!(f, "d{}", index)?;
            if let Some(rule) = state.accept {
                write!(f, " (accepts {})", rule)?;
            }
            writeln!(f, ":")?;
            for (c, target) in state.transitions() {
                writeln!(f, "  {:?} -> {}", c, target)?;
            }
        }
        Ok(())
    }
}

/// Compiles rules into a DFA.
#[derive(Debug, Clone, Copy)]
pub struct RegexCompiler<'p> {
    parser: &'p PatternParser,
    alphabet: u32,
    policy: ConflictPolicy,
}

impl<'p> RegexCompiler<'p> {
    /// Create a compiler that parses patterns with `parser`.
    pub fn new(parser: &'p PatternParser) -> RegexCompiler<'p> {
        RegexCompiler {
            parser,
            alphabet: DEFAULT_ALPHABET,
            policy: ConflictPolicy::default(),
        }
    }

    /// Set the code points negated classes range over, `0..alphabet`.
    pub fn alphabet(mut self, alphabet: u32) -> RegexCompiler<'p> {
        self.alphabet = alphabet;
        self
    }

    /// Set the conflict policy.
    pub fn policy(mut self, policy: ConflictPolicy) -> RegexCompiler<'p> {
        self.policy = policy;
        self
    }

    /// Compile rules into a DFA. Rules are identified by their index.
    pub fn compile<T>(&self, rules: Vec<RegexRule<T>>) -> Result<Dfa<T>, RegexError> {
        let mut nfa = Nfa::new();
        let mut payloads = Vec::with_capacity(rules.len());
        for (index, rule) in rules.into_iter().enumerate() {
            let ast = self
                .parser
                .parse(&rule.pattern)
                .map_err(|source| RegexError::Syntax {
                    rule: index,
                    source,
                })?;
            trace!("rule {}: {} parsed as {}", index, rule.pattern, ast);
            nfa.add_rule(index, rule.priority, &ast, self.alphabet);
            payloads.push(rule.payload);
        }
        let states = self.determinize(&nfa)?;
        debug!(
            "compiled {} rules into {} NFA and {} DFA states",
            payloads.len(),
            nfa.len(),
            states.len()
        );
        Ok(Dfa { states, payloads })
    }

    /// Subset construction, breadth first from the root's closure.
    fn determinize(&self, nfa: &Nfa) -> Result<Vec<DfaState>, RegexError> {
        let mut root = nfa.empty_set();
        root.insert(nfa.root().as_usize());
        nfa.epsilon_closure(&mut root);

        let mut sets = IndexMap::<BitSet, DfaStateId>::new();
        let mut states = Vec::<DfaState>::new();
        sets.insert(root, DfaStateId(0));

        let mut index = 0;
        while index < sets.len() {
            let set = match sets.get_index(index) {
                Some((set, _)) => set.clone(),
                None => break,
            };
            let mut transitions = BTreeMap::new();
            for c in nfa.symbols(&set) {
                let next = nfa.step(&set, c);
                let len = sets.len();
                let target = *sets.entry(next).or_insert(DfaStateId(len));
                transitions.insert(c, target);
            }
            states.push(DfaState {
                transitions,
                accept: self.resolve(nfa, &set)?,
            });
            index += 1;
        }
        Ok(states)
    }

    /// Pick the rule accepted by a set of NFA states.
    fn resolve(&self, nfa: &Nfa, set: &BitSet) -> Result<Option<usize>, RegexError> {
        let accepting: Vec<(i32, usize)> = nfa.accepting(set).collect();
        let best = match accepting.iter().map(|&(p, _)| p).max() {
            Some(p) => p,
            None => return Ok(None),
        };
        let mut tied: Vec<usize> = accepting
            .iter()
            .filter(|&&(p, _)| p == best)
            .map(|&(_, r)| r)
            .collect();
        tied.sort();
        tied.dedup();
        if tied.len() > 1 {
            match self.policy {
                ConflictPolicy::Throw => return Err(RegexError::Conflict { rules: tied }),
                ConflictPolicy::Last => {
                    trace!("rules {} tie, picking the last", list(&tied));
                }
            }
        }
        Ok(tied.last().cloned())
    }
}
