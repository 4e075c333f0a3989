// Copyright (c) 2018 Fabian Schuiki

//! First and follow set computation.
//!
//! This module implements computation of the first sets for a grammar. The
//! first set of a nonterminal states all terminals that can appear as its
//! first symbol. Since rules may contain other rules and epsilon productions,
//! computation is somewhat tricky. The follow sets, i.e. the terminals that
//! may appear right after a nonterminal, are derived from the first sets and
//! serve as reduce lookaheads.

use std::iter::repeat;
use std::mem::swap;

use bit_set::BitSet;

use crate::grammar::{Grammar, NonterminalId, Symbol, TerminalId, END};

/// All first sets of a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstSets(Vec<FirstSet>);

/// The first set of a nonterminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstSet {
    /// The first symbols.
    symbols: BitSet,
    /// Whether one of the productions is empty.
    has_epsilon: bool,
}

impl FirstSets {
    /// Compute the first sets of a grammar.
    pub fn compute(grammar: &Grammar) -> FirstSets {
        compute(grammar)
    }

    /// Get the first set of a nonterminal.
    pub fn get(&self, id: NonterminalId) -> &FirstSet {
        &self.0[id.as_usize()]
    }

    /// Accumulate the first set of a symbol sequence into `into`.
    ///
    /// Returns `true` if the sequence can derive the empty string.
    pub fn sequence(&self, symbols: &[Symbol], into: &mut BitSet) -> bool {
        !collect_symbols(symbols, &mut |symbol| match *symbol {
            Symbol::Terminal(id) => {
                into.insert(id.as_usize());
                true
            }
            Symbol::Nonterminal(id) => {
                let fs = &self.0[id.as_usize()];
                into.union_with(&fs.symbols);
                !fs.has_epsilon
            }
        })
    }
}

impl FirstSet {
    /// The terminals in this set.
    pub fn symbols(&self) -> impl Iterator<Item = TerminalId> + '_ {
        self.symbols.iter().map(TerminalId::from_usize)
    }

    /// Check whether the nonterminal can derive the empty string.
    pub fn has_epsilon(&self) -> bool {
        self.has_epsilon
    }
}

/// The meat of this module. Computes the first set for each rule in a grammar.
fn compute(grammar: &Grammar) -> FirstSets {
    let num_term = grammar.terminal_id_bound();
    let num_nonterm = grammar.nonterminal_id_bound();

    // Determine the sets of nonterminals to be updated.
    let mut update = BitSet::with_capacity(num_nonterm);
    let mut next_update = BitSet::with_capacity(num_nonterm);
    for rule in grammar.rules() {
        update.insert(rule.name().as_usize());
    }

    // Create the initial empty first sets. These will be populated in the main
    // loop.
    let mut fs: Vec<FirstSet> = repeat(FirstSet {
        symbols: BitSet::with_capacity(num_term),
        has_epsilon: false,
    }).take(num_nonterm)
        .collect();

    // Create a list to keep track of dependencies between the rules.
    let mut deps: Vec<BitSet> = repeat(BitSet::with_capacity(num_nonterm))
        .take(num_nonterm)
        .collect();

    // This is the main update loop which processes nonterminals in sets.
    while !update.is_empty() {
        for current in update.iter() {
            let mut new_fs = fs[current].clone();

            // Update the first set and dependencies.
            for &rule_id in grammar.rules_for_nonterminal(NonterminalId::from_usize(current)) {
                let rule = grammar.rule(rule_id);
                let tight = collect_symbols(rule.symbols(), &mut |symbol: &Symbol| match *symbol {
                    Symbol::Terminal(id) => {
                        new_fs.symbols.insert(id.as_usize());
                        true
                    }
                    Symbol::Nonterminal(id) => {
                        deps[id.as_usize()].insert(current);
                        new_fs.symbols.union_with(&fs[id.as_usize()].symbols);
                        !fs[id.as_usize()].has_epsilon
                    }
                });
                new_fs.has_epsilon |= !tight;
            }

            // Sets only grow, so comparing sizes detects a change. If the
            // first set has changed, trigger an update of everything that
            // depends on us.
            let changed = new_fs.symbols.len() != fs[current].symbols.len()
                || new_fs.has_epsilon != fs[current].has_epsilon;
            if changed {
                fs[current] = new_fs;
                next_update.union_with(&deps[current]);
            }
        }

        // If we've cleared the update set, swap in the next update set.
        swap(&mut update, &mut next_update);
        next_update.clear();
    }

    FirstSets(fs)
}

/// Call a closure on each possible first symbol.
///
/// Given a sequence of symbols, determine which ones should belong into the
/// first set. Returns `true` if the sequence is *tight*, that is, it does not
/// contain epsilon. A sequence with a terminal is tight. Nonterminals may or
/// may not be tight, depending on their first set. The callback function `f`
/// must return `true` if the symbol causes the sequence to be tight.
fn collect_symbols<'a, I, F>(symbols: I, f: &mut F) -> bool
where
    I: IntoIterator<Item = &'a Symbol>,
    F: FnMut(&Symbol) -> bool,
{
    for symbol in symbols {
        if f(symbol) {
            return true;
        }
    }
    false
}

/// All follow sets of a grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowSets(Vec<BitSet>);

impl FollowSets {
    /// Compute the follow sets of a grammar.
    ///
    /// The start nonterminal is followed by `$end`.
    pub fn compute(grammar: &Grammar, first: &FirstSets) -> FollowSets {
        let num_term = grammar.terminal_id_bound();
        let mut sets: Vec<BitSet> = repeat(BitSet::with_capacity(num_term))
            .take(grammar.nonterminal_id_bound())
            .collect();
        if let Some(set) = sets.get_mut(grammar.start().as_usize()) {
            set.insert(END.as_usize());
        }

        let mut changed = true;
        while changed {
            changed = false;
            for rule in grammar.rules() {
                let symbols = rule.symbols();
                for (index, symbol) in symbols.iter().enumerate() {
                    let id = match *symbol {
                        Symbol::Nonterminal(id) => id.as_usize(),
                        Symbol::Terminal(_) => continue,
                    };
                    let mut follow = BitSet::with_capacity(num_term);
                    if first.sequence(&symbols[index + 1..], &mut follow) {
                        follow.union_with(&sets[rule.name().as_usize()]);
                    }
                    let before = sets[id].len();
                    sets[id].union_with(&follow);
                    changed |= sets[id].len() != before;
                }
            }
        }
        FollowSets(sets)
    }

    /// Get the terminals that may follow a nonterminal.
    pub fn get(&self, id: NonterminalId) -> impl Iterator<Item = TerminalId> + '_ {
        self.0[id.as_usize()].iter().map(TerminalId::from_usize)
    }

    /// Check whether a terminal may follow a nonterminal.
    pub fn contains(&self, id: NonterminalId, terminal: TerminalId) -> bool {
        self.0[id.as_usize()].contains(terminal.as_usize())
    }
}
