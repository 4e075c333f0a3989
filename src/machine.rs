// Copyright (c) 2018 Fabian Schuiki

//! Representation of a parsing state machine.
//!
//! Each item set becomes one state. Terminals the item set can advance over
//! become shift actions, completed items become reduce actions on every
//! terminal in the follow set of their nonterminal. Where a state has more
//! than one candidate action for a terminal, the declared precedence and
//! associativity decide; conflicts that remain are reported together.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use thiserror::Error;

use crate::first::{FirstSets, FollowSets};
use crate::grammar::{Associativity, Grammar, NonterminalId, RuleId, Symbol, TerminalId, ACCEPT,
                     END, ERROR};
use crate::item_set::{ItemSet, ItemSetId, ItemSets};
use crate::Pretty;

/// A state machine.
#[derive(Debug, Clone)]
pub struct StateMachine {
    states: Vec<State>,
}

/// A parser state.
///
/// This is basically a set of mappings from symbols to actions.
#[derive(Debug, Clone)]
pub struct State {
    id: StateId,
    item_set: ItemSetId,
    actions: BTreeMap<TerminalId, Action>,
    gotos: BTreeMap<NonterminalId, StateId>,
}

/// An action to be taken upon encountering a terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Shift the terminal and go to the given state.
    Shift(StateId),
    /// Reduce with the given rule.
    Reduce(RuleId),
    /// Accept the input.
    Accept,
}

/// An error in a grammar that prevents building a state machine.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// A precedence declaration names a terminal the grammar does not have.
    #[error("precedence declaration names unknown terminal #{0}")]
    UnknownTerminal(usize),
    /// A terminal appears in more than one precedence group.
    #[error("terminal `{0}` appears in more than one precedence group")]
    DuplicatePrecedence(String),
    /// The start symbol is not a nonterminal of the grammar.
    #[error("start symbol #{0} is not a declared nonterminal")]
    UnknownStart(usize),
    /// Conflicts that precedence and associativity do not resolve.
    #[error("{} unresolved conflicts:\n{}", .0.len(), describe(.0))]
    Conflicts(Vec<Conflict>),
}

fn describe(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|c| c.description.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The kind of a conflict.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// A terminal can be shifted or a rule reduced.
    ShiftReduce,
    /// More than one rule can be reduced.
    ReduceReduce,
}

/// A conflict that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The state in which the conflict occurs.
    pub state: StateId,
    /// The lookahead terminal.
    pub lookahead: TerminalId,
    /// The kind of conflict.
    pub kind: ConflictKind,
    /// Every rule involved, in declaration order.
    pub rules: Vec<RuleId>,
    /// A human-readable description.
    pub description: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// The precedence level and associativity of each terminal.
struct Precedence(Vec<Option<(usize, Associativity)>>);

impl Precedence {
    fn compute(grammar: &Grammar) -> Result<Precedence, GrammarError> {
        let bound = grammar.terminal_id_bound();
        let mut levels = vec![None; bound];
        for (index, group) in grammar.precedence().iter().enumerate() {
            for &term in &group.terminals {
                let slot = levels
                    .get_mut(term.as_usize())
                    .ok_or(GrammarError::UnknownTerminal(term.as_usize()))?;
                if slot.is_some() {
                    return Err(GrammarError::DuplicatePrecedence(
                        grammar.terminal_name(term).to_string(),
                    ));
                }
                *slot = Some((index + 1, group.associativity));
            }
        }
        for rule in grammar.rules() {
            if let Some(term) = rule.precedence() {
                if term.as_usize() >= bound {
                    return Err(GrammarError::UnknownTerminal(term.as_usize()));
                }
            }
        }
        Ok(Precedence(levels))
    }

    fn terminal(&self, term: TerminalId) -> Option<(usize, Associativity)> {
        self.0.get(term.as_usize()).cloned().and_then(|x| x)
    }

    fn rule(&self, grammar: &Grammar, rule: RuleId) -> Option<usize> {
        if rule == ACCEPT {
            return None;
        }
        grammar
            .rule(rule)
            .precedence()
            .and_then(|term| self.terminal(term))
            .map(|(level, _)| level)
    }
}

impl StateMachine {
    /// Compute the state machine of a grammar.
    pub fn compute(grammar: &Grammar) -> Result<StateMachine, GrammarError> {
        if grammar.start().as_usize() >= grammar.nonterminal_id_bound() {
            return Err(GrammarError::UnknownStart(grammar.start().as_usize()));
        }
        let item_sets = ItemSets::compute(grammar);
        StateMachine::try_from(grammar, &item_sets)
    }

    /// Create a state machine from a list of item sets.
    pub fn try_from(grammar: &Grammar, item_sets: &ItemSets) -> Result<StateMachine, GrammarError> {
        let precedence = Precedence::compute(grammar)?;
        let first = FirstSets::compute(grammar);
        let follow = FollowSets::compute(grammar, &first);
        let mut states = Vec::with_capacity(item_sets.len());
        let mut conflicts = Vec::new();

        for is in item_sets.all() {
            let id = StateId(is.id().as_usize());
            let mut shifts = BTreeMap::<TerminalId, StateId>::new();
            let mut gotos = BTreeMap::new();
            for (symbol, target) in is.transitions() {
                let target = StateId(target.as_usize());
                match symbol {
                    Symbol::Terminal(term) => {
                        shifts.insert(term, target);
                    }
                    Symbol::Nonterminal(nonterm) => {
                        gotos.insert(nonterm, target);
                    }
                }
            }

            // The error terminal is never a lookahead, so it does not need
            // any reduce actions.
            let mut reduces = BTreeMap::<TerminalId, Vec<RuleId>>::new();
            for item in is.items().iter().filter(|item| item.is_complete(grammar)) {
                if item.rule() == ACCEPT {
                    reduces.entry(END).or_insert_with(Vec::new).push(ACCEPT);
                    continue;
                }
                let name = grammar.rule(item.rule()).name();
                for term in follow.get(name).filter(|&t| t != ERROR) {
                    reduces.entry(term).or_insert_with(Vec::new).push(item.rule());
                }
            }

            let mut actions = BTreeMap::new();
            for (&term, &target) in &shifts {
                if !reduces.contains_key(&term) {
                    actions.insert(term, Action::Shift(target));
                }
            }
            let resolver = Resolver {
                grammar,
                precedence: &precedence,
                item_set: is,
                state: id,
            };
            for (term, rules) in reduces {
                match resolver.resolve(term, shifts.get(&term).cloned(), rules) {
                    Ok(action) => {
                        actions.insert(term, action);
                    }
                    Err(conflict) => conflicts.push(conflict),
                }
            }

            states.push(State {
                id,
                item_set: is.id(),
                actions,
                gotos,
            });
        }

        if conflicts.is_empty() {
            debug!("constructed state machine with {} states", states.len());
            Ok(StateMachine { states })
        } else {
            Err(GrammarError::Conflicts(conflicts))
        }
    }

    /// All states in the state machine.
    pub fn states(&self) -> States {
        States(self.states.iter())
    }

    /// The number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check whether the state machine has no states. Never true for a
    /// computed state machine.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Get a pretty printer for this state machine.
    pub fn pretty<'a>(&'a self, grammar: &'a Grammar) -> Pretty<&'a Grammar, &'a Self> {
        Pretty::new(grammar, self)
    }
}

/// Decides between the candidate actions of one state.
struct Resolver<'a> {
    grammar: &'a Grammar,
    precedence: &'a Precedence,
    item_set: &'a ItemSet,
    state: StateId,
}

impl<'a> Resolver<'a> {
    fn resolve(
        &self,
        term: TerminalId,
        shift: Option<StateId>,
        mut rules: Vec<RuleId>,
    ) -> Result<Action, Conflict> {
        rules.sort();
        rules.dedup();

        // Among several reductions the highest precedence wins, with ties
        // going to the rule declared first.
        let reduce = if rules.len() == 1 {
            rules[0]
        } else {
            let levels: Option<Vec<usize>> = rules
                .iter()
                .map(|&rule| self.precedence.rule(self.grammar, rule))
                .collect();
            let levels = match levels {
                Some(levels) => levels,
                None => return Err(self.conflict(ConflictKind::ReduceReduce, term, &rules)),
            };
            let best = levels.iter().cloned().max().unwrap_or(0);
            let (index, _) = levels
                .iter()
                .enumerate()
                .find(|&(_, &level)| level == best)
                .unwrap_or((0, &0));
            debug!(
                "state {}: reduce-reduce on {} resolved as {}",
                self.state,
                term.pretty(self.grammar),
                rules[index]
            );
            rules[index]
        };

        let target = match shift {
            None => return Ok(reduce_action(reduce)),
            Some(target) => target,
        };
        let rule_level = self.precedence.rule(self.grammar, reduce);
        let term_level = self.precedence.terminal(term);
        let action = match (rule_level, term_level) {
            (Some(rule_level), Some((term_level, assoc))) => {
                if term_level > rule_level {
                    Action::Shift(target)
                } else if rule_level > term_level {
                    reduce_action(reduce)
                } else {
                    match assoc {
                        Associativity::Left => reduce_action(reduce),
                        Associativity::Right => Action::Shift(target),
                    }
                }
            }
            _ => {
                let mut involved = self.shifting_rules(term);
                involved.push(reduce);
                return Err(self.conflict(ConflictKind::ShiftReduce, term, &involved));
            }
        };
        trace!(
            "state {}: shift-reduce on {} resolved as {:?}",
            self.state,
            term.pretty(self.grammar),
            action
        );
        Ok(action)
    }

    /// The rules of all items that can shift a terminal.
    fn shifting_rules(&self, term: TerminalId) -> Vec<RuleId> {
        self.item_set
            .items()
            .iter()
            .filter(|item| item.next_symbol(self.grammar) == Some(Symbol::Terminal(term)))
            .map(|item| item.rule())
            .collect()
    }

    fn conflict(&self, kind: ConflictKind, term: TerminalId, rules: &[RuleId]) -> Conflict {
        let mut rules = rules.to_vec();
        rules.sort();
        rules.dedup();
        let kind_name = match kind {
            ConflictKind::ShiftReduce => "shift-reduce",
            ConflictKind::ReduceReduce => "reduce-reduce",
        };
        let mut description = format!(
            "state {}: {} conflict on `{}` between",
            self.state,
            kind_name,
            term.pretty(self.grammar)
        );
        for (index, &rule) in rules.iter().enumerate() {
            if index > 0 {
                description.push_str(" and");
            }
            if rule == ACCEPT {
                description.push_str(" $accept");
            } else {
                description.push_str(&format!(
                    " {} `{}`",
                    rule,
                    self.grammar.rule(rule).pretty(self.grammar)
                ));
            }
        }
        Conflict {
            state: self.state,
            lookahead: term,
            kind,
            rules,
            description,
        }
    }
}

fn reduce_action(rule: RuleId) -> Action {
    if rule == ACCEPT {
        Action::Accept
    } else {
        Action::Reduce(rule)
    }
}

impl Index<StateId> for StateMachine {
    type Output = State;

    fn index(&self, index: StateId) -> &State {
        &self.states[index.as_usize()]
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, &'a StateMachine> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for state in self.item.states() {
            writeln!(f, "state {} ({}):", state.id, state.item_set)?;
            for (term, action) in state.actions() {
                write!(f, "    {} => ", term.pretty(self.ctx))?;
                match action {
                    Action::Shift(target) => writeln!(f, "shift {}", target)?,
                    Action::Reduce(rule) => {
                        writeln!(f, "reduce {}", self.ctx.rule(rule).pretty(self.ctx))?
                    }
                    Action::Accept => writeln!(f, "accept")?,
                }
            }
            for (nonterm, target) in state.gotos() {
                writeln!(f, "    {} => goto {}", nonterm.pretty(self.ctx), target)?;
            }
        }
        Ok(())
    }
}

impl State {
    /// Get the unique identifier of this state.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Get the item set this state was built from.
    pub fn item_set(&self) -> ItemSetId {
        self.item_set
    }

    /// The action to take on a lookahead terminal.
    pub fn action(&self, term: TerminalId) -> Option<Action> {
        self.actions.get(&term).cloned()
    }

    /// The state to go to after reducing to a nonterminal.
    pub fn goto(&self, nonterm: NonterminalId) -> Option<StateId> {
        self.gotos.get(&nonterm).cloned()
    }

    /// The terminals this state has an action for.
    pub fn expected(&self) -> impl Iterator<Item = TerminalId> + '_ {
        self.actions.keys().cloned()
    }

    /// An iterator over the terminals and associated actions.
    pub fn actions(&self) -> Actions {
        Actions(self.actions.iter())
    }

    /// An iterator over the nonterminals and associated target states.
    pub fn gotos(&self) -> impl Iterator<Item = (NonterminalId, StateId)> + '_ {
        self.gotos.iter().map(|(&n, &s)| (n, s))
    }
}

/// An iterator over the states of a state machine.
pub struct States<'a>(std::slice::Iter<'a, State>);

impl<'a> Iterator for States<'a> {
    type Item = &'a State;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

/// An iterator over the actions of a state.
pub struct Actions<'a>(std::collections::btree_map::Iter<'a, TerminalId, Action>);

impl<'a> Iterator for Actions<'a> {
    type Item = (TerminalId, Action);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(&s, &a)| (s, a))
    }
}

/// A unique state identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(usize);

impl StateId {
    /// Create a state id from a usize.
    pub fn from_usize(id: usize) -> StateId {
        StateId(id)
    }

    /// Obtain the id as a usize.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
