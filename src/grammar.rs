// Copyright (c) 2018 Fabian Schuiki

//! Data structures representing a grammar.

use std::collections::HashMap;
use std::fmt;

use crate::Pretty;

/// A grammar.
///
/// Terminals, nonterminals and rules are identified by dense ids handed out
/// in declaration order. The builtin terminals `$end` and `error` are always
/// present.
#[derive(Debug, Clone)]
pub struct Grammar {
    rules: Vec<Rule>,
    nonterms: HashMap<String, NonterminalId>,
    terms: HashMap<String, TerminalId>,
    nonterm_names: Vec<String>,
    nonterm_rules: Vec<Vec<RuleId>>,
    term_names: Vec<String>,
    start: Option<NonterminalId>,
    precedence: Vec<PrecedenceGroup>,
    recover_errors: bool,
}

/// A single rule within a grammar.
#[derive(Debug, Clone)]
pub struct Rule {
    name: NonterminalId,
    symbols: Vec<Symbol>,
    precedence: Option<TerminalId>,
}

/// A symbol of a production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    /// A terminal.
    Terminal(TerminalId),
    /// A nonterminal.
    Nonterminal(NonterminalId),
}

/// How operators of equal precedence group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Associativity {
    /// `a + b + c` parses as `(a + b) + c`; conflicts reduce.
    Left,
    /// `a = b = c` parses as `a = (b = c)`; conflicts shift.
    Right,
}

/// A set of terminals sharing one precedence level.
///
/// Groups declared later bind tighter than groups declared earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecedenceGroup {
    /// The associativity of the terminals.
    pub associativity: Associativity,
    /// The terminals in this group.
    pub terminals: Vec<TerminalId>,
}

/// A unique nonterminal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonterminalId(usize);

/// A unique terminal identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TerminalId(usize);

/// A unique rule identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(usize);

/// The start rule `$accept -> S`.
pub const ACCEPT: RuleId = RuleId(std::usize::MAX);

/// The special end of input terminal `$end`.
pub const END: TerminalId = TerminalId(0);

/// The special `error` terminal used for error recovery.
pub const ERROR: TerminalId = TerminalId(1);

/// The number of builtin terminals preceding the user-declared ones.
const BUILTIN_TERMINALS: usize = 2;

/// An iterator over the rules of a grammar.
pub type RulesIter<'a> = std::slice::Iter<'a, Rule>;

/// an iterator over the rule IDs of a grammar.
pub type RuleIdsIter<'a> = std::slice::Iter<'a, RuleId>;

impl Grammar {
    /// Create a new empty grammar.
    pub fn new() -> Grammar {
        Grammar {
            rules: Vec::new(),
            nonterms: HashMap::new(),
            terms: HashMap::new(),
            nonterm_names: Vec::new(),
            nonterm_rules: Vec::new(),
            term_names: Vec::new(),
            start: None,
            precedence: Vec::new(),
            recover_errors: false,
        }
    }

    /// Add a nonterminal.
    pub fn add_nonterminal<S: Into<String>>(&mut self, name: S) -> NonterminalId {
        let name = name.into();
        let next_id = NonterminalId(self.nonterm_names.len());
        if let Some(&id) = self.nonterms.get(&name) {
            id
        } else {
            self.nonterms.insert(name.clone(), next_id);
            self.nonterm_names.push(name);
            self.nonterm_rules.push(Vec::new());
            next_id
        }
    }

    /// Add a terminal.
    pub fn add_terminal<S: Into<String>>(&mut self, name: S) -> TerminalId {
        let name = name.into();
        let next_id = TerminalId(self.term_names.len() + BUILTIN_TERMINALS);
        if let Some(&id) = self.terms.get(&name) {
            id
        } else {
            self.terms.insert(name.clone(), next_id);
            self.term_names.push(name);
            next_id
        }
    }

    /// Look up a terminal by name.
    pub fn terminal(&self, name: &str) -> Option<TerminalId> {
        match name {
            "$end" => Some(END),
            "error" => Some(ERROR),
            _ => self.terms.get(name).cloned(),
        }
    }

    /// Look up a nonterminal by name.
    pub fn nonterminal(&self, name: &str) -> Option<NonterminalId> {
        self.nonterms.get(name).cloned()
    }

    /// Get the name of a nonterminal.
    pub fn nonterminal_name(&self, id: NonterminalId) -> &str {
        &self.nonterm_names[id.as_usize()]
    }

    /// Get the name of a terminal.
    pub fn terminal_name(&self, id: TerminalId) -> &str {
        match id {
            END => "$end",
            ERROR => "error",
            _ => &self.term_names[id.as_usize() - BUILTIN_TERMINALS],
        }
    }

    /// The upper bound on nonterminal IDs.
    ///
    /// Basically returns the largest nonterminal ID + 1. Can be used as
    /// capacity for containers that will hold terminals.
    pub fn nonterminal_id_bound(&self) -> usize {
        self.nonterm_names.len()
    }

    /// The upper bound on terminal IDs.
    ///
    /// Basically returns the largest terminal ID + 1. Can be used as capacity
    /// for containers that will hold terminals.
    pub fn terminal_id_bound(&self) -> usize {
        self.term_names.len() + BUILTIN_TERMINALS
    }

    /// Add a rule to the grammar.
    pub fn add_rule(&mut self, rule: Rule) -> RuleId {
        let id = RuleId::from_usize(self.rules.len());
        self.nonterm_rules[rule.name().as_usize()].push(id);
        self.rules.push(rule);
        id
    }

    /// The rules in this grammar.
    pub fn rules(&self) -> RulesIter {
        self.rules.iter()
    }

    /// The number of rules in this grammar, excluding `ACCEPT`.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// The rules for a specific nonterminal in the grammar.
    pub fn rules_for_nonterminal(&self, id: NonterminalId) -> RuleIdsIter {
        self.nonterm_rules[id.as_usize()].iter()
    }

    /// Access a single rule of this grammar.
    ///
    /// Panics if the id is the builtin `ACCEPT` nonterminal, which represents
    /// the virtual root rule.
    pub fn rule(&self, id: RuleId) -> &Rule {
        if id == ACCEPT {
            panic!("rule() called for builtin ACCEPT rule");
        }
        &self.rules[id.as_usize()]
    }

    /// Designate the start nonterminal.
    pub fn set_start(&mut self, start: NonterminalId) {
        self.start = Some(start);
    }

    /// The start nonterminal.
    ///
    /// Defaults to the first nonterminal declared.
    pub fn start(&self) -> NonterminalId {
        self.start.unwrap_or(NonterminalId(0))
    }

    /// Declare a precedence group.
    ///
    /// Each call declares a level binding tighter than all previous ones.
    pub fn add_precedence(&mut self, associativity: Associativity, terminals: Vec<TerminalId>) {
        self.precedence.push(PrecedenceGroup {
            associativity,
            terminals,
        });
    }

    /// The declared precedence groups, loosest first.
    pub fn precedence(&self) -> &[PrecedenceGroup] {
        &self.precedence
    }

    /// Enable or disable panic-mode error recovery for parsers of this grammar.
    pub fn set_recover_errors(&mut self, enable: bool) {
        self.recover_errors = enable;
    }

    /// Whether parsers of this grammar recover from syntax errors.
    pub fn recover_errors(&self) -> bool {
        self.recover_errors
    }

    /// Get a pretty printer for this grammar.
    pub fn pretty(&self) -> Pretty<&Grammar, &Grammar> {
        Pretty::new(self, self)
    }
}

impl Default for Grammar {
    fn default() -> Grammar {
        Grammar::new()
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, &'a Grammar> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, rule) in self.ctx.rules().enumerate() {
            writeln!(f, "{}: {}", index, rule.pretty(self.ctx))?;
        }
        for group in self.ctx.precedence() {
            write!(f, "%{:?}", group.associativity)?;
            for &term in &group.terminals {
                write!(f, " {}", term.pretty(self.ctx))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Rule {
    /// Create a new empty rule.
    pub fn new(name: NonterminalId, symbols: Vec<Symbol>) -> Rule {
        Rule {
            name,
            symbols,
            precedence: None,
        }
    }

    /// Override the terminal whose precedence this rule takes.
    pub fn with_precedence(mut self, terminal: TerminalId) -> Rule {
        self.precedence = Some(terminal);
        self
    }

    /// The name of this rule.
    pub fn name(&self) -> NonterminalId {
        self.name
    }

    /// The symbols in this production.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// The terminal whose precedence this rule takes.
    ///
    /// This is the explicit override if one was given, or the rightmost
    /// terminal in the production otherwise.
    pub fn precedence(&self) -> Option<TerminalId> {
        self.precedence.or_else(|| {
            self.symbols.iter().rev().filter_map(|s| match *s {
                Symbol::Terminal(id) => Some(id),
                Symbol::Nonterminal(_) => None,
            }).next()
        })
    }

    /// Get a pretty printer for this rule.
    pub fn pretty<'a>(&'a self, grammar: &'a Grammar) -> Pretty<&'a Grammar, &'a Self> {
        Pretty::new(grammar, self)
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, &'a Rule> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ->", self.item.name.pretty(self.ctx))?;
        for symbol in &self.item.symbols {
            write!(f, " {}", symbol.pretty(self.ctx))?;
        }
        if self.item.symbols.is_empty() {
            write!(f, " ε")?;
        }
        if let Some(term) = self.item.precedence {
            write!(f, " %prec {}", term.pretty(self.ctx))?;
        }
        Ok(())
    }
}

impl Symbol {
    /// Get a pretty printer for this symbol.
    pub fn pretty<'a>(&'a self, grammar: &'a Grammar) -> Pretty<&'a Grammar, &'a Self> {
        Pretty::new(grammar, self)
    }
}

impl From<TerminalId> for Symbol {
    fn from(id: TerminalId) -> Symbol {
        Symbol::Terminal(id)
    }
}

impl From<NonterminalId> for Symbol {
    fn from(id: NonterminalId) -> Symbol {
        Symbol::Nonterminal(id)
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, &'a Symbol> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.item {
            Symbol::Terminal(id) => write!(f, "{}", id.pretty(self.ctx)),
            Symbol::Nonterminal(id) => write!(f, "{}", id.pretty(self.ctx)),
        }
    }
}

impl NonterminalId {
    /// Create a nonterminal id from a usize.
    pub fn from_usize(id: usize) -> NonterminalId {
        NonterminalId(id)
    }

    /// Obtain the id as a usize.
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// Get a pretty printer for this nonterminal.
    pub fn pretty(self, grammar: &Grammar) -> Pretty<&Grammar, Self> {
        Pretty::new(grammar, self)
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, NonterminalId> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ctx.nonterminal_name(self.item))
    }
}

impl TerminalId {
    /// Create a terminal id from a usize.
    pub const fn from_usize(id: usize) -> TerminalId {
        TerminalId(id)
    }

    /// Obtain the id as a usize.
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// Get a pretty printer for this terminal.
    pub fn pretty(self, grammar: &Grammar) -> Pretty<&Grammar, Self> {
        Pretty::new(grammar, self)
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, TerminalId> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.ctx.terminal_name(self.item))
    }
}

impl RuleId {
    /// Create a rule id from a usize.
    pub fn from_usize(id: usize) -> RuleId {
        RuleId(id)
    }

    /// Obtain the id as a usize.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if *self == ACCEPT {
            write!(f, "$accept")
        } else {
            write!(f, "r{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_terminals_come_first() {
        let mut g = Grammar::new();
        let a = g.add_terminal("a");
        assert_eq!(a.as_usize(), 2);
        assert_eq!(g.add_terminal("a"), a);
        assert_eq!(g.terminal_name(END), "$end");
        assert_eq!(g.terminal_name(ERROR), "error");
        assert_eq!(g.terminal("error"), Some(ERROR));
        assert_eq!(g.terminal_id_bound(), 3);
    }

    #[test]
    fn rule_precedence_defaults_to_rightmost_terminal() {
        let mut g = Grammar::new();
        let e = g.add_nonterminal("E");
        let plus = g.add_terminal("+");
        let times = g.add_terminal("*");
        let minus = g.add_terminal("-");
        let r = Rule::new(e, vec![e.into(), plus.into(), e.into(), times.into(), e.into()]);
        assert_eq!(r.precedence(), Some(times));
        assert_eq!(r.clone().with_precedence(minus).precedence(), Some(minus));
        assert_eq!(Rule::new(e, vec![e.into()]).precedence(), None);
        let id = g.add_rule(r);
        assert_eq!(g.rule(id).pretty(&g).to_string(), "E -> E + E * E");
    }
}
