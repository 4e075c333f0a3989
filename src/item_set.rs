// Copyright (c) 2018 Fabian Schuiki

//! Item sets derived from a grammar.
//!
//! The canonical collection of LR(0) item sets is built by repeatedly taking
//! the closure of a kernel and advancing the marker over each symbol that may
//! follow it. Item sets with equal kernels are merged.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Index;

use indexmap::{IndexMap, IndexSet};

use crate::grammar::{self, Grammar, RuleId, Symbol};
use crate::Pretty;

/// The canonical collection of item sets of a grammar.
#[derive(Debug, Clone)]
pub struct ItemSets(Vec<ItemSet>);

/// An item set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSet {
    id: ItemSetId,
    /// The items in the set. The first `kernel` items form the kernel.
    items: Vec<Item>,
    kernel: usize,
    /// The item set reached by advancing over each symbol.
    transitions: IndexMap<Symbol, ItemSetId>,
}

/// A single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item {
    /// The rule of the item.
    rule: RuleId,
    /// The position of the marker within the rule.
    marker: usize,
}

/// A unique item set identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemSetId(usize);

impl ItemSets {
    /// Compute the canonical item sets of a grammar.
    ///
    /// Item set 0 is the closure of `$accept -> . S`.
    pub fn compute(grammar: &Grammar) -> ItemSets {
        let root = vec![Item {
            rule: grammar::ACCEPT,
            marker: 0,
        }];
        let mut kernels = IndexMap::<Vec<Item>, ItemSetId>::new();
        let mut sets = Vec::<ItemSet>::new();
        let mut todo = VecDeque::<ItemSetId>::new();
        kernels.insert(root.clone(), ItemSetId(0));
        sets.push(ItemSet::new(ItemSetId(0), root));
        todo.push_back(ItemSetId(0));

        while let Some(id) = todo.pop_front() {
            let items = closure(grammar, &sets[id.0].items);

            // Group the advanced items by the symbol the marker moves over,
            // in order of first appearance.
            let mut advanced = IndexMap::<Symbol, Vec<Item>>::new();
            for item in &items {
                if let Some(symbol) = item.next_symbol(grammar) {
                    advanced.entry(symbol).or_insert_with(Vec::new).push(Item {
                        rule: item.rule,
                        marker: item.marker + 1,
                    });
                }
            }

            let mut transitions = IndexMap::new();
            for (symbol, mut kernel) in advanced {
                kernel.sort();
                kernel.dedup();
                let target = match kernels.get(&kernel) {
                    Some(&target) => target,
                    None => {
                        let target = ItemSetId(sets.len());
                        kernels.insert(kernel.clone(), target);
                        sets.push(ItemSet::new(target, kernel));
                        todo.push_back(target);
                        target
                    }
                };
                transitions.insert(symbol, target);
            }

            let set = &mut sets[id.0];
            set.items = items;
            set.transitions = transitions;
        }

        debug!("constructed {} item sets", sets.len());
        ItemSets(sets)
    }

    /// All item sets.
    pub fn all(&self) -> &[ItemSet] {
        &self.0
    }

    /// The number of item sets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether there are no item sets. Never true for computed sets.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a pretty printer for these item sets.
    pub fn pretty<'a>(&'a self, grammar: &'a Grammar) -> Pretty<&'a Grammar, &'a Self> {
        Pretty::new(grammar, self)
    }
}

impl Index<ItemSetId> for ItemSets {
    type Output = ItemSet;

    fn index(&self, index: ItemSetId) -> &ItemSet {
        &self.0[index.0]
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, &'a ItemSets> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for is in self.item.all() {
            writeln!(f, "I{}:", is.id.0)?;
            writeln!(f, "{}", is.pretty(self.ctx))?;
        }
        Ok(())
    }
}

/// Compute the closure of a kernel.
///
/// The kernel items come first, followed by the items added for every
/// nonterminal a marker stands in front of.
fn closure(grammar: &Grammar, kernel: &[Item]) -> Vec<Item> {
    let mut items: IndexSet<Item> = kernel.iter().cloned().collect();
    let mut index = 0;
    while index < items.len() {
        let next = items.get_index(index).and_then(|item| item.next_symbol(grammar));
        if let Some(Symbol::Nonterminal(id)) = next {
            for &rule in grammar.rules_for_nonterminal(id) {
                items.insert(Item { rule, marker: 0 });
            }
        }
        index += 1;
    }
    items.into_iter().collect()
}

impl ItemSet {
    fn new(id: ItemSetId, kernel: Vec<Item>) -> ItemSet {
        ItemSet {
            id,
            kernel: kernel.len(),
            items: kernel,
            transitions: IndexMap::new(),
        }
    }

    /// Get the unique identifier of this item set.
    pub fn id(&self) -> ItemSetId {
        self.id
    }

    /// Get the items in the set.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Get the kernel items of the set.
    pub fn kernel(&self) -> &[Item] {
        &self.items[..self.kernel]
    }

    /// The item sets reached by advancing over a symbol.
    pub fn transitions(&self) -> impl Iterator<Item = (Symbol, ItemSetId)> + '_ {
        self.transitions.iter().map(|(&s, &id)| (s, id))
    }

    /// The item set reached by advancing over a symbol, if any.
    pub fn transition(&self, symbol: Symbol) -> Option<ItemSetId> {
        self.transitions.get(&symbol).cloned()
    }

    /// Get a pretty printer for this item set.
    pub fn pretty<'a>(&'a self, grammar: &'a Grammar) -> Pretty<&'a Grammar, &'a Self> {
        Pretty::new(grammar, self)
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, &'a ItemSet> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, item) in self.item.items.iter().enumerate() {
            if index > 0 {
                write!(f, "\n")?;
            }
            write!(f, "{} {}", index, item.pretty(self.ctx))?;
        }
        if self.item.items.is_empty() {
            write!(f, "<empty>")?;
        }
        Ok(())
    }
}

impl Item {
    /// Get the rule this item represents.
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    /// Get the position of the marker within the rule.
    pub fn marker(&self) -> usize {
        self.marker
    }

    /// The symbol right after the marker, or `None` if the item is complete.
    pub fn next_symbol(&self, grammar: &Grammar) -> Option<Symbol> {
        if self.rule == grammar::ACCEPT {
            if self.marker == 0 {
                Some(Symbol::Nonterminal(grammar.start()))
            } else {
                None
            }
        } else {
            grammar.rule(self.rule).symbols().get(self.marker).cloned()
        }
    }

    /// Check whether the marker is at the end of the rule.
    pub fn is_complete(&self, grammar: &Grammar) -> bool {
        self.next_symbol(grammar).is_none()
    }

    /// Get a pretty printer for this item.
    pub fn pretty<'a>(&'a self, grammar: &'a Grammar) -> Pretty<&'a Grammar, &'a Self> {
        Pretty::new(grammar, self)
    }
}

impl<'a> fmt::Display for Pretty<&'a Grammar, &'a Item> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.item.rule == grammar::ACCEPT {
            write!(f, "[$accept ->")?;
            if self.item.marker == 0 {
                write!(f, " .")?;
            }
            write!(f, " {}", self.ctx.start().pretty(self.ctx))?;
            if self.item.marker == 1 {
                write!(f, " .")?;
            }
        } else {
            let rule = self.ctx.rule(self.item.rule);
            write!(f, "[{} ->", rule.name().pretty(self.ctx))?;
            let symbols = rule.symbols();
            for symbol in &symbols[0..self.item.marker] {
                write!(f, " {}", symbol.pretty(self.ctx))?;
            }
            write!(f, " .")?;
            for symbol in &symbols[self.item.marker..] {
                write!(f, " {}", symbol.pretty(self.ctx))?;
            }
        }
        write!(f, "]")?;
        Ok(())
    }
}

impl ItemSetId {
    /// Create an item set id from a usize.
    pub fn from_usize(id: usize) -> ItemSetId {
        ItemSetId(id)
    }

    /// Obtain the id as a usize.
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ItemSetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Rule;

    #[test]
    fn canonical_collection() {
        // S -> ( S ) | x
        let mut g = Grammar::new();
        let s = g.add_nonterminal("S");
        let open = g.add_terminal("(");
        let close = g.add_terminal(")");
        let x = g.add_terminal("x");
        g.add_rule(Rule::new(s, vec![open.into(), s.into(), close.into()]));
        g.add_rule(Rule::new(s, vec![x.into()]));

        let sets = ItemSets::compute(&g);
        // I0, S., (., x., ( S ., ( S ).
        assert_eq!(sets.len(), 6);
        let root = &sets[ItemSetId::from_usize(0)];
        assert_eq!(root.kernel().len(), 1);
        assert_eq!(root.items().len(), 3);
        let nested = root.transition(open.into()).unwrap();
        assert_eq!(sets[nested].transition(open.into()), Some(nested));
        assert_eq!(
            sets[nested].pretty(&g).to_string(),
            "0 [S -> ( . S )]\n1 [S -> . ( S )]\n2 [S -> . x]"
        );
    }

    #[test]
    fn construction_is_deterministic() {
        let mut g = Grammar::new();
        let s = g.add_nonterminal("S");
        let a = g.add_terminal("a");
        g.add_rule(Rule::new(s, vec![s.into(), a.into()]));
        g.add_rule(Rule::new(s, vec![]));
        let first = ItemSets::compute(&g);
        let second = ItemSets::compute(&g);
        assert_eq!(first.all(), second.all());
    }
}
