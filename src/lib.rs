// Copyright (c) 2018 Fabian Schuiki

//! A lexer and parser generator.
//!
//! Lexers are described as regular expressions per lexer state, compiled
//! into DFAs by Thompson's construction and subset construction. Parsers are
//! described as grammars with precedence declarations, from which an SLR
//! table is generated. Both are driven at run time over the sources of the
//! `rexlr-runtime` crate.

#![deny(missing_docs)]

extern crate bit_set;
extern crate indexmap;
#[macro_use]
extern crate log;
/// Sources, buffers and locations used at run time.
pub extern crate rexlr_runtime as runtime;

pub mod dfa;
pub mod first;
pub mod grammar;
pub mod item_set;
pub mod lexer;
pub mod machine;
pub mod nfa;
pub mod parser;
pub mod regex;
pub mod runner;

pub use crate::dfa::{ConflictPolicy, Dfa, RegexCompiler, RegexError, RegexRule};
pub use crate::lexer::{Lexer, LexerBuilder, LexerDef, Scanner};
pub use crate::machine::{GrammarError, StateMachine};
pub use crate::parser::{ParseError, Parser, ParserBuilder, SemanticValue, Token};
pub use crate::regex::PatternParser;

/// A pretty printer.
pub struct Pretty<C, T> {
    ctx: C,
    item: T,
}

impl<C, T> Pretty<C, T> {
    pub(crate) fn new(ctx: C, item: T) -> Pretty<C, T> {
        Pretty { ctx, item }
    }
}
