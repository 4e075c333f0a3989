// Copyright (c) 2018 Fabian Schuiki
#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;
extern crate memmap;
extern crate rexlr;
extern crate stderrlog;

use std::fs::File;
use std::io::{self, Cursor};

use clap::{App, Arg, ArgMatches};
use memmap::Mmap;
use rexlr::grammar::Grammar;
use rexlr::lexer::token;
use rexlr::runtime::{SeekError, Seekable, StreamSource};
use rexlr::{ConflictPolicy, LexerBuilder, PatternParser, RegexError};
use thiserror::Error;

#[derive(Debug, Error)]
enum ToolError {
    #[error("invalid rule `{0}`, expected NAME=PATTERN or NAME@PRIORITY=PATTERN")]
    BadRule(String),
    #[error("invalid alphabet size `{0}`")]
    BadAlphabet(String),
    #[error("cannot read {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("rule `{name}`: {source}")]
    Regex { name: String, source: RegexError },
    #[error("{0}")]
    Pattern(String),
    #[error(transparent)]
    Seek(#[from] SeekError),
    #[error("no rule matches at {0}")]
    NoMatch(String),
}

/// A rule given on the command line.
struct RuleArg {
    name: String,
    priority: i32,
    pattern: String,
}

fn parse_rule(arg: &str) -> Result<RuleArg, ToolError> {
    let bad = || ToolError::BadRule(arg.to_string());
    let eq = arg.find('=').ok_or_else(bad)?;
    let (head, pattern) = (&arg[..eq], &arg[eq + 1..]);
    let (name, priority) = match head.find('@') {
        Some(at) => (
            &head[..at],
            head[at + 1..].parse().map_err(|_| bad())?,
        ),
        None => (head, 0),
    };
    if name.is_empty() {
        return Err(bad());
    }
    Ok(RuleArg {
        name: name.to_string(),
        priority,
        pattern: pattern.to_string(),
    })
}

fn main() {
    let matches = App::new(crate_name!())
        .version(crate_version!())
        .author(crate_authors!())
        .about("Tokenizes a file with rules given on the command line")
        .arg(
            Arg::with_name("verbosity")
                .short("v")
                .multiple(true)
                .help("Increase message verbosity"),
        )
        .arg(
            Arg::with_name("rule")
                .short("r")
                .long("rule")
                .value_name("NAME[@PRIORITY]=PATTERN")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .required(true)
                .help("Add a lexer rule"),
        )
        .arg(
            Arg::with_name("strict")
                .long("strict")
                .help("Reject rules that accept the same input with equal priority"),
        )
        .arg(
            Arg::with_name("alphabet")
                .long("alphabet")
                .value_name("N")
                .takes_value(true)
                .help("Code points below N are matched by negated classes"),
        )
        .arg(
            Arg::with_name("dfa")
                .long("dfa")
                .help("Print the compiled automaton"),
        )
        .arg(
            Arg::with_name("INPUT")
                .required(true)
                .help("The file to tokenize"),
        )
        .get_matches();

    stderrlog::new()
        .module(module_path!())
        .module("rexlr")
        .verbosity(matches.occurrences_of("verbosity") as usize + 1)
        .init()
        .unwrap();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), ToolError> {
    let rule_args = matches
        .values_of("rule")
        .into_iter()
        .flatten()
        .map(parse_rule)
        .collect::<Result<Vec<_>, _>>()?;

    // The rules double as terminals, which provides their names.
    let mut grammar = Grammar::new();
    let parser = PatternParser::new().map_err(|e| ToolError::Pattern(e.to_string()))?;
    let mut builder = LexerBuilder::new(&parser, ());
    for rule in &rule_args {
        let terminal = grammar.add_terminal(rule.name.as_str());
        builder.rule_with_priority(
            (),
            rule.pattern.as_str(),
            rule.priority,
            token(terminal, |text| text.to_string()),
        );
    }
    if matches.is_present("strict") {
        builder.policy(ConflictPolicy::Throw);
    }
    if let Some(n) = matches.value_of("alphabet") {
        builder.alphabet(n.parse().map_err(|_| ToolError::BadAlphabet(n.to_string()))?);
    }
    let lexer = builder.build().map_err(|source| {
        let index = match source {
            RegexError::Syntax { rule, .. } => rule,
            RegexError::Conflict { ref rules } => rules.first().cloned().unwrap_or(0),
        };
        ToolError::Regex {
            name: rule_args[index].name.clone(),
            source,
        }
    })?;
    if matches.is_present("dfa") {
        if let Some(dfa) = lexer.dfa(&()) {
            print!("{}", dfa);
        }
    }

    let path = matches.value_of("INPUT").unwrap_or_default();
    let io_err = |source| ToolError::Io {
        path: path.to_string(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let len = file.metadata().map_err(io_err)?.len();
    // Empty files cannot be mapped.
    let map = if len > 0 {
        Some(unsafe { Mmap::map(&file) }.map_err(io_err)?)
    } else {
        None
    };
    let bytes: &[u8] = map.as_ref().map(|m| &m[..]).unwrap_or(&[]);

    let mut tokens = lexer.lex(StreamSource::new(Cursor::new(bytes)));
    while let Some(token) = tokens.next() {
        let token = token?;
        println!(
            "{}: {} {:?}",
            token.span,
            grammar.terminal_name(token.terminal),
            token.value
        );
    }
    let position = tokens.position();
    let mut source = tokens.into_source();
    if source.move_next()? {
        return Err(ToolError::NoMatch(position.to_string()));
    }
    Ok(())
}
