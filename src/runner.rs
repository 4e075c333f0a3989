// Copyright (c) 2018 Fabian Schuiki

//! Running a DFA over a source.
//!
//! The runner always finds the longest prefix of the remaining input that
//! some rule accepts. It reads as far as the automaton has transitions,
//! remembering the last point where a state accepted, and then rewinds the
//! source to that point.

use rexlr_runtime::{SeekError, Seekable, Span, TextSource};

use crate::dfa::Dfa;

/// A successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a, T> {
    /// The index of the accepted rule.
    pub rule: usize,
    /// The payload of the accepted rule.
    pub payload: &'a T,
    /// The matched text.
    pub text: String,
}

/// Match the longest prefix of the remaining input.
///
/// Returns `None` and leaves the source untouched if no rule matches. If the
/// start state accepts, the match may be empty.
pub fn next_match<'a, S, T>(dfa: &'a Dfa<T>, source: &mut S) -> Result<Option<Match<'a, T>>, SeekError>
where
    S: Seekable<Item = char>,
{
    let start = source.offset();
    let mut state = dfa.start();
    let mut text = String::new();
    // The offset, text length and rule of the last accepting state.
    let mut last = dfa.accept(state).map(|(rule, _)| (start, 0, rule));

    while source.move_next()? {
        let c = match source.current() {
            Some(c) => c,
            None => break,
        };
        match dfa.next(state, c) {
            Some(next) => {
                state = next;
                text.push(c);
                if let Some((rule, _)) = dfa.accept(state) {
                    last = Some((source.offset(), text.len(), rule));
                }
            }
            None => {
                source.reverse(1)?;
                break;
            }
        }
    }

    match last {
        Some((offset, len, rule)) => {
            source.reverse(source.offset() - offset)?;
            text.truncate(len);
            trace!("matched rule {} on {:?}", rule, text);
            Ok(Some(Match {
                rule,
                payload: dfa.payload(rule),
                text,
            }))
        }
        None => {
            source.reverse(source.offset() - start)?;
            Ok(None)
        }
    }
}

/// Match the longest prefix of the remaining input and report its location.
pub fn next_match_with_span<'a, S, T>(
    dfa: &'a Dfa<T>,
    source: &mut S,
) -> Result<Option<(Match<'a, T>, Span)>, SeekError>
where
    S: TextSource,
{
    let start = source.position();
    Ok(next_match(dfa, source)?.map(|m| (m, Span::new(start, source.position()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfa::{RegexCompiler, RegexRule};
    use crate::regex::PatternParser;
    use proptest::prelude::*;
    use rexlr_runtime::{Position, SliceSource, StrSource};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Ident,
        Number,
        Space,
        Arrow,
        Dash,
    }

    fn lexer_dfa() -> Dfa<Kind> {
        let parser = PatternParser::new().unwrap();
        RegexCompiler::new(&parser)
            .compile(vec![
                RegexRule::new("[a-z]+", Kind::Ident),
                RegexRule::new("[0-9]+", Kind::Number),
                RegexRule::new("[ \n]+", Kind::Space),
                RegexRule::new("->", Kind::Arrow),
                RegexRule::new("-", Kind::Dash),
            ])
            .unwrap()
    }

    fn all(dfa: &Dfa<Kind>, input: &str) -> Vec<(Kind, String)> {
        let mut source = StrSource::new(input);
        let mut out = vec![];
        while let Some(m) = next_match(dfa, &mut source).unwrap() {
            out.push((*m.payload, m.text));
        }
        out
    }

    #[test]
    fn longest_match_wins() {
        let dfa = lexer_dfa();
        assert_eq!(
            all(&dfa, "ab->-12"),
            vec![
                (Kind::Ident, "ab".to_string()),
                (Kind::Arrow, "->".to_string()),
                (Kind::Dash, "-".to_string()),
                (Kind::Number, "12".to_string()),
            ]
        );
    }

    #[test]
    fn rewinds_to_last_accepting_state() {
        let parser = PatternParser::new().unwrap();
        let dfa = RegexCompiler::new(&parser)
            .compile(vec![RegexRule::new("a", 0), RegexRule::new("abc", 1)])
            .unwrap();
        let mut source = StrSource::new("abd");
        let m = next_match(&dfa, &mut source).unwrap().unwrap();
        assert_eq!((m.rule, m.text.as_str()), (0, "a"));
        assert_eq!(source.offset(), 1);
        assert_eq!(next_match(&dfa, &mut source).unwrap(), None);
        assert_eq!(source.offset(), 1);
    }

    #[test]
    fn accepting_start_state_yields_empty_match() {
        let parser = PatternParser::new().unwrap();
        let dfa = RegexCompiler::new(&parser)
            .compile(vec![RegexRule::new("x*", ())])
            .unwrap();
        let mut source = StrSource::new("y");
        let m = next_match(&dfa, &mut source).unwrap().unwrap();
        assert_eq!(m.text, "");
        assert_eq!(source.offset(), 0);
    }

    #[test]
    fn works_on_slices() {
        let dfa = lexer_dfa();
        let input: Vec<char> = "abc 1".chars().collect();
        let mut source = SliceSource::new(&input);
        let m = next_match(&dfa, &mut source).unwrap().unwrap();
        assert_eq!((*m.payload, m.text.as_str()), (Kind::Ident, "abc"));
        assert_eq!(source.offset(), 3);
    }

    #[test]
    fn spans_follow_line_breaks() {
        let dfa = lexer_dfa();
        let mut source = StrSource::new("ab\n cd");
        let mut spans = vec![];
        while let Some((m, span)) = next_match_with_span(&dfa, &mut source).unwrap() {
            spans.push((*m.payload, span));
        }
        assert_eq!(
            spans,
            vec![
                (Kind::Ident, Span::new(Position::new(0, 0), Position::new(0, 2))),
                (Kind::Space, Span::new(Position::new(0, 2), Position::new(1, 1))),
                (Kind::Ident, Span::new(Position::new(1, 1), Position::new(1, 3))),
            ]
        );
    }

    proptest! {
        #[test]
        fn matches_are_maximal(input in "[a-z0-9 -]{0,24}") {
            let dfa = lexer_dfa();
            let mut source = StrSource::new(&input);
            let mut consumed = 0;
            while let Some(m) = next_match(&dfa, &mut source).unwrap() {
                let len = m.text.chars().count();
                prop_assert!(len > 0);
                prop_assert_eq!(source.offset(), consumed + len);
                // No longer prefix of the rest is accepted by any rule.
                let rest: Vec<char> = input.chars().skip(consumed).collect();
                for end in len + 1..=rest.len() {
                    let mut state = Some(dfa.start());
                    for &c in &rest[..end] {
                        state = state.and_then(|s| dfa.next(s, c));
                    }
                    prop_assert!(state.and_then(|s| dfa.accept(s)).is_none());
                }
                consumed += len;
            }
            prop_assert_eq!(consumed, input.chars().count());
        }
    }
}
