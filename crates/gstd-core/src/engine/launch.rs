// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! gst-launch style description parser.
//!
//! Grammar: `element ( '!' element )*` where
//! `element = factory ( key '=' value )*` and values may be double-quoted.

use super::EngineError;

/// One parsed element declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementDecl {
    pub(crate) factory: String,
    pub(crate) assignments: Vec<(String, String)>,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Link,
    Word(String),
}

fn tokenize(description: &str) -> Result<Vec<Token>, EngineError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    let flush = |word: &mut String, quoted: &mut bool, tokens: &mut Vec<Token>| {
        if !word.is_empty() || *quoted {
            tokens.push(Token::Word(std::mem::take(word)));
        }
        *quoted = false;
    };

    for ch in description.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if in_quotes => word.push(c),
            '!' => {
                flush(&mut word, &mut quoted, &mut tokens);
                tokens.push(Token::Link);
            }
            c if c.is_whitespace() => flush(&mut word, &mut quoted, &mut tokens),
            c => word.push(c),
        }
    }
    if in_quotes {
        return Err(EngineError::Syntax("unterminated quote".into()));
    }
    flush(&mut word, &mut quoted, &mut tokens);
    Ok(tokens)
}

/// Parse a description into element declarations, in link order.
pub(crate) fn parse(description: &str) -> Result<Vec<ElementDecl>, EngineError> {
    let tokens = tokenize(description)?;
    let mut decls = Vec::new();
    let mut current: Option<ElementDecl> = None;

    for token in tokens {
        match token {
            Token::Link => {
                let decl = current
                    .take()
                    .ok_or_else(|| EngineError::Syntax("link without element".into()))?;
                decls.push(decl);
            }
            Token::Word(word) => match current.as_mut() {
                None => {
                    if word.contains('=') {
                        return Err(EngineError::Syntax(format!(
                            "expected element, found assignment {word:?}"
                        )));
                    }
                    current = Some(ElementDecl {
                        factory: word,
                        assignments: Vec::new(),
                    });
                }
                Some(decl) => {
                    let (key, value) = word.split_once('=').ok_or_else(|| {
                        EngineError::Syntax(format!("expected key=value, found {word:?}"))
                    })?;
                    if key.is_empty() {
                        return Err(EngineError::Syntax(format!(
                            "empty property name in {word:?}"
                        )));
                    }
                    decl.assignments.push((key.to_string(), value.to_string()));
                }
            },
        }
    }

    match current {
        Some(decl) => decls.push(decl),
        None if decls.is_empty() => return Err(EngineError::Syntax("empty description".into())),
        None => return Err(EngineError::Syntax("trailing link".into())),
    }
    Ok(decls)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_chain_with_assignments() {
        let decls = parse("videotestsrc is-live=true ! identity name=id sleep-time=10 ! fakesink")
            .unwrap();
        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0].factory, "videotestsrc");
        assert_eq!(decls[0].assignments, vec![("is-live".into(), "true".into())]);
        assert_eq!(
            decls[1].assignments,
            vec![
                ("name".into(), "id".into()),
                ("sleep-time".into(), "10".into())
            ]
        );
    }

    #[test]
    fn links_need_not_be_spaced_and_quotes_group() {
        let decls = parse(r#"xvimagesink display=":0 .1"!fakesink"#).unwrap();
        assert_eq!(decls[0].assignments[0].1, ":0 .1");
        assert_eq!(decls[1].factory, "fakesink");
    }

    #[test]
    fn rejects_malformed_descriptions() {
        assert!(parse("").is_err());
        assert!(parse("! fakesink").is_err());
        assert!(parse("fakesink !").is_err());
        assert!(parse("fakesink ! ! fakesink").is_err());
        assert!(parse("fakesink sync").is_err());
        assert!(parse("sync=true").is_err());
        assert!(parse(r#"fakesink name="open"#).is_err());
    }
}
