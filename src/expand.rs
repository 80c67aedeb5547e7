//! Word expansion: aliases on the command word, then parameters everywhere.

use crate::env::Environment;
use crate::lexer::{Lexer, Word, WordPart};
use crate::vars::is_valid_name;

/// Result of expanding one command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expanded {
    /// Leading `NAME=value` words.
    pub assignments: Vec<(String, String)>,
    /// The command name followed by its arguments.
    pub argv: Vec<String>,
}

pub struct Expander<'a> {
    env: &'a Environment,
    lexer: &'a Lexer,
}

impl<'a> Expander<'a> {
    pub fn new(env: &'a Environment, lexer: &'a Lexer) -> Self {
        Self { env, lexer }
    }

    /// Expand the words of one command line.
    ///
    /// An alias is looked up only for the first word and only when it is an
    /// unquoted literal. Its value is re-tokenized but not alias-expanded again.
    /// Parameters are then substituted in every word, including those that came
    /// from the alias.
    pub fn expand(&self, words: Vec<Word>) -> Expanded {
        let words = self.substitute_alias(words);

        let mut assignments = Vec::new();
        let mut rest = words.into_iter().peekable();
        while let Some(assignment) = rest.peek().and_then(|word| self.assignment(word)) {
            assignments.push(assignment);
            rest.next();
        }

        let argv = rest.filter_map(|word| self.expand_word(&word)).collect();
        Expanded { assignments, argv }
    }

    fn substitute_alias(&self, mut words: Vec<Word>) -> Vec<Word> {
        let Some(expansion) = words
            .first()
            .and_then(Word::as_plain)
            .and_then(|name| self.env.aliases.get(name))
        else {
            return words;
        };

        match self.lexer.split(expansion) {
            Ok(replacement) => {
                tracing::debug!(expansion, "alias substituted");
                words.splice(0..1, replacement);
            }
            Err(e) => tracing::warn!(expansion, error = %e, "alias value does not tokenize"),
        }
        words
    }

    /// `NAME=value` when the name and `=` are unquoted.
    fn assignment(&self, word: &Word) -> Option<(String, String)> {
        let Some(WordPart::Literal(first)) = word.parts.first() else {
            return None;
        };
        let (name, value) = first.split_once('=')?;
        if !is_valid_name(name) {
            return None;
        }
        let mut value = value.to_string();
        for part in &word.parts[1..] {
            self.push_part(&mut value, part);
        }
        Some((name.to_string(), value))
    }

    /// `None` when an unquoted word expands to nothing.
    fn expand_word(&self, word: &Word) -> Option<String> {
        let mut text = String::new();
        for part in &word.parts {
            self.push_part(&mut text, part);
        }
        if text.is_empty() && !word.quoted {
            None
        } else {
            Some(text)
        }
    }

    fn push_part(&self, out: &mut String, part: &WordPart) {
        match part {
            WordPart::Literal(text) | WordPart::Quoted(text) => out.push_str(text),
            WordPart::ParamSubst(name) => {
                // undefined parameters expand to nothing
                if let Some(value) = self.env.get_var(name) {
                    out.push_str(&value);
                }
            }
        }
    }
}
