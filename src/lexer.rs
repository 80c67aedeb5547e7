//! Lexical analysis: splits one logical line into shell words.

use thiserror::Error;

/// Characters separating words unless quoted or escaped.
pub const DEFAULT_DELIMITERS: &str = " \t\n";

/// A part of a word, which can be either unquoted text, quoted text, or a parameter reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Unquoted text that requires no further processing.
    Literal(String),
    /// Text that came from inside quotes or after a backslash. Taken verbatim.
    Quoted(String),
    /// Parameter substitution in the format `$name` or `${name}`. Contains the name.
    ParamSubst(String),
}

/// A single shell word, possibly assembled from several parts (`a"b c"$d`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Word {
    pub parts: Vec<WordPart>,
    /// The word contained quotes, so it survives expansion even when empty.
    pub quoted: bool,
}

impl Word {
    /// The text of the word when it is a single unquoted literal.
    pub fn as_plain(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [WordPart::Literal(text)] => Some(text),
            _ => None,
        }
    }
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unterminated quoted string")]
    UnfinishedQuote,
    /// The input ended right after an escaping backslash.
    #[error("unexpected end of input after escape")]
    TrailingEscape,
    /// `${...}` was not closed or does not name a parameter.
    #[error("bad substitution")]
    BadSubstitution,
}

impl LexingError {
    /// Whether the line may still become valid once another physical line is appended.
    pub fn needs_more_input(&self) -> bool {
        matches!(self, LexingError::UnfinishedQuote | LexingError::TrailingEscape)
    }
}

/// Tokenizer configuration: the delimiter set and whether backslash escapes apply.
#[derive(Debug, Clone)]
pub struct Lexer {
    delimiters: Vec<char>,
    escapes: bool,
}

impl Lexer {
    pub fn new(delimiters: &str) -> Self {
        Self {
            delimiters: delimiters.chars().collect(),
            escapes: true,
        }
    }

    /// Toggle backslash processing. With escapes off a backslash is an ordinary character.
    pub fn with_escapes(mut self, escapes: bool) -> Self {
        self.escapes = escapes;
        self
    }

    /// Split `line` into words.
    ///
    /// Quote characters are stripped; quoted runs never split. An empty or
    /// blank line yields no words. An open quote is reported as
    /// [`LexingError::UnfinishedQuote`] so the caller can ask for more input.
    pub fn split(&self, line: &str) -> Result<Vec<Word>, LexingError> {
        LexingFSM::new(self, line).make_words()
    }

    /// A [`QuoteScanner`] following the quoting rules of this lexer.
    pub fn scanner(&self) -> QuoteScanner<'_> {
        QuoteScanner {
            config: self,
            state: ScanState::Start,
            escaped: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    Word,
    SingleQuote,
    DoubleQuote,
    /// Right after `$`; `true` inside double quotes.
    Dollar(bool),
    /// Inside `${...}`; `true` inside double quotes.
    Brace(bool),
    Comment,
}

/// Tracks whether text fed so far leaves a quote, `${` or escape open.
///
/// Input is consumed piece by piece, so a logical line growing by physical
/// lines is scanned once in total. Words are not built; [`Lexer::split`]
/// runs once the text is complete.
pub struct QuoteScanner<'a> {
    config: &'a Lexer,
    state: ScanState,
    escaped: bool,
}

impl QuoteScanner<'_> {
    pub fn feed(&mut self, text: &str) {
        for ch in text.chars() {
            self.step(ch);
        }
    }

    /// What [`Lexer::split`] would report about the open construct at the end
    /// of the text, or `None` when nothing is left open.
    pub fn pending(&self) -> Option<LexingError> {
        match self.state {
            ScanState::SingleQuote | ScanState::DoubleQuote | ScanState::Dollar(true) => {
                Some(LexingError::UnfinishedQuote)
            }
            ScanState::Brace(_) => Some(LexingError::BadSubstitution),
            _ if self.escaped => Some(LexingError::TrailingEscape),
            _ => None,
        }
    }

    fn step(&mut self, ch: char) {
        if self.escaped {
            self.escaped = false;
            // inside double quotes only these characters are escapable
            let taken = self.state != ScanState::DoubleQuote
                || matches!(ch, '$' | '`' | '"' | '\\' | '\n');
            if taken {
                return;
            }
        }

        match self.state {
            ScanState::Start if self.config.delimiters.contains(&ch) => {}
            ScanState::Start if ch == '#' => self.state = ScanState::Comment,
            ScanState::Start | ScanState::Word => {
                self.state = ScanState::Word;
                self.step_word(ch);
            }
            ScanState::SingleQuote => {
                if ch == '\'' {
                    self.state = ScanState::Word;
                }
            }
            ScanState::DoubleQuote => match ch {
                '"' => self.state = ScanState::Word,
                '\\' if self.config.escapes => self.escaped = true,
                '$' => self.state = ScanState::Dollar(true),
                _ => {}
            },
            ScanState::Dollar(in_quotes) => {
                let back = if in_quotes {
                    ScanState::DoubleQuote
                } else {
                    ScanState::Word
                };
                match ch {
                    '{' => self.state = ScanState::Brace(in_quotes),
                    // one-character parameters: `$$`, `$?`, `$#`, `$1`
                    '?' | '$' | '#' => self.state = back,
                    c if c.is_ascii_digit() => self.state = back,
                    c => {
                        self.state = back;
                        self.step(c);
                    }
                }
            }
            ScanState::Brace(in_quotes) => {
                if ch == '}' {
                    self.state = if in_quotes {
                        ScanState::DoubleQuote
                    } else {
                        ScanState::Word
                    };
                }
            }
            ScanState::Comment => {}
        }
    }

    fn step_word(&mut self, ch: char) {
        match ch {
            c if self.config.delimiters.contains(&c) => self.state = ScanState::Start,
            '\'' => self.state = ScanState::SingleQuote,
            '"' => self.state = ScanState::DoubleQuote,
            '\\' if self.config.escapes => self.escaped = true,
            '$' => self.state = ScanState::Dollar(false),
            _ => {}
        }
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITERS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferKind {
    Literal,
    Quoted,
}

struct LexingFSM<'a> {
    config: &'a Lexer,
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    current_word: Word,
    buffer: String,
    buffer_kind: BufferKind,
}

impl<'a> LexingFSM<'a> {
    fn new(config: &'a Lexer, line: &str) -> Self {
        LexingFSM {
            config,
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            current_word: Word::default(),
            buffer: String::new(),
            buffer_kind: BufferKind::Literal,
        }
    }

    fn make_words(&mut self) -> Result<Vec<Word>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch, &mut out)?,
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        if matches!(
            self.state,
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote
        ) {
            return Err(LexingError::UnfinishedQuote);
        }

        self.finish_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn is_delimiter(&self, ch: char) -> bool {
        self.config.delimiters.contains(&ch)
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Word>) -> Result<(), LexingError> {
        if self.is_delimiter(ch) {
            return Ok(());
        }
        if ch == '#' {
            // comment runs to the end of the line
            self.pos = self.input.len();
            return Ok(());
        }
        self.state = LexingState::ReadingWord;
        self.handle_word(ch, out)
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Word>) -> Result<(), LexingError> {
        match ch {
            c if self.is_delimiter(c) => {
                self.finish_word(out);
                self.state = LexingState::Start;
            }
            '\'' => {
                self.current_word.quoted = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.current_word.quoted = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' if self.config.escapes => match self.read_char() {
                None => return Err(LexingError::TrailingEscape),
                Some('\n') => {}
                Some(c) => self.push(BufferKind::Quoted, c),
            },
            '$' => self.handle_dollar(BufferKind::Literal)?,
            c => self.push(BufferKind::Literal, c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.push(BufferKind::Quoted, c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), LexingError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' if self.config.escapes => match self.peek_char() {
                Some(c @ ('$' | '`' | '"' | '\\')) => {
                    self.read_char();
                    self.push(BufferKind::Quoted, c);
                }
                Some('\n') => {
                    self.read_char();
                }
                _ => self.push(BufferKind::Quoted, '\\'),
            },
            '$' => self.handle_dollar(BufferKind::Quoted)?,
            c => self.push(BufferKind::Quoted, c),
        }
        Ok(())
    }

    /// Called right after a `$`. Emits a parameter part, or a literal `$` when
    /// nothing that names a parameter follows.
    fn handle_dollar(&mut self, kind: BufferKind) -> Result<(), LexingError> {
        match self.read_param_name()? {
            Some(name) => {
                self.flush_buffer();
                self.current_word.parts.push(WordPart::ParamSubst(name));
            }
            None => self.push(kind, '$'),
        }
        Ok(())
    }

    fn read_param_name(&mut self) -> Result<Option<String>, LexingError> {
        match self.peek_char() {
            Some('{') => {
                self.read_char();
                let mut name = String::new();
                loop {
                    match self.read_char() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => return Err(LexingError::BadSubstitution),
                    }
                }
                if is_parameter_name(&name) {
                    Ok(Some(name))
                } else {
                    Err(LexingError::BadSubstitution)
                }
            }
            Some(c @ ('?' | '$' | '#')) => {
                self.read_char();
                Ok(Some(c.to_string()))
            }
            Some(c) if c.is_ascii_digit() => {
                self.read_char();
                Ok(Some(c.to_string()))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if !(c.is_ascii_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    self.read_char();
                }
                Ok(Some(name))
            }
            _ => Ok(None),
        }
    }

    fn push(&mut self, kind: BufferKind, ch: char) {
        if self.buffer_kind != kind {
            self.flush_buffer();
            self.buffer_kind = kind;
        }
        self.buffer.push(ch);
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        self.current_word.parts.push(match self.buffer_kind {
            BufferKind::Literal => WordPart::Literal(text),
            BufferKind::Quoted => WordPart::Quoted(text),
        });
    }

    fn finish_word(&mut self, out: &mut Vec<Word>) {
        self.flush_buffer();
        let word = std::mem::take(&mut self.current_word);
        if !word.parts.is_empty() || word.quoted {
            out.push(word);
        }
    }
}

/// Names accepted inside `${...}`.
fn is_parameter_name(name: &str) -> bool {
    matches!(name, "?" | "$" | "#")
        || (!name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
        || crate::vars::is_valid_name(name)
}

/// Split `line` with the default delimiters and escapes enabled.
pub fn split_into_words(line: &str) -> Result<Vec<Word>, LexingError> {
    Lexer::default().split(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(words: &[Word]) -> Vec<String> {
        words
            .iter()
            .map(|w| {
                w.parts
                    .iter()
                    .map(|p| match p {
                        WordPart::Literal(s) | WordPart::Quoted(s) => s.clone(),
                        WordPart::ParamSubst(name) => format!("${{{name}}}"),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_simple_split() {
        let words = split_into_words("echo hello  world").unwrap();
        assert_eq!(texts(&words), vec!["echo", "hello", "world"]);
        assert_eq!(words[0].as_plain(), Some("echo"));
    }

    #[test]
    fn test_empty_and_blank_lines() {
        assert!(split_into_words("").unwrap().is_empty());
        assert!(split_into_words("  \t \n").unwrap().is_empty());
    }

    #[test]
    fn test_surrounding_whitespace_does_not_change_words() {
        let plain = split_into_words("ls -l 'a b'").unwrap();
        let padded = split_into_words(" \t  ls   -l\t'a b'   \n").unwrap();
        assert_eq!(plain, padded);
    }

    #[test]
    fn test_quotes_are_stripped_and_keep_delimiters() {
        let words = split_into_words(r#"echo 'a  b' "c d" e"f g"h"#).unwrap();
        assert_eq!(texts(&words), vec!["echo", "a  b", "c d", "ef gh"]);
        assert!(words[1].quoted);
        assert!(!words[0].quoted);
        assert_eq!(words[1].as_plain(), None);
    }

    #[test]
    fn test_empty_quotes_make_a_word() {
        let words = split_into_words("echo '' \"\"").unwrap();
        assert_eq!(words.len(), 3);
        assert!(words[1].parts.is_empty() && words[1].quoted);
    }

    #[test]
    fn test_unterminated_quotes() {
        assert_eq!(
            split_into_words("'unterminated"),
            Err(LexingError::UnfinishedQuote)
        );
        assert_eq!(
            split_into_words("echo \"abc 'def'"),
            Err(LexingError::UnfinishedQuote)
        );
        assert!(LexingError::UnfinishedQuote.needs_more_input());
    }

    #[test]
    fn test_quote_spanning_lines() {
        let words = split_into_words("echo 'first\nsecond'").unwrap();
        assert_eq!(texts(&words), vec!["echo", "first\nsecond"]);
    }

    #[test]
    fn test_backslash_escapes() {
        let words = split_into_words(r"echo a\ b \$HOME \'x").unwrap();
        assert_eq!(texts(&words), vec!["echo", "a b", "$HOME", "'x"]);
        assert!(
            words[2]
                .parts
                .iter()
                .all(|p| !matches!(p, WordPart::ParamSubst(_)))
        );
    }

    #[test]
    fn test_backslash_inside_double_quotes() {
        let words = split_into_words(r#"echo "a\"b" "c\d" "\$x""#).unwrap();
        assert_eq!(texts(&words), vec!["echo", "a\"b", "c\\d", "$x"]);
    }

    #[test]
    fn test_trailing_escape_and_line_join() {
        assert_eq!(split_into_words("echo a\\"), Err(LexingError::TrailingEscape));
        assert!(LexingError::TrailingEscape.needs_more_input());

        let words = split_into_words("echo a\\\nb").unwrap();
        assert_eq!(texts(&words), vec!["echo", "ab"]);
    }

    #[test]
    fn test_escapes_disabled() {
        let lexer = Lexer::default().with_escapes(false);
        let words = lexer.split(r"echo a\ b").unwrap();
        assert_eq!(texts(&words), vec!["echo", "a\\", "b"]);
    }

    #[test]
    fn test_custom_delimiters() {
        let lexer = Lexer::new(":");
        let words = lexer.split("/bin:/usr/bin::'/opt:x'").unwrap();
        assert_eq!(texts(&words), vec!["/bin", "/usr/bin", "/opt:x"]);
    }

    #[test]
    fn test_parameters() {
        let words = split_into_words(r#"echo $HOME/x "$? $$" ${name}s $1 '$no' a$ $"#).unwrap();
        assert_eq!(
            words[1].parts,
            vec![
                WordPart::ParamSubst("HOME".into()),
                WordPart::Literal("/x".into())
            ]
        );
        assert_eq!(
            words[2].parts,
            vec![
                WordPart::ParamSubst("?".into()),
                WordPart::Quoted(" ".into()),
                WordPart::ParamSubst("$".into()),
            ]
        );
        assert_eq!(
            words[3].parts,
            vec![
                WordPart::ParamSubst("name".into()),
                WordPart::Literal("s".into())
            ]
        );
        assert_eq!(words[4].parts, vec![WordPart::ParamSubst("1".into())]);
        assert_eq!(words[5].parts, vec![WordPart::Quoted("$no".into())]);
        assert_eq!(texts(&words[6..]), vec!["a$", "$"]);
    }

    #[test]
    fn test_scanner_agrees_with_split() {
        let lexer = Lexer::default();
        let inputs = [
            "echo a b",
            "echo 'open",
            "echo \"open",
            "echo \"a\\\"b",
            "echo \"done\" 'x'",
            "echo a\\",
            "echo a\\\\",
            "echo \"tail\\",
            "echo $$'open",
            "echo $${x",
            "echo ${HOME",
            "echo \"${HOME}\"",
            "echo \"$",
            "echo $",
            "# 'comment",
            "echo x # 'comment",
            "echo a#'b",
            "'a\nb'",
        ];
        for input in inputs {
            let mut scanner = lexer.scanner();
            scanner.feed(input);
            let expected = lexer.split(input).err().filter(LexingError::needs_more_input);
            let pending = scanner.pending().filter(LexingError::needs_more_input);
            assert_eq!(pending, expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_scanner_resumes_across_pieces() {
        let lexer = Lexer::default();
        let mut scanner = lexer.scanner();

        scanner.feed("echo \"one");
        assert_eq!(scanner.pending(), Some(LexingError::UnfinishedQuote));
        scanner.feed("\n");
        scanner.feed("two 'still quoted");
        assert_eq!(scanner.pending(), Some(LexingError::UnfinishedQuote));
        scanner.feed("\n");
        scanner.feed("three\" \\");
        assert_eq!(scanner.pending(), Some(LexingError::TrailingEscape));
        scanner.feed("\n");
        scanner.feed("four");
        assert_eq!(scanner.pending(), None);

        let mut unclosed = lexer.scanner();
        unclosed.feed("echo ${a");
        assert_eq!(unclosed.pending(), Some(LexingError::BadSubstitution));
    }

    #[test]
    fn test_bad_substitution() {
        assert_eq!(
            split_into_words("echo ${HOME"),
            Err(LexingError::BadSubstitution)
        );
        assert_eq!(
            split_into_words("echo ${a-b}"),
            Err(LexingError::BadSubstitution)
        );
        assert!(!LexingError::BadSubstitution.needs_more_input());
    }

    #[test]
    fn test_comments() {
        let words = split_into_words("echo hi # ignored 'quote").unwrap();
        assert_eq!(texts(&words), vec!["echo", "hi"]);

        let words = split_into_words("echo a#b").unwrap();
        assert_eq!(texts(&words), vec!["echo", "a#b"]);

        assert!(split_into_words("# only a comment").unwrap().is_empty());
    }
}
