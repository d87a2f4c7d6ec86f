//! Tokenizer for placement programs.

use crate::error::{Result, SceneError};

/// A piece of a template literal.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePiece {
    Text(String),
    /// Source text of a `${...}` substitution, with the line it starts on.
    Code(String, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Template(Vec<TemplatePiece>),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Punctuators, longest first so greedy matching works.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "**=", ">>>", "<<=", ">>=", "...", "**", "==", "!=", "<=", ">=", "&&", "||",
    "??", "++", "--", "+=", "-=", "*=", "/=", "%=", "=>", "<<", ">>", "?.", "{", "}", "(", ")",
    "[", "]", ";", ",", ".", "<", ">", "+", "-", "*", "/", "%", "=", "!", "?", ":", "&", "|",
    "^", "~",
];

pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    Lexer::new(source, 1).run()
}

pub(crate) fn tokenize_from_line(source: &str, line: usize) -> Result<Vec<Spanned>> {
    Lexer::new(source, line).run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, line: usize) -> Self {
        Self { src, pos: 0, line }
    }

    fn run(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(c) = self.peek() else {
                tokens.push(Spanned { token: Token::Eof, line });
                return Ok(tokens);
            };

            let token = if c.is_ascii_digit() || (c == '.' && self.peek_at(1).map_or(false, |n| n.is_ascii_digit())) {
                self.number()?
            } else if c == '"' || c == '\'' {
                self.string(c)?
            } else if c == '`' {
                self.template()?
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                self.ident()
            } else {
                self.punct()?
            };
            tokens.push(Spanned { token, line });
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> SceneError {
        SceneError::Lex {
            line: self.line,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            let rest = &self.src[self.pos..];
            if rest.starts_with("//") {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if rest.starts_with("/*") {
                self.bump();
                self.bump();
                loop {
                    if self.src[self.pos..].starts_with("*/") {
                        self.bump();
                        self.bump();
                        break;
                    }
                    if self.bump().is_none() {
                        return Err(self.error("unterminated block comment"));
                    }
                }
            } else if self.peek().map_or(false, char::is_whitespace) {
                self.bump();
            } else {
                return Ok(());
            }
        }
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        let rest = &self.src[start..];

        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.bump();
            self.bump();
            let digits_start = self.pos;
            while self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits = &self.src[digits_start..self.pos];
            return u64::from_str_radix(digits, 16)
                .map(|v| Token::Number(v as f64))
                .map_err(|_| self.error(format!("invalid hex literal '0x{}'", digits)));
        }

        while self.peek().map_or(false, |c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_at(1).map_or(true, |c| c != '.') {
            self.bump();
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.bump();
            }
        }

        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(format!("invalid number '{}'", text)))
    }

    fn escape(&mut self) -> Result<char> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        })
    }

    fn string(&mut self, quote: char) -> Result<Token> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => return Ok(Token::Str(value)),
                Some('\\') => value.push(self.escape()?),
                Some(c) => value.push(c),
            }
        }
    }

    fn template(&mut self) -> Result<Token> {
        self.bump();
        let mut pieces = Vec::new();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated template literal")),
                Some('`') => {
                    if !text.is_empty() {
                        pieces.push(TemplatePiece::Text(text));
                    }
                    return Ok(Token::Template(pieces));
                }
                Some('\\') => text.push(self.escape()?),
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    if !text.is_empty() {
                        pieces.push(TemplatePiece::Text(std::mem::take(&mut text)));
                    }
                    let line = self.line;
                    let start = self.pos;
                    let mut depth = 1;
                    loop {
                        match self.peek() {
                            None => return Err(self.error("unterminated template substitution")),
                            Some('{') => depth += 1,
                            Some('}') => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        self.bump();
                    }
                    let code = self.src[start..self.pos].to_string();
                    self.bump();
                    pieces.push(TemplatePiece::Code(code, line));
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.bump();
        }
        Token::Ident(self.src[start..self.pos].to_string())
    }

    fn punct(&mut self) -> Result<Token> {
        let rest = &self.src[self.pos..];
        let found = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)).copied();
        match found {
            Some(p) => {
                for _ in 0..p.len() {
                    self.bump();
                }
                Ok(Token::Punct(p))
            }
            None => {
                let c = self.peek().unwrap_or('?');
                Err(self.error(format!("unexpected character '{}'", c)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_basic_call() {
        assert_eq!(
            tokens("place(1, -2.5, 0x10, 'a b');"),
            vec![
                Token::Ident("place".into()),
                Token::Punct("("),
                Token::Number(1.0),
                Token::Punct(","),
                Token::Punct("-"),
                Token::Number(2.5),
                Token::Punct(","),
                Token::Number(16.0),
                Token::Punct(","),
                Token::Str("a b".into()),
                Token::Punct(")"),
                Token::Punct(";"),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let spanned = tokenize("// one\n/* two\nthree */ x").unwrap();
        assert_eq!(spanned[0].token, Token::Ident("x".into()));
        assert_eq!(spanned[0].line, 3);
    }

    #[test]
    fn test_longest_punctuator() {
        assert_eq!(
            tokens("a === b !== c => d"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("==="),
                Token::Ident("b".into()),
                Token::Punct("!=="),
                Token::Ident("c".into()),
                Token::Punct("=>"),
                Token::Ident("d".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_template_literal() {
        assert_eq!(
            tokens("`wool_${colors[i]}!`"),
            vec![
                Token::Template(vec![
                    TemplatePiece::Text("wool_".into()),
                    TemplatePiece::Code("colors[i]".into(), 1),
                    TemplatePiece::Text("!".into()),
                ]),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(tokens(r#""it\'s\n""#), vec![Token::Str("it's\n".into()), Token::Eof]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(tokenize("'open"), Err(SceneError::Lex { line: 1, .. })));
        assert!(matches!(tokenize("a\n@"), Err(SceneError::Lex { line: 2, .. })));
        assert!(tokenize("/* never closed").is_err());
    }
}
