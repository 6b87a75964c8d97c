//! Lexer for the Lisa language
//!
//! The lexer produces tokens on demand with one-token lookahead, handling:
//! - Keywords, identifiers, and one/two-character symbols
//! - Numeric literals (digits and dots, no exponent form)
//! - String literals
//! - `%` line comments and `%% ... %%` block comments
//! - Source location tracking

#![allow(clippy::cast_possible_truncation)] // Spans use u32; files > 4GB are unsupported

mod span;
mod token;

pub use span::{LineIndex, Location, Span};
pub use token::{binop_precedence, TokenKind};

use logos::Logos;

/// A token with its kind, verbatim text, and source position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The source text of the token; error tokens carry a failure marker
    /// (`ILL`, `EOFinComment`) instead
    pub lexeme: String,
    /// The byte range in the source code
    pub span: Span,
    /// Line and column of the first character of the lexeme
    pub loc: Location,
}

/// The Lisa lexer
///
/// Regular tokens are matched by the logos automaton in [`TokenKind`];
/// comments and string literals are walked by hand so their end-of-file
/// failure modes surface as error tokens.
pub struct Lexer<'src> {
    source: &'src str,
    /// Current position in the source (byte offset)
    position: usize,
    line_index: LineIndex,
    /// One-token lookahead buffer
    lookahead: Option<Token>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            position: 0,
            line_index: LineIndex::new(source),
            lookahead: None,
        }
    }

    /// Consume and return the next token
    pub fn next_token(&mut self) -> Token {
        match self.lookahead.take() {
            Some(token) => token,
            None => self.lex_token(),
        }
    }

    /// Return the next token without consuming it
    pub fn peek_token(&mut self) -> &Token {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.lex_token(),
        };
        self.lookahead.insert(token)
    }

    /// Tokenize an entire source, up to and including end of file
    #[must_use]
    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    /// Lex one token from the current position
    fn lex_token(&mut self) -> Token {
        if let Some(error) = self.skip_trivia() {
            return error;
        }

        let rest = &self.source[self.position..];
        if rest.is_empty() {
            return self.make(TokenKind::Eof, self.position, self.position, String::new());
        }
        if rest.starts_with('"') {
            return self.lex_string();
        }

        let mut logos_lexer = TokenKind::lexer(rest);
        match logos_lexer.next() {
            Some(Ok(kind)) => {
                let range = logos_lexer.span();
                let start = self.position + range.start;
                let end = self.position + range.end;
                self.position = end;
                let lexeme = &self.source[start..end];

                // More than one dot is a malformed number; the lexeme is kept
                // for diagnosis.
                if kind == TokenKind::Number && lexeme.bytes().filter(|b| *b == b'.').count() > 1 {
                    return self.make(TokenKind::Error, start, end, lexeme.to_string());
                }
                self.make(kind, start, end, lexeme.to_string())
            }
            Some(Err(())) => {
                let start = self.position;
                let len = rest.chars().next().map_or(1, char::len_utf8);
                self.position += len;
                self.make(TokenKind::Error, start, self.position, "ILL".to_string())
            }
            None => self.make(TokenKind::Eof, self.position, self.position, String::new()),
        }
    }

    /// Skip whitespace and comments; an unterminated block comment yields an
    /// `EOFinComment` error token
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            let bytes = self.source.as_bytes();
            while self.position < bytes.len() && bytes[self.position].is_ascii_whitespace() {
                self.position += 1;
            }
            let rest = &self.source[self.position..];
            if let Some(block) = rest.strip_prefix("%%") {
                let start = self.position;
                match block.find("%%") {
                    Some(close) => self.position += 2 + close + 2,
                    None => {
                        self.position = self.source.len();
                        return Some(self.make(
                            TokenKind::Error,
                            start,
                            self.position,
                            "EOFinComment".to_string(),
                        ));
                    }
                }
            } else if rest.starts_with('%') {
                match rest.find('\n') {
                    Some(newline) => self.position += newline + 1,
                    None => self.position = self.source.len(),
                }
            } else {
                return None;
            }
        }
    }

    /// Lex a string literal; the lexeme is the content without the quotes.
    /// End of file before the closing quote yields an error token.
    fn lex_string(&mut self) -> Token {
        let start = self.position;
        let rest = &self.source[self.position + 1..];
        match rest.find('"') {
            Some(close) => {
                let content = rest[..close].to_string();
                self.position += close + 2;
                self.make(TokenKind::Str, start, self.position, content)
            }
            None => {
                self.position = self.source.len();
                self.make(TokenKind::Error, start, self.position, String::new())
            }
        }
    }

    fn make(&self, kind: TokenKind, start: usize, end: usize, lexeme: String) -> Token {
        Token {
            kind,
            lexeme,
            span: Span::new(start as u32, end as u32),
            loc: self.line_index.location(start as u32),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::tokenize(source)
    }

    fn lex_kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    fn lex_lexemes(source: &str) -> Vec<String> {
        lex(source).into_iter().map(|t| t.lexeme).collect()
    }

    #[test]
    fn lex_keywords() {
        assert_eq!(
            lex_kinds("fn extern if else for in while return"),
            vec![
                TokenKind::Fn,
                TokenKind::Extern,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::For,
                TokenKind::In,
                TokenKind::While,
                TokenKind::Return,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lex_identifiers() {
        let tokens = lex("foo bar_baz _private fnord");
        assert!(tokens[..4].iter().all(|t| t.kind == TokenKind::Ident));
        assert_eq!(tokens[3].lexeme, "fnord"); // keyword prefix stays an identifier
    }

    #[test]
    fn lex_numbers() {
        let tokens = lex("42 3.14 .5 007");
        assert!(tokens[..4].iter().all(|t| t.kind == TokenKind::Number));
        assert_eq!(tokens[1].lexeme, "3.14");
        assert_eq!(tokens[2].lexeme, ".5");
    }

    #[test]
    fn malformed_number_keeps_lexeme() {
        let tokens = lex("1.2.3");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].lexeme, "1.2.3");
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn lex_single_symbols() {
        let symbols = "( ) [ ] { } , : ; + - * / ^ < > = ! & | ~";
        let tokens = lex(symbols);
        for (token, expected) in tokens.iter().zip(symbols.split_whitespace()) {
            assert_eq!(token.kind, TokenKind::Symbol);
            assert_eq!(token.lexeme, expected);
        }
    }

    #[test]
    fn lex_double_symbols() {
        let symbols = "++ -- +: -: *: /: << >> <= >= !=";
        let tokens = lex(symbols);
        for (token, expected) in tokens.iter().zip(symbols.split_whitespace()) {
            assert_eq!(token.kind, TokenKind::Symbol);
            assert_eq!(token.lexeme, expected);
        }
    }

    #[test]
    fn double_symbol_is_one_token() {
        assert_eq!(
            lex_lexemes("a<=b"),
            vec!["a".to_string(), "<=".to_string(), "b".to_string(), String::new()]
        );
    }

    #[test]
    fn lex_line_comment() {
        assert_eq!(
            lex_kinds("1 % the rest of this line vanishes\n2"),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn lex_block_comment() {
        assert_eq!(
            lex_kinds("1 %% a\nmultiline\ncomment %% 2"),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_block_comment() {
        let tokens = lex("%% unterminated");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].lexeme, "EOFinComment");
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn lex_string_literal() {
        let tokens = lex("\"hello\"");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, "hello");
    }

    #[test]
    fn unterminated_string() {
        let tokens = lex("\"no closing quote");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(tokens[0].lexeme, "");
    }

    #[test]
    fn illegal_character() {
        let tokens = lex("1 @ 2");
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(tokens[1].lexeme, "ILL");
    }

    #[test]
    fn scenario_tokens() {
        assert_eq!(
            lex_lexemes("fn a() { 1 + 2 }"),
            vec!["fn", "a", "(", ")", "{", "1", "+", "2", "}", ""]
        );
    }

    #[test]
    fn locations_track_lines() {
        let tokens = lex("fn a()\n{\n  1\n}");
        let brace = tokens.iter().find(|t| t.lexeme == "{").unwrap();
        assert_eq!(brace.loc, Location::new(2, 1));
        let one = tokens.iter().find(|t| t.lexeme == "1").unwrap();
        assert_eq!(one.loc, Location::new(3, 3));
    }

    #[test]
    fn locations_are_monotonic() {
        let tokens = lex("x : 1\nfor i in 0 ~ 9 { x : x + i }\nx");
        let positions: Vec<(u32, u32)> = tokens
            .iter()
            .take_while(|t| t.kind != TokenKind::Eof)
            .map(|t| (t.loc.line, t.loc.column))
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn lexemes_round_trip() {
        let source = "fn s(n) { sum : 0 for i in 0 ~ n { sum : sum + i } sum }";
        let stripped: String = source.split_whitespace().collect();
        let joined: String = lex(source).iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(joined, stripped);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("fn a");
        assert_eq!(lexer.peek_token().kind, TokenKind::Fn);
        assert_eq!(lexer.peek_token().kind, TokenKind::Fn);
        assert_eq!(lexer.next_token().kind, TokenKind::Fn);
        assert_eq!(lexer.next_token().kind, TokenKind::Ident);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn eof_is_sticky() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }
}
