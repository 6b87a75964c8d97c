//! Token types for the Lisa lexer

use logos::Logos;

/// The kind of token produced by the lexer
///
/// Every one- and two-character operator shares the [`Symbol`] variant so a
/// token stays the record `(kind, lexeme, line, column)`; the parser looks at
/// the lexeme to tell symbols apart.
///
/// [`Symbol`]: TokenKind::Symbol
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    // ========== Keywords ==========
    #[token("fn")]
    Fn,
    #[token("extern")]
    Extern,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("while")]
    While,
    #[token("return")]
    Return,

    // ========== Primary ==========
    /// Identifier: a letter or underscore, then letters, digits, underscores
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    /// Number literal: digits and dots, unparsed. A lexeme with more than one
    /// dot is demoted to an error token by the lexer. Dot-started numbers
    /// also claim a lone `.`, so the symbol alphabet below omits it.
    #[regex(r"[0-9][0-9.]*|\.[0-9.]*")]
    Number,

    /// String literal (produced by the lexer's string mode, content only)
    Str,

    /// One- or two-character operator
    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    #[token("{")]
    #[token("}")]
    #[token(",")]
    #[token(":")]
    #[token(";")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("^")]
    #[token("<")]
    #[token(">")]
    #[token("=")]
    #[token("!")]
    #[token("&")]
    #[token("|")]
    #[token("~")]
    #[token("++")]
    #[token("--")]
    #[token("+:")]
    #[token("-:")]
    #[token("*:")]
    #[token("/:")]
    #[token("<<")]
    #[token(">>")]
    #[token("<=")]
    #[token(">=")]
    #[token("!=")]
    Symbol,

    // ========== Special ==========
    /// End of file (added by the lexer, not matched by logos)
    Eof,

    /// Lexer error: illegal character, malformed number, unterminated
    /// comment or string
    Error,
}

impl TokenKind {
    /// Returns true if this token is a keyword
    #[must_use]
    pub const fn is_keyword(&self) -> bool {
        matches!(
            self,
            Self::Fn
                | Self::Extern
                | Self::If
                | Self::Else
                | Self::For
                | Self::In
                | Self::While
                | Self::Return
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fn => write!(f, "fn"),
            Self::Extern => write!(f, "extern"),
            Self::If => write!(f, "if"),
            Self::Else => write!(f, "else"),
            Self::For => write!(f, "for"),
            Self::In => write!(f, "in"),
            Self::While => write!(f, "while"),
            Self::Return => write!(f, "return"),
            Self::Ident => write!(f, "identifier"),
            Self::Number => write!(f, "number"),
            Self::Str => write!(f, "string"),
            Self::Symbol => write!(f, "symbol"),
            Self::Eof => write!(f, "end of file"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Binary operator precedence; higher binds tighter.
///
/// Keyed by the first character of a symbol lexeme, so compound symbols
/// rank with their base operator (`<=` with `<`, `+:` with `+`).
#[must_use]
pub const fn binop_precedence(op: char) -> Option<i32> {
    match op {
        ':' => Some(5),
        '<' | '>' | '=' => Some(10),
        '!' | '&' | '|' | '~' => Some(15),
        '+' | '-' => Some(20),
        '*' | '/' => Some(40),
        '^' => Some(80),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_keywords() {
        assert!(TokenKind::Fn.is_keyword());
        assert!(TokenKind::While.is_keyword());
        assert!(!TokenKind::Ident.is_keyword());
        assert!(!TokenKind::Symbol.is_keyword());
    }

    #[test]
    fn precedence_ordering() {
        let prec = |c| binop_precedence(c).unwrap();
        assert!(prec(':') < prec('<'));
        assert!(prec('<') < prec('&'));
        assert!(prec('&') < prec('+'));
        assert!(prec('+') < prec('*'));
        assert!(prec('*') < prec('^'));
        assert_eq!(prec('<'), prec('='));
        assert_eq!(binop_precedence('('), None);
        assert_eq!(binop_precedence(','), None);
    }
}
