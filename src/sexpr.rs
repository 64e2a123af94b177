/// S-expression lexer and parser for module scripts
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    Quote,
    Symbol(String),
    String(String),
    Integer(i64),
    Float(f64),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Quote => write!(f, "'"),
            Token::Symbol(s) => write!(f, "{}", s),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(fl) => write!(f, "{}", fl),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// A token together with the position it started at (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Structural problem in module source, located at a line and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Hand-written lexer for module scripts
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                while let Some(ch) = self.advance() {
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn is_delimiter(ch: char) -> bool {
        ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | ';')
    }

    fn read_string(&mut self, line: usize, column: usize) -> Result<String, SyntaxError> {
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.advance() {
            match ch {
                '"' => return Ok(result),
                '\\' => match self.advance() {
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some(c) => result.push(c),
                    None => break,
                },
                c => result.push(c),
            }
        }
        Err(SyntaxError::new(line, column, "unclosed string literal"))
    }

    /// Read a number or symbol up to the next delimiter.
    fn read_atom(&mut self, line: usize, column: usize) -> Result<Token, SyntaxError> {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if Self::is_delimiter(ch) {
                break;
            }
            text.push(ch);
            self.advance();
        }

        let numeric_start = text
            .strip_prefix('-')
            .unwrap_or(&text)
            .starts_with(|c: char| c.is_ascii_digit());
        if !numeric_start {
            return Ok(Token::Symbol(text));
        }
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Token::Integer(n));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Ok(Token::Float(f));
        }
        Err(SyntaxError::new(
            line,
            column,
            format!("malformed number '{}'", text),
        ))
    }

    pub fn next_lexeme(&mut self) -> Result<Lexeme, SyntaxError> {
        self.skip_whitespace_and_comments();
        let (line, column) = (self.line, self.column);

        let token = match self.current() {
            None => Token::Eof,
            Some('(') => {
                self.advance();
                Token::LParen
            }
            Some(')') => {
                self.advance();
                Token::RParen
            }
            Some('\'') => {
                self.advance();
                Token::Quote
            }
            Some('"') => Token::String(self.read_string(line, column)?),
            Some(_) => self.read_atom(line, column)?,
        };
        Ok(Lexeme {
            token,
            line,
            column,
        })
    }

    pub fn tokenize(&mut self) -> Result<Vec<Lexeme>, SyntaxError> {
        let mut lexemes = Vec::new();
        loop {
            let lexeme = self.next_lexeme()?;
            let done = lexeme.token == Token::Eof;
            lexemes.push(lexeme);
            if done {
                break;
            }
        }
        Ok(lexemes)
    }
}

/// Syntactic shape of a parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum SExprKind {
    /// Symbolic atom (identifiers, operators, literals like `True`)
    Atom(String),
    /// String literal
    String(String),
    /// Integer literal
    Integer(i64),
    /// Floating point literal
    Float(f64),
    /// Parenthesized list
    List(Vec<SExpr>),
    /// `'expr`, sugar for `(quote expr)`
    Quoted(Box<SExpr>),
}

/// A parsed expression and the source line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct SExpr {
    pub kind: SExprKind,
    pub line: usize,
}

impl SExpr {
    pub fn new(kind: SExprKind, line: usize) -> Self {
        Self { kind, line }
    }

    /// The symbol name, if this expression is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            SExprKind::Atom(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            SExprKind::Atom(s) => write!(f, "{}", s),
            SExprKind::String(s) => write!(f, "\"{}\"", s),
            SExprKind::Integer(i) => write!(f, "{}", i),
            SExprKind::Float(fl) => write!(f, "{}", fl),
            SExprKind::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            SExprKind::Quoted(expr) => write!(f, "'{}", expr),
        }
    }
}

/// Deepest nesting of lists and quotes accepted in module source.
pub const MAX_NESTING: usize = 512;

/// Hand-written parser for module scripts
pub struct Parser {
    lexemes: Vec<Lexeme>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(lexemes: Vec<Lexeme>) -> Self {
        Parser {
            lexemes,
            pos: 0,
            depth: 0,
        }
    }

    fn current(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn at_eof(&self) -> bool {
        self.current().map_or(true, |l| l.token == Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.lexemes.len() {
            self.pos += 1;
        }
    }

    fn eof_error(&self) -> SyntaxError {
        let (line, column) = self
            .lexemes
            .last()
            .map_or((1, 1), |l| (l.line, l.column));
        SyntaxError::new(line, column, "unexpected end of input")
    }

    pub fn parse_sexpr(&mut self) -> Result<SExpr, SyntaxError> {
        let lexeme = match self.current() {
            Some(l) => l.clone(),
            None => return Err(self.eof_error()),
        };
        if !matches!(lexeme.token, Token::LParen | Token::Quote) {
            return self.parse_nested(lexeme);
        }
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::new(
                lexeme.line,
                lexeme.column,
                "expression nested too deeply",
            ));
        }
        self.depth += 1;
        let result = self.parse_nested(lexeme);
        self.depth -= 1;
        result
    }

    fn parse_nested(&mut self, lexeme: Lexeme) -> Result<SExpr, SyntaxError> {
        match lexeme.token {
            Token::LParen => {
                self.advance();
                let mut items = Vec::new();
                loop {
                    match self.current().map(|l| &l.token) {
                        Some(Token::RParen) => {
                            self.advance();
                            break;
                        }
                        Some(Token::Eof) | None => {
                            return Err(SyntaxError::new(
                                lexeme.line,
                                lexeme.column,
                                "unclosed '(', expected ')'",
                            ))
                        }
                        _ => items.push(self.parse_sexpr()?),
                    }
                }
                Ok(SExpr::new(SExprKind::List(items), lexeme.line))
            }
            Token::RParen => Err(SyntaxError::new(
                lexeme.line,
                lexeme.column,
                "unexpected ')'",
            )),
            Token::Quote => {
                self.advance();
                if self.at_eof() {
                    return Err(self.eof_error());
                }
                let quoted = self.parse_sexpr()?;
                Ok(SExpr::new(SExprKind::Quoted(Box::new(quoted)), lexeme.line))
            }
            Token::Symbol(s) => {
                self.advance();
                Ok(SExpr::new(SExprKind::Atom(s), lexeme.line))
            }
            Token::String(s) => {
                self.advance();
                Ok(SExpr::new(SExprKind::String(s), lexeme.line))
            }
            Token::Integer(i) => {
                self.advance();
                Ok(SExpr::new(SExprKind::Integer(i), lexeme.line))
            }
            Token::Float(f) => {
                self.advance();
                Ok(SExpr::new(SExprKind::Float(f), lexeme.line))
            }
            Token::Eof => Err(self.eof_error()),
        }
    }

    pub fn parse(&mut self) -> Result<Vec<SExpr>, SyntaxError> {
        let mut exprs = Vec::new();
        while !self.at_eof() {
            exprs.push(self.parse_sexpr()?);
        }
        Ok(exprs)
    }
}

/// Tokenize and parse a whole source text.
pub fn parse_source(source: &str) -> Result<Vec<SExpr>, SyntaxError> {
    let lexemes = Lexer::new(source).tokenize()?;
    Parser::new(lexemes).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|l| l.token)
            .collect()
    }

    #[test]
    fn test_lexer_basic() {
        assert_eq!(
            tokens("(+ 1 2)"),
            vec![
                Token::LParen,
                Token::Symbol("+".to_string()),
                Token::Integer(1),
                Token::Integer(2),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_numbers_and_symbols() {
        assert_eq!(
            tokens("-7 2.5 -x set! <="),
            vec![
                Token::Integer(-7),
                Token::Float(2.5),
                Token::Symbol("-x".to_string()),
                Token::Symbol("set!".to_string()),
                Token::Symbol("<=".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_string_escapes() {
        assert_eq!(
            tokens(r#""a\nb\"c""#),
            vec![Token::String("a\nb\"c".to_string()), Token::Eof]
        );
    }

    #[test]
    fn test_lexer_comments() {
        assert_eq!(
            tokens("; header\n(foo) ; trailing\n"),
            vec![
                Token::LParen,
                Token::Symbol("foo".to_string()),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lexer_tracks_lines() {
        let lexemes = Lexer::new("(a\n  b)").tokenize().unwrap();
        assert_eq!((lexemes[2].line, lexemes[2].column), (2, 3));
    }

    #[test]
    fn test_unclosed_string_reports_start() {
        let err = Lexer::new("\n\n  \"abc").tokenize().unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_malformed_number() {
        let err = Lexer::new("12abc").tokenize().unwrap_err();
        assert!(err.message.contains("12abc"));
    }

    #[test]
    fn test_parse_nested() {
        let exprs = parse_source("(define x (list 1 \"two\" 3.0))").unwrap();
        assert_eq!(exprs.len(), 1);
        assert_eq!(exprs[0].to_string(), "(define x (list 1 \"two\" 3))");
    }

    #[test]
    fn test_parse_quote_sugar() {
        let exprs = parse_source("'(a b)").unwrap();
        assert!(matches!(exprs[0].kind, SExprKind::Quoted(_)));
    }

    #[test]
    fn test_parse_records_lines() {
        let exprs = parse_source("(a)\n\n(b)").unwrap();
        assert_eq!(exprs[0].line, 1);
        assert_eq!(exprs[1].line, 3);
    }

    #[test]
    fn test_unclosed_paren_points_at_open() {
        let err = parse_source("(ok)\n(define x\n  (list 1 2)").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unclosed"));
    }

    #[test]
    fn test_stray_close_paren() {
        let err = parse_source("(a))").unwrap_err();
        assert_eq!(err.column, 4);
    }

    #[test]
    fn test_nesting_limit() {
        let ok = format!("{}{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(parse_source(&ok).is_ok());

        let deep = format!("{}{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        let err = parse_source(&deep).unwrap_err();
        assert_eq!(err.message, "expression nested too deeply");
        assert_eq!((err.line, err.column), (1, MAX_NESTING + 1));

        let quoted = format!("{}x", "'".repeat(MAX_NESTING + 1));
        assert!(parse_source(&quoted).is_err());
    }

    #[test]
    fn test_empty_source() {
        assert!(parse_source("  ; nothing here\n").unwrap().is_empty());
    }
}
