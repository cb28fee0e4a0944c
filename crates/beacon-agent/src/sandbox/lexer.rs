//! Tokenizer for the program language.

use super::ProgramError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    // Keywords
    Let,
    Return,
    If,
    Else,
    Try,
    Catch,
    For,
    In,
    True,
    False,
    Null,
    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Bang,
    Eof,
}

impl Token {
    /// Short human-readable form for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Ident(name) => format!("'{}'", name),
            Token::Eof => "end of program".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::Let => "let",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::For => "for",
            Token::In => "in",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::Assign => "=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Eq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::And => "&&",
            Token::Or => "||",
            Token::Bang => "!",
            Token::Number(_) | Token::Str(_) | Token::Ident(_) | Token::Eof => "",
        }
    }
}

/// A token and the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Split source into tokens. The last token is always [`Token::Eof`].
pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ProgramError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => skip_line(&mut chars),
            '/' => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    skip_line(&mut chars);
                } else {
                    tokens.push(Spanned { token: Token::Slash, line });
                }
            }
            '"' | '\'' => {
                chars.next();
                let token = read_string(&mut chars, c, &mut line)?;
                tokens.push(Spanned { token, line });
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' || d == '_' {
                        if d != '_' {
                            text.push(d);
                        }
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n: f64 = text.parse().map_err(|_| ProgramError::Parse {
                    line,
                    message: format!("invalid number '{}'", text),
                })?;
                tokens.push(Spanned { token: Token::Number(n), line });
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned { token: keyword(word), line });
            }
            _ => {
                chars.next();
                let next = chars.peek().copied();
                let (token, doubled) = match (c, next) {
                    ('=', Some('=')) => (Token::Eq, true),
                    ('!', Some('=')) => (Token::NotEq, true),
                    ('<', Some('=')) => (Token::LtEq, true),
                    ('>', Some('=')) => (Token::GtEq, true),
                    ('&', Some('&')) => (Token::And, true),
                    ('|', Some('|')) => (Token::Or, true),
                    ('=', _) => (Token::Assign, false),
                    ('!', _) => (Token::Bang, false),
                    ('<', _) => (Token::Lt, false),
                    ('>', _) => (Token::Gt, false),
                    ('(', _) => (Token::LParen, false),
                    (')', _) => (Token::RParen, false),
                    ('{', _) => (Token::LBrace, false),
                    ('}', _) => (Token::RBrace, false),
                    ('[', _) => (Token::LBracket, false),
                    (']', _) => (Token::RBracket, false),
                    (',', _) => (Token::Comma, false),
                    (';', _) => (Token::Semicolon, false),
                    (':', _) => (Token::Colon, false),
                    ('.', _) => (Token::Dot, false),
                    ('+', _) => (Token::Plus, false),
                    ('-', _) => (Token::Minus, false),
                    ('*', _) => (Token::Star, false),
                    ('%', _) => (Token::Percent, false),
                    _ => {
                        return Err(ProgramError::Parse {
                            line,
                            message: format!("unexpected character '{}'", c),
                        });
                    }
                };
                if doubled {
                    chars.next();
                }
                tokens.push(Spanned { token, line });
            }
        }
    }

    tokens.push(Spanned { token: Token::Eof, line });
    Ok(tokens)
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            break;
        }
        chars.next();
    }
}

fn read_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
    line: &mut usize,
) -> Result<Token, ProgramError> {
    let start = *line;
    let mut value = String::new();
    loop {
        match chars.next() {
            None => {
                return Err(ProgramError::Parse {
                    line: start,
                    message: "unterminated string".to_string(),
                });
            }
            Some(c) if c == quote => return Ok(Token::Str(value)),
            Some('\\') => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(c @ ('\\' | '"' | '\'')) => value.push(c),
                Some(other) => {
                    return Err(ProgramError::Parse {
                        line: *line,
                        message: format!("unknown escape '\\{}'", other),
                    });
                }
                None => continue,
            },
            Some(c) => {
                if c == '\n' {
                    *line += 1;
                }
                value.push(c);
            }
        }
    }
}

fn keyword(word: String) -> Token {
    match word.as_str() {
        "let" => Token::Let,
        "return" => Token::Return,
        "if" => Token::If,
        "else" => Token::Else,
        "try" => Token::Try,
        "catch" => Token::Catch,
        "for" => Token::For,
        "in" => Token::In,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        _ => Token::Ident(word),
    }
}
