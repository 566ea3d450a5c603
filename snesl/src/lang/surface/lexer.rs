use logos::Logos;
use std::fmt;

use crate::reporting::LexerError;

/// Tokens in the surface language.
#[derive(Debug, Clone, PartialEq, Logos)]
pub enum Token<'a> {
    #[regex(r#"'([^'\\]|\\.)'"#, char_literal)]
    CharLiteral(char),
    #[regex(r#""([^"\\]|\\.)*""#, string_literal)] // workaround editor highlighting: "
    StringLiteral(String),
    #[regex(r"[0-9]+", number_literal)]
    NumericLiteral(f64),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Name(&'a str),

    #[token("let")]
    Let,
    #[token("in")]
    In,
    #[token("using")]
    Using,
    #[token("main")]
    Main,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("num")]
    Num,
    #[token("bool")]
    Bool,
    #[token("char")]
    Char,

    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Equal,
    #[token("|")]
    Bar,

    #[token("||")]
    BarBar,
    #[token("&&")]
    AmpAmp,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    BangEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("#")]
    Hash,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    #[error]
    #[regex(r"\p{Whitespace}", logos::skip)]
    #[regex(r"--[^\n]*", logos::skip)]
    Error,
}

fn unescape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        '\\' => Some('\\'),
        '\'' => Some('\''),
        '"' => Some('"'),
        _ => None,
    }
}

/// Decode the characters between a pair of quotes.
fn literal_chars(quoted: &str) -> Option<Vec<char>> {
    let mut chars = quoted[1..quoted.len() - 1].chars();
    let mut decoded = Vec::new();
    while let Some(c) = chars.next() {
        decoded.push(match c {
            '\\' => unescape(chars.next()?)?,
            c => c,
        });
    }
    Some(decoded)
}

fn char_literal<'a>(lexer: &mut logos::Lexer<'a, Token<'a>>) -> Option<char> {
    match literal_chars(lexer.slice())?.as_slice() {
        [c] => Some(*c),
        _ => None,
    }
}

fn string_literal<'a>(lexer: &mut logos::Lexer<'a, Token<'a>>) -> Option<String> {
    Some(literal_chars(lexer.slice())?.into_iter().collect())
}

fn number_literal<'a>(lexer: &mut logos::Lexer<'a, Token<'a>>) -> Option<f64> {
    lexer.slice().parse().ok()
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::CharLiteral(c) => write!(f, "{:?}", c),
            Token::StringLiteral(s) => write!(f, "{:?}", s),
            Token::NumericLiteral(n) => write!(f, "{}", n),
            Token::Name(s) => write!(f, "{}", s),

            Token::Let => write!(f, "let"),
            Token::In => write!(f, "in"),
            Token::Using => write!(f, "using"),
            Token::Main => write!(f, "main"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Num => write!(f, "num"),
            Token::Bool => write!(f, "bool"),
            Token::Char => write!(f, "char"),

            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Equal => write!(f, "="),
            Token::Bar => write!(f, "|"),

            Token::BarBar => write!(f, "||"),
            Token::AmpAmp => write!(f, "&&"),
            Token::EqualEqual => write!(f, "=="),
            Token::BangEqual => write!(f, "!="),
            Token::Less => write!(f, "<"),
            Token::Greater => write!(f, ">"),
            Token::LessEqual => write!(f, "<="),
            Token::GreaterEqual => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Caret => write!(f, "^"),
            Token::Bang => write!(f, "!"),
            Token::Amp => write!(f, "&"),
            Token::Hash => write!(f, "#"),

            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrack => write!(f, "["),
            Token::RBrack => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),

            Token::Error => write!(f, "<error>"),
        }
    }
}

pub type Spanned<Tok, Loc, Error> = Result<(Loc, Tok, Loc), Error>;

pub fn tokens<'a>(
    source: &'a str,
) -> impl 'a + Iterator<Item = Spanned<Token<'a>, usize, LexerError>> {
    Token::lexer(source)
        .spanned()
        .map(|(token, range)| match token {
            Token::Error => Err(LexerError::InvalidToken { range }),
            token => Ok((range.start, token, range.end)),
        })
}
