use crate::common::source::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // keywords
    Main,
    Var,
    Array,
    Let,
    Call,
    If,
    Then,
    Else,
    Fi,
    While,
    Do,
    Od,
    Return,
    Void,
    Function,
    Procedure,
    InputNum,
    OutputNum,
    OutputNewLine,

    Ident(String),
    Number(i64),

    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign, // `<-`
    Semi,
    Comma,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Eof,
    Error(char),
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "main" => TokenKind::Main,
            "var" => TokenKind::Var,
            "array" => TokenKind::Array,
            "let" => TokenKind::Let,
            "call" => TokenKind::Call,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "fi" => TokenKind::Fi,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "od" => TokenKind::Od,
            "return" => TokenKind::Return,
            "void" => TokenKind::Void,
            "function" => TokenKind::Function,
            "procedure" => TokenKind::Procedure,
            "InputNum" => TokenKind::InputNum,
            "OutputNum" => TokenKind::OutputNum,
            "OutputNewLine" => TokenKind::OutputNewLine,
            _ => return None,
        })
    }

    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::Number(n) => format!("number `{n}`"),
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Error(c) => format!("unrecognized character `{c}`"),
            other => format!("`{:?}`", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
