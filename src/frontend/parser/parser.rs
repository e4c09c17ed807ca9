use std::collections::HashMap;

use log::debug;

use crate::common::error::{Diagnostic, DiagnosticEngine};
use crate::common::source::Span;
use crate::frontend::lexer::{Lexer, Token, TokenKind};
use crate::ir::{BlockId, Cfg, Slot};

/// Recursive-descent parser that builds SSA form directly while consuming
/// tokens — there is no separate AST stage. `Cfg` is mutated in place by
/// every structural production.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    pub(crate) current: Token,
    pub cfg: Cfg,
    pub diagnostics: DiagnosticEngine,
    pub(crate) error: bool,
    /// Which φ operand slot the branch currently being parsed owns, for
    /// every open `if`/`else` join. Tracked separately from the join stack
    /// itself so repeated reassignment of the same name within one branch
    /// always updates the same operand instead of clobbering it.
    pub(crate) branch_slot: HashMap<BlockId, Slot>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, file_id: u32) -> Self {
        let mut lexer = Lexer::new(source, file_id);
        let current = lexer.next_token();
        Parser {
            lexer,
            current,
            cfg: Cfg::new(),
            diagnostics: DiagnosticEngine::new(),
            error: false,
            branch_slot: HashMap::new(),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error || self.diagnostics.has_errors()
    }

    pub(crate) fn bump(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> bool {
        if self.current.kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Option<String> {
        if let TokenKind::Ident(name) = self.current.kind.clone() {
            self.bump();
            Some(name)
        } else {
            None
        }
    }

    pub(crate) fn span(&self) -> Span {
        self.current.span
    }

    pub(crate) fn syntax_error(&mut self, message: impl Into<String>) {
        let span = self.span();
        self.error = true;
        self.diagnostics.emit(Diagnostic::error(message, span));
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.emit(Diagnostic::warning(message, span));
    }

    /// Drives the whole grammar: `main [var ...] [array ...] { stats } .`
    pub fn parse(mut self) -> (Cfg, DiagnosticEngine, bool) {
        self.parse_program();
        (self.cfg, self.diagnostics, self.has_error())
    }

    fn parse_program(&mut self) {
        if !self.expect(TokenKind::Main) {
            self.syntax_error("expected `main`");
            return;
        }

        if self.current.kind == TokenKind::Var {
            self.bump();
            self.parse_var_decls();
            if self.error {
                return;
            }
        }

        if self.current.kind == TokenKind::Array {
            self.bump();
            self.parse_array_decl();
            if self.error {
                return;
            }
        }

        if let Some(array) = self.cfg.array_name().map(|s| s.to_string()) {
            debug!("seeding array constants for `{array}`");
            self.cfg.add_const(4);
            self.cfg.add_symbolic_const(&format!("{array}_adr"));
        }

        if !self.expect(TokenKind::LBrace) {
            self.syntax_error("expected `{`");
            return;
        }
        self.parse_statement_sequence();
        if !self.expect(TokenKind::RBrace) {
            self.syntax_error("expected `}`");
            return;
        }
        if !self.expect(TokenKind::Dot) {
            self.syntax_error("expected `.` terminating the program");
            return;
        }
        use crate::ir::{Op, Operand};
        self.cfg
            .add_instruction_no_cse(Op::End, Operand::Unset, Operand::Unset);
    }

    fn parse_var_decls(&mut self) {
        loop {
            match self.expect_ident() {
                Some(name) => {
                    if self.cfg.is_declared(&name) {
                        self.syntax_error(format!("`{name}` is already declared"));
                        return;
                    }
                    self.cfg.declare_var(&name);
                }
                None => {
                    self.syntax_error("expected identifier in `var` declaration");
                    return;
                }
            }
            if self.current.kind == TokenKind::Comma {
                self.bump();
                continue;
            }
            break;
        }
        if !self.expect(TokenKind::Semi) {
            self.syntax_error("expected `;` after `var` declaration");
        }
    }

    fn parse_array_decl(&mut self) {
        if !self.expect(TokenKind::LBracket) {
            self.syntax_error("expected `[` in array declaration");
            return;
        }
        match self.current.kind.clone() {
            TokenKind::Number(_) => {
                self.bump();
            }
            _ => {
                self.syntax_error("expected array size");
                return;
            }
        }
        if !self.expect(TokenKind::RBracket) {
            self.syntax_error("expected `]` in array declaration");
            return;
        }
        let name = match self.expect_ident() {
            Some(name) => name,
            None => {
                self.syntax_error("expected array name");
                return;
            }
        };
        self.cfg.declare_array(&name);
        if !self.expect(TokenKind::Semi) {
            self.syntax_error("expected `;` after array declaration");
        }
    }

    pub(crate) fn parse_statement_sequence(&mut self) {
        self.parse_statement();
        while self.current.kind == TokenKind::Semi {
            self.bump();
            if self.at_statement_terminator() {
                break;
            }
            self.parse_statement();
            if self.error {
                return;
            }
        }
    }

    fn at_statement_terminator(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::RBrace | TokenKind::Fi | TokenKind::Else | TokenKind::Od | TokenKind::Eof
        )
    }

    fn parse_statement(&mut self) {
        match self.current.kind {
            TokenKind::Let => self.parse_assignment(),
            TokenKind::Call => self.parse_call_statement(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            _ if self.at_statement_terminator() => {}
            _ => {
                let desc = self.current.kind.describe();
                self.syntax_error(format!("unexpected {desc}"));
            }
        }
    }
}
