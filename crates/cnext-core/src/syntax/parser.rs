//! Recursive-descent parser turning a C-Next token stream into the typed
//! tree in `super::ast`. Implements the "external parser" contract from
//! the core spec (see crate-level docs): the rest of the crate only ever
//! consumes `ast::Program`.

use super::ast::*;
use super::lexer::{Lexer, Tok, Token};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

pub struct Parser {
    toks: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

const BUILTIN_TYPES: &[&str] = &[
    "u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64", "bool", "void", "char",
];

impl Parser {
    pub fn new(source: &str) -> Self {
        let toks = Lexer::new(source).tokenize();
        Parser { toks, pos: 0 }
    }

    pub fn parse_program(source: &str) -> PResult<Program> {
        let mut p = Parser::new(source);
        let mut items = Vec::new();
        while !p.at_eof() {
            items.push(p.parse_item()?);
        }
        Ok(Program { items })
    }

    fn cur(&self) -> &Tok {
        &self.toks[self.pos].tok
    }

    fn cur_span(&self) -> Span {
        self.toks[self.pos].span
    }

    fn at_eof(&self) -> bool {
        matches!(self.cur(), Tok::Eof)
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.pos].tok.clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Tok) -> PResult<()> {
        if std::mem::discriminant(self.cur()) == std::mem::discriminant(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, found {:?}", expected, self.cur())))
        }
    }

    fn err(&self, message: String) -> ParseError {
        ParseError {
            message,
            span: self.cur_span(),
        }
    }

    fn eat_ident(&mut self) -> PResult<String> {
        match self.bump() {
            Tok::Ident(s) => Ok(s),
            other => Err(ParseError {
                message: format!("expected identifier, found {:?}", other),
                span: self.cur_span(),
            }),
        }
    }

    fn looks_like_type_start(&self) -> bool {
        matches!(self.cur(), Tok::Ident(_) | Tok::Void)
    }

    // ---- items ----

    fn parse_item(&mut self) -> PResult<Item> {
        match self.cur().clone() {
            Tok::StringInclude(path, is_local) => {
                let span = self.cur_span();
                self.bump();
                Ok(Item::Include(IncludeDirective {
                    path,
                    is_local,
                    span,
                }))
            }
            Tok::Scope => self.parse_scope().map(Item::Scope),
            Tok::Enum => self.parse_enum().map(Item::Enum),
            Tok::Bitmap(width) => self.parse_bitmap(width).map(Item::Bitmap),
            Tok::Struct => self.parse_struct().map(Item::Struct),
            Tok::Register => self.parse_register().map(Item::Register),
            Tok::Const => {
                self.bump();
                let decl = self.parse_var_tail(true)?;
                Ok(Item::Const(decl))
            }
            _ if self.looks_like_type_start() => self.parse_function_or_global(false),
            _ => Err(self.err(format!("unexpected token at top level: {:?}", self.cur()))),
        }
    }

    fn parse_scope(&mut self) -> PResult<ScopeDecl> {
        let span = self.cur_span();
        self.expect(&Tok::Scope)?;
        let name = self.eat_ident()?;
        self.expect(&Tok::LBrace)?;
        let mut members = Vec::new();
        while !matches!(self.cur(), Tok::RBrace) {
            let is_public = if matches!(self.cur(), Tok::Public) {
                self.bump();
                true
            } else {
                false
            };
            let item = match self.cur().clone() {
                Tok::Enum => self.parse_enum().map(Item::Enum)?,
                Tok::Bitmap(width) => self.parse_bitmap(width).map(Item::Bitmap)?,
                Tok::Struct => self.parse_struct().map(Item::Struct)?,
                Tok::Const => {
                    self.bump();
                    Item::Const(self.parse_var_tail(true)?)
                }
                _ => self.parse_function_or_global(true)?,
            };
            members.push(ScopeMember { is_public, item });
        }
        self.expect(&Tok::RBrace)?;
        Ok(ScopeDecl {
            name,
            members,
            span,
        })
    }

    fn parse_enum(&mut self) -> PResult<EnumDecl> {
        let span = self.cur_span();
        self.expect(&Tok::Enum)?;
        let name = self.eat_ident()?;
        self.expect(&Tok::LBrace)?;
        let mut members = Vec::new();
        while !matches!(self.cur(), Tok::RBrace) {
            let mspan = self.cur_span();
            let mname = self.eat_ident()?;
            let explicit_value = if matches!(self.cur(), Tok::Arrow) {
                self.bump();
                Some(self.parse_int_literal()?)
            } else {
                None
            };
            members.push(EnumMember {
                name: mname,
                explicit_value,
                span: mspan,
            });
            if matches!(self.cur(), Tok::Comma) {
                self.bump();
            }
        }
        self.expect(&Tok::RBrace)?;
        Ok(EnumDecl {
            name,
            members,
            span,
        })
    }

    fn parse_int_literal(&mut self) -> PResult<i64> {
        match self.bump() {
            Tok::Int(v) => Ok(v),
            Tok::Minus => match self.bump() {
                Tok::Int(v) => Ok(-v),
                other => Err(ParseError {
                    message: format!("expected integer literal, found {:?}", other),
                    span: self.cur_span(),
                }),
            },
            other => Err(ParseError {
                message: format!("expected integer literal, found {:?}", other),
                span: self.cur_span(),
            }),
        }
    }

    fn parse_bitmap(&mut self, width: u32) -> PResult<BitmapDecl> {
        let span = self.cur_span();
        self.bump(); // Bitmap(width)
        let name = self.eat_ident()?;
        self.expect(&Tok::LBrace)?;
        let mut fields = Vec::new();
        while !matches!(self.cur(), Tok::RBrace) {
            let fspan = self.cur_span();
            let fname = self.eat_ident()?;
            let bits = if matches!(self.cur(), Tok::LBracket) {
                self.bump();
                let n = self.parse_int_literal()? as u32;
                self.expect(&Tok::RBracket)?;
                n
            } else {
                1
            };
            fields.push(BitmapField {
                name: fname,
                bits,
                span: fspan,
            });
            if matches!(self.cur(), Tok::Comma) {
                self.bump();
            }
        }
        self.expect(&Tok::RBrace)?;
        Ok(BitmapDecl {
            name,
            width,
            fields,
            span,
        })
    }

    fn parse_struct(&mut self) -> PResult<StructDecl> {
        let span = self.cur_span();
        self.expect(&Tok::Struct)?;
        let name = self.eat_ident()?;
        self.expect(&Tok::LBrace)?;
        let mut fields = Vec::new();
        while !matches!(self.cur(), Tok::RBrace) {
            let fspan = self.cur_span();
            let ty = self.parse_type_ref()?;
            let fname = self.eat_ident()?;
            let array_dims = self.parse_array_dims()?;
            self.expect(&Tok::Semi)?;
            fields.push(StructField {
                name: fname,
                ty,
                array_dims,
                span: fspan,
            });
        }
        self.expect(&Tok::RBrace)?;
        Ok(StructDecl {
            name,
            fields,
            span,
        })
    }

    fn parse_register(&mut self) -> PResult<RegisterDecl> {
        let span = self.cur_span();
        self.expect(&Tok::Register)?;
        let ty = self.parse_type_ref()?;
        let name = self.eat_ident()?;
        self.expect(&Tok::At)?;
        let address = match self.bump() {
            Tok::Int(v) => v as u64,
            other => {
                return Err(ParseError {
                    message: format!("expected register address, found {:?}", other),
                    span: self.cur_span(),
                })
            }
        };
        self.expect(&Tok::Semi)?;
        Ok(RegisterDecl {
            name,
            ty,
            address,
            span,
        })
    }

    fn parse_type_ref(&mut self) -> PResult<TypeRef> {
        match self.bump() {
            Tok::Void => Ok(TypeRef::new("void")),
            Tok::This => {
                self.expect(&Tok::Dot)?;
                let name = self.eat_ident()?;
                Ok(TypeRef::new(format!("this.{name}")))
            }
            Tok::Ident(name) => {
                if matches!(self.cur(), Tok::Dot) {
                    // qualified scope type e.g. Scope.Type — keep dotted text.
                    let mut full = name;
                    while matches!(self.cur(), Tok::Dot) {
                        self.bump();
                        let part = self.eat_ident()?;
                        full.push('.');
                        full.push_str(&part);
                    }
                    Ok(TypeRef::new(full))
                } else {
                    Ok(TypeRef::new(name))
                }
            }
            other => Err(ParseError {
                message: format!("expected type, found {:?}", other),
                span: self.cur_span(),
            }),
        }
    }

    fn parse_array_dims(&mut self) -> PResult<Vec<ArrayDim>> {
        let mut dims = Vec::new();
        while matches!(self.cur(), Tok::LBracket) {
            self.bump();
            if matches!(self.cur(), Tok::RBracket) {
                // inferred dimension e.g. `VALUES[]`; resolved from the initializer.
                dims.push(ArrayDim::Literal(0));
            } else {
                match self.bump() {
                    Tok::Int(v) => dims.push(ArrayDim::Literal(v as u64)),
                    Tok::Ident(n) => dims.push(ArrayDim::Name(n)),
                    other => {
                        return Err(ParseError {
                            message: format!("expected array dimension, found {:?}", other),
                            span: self.cur_span(),
                        })
                    }
                }
            }
            self.expect(&Tok::RBracket)?;
        }
        Ok(dims)
    }

    /// Parses the `TYPE NAME <- init;` or `TYPE NAME arraydims <- init;` tail
    /// shared by `const` declarations and struct-less global variables.
    fn parse_var_tail(&mut self, is_const: bool) -> PResult<VarDecl> {
        let span = self.cur_span();
        let ty = self.parse_type_ref()?;
        let name = self.eat_ident()?;
        let array_dims = self.parse_array_dims()?;
        let initializer = if matches!(self.cur(), Tok::Arrow) {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&Tok::Semi)?;
        Ok(VarDecl {
            name,
            ty,
            is_const,
            array_dims,
            initializer,
            span,
        })
    }

    fn parse_function_or_global(&mut self, in_scope: bool) -> PResult<Item> {
        let span = self.cur_span();
        let is_public = if in_scope && matches!(self.cur(), Tok::Public) {
            self.bump();
            true
        } else {
            false
        };
        let ty = self.parse_type_ref()?;
        let name = self.eat_ident()?;
        if matches!(self.cur(), Tok::LParen) {
            self.bump();
            let mut params = Vec::new();
            while !matches!(self.cur(), Tok::RParen) {
                let pspan = self.cur_span();
                let is_const = if matches!(self.cur(), Tok::Const) {
                    self.bump();
                    true
                } else {
                    false
                };
                let pty = self.parse_type_ref()?;
                let pname = self.eat_ident()?;
                let is_array = matches!(self.cur(), Tok::LBracket);
                if is_array {
                    self.parse_array_dims()?;
                }
                params.push(Param {
                    name: pname,
                    ty: pty,
                    is_const,
                    is_array,
                    span: pspan,
                });
                if matches!(self.cur(), Tok::Comma) {
                    self.bump();
                }
            }
            self.expect(&Tok::RParen)?;
            let body = self.parse_block()?;
            Ok(Item::Function(FunctionDecl {
                name,
                is_public,
                params,
                return_type: ty,
                body,
                span,
            }))
        } else {
            let array_dims = self.parse_array_dims()?;
            let initializer = if matches!(self.cur(), Tok::Arrow) {
                self.bump();
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(&Tok::Semi)?;
            Ok(Item::GlobalVar(VarDecl {
                name,
                ty,
                is_const: false,
                array_dims,
                initializer,
                span,
            }))
        }
    }

    // ---- statements ----

    fn parse_block(&mut self) -> PResult<Block> {
        self.expect(&Tok::LBrace)?;
        let mut stmts = Vec::new();
        while !matches!(self.cur(), Tok::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&Tok::RBrace)?;
        Ok(Block { stmts })
    }

    fn is_type_start_for_decl(&self) -> bool {
        if let Tok::Ident(name) = self.cur() {
            if BUILTIN_TYPES.contains(&name.as_str()) {
                return true;
            }
            // Heuristic: `Ident Ident` is a local declaration of a named
            // (struct/enum/scope) type; `Ident <op>` is an expression.
            if let Tok::Ident(_) = &self.toks.get(self.pos + 1).map(|t| &t.tok).unwrap_or(&Tok::Eof) {
                return true;
            }
            false
        } else {
            matches!(self.cur(), Tok::Void)
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let span = self.cur_span();
        let kind = match self.cur().clone() {
            Tok::Critical => {
                self.bump();
                StmtKind::Critical(self.parse_block()?)
            }
            Tok::Atomic => {
                self.bump();
                StmtKind::Atomic(self.parse_block()?)
            }
            Tok::LBrace => StmtKind::Block(self.parse_block()?),
            Tok::If => {
                self.bump();
                self.expect(&Tok::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                let then_branch = self.parse_block()?;
                let else_branch = if matches!(self.cur(), Tok::Else) {
                    self.bump();
                    Some(self.parse_block()?)
                } else {
                    None
                };
                return Ok(Stmt {
                    kind: StmtKind::If(IfStmt {
                        cond,
                        then_branch,
                        else_branch,
                        span,
                    }),
                    span,
                });
            }
            Tok::While => {
                self.bump();
                self.expect(&Tok::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                let body = self.parse_block()?;
                StmtKind::While(WhileStmt { cond, body, span })
            }
            Tok::Do => {
                self.bump();
                let body = self.parse_block()?;
                self.expect(&Tok::While)?;
                self.expect(&Tok::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                self.expect(&Tok::Semi)?;
                StmtKind::DoWhile(DoWhileStmt { body, cond, span })
            }
            Tok::For => {
                self.bump();
                self.expect(&Tok::LParen)?;
                let init = if matches!(self.cur(), Tok::Semi) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_stmt()?))
                };
                self.expect(&Tok::Semi)?;
                let cond = if matches!(self.cur(), Tok::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Tok::Semi)?;
                let step = if matches!(self.cur(), Tok::RParen) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_stmt_no_semi()?))
                };
                self.expect(&Tok::RParen)?;
                let body = self.parse_block()?;
                StmtKind::For(ForStmt {
                    init,
                    cond,
                    step,
                    body,
                    span,
                })
            }
            Tok::Switch => {
                self.bump();
                self.expect(&Tok::LParen)?;
                let scrutinee = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                self.expect(&Tok::LBrace)?;
                let mut cases = Vec::new();
                let mut default = None;
                while !matches!(self.cur(), Tok::RBrace) {
                    if matches!(self.cur(), Tok::Default) {
                        self.bump();
                        let count = if matches!(self.cur(), Tok::LParen) {
                            self.bump();
                            let n = self.parse_int_literal()? as u32;
                            self.expect(&Tok::RParen)?;
                            Some(n)
                        } else {
                            None
                        };
                        let body = self.parse_block()?;
                        default = Some((body, count));
                    } else {
                        let value = self.parse_expr()?;
                        let body = self.parse_block()?;
                        cases.push(SwitchCase { value, body });
                    }
                }
                self.expect(&Tok::RBrace)?;
                StmtKind::Switch(SwitchStmt {
                    scrutinee,
                    cases,
                    default,
                    span,
                })
            }
            Tok::Return => {
                self.bump();
                let value = if matches!(self.cur(), Tok::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Tok::Semi)?;
                StmtKind::Return(value)
            }
            Tok::Break => {
                self.bump();
                self.expect(&Tok::Semi)?;
                StmtKind::Break
            }
            _ => {
                let s = self.parse_simple_stmt()?;
                return Ok(s);
            }
        };
        Ok(Stmt { kind, span })
    }

    /// A declaration or assignment/expression statement, consuming the
    /// trailing `;`.
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let s = self.parse_simple_stmt_no_semi()?;
        self.expect(&Tok::Semi)?;
        Ok(s)
    }

    fn parse_simple_stmt_no_semi(&mut self) -> PResult<Stmt> {
        let span = self.cur_span();
        if self.is_type_start_for_decl() {
            let ty = self.parse_type_ref()?;
            let name = self.eat_ident()?;
            let array_dims = self.parse_array_dims()?;
            let initializer = if matches!(self.cur(), Tok::Arrow) {
                self.bump();
                Some(self.parse_expr()?)
            } else {
                None
            };
            return Ok(Stmt {
                kind: StmtKind::VarDecl(VarDecl {
                    name,
                    ty,
                    is_const: false,
                    array_dims,
                    initializer,
                    span,
                }),
                span,
            });
        }
        let target = self.parse_expr()?;
        if let Some(op) = self.assign_op_ahead() {
            self.bump();
            let value = self.parse_expr()?;
            return Ok(Stmt {
                kind: StmtKind::Assign(AssignStmt {
                    target,
                    op,
                    value,
                    span,
                }),
                span,
            });
        }
        Ok(Stmt {
            kind: StmtKind::Expr(target),
            span,
        })
    }

    fn assign_op_ahead(&self) -> Option<AssignOp> {
        match self.cur() {
            Tok::Arrow => Some(AssignOp::Simple),
            Tok::CompoundArrow(op) => Some(*op),
            _ => None,
        }
    }

    // ---- expressions (precedence climbing) ----

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let cond = self.parse_or()?;
        if matches!(self.cur(), Tok::Question) {
            self.bump();
            let then_e = self.parse_ternary()?;
            self.expect(&Tok::Colon)?;
            let else_e = self.parse_ternary()?;
            return Ok(Expr::new(
                ExprKind::Ternary(Box::new(cond), Box::new(then_e), Box::new(else_e)),
                span,
            ));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_and()?;
        while matches!(self.cur(), Tok::PipePipe) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_bitor()?;
        while matches!(self.cur(), Tok::AmpAmp) {
            self.bump();
            let rhs = self.parse_bitor()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::And, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_bitxor()?;
        while matches!(self.cur(), Tok::Pipe) {
            self.bump();
            let rhs = self.parse_bitxor()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::BitOr, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_bitand()?;
        while matches!(self.cur(), Tok::Caret) {
            self.bump();
            let rhs = self.parse_bitand()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::BitXor, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_equality()?;
        while matches!(self.cur(), Tok::Amp) {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::new(ExprKind::Binary(BinOp::BitAnd, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.cur() {
                Tok::EqEq => BinOp::Eq,
                Tok::Ne => BinOp::Ne,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.cur() {
                Tok::Lt => BinOp::Lt,
                Tok::Le => BinOp::Le,
                Tok::Gt => BinOp::Gt,
                Tok::Ge => BinOp::Ge,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_shift()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.cur() {
                Tok::Shl => BinOp::Shl,
                Tok::Shr => BinOp::Shr,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.cur() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.cur() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        match self.cur() {
            Tok::Minus => {
                self.bump();
                let e = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Neg, Box::new(e)), span))
            }
            Tok::Bang => {
                self.bump();
                let e = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::Not, Box::new(e)), span))
            }
            Tok::Tilde => {
                self.bump();
                let e = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnaryOp::BitNot, Box::new(e)), span))
            }
            Tok::Amp => {
                self.bump();
                let e = self.parse_unary()?;
                Ok(Expr::new(ExprKind::AddressOf(Box::new(e)), span))
            }
            Tok::SizeOf => {
                self.bump();
                self.expect(&Tok::LParen)?;
                let e = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(Expr::new(ExprKind::SizeOf(Box::new(e)), span))
            }
            Tok::LParen => {
                // Disambiguate a cast `(T)expr` from a parenthesized expr by
                // checking whether the parenthesized content is a single
                // type-looking identifier followed directly by `)`.
                if let Tok::Ident(name) = &self.toks.get(self.pos + 1).map(|t| t.tok.clone()).unwrap_or(Tok::Eof) {
                    if matches!(self.toks.get(self.pos + 2).map(|t| &t.tok), Some(Tok::RParen))
                        && BUILTIN_TYPES.contains(&name.as_str())
                    {
                        let ty = TypeRef::new(name.clone());
                        self.bump(); // (
                        self.bump(); // ident
                        self.bump(); // )
                        let e = self.parse_unary()?;
                        return Ok(Expr::new(ExprKind::Cast(ty, Box::new(e)), span));
                    }
                }
                self.parse_postfix()
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        let mut e = self.parse_primary()?;
        loop {
            match self.cur() {
                Tok::Dot => {
                    self.bump();
                    let name = self.eat_ident()?;
                    e = Expr::new(ExprKind::Member(Box::new(e), name), span);
                }
                Tok::LBracket => {
                    self.bump();
                    let first = self.parse_expr()?;
                    if matches!(self.cur(), Tok::Comma) {
                        self.bump();
                        let width = self.parse_expr()?;
                        self.expect(&Tok::RBracket)?;
                        e = Expr::new(
                            ExprKind::BitRange(Box::new(e), Box::new(first), Box::new(width)),
                            span,
                        );
                    } else {
                        self.expect(&Tok::RBracket)?;
                        e = Expr::new(ExprKind::Index(Box::new(e), Box::new(first)), span);
                    }
                }
                Tok::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    while !matches!(self.cur(), Tok::RParen) {
                        args.push(self.parse_expr()?);
                        if matches!(self.cur(), Tok::Comma) {
                            self.bump();
                        }
                    }
                    self.expect(&Tok::RParen)?;
                    e = Expr::new(ExprKind::Call(Box::new(e), args), span);
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.cur_span();
        match self.bump() {
            Tok::Int(v) => Ok(Expr::new(ExprKind::IntLiteral(v), span)),
            Tok::Float(v) => Ok(Expr::new(ExprKind::FloatLiteral(v), span)),
            Tok::Str(s) => Ok(Expr::new(ExprKind::StringLiteral(s), span)),
            Tok::True => Ok(Expr::new(ExprKind::BoolLiteral(true), span)),
            Tok::False => Ok(Expr::new(ExprKind::BoolLiteral(false), span)),
            Tok::This => Ok(Expr::new(ExprKind::Ident("this".to_string()), span)),
            Tok::Global => Ok(Expr::new(ExprKind::Ident("global".to_string()), span)),
            Tok::Ident(name) => {
                if matches!(self.cur(), Tok::ColonColon) {
                    let mut parts = vec![name];
                    while matches!(self.cur(), Tok::ColonColon) {
                        self.bump();
                        parts.push(self.eat_ident()?);
                    }
                    Ok(Expr::new(ExprKind::ScopeQualified(parts), span))
                } else {
                    Ok(Expr::new(ExprKind::Ident(name), span))
                }
            }
            Tok::LBracket => {
                let mut elems = Vec::new();
                while !matches!(self.cur(), Tok::RBracket) {
                    elems.push(self.parse_expr()?);
                    if matches!(self.cur(), Tok::Comma) {
                        self.bump();
                    }
                }
                self.expect(&Tok::RBracket)?;
                Ok(Expr::new(ExprKind::ArrayLiteral(elems), span))
            }
            Tok::LParen => {
                let e = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(e)
            }
            other => Err(ParseError {
                message: format!("unexpected token in expression: {:?}", other),
                span,
            }),
        }
    }
}
