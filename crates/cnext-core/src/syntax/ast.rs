//! The typed parse tree consumed by the collectors (C3/C4) and the
//! generator (C7). This is the "external parser" contract from the
//! perspective of the rest of the crate: nothing downstream depends on
//! anything beyond these node kinds.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Include(IncludeDirective),
    Scope(ScopeDecl),
    Enum(EnumDecl),
    Bitmap(BitmapDecl),
    Struct(StructDecl),
    Const(VarDecl),
    Function(FunctionDecl),
    Register(RegisterDecl),
    GlobalVar(VarDecl),
}

#[derive(Debug, Clone)]
pub struct IncludeDirective {
    pub path: String,
    pub is_local: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ScopeMember {
    pub is_public: bool,
    pub item: Item,
}

#[derive(Debug, Clone)]
pub struct ScopeDecl {
    pub name: String,
    pub members: Vec<ScopeMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub explicit_value: Option<i64>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BitmapField {
    pub name: String,
    /// 1 for a plain field, `k` for `name[k]`.
    pub bits: u32,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BitmapDecl {
    pub name: String,
    pub width: u32,
    pub fields: Vec<BitmapField>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayDim {
    Literal(u64),
    /// A name reference resolved later against constant symbols (C5).
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub name: String,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        TypeRef { name: name.into() }
    }
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: TypeRef,
    pub array_dims: Vec<ArrayDim>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<StructField>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: TypeRef,
    pub is_const: bool,
    pub array_dims: Vec<ArrayDim>,
    pub initializer: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub is_const: bool,
    pub is_array: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub is_public: bool,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct RegisterDecl {
    pub name: String,
    pub ty: TypeRef,
    pub address: u64,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Simple,
    Add,
    Sub,
    Mul,
    Div,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub target: Expr,
    pub op: AssignOp,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_branch: Block,
    pub else_branch: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DoWhileStmt {
    pub body: Block,
    pub cond: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub step: Option<Box<Stmt>>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub scrutinee: Expr,
    pub cases: Vec<SwitchCase>,
    /// `default { .. }` body plus an optional `default(n)` asserted count.
    pub default: Option<(Block, Option<u32>)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    VarDecl(VarDecl),
    Assign(AssignStmt),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    Switch(SwitchStmt),
    Return(Option<Expr>),
    Break,
    Expr(Expr),
    Critical(Block),
    Atomic(Block),
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Ident(String),
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    ArrayLiteral(Vec<Expr>),
    /// `a.b`, `this.b`, `global.b`, or `A.b` for a known scope `A`.
    Member(Box<Expr>, String),
    /// `A::B::C` preserved as a dotted path of a known C++ namespace.
    ScopeQualified(Vec<String>),
    Index(Box<Expr>, Box<Expr>),
    /// `x[k]` bit-index on an integer.
    BitIndex(Box<Expr>, Box<Expr>),
    /// `x[k, w]` bit-range on an integer.
    BitRange(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Cast(TypeRef, Box<Expr>),
    SizeOf(Box<Expr>),
    AddressOf(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}
