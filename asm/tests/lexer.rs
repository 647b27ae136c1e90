use arch::{
    cond::{Cc, Cond},
    header::Scope,
    op::Op,
    reg::Reg,
};
use fasm::lexer::{self, Lexer, LineLexer};
use fasm::token::{Code, Directive, Operand, TokenKind, TokenKind::*};
use indexmap::IndexMap;

fn first(code: &str) -> TokenKind {
    let aliases = IndexMap::new();
    let tokens = LineLexer::new(code, 1, &aliases).parse();
    tokens[0].kind.clone()
}

fn assert(code: &str, expect: TokenKind) {
    assert_eq!(first(code), expect);
}

fn error(msg: &str) -> TokenKind {
    Error(msg.to_string())
}

fn code(op: Op, a: Reg, b: Reg, imm: Operand, cond: Option<Cond>) -> TokenKind {
    Opcode(Code {
        op,
        cond,
        a,
        b,
        imm,
    })
}

fn sym(name: &str) -> Operand {
    Operand::Symbol(name.to_string())
}

macro_rules! case {
    ($name:ident, $code:expr, $expect:expr) => {
        #[test]
        fn $name() {
            assert($code, $expect);
        }
    };
}

use Operand::Value as V;
use Reg::*;

// ---- Definitions ----
case!(label, "START:", Label("START".into()));
case!(constant, "#SIZE: 64", Const("#SIZE".into(), 64));
case!(constant_hex, "#TOP: 0xFFFE", Const("#TOP".into(), 0xFFFE));
case!(constant_neg, "#M: -12", Const("#M".into(), -12));
case!(constant_bin, "#B: 0b1010", Const("#B".into(), 10));
case!(constant_char, "#CR: '\\r'", Const("#CR".into(), 13));
case!(constant_quote, "#Q: '\\''", Const("#Q".into(), 39));
case!(variable, "%BUF: 80", Var("%BUF".into(), V(80)));
case!(variable_const, "%BUF: #SIZE", Var("%BUF".into(), sym("#SIZE")));
case!(string, "$MSG: \"hi\\n\"", Str("$MSG".into(), "hi\n".into()));
case!(comment, "; hello world", Comment("hello world".into()));

// ---- Directives ----
case!(org, ".ORG 0x100", TokenKind::Directive(Directive::Org(V(256))));
case!(org_const, ".org #BASE", TokenKind::Directive(Directive::Org(sym("#BASE"))));
case!(data, ".DATA -1", TokenKind::Directive(Directive::Data(V(-1))));
case!(alias, ".ALIAS 3, TOS", TokenKind::Directive(Directive::Alias(R3, "TOS".into())));
case!(text, ".STRING \"ok\"", TokenKind::Directive(Directive::Text("ok".into())));
case!(nword, ".NWORD \"DUP\"", TokenKind::Directive(Directive::Header(Scope::Normal, "DUP".into())));
case!(xword, ".XWORD \";\"", TokenKind::Directive(Directive::Header(Scope::Executive, ";".into())));

// ---- Opcodes ----
case!(op_rr, "ADD 0,1", code(Op::ADD, R0, R1, V(0), None));
case!(op_rr_spaces, "mov  A , SP", code(Op::MOV, A, SP, V(0), None));
case!(op_ri4, "ADDI B,-2", code(Op::ADDI, B, R0, V(-2), None));
case!(op_rui4, "SLI A,15", code(Op::SLI, A, R0, V(15), None));
case!(op_i8, "MOVAI 'A'", code(Op::MOVAI, R0, R0, V(65), None));
case!(op_u8, "SYSCALL 8", code(Op::SYSCALL, R0, R0, V(8), None));
case!(op_ri, "MOVIL SP,#STACK", code(Op::MOVIL, SP, R0, sym("#STACK"), None));
case!(op_il, "JP NEXT", code(Op::JP, R0, R0, sym("NEXT"), None));
case!(op_r, "PUSHD WA", code(Op::PUSHD, WA, R0, V(0), None));
case!(op_nil, "RET", code(Op::RET, R0, R0, V(0), None));
case!(op_cond, "JR[NZ] LOOP", code(Op::JR, R0, R0, sym("LOOP"), Some(Cond::new(Cc::Z, true))));
case!(op_cond_call, "CALL[C] $S", code(Op::CALL, R0, R0, sym("$S"), Some(Cond::new(Cc::C, false))));

// ---- Errors ----
case!(err_opcode, "FOO 1", error(lexer::OPCODE_EXPECTED));
case!(err_cond_general, "ADD[Z] 0,1", error(lexer::INVALID_CONDITION));
case!(err_cond_name, "JP[Q] 0", error(lexer::INVALID_CONDITION));
case!(err_comma, "ADD 0 1", error(lexer::COMMA_EXPECTED));
case!(err_register, "ADD 0,X", error(lexer::REGISTER_NAME_EXPECTED));
case!(err_operand, "JP @", error(lexer::NUMBER_OR_LABEL_EXPECTED));
case!(err_hex, "#X: 0x12345", error(lexer::HEX_NUMBER_EXPECTED));
case!(err_hex_term, "#X: 0x12G", error(lexer::HEX_NUMBER_EXPECTED));
case!(err_bin, "#X: 0b102", error(lexer::BINARY_NUMBER_EXPECTED));
case!(err_dec, "#X: 123456", error(lexer::DECIMAL_NUMBER_EXPECTED));
case!(err_dec_term, "#X: 12a", error(lexer::DECIMAL_NUMBER_EXPECTED));
case!(err_const_value, "#X: Y", error(lexer::NUMBER_EXPECTED));
case!(err_name, "#: 1", error(lexer::NAME_EXPECTED));
case!(err_var, "%V: X", error(lexer::CONSTANT_EXPECTED));
case!(err_string, "$S: \"open", error(lexer::STRING_EXPECTED));
case!(err_directive, ".FOO 1", error(lexer::DIRECTIVE_EXPECTED));
case!(err_alias, ".ALIAS 3,", error(lexer::ALIAS_EXPECTED));

#[test]
fn label_then_statement() {
    let aliases = IndexMap::new();
    let kinds: Vec<TokenKind> = LineLexer::new("L: HALT ; stop", 1, &aliases)
        .parse()
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        [
            Label("L".into()),
            code(Op::HALT, R0, R0, V(0), None),
            Comment("stop".into())
        ]
    );
}

#[test]
fn error_ends_line() {
    let source = "ADD 0 1 ; broken\nHALT\n";
    let kinds: Vec<TokenKind> = Lexer::new(source).map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        [
            error(lexer::COMMA_EXPECTED),
            code(Op::HALT, R0, R0, V(0), None),
            Eof
        ]
    );
}

#[test]
fn error_position() {
    let tokens: Vec<_> = Lexer::new("NOP\n  ADD 0,Q\n").collect();
    assert_eq!(tokens[1].kind, error(lexer::REGISTER_NAME_EXPECTED));
    assert_eq!((tokens[1].pos.line, tokens[1].pos.col), (2, 10));
}

#[test]
fn alias_applies_to_later_lines() {
    let kinds: Vec<TokenKind> = Lexer::new(".ALIAS 7,TOS\nPUSHD TOS\n")
        .map(|t| t.kind)
        .collect();
    assert_eq!(kinds[1], code(Op::PUSHD, R7, R0, V(0), None));
}

#[test]
fn numbers() {
    assert_eq!(lexer::parse_number("42"), Ok(42));
    assert_eq!(lexer::parse_number("-32768"), Ok(-32768));
    assert_eq!(lexer::parse_number("0xBEEF"), Ok(0xBEEF));
    assert_eq!(lexer::parse_number("0b1111111111111111"), Ok(0xFFFF));
    assert_eq!(lexer::parse_number("'\\n'"), Ok(10));
    assert!(lexer::parse_number("0b").is_err());
    assert!(lexer::parse_number("12,").is_err());
}
