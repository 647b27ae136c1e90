use arch::{
    bus::{Bus, Image},
    disasm::disassemble,
    header::{parse_header, Scope},
};
use fasm::{error::RangeKind, token::TokenKind, Assembler, Error};

fn assemble(source: &str) -> (Assembler, Image) {
    let mut asm = Assembler::new("test.fasm", source);
    let mut image = Image::new();
    let _ = asm.assemble(&mut image);
    (asm, image)
}

fn range_error(asm: &Assembler) -> Option<(RangeKind, i32)> {
    asm.diagnostics().iter().find_map(|d| match d.error {
        Error::Range(kind, v) => Some((kind, v)),
        _ => None,
    })
}

macro_rules! range {
    ($($name:ident: $op:expr, $kind:expr, $lo:expr, $hi:expr,)*) => {
        $(
            #[test]
            fn $name() {
                for v in [$lo, $hi] {
                    let (asm, _) = assemble(&format!("{} {}\n", $op, v));
                    assert!(asm.diagnostics().is_empty(), "{} {}", $op, v);
                }
                for v in [$lo - 1, $hi + 1] {
                    let (asm, image) = assemble(&format!("NOP\n{} {}\n", $op, v));
                    assert!(asm.phase3_error());
                    assert_eq!(range_error(&asm), Some(($kind, v)));
                    assert!(matches!(asm.tokens()[1].kind, TokenKind::Error(_)));
                    assert_eq!(image.get(2), Ok(0));
                }
            }
        )*
    }
}

range! {
    range_tiny_signed: "ADDI A,", RangeKind::TinySigned, -8, 7,
    range_tiny_unsigned: "SLI A,", RangeKind::TinyUnsigned, 0, 15,
    range_byte_signed: "MOVAI", RangeKind::ByteSigned, -128, 127,
    range_byte_unsigned: "SYSCALL", RangeKind::ByteUnsigned, 0, 255,
    range_word: "MOVIL A,", RangeKind::Word, -32768, 65535,
}

#[test]
fn relative_branch_distance() {
    for op in ["JR", "CALLR"] {
        let source = format!("{op} AHEAD\nNOP\nNOP\nNOP\nNOP\nAHEAD: HALT\n");
        let (asm, image) = assemble(&source);
        assert!(asm.diagnostics().is_empty());
        assert_eq!(asm.symbol_value("AHEAD").unwrap(), 10);
        assert_eq!(image.get(0).unwrap() & 0x00FF, 4);
    }
}

#[test]
fn redefinition_keeps_first() {
    let mut asm = Assembler::new("test.fasm", "#FOO: 1\n#FOO: 2\n");
    asm.pass1().unwrap();
    assert!(asm.phase1_error());
    let redefined: Vec<_> = asm
        .diagnostics()
        .iter()
        .filter(|d| matches!(&d.error, Error::Redefined(name) if name == "#FOO"))
        .collect();
    assert_eq!(redefined.len(), 1);
    assert_eq!(redefined[0].pos.line, 2);
    asm.pass2().unwrap();
    assert_eq!(asm.symbol_value("#FOO").unwrap(), 1);
}

#[test]
fn pass2_is_idempotent() {
    let source = concat!(
        "#N: 6\n",
        ".ORG 0x40\n",
        "START: MOVIL SP,0x8000\n",
        ".NWORD \"DROP\"\n",
        "%BUF: #N\n",
        "$HELLO: \"hello\"\n",
        "LOOP: JR LOOP\n",
    );
    let mut asm = Assembler::new("test.fasm", source);
    asm.pass1().unwrap();
    asm.pass2().unwrap();
    let first: Vec<Option<u16>> = asm.tokens().iter().map(|t| t.address).collect();
    asm.pass2().unwrap();
    let second: Vec<Option<u16>> = asm.tokens().iter().map(|t| t.address).collect();
    assert_eq!(first, second);
    assert_eq!(asm.symbol_value("LOOP").unwrap(), 0x40 + 4 + 6 + 6 + 8);
}

#[test]
fn option_overrides_source() {
    let mut asm = Assembler::new("test.fasm", "#RAM: 0x100\nMOVIL SP,#RAM\n");
    asm.set_option("RAM", 0x2000);
    let mut image = Image::new();
    asm.assemble(&mut image).unwrap();
    assert!(asm.diagnostics().is_empty());
    assert_eq!(image.get(2), Ok(0x2000));
}

#[test]
fn option_does_not_hide_redefinition() {
    let mut asm = Assembler::new("test.fasm", "#FOO: 1\n#FOO: 2\nMOVIL A,#FOO\n");
    asm.set_option("FOO", 9);
    asm.pass1().unwrap();
    let redefined: Vec<_> = asm
        .diagnostics()
        .iter()
        .filter(|d| matches!(&d.error, Error::Redefined(name) if name == "#FOO"))
        .collect();
    assert_eq!(redefined.len(), 1);
    assert_eq!(redefined[0].pos.line, 2);
    asm.pass2().unwrap();
    assert_eq!(asm.symbol_value("#FOO").unwrap(), 9);
}

#[test]
fn emitted_data() {
    let source = concat!(
        ".STRING \"ab\"\n",
        ".IWORD \"IF\"\n",
        "$S: \"xyz\"\n",
        "%V: 3\n",
        ".DATA -1\n",
    );
    let mut image = Image::new();
    image.0[8..13].copy_from_slice(&[0xAA; 5]);
    let mut asm = Assembler::new("test.fasm", source);
    asm.assemble(&mut image).unwrap();

    assert_eq!(&image.0[0..2], b"ab");
    assert_eq!(parse_header(image.get(2).unwrap()), Some((Scope::Immediate, 2)));
    assert_eq!(&image.0[4..6], b"IF");
    assert_eq!(image.get(6), Ok(3));
    assert_eq!(&image.0[8..11], b"xyz");
    assert_eq!(&image.0[12..15], &[0, 0, 0]);
    assert_eq!(image.get(15), Ok(0xFFFF));
    assert_eq!(asm.end(), 17);
}

#[test]
fn errors_prevent_emission() {
    let (asm, image) = assemble("MOVAI 1\nADD 0 1\nJP NOWHERE\n");
    assert!(asm.phase1_error());
    assert!(asm.phase3_error());
    assert_eq!(image.get(0), Ok(0));
}

const ALL_OPCODES: &str = "
    NOP
    MOV 0,A
    MOVI 1,-8
    MOVIL SP,0x8000
    MOVAI -128
    MOVBI 127
    LD A,B
    LD_B 2,I
    LDAX 3,7
    LDBX WA,-1
    LDAX_B CA,2
    LDBX_B RS,-3
    STI 4,5
    STAI 'x'
    STBI -1
    STIL B,0xFFFF
    ST 5,6
    ST_B 6,7
    STI_B 7,-8
    STAI_B 100
    STBI_B -100
    STXA SP,1
    STXB RS,-1
    STXA_B I,3
    STXB_B WA,-4
    PUSHD A
    PUSHR B
    POPD I
    POPR CA
    ADD 0,1
    ADDI 2,-2
    ADDAI 10
    ADDBI -10
    ADDIL A,0x1234
    SUB 3,4
    SUBI 5,7
    SUBAI 1
    SUBBI 2
    SUBIL B,0x0010
    MUL A,B
    DIV B,A
    AND 0,7
    OR 1,6
    NOT 2
    XOR 3,5
    SL A,0
    SR A,1
    RR A,2
    RRC A,3
    RL A,4
    RLC A,5
    BIT A,6
    SET A,7
    CLR B,0
    SLI A,15
    SRI A,0
    RRI A,1
    RRCI A,2
    RLI A,3
    RLCI A,4
    BITI B,5
    SETI B,6
    CLRI B,7
    CMP A,B
    CMPI A,3
    CMPAI -5
    CMPBI 5
    CMPIL A,0xABCD
    RET
    SYSCALL 255
    HALT
    BRK
    JP 0x0000
    JP[C] 0x0002
    JR -4
    JR[NZ] 3
    JX WA,0
    JX[M] A,-2
    JXL I,0x0100
    JXL[NP] I,0x0200
    CALL 0x0400
    CALL[Z] 0x0402
    CALLR 5
    CALLR[NC] -6
    CALLX CA,1
    CALLX[P] CA,-1
    CALLXL WA,0x0004
    CALLXL[NM] WA,0x0006
";

#[test]
fn round_trip_every_opcode() {
    let mut first = Assembler::new("all.fasm", ALL_OPCODES);
    let mut image = Image::new();
    first.assemble(&mut image).unwrap();
    let end = first.end() as u16;

    let cells = disassemble(&image, 0, end).unwrap();
    let source: Vec<String> = cells.iter().map(|c| c.format()).collect();
    assert!(source.iter().all(|line| !line.starts_with(".DATA")));

    let count = ALL_OPCODES.lines().filter(|l| !l.trim().is_empty()).count();
    assert_eq!(source.len(), count);

    let mut second = Assembler::new("again.fasm", &source.join("\n"));
    let mut again = Image::new();
    second.assemble(&mut again).unwrap();
    assert_eq!(second.end(), first.end());
    assert_eq!(image.bytes(first.end()), again.bytes(second.end()));
}
