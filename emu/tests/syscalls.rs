use std::cell::RefCell;
use std::rc::Rc;

use arch::{bus::Bus, reg::Reg};
use fasm::Assembler;
use femu::{
    syscalls::{self, BufferConsole},
    Memory, State, Vm,
};

fn run(source: &str, input: &str) -> (Vm, Rc<RefCell<BufferConsole>>) {
    let mut mem = Memory::default();
    let mut asm = Assembler::new("test.fasm", source);
    asm.assemble(&mut mem).unwrap();
    let mut vm = Vm::new(mem, 32);
    let console = Rc::new(RefCell::new(BufferConsole::new(input)));
    syscalls::install(&mut vm, console.clone());
    vm.reset();
    vm.set(Reg::SP, 0xF000);
    assert_eq!(vm.run(), State::Halted);
    (vm, console)
}

fn output(console: &Rc<RefCell<BufferConsole>>) -> String {
    console.borrow().output.clone()
}

#[test]
fn putc() {
    let (_, con) = run("MOVAI 'h'\nPUSHD A\nSYSCALL 5\nMOVAI 'i'\nPUSHD A\nSYSCALL 0\nHALT\n", "");
    assert_eq!(output(&con), "hi");
}

#[test]
fn type_counted_string() {
    let source = "
        MOVIL A,$MSG
        PUSHD A
        SYSCALL 1
        PUSHD A
        SYSCALL 2
        HALT
    $MSG: \"ok\"
    ";
    let (_, con) = run(source, "");
    assert_eq!(output(&con), "okok\n");
}

#[test]
fn dot_in_each_base() {
    let source = "
        MOVAI -1
        PUSHD A
        MOVAI 10
        PUSHD A
        SYSCALL 3
        MOVIL A,0xBEEF
        PUSHD A
        MOVAI 16
        PUSHD A
        SYSCALL 3
        MOVAI 5
        PUSHD A
        MOVAI 2
        PUSHD A
        SYSCALL 20
        HALT
    ";
    let (_, con) = run(source, "");
    assert_eq!(output(&con), "-10xbeef0b00000101");
}

#[test]
fn getc_until_eof() {
    let (vm, _) = run("SYSCALL 4\nSYSCALL 4\nHALT\n", "x");
    assert_eq!(vm.mem().get(0xF000), Ok(b'x' as u16));
    assert_eq!(vm.mem().get(0xEFFE), Ok(0xFFFF));
}

#[test]
fn number_parses_counted_string() {
    let source = "
        MOVIL A,$N
        PUSHD A
        MOVAI 16
        PUSHD A
        SYSCALL 8
        HALT
    $N: \"ff\"
    ";
    let (mut vm, _) = run(source, "");
    assert_eq!(vm.pop(), Ok(1));
    assert_eq!(vm.pop(), Ok(0xFF));
}

#[test]
fn number_rejects_garbage() {
    let source = "
        MOVIL A,$N
        PUSHD A
        MOVAI 10
        PUSHD A
        SYSCALL 8
        HALT
    $N: \"1z\"
    ";
    let (mut vm, _) = run(source, "");
    assert_eq!(vm.pop(), Ok(0));
    assert_eq!(vm.get(Reg::SP), 0xF000);
}

#[test]
fn inline_reads_a_line() {
    let source = "
        MOVIL A,0x4000
        PUSHD A
        SYSCALL 6
        MOVIL A,0x4000
        PUSHD A
        SYSCALL 6
        HALT
    ";
    let (mut vm, _) = run(source, "dup\n");
    assert_eq!(vm.pop(), Ok(0));
    assert_eq!(vm.pop(), Ok(1));
    assert_eq!(vm.mem().get(0x4000), Ok(0x4004));
    assert_eq!(vm.mem().get(0x4002), Ok(0x4006));
    assert_eq!(vm.mem().slice(0x4004, 3).unwrap(), b"dup");
}

#[test]
fn double_cell_arithmetic() {
    // 0x0001_FFFF + 1, each pushed low cell first
    let source = "
        MOVIL A,0xFFFF
        PUSHD A
        MOVI 0,1
        PUSHD 0
        PUSHD 0
        MOVI 1,0
        PUSHD 1
        SYSCALL 11
        HALT
    ";
    let (mut vm, _) = run(source, "");
    assert_eq!(vm.pop(), Ok(0x0002));
    assert_eq!(vm.pop(), Ok(0x0000));
    assert_eq!(vm.get(Reg::SP), 0xF000);
}

#[test]
fn double_cell_divide_by_zero() {
    let source = "
        MOVI 0,6
        MOVI 1,0
        PUSHD 0
        PUSHD 1
        PUSHD 1
        PUSHD 1
        SYSCALL 14
        HALT
    ";
    let (mut vm, _) = run(source, "");
    assert_eq!(vm.pop(), Ok(0xFFFF));
    assert_eq!(vm.pop(), Ok(0xFFFF));
}

#[test]
fn host_space() {
    let source = "
        MOVIL A,0x1234
        PUSHD A
        MOVI 0,0
        PUSHD 0
        MOVI 1,7
        PUSHD 1
        PUSHD 0
        SYSCALL 10
        PUSHD 1
        PUSHD 0
        SYSCALL 9
        MOVI 2,2
        PUSHD 2
        PUSHD 0
        SYSCALL 9
        HALT
    ";
    let (mut vm, _) = run(source, "");
    assert_eq!(vm.pop(), Ok(0));
    assert_eq!(vm.pop(), Ok(0));
    assert_eq!(vm.pop(), Ok(0));
    assert_eq!(vm.pop(), Ok(0x1234));
    assert_eq!(vm.get(Reg::SP), 0xF000);
}

#[test]
fn missing_slot_is_nop() {
    let (vm, con) = run("SYSCALL 31\nSYSCALL 200\nHALT\n", "");
    assert_eq!(vm.get(Reg::SP), 0xF000);
    assert!(output(&con).is_empty());
}
