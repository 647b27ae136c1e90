pub mod alu;
pub mod bus;
pub mod cond;
pub mod disasm;
pub mod header;
pub mod inst;
pub mod op;
pub mod reg;
