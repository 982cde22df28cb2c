//! Control-flow instruction classification.

/// Opcodes that end a basic block: conditional branches, jumps, returns and
/// their compressed forms.
pub const BRANCH_OPCODES: &[&str] = &[
    "beq", "bne", "blt", "bge", "bltu", "bgeu", "beqz", "bnez", "j", "jal", "jalr", "ret",
    "c_beqz", "c_bnez", "c_j", "c_jal", "c_jr", "c_jalr",
];

/// Check if a mnemonic transfers control.
///
/// Only the opcode token is inspected, and it matches when it starts with one
/// of [`BRANCH_OPCODES`]. The comparison is case-sensitive.
pub fn is_branch(asm: &str) -> bool {
    asm.split_whitespace()
        .next()
        .is_some_and(|opcode| BRANCH_OPCODES.iter().any(|b| opcode.starts_with(b)))
}
