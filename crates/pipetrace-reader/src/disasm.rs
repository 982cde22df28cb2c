//! Instruction decoding through an external disassembler.

use log::debug;
use pipetrace_core::{Error, Result};
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};

/// Turns a raw instruction word into mnemonic text.
pub trait Disassembler {
    fn disassemble(&self, word: u64) -> Result<String>;
}

/// Disassembler backed by `spike-dasm`.
///
/// The tool reads lines on stdin and replaces every `DASM(0x...)` token with
/// the decoded instruction, so each call spawns one process and feeds it a
/// single token.
#[derive(Debug, Clone)]
pub struct SpikeDasm {
    program: String,
}

impl SpikeDasm {
    pub const DEFAULT_PROGRAM: &'static str = "spike-dasm";

    pub fn new() -> Self {
        Self::with_program(Self::DEFAULT_PROGRAM)
    }

    /// Use a different executable, e.g. a spike-dasm outside `PATH`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for SpikeDasm {
    fn default() -> Self {
        Self::new()
    }
}

impl Disassembler for SpikeDasm {
    fn disassemble(&self, word: u64) -> Result<String> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Disassembler(format!("failed to run {}: {}", self.program, e)))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::Disassembler("stdin of disassembler not captured".into()))?;
            writeln!(stdin, "DASM({:#x})", word).map_err(|e| {
                Error::Disassembler(format!("failed to write to {}: {}", self.program, e))
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Disassembler(format!("failed to wait for {}: {}", self.program, e)))?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Disassembler(format!(
                "{} exited with code {} decoding {:#x}: {}",
                self.program,
                code,
                word,
                stderr.trim()
            )));
        }

        let text = String::from_utf8(output.stdout).map_err(|e| {
            Error::Disassembler(format!("{} produced non UTF-8 output: {}", self.program, e))
        })?;
        let asm = text.trim();
        if asm.is_empty() {
            return Err(Error::Disassembler(format!(
                "{} produced no output for {:#x}",
                self.program, word
            )));
        }
        Ok(asm.to_string())
    }
}

/// Memoizing front of a `Disassembler`.
///
/// Decoding is a pure function of the word, so entries never go stale and
/// the cache lives as long as the reader that owns it.
pub struct DisasmCache<D> {
    inner: D,
    cache: HashMap<u64, String>,
}

impl<D: Disassembler> DisasmCache<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
        }
    }

    /// Decode `word`, invoking the wrapped disassembler only on first sight.
    pub fn lookup(&mut self, word: u64) -> Result<&str> {
        if !self.cache.contains_key(&word) {
            debug!("disassembling {:#x}", word);
            let asm = self.inner.disassemble(word)?;
            self.cache.insert(word, asm);
        }
        Ok(self.cache[&word].as_str())
    }

    /// Number of distinct words decoded so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}
