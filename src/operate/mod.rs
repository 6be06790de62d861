//! The command interpreter.
//!
//! A line is split on `$` into tokens, constants are resolved once, and the
//! tokens are loaded onto the action stack with the last token on top.
//! Execution repeatedly pops the top token: literals move to the value
//! stack, dictionary words run. Every word reports whether the scan goes
//! on ([`Flow::Next`]) or the line is finished ([`Flow::Stop`]); a word
//! that fails aborts the rest of the line and nothing else.

mod console;
mod context;
mod words;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use crate::{
    TransferId,
    alloc::{FIRST_TRANSFER_ID, IdAllocator},
    consts::{CLOSE_BRACKET, DELIMITER, OPEN_BRACKET, SELF_REFERENCE},
    error::Error,
    package::{Kind, Package},
    staging::{Origin, Staging},
};

pub use console::{Console, Stdout};
pub use context::Binding;
pub(crate) use context::Context;

#[cfg(test)]
pub(crate) use console::capture::Capture;

pub(crate) use words::Word;

/// Whether the scan resumes after a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    Stop,
}

/// Filesystem locations the interpreter works with.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory `run` resolves script names against.
    pub script_dir: PathBuf,
    /// Directory incoming file chunks are staged in.
    pub staging_dir: PathBuf,
}

pub struct Operate {
    words: HashMap<&'static str, Word>,
    script_dir: PathBuf,
    staging: Staging,
    transfer_ids: IdAllocator,
    console: Arc<dyn Console>,
}

impl Operate {
    pub fn new(settings: Settings, console: Arc<dyn Console>) -> Result<Self, Error> {
        Ok(Self {
            words: words::dictionary(),
            script_dir: settings.script_dir,
            staging: Staging::open(settings.staging_dir)?,
            transfer_ids: IdAllocator::new(FIRST_TRANSFER_ID),
            console,
        })
    }

    /// Handles one received package: chunks go to staging, commands run.
    pub fn handle_package(&self, package: &Package, binding: &Binding) {
        match package.kind() {
            Kind::Command => self.process(&package.text(), Some(package), binding),
            Kind::Chunk => match self.staging.accept(binding.origin(), package) {
                Ok(Some(path)) => log::info!("transfer staged at {}", path.display()),
                Ok(None) => {}
                Err(e) => self.console.print_line(&format!("staging failed: {e}")),
            },
        }
    }

    /// Forgets unfinished transfers from a connection that went away.
    pub fn abandon(&self, origin: Origin) {
        let dropped = self.staging.abandon(origin);
        if dropped > 0 {
            log::info!("dropped {dropped} unfinished transfer(s) from origin {origin}");
        }
    }

    /// Runs one command line.
    pub fn process(&self, line: &str, package: Option<&Package>, binding: &Binding) {
        self.interpret(line, package, binding);
    }

    // Runs `line` and returns what is left on the value stack.
    pub(crate) fn interpret(
        &self,
        line: &str,
        package: Option<&Package>,
        binding: &Binding,
    ) -> Vec<String> {
        let tokens = resolve_constants(tokenize(line), &binding.hostname());
        let mut ctx = Context::new(tokens, package, binding);
        self.execute(&mut ctx);
        ctx.values
    }

    fn execute(&self, ctx: &mut Context<'_>) {
        while let Some(token) = ctx.actions.pop() {
            let Some(word) = self.words.get(token.as_str()) else {
                ctx.values.push(token);
                continue;
            };
            match word(self, ctx) {
                Ok(Flow::Next) => {}
                Ok(Flow::Stop) => return,
                Err(e) => {
                    log::debug!("`{token}` aborted the line: {e}");
                    return;
                }
            }
        }
    }

    pub(crate) fn next_transfer_id(&self) -> TransferId {
        self.transfer_ids.allocate()
    }
}

/// Splits a command line into tokens, dropping empty ones.
pub fn tokenize(line: &str) -> Vec<String> {
    line.trim_end_matches(['\r', '\n'])
        .split(DELIMITER)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

// Strips the outermost `[` `]` pair of every literal block and replaces `this`
// outside any block with `hostname`. Nested markers stay as literal tokens,
// and so does a `]` with no open block.
pub(crate) fn resolve_constants(tokens: Vec<String>, hostname: &str) -> Vec<String> {
    let mut level = 0usize;
    let mut resolved = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token.as_str() {
            OPEN_BRACKET => {
                level += 1;
                if level == 1 {
                    continue;
                }
            }
            CLOSE_BRACKET if level > 0 => {
                level -= 1;
                if level == 0 {
                    continue;
                }
            }
            SELF_REFERENCE if level == 0 => {
                resolved.push(hostname.to_string());
                continue;
            }
            _ => {}
        }
        resolved.push(token);
    }
    resolved
}

/// Registration line a peer sends so the hub learns its hostname.
pub fn registration(hostname: &str) -> Package {
    Package::command(&format!("reg{DELIMITER}{hostname}"))
}
