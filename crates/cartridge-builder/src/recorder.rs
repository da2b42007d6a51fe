//! Statement recorder: a stack of open statement lists.
//!
//! Every nested construct (scene hook, conditional branch, pool update)
//! opens a scope, records into it, and closes it to obtain the finished
//! block. Scopes close strictly in LIFO order.

use cartridge_types::{BuildErrorKind, Stmt};

/// Proof of an open scope, returned by [`StatementRecorder::open_scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an open scope must be closed with close_scope"]
pub struct ScopeToken {
    depth: usize,
    serial: u64,
}

impl ScopeToken {
    /// Nesting depth of this scope (1 for the outermost).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug)]
struct OpenScope {
    serial: u64,
    stmts: Vec<Stmt>,
}

/// Records statements into the innermost open scope.
#[derive(Debug, Default)]
pub struct StatementRecorder {
    scopes: Vec<OpenScope>,
    next_serial: u64,
}

impl StatementRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new empty statement list.
    pub fn open_scope(&mut self) -> ScopeToken {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.scopes.push(OpenScope {
            serial,
            stmts: Vec::new(),
        });
        ScopeToken {
            depth: self.scopes.len(),
            serial,
        }
    }

    /// Append a statement to the innermost scope.
    pub fn push(&mut self, stmt: Stmt) -> Result<(), BuildErrorKind> {
        let scope = self.scopes.last_mut().ok_or(BuildErrorKind::NoOpenScope)?;
        scope.stmts.push(stmt);
        Ok(())
    }

    /// Pop the innermost scope and return its statements.
    ///
    /// Fails without modifying the stack if `token` is not the innermost
    /// open scope.
    pub fn close_scope(&mut self, token: ScopeToken) -> Result<Vec<Stmt>, BuildErrorKind> {
        match self.scopes.last() {
            Some(top) if top.serial == token.serial => {}
            _ => {
                return Err(BuildErrorKind::ScopeMismatch {
                    expected: self.scopes.len(),
                    found: token.depth,
                })
            }
        }
        Ok(self.scopes.pop().map(|s| s.stmts).unwrap_or_default())
    }

    /// Number of currently open scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}
