//! Execution context for the gitsync CLI.
//!
//! Provides thread-local storage for the global --verbose flag so it does
//! not have to be threaded through every function signature. The engine is
//! single-threaded and strictly sequential, so a thread-local is sufficient.

use std::cell::RefCell;

thread_local! {
    static CONTEXT: RefCell<ExecutionContext> = const { RefCell::new(ExecutionContext { verbose: false }) };
}

/// Global execution context for the current CLI invocation
#[derive(Clone, Copy, Default)]
pub struct ExecutionContext {
    /// Show git commands being executed
    pub verbose: bool,
}

impl ExecutionContext {
    /// Initialize the thread-local context
    pub fn init(verbose: bool) {
        CONTEXT.with(|ctx| {
            *ctx.borrow_mut() = ExecutionContext { verbose };
        });
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose() -> bool {
        CONTEXT.with(|ctx| ctx.borrow().verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context() {
        ExecutionContext::init(false);
        assert!(!ExecutionContext::is_verbose());
    }

    #[test]
    fn test_verbose_flag() {
        ExecutionContext::init(true);
        assert!(ExecutionContext::is_verbose());
        ExecutionContext::init(false);
    }
}
