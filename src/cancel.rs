//! Cooperative cancellation shared by every long-running loop.
//!
//! A `CancelToken` is a cloneable handle to one atomic flag. Stages poll it at their loop
//! boundaries (per line, per merge pass, per lookup) and return a partial result once it is set.
//! The flag is set at most once and never cleared.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Install a Ctrl-C handler that cancels `token`.
///
/// With `confirm`, the handler first asks on the terminal and only cancels on `y`.
/// The handler runs on its own thread, so blocking on stdin does not stall the pipeline.
/// Returns an error if a handler was already installed for this process.
pub fn install_interrupt_handler(token: &CancelToken, confirm: bool) -> Result<(), ctrlc::Error> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        if token.is_cancelled() {
            return;
        }
        if confirm && !ask_yes_no("Ctrl-c was pressed. Do you really want to exit? y/n ") {
            return;
        }
        eprintln!("Aborting next possible...");
        tracing::warn!("cancellation requested; stopping at the next checkpoint");
        token.cancel();
    })
}

fn ask_yes_no(prompt: &str) -> bool {
    let mut stderr = io::stderr();
    let _ = write!(stderr, "{prompt}");
    let _ = stderr.flush();
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}
