//! Stack growth for deep tree walks.
//!
//! Lowered trees nest as deeply as the source they came from, and every pass
//! in the workspace recurses structurally. Recursive entry points wrap their
//! body in [`ensure_sufficient_stack`] so a pathological tree grows the stack
//! instead of overflowing it.
//!
//! - **Native targets**: `stacker` allocates a fresh segment when less than
//!   the red zone remains.
//! - **WASM targets**: passthrough.

/// Grow when less than this much stack remains (100KB).
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated segment (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first growing the stack if the remaining space is below the red
/// zone.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
