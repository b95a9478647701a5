//! Call gate and dispatch tables of the emulated boundary.
//!
//! Targets are dispatched through fixed tables indexed by `CallShape`, one
//! table per direction. Arguments are marshalled through a staging buffer
//! owned by the receiving side, the way generated bridge code copies
//! `[in]`/`[out]` pointers across a real boundary.

use std::hint::black_box;
use std::sync::atomic::{compiler_fence, Ordering};

use super::CallShape;

pub(crate) type CallTarget = fn(&mut [i64]);

fn target_void(_args: &mut [i64]) {}

fn target_in(args: &mut [i64]) {
    black_box(&*args);
}

fn target_out(args: &mut [i64]) {
    black_box(args);
}

fn target_inout(args: &mut [i64]) {
    black_box(args);
}

/// Handlers inside the domain, indexed by `CallShape::index`.
pub(crate) const INTO_DOMAIN: [CallTarget; 4] = [target_void, target_in, target_out, target_inout];

/// Handlers in the outer domain, indexed by `CallShape::index`.
pub(crate) const OUT_OF_DOMAIN: [CallTarget; 4] =
    [target_void, target_in, target_out, target_inout];

/// Transfer control across the boundary and back.
#[inline(never)]
pub(crate) fn cross_boundary(target: CallTarget, args: &mut [i64]) {
    compiler_fence(Ordering::SeqCst);
    black_box(target)(black_box(args));
    compiler_fence(Ordering::SeqCst);
}

/// Enter the domain once around `work`.
#[inline(never)]
pub(crate) fn enter<R>(work: impl FnOnce() -> R) -> R {
    compiler_fence(Ordering::SeqCst);
    let result = work();
    compiler_fence(Ordering::SeqCst);
    result
}

/// Marshal `caller` into `staging` per `shape`, call `target`, marshal back.
///
/// `staging` only grows, so steady-state calls do not allocate.
#[inline]
pub(crate) fn marshal_call(
    shape: CallShape,
    target: CallTarget,
    caller: &mut [i64],
    staging: &mut Vec<i64>,
) {
    let len = caller.len();
    if staging.len() < len {
        staging.resize(len, 0);
    }
    let callee = &mut staging[..len];

    match shape {
        CallShape::Void => cross_boundary(target, &mut []),
        CallShape::In => {
            callee.copy_from_slice(caller);
            cross_boundary(target, callee);
        }
        CallShape::Out => {
            callee.fill(0);
            cross_boundary(target, callee);
            caller.copy_from_slice(callee);
        }
        CallShape::InOut => {
            callee.copy_from_slice(caller);
            cross_boundary(target, callee);
            caller.copy_from_slice(callee);
        }
    }
}
