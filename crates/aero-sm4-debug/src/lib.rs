//! Step-at-a-time SM4/SM5 shader interpreter.
//!
//! The interpreter advances a per-invocation [`State`] one instruction at a
//! time over the decoded program in an [`aero_sm4::DebugShader`]. Each
//! [`State::step`] is a pure transition: it clones the current state, applies
//! one instruction, and returns the successor. Shared side effects (UAV and
//! group-shared memory, hidden counters) go through [`GlobalState`]; texture
//! sampling, transcendental math and resource queries are delegated to a host
//! [`DebugApiWrapper`].
//!
//! A harness drives a quad of four sibling invocations in lock-step so that
//! screen-space derivative instructions can difference neighbouring lanes.

mod api;
mod global;
mod interp;
mod packing;
mod state;
mod value;

pub use crate::api::{
    DebugApiWrapper, MessageCategory, MessageSeverity, MessageSource, SampleGatherResourceData,
    SampleGatherSamplerData,
};
pub use crate::global::{GlobalState, GroupsharedMem, ResourceView, SampleEvalCacheKey};
pub use crate::packing::{typed_load, typed_store, CompType, ViewFormat};
pub use crate::state::{
    IndexableTemp, InvocationSemantics, RegisterKind, RegisterRange, ShaderEvents, State,
};
pub use crate::value::{
    dxbc_max, dxbc_max64, dxbc_min, dxbc_min64, flush_denorm, round_ne, sat, ShaderVariable,
};
