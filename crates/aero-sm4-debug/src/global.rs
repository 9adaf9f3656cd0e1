//! Shared, mutable interpreter state: resource views, group-shared memory
//! and the pixel sample-evaluate cache.
//!
//! A single `GlobalState` is shared by every lane the harness drives. Store
//! and atomic opcodes are the only writers of view and group-shared bytes;
//! everything else is read-only after setup.

use std::collections::HashMap;

use crate::packing::ViewFormat;
use crate::value::ShaderVariable;

/// Backing store for one bound UAV or SRV slot.
#[derive(Debug, Clone, Default)]
pub struct ResourceView {
    pub data: Vec<u8>,
    /// First addressable element of the view, in format-sized units.
    pub first_element: u32,
    pub num_elements: u32,
    /// Byte pitches for texture-shaped UAVs.
    pub row_pitch: u32,
    pub depth_pitch: u32,
    pub is_texture: bool,
    pub format: ViewFormat,
    /// Append/consume counter driving `imm_atomic_alloc` / `imm_atomic_consume`.
    pub hidden_counter: u32,
}

/// One `dcl_tgsm_*` allocation.
#[derive(Debug, Clone, Default)]
pub struct GroupsharedMem {
    pub data: Vec<u8>,
    pub count: u32,
    pub byte_stride: u32,
    pub structured: bool,
}

/// Key for one cached `eval_*` interpolant result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleEvalCacheKey {
    pub quad_index: u32,
    pub input_register: i32,
    pub first_component: u8,
    pub num_components: u8,
    pub sample: i32,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Default for SampleEvalCacheKey {
    fn default() -> Self {
        SampleEvalCacheKey {
            quad_index: 0,
            input_register: -1,
            first_component: 0,
            num_components: 0,
            // eval_centroid defaults: sample -1, zero offset.
            sample: -1,
            offset_x: 0,
            offset_y: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalState {
    /// UAV views by bind slot. A missing slot reads as an empty view: loads
    /// produce zero and stores are dropped.
    pub uavs: HashMap<u32, ResourceView>,
    /// SRV views by bind slot, read-only.
    pub srvs: HashMap<u32, ResourceView>,
    pub groupshared: Vec<GroupsharedMem>,
    /// Interpolant values computed by the harness for `eval_*` opcodes.
    pub sample_eval_cache: HashMap<SampleEvalCacheKey, ShaderVariable>,
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }
}
