//! The host-graphics shim the interpreter delegates to.
//!
//! Texture sampling, gathers, loose-ULP transcendentals and resource-info
//! queries are not reproduced bit-exactly on the CPU; they go through a
//! [`DebugApiWrapper`] implemented by the replay layer. A `None` return from
//! the math or sample calls halts the current step without advancing the
//! program counter.

use aero_sm4::{
    GatherChannel, Opcode, OperandType, ResourceDimension, ResourceRetType, SamplerMode,
};

use crate::value::ShaderVariable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Shaders,
    Execution,
    Resources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    RuntimeWarning,
    IncorrectApiUse,
    GeneralPerformance,
}

/// Everything the wrapper needs to know about the resource side of a
/// sample/gather, collected from declarations and operand slots.
#[derive(Debug, Clone, Copy)]
pub struct SampleGatherResourceData {
    pub dim: ResourceDimension,
    pub ret_type: ResourceRetType,
    pub sample_count: u32,
    pub slot: u32,
}

/// Sampler side of a sample/gather.
#[derive(Debug, Clone, Copy)]
pub struct SampleGatherSamplerData {
    pub mode: SamplerMode,
    pub slot: u32,
    /// LOD bias folded into sampler state for `sample_b`.
    pub bias: f32,
}

pub trait DebugApiWrapper {
    /// Tells the wrapper which instruction is about to execute, for
    /// diagnostics attribution.
    fn set_current_instruction(&mut self, index: u32);

    fn add_debug_message(
        &mut self,
        category: MessageCategory,
        severity: MessageSeverity,
        source: MessageSource,
        text: &str,
    );

    /// Evaluates `rcp`/`rsq`/`sqrt`/`exp`/`log`/`sincos` on the host GPU.
    /// Returns the primary and secondary results (`sincos` fills both);
    /// `None` halts the step.
    fn calculate_math_intrinsic(
        &mut self,
        op: Opcode,
        input: &ShaderVariable,
    ) -> Option<(ShaderVariable, ShaderVariable)>;

    /// Performs a sample, gather, texture load or `lod` query. `None` halts
    /// the step.
    #[allow(clippy::too_many_arguments)]
    fn calculate_sample_gather(
        &mut self,
        op: Opcode,
        resource: SampleGatherResourceData,
        sampler: SampleGatherSamplerData,
        uv: &ShaderVariable,
        ddx: &ShaderVariable,
        ddy: &ShaderVariable,
        texel_offsets: [i8; 3],
        multisample_index: i32,
        lod_or_compare: f32,
        swizzle: [u8; 4],
        gather_channel: GatherChannel,
        op_text: &str,
    ) -> Option<ShaderVariable>;

    /// Sample count / quality of the resource bound at `slot` (or of the
    /// rasterizer when the operand names it). Unbound slots return zero.
    fn get_sample_info(
        &mut self,
        ty: OperandType,
        is_absolute: bool,
        slot: u32,
        op_text: &str,
    ) -> ShaderVariable;

    /// Element count of the buffer bound at `slot`.
    fn get_buffer_info(&mut self, ty: OperandType, slot: u32, op_text: &str) -> ShaderVariable;

    /// Dimensions/mip counts of the resource bound at `slot`, plus its
    /// dimensionality (1, 2 or 3; 0 when unbound).
    fn get_resource_info(
        &mut self,
        ty: OperandType,
        slot: u32,
        mip_level: u32,
    ) -> (ShaderVariable, u32);
}
