//! Declaration records emitted ahead of the executable instruction stream.

use crate::opcode::Opcode;
use crate::operand::Operand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerMode {
    Default,
    Comparison,
    Mono,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDimension {
    Unknown,
    Buffer,
    RawBuffer,
    StructuredBuffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMs,
    Texture2DMsArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
}

/// Component return type declared for a resource view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRetType {
    Unknown,
    UNorm,
    SNorm,
    SInt,
    UInt,
    Float,
    Mixed,
    Double,
    Continued,
    Unused,
}

/// Return-type modifier on `resinfo` / `sample_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResinfoRetType {
    Float,
    RcpFloat,
    UInt,
}

/// Channel selected by the `gather4*` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherChannel {
    Red,
    Green,
    Blue,
    Alpha,
}

impl GatherChannel {
    /// Maps a swizzle selector (0..=3) onto a channel; out-of-range
    /// selectors fall back to red.
    pub fn from_component(comp: u8) -> Self {
        match comp {
            1 => GatherChannel::Green,
            2 => GatherChannel::Blue,
            3 => GatherChannel::Alpha,
            _ => GatherChannel::Red,
        }
    }
}

/// One declaration, with the union of fields the various `dcl_*` opcodes
/// carry. Only the fields relevant to `kind` are meaningful; the rest stay at
/// their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: Opcode,
    pub operand: Operand,
    /// `dcl_temps` register count, or element count for `dcl_indexableTemp`.
    pub num_temps: u32,
    /// `dcl_indexableTemp` register number.
    pub temp_reg: u32,
    /// `dcl_thread_group` dimensions.
    pub group_size: [u32; 3],
    /// Structured stride in bytes (`dcl_*_structured`).
    pub stride: u32,
    /// Element count for thread-group shared memory declarations.
    pub count: u32,
    pub sampler_mode: SamplerMode,
    pub dim: ResourceDimension,
    pub resource_ret_type: [ResourceRetType; 4],
    pub sample_count: u32,
}

impl Declaration {
    pub fn new(kind: Opcode, operand: Operand) -> Self {
        Declaration {
            kind,
            operand,
            num_temps: 0,
            temp_reg: 0,
            group_size: [0; 3],
            stride: 0,
            count: 0,
            sampler_mode: SamplerMode::Default,
            dim: ResourceDimension::Unknown,
            resource_ret_type: [ResourceRetType::Unknown; 4],
            sample_count: 0,
        }
    }
}
