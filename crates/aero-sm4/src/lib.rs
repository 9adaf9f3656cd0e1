//! Decoded SM4/SM5 shader program model.
//!
//! This crate defines the in-memory form of a tokenized SM4/SM5 program as the
//! shader debugger consumes it: the opcode catalogue with its per-opcode
//! property tables, operand encodings (swizzles, write masks, modifiers,
//! relative indices, immediates), declaration records, output signatures, and
//! the [`DebugShader`] container that ties them together.
//!
//! The binary DXBC container parser that *produces* these values lives
//! elsewhere; nothing in this crate reads raw token streams.

mod decl;
mod opcode;
mod operand;
mod program;

pub use crate::decl::{
    Declaration, GatherChannel, ResinfoRetType, ResourceDimension, ResourceRetType, SamplerMode,
};
pub use crate::opcode::{Opcode, VarType};
pub use crate::operand::{NumComponents, Operand, OperandIndex, OperandModifier, OperandType};
pub use crate::program::{
    CBufferBinding, DebugShader, Instruction, ProgramError, SigParameter, SystemValue,
};
