//! Decoded instruction table, signatures and the [`DebugShader`] container.

use thiserror::Error;

use crate::decl::{Declaration, ResinfoRetType};
use crate::opcode::Opcode;
use crate::operand::{NumComponents, Operand, OperandType};

/// One executable instruction from the flat stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    /// `_sat` result modifier.
    pub saturate: bool,
    /// Test polarity for predicated flow opcodes (`if_nz` vs `if_z`, etc).
    pub nonzero: bool,
    /// Structured stride carried on `ld_structured`/`store_structured`
    /// when the encoder embeds it on the instruction.
    pub stride: u32,
    /// Immediate texel offset for sample/gather/load opcodes.
    pub texel_offset: [i8; 3],
    pub resinfo_ret_type: ResinfoRetType,
    /// Disassembly text, carried through for diagnostics.
    pub text: String,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Instruction {
            opcode,
            operands,
            saturate: false,
            nonzero: false,
            stride: 0,
            texel_offset: [0; 3],
            resinfo_ret_type: ResinfoRetType::Float,
            text: String::new(),
        }
    }

    pub fn saturated(mut self) -> Self {
        self.saturate = true;
        self
    }

    pub fn nonzero(mut self) -> Self {
        self.nonzero = true;
        self
    }
}

/// System-value builtin attached to an output signature parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemValue {
    Undefined,
    Position,
    PrimitiveIndex,
    RenderTargetIndex,
    ViewportIndex,
    Target,
    DepthOutput,
    DepthOutputGreaterEqual,
    DepthOutputLessEqual,
    StencilReference,
    CoverageMask,
}

/// One row of the output signature: which register an output lives in and
/// which builtin (if any) it feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct SigParameter {
    pub semantic_name: String,
    pub semantic_index: u32,
    pub register: u32,
    /// Component mask, bit 0 = x.
    pub mask: u8,
    pub system_value: SystemValue,
}

/// Constant buffer binding as declared in the shader: values are seeded per
/// trace, the shader only fixes the register number.
#[derive(Debug, Clone, PartialEq)]
pub struct CBufferBinding {
    pub name: String,
    /// Declared `cb#` register; operands reference this number, not the
    /// position in the container's cbuffer list.
    pub register: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("instruction {index} ({name}) has {actual} operands, encoding requires {expected}")]
    OperandCountMismatch {
        index: usize,
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("instruction {index} ({name}) has an N-wide immediate (only scalar and vec4 exist)")]
    InvalidImmediateWidth { index: usize, name: &'static str },

    #[error("immediate constant buffer length {len} is not a multiple of 4 words")]
    MisalignedImmediateBlock { len: usize },
}

/// A fully decoded shader as handed over by the container parser.
///
/// This is the read-only program the interpreter executes: declarations,
/// the flat instruction table, the output signature, cbuffer bindings and the
/// embedded immediate constant buffer.
#[derive(Debug, Clone, Default)]
pub struct DebugShader {
    pub declarations: Vec<Declaration>,
    pub instructions: Vec<Instruction>,
    pub output_signature: Vec<SigParameter>,
    pub cbuffers: Vec<CBufferBinding>,
    /// Raw 32-bit words of the embedded immediate constant buffer, a whole
    /// number of vec4s.
    pub immediate_block: Vec<u32>,
}

impl DebugShader {
    pub fn num_declarations(&self) -> usize {
        self.declarations.len()
    }

    pub fn declaration(&self, index: usize) -> &Declaration {
        &self.declarations[index]
    }

    pub fn num_instructions(&self) -> usize {
        self.instructions.len()
    }

    pub fn instruction(&self, index: usize) -> &Instruction {
        &self.instructions[index]
    }

    /// `dcl_temps` register count, zero when undeclared.
    pub fn num_temps(&self) -> u32 {
        self.declarations
            .iter()
            .find(|d| d.kind == Opcode::DclTemps)
            .map(|d| d.num_temps)
            .unwrap_or(0)
    }

    /// `dcl_thread_group` dimensions, zero when undeclared.
    pub fn thread_group_size(&self) -> [u32; 3] {
        self.declarations
            .iter()
            .find(|d| d.kind == Opcode::DclThreadGroup)
            .map(|d| d.group_size)
            .unwrap_or([0; 3])
    }

    /// Finds the declaration for a bind-slot operand type at `slot`.
    pub fn find_slot_declaration(&self, ty: OperandType, slot: u32) -> Option<&Declaration> {
        self.declarations
            .iter()
            .find(|d| d.operand.ty == ty && d.operand.slot() == slot)
    }

    /// Checks structural invariants the interpreter relies on. Runtime traps
    /// still guard each access, but a decoder bug is easier to diagnose here.
    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.immediate_block.len() % 4 != 0 {
            return Err(ProgramError::MisalignedImmediateBlock {
                len: self.immediate_block.len(),
            });
        }

        for (index, inst) in self.instructions.iter().enumerate() {
            let expected = inst.opcode.operand_count();
            if inst.operands.len() < expected {
                return Err(ProgramError::OperandCountMismatch {
                    index,
                    name: inst.opcode.name(),
                    expected,
                    actual: inst.operands.len(),
                });
            }

            for oper in &inst.operands {
                if oper.ty == OperandType::Immediate32
                    && oper.num_components == NumComponents::None
                {
                    return Err(ProgramError::InvalidImmediateWidth {
                        index,
                        name: inst.opcode.name(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_flags_operand_count_mismatch() {
        let shader = DebugShader {
            instructions: vec![Instruction::new(Opcode::Add, vec![Operand::temp(0)])],
            ..Default::default()
        };

        assert_eq!(
            shader.validate(),
            Err(ProgramError::OperandCountMismatch {
                index: 0,
                name: "add",
                expected: 3,
                actual: 1,
            })
        );
    }

    #[test]
    fn validate_flags_misaligned_immediate_block() {
        let shader = DebugShader {
            immediate_block: vec![0; 6],
            ..Default::default()
        };

        assert!(matches!(
            shader.validate(),
            Err(ProgramError::MisalignedImmediateBlock { len: 6 })
        ));
    }

    #[test]
    fn slot_declaration_lookup_matches_type_and_slot() {
        let mut shader = DebugShader::default();
        let mut decl = Declaration::new(
            Opcode::DclUavStructured,
            Operand::slot_ref(OperandType::UnorderedAccessView, 2),
        );
        decl.stride = 16;
        shader.declarations.push(decl);

        assert!(shader
            .find_slot_declaration(OperandType::UnorderedAccessView, 2)
            .is_some());
        assert!(shader
            .find_slot_declaration(OperandType::UnorderedAccessView, 1)
            .is_none());
        assert!(shader
            .find_slot_declaration(OperandType::Resource, 2)
            .is_none());
    }
}
