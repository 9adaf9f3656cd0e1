//! Per-invocation interpreter state: the register file, operand evaluation
//! and destination writes.

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use tracing::{error, warn};

use aero_sm4::{
    DebugShader, Instruction, NumComponents, Opcode, Operand, OperandModifier, OperandType,
    SystemValue, VarType,
};

use crate::value::{abs_var, flush_denorm, neg_var, sub_var, ShaderVariable};

bitflags! {
    /// Events raised while executing a single step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShaderEvents: u32 {
        const GENERATED_NAN_OR_INF = 1 << 0;
        const SAMPLE_LOAD_GATHER = 1 << 1;
    }
}

/// Register file a modification landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    Temporary,
    IndexedTemporary,
    Output,
}

/// One modified register component, for trace consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRange {
    pub kind: RegisterKind,
    pub index: u16,
    pub component: u8,
}

/// One `dcl_indexableTemp` register array.
#[derive(Debug, Clone, Default)]
pub struct IndexableTemp {
    pub members: Vec<ShaderVariable>,
}

/// System-value inputs seeded by the harness.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationSemantics {
    pub group_id: [u32; 3],
    /// Thread id within the group.
    pub thread_id: [u32; 3],
    pub coverage: u32,
    pub primitive_id: u32,
}

/// The complete state of one shader invocation between steps.
///
/// `step` never mutates in place: it clones, applies one instruction and
/// returns the successor, so a trace harness can keep every intermediate
/// state alive.
#[derive(Debug, Clone)]
pub struct State {
    pub program_counter: usize,
    pub registers: Vec<ShaderVariable>,
    pub indexable_temps: Vec<IndexableTemp>,
    pub outputs: Vec<ShaderVariable>,
    /// Read-only, seeded by the harness before the first step.
    pub inputs: Vec<ShaderVariable>,
    /// Constant buffer contents, positionally matching the container's
    /// cbuffer list; operands address them by declared register number.
    pub constant_blocks: Vec<Vec<ShaderVariable>>,
    pub semantics: InvocationSemantics,
    /// Position within the 2x2 quad: bit 0 = x, bit 1 = y.
    pub quad_index: u32,
    pub flags: ShaderEvents,
    pub done: bool,
    /// Register components changed by the latest step.
    pub modified: Vec<RegisterRange>,

    shader: Arc<DebugShader>,
    /// Declared cbuffer register number -> index into `constant_blocks`.
    cbuffer_slots: Arc<HashMap<u32, usize>>,
}

impl State {
    /// Builds the initial state from the shader's declarations: zeroed
    /// temporaries (`r#`), indexable temps (`x#[#]`) and signature-shaped
    /// outputs.
    pub fn new(shader: Arc<DebugShader>, quad_index: u32) -> Self {
        let mut registers = Vec::new();
        let mut index_temp_sizes: Vec<u32> = Vec::new();

        for decl in &shader.declarations {
            match decl.kind {
                Opcode::DclTemps => {
                    registers.reserve(decl.num_temps as usize);
                    for t in 0..decl.num_temps {
                        registers.push(ShaderVariable::zero(&format!("r{t}")));
                    }
                }
                Opcode::DclIndexableTemp => {
                    let reg = decl.temp_reg as usize;
                    if reg >= index_temp_sizes.len() {
                        index_temp_sizes.resize(reg + 1, 0);
                    }
                    index_temp_sizes[reg] = decl.num_temps;
                }
                _ => {}
            }
        }

        let indexable_temps = index_temp_sizes
            .iter()
            .enumerate()
            .map(|(reg, &size)| IndexableTemp {
                members: (0..size)
                    .map(|t| ShaderVariable::zero(&format!("x{reg}[{t}]")))
                    .collect(),
            })
            .collect();

        let outputs = shader
            .output_signature
            .iter()
            .map(|sig| ShaderVariable::zero(&sig.semantic_name))
            .collect();

        let cbuffer_slots = shader
            .cbuffers
            .iter()
            .enumerate()
            .map(|(i, cb)| (cb.register, i))
            .collect();

        State {
            program_counter: 0,
            registers,
            indexable_temps,
            outputs,
            inputs: Vec::new(),
            constant_blocks: Vec::new(),
            semantics: InvocationSemantics::default(),
            quad_index,
            flags: ShaderEvents::empty(),
            done: false,
            modified: Vec::new(),
            shader,
            cbuffer_slots: Arc::new(cbuffer_slots),
        }
    }

    pub fn shader(&self) -> &Arc<DebugShader> {
        &self.shader
    }

    /// The invocation has terminated: `ret`/`discard` taken, or the program
    /// counter ran off the end of the instruction table.
    pub fn finished(&self) -> bool {
        self.done || self.program_counter >= self.shader.num_instructions()
    }

    /// Resolves up to four register indices, folding in the x lane of any
    /// relative sub-operand.
    fn resolve_indices(&self, oper: &Operand, op: &Instruction) -> [u32; 4] {
        let mut indices = [0u32; 4];

        for (slot, idx) in oper.indices.iter().take(4).enumerate() {
            if idx.absolute {
                indices[slot] = idx.index as u32;
            }
            if let Some(rel) = &idx.relative {
                let offset = self.get_src(rel, op);
                indices[slot] = indices[slot].wrapping_add_signed(offset.i(0));
            }
        }

        indices
    }

    /// Evaluates a source operand: resolve indices, fetch the backing value,
    /// swizzle, apply modifiers under the operation type, then flush float
    /// denormals when the operation calls for it.
    pub fn get_src(&self, oper: &Operand, op: &Instruction) -> ShaderVariable {
        let indices = self.resolve_indices(oper, op);

        // Whether the fetched value is a float input eligible for flushing.
        let mut flushable = true;

        let source = match oper.ty {
            OperandType::Temp => match self.registers.get(indices[0] as usize) {
                Some(v) => v.clone(),
                None => {
                    warn!(index = indices[0], "out of bounds temporary register read");
                    ShaderVariable::zero("")
                }
            },
            OperandType::IndexableTemp => {
                let cell = self
                    .indexable_temps
                    .get(indices[0] as usize)
                    .and_then(|t| t.members.get(indices[1] as usize));
                match cell {
                    Some(v) => v.clone(),
                    None => {
                        warn!(
                            register = indices[0],
                            element = indices[1],
                            "out of bounds indexable temporary read"
                        );
                        ShaderVariable::zero("")
                    }
                }
            }
            OperandType::Input => match self.inputs.get(indices[0] as usize) {
                Some(v) => v.clone(),
                None => {
                    warn!(index = indices[0], "out of bounds input register read");
                    ShaderVariable::zero("")
                }
            },
            OperandType::Output => match self.outputs.get(indices[0] as usize) {
                Some(v) => v.clone(),
                None => {
                    warn!(index = indices[0], "out of bounds output register read");
                    ShaderVariable::zero("")
                }
            },

            // Instructions referencing resources, samplers or group-shared
            // memory handle the operand specially; its value is just the
            // slot index.
            OperandType::ThreadGroupSharedMemory
            | OperandType::Resource
            | OperandType::Sampler
            | OperandType::UnorderedAccessView
            | OperandType::Null
            | OperandType::Rasterizer => {
                flushable = false;
                ShaderVariable::splat_u32("", indices[0])
            }

            OperandType::Immediate32 => {
                let mut v = ShaderVariable::from_u32s("Immediate", oper.values);
                v.ty = VarType::SInt;
                match oper.num_components {
                    NumComponents::One => v.columns = 1,
                    NumComponents::Four => v.columns = 4,
                    NumComponents::None => {
                        error!("N-wide immediate vectors do not exist in the encoding");
                    }
                }
                v
            }
            OperandType::Immediate64 => {
                error!("64-bit immediate operands are not supported");
                ShaderVariable::zero("Immediate")
            }

            OperandType::ConstantBuffer => {
                // Operands carry the declared cb# register number, not the
                // container's list position.
                let member = self
                    .cbuffer_slots
                    .get(&indices[0])
                    .and_then(|&cb| self.constant_blocks.get(cb))
                    .and_then(|block| block.get(indices[1] as usize));
                match member {
                    Some(v) => v.clone(),
                    None => {
                        warn!(
                            register = indices[0],
                            vector = indices[1],
                            "out of bounds constant buffer read"
                        );
                        ShaderVariable::zero("")
                    }
                }
            }
            OperandType::ImmediateConstantBuffer => {
                let imm = &self.shader.immediate_block;
                let base = indices[0] as usize * 4;
                if base + 4 <= imm.len() {
                    ShaderVariable::from_u32s("", [imm[base], imm[base + 1], imm[base + 2], imm[base + 3]])
                } else {
                    // The block is always a whole number of vec4s, so any
                    // in-bounds vector is fully readable.
                    warn!(
                        vector = indices[0],
                        "read past the end of the immediate constant buffer, clamping to zero"
                    );
                    ShaderVariable::zero("")
                }
            }

            OperandType::InputThreadGroupId => {
                let g = self.semantics.group_id;
                ShaderVariable::from_u32s("vThreadGroupID", [g[0], g[1], g[2], 0])
            }
            OperandType::InputThreadIdInGroup => {
                let t = self.semantics.thread_id;
                ShaderVariable::from_u32s("vThreadIDInGroup", [t[0], t[1], t[2], 0])
            }
            OperandType::InputThreadId => {
                let size = self.checked_group_size();
                let g = self.semantics.group_id;
                let t = self.semantics.thread_id;
                ShaderVariable::from_u32s(
                    "vThreadID",
                    [
                        g[0] * size[0] + t[0],
                        g[1] * size[1] + t[1],
                        g[2] * size[2] + t[2],
                        0,
                    ],
                )
            }
            OperandType::InputThreadIdInGroupFlattened => {
                let size = self.checked_group_size();
                let t = self.semantics.thread_id;
                let flattened = t[2] * size[0] * size[1] + t[1] * size[0] + t[0];
                ShaderVariable::splat_u32("vThreadIDInGroupFlattened", flattened)
            }
            OperandType::InputCoverageMask => {
                ShaderVariable::splat_u32("vCoverage", self.semantics.coverage)
            }
            OperandType::InputPrimitiveId => {
                ShaderVariable::splat_u32("vPrimitiveID", self.semantics.primitive_id)
            }

            other => {
                error!(ty = ?other, "unsupported source operand type");
                ShaderVariable::splat_u32("vUnsupported", 0)
            }
        };

        // Swizzle: unused selectors keep their own lane.
        let mut v = source.clone();
        for lane in 0..4 {
            let comp = oper.comps[lane];
            let src_lane = if comp == Operand::UNUSED { lane } else { comp as usize };
            v.set_u(lane, source.u(src_lane.min(3)));
        }
        v.columns = if oper.is_scalar_selection() { 1 } else { 4 };

        let optype = op.opcode.operation_type();
        if matches!(oper.modifier, OperandModifier::Abs | OperandModifier::AbsNeg) {
            v = abs_var(&v, optype);
        }
        if matches!(oper.modifier, OperandModifier::Neg | OperandModifier::AbsNeg) {
            v = neg_var(&v, optype);
        }

        if op.opcode.flushes_denorms() && flushable {
            for lane in 0..4 {
                v.set_f(lane, flush_denorm(v.f(lane)));
            }
        }

        v
    }

    fn checked_group_size(&self) -> [u32; 3] {
        let size = self.shader.thread_group_size();
        let valid = (1..=1024).contains(&size[0])
            && (1..=1024).contains(&size[1])
            && (1..=64).contains(&size[2])
            && size[0] * size[1] * size[2] <= 1024;
        if !valid {
            warn!(?size, "missing or invalid dcl_thread_group declaration");
        }
        size
    }

    /// Writes `val` through the destination operand: saturate under the
    /// operation type, apply the write mask, raise the NaN/inf flag, flush
    /// denormals for flushing operations, and record modified components.
    pub fn set_dst(&mut self, dstoper: &Operand, op: &Instruction, val: &ShaderVariable) {
        let indices = self.resolve_indices(dstoper, op);

        enum Target {
            Temp(usize),
            Indexable(usize, usize),
            Output(usize),
        }

        let located = match dstoper.ty {
            OperandType::Temp => {
                let idx = indices[0] as usize;
                if idx >= self.registers.len() {
                    error!(index = idx, "write to out of bounds temporary register");
                    return;
                }
                Some((Target::Temp(idx), RegisterKind::Temporary, indices[0]))
            }
            OperandType::IndexableTemp => {
                let (reg, elem) = (indices[0] as usize, indices[1] as usize);
                let in_bounds = self
                    .indexable_temps
                    .get(reg)
                    .is_some_and(|t| elem < t.members.len());
                if !in_bounds {
                    error!(register = reg, element = elem, "write to out of bounds indexable temporary");
                    return;
                }
                Some((
                    Target::Indexable(reg, elem),
                    RegisterKind::IndexedTemporary,
                    indices[0],
                ))
            }
            OperandType::Output => {
                let idx = indices[0] as usize;
                if idx >= self.outputs.len() {
                    error!(index = idx, "write to out of bounds output register");
                    return;
                }
                Some((Target::Output(idx), RegisterKind::Output, indices[0]))
            }
            OperandType::Null => None,
            OperandType::Input | OperandType::ConstantBuffer => {
                error!("attempt to write to a read-only operand (input or cbuffer)");
                return;
            }
            OperandType::OutputDepth
            | OperandType::OutputDepthLessEqual
            | OperandType::OutputDepthGreaterEqual
            | OperandType::OutputStencilRef
            | OperandType::OutputCoverageMask => {
                let builtin = match dstoper.ty {
                    OperandType::OutputDepth => SystemValue::DepthOutput,
                    OperandType::OutputDepthLessEqual => SystemValue::DepthOutputLessEqual,
                    OperandType::OutputDepthGreaterEqual => SystemValue::DepthOutputGreaterEqual,
                    OperandType::OutputStencilRef => SystemValue::StencilReference,
                    _ => SystemValue::CoverageMask,
                };

                let slot = self
                    .shader
                    .output_signature
                    .iter()
                    .position(|sig| sig.system_value == builtin);
                match slot {
                    Some(idx) => Some((Target::Output(idx), RegisterKind::Output, idx as u32)),
                    None => {
                        error!(ty = ?dstoper.ty, "no signature row for semantic output");
                        return;
                    }
                }
            }
            other => {
                error!(ty = ?other, "unsupported destination operand type");
                return;
            }
        };

        let Some((target, kind, reg_index)) = located else {
            // A null destination silently discards the result.
            return;
        };

        let right = if op.saturate {
            crate::value::sat(val, op.opcode.operation_type())
        } else {
            val.clone()
        };
        let flush = op.opcode.flushes_denorms();

        let v = match target {
            Target::Temp(i) => &mut self.registers[i],
            Target::Indexable(r, e) => &mut self.indexable_temps[r].members[e],
            Target::Output(i) => &mut self.outputs[i],
        };

        let mut raised = ShaderEvents::empty();
        let record = |changed: bool, component: u8, modified: &mut Vec<RegisterRange>| {
            if changed {
                modified.push(RegisterRange {
                    kind,
                    index: reg_index as u16,
                    component,
                });
            }
        };

        // A single-component mask writes the scalar source lane 0 into that
        // component; a multi-component mask copies matching lanes.
        if dstoper.is_scalar_selection() {
            let comp = dstoper.comps[0];
            if comp >= 4 {
                error!(component = comp, "destination selector out of range");
                return;
            }
            let changed = assign_lane(v, comp as usize, &right, 0, flush, &mut raised);
            record(changed, comp, &mut self.modified);
        } else {
            let mut comps_written = 0;
            for lane in 0..4 {
                let comp = dstoper.comps[lane];
                if comp == Operand::UNUSED {
                    continue;
                }
                if comp >= 4 {
                    error!(component = comp, "destination selector out of range");
                    continue;
                }
                let changed =
                    assign_lane(v, comp as usize, &right, comp as usize, flush, &mut raised);
                comps_written += 1;
                record(changed, comp, &mut self.modified);
            }

            if comps_written == 0 {
                let changed = assign_lane(v, 0, &right, 0, flush, &mut raised);
                record(changed, 0, &mut self.modified);
            }
        }

        self.flags |= raised;
    }

    /// Horizontal screen-space derivative. Coarse form differences the
    /// top-left pixel's neighbours; fine form differences this pixel's own
    /// horizontal pair.
    pub(crate) fn ddx(
        &self,
        fine: bool,
        quad: &[State; 4],
        oper: &Operand,
        op: &Instruction,
    ) -> ShaderVariable {
        let optype = op.opcode.operation_type();
        let qi = self.quad_index as usize;

        if !fine {
            sub_var(&quad[1].get_src(oper, op), &quad[0].get_src(oper, op), optype)
        } else if qi % 2 == 0 {
            sub_var(&quad[qi + 1].get_src(oper, op), &quad[qi].get_src(oper, op), optype)
        } else {
            sub_var(&quad[qi].get_src(oper, op), &quad[qi - 1].get_src(oper, op), optype)
        }
    }

    /// Vertical screen-space derivative over the quad's vertical pairs.
    pub(crate) fn ddy(
        &self,
        fine: bool,
        quad: &[State; 4],
        oper: &Operand,
        op: &Instruction,
    ) -> ShaderVariable {
        let optype = op.opcode.operation_type();
        let qi = self.quad_index as usize;

        if !fine {
            sub_var(&quad[2].get_src(oper, op), &quad[0].get_src(oper, op), optype)
        } else if qi / 2 == 0 {
            sub_var(&quad[qi + 2].get_src(oper, op), &quad[qi].get_src(oper, op), optype)
        } else {
            sub_var(&quad[qi].get_src(oper, op), &quad[qi - 2].get_src(oper, op), optype)
        }
    }
}

/// Copies one 32-bit lane into the destination, tracking bit-pattern changes
/// and raising the NaN/inf event for non-finite float or double sources.
fn assign_lane(
    dst: &mut ShaderVariable,
    dst_lane: usize,
    src: &ShaderVariable,
    src_lane: usize,
    flush: bool,
    raised: &mut ShaderEvents,
) -> bool {
    match src.ty {
        VarType::Float => {
            if !src.f(src_lane).is_finite() {
                *raised |= ShaderEvents::GENERATED_NAN_OR_INF;
            }
        }
        VarType::Double => {
            if !src.d(src_lane / 2).is_finite() {
                *raised |= ShaderEvents::GENERATED_NAN_OR_INF;
            }
        }
        _ => {}
    }

    let changed = dst.u(dst_lane) != src.u(src_lane);
    dst.set_u(dst_lane, src.u(src_lane));

    if flush && src.ty == VarType::Float {
        let flushed = flush_denorm(dst.f(dst_lane));
        dst.set_f(dst_lane, flushed);
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use aero_sm4::{CBufferBinding, Declaration, OperandIndex};

    fn shader_with_temps(n: u32) -> Arc<DebugShader> {
        let mut decl = Declaration::new(Opcode::DclTemps, Operand::null());
        decl.num_temps = n;
        Arc::new(DebugShader {
            declarations: vec![decl],
            ..Default::default()
        })
    }

    fn mov() -> Instruction {
        Instruction::new(Opcode::Mov, Vec::new())
    }

    fn add() -> Instruction {
        Instruction::new(Opcode::Add, Vec::new())
    }

    #[test]
    fn init_sizes_registers_from_declarations() {
        let state = State::new(shader_with_temps(3), 0);
        assert_eq!(state.registers.len(), 3);
        assert_eq!(state.registers[2].name, "r2");
        assert!(!state.finished() || state.shader().num_instructions() == 0);
    }

    #[test]
    fn swizzle_and_scalar_collapse() {
        let mut state = State::new(shader_with_temps(1), 0);
        state.registers[0] = ShaderVariable::from_u32s("r0", [10, 20, 30, 40]);

        let v = state.get_src(&Operand::temp(0).with_swizzle([3, 3, 0, 1]), &mov());
        assert_eq!([v.u(0), v.u(1), v.u(2), v.u(3)], [40, 40, 10, 20]);
        assert_eq!(v.columns, 4);

        let v = state.get_src(&Operand::temp(0).scalar(2), &mov());
        assert_eq!(v.u(0), 30);
        assert_eq!(v.columns, 1);
    }

    #[test]
    fn modifier_composes_abs_then_neg() {
        let mut state = State::new(shader_with_temps(1), 0);
        state.registers[0] = ShaderVariable::from_f32s("r0", [-2.0, 3.0, -4.0, 5.0]);

        let oper = Operand::temp(0).with_modifier(OperandModifier::AbsNeg);
        let v = state.get_src(&oper, &add());
        assert_eq!([v.f(0), v.f(1), v.f(2), v.f(3)], [-2.0, -3.0, -4.0, -5.0]);
    }

    #[test]
    fn flushing_op_reads_denormal_as_signed_zero() {
        let mut state = State::new(shader_with_temps(1), 0);
        state.registers[0] = ShaderVariable::from_u32s("r0", [1, 0x8000_0001, 0, 0]);

        // add flushes; mov must not.
        let flushed = state.get_src(&Operand::temp(0), &add());
        assert_eq!(flushed.u(0), 0);
        assert_eq!(flushed.u(1), 0x8000_0000);

        let moved = state.get_src(&Operand::temp(0), &mov());
        assert_eq!(moved.u(0), 1);
        assert_eq!(moved.u(1), 0x8000_0001);
    }

    #[test]
    fn relative_index_adds_x_lane() {
        let mut shader = DebugShader::default();
        let mut temps = Declaration::new(Opcode::DclTemps, Operand::null());
        temps.num_temps = 1;
        let mut itemp = Declaration::new(Opcode::DclIndexableTemp, Operand::null());
        itemp.temp_reg = 0;
        itemp.num_temps = 4;
        shader.declarations = vec![temps, itemp];

        let mut state = State::new(Arc::new(shader), 0);
        state.registers[0] = ShaderVariable::from_i32s("r0", [2, 0, 0, 0]);
        state.indexable_temps[0].members[3] = ShaderVariable::splat_u32("x0[3]", 77);

        let oper = Operand {
            indices: vec![
                OperandIndex::abs(0),
                OperandIndex::rel(1, Operand::temp(0).scalar(0)),
            ],
            ..Operand::indexable_temp(0, 0)
        };
        let v = state.get_src(&oper, &mov());
        assert_eq!(v.u(0), 77);
    }

    #[test]
    fn cbuffers_resolve_by_register_number() {
        let shader = DebugShader {
            cbuffers: vec![
                CBufferBinding { name: "globals".into(), register: 7 },
                CBufferBinding { name: "locals".into(), register: 2 },
            ],
            ..Default::default()
        };
        let mut state = State::new(Arc::new(shader), 0);
        state.constant_blocks = vec![
            vec![ShaderVariable::splat_u32("", 111)],
            vec![ShaderVariable::splat_u32("", 222)],
        ];

        let v = state.get_src(&Operand::constant_buffer(2, 0), &mov());
        assert_eq!(v.u(0), 222);

        // Out of bounds vector index clamps to zero.
        let v = state.get_src(&Operand::constant_buffer(7, 5), &mov());
        assert_eq!(v.u(0), 0);
    }

    #[test]
    fn scalar_mask_writes_lane_zero_into_component() {
        let mut state = State::new(shader_with_temps(1), 0);
        let mut op = mov();
        op.operands = vec![Operand::temp(0).masked(0b0100), Operand::temp(0)];

        let mut val = ShaderVariable::from_u32s("", [9, 0, 0, 0]);
        val.columns = 1;
        state.set_dst(&op.operands[0].clone(), &op, &val);

        assert_eq!(state.registers[0].u(2), 9);
        assert_eq!(
            state.modified,
            vec![RegisterRange { kind: RegisterKind::Temporary, index: 0, component: 2 }]
        );
    }

    #[test]
    fn vector_mask_copies_matching_lanes_and_skips_unwritten() {
        let mut state = State::new(shader_with_temps(1), 0);
        let mut op = mov();
        op.operands = vec![Operand::temp(0).masked(0b1010), Operand::temp(0)];

        let val = ShaderVariable::from_u32s("", [1, 2, 3, 4]);
        state.set_dst(&op.operands[0].clone(), &op, &val);

        assert_eq!(state.registers[0].u(0), 0);
        assert_eq!(state.registers[0].u(1), 2);
        assert_eq!(state.registers[0].u(2), 0);
        assert_eq!(state.registers[0].u(3), 4);
    }

    #[test]
    fn nonfinite_write_raises_flag() {
        let mut state = State::new(shader_with_temps(1), 0);
        let mut op = add();
        op.operands = vec![Operand::temp(0), Operand::temp(0), Operand::temp(0)];

        let val = ShaderVariable::from_f32s("", [f32::INFINITY, 0.0, 0.0, 0.0]);
        state.set_dst(&op.operands[0].clone(), &op, &val);
        assert!(state.flags.contains(ShaderEvents::GENERATED_NAN_OR_INF));
    }

    #[test]
    fn saturate_applies_before_mask() {
        let mut state = State::new(shader_with_temps(1), 0);
        let mut op = add().saturated();
        op.operands = vec![Operand::temp(0), Operand::temp(0), Operand::temp(0)];

        let val = ShaderVariable::from_f32s("", [2.0, f32::NAN, -1.0, 0.25]);
        state.set_dst(&op.operands[0].clone(), &op, &val);

        let r = &state.registers[0];
        assert_eq!([r.f(0), r.f(1), r.f(2), r.f(3)], [1.0, 0.0, 0.0, 0.25]);
    }

    #[test]
    fn null_destination_discards() {
        let mut state = State::new(shader_with_temps(1), 0);
        let mut op = mov();
        op.operands = vec![Operand::null(), Operand::temp(0)];

        state.set_dst(&Operand::null(), &op, &ShaderVariable::splat_u32("", 5));
        assert!(state.modified.is_empty());
        assert_eq!(state.registers[0].u(0), 0);
    }
}
