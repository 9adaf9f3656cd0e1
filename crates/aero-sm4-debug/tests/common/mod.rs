//! Shared builders for driving the interpreter over hand-assembled
//! instruction streams, plus a recording API wrapper that evaluates the
//! delegated intrinsics on the CPU.

#![allow(dead_code)]

use std::sync::Arc;

use aero_sm4::{
    DebugShader, Declaration, GatherChannel, Instruction, Opcode, Operand, OperandType,
    ResourceDimension, SamplerMode,
};
use aero_sm4_debug::{
    CompType, DebugApiWrapper, GlobalState, MessageCategory, MessageSeverity, MessageSource,
    ResourceView, SampleGatherResourceData, SampleGatherSamplerData, ShaderVariable, State,
    ViewFormat,
};

/// API wrapper for tests: math intrinsics run on the CPU, sample results are
/// canned, and every call is recorded.
pub struct TestApi {
    pub current_instruction: Vec<u32>,
    pub messages: Vec<String>,
    /// When set, math and sample calls decline, as a real wrapper does when
    /// the GPU replay fails.
    pub fail_delegated: bool,
    pub sample_result: ShaderVariable,
    pub sample_calls: u32,
    pub sample_info: ShaderVariable,
    pub buffer_info: ShaderVariable,
    pub resource_info: ShaderVariable,
    pub resource_dim: u32,
}

impl Default for TestApi {
    fn default() -> Self {
        TestApi {
            current_instruction: Vec::new(),
            messages: Vec::new(),
            fail_delegated: false,
            sample_result: ShaderVariable::from_f32s("tex", [0.25, 0.5, 0.75, 1.0]),
            sample_calls: 0,
            sample_info: ShaderVariable::from_u32s("", [0; 4]),
            buffer_info: ShaderVariable::from_u32s("", [0; 4]),
            resource_info: ShaderVariable::from_u32s("", [0; 4]),
            resource_dim: 0,
        }
    }
}

impl DebugApiWrapper for TestApi {
    fn set_current_instruction(&mut self, index: u32) {
        self.current_instruction.push(index);
    }

    fn add_debug_message(
        &mut self,
        _category: MessageCategory,
        _severity: MessageSeverity,
        _source: MessageSource,
        text: &str,
    ) {
        self.messages.push(text.to_owned());
    }

    fn calculate_math_intrinsic(
        &mut self,
        op: Opcode,
        input: &ShaderVariable,
    ) -> Option<(ShaderVariable, ShaderVariable)> {
        if self.fail_delegated {
            return None;
        }

        let mut a = ShaderVariable::from_f32s("calcA", [0.0; 4]);
        let mut b = ShaderVariable::from_f32s("calcB", [0.0; 4]);

        for lane in 0..4 {
            let x = input.f(lane);
            match op {
                Opcode::Rcp => a.set_f(lane, 1.0 / x),
                Opcode::Rsq => a.set_f(lane, 1.0 / x.sqrt()),
                Opcode::Sqrt => a.set_f(lane, x.sqrt()),
                Opcode::Exp => a.set_f(lane, x.exp2()),
                Opcode::Log => a.set_f(lane, x.log2()),
                Opcode::SinCos => {
                    a.set_f(lane, x.sin());
                    b.set_f(lane, x.cos());
                }
                _ => panic!("unexpected math intrinsic {}", op.name()),
            }
        }

        Some((a, b))
    }

    fn calculate_sample_gather(
        &mut self,
        _op: Opcode,
        _resource: SampleGatherResourceData,
        _sampler: SampleGatherSamplerData,
        _uv: &ShaderVariable,
        _ddx: &ShaderVariable,
        _ddy: &ShaderVariable,
        _texel_offsets: [i8; 3],
        _multisample_index: i32,
        _lod_or_compare: f32,
        _swizzle: [u8; 4],
        _gather_channel: GatherChannel,
        _op_text: &str,
    ) -> Option<ShaderVariable> {
        if self.fail_delegated {
            return None;
        }
        self.sample_calls += 1;
        Some(self.sample_result.clone())
    }

    fn get_sample_info(
        &mut self,
        _ty: OperandType,
        _is_absolute: bool,
        _slot: u32,
        _op_text: &str,
    ) -> ShaderVariable {
        self.sample_info.clone()
    }

    fn get_buffer_info(&mut self, _ty: OperandType, _slot: u32, _op_text: &str) -> ShaderVariable {
        self.buffer_info.clone()
    }

    fn get_resource_info(
        &mut self,
        _ty: OperandType,
        _slot: u32,
        _mip_level: u32,
    ) -> (ShaderVariable, u32) {
        (self.resource_info.clone(), self.resource_dim)
    }
}

// ---- Declarations ----

pub fn dcl_temps(count: u32) -> Declaration {
    let mut d = Declaration::new(Opcode::DclTemps, Operand::null());
    d.num_temps = count;
    d
}

pub fn dcl_indexable_temp(reg: u32, count: u32) -> Declaration {
    let mut d = Declaration::new(Opcode::DclIndexableTemp, Operand::null());
    d.temp_reg = reg;
    d.num_temps = count;
    d
}

pub fn dcl_thread_group(x: u32, y: u32, z: u32) -> Declaration {
    let mut d = Declaration::new(Opcode::DclThreadGroup, Operand::null());
    d.group_size = [x, y, z];
    d
}

pub fn dcl_uav_raw(slot: u32) -> Declaration {
    Declaration::new(
        Opcode::DclUavRaw,
        Operand::slot_ref(OperandType::UnorderedAccessView, slot.into()),
    )
}

pub fn dcl_uav_structured(slot: u32, stride: u32) -> Declaration {
    let mut d = Declaration::new(
        Opcode::DclUavStructured,
        Operand::slot_ref(OperandType::UnorderedAccessView, slot.into()),
    );
    d.stride = stride;
    d
}

pub fn dcl_resource(slot: u32, dim: ResourceDimension) -> Declaration {
    let mut d = Declaration::new(
        Opcode::DclResource,
        Operand::slot_ref(OperandType::Resource, slot.into()),
    );
    d.dim = dim;
    d
}

pub fn dcl_sampler(slot: u32) -> Declaration {
    let mut d = Declaration::new(
        Opcode::DclSampler,
        Operand::slot_ref(OperandType::Sampler, slot.into()),
    );
    d.sampler_mode = SamplerMode::Default;
    d
}

// ---- Operands ----

pub fn imm_u(values: [u32; 4]) -> Operand {
    Operand::imm32(values)
}

pub fn imm_i(values: [i32; 4]) -> Operand {
    Operand::imm32(values.map(|v| v as u32))
}

pub fn imm_f(values: [f32; 4]) -> Operand {
    Operand::imm32(values.map(f32::to_bits))
}

pub fn uav(slot: u32) -> Operand {
    Operand::slot_ref(OperandType::UnorderedAccessView, slot.into())
}

pub fn srv(slot: u32) -> Operand {
    Operand::slot_ref(OperandType::Resource, slot.into())
}

pub fn tgsm(slot: u32) -> Operand {
    Operand::slot_ref(OperandType::ThreadGroupSharedMemory, slot.into())
}

// ---- Instructions ----

pub fn inst(opcode: Opcode, operands: Vec<Operand>) -> Instruction {
    Instruction::new(opcode, operands)
}

pub fn mov(dst: Operand, src: Operand) -> Instruction {
    Instruction::new(Opcode::Mov, vec![dst, src])
}

pub fn ret() -> Instruction {
    Instruction::new(Opcode::Ret, Vec::new())
}

// ---- Shader / state / global assembly ----

pub fn shader(declarations: Vec<Declaration>, instructions: Vec<Instruction>) -> Arc<DebugShader> {
    let shader = DebugShader {
        declarations,
        instructions,
        ..Default::default()
    };
    shader.validate().expect("test shader must validate");
    Arc::new(shader)
}

pub fn state_for(shader: &Arc<DebugShader>) -> State {
    State::new(Arc::clone(shader), 0)
}

/// A buffer-shaped UAV/SRV view over `len` elements of `format`.
pub fn buffer_view(len: u32, format: ViewFormat) -> ResourceView {
    ResourceView {
        data: vec![0; (len * format.element_stride()) as usize],
        first_element: 0,
        num_elements: len,
        format,
        ..Default::default()
    }
}

pub fn raw_view(bytes: usize) -> ResourceView {
    ResourceView {
        data: vec![0; bytes],
        first_element: 0,
        num_elements: (bytes / 4) as u32,
        format: ViewFormat::raw_u32(4),
        ..Default::default()
    }
}

/// Steps the invocation to completion, with a hang guard.
pub fn run(mut state: State, global: &mut GlobalState, api: &mut TestApi) -> State {
    let mut steps = 0u32;
    while !state.finished() {
        state = state.step(global, api, None);
        steps += 1;
        assert!(steps < 10_000, "interpreter failed to terminate");
    }
    state
}

/// Convenience: run a shader that only needs temps and immediates.
pub fn run_simple(declarations: Vec<Declaration>, instructions: Vec<Instruction>) -> State {
    let shader = shader(declarations, instructions);
    let mut global = GlobalState::new();
    let mut api = TestApi::default();
    run(state_for(&shader), &mut global, &mut api)
}

pub fn u32_format(num_comps: u32) -> ViewFormat {
    ViewFormat::raw_u32(num_comps)
}

pub fn format(byte_width: u32, num_comps: u32, comp_type: CompType) -> ViewFormat {
    ViewFormat::new(byte_width, num_comps, comp_type)
}
