//! Sampling, gathers, resource queries and pixel interpolant evaluation.
//!
//! Everything that needs real texture hardware goes through the
//! [`DebugApiWrapper`]; this module collects declaration metadata, computes
//! implicit derivatives from the quad, and post-processes results (swizzles,
//! return-type conversion, scalar destination propagation).

use std::sync::Arc;

use tracing::{error, warn};

use aero_sm4::{
    GatherChannel, Instruction, Opcode, Operand, OperandType, ResinfoRetType, ResourceDimension,
    ResourceRetType, SamplerMode, VarType,
};

use crate::api::{
    DebugApiWrapper, MessageCategory, MessageSeverity, MessageSource, SampleGatherResourceData,
    SampleGatherSamplerData,
};
use crate::global::{GlobalState, SampleEvalCacheKey};
use crate::packing::typed_load;
use crate::state::{ShaderEvents, State};
use crate::value::ShaderVariable;

/// Standard multisample position patterns, as (x, y) pairs in 16ths of a
/// pixel.
const SAMPLE_PATTERN_2X: [f32; 4] = [4.0, 4.0, -4.0, -4.0];
const SAMPLE_PATTERN_4X: [f32; 8] = [-2.0, -6.0, 6.0, -2.0, -6.0, 2.0, 2.0, 6.0];
const SAMPLE_PATTERN_8X: [f32; 16] = [
    1.0, -3.0, -1.0, 3.0, 5.0, 1.0, -3.0, -5.0, -5.0, 5.0, -7.0, -1.0, 3.0, 7.0, 7.0, -7.0,
];
const SAMPLE_PATTERN_16X: [f32; 32] = [
    1.0, 1.0, -1.0, -3.0, -3.0, 2.0, 4.0, -1.0, -5.0, -2.0, 2.0, 5.0, 5.0, 3.0, 3.0, -5.0, -2.0,
    6.0, 0.0, -7.0, -4.0, -6.0, -6.0, 4.0, -8.0, 0.0, 7.0, -4.0, 6.0, 7.0, -7.0, -8.0,
];

/// Applies a source-operand swizzle where unused selectors replicate lane 0
/// (the convention for resource-info results).
fn swizzle_or_lane0(value: &ShaderVariable, comps: [u8; 4]) -> ShaderVariable {
    let mut out = ShaderVariable::zero("");
    for lane in 0..4 {
        let src = if comps[lane] == Operand::UNUSED {
            0
        } else {
            comps[lane] as usize % 4
        };
        out.set_u(lane, value.u(src));
    }
    out
}

/// Copies the selected component into lane 0 when the destination mask is a
/// single component, matching what the masked write expects of scalars.
fn propagate_scalar(result: &mut ShaderVariable, dst: &Operand) {
    if dst.is_scalar_selection() {
        let comp = dst.comps[0] as usize % 4;
        let v = result.u(comp);
        result.set_u(0, v);
    }
}

impl State {
    /// `sample*`, `gather4*`, `ld`, `ld_ms` and `lod`. Returns false when
    /// the wrapper declined the lookup, in which case the caller rewinds the
    /// program counter.
    pub(super) fn exec_sample_gather(
        &mut self,
        prev: &State,
        op: &Instruction,
        srcs: &[ShaderVariable],
        global: &mut GlobalState,
        api: &mut dyn DebugApiWrapper,
        quad: Option<&[State; 4]>,
    ) -> bool {
        let shader = Arc::clone(self.shader());

        if op.opcode != Opcode::Lod {
            self.flags |= ShaderEvents::SAMPLE_LOAD_GATHER;
        }

        let mut sampler_mode = SamplerMode::Default;
        let mut resource_dim = ResourceDimension::Unknown;
        let mut resource_ret = ResourceRetType::Unknown;
        let mut sample_count = 0u32;

        let resource_slot = op.operands[2].slot();

        for decl in &shader.declarations {
            if decl.kind == Opcode::DclSampler
                && op.operands.len() > 3
                && decl.operand.slot() == op.operands[3].slot()
            {
                sampler_mode = decl.sampler_mode;
            }

            if decl.kind == Opcode::DclResource
                && decl.operand.ty == OperandType::Resource
                && decl.operand.slot() == resource_slot
            {
                // A buffer-dimension ld bypasses the wrapper and reads the
                // backing store through the format codec.
                if decl.dim == ResourceDimension::Buffer && op.opcode == Opcode::Ld {
                    self.buffer_srv_load(op, srcs, global, resource_slot);
                    return true;
                }

                resource_dim = decl.dim;
                resource_ret = decl.resource_ret_type[0];
                sample_count = decl.sample_count;
            }
        }

        // lod is only defined for these dimensions; everything else reads
        // back zero.
        if op.opcode == Opcode::Lod
            && !matches!(
                resource_dim,
                ResourceDimension::Texture1D
                    | ResourceDimension::Texture1DArray
                    | ResourceDimension::Texture2D
                    | ResourceDimension::Texture2DArray
                    | ResourceDimension::Texture3D
                    | ResourceDimension::TextureCube
            )
        {
            self.set_dst(&op.operands[0], op, &ShaderVariable::from_f32s("tex", [0.0; 4]));
            return true;
        }

        let uv = &srcs[0];
        let mut ddx_calc = ShaderVariable::from_f32s("", [0.0; 4]);
        let mut ddy_calc = ShaderVariable::from_f32s("", [0.0; 4]);

        match op.opcode {
            // Implicit-derivative operations difference the quad with coarse
            // derivatives.
            Opcode::Sample | Opcode::SampleB | Opcode::SampleC | Opcode::Lod => match quad {
                Some(quad) => {
                    ddx_calc = prev.ddx(false, quad, &op.operands[1], op);
                    ddy_calc = prev.ddy(false, quad, &op.operands[1], op);
                }
                None => {
                    error!("implicit-derivative sample outside a quad, result undefined");
                }
            },
            Opcode::SampleD => {
                ddx_calc = srcs[3].clone();
                ddy_calc = srcs[4].clone();
            }
            _ => {}
        }

        let mut sampler_slot = 0u32;
        for oper in &op.operands {
            if oper.ty == OperandType::Sampler {
                sampler_slot = oper.slot();
            }
        }

        let multisample_index = srcs.get(2).map(|v| v.i(0)).unwrap_or(0);
        let mut lod_or_compare = srcs.get(3).map(|v| v.f(0)).unwrap_or(0.0);
        if op.opcode == Opcode::Gather4PoC {
            lod_or_compare = srcs.get(4).map(|v| v.f(0)).unwrap_or(0.0);
        }

        let mut swizzle = [0u8; 4];
        for (lane, out) in swizzle.iter_mut().enumerate() {
            let comp = op.operands[2].comps[lane];
            *out = if comp == Operand::UNUSED { 0 } else { comp };
        }

        let mut gather_channel = GatherChannel::Red;
        if matches!(
            op.opcode,
            Opcode::Gather4 | Opcode::Gather4C | Opcode::Gather4Po | Opcode::Gather4PoC
        ) {
            gather_channel = GatherChannel::from_component(op.operands[3].comps[0]);
        }

        // There is no gradient-plus-bias sample, so the bias rides along in
        // sampler state instead.
        let mut sampler_bias = 0.0f32;
        if op.opcode == Opcode::SampleB {
            sampler_slot = srcs[2].u(0);
            sampler_bias = srcs[3].f(0);
        }

        let resource_data = SampleGatherResourceData {
            dim: resource_dim,
            ret_type: resource_ret,
            sample_count,
            slot: resource_slot,
        };
        let sampler_data = SampleGatherSamplerData {
            mode: sampler_mode,
            slot: sampler_slot,
            bias: sampler_bias,
        };

        match api.calculate_sample_gather(
            op.opcode,
            resource_data,
            sampler_data,
            uv,
            &ddx_calc,
            &ddy_calc,
            op.texel_offset,
            multisample_index,
            lod_or_compare,
            swizzle,
            gather_channel,
            &op.text,
        ) {
            Some(mut result) => {
                if op.operands[0].comps[1] == Operand::UNUSED {
                    let comp = op.operands[0].comps[0] as usize % 4;
                    let v = result.u(comp);
                    result.set_u(0, v);
                }
                self.set_dst(&op.operands[0], op, &result);
                true
            }
            None => false,
        }
    }

    /// `ld` against a buffer SRV: a plain codec read of the backing store.
    fn buffer_srv_load(
        &mut self,
        op: &Instruction,
        srcs: &[ShaderVariable],
        global: &GlobalState,
        slot: u32,
    ) {
        let Some(view) = global.srvs.get(&slot) else {
            warn!(slot, "buffer load from unbound SRV slot");
            self.set_dst(&op.operands[0], op, &ShaderVariable::zero(""));
            return;
        };

        let fmt = view.format;
        let stride = fmt.element_stride() as u64;
        let index = srcs[0].u(0);

        let mut result = ShaderVariable::from_f32s("", [0.0; 4]);
        if index < view.num_elements {
            let byte = (u64::from(view.first_element) + u64::from(index)) * stride;
            let element = view.data.get(byte as usize..).unwrap_or(&[]);
            result = typed_load(&fmt, element);
        }

        // Resource swizzle, with unused selectors reading component 0.
        let mut fetch = ShaderVariable::zero("");
        for lane in 0..4 {
            let comp = op.operands[2].comps[lane];
            let src = if comp == Operand::UNUSED { 0 } else { comp as usize % 4 };
            fetch.set_u(lane, result.u(src));
        }

        propagate_scalar(&mut fetch, &op.operands[0]);
        self.set_dst(&op.operands[0], op, &fetch);
    }

    /// `sample_info` and `sample_pos`.
    pub(super) fn exec_sample_info(&mut self, op: &Instruction, api: &mut dyn DebugApiWrapper) {
        let resource = &op.operands[1];
        let slot = resource.slot();
        let mut result =
            api.get_sample_info(resource.ty, resource.is_direct_slot(), slot, &op.text);

        // If nothing is bound at the slot the wrapper returns zero and the
        // pattern lookup below is skipped.
        if op.opcode == Opcode::SamplePos
            && result.u(0) > 0
            && op.operands[2].ty == OperandType::Immediate32
        {
            let sample_index = op.operands[2].values[0];
            let sample_count = result.u(0);

            let pattern: Option<&[f32]> = match sample_count {
                1 => {
                    warn!("non-multisampled resource passed to sample_pos");
                    api.add_debug_message(
                        MessageCategory::Shaders,
                        MessageSeverity::Medium,
                        MessageSource::RuntimeWarning,
                        &format!(
                            "{}\nNon-multisampled texture being passed to sample_pos",
                            op.text
                        ),
                    );
                    None
                }
                2 => Some(&SAMPLE_PATTERN_2X),
                4 => Some(&SAMPLE_PATTERN_4X),
                8 => Some(&SAMPLE_PATTERN_8X),
                16 => Some(&SAMPLE_PATTERN_16X),
                other => {
                    error!(sample_count = other, "unsupported sample count for sample_pos");
                    None
                }
            };

            if sample_index >= sample_count {
                warn!(
                    sample_index,
                    sample_count, "sample index out of bounds for sample_pos"
                );
                result = ShaderVariable::from_f32s("", [0.0; 4]);
            } else {
                match pattern {
                    Some(pattern) => {
                        // Positions are stored in 16ths of a pixel.
                        let x = pattern[sample_index as usize * 2] / 16.0;
                        let y = pattern[sample_index as usize * 2 + 1] / 16.0;
                        result.set_f(0, x);
                        result.set_f(1, y);
                    }
                    None => {
                        result.set_f(0, 0.0);
                        result.set_f(1, 0.0);
                    }
                }
            }
        }

        let swizzled = swizzle_or_lane0(&result, resource.comps);

        let mut out = match op.opcode {
            Opcode::SamplePos => {
                let mut v = swizzled;
                v.ty = VarType::Float;
                v
            }
            _ if op.resinfo_ret_type == ResinfoRetType::Float => {
                let mut v = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..4 {
                    v.set_f(lane, swizzled.u(lane) as f32);
                }
                v
            }
            _ => {
                let mut v = swizzled;
                v.ty = VarType::UInt;
                v
            }
        };

        propagate_scalar(&mut out, &op.operands[0]);
        self.set_dst(&op.operands[0], op, &out);
    }

    /// `bufinfo`: element count of a buffer view.
    pub(super) fn exec_bufinfo(&mut self, op: &Instruction, api: &mut dyn DebugApiWrapper) {
        let resource = &op.operands[1];

        if !resource.is_direct_slot() {
            error!("unexpected relative addressing on bufinfo");
            self.set_dst(&op.operands[0], op, &ShaderVariable::from_f32s("", [0.0; 4]));
            return;
        }

        let result = api.get_buffer_info(resource.ty, resource.slot(), &op.text);

        let mut out = swizzle_or_lane0(&result, resource.comps);
        out.ty = VarType::UInt;

        propagate_scalar(&mut out, &op.operands[0]);
        self.set_dst(&op.operands[0], op, &out);
    }

    /// `resinfo`: dimensions and mip count, with the return-type modifier
    /// applied.
    pub(super) fn exec_resinfo(
        &mut self,
        op: &Instruction,
        srcs: &[ShaderVariable],
        api: &mut dyn DebugApiWrapper,
    ) {
        let shader = Arc::clone(self.shader());
        let resource = &op.operands[2];

        if !resource.is_direct_slot() {
            error!("unexpected relative addressing on resinfo");
            self.set_dst(&op.operands[0], op, &ShaderVariable::from_f32s("", [0.0; 4]));
            return;
        }

        let mip_level = srcs[0].u(0);
        let (result, mut dim) = api.get_resource_info(resource.ty, resource.slot(), mip_level);

        // The reciprocal return type needs a valid dimensionality even when
        // the resource is unbound; fall back to the declaration.
        if dim == 0 {
            if let Some(decl) = shader.find_slot_declaration(OperandType::Resource, resource.slot())
            {
                dim = match decl.dim {
                    ResourceDimension::Buffer
                    | ResourceDimension::RawBuffer
                    | ResourceDimension::StructuredBuffer
                    | ResourceDimension::Texture1D
                    | ResourceDimension::Texture1DArray => 1,
                    ResourceDimension::Texture2D
                    | ResourceDimension::Texture2DMs
                    | ResourceDimension::Texture2DArray
                    | ResourceDimension::Texture2DMsArray
                    | ResourceDimension::TextureCube
                    | ResourceDimension::TextureCubeArray => 2,
                    ResourceDimension::Texture3D => 3,
                    ResourceDimension::Unknown => 0,
                };
            }
        }

        let swizzled = swizzle_or_lane0(&result, resource.comps);

        let mut out = match op.resinfo_ret_type {
            ResinfoRetType::Float => {
                let mut v = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..4 {
                    v.set_f(lane, swizzled.u(lane) as f32);
                }
                v
            }
            ResinfoRetType::RcpFloat => {
                // The reciprocal applies only to the width/height/depth
                // lanes covered by the resource's dimensionality.
                let mut v = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..3 {
                    let f = swizzled.u(lane) as f32;
                    v.set_f(lane, if (lane as u32) < dim { 1.0 / f } else { f });
                }
                v.set_f(3, swizzled.u(3) as f32);
                v
            }
            ResinfoRetType::UInt => {
                let mut v = swizzled;
                v.ty = VarType::UInt;
                v
            }
        };

        propagate_scalar(&mut out, &op.operands[0]);
        self.set_dst(&op.operands[0], op, &out);
    }

    /// `eval_centroid` / `eval_sample_index` / `eval_snapped`: look up the
    /// interpolant in the harness-populated cache, falling back to the value
    /// at the pixel centre.
    pub(super) fn exec_eval(
        &mut self,
        op: &Instruction,
        srcs: &[ShaderVariable],
        global: &GlobalState,
        api: &mut dyn DebugApiWrapper,
    ) {
        let interpolant = &op.operands[1];

        // Only plain inputs can be evaluated.
        if interpolant.ty != OperandType::Input {
            error!(ty = ?interpolant.ty, "eval_* on a non-input operand");
        }

        let mut key = SampleEvalCacheKey {
            quad_index: self.quad_index,
            input_register: interpolant.slot() as i32,
            ..SampleEvalCacheKey::default()
        };

        for lane in 0..4 {
            if op.operands[0].comps[lane] == Operand::UNUSED {
                break;
            }
            key.num_components = lane as u8 + 1;
        }

        let first_dst = op.operands[0].comps[0];
        if first_dst != Operand::UNUSED {
            let sel = interpolant.comps[first_dst as usize % 4];
            key.first_component = if sel == Operand::UNUSED { 0 } else { sel };
        }

        match op.opcode {
            Opcode::EvalSampleIndex => key.sample = srcs[1].i(0),
            Opcode::EvalSnapped => {
                key.offset_x = srcs[1].i(0).clamp(-8, 7);
                key.offset_y = srcs[1].i(1).clamp(-8, 7);
            }
            // eval_centroid keeps the defaults: sample -1, zero offset.
            _ => {}
        }

        match global.sample_eval_cache.get(&key) {
            Some(cached) => {
                let mut var = cached.clone();
                for lane in 0..4 {
                    let comp = interpolant.comps[lane];
                    if comp < 4 {
                        var.set_u(lane, cached.u(comp as usize));
                    }
                }
                self.set_dst(&op.operands[0], op, &var);
            }
            None => {
                // Either the cache is empty (no MSAA rendering) or the
                // requested combination is missing; the interpolant at the
                // centre is the best remaining answer.
                if !global.sample_eval_cache.is_empty() {
                    api.add_debug_message(
                        MessageCategory::Shaders,
                        MessageSeverity::Medium,
                        MessageSource::RuntimeWarning,
                        &format!(
                            "{}\nNo sample evaluate found in cache. Possible out-of-bounds sample index",
                            op.text
                        ),
                    );
                }

                self.set_dst(&op.operands[0], op, &srcs[0]);
            }
        }
    }
}
