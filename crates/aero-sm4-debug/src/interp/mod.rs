//! The per-opcode dispatcher.
//!
//! `State::step` is the single transition function: it evaluates the source
//! operands of the instruction under the program counter, applies the
//! opcode's semantics, and writes results through the destination mask.
//! Memory, sampling and structured-control-flow opcodes live in sibling
//! modules.

mod flow;
mod memory;
mod sample;

use std::sync::Arc;

use half::f16;
use tracing::error;

use aero_sm4::{Opcode, Operand};

use crate::api::DebugApiWrapper;
use crate::global::GlobalState;
use crate::state::{ShaderEvents, State};
use crate::value::{
    add_var, div_var, dxbc_max, dxbc_max64, dxbc_min, dxbc_min64, flush_denorm, mul_var, neg_var,
    round_ne, ShaderVariable,
};

/// Reverse the bits of the low half, then shift the result into the upper
/// half: `bfrev` is defined over the low 16 bits.
fn bitwise_reverse_lsb16(x: u32) -> u32 {
    (x & 0xffff).reverse_bits()
}

impl State {
    /// Executes one instruction and returns the successor state.
    ///
    /// `quad` supplies the sibling lane states needed by derivative and
    /// implicit-derivative sample opcodes; pass `None` outside pixel
    /// debugging. When the API wrapper declines a delegated intrinsic the
    /// returned state has an unchanged program counter so the harness can
    /// retry the same instruction.
    pub fn step(
        &self,
        global: &mut GlobalState,
        api: &mut dyn DebugApiWrapper,
        quad: Option<&[State; 4]>,
    ) -> State {
        let shader = Arc::clone(self.shader());

        let mut s = self.clone();
        s.modified.clear();

        if s.program_counter >= shader.num_instructions() {
            return s;
        }

        let op = shader.instruction(s.program_counter);

        api.set_current_instruction(s.program_counter as u32);
        s.program_counter += 1;
        s.flags = ShaderEvents::empty();

        if op.operands.len() < op.opcode.operand_count() {
            error!(
                opcode = op.opcode.name(),
                have = op.operands.len(),
                want = op.opcode.operand_count(),
                "instruction is missing operands"
            );
            return s;
        }

        let optype = op.opcode.operation_type();

        // Operand 0 is the (first) destination; everything after it is
        // evaluated up front as a source.
        let srcs: Vec<ShaderVariable> = op
            .operands
            .iter()
            .skip(1)
            .map(|oper| self.get_src(oper, op))
            .collect();

        use Opcode::*;
        match op.opcode {
            // ---- Arithmetic ----
            DAdd | IAdd | Add => {
                s.set_dst(&op.operands[0], op, &add_var(&srcs[0], &srcs[1], optype));
            }
            DDiv | Div => {
                s.set_dst(&op.operands[0], op, &div_var(&srcs[0], &srcs[1], optype));
            }
            DMul | Mul => {
                s.set_dst(&op.operands[0], op, &mul_var(&srcs[0], &srcs[1], optype));
            }
            UDiv => {
                // Division by zero produces all-ones in both results.
                let mut quot = ShaderVariable::splat_u32("", u32::MAX);
                let mut rem = ShaderVariable::splat_u32("", u32::MAX);

                for lane in 0..4 {
                    let d = srcs[2].u(lane);
                    if d != 0 {
                        let q = srcs[1].u(lane) / d;
                        quot.set_u(lane, q);
                        rem.set_u(lane, srcs[1].u(lane) - q * d);
                    }
                }

                if op.operands[0].ty != aero_sm4::OperandType::Null {
                    s.set_dst(&op.operands[0], op, &quot);
                }
                if op.operands[1].ty != aero_sm4::OperandType::Null {
                    s.set_dst(&op.operands[1], op, &rem);
                }
            }
            IMul | UMul => {
                let mut hi = ShaderVariable::zero("");
                let mut lo = ShaderVariable::zero("");

                for lane in 0..4 {
                    let wide = if op.opcode == UMul {
                        u64::from(srcs[1].u(lane)).wrapping_mul(u64::from(srcs[2].u(lane)))
                    } else {
                        (i64::from(srcs[1].i(lane)).wrapping_mul(i64::from(srcs[2].i(lane)))) as u64
                    };
                    hi.set_u(lane, (wide >> 32) as u32);
                    lo.set_u(lane, wide as u32);
                }

                if op.operands[0].ty != aero_sm4::OperandType::Null {
                    s.set_dst(&op.operands[0], op, &hi);
                }
                if op.operands[1].ty != aero_sm4::OperandType::Null {
                    s.set_dst(&op.operands[1], op, &lo);
                }
            }
            UAddc => {
                let mut sum = ShaderVariable::zero("");
                let mut carry = ShaderVariable::zero("");

                for lane in 0..4 {
                    let wide = u64::from(srcs[1].u(lane)) + u64::from(srcs[2].u(lane));
                    sum.set_u(lane, wide as u32);
                    carry.set_u(lane, u32::from(wide > u64::from(u32::MAX)));
                }

                s.set_dst(&op.operands[0], op, &sum);
                if op.operands[1].ty != aero_sm4::OperandType::Null {
                    s.set_dst(&op.operands[1], op, &carry);
                }
            }
            USubb => {
                let mut diff = ShaderVariable::zero("");
                let mut borrow = ShaderVariable::zero("");

                for lane in 0..4 {
                    // Bias by 2^32 so the subtraction stays in range; the
                    // borrow output marks whether the bias was consumed.
                    let wide = (0x1_0000_0000u64 | u64::from(srcs[1].u(lane)))
                        - u64::from(srcs[2].u(lane));
                    diff.set_u(lane, wide as u32);
                    borrow.set_u(lane, u32::from(wide <= u64::from(u32::MAX)));
                }

                s.set_dst(&op.operands[0], op, &diff);
                if op.operands[1].ty != aero_sm4::OperandType::Null {
                    s.set_dst(&op.operands[1], op, &borrow);
                }
            }
            IMad | UMad | Mad | DFma => {
                let product = mul_var(&srcs[0], &srcs[1], optype);
                s.set_dst(&op.operands[0], op, &add_var(&product, &srcs[2], optype));
            }
            Dp2 | Dp3 | Dp4 => {
                let dot = mul_var(&srcs[0], &srcs[1], optype);

                let mut sum = dot.f(0) + dot.f(1);
                if matches!(op.opcode, Dp3 | Dp4) {
                    sum += dot.f(2);
                }
                if op.opcode == Dp4 {
                    sum += dot.f(3);
                }

                s.set_dst(&op.operands[0], op, &ShaderVariable::splat_f32("", sum));
            }
            Frc => {
                let mut r = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..4 {
                    let x = srcs[0].f(lane);
                    r.set_f(lane, x - x.floor());
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            RoundPi | RoundNi | RoundZ | RoundNe => {
                let mut r = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..4 {
                    let x = srcs[0].f(lane);
                    let v = match op.opcode {
                        RoundPi => x.ceil(),
                        RoundNi => x.floor(),
                        RoundZ => x.trunc(),
                        _ => round_ne(x),
                    };
                    r.set_f(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            INeg => {
                let r = neg_var(&srcs[0], optype);
                s.set_dst(&op.operands[0], op, &r);
            }
            IMin | IMax => {
                let mut r = ShaderVariable::from_i32s("", [0; 4]);
                for lane in 0..4 {
                    let (a, b) = (srcs[0].i(lane), srcs[1].i(lane));
                    let v = if op.opcode == IMin {
                        if a < b { a } else { b }
                    } else if a >= b {
                        a
                    } else {
                        b
                    };
                    r.set_i(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            UMin | UMax => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let (a, b) = (srcs[0].u(lane), srcs[1].u(lane));
                    let v = if op.opcode == UMin {
                        if a < b { a } else { b }
                    } else if a >= b {
                        a
                    } else {
                        b
                    };
                    r.set_u(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            Min | Max => {
                let mut r = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..4 {
                    let (a, b) = (srcs[0].f(lane), srcs[1].f(lane));
                    let v = if op.opcode == Min { dxbc_min(a, b) } else { dxbc_max(a, b) };
                    r.set_f(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            DMin | DMax => {
                let (a, b) = (srcs[0].doubles(), srcs[1].doubles());
                let mut r = ShaderVariable::zero("");
                if op.opcode == DMin {
                    r.set_doubles([dxbc_min64(a[0], b[0]), dxbc_min64(a[1], b[1])]);
                } else {
                    r.set_doubles([dxbc_max64(a[0], b[0]), dxbc_max64(a[1], b[1])]);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            DRcp => {
                let d = srcs[0].doubles();
                let mut r = ShaderVariable::zero("");
                r.set_doubles([1.0 / d[0], 1.0 / d[1]]);
                s.set_dst(&op.operands[0], op, &r);
            }

            // ---- Half conversions; inputs are halves encoded in uints, so
            // denormal flushing is applied by hand on both sides ----
            F16toF32 => {
                let mut r = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..4 {
                    let h = f16::from_bits((srcs[0].u(lane) & 0xffff) as u16);
                    r.set_f(lane, flush_denorm(h.to_f32()));
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            F32toF16 => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let h = f16::from_f32(flush_denorm(srcs[0].f(lane)));
                    r.set_u(lane, u32::from(h.to_bits()));
                }
                s.set_dst(&op.operands[0], op, &r);
            }

            // ---- Bit manipulation ----
            Bfrev => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    r.set_u(lane, bitwise_reverse_lsb16(srcs[0].u(lane)));
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            Countbits => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    r.set_u(lane, srcs[0].u(lane).count_ones());
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            FirstbitHi => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let x = srcs[0].u(lane);
                    // Index 0 is the MSB for this instruction.
                    r.set_u(lane, if x == 0 { u32::MAX } else { x.leading_zeros() });
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            FirstbitLo => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let x = srcs[0].u(lane);
                    r.set_u(lane, if x == 0 { u32::MAX } else { x.trailing_zeros() });
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            FirstbitShi => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    // Find the first bit differing from the sign bit.
                    let mut x = srcs[0].u(lane);
                    if srcs[0].i(lane) < 0 {
                        x = !x;
                    }
                    r.set_u(lane, if x == 0 { u32::MAX } else { x.leading_zeros() });
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            IBfe => {
                let mut r = ShaderVariable::from_i32s("", [0; 4]);
                for lane in 0..4 {
                    let width = srcs[0].i(lane) & 0x1f;
                    let offset = srcs[1].i(lane) & 0x1f;
                    let v = if width == 0 {
                        0
                    } else if width + offset < 32 {
                        (srcs[2].i(lane) << (32 - (width + offset))) >> (32 - width)
                    } else {
                        srcs[2].i(lane) >> offset
                    };
                    r.set_i(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            UBfe => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let width = srcs[0].u(lane) & 0x1f;
                    let offset = srcs[1].u(lane) & 0x1f;
                    let v = if width == 0 {
                        0
                    } else if width + offset < 32 {
                        (srcs[2].u(lane) << (32 - (width + offset))) >> (32 - width)
                    } else {
                        srcs[2].u(lane) >> offset
                    };
                    r.set_u(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            Bfi => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let width = srcs[0].u(lane) & 0x1f;
                    let offset = srcs[1].u(lane) & 0x1f;
                    let bitmask = 1u32.wrapping_shl(width).wrapping_sub(1) << offset;
                    let v = ((srcs[2].u(lane) << offset) & bitmask) | (srcs[3].u(lane) & !bitmask);
                    r.set_u(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            IShl | IShr | UShr => {
                let mut shifts = [0u32; 4];
                for lane in 0..4 {
                    shifts[lane] = srcs[1].u(lane) & 0x1f;
                }

                // A scalar-sourced shift amount applies to every lane.
                let shift_oper = &op.operands[2];
                if shift_oper.num_components == aero_sm4::NumComponents::One
                    || shift_oper.is_scalar_selection()
                {
                    shifts = [shifts[0]; 4];
                }

                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let v = match op.opcode {
                        IShl => (srcs[0].i(lane) << shifts[lane]) as u32,
                        IShr => (srcs[0].i(lane) >> shifts[lane]) as u32,
                        _ => srcs[0].u(lane) >> shifts[lane],
                    };
                    r.set_u(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            And | Or | Xor => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let (a, b) = (srcs[0].u(lane), srcs[1].u(lane));
                    let v = match op.opcode {
                        And => a & b,
                        Or => a | b,
                        _ => a ^ b,
                    };
                    r.set_u(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            Not => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    r.set_u(lane, !srcs[0].u(lane));
                }
                s.set_dst(&op.operands[0], op, &r);
            }

            // ---- Transcendentals with loose ULP requirements; evaluated by
            // the host GPU so the debugger shows representative values ----
            Rcp | Rsq | Sqrt | Exp | Log => {
                match api.calculate_math_intrinsic(op.opcode, &srcs[0]) {
                    Some((a, _)) => s.set_dst(&op.operands[0], op, &a),
                    None => {
                        s.program_counter = self.program_counter;
                        return s;
                    }
                }
            }
            SinCos => {
                match api.calculate_math_intrinsic(SinCos, &srcs[1]) {
                    Some((sin, cos)) => {
                        if op.operands[0].ty != aero_sm4::OperandType::Null {
                            s.set_dst(&op.operands[0], op, &sin);
                        }
                        if op.operands[1].ty != aero_sm4::OperandType::Null {
                            s.set_dst(&op.operands[1], op, &cos);
                        }
                    }
                    None => {
                        s.program_counter = self.program_counter;
                        return s;
                    }
                }
            }

            // ---- Moves and selects ----
            Nop | CustomData | Sync => {}
            DMov | Mov => s.set_dst(&op.operands[0], op, &srcs[0]),
            DMovc => {
                // Predicate lanes .x and .y drive the packed double pairs.
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let pred = srcs[0].u(lane / 2);
                    let v = if pred != 0 { srcs[1].u(lane) } else { srcs[2].u(lane) };
                    r.set_u(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            Movc => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let v = if srcs[0].i(lane) != 0 { srcs[1].u(lane) } else { srcs[2].u(lane) };
                    r.set_u(lane, v);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            Swapc => {
                // srcs[0] is the second destination evaluated as a source;
                // the predicate and values follow it.
                let mut first = ShaderVariable::zero("");
                let mut second = ShaderVariable::zero("");
                for lane in 0..4 {
                    let pred = srcs[1].i(lane) != 0;
                    first.set_u(lane, if pred { srcs[3].u(lane) } else { srcs[2].u(lane) });
                    second.set_u(lane, if pred { srcs[2].u(lane) } else { srcs[3].u(lane) });
                }
                s.set_dst(&op.operands[0], op, &first);
                s.set_dst(&op.operands[1], op, &second);
            }

            // ---- Conversions ----
            ItoF => {
                let mut r = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..4 {
                    r.set_f(lane, srcs[0].i(lane) as f32);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            UtoF => {
                let mut r = ShaderVariable::from_f32s("", [0.0; 4]);
                for lane in 0..4 {
                    r.set_f(lane, srcs[0].u(lane) as f32);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            FtoI => {
                let mut r = ShaderVariable::from_i32s("", [0; 4]);
                for lane in 0..4 {
                    r.set_i(lane, srcs[0].f(lane) as i32);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            FtoU => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    r.set_u(lane, srcs[0].f(lane) as u32);
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            ItoD | UtoD | FtoD => {
                let mut res = match op.opcode {
                    ItoD => [f64::from(srcs[0].i(0)), f64::from(srcs[0].i(1))],
                    UtoD => [f64::from(srcs[0].u(0)), f64::from(srcs[0].u(1))],
                    _ => [f64::from(srcs[0].f(0)), f64::from(srcs[0].f(1))],
                };

                // A 1-wide source leaves nothing meaningful in the second
                // pair; replicate so the destination can swizzle either.
                if op.operands[1].comps[2] == Operand::UNUSED {
                    res[1] = res[0];
                }

                let mut r = ShaderVariable::zero("");
                r.set_doubles(res);
                s.set_dst(&op.operands[0], op, &r);
            }
            DtoI | DtoU | DtoF => {
                let src = srcs[0].doubles();

                // The destination mask steers the two results: the first
                // masked component takes double 0, the second (if any)
                // double 1.
                let mut r = ShaderVariable::zero("");
                let comps = op.operands[0].comps;
                let pairs = if comps[1] == Operand::UNUSED { 1 } else { 2 };
                for slot in 0..pairs {
                    let dst_lane = comps[slot] as usize % 4;
                    match op.opcode {
                        DtoU => r.set_u(dst_lane, src[slot] as u32),
                        DtoI => r.set_i(dst_lane, src[slot] as i32),
                        _ => r.set_f(dst_lane, src[slot] as f32),
                    }
                }

                s.set_dst(&op.operands[0], op, &r);
            }

            // ---- Comparisons: all-ones on true, zero on false ----
            Eq | Ne | Lt | Ge => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let (a, b) = (srcs[0].f(lane), srcs[1].f(lane));
                    let hit = match op.opcode {
                        Eq => a == b,
                        Ne => a != b,
                        Lt => a < b,
                        _ => a >= b,
                    };
                    r.set_u(lane, if hit { u32::MAX } else { 0 });
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            IEq | INe | IGe | ILt => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let (a, b) = (srcs[0].i(lane), srcs[1].i(lane));
                    let hit = match op.opcode {
                        IEq => a == b,
                        INe => a != b,
                        IGe => a >= b,
                        _ => a < b,
                    };
                    r.set_u(lane, if hit { u32::MAX } else { 0 });
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            ULt | UGe => {
                let mut r = ShaderVariable::zero("");
                for lane in 0..4 {
                    let (a, b) = (srcs[0].u(lane), srcs[1].u(lane));
                    let hit = if op.opcode == ULt { a < b } else { a >= b };
                    r.set_u(lane, if hit { u32::MAX } else { 0 });
                }
                s.set_dst(&op.operands[0], op, &r);
            }
            DEq | DNe | DGe | DLt => {
                let (a, b) = (srcs[0].doubles(), srcs[1].doubles());

                let compare = |x: f64, y: f64| -> u32 {
                    let hit = match op.opcode {
                        DEq => x == y,
                        DNe => x != y,
                        DGe => x >= y,
                        _ => x < y,
                    };
                    if hit {
                        u32::MAX
                    } else {
                        0
                    }
                };

                // Steered by the destination mask like dtoi/dtou/dtof.
                let mut r = ShaderVariable::zero("");
                let comps = op.operands[0].comps;
                r.set_u(comps[0] as usize % 4, compare(a[0], b[0]));
                if comps[1] != Operand::UNUSED {
                    r.set_u(comps[1] as usize % 4, compare(a[1], b[1]));
                }

                s.set_dst(&op.operands[0], op, &r);
            }

            // ---- Derivatives. The ISA permits implementing all variants as
            // fine, but coarse is kept distinct to mirror hardware ----
            DerivRtx | DerivRtxCoarse | DerivRtxFine => match quad {
                None => error!("derivative instruction outside a quad, result undefined"),
                Some(quad) => {
                    let fine = op.opcode == DerivRtxFine;
                    let d = s.ddx(fine, quad, &op.operands[1], op);
                    s.set_dst(&op.operands[0], op, &d);
                }
            },
            DerivRty | DerivRtyCoarse | DerivRtyFine => match quad {
                None => error!("derivative instruction outside a quad, result undefined"),
                Some(quad) => {
                    let fine = op.opcode == DerivRtyFine;
                    let d = s.ddy(fine, quad, &op.operands[1], op);
                    s.set_dst(&op.operands[0], op, &d);
                }
            },

            // ---- Hidden counter atomics ----
            ImmAtomicAlloc => {
                let uav = global.uavs.entry(srcs[0].u(0)).or_default();
                let count = uav.hidden_counter;
                uav.hidden_counter = uav.hidden_counter.wrapping_add(1);
                s.set_dst(&op.operands[0], op, &ShaderVariable::splat_u32("", count));
            }
            ImmAtomicConsume => {
                let uav = global.uavs.entry(srcs[0].u(0)).or_default();
                uav.hidden_counter = uav.hidden_counter.wrapping_sub(1);
                let count = uav.hidden_counter;
                s.set_dst(&op.operands[0], op, &ShaderVariable::splat_u32("", count));
            }

            // ---- Memory ----
            AtomicIAdd | AtomicIMax | AtomicIMin | AtomicAnd | AtomicOr | AtomicXor
            | AtomicCmpStore | AtomicUMax | AtomicUMin | ImmAtomicIAdd | ImmAtomicIMax
            | ImmAtomicIMin | ImmAtomicAnd | ImmAtomicOr | ImmAtomicXor | ImmAtomicExch
            | ImmAtomicCmpExch | ImmAtomicUMax | ImmAtomicUMin => {
                s.exec_atomic(op, &srcs, global);
            }
            StoreUavTyped | StoreRaw | StoreStructured | LdRaw | LdUavTyped | LdStructured => {
                s.exec_load_store(op, &srcs, global);
            }

            // ---- Sampling, resource queries, interpolant evaluation ----
            EvalCentroid | EvalSampleIndex | EvalSnapped => {
                s.exec_eval(op, &srcs, global, api);
            }
            SampleInfo | SamplePos => {
                s.exec_sample_info(op, api);
            }
            BufInfo => {
                s.exec_bufinfo(op, api);
            }
            ResInfo => {
                s.exec_resinfo(op, &srcs, api);
            }
            Sample | SampleL | SampleB | SampleD | SampleC | SampleCLz | Ld | LdMs | Gather4
            | Gather4C | Gather4Po | Gather4PoC | Lod => {
                if !s.exec_sample_gather(self, op, &srcs, global, api, quad) {
                    s.program_counter = self.program_counter;
                }
            }

            // ---- Control flow ----
            Switch | Case | Default | Loop | EndSwitch | EndIf | Continue | Continuec
            | EndLoop | Break | Breakc | If | Else | Discard | Ret | Retc => {
                s.exec_flow(op);
            }

            other => {
                error!(opcode = other.name(), "unsupported operation in shader debugging");
            }
        }

        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bfrev_uses_upper_half_of_reversal() {
        // Reversing the low 16 bits and shifting up keeps a round-trip
        // identity on the low halfword.
        let x = 0x0000_a5c3u32;
        let once = bitwise_reverse_lsb16(x);
        assert_eq!(once & 0xffff, 0);
        let twice = bitwise_reverse_lsb16(once >> 16);
        assert_eq!(twice >> 16, x & 0xffff);
    }
}
