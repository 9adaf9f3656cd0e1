//! Raw, structured and typed resource access plus atomic read-modify-write.
//!
//! Address resolution follows the ISA contract: raw views are byte-addressed
//! with `first_element`/`num_elements` reinterpreted in byte units,
//! structured views address (element, byte-offset-within-element) with the
//! stride taken from the matching declaration, and typed texture views use
//! `x*stride + y*row_pitch + z*depth_pitch`. Out-of-bounds loads produce
//! zero; out-of-bounds stores and stores from helper lanes are dropped.

use std::sync::Arc;

use tracing::{error, warn};

use aero_sm4::{DebugShader, Instruction, Opcode, Operand, OperandType};

use crate::global::GlobalState;
use crate::packing::{typed_load, typed_store, ViewFormat};
use crate::state::{ShaderEvents, State};
use crate::value::ShaderVariable;

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    if let Some(out) = data.get_mut(offset..offset + 4) {
        out.copy_from_slice(&value.to_le_bytes());
    }
}

/// Stride and structured-ness of the UAV or SRV declared at `slot`.
fn declared_layout(shader: &DebugShader, srv: bool, slot: u32) -> (u32, bool) {
    let ty = if srv {
        OperandType::Resource
    } else {
        OperandType::UnorderedAccessView
    };

    match shader.find_slot_declaration(ty, slot) {
        Some(decl)
            if matches!(
                decl.kind,
                Opcode::DclUavStructured | Opcode::DclResourceStructured
            ) =>
        {
            (decl.stride, true)
        }
        _ => (4, false),
    }
}

impl State {
    /// Atomic read-modify-write on a UAV or group-shared allocation. The
    /// `imm_atomic_*` forms write the pre-operation value to their first
    /// operand; helper lanes skip the memory write entirely.
    pub(super) fn exec_atomic(
        &mut self,
        op: &Instruction,
        srcs: &[ShaderVariable],
        global: &mut GlobalState,
    ) {
        let shader = Arc::clone(self.shader());

        let has_return = matches!(
            op.opcode,
            Opcode::ImmAtomicIAdd
                | Opcode::ImmAtomicIMax
                | Opcode::ImmAtomicIMin
                | Opcode::ImmAtomicAnd
                | Opcode::ImmAtomicOr
                | Opcode::ImmAtomicXor
                | Opcode::ImmAtomicExch
                | Opcode::ImmAtomicCmpExch
                | Opcode::ImmAtomicUMax
                | Opcode::ImmAtomicUMin
        );

        // For the immediate forms, operand 0 is the before-value return and
        // operand 1 names the resource; the plain forms name the resource in
        // operand 0.
        let (before, resource_oper, address, src0, src1) = if has_return {
            (
                Some(&op.operands[0]),
                &op.operands[1],
                &srcs[1],
                &srcs[2],
                srcs.get(3),
            )
        } else {
            (None, &op.operands[0], &srcs[0], &srcs[1], srcs.get(2))
        };

        let slot = resource_oper.slot();
        let gsm = resource_oper.ty == OperandType::ThreadGroupSharedMemory;

        let (data, offset, num_elems, stride, structured) = if gsm {
            match global.groupshared.get_mut(slot as usize) {
                Some(mem) => (
                    mem.data.as_mut_slice(),
                    0,
                    mem.count,
                    mem.byte_stride,
                    mem.structured,
                ),
                None => {
                    warn!(slot, "atomic on undeclared group-shared allocation");
                    return;
                }
            }
        } else {
            let (stride, structured) = declared_layout(&shader, false, slot);
            match global.uavs.get_mut(&slot) {
                Some(view) => (
                    view.data.as_mut_slice(),
                    view.first_element,
                    view.num_elements,
                    stride,
                    structured,
                ),
                None => {
                    warn!(slot, "atomic on unbound UAV slot");
                    return;
                }
            }
        };

        if stride == 0 {
            error!(slot, "atomic destination has zero stride");
            return;
        }

        // .x is the element index; .y is the byte offset within a
        // structured element.
        let elem = address.u(0);
        let mut byte = (u64::from(offset) + u64::from(elem)) * u64::from(stride);
        if structured {
            byte += u64::from(address.u(1));
        }
        let byte = byte as usize;

        // Out-of-bounds atomics return undefined values and write nothing;
        // helper lanes must not mutate shared memory at all.
        if u64::from(offset) + u64::from(elem) >= u64::from(num_elems)
            || byte + 4 > data.len()
            || self.done
        {
            return;
        }

        let current = read_u32(data, byte).expect("bounds checked above");

        if let Some(before) = before {
            if before.ty != OperandType::Null {
                self.set_dst(before, op, &ShaderVariable::splat_u32("", current));
            }
        }

        let new = match op.opcode {
            Opcode::AtomicIAdd | Opcode::ImmAtomicIAdd => current.wrapping_add(src0.u(0)),
            Opcode::AtomicIMax | Opcode::ImmAtomicIMax => (current as i32).max(src0.i(0)) as u32,
            Opcode::AtomicIMin | Opcode::ImmAtomicIMin => (current as i32).min(src0.i(0)) as u32,
            Opcode::AtomicAnd | Opcode::ImmAtomicAnd => current & src0.u(0),
            Opcode::AtomicOr | Opcode::ImmAtomicOr => current | src0.u(0),
            Opcode::AtomicXor | Opcode::ImmAtomicXor => current ^ src0.u(0),
            Opcode::ImmAtomicExch => src0.u(0),
            Opcode::AtomicCmpStore | Opcode::ImmAtomicCmpExch => match src1 {
                Some(cmp) if current == cmp.u(0) => src0.u(0),
                _ => current,
            },
            Opcode::AtomicUMax | Opcode::ImmAtomicUMax => current.max(src0.u(0)),
            Opcode::AtomicUMin | Opcode::ImmAtomicUMin => current.min(src0.u(0)),
            other => {
                error!(opcode = other.name(), "not an atomic operation");
                return;
            }
        };

        write_u32(data, byte, new);
    }

    /// Raw, structured and typed loads and stores.
    pub(super) fn exec_load_store(
        &mut self,
        op: &Instruction,
        srcs: &[ShaderVariable],
        global: &mut GlobalState,
    ) {
        let shader = Arc::clone(self.shader());

        let load = matches!(
            op.opcode,
            Opcode::LdRaw | Opcode::LdUavTyped | Opcode::LdStructured
        );

        if load {
            self.flags |= ShaderEvents::SAMPLE_LOAD_GATHER;
        }

        let structured = matches!(op.opcode, Opcode::LdStructured | Opcode::StoreStructured);
        let typed = matches!(op.opcode, Opcode::LdUavTyped | Opcode::StoreUavTyped);
        let raw = !structured && !typed;

        let resource_oper = match (op.opcode, load) {
            (Opcode::LdStructured, _) => &op.operands[3],
            (_, true) => &op.operands[2],
            (_, false) => &op.operands[0],
        };
        let slot = resource_oper.slot();
        let srv = load && resource_oper.ty == OperandType::Resource;
        let gsm = resource_oper.ty == OperandType::ThreadGroupSharedMemory;

        let elem_idx = srcs[0].u(0);
        let elem_offset = if structured { srcs[1].u(0) } else { 0 };
        let tex_coords = [srcs[0].u(0), srcs[0].u(1), srcs[0].u(2)];

        // Structured strides come from the instruction when the encoder
        // carried one, otherwise from the declaration. Raw access is
        // byte-addressed; typed access starts from dword units and is fixed
        // up per view below.
        let mut stride = if raw { 1 } else { 4 };
        if structured {
            stride = op.stride;
            if stride == 0 && !gsm {
                let (declared, is_structured) = declared_layout(&shader, srv, slot);
                if is_structured {
                    stride = declared;
                }
            }
        }

        let (data, offset, num_elems, fmt, tex, row_pitch, depth_pitch) = if gsm {
            match global.groupshared.get_mut(slot as usize) {
                Some(mem) => {
                    stride = mem.byte_stride;
                    (
                        mem.data.as_mut_slice(),
                        0u32,
                        mem.count,
                        ViewFormat::raw_u32(mem.byte_stride / 4),
                        false,
                        0u32,
                        0u32,
                    )
                }
                None => {
                    warn!(slot, "access to undeclared group-shared allocation");
                    if load {
                        self.set_dst(&op.operands[0], op, &ShaderVariable::zero(""));
                    }
                    return;
                }
            }
        } else {
            let view = if srv {
                global.srvs.get_mut(&slot)
            } else {
                global.uavs.get_mut(&slot)
            };
            match view {
                Some(view) => {
                    let fmt = view.format;
                    // Raw indexing is in bytes while the view extent is in
                    // format-sized units; scale the extent up. Typed buffer
                    // views address whole format elements.
                    let (mut offset, mut num_elems) = (view.first_element, view.num_elements);
                    if raw {
                        let unit = fmt.byte_width.min(4);
                        offset = offset.saturating_mul(unit);
                        num_elems = num_elems.saturating_mul(unit);
                    } else if typed && !view.is_texture {
                        stride = fmt.element_stride();
                    }
                    (
                        view.data.as_mut_slice(),
                        offset,
                        num_elems,
                        fmt,
                        !srv && view.is_texture,
                        view.row_pitch,
                        view.depth_pitch,
                    )
                }
                None => {
                    warn!(slot, srv, "access to unbound resource slot");
                    if load {
                        self.set_dst(&op.operands[0], op, &ShaderVariable::zero(""));
                    }
                    return;
                }
            }
        };

        if stride == 0 {
            error!(
                opcode = op.opcode.name(),
                slot, "resource access with no usable stride"
            );
            if load {
                self.set_dst(&op.operands[0], op, &ShaderVariable::zero(""));
            }
            return;
        }

        let tex_offset = u64::from(tex_coords[0]) * u64::from(fmt.element_stride())
            + u64::from(tex_coords[1]) * u64::from(row_pitch)
            + u64::from(tex_coords[2]) * u64::from(depth_pitch);

        let out_of_bounds = if tex {
            tex_offset >= data.len() as u64
        } else {
            elem_idx >= num_elems
        };

        if out_of_bounds {
            if load {
                self.set_dst(&op.operands[0], op, &ShaderVariable::zero(""));
            }
            return;
        }

        let byte = if tex {
            tex_offset as usize
        } else {
            ((u64::from(offset) + u64::from(elem_idx)) * u64::from(stride)
                + u64::from(elem_offset)) as usize
        };

        // Maximum number of components the access may touch: the declared
        // element bounds it for structured views, the format for typed ones.
        let max_index = if structured {
            (stride.saturating_sub(elem_offset) / 4) as usize
        } else if raw {
            4
        } else {
            fmt.num_comps as usize
        };

        if load {
            let element = data.get(byte..).unwrap_or(&[]);
            let mut fetch = typed_load(&fmt, element);

            // When assigning into a scalar destination the masked write
            // expects the value in lane 0; propagate the selected component
            // across.
            if op.operands[0].is_scalar_selection() {
                let comp = op.operands[0].comps[0] as usize % 4;
                let v = fetch.u(comp);
                fetch.set_u(0, v);
            }

            self.set_dst(&op.operands[0], op, &fetch);
        } else {
            // Helper and inactive lanes never mutate UAV or group-shared
            // bytes.
            if self.done {
                return;
            }

            // The store mask is contiguous from .x; count the components
            // that fit inside the element.
            let mut count = 0usize;
            for lane in 0..4 {
                let comp = op.operands[0].comps[lane];
                if comp == Operand::UNUSED || comp as usize >= max_index {
                    break;
                }
                count += 1;
            }

            if count == 0 {
                return;
            }

            let value = if structured { &srcs[2] } else { &srcs[1] };

            let mut efmt = fmt;
            if matches!(fmt.byte_width, 1 | 2 | 4) {
                efmt.num_comps = count as u32;
            }

            if let Some(element) = data.get_mut(byte..) {
                typed_store(&efmt, element, value);
            }
        }
    }
}
