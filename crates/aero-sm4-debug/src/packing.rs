//! Packed view-format codec for typed resource access.
//!
//! `byte_width` follows the container's convention: 1, 2 and 4 are literal
//! component widths, while 10 marks R10G10B10A2 and 11 marks R11G11B10.

use half::f16;
use tracing::error;

use crate::value::ShaderVariable;

/// Component interpretation of a resource view format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompType {
    UInt,
    SInt,
    UNorm,
    UNormSrgb,
    SNorm,
    Float,
}

/// Element format of a typed resource view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewFormat {
    /// Component width in bytes; 10 and 11 select the bit-packed formats.
    pub byte_width: u32,
    pub num_comps: u32,
    pub comp_type: CompType,
    /// Explicit element stride; zero means tightly packed.
    pub stride: u32,
}

impl ViewFormat {
    pub fn new(byte_width: u32, num_comps: u32, comp_type: CompType) -> Self {
        ViewFormat {
            byte_width,
            num_comps,
            comp_type,
            stride: 0,
        }
    }

    /// Raw 32-bit uint view, the implicit format of byte-address buffers and
    /// group-shared memory.
    pub fn raw_u32(num_comps: u32) -> Self {
        Self::new(4, num_comps, CompType::UInt)
    }

    pub fn element_stride(&self) -> u32 {
        if self.stride != 0 {
            self.stride
        } else {
            // The bit-packed formats occupy one dword regardless of
            // component count.
            match self.byte_width {
                10 | 11 => 4,
                w => w * self.num_comps,
            }
        }
    }
}

impl Default for ViewFormat {
    fn default() -> Self {
        Self::raw_u32(4)
    }
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes(bytes.try_into().expect("2-byte slice")))
}

/// 11-bit float: 5-bit exponent, 6-bit mantissa, no sign.
fn float11_to_f32(bits: u32) -> f32 {
    let exp = (bits >> 6) & 0x1f;
    let mant = bits & 0x3f;
    match exp {
        0 => (mant as f32 / 64.0) * 2f32.powi(-14),
        31 => {
            if mant == 0 {
                f32::INFINITY
            } else {
                f32::NAN
            }
        }
        _ => (1.0 + mant as f32 / 64.0) * 2f32.powi(exp as i32 - 15),
    }
}

/// 10-bit float: 5-bit exponent, 5-bit mantissa, no sign.
fn float10_to_f32(bits: u32) -> f32 {
    let exp = (bits >> 5) & 0x1f;
    let mant = bits & 0x1f;
    match exp {
        0 => (mant as f32 / 32.0) * 2f32.powi(-14),
        31 => {
            if mant == 0 {
                f32::INFINITY
            } else {
                f32::NAN
            }
        }
        _ => (1.0 + mant as f32 / 32.0) * 2f32.powi(exp as i32 - 15),
    }
}

fn unorm_bits(f: f32, max: f32) -> u32 {
    (f.clamp(0.0, 1.0) * max + 0.5) as u32
}

/// Round away from zero into a signed normalized integer.
fn snorm_bits(f: f32, max: f32) -> i32 {
    let scaled = f.clamp(-1.0, 1.0) * max;
    if scaled < 0.0 {
        (scaled - 0.5) as i32
    } else {
        (scaled + 0.5) as i32
    }
}

/// Decodes one element of a typed view into a register value.
///
/// Reads up to `num_comps` components; components whose bytes fall past the
/// end of `data` are left at zero rather than faulting.
pub fn typed_load(fmt: &ViewFormat, data: &[u8]) -> ShaderVariable {
    let mut result = ShaderVariable::from_f32s("", [0.0; 4]);
    let comps = fmt.num_comps.min(4) as usize;

    match fmt.byte_width {
        10 => {
            let Some(u) = read_u32(data, 0) else {
                return result;
            };
            match fmt.comp_type {
                CompType::UInt => {
                    result.set_u(0, u & 0x3ff);
                    result.set_u(1, (u >> 10) & 0x3ff);
                    result.set_u(2, (u >> 20) & 0x3ff);
                    result.set_u(3, (u >> 30) & 0x3);
                }
                CompType::UNorm => {
                    result.set_f(0, (u & 0x3ff) as f32 / 1023.0);
                    result.set_f(1, ((u >> 10) & 0x3ff) as f32 / 1023.0);
                    result.set_f(2, ((u >> 20) & 0x3ff) as f32 / 1023.0);
                    result.set_f(3, ((u >> 30) & 0x3) as f32 / 3.0);
                }
                _ => error!("unexpected component type on R10G10B10A2 view"),
            }
        }
        11 => {
            let Some(u) = read_u32(data, 0) else {
                return result;
            };
            result.set_f(0, float11_to_f32(u & 0x7ff));
            result.set_f(1, float11_to_f32((u >> 11) & 0x7ff));
            result.set_f(2, float10_to_f32((u >> 22) & 0x3ff));
            result.set_f(3, 1.0);
        }
        4 => {
            for c in 0..comps {
                if let Some(u) = read_u32(data, c * 4) {
                    result.set_u(c, u);
                }
            }
        }
        2 => {
            for c in 0..comps {
                let Some(u) = read_u16(data, c * 2) else {
                    break;
                };
                match fmt.comp_type {
                    CompType::Float => result.set_f(c, f16::from_bits(u).to_f32()),
                    CompType::UInt => result.set_u(c, u32::from(u)),
                    CompType::SInt => result.set_i(c, i32::from(u as i16)),
                    CompType::UNorm | CompType::UNormSrgb => {
                        result.set_f(c, f32::from(u) / 65535.0);
                    }
                    CompType::SNorm => {
                        // -32768 maps to -1, the rest divide by 32767.
                        let s = u as i16;
                        let f = if s == i16::MIN {
                            -1.0
                        } else {
                            f32::from(s) / 32767.0
                        };
                        result.set_f(c, f);
                    }
                }
            }
        }
        1 => {
            for c in 0..comps {
                let Some(&u) = data.get(c) else {
                    break;
                };
                match fmt.comp_type {
                    CompType::UInt => result.set_u(c, u32::from(u)),
                    CompType::SInt => result.set_i(c, i32::from(u as i8)),
                    CompType::UNorm | CompType::UNormSrgb => {
                        result.set_f(c, f32::from(u) / 255.0);
                    }
                    CompType::SNorm => {
                        let s = u as i8;
                        let f = if s == i8::MIN {
                            -1.0
                        } else {
                            f32::from(s) / 127.0
                        };
                        result.set_f(c, f);
                    }
                    CompType::Float => error!("unexpected float type on 8-bit view"),
                }
            }
        }
        w => error!(byte_width = w, "unexpected component width on view"),
    }

    result
}

/// Encodes a register value into one element of a typed view.
///
/// Writes up to `num_comps` components, stopping silently at the end of
/// `data`.
pub fn typed_store(fmt: &ViewFormat, data: &mut [u8], var: &ShaderVariable) {
    let comps = fmt.num_comps.min(4) as usize;

    match fmt.byte_width {
        10 => {
            let u = match fmt.comp_type {
                CompType::UInt => {
                    (var.u(0) & 0x3ff)
                        | ((var.u(1) & 0x3ff) << 10)
                        | ((var.u(2) & 0x3ff) << 20)
                        | ((var.u(3) & 0x3) << 30)
                }
                CompType::UNorm => {
                    unorm_bits(var.f(0), 1023.0)
                        | (unorm_bits(var.f(1), 1023.0) << 10)
                        | (unorm_bits(var.f(2), 1023.0) << 20)
                        | (unorm_bits(var.f(3), 3.0) << 30)
                }
                _ => {
                    error!("unexpected component type on R10G10B10A2 view");
                    0
                }
            };
            if let Some(out) = data.get_mut(0..4) {
                out.copy_from_slice(&u.to_le_bytes());
            }
        }
        11 => {
            error!("storing to R11G11B10 is not implemented");
            if let Some(out) = data.get_mut(0..4) {
                out.copy_from_slice(&0u32.to_le_bytes());
            }
        }
        4 => {
            for c in 0..comps {
                if let Some(out) = data.get_mut(c * 4..c * 4 + 4) {
                    out.copy_from_slice(&var.u(c).to_le_bytes());
                }
            }
        }
        2 => {
            for c in 0..comps {
                let Some(out) = data.get_mut(c * 2..c * 2 + 2) else {
                    break;
                };
                let bits: u16 = match fmt.comp_type {
                    CompType::Float => f16::from_f32(var.f(c)).to_bits(),
                    CompType::UInt => (var.u(c) & 0xffff) as u16,
                    CompType::SInt => {
                        var.i(c).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as u16
                    }
                    CompType::UNorm | CompType::UNormSrgb => unorm_bits(var.f(c), 65535.0) as u16,
                    CompType::SNorm => snorm_bits(var.f(c), 32767.0) as u16,
                };
                out.copy_from_slice(&bits.to_le_bytes());
            }
        }
        1 => {
            for c in 0..comps {
                let Some(out) = data.get_mut(c) else {
                    break;
                };
                *out = match fmt.comp_type {
                    CompType::UInt => (var.u(c) & 0xff) as u8,
                    CompType::SInt => {
                        var.i(c).clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as u8
                    }
                    CompType::UNorm | CompType::UNormSrgb => unorm_bits(var.f(c), 255.0) as u8,
                    CompType::SNorm => snorm_bits(var.f(c), 127.0) as u8,
                    CompType::Float => {
                        error!("unexpected float type on 8-bit view");
                        0
                    }
                };
            }
        }
        w => error!(byte_width = w, "unexpected component width on view"),
    }
}
