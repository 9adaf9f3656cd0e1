//! Operand encoding: register selection, swizzles, masks, modifiers and
//! immediates.
//!
//! Component selectors use the same `[u8; 4]` layout for sources and
//! destinations. For a source, `comps[i]` names the source lane feeding
//! result lane `i` (a swizzle). For a destination, the selectors list the
//! written component indices in order (a write mask). In both cases
//! [`Operand::UNUSED`] marks an unused slot.

/// Register-file / binding namespace an operand addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandType {
    Temp,
    Input,
    Output,
    IndexableTemp,
    Immediate32,
    Immediate64,
    Sampler,
    Resource,
    ConstantBuffer,
    ImmediateConstantBuffer,
    Null,
    Rasterizer,
    OutputDepth,
    OutputDepthGreaterEqual,
    OutputDepthLessEqual,
    OutputStencilRef,
    OutputCoverageMask,
    ThreadGroupSharedMemory,
    UnorderedAccessView,
    InputThreadId,
    InputThreadGroupId,
    InputThreadIdInGroup,
    InputThreadIdInGroupFlattened,
    InputCoverageMask,
    InputPrimitiveId,
}

/// Declared component width of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumComponents {
    None,
    One,
    Four,
}

/// Per-source-operand modifier, applied after swizzling under the
/// operation's arithmetic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandModifier {
    None,
    Neg,
    Abs,
    /// `-abs(x)`: absolute value first, then negation.
    AbsNeg,
}

/// One dimension of an operand's register index.
///
/// `index` holds the absolute part (zero when `absolute` is false); if
/// `relative` is present, the x lane of that operand's value is added at
/// evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub struct OperandIndex {
    pub absolute: bool,
    pub index: u64,
    pub relative: Option<Box<Operand>>,
}

impl OperandIndex {
    pub fn abs(index: u64) -> Self {
        OperandIndex {
            absolute: true,
            index,
            relative: None,
        }
    }

    pub fn rel(base: u64, operand: Operand) -> Self {
        OperandIndex {
            absolute: true,
            index: base,
            relative: Some(Box::new(operand)),
        }
    }
}

/// A decoded instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub ty: OperandType,
    pub indices: Vec<OperandIndex>,
    /// Component selectors; see the module docs for the source/destination
    /// interpretation.
    pub comps: [u8; 4],
    pub num_components: NumComponents,
    pub modifier: OperandModifier,
    /// Literal words for `Immediate32` operands.
    pub values: [u32; 4],
}

impl Operand {
    /// Sentinel for an unused component selector slot.
    pub const UNUSED: u8 = 0xff;

    fn base(ty: OperandType, indices: Vec<OperandIndex>) -> Self {
        Operand {
            ty,
            indices,
            comps: [0, 1, 2, 3],
            num_components: NumComponents::Four,
            modifier: OperandModifier::None,
            values: [0; 4],
        }
    }

    pub fn temp(index: u64) -> Self {
        Self::base(OperandType::Temp, vec![OperandIndex::abs(index)])
    }

    pub fn indexable_temp(reg: u64, element: u64) -> Self {
        Self::base(
            OperandType::IndexableTemp,
            vec![OperandIndex::abs(reg), OperandIndex::abs(element)],
        )
    }

    pub fn input(index: u64) -> Self {
        Self::base(OperandType::Input, vec![OperandIndex::abs(index)])
    }

    pub fn output(index: u64) -> Self {
        Self::base(OperandType::Output, vec![OperandIndex::abs(index)])
    }

    pub fn constant_buffer(register: u64, vector: u64) -> Self {
        Self::base(
            OperandType::ConstantBuffer,
            vec![OperandIndex::abs(register), OperandIndex::abs(vector)],
        )
    }

    /// Bind-slot operand (`t#`, `s#`, `u#`, `g#`).
    pub fn slot_ref(ty: OperandType, slot: u64) -> Self {
        Self::base(ty, vec![OperandIndex::abs(slot)])
    }

    pub fn null() -> Self {
        Operand {
            comps: [Self::UNUSED; 4],
            num_components: NumComponents::None,
            ..Self::base(OperandType::Null, Vec::new())
        }
    }

    /// 4-component 32-bit literal.
    pub fn imm32(values: [u32; 4]) -> Self {
        Operand {
            values,
            ..Self::base(OperandType::Immediate32, Vec::new())
        }
    }

    /// Scalar 32-bit literal.
    pub fn imm32_scalar(value: u32) -> Self {
        Operand {
            values: [value, 0, 0, 0],
            num_components: NumComponents::One,
            comps: [0, Self::UNUSED, Self::UNUSED, Self::UNUSED],
            ..Self::base(OperandType::Immediate32, Vec::new())
        }
    }

    pub fn with_swizzle(mut self, comps: [u8; 4]) -> Self {
        self.comps = comps;
        self
    }

    /// Replicate one source lane across all four result lanes.
    pub fn select(self, comp: u8) -> Self {
        self.with_swizzle([comp; 4])
    }

    /// Scalar source form: only lane 0 of the result is meaningful.
    pub fn scalar(self, comp: u8) -> Self {
        self.with_swizzle([comp, Self::UNUSED, Self::UNUSED, Self::UNUSED])
    }

    /// Destination write mask from a bitmask (bit 0 = x .. bit 3 = w).
    pub fn masked(mut self, mask: u8) -> Self {
        let mut comps = [Self::UNUSED; 4];
        let mut n = 0;
        for c in 0u8..4 {
            if mask & (1 << c) != 0 {
                comps[n] = c;
                n += 1;
            }
        }
        self.comps = comps;
        self
    }

    pub fn with_modifier(mut self, modifier: OperandModifier) -> Self {
        self.modifier = modifier;
        self
    }

    /// True when only the first component selector is in use, i.e. the
    /// operand yields a scalar.
    pub fn is_scalar_selection(&self) -> bool {
        self.comps[0] != Self::UNUSED
            && self.comps[1] == Self::UNUSED
            && self.comps[2] == Self::UNUSED
            && self.comps[3] == Self::UNUSED
    }

    /// First register index, for bind-slot style operands.
    pub fn slot(&self) -> u32 {
        self.indices.first().map(|i| i.index as u32).unwrap_or(0)
    }

    /// True when the operand has exactly one index that is absolute with no
    /// relative part (required for resource-info style queries).
    pub fn is_direct_slot(&self) -> bool {
        self.indices.len() == 1 && self.indices[0].absolute && self.indices[0].relative.is_none()
    }
}
