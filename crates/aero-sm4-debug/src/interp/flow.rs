//! Structured control flow over the flat instruction stream.
//!
//! There is no prebuilt CFG: every taken branch finds its target by a
//! depth-counted linear scan at decision time. `loop`, `case`, `default`,
//! `endswitch` and `endif` are pure labels; the interesting work happens on
//! `if`/`else`, `switch`, `break`, `continue` and `endloop`.

use std::sync::Arc;

use tracing::error;

use aero_sm4::{DebugShader, Instruction, Opcode};

use crate::state::State;

/// For a failed `if` at `if_index`, finds the instruction just past the
/// matching `else` or `endif`.
fn if_false_target(shader: &DebugShader, if_index: usize) -> Option<usize> {
    let mut depth = 0i32;

    for i in if_index..shader.num_instructions() {
        match shader.instruction(i).opcode {
            Opcode::If => depth += 1,
            // Only an else at our own depth ends the scan.
            Opcode::Else if depth == 1 => return Some(i + 1),
            Opcode::EndIf => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// From just past an `else`, finds the instruction past the matching
/// `endif`.
fn else_target(shader: &DebugShader, after_else: usize) -> Option<usize> {
    let mut depth = 1i32;

    for i in after_else..shader.num_instructions() {
        match shader.instruction(i).opcode {
            Opcode::If => depth += 1,
            Opcode::EndIf => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// From just past a taken `break`, finds the instruction past the enclosing
/// `endloop` or `endswitch`.
fn break_target(shader: &DebugShader, after_break: usize) -> Option<usize> {
    let mut depth = 1i32;

    for i in after_break..shader.num_instructions() {
        match shader.instruction(i).opcode {
            Opcode::Loop | Opcode::Switch => depth += 1,
            Opcode::EndLoop | Opcode::EndSwitch => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Scans backward from `start` (inclusive) for the `loop` opening the
/// enclosing loop. `initial_depth` is 1 when starting from a `continue`
/// (which the scan passes over) and 0 when starting from the `endloop`
/// itself.
fn loop_head(shader: &DebugShader, start: usize, initial_depth: i32) -> Option<usize> {
    let mut depth = initial_depth;

    for i in (0..=start).rev() {
        match shader.instruction(i).opcode {
            Opcode::EndLoop => depth += 1,
            Opcode::Loop => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Finds the jump target of a `switch`: the matching `case` (bitwise
/// comparison), else the first `default`, else the `endswitch` label.
/// Contiguous labels after the target are skipped so the program counter
/// lands on a real instruction.
fn switch_target(
    shader: &DebugShader,
    after_switch: usize,
    value: u32,
    case_value: impl Fn(&Instruction) -> u32,
) -> Option<usize> {
    let mut depth = 0i32;
    let mut jump = None;

    let mut i = after_switch;
    while i < shader.num_instructions() {
        let next = shader.instruction(i);
        match next.opcode {
            Opcode::Switch => depth += 1,
            Opcode::EndSwitch if depth == 0 => {
                if jump.is_none() {
                    jump = Some(i);
                }
                break;
            }
            Opcode::EndSwitch => depth -= 1,
            // Remember the default label; a later matching case overrides it.
            Opcode::Default if depth == 0 && jump.is_none() => jump = Some(i),
            Opcode::Case if depth == 0 => {
                if case_value(next) == value {
                    jump = Some(i);
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let mut target = jump?;
    while target < shader.num_instructions()
        && matches!(
            shader.instruction(target).opcode,
            Opcode::Case | Opcode::Default
        )
    {
        target += 1;
    }

    Some(target)
}

impl State {
    pub(super) fn exec_flow(&mut self, op: &Instruction) {
        let shader = Arc::clone(self.shader());

        // Predicated opcodes share one polarity rule: the branch is taken
        // when the operand's non-zeroness matches the test boolean.
        let predicate_taken = |state: &State| -> bool {
            let test = state.get_src(&op.operands[0], op).i(0);
            (test != 0) == op.nonzero
        };

        match op.opcode {
            // Pure labels.
            Opcode::Case | Opcode::Default | Opcode::Loop | Opcode::EndSwitch | Opcode::EndIf => {}

            Opcode::If => {
                if !predicate_taken(self) {
                    // Jump past the matching else/endif; the if itself is at
                    // program_counter - 1.
                    match if_false_target(&shader, self.program_counter - 1) {
                        Some(target) => self.program_counter = target,
                        None => error!("if with no matching endif"),
                    }
                }
            }
            Opcode::Else => {
                // Reaching an else means the true branch just finished.
                match else_target(&shader, self.program_counter) {
                    Some(target) => self.program_counter = target,
                    None => error!("else with no matching endif"),
                }
            }

            Opcode::Switch => {
                let value = self.get_src(&op.operands[0], op).u(0);
                let target = switch_target(&shader, self.program_counter, value, |case_op| {
                    self.get_src(&case_op.operands[0], case_op).u(0)
                });
                match target {
                    Some(target) => self.program_counter = target,
                    None => error!(value, "switch found no matching case or default"),
                }
            }

            Opcode::Break | Opcode::Breakc => {
                let taken = op.opcode == Opcode::Break || predicate_taken(self);
                if taken {
                    match break_target(&shader, self.program_counter) {
                        Some(target) => self.program_counter = target,
                        None => error!("break outside of loop or switch"),
                    }
                }
            }

            Opcode::Continue | Opcode::Continuec | Opcode::EndLoop => {
                let taken = op.opcode != Opcode::Continuec || predicate_taken(self);
                if taken {
                    let start = self.program_counter - 1;
                    let initial_depth = if op.opcode == Opcode::EndLoop { 0 } else { 1 };
                    // Land on the loop label itself so the next step enters
                    // the body.
                    match loop_head(&shader, start, initial_depth) {
                        Some(target) => self.program_counter = target,
                        None => error!("continue/endloop outside of loop"),
                    }
                }
            }

            Opcode::Ret => self.done = true,
            Opcode::Retc => {
                if predicate_taken(self) {
                    self.done = true;
                }
            }
            Opcode::Discard => {
                if predicate_taken(self) {
                    self.done = true;
                }
            }

            other => error!(opcode = other.name(), "not a flow-control operation"),
        }
    }
}
