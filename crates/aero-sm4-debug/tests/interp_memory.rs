//! Resource load/store and atomic semantics against UAV, SRV and
//! group-shared backing stores.

mod common;

use aero_sm4::{Opcode, Operand, ResourceDimension};
use aero_sm4_debug::{CompType, GlobalState, GroupsharedMem, ResourceView, ViewFormat};
use common::*;

fn r(index: u64) -> Operand {
    Operand::temp(index)
}

#[test]
fn structured_store_writes_at_element_and_offset() {
    // Stride 16, element 5, byte offset 4, three uints: bytes 84..96.
    let shader = shader(
        vec![dcl_temps(1), dcl_uav_structured(0, 16)],
        vec![
            inst(
                Opcode::StoreStructured,
                vec![
                    uav(0).masked(0b0111),
                    imm_u([5; 4]).scalar(0),
                    imm_u([4; 4]).scalar(0),
                    imm_u([0x0101_0101, 0x0202_0202, 0x0303_0303, 0x0404_0404]),
                ],
            ),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.uavs.insert(0, buffer_view(16, u32_format(4)));
    let mut api = TestApi::default();
    run(state_for(&shader), &mut global, &mut api);

    let data = &global.uavs[&0].data;
    assert!(data[..84].iter().all(|&b| b == 0));
    assert_eq!(&data[84..88], &[1; 4]);
    assert_eq!(&data[88..92], &[2; 4]);
    assert_eq!(&data[92..96], &[3; 4]);
    // The fourth component does not fit inside the stride window.
    assert!(data[96..].iter().all(|&b| b == 0));
}

#[test]
fn structured_load_reads_back_and_out_of_bounds_is_zero() {
    let shader = shader(
        vec![dcl_temps(2), dcl_uav_structured(0, 8)],
        vec![
            inst(
                Opcode::LdStructured,
                vec![
                    r(0).masked(0b0011),
                    imm_u([1; 4]).scalar(0),
                    imm_u([0; 4]).scalar(0),
                    uav(0),
                ],
            ),
            inst(
                Opcode::LdStructured,
                vec![
                    r(1),
                    imm_u([100; 4]).scalar(0),
                    imm_u([0; 4]).scalar(0),
                    uav(0),
                ],
            ),
            ret(),
        ],
    );

    let mut view = buffer_view(4, u32_format(2));
    view.data[8..12].copy_from_slice(&0xaabbccddu32.to_le_bytes());
    view.data[12..16].copy_from_slice(&0x11223344u32.to_le_bytes());

    let mut global = GlobalState::new();
    global.uavs.insert(0, view);
    let mut api = TestApi::default();
    let s = run(state_for(&shader), &mut global, &mut api);

    assert_eq!(s.registers[0].u(0), 0xaabbccdd);
    assert_eq!(s.registers[0].u(1), 0x11223344);
    assert_eq!(s.registers[1].u(0), 0);
}

#[test]
fn raw_access_scales_view_extent_by_format_units() {
    // first_element is in 4-byte units for a raw view; byte addressing must
    // land past it.
    let shader = shader(
        vec![dcl_temps(1), dcl_uav_raw(0)],
        vec![
            inst(
                Opcode::LdRaw,
                vec![r(0).masked(0b0001), imm_u([8; 4]).scalar(0), uav(0)],
            ),
            ret(),
        ],
    );

    let mut view = raw_view(64);
    view.first_element = 1;
    view.data[12..16].copy_from_slice(&0xfeedbeefu32.to_le_bytes());

    let mut global = GlobalState::new();
    global.uavs.insert(0, view);
    let mut api = TestApi::default();
    let s = run(state_for(&shader), &mut global, &mut api);

    // (first_element * 4) + byte address 8 = 12.
    assert_eq!(s.registers[0].u(0), 0xfeedbeef);
}

#[test]
fn store_raw_writes_masked_words() {
    let shader = shader(
        vec![dcl_temps(1), dcl_uav_raw(0)],
        vec![
            inst(
                Opcode::StoreRaw,
                vec![
                    uav(0).masked(0b0011),
                    imm_u([4; 4]).scalar(0),
                    imm_u([7, 9, 11, 13]),
                ],
            ),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.uavs.insert(0, raw_view(32));
    let mut api = TestApi::default();
    run(state_for(&shader), &mut global, &mut api);

    let data = &global.uavs[&0].data;
    assert_eq!(&data[4..8], &7u32.to_le_bytes());
    assert_eq!(&data[8..12], &9u32.to_le_bytes());
    assert_eq!(&data[12..16], &[0; 4]);
}

#[test]
fn typed_store_to_texture_uses_pitches() {
    let shader = shader(
        vec![dcl_temps(1)],
        vec![
            inst(
                Opcode::StoreUavTyped,
                vec![
                    uav(0),
                    imm_u([1, 1, 0, 0]),
                    imm_f([0.0, 0.5, 1.0, 1.0]),
                ],
            ),
            ret(),
        ],
    );

    let fmt = ViewFormat::new(1, 4, CompType::UNorm);
    let mut global = GlobalState::new();
    global.uavs.insert(
        0,
        ResourceView {
            data: vec![0; 4 * 4 * 4],
            num_elements: 16,
            row_pitch: 16,
            is_texture: true,
            format: fmt,
            ..Default::default()
        },
    );
    let mut api = TestApi::default();
    run(state_for(&shader), &mut global, &mut api);

    // Texel (1,1): 1*4 + 1*16 = byte 20.
    let data = &global.uavs[&0].data;
    assert_eq!(&data[20..24], &[0, 128, 255, 255]);
}

#[test]
fn typed_load_from_buffer_applies_format() {
    let shader = shader(
        vec![dcl_temps(1)],
        vec![
            inst(
                Opcode::LdUavTyped,
                vec![r(0), imm_u([2, 0, 0, 0]), uav(0)],
            ),
            ret(),
        ],
    );

    let fmt = ViewFormat::new(2, 2, CompType::Float);
    let mut view = buffer_view(8, fmt);
    // Element 2 begins at byte 8: halves 1.5 and -0.25.
    view.data[8..10].copy_from_slice(&half::f16::from_f32(1.5).to_bits().to_le_bytes());
    view.data[10..12].copy_from_slice(&half::f16::from_f32(-0.25).to_bits().to_le_bytes());

    let mut global = GlobalState::new();
    global.uavs.insert(0, view);
    let mut api = TestApi::default();
    let s = run(state_for(&shader), &mut global, &mut api);

    assert_eq!(s.registers[0].f(0), 1.5);
    assert_eq!(s.registers[0].f(1), -0.25);
}

#[test]
fn out_of_bounds_store_is_dropped() {
    let shader = shader(
        vec![dcl_temps(1), dcl_uav_structured(0, 8)],
        vec![
            inst(
                Opcode::StoreStructured,
                vec![
                    uav(0).masked(0b0001),
                    imm_u([100; 4]).scalar(0),
                    imm_u([0; 4]).scalar(0),
                    imm_u([0xff; 4]),
                ],
            ),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.uavs.insert(0, buffer_view(4, u32_format(2)));
    let mut api = TestApi::default();
    run(state_for(&shader), &mut global, &mut api);

    assert!(global.uavs[&0].data.iter().all(|&b| b == 0));
}

#[test]
fn atomic_ops_read_modify_write() {
    let shader = shader(
        vec![dcl_temps(2), dcl_uav_raw(0)],
        vec![
            inst(
                Opcode::AtomicIAdd,
                vec![uav(0), imm_u([1, 0, 0, 0]), imm_u([5; 4])],
            ),
            inst(
                Opcode::ImmAtomicIAdd,
                vec![r(0), uav(0), imm_u([1, 0, 0, 0]), imm_u([3; 4])],
            ),
            inst(
                Opcode::ImmAtomicUMax,
                vec![r(1), uav(0), imm_u([1, 0, 0, 0]), imm_u([6; 4])],
            ),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.uavs.insert(0, raw_view(32));
    let mut api = TestApi::default();
    let s = run(state_for(&shader), &mut global, &mut api);

    // 0 + 5 + 3 = 8, then max(8, 6) leaves 8.
    let word = u32::from_le_bytes(global.uavs[&0].data[4..8].try_into().unwrap());
    assert_eq!(word, 8);

    // Immediate forms observed the value before their own operation.
    assert_eq!(s.registers[0].u(0), 5);
    assert_eq!(s.registers[1].u(0), 8);
}

#[test]
fn atomic_cmp_exch_stores_only_on_match() {
    let shader = shader(
        vec![dcl_temps(2), dcl_uav_raw(0)],
        vec![
            // Compare against 0 -> store 7.
            inst(
                Opcode::ImmAtomicCmpExch,
                vec![r(0), uav(0), imm_u([0; 4]), imm_u([7; 4]), imm_u([0; 4])],
            ),
            // Compare against 0 again -> no store (value is now 7).
            inst(
                Opcode::ImmAtomicCmpExch,
                vec![r(1), uav(0), imm_u([0; 4]), imm_u([9; 4]), imm_u([0; 4])],
            ),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.uavs.insert(0, raw_view(16));
    let mut api = TestApi::default();
    let s = run(state_for(&shader), &mut global, &mut api);

    let word = u32::from_le_bytes(global.uavs[&0].data[0..4].try_into().unwrap());
    assert_eq!(word, 7);
    assert_eq!(s.registers[0].u(0), 0);
    assert_eq!(s.registers[1].u(0), 7);
}

#[test]
fn structured_atomic_uses_element_and_byte_offset() {
    let shader = shader(
        vec![dcl_temps(1), dcl_uav_structured(0, 16)],
        vec![
            inst(
                Opcode::AtomicOr,
                // .x element, .y byte offset.
                vec![uav(0), imm_u([2, 8, 0, 0]), imm_u([0x80; 4])],
            ),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.uavs.insert(0, buffer_view(4, u32_format(4)));
    let mut api = TestApi::default();
    run(state_for(&shader), &mut global, &mut api);

    let data = &global.uavs[&0].data;
    // Element 2 starts at 32; +8 = byte 40.
    assert_eq!(&data[40..44], &0x80u32.to_le_bytes());
}

#[test]
fn hidden_counter_alloc_and_consume() {
    let shader = shader(
        vec![dcl_temps(3), dcl_uav_raw(0)],
        vec![
            inst(Opcode::ImmAtomicAlloc, vec![r(0), uav(0)]),
            inst(Opcode::ImmAtomicAlloc, vec![r(1), uav(0)]),
            inst(Opcode::ImmAtomicConsume, vec![r(2), uav(0)]),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.uavs.insert(0, raw_view(16));
    let mut api = TestApi::default();
    let s = run(state_for(&shader), &mut global, &mut api);

    // alloc returns the prior value, consume the decremented one.
    assert_eq!(s.registers[0].u(0), 0);
    assert_eq!(s.registers[1].u(0), 1);
    assert_eq!(s.registers[2].u(0), 1);
    assert_eq!(global.uavs[&0].hidden_counter, 1);
}

#[test]
fn helper_lanes_do_not_mutate_memory() {
    let shader = shader(
        vec![dcl_temps(1), dcl_uav_raw(0)],
        vec![
            inst(
                Opcode::StoreRaw,
                vec![uav(0).masked(0b0001), imm_u([0; 4]).scalar(0), imm_u([0xff; 4])],
            ),
            inst(
                Opcode::AtomicIAdd,
                vec![uav(0), imm_u([0; 4]), imm_u([5; 4])],
            ),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.uavs.insert(0, raw_view(16));
    let mut api = TestApi::default();

    let mut lane = state_for(&shader);
    lane.done = true;

    // Drive the steps directly; finished() is already true for this lane.
    let lane = lane.step(&mut global, &mut api, None);
    let _ = lane.step(&mut global, &mut api, None);

    assert!(global.uavs[&0].data.iter().all(|&b| b == 0));
}

#[test]
fn groupshared_structured_load_store_and_atomic() {
    let shader = shader(
        vec![dcl_temps(1)],
        vec![
            inst(
                Opcode::StoreStructured,
                vec![
                    tgsm(0).masked(0b0011),
                    imm_u([1; 4]).scalar(0),
                    imm_u([0; 4]).scalar(0),
                    imm_u([21, 22, 0, 0]),
                ],
            ),
            inst(
                Opcode::AtomicIAdd,
                vec![tgsm(0), imm_u([1, 4, 0, 0]), imm_u([100; 4])],
            ),
            inst(
                Opcode::LdStructured,
                vec![
                    r(0).masked(0b0011),
                    imm_u([1; 4]).scalar(0),
                    imm_u([0; 4]).scalar(0),
                    tgsm(0),
                ],
            ),
            ret(),
        ],
    );

    let mut global = GlobalState::new();
    global.groupshared.push(GroupsharedMem {
        data: vec![0; 64],
        count: 8,
        byte_stride: 8,
        structured: true,
    });
    let mut api = TestApi::default();
    let s = run(state_for(&shader), &mut global, &mut api);

    assert_eq!(s.registers[0].u(0), 21);
    assert_eq!(s.registers[0].u(1), 122);
}

#[test]
fn buffer_srv_load_bypasses_the_wrapper() {
    let shader = shader(
        vec![dcl_temps(1), dcl_resource(0, ResourceDimension::Buffer)],
        vec![
            inst(
                Opcode::Ld,
                vec![r(0), imm_u([1, 0, 0, 0]), srv(0)],
            ),
            ret(),
        ],
    );

    let mut view = buffer_view(4, u32_format(4));
    view.data[16..20].copy_from_slice(&123u32.to_le_bytes());

    let mut global = GlobalState::new();
    global.srvs.insert(0, view);
    let mut api = TestApi::default();
    let s = run(state_for(&shader), &mut global, &mut api);

    assert_eq!(s.registers[0].u(0), 123);
    assert_eq!(api.sample_calls, 0);
}
