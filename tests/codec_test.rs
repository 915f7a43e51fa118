//! Codec-level scenarios and round-trip properties: group addresses,
//! datapoint types and cEMI telegrams.

use knx_tunnel::addressing::{GroupAddress, IndividualAddress};
use knx_tunnel::dpt::{dpt9, Dpt, KnxValue};
use knx_tunnel::protocol::cemi::{
    encode_group_read, encode_group_write, CemiFrame, GroupPayload,
};

// =============================================================================
// S3 / invariant 1 - group address textual forms
// =============================================================================

#[test]
fn group_address_reference_values() {
    let addr: GroupAddress = "1/2/3".parse().unwrap();
    assert_eq!(u16::from(addr), (1 << 11) | (2 << 8) | 3);
    assert_eq!(u16::from(addr), 0x0A03);

    let addr: GroupAddress = "31/7/255".parse().unwrap();
    assert_eq!(u16::from(addr), 65535);

    assert_eq!(GroupAddress::from(0x0A03).to_string(), "1/2/3");
}

#[test]
fn group_address_round_trips_over_full_range() {
    for raw in 0..=u16::MAX {
        let addr = GroupAddress::from(raw);

        let three: GroupAddress = addr.to_string_3level().parse().unwrap();
        assert_eq!(three.raw(), raw);

        let two: GroupAddress = addr.to_string_2level().parse().unwrap();
        assert_eq!(two.raw(), raw);

        // flat form
        let mut flat = heapless::String::<8>::new();
        core::fmt::Write::write_fmt(&mut flat, format_args!("{}", raw)).unwrap();
        let parsed: GroupAddress = flat.parse().unwrap();
        assert_eq!(parsed.raw(), raw);
    }
}

// =============================================================================
// S1 - DPT9 reference vector
// =============================================================================

#[test]
fn dpt9_encodes_decodes_21_5_degrees() {
    let dpt: Dpt = "9.001".parse().unwrap();

    let mut buf = [0u8; 2];
    let len = dpt.encode_value(&KnxValue::F32(21.5), &mut buf).unwrap();
    assert_eq!(len, 2);
    // exponent 1, mantissa 1075
    assert_eq!(buf, [0x0C, 0x33]);

    match dpt.decode_value(&buf).unwrap() {
        KnxValue::F32(v) => assert!((v - 21.5).abs() <= 0.02),
        other => panic!("unexpected value {:?}", other),
    }

    // known-good decode vectors
    assert!((dpt9::decode_f16(0x0AF0) - 15.04).abs() < 0.005);
    assert!((dpt9::decode_f16(0x0C38) - 21.6).abs() < 0.005);
}

// =============================================================================
// S2 - DPT1 write packs into the APCI word
// =============================================================================

#[test]
fn dpt1_write_packs_into_apci_low_bits() {
    let dpt: Dpt = "1.001".parse().unwrap();

    let mut value_buf = [0u8; 1];
    dpt.encode_value(&KnxValue::Bool(true), &mut value_buf).unwrap();
    assert_eq!(value_buf, [0x01]);
    assert!(dpt.is_small());

    let mut cemi = [0u8; 16];
    let len = encode_group_write(
        IndividualAddress::UNSPECIFIED,
        GroupAddress::from(0x0A03),
        GroupPayload::Small(value_buf[0]),
        &mut cemi,
    )
    .unwrap();

    // the on-wire APCI word is 0x00 0x81
    assert_eq!(&cemi[len - 2..len], &[0x00, 0x81]);
}

// =============================================================================
// Invariant 2 - DPT round trips
// =============================================================================

#[test]
fn integer_dpts_round_trip_exactly() {
    let mut buf = [0u8; 16];

    let cases: &[(&str, KnxValue)] = &[
        ("1.001", KnxValue::Bool(false)),
        ("1.001", KnxValue::Bool(true)),
        ("3.007", KnxValue::Step { control: false, step_code: 7 }),
        ("5.010", KnxValue::U8(0)),
        ("5.010", KnxValue::U8(255)),
        ("6.001", KnxValue::I8(-128)),
        ("7.001", KnxValue::U16(65535)),
        ("8.001", KnxValue::I16(-32768)),
        ("12.001", KnxValue::U32(u32::MAX)),
        ("13.001", KnxValue::I32(i32::MIN)),
        ("18.001", KnxValue::Scene { scene: 63, learn: true }),
        ("232.600", KnxValue::Rgb { red: 1, green: 2, blue: 3 }),
    ];

    for (id, value) in cases {
        let dpt: Dpt = id.parse().unwrap();
        let len = dpt.encode_value(value, &mut buf).unwrap();
        assert_eq!(&dpt.decode_value(&buf[..len]).unwrap(), value, "{}", id);
    }
}

#[test]
fn dpt9_round_trips_within_one_unit() {
    let dpt: Dpt = "9.001".parse().unwrap();
    let mut buf = [0u8; 2];

    for &v in &[-273.0f32, -10.55, -0.01, 0.0, 0.01, 21.5, 100.0, 669.99] {
        let len = dpt.encode_value(&KnxValue::F32(v), &mut buf).unwrap();
        let KnxValue::F32(decoded) = dpt.decode_value(&buf[..len]).unwrap() else {
            panic!("wrong variant");
        };
        // values this small all fit at exponents 0..6
        assert!((decoded - v).abs() <= 0.64, "{} -> {}", v, decoded);
    }
}

#[test]
fn dpt14_round_trips_bit_exact() {
    let dpt: Dpt = "14.056".parse().unwrap();
    let mut buf = [0u8; 4];

    for &v in &[0.0f32, -1.5, 3.14159, 1e20, -1e-20, f32::MAX] {
        let len = dpt.encode_value(&KnxValue::F32(v), &mut buf).unwrap();
        let KnxValue::F32(decoded) = dpt.decode_value(&buf[..len]).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(decoded.to_bits(), v.to_bits());
    }
}

#[test]
fn scaled_dpt5_decodes_to_two_decimals() {
    let dpt: Dpt = "5.001".parse().unwrap();
    let mut buf = [0u8; 1];

    dpt.encode_value(&KnxValue::F32(75.0), &mut buf).unwrap();
    assert_eq!(buf[0], 191);

    let KnxValue::F32(decoded) = dpt.decode_value(&[191]).unwrap() else {
        panic!("wrong variant");
    };
    assert_eq!(decoded, 74.9); // 191 * 100 / 255, rounded to 2 decimals
}

// =============================================================================
// Invariant 3 - cEMI byte sequences survive decode/encode
// =============================================================================

#[test]
fn cemi_reference_frames_round_trip() {
    // small payload write, byte payload write, read
    let frames: &[&[u8]] = &[
        &[0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x0A, 0x03, 0x01, 0x00, 0x81],
        &[0x11, 0x00, 0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x03, 0x00, 0x80, 0x0C, 0x33],
        &[0x11, 0x00, 0xBC, 0xE0, 0x11, 0x01, 0x0A, 0x03, 0x01, 0x00, 0x00],
    ];

    for original in frames {
        let frame = CemiFrame::parse(original).unwrap();
        let ldata = frame.ldata().unwrap();

        let mut rebuilt = [0u8; 32];
        let len = knx_tunnel::protocol::cemi::encode_group_frame(
            frame.message_code,
            ldata.source,
            ldata.destination_group().unwrap(),
            ldata.apci,
            ldata.payload(),
            &mut rebuilt,
        )
        .unwrap();

        assert_eq!(&rebuilt[..len], *original);
    }
}

#[test]
fn group_read_has_empty_payload() {
    let mut cemi = [0u8; 16];
    let len = encode_group_read(
        IndividualAddress::from(0x11C8),
        GroupAddress::from(0x0A03),
        &mut cemi,
    )
    .unwrap();

    let ldata = CemiFrame::parse(&cemi[..len]).unwrap().ldata().unwrap();
    assert!(ldata.is_group_read());
    assert_eq!(ldata.payload(), GroupPayload::Small(0));
}
