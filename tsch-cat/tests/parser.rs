use tsch_cat::{FrameParser, ParseError};
use tsch_frame::time::Duration;
use tsch_frame::{
    append_fcs, build_beacon, build_enhanced_ack, Address, BeaconRepr, DataFrameRepr,
    SlotLengthRepr, TimeslotTimings,
};

use strip_ansi_escapes::strip;

fn describe(input: &str) -> String {
    String::from_utf8(strip(FrameParser::parse_hex(input).unwrap())).unwrap()
}

fn describe_bytes(input: &[u8]) -> String {
    String::from_utf8(strip(FrameParser::parse(input).unwrap())).unwrap()
}

#[test]
fn enhanced_beacon() {
    let output = describe("40ebcdabffff0100010001000100003f1188061a0e0000000000011c0001c800011b00");
    assert_eq!(
        output,
        "Frame
  type: Enhanced Beacon
  version: 2 (Ieee802154_2020)
  security: 0
  ack request: 0
  dst pan id: abcd
  dst: ff:ff (broadcast)
  src: 00:01:00:01:00:01:00:01
TSCH Beacon
  asn: 14
  join priority: 0
  timeslot template: 0 (default)
  hopping sequence: 0 (default)
  slotframes: 0
"
    );
}

#[test]
fn enhanced_beacon_with_slotframes() {
    let output = describe("40ebcdabffff0100010001000100003f3788061a110000000000191c01080780004808fc032003e80398089001c0006009a010102701c8000f1b010011000200000100060100020007");

    assert!(output.contains("type: Enhanced Beacon"));
    assert!(output.contains("asn: 17"));
    assert!(output.contains("timeslot template: 1"));
    assert!(output.contains("slotframes: 1"));
    assert!(output.contains("slotframe 0, size 17"));
    assert!(output.contains("timeslot 0, channel offset 1"));
    assert!(output.contains("timeslot 1, channel offset 2"));
}

#[test]
fn enhanced_beacon_with_slot_length() {
    let repr = BeaconRepr {
        pan_id: 0xabcd,
        src_address: Address::Extended([0, 1, 0, 1, 0, 1, 0, 1]),
        asn: 90,
        join_priority: 1,
        timeslot_id: 0,
        timings: TimeslotTimings::default(),
        hopping_sequence_id: 0,
        hopping_sequence: &[],
        slotframes: None,
        slot_length: Some(SlotLengthRepr {
            triggering_asn: 140,
            current: 10000,
            next: 15000,
        }),
    };
    let mut buffer = [0u8; 127];
    let (len, _) = build_beacon(&repr, &mut buffer).unwrap();

    let output = describe_bytes(&buffer[..len]);
    assert!(output.contains("asn: 90"));
    assert!(output.contains("slot length: 10000 us, next 15000 us from asn 140"));
    assert!(output.contains("slotframes: none"));
}

#[test]
fn enhanced_ack() {
    let mut buffer = [0u8; 32];
    let len = build_enhanced_ack(
        Some(Address::Extended([0, 1, 0, 1, 0, 1, 0, 1])),
        0xabcd,
        5,
        Duration::from_us(-100),
        false,
        &mut buffer,
    )
    .unwrap();

    let output = describe_bytes(&buffer[..len]);
    assert!(output.contains("type: Enhanced Ack"));
    assert!(output.contains("sequence number: 5"));
    assert!(output.contains("dst: 00:01:00:01:00:01:00:01"));
    assert!(output.contains("Time Correction\n  correction: -100 us\n  nack: 0\n"));
}

#[test]
fn data_and_keepalive() {
    let mut repr = DataFrameRepr {
        sequence_number: Some(9),
        ack_request: true,
        frame_pending: false,
        pan_id: 0xabcd,
        dst_address: Address::Extended([0, 1, 0, 1, 0, 1, 0, 1]),
        src_address: Address::Extended([0, 2, 0, 2, 0, 2, 0, 2]),
        payload: b"hi",
    };
    let mut buffer = [0u8; 64];

    let len = repr.emit(&mut buffer).unwrap();
    let output = describe_bytes(&buffer[..len]);
    assert!(output.contains("type: Data"));
    assert!(output.contains("ack request: 1"));
    assert!(output.contains("src: 00:02:00:02:00:02:00:02"));
    assert!(output.ends_with("Payload\n  6869\n"));

    repr.payload = &[];
    let len = repr.emit(&mut buffer).unwrap();
    let output = describe_bytes(&buffer[..len]);
    assert!(output.ends_with("Payload\n  empty (keep-alive)\n"));
}

#[test]
fn frame_with_fcs() {
    let input = "40ebcdabffff0100010001000100003f1188061a0e0000000000011c0001c800011b00";
    let mut data = hex::decode(input).unwrap();
    let len = data.len();
    data.extend_from_slice(&[0, 0]);
    let len = append_fcs(&mut data, len).unwrap();
    assert_eq!(len, data.len());

    let with_fcs = hex::encode(&data);
    let output = String::from_utf8(strip(FrameParser::parse_hex_with_fcs(&with_fcs).unwrap())).unwrap();
    assert_eq!(output, describe(input));

    data[len - 1] ^= 0xff;
    assert!(matches!(
        FrameParser::parse_hex_with_fcs(&hex::encode(&data)),
        Err(ParseError::InvalidFcs)
    ));
}

#[test]
fn invalid_input() {
    assert!(matches!(
        FrameParser::parse_hex("not hex"),
        Err(ParseError::Hex(_))
    ));
    assert!(matches!(
        FrameParser::parse_hex("40"),
        Err(ParseError::Frame(_))
    ));
}
