use colored::*;
use tsch_frame::*;

struct Writer<'b> {
    buffer: &'b mut String,
    indent: usize,
}

impl<'b> Writer<'b> {
    fn new(buffer: &'b mut String) -> Self {
        Self { buffer, indent: 0 }
    }

    fn increase_indent(&mut self) {
        self.indent += 2;
    }

    fn decrease_indent(&mut self) {
        self.indent = self.indent.saturating_sub(2);
    }

    fn section(&mut self, title: &str) {
        self.indent = 0;
        self.writeln(title.underline().bold().to_string());
        self.increase_indent();
    }

    fn field(&mut self, name: &str, value: impl core::fmt::Display) {
        self.writeln(format!("{}: {}", name.bold(), value));
    }

    fn writeln(&mut self, s: String) {
        self.buffer.push_str(&" ".repeat(self.indent));
        self.buffer.push_str(&s);
        self.buffer.push('\n');
    }
}

/// Errors returned by [`FrameParser`].
#[derive(Debug)]
pub enum ParseError {
    /// The input is not valid hexadecimal.
    Hex(hex::FromHexError),
    /// The bytes are not an IEEE 802.15.4 frame.
    Frame(Error),
    /// The FCS does not match the frame.
    InvalidFcs,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Hex(err) => write!(f, "invalid hex input: {err}"),
            Self::Frame(err) => write!(f, "{err}"),
            Self::InvalidFcs => write!(f, "invalid FCS"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<hex::FromHexError> for ParseError {
    fn from(err: hex::FromHexError) -> Self {
        Self::Hex(err)
    }
}

impl From<Error> for ParseError {
    fn from(err: Error) -> Self {
        Self::Frame(err)
    }
}

/// Describes TSCH frames: enhanced beacons, enhanced ACKs and data frames.
pub struct FrameParser;

impl FrameParser {
    /// Describe a frame given as a hex string, without FCS.
    pub fn parse_hex(input: &str) -> core::result::Result<String, ParseError> {
        let data = hex::decode(input.trim())?;
        Self::parse(&data)
    }

    /// Describe a frame given as a hex string, ending with its FCS.
    pub fn parse_hex_with_fcs(input: &str) -> core::result::Result<String, ParseError> {
        let data = hex::decode(input.trim())?;
        let frame = FrameWithFcs::new(&data[..]).map_err(|_| ParseError::InvalidFcs)?;
        Self::parse(frame.content())
    }

    /// Describe a frame, without FCS.
    pub fn parse(input: &[u8]) -> core::result::Result<String, ParseError> {
        let frame = Frame::new(input)?;
        let mut buffer = String::new();
        let mut w = Writer::new(&mut buffer);

        header(&mut w, &frame);

        match frame.frame_control().frame_type() {
            FrameType::Beacon => beacon(&mut w, input),
            FrameType::Ack => ack(&mut w, &frame),
            FrameType::Data => data(&mut w, &frame),
            _ => (),
        }

        Ok(buffer)
    }
}

fn header(w: &mut Writer, frame: &Frame<&[u8]>) {
    let fc = frame.frame_control();
    let enhanced = fc.frame_version() == FrameVersion::Ieee802154_2020
        && matches!(fc.frame_type(), FrameType::Beacon | FrameType::Ack);

    w.section("Frame");
    w.field(
        "type",
        format!(
            "{}{:?}",
            if enhanced { "Enhanced " } else { "" },
            fc.frame_type()
        )
        .bright_blue(),
    );
    w.field(
        "version",
        format!("{} ({:?})", fc.frame_version() as usize, fc.frame_version()),
    );
    w.field("security", fc.security_enabled() as usize);
    w.field("ack request", fc.ack_request() as usize);

    if let Some(seq) = frame.sequence_number() {
        w.field("sequence number", seq);
    }

    if let Some(addressing) = frame.addressing() {
        if let Some(pan_id) = addressing.dst_pan_id() {
            w.field("dst pan id", format!("{pan_id:x}"));
        }
        address(w, "dst", addressing.dst_address());
        if let Some(pan_id) = addressing.src_pan_id() {
            w.field("src pan id", format!("{pan_id:x}"));
        }
        address(w, "src", addressing.src_address());
    }
}

fn address(w: &mut Writer, name: &str, address: Address) {
    if address.is_empty() {
        return;
    }
    let suffix = if address.is_broadcast() { " (broadcast)" } else { "" };
    w.field(name, format!("{address}{suffix}"));
}

fn beacon(w: &mut Writer, input: &[u8]) {
    w.section("TSCH Beacon");

    let beacon = match parse_beacon(input, false) {
        Ok(beacon) => beacon,
        Err(BeaconRejection::MicDeferred) => {
            w.writeln("secured, not decoded".yellow().to_string());
            return;
        }
        Err(rejection) => {
            w.writeln(format!("{}", rejection.to_string().red()));
            return;
        }
    };

    w.field("asn", beacon.asn);
    if beacon.join_priority == NO_JOIN_PRIORITY {
        w.field("join priority", "none");
    } else {
        w.field("join priority", beacon.join_priority);
    }

    match beacon.timings {
        Some(timings) if beacon.timeslot_id != 0 => {
            w.field("timeslot template", beacon.timeslot_id);
            w.increase_indent();
            w.writeln(format!("{timings}"));
            w.decrease_indent();
        }
        _ => w.field("timeslot template", format!("{} (default)", beacon.timeslot_id)),
    }

    if beacon.hopping_sequence_id == 0 || beacon.hopping_sequence.is_empty() {
        w.field(
            "hopping sequence",
            format!("{} (default)", beacon.hopping_sequence_id),
        );
    } else {
        w.field(
            "hopping sequence",
            format!(
                "{} {:?}",
                beacon.hopping_sequence_id, beacon.hopping_sequence
            ),
        );
    }

    if let Some(slot_length) = beacon.slot_length {
        w.field(
            "slot length",
            format!(
                "{} us, next {} us from asn {}",
                slot_length.current, slot_length.next, slot_length.triggering_asn
            ),
        );
    }

    let Some(slotframes) = beacon.slotframes else {
        w.field("slotframes", "none");
        return;
    };

    w.field("slotframes", slotframes.number_of_slotframes());
    for descriptor in slotframes.slotframe_descriptors() {
        w.increase_indent();
        w.writeln(format!(
            "{} {}, size {}",
            "slotframe".italic(),
            descriptor.handle(),
            descriptor.size()
        ));
        w.increase_indent();
        for link in descriptor.links() {
            w.writeln(format!(
                "timeslot {}, channel offset {}, {:?}",
                link.timeslot(),
                link.channel_offset(),
                link.link_options()
            ));
        }
        w.decrease_indent();
        w.decrease_indent();
    }
}

fn ack(w: &mut Writer, frame: &Frame<&[u8]>) {
    let Some(ie) = frame.information_elements() else {
        return;
    };

    for header in ie.header_information_elements() {
        if header.element_id() != HeaderElementId::TimeCorrection {
            continue;
        }

        w.section("Time Correction");
        match TimeCorrection::new(header.content()) {
            Ok(tc) => {
                w.field("correction", format!("{} us", tc.time_correction().as_us()));
                w.field("nack", tc.nack() as usize);
            }
            Err(_) => w.writeln("invalid".red().to_string()),
        }
    }
}

fn data(w: &mut Writer, frame: &Frame<&[u8]>) {
    match frame.payload() {
        Some(payload) if !payload.is_empty() => {
            w.section("Payload");
            w.writeln(hex::encode(payload));
        }
        _ => {
            w.section("Payload");
            w.writeln("empty (keep-alive)".italic().to_string());
        }
    }
}
