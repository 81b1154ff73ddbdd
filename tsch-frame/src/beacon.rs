//! Enhanced beacon building and parsing.

use crate::{
    emit_mlme_header, Address, BufferTooSmall, ChannelHopping, Frame, FrameHeaderRepr, FrameType,
    FrameVersion, HeaderInformationElementRepr, InformationElements, NestedInformationElement,
    NestedInformationElementRepr, NestedSubId, NestedSubIdLong, NestedSubIdShort, SlotLength,
    SlotLengthTrigger, SlotframeRepr, TimeslotTimings, TschSlotframeAndLink, TschSynchronization,
    TschTimeslot,
};

/// The join priority reported when a beacon carries none.
pub const NO_JOIN_PRIORITY: u8 = 0xff;

/// A timeslot length change announced in a beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotLengthRepr {
    /// The ASN from which `next` is in use.
    pub triggering_asn: u64,
    /// The timeslot length in use, us.
    pub current: u16,
    /// The timeslot length from `triggering_asn` on, us.
    pub next: u16,
}

/// The content of an enhanced beacon to build.
#[derive(Debug, Clone, Copy)]
pub struct BeaconRepr<'a> {
    /// The PAN ID.
    pub pan_id: u16,
    /// Our own address.
    pub src_address: Address,
    /// The ASN; usually patched right before transmission.
    pub asn: u64,
    /// Our join priority.
    pub join_priority: u8,
    /// Timeslot template ID; timings are only advertised for non-zero IDs.
    pub timeslot_id: u8,
    /// The timeslot template.
    pub timings: TimeslotTimings,
    /// Hopping sequence ID; the sequence is only advertised for non-zero IDs.
    pub hopping_sequence_id: u8,
    /// The hopping sequence.
    pub hopping_sequence: &'a [u8],
    /// Slotframes to advertise, if any.
    pub slotframes: Option<&'a [SlotframeRepr<'a>]>,
    /// Timeslot length change; emitted right after the synchronization IE.
    pub slot_length: Option<SlotLengthRepr>,
}

/// Build an enhanced beacon.
///
/// Returns the frame length and the offset of the ASN field of the TSCH
/// Synchronization IE, to be used with [`patch_beacon_asn`].
pub fn build_beacon(
    repr: &BeaconRepr<'_>,
    buffer: &mut [u8],
) -> Result<(usize, usize), BufferTooSmall> {
    let header = FrameHeaderRepr {
        frame_type: FrameType::Beacon,
        sequence_number: None,
        ack_request: false,
        frame_pending: false,
        information_elements_present: true,
        pan_id: repr.pan_id,
        dst_address: Some(Address::BROADCAST),
        src_address: Some(repr.src_address),
    };

    let mut offset = header.emit(buffer)?;
    offset += HeaderInformationElementRepr::HeaderTermination1
        .emit(buffer.get_mut(offset..).ok_or(BufferTooSmall)?)?;

    let sync = NestedInformationElementRepr::TschSynchronization {
        asn: repr.asn,
        join_metric: repr.join_priority,
    };
    let timeslot = NestedInformationElementRepr::TschTimeslot {
        id: repr.timeslot_id,
        timings: repr.timings,
    };
    let hopping = NestedInformationElementRepr::ChannelHopping {
        id: repr.hopping_sequence_id,
        sequence: repr.hopping_sequence,
    };
    let schedule = repr
        .slotframes
        .map(|slotframes| NestedInformationElementRepr::TschSlotframeAndLink { slotframes });

    let trigger = repr
        .slot_length
        .map(|sl| NestedInformationElementRepr::SlotLengthTrigger { asn: sl.triggering_asn });
    let lengths = repr.slot_length.map(|sl| NestedInformationElementRepr::SlotLength {
        current: sl.current,
        next: sl.next,
    });

    let nested = [Some(sync), trigger, lengths, Some(timeslot), Some(hopping), schedule];
    let content_len = nested.iter().flatten().map(|ie| ie.buffer_len()).sum();

    offset += emit_mlme_header(buffer.get_mut(offset..).ok_or(BufferTooSmall)?, content_len)?;

    let sync_ie_offset = offset + 2;
    for ie in nested.iter().flatten() {
        offset += ie.emit(buffer.get_mut(offset..).ok_or(BufferTooSmall)?)?;
    }

    Ok((offset, sync_ie_offset))
}

/// Rewrite the ASN and join priority of a beacon built by [`build_beacon`].
pub fn patch_beacon_asn(
    buffer: &mut [u8],
    sync_ie_offset: usize,
    asn: u64,
    join_priority: u8,
) -> Result<(), BufferTooSmall> {
    let mut sync = TschSynchronization::new(
        buffer.get_mut(sync_ie_offset..).ok_or(BufferTooSmall)?,
    )
    .map_err(|_| BufferTooSmall)?;
    sync.set_absolute_slot_number(asn);
    sync.set_join_metric(join_priority);
    Ok(())
}

/// Rewrite the timeslot length change of a beacon built by [`build_beacon`]
/// with a [`BeaconRepr::slot_length`].
pub fn patch_beacon_slot_length(
    buffer: &mut [u8],
    sync_ie_offset: usize,
    slot_length: &SlotLengthRepr,
) -> Result<(), BufferTooSmall> {
    let trigger_offset = sync_ie_offset + TschSynchronization::<&[u8]>::size();
    let lengths_offset = trigger_offset + 2 + SlotLengthTrigger::<&[u8]>::size();

    let mut ie = NestedInformationElement::new(buffer.get_mut(trigger_offset..).ok_or(BufferTooSmall)?)
        .map_err(|_| BufferTooSmall)?;
    if ie.sub_id() != NestedSubId::Short(NestedSubIdShort::SlotLengthTrigger) {
        return Err(BufferTooSmall);
    }
    SlotLengthTrigger::new(ie.content_mut())
        .map_err(|_| BufferTooSmall)?
        .set_triggering_asn(slot_length.triggering_asn);

    let mut ie = NestedInformationElement::new(buffer.get_mut(lengths_offset..).ok_or(BufferTooSmall)?)
        .map_err(|_| BufferTooSmall)?;
    if ie.sub_id() != NestedSubId::Short(NestedSubIdShort::SlotLength) {
        return Err(BufferTooSmall);
    }
    let mut lengths = SlotLength::new(ie.content_mut()).map_err(|_| BufferTooSmall)?;
    lengths.set_current_length(slot_length.current);
    lengths.set_next_length(slot_length.next);
    Ok(())
}

/// What a rejected frame looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BeaconDiagnostic {
    /// The frame type.
    pub frame_type: FrameType,
    /// The frame version.
    pub frame_version: FrameVersion,
    /// The source PAN ID, if present.
    pub src_pan_id: Option<u16>,
    /// The source address.
    pub src_address: Address,
    /// The destination PAN ID, if present.
    pub dst_pan_id: Option<u16>,
    /// The destination address.
    pub dst_address: Address,
}

impl core::fmt::Display for BeaconDiagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "type {:?}, version {:?}, from {:x?}/{} to {:x?}/{}",
            self.frame_type,
            self.frame_version,
            self.src_pan_id,
            self.src_address,
            self.dst_pan_id,
            self.dst_address
        )
    }
}

/// The reason a frame was not accepted as an enhanced beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeaconRejection {
    /// The frame could not be parsed.
    Malformed,
    /// The frame is not a 2015 enhanced beacon.
    NotABeacon(BeaconDiagnostic),
    /// The frame is secured and its MIC has not been verified yet.
    MicDeferred,
    /// The beacon carries no TSCH Synchronization IE.
    MissingSynchronization,
}

impl core::fmt::Display for BeaconRejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed frame"),
            Self::NotABeacon(diagnostic) => write!(f, "not a TSCH beacon: {diagnostic}"),
            Self::MicDeferred => write!(f, "MIC verification deferred"),
            Self::MissingSynchronization => write!(f, "no synchronization IE"),
        }
    }
}

/// The content of a parsed enhanced beacon.
#[derive(Debug)]
pub struct ParsedBeacon<'a> {
    /// The PAN ID the beacon belongs to.
    pub pan_id: Option<u16>,
    /// The sender.
    pub src_address: Address,
    /// The advertised ASN.
    pub asn: u64,
    /// The advertised join priority, [`NO_JOIN_PRIORITY`] when absent.
    pub join_priority: u8,
    /// The timeslot template ID.
    pub timeslot_id: u8,
    /// The advertised timings, when not the default template.
    pub timings: Option<TimeslotTimings>,
    /// The hopping sequence ID.
    pub hopping_sequence_id: u8,
    /// The advertised hopping sequence, empty for the default one.
    pub hopping_sequence: &'a [u8],
    /// The advertised slotframes and links.
    pub slotframes: Option<TschSlotframeAndLink<&'a [u8]>>,
    /// The announced timeslot length change, when both of its IEs are present.
    pub slot_length: Option<SlotLengthRepr>,
    /// The frame was secured; its MIC is excluded from the IEs.
    pub secured: bool,
}

/// Parse an enhanced beacon.
///
/// A secured beacon is only parsed when `verify_mic` is set, in which case
/// its MIC has been checked by the caller and is stripped. Otherwise it is
/// rejected with [`BeaconRejection::MicDeferred`].
pub fn parse_beacon(buffer: &[u8], verify_mic: bool) -> Result<ParsedBeacon<'_>, BeaconRejection> {
    let frame = Frame::new(buffer).map_err(|_| BeaconRejection::Malformed)?;
    let fc = frame.frame_control();
    let addressing = frame.addressing().ok_or(BeaconRejection::Malformed)?;

    if fc.frame_type() != FrameType::Beacon || fc.frame_version() < FrameVersion::Ieee802154_2020
    {
        return Err(BeaconRejection::NotABeacon(BeaconDiagnostic {
            frame_type: fc.frame_type(),
            frame_version: fc.frame_version(),
            src_pan_id: addressing.src_pan_id(),
            src_address: addressing.src_address(),
            dst_pan_id: addressing.dst_pan_id(),
            dst_address: addressing.dst_address(),
        }));
    }

    let secured = fc.security_enabled();
    if secured && !verify_mic {
        return Err(BeaconRejection::MicDeferred);
    }

    let mut beacon = ParsedBeacon {
        pan_id: addressing.pan_id(),
        src_address: addressing.src_address(),
        asn: 0,
        join_priority: NO_JOIN_PRIORITY,
        timeslot_id: 0,
        timings: None,
        hopping_sequence_id: 0,
        hopping_sequence: &[],
        slotframes: None,
        slot_length: None,
        secured,
    };

    let mut synchronized = false;
    let mut triggering_asn = None;
    let mut lengths = None;

    if fc.information_elements_present() {
        let body = &buffer[frame.header_len()..buffer.len() - frame.mic_len()];
        let ie = InformationElements::new(body).map_err(|_| BeaconRejection::Malformed)?;

        for nested in ie.into_nested_information_elements() {
            let sub_id = nested.sub_id();
            let content = nested.into_content();
            match sub_id {
                NestedSubId::Short(NestedSubIdShort::TschSynchronization) => {
                    let sync =
                        TschSynchronization::new(content).map_err(|_| BeaconRejection::Malformed)?;
                    beacon.asn = sync.absolute_slot_number();
                    beacon.join_priority = sync.join_metric();
                    synchronized = true;
                }
                NestedSubId::Short(NestedSubIdShort::TschTimeslot) => {
                    let ts = TschTimeslot::new(content).map_err(|_| BeaconRejection::Malformed)?;
                    beacon.timeslot_id = ts.id();
                    beacon.timings = ts.timeslot_timings();
                }
                NestedSubId::Short(NestedSubIdShort::TschSlotframeAndLink) => {
                    beacon.slotframes = Some(
                        TschSlotframeAndLink::new(content)
                            .map_err(|_| BeaconRejection::Malformed)?,
                    );
                }
                NestedSubId::Long(NestedSubIdLong::ChannelHopping) => {
                    let ch = ChannelHopping::new(content).map_err(|_| BeaconRejection::Malformed)?;
                    beacon.hopping_sequence_id = ch.hopping_sequence_id();
                    beacon.hopping_sequence = ch.into_hopping_sequence();
                }
                NestedSubId::Short(NestedSubIdShort::SlotLengthTrigger) => {
                    let trigger =
                        SlotLengthTrigger::new(content).map_err(|_| BeaconRejection::Malformed)?;
                    triggering_asn = Some(trigger.triggering_asn());
                }
                NestedSubId::Short(NestedSubIdShort::SlotLength) => {
                    let sl = SlotLength::new(content).map_err(|_| BeaconRejection::Malformed)?;
                    lengths = Some((sl.current_length(), sl.next_length()));
                }
                _ => (),
            }
        }
    }

    if let (Some(triggering_asn), Some((current, next))) = (triggering_asn, lengths) {
        beacon.slot_length = Some(SlotLengthRepr {
            triggering_asn,
            current,
            next,
        });
    }

    if !synchronized {
        return Err(BeaconRejection::MissingSynchronization);
    }

    Ok(beacon)
}
