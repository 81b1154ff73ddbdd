use crate::time::Duration;
use crate::{BufferTooSmall, Error, Result};
use bitflags::bitflags;
use tsch_macros::frame;

/// A reader/writer for the IEEE 802.15.4 Nested Information Elements.
///
/// ## Short format
/// ```notrust
/// +--------+--------+--------+--------------------------+
/// | Length | Sub-ID | Type=0 | Content (0-255 octets)...|
/// +--------+--------+--------+--------------------------+
///  0..8     8..15    15
/// ```
///
/// ## Long format
/// ```notrust
/// +--------+--------+--------+---------------------------+
/// | Length | Sub-ID | Type=1 | Content (0-2047 octets)...|
/// +--------+--------+--------+---------------------------+
///  0..11    11..15   15
/// ```
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct NestedInformationElement<T: AsRef<[u8]>> {
    data: T,
}

impl<T: AsRef<[u8]>> NestedInformationElement<T> {
    /// Create a new [`NestedInformationElement`] reader/writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer does not hold the header and the
    /// announced content.
    pub fn new(data: T) -> Result<Self> {
        let nested = Self::new_unchecked(data);

        if nested.data.as_ref().len() < 2 || nested.data.as_ref().len() < nested.length() + 2 {
            return Err(Error);
        }

        Ok(nested)
    }

    /// Create a new [`NestedInformationElement`] without length checking.
    pub fn new_unchecked(data: T) -> Self {
        Self { data }
    }

    fn raw(&self) -> u16 {
        let b = &self.data.as_ref()[0..2];
        u16::from_le_bytes([b[0], b[1]])
    }

    /// Return the length of the content in bytes.
    pub fn length(&self) -> usize {
        if self.is_long() {
            (self.raw() & 0x07ff) as usize
        } else {
            (self.raw() & 0x00ff) as usize
        }
    }

    /// Return the [`NestedSubId`].
    pub fn sub_id(&self) -> NestedSubId {
        if self.is_long() {
            NestedSubId::Long(NestedSubIdLong::from(((self.raw() >> 11) & 0x0f) as u8))
        } else {
            NestedSubId::Short(NestedSubIdShort::from(((self.raw() >> 8) & 0x7f) as u8))
        }
    }

    /// Returns `true` when the Nested Information Element is a long type.
    pub fn is_long(&self) -> bool {
        self.raw() & 0x8000 != 0
    }

    /// Return the content of this Nested Information Element.
    pub fn content(&self) -> &[u8] {
        &self.data.as_ref()[2..][..self.length()]
    }
}

impl<'f> NestedInformationElement<&'f [u8]> {
    /// Consume the reader, returning the content with the buffer lifetime.
    pub fn into_content(self) -> &'f [u8] {
        let len = self.length();
        &self.data[2..][..len]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> NestedInformationElement<T> {
    /// Write the length, sub-ID and type fields.
    pub fn set_header(&mut self, len: u16, id: NestedSubId) {
        let value = match id {
            NestedSubId::Short(id) => (len & 0x00ff) | (((id as u16) & 0x7f) << 8),
            NestedSubId::Long(id) => (len & 0x07ff) | (((id as u16) & 0x0f) << 11) | 0x8000,
        };
        self.data.as_mut()[0..2].copy_from_slice(&value.to_le_bytes());
    }

    /// Return the content of this Nested Information Element.
    pub fn content_mut(&mut self) -> &mut [u8] {
        &mut self.data.as_mut()[2..]
    }
}

impl<T: AsRef<[u8]>> core::fmt::Display for NestedInformationElement<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.sub_id() {
            NestedSubId::Short(id @ NestedSubIdShort::TschSynchronization) => {
                match TschSynchronization::new(self.content()) {
                    Ok(sync) => write!(
                        f,
                        "{id} ASN: {}, join metric: {}",
                        sync.absolute_slot_number(),
                        sync.join_metric()
                    ),
                    Err(_) => write!(f, "{id}"),
                }
            }
            NestedSubId::Short(id @ NestedSubIdShort::TschTimeslot) => {
                match TschTimeslot::new(self.content()) {
                    Ok(ts) => write!(f, "{id} {ts}"),
                    Err(_) => write!(f, "{id}"),
                }
            }
            NestedSubId::Short(id @ NestedSubIdShort::TschSlotframeAndLink) => {
                match TschSlotframeAndLink::new(self.content()) {
                    Ok(sl) => write!(f, "{id} {sl}"),
                    Err(_) => write!(f, "{id}"),
                }
            }
            NestedSubId::Short(id @ NestedSubIdShort::SlotLengthTrigger) => {
                match SlotLengthTrigger::new(self.content()) {
                    Ok(trigger) => write!(f, "{id} ASN: {}", trigger.triggering_asn()),
                    Err(_) => write!(f, "{id}"),
                }
            }
            NestedSubId::Short(id @ NestedSubIdShort::SlotLength) => {
                match SlotLength::new(self.content()) {
                    Ok(len) => write!(
                        f,
                        "{id} current: {} us, next: {} us",
                        len.current_length(),
                        len.next_length()
                    ),
                    Err(_) => write!(f, "{id}"),
                }
            }
            NestedSubId::Long(id @ NestedSubIdLong::ChannelHopping) => {
                match ChannelHopping::new(self.content()) {
                    Ok(ch) => write!(f, "{id} {ch}"),
                    Err(_) => write!(f, "{id}"),
                }
            }
            NestedSubId::Short(id) => write!(f, "{:?}({:0x?})", id, self.content()),
            NestedSubId::Long(id) => write!(f, "{:?}({:0x?})", id, self.content()),
        }
    }
}

/// Nested Information Element ID.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NestedSubId {
    /// Short Nested Information Element ID.
    Short(NestedSubIdShort),
    /// Long Nested Information Element ID.
    Long(NestedSubIdLong),
}

/// Short Nested Information Element ID.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NestedSubIdShort {
    /// TSCH Synchronization IE.
    TschSynchronization = 0x1a,
    /// TSCH Slotframe and Link IE.
    TschSlotframeAndLink = 0x1b,
    /// TSCH Timeslot IE.
    TschTimeslot = 0x1c,
    /// Hopping Timing IE.
    HoppingTiming = 0x1d,
    /// Enhanced Beacon Filter IE.
    EnhancedBeaconFilter = 0x1e,
    /// MAC Metrics IE.
    MacMetrics = 0x1f,
    /// All MAC Metrics IE.
    AllMacMetrics = 0x20,
    /// Slot length trigger IE, the ASN at which the next timeslot length applies.
    SlotLengthTrigger = 0x70,
    /// Slot length IE, the current and next timeslot lengths.
    SlotLength = 0x71,
    /// Unknown IE.
    Unknown,
}

impl From<u8> for NestedSubIdShort {
    fn from(value: u8) -> Self {
        match value {
            0x1a => Self::TschSynchronization,
            0x1b => Self::TschSlotframeAndLink,
            0x1c => Self::TschTimeslot,
            0x1d => Self::HoppingTiming,
            0x1e => Self::EnhancedBeaconFilter,
            0x1f => Self::MacMetrics,
            0x20 => Self::AllMacMetrics,
            0x70 => Self::SlotLengthTrigger,
            0x71 => Self::SlotLength,
            _ => Self::Unknown,
        }
    }
}

impl core::fmt::Display for NestedSubIdShort {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TschSynchronization => write!(f, "TSCH Synchronization"),
            Self::TschSlotframeAndLink => write!(f, "TSCH Slotframe and Link"),
            Self::TschTimeslot => write!(f, "TSCH Timeslot"),
            Self::SlotLengthTrigger => write!(f, "Slot Length Trigger"),
            Self::SlotLength => write!(f, "Slot Length"),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Long Nested Information Element ID.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NestedSubIdLong {
    /// Vendor Specific Nested IE.
    VendorSpecificNested = 0x08,
    /// Channel Hopping IE.
    ChannelHopping = 0x09,
    /// Unknown IE.
    Unknown,
}

impl From<u8> for NestedSubIdLong {
    fn from(value: u8) -> Self {
        match value {
            0x08 => Self::VendorSpecificNested,
            0x09 => Self::ChannelHopping,
            _ => Self::Unknown,
        }
    }
}

impl core::fmt::Display for NestedSubIdLong {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ChannelHopping => write!(f, "Channel Hopping"),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// An [`Iterator`] over [`NestedInformationElement`].
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct NestedInformationElementsIterator<'f> {
    data: &'f [u8],
    offset: usize,
}

impl<'f> NestedInformationElementsIterator<'f> {
    /// Create a new [`NestedInformationElementsIterator`].
    pub fn new(data: &'f [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// The offset, relative to the MLME content, of the next element.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'f> Iterator for NestedInformationElementsIterator<'f> {
    type Item = NestedInformationElement<&'f [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        let nested = NestedInformationElement::new(self.data.get(self.offset..)?).ok()?;
        let len = nested.length() + 2;
        let nested = NestedInformationElement::new_unchecked(&self.data[self.offset..][..len]);
        self.offset += len;
        Some(nested)
    }
}

/// A reader/writer for the TSCH Synchronization IE.
/// ```notrust
/// +-----+-------------+
/// | ASN | Join metric |
/// +-----+-------------+
/// 0     5             6
/// ```
#[frame]
#[derive(Debug)]
pub struct TschSynchronization {
    /// The absolute slot number, 40 bits.
    #[bytes(5)]
    absolute_slot_number: u64,
    /// The join metric (join priority).
    join_metric: u8,
}

/// A reader/writer for the Slot Length Trigger IE.
/// ```notrust
/// +----------------+
/// | Triggering ASN |
/// +----------------+
/// 0                5
/// ```
#[frame]
#[derive(Debug)]
pub struct SlotLengthTrigger {
    /// The ASN from which the next timeslot length is in use, 40 bits.
    #[bytes(5)]
    triggering_asn: u64,
}

/// A reader/writer for the Slot Length IE.
/// ```notrust
/// +----------------+-------------+
/// | Current length | Next length |
/// +----------------+-------------+
/// 0                2             4
/// ```
#[frame]
#[derive(Debug)]
pub struct SlotLength {
    /// The timeslot length in use, us.
    current_length: u16,
    /// The timeslot length from the triggering ASN on, us.
    next_length: u16,
}

bitflags! {
    /// TSCH link options bitfield.
    /// ```notrust
    /// +----+----+--------+--------------+----------+----------+
    /// | Tx | Rx | Shared | Time keeping | Priority | Reserved |
    /// +----+----+--------+--------------+----------+----------+
    /// ```
    #[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct TschLinkOption: u8 {
        /// Transmit.
        const Tx = 0b0000_0001;
        /// Receive.
        const Rx = 0b0000_0010;
        /// Shared.
        const Shared = 0b0000_0100;
        /// Time keeping.
        const TimeKeeping = 0b0000_1000;
        /// Priority.
        const Priority = 0b0001_0000;
    }
}

impl core::fmt::Debug for TschLinkOption {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TschLinkOption {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=u8:b}", self.bits())
    }
}

/// The twelve timing values of a timeslot template, in wire order.
#[frame]
#[derive(Debug)]
pub struct TimeslotTimingFields {
    /// Timeslot template ID.
    id: u8,
    /// CCA offset, us.
    cca_offset: u16,
    /// CCA duration, us.
    cca: u16,
    /// TX offset, us.
    tx_offset: u16,
    /// RX offset, us.
    rx_offset: u16,
    /// RX ACK delay, us.
    rx_ack_delay: u16,
    /// TX ACK delay, us.
    tx_ack_delay: u16,
    /// RX wait, us.
    rx_wait: u16,
    /// ACK wait, us.
    ack_wait: u16,
    /// RX/TX turnaround, us.
    rx_tx: u16,
    /// Maximum ACK duration, us.
    max_ack: u16,
    /// Maximum TX duration, us.
    max_tx: u16,
    /// Timeslot length, us.
    timeslot_length: u16,
}

/// Timing template of a TSCH timeslot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeslotTimings {
    /// Offset from the start of the timeslot to the start of the CCA.
    pub cca_offset: Duration,
    /// Duration of the CCA.
    pub cca: Duration,
    /// Offset from the start of the timeslot to the start of the TX.
    pub tx_offset: Duration,
    /// Offset from the start of the timeslot to the start of the RX.
    pub rx_offset: Duration,
    /// Delay between the end of the TX and the start of the ACK RX.
    pub rx_ack_delay: Duration,
    /// Delay between the end of the RX and the start of the ACK TX.
    pub tx_ack_delay: Duration,
    /// Maximum time to wait for a frame.
    pub rx_wait: Duration,
    /// Maximum time to wait for an ACK.
    pub ack_wait: Duration,
    /// Radio turnaround time.
    pub rx_tx: Duration,
    /// Maximum transmission time of an ACK.
    pub max_ack: Duration,
    /// Maximum transmission time of a frame.
    pub max_tx: Duration,
    /// Length of the timeslot.
    pub timeslot_length: Duration,
}

impl Default for TimeslotTimings {
    fn default() -> Self {
        Self::with_guard_time(Self::DEFAULT_GUARD_TIME)
    }
}

impl TimeslotTimings {
    /// The default guard time (RX wait).
    pub const DEFAULT_GUARD_TIME: Duration = Duration::from_us(2200);

    /// The 10 ms template, with `rx_offset = tx_offset - guard_time / 2`.
    pub fn with_guard_time(guard_time: Duration) -> Self {
        Self {
            cca_offset: Duration::from_us(1800),
            cca: Duration::from_us(128),
            tx_offset: Duration::from_us(2120),
            rx_offset: Duration::from_us(2120) - (guard_time / 2),
            rx_ack_delay: Duration::from_us(800),
            tx_ack_delay: Duration::from_us(1000),
            rx_wait: guard_time,
            ack_wait: Duration::from_us(400),
            rx_tx: Duration::from_us(192),
            max_ack: Duration::from_us(2400),
            max_tx: Duration::from_us(4256),
            timeslot_length: Duration::from_us(10000),
        }
    }

    fn read<T: AsRef<[u8]>>(fields: &TimeslotTimingFields<T>) -> Self {
        let us = |v: u16| Duration::from_us(v as i64);
        Self {
            cca_offset: us(fields.cca_offset()),
            cca: us(fields.cca()),
            tx_offset: us(fields.tx_offset()),
            rx_offset: us(fields.rx_offset()),
            rx_ack_delay: us(fields.rx_ack_delay()),
            tx_ack_delay: us(fields.tx_ack_delay()),
            rx_wait: us(fields.rx_wait()),
            ack_wait: us(fields.ack_wait()),
            rx_tx: us(fields.rx_tx()),
            max_ack: us(fields.max_ack()),
            max_tx: us(fields.max_tx()),
            timeslot_length: us(fields.timeslot_length()),
        }
    }

    fn write<T: AsRef<[u8]> + AsMut<[u8]>>(&self, fields: &mut TimeslotTimingFields<T>) {
        let us = |d: Duration| d.as_us() as u16;
        fields.set_cca_offset(us(self.cca_offset));
        fields.set_cca(us(self.cca));
        fields.set_tx_offset(us(self.tx_offset));
        fields.set_rx_offset(us(self.rx_offset));
        fields.set_rx_ack_delay(us(self.rx_ack_delay));
        fields.set_tx_ack_delay(us(self.tx_ack_delay));
        fields.set_rx_wait(us(self.rx_wait));
        fields.set_ack_wait(us(self.ack_wait));
        fields.set_rx_tx(us(self.rx_tx));
        fields.set_max_ack(us(self.max_ack));
        fields.set_max_tx(us(self.max_tx));
        fields.set_timeslot_length(us(self.timeslot_length));
    }
}

impl core::fmt::Display for TimeslotTimings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "cca offset: {}", self.cca_offset)?;
        writeln!(f, "cca: {}", self.cca)?;
        writeln!(f, "tx offset: {}", self.tx_offset)?;
        writeln!(f, "rx offset: {}", self.rx_offset)?;
        writeln!(f, "rx ack delay: {}", self.rx_ack_delay)?;
        writeln!(f, "tx ack delay: {}", self.tx_ack_delay)?;
        writeln!(f, "rx wait: {}", self.rx_wait)?;
        writeln!(f, "ack wait: {}", self.ack_wait)?;
        writeln!(f, "rx/tx: {}", self.rx_tx)?;
        writeln!(f, "max ack: {}", self.max_ack)?;
        writeln!(f, "max tx: {}", self.max_tx)?;
        write!(f, "timeslot length: {}", self.timeslot_length)
    }
}

/// A reader for the TSCH Timeslot IE.
///
/// Only the ID is present when the default template (ID 0) is used.
#[derive(Debug)]
pub struct TschTimeslot<T: AsRef<[u8]>> {
    data: T,
}

impl<T: AsRef<[u8]>> TschTimeslot<T> {
    /// The ID of the default timeslot template.
    pub const DEFAULT_ID: u8 = 0;

    /// Create a new [`TschTimeslot`] reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is empty, or if it announces a
    /// non-default template without carrying its timings.
    pub fn new(data: T) -> Result<Self> {
        let ts = Self { data };
        let len = ts.data.as_ref().len();

        if len == 0 || (ts.id() != Self::DEFAULT_ID && len < TimeslotTimingFields::<&[u8]>::size()) {
            return Err(Error);
        }

        Ok(ts)
    }

    /// Return the timeslot template ID.
    pub fn id(&self) -> u8 {
        self.data.as_ref()[0]
    }

    /// Return the carried timings, `None` when only the ID is present.
    pub fn timeslot_timings(&self) -> Option<TimeslotTimings> {
        TimeslotTimingFields::new(self.data.as_ref())
            .ok()
            .map(|fields| TimeslotTimings::read(&fields))
    }
}

impl<T: AsRef<[u8]>> core::fmt::Display for TschTimeslot<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "slot ID: {}", self.id())
    }
}

/// A reader for the TSCH Slotframe and Link IE.
#[derive(Debug)]
pub struct TschSlotframeAndLink<T: AsRef<[u8]>> {
    data: T,
}

impl<T: AsRef<[u8]>> TschSlotframeAndLink<T> {
    /// Create a new [`TschSlotframeAndLink`] reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the announced descriptors do not fit.
    pub fn new(data: T) -> Result<Self> {
        let sl = Self { data };

        if sl.data.as_ref().is_empty() {
            return Err(Error);
        }

        if sl.slotframe_descriptors().count() != sl.number_of_slotframes() as usize {
            return Err(Error);
        }

        Ok(sl)
    }

    /// Return the number of slotframes field.
    pub fn number_of_slotframes(&self) -> u8 {
        self.data.as_ref()[0]
    }

    /// Returns an [`Iterator`] over the slotframe descriptors.
    pub fn slotframe_descriptors(&self) -> SlotframeDescriptorIterator {
        SlotframeDescriptorIterator {
            remaining: self.number_of_slotframes() as usize,
            data: &self.data.as_ref()[1..],
            offset: 0,
        }
    }
}

impl<T: AsRef<[u8]>> core::fmt::Display for TschSlotframeAndLink<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#slotframes: {}", self.number_of_slotframes())
    }
}

/// The fixed part of a slotframe descriptor.
#[frame]
#[derive(Debug)]
pub struct SlotframeDescriptorHeader {
    /// Slotframe handle.
    handle: u8,
    /// Slotframe size.
    slotframe_size: u16,
    /// Number of link information records that follow.
    links: u8,
}

/// One link of a slotframe descriptor.
#[frame]
#[derive(Debug)]
pub struct LinkInformation {
    /// Timeslot of the link.
    timeslot: u16,
    /// Channel offset of the link.
    channel_offset: u16,
    /// Raw link options.
    options: u8,
}

impl<T: AsRef<[u8]>> LinkInformation<T> {
    /// Return the link options.
    pub fn link_options(&self) -> TschLinkOption {
        TschLinkOption::from_bits_truncate(self.options())
    }
}

/// A slotframe descriptor: header and its links.
#[derive(Debug)]
pub struct SlotframeDescriptor<'f> {
    header: SlotframeDescriptorHeader<&'f [u8]>,
    links: &'f [u8],
}

impl<'f> SlotframeDescriptor<'f> {
    /// Slotframe handle.
    pub fn handle(&self) -> u8 {
        self.header.handle()
    }

    /// Slotframe size.
    pub fn size(&self) -> u16 {
        self.header.slotframe_size()
    }

    /// Number of links.
    pub fn number_of_links(&self) -> u8 {
        self.header.links()
    }

    /// Returns an [`Iterator`] over the links of the slotframe.
    pub fn links(&self) -> impl Iterator<Item = LinkInformation<&'f [u8]>> + 'f {
        self.links
            .chunks_exact(LinkInformation::<&[u8]>::size())
            .map(LinkInformation::new_unchecked)
    }
}

/// An [`Iterator`] over [`SlotframeDescriptor`].
#[derive(Debug)]
pub struct SlotframeDescriptorIterator<'f> {
    remaining: usize,
    data: &'f [u8],
    offset: usize,
}

impl<'f> Iterator for SlotframeDescriptorIterator<'f> {
    type Item = SlotframeDescriptor<'f>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let data = self.data.get(self.offset..)?;
        let header = SlotframeDescriptorHeader::new(data).ok()?;
        let header_len = SlotframeDescriptorHeader::<&[u8]>::size();
        let links_len = header.links() as usize * LinkInformation::<&[u8]>::size();
        let links = data.get(header_len..header_len + links_len)?;

        self.offset += header_len + links_len;
        self.remaining -= 1;

        Some(SlotframeDescriptor {
            header: SlotframeDescriptorHeader::new_unchecked(&data[..header_len]),
            links,
        })
    }
}

/// A reader for the Channel Hopping IE.
/// ```notrust
/// +----+------+-----------+------------+---------+----------+-------------+
/// | ID | Page | #channels | PHY config | Seq len | Sequence | Current hop |
/// +----+------+-----------+------------+---------+----------+-------------+
/// 0    1      2           4            8         10         10 + len
/// ```
///
/// Only the ID is present for the default sequence. The sequence carries
/// one octet per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelHopping<T: AsRef<[u8]>> {
    data: T,
}

impl<T: AsRef<[u8]>> ChannelHopping<T> {
    const SEQUENCE_OFFSET: usize = 10;

    /// Create a new [`ChannelHopping`] reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is empty or truncates the sequence.
    pub fn new(data: T) -> Result<Self> {
        let ch = Self { data };
        let len = ch.data.as_ref().len();

        if len == 0 {
            return Err(Error);
        }

        if len > 1 {
            if len < Self::SEQUENCE_OFFSET {
                return Err(Error);
            }
            if len < Self::SEQUENCE_OFFSET + ch.sequence_length() as usize {
                return Err(Error);
            }
        }

        Ok(ch)
    }

    /// Return the hopping sequence ID field.
    pub fn hopping_sequence_id(&self) -> u8 {
        self.data.as_ref()[0]
    }

    /// Return the length of the carried sequence, 0 when absent.
    pub fn sequence_length(&self) -> u16 {
        let data = self.data.as_ref();
        if data.len() < Self::SEQUENCE_OFFSET {
            return 0;
        }
        u16::from_le_bytes([data[8], data[9]])
    }

    /// Return the carried hopping sequence, empty when absent.
    pub fn hopping_sequence(&self) -> &[u8] {
        let len = self.sequence_length() as usize;
        if len == 0 {
            return &[];
        }
        &self.data.as_ref()[Self::SEQUENCE_OFFSET..][..len]
    }
}

impl<'f> ChannelHopping<&'f [u8]> {
    /// Consume the reader, returning the sequence with the buffer lifetime.
    pub fn into_hopping_sequence(self) -> &'f [u8] {
        let len = self.sequence_length() as usize;
        if len == 0 {
            return &[];
        }
        &self.data[Self::SEQUENCE_OFFSET..][..len]
    }
}

impl<T: AsRef<[u8]>> core::fmt::Display for ChannelHopping<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sequence ID: {}", self.hopping_sequence_id())?;
        if !self.hopping_sequence().is_empty() {
            write!(f, ", sequence: {:?}", self.hopping_sequence())?;
        }
        Ok(())
    }
}

/// A link entry to advertise in a Slotframe and Link IE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInformationRepr {
    /// Timeslot of the link.
    pub timeslot: u16,
    /// Channel offset of the link.
    pub channel_offset: u16,
    /// Link options.
    pub options: TschLinkOption,
}

/// A slotframe to advertise in a Slotframe and Link IE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotframeRepr<'a> {
    /// Slotframe handle.
    pub handle: u8,
    /// Slotframe size.
    pub size: u16,
    /// The advertised links.
    pub links: &'a [LinkInformationRepr],
}

/// A high-level representation of a Nested Information Element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedInformationElementRepr<'a> {
    /// ASN and join metric.
    TschSynchronization {
        /// The 40-bit ASN.
        asn: u64,
        /// The join metric.
        join_metric: u8,
    },
    /// Timeslot template; the timings are only emitted for non-zero IDs.
    TschTimeslot {
        /// Template ID.
        id: u8,
        /// The template.
        timings: TimeslotTimings,
    },
    /// Hopping sequence; the sequence is only emitted for non-zero IDs.
    ChannelHopping {
        /// Sequence ID.
        id: u8,
        /// The hopping sequence, one channel per octet.
        sequence: &'a [u8],
    },
    /// Slotframes and their links.
    TschSlotframeAndLink {
        /// The advertised slotframes.
        slotframes: &'a [SlotframeRepr<'a>],
    },
    /// The ASN at which the next timeslot length applies.
    SlotLengthTrigger {
        /// The 40-bit triggering ASN.
        asn: u64,
    },
    /// The current and next timeslot lengths, in us.
    SlotLength {
        /// The timeslot length in use.
        current: u16,
        /// The timeslot length from the triggering ASN on.
        next: u16,
    },
}

impl NestedInformationElementRepr<'_> {
    fn sub_id(&self) -> NestedSubId {
        match self {
            Self::TschSynchronization { .. } => {
                NestedSubId::Short(NestedSubIdShort::TschSynchronization)
            }
            Self::TschTimeslot { .. } => NestedSubId::Short(NestedSubIdShort::TschTimeslot),
            Self::ChannelHopping { .. } => NestedSubId::Long(NestedSubIdLong::ChannelHopping),
            Self::TschSlotframeAndLink { .. } => {
                NestedSubId::Short(NestedSubIdShort::TschSlotframeAndLink)
            }
            Self::SlotLengthTrigger { .. } => {
                NestedSubId::Short(NestedSubIdShort::SlotLengthTrigger)
            }
            Self::SlotLength { .. } => NestedSubId::Short(NestedSubIdShort::SlotLength),
        }
    }

    /// The length of the content, without the 2 octet header.
    pub fn content_len(&self) -> usize {
        match self {
            Self::TschSynchronization { .. } => TschSynchronization::<&[u8]>::size(),
            Self::TschTimeslot { id: 0, .. } => 1,
            Self::TschTimeslot { .. } => TimeslotTimingFields::<&[u8]>::size(),
            Self::ChannelHopping { id: 0, .. } => 1,
            Self::ChannelHopping { sequence, .. } => 12 + sequence.len(),
            Self::TschSlotframeAndLink { slotframes } => {
                1 + slotframes
                    .iter()
                    .map(|sf| {
                        SlotframeDescriptorHeader::<&[u8]>::size()
                            + sf.links.len() * LinkInformation::<&[u8]>::size()
                    })
                    .sum::<usize>()
            }
            Self::SlotLengthTrigger { .. } => SlotLengthTrigger::<&[u8]>::size(),
            Self::SlotLength { .. } => SlotLength::<&[u8]>::size(),
        }
    }

    /// The number of octets needed to emit the element.
    pub fn buffer_len(&self) -> usize {
        2 + self.content_len()
    }

    /// Emit the element at the start of `buffer`, returning its length.
    pub fn emit(&self, buffer: &mut [u8]) -> core::result::Result<usize, BufferTooSmall> {
        let len = self.buffer_len();
        if buffer.len() < len {
            return Err(BufferTooSmall);
        }

        let buffer = &mut buffer[..len];
        buffer.fill(0);
        let mut ie = NestedInformationElement::new_unchecked(&mut buffer[..]);
        ie.set_header(self.content_len() as u16, self.sub_id());
        let content = ie.content_mut();

        match self {
            Self::TschSynchronization { asn, join_metric } => {
                let mut sync = TschSynchronization::new_unchecked(content);
                sync.set_absolute_slot_number(*asn);
                sync.set_join_metric(*join_metric);
            }
            Self::TschTimeslot { id, timings } => {
                content[0] = *id;
                if *id != 0 {
                    timings.write(&mut TimeslotTimingFields::new_unchecked(content));
                }
            }
            Self::ChannelHopping { id, sequence } => {
                content[0] = *id;
                if *id != 0 {
                    content[2..4].copy_from_slice(&(sequence.len() as u16).to_le_bytes());
                    content[8..10].copy_from_slice(&(sequence.len() as u16).to_le_bytes());
                    content[10..][..sequence.len()].copy_from_slice(sequence);
                }
            }
            Self::TschSlotframeAndLink { slotframes } => {
                content[0] = slotframes.len() as u8;
                let mut offset = 1;
                for sf in slotframes.iter() {
                    let mut header = SlotframeDescriptorHeader::new_unchecked(&mut content[offset..]);
                    header.set_handle(sf.handle);
                    header.set_slotframe_size(sf.size);
                    header.set_links(sf.links.len() as u8);
                    offset += SlotframeDescriptorHeader::<&[u8]>::size();

                    for link in sf.links.iter() {
                        let mut info = LinkInformation::new_unchecked(&mut content[offset..]);
                        info.set_timeslot(link.timeslot);
                        info.set_channel_offset(link.channel_offset);
                        info.set_options(link.options.bits());
                        offset += LinkInformation::<&[u8]>::size();
                    }
                }
            }
            Self::SlotLengthTrigger { asn } => {
                SlotLengthTrigger::new_unchecked(content).set_triggering_asn(*asn);
            }
            Self::SlotLength { current, next } => {
                let mut lengths = SlotLength::new_unchecked(content);
                lengths.set_current_length(*current);
                lengths.set_next_length(*next);
            }
        }

        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_ie() {
        let data = [0x06, 0x1a, 0x0e, 0x00, 0x00, 0x00, 0x00, 0x01];
        let ie = NestedInformationElement::new(&data[..]).unwrap();
        assert_eq!(
            ie.sub_id(),
            NestedSubId::Short(NestedSubIdShort::TschSynchronization)
        );
        let sync = TschSynchronization::new(ie.content()).unwrap();
        assert_eq!(sync.absolute_slot_number(), 14);
        assert_eq!(sync.join_metric(), 1);

        let mut buffer = [0u8; 8];
        let repr = NestedInformationElementRepr::TschSynchronization {
            asn: 14,
            join_metric: 1,
        };
        assert_eq!(repr.emit(&mut buffer), Ok(8));
        assert_eq!(buffer, data);
    }

    #[test]
    fn timeslot_ie_full() {
        let data = [
            0x19, 0x1c, 0x01, 0x08, 0x07, 0x80, 0x00, 0x48, 0x08, 0xfc, 0x03, 0x20, 0x03, 0xe8,
            0x03, 0x98, 0x08, 0x90, 0x01, 0xc0, 0x00, 0x60, 0x09, 0xa0, 0x10, 0x10, 0x27,
        ];
        let ie = NestedInformationElement::new(&data[..]).unwrap();
        let ts = TschTimeslot::new(ie.content()).unwrap();
        assert_eq!(ts.id(), 1);
        let timings = ts.timeslot_timings().unwrap();
        assert_eq!(timings, TimeslotTimings::default());

        let mut buffer = [0u8; 27];
        NestedInformationElementRepr::TschTimeslot { id: 1, timings }
            .emit(&mut buffer)
            .unwrap();
        assert_eq!(buffer, data);
    }

    #[test]
    fn timeslot_ie_default_id() {
        let data = [0x01, 0x1c, 0x00];
        let ie = NestedInformationElement::new(&data[..]).unwrap();
        let ts = TschTimeslot::new(ie.content()).unwrap();
        assert_eq!(ts.id(), 0);
        assert!(ts.timeslot_timings().is_none());
    }

    #[test]
    fn channel_hopping_ie() {
        let sequence = [15, 25, 26, 20];
        let repr = NestedInformationElementRepr::ChannelHopping {
            id: 1,
            sequence: &sequence,
        };
        let mut buffer = [0u8; 18];
        assert_eq!(repr.emit(&mut buffer), Ok(18));
        assert_eq!(&buffer[..2], &[0x10, 0xc8]);

        let ie = NestedInformationElement::new(&buffer[..]).unwrap();
        assert!(ie.is_long());
        assert_eq!(
            ie.sub_id(),
            NestedSubId::Long(NestedSubIdLong::ChannelHopping)
        );
        let ch = ChannelHopping::new(ie.content()).unwrap();
        assert_eq!(ch.hopping_sequence_id(), 1);
        assert_eq!(ch.hopping_sequence(), &sequence);
    }

    #[test]
    fn channel_hopping_default_id() {
        let data = [0x01, 0xc8, 0x00];
        let ie = NestedInformationElement::new(&data[..]).unwrap();
        let ch = ChannelHopping::new(ie.content()).unwrap();
        assert_eq!(ch.hopping_sequence_id(), 0);
        assert!(ch.hopping_sequence().is_empty());
    }

    #[test]
    fn slotframe_and_link_ie() {
        let data = [
            0x0f, 0x1b, 0x01, 0x00, 0x11, 0x00, 0x02, 0x00, 0x00, 0x01, 0x00, 0x06, 0x01, 0x00,
            0x02, 0x00, 0x07,
        ];
        let ie = NestedInformationElement::new(&data[..]).unwrap();
        let sl = TschSlotframeAndLink::new(ie.content()).unwrap();
        assert_eq!(sl.number_of_slotframes(), 1);

        let sf = sl.slotframe_descriptors().next().unwrap();
        assert_eq!(sf.handle(), 0);
        assert_eq!(sf.size(), 17);
        assert_eq!(sf.number_of_links(), 2);

        let links: std::vec::Vec<_> = sf.links().collect();
        assert_eq!(links[0].timeslot(), 0);
        assert_eq!(links[0].channel_offset(), 1);
        assert_eq!(
            links[0].link_options(),
            TschLinkOption::Rx | TschLinkOption::Shared
        );
        assert_eq!(links[1].timeslot(), 1);
        assert_eq!(links[1].channel_offset(), 2);
        assert_eq!(
            links[1].link_options(),
            TschLinkOption::Tx | TschLinkOption::Rx | TschLinkOption::Shared
        );

        let link_reprs = [
            LinkInformationRepr {
                timeslot: 0,
                channel_offset: 1,
                options: TschLinkOption::Rx | TschLinkOption::Shared,
            },
            LinkInformationRepr {
                timeslot: 1,
                channel_offset: 2,
                options: TschLinkOption::Tx | TschLinkOption::Rx | TschLinkOption::Shared,
            },
        ];
        let slotframes = [SlotframeRepr {
            handle: 0,
            size: 17,
            links: &link_reprs,
        }];
        let mut buffer = [0u8; 17];
        NestedInformationElementRepr::TschSlotframeAndLink {
            slotframes: &slotframes,
        }
        .emit(&mut buffer)
        .unwrap();
        assert_eq!(buffer, data);
    }

    #[test]
    fn slotframe_and_link_truncated() {
        assert!(TschSlotframeAndLink::new(&[0x01, 0x00, 0x11, 0x00, 0x02, 0x00][..]).is_err());
    }

    #[test]
    fn iterate_nested() {
        let data = [
            0x06, 0x1a, 0x0e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x1c, 0x00, 0x01, 0xc8, 0x00,
            0x01, 0x1b, 0x00,
        ];
        let ids: std::vec::Vec<_> = NestedInformationElementsIterator::new(&data)
            .map(|ie| ie.sub_id())
            .collect();
        assert_eq!(
            ids,
            [
                NestedSubId::Short(NestedSubIdShort::TschSynchronization),
                NestedSubId::Short(NestedSubIdShort::TschTimeslot),
                NestedSubId::Long(NestedSubIdLong::ChannelHopping),
                NestedSubId::Short(NestedSubIdShort::TschSlotframeAndLink),
            ]
        );
    }
}
