type SequenceNumberInnerType = u16;

// Counts probes over the whole trace. Doubles as ICMP echo sequence number, IPv4 identification
// and offset of the UDP destination port.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct SequenceNumber(SequenceNumberInnerType);

impl SequenceNumber {
    pub(crate) fn start_value() -> SequenceNumber {
        SequenceNumber(0)
    }

    pub(crate) fn next(self) -> Self {
        SequenceNumber(self.0.wrapping_add(1))
    }
}

impl From<SequenceNumber> for SequenceNumberInnerType {
    fn from(value: SequenceNumber) -> Self {
        value.0
    }
}

impl From<SequenceNumberInnerType> for SequenceNumber {
    fn from(value: SequenceNumberInnerType) -> Self {
        SequenceNumber(value)
    }
}
