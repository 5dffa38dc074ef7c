use pcap_parser::LegacyPcapBlock;

/// Capture timestamp, carried through edits unmodified
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Timestamp {
    pub secs: u32,
    /// Sub-second part, in the resolution of the capture file
    pub frac: u32,
}

/// Packet descriptor: what the capture file says about the frame
///
/// `caplen` is the number of bytes actually stored, `origlen` the size of the
/// frame on the wire. `origlen > caplen` means the capture device truncated it.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct PacketHeader {
    pub ts: Timestamp,
    pub caplen: u32,
    pub origlen: u32,
}

impl PacketHeader {
    pub fn new(ts: Timestamp, caplen: u32, origlen: u32) -> Self {
        PacketHeader { ts, caplen, origlen }
    }

    #[inline]
    pub fn caplen(&self) -> usize {
        self.caplen as usize
    }

    #[inline]
    pub fn origlen(&self) -> usize {
        self.origlen as usize
    }

    /// True if the frame was captured completely
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.caplen == self.origlen
    }
}

impl<'a> From<&LegacyPcapBlock<'a>> for PacketHeader {
    fn from(b: &LegacyPcapBlock<'a>) -> Self {
        PacketHeader {
            ts: Timestamp {
                secs: b.ts_sec,
                frac: b.ts_usec,
            },
            caplen: b.caplen,
            origlen: b.origlen,
        }
    }
}
