//! Packet buffers and metadata views
//!
//! An owned frame plus the per-packet device metadata the data path cares
//! about: offload/classification flags, hash and filter-match words, VLAN
//! tags, timestamp and the application metadata word.
//!
//! # Design
//!
//! - One exclusive owner at a time; dropping a `Packet` is the free operation
//! - Flag-gated accessors so a flag and its field can never disagree
//! - Header accessors return `Err` on runt frames, never panic

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::classify::PacketClass;

/// Ethernet link-layer address length
pub const ETHER_ADDR_LEN: usize = 6;

/// Minimal Ethernet header length (dst + src + ether-type)
pub const ETHER_HDR_LEN: usize = 14;

/// Frame too short to hold an Ethernet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("frame too short for ethernet header: {len} < {ETHER_HDR_LEN} bytes")]
pub struct RuntFrame {
    /// Actual frame length
    pub len: usize,
}

/// Link-layer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; ETHER_ADDR_LEN]);

impl MacAddr {
    /// Create from raw octets
    #[inline(always)]
    pub const fn new(octets: [u8; ETHER_ADDR_LEN]) -> Self {
        Self(octets)
    }

    /// Raw octets
    #[inline(always)]
    pub const fn octets(&self) -> [u8; ETHER_ADDR_LEN] {
        self.0
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Per-packet offload/classification flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OffloadFlags(u32);

impl OffloadFlags {
    /// RSS hash computed by the device
    pub const RX_RSS_HASH: Self = Self(1 << 0);
    /// Flow-director filter matched
    pub const RX_FDIR: Self = Self(1 << 1);
    /// Flow-director match reported an identifier
    pub const RX_FDIR_ID: Self = Self(1 << 2);
    /// Flow-director match reported flexible bytes
    pub const RX_FDIR_FLEX: Self = Self(1 << 3);
    /// Device receive timestamp present
    pub const RX_TIMESTAMP: Self = Self(1 << 4);
    /// VLAN tag stripped into metadata
    pub const RX_VLAN: Self = Self(1 << 5);
    /// Outer VLAN tag present (QinQ)
    pub const RX_QINQ: Self = Self(1 << 6);
    /// Metadata word attached on receive
    pub const RX_METADATA: Self = Self(1 << 7);
    /// Metadata word to carry out on transmit
    pub const TX_METADATA: Self = Self(1 << 8);

    const NAMES: [(Self, &'static str); 9] = [
        (Self::RX_RSS_HASH, "RX_RSS_HASH"),
        (Self::RX_FDIR, "RX_FDIR"),
        (Self::RX_FDIR_ID, "RX_FDIR_ID"),
        (Self::RX_FDIR_FLEX, "RX_FDIR_FLEX"),
        (Self::RX_TIMESTAMP, "RX_TIMESTAMP"),
        (Self::RX_VLAN, "RX_VLAN"),
        (Self::RX_QINQ, "RX_QINQ"),
        (Self::RX_METADATA, "RX_METADATA"),
        (Self::TX_METADATA, "TX_METADATA"),
    ];

    /// No flags set
    #[inline(always)]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// All of `other`'s bits set
    #[inline(always)]
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Set `other`'s bits
    #[inline(always)]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear `other`'s bits
    #[inline(always)]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Space-separated names of all set flags
    pub fn name_list(&self) -> String {
        let mut out = String::new();
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(name);
            }
        }
        out
    }
}

/// Flow-director match metadata, in the three shapes devices report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FdirMatch {
    /// Filter identifier only
    Id(u32),
    /// Flexible bytes captured by the filter
    Flex {
        /// High word
        hi: u32,
        /// Low word
        lo: u32,
    },
    /// Hash plus filter identifier
    Hash {
        /// Computed filter hash
        hash: u16,
        /// Filter identifier
        id: u16,
    },
}

/// An owned packet: contiguous frame bytes plus device metadata.
///
/// Transmit acceptance consumes the packet; dropping it releases the backing
/// memory, so every packet is freed exactly once.
pub struct Packet {
    data: BytesMut,
    nb_segs: u8,
    ol_flags: OffloadFlags,
    hw_class: PacketClass,
    rss: u32,
    fdir: Option<FdirMatch>,
    timestamp: u64,
    vlan_tci: u16,
    vlan_tci_outer: u16,
    metadata: u32,
}

impl Packet {
    /// Wrap a raw frame. Single segment, no metadata.
    pub fn from_frame(frame: impl Into<BytesMut>) -> Self {
        Self {
            data: frame.into(),
            nb_segs: 1,
            ol_flags: OffloadFlags::empty(),
            hw_class: PacketClass::UNKNOWN,
            rss: 0,
            fdir: None,
            timestamp: 0,
            vlan_tci: 0,
            vlan_tci_outer: 0,
            metadata: 0,
        }
    }

    /// Frame bytes
    #[inline(always)]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable frame bytes
    #[inline(always)]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Total packet length in bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the frame holds no bytes
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Segment count
    #[inline(always)]
    pub fn nb_segs(&self) -> u8 {
        self.nb_segs
    }

    /// Override the segment count (segmented-buffer collaborators)
    pub fn set_nb_segs(&mut self, nb_segs: u8) {
        self.nb_segs = nb_segs;
    }

    /// Current flag word
    #[inline(always)]
    pub fn ol_flags(&self) -> OffloadFlags {
        self.ol_flags
    }

    /// Hardware-reported classification (may be `UNKNOWN`)
    #[inline(always)]
    pub fn hw_class(&self) -> PacketClass {
        self.hw_class
    }

    /// Attach a hardware-reported classification
    pub fn set_hw_class(&mut self, class: PacketClass) {
        self.hw_class = class;
    }

    /// RSS hash, when the device computed one
    #[inline]
    pub fn rss_hash(&self) -> Option<u32> {
        self.ol_flags
            .contains(OffloadFlags::RX_RSS_HASH)
            .then_some(self.rss)
    }

    /// Attach an RSS hash
    pub fn set_rss_hash(&mut self, hash: u32) {
        self.rss = hash;
        self.ol_flags.insert(OffloadFlags::RX_RSS_HASH);
    }

    /// Flow-director match, when the filter hit
    #[inline]
    pub fn fdir(&self) -> Option<FdirMatch> {
        self.ol_flags
            .contains(OffloadFlags::RX_FDIR)
            .then_some(self.fdir)
            .flatten()
    }

    /// Attach a flow-director match
    pub fn set_fdir(&mut self, m: FdirMatch) {
        self.ol_flags.insert(OffloadFlags::RX_FDIR);
        match m {
            FdirMatch::Id(_) => self.ol_flags.insert(OffloadFlags::RX_FDIR_ID),
            FdirMatch::Flex { .. } => self.ol_flags.insert(OffloadFlags::RX_FDIR_FLEX),
            FdirMatch::Hash { .. } => {}
        }
        self.fdir = Some(m);
    }

    /// Device receive timestamp, when present
    #[inline]
    pub fn timestamp(&self) -> Option<u64> {
        self.ol_flags
            .contains(OffloadFlags::RX_TIMESTAMP)
            .then_some(self.timestamp)
    }

    /// Attach a receive timestamp
    pub fn set_timestamp(&mut self, ts: u64) {
        self.timestamp = ts;
        self.ol_flags.insert(OffloadFlags::RX_TIMESTAMP);
    }

    /// Stripped VLAN tag, when present
    #[inline]
    pub fn vlan(&self) -> Option<u16> {
        self.ol_flags
            .contains(OffloadFlags::RX_VLAN)
            .then_some(self.vlan_tci)
    }

    /// Outer VLAN tag, when the frame was double-tagged
    #[inline]
    pub fn outer_vlan(&self) -> Option<u16> {
        self.ol_flags
            .contains(OffloadFlags::RX_QINQ)
            .then_some(self.vlan_tci_outer)
    }

    /// Attach a stripped VLAN tag
    pub fn set_vlan(&mut self, tci: u16) {
        self.vlan_tci = tci;
        self.ol_flags.insert(OffloadFlags::RX_VLAN);
    }

    /// Attach inner and outer tags of a double-tagged frame
    pub fn set_qinq(&mut self, tci: u16, outer_tci: u16) {
        self.vlan_tci = tci;
        self.vlan_tci_outer = outer_tci;
        self.ol_flags.insert(OffloadFlags::RX_VLAN);
        self.ol_flags.insert(OffloadFlags::RX_QINQ);
    }

    /// Metadata word attached on receive
    #[inline]
    pub fn rx_metadata(&self) -> Option<u32> {
        self.ol_flags
            .contains(OffloadFlags::RX_METADATA)
            .then_some(self.metadata)
    }

    /// Attach a receive metadata word
    pub fn set_rx_metadata(&mut self, value: u32) {
        self.metadata = value;
        self.ol_flags.insert(OffloadFlags::RX_METADATA);
    }

    /// Metadata word to be carried out on transmit
    #[inline]
    pub fn tx_metadata(&self) -> Option<u32> {
        self.ol_flags
            .contains(OffloadFlags::TX_METADATA)
            .then_some(self.metadata)
    }

    /// Stamp a transmit metadata word and raise the flag
    pub fn set_tx_metadata(&mut self, value: u32) {
        self.metadata = value;
        self.ol_flags.insert(OffloadFlags::TX_METADATA);
    }

    /// Destination link-layer address
    #[inline]
    pub fn ether_dst(&self) -> Result<MacAddr, RuntFrame> {
        self.check_ether()?;
        let mut octets = [0u8; ETHER_ADDR_LEN];
        octets.copy_from_slice(&self.data[0..ETHER_ADDR_LEN]);
        Ok(MacAddr(octets))
    }

    /// Source link-layer address
    #[inline]
    pub fn ether_src(&self) -> Result<MacAddr, RuntFrame> {
        self.check_ether()?;
        let mut octets = [0u8; ETHER_ADDR_LEN];
        octets.copy_from_slice(&self.data[ETHER_ADDR_LEN..2 * ETHER_ADDR_LEN]);
        Ok(MacAddr(octets))
    }

    /// Ether-type field, host byte order
    #[inline]
    pub fn ether_type(&self) -> Result<u16, RuntFrame> {
        self.check_ether()?;
        Ok(u16::from_be_bytes([self.data[12], self.data[13]]))
    }

    /// Exchange source and destination link-layer addresses in place.
    ///
    /// No allocation, no length change. Applying twice restores the frame.
    #[inline]
    pub fn swap_ether_addrs(&mut self) -> Result<(), RuntFrame> {
        self.check_ether()?;
        let (dst, rest) = self.data.split_at_mut(ETHER_ADDR_LEN);
        dst.swap_with_slice(&mut rest[..ETHER_ADDR_LEN]);
        Ok(())
    }

    /// Structural sanity check; `Err` carries a human-readable reason.
    pub fn verify(&self) -> Result<(), &'static str> {
        if self.data.is_empty() {
            return Err("empty packet buffer");
        }
        if self.nb_segs == 0 {
            return Err("zero segment count");
        }
        if self.data.len() < ETHER_HDR_LEN {
            return Err("frame shorter than minimal ethernet header");
        }
        Ok(())
    }

    #[inline(always)]
    fn check_ether(&self) -> Result<(), RuntFrame> {
        if self.data.len() < ETHER_HDR_LEN {
            return Err(RuntFrame {
                len: self.data.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.len())
            .field("nb_segs", &self.nb_segs)
            .field("ol_flags", &self.ol_flags.name_list())
            .finish()
    }
}
