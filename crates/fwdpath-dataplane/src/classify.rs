//! Software protocol classification
//!
//! Computes a layer-by-layer classification and per-layer header lengths
//! from raw frame bytes, without touching the buffer. Recognizes Ethernet
//! (single- and double-tagged), IPv4 with options, IPv6, the common L4
//! protocols, and VXLAN encapsulation with an inner Ethernet stack.
//!
//! Classification here is read-only and independent of whatever the device
//! reported; the diagnostic dumper prints both and lets the reader compare.

use serde::{Deserialize, Serialize};

/// Ether-type: IPv4
const ETHERTYPE_IPV4: u16 = 0x0800;
/// Ether-type: IPv6
const ETHERTYPE_IPV6: u16 = 0x86DD;
/// Ether-type: single VLAN tag
const ETHERTYPE_VLAN: u16 = 0x8100;
/// Ether-type: 802.1ad outer tag
const ETHERTYPE_QINQ: u16 = 0x88A8;

/// IANA-assigned VXLAN UDP destination port
pub const VXLAN_UDP_PORT: u16 = 4789;

const IP_PROTO_ICMP: u8 = 1;
const IP_PROTO_TCP: u8 = 6;
const IP_PROTO_UDP: u8 = 17;
const IP_PROTO_SCTP: u8 = 132;

const ETHER_HDR: usize = 14;
const VLAN_TAG: usize = 4;
const IPV6_HDR: usize = 40;
const UDP_HDR: usize = 8;
const SCTP_HDR: usize = 12;
const ICMP_HDR: usize = 8;
const VXLAN_HDR: usize = 8;

/// Layered packet classification, one nibble per layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PacketClass(u32);

impl PacketClass {
    /// Nothing classified
    pub const UNKNOWN: Self = Self(0);

    /// Plain Ethernet
    pub const L2_ETHER: Self = Self(0x0000_0001);
    /// Ethernet with one VLAN tag
    pub const L2_ETHER_VLAN: Self = Self(0x0000_0002);
    /// Ethernet with stacked VLAN tags
    pub const L2_ETHER_QINQ: Self = Self(0x0000_0003);

    /// IPv4, no options
    pub const L3_IPV4: Self = Self(0x0000_0010);
    /// IPv4 with options
    pub const L3_IPV4_EXT: Self = Self(0x0000_0020);
    /// IPv6
    pub const L3_IPV6: Self = Self(0x0000_0030);

    /// UDP
    pub const L4_UDP: Self = Self(0x0000_0100);
    /// TCP
    pub const L4_TCP: Self = Self(0x0000_0200);
    /// SCTP
    pub const L4_SCTP: Self = Self(0x0000_0300);
    /// ICMP
    pub const L4_ICMP: Self = Self(0x0000_0400);

    /// VXLAN encapsulation
    pub const TUNNEL_VXLAN: Self = Self(0x0000_1000);

    /// Inner Ethernet
    pub const INNER_L2_ETHER: Self = Self(0x0001_0000);
    /// Inner IPv4
    pub const INNER_L3_IPV4: Self = Self(0x0010_0000);
    /// Inner IPv6
    pub const INNER_L3_IPV6: Self = Self(0x0020_0000);
    /// Inner UDP
    pub const INNER_L4_UDP: Self = Self(0x0100_0000);
    /// Inner TCP
    pub const INNER_L4_TCP: Self = Self(0x0200_0000);

    const L2_MASK: u32 = 0x0000_000F;
    const L3_MASK: u32 = 0x0000_00F0;
    const L4_MASK: u32 = 0x0000_0F00;
    const TUNNEL_MASK: u32 = 0x0000_F000;
    const INNER_L2_MASK: u32 = 0x000F_0000;
    const INNER_L3_MASK: u32 = 0x00F0_0000;
    const INNER_L4_MASK: u32 = 0x0F00_0000;

    /// Raw mask value
    #[inline(always)]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Link layer classified
    #[inline(always)]
    pub const fn has_l2(self) -> bool {
        self.0 & Self::L2_MASK != 0
    }

    /// Network layer classified
    #[inline(always)]
    pub const fn has_l3(self) -> bool {
        self.0 & Self::L3_MASK != 0
    }

    /// Transport layer classified
    #[inline(always)]
    pub const fn has_l4(self) -> bool {
        self.0 & Self::L4_MASK != 0
    }

    /// Recognized tunnel encapsulation
    #[inline(always)]
    pub const fn is_tunnel(self) -> bool {
        self.0 & Self::TUNNEL_MASK != 0
    }

    /// Inner link layer classified
    #[inline(always)]
    pub const fn has_inner_l2(self) -> bool {
        self.0 & Self::INNER_L2_MASK != 0
    }

    /// Inner network layer classified
    #[inline(always)]
    pub const fn has_inner_l3(self) -> bool {
        self.0 & Self::INNER_L3_MASK != 0
    }

    /// Inner transport layer classified
    #[inline(always)]
    pub const fn has_inner_l4(self) -> bool {
        self.0 & Self::INNER_L4_MASK != 0
    }

    /// Outer network layer is IPv4 (with or without options)
    #[inline(always)]
    pub const fn is_ipv4(self) -> bool {
        let l3 = self.0 & Self::L3_MASK;
        l3 == Self::L3_IPV4.0 || l3 == Self::L3_IPV4_EXT.0
    }

    /// Outer network layer is IPv6
    #[inline(always)]
    pub const fn is_ipv6(self) -> bool {
        self.0 & Self::L3_MASK == Self::L3_IPV6.0
    }

    /// Human-readable layer list, e.g. `L2_ETHER L3_IPV4 L4_UDP`
    pub fn name(self) -> String {
        if self.0 == 0 {
            return "UNKNOWN".to_string();
        }
        let mut parts: Vec<&'static str> = Vec::new();
        match self.0 & Self::L2_MASK {
            x if x == Self::L2_ETHER.0 => parts.push("L2_ETHER"),
            x if x == Self::L2_ETHER_VLAN.0 => parts.push("L2_ETHER_VLAN"),
            x if x == Self::L2_ETHER_QINQ.0 => parts.push("L2_ETHER_QINQ"),
            _ => {}
        }
        match self.0 & Self::L3_MASK {
            x if x == Self::L3_IPV4.0 => parts.push("L3_IPV4"),
            x if x == Self::L3_IPV4_EXT.0 => parts.push("L3_IPV4_EXT"),
            x if x == Self::L3_IPV6.0 => parts.push("L3_IPV6"),
            _ => {}
        }
        match self.0 & Self::L4_MASK {
            x if x == Self::L4_UDP.0 => parts.push("L4_UDP"),
            x if x == Self::L4_TCP.0 => parts.push("L4_TCP"),
            x if x == Self::L4_SCTP.0 => parts.push("L4_SCTP"),
            x if x == Self::L4_ICMP.0 => parts.push("L4_ICMP"),
            _ => {}
        }
        if self.0 & Self::TUNNEL_MASK == Self::TUNNEL_VXLAN.0 {
            parts.push("TUNNEL_VXLAN");
        }
        if self.0 & Self::INNER_L2_MASK == Self::INNER_L2_ETHER.0 {
            parts.push("INNER_L2_ETHER");
        }
        match self.0 & Self::INNER_L3_MASK {
            x if x == Self::INNER_L3_IPV4.0 => parts.push("INNER_L3_IPV4"),
            x if x == Self::INNER_L3_IPV6.0 => parts.push("INNER_L3_IPV6"),
            _ => {}
        }
        match self.0 & Self::INNER_L4_MASK {
            x if x == Self::INNER_L4_UDP.0 => parts.push("INNER_L4_UDP"),
            x if x == Self::INNER_L4_TCP.0 => parts.push("INNER_L4_TCP"),
            _ => {}
        }
        parts.join(" ")
    }
}

impl std::ops::BitOr for PacketClass {
    type Output = Self;

    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for PacketClass {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Per-layer header lengths, zero where a layer was not classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderLens {
    /// Link-layer header length (tags included)
    pub l2: u16,
    /// Network-layer header length
    pub l3: u16,
    /// Transport-layer header length
    pub l4: u16,
    /// Tunnel header length
    pub tunnel: u16,
    /// Inner link-layer header length
    pub inner_l2: u16,
    /// Inner network-layer header length
    pub inner_l3: u16,
    /// Inner transport-layer header length
    pub inner_l4: u16,
}

/// Recognized VXLAN encapsulation facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VxlanInfo {
    /// Encapsulating UDP destination port
    pub udp_dst_port: u16,
    /// 24-bit VXLAN network identifier
    pub vni: u32,
}

struct L2Parse {
    class: PacketClass,
    len: usize,
    ethertype: u16,
}

fn parse_l2(frame: &[u8], off: usize) -> Option<L2Parse> {
    if frame.len() < off + ETHER_HDR {
        return None;
    }
    let mut cursor = off + 12;
    let mut ethertype = u16::from_be_bytes([frame[cursor], frame[cursor + 1]]);
    let mut tags = 0usize;
    while (ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_QINQ) && tags < 2 {
        if frame.len() < cursor + VLAN_TAG + 2 {
            break;
        }
        cursor += VLAN_TAG;
        ethertype = u16::from_be_bytes([frame[cursor], frame[cursor + 1]]);
        tags += 1;
    }
    let class = match tags {
        0 => PacketClass::L2_ETHER,
        1 => PacketClass::L2_ETHER_VLAN,
        _ => PacketClass::L2_ETHER_QINQ,
    };
    Some(L2Parse {
        class,
        len: ETHER_HDR + tags * VLAN_TAG,
        ethertype,
    })
}

struct L3Parse {
    class: PacketClass,
    len: usize,
    proto: u8,
}

fn parse_l3(frame: &[u8], off: usize, ethertype: u16) -> Option<L3Parse> {
    match ethertype {
        ETHERTYPE_IPV4 => {
            if frame.len() < off + 20 {
                return None;
            }
            let b = frame[off];
            if b >> 4 != 4 {
                return None;
            }
            let ihl = ((b & 0x0F) as usize) * 4;
            if ihl < 20 || frame.len() < off + ihl {
                return None;
            }
            let class = if ihl > 20 {
                PacketClass::L3_IPV4_EXT
            } else {
                PacketClass::L3_IPV4
            };
            Some(L3Parse {
                class,
                len: ihl,
                proto: frame[off + 9],
            })
        }
        ETHERTYPE_IPV6 => {
            if frame.len() < off + IPV6_HDR {
                return None;
            }
            if frame[off] >> 4 != 6 {
                return None;
            }
            Some(L3Parse {
                class: PacketClass::L3_IPV6,
                len: IPV6_HDR,
                proto: frame[off + 6],
            })
        }
        _ => None,
    }
}

struct L4Parse {
    class: PacketClass,
    len: usize,
}

fn parse_l4(frame: &[u8], off: usize, proto: u8) -> Option<L4Parse> {
    match proto {
        IP_PROTO_UDP => {
            if frame.len() < off + UDP_HDR {
                return None;
            }
            Some(L4Parse {
                class: PacketClass::L4_UDP,
                len: UDP_HDR,
            })
        }
        IP_PROTO_TCP => {
            if frame.len() < off + 20 {
                return None;
            }
            let doff = ((frame[off + 12] >> 4) as usize) * 4;
            if doff < 20 || frame.len() < off + doff {
                return None;
            }
            Some(L4Parse {
                class: PacketClass::L4_TCP,
                len: doff,
            })
        }
        IP_PROTO_SCTP => {
            if frame.len() < off + SCTP_HDR {
                return None;
            }
            Some(L4Parse {
                class: PacketClass::L4_SCTP,
                len: SCTP_HDR,
            })
        }
        IP_PROTO_ICMP => {
            if frame.len() < off + ICMP_HDR {
                return None;
            }
            Some(L4Parse {
                class: PacketClass::L4_ICMP,
                len: ICMP_HDR,
            })
        }
        _ => None,
    }
}

/// Classify a raw frame, outermost to innermost.
///
/// Stops at the deepest layer that parses; a runt or unrecognized frame
/// yields whatever prefix did classify (possibly `UNKNOWN`).
pub fn classify(frame: &[u8]) -> (PacketClass, HeaderLens) {
    let mut class = PacketClass::UNKNOWN;
    let mut lens = HeaderLens::default();

    let l2 = match parse_l2(frame, 0) {
        Some(l2) => l2,
        None => return (class, lens),
    };
    class |= l2.class;
    lens.l2 = l2.len as u16;
    let mut off = l2.len;

    let l3 = match parse_l3(frame, off, l2.ethertype) {
        Some(l3) => l3,
        None => return (class, lens),
    };
    class |= l3.class;
    lens.l3 = l3.len as u16;
    off += l3.len;

    let l4 = match parse_l4(frame, off, l3.proto) {
        Some(l4) => l4,
        None => return (class, lens),
    };
    class |= l4.class;
    lens.l4 = l4.len as u16;

    // VXLAN rides UDP on its registered port
    if l3.proto == IP_PROTO_UDP {
        let dst_port = u16::from_be_bytes([frame[off + 2], frame[off + 3]]);
        if dst_port == VXLAN_UDP_PORT && frame.len() >= off + UDP_HDR + VXLAN_HDR {
            class |= PacketClass::TUNNEL_VXLAN;
            lens.tunnel = VXLAN_HDR as u16;
            off += UDP_HDR + VXLAN_HDR;
            classify_inner(frame, off, &mut class, &mut lens);
        }
    }

    (class, lens)
}

fn classify_inner(frame: &[u8], off: usize, class: &mut PacketClass, lens: &mut HeaderLens) {
    let l2 = match parse_l2(frame, off) {
        Some(l2) => l2,
        None => return,
    };
    *class |= PacketClass::INNER_L2_ETHER;
    lens.inner_l2 = l2.len as u16;
    let mut cursor = off + l2.len;

    let l3 = match parse_l3(frame, cursor, l2.ethertype) {
        Some(l3) => l3,
        None => return,
    };
    *class |= match l3.class {
        c if c == PacketClass::L3_IPV6 => PacketClass::INNER_L3_IPV6,
        _ => PacketClass::INNER_L3_IPV4,
    };
    lens.inner_l3 = l3.len as u16;
    cursor += l3.len;

    if let Some(l4) = parse_l4(frame, cursor, l3.proto) {
        *class |= match l4.class {
            c if c == PacketClass::L4_TCP => PacketClass::INNER_L4_TCP,
            _ => PacketClass::INNER_L4_UDP,
        };
        lens.inner_l4 = l4.len as u16;
    }
}

/// Extract encapsulation facts from a frame already classified as VXLAN.
pub fn vxlan_info(frame: &[u8], lens: &HeaderLens) -> Option<VxlanInfo> {
    if lens.tunnel == 0 {
        return None;
    }
    let udp_off = (lens.l2 + lens.l3) as usize;
    let vxlan_off = udp_off + UDP_HDR;
    if frame.len() < vxlan_off + VXLAN_HDR {
        return None;
    }
    let udp_dst_port = u16::from_be_bytes([frame[udp_off + 2], frame[udp_off + 3]]);
    let vni = u32::from_be_bytes([
        frame[vxlan_off + 4],
        frame[vxlan_off + 5],
        frame[vxlan_off + 6],
        frame[vxlan_off + 7],
    ]) >> 8;
    Some(VxlanInfo { udp_dst_port, vni })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0u8; 12];
        f.extend_from_slice(&ethertype.to_be_bytes());
        f.extend_from_slice(payload);
        f
    }

    fn ipv4_header(proto: u8, payload_len: usize) -> Vec<u8> {
        let mut h = vec![0u8; 20];
        h[0] = 0x45;
        let total = 20 + payload_len;
        h[2..4].copy_from_slice(&(total as u16).to_be_bytes());
        h[8] = 64;
        h[9] = proto;
        h[12..16].copy_from_slice(&[192, 168, 0, 1]);
        h[16..20].copy_from_slice(&[10, 0, 0, 1]);
        h
    }

    fn udp_header(src: u16, dst: u16, payload_len: usize) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(&src.to_be_bytes());
        h.extend_from_slice(&dst.to_be_bytes());
        h.extend_from_slice(&((8 + payload_len) as u16).to_be_bytes());
        h.extend_from_slice(&[0, 0]);
        h
    }

    fn udp_packet(dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut l3 = ipv4_header(17, 8 + payload.len());
        l3.extend_from_slice(&udp_header(40000, dst_port, payload.len()));
        l3.extend_from_slice(payload);
        eth_frame(0x0800, &l3)
    }

    #[test]
    fn test_classify_ipv4_udp() {
        let frame = udp_packet(53, &[0u8; 20]);
        let (class, lens) = classify(&frame);

        assert_eq!(class.name(), "L2_ETHER L3_IPV4 L4_UDP");
        assert_eq!(lens.l2, 14);
        assert_eq!(lens.l3, 20);
        assert_eq!(lens.l4, 8);
        assert!(!class.is_tunnel());
    }

    #[test]
    fn test_classify_vlan_tagged() {
        let mut inner = Vec::new();
        inner.extend_from_slice(&[0x00, 0x64]); // tci
        inner.extend_from_slice(&0x0800u16.to_be_bytes());
        inner.extend_from_slice(&ipv4_header(6, 20));
        inner.extend_from_slice(&{
            let mut tcp = vec![0u8; 20];
            tcp[12] = 0x50;
            tcp
        });
        let frame = eth_frame(0x8100, &inner);
        let (class, lens) = classify(&frame);

        assert_eq!(class.name(), "L2_ETHER_VLAN L3_IPV4 L4_TCP");
        assert_eq!(lens.l2, 18);
        assert_eq!(lens.l4, 20);
    }

    #[test]
    fn test_classify_ipv6_tcp() {
        let mut l3 = vec![0u8; 40];
        l3[0] = 0x60;
        l3[6] = 6; // next header: TCP
        let mut tcp = vec![0u8; 20];
        tcp[12] = 0x50;
        l3.extend_from_slice(&tcp);
        let frame = eth_frame(0x86DD, &l3);
        let (class, lens) = classify(&frame);

        assert_eq!(class.name(), "L2_ETHER L3_IPV6 L4_TCP");
        assert_eq!(lens.l3, 40);
        assert!(class.is_ipv6());
    }

    #[test]
    fn test_classify_vxlan_encapsulated() {
        // Inner: plain ethernet / ipv4 / udp
        let inner_frame = udp_packet(2000, &[0u8; 4]);

        // VXLAN header, vni 99
        let mut vxlan = vec![0x08, 0, 0, 0, 0, 0, 0, 0];
        vxlan[4..7].copy_from_slice(&[0, 0, 99]);
        let mut payload = vxlan;
        payload.extend_from_slice(&inner_frame);

        let mut outer = ipv4_header(17, 8 + payload.len());
        outer.extend_from_slice(&udp_header(40000, VXLAN_UDP_PORT, payload.len()));
        outer.extend_from_slice(&payload);
        let frame = eth_frame(0x0800, &outer);

        let (class, lens) = classify(&frame);
        assert!(class.is_tunnel());
        assert_eq!(
            class.name(),
            "L2_ETHER L3_IPV4 L4_UDP TUNNEL_VXLAN INNER_L2_ETHER INNER_L3_IPV4 INNER_L4_UDP"
        );
        assert_eq!(lens.tunnel, 8);
        assert_eq!(lens.inner_l2, 14);
        assert_eq!(lens.inner_l3, 20);
        assert_eq!(lens.inner_l4, 8);

        let info = vxlan_info(&frame, &lens).unwrap();
        assert_eq!(info.udp_dst_port, VXLAN_UDP_PORT);
        assert_eq!(info.vni, 99);
    }

    #[test]
    fn test_classify_runt() {
        let (class, lens) = classify(&[0u8; 6]);
        assert_eq!(class, PacketClass::UNKNOWN);
        assert_eq!(class.name(), "UNKNOWN");
        assert_eq!(lens, HeaderLens::default());
    }

    #[test]
    fn test_classify_non_ip_stops_at_l2() {
        let frame = eth_frame(0x0806, &[0u8; 28]); // ARP
        let (class, lens) = classify(&frame);
        assert_eq!(class.name(), "L2_ETHER");
        assert_eq!(lens.l2, 14);
        assert_eq!(lens.l3, 0);
    }

    #[test]
    fn test_ipv4_options_classified_ext() {
        let mut l3 = vec![0u8; 24];
        l3[0] = 0x46; // ihl 6 words
        l3[9] = 17;
        l3.extend_from_slice(&udp_header(1, 2, 0));
        let frame = eth_frame(0x0800, &l3);
        let (class, lens) = classify(&frame);
        assert!(class.is_ipv4());
        assert_eq!(lens.l3, 24);
        assert_eq!(class.name(), "L2_ETHER L3_IPV4_EXT L4_UDP");
    }
}
