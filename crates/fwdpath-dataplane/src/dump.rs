//! Per-packet diagnostics
//!
//! Renders everything the data path knows about a burst: link-layer
//! addresses, offload-flag facts, hardware and software classification,
//! per-layer header lengths and tunnel details, plus a structural check
//! with a reason line for malformed buffers.
//!
//! Strictly read-only: classification is recomputed from the frame bytes,
//! nothing is mutated, so a burst can be dumped between receive and
//! transmit without changing what the engine does with it.

use std::fmt::Write as _;

use fwdpath_common::{Direction, PortId, QueueId};
use tracing::info;

use crate::classify::{classify, vxlan_info};
use crate::packet::{FdirMatch, Packet};

/// Log one line per packet of `pkts` under the `pktdump` target.
pub fn dump_burst(port: PortId, queue: QueueId, pkts: &[Packet], direction: Direction) {
    if pkts.is_empty() {
        return;
    }
    info!(
        target: "pktdump",
        "port {}/queue {}: {} {} packets",
        port,
        queue,
        direction.verb(),
        pkts.len()
    );
    for pkt in pkts {
        info!(target: "pktdump", "{}", describe_packet(pkt, queue, direction));
    }
}

/// Render one packet's description. Bounded output, never panics.
pub fn describe_packet(pkt: &Packet, queue: QueueId, direction: Direction) -> String {
    let mut out = String::with_capacity(256);

    match (pkt.ether_src(), pkt.ether_dst(), pkt.ether_type()) {
        (Ok(src), Ok(dst), Ok(ethertype)) => {
            let _ = write!(out, "  src={} - dst={} - type=0x{:04x}", src, dst, ethertype);
        }
        _ => {
            out.push_str("  src=? - dst=? - type=?");
        }
    }
    let _ = write!(out, " - length={} - nb_segs={}", pkt.len(), pkt.nb_segs());

    if let Some(hash) = pkt.rss_hash() {
        let _ = write!(out, " - RSS hash=0x{:x} - RSS queue=0x{:x}", hash, queue.raw());
    }
    match pkt.fdir() {
        Some(FdirMatch::Id(id)) => {
            let _ = write!(out, " - FDIR matched ID=0x{:x}", id);
        }
        Some(FdirMatch::Flex { hi, lo }) => {
            let _ = write!(out, " - FDIR matched flex bytes=0x{:08x} {:08x}", hi, lo);
        }
        Some(FdirMatch::Hash { hash, id }) => {
            let _ = write!(out, " - FDIR matched hash=0x{:x} ID=0x{:x}", hash, id);
        }
        None => {}
    }
    if let Some(ts) = pkt.timestamp() {
        let _ = write!(out, " - timestamp {}", ts);
    }
    if let Some(outer) = pkt.outer_vlan() {
        let _ = write!(
            out,
            " - QinQ VLAN tci=0x{:x}, VLAN tci outer=0x{:x}",
            pkt.vlan().unwrap_or(0),
            outer
        );
    } else if let Some(tci) = pkt.vlan() {
        let _ = write!(out, " - VLAN tci=0x{:x}", tci);
    }
    match direction {
        Direction::Tx => {
            if let Some(md) = pkt.tx_metadata() {
                let _ = write!(out, " - Tx metadata: 0x{:x}", md);
            }
        }
        Direction::Rx => {
            if let Some(md) = pkt.rx_metadata() {
                let _ = write!(out, " - Rx metadata: 0x{:x}", md);
            }
        }
    }

    let hw_class = pkt.hw_class();
    if hw_class.bits() != 0 {
        let _ = write!(out, " - hw ptype: {}", hw_class.name());
    }
    let (sw_class, lens) = classify(pkt.data());
    let _ = write!(out, " - sw ptype: {}", sw_class.name());
    if sw_class.has_l2() {
        let _ = write!(out, " - l2_len={}", lens.l2);
    }
    if sw_class.has_l3() {
        let _ = write!(out, " - l3_len={}", lens.l3);
    }
    if sw_class.has_l4() {
        let _ = write!(out, " - l4_len={}", lens.l4);
    }
    if sw_class.is_tunnel() {
        let _ = write!(out, " - tunnel_len={}", lens.tunnel);
    }
    if sw_class.has_inner_l2() {
        let _ = write!(out, " - inner_l2_len={}", lens.inner_l2);
    }
    if sw_class.has_inner_l3() {
        let _ = write!(out, " - inner_l3_len={}", lens.inner_l3);
    }
    if sw_class.has_inner_l4() {
        let _ = write!(out, " - inner_l4_len={}", lens.inner_l4);
    }
    if sw_class.is_tunnel() {
        if let Some(info) = vxlan_info(pkt.data(), &lens) {
            let _ = write!(
                out,
                " - VXLAN packet: packet type =0x{:x}, Destination UDP port ={}, VNI = {}",
                hw_class.bits(),
                info.udp_dst_port,
                info.vni
            );
        }
    }

    let side = match direction {
        Direction::Rx => "Receive",
        Direction::Tx => "Send",
    };
    let _ = write!(out, " - {} queue=0x{:x}", side, queue.raw());

    let _ = write!(out, "\n  ol_flags: {}", pkt.ol_flags().name_list());

    if let Err(reason) = pkt.verify() {
        let _ = write!(out, "\nINVALID packet: {}", reason);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::VXLAN_UDP_PORT;

    fn eth_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut f = Vec::new();
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 0xAA]);
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 0xBB]);
        f.extend_from_slice(&ethertype.to_be_bytes());
        f.extend_from_slice(payload);
        f
    }

    fn ipv4_udp_frame(dst_port: u16, payload_len: usize) -> Vec<u8> {
        let mut l3 = vec![0u8; 20];
        l3[0] = 0x45;
        l3[9] = 17;
        let mut udp = Vec::new();
        udp.extend_from_slice(&40000u16.to_be_bytes());
        udp.extend_from_slice(&dst_port.to_be_bytes());
        udp.extend_from_slice(&((8 + payload_len) as u16).to_be_bytes());
        udp.extend_from_slice(&[0, 0]);
        l3.extend_from_slice(&udp);
        l3.extend_from_slice(&vec![0u8; payload_len]);
        eth_frame(0x0800, &l3)
    }

    #[test]
    fn test_describe_plain_udp() {
        let mut pkt = Packet::from_frame(&ipv4_udp_frame(53, 12)[..]);
        pkt.set_rss_hash(0x1234);
        pkt.set_vlan(0x64);

        let s = describe_packet(&pkt, QueueId::new(0), Direction::Rx);
        assert!(s.contains("src=02:00:00:00:00:AA"));
        assert!(s.contains("dst=02:00:00:00:00:BB"));
        assert!(s.contains("type=0x0800"));
        assert!(s.contains("RSS hash=0x1234"));
        assert!(s.contains("VLAN tci=0x64"));
        assert!(s.contains("sw ptype: L2_ETHER L3_IPV4 L4_UDP"));
        assert!(s.contains("l2_len=14"));
        assert!(s.contains("l3_len=20"));
        assert!(s.contains("l4_len=8"));
        assert!(s.contains("Receive queue=0x0"));
        assert!(s.contains("ol_flags: RX_RSS_HASH RX_VLAN"));
        assert!(!s.contains("INVALID"));
    }

    #[test]
    fn test_describe_runt_reports_reason_and_batch_continues() {
        let runt = Packet::from_frame(&[0u8; 8][..]);
        let good = Packet::from_frame(&ipv4_udp_frame(53, 4)[..]);

        let s = describe_packet(&runt, QueueId::new(1), Direction::Rx);
        assert!(s.contains("src=? - dst=? - type=?"));
        assert!(s.contains("INVALID packet: frame shorter than minimal ethernet header"));

        // The rest of the batch still renders
        let s2 = describe_packet(&good, QueueId::new(1), Direction::Rx);
        assert!(s2.contains("sw ptype: L2_ETHER L3_IPV4 L4_UDP"));

        // And the batch-level entry point accepts the mix without panicking
        dump_burst(
            PortId::new(0),
            QueueId::new(1),
            &[runt, good],
            Direction::Rx,
        );
    }

    #[test]
    fn test_describe_vxlan_tunnel() {
        // Outer ipv4/udp to the vxlan port, vni 7, inner plain udp frame
        let inner = ipv4_udp_frame(2000, 0);
        let mut vxlan = vec![0x08, 0, 0, 0, 0, 0, 7, 0];
        vxlan.extend_from_slice(&inner);
        let mut l3 = vec![0u8; 20];
        l3[0] = 0x45;
        l3[9] = 17;
        l3.extend_from_slice(&40000u16.to_be_bytes());
        l3.extend_from_slice(&VXLAN_UDP_PORT.to_be_bytes());
        l3.extend_from_slice(&((8 + vxlan.len()) as u16).to_be_bytes());
        l3.extend_from_slice(&[0, 0]);
        l3.extend_from_slice(&vxlan);
        let pkt = Packet::from_frame(&eth_frame(0x0800, &l3)[..]);

        let s = describe_packet(&pkt, QueueId::new(0), Direction::Rx);
        assert!(s.contains("TUNNEL_VXLAN"));
        assert!(s.contains("tunnel_len=8"));
        assert!(s.contains("inner_l2_len=14"));
        assert!(s.contains(&format!("Destination UDP port ={}", VXLAN_UDP_PORT)));
        assert!(s.contains("VNI = 7"));
    }

    #[test]
    fn test_metadata_word_follows_direction() {
        let mut pkt = Packet::from_frame(&ipv4_udp_frame(53, 0)[..]);
        pkt.set_tx_metadata(0xBEEF);

        let tx = describe_packet(&pkt, QueueId::new(0), Direction::Tx);
        assert!(tx.contains("Tx metadata: 0xbeef"));
        assert!(tx.contains("Send queue=0x0"));

        let rx = describe_packet(&pkt, QueueId::new(0), Direction::Rx);
        assert!(!rx.contains("metadata"));
    }

    #[test]
    fn test_fdir_and_qinq_rendering() {
        let mut pkt = Packet::from_frame(&ipv4_udp_frame(53, 0)[..]);
        pkt.set_fdir(FdirMatch::Hash { hash: 0xA, id: 0xB });
        pkt.set_qinq(0x10, 0x20);
        pkt.set_timestamp(123456);

        let s = describe_packet(&pkt, QueueId::new(2), Direction::Rx);
        assert!(s.contains("FDIR matched hash=0xa ID=0xb"));
        assert!(s.contains("QinQ VLAN tci=0x10, VLAN tci outer=0x20"));
        assert!(s.contains("timestamp 123456"));
    }

    #[test]
    fn test_hw_ptype_shown_when_reported() {
        use crate::classify::PacketClass;

        let mut pkt = Packet::from_frame(&ipv4_udp_frame(53, 0)[..]);
        let s = describe_packet(&pkt, QueueId::new(0), Direction::Rx);
        assert!(!s.contains("hw ptype"));

        pkt.set_hw_class(PacketClass::L2_ETHER | PacketClass::L3_IPV4 | PacketClass::L4_UDP);
        let s = describe_packet(&pkt, QueueId::new(0), Direction::Rx);
        assert!(s.contains("hw ptype: L2_ETHER L3_IPV4 L4_UDP"));
    }
}
