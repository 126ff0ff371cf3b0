use crate::address;
use crate::device::Device;
use crate::resolver::{Outcome, Resolution, Verdict};
use crate::topology::Topology;
use crate::types::AddressBinding;
use std::fmt;

const RULE: &str =
    "-----------------------------------------------------------------------------";

fn write_list<T, F>(f: &mut fmt::Formatter<'_>, items: &[T], show: F) -> fmt::Result
where
    F: Fn(&T) -> String,
{
    let shown: Vec<String> = items.iter().map(show).collect();
    write!(f, "[{}]", shown.join(", "))
}

/// `global -> solicited-node -> ethernet multicast`
impl fmt::Display for AddressBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} -> {}",
            self.get_global(),
            self.get_solicited(),
            address::mac_to_string(self.get_solicited_mac())
        )
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings = self.get_bindings();
        writeln!(f, "Name: {}", self.get_name())?;
        writeln!(f, "Type: {}", self.get_device_type())?;
        write!(f, "Global IP: ")?;
        write_list(f, bindings, |b| b.get_global().to_string())?;
        write!(f, "\nSolicited-Node Multicast Address: ")?;
        write_list(f, bindings, |b| b.get_solicited().to_string())?;
        write!(f, "\nMAC address: ")?;
        write_list(f, bindings, |b| address::mac_to_string(b.get_mac()))?;
        write!(f, "\nEthernet destination MAC address: ")?;
        write_list(f, bindings, |b| address::mac_to_string(b.get_solicited_mac()))
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device: [Direct Connections]")?;
        for device in self.devices() {
            let name = device.get_name();
            write!(f, "\n{}: ", name)?;
            match self.neighbors(name.as_str()) {
                Some(links) if !links.is_empty() => {
                    let links: Vec<&str> = links.iter().map(|n| n.as_str()).collect();
                    write!(f, "{}", links.join(", "))?
                }
                _ => write!(f, "No Connections")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Broadcast => f.write_str("BROADCASTING: the switch floods the packet"),
            Verdict::Accepted => f.write_str(
                "ACCEPTED: Ethernet multicast, IPv6 solicited-node multicast/global unicast match",
            ),
            Verdict::DroppedLinkLayer => {
                f.write_str("DROPPED: Ethernet multicast address did NOT match")
            }
            Verdict::DroppedNetworkLayer => {
                f.write_str("DROPPED: IPv6 solicited-node multicast address did NOT match")
            }
            Verdict::DroppedApplicationLayer => {
                f.write_str("DROPPED: IPv6 global unicast address did NOT match")
            }
        }
    }
}

/// how far up the stack the packet travelled
fn layers(verdict: &Verdict) -> Option<&'static str> {
    match verdict {
        Verdict::Broadcast | Verdict::DroppedLinkLayer => None,
        Verdict::DroppedNetworkLayer => Some("NIC Card"),
        Verdict::DroppedApplicationLayer => Some("NIC Card->IPv6 Process"),
        Verdict::Accepted => Some("NIC Card->IPv6 Process->ICMPv6 Process"),
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.get_solicitation();
        writeln!(f, "{}", RULE)?;
        writeln!(f, "NEIGHBOR SOLICITATION")?;
        writeln!(f, "{} is sending broadcast.", self.get_source())?;
        match (self.get_target(), self.get_binding_index()) {
            (Some(target), Some(index)) => {
                writeln!(f, "Packet for {} (address #{}):", target, index)?
            }
            (Some(target), None) => writeln!(f, "Packet for {}:", target)?,
            _ => {}
        }
        writeln!(
            f,
            "[DA: Multicast][DA: Solicited-Node Multicast][ICMPv6 NS - Target IPv6 Address]"
        )?;
        writeln!(
            f,
            "[{}] [{}] [{}]",
            address::mac_to_string(ns.get_solicited_mac()),
            ns.get_solicited(),
            ns.get_target_addr()
        )?;
        for reception in self.get_receptions() {
            let name = reception.get_device();
            writeln!(f)?;
            writeln!(f, "'{}' received neighbor solicitation packet.", name)?;
            if let Some(layers) = layers(reception.get_verdict()) {
                writeln!(f, "Passing Packet Up: {}", layers)?;
            }
            writeln!(f, "{} ({})", name, reception.get_verdict())?;
        }
        writeln!(f, "{}", RULE)?;
        match self.get_outcome() {
            Outcome::Resolved {
                advertisement_path, ..
            } => {
                let path: Vec<&str> = advertisement_path.iter().map(|n| n.as_str()).collect();
                writeln!(f, "NEIGHBOR ADVERTISEMENT")?;
                if let (Some(from), Some(to)) = (path.first(), path.last()) {
                    writeln!(
                        f,
                        "Neighbor Advertisement is being sent from '{}' to '{}'.",
                        from, to
                    )?;
                    writeln!(f, "{}", path.join("->"))?;
                    writeln!(f, "{} received neighbor advertisement from {}", to, from)?;
                }
            }
            Outcome::Unresolved(reason) => {
                writeln!(f, "Address Resolution failed.")?;
                writeln!(f, "{}.", reason)?;
            }
        }
        write!(f, "{}", RULE)
    }
}

#[test]
fn test_device_display() {
    let top = crate::topology::sample_topology();
    let shown = top.find_device_by_name("R2").unwrap().to_string();
    assert!(shown.contains("Type: router"));
    assert!(shown.contains("Global IP: [2001:2::21, 2001:1::21]"));
    assert!(shown.contains("[33-33-ff-00-00-21, 33-33-ff-00-00-21]"));

    let shown = top.find_device_by_name("S1").unwrap().to_string();
    assert!(shown.contains("Global IP: []"));
}

#[test]
fn test_topology_display() {
    let mut top = crate::topology::sample_topology();
    top.create_device("S9", crate::types::DeviceType::Switch, None)
        .unwrap();
    let shown = top.to_string();
    assert!(shown.starts_with("Device: [Direct Connections]\nR1: E1, R2\n"));
    assert!(shown.ends_with("S9: No Connections"));
}

#[test]
fn test_resolution_display() {
    let top = crate::topology::sample_topology();
    let shown = crate::resolver::resolve(&top, "R2", "2001:2::3")
        .unwrap()
        .to_string();
    assert!(shown.contains("Packet for E2 (address #0):"));
    assert!(shown.contains("[33-33-ff-00-00-03] [ff02::1:ff00:3] [2001:2::3]"));
    assert!(shown.contains("S1 (BROADCASTING"));
    assert!(shown.contains("E3 (DROPPED: Ethernet multicast"));
    assert!(shown.contains("E2->S1->R2\n"));

    let shown = crate::resolver::resolve(&top, "E1", "2001:2::3")
        .unwrap()
        .to_string();
    assert!(shown.contains("Address Resolution failed."));
    assert!(!shown.contains("Packet for"));

    // second address of R2
    let shown = crate::resolver::resolve(&top, "R1", "2001:1::21")
        .unwrap()
        .to_string();
    assert!(shown.contains("Packet for R2 (address #1):"));
}
