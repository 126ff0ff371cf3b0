use crate::address;
use crate::device::Device;
use crate::error::Error;
use crate::topology::Topology;
use crate::types::{DeviceName, FailureReason};
use log::{debug, info, trace, warn};
use pnet::util::MacAddr;
use std::collections::{HashSet, VecDeque};
use std::net::Ipv6Addr;

/// what a device did with the Neighbor Solicitation it received
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verdict {
    /// a switch floods the frame out of every port
    Broadcast,
    /// link, network and ICMPv6 layers all matched
    Accepted,
    /// the NIC is not listening on the solicited-node MAC
    DroppedLinkLayer,
    /// the IPv6 layer did not join the solicited-node group
    DroppedNetworkLayer,
    /// the target address belongs to someone else
    DroppedApplicationLayer,
}

/// the three destinations carried by a Neighbor Solicitation
#[derive(getset::Getters, Debug, PartialEq, Eq, Clone)]
pub struct Solicitation {
    #[get = "pub with_prefix"]
    solicited_mac: MacAddr,
    #[get = "pub with_prefix"]
    solicited: Ipv6Addr,
    #[get = "pub with_prefix"]
    target_addr: Ipv6Addr,
}

impl Solicitation {
    pub fn new(target_addr: Ipv6Addr) -> Self {
        let solicited = address::solicited_node(&target_addr);
        Solicitation {
            solicited_mac: address::solicited_node_mac(&solicited),
            solicited,
            target_addr,
        }
    }

    /// run the frame up the receiver's stack
    pub fn deliver_to(&self, receiver: &Device) -> Verdict {
        if receiver.is_switch() {
            Verdict::Broadcast
        } else if !receiver.listens_on_mac(&self.solicited_mac) {
            Verdict::DroppedLinkLayer
        } else if !receiver.listens_on_group(&self.solicited) {
            Verdict::DroppedNetworkLayer
        } else if !receiver.owns_address(&self.target_addr) {
            Verdict::DroppedApplicationLayer
        } else {
            Verdict::Accepted
        }
    }
}

#[derive(getset::Getters, Debug, PartialEq, Eq, Clone)]
pub struct Reception {
    #[get = "pub with_prefix"]
    device: DeviceName,
    #[get = "pub with_prefix"]
    verdict: Verdict,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Outcome {
    Resolved {
        /// source first, target last
        solicitation_path: Vec<DeviceName>,
        /// target first, source last
        advertisement_path: Vec<DeviceName>,
    },
    Unresolved(FailureReason),
}

/// everything that happened during one NS/NA exchange
#[derive(getset::Getters, Debug, Clone)]
pub struct Resolution {
    #[get = "pub with_prefix"]
    source: DeviceName,
    /// owner of the target address, if any
    #[get = "pub with_prefix"]
    target: Option<DeviceName>,
    /// index of the target address among the target's bindings
    #[get = "pub with_prefix"]
    binding_index: Option<usize>,
    #[get = "pub with_prefix"]
    solicitation: Solicitation,
    /// every non-source device the solicitation reached, in BFS order
    #[get = "pub with_prefix"]
    receptions: Vec<Reception>,
    #[get = "pub with_prefix"]
    outcome: Outcome,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, Outcome::Resolved { .. })
    }

    pub fn advertisement_path(&self) -> Result<&[DeviceName], Error> {
        match &self.outcome {
            Outcome::Resolved {
                advertisement_path, ..
            } => Ok(advertisement_path),
            Outcome::Unresolved(reason) => Err(Error::ResolutionFailed(*reason)),
        }
    }

    #[cfg(test)]
    pub fn verdict_of(&self, name: &str) -> Option<Verdict> {
        self.receptions
            .iter()
            .find(|reception| reception.device.as_str() == name)
            .map(|reception| reception.verdict)
    }

    fn unresolved(source: DeviceName, solicitation: Solicitation, reason: FailureReason) -> Self {
        warn!(
            "Resolver: {} cannot resolve {}: {}",
            source,
            solicitation.target_addr,
            reason
        );
        Resolution {
            source,
            target: None,
            binding_index: None,
            solicitation,
            receptions: Vec::new(),
            outcome: Outcome::Unresolved(reason),
        }
    }
}

/// send a Neighbor Solicitation for `target_ip` from `source` and answer it
///
/// The solicitation floods breadth-first through switches, bounded by the
/// target's subnet. Routers and end devices never pass it on. The first path
/// reaching the owner of `target_ip` is the shortest one, and the Neighbor
/// Advertisement walks it back.
pub fn resolve(topology: &Topology, source: &str, target_ip: &str) -> Result<Resolution, Error> {
    let src = topology
        .find_device_by_name(source)
        .ok_or_else(|| Error::NotFound(format!("device {}", source)))?;
    let target_addr = address::parse_ipv6(target_ip)?;
    let solicitation = Solicitation::new(target_addr);
    let src_name = src.get_name().clone();

    if !src.same_subnet_as_address(&target_addr) {
        return Ok(Resolution::unresolved(
            src_name,
            solicitation,
            FailureReason::SourceOffSubnet,
        ));
    }
    let Some(target) = topology.find_device_by_ip(&target_addr) else {
        return Ok(Resolution::unresolved(
            src_name,
            solicitation,
            FailureReason::UnknownTarget,
        ));
    };
    let binding_index = target.address_index(&target_addr);

    info!(
        "Resolver: {} is sending a NS for {} to [{}] [{}]",
        src_name,
        target_addr,
        address::mac_to_string(&solicitation.solicited_mac),
        solicitation.solicited
    );

    let mut visited: HashSet<DeviceName> = HashSet::from([src_name.clone()]);
    let mut queue: VecDeque<Vec<DeviceName>> = VecDeque::from([vec![src_name.clone()]]);
    let mut receptions = Vec::new();
    let mut found: Option<Vec<DeviceName>> = None;

    while let Some(path) = queue.pop_front() {
        let Some(cur) = path.last().and_then(|name| topology.find_device_by_name(name.as_str()))
        else {
            continue;
        };
        trace!("Resolver: dequeued {:?}", path);

        if cur != src {
            let verdict = solicitation.deliver_to(cur);
            debug!("Resolver: {} received the NS: {:?}", cur.get_name(), verdict);
            receptions.push(Reception {
                device: cur.get_name().clone(),
                verdict,
            });
            // only switches pass a solicitation on
            if !cur.is_switch() && cur != target {
                continue;
            }
        }
        if cur == target {
            if found.is_none() {
                found = Some(path);
            }
            continue;
        }

        for neighbor in topology.neighbors(cur.get_name().as_str()).unwrap_or_default() {
            if visited.contains(neighbor) {
                continue;
            }
            let in_flood_domain = topology
                .find_device_by_name(neighbor.as_str())
                .is_some_and(|dev| dev.same_subnet_as_address(&target_addr));
            if !in_flood_domain {
                continue;
            }
            visited.insert(neighbor.clone());
            let mut next = path.clone();
            next.push(neighbor.clone());
            queue.push_back(next);
        }
    }

    let outcome = match found {
        Some(solicitation_path) => {
            let advertisement_path: Vec<DeviceName> =
                solicitation_path.iter().rev().cloned().collect();
            info!(
                "Resolver: {} sent a NA for {} back along {:?}",
                target.get_name(),
                target_addr,
                advertisement_path
            );
            Outcome::Resolved {
                solicitation_path,
                advertisement_path,
            }
        }
        None => {
            warn!(
                "Resolver: the NS for {} from {} never reached {}",
                target_addr,
                src_name,
                target.get_name()
            );
            Outcome::Unresolved(FailureReason::Unreachable)
        }
    };

    Ok(Resolution {
        source: src_name,
        target: Some(target.get_name().clone()),
        binding_index,
        solicitation,
        receptions,
        outcome,
    })
}

#[cfg(test)]
fn names(path: &[DeviceName]) -> Vec<&str> {
    path.iter().map(|name| name.as_str()).collect()
}

#[cfg(test)]
use crate::types::DeviceType;

#[test]
fn test_resolve_direct_neighbor() {
    let mut top = Topology::new();
    top.create_device("R1", DeviceType::Router, Some(("2001:1::1", "12-21-12-12-12-12")))
        .unwrap();
    top.create_device("E1", DeviceType::End, Some(("2001:1::2", "43-43-43-43-43-43")))
        .unwrap();
    top.add_connection("R1", "E1").unwrap();

    let res = resolve(&top, "R1", "2001:1::2").unwrap();
    assert!(res.is_resolved());
    assert_eq!(res.get_target().as_ref().unwrap().as_str(), "E1");
    assert_eq!(*res.get_binding_index(), Some(0));
    assert_eq!(res.verdict_of("E1"), Some(Verdict::Accepted));
    assert_eq!(res.get_receptions().len(), 1);
    match res.get_outcome() {
        Outcome::Resolved {
            solicitation_path,
            advertisement_path,
        } => {
            assert_eq!(names(solicitation_path), vec!["R1", "E1"]);
            assert_eq!(names(advertisement_path), vec!["E1", "R1"]);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(
        *res.get_solicitation().get_solicited_mac(),
        address::parse_mac("33-33-ff-00-00-02").unwrap()
    );
}

#[test]
fn test_resolve_through_switch() {
    let top = crate::topology::sample_topology();
    let res = resolve(&top, "R2", "2001:2::3").unwrap();
    assert_eq!(
        names(res.advertisement_path().unwrap()),
        vec!["E2", "S1", "R2"]
    );
    assert_eq!(res.verdict_of("S1"), Some(Verdict::Broadcast));
    assert_eq!(res.verdict_of("E2"), Some(Verdict::Accepted));
    assert_eq!(res.verdict_of("E3"), Some(Verdict::DroppedLinkLayer));
    // R1 has nothing in 2001:2::/64, the flood never reaches it
    assert_eq!(res.verdict_of("R1"), None);
}

#[test]
fn test_routers_do_not_forward() {
    let top = crate::topology::sample_topology();
    // R2 shares 2001:1::/64 with R1 but is not the target
    let res = resolve(&top, "R1", "2001:1::2").unwrap();
    assert!(res.is_resolved());
    assert_eq!(res.verdict_of("R2"), Some(Verdict::DroppedLinkLayer));
    assert_eq!(res.verdict_of("S1"), None);

    let mut top = Topology::new();
    top.create_device("A", DeviceType::End, Some(("2001:1::1", "00-00-00-00-00-01")))
        .unwrap();
    top.create_device("R", DeviceType::Router, Some(("2001:1::2", "00-00-00-00-00-02")))
        .unwrap();
    top.create_device("B", DeviceType::End, Some(("2001:1::3", "00-00-00-00-00-03")))
        .unwrap();
    top.add_connection("A", "R").unwrap();
    top.add_connection("R", "B").unwrap();
    let res = resolve(&top, "A", "2001:1::3").unwrap();
    assert_eq!(*res.get_outcome(), Outcome::Unresolved(FailureReason::Unreachable));
    assert_eq!(res.verdict_of("R"), Some(Verdict::DroppedLinkLayer));
    assert_eq!(res.verdict_of("B"), None);
    assert!(matches!(
        res.advertisement_path(),
        Err(Error::ResolutionFailed(FailureReason::Unreachable))
    ));
}

#[test]
fn test_shortest_path_wins() {
    // E1 - S1 - S2 - E2 and E1 - S3 - S4 - S5 - E2
    let mut top = Topology::new();
    top.create_device("E1", DeviceType::End, Some(("2001:1::1", "00-00-00-00-00-01")))
        .unwrap();
    for name in ["S3", "S4", "S5", "S1", "S2"] {
        top.create_device(name, DeviceType::Switch, None).unwrap();
    }
    top.create_device("E2", DeviceType::End, Some(("2001:1::2", "00-00-00-00-00-02")))
        .unwrap();
    for (a, b) in [
        ("E1", "S3"),
        ("S3", "S4"),
        ("S4", "S5"),
        ("S5", "E2"),
        ("E1", "S1"),
        ("S1", "S2"),
        ("S2", "E2"),
    ] {
        top.add_connection(a, b).unwrap();
    }
    let res = resolve(&top, "E1", "2001:1::2").unwrap();
    match res.get_outcome() {
        Outcome::Resolved {
            solicitation_path, ..
        } => assert_eq!(names(solicitation_path), vec!["E1", "S1", "S2", "E2"]),
        other => panic!("unexpected outcome {:?}", other),
    }
    // E2 is received once even though two branches lead to it
    assert_eq!(
        res.get_receptions()
            .iter()
            .filter(|r| r.get_device().as_str() == "E2")
            .count(),
        1
    );
}

#[test]
fn test_application_layer_drop() {
    // same low 24 bits, same subnet, different address
    let mut top = Topology::new();
    top.create_device("E1", DeviceType::End, Some(("2001:1::1", "00-00-00-00-00-01")))
        .unwrap();
    top.create_device("S1", DeviceType::Switch, None).unwrap();
    top.create_device("E2", DeviceType::End, Some(("2001:1::5", "00-00-00-00-00-02")))
        .unwrap();
    top.create_device("E3", DeviceType::End, Some(("2001:1:0:0:1::5", "00-00-00-00-00-03")))
        .unwrap();
    top.add_connection("E1", "S1").unwrap();
    top.add_connection("S1", "E3").unwrap();
    top.add_connection("S1", "E2").unwrap();

    let res = resolve(&top, "E1", "2001:1::5").unwrap();
    assert!(res.is_resolved());
    assert_eq!(res.verdict_of("E3"), Some(Verdict::DroppedApplicationLayer));
    assert_eq!(res.verdict_of("E2"), Some(Verdict::Accepted));
}

#[test]
fn test_deliver_to() {
    let solicitation = Solicitation::new("2001:1::5".parse().unwrap());
    let receiver = Device::new(
        "E9",
        DeviceType::End,
        vec![crate::types::AddressBinding::new(
            "2001:1::6".parse().unwrap(),
            address::parse_mac("00-00-00-00-00-09").unwrap(),
        )],
    );
    assert_eq!(solicitation.deliver_to(&receiver), Verdict::DroppedLinkLayer);
    assert_eq!(
        solicitation.deliver_to(&Device::switch("S9")),
        Verdict::Broadcast
    );
}

#[test]
fn test_cross_subnet_failure() {
    let top = crate::topology::sample_topology();
    let res = resolve(&top, "E1", "2001:2::3").unwrap();
    assert!(!res.is_resolved());
    assert!(res.get_receptions().is_empty());
    assert!(matches!(
        res.advertisement_path(),
        Err(Error::ResolutionFailed(FailureReason::SourceOffSubnet))
    ));

    let res = resolve(&top, "E1", "2001:1::99").unwrap();
    assert_eq!(*res.get_outcome(), Outcome::Unresolved(FailureReason::UnknownTarget));

    // nobody owns it and it is outside E1's subnet, the subnet check wins
    let res = resolve(&top, "E1", "2001:9::1").unwrap();
    assert_eq!(*res.get_outcome(), Outcome::Unresolved(FailureReason::SourceOffSubnet));

    assert!(matches!(resolve(&top, "X", "2001:1::2"), Err(Error::NotFound(_))));
    assert!(matches!(resolve(&top, "E1", "2001::1::2"), Err(Error::MalformedAddress(_))));
}

#[test]
fn test_disconnected_target() {
    let mut top = crate::topology::sample_topology();
    top.remove_connection("R1", "E1").unwrap();
    let res = resolve(&top, "R1", "2001:1::2").unwrap();
    assert_eq!(*res.get_outcome(), Outcome::Unresolved(FailureReason::Unreachable));
}

#[test]
fn test_resolve_own_address() {
    let top = crate::topology::sample_topology();
    let res = resolve(&top, "R1", "2001:1::1").unwrap();
    assert_eq!(names(res.advertisement_path().unwrap()), vec!["R1"]);
    assert!(res.get_receptions().is_empty());
}

#[test]
fn test_routers_end_the_flood_on_a_chain() {
    // E1 - R1 - R2 - S1 - E2, all in 2001:1::/64
    let mut top = Topology::new();
    top.create_device("R1", DeviceType::Router, Some(("2001:1::1", "00-00-00-00-00-01")))
        .unwrap();
    top.create_device("E1", DeviceType::End, Some(("2001:1::2", "00-00-00-00-00-02")))
        .unwrap();
    top.create_device("R2", DeviceType::Router, Some(("2001:1::3", "00-00-00-00-00-03")))
        .unwrap();
    top.create_device("S1", DeviceType::Switch, None).unwrap();
    top.create_device("E2", DeviceType::End, Some(("2001:1::4", "00-00-00-00-00-04")))
        .unwrap();
    for (a, b) in [("R1", "E1"), ("R1", "R2"), ("R2", "S1"), ("S1", "E2")] {
        top.add_connection(a, b).unwrap();
    }

    let res = resolve(&top, "E1", "2001:1::4").unwrap();
    assert_eq!(*res.get_outcome(), Outcome::Unresolved(FailureReason::Unreachable));
    assert_eq!(res.verdict_of("R1"), Some(Verdict::DroppedLinkLayer));
    assert_eq!(res.get_receptions().len(), 1);

    // from the far side of R2 the switch carries it
    let res = resolve(&top, "R2", "2001:1::4").unwrap();
    assert_eq!(names(res.advertisement_path().unwrap()), vec!["E2", "S1", "R2"]);

    // and with E2 moved to another subnet the source check fires first
    top.remove_device_named("E2").unwrap();
    top.create_device("E2", DeviceType::End, Some(("2001:2::4", "00-00-00-00-00-04")))
        .unwrap();
    let res = resolve(&top, "E1", "2001:2::4").unwrap();
    assert_eq!(*res.get_outcome(), Outcome::Unresolved(FailureReason::SourceOffSubnet));
    assert!(res.get_receptions().is_empty());
}
