use crate::address;
use crate::device::Device;
use crate::error::Error;
use crate::types::{AddressBinding, DeviceName, DeviceType};
use log::{debug, info};
use pnet::util::MacAddr;
use std::collections::HashMap;
use std::net::Ipv6Addr;

#[derive(Debug, Clone)]
struct Node {
    device: Device,
    /// insertion ordered, mirrored in every neighbor's own list
    links: Vec<DeviceName>,
}

/// an undirected graph of devices
#[derive(Debug, Default, Clone)]
pub struct Topology {
    nodes: HashMap<DeviceName, Node>,
    order: Vec<DeviceName>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// devices in the order they were added
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.order.iter().filter_map(|name| self.nodes.get(name)).map(|node| &node.device)
    }

    pub fn neighbors(&self, name: &str) -> Option<&[DeviceName]> {
        self.nodes.get(name).map(|node| node.links.as_slice())
    }

    /// register a device without any connection,
    /// returns false and leaves the topology untouched if the name is taken
    pub fn add_device(&mut self, device: Device) -> bool {
        if !self.name_available(device.get_name().as_str()) {
            return false;
        }
        let name = device.get_name().clone();
        info!("Topology: added {} {}", device.get_device_type(), name);
        self.order.push(name.clone());
        self.nodes.insert(
            name,
            Node {
                device,
                links: Vec::new(),
            },
        );
        true
    }

    pub fn name_available(&self, name: &str) -> bool {
        !self.nodes.contains_key(name)
    }

    pub fn find_device_by_name(&self, name: &str) -> Option<&Device> {
        self.nodes.get(name).map(|node| &node.device)
    }

    /// the first device, in insertion order, owning `ip`
    pub fn find_device_by_ip(&self, ip: &Ipv6Addr) -> Option<&Device> {
        self.devices().find(|device| device.owns_address(ip))
    }

    pub fn ip_in_use(&self, raw_ip: &str) -> bool {
        match address::parse_ipv6(raw_ip) {
            Ok(ip) => self.find_device_by_ip(&ip).is_some(),
            Err(_) => false,
        }
    }

    /// unicast and solicited-node MACs both count
    pub fn mac_in_use(&self, raw_mac: &str) -> bool {
        match address::parse_mac(raw_mac) {
            Ok(mac) => self.mac_taken(&mac),
            Err(_) => false,
        }
    }

    fn mac_taken(&self, mac: &MacAddr) -> bool {
        self.devices().any(|device| device.uses_mac(mac))
    }

    /// link two devices, an existing link is duplicated
    pub fn connect(&mut self, a: &str, b: &str) -> Result<(), Error> {
        let a = self.require(a)?.get_name().clone();
        let b = self.require(b)?.get_name().clone();
        if let Some(node) = self.nodes.get_mut(&a) {
            node.links.push(b.clone());
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.links.push(a.clone());
        }
        debug!("Topology: connected {} and {}", a, b);
        Ok(())
    }

    pub fn disconnect(&mut self, a: &str, b: &str) -> Result<(), Error> {
        let not_found = || Error::NotFound(format!("connection between {} and {}", a, b));
        let a_links = &self.nodes.get(a).ok_or_else(not_found)?.links;
        let b_links = &self.nodes.get(b).ok_or_else(not_found)?.links;
        let a_pos = a_links.iter().position(|n| n.as_str() == b);
        let b_pos = b_links.iter().position(|n| n.as_str() == a);
        let (Some(a_pos), Some(b_pos)) = (a_pos, b_pos) else {
            return Err(not_found());
        };
        if let Some(node) = self.nodes.get_mut(a) {
            node.links.remove(a_pos);
        }
        if let Some(node) = self.nodes.get_mut(b) {
            node.links.remove(b_pos);
        }
        debug!("Topology: disconnected {} and {}", a, b);
        Ok(())
    }

    pub fn connected(&self, a: &str, b: &str) -> bool {
        let links_to = |from: &str, to: &str| {
            self.nodes
                .get(from)
                .is_some_and(|node| node.links.iter().any(|n| n.as_str() == to))
        };
        links_to(a, b) || links_to(b, a)
    }

    /// drop the device and every link pointing at it
    pub fn remove_device(&mut self, name: &str) -> Option<Device> {
        let node = self.nodes.remove(name)?;
        for neighbor in node.links.iter() {
            if let Some(other) = self.nodes.get_mut(neighbor) {
                other.links.retain(|n| n.as_str() != name);
            }
        }
        self.order.retain(|n| n.as_str() != name);
        info!("Topology: removed {}", name);
        Some(node.device)
    }

    fn require(&self, name: &str) -> Result<&Device, Error> {
        self.find_device_by_name(name)
            .ok_or_else(|| Error::NotFound(format!("device {}", name)))
    }

    /// validate an address pair about to be bound to some device
    pub fn check_new_binding(&self, raw_ip: &str, raw_mac: &str) -> Result<AddressBinding, Error> {
        let ip = address::parse_ipv6(raw_ip)?;
        if !address::is_global_unicast(&ip) {
            return Err(Error::InvalidAddressClass(ip));
        }
        if self.find_device_by_ip(&ip).is_some() {
            return Err(Error::DuplicateAddress(ip.to_string()));
        }
        let mac = address::parse_mac(raw_mac)?;
        if self.mac_taken(&mac) {
            return Err(Error::DuplicateAddress(address::mac_to_string(&mac)));
        }
        Ok(AddressBinding::new(ip, mac))
    }

    /// create and register a device, routers and end devices need an address
    pub fn create_device(
        &mut self,
        name: &str,
        device_type: DeviceType,
        address: Option<(&str, &str)>,
    ) -> Result<&Device, Error> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidOperation(format!(
                "{:?} is not a usable device name",
                name
            )));
        }
        if !self.name_available(name) {
            return Err(Error::InvalidOperation(format!("device {} already exists", name)));
        }
        let device = match (device_type, address) {
            (DeviceType::Switch, None) => Device::switch(name),
            (DeviceType::Switch, Some(_)) => {
                return Err(Error::InvalidOperation(
                    "a switch does not take an address".to_string(),
                ));
            }
            (_, None) => {
                return Err(Error::InvalidOperation(format!(
                    "a {} needs an address",
                    device_type
                )));
            }
            (_, Some((ip, mac))) => {
                Device::new(name, device_type, vec![self.check_new_binding(ip, mac)?])
            }
        };
        self.add_device(device);
        self.require(name)
    }

    /// bind one more address to a router
    pub fn add_binding(&mut self, name: &str, raw_ip: &str, raw_mac: &str) -> Result<&AddressBinding, Error> {
        self.require_router(name)?;
        let binding = self.check_new_binding(raw_ip, raw_mac)?;
        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("device {}", name)))?;
        info!(
            "Topology: bound {} ({}) to {}",
            binding.get_global(),
            address::mac_to_string(binding.get_mac()),
            name
        );
        node.device.push_binding(binding);
        node.device
            .get_bindings()
            .last()
            .ok_or_else(|| Error::NotFound(format!("address on {}", name)))
    }

    /// unbind an address from a router, then cut every link whose ends no
    /// longer share a subnet; returns the neighbors that were cut off
    pub fn remove_binding(&mut self, name: &str, raw_ip: &str) -> Result<Vec<DeviceName>, Error> {
        self.require_router(name)?;
        let ip = address::parse_ipv6(raw_ip)?;
        let node = self
            .nodes
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("device {}", name)))?;
        let index = node
            .device
            .address_index(&ip)
            .ok_or_else(|| Error::NotFound(format!("address {} on {}", ip, name)))?;
        node.device.remove_binding(index);
        info!("Topology: unbound {} from {}", ip, name);

        let device = node.device.clone();
        let links = node.links.clone();
        let mut dropped: Vec<DeviceName> = Vec::new();
        for neighbor in links {
            let off_subnet = self
                .nodes
                .get(&neighbor)
                .is_some_and(|other| !device.same_subnet(&other.device));
            if off_subnet && !dropped.contains(&neighbor) {
                dropped.push(neighbor);
            }
        }
        for neighbor in dropped.iter() {
            while self.disconnect(name, neighbor.as_str()).is_ok() {}
        }
        Ok(dropped)
    }

    fn require_router(&self, name: &str) -> Result<&Device, Error> {
        let device = self.require(name)?;
        if *device.get_device_type() != DeviceType::Router {
            return Err(Error::InvalidOperation(format!(
                "{} is a {}, only routers carry more than one address",
                name,
                device.get_device_type()
            )));
        }
        Ok(device)
    }

    /// link two distinct, not yet linked devices that share a subnet
    pub fn add_connection(&mut self, a: &str, b: &str) -> Result<(), Error> {
        let dev_a = self.require(a)?;
        let dev_b = self.require(b)?;
        if dev_a == dev_b {
            return Err(Error::InvalidOperation(
                "cannot connect a device to itself".to_string(),
            ));
        }
        if self.connected(a, b) {
            return Err(Error::InvalidOperation(format!(
                "{} and {} are already connected",
                a, b
            )));
        }
        if !dev_a.same_subnet(dev_b) {
            return Err(Error::InvalidOperation(format!(
                "{} and {} have no addresses in the same subnet",
                a, b
            )));
        }
        self.connect(a, b)
    }

    pub fn remove_connection(&mut self, a: &str, b: &str) -> Result<(), Error> {
        self.require(a)?;
        self.require(b)?;
        self.disconnect(a, b)
    }

    pub fn remove_device_named(&mut self, name: &str) -> Result<Device, Error> {
        self.remove_device(name)
            .ok_or_else(|| Error::NotFound(format!("device {}", name)))
    }
}

#[cfg(test)]
pub(crate) fn sample_topology() -> Topology {
    // R1 - E1, R1 - R2 - S1 - {E2, E3}
    let mut top = Topology::new();
    top.create_device("R1", DeviceType::Router, Some(("2001:1::1", "12-21-12-12-12-12")))
        .unwrap();
    top.create_device("E1", DeviceType::End, Some(("2001:1::2", "43-43-43-43-43-43")))
        .unwrap();
    top.create_device("S1", DeviceType::Switch, None).unwrap();
    top.create_device("R2", DeviceType::Router, Some(("2001:2::21", "43-43-53-45-34-43")))
        .unwrap();
    top.create_device("E2", DeviceType::End, Some(("2001:2::3", "44-53-63-73-43-43")))
        .unwrap();
    top.create_device("E3", DeviceType::End, Some(("2001:2::6", "99-99-53-43-23-43")))
        .unwrap();
    top.add_binding("R2", "2001:1::21", "43-54-65-67-65-12").unwrap();
    top.add_connection("R1", "E1").unwrap();
    top.add_connection("R1", "R2").unwrap();
    top.add_connection("R2", "S1").unwrap();
    top.add_connection("S1", "E2").unwrap();
    top.add_connection("S1", "E3").unwrap();
    top
}

#[cfg(test)]
fn assert_symmetric(top: &Topology) {
    for device in top.devices() {
        let name = device.get_name().as_str();
        for neighbor in top.neighbors(name).unwrap() {
            let back = top.neighbors(neighbor.as_str()).unwrap();
            assert_eq!(
                back.iter().filter(|n| n.as_str() == name).count(),
                top.neighbors(name)
                    .unwrap()
                    .iter()
                    .filter(|n| *n == neighbor)
                    .count(),
                "{} <-> {}",
                name,
                neighbor
            );
        }
    }
}

#[test]
fn test_add_and_find() {
    let top = sample_topology();
    assert_eq!(top.len(), 6);
    assert!(!top.name_available("R1"));
    assert!(top.name_available("R3"));
    assert_eq!(
        top.devices().map(|d| d.get_name().as_str()).collect::<Vec<_>>(),
        vec!["R1", "E1", "S1", "R2", "E2", "E3"]
    );
    let e2 = top.find_device_by_ip(&"2001:2::3".parse().unwrap()).unwrap();
    assert_eq!(e2.get_name().as_str(), "E2");
    assert!(top.find_device_by_ip(&"2001:2::4".parse().unwrap()).is_none());
    assert_eq!(
        top.find_device_by_name("S1").unwrap().get_device_type(),
        &DeviceType::Switch
    );

    assert!(top.ip_in_use("2001:0002:0000:0000:0000:0000:0000:0003"));
    assert!(!top.ip_in_use("2001:2::99"));
    assert!(!top.ip_in_use("garbage"));
    assert!(top.mac_in_use("43-43-43-43-43-43"));
    assert!(top.mac_in_use("33-33-FF-00-00-02"));
    assert!(!top.mac_in_use("00-00-00-00-00-01"));
}

#[test]
fn test_add_device_keeps_existing() {
    let mut top = sample_topology();
    assert!(!top.add_device(Device::switch("R1")));
    assert_eq!(
        top.find_device_by_name("R1").unwrap().get_device_type(),
        &DeviceType::Router
    );
    assert_eq!(top.neighbors("R1").unwrap().len(), 2);
}

#[test]
fn test_connect_symmetry() {
    let mut top = Topology::new();
    top.add_device(Device::switch("A"));
    top.add_device(Device::switch("B"));
    assert!(!top.connected("A", "B"));
    top.connect("A", "B").unwrap();
    assert!(top.connected("A", "B"));
    assert!(top.connected("B", "A"));
    assert_symmetric(&top);
    top.disconnect("B", "A").unwrap();
    assert!(!top.connected("A", "B"));
    assert!(!top.connected("B", "A"));
    assert!(matches!(top.disconnect("A", "B"), Err(Error::NotFound(_))));
    assert!(matches!(top.connect("A", "C"), Err(Error::NotFound(_))));

    // the raw operation does not look for an existing link
    top.connect("A", "B").unwrap();
    top.connect("A", "B").unwrap();
    assert_eq!(top.neighbors("A").unwrap().len(), 2);
    assert_symmetric(&top);
}

#[test]
fn test_remove_device_cascade() {
    let mut top = sample_topology();
    let removed = top.remove_device("S1").unwrap();
    assert_eq!(removed.get_name().as_str(), "S1");
    assert!(top.find_device_by_name("S1").is_none());
    for device in top.devices() {
        let links = top.neighbors(device.get_name().as_str()).unwrap();
        assert!(links.iter().all(|n| n.as_str() != "S1"));
    }
    assert!(top.neighbors("E2").unwrap().is_empty());
    assert!(top.remove_device("S1").is_none());
    assert!(matches!(top.remove_device_named("S1"), Err(Error::NotFound(_))));
    assert_symmetric(&top);
}

#[test]
fn test_create_device_checks() {
    let mut top = sample_topology();
    assert!(matches!(
        top.create_device("R1", DeviceType::Router, Some(("2001:1::7", "00-00-00-00-00-07"))),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        top.create_device("R3", DeviceType::Router, Some(("2001:1::1", "00-00-00-00-00-07"))),
        Err(Error::DuplicateAddress(_))
    ));
    assert!(matches!(
        top.create_device("R3", DeviceType::Router, Some(("fe80::1", "00-00-00-00-00-07"))),
        Err(Error::InvalidAddressClass(_))
    ));
    assert!(matches!(
        top.create_device("R3", DeviceType::Router, Some(("2001:1::", "00:00:00:00:00:07"))),
        Err(Error::MalformedAddress(_))
    ));
    assert!(matches!(
        top.create_device("R3", DeviceType::Router, Some(("2001:1:::7", "00-00-00-00-00-07"))),
        Err(Error::MalformedAddress(_))
    ));
    assert!(matches!(
        top.create_device("R3", DeviceType::Router, Some(("2001:1::7", "12-21-12-12-12-12"))),
        Err(Error::DuplicateAddress(_))
    ));
    assert!(matches!(
        top.create_device("S2", DeviceType::Switch, Some(("2001:1::7", "00-00-00-00-00-07"))),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        top.create_device("E9", DeviceType::End, None),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        top.create_device("bad name", DeviceType::Switch, None),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(top.len(), 6);

    let r3 = top
        .create_device("R3", DeviceType::Router, Some(("2001:1::7", "00-00-00-00-00-07")))
        .unwrap();
    assert_eq!(r3.get_bindings().len(), 1);
}

#[test]
fn test_bindings() {
    let mut top = sample_topology();
    assert!(matches!(
        top.add_binding("E1", "2001:4::1", "00-00-00-00-00-07"),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        top.add_binding("S1", "2001:4::1", "00-00-00-00-00-07"),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        top.add_binding("R9", "2001:4::1", "00-00-00-00-00-07"),
        Err(Error::NotFound(_))
    ));
    let binding = top.add_binding("R1", "2001:4::1", "00-00-00-00-00-07").unwrap();
    assert_eq!(binding.get_global().to_string(), "2001:4::1");
    assert_eq!(top.find_device_by_name("R1").unwrap().get_bindings().len(), 2);

    assert!(matches!(
        top.remove_binding("R1", "2001:4::2"),
        Err(Error::NotFound(_))
    ));
    assert!(top.remove_binding("R1", "2001:4::1").unwrap().is_empty());
}

#[test]
fn test_remove_binding_prunes_links() {
    let mut top = sample_topology();
    // R2 is left with 2001:2::21 only
    let dropped = top.remove_binding("R2", "2001:1::21").unwrap();
    assert_eq!(dropped, vec![DeviceName::from("R1")]);
    assert!(!top.connected("R1", "R2"));
    // the switch stays, it shares every subnet
    assert!(top.connected("R2", "S1"));
    assert_symmetric(&top);
}

#[test]
fn test_add_connection_checks() {
    let mut top = sample_topology();
    assert!(matches!(top.add_connection("R1", "R1"), Err(Error::InvalidOperation(_))));
    assert!(matches!(top.add_connection("R1", "E1"), Err(Error::InvalidOperation(_))));
    assert!(matches!(top.add_connection("E2", "R1"), Err(Error::InvalidOperation(_))));
    assert!(matches!(top.add_connection("E2", "X"), Err(Error::NotFound(_))));
    top.add_connection("E2", "R2").unwrap();
    assert!(top.connected("R2", "E2"));

    assert!(matches!(top.remove_connection("E1", "E2"), Err(Error::NotFound(_))));
    top.remove_connection("E2", "R2").unwrap();
    assert!(!top.connected("E2", "R2"));
    assert_symmetric(&top);
}
