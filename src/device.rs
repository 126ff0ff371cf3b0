use crate::address;
use crate::types::{AddressBinding, DeviceName, DeviceType};
use pnet::util::MacAddr;
use std::hash::{Hash, Hasher};
use std::net::Ipv6Addr;

/// a node of the topology: a router, an end device or a switch
///
/// two devices are the same device iff their names match
#[derive(getset::Getters, Debug, Clone)]
pub struct Device {
    #[get = "pub with_prefix"]
    name: DeviceName,
    #[get = "pub with_prefix"]
    device_type: DeviceType,
    /// always empty for a switch
    #[get = "pub with_prefix"]
    bindings: Vec<AddressBinding>,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl Device {
    pub fn new(
        name: impl Into<DeviceName>,
        device_type: DeviceType,
        bindings: Vec<AddressBinding>,
    ) -> Self {
        Device {
            name: name.into(),
            device_type,
            bindings,
        }
    }

    pub fn switch(name: impl Into<DeviceName>) -> Self {
        Self::new(name, DeviceType::Switch, Vec::new())
    }

    pub fn is_switch(&self) -> bool {
        self.device_type == DeviceType::Switch
    }

    /// true if the two devices have an address in a common subnet,
    /// a switch shares every subnet
    pub fn same_subnet(&self, other: &Device) -> bool {
        if self.is_switch() || other.is_switch() {
            return true;
        }
        self.bindings.iter().any(|mine| {
            other
                .bindings
                .iter()
                .any(|theirs| address::same_subnet(mine.get_global(), theirs.get_global()))
        })
    }

    pub fn same_subnet_as_address(&self, ip: &Ipv6Addr) -> bool {
        if self.is_switch() {
            return true;
        }
        self.bindings
            .iter()
            .any(|binding| address::same_subnet(binding.get_global(), ip))
    }

    pub fn address_index(&self, ip: &Ipv6Addr) -> Option<usize> {
        self.bindings
            .iter()
            .position(|binding| binding.get_global() == ip)
    }

    pub fn owns_address(&self, ip: &Ipv6Addr) -> bool {
        self.address_index(ip).is_some()
    }

    /// whether the NIC takes frames sent to this solicited-node MAC
    pub fn listens_on_mac(&self, solicited_mac: &MacAddr) -> bool {
        self.bindings
            .iter()
            .any(|binding| binding.get_solicited_mac() == solicited_mac)
    }

    /// whether the IPv6 layer joined this solicited-node group
    pub fn listens_on_group(&self, solicited: &Ipv6Addr) -> bool {
        self.bindings
            .iter()
            .any(|binding| binding.get_solicited() == solicited)
    }

    /// unicast or solicited-node MAC
    pub fn uses_mac(&self, mac: &MacAddr) -> bool {
        self.bindings
            .iter()
            .any(|binding| binding.get_mac() == mac || binding.get_solicited_mac() == mac)
    }

    pub(crate) fn push_binding(&mut self, binding: AddressBinding) {
        self.bindings.push(binding)
    }

    pub(crate) fn remove_binding(&mut self, index: usize) -> Option<AddressBinding> {
        if index < self.bindings.len() {
            Some(self.bindings.remove(index))
        } else {
            None
        }
    }
}

#[cfg(test)]
fn binding(ip: &str, mac: &str) -> AddressBinding {
    AddressBinding::new(ip.parse().unwrap(), address::parse_mac(mac).unwrap())
}

#[test]
fn test_equality_by_name() {
    use std::collections::HashSet;

    let r1 = Device::new(
        "R1",
        DeviceType::Router,
        vec![binding("2001:1::1", "12-21-12-12-12-12")],
    );
    let also_r1 = Device::switch("R1");
    assert_eq!(r1, also_r1);
    let set: HashSet<Device> = [r1, also_r1].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn test_same_subnet() {
    let r1 = Device::new(
        "R1",
        DeviceType::Router,
        vec![
            binding("2001:1::1", "12-21-12-12-12-12"),
            binding("2001:3::8", "13-14-61-61-15-12"),
        ],
    );
    let e1 = Device::new(
        "E1",
        DeviceType::End,
        vec![binding("2001:1::2", "43-43-43-43-43-43")],
    );
    let e2 = Device::new(
        "E2",
        DeviceType::End,
        vec![binding("2001:2::3", "44-53-63-73-43-43")],
    );
    let r2 = Device::new(
        "R2",
        DeviceType::Router,
        vec![binding("2001:3::21", "43-54-65-67-65-12")],
    );
    let s1 = Device::switch("S1");

    assert!(r1.same_subnet(&e1));
    assert!(e1.same_subnet(&r1));
    assert!(r1.same_subnet(&r2));
    assert!(!r1.same_subnet(&e2));
    assert!(!e1.same_subnet(&e2));
    // a switch is transparent only for itself
    assert!(s1.same_subnet(&e1));
    assert!(s1.same_subnet(&e2));
    assert!(!e1.same_subnet(&e2));

    let target: Ipv6Addr = "2001:1::99".parse().unwrap();
    assert!(r1.same_subnet_as_address(&target));
    assert!(s1.same_subnet_as_address(&target));
    assert!(!e2.same_subnet_as_address(&target));
}

#[test]
fn test_lookups() {
    let r1 = Device::new(
        "R1",
        DeviceType::Router,
        vec![
            binding("2001:1::1", "12-21-12-12-12-12"),
            binding("2001:3::8", "13-14-61-61-15-12"),
        ],
    );
    assert_eq!(r1.address_index(&"2001:3::8".parse().unwrap()), Some(1));
    assert_eq!(r1.address_index(&"2001:3::9".parse().unwrap()), None);
    assert!(r1.listens_on_mac(&address::parse_mac("33-33-ff-00-00-08").unwrap()));
    assert!(!r1.listens_on_mac(&address::parse_mac("12-21-12-12-12-12").unwrap()));
    assert!(r1.uses_mac(&address::parse_mac("12-21-12-12-12-12").unwrap()));
    assert!(r1.uses_mac(&address::parse_mac("33-33-ff-00-00-01").unwrap()));
    assert!(r1.listens_on_group(&"ff02::1:ff00:1".parse().unwrap()));
}

#[test]
fn test_remove_binding() {
    let mut r1 = Device::new(
        "R1",
        DeviceType::Router,
        vec![binding("2001:1::1", "12-21-12-12-12-12")],
    );
    r1.push_binding(binding("2001:3::8", "13-14-61-61-15-12"));
    assert_eq!(r1.get_bindings().len(), 2);
    assert!(r1.remove_binding(5).is_none());
    let removed = r1.remove_binding(0).unwrap();
    assert_eq!(removed.get_global().to_string(), "2001:1::1");
    assert_eq!(r1.address_index(&"2001:3::8".parse().unwrap()), Some(0));
}
