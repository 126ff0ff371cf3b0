use crate::address;
use pnet::util::MacAddr;
use std::borrow::Borrow;
use std::fmt;
use std::net::Ipv6Addr;
use std::rc::Rc;
use std::str::FromStr;

/// name of a device, the only thing that identifies it inside a topology
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceName(Rc<str>);

impl DeviceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceName {
    fn from(name: &str) -> Self {
        DeviceName(Rc::from(name))
    }
}

impl Borrow<str> for DeviceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

const DEVICE_ROUTER_STRING: &str = "router";
const DEVICE_END_STRING: &str = "end";
const DEVICE_SWITCH_STRING: &str = "switch";

// device types
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeviceType {
    Router,
    End,
    /// layer-2 only, floods everything and carries no address
    Switch,
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            DEVICE_ROUTER_STRING => Ok(DeviceType::Router),
            DEVICE_END_STRING => Ok(DeviceType::End),
            DEVICE_SWITCH_STRING => Ok(DeviceType::Switch),
            _ => Err(format!("unknown device type {}", s)),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Router => f.write_str(DEVICE_ROUTER_STRING),
            DeviceType::End => f.write_str(DEVICE_END_STRING),
            DeviceType::Switch => f.write_str(DEVICE_SWITCH_STRING),
        }
    }
}

/// one address of a device together with everything derived from it
#[derive(getset::Getters, Debug, PartialEq, Eq, Clone)]
pub struct AddressBinding {
    #[get = "pub with_prefix"]
    global: Ipv6Addr,
    #[get = "pub with_prefix"]
    solicited: Ipv6Addr,
    #[get = "pub with_prefix"]
    mac: MacAddr,
    #[get = "pub with_prefix"]
    solicited_mac: MacAddr,
}

impl AddressBinding {
    pub fn new(global: Ipv6Addr, mac: MacAddr) -> Self {
        let solicited = address::solicited_node(&global);
        let solicited_mac = address::solicited_node_mac(&solicited);
        AddressBinding {
            global,
            solicited,
            mac,
            solicited_mac,
        }
    }
}

/// why a simulation did not end with a Neighbor Advertisement
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FailureReason {
    /// no device in the topology owns the target address
    UnknownTarget,
    /// the source has no address in the target's subnet
    SourceOffSubnet,
    /// the flood ran out of devices before reaching the target
    Unreachable,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UnknownTarget => {
                f.write_str("none of the devices owns the target address")
            }
            FailureReason::SourceOffSubnet => {
                f.write_str("the target address is in a different subnet than the source")
            }
            FailureReason::Unreachable => {
                f.write_str("the solicitation never reached the owner of the target address")
            }
        }
    }
}

#[test]
fn test_device_type_from_str() {
    assert_eq!("router".parse::<DeviceType>(), Ok(DeviceType::Router));
    assert_eq!("End".parse::<DeviceType>(), Ok(DeviceType::End));
    assert_eq!("SWITCH".parse::<DeviceType>(), Ok(DeviceType::Switch));
    assert!("hub".parse::<DeviceType>().is_err());
}

#[test]
fn test_binding_derivation() {
    let binding = AddressBinding::new(
        "2001:1::1".parse().unwrap(),
        MacAddr::new(0x12, 0x21, 0x12, 0x12, 0x12, 0x12),
    );
    assert_eq!(
        *binding.get_solicited(),
        "ff02::1:ff00:1".parse::<Ipv6Addr>().unwrap()
    );
    assert_eq!(
        *binding.get_solicited_mac(),
        MacAddr::new(0x33, 0x33, 0xff, 0x00, 0x00, 0x01)
    );
}
