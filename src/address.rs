use crate::error::Error;
use ipnet::Ipv6Net;
use pnet::util::MacAddr;
use std::net::Ipv6Addr;

/// every address in the simulation lives in a /64
pub const SUBNET_PREFIX_LEN: u8 = 64;

// ff02::1:ff00:0/104
const SOLICITED_NODE_PREFIX: [u16; 6] = [0xff02, 0, 0, 0, 0, 0x0001];
// 33-33-ff-XX-XX-XX
const SOLICITED_MAC_PREFIX: [u8; 3] = [0x33, 0x33, 0xff];

pub fn validate_ipv6(text: &str) -> bool {
    text.parse::<Ipv6Addr>().is_ok()
}

pub fn validate_mac(text: &str) -> bool {
    parse_mac(text).is_ok()
}

pub fn parse_ipv6(text: &str) -> Result<Ipv6Addr, Error> {
    text.trim()
        .parse()
        .map_err(|_| Error::MalformedAddress(text.to_string()))
}

/// parse `XX-XX-XX-XX-XX-XX`, either case
pub fn parse_mac(text: &str) -> Result<MacAddr, Error> {
    let malformed = || Error::MalformedAddress(text.to_string());
    let mut octets = [0u8; 6];
    let mut groups = text.trim().split('-');
    for octet in octets.iter_mut() {
        let group = groups.next().ok_or_else(malformed)?;
        if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed());
        }
        *octet = u8::from_str_radix(group, 16).map_err(|_| malformed())?;
    }
    if groups.next().is_some() {
        return Err(malformed());
    }
    Ok(MacAddr::new(
        octets[0], octets[1], octets[2], octets[3], octets[4], octets[5],
    ))
}

/// hyphen-separated, lowercase
pub fn mac_to_string(mac: &MacAddr) -> String {
    format!(
        "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
        mac.0, mac.1, mac.2, mac.3, mac.4, mac.5
    )
}

/// all 8 groups, zero-padded to 4 digits
pub fn expand_addr(addr: &Ipv6Addr) -> String {
    addr.segments()
        .iter()
        .map(|seg| format!("{:04x}", seg))
        .collect::<Vec<_>>()
        .join(":")
}

/// the expanded form of any IPv6 literal, None if `ip` is not one
pub fn expand(ip: &str) -> Option<String> {
    ip.trim().parse::<Ipv6Addr>().ok().map(|addr| expand_addr(&addr))
}

/// the canonical (RFC 5952) form of any IPv6 literal, None if `ip` is not one
pub fn compress(ip: &str) -> Option<String> {
    ip.trim().parse::<Ipv6Addr>().ok().map(|addr| addr.to_string())
}

pub fn is_global_unicast(addr: &Ipv6Addr) -> bool {
    addr.segments()[0] & 0xe000 == 0x2000
}

/// ff02::1:ff00:0/104 plus the low 24 bits of `addr`
pub fn solicited_node(addr: &Ipv6Addr) -> Ipv6Addr {
    let octets = addr.octets();
    let [a, b, c, d, e, f] = SOLICITED_NODE_PREFIX;
    Ipv6Addr::new(
        a,
        b,
        c,
        d,
        e,
        f,
        0xff00 | octets[13] as u16,
        u16::from_be_bytes([octets[14], octets[15]]),
    )
}

/// 33-33-ff plus the low 24 bits of a solicited-node address
pub fn solicited_node_mac(solicited: &Ipv6Addr) -> MacAddr {
    let octets = solicited.octets();
    let [a, b, c] = SOLICITED_MAC_PREFIX;
    MacAddr::new(a, b, c, octets[13], octets[14], octets[15])
}

pub fn solicited_node_ipv6(ip: &str) -> Option<String> {
    let addr = ip.trim().parse::<Ipv6Addr>().ok()?;
    Some(solicited_node(&addr).to_string())
}

pub fn solicited_node_mac_text(solicited_ip: &str) -> Option<String> {
    let addr = solicited_ip.trim().parse::<Ipv6Addr>().ok()?;
    Some(mac_to_string(&solicited_node_mac(&addr)))
}

pub fn subnet_of(addr: &Ipv6Addr) -> Ipv6Net {
    Ipv6Net::new_assert(*addr, SUBNET_PREFIX_LEN).trunc()
}

pub fn same_subnet(a: &Ipv6Addr, b: &Ipv6Addr) -> bool {
    subnet_of(a).contains(b)
}

#[test]
fn test_validate() {
    assert!(validate_ipv6("2001:1::1"));
    assert!(validate_ipv6("2001:0001:0000:0000:0000:0000:0000:0001"));
    assert!(validate_ipv6("::"));
    assert!(!validate_ipv6("2001:1::1::2"));
    assert!(!validate_ipv6("2001:1:g::1"));
    assert!(!validate_ipv6(""));

    assert!(validate_mac("12-21-12-12-12-12"));
    assert!(validate_mac("AB-cd-EF-01-23-45"));
    assert!(!validate_mac("12:21:12:12:12:12"));
    assert!(!validate_mac("12-21-12-12-12"));
    assert!(!validate_mac("12-21-12-12-12-12-12"));
    assert!(!validate_mac("1-221-12-12-12-12"));
    assert!(!validate_mac("12-21-12-12-12-1g"));
}

#[test]
fn test_expand_and_compress() {
    assert_eq!(
        expand("2001:1::1").as_deref(),
        Some("2001:0001:0000:0000:0000:0000:0000:0001")
    );
    assert_eq!(expand("not an address"), None);
    assert_eq!(
        compress("2001:0001:0000:0000:0000:0000:0000:0001").as_deref(),
        Some("2001:1::1")
    );
    assert_eq!(compress("2001:db8:0:0:1:0:0:1").as_deref(), Some("2001:db8::1:0:0:1"));
    for ip in ["2001:1::1", "2001:db8:0:0:1:0:0:1", "3fff::abcd:12", "::"] {
        let expanded = expand(ip).unwrap();
        assert_eq!(compress(&expanded), compress(ip));
    }
}

#[test]
fn test_solicited_node() {
    let expanded = expand("2001:1::1").unwrap();
    assert!(expanded.ends_with("0000:0001"));
    let solicited = solicited_node_ipv6(&expanded).unwrap();
    assert_eq!(solicited, "ff02::1:ff00:1");
    assert_eq!(
        solicited_node_mac_text(&solicited).as_deref(),
        Some("33-33-ff-00-00-01")
    );

    let addr: Ipv6Addr = "2001:2::abcd:1234:5678".parse().unwrap();
    let solicited = solicited_node(&addr);
    assert_eq!(solicited, "ff02::1:ff34:5678".parse::<Ipv6Addr>().unwrap());
    assert_eq!(
        mac_to_string(&solicited_node_mac(&solicited)),
        "33-33-ff-34-56-78"
    );
}

#[test]
fn test_global_unicast_and_subnet() {
    assert!(is_global_unicast(&"2001:1::1".parse().unwrap()));
    assert!(is_global_unicast(&"3fff::1".parse().unwrap()));
    assert!(!is_global_unicast(&"fe80::1".parse().unwrap()));
    assert!(!is_global_unicast(&"4000::1".parse().unwrap()));

    let a: Ipv6Addr = "2001:1::1".parse().unwrap();
    assert!(same_subnet(&a, &"2001:1::ffff:2".parse().unwrap()));
    assert!(same_subnet(&a, &"2001:1:0:0:1::2".parse().unwrap()));
    assert!(!same_subnet(&a, &"2001:1:0:1::1".parse().unwrap()));
    assert_eq!(subnet_of(&a), "2001:1::/64".parse::<Ipv6Net>().unwrap());
}
