use crate::error::Error;
use crate::topology::Topology;
use crate::types::DeviceType;
use config::{ConfigError, Source, Value};
use log::info;

#[derive(getset::Getters, Debug, std::cmp::PartialEq, Clone)]
pub struct DeviceConfig {
    #[get = "pub with_prefix"]
    name: String,
    #[get = "pub with_prefix"]
    device_type: DeviceType,
    /// (ip, mac) pairs, in binding order
    #[get = "pub with_prefix"]
    addresses: Vec<(String, String)>,
}

fn take_string(
    table: &mut config::Map<String, Value>,
    key: &str,
    ctx: &str,
) -> Result<String, ConfigError> {
    match table.remove(key) {
        Some(v) => v.into_string(),
        None => Err(ConfigError::NotFound(format!("{}.{}", ctx, key))),
    }
}

impl DeviceConfig {
    pub fn new(value: Value) -> Result<Self, Error> {
        let mut config_table = value.into_table()?;
        /*
         * there must be a field for "name",
         * which identifies the device in links and commands
         */
        let name = take_string(&mut config_table, "name", "devices")?;

        /*
         * there must be a field for "type",
         * one of "router", "end" and "switch"
         */
        let device_type = take_string(&mut config_table, "type", &name)?
            .parse()
            .map_err(ConfigError::Message)?;

        /*
         * addresses are optional here, the topology decides
         * whether the device may go without one
         */
        let addresses = match config_table.remove("addresses") {
            Some(v) => {
                let mut ret = Vec::new();
                for entry in v.into_array()? {
                    let mut entry = entry.into_table()?;
                    let ip = take_string(&mut entry, "ip", &name)?;
                    let mac = take_string(&mut entry, "mac", &name)?;
                    ret.push((ip, mac));
                }
                ret
            }
            None => Vec::new(),
        };

        Ok(DeviceConfig {
            name,
            device_type,
            addresses,
        })
    }
}

/// the pair of device names of a link
fn parse_link(value: Value) -> Result<(String, String), Error> {
    let mut ends = value.into_array()?.into_iter();
    match (ends.next(), ends.next(), ends.next()) {
        (Some(a), Some(b), None) => Ok((a.into_string()?, b.into_string()?)),
        _ => Err(ConfigError::Message("a link must name exactly two devices".to_string()).into()),
    }
}

fn get_array_or_empty(conf: &config::Config, key: &str) -> Result<Vec<Value>, Error> {
    match conf.get_array(key) {
        Ok(v) => Ok(v),
        Err(ConfigError::NotFound(_)) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// parse the device section of a topology file
pub fn parse_devices(conf: &config::Config) -> Result<Vec<DeviceConfig>, Error> {
    get_array_or_empty(conf, "devices")?
        .into_iter()
        .map(DeviceConfig::new)
        .collect()
}

const TOPOLOGY_KEYS: [&str; 2] = ["devices", "links"];

/// anything besides "devices" and "links" is a mistake in the file
fn check_keys(conf: &config::Config) -> Result<(), Error> {
    for key in conf.collect()?.keys() {
        if !TOPOLOGY_KEYS.contains(&key.as_str()) {
            return Err(ConfigError::Message(format!("unknown topology key {}", key)).into());
        }
    }
    Ok(())
}

/// create the devices in file order, then the links, through the same
/// checks the shell applies, so a file cannot build what a user could not
///
/// The file is applied to a copy of `topology`, which only replaces the
/// original once everything in the file went in.
fn apply(topology: &mut Topology, conf: config::Config) -> Result<(), Error> {
    check_keys(&conf)?;
    let mut scratch = topology.clone();
    for device in parse_devices(&conf)? {
        let mut addresses = device.get_addresses().iter();
        let first = addresses.next().map(|(ip, mac)| (ip.as_str(), mac.as_str()));
        scratch.create_device(device.get_name(), *device.get_device_type(), first)?;
        for (ip, mac) in addresses {
            scratch.add_binding(device.get_name(), ip, mac)?;
        }
    }
    for link in get_array_or_empty(&conf, "links")? {
        let (a, b) = parse_link(link)?;
        scratch.add_connection(&a, &b)?;
    }
    info!(
        "Topology: {} devices loaded, {} in total",
        scratch.len() - topology.len(),
        scratch.len()
    );
    *topology = scratch;
    Ok(())
}

/// load a toml topology file into `topology`
///
/// Note that devices are given as an array of tables called "devices"
/// and links as an array of name pairs called "links", which has to come
/// before the first `[[devices]]` header
pub fn load_topology(topology: &mut Topology, cfile: &str) -> Result<(), Error> {
    let myconfig = config::Config::builder()
        .add_source(config::File::with_name(cfile))
        .build()?;
    apply(topology, myconfig)
}

pub fn load_topology_str(topology: &mut Topology, text: &str) -> Result<(), Error> {
    let myconfig = config::Config::builder()
        .add_source(config::File::from_str(text, config::FileFormat::Toml))
        .build()?;
    apply(topology, myconfig)
}

#[test]
fn test_config_parser() {
    let myconfig = config::Config::builder()
        .add_source(config::File::with_name("test/topology1.toml"))
        .build()
        .unwrap();
    let devices = parse_devices(&myconfig).unwrap();

    let result = vec![
        DeviceConfig {
            name: "R1".to_string(),
            device_type: DeviceType::Router,
            addresses: vec![
                ("2001:1::1".to_string(), "12-21-12-12-12-12".to_string()),
                ("2001:3::8".to_string(), "13-14-61-61-15-12".to_string()),
            ],
        },
        DeviceConfig {
            name: "E1".to_string(),
            device_type: DeviceType::End,
            addresses: vec![("2001:1::2".to_string(), "43-43-43-43-43-43".to_string())],
        },
        DeviceConfig {
            name: "S1".to_string(),
            device_type: DeviceType::Switch,
            addresses: vec![],
        },
    ];
    assert_eq!(devices, result);
}

#[test]
fn test_load_topology() {
    let mut top = Topology::new();
    load_topology(&mut top, "test/topology1.toml").unwrap();
    assert_eq!(top.len(), 3);
    assert!(top.connected("R1", "E1"));
    assert!(top.connected("S1", "R1"));
    assert_eq!(top.find_device_by_name("R1").unwrap().get_bindings().len(), 2);
}

#[test]
fn test_load_topology_rejects_bad_links() {
    let mut top = Topology::new();
    assert!(matches!(
        load_topology(&mut top, "test/topology2.toml"),
        Err(Error::InvalidOperation(_))
    ));

    let mut top = Topology::new();
    let text = r#"
        [[devices]]
        name = "R1"
        type = "bridge"
    "#;
    assert!(matches!(
        load_topology_str(&mut top, text),
        Err(Error::Config(_))
    ));

    let text = r#"
        links = [["S1"]]

        [[devices]]
        name = "S1"
        type = "switch"
    "#;
    assert!(matches!(
        load_topology_str(&mut top, text),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_failed_load_leaves_topology_untouched() {
    let mut top = Topology::new();
    top.create_device("E3", DeviceType::Switch, None).unwrap();
    assert!(matches!(
        crate::demo::load_demo(&mut top),
        Err(Error::InvalidOperation(_))
    ));
    let names: Vec<&str> = top.devices().map(|d| d.get_name().as_str()).collect();
    assert_eq!(names, vec!["E3"]);

    // a bad link after good devices
    let text = r#"
        links = [["R1", "R9"]]

        [[devices]]
        name = "R1"
        type = "router"
        addresses = [{ ip = "2001:1::1", mac = "12-21-12-12-12-12" }]
    "#;
    assert!(matches!(
        load_topology_str(&mut top, text),
        Err(Error::NotFound(_))
    ));
    assert_eq!(top.len(), 1);
    assert!(top.find_device_by_name("R1").is_none());
}

#[test]
fn test_unknown_keys_rejected() {
    let mut top = Topology::new();
    let text = r#"
        links = [["R1", "S1"]]

        [device.R1]
        type = "router"
        addresses = [{ ip = "2001:1::1", mac = "12-21-12-12-12-12" }]

        [device.S1]
        type = "switch"
    "#;
    assert!(matches!(
        load_topology_str(&mut top, text),
        Err(Error::Config(_))
    ));
    assert_eq!(top.len(), 0);
}
