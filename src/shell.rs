use crate::address;
use crate::demo;
use crate::error::Error;
use crate::resolver;
use crate::topology::Topology;
use crate::types::DeviceType;
use log::debug;
use std::io::{BufRead, Write};

const HELP: &str = "\
~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
ar <name> <ip> <mac>   add a router
ae <name> <ip> <mac>   add an end device
as <name>              add a switch
rd <name>              remove a device
ac <name> <name>       connect two devices
rc <name> <name>       disconnect two devices
ai <router> <ip> <mac> add an address to a router
ri <router> <ip>       remove an address from a router
ma <address>           show how an IPv6 or MAC address maps and whether it is taken
tt                     add the demo topology
ss <source> <ip>       send a Neighbor Solicitation for <ip> from <source>
pt                     print the topology
pd <name>              print a device
h                      print this help
e                      exit
~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
Note: all IPv6 addresses have a subnet mask of /64, MAC addresses are written XX-XX-XX-XX-XX-XX";

const PROMPT: &str = "Enter option: ";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Flow {
    Continue,
    Exit,
}

/// a parsed command line
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    AddDevice(DeviceType, &'a str, Option<(&'a str, &'a str)>),
    RemoveDevice(&'a str),
    AddConnection(&'a str, &'a str),
    RemoveConnection(&'a str, &'a str),
    AddAddress(&'a str, &'a str, &'a str),
    RemoveAddress(&'a str, &'a str),
    ShowAddress(&'a str),
    Demo,
    Simulate(&'a str, &'a str),
    PrintTopology,
    PrintDevice(&'a str),
    Help,
    Exit,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Result<Option<Self>, Error> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((code, args)) = words.split_first() else {
            return Ok(None);
        };
        let code = code.to_ascii_lowercase();
        let cmd = match (code.as_str(), args) {
            ("ar", &[name, ip, mac]) => {
                Command::AddDevice(DeviceType::Router, name, Some((ip, mac)))
            }
            ("ae", &[name, ip, mac]) => Command::AddDevice(DeviceType::End, name, Some((ip, mac))),
            ("as", &[name]) => Command::AddDevice(DeviceType::Switch, name, None),
            ("rd", &[name]) => Command::RemoveDevice(name),
            ("ac", &[a, b]) => Command::AddConnection(a, b),
            ("rc", &[a, b]) => Command::RemoveConnection(a, b),
            ("ai", &[name, ip, mac]) => Command::AddAddress(name, ip, mac),
            ("ri", &[name, ip]) => Command::RemoveAddress(name, ip),
            ("ma", &[text]) => Command::ShowAddress(text),
            ("tt", &[]) => Command::Demo,
            ("ss", &[source, ip]) => Command::Simulate(source, ip),
            ("pt", &[]) => Command::PrintTopology,
            ("pd", &[name]) => Command::PrintDevice(name),
            ("h", &[]) => Command::Help,
            ("e", &[]) => Command::Exit,
            _ => {
                return Err(Error::InvalidOperation(format!(
                    "cannot understand {:?}, enter 'h' for help",
                    line.trim()
                )));
            }
        };
        Ok(Some(cmd))
    }
}

/// the interactive front end, owns the topology it edits
#[derive(Debug, Default)]
pub struct Shell {
    topology: Topology,
}

impl Shell {
    pub fn new(topology: Topology) -> Self {
        Shell { topology }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// read commands until `e` or the end of `input`
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<(), Error> {
        writeln!(out, "{}", HELP)?;
        write!(out, "{}", PROMPT)?;
        out.flush()?;
        for line in input.lines() {
            if self.execute(&line?, out)? == Flow::Exit {
                return Ok(());
            }
            write!(out, "\n{}", PROMPT)?;
            out.flush()?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// run one command line, domain errors are printed and do not stop the shell
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow, Error> {
        let cmd = match Command::parse(line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                writeln!(out, "-> {}", e)?;
                return Ok(Flow::Continue);
            }
        };
        debug!("Shell: {:?}", cmd);
        if cmd == Command::Exit {
            return Ok(Flow::Exit);
        }
        match self.dispatch(cmd) {
            Ok(text) => writeln!(out, "{}", text)?,
            Err(e) => writeln!(out, "-> {}", e)?,
        }
        Ok(Flow::Continue)
    }

    fn dispatch(&mut self, cmd: Command<'_>) -> Result<String, Error> {
        let top = &mut self.topology;
        match cmd {
            Command::AddDevice(device_type, name, address) => {
                let device = top.create_device(name, device_type, address)?;
                let mut text = format!("{} {} was created.", device_type, name);
                for binding in device.get_bindings() {
                    text.push_str("\nIPv6 Global Unicast Address -> Solicited-Node Multicast Address -> Ethernet Multicast Address\n");
                    text.push_str(&binding.to_string());
                }
                Ok(text)
            }
            Command::RemoveDevice(name) => {
                top.remove_device_named(name)?;
                Ok(format!("{} was removed from the topology.", name))
            }
            Command::AddConnection(a, b) => {
                top.add_connection(a, b)?;
                Ok(format!("Connection between {} and {} was created.", a, b))
            }
            Command::RemoveConnection(a, b) => {
                top.remove_connection(a, b)?;
                Ok(format!("Connection between {} and {} was removed.", a, b))
            }
            Command::AddAddress(name, ip, mac) => {
                let mapping = top.add_binding(name, ip, mac)?.to_string();
                Ok(format!(
                    "IP Mapping:\n{}\n{}",
                    mapping,
                    top.find_device_by_name(name)
                        .map(|d| d.to_string())
                        .unwrap_or_default()
                ))
            }
            Command::RemoveAddress(name, ip) => {
                let dropped = top.remove_binding(name, ip)?;
                let mut text = String::from("IPv6 address was removed.");
                for neighbor in dropped {
                    text.push_str(&format!(
                        "\nConnection to {} was removed, it no longer shares a subnet with {}.",
                        neighbor, name
                    ));
                }
                Ok(text)
            }
            Command::ShowAddress(text) => show_address(top, text),
            Command::Demo => {
                demo::load_demo(top)?;
                Ok(top.to_string())
            }
            Command::Simulate(source, ip) => Ok(resolver::resolve(top, source, ip)?.to_string()),
            Command::PrintTopology => Ok(top.to_string()),
            Command::PrintDevice(name) => top
                .find_device_by_name(name)
                .map(|d| d.to_string())
                .ok_or_else(|| Error::NotFound(format!("device {}", name))),
            Command::Help => Ok(HELP.to_string()),
            Command::Exit => Ok(String::new()),
        }
    }
}

fn show_address(top: &Topology, text: &str) -> Result<String, Error> {
    if address::validate_mac(text) {
        let taken = if top.mac_in_use(text) { "taken" } else { "free" };
        return Ok(format!("MAC address {} is {}.", text, taken));
    }
    if !address::validate_ipv6(text) {
        return Err(Error::MalformedAddress(text.to_string()));
    }
    let expanded = address::expand(text).unwrap_or_default();
    let compressed = address::compress(&expanded).unwrap_or_default();
    let solicited = address::solicited_node_ipv6(&expanded).unwrap_or_default();
    let solicited_mac = address::solicited_node_mac_text(&solicited).unwrap_or_default();
    let owner = if top.ip_in_use(text) {
        top.find_device_by_ip(&address::parse_ipv6(text)?)
            .map(|device| format!("bound to {}", device.get_name()))
            .unwrap_or_default()
    } else {
        "free".to_string()
    };
    Ok(format!(
        "Expanded: {}\nCompressed: {}\n{} -> {} -> {}\nThe address is {}.",
        expanded, compressed, compressed, solicited, solicited_mac, owner
    ))
}

#[cfg(test)]
fn run_script(script: &str) -> (Shell, String) {
    let mut shell = Shell::default();
    let mut out = Vec::new();
    shell.run(script.as_bytes(), &mut out).unwrap();
    (shell, String::from_utf8(out).unwrap())
}

#[test]
fn test_command_parse() {
    assert_eq!(Command::parse("   ").unwrap(), None);
    assert_eq!(
        Command::parse("AR R1 2001:1::1 12-21-12-12-12-12").unwrap(),
        Some(Command::AddDevice(
            DeviceType::Router,
            "R1",
            Some(("2001:1::1", "12-21-12-12-12-12"))
        ))
    );
    assert_eq!(
        Command::parse("ss R1 2001:1::2").unwrap(),
        Some(Command::Simulate("R1", "2001:1::2"))
    );
    assert!(Command::parse("ar R1").is_err());
    assert!(Command::parse("zz").is_err());
}

#[test]
fn test_shell_session() {
    let (shell, out) = run_script(
        "ar R1 2001:1::1 12-21-12-12-12-12\n\
         ae E1 2001:1::2 43-43-43-43-43-43\n\
         ae E2 2001:2::2 43-43-43-43-43-44\n\
         ac R1 E1\n\
         ac R1 E2\n\
         ss R1 2001:1::2\n\
         e\n\
         pt\n",
    );
    assert!(out.contains("2001:1::1 -> ff02::1:ff00:1 -> 33-33-ff-00-00-01"));
    assert!(out.contains("Connection between R1 and E1 was created."));
    assert!(out.contains("-> invalid operation: R1 and E2 have no addresses in the same subnet"));
    assert!(out.contains("E1 (ACCEPTED"));
    assert!(out.contains("E1->R1"));
    // nothing after `e` runs
    assert!(!out.contains("Device: [Direct Connections]"));
    assert_eq!(shell.topology().len(), 3);
}

#[test]
fn test_shell_errors_keep_going() {
    let (shell, out) = run_script(
        "as S1\n\
         ar S1 2001:1::1 12-21-12-12-12-12\n\
         ar R1 fe80::1 12-21-12-12-12-12\n\
         ar R1 2001:1::1 12:21:12:12:12:12\n\
         ai S1 2001:1::9 00-00-00-00-00-09\n\
         rd R9\n\
         pd S1\n",
    );
    assert!(out.contains("-> invalid operation: device S1 already exists"));
    assert!(out.contains("-> fe80::1 is not a global unicast address"));
    assert!(out.contains("-> malformed address: 12:21:12:12:12:12"));
    assert!(out.contains("only routers carry more than one address"));
    assert!(out.contains("-> not found: device R9"));
    assert!(out.contains("Name: S1\nType: switch"));
    assert_eq!(shell.topology().len(), 1);
}

#[test]
fn test_show_address() {
    let (_, out) = run_script(
        "ae E1 2001:1::2 43-43-43-43-43-43\n\
         ma 2001:1:0::2\n\
         ma 2001:1::abcd:ef12\n\
         ma 33-33-FF-00-00-02\n\
         ma 43-43-43-43-43-44\n\
         ma nonsense\n",
    );
    assert!(out.contains("Expanded: 2001:0001:0000:0000:0000:0000:0000:0002\nCompressed: 2001:1::2\n"));
    assert!(out.contains("The address is bound to E1."));
    assert!(out.contains("2001:1::abcd:ef12 -> ff02::1:ffcd:ef12 -> 33-33-ff-cd-ef-12\nThe address is free."));
    assert!(out.contains("MAC address 33-33-FF-00-00-02 is taken."));
    assert!(out.contains("MAC address 43-43-43-43-43-44 is free."));
    assert!(out.contains("-> malformed address: nonsense"));
}

#[test]
fn test_shell_demo_and_addresses() {
    let (shell, out) = run_script(
        "tt\n\
         ri R2 2001:3::21\n\
         ss R1 2001:3::21\n\
         ai R2 2001:3::22 00-00-00-00-00-22\n\
         ac R1 R2\n\
         ss R1 2001:3::22\n",
    );
    assert!(out.contains("R1: E1, R2"));
    assert!(out.contains("Connection to R1 was removed"));
    assert!(out.contains("Address Resolution failed.\nnone of the devices owns the target address."));
    assert!(out.contains("R2->R1"));
    assert!(shell.topology().connected("R1", "R2"));
}
