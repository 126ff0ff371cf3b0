use crate::conf;
use crate::error::Error;
use crate::topology::Topology;

const DEMO_TOPOLOGY: &str = include_str!("../demos/demo.toml");

/// add two routers, three end devices and a switch to `topology`
pub fn load_demo(topology: &mut Topology) -> Result<(), Error> {
    conf::load_topology_str(topology, DEMO_TOPOLOGY)
}

#[test]
fn test_demo_topology() {
    use crate::resolver::{resolve, Verdict};

    let mut top = Topology::new();
    load_demo(&mut top).unwrap();
    assert_eq!(top.len(), 6);
    assert!(top.connected("R1", "R2"));
    assert!(top.connected("S1", "E3"));

    let res = resolve(&top, "R2", "2001:2::6").unwrap();
    let path: Vec<&str> = res
        .advertisement_path()
        .unwrap()
        .iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(path, vec!["E3", "S1", "R2"]);
    assert_eq!(res.verdict_of("E2"), Some(Verdict::DroppedLinkLayer));

    // R1 and R2 only meet in 2001:3::/64
    let res = resolve(&top, "R1", "2001:3::21").unwrap();
    assert!(res.is_resolved());
    assert_eq!(*res.get_binding_index(), Some(1));

    // loading it twice clashes on names
    assert!(matches!(load_demo(&mut top), Err(Error::InvalidOperation(_))));
}
