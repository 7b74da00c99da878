mod common;

use common::{dual_stack, test_config, v4_only, Event, MockLinks};
use ferrolb_layer2::Announce;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::thread;
use std::time::Duration;

#[test]
fn losing_an_interface_mid_spam_drops_only_its_responder() {
    let links = MockLinks::new(vec![v4_only("eth0", 1), v4_only("eth1", 2)]);
    let announce = Announce::new(Box::new(links.clone()), test_config()).unwrap();
    assert!(links.log().wait_for(
        |events| {
            events.contains(&Event::OpenArp("eth0".to_string()))
                && events.contains(&Event::OpenArp("eth1".to_string()))
        },
        Duration::from_secs(1),
    ));

    let ip: Ipv4Addr = "10.0.0.1".parse().unwrap();
    announce.set_balancer("svc-a", IpAddr::V4(ip));

    // Both interfaces carry the announcement.
    assert!(links.log().wait_for(
        |events| {
            events.contains(&Event::ArpGratuitous("eth0".to_string(), ip))
                && events.contains(&Event::ArpGratuitous("eth1".to_string(), ip))
        },
        Duration::from_millis(200),
    ));

    // eth1 goes away mid-spam; the next scan must close its responder.
    links.set_interfaces(vec![v4_only("eth0", 1)]);
    assert!(links.log().wait_for(
        |events| events.contains(&Event::CloseArp("eth1".to_string())),
        Duration::from_millis(500),
    ));

    let eth1_after_close = links
        .log()
        .count(|e| matches!(e, Event::ArpGratuitous(name, _) if name == "eth1"));
    let eth0_after_close = links
        .log()
        .count(|e| matches!(e, Event::ArpGratuitous(name, _) if name == "eth0"));

    // Keep the burst alive past the close and check the scheduler only
    // iterates the surviving responder.
    announce.set_balancer("svc-b", IpAddr::V4(ip));
    assert!(links.log().wait_for(
        |events| {
            events
                .iter()
                .filter(|e| matches!(e, Event::ArpGratuitous(name, _) if name == "eth0"))
                .count()
                > eth0_after_close
        },
        Duration::from_millis(300),
    ));
    assert_eq!(
        links
            .log()
            .count(|e| matches!(e, Event::ArpGratuitous(name, _) if name == "eth1")),
        eth1_after_close,
        "a closed responder kept announcing"
    );

    announce.shutdown();
}

#[test]
fn recreated_responder_rejoins_groups_for_claimed_addresses() {
    let links = MockLinks::new(vec![dual_stack("eth0", 1)]);
    let announce = Announce::new(Box::new(links.clone()), test_config()).unwrap();
    assert!(links.log().wait_for(
        |events| events.contains(&Event::OpenNdp("eth0".to_string())),
        Duration::from_secs(1),
    ));

    let ip: Ipv6Addr = "2001:db8::9".parse().unwrap();
    announce.set_balancer("svc-a", IpAddr::V6(ip));
    thread::sleep(Duration::from_millis(30));

    // A second NDP-capable interface appears after the claim. Its fresh
    // responder has no memberships, so the tracker must watch the claimed
    // address on it before inserting it.
    let mut with_eth1 = vec![dual_stack("eth0", 1), dual_stack("eth1", 2)];
    links.set_interfaces(with_eth1.clone());

    assert!(links.log().wait_for(
        |events| events.contains(&Event::Watch("eth1".to_string(), ip)),
        Duration::from_millis(500),
    ));

    // And an interface flap on eth1 re-joins again on the replacement
    // responder.
    with_eth1.remove(1);
    links.set_interfaces(with_eth1);
    assert!(links.log().wait_for(
        |events| events.contains(&Event::CloseNdp("eth1".to_string())),
        Duration::from_millis(500),
    ));
    links.set_interfaces(vec![dual_stack("eth0", 1), dual_stack("eth1", 2)]);
    assert!(links.log().wait_for(
        |events| {
            events
                .iter()
                .filter(|e| **e == Event::Watch("eth1".to_string(), ip))
                .count()
                >= 2
        },
        Duration::from_millis(500),
    ));

    announce.shutdown();
}
