//! A recording LinkSource so the announcer's behavior can be observed
//! without raw sockets or CAP_NET_RAW.

// Each test binary compiles this module and uses a different slice of it.
#![allow(dead_code)]

use ferrolb_layer2::link::{ArpLink, Decider, LinkSource, NdpLink};
use ferrolb_layer2::{Config, Error};
use ferrolb_packets::MacAddr;
use netif::Interface;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    OpenArp(String),
    OpenNdp(String),
    ArpGratuitous(String, Ipv4Addr),
    NdpGratuitous(String, Ipv6Addr),
    Watch(String, Ipv6Addr),
    Unwatch(String, Ipv6Addr),
    CloseArp(String),
    CloseNdp(String),
}

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    /// Polls until `pred` over the log holds, or the timeout passes.
    pub fn wait_for(&self, pred: impl Fn(&[Event]) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(&self.0.lock().unwrap()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

struct Inner {
    interfaces: Mutex<Vec<Interface>>,
    log: EventLog,
}

/// A LinkSource whose interface list tests can edit mid-run, and whose
/// responders only record what was asked of them.
#[derive(Clone)]
pub struct MockLinks {
    inner: Arc<Inner>,
}

impl MockLinks {
    pub fn new(interfaces: Vec<Interface>) -> MockLinks {
        MockLinks {
            inner: Arc::new(Inner {
                interfaces: Mutex::new(interfaces),
                log: EventLog::default(),
            }),
        }
    }

    pub fn log(&self) -> EventLog {
        self.inner.log.clone()
    }

    pub fn set_interfaces(&self, interfaces: Vec<Interface>) {
        *self.inner.interfaces.lock().unwrap() = interfaces;
    }
}

impl LinkSource for MockLinks {
    fn interfaces(&self) -> io::Result<Vec<Interface>> {
        Ok(self.inner.interfaces.lock().unwrap().clone())
    }

    fn open_arp(&self, intf: &Interface, _decide: Decider) -> Result<Box<dyn ArpLink>, Error> {
        self.inner.log.push(Event::OpenArp(intf.name.clone()));
        Ok(Box::new(MockArp {
            name: intf.name.clone(),
            log: self.inner.log.clone(),
        }))
    }

    fn open_ndp(&self, intf: &Interface, _decide: Decider) -> Result<Box<dyn NdpLink>, Error> {
        self.inner.log.push(Event::OpenNdp(intf.name.clone()));
        Ok(Box::new(MockNdp {
            name: intf.name.clone(),
            log: self.inner.log.clone(),
        }))
    }
}

struct MockArp {
    name: String,
    log: EventLog,
}

impl ArpLink for MockArp {
    fn interface(&self) -> &str {
        &self.name
    }

    fn gratuitous(&self, ip: Ipv4Addr) -> Result<(), Error> {
        self.log.push(Event::ArpGratuitous(self.name.clone(), ip));
        Ok(())
    }

    fn close(&mut self) {
        self.log.push(Event::CloseArp(self.name.clone()));
    }
}

struct MockNdp {
    name: String,
    log: EventLog,
}

impl NdpLink for MockNdp {
    fn interface(&self) -> &str {
        &self.name
    }

    fn gratuitous(&self, ip: Ipv6Addr) -> Result<(), Error> {
        self.log.push(Event::NdpGratuitous(self.name.clone(), ip));
        Ok(())
    }

    fn watch(&self, ip: Ipv6Addr) -> Result<(), Error> {
        self.log.push(Event::Watch(self.name.clone(), ip));
        Ok(())
    }

    fn unwatch(&self, ip: Ipv6Addr) -> Result<(), Error> {
        self.log.push(Event::Unwatch(self.name.clone(), ip));
        Ok(())
    }

    fn close(&mut self) {
        self.log.push(Event::CloseNdp(self.name.clone()));
    }
}

/// An up, broadcast-capable interface with one IPv4 address and an IPv6
/// link-local, so it is eligible for both responders.
pub fn dual_stack(name: &str, index: u32) -> Interface {
    Interface {
        index,
        name: name.to_string(),
        flags: netif::IFF_UP | netif::IFF_BROADCAST,
        hardware_addr: Some(MacAddr::new([0x02, 0, 0, 0, 0, index as u8])),
        addrs: vec![
            format!("10.1.0.{}", index).parse().unwrap(),
            format!("fe80::{}", index).parse().unwrap(),
        ],
    }
}

/// An up, broadcast-capable interface with only an IPv4 address.
pub fn v4_only(name: &str, index: u32) -> Interface {
    Interface {
        index,
        name: name.to_string(),
        flags: netif::IFF_UP | netif::IFF_BROADCAST,
        hardware_addr: Some(MacAddr::new([0x02, 0, 0, 0, 0, index as u8])),
        addrs: vec![format!("10.1.0.{}", index).parse().unwrap()],
    }
}

/// The announcer's timing, shrunk so scenarios finish in well under a second.
pub fn test_config() -> Config {
    Config {
        spam_period: Duration::from_millis(40),
        spam_window: Duration::from_millis(200),
        scan_interval: Duration::from_millis(25),
        spam_queue_depth: 64,
    }
}
