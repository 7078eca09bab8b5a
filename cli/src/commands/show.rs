use colored::*;

use portall_common::model::host::HostGroup;
use portall_common::model::port::{PortAssignment, PortState};
use portall_core::Engine;

use crate::mprint;
use crate::terminal::{colors, print};

type Detail = (String, ColoredString);

pub fn show(engine: &Engine) {
    let hosts: Vec<HostGroup> = engine.hosts();
    if hosts.is_empty() {
        print::header("no hosts registered");
        return;
    }

    print::header("port registry");
    for (idx, host) in hosts.iter().enumerate() {
        print_host(idx, host);
        if idx + 1 != hosts.len() {
            mprint!();
        }
    }

    let ports: usize = hosts.iter().map(|h| h.ports.len()).sum();
    print::fat_separator();
    print::centerln(&format!(
        "{} hosts, {} ports",
        hosts.len().to_string().color(colors::ACCENT),
        ports.to_string().color(colors::ACCENT)
    ));
}

pub fn print_host(idx: usize, host: &HostGroup) {
    print::tree_head(idx, &host.label());
    let details: Vec<Detail> = host.ports.iter().map(port_detail).collect();
    print::as_tree_one_level(details);
}

fn port_detail(port: &PortAssignment) -> Detail {
    let description: ColoredString = match port.state {
        PortState::Committed => port.description.color(colors::PORT),
        PortState::Conflict => format!("{} (conflict)", port.description).color(colors::CONFLICT),
        _ => format!("{} (pending)", port.description).color(colors::PENDING),
    };
    (port.key().to_string(), description)
}
