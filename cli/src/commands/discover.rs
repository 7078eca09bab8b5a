use std::process::ExitCode;
use std::time::Instant;

use colored::*;
use tracing::debug;

use portall_common::discovery::DiscoverySource;
use portall_common::model::discovery::DiscoveredPort;
use portall_common::warn;
use portall_core::{Engine, MergeReport};
use portall_plugins::{DockerSource, PortainerSource};

use crate::commands::{DiscoverFrom, show};
use crate::mprint;
use crate::terminal::{colors, print, spinner};

type Detail = (String, ColoredString);

pub async fn discover(engine: &Engine, from: DiscoverFrom) -> anyhow::Result<ExitCode> {
    let source: Box<dyn DiscoverySource> = match from {
        DiscoverFrom::Docker(args) => {
            let docker = DockerSource::new(args.host_ip.as_str(), &args.socket_url)?;
            {
                let _spinner =
                    spinner::busy(&format!("Connecting to Docker at {}...", docker.base_url()));
                docker.ping().await?;
            }
            Box::new(docker)
        }
        DiscoverFrom::Portainer(args) => {
            let portainer = PortainerSource::new(&args.url, args.token, args.endpoint)?;
            {
                let _spinner = spinner::busy("Connecting to Portainer...");
                portainer.ping().await?;
            }
            Box::new(portainer)
        }
    };

    let start_time: Instant = Instant::now();
    let ports: Vec<DiscoveredPort> = {
        let _spinner = spinner::busy(&format!("Listing containers via {}...", source.name()));
        source.discover().await?
    };
    debug!(ports = ports.len(), source = source.name(), "discovery finished");

    if ports.is_empty() {
        warn!("No published ports found via {}", source.name());
        return Ok(ExitCode::SUCCESS);
    }

    let hosts: Vec<_> = {
        let mut hosts: Vec<_> = ports.iter().map(|p| p.host.clone()).collect();
        hosts.sort();
        hosts.dedup();
        hosts
    };

    let report: MergeReport = {
        let _spinner = spinner::busy(&format!("Registering {} ports...", ports.len()));
        engine.merge_discovered(ports).await
    };

    print::header("discovery merge");
    print_report(&report);
    for (idx, id) in hosts.iter().enumerate() {
        if let Some(host) = engine.host(id) {
            mprint!();
            show::print_host(idx, &host);
        }
    }

    print::fat_separator();
    print::centerln(&format!(
        "Merge finished in {}",
        format!("{:.2}s", start_time.elapsed().as_secs_f64()).bold().yellow()
    ));

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &MergeReport) {
    let mut details: Vec<Detail> = vec![
        ("Added".to_string(), report.added.to_string().green().bold()),
        (
            "Skipped".to_string(),
            report.skipped_duplicates.to_string().color(colors::TEXT_DEFAULT),
        ),
    ];
    if !report.failed.is_empty() {
        details.push(("Failed".to_string(), report.failed.len().to_string().red().bold()));
    }
    if report.deferred > 0 {
        details.push(("Deferred".to_string(), report.deferred.to_string().yellow()));
    }
    if report.dropped > 0 {
        details.push(("Dropped".to_string(), report.dropped.to_string().red()));
    }
    print::tree_head(0, "summary");
    print::as_tree_one_level(details);

    for failure in &report.failed {
        print::print_status(format!(
            "{} on {}: {}",
            failure.port.key(),
            failure.port.host,
            failure.message
        ));
    }
}
