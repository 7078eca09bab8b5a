use std::process::ExitCode;

use portall_common::error::EngineError;
use portall_common::model::host::HostId;
use portall_common::model::port::PortKey;
use portall_core::Engine;

use crate::commands::show;
use crate::terminal::{print, spinner};

pub async fn order(engine: &Engine, host: HostId, ports: Vec<PortKey>) -> anyhow::Result<ExitCode> {
    let result = {
        let _spinner = spinner::busy(&format!("Saving port order for {host}..."));
        engine.reorder(&host, &ports).await
    };

    match result {
        Ok(()) => {
            if let Some(group) = engine.host(&host) {
                print::header("updated host");
                show::print_host(0, &group);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            if let Some(group) = engine.host(&host) {
                let current: Vec<String> = group.keys().iter().map(ToString::to_string).collect();
                print::print_status(format!("Current order: {}", current.join(" ")));
            }
            // Logged by the engine, never notified.
            if let EngineError::ContractViolation(msg) = e {
                print::print_status(format!("List every port of {host} exactly once ({msg})"));
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
