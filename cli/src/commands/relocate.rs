use std::process::ExitCode;

use colored::*;

use portall_common::model::host::HostId;
use portall_common::notify::NoHooks;
use portall_core::{Engine, RelocateOutcome, RelocateRequest};

use crate::commands::show;
use crate::terminal::{colors, print, spinner};

pub async fn relocate(engine: &Engine, request: RelocateRequest) -> anyhow::Result<ExitCode> {
    let target: HostId = request.target.clone();
    let outcome = {
        let _spinner = spinner::busy(&format!(
            "Moving {} to {}...",
            request.port.to_string().color(colors::PORT),
            request.target.to_string().color(colors::HOST_ADDR)
        ));
        engine.relocate(request, &NoHooks).await
    };

    match outcome {
        Ok(RelocateOutcome::Committed(_)) => {
            if let Some(host) = engine.host(&target) {
                print::header("updated host");
                show::print_host(0, &host);
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(RelocateOutcome::Unchanged) => {
            print::print_status("Port is already at that position, nothing to do");
            Ok(ExitCode::SUCCESS)
        }
        Ok(RelocateOutcome::Discarded) => Ok(ExitCode::FAILURE),
        // Already reported through the notifier.
        Err(_) => Ok(ExitCode::FAILURE),
    }
}
