use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::warn;

use barline_core::pango::span;
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::Config;

/// Publishes the trimmed stdout of a configured command, re-run on a fixed
/// period. The command runs to completion each cycle; it is not detached
/// like click-spawned programs.
pub async fn run(config: Arc<Config>, bar: Arc<Bar>) {
    if config.cmd_run.cmd.is_empty() {
        warn!(event = "cmd_run_missing_command");
        return;
    }
    let steady = Duration::from_secs(config.cmd_run.delay.max(1));
    let mut tick = super::cadence(steady);
    let style = config.cmd_run.style();

    loop {
        tick.tick().await;

        let output = Command::new(&config.cmd_run.cmd)
            .args(&config.cmd_run.args)
            .current_dir("/")
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                warn!(event = "cmd_run_failed", cmd = %config.cmd_run.cmd, error = %err);
                continue;
            }
        };
        if !output.status.success() {
            warn!(
                event = "cmd_run_nonzero",
                cmd = %config.cmd_run.cmd,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim_end()
            );
            continue;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = stdout.trim_end_matches('\n');
        bar.publish(SourceId::Command, span(&style, text));
    }
}
