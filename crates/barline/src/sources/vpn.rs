use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::net::TcpStream;
use tokio::time::timeout;

use barline_core::pango::{colored, span};
use barline_core::SourceId;

use crate::bar::Bar;
use crate::config::Config;

/// Publishes tunnel health: freshness of the daemon's status file, plus an
/// optional TCP probe of a host that is only reachable through the tunnel.
pub async fn run(config: Arc<Config>, bar: Arc<Bar>) {
    let mut tick = super::cadence(Duration::from_secs(3));
    let style = config.vpn.style();
    loop {
        tick.tick().await;

        let file_ok = status_file_fresh(&config.vpn.status_file, config.vpn.mtime_threshold);
        let file_glyph = up_down_glyph(file_ok, &config.vpn.up_color, &config.vpn.down_color);

        let text = if config.vpn.tcp_check.enabled {
            let tcp_ok = tcp_reachable(
                &config.vpn.tcp_check.host,
                config.vpn.tcp_check.port,
                Duration::from_secs(config.vpn.tcp_check.timeout),
            )
            .await;
            let tcp_glyph = if tcp_ok {
                colored(&config.vpn.up_color, "✔")
            } else {
                colored(&config.vpn.down_color, "✘")
            };
            format!("VPN:{file_glyph}:{tcp_glyph}")
        } else {
            format!("VPN:{file_glyph}")
        };

        bar.publish(SourceId::Vpn, span(&style, &text));
    }
}

fn up_down_glyph(up: bool, up_color: &str, down_color: &str) -> String {
    if up {
        colored(up_color, "⍋")
    } else {
        colored(down_color, "⍒")
    }
}

/// The daemon rewrites its status file on a short period; a stale mtime
/// means the daemon is wedged or gone.
fn status_file_fresh(path: &str, max_age_secs: u64) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age.as_secs() <= max_age_secs,
        // Clock skew puts the mtime in the future; call that fresh.
        Err(_) => true,
    }
}

/// Bounded dial; the only network timeout in the program besides the audio
/// daemon's exit wait.
async fn tcp_reachable(host: &str, port: u16, dial_timeout: Duration) -> bool {
    matches!(
        timeout(dial_timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn missing_status_file_is_down() {
        assert!(!status_file_fresh("/nonexistent/openvpn-status", 60));
    }

    #[test]
    fn freshly_written_status_file_is_up() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "OpenVPN STATISTICS").expect("write");
        assert!(status_file_fresh(file.path().to_str().expect("utf8 path"), 60));
    }

    #[test]
    fn zero_threshold_marks_everything_stale() {
        // An mtime more than 0 seconds old fails a 0-second threshold; only
        // a write within the same second could pass.
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        std::thread::sleep(Duration::from_millis(1100));
        assert!(!status_file_fresh(file.path().to_str().expect("utf8 path"), 0));
    }

    #[tokio::test]
    async fn unreachable_probe_times_out_as_down() {
        // Reserved TEST-NET-1 address, nothing listens there.
        assert!(!tcp_reachable("192.0.2.1", 9, Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn listening_socket_probes_as_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        assert!(tcp_reachable("127.0.0.1", port, Duration::from_secs(1)).await);
    }
}
