//! Window Inventory Subsystem: seeds the counts from one full tree dump,
//! then follows live window events. The composer consults the counts when
//! it styles app buttons, so every inventory change is also a dirty signal.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use barline_core::windows::WindowCounts;

use crate::bar::Bar;
use crate::i3ipc::{I3Connection, I3Error, Node};

const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

pub async fn run(bar: Arc<Bar>, windows: Arc<WindowCounts>) {
    let mut backoff = RECONNECT_INITIAL;
    loop {
        match watch(&bar, &windows).await {
            Ok(()) => {
                debug!(event = "window_stream_ended");
                backoff = RECONNECT_INITIAL;
            }
            Err(err) => {
                warn!(event = "window_stream_failed", error = %err);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 3 / 2).min(RECONNECT_MAX);
    }
}

async fn watch(bar: &Bar, windows: &WindowCounts) -> Result<(), I3Error> {
    let mut conn = I3Connection::connect().await?;

    // Synthesize an appearance for every window that already exists, so the
    // counts start accurate instead of starting at zero.
    let tree = conn.get_tree().await?;
    windows.clear();
    let seeded = seed_counts(&tree, windows);
    info!(event = "window_inventory_seeded", windows = seeded);
    bar.mark_dirty();

    conn.subscribe_windows().await?;
    loop {
        let event = conn.next_window_event().await?;
        let Some(props) = event.container.window_properties else {
            continue;
        };
        match event.change.as_str() {
            "new" => {
                windows.appeared(&props.class, &props.instance);
                bar.mark_dirty();
            }
            "close" => {
                windows.removed(&props.class, &props.instance);
                bar.mark_dirty();
            }
            // Focus, title and mark changes do not move any count.
            _ => {}
        }
    }
}

fn seed_counts(node: &Node, windows: &WindowCounts) -> usize {
    let mut seeded = 0;
    if let Some(props) = &node.window_properties {
        windows.appeared(&props.class, &props.instance);
        seeded += 1;
    }
    for child in node.nodes.iter().chain(node.floating_nodes.iter()) {
        seeded += seed_counts(child, windows);
    }
    seeded
}
