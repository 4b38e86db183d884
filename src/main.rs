use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::Result;
use log::{error, info};

use blelog_rs::btle::BtleTransport;
use blelog_rs::protocol::AGGREGATE_MODULE;
use blelog_rs::session::{SessionConfig, SessionController};
use blelog_rs::types::CoreEvent;

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // Set RUST_LOG=debug for verbose output, e.g.:
    //   RUST_LOG=blelog_rs=debug cargo run
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // ── Controller ────────────────────────────────────────────────────────────
    let (controller, mut events) =
        SessionController::new(Arc::new(BtleTransport::new()), SessionConfig::default());
    let controller = Arc::new(controller);

    info!("Commands (type + Enter):");
    info!("  s    – scan for devices");
    info!("  <n>  – connect to device #n from the last scan");
    info!("  d    – disconnect");
    info!("  q    – quit");

    // ── Stdin command loop ────────────────────────────────────────────────────
    // We read lines on a dedicated OS thread (to avoid holding a non-Send
    // StdinLock across await points), then relay them to the async loop.
    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if line_tx.send(l.trim().to_owned()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    spawn_intent(&controller, |c| async move { c.request_scan().await });

    let mut devices = Vec::new();
    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                CoreEvent::StatusChanged(text) => info!("Status: {text}"),
                CoreEvent::DevicesFound(found) => {
                    devices = found;
                    for (i, d) in devices.iter().enumerate() {
                        println!("  [{i}] {} | {}", d.name, d.address);
                    }
                }
                CoreEvent::LineEmitted(line) => {
                    // every line arrives once per module and once under the
                    // aggregate tag; a flat console prints it only once
                    if line.module != AGGREGATE_MODULE {
                        println!("{:<16} | {}", line.module, line.text);
                    }
                }
                CoreEvent::Failure { context, message } => error!("{context}: {message}"),
            },
            Some(cmd) = line_rx.recv() => match cmd.as_str() {
                "q" => break,
                "s" => spawn_intent(&controller, |c| async move { c.request_scan().await }),
                "d" => spawn_intent(&controller, |c| async move { c.request_disconnect().await }),
                "" => {}
                other => match other.parse::<usize>() {
                    Ok(n) => {
                        let address = devices.get(n).map(|d| d.address.clone());
                        spawn_intent(&controller, |c| async move {
                            c.request_connect(address.as_deref()).await;
                        });
                    }
                    Err(_) => error!("unknown command: {other}"),
                },
            },
            else => break,
        }
    }

    // Dropping the receiver first keeps the final teardown from waiting on
    // event delivery nobody will consume.
    drop(events);
    controller.request_disconnect().await;
    Ok(())
}

/// Run an intent method as its own task so the event loop above keeps
/// draining while the intent (a 5 s scan, a 10 s connect) is in flight.
fn spawn_intent<F, Fut>(controller: &Arc<SessionController>, intent: F)
where
    F: FnOnce(Arc<SessionController>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let c = Arc::clone(controller);
    tokio::spawn(async move { intent(c).await });
}
