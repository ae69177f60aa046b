//  STOP_LISTENER.rs
//    by Ray Plante
//
//  Description:
//!   The stop-listener thread: blocks on the stop topic with a bounded
//!   timeout and sets the shared halt flag on any message, regardless of
//!   its payload. Runs independently of the main loop thread so a stuck
//!   main loop never prevents a stop request from being noticed (though it
//!   can only take effect once the current iteration finishes, since
//!   cancellation is cooperative rather than preemptive).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rdkafka::consumer::BaseConsumer;

use joboffice_shr::kafka;

/// Runs until `halt` is set by someone else, or until a message arrives on
/// `consumer`'s subscribed stop topic -- at which point it sets `halt`
/// itself and returns. Polls with `waittime` so it notices an externally-set
/// `halt` (e.g. the main loop halting itself after the final dataset) within
/// one wait period even with no stop event ever arriving.
pub fn run(consumer: BaseConsumer, halt: Arc<AtomicBool>, waittime: Duration) {
    info!("stop listener waiting for a stop event (timeout {:?})", waittime);
    while !halt.load(Ordering::SeqCst) {
        match kafka::poll_once(&consumer, waittime) {
            Ok(Some(_)) => {
                info!("stop event received; halting job office");
                halt.store(true, Ordering::SeqCst);
                return;
            },
            Ok(None) => continue,
            Err(err) => {
                warn!("stop listener poll failed: {}", err);
                continue;
            },
        }
    }
}
