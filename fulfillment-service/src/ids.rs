//! Identifier generation.
//!
//! Ids have the form `<PREFIX>-<unix-millis>`. The millisecond component is
//! strictly increasing within the process, so ids minted in a tight loop
//! never collide.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

pub const REQUEST_PREFIX: &str = "REQ";
pub const ITEM_PREFIX: &str = "ITEM";
pub const ORDER_PREFIX: &str = "ORD";
pub const CHALLAN_PREFIX: &str = "CHL";
pub const QUALITY_PREFIX: &str = "QUA";

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

fn next_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let candidate = if now > last { now } else { last + 1 };
        match LAST_MILLIS.compare_exchange_weak(
            last,
            candidate,
            Ordering::SeqCst,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

pub fn next_id(prefix: &str) -> String {
    format!("{}-{}", prefix, next_millis())
}
