//! Report task
//!
//! Receives measurements from the acquisition task, logs them and hands them to the
//! reporter. A report that cannot go out is dropped; the next cycle produces a fresh
//! one.

use defmt::{info, warn};
use sump_core::report::DEFAULT_TOPIC;
use sump_core::{Measurement, NodeId, Reporter};

use crate::system::event;
use crate::system::io::{AlwaysUp, RttPublisher, UptimeClock};

#[embassy_executor::task]
pub async fn report() {
    let chip_id = embassy_rp::otp::get_chipid().unwrap_or(0);
    let id = NodeId::from_chip_id(chip_id);
    info!("Reporter started as {}", id);

    let mut reporter = Reporter::new(id, DEFAULT_TOPIC, AlwaysUp, UptimeClock, RttPublisher);
    loop {
        let measurement: Measurement = event::wait().await.into();
        info!("Measured: {}", measurement);
        if let Err(e) = reporter.report(&measurement, None).await {
            warn!("Report dropped: {}", e);
        }
    }
}
