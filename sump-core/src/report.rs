//! Reporting measurements to the collector
//!
//! Each measurement is encoded as one flat JSON object of string values,
//! `{"ID":"…","time":"…",<fields>,"memFree":"…"}`, and published on a topic. The
//! transport, connectivity and wall-clock time are collaborators behind small traits;
//! the reporter only decides whether a report can go out and what it looks like.

use core::fmt::Write;

use chrono::{DateTime, Datelike, Timelike, Utc};
use heapless::String;

use crate::error::ReportError;
use crate::measurement::Measurement;

/// Topic used when none is configured
pub const DEFAULT_TOPIC: &str = "esptest/";

/// Size of the encoded report buffer
pub const REPORT_CAPACITY: usize = 256;

/// Node identity, 16 upper-case hex digits of the chip id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeId(String<16>);

impl NodeId {
    pub fn from_chip_id(chip_id: u64) -> Self {
        let mut id = String::new();
        // 16 hex digits always fit
        let _ = write!(id, "{:016X}", chip_id);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for NodeId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.0.as_str())
    }
}

/// Formats seconds since the Unix epoch as `YYYY-MM-DDTHH:MM:SSZ`
///
/// Returns `None` for instants chrono cannot represent or years past 9999.
pub fn iso8601_utc(unix_secs: u64) -> Option<String<20>> {
    let secs = i64::try_from(unix_secs).ok()?;
    let at: DateTime<Utc> = DateTime::from_timestamp(secs, 0)?;
    let mut out = String::new();
    write!(
        out,
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        at.year(),
        at.month(),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
    .ok()?;
    Some(out)
}

/// Whether the network is usable
pub trait Link {
    fn is_up(&self) -> bool;
}

/// Wall-clock time source
pub trait TimeSource {
    /// Seconds since the Unix epoch, `None` until time has been obtained
    fn unix_time(&self) -> Option<u64>;
}

/// Message transport
#[allow(async_fn_in_trait)]
pub trait Publisher {
    type Error;

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), Self::Error>;
}

/// One report ready to be encoded
#[derive(Debug, Clone, PartialEq)]
pub struct Report<'a> {
    pub id: &'a NodeId,
    /// ISO-8601 UTC timestamp
    pub time: &'a str,
    pub measurement: &'a Measurement,
    /// Free heap in bytes, omitted when the platform has no heap
    pub free_memory: Option<u32>,
}

impl Report<'_> {
    pub fn encode(&self) -> Result<String<REPORT_CAPACITY>, ReportError> {
        let mut out = String::new();
        self.write_json(&mut out).map_err(|_| ReportError::Overflow {
            capacity: REPORT_CAPACITY,
        })?;
        Ok(out)
    }

    fn write_json<W: Write>(&self, out: &mut W) -> core::fmt::Result {
        write!(out, r#"{{"ID":"{}","time":"{}""#, self.id.as_str(), self.time)?;
        self.measurement.write_fields(out)?;
        if let Some(free) = self.free_memory {
            write!(out, r#","memFree":"{}""#, free)?;
        }
        out.write_char('}')
    }
}

/// Publishes measurements once the link is up and time is known
pub struct Reporter<L, T, P> {
    id: NodeId,
    topic: &'static str,
    link: L,
    time: T,
    publisher: P,
    published: u32,
}

impl<L, T, P> Reporter<L, T, P>
where
    L: Link,
    T: TimeSource,
    P: Publisher,
{
    pub fn new(id: NodeId, topic: &'static str, link: L, time: T, publisher: P) -> Self {
        Self {
            id,
            topic,
            link,
            time,
            publisher,
            published: 0,
        }
    }

    pub async fn report(&mut self, measurement: &Measurement, free_memory: Option<u32>) -> Result<(), ReportError> {
        if !self.link.is_up() {
            return Err(ReportError::LinkDown);
        }
        let time = self
            .time
            .unix_time()
            .and_then(iso8601_utc)
            .ok_or(ReportError::NoTime)?;
        let payload = Report {
            id: &self.id,
            time: &time,
            measurement,
            free_memory,
        }
        .encode()?;

        self.publisher
            .publish(self.topic, &payload)
            .await
            .map_err(|_| ReportError::Publish)?;
        self.published = self.published.wrapping_add(1);
        debug!("published report {} on {}", self.published, self.topic);
        Ok(())
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn topic(&self) -> &str {
        self.topic
    }

    /// Reports successfully handed to the transport
    pub fn published(&self) -> u32 {
        self.published
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}
