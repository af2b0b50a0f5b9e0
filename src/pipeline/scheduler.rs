//! Reporting window boundaries
//!
//! The first packet seeds the window start. A later packet closes the
//! window when it lies more than the report interval after the window
//! start; the closed window holds everything buffered before that packet,
//! and the packet opens the next window. Window starts are truncated to
//! whole minutes.

use crate::capture::ClassifiedPacket;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::mem;
use std::time::Duration;

#[derive(Debug)]
pub struct WindowScheduler {
    interval_secs: i64,
    last_flush: Option<DateTime<Utc>>,
    buffer: Vec<ClassifiedPacket>,
}

impl WindowScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_secs: i64::try_from(interval.as_secs()).unwrap_or(i64::MAX),
            last_flush: None,
            buffer: Vec::new(),
        }
    }

    /// Buffer a packet, returning the previous window if this packet closed it
    pub fn push(&mut self, packet: ClassifiedPacket) -> Option<Vec<ClassifiedPacket>> {
        let ts = packet.timestamp;
        match self.last_flush {
            None => {
                self.last_flush = Some(truncate_to_minute(ts));
                self.buffer.push(packet);
                None
            }
            Some(last) if ts.timestamp().saturating_sub(last.timestamp()) > self.interval_secs => {
                self.last_flush = Some(truncate_to_minute(ts));
                Some(mem::replace(&mut self.buffer, vec![packet]))
            }
            Some(_) => {
                self.buffer.push(packet);
                None
            }
        }
    }

    /// Take whatever is buffered, used once input has ended
    pub fn drain(&mut self) -> Vec<ClassifiedPacket> {
        mem::take(&mut self.buffer)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Minute-truncated start of the current window
    pub fn window_start(&self) -> Option<DateTime<Utc>> {
        self.last_flush
    }
}

fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}
