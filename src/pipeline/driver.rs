//! Pipeline driver wiring input lines to the report writers
//!
//! Three stages connected by channels:
//! - a reader task parsing lines into packets (bounded queue)
//! - the window scheduler, run by `PipelineDriver::run` itself
//! - a single flush worker owning the `Reporter`
//!
//! The worker handles one window at a time, so the read-merge-write cycles
//! of two windows never interleave on the same rollup file.

use crate::capture::{parse_line, ClassifiedPacket};
use crate::cli::Config;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pipeline::scheduler::WindowScheduler;
use crate::report::Reporter;
use crate::resolver::{DnsReverseLookup, HostNameResolver, HostNameStore, ReverseLookup, STORE_FILE_NAME};
use crate::{CaptureError, Result};
use tokio::fs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Windows waiting for the flush worker before the scheduler blocks
const FLUSH_QUEUE_DEPTH: usize = 2;

type Window = Vec<ClassifiedPacket>;

pub struct PipelineDriver<L> {
    config: Config,
    reporter: Reporter<L>,
    metrics: PipelineMetrics,
}

impl PipelineDriver<DnsReverseLookup> {
    /// Driver resolving local host names against the configured DNS server
    pub async fn from_config(config: Config) -> Result<Self> {
        let lookup = DnsReverseLookup::new(config.dns_server);
        Self::with_lookup(config, lookup).await
    }
}

impl<L: ReverseLookup + 'static> PipelineDriver<L> {
    /// Create the data directory and load the host name store
    pub async fn with_lookup(config: Config, lookup: L) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).await?;

        let store = HostNameStore::new(config.data_dir.join(STORE_FILE_NAME));
        let resolver = HostNameResolver::open(lookup, Some(store), config.lease_time).await?;
        let reporter = Reporter::new(&config.data_dir, resolver);

        Ok(Self {
            config,
            reporter,
            metrics: PipelineMetrics::new(),
        })
    }

    /// Consume `input` until it ends, flush the last window and wait for
    /// the flush worker to finish
    pub async fn run<R>(self, input: R) -> Result<MetricsSnapshot>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let Self {
            config,
            reporter,
            metrics,
        } = self;

        info!(
            "Writing reports to {} every {}s",
            config.data_dir.display(),
            config.report_interval.as_secs()
        );

        let (packet_tx, mut packet_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (window_tx, window_rx) = mpsc::channel(FLUSH_QUEUE_DEPTH);

        let reader = tokio::spawn(read_lines(input, packet_tx, metrics.clone()));
        let worker = tokio::spawn(flush_worker(reporter, window_rx, metrics.clone()));

        let mut scheduler = WindowScheduler::new(config.report_interval);
        while let Some(packet) = packet_rx.recv().await {
            if let Some(window) = scheduler.push(packet) {
                submit(&window_tx, window).await?;
            }
        }

        let remaining = scheduler.drain();
        if !remaining.is_empty() {
            submit(&window_tx, remaining).await?;
        }
        drop(window_tx);

        reader.await??;
        worker.await?;

        Ok(metrics.snapshot())
    }
}

async fn submit(window_tx: &mpsc::Sender<Window>, window: Window) -> Result<()> {
    debug!("Closing window of {} packets", window.len());
    window_tx
        .send(window)
        .await
        .map_err(|_| CaptureError::ChannelClosed("flush worker"))
}

/// Read lines until end of input, forwarding accepted packets.
///
/// Filtered and unparsable lines are counted and skipped. A read error ends
/// ingestion as if the input had closed.
async fn read_lines<R>(
    mut input: R,
    packet_tx: mpsc::Sender<ClassifiedPacket>,
    metrics: PipelineMetrics,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        }
        metrics.line_read();

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                metrics.line_rejected();
                warn!("Skipping non UTF-8 line: {}", e);
                continue;
            }
        };

        match parse_line(line) {
            Ok(Some(packet)) => {
                metrics.packet_accepted();
                packet_tx
                    .send(packet)
                    .await
                    .map_err(|_| CaptureError::ChannelClosed("window scheduler"))?;
            }
            Ok(None) => metrics.line_filtered(),
            Err(e) => {
                metrics.line_rejected();
                warn!("Skipping line: {}", e);
            }
        }
    }

    debug!("Input closed");
    Ok(())
}

/// Report windows one by one until the scheduler hangs up
async fn flush_worker<L: ReverseLookup>(
    mut reporter: Reporter<L>,
    mut window_rx: mpsc::Receiver<Window>,
    metrics: PipelineMetrics,
) {
    while let Some(window) = window_rx.recv().await {
        match reporter.report(&window).await {
            Ok(Some(summary)) => {
                metrics.flush_completed(summary.bytes);
                debug!(
                    "Reported window {}: {} flows, {} bytes",
                    summary.window_start, summary.flows, summary.bytes
                );
            }
            Ok(None) => {}
            Err(e) => {
                metrics.flush_failed();
                error!("Failed to report window of {} packets: {}", window.len(), e);
            }
        }
    }
}
