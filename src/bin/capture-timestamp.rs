//! Prefixes every stdin line with the current instant and a tab, turning
//! raw capture tool output into input for `fritz-capture`.

use anyhow::Result;
use chrono::Utc;
use fritz_capture::capture::stamp_line;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let mut stamped = stamp_line(Utc::now(), &line);
        stamped.push('\n');
        stdout.write_all(stamped.as_bytes()).await?;
        // Downstream reads a live stream
        stdout.flush().await?;
    }

    Ok(())
}
