//! `usage-meter serve`: line-delimited JSON host loop
//!
//! Each stdin line is one request, each stdout line one response:
//!
//! ```text
//! {"op":"track","entityId":"char1","timeIncrementMs":5000}   -> {"ok":true}
//! {"op":"query","date":"2024-01-01"}                          -> {"ok":true,"data":{...}}
//! {"op":"query","date":"2024/01/01"}                          -> {"ok":false,"error":"..."}
//! ```

use crate::config::Config;
use crate::services::{query, tracking, AggregationCache, UsageMeter};
use crate::types::{DayBucket, QueryRequest, TrackRequest};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Request {
    Track(TrackRequest),
    Query(QueryRequest),
}

#[derive(Debug, Serialize, PartialEq)]
struct Response {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<DayBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    fn ack() -> Self {
        Self {
            ok: true,
            data: None,
            error: None,
        }
    }

    fn data(bucket: DayBucket) -> Self {
        Self {
            ok: true,
            data: Some(bucket),
            error: None,
        }
    }

    fn error(message: impl ToString) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

fn handle_line(cache: &AggregationCache, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Response::error(format!("bad request: {}", e)),
    };

    match request {
        Request::Track(req) => match tracking::track(cache, &req) {
            Ok(()) => Response::ack(),
            Err(e) => Response::error(e),
        },
        Request::Query(req) => match query::query(cache, &req) {
            Ok(bucket) => Response::data(bucket),
            Err(e) => Response::error(e),
        },
    }
}

/// Forward stdin lines from a plain thread.
///
/// Tokio's stdin reads on a blocking-pool thread that the runtime waits for at
/// shutdown, so a pending read would keep the process alive after Ctrl-C. This
/// thread is detached instead and dies with the process.
fn stdin_lines() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(64);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

async fn pump<W, S>(
    cache: Arc<AggregationCache>,
    mut lines: mpsc::Receiver<io::Result<String>>,
    out: &mut W,
    shutdown: S,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("interrupt received, shutting down");
                return Ok(());
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    tracing::info!("stdin closed, shutting down");
                    return Ok(());
                };
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                // A cache miss reads a day file under the cache lock
                let cache = Arc::clone(&cache);
                let response =
                    tokio::task::spawn_blocking(move || handle_line(&cache, &line)).await?;
                let mut encoded = serde_json::to_string(&response)?;
                encoded.push('\n');
                out.write_all(encoded.as_bytes()).await?;
                out.flush().await?;
            }
        }
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let meter = UsageMeter::start(config).await?;
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let served = pump(
        Arc::clone(meter.cache()),
        stdin_lines(),
        &mut tokio::io::stdout(),
        interrupted,
    )
    .await;
    let outcome = meter.stop().await;
    served?;
    if outcome.failed > 0 {
        anyhow::bail!("failed to persist {} day(s) on shutdown", outcome.failed);
    }
    Ok(())
}
