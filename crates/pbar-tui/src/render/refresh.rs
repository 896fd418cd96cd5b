//! Background repaint sources that run on the render runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::repaint::RepaintSignal;

/// Requests a repaint every `period` until cancelled, so time-based columns
/// advance without producer activity.
pub(crate) async fn auto_refresh(
    period: Duration,
    repaint: Arc<RepaintSignal>,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => repaint.request(),
        }
    }
}

/// Turns bytes from the resize pipe into repaint requests. Ends on
/// cancellation or when the write end closes.
#[cfg(unix)]
pub(crate) async fn watch_resize(
    reader: std::os::unix::net::UnixStream,
    repaint: Arc<RepaintSignal>,
    cancel: CancellationToken,
) {
    use std::io::ErrorKind;

    let stream = match tokio::net::UnixStream::from_std(reader) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "resize notifications unavailable");
            return;
        }
    };
    let mut buf = [0u8; 64];
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            ready = stream.readable() => {
                if ready.is_err() {
                    break;
                }
                match stream.try_read(&mut buf) {
                    Ok(0) => break,
                    Ok(_) => repaint.request(),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "resize pipe failed");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_ticks_until_cancelled() {
        let repaint = Arc::new(RepaintSignal::new());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(auto_refresh(
            Duration::from_millis(100),
            Arc::clone(&repaint),
            cancel.clone(),
        ));

        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(repaint.requests(), 3);

        cancel.cancel();
        task.await.unwrap();
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(repaint.requests(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resize_bytes_request_repaint() {
        use std::io::Write;
        use std::os::unix::net::UnixStream;

        let (reader, mut writer) = UnixStream::pair().unwrap();
        reader.set_nonblocking(true).unwrap();
        let repaint = Arc::new(RepaintSignal::new());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watch_resize(reader, Arc::clone(&repaint), cancel.clone()));

        writer.write_all(&[1]).unwrap();
        tokio::time::timeout(Duration::from_secs(2), repaint.wait())
            .await
            .unwrap();
        assert!(repaint.take());

        drop(writer);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
