//! Sequential pagination driver.

use std::future::Future;

use datagate_core::{GatewayError, GatewayResult, Record};
use tracing::debug;

/// Fetch pages of `page_size` records starting at `start_offset` until the
/// server returns a short or empty page, or `cap` records have accumulated.
///
/// `fetch(offset, limit)` performs one page request. Pages are requested
/// strictly in order; the final page is truncated so the result never exceeds
/// the cap.
///
/// # Errors
/// Returns [`GatewayError::Validation`] for a zero page size; any fetch error
/// aborts the drive and propagates.
pub async fn fetch_all<F, Fut>(
    start_offset: u32,
    page_size: u32,
    cap: Option<usize>,
    mut fetch: F,
) -> GatewayResult<Vec<Record>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = GatewayResult<Vec<Record>>>,
{
    if page_size == 0 {
        return Err(GatewayError::Validation("page size must be at least 1".into()));
    }
    if cap == Some(0) {
        return Ok(Vec::new());
    }

    let mut records: Vec<Record> = Vec::new();
    let mut offset = start_offset;

    loop {
        let page = fetch(offset, page_size).await?;
        let fetched = page.len();
        debug!(offset, fetched, total = records.len() + fetched, "fetched page");
        records.extend(page);

        if let Some(cap) = cap {
            if records.len() >= cap {
                records.truncate(cap);
                break;
            }
        }

        // A short page means the server ran out of records.
        if fetched < page_size as usize {
            break;
        }

        offset = match offset.checked_add(page_size) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn record(id: usize) -> Record {
        let mut map = Record::new();
        map.insert("id".into(), json!(id));
        map
    }

    /// Simulates a server holding `total` records, serving them in offset
    /// order.
    fn server(total: usize) -> impl FnMut(u32, u32) -> std::future::Ready<GatewayResult<Vec<Record>>>
    {
        move |offset, limit| {
            let start = (offset as usize).min(total);
            let end = (start + limit as usize).min(total);
            std::future::ready(Ok((start..end).map(record).collect()))
        }
    }

    #[tokio::test]
    async fn drains_25_records_in_three_pages_of_ten() {
        let calls = AtomicUsize::new(0);
        let mut fetch = server(25);
        let records = fetch_all(0, 10, None, |offset, limit| {
            calls.fetch_add(1, Ordering::SeqCst);
            fetch(offset, limit)
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 25);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(records[24].get("id"), Some(&json!(24)));
    }

    #[tokio::test]
    async fn stops_after_exact_multiple_via_trailing_empty_page() {
        let calls = AtomicUsize::new(0);
        let mut fetch = server(20);
        let records = fetch_all(0, 10, None, |offset, limit| {
            calls.fetch_add(1, Ordering::SeqCst);
            fetch(offset, limit)
        })
        .await
        .unwrap();

        assert_eq!(records.len(), 20);
        // Two full pages plus the empty probe.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cap_truncates_the_final_page_exactly() {
        let records = fetch_all(0, 10, Some(13), server(100)).await.unwrap();
        assert_eq!(records.len(), 13);
        assert_eq!(records[12].get("id"), Some(&json!(12)));
    }

    #[tokio::test]
    async fn cap_bounds_a_server_that_never_runs_dry() {
        // Echoes a full page at every offset.
        let records = fetch_all(0, 10, Some(35), |_, limit| {
            std::future::ready(Ok((0..limit as usize).map(record).collect()))
        })
        .await
        .unwrap();
        assert_eq!(records.len(), 35);
    }

    #[tokio::test]
    async fn respects_the_starting_offset() {
        let records = fetch_all(15, 10, None, server(25)).await.unwrap();
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].get("id"), Some(&json!(15)));
    }

    #[tokio::test]
    async fn empty_first_page_yields_empty_result() {
        let records = fetch_all(0, 10, None, server(0)).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn mid_drive_errors_abort_and_propagate() {
        let calls = AtomicUsize::new(0);
        let result = fetch_all(0, 10, None, |_, limit| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if call == 1 {
                Err(GatewayError::Api { status: 500, message: "boom".into() })
            } else {
                Ok((0..limit as usize).map(record).collect())
            })
        })
        .await;

        assert!(matches!(result, Err(GatewayError::Api { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_page_size_is_a_validation_error() {
        let result = fetch_all(0, 0, None, server(10)).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn zero_cap_short_circuits_without_fetching() {
        let calls = AtomicUsize::new(0);
        let records = fetch_all(0, 10, Some(0), |offset, limit| {
            calls.fetch_add(1, Ordering::SeqCst);
            let mut fetch = server(10);
            fetch(offset, limit)
        })
        .await
        .unwrap();

        assert!(records.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
