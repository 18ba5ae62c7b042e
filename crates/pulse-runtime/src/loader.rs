//! HTTP loading of published CSV exports.
//!
//! [`SheetLoader`] fetches a CSV document over HTTP(S) and hands the text to
//! the parsers in `pulse-data`. A failed request is reported once; retrying
//! is left to the caller.

use std::time::Duration;

use pulse_core::models::{ColumnMap, NormalizedSet};
use pulse_core::{PulseError, Result};
use pulse_data::mix::{
    parse_event_sheet, parse_link_index, sort_events_desc, EventSheetLayout, EventSummary,
};
use pulse_data::reader::normalize;
use reqwest::Client;
use tracing::{debug, info, warn};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetches CSV exports and turns them into typed data.
#[derive(Debug, Clone)]
pub struct SheetLoader {
    client: Client,
}

impl SheetLoader {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PulseError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET `url` and return the body as text.
    ///
    /// Transport failures become [`PulseError::Fetch`], non-2xx answers
    /// [`PulseError::HttpStatus`].
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);

        let fetch_err = |e: reqwest::Error| PulseError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PulseError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(fetch_err)
    }

    /// Fetch a daily export and normalize it.
    pub async fn load_rows(&self, url: &str, columns: &ColumnMap) -> Result<NormalizedSet> {
        let text = self.fetch_text(url).await?;
        let set = normalize(&text, columns)?;
        info!(
            "Loaded {} rows from {} ({} skipped)",
            set.rows.len(),
            url,
            set.skipped.len()
        );
        Ok(set)
    }

    /// Fetch the link index at `index_url` and every event sheet it lists.
    ///
    /// Sheets that fail to download or parse are skipped with a warning.
    /// The result is ordered newest first.
    pub async fn load_events(
        &self,
        index_url: &str,
        layout: &EventSheetLayout,
    ) -> Result<Vec<EventSummary>> {
        let index = self.fetch_text(index_url).await?;
        let links = parse_link_index(&index)?;
        info!("Link index lists {} event sheets", links.len());

        let mut events = Vec::with_capacity(links.len());
        for link in &links {
            let parsed = match self.fetch_text(&link.url).await {
                Ok(text) => parse_event_sheet(&text, layout, link),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(event) => events.push(event),
                Err(e) => warn!("Skipping event sheet {}: {}", link.url, e),
            }
        }

        sort_events_desc(&mut events);
        info!("Loaded {} of {} event sheets", events.len(), links.len());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve canned `(status, body)` answers keyed by request path.
    async fn serve(routes: Vec<(&'static str, u16, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<HashMap<&'static str, (u16, String)>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, status, body)| (path, (status, body)))
                .collect(),
        );

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&buf);
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (status, body) = routes
                        .get(path.as_str())
                        .cloned()
                        .unwrap_or((404, "not found".to_string()));
                    let response = format!(
                        "HTTP/1.1 {status} X\r\n\
                         Content-Type: text/csv\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }

    fn loader() -> SheetLoader {
        SheetLoader::new(5).unwrap()
    }

    fn event_sheet(title: &str, ctv: u32, apps: u32, site: u32) -> String {
        format!(
            "Resumen\n{title}\n,\nPlataforma,Usuarios\n\
             CTV,{ctv}\niOS,{apps}\nAndroid,0\nTablet,0\nOtros,0\nWeb,{site}\n"
        )
    }

    #[tokio::test]
    async fn test_fetch_text_ok() {
        let base = serve(vec![("/sheet.csv", 200, "a,b\n1,2\n".to_string())]).await;
        let text = loader().fetch_text(&format!("{base}/sheet.csv")).await.unwrap();
        assert_eq!(text, "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_fetch_text_http_status() {
        let base = serve(vec![]).await;
        let err = loader()
            .fetch_text(&format!("{base}/missing.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_text_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = loader()
            .fetch_text(&format!("http://{addr}/x.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_load_rows_normalizes() {
        let csv = "Date,Object,Request Count\n\
                   2024-06-01,/a,10\n\
                   2024-06-01,/b,oops\n\
                   2024-06-02,/a,5\n";
        let base = serve(vec![("/daily.csv", 200, csv.to_string())]).await;

        let set = loader()
            .load_rows(&format!("{base}/daily.csv"), &ColumnMap::default())
            .await
            .unwrap();
        assert_eq!(set.rows.len(), 2);
        assert_eq!(set.skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_load_rows_document_error() {
        let body = "Date,Object\n\"2024-06-01,/a\n".to_string();
        let base = serve(vec![("/bad.csv", 200, body)]).await;
        let err = loader()
            .load_rows(&format!("{base}/bad.csv"), &ColumnMap::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::MalformedQuoting { .. }));
    }

    #[tokio::test]
    async fn test_load_events_skips_failed_sheets() {
        let sheets = serve(vec![
            ("/e1.csv", 200, event_sheet("Jornada 1 - 5Ene2024", 10, 20, 30)),
            ("/e2.csv", 200, event_sheet("Jornada 2 - 12Ene2024", 1, 2, 3)),
            ("/short.csv", 200, "solo\nuna\n".to_string()),
        ])
        .await;
        let index = format!(
            "url,categoria,detalle,hoja,aprov\n\
             {sheets}/e1.csv,LigaMX,,,\n\
             {sheets}/e2.csv,LigaMX,,,\n\
             {sheets}/short.csv,LigaMX,,,\n\
             {sheets}/gone.csv,LigaMX,,,\n"
        );
        let index_server = serve(vec![("/index.csv", 200, index)]).await;

        let events = loader()
            .load_events(&format!("{index_server}/index.csv"), &EventSheetLayout::default())
            .await
            .unwrap();

        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Jornada 2", "Jornada 1"]);
        assert_eq!(events[1].component("SITE"), 30.0);
    }

    #[tokio::test]
    async fn test_load_events_index_failure_is_error() {
        let base = serve(vec![]).await;
        let result = loader()
            .load_events(&format!("{base}/index.csv"), &EventSheetLayout::default())
            .await;
        assert!(result.is_err());
    }
}
