//! Remote reconciliation-service client.
//!
//! Thin, typed HTTP layer over the station back office: day and shift
//! lifecycle endpoints, entry submission, the consolidated view, and the
//! reference catalogs.  Every call is authenticated with the session's
//! bearer token and every failure maps to [`CuadreError::Upstream`] with a
//! message an operator can act on.  This layer never retries.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use chrono::NaiveDate;

use crate::catalog::{Catalog, CatalogKind, Customer};
use crate::entries::LineItem;
use crate::error::CuadreError;

/// Default timeout for service requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the service base URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment (paths here already carry it)
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /api
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn transport_error(base: &str, err: &reqwest::Error) -> CuadreError {
    let message = if err.is_connect() {
        format!("Cannot reach reconciliation service at {base}")
    } else if err.is_timeout() {
        format!("Connection to {base} timed out")
    } else if err.is_builder() {
        format!("Invalid reconciliation service URL: {base}")
    } else {
        format!("Network error communicating with {base}: {err}")
    };
    CuadreError::Upstream {
        status: None,
        message,
    }
}

fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Session token is invalid or expired".to_string(),
        403 => "Not authorized for this operation".to_string(),
        404 => "Reconciliation service endpoint not found".to_string(),
        s if s >= 500 => format!("Reconciliation service error (HTTP {s})"),
        s => format!("Unexpected response from reconciliation service (HTTP {s})"),
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Day record as the back office serialises it.  `estado_id` follows the
/// service convention: 1 = open, 2 = closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDay {
    pub id: i64,
    pub fecha: NaiveDate,
    pub estado_id: i64,
}

impl RemoteDay {
    pub fn is_open(&self) -> bool {
        self.estado_id == 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteShift {
    pub id: i64,
    pub empleado_id: i64,
    pub fecha: NaiveDate,
    pub estado_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteLedgerRow {
    pub empleado: String,
    pub modulo: String,
    pub tipo: String,
    pub monto: f64,
}

#[derive(Serialize)]
struct OpenDayRequest {
    fecha: NaiveDate,
    abierto_por: i64,
}

#[derive(Serialize)]
struct OpenShiftRequest {
    fecha: NaiveDate,
    empleado_id: i64,
}

#[derive(Serialize)]
struct CloseRequest {
    monto_declarado: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    observaciones: Option<String>,
}

// ---------------------------------------------------------------------------
// Session and client
// ---------------------------------------------------------------------------

/// Connection parameters for one authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub base_url: String,
    pub token: Option<String>,
}

impl Session {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            token: None,
        }
    }

    pub fn with_token(base_url: &str, token: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            token: Some(token.to_string()),
        }
    }
}

pub struct CuadreClient {
    http: Client,
    session: Session,
}

impl CuadreClient {
    pub fn new(session: Session) -> Result<Self, CuadreError> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| CuadreError::Upstream {
                status: None,
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { http, session })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.session.base_url)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.session.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a request and decode the JSON body.  `allow_missing` turns a
    /// 404 into `Ok(None)` for the "is there one right now?" endpoints.
    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        allow_missing: bool,
    ) -> Result<Option<T>, CuadreError> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| transport_error(&self.session.base_url, &e))?;
        let status = resp.status();

        if allow_missing && status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<serde_json::Value>(&body_text)
                .ok()
                .as_ref()
                .and_then(|v| v.get("error").or_else(|| v.get("message")))
                .and_then(serde_json::Value::as_str)
            {
                Some(detail) => format!("{} (HTTP {})", detail, status.as_u16()),
                None => format!("{} (HTTP {})", status_error(status), status.as_u16()),
            };
            return Err(CuadreError::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body_text = resp.text().await.unwrap_or_default();
        serde_json::from_str(&body_text)
            .map(Some)
            .map_err(|e| CuadreError::Upstream {
                status: Some(status.as_u16()),
                message: format!("Invalid JSON from reconciliation service: {e}"),
            })
    }

    async fn send_required<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, CuadreError> {
        match self.send(req, false).await? {
            Some(value) => Ok(value),
            // unreachable with allow_missing = false, but keep the error honest
            None => Err(CuadreError::Upstream {
                status: Some(404),
                message: status_error(StatusCode::NOT_FOUND),
            }),
        }
    }

    // -----------------------------------------------------------------
    // Day lifecycle
    // -----------------------------------------------------------------

    /// The day record for the date, or `None` when no day has been opened.
    pub async fn current_day(&self, fecha: NaiveDate) -> Result<Option<RemoteDay>, CuadreError> {
        let req = self
            .http
            .get(self.url("/api/turnos/dia/actual"))
            .query(&[("fecha", fecha.to_string())]);
        self.send(req, true).await
    }

    pub async fn open_day(
        &self,
        fecha: NaiveDate,
        supervisor_id: i64,
    ) -> Result<RemoteDay, CuadreError> {
        let day: RemoteDay = self
            .send_required(self.http.post(self.url("/api/turnos/dia")).json(
                &OpenDayRequest {
                    fecha,
                    abierto_por: supervisor_id,
                },
            ))
            .await?;
        info!(day_id = day.id, fecha = %fecha, "Day opened on service");
        Ok(day)
    }

    pub async fn close_day(
        &self,
        day_id: i64,
        monto_declarado: f64,
        observaciones: Option<String>,
    ) -> Result<RemoteDay, CuadreError> {
        let day: RemoteDay = self
            .send_required(
                self.http
                    .put(self.url(&format!("/api/turnos/dia/{day_id}/cerrar")))
                    .json(&CloseRequest {
                        monto_declarado,
                        observaciones,
                    }),
            )
            .await?;
        info!(day_id, "Day closed on service");
        Ok(day)
    }

    // -----------------------------------------------------------------
    // Shift lifecycle
    // -----------------------------------------------------------------

    /// The attendant's open shift for the date, or `None`.
    pub async fn current_shift(
        &self,
        fecha: NaiveDate,
        empleado_id: i64,
    ) -> Result<Option<RemoteShift>, CuadreError> {
        let req = self
            .http
            .get(self.url("/api/turnos/grifero/actual"))
            .query(&[
                ("fecha", fecha.to_string()),
                ("empleado_id", empleado_id.to_string()),
            ]);
        self.send(req, true).await
    }

    pub async fn open_shift(
        &self,
        fecha: NaiveDate,
        empleado_id: i64,
    ) -> Result<RemoteShift, CuadreError> {
        let shift: RemoteShift = self
            .send_required(
                self.http
                    .post(self.url("/api/turnos/grifero"))
                    .json(&OpenShiftRequest { fecha, empleado_id }),
            )
            .await?;
        info!(shift_id = shift.id, empleado_id, "Shift opened on service");
        Ok(shift)
    }

    pub async fn close_shift(
        &self,
        shift_id: i64,
        monto_declarado: f64,
        observaciones: Option<String>,
    ) -> Result<RemoteShift, CuadreError> {
        let shift: RemoteShift = self
            .send_required(
                self.http
                    .put(self.url(&format!("/api/turnos/grifero/{shift_id}/cerrar")))
                    .json(&CloseRequest {
                        monto_declarado,
                        observaciones,
                    }),
            )
            .await?;
        info!(shift_id, "Shift closed on service");
        Ok(shift)
    }

    /// Record one line item on an open shift.  The service echoes the entry
    /// back as stored.
    pub async fn add_line_item(
        &self,
        shift_id: i64,
        entry: &LineItem,
    ) -> Result<LineItem, CuadreError> {
        debug!(shift_id, entry_id = %entry.id(), category = %entry.category(), "Adding line item");
        self.send_required(
            self.http
                .post(self.url(&format!("/api/turnos/grifero/{shift_id}/detalles")))
                .json(entry),
        )
        .await
    }

    // -----------------------------------------------------------------
    // Consolidated view and catalogs
    // -----------------------------------------------------------------

    pub async fn consolidated(
        &self,
        fecha: NaiveDate,
    ) -> Result<Vec<RemoteLedgerRow>, CuadreError> {
        let req = self
            .http
            .get(self.url("/api/cuadre/consolidado"))
            .query(&[("fecha", fecha.to_string())]);
        self.send_required(req).await
    }

    pub async fn catalog_items<T: DeserializeOwned>(
        &self,
        kind: CatalogKind,
    ) -> Result<Vec<T>, CuadreError> {
        let req = self
            .http
            .get(self.url(&format!("/api/catalogos/{}", kind.as_path())));
        self.send_required(req).await
    }

    /// Fetch all six reference catalogs into one [`Catalog`].
    pub async fn load_catalog(&self) -> Result<Catalog, CuadreError> {
        let catalog = Catalog {
            employees: self.catalog_items(CatalogKind::Employees).await?,
            meters: self.catalog_items(CatalogKind::Meters).await?,
            products: self.catalog_items(CatalogKind::Products).await?,
            terminals: self.catalog_items(CatalogKind::Terminals).await?,
            voucher_types: self.catalog_items(CatalogKind::VoucherTypes).await?,
            customers: self.catalog_items(CatalogKind::Customers).await?,
        };
        info!(
            employees = catalog.employees.len(),
            meters = catalog.meters.len(),
            products = catalog.products.len(),
            "Catalogs loaded"
        );
        Ok(catalog)
    }

    /// Look a customer up by document number, or `None` if unknown.
    pub async fn customer_by_document(
        &self,
        document: &str,
    ) -> Result<Option<Customer>, CuadreError> {
        let req = self.http.get(self.url(&format!(
            "/api/catalogos/clientes/num-documento/{}",
            document.trim()
        )));
        self.send(req, true).await
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://cuadre.example.com/"),
            "https://cuadre.example.com"
        );
        assert_eq!(
            normalize_base_url("cuadre.example.com/api/"),
            "https://cuadre.example.com"
        );
        assert_eq!(
            normalize_base_url("localhost:8080"),
            "http://localhost:8080"
        );
        assert_eq!(
            normalize_base_url("  http://127.0.0.1:3000/api  "),
            "http://127.0.0.1:3000"
        );
    }

    /// Spin up a one-shot HTTP server on an ephemeral port that answers the
    /// first request with the canned status and JSON body.
    fn http_test_server(status_line: &'static str, body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral TCP port for test");
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (mut stream, _addr) = listener.accept().expect("accept HTTP connection");
            let mut buf = [0u8; 4096];
            // read the request head; canned response regardless of content
            let _ = stream.read(&mut buf);
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .expect("write HTTP response");
        });
        port
    }

    fn client_for(port: u16) -> CuadreClient {
        CuadreClient::new(Session::with_token(
            &format!("http://127.0.0.1:{port}"),
            "test-token",
        ))
        .expect("build client")
    }

    #[tokio::test]
    async fn test_current_day_parses_open_day() {
        let port = http_test_server(
            "HTTP/1.1 200 OK",
            r#"{"id":12,"fecha":"2024-03-01","estado_id":1}"#,
        );
        let day = client_for(port)
            .current_day("2024-03-01".parse().unwrap())
            .await
            .expect("request")
            .expect("day present");
        assert_eq!(day.id, 12);
        assert!(day.is_open());
    }

    #[tokio::test]
    async fn test_current_day_missing_is_none() {
        let port = http_test_server("HTTP/1.1 404 Not Found", r#"{"error":"no day"}"#);
        let day = client_for(port)
            .current_day("2024-03-01".parse().unwrap())
            .await
            .expect("404 maps to None");
        assert!(day.is_none());
    }

    #[tokio::test]
    async fn test_open_day_404_is_an_error() {
        let port = http_test_server("HTTP/1.1 404 Not Found", "");
        let err = client_for(port)
            .open_day("2024-03-01".parse().unwrap(), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CuadreError::Upstream {
                status: Some(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_carries_status_and_message() {
        let port = http_test_server("HTTP/1.1 401 Unauthorized", "");
        let err = client_for(port)
            .consolidated("2024-03-01".parse().unwrap())
            .await
            .unwrap_err();
        match err {
            CuadreError::Upstream { status, message } => {
                assert_eq!(status, Some(401));
                assert!(message.contains("token"), "unexpected message: {message}");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_service_error_detail_is_surfaced() {
        let port = http_test_server(
            "HTTP/1.1 422 Unprocessable Entity",
            r#"{"error":"turno ya cerrado"}"#,
        );
        let err = client_for(port)
            .close_shift(9, 450.0, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("turno ya cerrado"));
    }

    #[tokio::test]
    async fn test_customer_by_document() {
        let port = http_test_server(
            "HTTP/1.1 200 OK",
            r#"{"id":4,"document_number":"20481123779","name":"Transportes Andinos SAC","active":true}"#,
        );
        let customer = client_for(port)
            .customer_by_document(" 20481123779 ")
            .await
            .expect("request")
            .expect("customer present");
        assert_eq!(customer.id, 4);
        assert_eq!(customer.name, "Transportes Andinos SAC");
    }

    #[tokio::test]
    async fn test_add_line_item_returns_stored_entry() {
        let port = http_test_server(
            "HTTP/1.1 201 Created",
            r#"{"category":"deposit","id":"srv-1","voucher_number":null,"received_by":null,"notes":null,"amount":200.0}"#,
        );
        let entry = LineItem::Deposit(
            crate::entries::DepositEntry::new(200.0, None, None, None).unwrap(),
        );
        let stored = client_for(port)
            .add_line_item(9, &entry)
            .await
            .expect("request");
        // the service assigns its own id; everything else echoes back
        assert_eq!(stored.id(), "srv-1");
        assert_eq!(stored.amount(), 200.0);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral TCP port for test");
        let port = listener.local_addr().unwrap().port();
        drop(listener); // port now refuses connections

        let err = client_for(port)
            .current_day("2024-03-01".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CuadreError::Upstream { status: None, .. }));
    }
}
