use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use susenas_monitor::auth::{login, FormSsoProvider, Session};
use susenas_monitor::config::{Portal, Sso};
use susenas_monitor::error::EtlError;
use susenas_monitor::scrape::PortalScraper;

/// One request as the local server saw it.
#[derive(Debug, Clone)]
struct Received {
    method: String,
    path: String,
    cookie: Option<String>,
    body: String,
}

struct Reply {
    status: &'static str,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl Reply {
    fn html(status: &'static str, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }
}

/// Serves `route` on an ephemeral local port; returns the base URL and the request log.
fn serve<F>(route: F) -> (String, Arc<Mutex<Vec<Received>>>)
where
    F: Fn(&Received) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let req = read_request(&stream);
            let reply = route(&req);
            seen.lock().unwrap().push(req);
            write_reply(stream, reply);
        }
    });
    (base, log)
}

fn read_request(stream: &TcpStream) -> Received {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut length = 0;
    let mut cookie = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).unwrap();
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => length = value.trim().parse().unwrap_or(0),
                "cookie" => cookie = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let mut body = vec![0; length];
    reader.read_exact(&mut body).unwrap();
    Received {
        method,
        path,
        cookie,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

fn write_reply(mut stream: TcpStream, reply: Reply) {
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(reply.body.as_bytes());
}

fn portal(base: &str) -> Portal {
    Portal {
        base_url: format!("{base}/sen/progress"),
        timeout_seconds: 5,
        ..Portal::default()
    }
}

const PROGRESS_PAGE: &str = r#"<html><body>
<table id="tabel-progress">
  <thead><tr><th>Wilayah</th><th>a</th><th>b</th><th>c</th><th>d</th><th>Persen</th></tr></thead>
  <tbody><tr><td>Kota A (6501)</td><td>1</td><td>1</td><td>1</td><td>1</td><td>12,50</td></tr></tbody>
</table>
</body></html>"#;

const LOGIN_PAGE: &str = r#"<html><body>
<form id="kc-form-login" action="/auth/login?session_code=abc" method="post">
  <input id="username" name="username" type="text">
  <input id="password" name="password" type="password">
  <input type="hidden" name="execution" value="e1">
</form>
</body></html>"#;

const REJECTED_PAGE: &str = r#"<html><body>
<span id="input-error" class="kc-feedback-text">Invalid username or password.</span>
<form id="kc-form-login" action="/auth/login?session_code=def" method="post">
  <input name="username" type="text">
  <input name="password" type="password">
</form>
</body></html>"#;

/// Portal that serves the progress table only to requests carrying `SID=ok`.
fn sso_portal(req: &Received) -> Reply {
    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/sen") => Reply::html("200 OK", LOGIN_PAGE),
        ("POST", p) if p.starts_with("/auth/login") => {
            if req.body.contains("password=rahasia") {
                Reply {
                    status: "200 OK",
                    headers: vec![("Set-Cookie", "SID=ok; Path=/".to_string())],
                    body: "<html><body><p>Selamat datang</p></body></html>".to_string(),
                }
            } else {
                Reply::html("200 OK", REJECTED_PAGE)
            }
        }
        ("GET", p) if p.starts_with("/sen/progress/") => {
            if req.cookie.as_deref().is_some_and(|c| c.contains("SID=ok")) {
                Reply::html("200 OK", PROGRESS_PAGE)
            } else {
                Reply::html("403 Forbidden", "<p>login required</p>")
            }
        }
        _ => Reply::html("404 Not Found", "<p>not found</p>"),
    }
}

#[test]
fn non_success_status_is_an_http_error() {
    let (base, _) = serve(|_| Reply::html("500 Internal Server Error", "<p>oops</p>"));
    let session = Session::new(&portal(&base)).unwrap();
    let scraper = PortalScraper::new(&session, "tabel-progress", true);

    let url = format!("{base}/sen/progress/pencacahan?wil=65");
    match scraper.scrape(&url) {
        Err(EtlError::Http { url: failed, message }) => {
            assert_eq!(failed, url);
            assert!(message.contains("500"), "{message}");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[test]
fn table_in_response_is_parsed_into_rows() {
    let (base, _) = serve(|_| Reply::html("200 OK", PROGRESS_PAGE));
    let session = Session::new(&portal(&base)).unwrap();
    let scraper = PortalScraper::new(&session, "tabel-progress", true);

    let table = scraper
        .scrape(&format!("{base}/sen/progress/edcod?wil=65"))
        .unwrap();
    assert_eq!(table.headers[0], "Wilayah");
    assert_eq!(
        table.rows,
        vec![vec!["Kota A (6501)", "1", "1", "1", "1", "12,50"]]
    );
}

#[test]
fn missing_table_reports_the_requested_url() {
    let (base, _) = serve(|_| Reply::html("200 OK", "<html><body><p>maintenance</p></body></html>"));
    let session = Session::new(&portal(&base)).unwrap();
    let scraper = PortalScraper::new(&session, "tabel-progress", true);

    let url = format!("{base}/sen/progress/ipds?wil=65&view=tabel");
    match scraper.scrape(&url) {
        Err(EtlError::TableNotFound { table_id, url: at }) => {
            assert_eq!(table_id, "tabel-progress");
            assert_eq!(at, url);
        }
        other => panic!("expected TableNotFound, got {other:?}"),
    }
}

#[test]
fn form_login_carries_session_cookie_into_scrapes() {
    let (base, log) = serve(sso_portal);
    let sso = Sso {
        entry_url: format!("{base}/sen"),
        ..Sso::default()
    };

    let session = login(&FormSsoProvider::new(&sso), &portal(&base), "petugas", "rahasia").unwrap();
    let scraper = PortalScraper::new(&session, "tabel-progress", true);
    let table = scraper
        .scrape(&format!("{base}/sen/progress/pencacahan?wil=65"))
        .unwrap();
    assert_eq!(table.rows.len(), 1);

    let log = log.lock().unwrap();
    let post = log.iter().find(|r| r.method == "POST").unwrap();
    assert_eq!(post.path, "/auth/login?session_code=abc");
    assert_eq!(post.body, "execution=e1&username=petugas&password=rahasia");

    let last = log.last().unwrap();
    assert!(last.path.starts_with("/sen/progress/pencacahan"));
    assert!(last.cookie.as_deref().unwrap_or_default().contains("SID=ok"));
}

#[test]
fn login_form_shown_again_is_an_authentication_error() {
    let (base, log) = serve(sso_portal);
    let sso = Sso {
        entry_url: format!("{base}/sen"),
        ..Sso::default()
    };

    let err = login(&FormSsoProvider::new(&sso), &portal(&base), "petugas", "salah")
        .err()
        .unwrap();
    assert!(matches!(err, EtlError::Authentication(_)));

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].method, "POST");
    assert!(log.iter().all(|r| r.cookie.is_none()));
}
