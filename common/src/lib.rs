use anyhow::Result;
use owo_colors::OwoColorize;
use rustls::{ClientConfig, RootCertStore, pki_types::CertificateDer};
use tokio_postgres_rustls::MakeRustlsConnect;

pub mod args;
pub mod cors;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod postgres;
pub mod rate_limit;
pub mod redis;
mod request_context;
pub mod shutdown;
pub mod wait;

pub use request_context::*;

pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_else(|_| String::new())
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);

    install_rustls_provider();
}

pub fn install_rustls_provider() {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("install aws-lc-rs provider");
}

pub fn make_rustls(certs: Vec<CertificateDer<'_>>) -> Result<MakeRustlsConnect> {
    let mut roots = RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs().expect("could not load platform certs") {
        roots.add(cert).unwrap();
    }
    for cert in certs {
        roots.add(cert)?;
    }
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(MakeRustlsConnect::new(config))
}

pub fn signal_ready() {
    let _ = std::fs::write("/etc/ready", "ready");
}

pub mod access_log {
    use axum::{extract::Request, middleware::Next, response::Response};
    use owo_colors::OwoColorize;

    use crate::get_source_ip;

    pub async fn request(req: Request, next: Next) -> Response {
        let ip = get_source_ip(req.headers())
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".into());
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let start = std::time::Instant::now();
        let response = next.run(req).await;
        let duration = start.elapsed();
        let is_success = response.status().is_success();
        let (a, b) = if is_success {
            ((20, 163, 73), (25, 163, 118))
        } else {
            ((230, 126, 16), (171, 85, 17))
        };
        tracing::info!(
            "{} {} {} {} {} xff={}",
            format!("[{}]", method).truecolor(a.0, a.1, a.2),
            path.truecolor(b.0, b.1, b.2),
            "->".truecolor(a.0, a.1, a.2),
            response.status().as_u16().truecolor(b.0, b.1, b.2),
            format!("({:?})", duration).truecolor(b.0, b.1, b.2),
            ip,
        );
        response
    }
}

pub fn get_source_ip(headers: &axum::http::HeaderMap) -> Option<std::net::IpAddr> {
    if let Some(forwarded_for) = headers.get("x-forwarded-for")
        && let Ok(forwarded_for) = forwarded_for.to_str()
        && let Some(ip_str) = forwarded_for.split(',').next()
        && let Ok(ip) = ip_str.trim().parse()
    {
        return Some(ip);
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(ip_str) = real_ip.to_str()
        && let Ok(ip) = ip_str.trim().parse()
    {
        return Some(ip);
    }

    None
}
