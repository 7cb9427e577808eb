//! Mock origin, corpus and configuration fixtures

use blog_image_archiver::{Comment, Config, Corpus, Post, SessionContext};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

/// Smallest body the sniffer accepts as PNG
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

/// What a private WordPress site serves to anonymous visitors
pub const LOGIN_WALL: &str = "<!DOCTYPE html><html><head><title>Private Site</title></head>\
    <body><p>This site is marked private by its owner. Please login to view it.</p></body></html>";

/// Cookie the mock origin requires
pub const SESSION_COOKIE: &str = "sid=local";

/// Session holding the cookie the mock origin expects
pub fn session() -> SessionContext {
    SessionContext::parse(
        Path::new("cookies.txt"),
        "# Netscape HTTP Cookie File\n127.0.0.1\tFALSE\t/\tFALSE\t0\tsid\tlocal\n",
    )
}

/// Configuration pointing at the mock origin, with all state under `dir`
pub fn config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.fetch.probe_url = format!("{}/banner.jpg", server.uri());
    config.store.output_dir = dir.path().join("images");
    config.burn.database_path = dir.path().join("burns.db");
    config.run.request_delay = Duration::ZERO;
    config.run.shuffle_seed = Some(1);
    config
}

/// Corpus with one post per body; comments hold the remaining bodies
pub fn corpus(post_body: &str, comment_bodies: &[&str]) -> Corpus {
    let post = Post {
        title: "Speakeasy".into(),
        link: "https://blog.example/speakeasy".into(),
        content: post_body.into(),
        comments: comment_bodies
            .iter()
            .enumerate()
            .map(|(i, body)| Comment {
                id: i as i64 + 1,
                author: "reader".into(),
                content: (*body).into(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    Corpus::from_posts([("1".to_string(), post)])
}

/// Answer GETs on `route`, only for requests carrying the session cookie
pub async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Number of requests the origin received for `route`
pub async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}
