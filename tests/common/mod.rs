//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use push_gateway::admin::{serve_admin, AdminState};
use push_gateway::config::{AppConfig, TopicConfig};
use push_gateway::http::HttpServer;
use push_gateway::lifecycle::{bootstrap, Gateway, Shutdown};

pub const ADMIN_KEY: &str = "test-admin-key";

/// A gateway serving on ephemeral ports.
pub struct TestGateway {
    pub gateway: Gateway,
    pub addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/__push{}", self.addr, path)
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!("http://{}/admin{}", self.admin_addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.gateway.context.stop();
        self.shutdown.trigger();
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.application.context_path = "/chat".into();
    config.sessions.poll_timeout_secs = 5;
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.into();
    config.push.topics = vec![
        TopicConfig {
            name: "news".into(),
            allow_subtopics: false,
        },
        TopicConfig {
            name: "chat".into(),
            allow_subtopics: true,
        },
    ];
    config
}

/// Bootstrap and serve push + admin HTTP on 127.0.0.1 ephemeral ports.
pub async fn start_gateway(config: AppConfig) -> TestGateway {
    let gateway = bootstrap(&config).unwrap();
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(&config, gateway.context.clone());
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();
    let state = AdminState {
        context: gateway.context.clone(),
        api_key: ADMIN_KEY.into(),
    };
    tokio::spawn(serve_admin(admin_listener, state, shutdown.subscribe()));

    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGateway {
        gateway,
        addr,
        admin_addr,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
