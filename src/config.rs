//! Process-level settings: which services run, where they listen, who may call them.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// The services this binary can host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Rooms, votes, stats and matchmaking
    Registry,
    /// Guess policy and chat relay
    Ai,
    /// Live room chat over WebSocket
    Chat,
}

impl Service {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "registry" | "voting" => Some(Service::Registry),
            "ai" => Some(Service::Ai),
            "chat" => Some(Service::Chat),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Service::Registry => "registry",
            Service::Ai => "ai",
            Service::Chat => "chat",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub services: Vec<Service>,
    pub bind_addr: IpAddr,
    pub registry_port: u16,
    pub ai_port: u16,
    pub chat_port: u16,
    /// The game front-end; the only origin CORS lets through
    pub frontend_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            services: vec![Service::Registry, Service::Ai, Service::Chat],
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            registry_port: 4005,
            ai_port: 4004,
            chat_port: 4002,
            frontend_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let services = match std::env::var("SERVICES") {
            Ok(list) => {
                let mut services = Vec::new();
                for item in list.split(',').filter(|s| !s.trim().is_empty()) {
                    match Service::parse(item) {
                        Some(service) if !services.contains(&service) => services.push(service),
                        Some(_) => {}
                        None => tracing::warn!(service = item, "Ignoring unknown service"),
                    }
                }
                if services.is_empty() {
                    tracing::warn!("SERVICES selects nothing, running all services");
                    defaults.services.clone()
                } else {
                    services
                }
            }
            Err(_) => defaults.services.clone(),
        };

        let port = |key: &str, default: u16| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            services,
            bind_addr: std::env::var("BIND_ADDR")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.bind_addr),
            registry_port: port("REGISTRY_PORT", defaults.registry_port),
            ai_port: port("AI_PORT", defaults.ai_port),
            chat_port: port("CHAT_PORT", defaults.chat_port),
            frontend_origin: std::env::var("FRONTEND_ORIGIN")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.frontend_origin),
        }
    }

    pub fn addr_for(&self, service: Service) -> SocketAddr {
        let port = match service {
            Service::Registry => self.registry_port,
            Service::Ai => self.ai_port,
            Service::Chat => self.chat_port,
        };
        SocketAddr::new(self.bind_addr, port)
    }
}
