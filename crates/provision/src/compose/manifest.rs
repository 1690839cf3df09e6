//! Typed model of the service topology manifest (`docker-compose.yml`).

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{StackConfig, config::ROOT_USER};

/// File name of the service topology manifest.
pub const COMPOSE_FILENAME: &str = "docker-compose.yml";

/// Name of the bridge network shared by every service.
pub const NETWORK_NAME: &str = "cms_network";

/// The five services of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum StackService {
    Mysql,
    Redis,
    Laravel,
    Nextjs,
    Mailhog,
}

impl StackService {
    /// All services, in start order.
    pub const ALL: [StackService; 5] = [
        StackService::Mysql,
        StackService::Redis,
        StackService::Laravel,
        StackService::Nextjs,
        StackService::Mailhog,
    ];

    /// Whether the stack is unusable without this service.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StackService::Mysql | StackService::Redis | StackService::Laravel
        )
    }
}

/// Build section of a service built from a local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeBuild {
    pub context: String,
    pub dockerfile: String,
}

/// Start-order condition on another service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependsOnCondition {
    ServiceStarted,
    ServiceHealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    pub condition: DependsOnCondition,
}

/// Container health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Healthcheck {
    pub test: Vec<String>,
    pub interval: String,
    pub timeout: String,
    pub retries: u32,
}

impl Healthcheck {
    fn new(test: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            test: test.into_iter().map(Into::into).collect(),
            interval: "10s".to_string(),
            timeout: "5s".to_string(),
            retries: 5,
        }
    }

    /// A `CMD-SHELL` check.
    fn shell(command: impl Into<String>) -> Self {
        Self::new(["CMD-SHELL".to_string(), command.into()])
    }
}

/// One service definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<ComposeBuild>,
    pub container_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub depends_on: BTreeMap<String, DependsOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
    pub restart: String,
}

impl ComposeService {
    fn new(container_name: String) -> Self {
        Self {
            image: None,
            platform: None,
            build: None,
            container_name,
            ports: Vec::new(),
            environment: BTreeMap::new(),
            volumes: Vec::new(),
            networks: vec![NETWORK_NAME.to_string()],
            depends_on: BTreeMap::new(),
            healthcheck: None,
            restart: "unless-stopped".to_string(),
        }
    }

    fn image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self.platform = Some("linux/amd64".to_string());
        self
    }

    fn build(mut self, context: &str) -> Self {
        self.build = Some(ComposeBuild {
            context: context.to_string(),
            dockerfile: "Dockerfile".to_string(),
        });
        self
    }

    fn port(mut self, host: u16, container: u16) -> Self {
        self.ports.push(format!("{}:{}", host, container));
        self
    }

    fn env(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.environment
            .insert(key.to_string(), escape_interpolation(value.as_ref()));
        self
    }

    fn volume(mut self, volume: &str) -> Self {
        self.volumes.push(volume.to_string());
        self
    }

    fn depends_on(mut self, service: StackService, condition: DependsOnCondition) -> Self {
        self.depends_on
            .insert(service.to_string(), DependsOn { condition });
        self
    }

    fn healthcheck(mut self, healthcheck: Healthcheck) -> Self {
        self.healthcheck = Some(healthcheck);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeNetwork {
    pub driver: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeVolume {
    pub driver: String,
}

/// The whole manifest: services, networks and volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeManifest {
    pub services: BTreeMap<String, ComposeService>,
    pub networks: BTreeMap<String, ComposeNetwork>,
    pub volumes: BTreeMap<String, ComposeVolume>,
}

impl ComposeManifest {
    /// Build the manifest for `config`.
    pub fn for_stack(config: &StackConfig) -> Self {
        let ports = &config.ports;
        let db = &config.database;

        let mut mysql = ComposeService::new(config.container_name(StackService::Mysql))
            .image("mysql:8.0")
            .port(ports.mysql, 3306)
            .env("MYSQL_ROOT_PASSWORD", &db.password)
            .env("MYSQL_DATABASE", &db.name);
        // The image refuses MYSQL_USER=root; any other user is created with the same password.
        if db.user != ROOT_USER {
            mysql = mysql
                .env("MYSQL_USER", &db.user)
                .env("MYSQL_PASSWORD", &db.password);
        }
        let mysql = mysql
            .volume("mysql_data:/var/lib/mysql")
            .healthcheck(Healthcheck::new([
                "CMD".to_string(),
                "mysqladmin".to_string(),
                "ping".to_string(),
                "-h".to_string(),
                "localhost".to_string(),
                "-u".to_string(),
                ROOT_USER.to_string(),
                format!("-p{}", escape_interpolation(&db.password)),
            ]));

        let redis = ComposeService::new(config.container_name(StackService::Redis))
            .image("redis:7-alpine")
            .port(ports.redis, 6379)
            .volume("redis_data:/data")
            .healthcheck(Healthcheck::new(["CMD", "redis-cli", "ping"]));

        let laravel = ComposeService::new(config.container_name(StackService::Laravel))
            .build("./backend")
            .port(ports.backend, 80)
            .volume("./backend:/var/www/html")
            .volume("storage_data:/var/www/html/storage")
            .env("APP_ENV", "local")
            .env("APP_DEBUG", "true")
            .depends_on(StackService::Mysql, DependsOnCondition::ServiceHealthy)
            .depends_on(StackService::Redis, DependsOnCondition::ServiceHealthy)
            .healthcheck(Healthcheck::shell("nc -z 127.0.0.1 80 || exit 1"));

        let nextjs = ComposeService::new(config.container_name(StackService::Nextjs))
            .build("./frontend")
            .port(ports.frontend, 3000)
            .volume("./frontend:/app")
            .volume("/app/node_modules")
            .volume("/app/.next")
            .env("NODE_ENV", "development")
            .env("NEXT_PUBLIC_API_URL", &config.api_url)
            .depends_on(StackService::Laravel, DependsOnCondition::ServiceStarted)
            .healthcheck(Healthcheck::shell("nc -z 127.0.0.1 3000 || exit 1"));

        let mailhog = ComposeService::new(config.container_name(StackService::Mailhog))
            .image("mailhog/mailhog:latest")
            .port(ports.smtp, 1025)
            .port(ports.mail_ui, 8025)
            .healthcheck(Healthcheck::shell(
                "wget -q -O /dev/null http://127.0.0.1:8025 || exit 1",
            ));

        let services = [
            (StackService::Mysql, mysql),
            (StackService::Redis, redis),
            (StackService::Laravel, laravel),
            (StackService::Nextjs, nextjs),
            (StackService::Mailhog, mailhog),
        ]
        .into_iter()
        .map(|(service, definition)| (service.to_string(), definition))
        .collect();

        let local = || ComposeVolume {
            driver: "local".to_string(),
        };

        Self {
            services,
            networks: BTreeMap::from([(
                NETWORK_NAME.to_string(),
                ComposeNetwork {
                    driver: "bridge".to_string(),
                },
            )]),
            volumes: BTreeMap::from([
                ("mysql_data".to_string(), local()),
                ("redis_data".to_string(), local()),
                ("storage_data".to_string(), local()),
            ]),
        }
    }

    /// Render the manifest as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).context("Failed to serialize compose manifest to YAML")
    }

    /// Parse a manifest from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).context("Failed to parse compose manifest")
    }
}

/// Escape `$` so compose passes the value through instead of interpolating it.
fn escape_interpolation(value: &str) -> String {
    value.replace('$', "$$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_has_five_services() {
        let manifest = ComposeManifest::for_stack(&StackConfig::default());

        assert_eq!(manifest.services.len(), 5);
        for service in StackService::ALL {
            let definition = &manifest.services[&service.to_string()];
            assert_eq!(definition.container_name, format!("cms-system_{}", service));
            assert_eq!(definition.networks, vec![NETWORK_NAME.to_string()]);
            assert!(definition.healthcheck.is_some());
        }
    }

    #[test]
    fn test_backend_waits_for_healthy_dependencies() {
        let manifest = ComposeManifest::for_stack(&StackConfig::default());
        let laravel = &manifest.services["laravel"];

        assert_eq!(laravel.depends_on.len(), 2);
        for dependency in ["mysql", "redis"] {
            assert_eq!(
                laravel.depends_on[dependency].condition,
                DependsOnCondition::ServiceHealthy
            );
        }
        assert_eq!(
            manifest.services["nextjs"].depends_on["laravel"].condition,
            DependsOnCondition::ServiceStarted
        );
    }

    #[test]
    fn test_yaml_roundtrip_keeps_credentials() {
        let mut config = StackConfig::default();
        config.database.password = "p4ss".to_string();
        config.database.name = "shop_db".to_string();

        let manifest = ComposeManifest::for_stack(&config);
        let yaml = manifest.to_yaml().unwrap();
        let parsed = ComposeManifest::from_yaml(&yaml).unwrap();

        assert_eq!(parsed, manifest);
        let mysql = &parsed.services["mysql"];
        assert_eq!(mysql.environment["MYSQL_ROOT_PASSWORD"], "p4ss");
        assert_eq!(mysql.environment["MYSQL_DATABASE"], "shop_db");
        assert!(mysql.healthcheck.as_ref().unwrap().test.contains(&"-pp4ss".to_string()));
        assert_eq!(mysql.ports, vec!["3307:3306".to_string()]);
        assert!(!mysql.environment.contains_key("MYSQL_USER"));
    }

    #[test]
    fn test_dollar_in_password_is_escaped() {
        let mut config = StackConfig::default();
        config.database.password = "pa$word".to_string();

        let manifest = ComposeManifest::for_stack(&config);
        let mysql = &manifest.services["mysql"];
        assert_eq!(mysql.environment["MYSQL_ROOT_PASSWORD"], "pa$$word");
        assert!(mysql.healthcheck.as_ref().unwrap().test.contains(&"-ppa$$word".to_string()));

        let yaml = manifest.to_yaml().unwrap();
        assert!(!yaml.contains("pa$word"));
    }

    #[test]
    fn test_non_root_user_is_created() {
        let mut config = StackConfig::default();
        config.database.user = "app".to_string();
        config.database.password = "p4ss".to_string();

        let manifest = ComposeManifest::for_stack(&config);
        let mysql = &manifest.services["mysql"];

        assert_eq!(mysql.environment["MYSQL_USER"], "app");
        assert_eq!(mysql.environment["MYSQL_PASSWORD"], "p4ss");
        assert_eq!(mysql.environment["MYSQL_ROOT_PASSWORD"], "p4ss");
    }

    #[test]
    fn test_parse_service_name() {
        assert_eq!("nextjs".parse::<StackService>().unwrap(), StackService::Nextjs);
        assert!(StackService::Laravel.is_critical());
        assert!(!StackService::Mailhog.is_critical());
    }
}
