//! Configuration summary formatting
//!
//! Shows what a configuration file resolves to: servers, items with the
//! rotation strategy in force on every server, and log sinks.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::report::format_size;
use crate::config::{Config, LoggerConfig};
use crate::models::{BackupItem, BackupServer, DatabaseItem};

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Rotation")]
    rotation: String,
}

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "Item")]
    item: &'static str,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Sources")]
    sources: String,
    #[tabled(rename = "Rotation")]
    rotation: String,
}

fn server_row(server: &BackupServer) -> ServerRow {
    match server {
        BackupServer::Ssh(ssh) => ServerRow {
            name: ssh.name.clone(),
            destination: format!("ssh://{}:{}", ssh.destination(), ssh.port),
            location: ssh.location.clone(),
            rotation: ssh.rotation_strategy.to_string(),
        },
    }
}

fn item_sources(item: &BackupItem) -> String {
    match item {
        BackupItem::Files(files) => {
            let mut sources = files.includes.join(", ");
            if !files.excludes.is_empty() {
                sources.push_str(&format!(" (excluding {})", files.excludes.join(", ")));
            }
            sources
        }
        BackupItem::Database(DatabaseItem::Mysql(mysql)) => format!(
            "mysql {} at {}:{}",
            mysql.database,
            mysql.connector.hostname(),
            mysql.connector.port()
        ),
        BackupItem::DockerVolumes(docker) => docker.volumes.join(", "),
    }
}

fn logger_line(logger: &LoggerConfig) -> String {
    match logger {
        LoggerConfig::File(file) => format!(
            "file {} ({}..{}, rolls at {}, keeps {})",
            file.file.display(),
            file.levels.min,
            file.levels.max,
            format_size(file.max_size),
            file.backup_count
        ),
        LoggerConfig::Web(web) => format!(
            "web {} {} ({}..{})",
            web.method, web.url, web.levels.min, web.levels.max
        ),
    }
}

/// Format a parsed configuration for display
pub fn format_config_summary(config: &Config) -> String {
    let mut output = String::new();
    output.push_str(&format!("Configuration '{}'\n\n", config.name));

    output.push_str("Servers:\n");
    if config.servers.is_empty() {
        output.push_str("  none\n");
    } else {
        let rows: Vec<ServerRow> = config.servers.iter().map(server_row).collect();
        output.push_str(&Table::new(rows).with(Style::psql()).to_string());
        output.push('\n');
    }

    output.push_str("\nItems:\n");
    if config.items.is_empty() {
        output.push_str("  none\n");
    } else {
        let rows: Vec<ItemRow> = config
            .items
            .iter()
            .flat_map(|item| {
                config.servers.iter().map(move |server| ItemRow {
                    item: item.name(),
                    server: server.name().to_string(),
                    sources: item_sources(item),
                    rotation: item.effective_rotation_strategy(server).to_string(),
                })
            })
            .collect();
        output.push_str(&Table::new(rows).with(Style::psql()).to_string());
        output.push('\n');
    }

    output.push_str("\nLoggers:\n  console\n");
    for logger in &config.loggers {
        output.push_str(&format!("  {}\n", logger_line(logger)));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
settings:
  name: home-server
loggers:
  - type: file
    file: /var/log/backee.log
    max_size: 10m
    backup_count: 2
servers:
  - type: ssh
    name: nas
    location: /volume1/backups
    connection: {host: nas.local, username: backup}
    rotation_strategy: {daily: 7, monthly: 3}
backup_items:
  files:
    includes: [/etc, /srv/www]
    excludes: [/srv/www/cache]
    rotation_strategy: {daily: 30}
"#;

    #[test]
    fn test_config_summary() {
        let config = Config::parse(CONFIG).unwrap();
        let output = format_config_summary(&config);

        assert!(output.starts_with("Configuration 'home-server'"));
        assert!(output.contains("ssh://backup@nas.local:22"));
        assert!(output.contains("7 daily, 3 monthly, 0 yearly"));
        assert!(output.contains("30 daily, 0 monthly, 0 yearly"));
        assert!(output.contains("/etc, /srv/www (excluding /srv/www/cache)"));
        assert!(output.contains("file /var/log/backee.log (debug..critical, rolls at 10.0 MB, keeps 2)"));
    }

    #[test]
    fn test_empty_summary() {
        let config = Config::parse("settings: {name: bare}").unwrap();
        let output = format_config_summary(&config);
        assert!(output.contains("Servers:\n  none"));
        assert!(output.contains("Items:\n  none"));
    }
}
