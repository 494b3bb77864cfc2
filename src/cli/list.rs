//! List command implementation.

use clap::Args;
use virtrest::config::VirtrestConfig;
use virtrest::domain::{with_session, DomainDescriptor};
use virtrest::hypervisor;

/// List domains on the hypervisor.
#[derive(Args, Debug)]
pub struct ListCmd {
    /// Hypervisor URI (overrides the config file).
    #[arg(short, long, value_name = "URI")]
    pub uri: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ListCmd {
    /// Execute the list command.
    pub fn run(&self, config: &VirtrestConfig) -> virtrest::Result<()> {
        let uri = self.uri.as_deref().unwrap_or(&config.uri);
        let backend = hypervisor::connect_backend(uri)?;

        let domains: Vec<DomainDescriptor> = with_session(backend.as_ref(), |session| {
            let ids = session.enumerate()?;
            ids.into_iter()
                .map(|id| session.describe(id))
                .collect::<virtrest::Result<Vec<_>>>()
        })?;

        if self.json {
            let json = serde_json::to_string_pretty(&domains)
                .map_err(|e| virtrest::Error::config(format!("serialize domains: {}", e)))?;
            println!("{}", json);
            return Ok(());
        }

        if domains.is_empty() {
            println!("No domains found");
            return Ok(());
        }

        println!(
            "{:<20} {:<38} {:<10} {:<6} {:<12}",
            "NAME", "UUID", "STATE", "VCPU", "MEMORY"
        );
        println!("{}", "-".repeat(88));

        for d in &domains {
            println!(
                "{:<20} {:<38} {:<10} {:<6} {:<12}",
                truncate(&d.name, 18),
                d.uuid,
                d.state.name(),
                d.vcpu,
                format!("{} KiB", d.memory),
            );
        }

        Ok(())
    }
}

/// Truncate a string to max length, adding "..." if needed.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}
