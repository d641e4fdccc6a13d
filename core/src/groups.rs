//! The consumer-groups command

use crate::config::ConsumerGroupsConfig;
use crate::Result;
use kafkacli_client::KafkaClient;
use std::io::{self, Write};

/// Print the group names, one per line, followed by the total
pub fn render(mut groups: Vec<String>, sorted: bool, out: &mut dyn Write) -> io::Result<()> {
    if sorted {
        groups.sort();
    }

    writeln!(out, "Consumer groups:")?;
    for group in &groups {
        writeln!(out, "  {}", group)?;
    }
    writeln!(out, "\nTotal: {}", groups.len())?;
    out.flush()
}

pub async fn run(config: ConsumerGroupsConfig) -> Result<()> {
    println!(
        "Listing consumer groups for all topics on broker(s) {:?}",
        config.client.brokers.join(", ")
    );

    let admin = KafkaClient::new(config.client.clone())?.admin()?;
    let groups = admin.list_consumer_groups().await?;

    render(groups, config.sorted, &mut io::stdout().lock())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(groups: &[&str], sorted: bool) -> String {
        let mut out = Vec::new();
        let groups = groups.iter().map(|g| g.to_string()).collect();
        render(groups, sorted, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_render_sorted() {
        assert_eq!(
            rendered(&["orders", "billing", "audit"], true),
            "Consumer groups:\n  audit\n  billing\n  orders\n\nTotal: 3\n"
        );
    }

    #[test]
    fn test_render_keeps_broker_order() {
        assert_eq!(
            rendered(&["orders", "billing"], false),
            "Consumer groups:\n  orders\n  billing\n\nTotal: 2\n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(rendered(&[], true), "Consumer groups:\n\nTotal: 0\n");
    }
}
