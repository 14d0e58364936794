//! `lbcert listeners`

use anyhow::Context;
use clap::Args;
use lbcert_cloud::LoadBalancerApi;
use serde::Serialize;

use crate::output::OutputFormat;
use crate::settings::CloudArgs;

/// List the load balancer's listeners and their certificates
#[derive(Args, Debug)]
pub struct ListenersArgs {
    #[command(flatten)]
    pub cloud: CloudArgs,
}

#[derive(Debug, Serialize)]
struct ListenerRow {
    name: String,
    port: u16,
    protocol: String,
    certificate: Option<String>,
}

pub(crate) async fn run(args: ListenersArgs, output: OutputFormat) -> anyhow::Result<()> {
    let load_balancer_id = args.cloud.load_balancer_id()?;
    let clients = args.cloud.connect()?;

    let load_balancer = clients
        .load_balancer
        .get_load_balancer(&load_balancer_id)
        .await
        .with_context(|| format!("failed to read load balancer {load_balancer_id}"))?;

    let rows: Vec<ListenerRow> = load_balancer
        .listeners
        .values()
        .map(|listener| ListenerRow {
            name: listener.name.clone(),
            port: listener.port,
            protocol: listener.protocol.clone(),
            certificate: listener.certificate_name().map(str::to_owned),
        })
        .collect();

    output.print(&rows, || render(&rows))
}

fn render(rows: &[ListenerRow]) -> String {
    if rows.is_empty() {
        return "no listeners".to_owned();
    }
    rows.iter()
        .map(|row| {
            format!(
                "{:<24} {:>5} {:<6} {}",
                row.name,
                row.port,
                row.protocol,
                row.certificate.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
