use counterpoint_client::application_port::JsonCall;
use counterpoint_client::client::Client;
use counterpoint_client::domain_model::SessionContext;
use counterpoint_client::logger::*;
use counterpoint_client::settings::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let client = Client::try_new(&project_settings, SessionContext::new(cli.user.as_str())).await?;

    let result = match cli.command {
        Command::Call { operation, payload } => call(&client, operation, &payload).await,
        Command::Listen => listen(&client).await,
    };

    client.logout().await;
    result
}

async fn call(client: &Client, operation: String, payload: &str) -> anyhow::Result<()> {
    let payload: serde_json::Value = serde_json::from_str(payload)?;
    let reply = client
        .rpc_executor
        .call(JsonCall::<serde_json::Value>::new(operation, payload))
        .await;

    match reply {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(failure) => {
            let retry = if failure.category.is_transient() {
                " (retry possible)"
            } else {
                ""
            };
            Err(anyhow::anyhow!("{}{}", failure.user_message(), retry))
        }
    }
}

async fn listen(client: &Client) -> anyhow::Result<()> {
    let sender = client.notification_sender();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                sender.send(line.into_bytes()).await?;
            }
        }
    }

    client.shutdown().await;
    let pending = client.relationship_store.snapshot();
    println!("{}", serde_json::to_string_pretty(&pending)?);
    Ok(())
}
