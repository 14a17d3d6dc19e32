//! Log in against a PART server and print session changes.
//!
//! ```sh
//! PART_API_ENDPOINT=http://localhost:8080/api \
//!     cargo run -p part-api --example session_watch -- admin secret
//! ```

use part_api::{ClientEvent, PartClient, listener};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> part_api::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let username = args.next().unwrap_or_else(|| "admin".to_string());
    let password = args.next().unwrap_or_default();

    let client = PartClient::from_env()?;
    client.subscribe(
        ClientEvent::Authenticated,
        listener(|authenticated: bool| println!("session authenticated: {authenticated}")),
    );

    if let Err(err) = client.authenticate(username, password).await {
        eprintln!("login failed: {err}");
        return Ok(());
    }

    match client.get_active_survey().await {
        Ok(envelope) => println!("active survey: {}", envelope.into_data()),
        Err(err) => eprintln!("could not load active survey: {err}"),
    }

    // A 401 above would have scheduled a background check; give it a moment.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    println!("final state: {:?}", client.status());
    Ok(())
}
