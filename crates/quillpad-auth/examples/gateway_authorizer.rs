//! Token authorizer driven by stdin
//!
//! Reads one gateway event (JSON) from stdin and prints the policy response.
//!
//! ```sh
//! export QUILLPAD_KEY_SET_URL=https://issuer.example.com/.well-known/jwks.json
//! echo '{"type":"TOKEN","authorizationToken":"Bearer eyJ...","methodArn":"arn"}' \
//!     | cargo run --example gateway_authorizer
//! ```

use std::io::Read;

use quillpad_auth::{AuthorizationService, AuthorizerConfig, GatewayAuthorizer, LoggingConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    LoggingConfig::structured().init()?;

    let config = AuthorizerConfig::from_env()?;
    let authorizer = GatewayAuthorizer::new(AuthorizationService::from_config(config)?);

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let event: serde_json::Value = serde_json::from_str(&input)?;

    let response = authorizer.handle_json(event).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
