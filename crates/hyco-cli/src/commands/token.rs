//! `hyco token`: print a fresh SAS token.

use anyhow::{Context, Result};

use hyco_core::{RelayEndpoint, TokenFactory};

pub fn run(endpoint: RelayEndpoint) -> Result<()> {
    let token = TokenFactory::new(endpoint)
        .create_token()
        .context("failed to sign token")?;
    println!("{}", token.header_value());
    Ok(())
}
