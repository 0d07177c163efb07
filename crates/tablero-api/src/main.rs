// Tablero
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use anyhow::Result;
use clap::Parser;
use tablero_api::{config::Config, server::ApiServer};
use tracing::{info, warn};

/// Tablero dashboard server
#[derive(Parser, Debug)]
#[command(name = "tablero", about = "Tablero dashboard gate and permissions server")]
pub struct Cli {
    /// Address to listen on (overrides $TABLERO_BIND_ADDRESS)
    #[arg(long)]
    pub bind: Option<String>,

    /// Base URL of the auth/database service (overrides $TABLERO_BACKEND_URL)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Send the session cookie without the Secure attribute, for local HTTP
    #[arg(long)]
    pub insecure_cookies: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(backend_url) = cli.backend_url {
        config.backend_url = backend_url;
    }
    if cli.insecure_cookies {
        config.cookie_secure = false;
    }

    info!("Starting Tablero: bind_address={}, backend={}", config.bind_address, config.backend_url);
    if config.backend_anon_key.is_empty() {
        warn!("TABLERO_BACKEND_ANON_KEY is not set; backend calls will be rejected");
    }

    let server = ApiServer::new(config)?;
    info!("Tablero started on http://{}", server.bind_address());

    server.run().await?;

    Ok(())
}
