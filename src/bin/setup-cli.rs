use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "setup-cli")]
#[command(about = "Drive the setup proxy's API from a terminal", long_about = None)]
struct Cli {
    #[arg(short, long, env = "SETUP_PROXY_URL", default_value = "http://127.0.0.1:8099")]
    url: String,

    /// Gateway token, for gateways with auth enabled
    #[arg(short, long, env = "GATEWAY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show paths and whether the gateway config exists
    Env,
    /// Show model/auth status
    ModelsStatus,
    /// Start the onboarding wizard
    WizardStart {
        /// Wizard params as JSON (default: local quickstart)
        #[arg(long)]
        params: Option<String>,
    },
    /// Show the current wizard step
    WizardStatus,
    /// Answer the current wizard step
    WizardNext {
        /// Answer as JSON, e.g. '{"choice":"openai-codex"}'
        params: String,
    },
    /// Cancel the wizard
    WizardCancel,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let api = format!("{}/__setup/api", cli.url.trim_end_matches('/'));

    let res = match cli.command {
        Commands::Env => client.get(format!("{api}/env")).send().await?,
        Commands::ModelsStatus => client.get(format!("{api}/models/status")).send().await?,
        Commands::WizardStart { params } => {
            let params = params.as_deref().map(serde_json::from_str::<Value>).transpose()?;
            let body = wizard_body(cli.token.as_deref(), params);
            client.post(format!("{api}/wizard/start")).json(&body).send().await?
        }
        Commands::WizardStatus => {
            let body = wizard_body(cli.token.as_deref(), None);
            client.post(format!("{api}/wizard/status")).json(&body).send().await?
        }
        Commands::WizardNext { params } => {
            let params: Value = serde_json::from_str(&params)?;
            let body = wizard_body(cli.token.as_deref(), Some(params));
            client.post(format!("{api}/wizard/next")).json(&body).send().await?
        }
        Commands::WizardCancel => {
            let body = wizard_body(cli.token.as_deref(), None);
            client.post(format!("{api}/wizard/cancel")).json(&body).send().await?
        }
    };

    print_response(res).await
}

fn wizard_body(token: Option<&str>, params: Option<Value>) -> Value {
    let mut body = json!({ "token": token });
    if let Some(params) = params {
        body["params"] = params;
    }
    body
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };
    if status.is_success() {
        println!("{rendered}");
    } else {
        eprintln!("Error: setup API returned status {status}");
        eprintln!("{rendered}");
    }
    Ok(())
}
