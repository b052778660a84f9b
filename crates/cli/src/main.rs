use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ezn_core::forms::{EmsForm, FireForm};
use ezn_core::settings::NarrativeSettings;
use ezn_core::{pb, ConfigInputs, CoreConfig, Services, UserContext};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ezn")]
#[command(about = "EZ Narratives command line client")]
struct Cli {
    /// Access token from `ezn login`
    #[arg(long, env = "EZN_ACCESS_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Ems,
    Fire,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and print an access token
    Login {
        email: String,
        /// Falls back to EZN_PASSWORD
        #[arg(long, env = "EZN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Generate a narrative from a JSON form file
    Generate {
        #[arg(value_enum)]
        kind: Kind,
        /// Path to the form, as JSON
        form: PathBuf,
        /// Chat session that receives the narrative
        #[arg(long)]
        session: Option<String>,
    },
    /// List saved narratives
    List,
    /// Print one saved narrative
    Show {
        id: String,
    },
    /// Upload narratives cached while offline
    Sync,
    /// List chat sessions
    Sessions,
    /// Print a form prefilled from the saved settings, as JSON
    Prefill {
        #[arg(value_enum)]
        kind: Kind,
    },
    /// Print the choices offered by a form, as JSON
    Options {
        #[arg(value_enum)]
        kind: Kind,
    },
}

fn services() -> anyhow::Result<Services> {
    let cfg = CoreConfig::try_from(ConfigInputs::from_env())?;
    Ok(Services::from_config(&cfg)?)
}

async fn signed_in(services: &Services, token: Option<&str>) -> anyhow::Result<UserContext> {
    let token = token.context("No access token. Run `ezn login` or set EZN_ACCESS_TOKEN.")?;
    Ok(services.accounts.authenticate(token).await?)
}

async fn read_form<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let token = cli.token.as_deref();

    match cli.command {
        Some(Commands::Login { email, password }) => {
            let services = services()?;
            let signed_in = services
                .accounts
                .login(&pb::LoginReq { email, password })
                .await?;
            eprintln!("Signed in as {}", signed_in.account.email);
            println!("{}", signed_in.access_token);
        }
        Some(Commands::Generate {
            kind,
            form,
            session,
        }) => {
            let services = services()?;
            let user = signed_in(&services, token).await?;
            let generated = match kind {
                Kind::Ems => {
                    let form: EmsForm = read_form(&form).await?;
                    services
                        .narratives
                        .generate_ems(&user, &form, session.as_deref())
                        .await?
                }
                Kind::Fire => {
                    let form: FireForm = read_form(&form).await?;
                    services
                        .narratives
                        .generate_fire(&user, &form, session.as_deref())
                        .await?
                }
            };
            eprintln!("{}", generated.message);
            println!("{}", generated.text);
        }
        Some(Commands::List) => {
            let services = services()?;
            let user = signed_in(&services, token).await?;
            let narratives = services.narratives.list(&user).await?;
            if narratives.is_empty() {
                println!("No narratives found.");
            }
            for n in narratives {
                println!("ID: {}, {}, Created: {}", n.id, n.title, n.created_at);
            }
        }
        Some(Commands::Show { id }) => {
            let services = services()?;
            let user = signed_in(&services, token).await?;
            let narrative = services.narratives.get(&user, &id).await?;
            println!("{}\n\n{}", narrative.title, narrative.content);
        }
        Some(Commands::Sync) => {
            let services = services()?;
            let user = signed_in(&services, token).await?;
            let report = services.narratives.sync_offline(&user).await?;
            println!(
                "Uploaded {}, failed {}, still cached {}",
                report.uploaded, report.failed, report.remaining
            );
        }
        Some(Commands::Sessions) => {
            let services = services()?;
            let user = signed_in(&services, token).await?;
            let sessions = services.sessions.list(&user).await?;
            if sessions.is_empty() {
                println!("No sessions found.");
            }
            for s in sessions {
                println!(
                    "ID: {}, {}, Messages: {}, Date: {}",
                    s.id,
                    s.name,
                    s.messages.len(),
                    s.date
                );
            }
        }
        Some(Commands::Prefill { kind }) => {
            let settings = match token {
                Some(_) => {
                    let services = services()?;
                    let user = signed_in(&services, token).await?;
                    services.accounts.settings(&user).await?.narrative
                }
                None => NarrativeSettings::default(),
            };
            match kind {
                Kind::Ems => print_json(&EmsForm::prefill(&settings))?,
                Kind::Fire => print_json(&FireForm::prefill(&settings))?,
            }
        }
        Some(Commands::Options { kind }) => match kind {
            Kind::Ems => print_json(&EmsForm::options())?,
            Kind::Fire => print_json(&FireForm::options())?,
        },
        None => {
            println!("Use 'ezn --help' for commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_parses_kind_and_session() {
        let cli = Cli::try_parse_from([
            "ezn", "generate", "fire", "call.json", "--session", "session-1", "--token", "t",
        ])
        .unwrap();
        assert_eq!(cli.token.as_deref(), Some("t"));
        match cli.command {
            Some(Commands::Generate {
                kind: Kind::Fire,
                form,
                session,
            }) => {
                assert_eq!(form, PathBuf::from("call.json"));
                assert_eq!(session.as_deref(), Some("session-1"));
            }
            _ => panic!("expected a fire generate command"),
        }
    }

    #[tokio::test]
    async fn test_read_form_accepts_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fire.json");
        std::fs::write(&path, r#"{"unit": "Engine 2"}"#).unwrap();
        let form: FireForm = read_form(&path).await.unwrap();
        assert_eq!(form.unit, "Engine 2");
        assert!(form.emergency_type.is_empty());
    }
}
