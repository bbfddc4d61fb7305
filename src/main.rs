//! CropAid - Command Line Entry Point
//!
//! Headless front end for the session library: restores the stored session,
//! runs one command and prints the result as JSON.

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::info;

use cropaid_session::{
    logging,
    models::{AuthResult, NewReport, ReportQuery, Severity},
    ClientConfig,
};

const USAGE: &str = "usage: cropaid <status | login <identifier> <password> | logout | dashboard | reports | stats | report <flood|pest> <severity> <description>>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env();
    logging::init(&config.log_dir());
    info!("CropAid client starting against {}", config.api_base_url);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command: Vec<&str> = args.iter().map(String::as_str).collect();

    let session = cropaid_session::start(config)
        .await
        .context("failed to start session")?;

    match command.as_slice() {
        [] | ["status"] => print(&session.session().view()),
        ["login", identifier, password] => {
            let result: AuthResult = session.login(identifier, password).await.into();
            print(&result)
        }
        ["logout"] => {
            session.logout().await;
            print(&session.session().view())
        }
        ["dashboard"] => print(&session.farmer_dashboard().await?),
        ["reports"] => {
            let is_admin = session
                .session()
                .current_user()
                .map_or(false, |user| user.is_admin());
            if is_admin {
                print(&session.admin_reports(ReportQuery::default()).await?)
            } else {
                print(&session.farmer_reports().await?)
            }
        }
        ["stats"] => print(&session.admin_stats().await?),
        ["report", kind, severity, description @ ..] if !description.is_empty() => {
            let severity: Severity = severity.parse().map_err(anyhow::Error::msg)?;
            let description = description.join(" ");
            let report = match *kind {
                "flood" => NewReport::Flood {
                    severity,
                    water_level: None,
                    affected_area: None,
                    description,
                },
                "pest" => NewReport::Pest {
                    pest_type: "unspecified".into(),
                    severity,
                    affected_crop: None,
                    affected_area: None,
                    description,
                },
                other => bail!("unknown report type: {}", other),
            };
            print(&session.create_report(report).await?)
        }
        _ => bail!(USAGE),
    }
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
