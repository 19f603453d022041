//! Auth command implementation.
//!
//! Log in through the browser device flow or with credentials, and manage
//! stored tokens.

use anyhow::Result;
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};

use super::common::create_client;

/// Execute the login command.
pub async fn execute_login(credentials: bool, email: Option<&str>) -> Result<()> {
    let client = create_client()?;

    if credentials {
        let term = Term::stderr();
        let email = match email {
            Some(email) => email.to_string(),
            None => {
                term.write_str("Email: ")?;
                term.read_line()?.trim().to_string()
            }
        };
        term.write_str("Password: ")?;
        let password = term.read_secure_line()?;

        println!(
            "{} Logging in to {} as {}",
            style("→").cyan().bold(),
            style(client.base_url()).yellow(),
            style(&email).green()
        );

        client
            .login_with_credentials(&email, &password, || {
                term.write_str("MFA code: ")?;
                Ok(term.read_line()?.trim().to_string())
            })
            .await
            .map_err(|e| anyhow::anyhow!("Authentication failed: {e}"))?;

        println!("{} Authentication successful!", style("✓").green().bold());
        return Ok(());
    }

    let authorization = client
        .request_device_authorization()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start browser login: {e}"))?;

    println!(
        "{} Open {} in a browser",
        style("→").cyan().bold(),
        style(&authorization.verification_uri_complete).underlined()
    );
    println!(
        "  and confirm the code {}",
        style(&authorization.user_code).yellow().bold()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")?,
    );
    spinner.set_message("Waiting for browser confirmation...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let outcome = client.complete_device_login(&authorization).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(Some(email)) => println!(
            "{} Authenticated as {}",
            style("✓").green().bold(),
            style(email).green()
        ),
        Ok(None) => println!("{} Authentication successful!", style("✓").green().bold()),
        Err(e) => anyhow::bail!("Authentication failed: {e}"),
    }

    Ok(())
}

/// Execute the logout command.
pub fn execute_logout() -> Result<()> {
    let client = create_client()?;
    client.logout()?;
    println!("{} Logged out", style("✓").green().bold());
    Ok(())
}

/// Execute the auth status subcommand.
pub fn execute_status() -> Result<()> {
    let client = create_client()?;

    println!("{} Authentication status:\n", style("→").cyan().bold());
    let status = if client.tokens().is_logged_in() {
        style("authenticated").green()
    } else {
        style("not authenticated").red()
    };
    println!("  {}: {}", style(client.base_url()).bold(), status);

    if let Some(dir) = client.tokens().dir() {
        println!("  Token directory: {}", style(dir.display()).dim());
    }
    if !client.tokens().is_logged_in() {
        println!("  Run {} to authenticate.", style("qnx login").dim());
    }

    Ok(())
}
