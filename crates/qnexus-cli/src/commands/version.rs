//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - command-line client for Quantinuum Nexus",
        style("qnx").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qnexus       Client SDK (REST, pagination, job status channel)");
    println!("  qnexus-cli   Command-line interface");
    println!();
    println!(
        "Repository: {}",
        style("https://github.com/CQCL/qnexus").underlined()
    );
    println!("License:    {}", style("Apache-2.0").dim());
}
