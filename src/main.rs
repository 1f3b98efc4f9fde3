use clap::Parser;

use figure_query::cli::{Cli, classify_error, run};

fn main() -> anyhow::Result<()> {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let json_errors = cli.json;

    match run(cli) {
        Ok(()) => Ok(()),
        Err(err) => {
            let (code, kind) = classify_error(&err);
            if json_errors {
                let payload = serde_json::json!({
                    "error": {
                        "code": code,
                        "kind": kind,
                        "message": format!("{err:#}"),
                    }
                });
                eprintln!("{payload}");
            } else {
                eprintln!("error: {err:#}");
            }
            std::process::exit(code);
        }
    }
}
